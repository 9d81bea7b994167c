//! The kill ring: a small rotating buffer of recently killed text.

const KILL_RING_MAX: usize = 10;

/// How newly killed text combines with the current slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum KillMode {
    /// Start a new slot.
    New,
    /// Append to the current slot (killing forward).
    Append,
    /// Prepend to the current slot (killing backward).
    Prepend,
}

#[derive(Debug, Default)]
pub(crate) struct KillRing {
    slots: Vec<String>,
    index: usize,
}

impl KillRing {
    /// Adds killed text. Consecutive kills accumulate into one slot so a
    /// single yank restores them all.
    pub fn kill(&mut self, text: String, mode: KillMode) {
        if text.is_empty() {
            return;
        }

        match mode {
            KillMode::Append if !self.slots.is_empty() => {
                self.slots[self.index].push_str(&text);
            }
            KillMode::Prepend if !self.slots.is_empty() => {
                self.slots[self.index].insert_str(0, &text);
            }
            _ => {
                if self.slots.len() == KILL_RING_MAX {
                    self.slots.remove(0);
                }
                self.slots.push(text);
                self.index = self.slots.len() - 1;
            }
        }
    }

    /// The text a yank would insert.
    pub fn current(&self) -> Option<&str> {
        self.slots.get(self.index).map(String::as_str)
    }

    /// Rotates to the previous slot (for yank-pop).
    pub fn rotate(&mut self) {
        if self.slots.is_empty() {
            return;
        }
        self.index = if self.index == 0 {
            self.slots.len() - 1
        } else {
            self.index - 1
        };
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn consecutive_kills_accumulate() {
        let mut ring = KillRing::default();
        ring.kill("foo ".to_string(), KillMode::New);
        ring.kill("bar".to_string(), KillMode::Append);
        assert_eq!(ring.current(), Some("foo bar"));

        ring.kill("pre ".to_string(), KillMode::Prepend);
        assert_eq!(ring.current(), Some("pre foo bar"));
    }

    #[test]
    fn rotation_wraps() {
        let mut ring = KillRing::default();
        ring.kill("one".to_string(), KillMode::New);
        ring.kill("two".to_string(), KillMode::New);
        ring.kill("three".to_string(), KillMode::New);

        assert_eq!(ring.current(), Some("three"));
        ring.rotate();
        assert_eq!(ring.current(), Some("two"));
        ring.rotate();
        assert_eq!(ring.current(), Some("one"));
        ring.rotate();
        assert_eq!(ring.current(), Some("three"));
    }

    #[test]
    fn ring_is_bounded() {
        let mut ring = KillRing::default();
        for i in 0..15 {
            ring.kill(format!("kill {i}"), KillMode::New);
        }
        assert_eq!(ring.slots.len(), KILL_RING_MAX);
        assert_eq!(ring.current(), Some("kill 14"));
    }
}
