//! Searching the history list.

use crate::list::History;
use crate::pattern;

/// Direction of a history search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    /// Search toward newer entries.
    Forward,
    /// Search toward older entries.
    #[default]
    Backward,
}

impl Direction {
    /// Flips the direction.
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }
}

impl History {
    /// Searches for `term` as a substring, starting at the cursor and moving
    /// in `direction`. On success the cursor is left on the matching entry
    /// and the byte offset of the match within its line is returned; on
    /// failure nothing changes.
    pub fn search(&mut self, term: &str, direction: Direction) -> Option<usize> {
        self.search_internal(term, direction, false)
    }

    /// Like [`History::search`], but matching entries must begin with `term`.
    pub fn search_prefix(&mut self, term: &str, direction: Direction) -> Option<usize> {
        self.search_internal(term, direction, true)
    }

    /// Searches for `term` starting from the absolute position `pos` instead
    /// of the cursor. Returns the position of the matching entry; the cursor
    /// is left where it was.
    pub fn search_pos(&mut self, term: &str, direction: Direction, pos: usize) -> Option<usize> {
        let old = self.offset();
        if !self.set_pos(pos) {
            return None;
        }
        let found = self.search(term, direction).map(|_| self.offset());
        self.set_pos(old);
        found
    }

    fn search_internal(&mut self, term: &str, direction: Direction, anchored: bool) -> Option<usize> {
        let reverse = matches!(direction, Direction::Backward);

        if term.is_empty() || self.is_empty() {
            return None;
        }

        let len = self.len();
        let mut i: i64 = if reverse {
            i64::try_from(self.offset().min(len - 1)).ok()?
        } else {
            if self.offset() >= len {
                return None;
            }
            i64::try_from(self.offset()).ok()?
        };

        loop {
            if i < 0 {
                return None;
            }
            #[allow(clippy::cast_sign_loss)]
            let pos = i as usize;
            if pos >= len {
                return None;
            }

            let line = &self.get(pos)?.line;
            if term.len() <= line.len() {
                if anchored {
                    if line.starts_with(term) {
                        self.set_pos(pos);
                        return Some(0);
                    }
                } else {
                    // A reverse search finds the rightmost occurrence within
                    // the line, a forward search the leftmost.
                    let found = if reverse {
                        line.rfind(term)
                    } else {
                        line.find(term)
                    };
                    if let Some(line_index) = found {
                        self.set_pos(pos);
                        return Some(line_index);
                    }
                }
            }

            i += if reverse { -1 } else { 1 };
        }
    }

    /// Searches for entries matching a shell glob. The pattern is implicitly
    /// preceded by `*` unless `anchored`, and followed by `*` unless it
    /// already ends in one; a pattern ending in an unescaped backslash fails
    /// immediately. On success the cursor is left on the matching entry.
    pub fn pattern_search(
        &mut self,
        pattern: &str,
        direction: Direction,
        anchored: bool,
    ) -> Option<usize> {
        // Reject a pattern ending with an odd number of backslashes.
        let trailing = pattern.bytes().rev().take_while(|b| *b == b'\\').count();
        if trailing % 2 == 1 {
            return None;
        }

        let mut pat = String::with_capacity(pattern.len() + 2);
        if !anchored && !pattern.starts_with('*') {
            pat.push('*');
        }
        pat.push_str(pattern);
        if !pat.ends_with('*') {
            pat.push('*');
        }

        let regex = pattern::compile_glob(&pat)?;

        let reverse = matches!(direction, Direction::Backward);
        let len = self.len();
        if len == 0 {
            return None;
        }
        let mut i: i64 = if reverse {
            i64::try_from(self.offset().min(len - 1)).ok()?
        } else {
            if self.offset() >= len {
                return None;
            }
            i64::try_from(self.offset()).ok()?
        };

        loop {
            if i < 0 {
                return None;
            }
            #[allow(clippy::cast_sign_loss)]
            let pos = i as usize;
            if pos >= len {
                return None;
            }

            if regex.is_match(&self.get(pos)?.line).unwrap_or(false) {
                self.set_pos(pos);
                return Some(0);
            }

            i += if reverse { -1 } else { 1 };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> History {
        let mut history = History::new();
        for line in ["echo one", "make all", "echo two", "grep pattern file"] {
            history.add(line);
        }
        history.using_history();
        history
    }

    #[test]
    fn backward_substring_search() {
        let mut history = sample();
        let offset = history.search("echo", Direction::Backward);
        assert_eq!(offset, Some(0));
        assert_eq!(history.offset(), 2);
        assert_eq!(history.current().map(|e| e.line.as_str()), Some("echo two"));
    }

    #[test]
    fn failed_search_leaves_cursor() {
        let mut history = sample();
        assert_eq!(history.search("xyzzy", Direction::Backward), None);
        assert_eq!(history.offset(), 4);
    }

    #[test]
    fn prefix_search_is_anchored() {
        let mut history = sample();
        assert_eq!(history.search_prefix("pattern", Direction::Backward), None);
        assert_eq!(history.search_prefix("grep", Direction::Backward), Some(0));
        assert_eq!(history.offset(), 3);
    }

    #[test]
    fn forward_search_from_position() {
        let mut history = sample();
        history.set_pos(0);
        assert_eq!(history.search("two", Direction::Forward), Some(5));
        assert_eq!(history.offset(), 2);
    }

    #[test]
    fn search_pos_restores_cursor() {
        let mut history = sample();
        assert_eq!(history.search_pos("echo", Direction::Backward, 1), Some(0));
        assert_eq!(history.offset(), 4);
    }

    #[test]
    fn pattern_search_wraps_with_stars() {
        let mut history = sample();
        assert_eq!(
            history.pattern_search("pattern", Direction::Backward, false),
            Some(0)
        );
        assert_eq!(history.offset(), 3);

        history.using_history();
        assert_eq!(
            history.pattern_search("make*", Direction::Backward, true),
            Some(0)
        );
        assert_eq!(history.offset(), 1);
    }

    #[test]
    fn pattern_with_trailing_backslash_fails_fast() {
        let mut history = sample();
        assert_eq!(
            history.pattern_search("echo\\", Direction::Backward, false),
            None
        );
    }
}
