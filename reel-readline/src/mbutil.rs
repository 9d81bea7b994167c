//! Multibyte character helpers shared by the line buffer and the display.

use unicode_width::UnicodeWidthChar;

/// Returns the byte offset of the start of the character after the one at
/// `seed`; `s.len()` when already at or past the end.
pub(crate) fn find_next_char(s: &str, seed: usize) -> usize {
    if seed >= s.len() {
        return s.len();
    }
    let mut i = seed + 1;
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// Returns the byte offset of the start of the character before `seed`; 0
/// when already at the start.
pub(crate) fn find_prev_char(s: &str, seed: usize) -> usize {
    if seed == 0 {
        return 0;
    }
    let mut i = seed.min(s.len()) - 1;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Like [`find_next_char`], but skips over zero-width (combining)
/// characters so the result begins a character cell.
pub(crate) fn find_next_nonzero_char(s: &str, seed: usize) -> usize {
    let mut i = find_next_char(s, seed);
    while i < s.len() {
        let c = char_at(s, i);
        if c.is_none_or(|c| c.width().unwrap_or(1) > 0) {
            break;
        }
        i = find_next_char(s, i);
    }
    i
}

/// The character starting at byte offset `index`, if `index` is a boundary.
pub(crate) fn char_at(s: &str, index: usize) -> Option<char> {
    s.get(index..)?.chars().next()
}

/// Display width of a single character: 0 for combining characters, 1 or 2
/// otherwise. Control characters are the renderer's problem, not ours.
pub(crate) fn char_width(c: char) -> usize {
    c.width().unwrap_or(1)
}

/// Display width of a string slice.
pub(crate) fn str_width(s: &str) -> usize {
    s.chars().map(char_width).sum()
}

/// Whether a character is word-constituent for search and word motion.
pub(crate) fn walphabetic(c: char) -> bool {
    c.is_alphanumeric()
}

/// Incremental decoder for keyboard input arriving a byte at a time. The
/// decoder's state lives with the line buffer and is reset whenever input is
/// interrupted mid-character.
#[derive(Debug, Default)]
pub(crate) struct IncrementalDecoder {
    pending: Vec<u8>,
}

/// Result of feeding one byte to the decoder.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Decoded {
    /// More bytes are needed to complete the character.
    Pending,
    /// A complete character was decoded.
    Char(char),
    /// The accumulated bytes do not form a valid character; the decoder has
    /// been reset. The sequence displays as a single-column replacement.
    Invalid,
}

impl IncrementalDecoder {
    const fn expected_len(first: u8) -> usize {
        match first {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => 1,
        }
    }

    /// Feeds one byte.
    pub fn push(&mut self, byte: u8) -> Decoded {
        if self.pending.is_empty() {
            if byte < 0x80 {
                return Decoded::Char(byte as char);
            }
            if Self::expected_len(byte) == 1 {
                // A continuation or overlong-lead byte with nothing pending.
                return Decoded::Invalid;
            }
            self.pending.push(byte);
            return Decoded::Pending;
        }

        if byte & 0xC0 != 0x80 {
            // Not a continuation byte; the pending sequence is broken.
            self.pending.clear();
            // The new byte still deserves a chance on its own.
            return match self.push(byte) {
                Decoded::Pending => Decoded::Invalid,
                other => other,
            };
        }

        self.pending.push(byte);
        if self.pending.len() == Self::expected_len(self.pending[0]) {
            let result = match std::str::from_utf8(&self.pending) {
                Ok(s) => s.chars().next().map_or(Decoded::Invalid, Decoded::Char),
                Err(_) => Decoded::Invalid,
            };
            self.pending.clear();
            return result;
        }

        Decoded::Pending
    }

    /// Whether a partial character is buffered.
    pub const fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Discards any partial character.
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn boundaries() {
        let s = "aé漢b";
        assert_eq!(find_next_char(s, 0), 1);
        assert_eq!(find_next_char(s, 1), 3); // é is two bytes
        assert_eq!(find_next_char(s, 3), 6); // 漢 is three bytes
        assert_eq!(find_prev_char(s, 6), 3);
        assert_eq!(find_prev_char(s, 3), 1);
        assert_eq!(find_prev_char(s, 0), 0);
    }

    #[test]
    fn widths() {
        assert_eq!(char_width('a'), 1);
        assert_eq!(char_width('漢'), 2);
        assert_eq!(char_width('\u{0301}'), 0); // combining acute
        assert_eq!(str_width("a漢"), 3);
    }

    #[test]
    fn decoder_handles_multibyte() {
        let mut decoder = IncrementalDecoder::default();
        assert_eq!(decoder.push(b'a'), Decoded::Char('a'));

        let bytes = "é".as_bytes();
        assert_eq!(decoder.push(bytes[0]), Decoded::Pending);
        assert_eq!(decoder.push(bytes[1]), Decoded::Char('é'));

        let bytes = "漢".as_bytes();
        assert_eq!(decoder.push(bytes[0]), Decoded::Pending);
        assert_eq!(decoder.push(bytes[1]), Decoded::Pending);
        assert_eq!(decoder.push(bytes[2]), Decoded::Char('漢'));
    }

    #[test]
    fn decoder_recovers_from_invalid_bytes() {
        let mut decoder = IncrementalDecoder::default();
        assert_eq!(decoder.push(0x80), Decoded::Invalid);

        // A broken two-byte sequence followed by ASCII.
        assert_eq!(decoder.push(0xC3), Decoded::Pending);
        assert_eq!(decoder.push(b'x'), Decoded::Char('x'));
        assert!(!decoder.has_pending());
    }
}
