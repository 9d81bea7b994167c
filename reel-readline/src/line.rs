//! The editable line buffer: text, point, and mark.

use crate::mbutil::{self, IncrementalDecoder};
use crate::undo::UndoList;

/// The line being edited. `point` is a byte offset into `buf` and is always
/// kept on a character boundary; `mark`, when set, is too.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: String,
    point: usize,
    mark: Option<usize>,
    pub(crate) decoder: IncrementalDecoder,
}

impl LineBuffer {
    /// The current contents.
    pub fn text(&self) -> &str {
        &self.buf
    }

    /// The insertion point, as a byte offset.
    pub const fn point(&self) -> usize {
        self.point
    }

    /// The mark, if one has been set.
    pub const fn mark(&self) -> Option<usize> {
        self.mark
    }

    /// Length of the line in bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the line is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Moves point, clamping into range and snapping back to a character
    /// boundary.
    pub fn set_point(&mut self, point: usize) {
        let mut point = point.min(self.buf.len());
        while point > 0 && !self.buf.is_char_boundary(point) {
            point -= 1;
        }
        self.point = point;
    }

    /// Sets or clears the mark (clamped like point).
    pub fn set_mark(&mut self, mark: Option<usize>) {
        self.mark = mark.map(|m| {
            let mut m = m.min(self.buf.len());
            while m > 0 && !self.buf.is_char_boundary(m) {
                m -= 1;
            }
            m
        });
    }

    /// Inserts `text` at point, recording undo and advancing point past the
    /// insertion.
    pub(crate) fn insert(&mut self, text: &str, undo: &mut UndoList) {
        if text.is_empty() {
            return;
        }
        let start = self.point;
        self.buf.insert_str(start, text);
        self.point = start + text.len();
        if let Some(mark) = self.mark {
            if mark >= start {
                self.mark = Some(mark + text.len());
            }
        }
        undo.record_insert(start, start + text.len());
    }

    /// Deletes the byte range `start..end`, recording undo. Returns the
    /// removed text. Point is left at `start` if it was inside or after the
    /// range.
    pub(crate) fn delete_range(
        &mut self,
        start: usize,
        end: usize,
        undo: &mut UndoList,
    ) -> String {
        let end = end.min(self.buf.len());
        let start = start.min(end);
        if start == end {
            return String::new();
        }

        let removed: String = self.buf[start..end].to_string();
        self.buf.replace_range(start..end, "");
        undo.record_delete(start, removed.clone());

        if self.point > end {
            self.point -= end - start;
        } else if self.point > start {
            self.point = start;
        }
        if let Some(mark) = self.mark {
            if mark > end {
                self.mark = Some(mark - (end - start));
            } else if mark > start {
                self.mark = Some(start);
            }
        }

        removed
    }

    /// Replaces the entire line without recording undo (history motion).
    pub(crate) fn replace_all(&mut self, text: &str) {
        self.buf.clear();
        self.buf.push_str(text);
        self.point = self.buf.len();
        self.mark = None;
        self.decoder.reset();
    }

    /// Clears the line entirely, including decoder state.
    pub(crate) fn reset(&mut self) {
        self.buf.clear();
        self.point = 0;
        self.mark = None;
        self.decoder.reset();
    }

    /// Directly exposes the underlying string to the undo machinery.
    pub(crate) fn buf_mut(&mut self) -> &mut String {
        &mut self.buf
    }

    /// Byte offset of the next character after point.
    #[allow(dead_code)]
    pub(crate) fn next_point(&self) -> usize {
        mbutil::find_next_char(&self.buf, self.point)
    }

    /// Byte offset of the character before point.
    pub(crate) fn prev_point(&self) -> usize {
        mbutil::find_prev_char(&self.buf, self.point)
    }

    /// End of the word forward from `from` (readline word rules: skip
    /// non-word characters, then take the word).
    pub(crate) fn forward_word_end(&self, from: usize, count: usize) -> usize {
        let mut pos = from;
        for _ in 0..count.max(1) {
            while pos < self.buf.len() {
                let c = mbutil::char_at(&self.buf, pos);
                if c.is_some_and(mbutil::walphabetic) {
                    break;
                }
                pos = mbutil::find_next_char(&self.buf, pos);
            }
            while pos < self.buf.len() {
                let c = mbutil::char_at(&self.buf, pos);
                if !c.is_some_and(mbutil::walphabetic) {
                    break;
                }
                pos = mbutil::find_next_char(&self.buf, pos);
            }
        }
        pos
    }

    /// Start of the word backward from `from`.
    pub(crate) fn backward_word_start(&self, from: usize, count: usize) -> usize {
        let mut pos = from;
        for _ in 0..count.max(1) {
            while pos > 0 {
                let prev = mbutil::find_prev_char(&self.buf, pos);
                if mbutil::char_at(&self.buf, prev).is_some_and(mbutil::walphabetic) {
                    break;
                }
                pos = prev;
            }
            while pos > 0 {
                let prev = mbutil::find_prev_char(&self.buf, pos);
                if !mbutil::char_at(&self.buf, prev).is_some_and(mbutil::walphabetic) {
                    break;
                }
                pos = prev;
            }
        }
        pos
    }

    /// Start of the whitespace-delimited word backward from `from`
    /// (unix-word-rubout rules).
    pub(crate) fn backward_unix_word_start(&self, from: usize) -> usize {
        let mut pos = from;
        while pos > 0 {
            let prev = mbutil::find_prev_char(&self.buf, pos);
            if !mbutil::char_at(&self.buf, prev).is_some_and(char::is_whitespace) {
                break;
            }
            pos = prev;
        }
        while pos > 0 {
            let prev = mbutil::find_prev_char(&self.buf, pos);
            if mbutil::char_at(&self.buf, prev).is_some_and(char::is_whitespace) {
                break;
            }
            pos = prev;
        }
        pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn insert_and_delete_maintain_point() {
        let mut undo = UndoList::default();
        let mut line = LineBuffer::default();

        line.insert("hello world", &mut undo);
        assert_eq!(line.point(), 11);

        line.set_point(5);
        line.insert(",", &mut undo);
        assert_eq!(line.text(), "hello, world");
        assert_eq!(line.point(), 6);

        let removed = line.delete_range(5, 6, &mut undo);
        assert_eq!(removed, ",");
        assert_eq!(line.text(), "hello world");
        assert_eq!(line.point(), 5);
    }

    #[test]
    fn point_snaps_to_char_boundary() {
        let mut undo = UndoList::default();
        let mut line = LineBuffer::default();
        line.insert("aé漢", &mut undo);

        line.set_point(2); // inside é
        assert_eq!(line.point(), 1);
        line.set_point(4); // inside 漢
        assert_eq!(line.point(), 3);
    }

    #[test]
    fn word_motion() {
        let mut undo = UndoList::default();
        let mut line = LineBuffer::default();
        line.insert("one two  three", &mut undo);

        assert_eq!(line.forward_word_end(0, 1), 3);
        assert_eq!(line.forward_word_end(3, 1), 7);
        assert_eq!(line.backward_word_start(14, 1), 9);
        assert_eq!(line.backward_word_start(9, 1), 4);
    }

    #[test]
    fn unix_word_rubout_boundary() {
        let mut undo = UndoList::default();
        let mut line = LineBuffer::default();
        line.insert("echo /usr/bin  ", &mut undo);
        assert_eq!(line.backward_unix_word_start(15), 5);
        assert_eq!(line.backward_unix_word_start(5), 0);
    }

    #[test]
    fn mark_follows_edits() {
        let mut undo = UndoList::default();
        let mut line = LineBuffer::default();
        line.insert("abcdef", &mut undo);
        line.set_mark(Some(4));

        line.set_point(0);
        line.insert("xy", &mut undo);
        assert_eq!(line.mark(), Some(6));

        line.delete_range(0, 2, &mut undo);
        assert_eq!(line.mark(), Some(4));
    }
}
