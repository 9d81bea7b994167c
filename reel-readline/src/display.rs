//! The display engine: rendering the prompt and edit line into screen rows,
//! differential updates against what the terminal currently shows, and
//! cursor motion.

use crate::mbutil;
use crate::prompt::PromptInfo;
use crate::terminal::Terminal;
use crate::trace_categories;

/// Face value for ordinary text.
const FACE_NORMAL: u8 = b'0';
/// Face value for standout (highlighted) text.
const FACE_STANDOUT: u8 = b'1';

const TAB_STOP: usize = 8;

/// What the renderer needs to know about the editor's state.
pub(crate) struct RenderParams<'a> {
    pub line: &'a str,
    pub point: usize,
    /// Byte range of the line to draw in standout (the active region).
    pub region: Option<(usize, usize)>,
    /// Whether the current history entry has been modified (drawn as a
    /// leading `*` when mark-modified-lines is on).
    pub modified: bool,
    pub output_meta: bool,
    pub mark_modified_lines: bool,
    pub horizontal_scroll: bool,
}

/// One screen row of rendered output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Row {
    /// The bytes this row shows, including any invisible prompt escapes.
    text: String,
    /// Per-byte face values, parallel to `text`.
    faces: Vec<u8>,
    /// Visible column count.
    cols: usize,
    /// Byte ranges of `text` that occupy no columns.
    invisible: Vec<std::ops::Range<usize>>,
}

impl Row {
    fn push_visible(&mut self, c: char, face: u8) {
        self.text.push(c);
        self.faces.resize(self.text.len(), face);
        self.cols += mbutil::char_width(c);
    }

    fn push_invisible_str(&mut self, s: &str) {
        let start = self.text.len();
        self.text.push_str(s);
        self.faces.resize(self.text.len(), FACE_NORMAL);
        self.invisible.push(start..self.text.len());
    }

    fn is_invisible_at(&self, offset: usize) -> bool {
        self.invisible.iter().any(|r| r.contains(&offset))
    }

    /// Byte offset at which `col` begins. Invisible bytes immediately
    /// preceding the column are included so a span written from the result
    /// re-emits any escape sequences.
    fn byte_at_col(&self, col: usize) -> usize {
        let mut cur = 0usize;
        let mut offset = 0usize;
        while offset < self.text.len() {
            if cur >= col {
                return offset;
            }
            if self.is_invisible_at(offset) {
                offset = mbutil::find_next_char(&self.text, offset);
                continue;
            }
            let c = mbutil::char_at(&self.text, offset).unwrap_or(' ');
            cur += mbutil::char_width(c);
            offset = mbutil::find_next_char(&self.text, offset);
        }
        self.text.len()
    }

    /// Visible columns before byte `offset`.
    fn col_of_byte(&self, target: usize) -> usize {
        let mut cur = 0usize;
        let mut offset = 0usize;
        while offset < self.text.len() && offset < target {
            if !self.is_invisible_at(offset) {
                let c = mbutil::char_at(&self.text, offset).unwrap_or(' ');
                cur += mbutil::char_width(c);
            }
            offset = mbutil::find_next_char(&self.text, offset);
        }
        cur
    }
}

/// A full rendering of the edit line: rows plus the cursor target.
#[derive(Clone, Debug, Default)]
pub(crate) struct Frame {
    rows: Vec<Row>,
    cursor_row: usize,
    cursor_col: usize,
}

/// Tracks what is on screen and updates it to match the editor state with
/// minimal output. Two framebuffers are kept: `visible` mirrors the
/// terminal, and each redisplay renders a fresh frame, diffs, and swaps.
pub(crate) struct Display {
    /// The expanded prompt in effect.
    pub prompt: PromptInfo,
    saved_prompt: Option<PromptInfo>,
    /// When set, shown in place of the prompt (incremental search status).
    message: Option<String>,
    visible: Frame,
    cursor_row: usize,
    cursor_col: usize,
    forced_redraw: bool,
    scroll_start: usize,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            prompt: PromptInfo::default(),
            saved_prompt: None,
            message: None,
            visible: Frame::default(),
            cursor_row: 0,
            cursor_col: 0,
            forced_redraw: true,
            scroll_start: 0,
        }
    }
}

impl Display {
    /// Installs a freshly expanded prompt.
    pub fn set_prompt(&mut self, prompt: PromptInfo) {
        self.prompt = prompt;
    }

    /// Starts a new line of output: nothing is known to be on screen.
    pub fn on_new_line(&mut self) {
        self.visible = Frame::default();
        self.cursor_row = 0;
        self.cursor_col = 0;
        self.forced_redraw = true;
        self.scroll_start = 0;
    }

    /// Shows `message` in place of the prompt until cleared.
    pub fn set_message(&mut self, message: String) {
        self.message = Some(message);
    }

    /// Clears any message, restoring the prompt display.
    pub fn clear_message(&mut self) {
        self.message = None;
    }

    /// Saves the prompt so a search can temporarily replace it.
    pub fn save_prompt(&mut self) {
        self.saved_prompt = Some(self.prompt.clone());
    }

    /// Restores the prompt saved by [`Display::save_prompt`].
    pub fn restore_prompt(&mut self) {
        if let Some(prompt) = self.saved_prompt.take() {
            self.prompt = prompt;
        }
    }

    /// Renders the current state and updates the terminal to match.
    pub fn redisplay(&mut self, term: &mut Terminal, params: &RenderParams<'_>) {
        let width = term.screen_width.max(2);
        let horizontal = params.horizontal_scroll || term.screen_height == 1;

        let new = if horizontal {
            let frame = self.render_horizontal(params, width);
            self.scroll_start = frame.1;
            frame.0
        } else {
            self.render(params, width)
        };

        if self.forced_redraw {
            if self.message.is_none() && !self.prompt.prefix.is_empty() {
                term.write_str(&self.prompt.prefix);
            }
            self.visible = Frame::default();
            self.cursor_row = 0;
            self.cursor_col = 0;
            self.forced_redraw = false;
        }

        let row_count = self.visible.rows.len().max(new.rows.len());
        for i in 0..row_count {
            let old_row = self.visible.rows.get(i).cloned().unwrap_or_default();
            let new_row = new.rows.get(i).cloned().unwrap_or_default();
            self.update_row(term, i, &old_row, &new_row);
        }

        self.move_to_row(term, new.cursor_row);
        let row = new.rows.get(new.cursor_row).cloned().unwrap_or_default();
        self.move_to_col(term, &row, new.cursor_col);

        self.visible = new;
        term.flush();
    }

    /// Moves the cursor past the end of the displayed line and emits a
    /// newline; called when a line is accepted.
    pub fn finish_line(&mut self, term: &mut Terminal) {
        let last = self.visible.rows.len().saturating_sub(1);
        self.move_to_row(term, last);
        if let Some(row) = self.visible.rows.get(last).cloned() {
            self.move_to_col(term, &row, row.cols);
        }
        term.write_str("\r\n");
        term.flush();
        self.on_new_line();
    }

    /// Rerenders everything from scratch (clear-screen, SIGWINCH).
    pub fn force_redraw(&mut self) {
        self.forced_redraw = true;
        self.visible = Frame::default();
        self.cursor_row = 0;
        self.cursor_col = 0;
    }

    fn prompt_source(&self) -> (String, Vec<std::ops::Range<usize>>) {
        if let Some(message) = &self.message {
            (message.clone(), vec![])
        } else {
            (self.prompt.text.clone(), self.prompt.invisible.clone())
        }
    }

    fn render(&self, params: &RenderParams<'_>, width: usize) -> Frame {
        let mut frame = Frame::default();
        let mut rows = vec![Row::default()];
        let mut cursor: Option<(usize, usize)> = None;

        let push_visible = |rows: &mut Vec<Row>, c: char, face: u8| {
            let w = mbutil::char_width(c);
            let row = rows.last_mut();
            if let Some(row) = row {
                if row.cols + w > width {
                    // A double-width character that would straddle the edge
                    // gets a padding space before the wrap.
                    if w == 2 && row.cols + 1 == width {
                        row.push_visible(' ', FACE_NORMAL);
                    }
                    rows.push(Row::default());
                }
            }
            if let Some(row) = rows.last_mut() {
                row.push_visible(c, face);
                if row.cols == width {
                    rows.push(Row::default());
                }
            }
        };

        if params.mark_modified_lines && params.modified {
            push_visible(&mut rows, '*', FACE_NORMAL);
        }

        let (prompt_text, prompt_invisible) = self.prompt_source();
        let mut offset = 0usize;
        for c in prompt_text.chars() {
            if prompt_invisible.iter().any(|r| r.contains(&offset)) {
                if let Some(row) = rows.last_mut() {
                    row.push_invisible_str(&prompt_text[offset..offset + c.len_utf8()]);
                }
            } else {
                push_visible(&mut rows, c, FACE_NORMAL);
            }
            offset += c.len_utf8();
        }

        for (offset, c) in params.line.char_indices() {
            if offset == params.point {
                let row = rows.len() - 1;
                cursor = Some((row, rows[row].cols));
            }

            let face = match params.region {
                Some((start, end)) if offset >= start && offset < end => FACE_STANDOUT,
                _ => FACE_NORMAL,
            };

            render_char(c, &mut rows, face, params.output_meta, &push_visible);
        }

        if params.point >= params.line.len() || cursor.is_none() {
            let row = rows.len() - 1;
            cursor = Some((row, rows[row].cols));
        }

        // Drop a trailing empty row left by an exact-width wrap, unless the
        // cursor sits on it.
        if rows.len() > 1
            && rows.last().is_some_and(|r| r.text.is_empty())
            && cursor.is_some_and(|(r, _)| r < rows.len() - 1)
        {
            rows.pop();
        }

        let (cursor_row, cursor_col) = cursor.unwrap_or((0, 0));
        frame.rows = rows;
        frame.cursor_row = cursor_row;
        frame.cursor_col = cursor_col;
        frame
    }

    /// Single-line rendering with a horizontal window. The cursor is kept
    /// around two thirds of the way across; `<` and `>` mark content off
    /// screen to either side. Returns the frame and the window start column.
    fn render_horizontal(&self, params: &RenderParams<'_>, width: usize) -> (Frame, usize) {
        // Lay everything out on one unbounded row first.
        let mut full = Row::default();
        let mut cursor_col = 0usize;

        let (prompt_text, prompt_invisible) = self.prompt_source();
        let mut offset = 0usize;
        for c in prompt_text.chars() {
            if prompt_invisible.iter().any(|r| r.contains(&offset)) {
                full.push_invisible_str(&prompt_text[offset..offset + c.len_utf8()]);
            } else {
                full.push_visible(c, FACE_NORMAL);
            }
            offset += c.len_utf8();
        }

        for (offset, c) in params.line.char_indices() {
            if offset == params.point {
                cursor_col = full.cols;
            }
            if c == '\t' {
                let spaces = TAB_STOP - (full.cols % TAB_STOP);
                for _ in 0..spaces {
                    full.push_visible(' ', FACE_NORMAL);
                }
                continue;
            }
            for rendered in rendered_chars(c, params.output_meta) {
                full.push_visible(rendered, FACE_NORMAL);
            }
        }
        if params.point >= params.line.len() {
            cursor_col = full.cols;
        }

        // Slide the window so the cursor stays visible.
        let mut start = self.scroll_start;
        if cursor_col < start + 1 || cursor_col >= start + width - 2 {
            start = cursor_col.saturating_sub(width * 2 / 3);
        }

        let mut row = Row::default();
        if start > 0 {
            row.push_visible('<', FACE_NORMAL);
        }
        let from = full.byte_at_col(start + usize::from(start > 0));
        let avail = width - 1 - usize::from(start > 0);
        let mut taken = 0usize;
        let mut offset = from;
        while offset < full.text.len() && taken < avail {
            if full.is_invisible_at(offset) {
                offset = mbutil::find_next_char(&full.text, offset);
                continue;
            }
            let c = mbutil::char_at(&full.text, offset).unwrap_or(' ');
            if taken + mbutil::char_width(c) > avail {
                break;
            }
            row.push_visible(c, FACE_NORMAL);
            taken += mbutil::char_width(c);
            offset = mbutil::find_next_char(&full.text, offset);
        }
        if offset < full.text.len() {
            row.push_visible('>', FACE_NORMAL);
        }

        let cursor_in_window = cursor_col - start + usize::from(start > 0);

        (
            Frame {
                rows: vec![row],
                cursor_row: 0,
                cursor_col: cursor_in_window,
            },
            start,
        )
    }

    fn update_row(&mut self, term: &mut Terminal, index: usize, old: &Row, new: &Row) {
        if old == new {
            return;
        }

        self.move_to_row(term, index);

        // Find the first difference, on a character boundary, considering
        // faces as well as bytes.
        let mut first = 0usize;
        let limit = old.text.len().min(new.text.len());
        while first < limit {
            let next = mbutil::find_next_char(&new.text, first);
            if old.text.as_bytes()[first..next.min(old.text.len())]
                != new.text.as_bytes()[first..next.min(new.text.len())]
                || old.faces.get(first) != new.faces.get(first)
                || old.is_invisible_at(first) != new.is_invisible_at(first)
            {
                break;
            }
            first = next;
        }

        if first >= old.text.len() && first >= new.text.len() {
            return;
        }

        // Pure insertion or deletion at the difference point lets us use the
        // terminal's insert/delete-character capabilities.
        if new.text.len() > old.text.len()
            && new.text.as_bytes()[new.text.len() - (old.text.len() - first)..]
                == old.text.as_bytes()[first..]
            && new.faces.iter().all(|f| *f == FACE_NORMAL)
            && old.faces.iter().all(|f| *f == FACE_NORMAL)
            && new.invisible.is_empty()
            && old.invisible.is_empty()
        {
            let inserted = &new.text[first..new.text.len() - (old.text.len() - first)];
            self.move_to_col(term, old, old.col_of_byte(first));
            if term.insert_bytes(inserted.as_bytes()) {
                self.cursor_col += mbutil::str_width(inserted);
                return;
            }
        } else if old.text.len() > new.text.len()
            && old.text.as_bytes()[old.text.len() - (new.text.len() - first)..]
                == new.text.as_bytes()[first..]
            && new.faces.iter().all(|f| *f == FACE_NORMAL)
            && old.faces.iter().all(|f| *f == FACE_NORMAL)
            && new.invisible.is_empty()
            && old.invisible.is_empty()
        {
            let deleted = &old.text[first..old.text.len() - (new.text.len() - first)];
            self.move_to_col(term, old, old.col_of_byte(first));
            let cols: usize = mbutil::str_width(deleted);
            if term.delete_chars(cols) {
                return;
            }
        }

        // Write through from the first difference, then erase any leftover
        // columns from the old row.
        self.move_to_col(term, old, old.col_of_byte(first).min(new.col_of_byte(first)));
        let start_col = self.cursor_col;
        let from = new.byte_at_col(start_col);
        self.write_span(term, new, from, new.text.len());

        if old.cols > new.cols {
            if !term.clear_to_eol() {
                let extra = old.cols - new.cols;
                for _ in 0..extra {
                    term.write_str(" ");
                }
                for _ in 0..extra {
                    term.write_bytes(b"\x08");
                }
            }
        }
    }

    fn write_span(&mut self, term: &mut Terminal, row: &Row, from: usize, to: usize) {
        let mut standout = false;
        let mut offset = from;
        while offset < to && offset < row.text.len() {
            let next = mbutil::find_next_char(&row.text, offset);
            let want = row.faces.get(offset) == Some(&FACE_STANDOUT);
            if want != standout {
                term.standout(want);
                standout = want;
            }
            term.write_str(&row.text[offset..next]);
            if !row.is_invisible_at(offset) {
                let c = mbutil::char_at(&row.text, offset).unwrap_or(' ');
                self.cursor_col += mbutil::char_width(c);
            }
            offset = next;
        }
        if standout {
            term.standout(false);
        }
    }

    fn move_to_row(&mut self, term: &mut Terminal, target: usize) {
        if target == self.cursor_row {
            return;
        }
        if target > self.cursor_row {
            term.carriage_return();
            self.cursor_col = 0;
            term.cursor_down(target - self.cursor_row);
        } else {
            let up = self.cursor_row - target;
            if !term.cursor_up(up) {
                // No cursor-up capability: reprint everything below.
                tracing::debug!(target: trace_categories::DISPLAY,
                    "terminal cannot move up; forcing redraw");
                term.write_str("\r\n");
                self.cursor_col = 0;
            }
        }
        self.cursor_row = target;
    }

    fn move_to_col(&mut self, term: &mut Terminal, row: &Row, target: usize) {
        if target == self.cursor_col {
            return;
        }

        if target < self.cursor_col {
            // Choose the cheaper of backing up and starting over.
            if target <= self.cursor_col - target {
                term.carriage_return();
                self.cursor_col = 0;
            } else {
                for _ in 0..(self.cursor_col - target) {
                    term.write_bytes(b"\x08");
                }
                self.cursor_col = target;
                return;
            }
        }

        if target > self.cursor_col {
            // Reprint the row's bytes between here and the target; this is
            // always correct, unlike parameterized motion, in the presence
            // of invisible prompt bytes.
            let from = row.byte_at_col(self.cursor_col);
            let to = row.byte_at_col(target);
            self.write_span(term, row, from, to);
            self.cursor_col = target;
        }
    }
}

/// Expands one line character into what the terminal should show.
fn rendered_chars(c: char, output_meta: bool) -> Vec<char> {
    match c {
        '\t' => vec![],
        c if (c as u32) < 0x20 => {
            #[allow(clippy::cast_possible_truncation)]
            let shown = (((c as u32) as u8) | 0x40) as char;
            vec!['^', shown]
        }
        '\u{7f}' => vec!['^', '?'],
        c if (c as u32) >= 0x80 && (c as u32) <= 0xff && !output_meta => {
            let byte = c as u32;
            vec![
                '\\',
                char::from_digit((byte >> 6) & 0x7, 8).unwrap_or('0'),
                char::from_digit((byte >> 3) & 0x7, 8).unwrap_or('0'),
                char::from_digit(byte & 0x7, 8).unwrap_or('0'),
            ]
        }
        c => vec![c],
    }
}

fn render_char(
    c: char,
    rows: &mut Vec<Row>,
    face: u8,
    output_meta: bool,
    push_visible: &impl Fn(&mut Vec<Row>, char, u8),
) {
    if c == '\t' {
        let col = rows.last().map_or(0, |r| r.cols);
        let spaces = TAB_STOP - (col % TAB_STOP);
        for _ in 0..spaces {
            push_visible(rows, ' ', face);
        }
        return;
    }

    for shown in rendered_chars(c, output_meta) {
        push_visible(rows, shown, face);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params(line: &str, point: usize) -> RenderParams<'_> {
        RenderParams {
            line,
            point,
            region: None,
            modified: false,
            output_meta: false,
            mark_modified_lines: false,
            horizontal_scroll: false,
        }
    }

    fn display_with_prompt(prompt: &str, width: usize) -> Display {
        let mut display = Display::default();
        display.set_prompt(PromptInfo::expand(prompt, width, None));
        display
    }

    #[test]
    fn render_wraps_at_screen_width() {
        let display = display_with_prompt("$ ", 10);
        let frame = display.render(&params("abcdefghijkl", 12), 10);

        assert_eq!(frame.rows.len(), 2);
        assert_eq!(frame.rows[0].text, "$ abcdefgh");
        assert_eq!(frame.rows[1].text, "ijkl");
        assert_eq!(frame.cursor_row, 1);
        assert_eq!(frame.cursor_col, 4);
    }

    #[test]
    fn control_characters_render_as_caret_forms() {
        let display = display_with_prompt("", 40);
        let frame = display.render(&params("a\u{1}b\u{7f}", 4), 40);
        assert_eq!(frame.rows[0].text, "a^Ab^?");
    }

    #[test]
    fn tabs_advance_to_the_next_stop() {
        let display = display_with_prompt("", 40);
        let frame = display.render(&params("ab\tc", 4), 40);
        assert_eq!(frame.rows[0].text, "ab      c");
        // Point after the tab lands on column 8.
        let frame = display.render(&params("ab\tc", 3), 40);
        assert_eq!(frame.cursor_col, 8);
    }

    #[test]
    fn meta_bytes_render_octal_when_output_meta_off() {
        let display = display_with_prompt("", 40);
        let frame = display.render(&params("\u{e9}", 2), 40);
        assert_eq!(frame.rows[0].text, "\\351");
    }

    #[test]
    fn invisible_prompt_bytes_take_no_columns() {
        let display = display_with_prompt("\u{1}\u{1b}[1m\u{2}$ ", 10);
        let frame = display.render(&params("abc", 0), 10);
        let row = &frame.rows[0];
        assert_eq!(row.cols, 5); // "$ abc"
        assert_eq!(frame.cursor_col, 2);
        assert!(row.text.starts_with("\u{1b}[1m"));
    }

    #[test]
    fn double_width_chars_pad_at_the_edge() {
        let display = display_with_prompt("", 5);
        // Three two-column chars: the third cannot straddle column 5.
        let frame = display.render(&params("漢漢漢", 9), 5);
        assert_eq!(frame.rows[0].text, "漢漢 ");
        assert_eq!(frame.rows[1].text, "漢");
    }

    #[test]
    fn horizontal_scroll_marks_clipped_content() {
        let display = display_with_prompt("$ ", 10);
        let line = "abcdefghijklmnopqrstuvwxyz";
        let (frame, start) = display.render_horizontal(&params(line, line.len()), 10);
        let row = &frame.rows[0];
        assert!(start > 0);
        assert!(row.text.starts_with('<'));
        assert!(!row.text.contains('>'));

        let (frame, start) = display.render_horizontal(&params(line, 0), 10);
        let row = &frame.rows[0];
        assert_eq!(start, 0);
        assert!(row.text.ends_with('>'));
    }

    #[test]
    fn row_column_byte_round_trip() {
        let mut row = Row::default();
        row.push_invisible_str("\u{1b}[m");
        row.push_visible('a', FACE_NORMAL);
        row.push_visible('漢', FACE_NORMAL);
        row.push_visible('b', FACE_NORMAL);

        assert_eq!(row.cols, 4);
        assert_eq!(row.col_of_byte(row.byte_at_col(1)), 1);
        // Column 2 is inside the wide char; it resolves to its start.
        assert_eq!(row.byte_at_col(3), row.byte_at_col(1) + '漢'.len_utf8());
    }
}
