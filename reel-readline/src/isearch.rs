//! Incremental history search (`C-r` / `C-s`).

use std::time::Duration;

use crate::commands::Command;
use crate::editor::Editor;
use crate::error::Error;
use crate::keymap::{ESC, RUBOUT, Slot, ctrl};
use crate::mbutil::{self, Decoded, IncrementalDecoder};
use crate::terminal::BRACKETED_PASTE_PREFIX;
use crate::trace_categories;

const OP_SEARCH_AGAIN: i64 = -1;
const OP_FLIP: i64 = -2;
const OP_RUBOUT: i64 = -3;
const OP_ABORT: i64 = -4;
const OP_YANK_WORD: i64 = -5;
const OP_YANK_LINE: i64 = -6;
const OP_PASTE: i64 = -7;

/// Keys that end the search and then execute normally: control and meta
/// characters other than `C-g`.
fn ends_search(key: u8) -> bool {
    (key < 0x20 || key >= 0x80 || key == RUBOUT) && key != ctrl(b'G')
}

/// Search state, created on entry and destroyed on commit or abort.
struct SearchContext {
    direction: i64,
    reverse: bool,
    failed: bool,
    search_string: String,
    /// Snapshot of every line we search: the history plus the edit line.
    lines: Vec<String>,
    save_line: usize,
    save_point: usize,
    save_mark: Option<usize>,
    history_pos: usize,
    last_found_line: usize,
    sline_index: i64,
    prev_line_found: Option<String>,
    /// Non-empty when dispatch transiently descended into a submap.
    keymap_prefix: Vec<u8>,
    prev_key: u8,
    decoder: IncrementalDecoder,
    pending_command: Option<(Command, u8)>,
}

impl Editor {
    /// Runs an incremental search; `direction` < 0 searches backward.
    pub(crate) fn isearch(&mut self, direction: i64) -> Result<(), Error> {
        let mut cxt = self.isearch_init(direction);
        self.isearch_display(&cxt);

        let outcome = loop {
            let Some(key) = self.input.read_key()? else {
                break -1;
            };
            if let Some(result) = self.check_signals()? {
                // A signal cancels the search and restores the saved line.
                let _ = result;
                break -1;
            }
            let r = self.isearch_dispatch(&mut cxt, key)?;
            if r <= 0 {
                break r;
            }
        };

        if outcome < 0 {
            self.isearch_abort(&cxt);
        } else {
            self.isearch_commit(&cxt);
            if let Some((command, key)) = cxt.pending_command.take() {
                self.redisplay();
                let count = self.take_count();
                self.execute_command(command, count, key)?;
            }
        }

        Ok(())
    }

    fn isearch_init(&mut self, direction: i64) -> SearchContext {
        let mut lines: Vec<String> = self.history.iter().map(|e| e.line.clone()).collect();
        let save_line = self.history.offset().min(lines.len());
        if save_line == lines.len() {
            lines.push(self.line.text().to_string());
        } else {
            // The entry may have been edited in place; search what is shown.
            lines[save_line] = self.line.text().to_string();
        }

        self.display.save_prompt();

        SearchContext {
            direction: if direction < 0 { -1 } else { 1 },
            reverse: direction < 0,
            failed: false,
            search_string: String::new(),
            lines,
            save_line,
            save_point: self.line.point(),
            save_mark: self.line.mark(),
            history_pos: save_line,
            last_found_line: save_line,
            sline_index: i64::try_from(self.line.point()).unwrap_or(0),
            prev_line_found: None,
            keymap_prefix: vec![],
            prev_key: 0,
            decoder: IncrementalDecoder::default(),
            pending_command: None,
        }
    }

    fn isearch_display(&mut self, cxt: &SearchContext) {
        let mut message = String::from("(");
        if cxt.failed {
            message.push_str("failed ");
        }
        if cxt.reverse {
            message.push_str("reverse-");
        }
        message.push_str("i-search)`");
        message.push_str(&cxt.search_string);
        message.push_str("': ");

        self.display.set_message(message);
        self.redisplay();
    }

    fn isearch_abort(&mut self, cxt: &SearchContext) {
        self.line.replace_all(&cxt.lines[cxt.save_line]);
        self.line.set_point(cxt.save_point);
        self.line.set_mark(cxt.save_mark);
        self.region_active = false;
        self.history.set_pos(cxt.save_line.min(self.history.len()));
        self.display.clear_message();
        self.display.restore_prompt();
        self.redisplay();
    }

    fn isearch_commit(&mut self, cxt: &SearchContext) {
        self.display.clear_message();
        self.display.restore_prompt();

        if !cxt.search_string.is_empty() {
            self.last_isearch_string = cxt.search_string.clone();
        }

        let target = cxt.last_found_line;
        if target != cxt.save_line {
            if cxt.save_line >= self.history.len() {
                self.saved_line_for_history = Some(cxt.lines[cxt.save_line].clone());
            }
            self.history.set_pos(target.min(self.history.len()));
        }
        self.line.replace_all(&cxt.lines[target]);

        let point = if cxt.sline_index < 0 {
            if cxt.last_found_line == cxt.save_line {
                cxt.save_point
            } else {
                self.line.len()
            }
        } else {
            usize::try_from(cxt.sline_index).unwrap_or(0)
        };
        self.line.set_point(point);
        self.line.set_mark(cxt.save_mark);
        self.region_active = false;
        self.redisplay();
    }

    /// Reads ahead to see whether a bracketed paste follows an ESC that
    /// would otherwise terminate the search.
    fn try_read_paste_prefix(&mut self) -> Result<bool, Error> {
        let rest = &BRACKETED_PASTE_PREFIX[1..];
        let mut consumed = vec![];
        for expected in rest {
            match self.input.read_key()? {
                Some(key) if key == *expected => consumed.push(key),
                Some(key) => {
                    self.input.unget(key);
                    for b in consumed.into_iter().rev() {
                        self.input.unget(b);
                    }
                    return Ok(false);
                }
                None => {
                    for b in consumed.into_iter().rev() {
                        self.input.unget(b);
                    }
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Processes one key. Returns 1 to keep reading, 0 to commit, -1 to
    /// abort.
    #[allow(clippy::too_many_lines)]
    fn isearch_dispatch(&mut self, cxt: &mut SearchContext, key: u8) -> Result<i64, Error> {
        let terminators = self.vars.isearch_terminators.clone();
        let mut opcode = i64::from(key);

        // A bracketed paste may arrive even when ESC terminates searches.
        if key == ESC
            && self.vars.enable_bracketed_paste
            && terminators.contains(&ESC)
            && (self.input.pushed_available() || self.input.available()?)
            && self.try_read_paste_prefix()?
        {
            opcode = OP_PASTE;
        }

        if opcode == i64::from(key) {
            // Moving into a new keymap: remember it and read another key,
            // unless a timeout says to treat the prefix as a plain key.
            if matches!(
                self.active_slot(&cxt.keymap_prefix, key),
                Slot::Submap(_)
            ) && !terminators.contains(&key)
            {
                let mut sub = cxt.keymap_prefix.clone();
                sub.push(key);
                let timeout = self.keyseq_timeout();
                let shadowed = !matches!(self.active_slot_any(&sub), Slot::Unbound);
                if timeout.is_zero()
                    || self.input.pushed_available()
                    || !shadowed
                    || self.input.queued(timeout)?
                {
                    cxt.keymap_prefix = sub;
                    cxt.prev_key = key;
                    return Ok(1);
                }
            }

            // Translate keys bound to commands that affect the search.
            let command = self.resolve_command(&cxt.keymap_prefix, key);
            opcode = match command {
                Some(Command::ReverseSearchHistory) => {
                    if cxt.reverse { OP_SEARCH_AGAIN } else { OP_FLIP }
                }
                Some(Command::ForwardSearchHistory) => {
                    if cxt.reverse { OP_FLIP } else { OP_SEARCH_AGAIN }
                }
                Some(Command::BackwardDeleteChar) => OP_RUBOUT,
                Some(Command::Abort) => OP_ABORT,
                Some(Command::BracketedPasteBegin) => OP_PASTE,
                Some(Command::UnixWordRubout) if key == ctrl(b'W') => OP_YANK_WORD,
                Some(Command::Yank) if key == ctrl(b'Y') => OP_YANK_LINE,
                _ if key == ctrl(b'G') => OP_ABORT,
                _ if key == ctrl(b'W') => OP_YANK_WORD,
                _ if key == ctrl(b'Y') => OP_YANK_LINE,
                _ => opcode,
            };

            // If we had descended into a submap, restore it now that the
            // sequence resolved.
            if !cxt.keymap_prefix.is_empty() {
                let prev_key = cxt.prev_key;
                cxt.keymap_prefix.clear();

                if opcode > 0 && ends_search(prev_key) {
                    // The prefix would have ended the search: do that, and
                    // arrange for prefix + key to execute as commands.
                    self.input.unget(key);
                    self.input.unget(prev_key);
                    return Ok(0);
                } else if opcode > 0 && command.is_none_or(|c| c == Command::SelfInsert) {
                    // Neither byte resolved to an editing command: both
                    // join the search string.
                    self.input.unget(key);
                    opcode = i64::from(prev_key);
                } else if opcode > 0 {
                    if let Some(command) = command {
                        // The full sequence maps to an editing command:
                        // commit, then run it.
                        cxt.pending_command = Some((command, key));
                        return Ok(0);
                    }
                }
            }
        }

        // Terminator keys end the search; ESC only if no input follows
        // within a short window (it may start an arrow-key sequence).
        if opcode > 0 && terminators.contains(&key) {
            if key == ESC
                && (self.input.pushed_available()
                    || self.input.queued(Duration::from_millis(100))?)
            {
                self.input.unget(ESC);
            }
            return Ok(0);
        }

        // Multibyte input: collect continuation bytes into a character.
        let mut decoded_char: Option<char> = None;
        if opcode > 0 {
            if !self.vars.byte_oriented && (key >= 0x80 || cxt.decoder.has_pending()) {
                match cxt.decoder.push(key) {
                    Decoded::Pending => return Ok(1),
                    Decoded::Char(c) => decoded_char = Some(c),
                    Decoded::Invalid => decoded_char = Some('\u{fffd}'),
                }
            } else if ends_search(key) {
                self.input.unget(key);
                return Ok(0);
            }
        }

        match opcode {
            OP_SEARCH_AGAIN => {
                if cxt.search_string.is_empty() {
                    if self.last_isearch_string.is_empty() {
                        return Ok(1);
                    }
                    cxt.search_string = self.last_isearch_string.clone();
                    self.isearch_display(cxt);
                } else if cxt.reverse && cxt.sline_index >= 0 {
                    cxt.sline_index -= 1;
                } else {
                    let len = i64::try_from(cxt.lines[cxt.history_pos].len()).unwrap_or(0);
                    if cxt.sline_index != len {
                        cxt.sline_index += 1;
                    } else {
                        self.ding();
                    }
                }
            }
            OP_FLIP => {
                cxt.direction = -cxt.direction;
                cxt.reverse = cxt.direction < 0;
            }
            OP_RUBOUT => {
                if cxt.search_string.is_empty() {
                    self.ding();
                } else {
                    let new_len =
                        mbutil::find_prev_char(&cxt.search_string, cxt.search_string.len());
                    cxt.search_string.truncate(new_len);
                    if cxt.search_string.is_empty() {
                        self.ding();
                    }
                }
            }
            OP_ABORT => return Ok(-1),
            OP_YANK_WORD => {
                // Yank the next word of the current line into the search.
                let line = self.line.text().to_string();
                let start = self.line.point() + cxt.search_string.len();
                if start >= line.len()
                    || !mbutil::char_at(&line, start).is_some_and(mbutil::walphabetic)
                {
                    self.ding();
                } else {
                    let mut end = mbutil::find_next_nonzero_char(&line, start);
                    while end < line.len()
                        && mbutil::char_at(&line, end).is_some_and(mbutil::walphabetic)
                    {
                        end = mbutil::find_next_nonzero_char(&line, end);
                    }
                    cxt.search_string.push_str(&line[start..end]);
                }
            }
            OP_YANK_LINE => {
                let line = self.line.text().to_string();
                let start = self.line.point() + cxt.search_string.len();
                if start >= line.len() {
                    self.ding();
                } else {
                    cxt.search_string.push_str(&line[start..]);
                }
            }
            OP_PASTE => {
                let paste = self.read_bracketed_paste()?;
                if !paste.is_empty() {
                    cxt.search_string.push_str(&paste);
                }
            }
            _ => {
                if let Some(c) = decoded_char {
                    cxt.search_string.push(c);
                } else {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    cxt.search_string.push((opcode as u8) as char);
                }
            }
        }

        self.isearch_search(cxt);
        Ok(1)
    }

    /// The core search: scan the current line, then walk line to line in
    /// the current direction.
    fn isearch_search(&mut self, cxt: &mut SearchContext) {
        cxt.failed = false;
        let mut found = false;

        loop {
            if cxt.search_string.is_empty() {
                cxt.failed = true;
                break;
            }

            let sline = cxt.lines[cxt.history_pos].clone();
            let needle = cxt.search_string.as_bytes();
            let hay = sline.as_bytes();
            let limit = i64::try_from(hay.len()).unwrap_or(0)
                - i64::try_from(needle.len()).unwrap_or(0)
                + 1;

            while if cxt.reverse {
                cxt.sline_index >= 0
            } else {
                cxt.sline_index < limit
            } {
                #[allow(clippy::cast_sign_loss)]
                let at = cxt.sline_index.max(0) as usize;
                if hay[at..].starts_with(needle) {
                    found = true;
                    break;
                }
                cxt.sline_index += cxt.direction;
                if cxt.sline_index < 0 {
                    cxt.sline_index = 0;
                    break;
                }
            }

            if found {
                break;
            }

            // Move to the next line, skipping duplicates of the line just
            // found and lines shorter than the search string.
            loop {
                let at_limit = if cxt.reverse {
                    cxt.history_pos == 0
                } else {
                    cxt.history_pos + 1 == cxt.lines.len()
                };
                if at_limit {
                    cxt.failed = true;
                    break;
                }

                cxt.history_pos = if cxt.reverse {
                    cxt.history_pos - 1
                } else {
                    cxt.history_pos + 1
                };

                let candidate = &cxt.lines[cxt.history_pos];
                let dup = cxt.prev_line_found.as_deref() == Some(candidate.as_str());
                if !dup && cxt.search_string.len() <= candidate.len() {
                    break;
                }
            }

            if cxt.failed {
                break;
            }

            cxt.sline_index = if cxt.reverse {
                i64::try_from(cxt.lines[cxt.history_pos].len() - cxt.search_string.len())
                    .unwrap_or(0)
            } else {
                0
            };
        }

        if cxt.failed {
            tracing::debug!(target: trace_categories::INPUT,
                "isearch failed for '{}'", cxt.search_string);
            self.ding();
            cxt.history_pos = cxt.last_found_line;
            self.isearch_display(cxt);
            return;
        }

        cxt.prev_line_found = Some(cxt.lines[cxt.history_pos].clone());
        let text = cxt.lines[cxt.history_pos].clone();
        self.line.replace_all(&text);
        #[allow(clippy::cast_sign_loss)]
        self.line.set_point(cxt.sline_index.max(0) as usize);
        cxt.last_found_line = cxt.history_pos;
        self.isearch_display(cxt);
    }

    fn active_slot(&self, prefix: &[u8], key: u8) -> Slot {
        let mut seq = prefix.to_vec();
        seq.push(key);
        self.keymaps
            .root(&self.active_keymap)
            .map_or(Slot::Unbound, |map| map.lookup(&seq).clone())
    }

    fn active_slot_any(&self, prefix: &[u8]) -> Slot {
        self.keymaps
            .root(&self.active_keymap)
            .and_then(|map| map.submap_at(prefix))
            .map_or(Slot::Unbound, |map| {
                map.slot(crate::keymap::ANYOTHERKEY).clone()
            })
    }

    fn resolve_command(&self, prefix: &[u8], key: u8) -> Option<Command> {
        match self.active_slot(prefix, key) {
            Slot::Command(Command::DoLowercaseVersion) => {
                match self.active_slot(prefix, key.to_ascii_lowercase()) {
                    Slot::Command(command) => Some(command),
                    _ => None,
                }
            }
            Slot::Command(command) => Some(command),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::ReadResult;
    use crate::editor::test_support::editor_with_input;
    use pretty_assertions::assert_eq;

    fn editor_with_history(input: &[u8]) -> Editor {
        let mut editor = editor_with_input(input.to_vec());
        for line in ["echo one", "echo two", "echo three"] {
            editor.history_mut().add(line);
        }
        editor
    }

    #[test]
    fn reverse_search_finds_and_commits() {
        // C-r, "tw", C-j commits the search; RET accepts the line.
        let mut editor = editor_with_history(b"\x12tw\n\r");
        let result = editor.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Input("echo two".to_string()));
    }

    #[test]
    fn abort_restores_line_and_position() {
        // Type something, search, then C-g; the original line comes back.
        let mut editor = editor_with_history(b"draft\x12tw\x07\r");
        let result = editor.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Input("draft".to_string()));
        assert_eq!(editor.history().offset(), editor.history().len());
    }

    #[test]
    fn repeated_search_moves_to_older_match() {
        // C-r e C-r C-r: "e" matches "echo three" first, then older lines.
        let mut editor = editor_with_history(b"\x12echo\x12\n\r");
        let result = editor.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Input("echo two".to_string()));
    }

    #[test]
    fn rubout_shrinks_search_string() {
        // Search for "tw", rub one char out; the shortened search still
        // anchors on the same match when committed.
        let mut editor = editor_with_history(b"\x12tw\x7f\n\r");
        let result = editor.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Input("echo two".to_string()));
    }

    #[test]
    fn empty_search_reuses_last_string() {
        let mut editor = editor_with_history(b"\x12tw\n\r");
        let result = editor.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Input("echo two".to_string()));

        // A new search with an immediate repeat reuses "tw".
        let mut editor2 = editor_with_history(b"\x12\x12\n\r");
        editor2.last_isearch_string = "tw".to_string();
        let result = editor2.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Input("echo two".to_string()));
    }

    #[test]
    fn ending_key_commits_and_executes() {
        // C-r "two" then C-a: search ends, cursor moves to line start, and
        // typing continues there.
        let mut editor = editor_with_history(b"\x12two\x01X\r");
        let result = editor.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Input("Xecho two".to_string()));
    }
}
