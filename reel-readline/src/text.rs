//! Implementations of the editing commands.

use reel_history::{Direction, Expansion};

use crate::commands::Command;
use crate::editor::{Editor, Finished};
use crate::error::Error;
use crate::keymap::RUBOUT;
use crate::kill::KillMode;
use crate::mbutil::{self, Decoded};
use crate::options::EditingMode;
use crate::terminal::BRACKETED_PASTE_SUFFIX;
use crate::trace_categories;

impl Editor {
    /// Runs one editing command with the given count and invoking key.
    #[allow(clippy::too_many_lines)]
    pub(crate) fn execute_command(
        &mut self,
        command: Command,
        count: i64,
        key: u8,
    ) -> Result<(), Error> {
        use Command as C;

        tracing::trace!(target: trace_categories::INPUT,
            "executing {command} (count {count}, key {key:#04x})");

        match command {
            C::Abort => self.cmd_abort(),
            C::AcceptLine => self.finished = Some(Finished::Accepted),
            C::BackwardChar => self.move_chars(-count),
            C::BackwardDeleteChar => self.delete_chars_cmd(-count)?,
            C::BackwardKillLine => self.kill_range_to(0, KillMode::Prepend),
            C::BackwardKillWord => self.kill_word_cmd(-count),
            C::BackwardWord => {
                let target = self.backward_word_target(count.unsigned_abs());
                self.line.set_point(target);
            }
            C::BeginningOfHistory => self.history_move_to(0),
            C::BeginningOfLine => self.line.set_point(0),
            C::BracketedPasteBegin => self.cmd_bracketed_paste()?,
            C::CapitalizeWord => self.case_word(count, CaseOp::Capitalize),
            C::ClearDisplay | C::ClearScreen => {
                if !self.term.clear_screen() {
                    self.term.write_str("\r\n");
                }
                self.display.force_redraw();
            }
            C::CopyRegionAsKill => self.region_kill(false),
            C::DeleteChar => self.delete_chars_cmd(count)?,
            C::DeleteHorizontalSpace => self.cmd_delete_horizontal_space(),
            C::DigitArgument => self.cmd_digit_argument(key)?,
            C::DoLowercaseVersion => {} // handled by dispatch
            C::DowncaseWord => self.case_word(count, CaseOp::Down),
            C::DumpFunctions => self.cmd_dump_functions(),
            C::DumpMacros => self.cmd_dump_macros(),
            C::DumpVariables => self.cmd_dump_variables(),
            C::EmacsEditingMode => {
                self.vars.editing_mode = EditingMode::Emacs;
                self.active_keymap = "emacs".to_string();
            }
            C::EndOfHistory => self.history_move_to(self.history.len()),
            C::EndOfLine => self.line.set_point(self.line.len()),
            C::ExchangePointAndMark => {
                if let Some(mark) = self.line.mark() {
                    let point = self.line.point();
                    self.line.set_point(mark);
                    self.line.set_mark(Some(point));
                } else {
                    self.ding();
                }
            }
            C::ForwardBackwardDeleteChar => {
                if self.line.point() == self.line.len() {
                    self.delete_chars_cmd(-count)?;
                } else {
                    self.delete_chars_cmd(count)?;
                }
            }
            C::ForwardChar => self.move_chars(count),
            C::ForwardSearchHistory => self.isearch(1)?,
            C::ForwardWord => {
                let target = self
                    .line
                    .forward_word_end(self.line.point(), count_to_usize(count));
                self.line.set_point(target);
            }
            C::HistoryExpandLine => self.cmd_history_expand_line(),
            C::HistorySearchBackward => self.history_prefix_search(Direction::Backward),
            C::HistorySearchForward => self.history_prefix_search(Direction::Forward),
            C::InsertComment => {
                let comment = self.vars.comment_begin.clone();
                let point = self.line.point();
                self.line.set_point(0);
                self.line.insert(&comment, &mut self.undo);
                self.line.set_point(point + comment.len());
                self.note_modification();
                self.finished = Some(Finished::Accepted);
            }
            C::KillLine => self.kill_range_to(self.line.len(), KillMode::Append),
            C::KillRegion => self.region_kill(true),
            C::KillWholeLine => {
                self.line.set_point(self.line.len());
                self.kill_range_to(0, KillMode::Prepend);
            }
            C::KillWord => self.kill_word_cmd(count),
            C::NextHistory => self.history_step(count),
            C::NonIncrementalForwardSearchHistory => {
                self.noninc_search(Direction::Forward)?;
            }
            C::NonIncrementalReverseSearchHistory => {
                self.noninc_search(Direction::Backward)?;
            }
            C::OperateAndGetNext => {
                self.finished = Some(Finished::Accepted);
                // Start the next read-line on the entry after this one.
                let next = self.history.offset().saturating_add(1).min(self.history.len());
                self.operate_next = Some(next.min(self.history.len()));
            }
            C::PreviousHistory => self.history_step(-count),
            C::QuotedInsert => self.cmd_quoted_insert(count)?,
            C::ReReadInitFile => {
                let _ = self.read_init_file(None);
            }
            C::RedrawCurrentLine => self.display.force_redraw(),
            C::ReverseSearchHistory => self.isearch(-1)?,
            C::RevertLine => {
                while self.undo.undo(self.line.buf_mut()).is_some() {}
                let len = self.line.len();
                self.line.set_point(len);
            }
            C::SelfInsert => self.cmd_self_insert(count, key),
            C::SetMark => self.line.set_mark(Some(self.line.point())),
            C::TabInsert => self.insert_text_counted("\t", count),
            C::TransposeChars => self.cmd_transpose_chars(),
            C::TransposeWords => self.cmd_transpose_words(),
            C::Undo => {
                if let Some(point) = self.undo.undo(self.line.buf_mut()) {
                    self.line.set_point(point);
                } else {
                    self.ding();
                }
            }
            C::UnixLineDiscard => self.kill_range_to(0, KillMode::Prepend),
            C::UnixWordRubout => {
                let target = self.line.backward_unix_word_start(self.line.point());
                self.kill_range_to(target, KillMode::Prepend);
            }
            C::UniversalArgument => self.cmd_universal_argument()?,
            C::UpcaseWord => self.case_word(count, CaseOp::Up),
            C::ViEditingMode => {
                self.vars.editing_mode = EditingMode::Vi;
                self.active_keymap = "vi-insert".to_string();
            }
            C::ViInsertionMode => self.active_keymap = "vi-insert".to_string(),
            C::ViMovementMode => {
                self.active_keymap = "vi-command".to_string();
                let prev = self.line.prev_point();
                self.line.set_point(prev);
            }
            C::Yank => self.cmd_yank(),
            C::YankLastArg => self.cmd_yank_nth_arg(None),
            C::YankNthArg => {
                let n = if self.numeric_arg.is_some() { count } else { 1 };
                self.cmd_yank_nth_arg(Some(n));
            }
            C::YankPop => self.cmd_yank_pop(),
        }

        if command.is_kill() {
            self.last_command_was_kill = true;
        }

        Ok(())
    }

    fn cmd_abort(&mut self) {
        self.ding();
        self.numeric_arg = None;
        self.arg_sign = 1;
        self.executing_keyseq.clear();
    }

    /// Inserts decoded text at point, honoring a repeat count.
    fn insert_text_counted(&mut self, text: &str, count: i64) {
        if count <= 0 {
            return;
        }
        let repeated = text.repeat(usize::try_from(count).unwrap_or(1));
        self.line.insert(&repeated, &mut self.undo);
        self.note_modification();
    }

    fn cmd_self_insert(&mut self, count: i64, key: u8) {
        if self.vars.byte_oriented {
            self.insert_text_counted(&(key as char).to_string(), count);
            return;
        }

        match self.line.decoder.push(key) {
            Decoded::Pending => {}
            Decoded::Char(c) => self.insert_text_counted(&c.to_string(), count),
            Decoded::Invalid => self.insert_text_counted("\u{fffd}", count),
        }
    }

    fn cmd_quoted_insert(&mut self, count: i64) -> Result<(), Error> {
        // Insert the next key verbatim, even if it is bound.
        loop {
            let Some(key) = self.input.read_key()? else {
                return Ok(());
            };
            match self.line.decoder.push(key) {
                Decoded::Pending => continue,
                Decoded::Char(c) => {
                    self.insert_text_counted(&c.to_string(), count);
                    return Ok(());
                }
                Decoded::Invalid => {
                    self.insert_text_counted("\u{fffd}", count);
                    return Ok(());
                }
            }
        }
    }

    fn move_chars(&mut self, count: i64) {
        if count >= 0 {
            let mut point = self.line.point();
            for _ in 0..count {
                point = mbutil::find_next_char(self.line.text(), point);
            }
            self.line.set_point(point);
        } else {
            let mut point = self.line.point();
            for _ in 0..(-count) {
                point = mbutil::find_prev_char(self.line.text(), point);
            }
            self.line.set_point(point);
        }
    }

    fn delete_chars_cmd(&mut self, count: i64) -> Result<(), Error> {
        if count == 0 {
            return Ok(());
        }

        if count > 0 {
            if self.line.point() == self.line.len() {
                self.ding();
                return Ok(());
            }
            let mut end = self.line.point();
            for _ in 0..count {
                end = mbutil::find_next_char(self.line.text(), end);
            }
            self.line.delete_range(self.line.point(), end, &mut self.undo);
        } else {
            if self.line.point() == 0 {
                self.ding();
                return Ok(());
            }
            let mut start = self.line.point();
            for _ in 0..(-count) {
                start = mbutil::find_prev_char(self.line.text(), start);
            }
            self.line.delete_range(start, self.line.point(), &mut self.undo);
        }
        self.note_modification();
        Ok(())
    }

    fn backward_word_target(&self, count: u64) -> usize {
        self.line
            .backward_word_start(self.line.point(), usize::try_from(count).unwrap_or(1))
    }

    /// Kills from point to `target`, into the ring.
    fn kill_range_to(&mut self, target: usize, mode: KillMode) {
        let (start, end) = if target < self.line.point() {
            (target, self.line.point())
        } else {
            (self.line.point(), target)
        };
        if start == end {
            return;
        }
        let removed = self.line.delete_range(start, end, &mut self.undo);
        let mode = if self.last_command_was_kill {
            mode
        } else {
            KillMode::New
        };
        self.kill_ring.kill(removed, mode);
        self.note_modification();
    }

    fn kill_word_cmd(&mut self, count: i64) {
        if count >= 0 {
            let target = self
                .line
                .forward_word_end(self.line.point(), count_to_usize(count));
            self.kill_range_to(target, KillMode::Append);
        } else {
            let target = self.backward_word_target(count.unsigned_abs());
            self.kill_range_to(target, KillMode::Prepend);
        }
    }

    fn region_kill(&mut self, delete: bool) {
        let Some(mark) = self.line.mark() else {
            self.ding();
            return;
        };
        let (start, end) = if mark < self.line.point() {
            (mark, self.line.point())
        } else {
            (self.line.point(), mark)
        };
        if delete {
            self.kill_range_to(mark, KillMode::New);
        } else {
            let text = self.line.text()[start..end].to_string();
            self.kill_ring.kill(text, KillMode::New);
        }
    }

    fn cmd_delete_horizontal_space(&mut self) {
        let text = self.line.text();
        let mut start = self.line.point();
        while start > 0 {
            let prev = mbutil::find_prev_char(text, start);
            if !mbutil::char_at(text, prev).is_some_and(|c| c == ' ' || c == '\t') {
                break;
            }
            start = prev;
        }
        let mut end = self.line.point();
        while end < text.len() {
            if !mbutil::char_at(text, end).is_some_and(|c| c == ' ' || c == '\t') {
                break;
            }
            end = mbutil::find_next_char(text, end);
        }
        if start != end {
            self.line.delete_range(start, end, &mut self.undo);
            self.note_modification();
        }
    }

    fn cmd_yank(&mut self) {
        let Some(text) = self.kill_ring.current().map(ToString::to_string) else {
            self.ding();
            return;
        };
        let start = self.line.point();
        self.line.insert(&text, &mut self.undo);
        self.last_yank = Some((start, start + text.len()));
        self.note_modification();
    }

    fn cmd_yank_pop(&mut self) {
        let yanked_last = matches!(self.last_command, Some(Command::Yank | Command::YankPop));
        let Some((start, end)) = self.last_yank.filter(|_| yanked_last) else {
            self.ding();
            return;
        };

        self.line.delete_range(start, end, &mut self.undo);
        self.kill_ring.rotate();
        let Some(text) = self.kill_ring.current().map(ToString::to_string) else {
            return;
        };
        self.line.set_point(start);
        self.line.insert(&text, &mut self.undo);
        self.last_yank = Some((start, start + text.len()));
        self.note_modification();
    }

    /// Yanks an argument from the previous history entry: the `n`th word,
    /// or the last word when `n` is `None`.
    fn cmd_yank_nth_arg(&mut self, n: Option<i64>) {
        let previous_pos = self.history.offset().checked_sub(1);
        let Some(previous_line) = previous_pos
            .and_then(|pos| self.history.get(pos))
            .map(|entry| entry.line.clone())
        else {
            self.ding();
            return;
        };

        let words = self.history.tokenize(&previous_line);
        if words.is_empty() {
            self.ding();
            return;
        }

        let index = match n {
            None => words.len() - 1,
            Some(n) if n >= 0 => {
                let n = usize::try_from(n).unwrap_or(0);
                if n >= words.len() {
                    self.ding();
                    return;
                }
                n
            }
            Some(n) => {
                let back = usize::try_from(-n).unwrap_or(0);
                let Some(index) = words.len().checked_sub(back + 1) else {
                    self.ding();
                    return;
                };
                index
            }
        };

        let mut text = words[index].clone();
        let before_point = &self.line.text()[..self.line.point()];
        if !before_point.is_empty() && !before_point.ends_with(char::is_whitespace) {
            text.insert(0, ' ');
        }
        self.line.insert(&text, &mut self.undo);
        self.note_modification();
    }

    fn cmd_transpose_chars(&mut self) {
        if self.line.len() < 2 || self.line.point() == 0 {
            self.ding();
            return;
        }

        // At end of line, transpose the two characters before point.
        let at_end = self.line.point() == self.line.len();
        let text = self.line.text();
        let (left_start, right_start) = if at_end {
            let right = mbutil::find_prev_char(text, self.line.point());
            (mbutil::find_prev_char(text, right), right)
        } else {
            (mbutil::find_prev_char(text, self.line.point()), self.line.point())
        };
        let right_end = mbutil::find_next_char(text, right_start);

        let left: String = text[left_start..right_start].to_string();
        let right: String = text[right_start..right_end].to_string();

        self.undo.begin_group();
        self.line.delete_range(left_start, right_end, &mut self.undo);
        self.line.set_point(left_start);
        self.line.insert(&format!("{right}{left}"), &mut self.undo);
        self.undo.end_group();
        self.note_modification();
    }

    fn cmd_transpose_words(&mut self) {
        let point = self.line.point();
        let w2_end = self.line.forward_word_end(point, 1);
        let w2_start = self.line.backward_word_start(w2_end, 1);
        let w1_start = self.line.backward_word_start(w2_start, 1);
        let w1_end = self.line.forward_word_end(w1_start, 1);

        if w1_start >= w2_start || w1_end > w2_start || w2_start >= w2_end {
            self.ding();
            return;
        }

        let text = self.line.text();
        let word1 = text[w1_start..w1_end].to_string();
        let sep = text[w1_end..w2_start].to_string();
        let word2 = text[w2_start..w2_end].to_string();

        self.undo.begin_group();
        self.line.delete_range(w1_start, w2_end, &mut self.undo);
        self.line.set_point(w1_start);
        self.line
            .insert(&format!("{word2}{sep}{word1}"), &mut self.undo);
        self.undo.end_group();
        self.note_modification();
    }

    fn case_word(&mut self, count: i64, op: CaseOp) {
        let start = self.line.point();
        let end = self.line.forward_word_end(start, count_to_usize(count));
        if start == end {
            return;
        }

        let segment = self.line.text()[start..end].to_string();
        let changed = match op {
            CaseOp::Up => segment.to_uppercase(),
            CaseOp::Down => segment.to_lowercase(),
            CaseOp::Capitalize => capitalize_words(&segment),
        };

        self.undo.begin_group();
        self.line.delete_range(start, end, &mut self.undo);
        self.line.set_point(start);
        self.line.insert(&changed, &mut self.undo);
        self.undo.end_group();
        self.note_modification();
    }

    /// Moves to an absolute history position, loading that entry.
    fn history_move_to(&mut self, pos: usize) {
        self.maybe_save_line();
        if !self.history.set_pos(pos) {
            self.ding();
            return;
        }
        self.load_history_line();
    }

    /// Moves `count` entries through history (negative = older).
    fn history_step(&mut self, count: i64) {
        if count == 0 {
            return;
        }
        self.maybe_save_line();

        let mut moved = false;
        if count < 0 {
            for _ in 0..(-count) {
                if self.history.previous().is_none() {
                    break;
                }
                moved = true;
            }
        } else {
            for _ in 0..count {
                if self.history.offset() >= self.history.len() {
                    break;
                }
                self.history.next();
                moved = true;
            }
        }

        if moved {
            self.load_history_line();
        } else {
            self.ding();
        }
    }

    /// Stashes the in-progress line before the first history motion.
    fn maybe_save_line(&mut self) {
        if self.history.offset() >= self.history.len() && self.saved_line_for_history.is_none() {
            self.saved_line_for_history = Some(self.line.text().to_string());
        }
    }

    pub(crate) fn load_history_line(&mut self) {
        let point = self.line.point();
        let text = if self.history.offset() >= self.history.len() {
            self.saved_line_for_history.take().unwrap_or_default()
        } else {
            self.history
                .current()
                .map(|e| e.line.clone())
                .unwrap_or_default()
        };
        self.line.replace_all(&text);
        self.undo.clear();
        if self.vars.history_preserve_point {
            self.line.set_point(point);
        }
    }

    /// Anchored search for the line prefix before point, non-incremental.
    fn history_prefix_search(&mut self, direction: Direction) {
        let prefix = self.line.text()[..self.line.point()].to_string();
        if prefix.is_empty() {
            self.history_step(match direction {
                Direction::Backward => -1,
                Direction::Forward => 1,
            });
            return;
        }

        let origin = self.history.offset();
        let from = match direction {
            Direction::Backward => {
                if origin == 0 {
                    self.ding();
                    return;
                }
                origin - 1
            }
            Direction::Forward => origin + 1,
        };

        if !self.history.set_pos(from) {
            self.ding();
            return;
        }

        if self.history.search_prefix(&prefix, direction).is_some() {
            let point = self.line.point();
            self.maybe_save_line();
            self.load_history_line();
            self.line.set_point(point);
        } else {
            self.history.set_pos(origin);
            self.ding();
        }
    }

    /// Non-incremental search: reads a string on the message line, then
    /// searches the history for it.
    fn noninc_search(&mut self, direction: Direction) -> Result<(), Error> {
        self.display.save_prompt();
        let mut term_string = String::new();

        let accepted = loop {
            let pchar = match direction {
                Direction::Backward => '?',
                Direction::Forward => '/',
            };
            self.display.set_message(format!("({pchar})`{term_string}': "));
            self.redisplay();

            let Some(key) = self.input.read_key()? else {
                break false;
            };
            match key {
                b'\r' | b'\n' => break true,
                0x07 | 0x1b => break false, // C-g / ESC abort
                0x08 | RUBOUT => {
                    if term_string.pop().is_none() {
                        break false;
                    }
                }
                key => match self.line.decoder.push(key) {
                    Decoded::Pending => {}
                    Decoded::Char(c) => term_string.push(c),
                    Decoded::Invalid => term_string.push('\u{fffd}'),
                },
            }
        };

        self.display.clear_message();
        self.display.restore_prompt();

        if !accepted {
            self.ding();
            return Ok(());
        }

        let term_string = if term_string.is_empty() {
            self.last_isearch_string.clone()
        } else {
            self.last_isearch_string = term_string.clone();
            term_string
        };
        if term_string.is_empty() {
            self.ding();
            return Ok(());
        }

        let origin = self.history.offset();
        let start = match direction {
            Direction::Backward => origin.saturating_sub(1),
            Direction::Forward => origin + 1,
        };

        if let Some(pos) = self.history.search_pos(&term_string, direction, start) {
            self.maybe_save_line();
            self.history.set_pos(pos);
            self.load_history_line();
            self.line.set_point(0);
        } else {
            self.ding();
        }

        Ok(())
    }

    fn cmd_history_expand_line(&mut self) {
        let text = self.line.text().to_string();
        match self.history.expand(&text) {
            Ok((Expansion::Changed | Expansion::PrintOnly, expanded)) => {
                self.line.replace_all(&expanded);
                self.note_modification();
            }
            Ok((Expansion::Unchanged, _)) => self.ding(),
            Err(_) => self.ding(),
        }
    }

    fn cmd_digit_argument(&mut self, key: u8) -> Result<(), Error> {
        if key == b'-' {
            self.arg_sign = -1;
        } else if key.is_ascii_digit() {
            self.numeric_arg = Some(i64::from(key - b'0'));
        }
        self.arg_loop()
    }

    fn cmd_universal_argument(&mut self) -> Result<(), Error> {
        self.numeric_arg = Some(self.numeric_arg.unwrap_or(1).saturating_mul(4));
        self.arg_loop()
    }

    /// Continues collecting digits for a numeric argument; the first
    /// non-digit key is dispatched with the argument in effect.
    fn arg_loop(&mut self) -> Result<(), Error> {
        loop {
            self.redisplay();
            let Some(key) = self.input.read_key()? else {
                return Ok(());
            };

            if key.is_ascii_digit() {
                let digit = i64::from(key - b'0');
                self.numeric_arg = Some(
                    self.numeric_arg
                        .unwrap_or(0)
                        .saturating_mul(10)
                        .saturating_add(digit),
                );
            } else if key == b'-' && self.numeric_arg.is_none() {
                self.arg_sign = -1;
            } else {
                self.dispatch_key(key)?;
                return Ok(());
            }
        }
    }

    fn cmd_bracketed_paste(&mut self) -> Result<(), Error> {
        let text = self.read_bracketed_paste()?;
        if text.is_empty() {
            return Ok(());
        }

        self.undo.begin_group();
        let start = self.line.point();
        self.line.insert(&text, &mut self.undo);
        self.undo.end_group();
        self.note_modification();

        if self.vars.enable_bracketed_paste {
            self.line.set_mark(Some(start));
            self.region_active = true;
        }
        Ok(())
    }

    /// Collects pasted bytes until the closing bracketed-paste marker.
    pub(crate) fn read_bracketed_paste(&mut self) -> Result<String, Error> {
        let mut bytes: Vec<u8> = vec![];
        while let Some(key) = self.input.read_key()? {
            bytes.push(key);
            if bytes.ends_with(BRACKETED_PASTE_SUFFIX) {
                bytes.truncate(bytes.len() - BRACKETED_PASTE_SUFFIX.len());
                break;
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn cmd_dump_functions(&mut self) {
        let listing = self.format_function_bindings();
        self.term.write_str("\r\n");
        self.term.write_str(&listing);
        self.display.force_redraw();
    }

    fn cmd_dump_macros(&mut self) {
        let listing = self.format_macro_bindings();
        self.term.write_str("\r\n");
        self.term.write_str(&listing);
        self.display.force_redraw();
    }

    fn cmd_dump_variables(&mut self) {
        use std::fmt::Write as _;

        let mut out = String::new();
        for (name, value) in self.vars.booleans() {
            let value = if value { "on" } else { "off" };
            let _ = write!(out, "set {name} {value}\r\n");
        }
        for (name, value) in self.vars.strings() {
            let _ = write!(out, "set {name} {value}\r\n");
        }
        self.term.write_str("\r\n");
        self.term.write_str(&out);
        self.display.force_redraw();
    }
}

#[derive(Clone, Copy)]
enum CaseOp {
    Up,
    Down,
    Capitalize,
}

fn count_to_usize(count: i64) -> usize {
    usize::try_from(count.unsigned_abs()).unwrap_or(1)
}

fn capitalize_words(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}
