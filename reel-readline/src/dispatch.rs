//! Key-sequence dispatch: walking keymaps byte by byte, with shadow-binding
//! fallback, meta conversion, macro expansion, and timeout disambiguation.

use std::time::Duration;

use crate::commands::Command;
use crate::editor::Editor;
use crate::error::Error;
use crate::keymap::{ANYOTHERKEY, ESC, Slot};
use crate::options::EditingMode;
use crate::trace_categories;

/// Outcome of dispatching a key at some prefix depth. `UseShadow` and
/// `NoMatch` correspond to the traditional -2/-1 sentinels: the caller
/// should fall back to a shadowed binding, or unwind one more level.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Dispatch {
    Done,
    UseShadow,
    NoMatch,
}

/// A borrowed-free view of one keymap slot, cheap to pull out of the
/// registry while the editor is mutably in use.
#[derive(Debug, PartialEq, Eq)]
enum SlotView {
    Unbound,
    Null,
    Command(Command),
    Macro(Vec<u8>),
    Submap,
}

impl Editor {
    fn slot_view(&self, prefix: &[u8], index: usize) -> SlotView {
        let Some(root) = self.keymaps.root(&self.active_keymap) else {
            return SlotView::Unbound;
        };
        let Some(map) = root.submap_at(prefix) else {
            return SlotView::Unbound;
        };
        match map.slot(index) {
            Slot::Unbound => SlotView::Unbound,
            Slot::Null => SlotView::Null,
            Slot::Command(cmd) => SlotView::Command(*cmd),
            Slot::Macro(bytes) => SlotView::Macro(bytes.clone()),
            Slot::Submap(_) => SlotView::Submap,
        }
    }

    fn anyother_view(&self, prefix: &[u8]) -> SlotView {
        self.slot_view(prefix, ANYOTHERKEY)
    }

    fn unread(&mut self, key: u8) {
        if self.input.in_macro() {
            self.input.prev_macro_key();
        } else {
            self.input.unget(key);
        }
    }

    /// Dispatches one key read from the top level.
    pub(crate) fn dispatch_key(&mut self, key: u8) -> Result<Dispatch, Error> {
        self.dispatch_subseq(key, &[], false)
    }

    #[allow(clippy::too_many_lines)]
    fn dispatch_subseq(
        &mut self,
        key: u8,
        prefix: &[u8],
        got_subseq: bool,
    ) -> Result<Dispatch, Error> {
        // With meta conversion on, a high-bit byte is re-dispatched through
        // the ESC submap as ESC plus the stripped byte.
        if key & 0x80 != 0 && self.vars.convert_meta {
            if matches!(self.slot_view(prefix, ESC as usize), SlotView::Submap) {
                self.executing_keyseq.push(ESC);
                let mut sub = prefix.to_vec();
                sub.push(ESC);
                return self.dispatch_subseq(key & 0x7f, &sub, got_subseq);
            }
            self.ding();
            return Ok(Dispatch::Done);
        }

        match self.slot_view(prefix, key as usize) {
            SlotView::Command(Command::DoLowercaseVersion) => {
                self.dispatch_subseq(key.to_ascii_lowercase(), prefix, got_subseq)
            }
            SlotView::Command(command) => {
                self.executing_keyseq.push(key);
                self.run_command(command, key)?;
                Ok(Dispatch::Done)
            }
            SlotView::Null => Ok(Dispatch::Done),
            SlotView::Macro(bytes) => {
                self.input.push_macro(bytes);
                Ok(Dispatch::Done)
            }
            SlotView::Unbound => {
                if !prefix.is_empty()
                    && !matches!(self.anyother_view(prefix), SlotView::Unbound)
                {
                    // The keymap we're in shadows a binding that was
                    // displaced when it was created; tell the caller to use
                    // it, with this key pushed back.
                    self.unread(key);
                    self.executing_keyseq.pop();
                    Ok(Dispatch::UseShadow)
                } else if got_subseq {
                    self.unread(key);
                    self.executing_keyseq.pop();
                    Ok(Dispatch::NoMatch)
                } else {
                    self.abort_dispatch();
                    Ok(Dispatch::NoMatch)
                }
            }
            SlotView::Submap => {
                // In the vi insertion keymap, ESC with no pending or
                // imminent input acts immediately rather than waiting for a
                // possible arrow-key sequence.
                if self.vars.editing_mode == EditingMode::Vi
                    && key == ESC
                    && prefix.is_empty()
                    && self.active_keymap == "vi-insert"
                    && !self.input.pushed_available()
                    && !self.input.in_macro()
                    && !self.input.queued(self.keyseq_timeout())?
                {
                    return self.apply_shadow(&[ESC], prefix, key);
                }

                self.executing_keyseq.push(key);
                let mut sub = prefix.to_vec();
                sub.push(key);

                // Cooperative timeout: if the submap shadows something and
                // no byte arrives in time, act on the shadow instead.
                let timeout = self.keyseq_timeout();
                if !timeout.is_zero()
                    && !self.input.in_macro()
                    && !self.input.pushed_available()
                    && !matches!(self.anyother_view(&sub), SlotView::Unbound)
                    && !self.input.queued(timeout)?
                {
                    tracing::debug!(target: trace_categories::INPUT,
                        "key sequence timeout after {key:#04x}");
                    self.executing_keyseq.pop();
                    return self.apply_shadow(&sub, prefix, key);
                }

                let Some(newkey) = self.input.read_key()? else {
                    self.abort_dispatch();
                    return Ok(Dispatch::NoMatch);
                };

                let parent_shadowed =
                    !matches!(self.anyother_view(prefix), SlotView::Unbound);
                let result =
                    self.dispatch_subseq(newkey, &sub, got_subseq || parent_shadowed)?;
                self.subseq_result(result, &sub, prefix, key, got_subseq)
            }
        }
    }

    /// Handles the result of a sub-dispatch, implementing the retry
    /// protocol for shadowed bindings.
    fn subseq_result(
        &mut self,
        result: Dispatch,
        sub_prefix: &[u8],
        parent_prefix: &[u8],
        key: u8,
        got_subseq: bool,
    ) -> Result<Dispatch, Error> {
        match result {
            Dispatch::Done => Ok(Dispatch::Done),
            Dispatch::UseShadow => self.apply_shadow(sub_prefix, parent_prefix, key),
            Dispatch::NoMatch => {
                if !matches!(self.anyother_view(parent_prefix), SlotView::Unbound) {
                    // The map above us holds a shadow; hand the decision up.
                    self.unread(key);
                    self.executing_keyseq.pop();
                    Ok(Dispatch::UseShadow)
                } else if got_subseq {
                    self.unread(key);
                    self.executing_keyseq.pop();
                    Ok(Dispatch::NoMatch)
                } else {
                    Ok(Dispatch::NoMatch)
                }
            }
        }
    }

    /// Acts on the `ANYOTHERKEY` binding of the keymap at `sub_prefix`, as
    /// if `key` had been dispatched to it directly.
    fn apply_shadow(
        &mut self,
        sub_prefix: &[u8],
        parent_prefix: &[u8],
        key: u8,
    ) -> Result<Dispatch, Error> {
        match self.anyother_view(sub_prefix) {
            SlotView::Command(Command::DoLowercaseVersion) => {
                self.dispatch_subseq(key.to_ascii_lowercase(), parent_prefix, false)
            }
            SlotView::Command(command) => {
                self.executing_keyseq.push(key);
                self.run_command(command, key)?;
                Ok(Dispatch::Done)
            }
            SlotView::Macro(bytes) => {
                self.input.push_macro(bytes);
                Ok(Dispatch::Done)
            }
            SlotView::Null => Ok(Dispatch::Done),
            SlotView::Unbound | SlotView::Submap => {
                self.abort_dispatch();
                Ok(Dispatch::NoMatch)
            }
        }
    }

    fn run_command(&mut self, command: Command, key: u8) -> Result<(), Error> {
        let count = self.take_count();
        self.execute_command(command, count, key)?;

        // Remember the last command, unless input is pending (we were
        // reading a prefix) or this was a numeric-argument accumulator.
        if !command.is_arg_accumulator() && !self.input.pushed_available() {
            self.last_command = Some(command);
        }
        Ok(())
    }

    fn abort_dispatch(&mut self) {
        self.ding();
        self.numeric_arg = None;
        self.arg_sign = 1;
        self.executing_keyseq.clear();
    }

    pub(crate) fn keyseq_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.vars.keyseq_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::ReadResult;
    use crate::editor::test_support::editor_with_input;
    use crate::keymap::ctrl;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_typing_accepts_a_line() {
        let mut editor = editor_with_input(b"hello\r".to_vec());
        let result = editor.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Input("hello".to_string()));
    }

    #[test]
    fn backspace_and_movement_edit_the_line() {
        // "worlx", backspace, "d", C-a, "hello ", accept.
        let mut editor = editor_with_input(b"worlx\x7fd\x01hello \r".to_vec());
        let result = editor.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Input("hello world".to_string()));
    }

    #[test]
    fn kill_and_yank_round_trip() {
        // Type "abc def", C-w kills "def", C-a, C-y yanks it at the start.
        let mut editor = editor_with_input(b"abc def\x17\x01\x19\r".to_vec());
        let result = editor.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Input("defabc ".to_string()));
    }

    #[test]
    fn macro_bindings_feed_input_back() {
        let mut editor = editor_with_input(b"\x18m\r".to_vec());
        editor
            .keymaps_mut()
            .root_mut("emacs")
            .unwrap()
            .generic_bind(&[ctrl(b'X'), b'm'], Slot::Macro(b"echo hi".to_vec()))
            .unwrap();

        let result = editor.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Input("echo hi".to_string()));
    }

    #[test]
    fn shadowed_binding_fires_when_sequence_fails() {
        // Bind C-x to self-insert-ish macro, then C-x m to something else;
        // pressing C-x q should fall back to the shadow and replay q.
        let mut editor = editor_with_input(b"\x18q\r".to_vec());
        let emacs = editor.keymaps_mut().root_mut("emacs").unwrap();
        emacs
            .generic_bind(&[ctrl(b'X')], Slot::Macro(b"X".to_vec()))
            .unwrap();
        emacs
            .generic_bind(&[ctrl(b'X'), b'm'], Slot::Macro(b"M".to_vec()))
            .unwrap();

        let result = editor.read_line("$ ").unwrap();
        // The pushed-back "q" is pending input, which is consumed before
        // the shadow macro's bytes.
        assert_eq!(result, ReadResult::Input("qX".to_string()));
    }

    #[test]
    fn prefix_timeout_falls_back_to_shadow() {
        // C-x followed by nothing: the scripted reader reports no pending
        // input, so the timeout path fires immediately and the shadowed
        // binding runs.
        let mut editor = editor_with_input(b"\x18".to_vec());
        let emacs = editor.keymaps_mut().root_mut("emacs").unwrap();
        emacs
            .generic_bind(&[ctrl(b'X')], Slot::Macro(b"timed out\r".to_vec()))
            .unwrap();
        emacs
            .generic_bind(&[ctrl(b'X'), b'm'], Slot::Macro(b"unused".to_vec()))
            .unwrap();

        let result = editor.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Input("timed out".to_string()));
    }

    #[test]
    fn meta_byte_converts_to_escape_sequence() {
        // 0xe6 = M-f: with convert-meta on this becomes ESC f (forward-word).
        let mut editor = editor_with_input(b"one two\x01\xe6x\r".to_vec());
        editor.vars.convert_meta = true;
        let result = editor.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Input("onex two".to_string()));
    }

    #[test]
    fn arrow_keys_move_through_history() {
        let mut editor = editor_with_input(b"\x1b[A\r".to_vec());
        editor.history_mut().add("echo from history");
        let result = editor.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Input("echo from history".to_string()));
    }

    #[test]
    fn digit_argument_repeats_insertion() {
        // M-3 then "x" inserts xxx.
        let mut editor = editor_with_input(b"\x1b3x\r".to_vec());
        let result = editor.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Input("xxx".to_string()));
    }

    #[test]
    fn undo_reverts_the_last_insertion() {
        // Type abc, then C-_ undoes the last insertion.
        let mut editor = editor_with_input(b"abc\x1f\r".to_vec());
        let result = editor.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Input("ab".to_string()));
    }

    #[test]
    fn transpose_chars_swaps() {
        let mut editor = editor_with_input(b"ab\x14\r".to_vec());
        let result = editor.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Input("ba".to_string()));
    }

    #[test]
    fn eof_on_empty_line() {
        let mut editor = editor_with_input(b"\x04".to_vec());
        let result = editor.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Eof);
    }

    #[test]
    fn eof_char_mid_line_deletes() {
        // C-d with text deletes forward instead of signaling EOF.
        let mut editor = editor_with_input(b"abc\x01\x04\r".to_vec());
        let result = editor.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Input("bc".to_string()));
    }

    #[test]
    fn multibyte_input_is_decoded_incrementally() {
        let mut input = b"caf".to_vec();
        input.extend_from_slice("é".as_bytes());
        input.push(b'\r');
        let mut editor = editor_with_input(input);
        // A UTF-8 session has meta conversion off so high-bit bytes reach
        // the decoder.
        editor.vars.convert_meta = false;
        let result = editor.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Input("café".to_string()));
    }

    #[test]
    fn bracketed_paste_inserts_verbatim() {
        let mut input = b"\x1b[200~pasted text\x1b[201~\r".to_vec();
        let mut editor = editor_with_input(std::mem::take(&mut input));
        let result = editor.read_line("$ ").unwrap();
        assert_eq!(result, ReadResult::Input("pasted text".to_string()));
    }
}
