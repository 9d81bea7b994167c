//! The line editor: owns the buffer, keymaps, history, terminal, and
//! display, and runs the read-dispatch-redisplay loop.

use std::collections::HashSet;
use std::path::PathBuf;

use reel_history::History;

use crate::commands::Command;
use crate::display::{Display, RenderParams};
use crate::error::Error;
use crate::input::{ByteReader, InputSource, ScriptedReader};
use crate::kill::KillRing;
use crate::keymap::Keymaps;
use crate::line::LineBuffer;
use crate::options::{EditingMode, Variables};
use crate::prompt::PromptInfo;
use crate::signals::{self, Signals};
use crate::terminal::Terminal;
use crate::trace_categories;
use crate::undo::UndoList;

/// The outcome of reading one line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadResult {
    /// A complete input line (without its trailing newline).
    Input(String),
    /// End of input was reached.
    Eof,
    /// The line was interrupted (SIGINT) and discarded.
    Interrupted,
}

/// What ends the current read-line call; set by commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Finished {
    Accepted,
    Eof,
    #[allow(dead_code)]
    Interrupted,
}

/// The interactive line editor.
pub struct Editor {
    pub(crate) line: LineBuffer,
    pub(crate) undo: UndoList,
    pub(crate) kill_ring: KillRing,
    pub(crate) history: History,
    pub(crate) keymaps: Keymaps,
    pub(crate) active_keymap: String,
    pub(crate) vars: Variables,
    pub(crate) input: InputSource,
    pub(crate) term: Terminal,
    pub(crate) display: Display,

    pub(crate) executing_keyseq: Vec<u8>,
    pub(crate) last_command: Option<Command>,
    pub(crate) last_command_was_kill: bool,
    pub(crate) last_yank: Option<(usize, usize)>,
    pub(crate) numeric_arg: Option<i64>,
    pub(crate) arg_sign: i64,
    pub(crate) finished: Option<Finished>,

    pub(crate) saved_line_for_history: Option<String>,
    pub(crate) modified_entries: HashSet<usize>,
    pub(crate) region_active: bool,
    pub(crate) last_isearch_string: String,
    pub(crate) operate_next: Option<usize>,

    pub(crate) shell_cmd_bindings: Vec<(Vec<u8>, String)>,

    pub(crate) app_name: String,
    pub(crate) last_inputrc: Option<PathBuf>,

    signals: Option<Signals>,
    last_read_byte: Option<u8>,
}

impl Editor {
    /// Creates an editor reading from stdin and writing to stdout.
    pub fn new() -> Result<Self, Error> {
        let term = Terminal::new(0);
        #[cfg(unix)]
        let reader: Box<dyn ByteReader> = Box::new(crate::input::TtyReader::new(0));
        #[cfg(not(unix))]
        let reader: Box<dyn ByteReader> = Box::new(ScriptedReader::new(vec![]));
        Ok(Self::build(term, reader))
    }

    /// Creates an editor fed by a fixed byte script, writing to the given
    /// sink. Dispatch, display, and history behave exactly as they would
    /// interactively; used by tests.
    pub fn scripted(input: impl Into<Vec<u8>>, sink: Box<dyn std::io::Write>) -> Self {
        let term = Terminal::with_writer(-1, sink);
        Self::build(term, Box::new(ScriptedReader::new(input.into())))
    }

    fn build(term: Terminal, reader: Box<dyn ByteReader>) -> Self {
        let mut vars = Variables::default();
        if locale_is_utf8() {
            // Eight-bit input is part of multibyte sequences, not meta
            // prefixes, in a UTF-8 locale.
            vars.convert_meta = false;
            vars.input_meta = true;
            vars.output_meta = true;
        }

        Self {
            line: LineBuffer::default(),
            undo: UndoList::default(),
            kill_ring: KillRing::default(),
            history: History::new(),
            keymaps: Keymaps::new(),
            active_keymap: "emacs".to_string(),
            vars,
            input: InputSource::new(reader),
            term,
            display: Display::default(),
            executing_keyseq: vec![],
            last_command: None,
            last_command_was_kill: false,
            last_yank: None,
            numeric_arg: None,
            arg_sign: 1,
            finished: None,
            saved_line_for_history: None,
            modified_entries: HashSet::new(),
            region_active: false,
            last_isearch_string: String::new(),
            operate_next: None,
            shell_cmd_bindings: vec![],
            app_name: "reel".to_string(),
            last_inputrc: None,
            signals: None,
            last_read_byte: None,
        }
    }

    /// The history list.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// The history list, mutably.
    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    /// The readline variables.
    pub fn vars(&self) -> &Variables {
        &self.vars
    }

    /// The named keymap registry.
    pub fn keymaps(&self) -> &Keymaps {
        &self.keymaps
    }

    /// The named keymap registry, mutably.
    pub fn keymaps_mut(&mut self) -> &mut Keymaps {
        &mut self.keymaps
    }

    /// Name of the keymap dispatch currently uses.
    pub fn active_keymap_name(&self) -> &str {
        &self.active_keymap
    }

    /// Switches the active keymap. Fails if the name does not resolve.
    pub fn set_active_keymap(&mut self, name: &str) -> Result<(), Error> {
        let location = self
            .keymaps
            .resolve(name)
            .ok_or_else(|| Error::UnknownKeymap(name.to_string()))?;
        self.active_keymap = location.root;
        Ok(())
    }

    /// The application name used by `$if` conditions.
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Sets the application name used by `$if` conditions.
    pub fn set_app_name(&mut self, name: impl Into<String>) {
        self.app_name = name.into();
    }

    /// The `$TERM` name in effect.
    pub fn terminal_name(&self) -> &str {
        &self.term.term_name
    }

    /// Current text of the edit line.
    pub fn line_text(&self) -> &str {
        self.line.text()
    }

    /// Shell-command bindings installed with `bind -x`.
    pub fn shell_cmd_bindings(&self) -> &[(Vec<u8>, String)] {
        &self.shell_cmd_bindings
    }

    /// Installs a `bind -x` style shell-command binding.
    pub fn bind_shell_command(&mut self, seq: Vec<u8>, command: String) {
        self.shell_cmd_bindings.retain(|(s, _)| *s != seq);
        self.shell_cmd_bindings.push((seq, command));
    }

    /// Reads one line from the terminal with full editing.
    pub fn read_line(&mut self, prompt: &str) -> Result<ReadResult, Error> {
        self.setup(prompt)?;
        let result = self.char_loop();
        self.teardown(result.as_ref().ok());
        result
    }

    fn setup(&mut self, prompt: &str) -> Result<(), Error> {
        self.term.prepare()?;
        self.signals = Some(Signals::install());

        if self.vars.enable_keypad {
            self.term.keypad(true);
        }
        if self.vars.enable_meta_key {
            self.term.enable_meta_key();
        }
        if self.vars.enable_bracketed_paste {
            self.term.bracketed_paste(true);
        }

        self.line.reset();
        self.undo.clear();
        self.finished = None;
        self.last_command = None;
        self.last_command_was_kill = false;
        self.last_yank = None;
        self.numeric_arg = None;
        self.arg_sign = 1;
        self.executing_keyseq.clear();
        self.region_active = false;
        self.saved_line_for_history = None;
        self.last_read_byte = None;

        self.history.using_history();

        let mode_indicator = self.mode_indicator();
        let info = PromptInfo::expand(
            prompt,
            self.term.screen_width,
            mode_indicator.as_deref(),
        );
        self.display.set_prompt(info);
        self.display.on_new_line();

        // operate-and-get-next positions us on the line after the one just
        // accepted.
        if let Some(pos) = self.operate_next.take() {
            if self.history.set_pos(pos) {
                if let Some(entry) = self.history.current() {
                    let text = entry.line.clone();
                    self.line.replace_all(&text);
                }
            }
        }

        self.redisplay();
        Ok(())
    }

    fn mode_indicator(&self) -> Option<String> {
        if !self.vars.show_mode_in_prompt {
            return None;
        }
        let indicator = match self.vars.editing_mode {
            EditingMode::Emacs => &self.vars.emacs_mode_string,
            EditingMode::Vi if self.active_keymap == "vi-insert" => &self.vars.vi_ins_mode_string,
            EditingMode::Vi => &self.vars.vi_cmd_mode_string,
        };
        Some(indicator.clone())
    }

    fn char_loop(&mut self) -> Result<ReadResult, Error> {
        loop {
            if let Some(result) = self.check_signals()? {
                return Ok(result);
            }

            if self.input.pushback_is_empty_and_no_macro() {
                self.numeric_arg = None;
                self.arg_sign = 1;
                self.executing_keyseq.clear();
            }

            let key = match self.input.read_key() {
                Ok(Some(key)) => key,
                Ok(None) => {
                    // EOF from the input source.
                    if self.line.is_empty() {
                        self.finished = Some(Finished::Eof);
                    } else {
                        self.finished = Some(Finished::Accepted);
                    }
                    return self.finish();
                }
                Err(Error::IoError(err)) if err.kind() == std::io::ErrorKind::Interrupted => {
                    continue; // the signal check at loop top handles it
                }
                Err(err) => return Err(err),
            };

            // The terminal's EOF character on an empty line ends input, but
            // only when it wasn't preceded by itself.
            if key == self.term.eof_char
                && self.line.is_empty()
                && self.last_read_byte != Some(key)
                && !self.line.decoder.has_pending()
            {
                self.finished = Some(Finished::Eof);
                return self.finish();
            }
            self.last_read_byte = Some(key);

            let was_kill = self.last_command_was_kill;
            self.dispatch_key(key)?;

            if let Some(result) = self.check_signals()? {
                return Ok(result);
            }

            // If no kill happened during the command, the accumulation
            // window for consecutive kills is over.
            if !self.input.pushed_available() && was_kill == self.last_command_was_kill {
                self.last_command_was_kill = false;
            }

            if self.finished.is_some() {
                return self.finish();
            }

            self.redisplay();
        }
    }

    fn finish(&mut self) -> Result<ReadResult, Error> {
        match self.finished.take() {
            Some(Finished::Accepted) => {
                self.redisplay();
                self.display.finish_line(&mut self.term);
                let text = self.line.text().to_string();
                if self.vars.revert_all_at_newline {
                    while self.undo.undo(self.line.buf_mut()).is_some() {}
                }
                Ok(ReadResult::Input(text))
            }
            Some(Finished::Eof) => {
                self.display.finish_line(&mut self.term);
                Ok(ReadResult::Eof)
            }
            Some(Finished::Interrupted) | None => {
                self.line.reset();
                Ok(ReadResult::Interrupted)
            }
        }
    }

    fn teardown(&mut self, _result: Option<&ReadResult>) {
        if self.vars.enable_bracketed_paste {
            self.term.bracketed_paste(false);
        }
        if self.vars.enable_keypad {
            self.term.keypad(false);
        }
        self.term.flush();
        self.term.restore();
        if let Some(mut signals) = self.signals.take() {
            signals.restore();
        }
    }

    /// Polls for a deferred signal and handles it. Returns a read result
    /// when the signal ends the current line.
    pub(crate) fn check_signals(&mut self) -> Result<Option<ReadResult>, Error> {
        let Some(sig) = signals::take_caught_signal() else {
            return Ok(None);
        };

        tracing::debug!(target: trace_categories::SIGNALS, "handling deferred signal {sig}");

        #[cfg(unix)]
        {
            use nix::sys::signal::Signal;

            let signal = Signal::try_from(sig).map_err(|_| Error::Signal(sig))?;
            match signal {
                Signal::SIGWINCH => {
                    self.term.update_screen_size();
                    self.display.force_redraw();
                    self.redisplay();
                    return Ok(None);
                }
                Signal::SIGINT => {
                    if self.vars.echo_control_chars {
                        self.term.write_str("^C");
                    }
                    self.term.write_str("\r\n");
                    self.term.flush();
                    self.line.reset();
                    self.display.on_new_line();
                    return Ok(Some(ReadResult::Interrupted));
                }
                _ => {
                    // Fatal-style: restore the terminal (with SIGTTOU held
                    // off), hand the signal to the previous disposition, and
                    // re-enter raw mode if we come back (SIGTSTP).
                    let blocked = Signals::block_sigttou();
                    self.term.restore();
                    if let Some(set) = &blocked {
                        Signals::unblock(set);
                    }

                    if let Some(signals) = &self.signals {
                        signals.reraise(signal);
                    }

                    let _ = self.term.prepare();
                    self.display.force_redraw();
                    self.redisplay();
                    return Ok(None);
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = sig;
            Ok(None)
        }
    }

    /// Renders and pushes the current state to the terminal. SIGWINCH is
    /// held off so a resize lands between updates, not mid-draw.
    pub(crate) fn redisplay(&mut self) {
        #[cfg(unix)]
        let blocked = Signals::block_sigwinch();

        let modified = self.modified_entries.contains(&self.history.offset());
        let region = if self.region_active {
            self.line
                .mark()
                .map(|m| (m.min(self.line.point()), m.max(self.line.point())))
        } else {
            None
        };

        let params = RenderParams {
            line: self.line.text(),
            point: self.line.point(),
            region,
            modified,
            output_meta: self.vars.output_meta,
            mark_modified_lines: self.vars.mark_modified_lines,
            horizontal_scroll: self.vars.horizontal_scroll_mode,
        };
        self.display.redisplay(&mut self.term, &params);

        #[cfg(unix)]
        if let Some(set) = blocked {
            Signals::unblock(&set);
        }
    }

    /// Rings the bell per the configured style.
    pub(crate) fn ding(&mut self) {
        self.term.ding(self.vars.bell_style);
    }

    /// The numeric argument for the next command, consumed on use.
    pub(crate) fn take_count(&mut self) -> i64 {
        let count = self.numeric_arg.unwrap_or(1) * self.arg_sign;
        self.numeric_arg = None;
        self.arg_sign = 1;
        count
    }

    /// Marks the current history entry as modified by this session.
    pub(crate) fn note_modification(&mut self) {
        self.modified_entries.insert(self.history.offset());
    }
}

impl InputSource {
    fn pushback_is_empty_and_no_macro(&self) -> bool {
        !self.pushed_available() && !self.in_macro()
    }
}

fn locale_is_utf8() -> bool {
    for name in ["LC_ALL", "LC_CTYPE", "LANG"] {
        if let Ok(value) = std::env::var(name) {
            if !value.is_empty() {
                let lower = value.to_ascii_lowercase();
                return lower.contains("utf-8") || lower.contains("utf8");
            }
        }
    }
    false
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A sink that discards everything; display output is not under test.
    struct NullSink;

    impl std::io::Write for NullSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Builds a scripted editor discarding display output.
    pub fn editor_with_input(input: impl Into<Vec<u8>>) -> Editor {
        Editor::scripted(input, Box::new(NullSink))
    }
}
