//! The `history` builtin: list, edit, and persist the command history.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;

use reel_history::Expansion;
use reel_readline::Editor;

use crate::{ExitStatus, HistoryFileState};

/// Display or manipulate the history list.
#[derive(Parser)]
#[command(name = "history", disable_help_flag = true)]
pub(crate) struct HistoryCommand {
    /// Clear the history list.
    #[arg(short = 'c')]
    clear: bool,
    /// Delete the history entry with the given number.
    #[arg(short = 'd', value_name = "OFFSET", allow_hyphen_values = true)]
    delete_offset: Option<i64>,
    /// Append new entries to the history file.
    #[arg(short = 'a')]
    append: bool,
    /// Read the history file and append its contents to the list.
    #[arg(short = 'n')]
    read_new: bool,
    /// Read the history file and replace the list with its contents.
    #[arg(short = 'r')]
    read: bool,
    /// Write the current history to the history file.
    #[arg(short = 'w')]
    write: bool,
    /// Add the arguments to the history list without executing them.
    #[arg(short = 's')]
    store: bool,
    /// Perform history expansion on the arguments and display the result.
    #[arg(short = 'p')]
    expand: bool,
    /// Optional count (or, with -s/-p, the words to use).
    args: Vec<String>,
}

/// Entry point: parses arguments and runs the command.
pub(crate) fn run(
    args: &[String],
    editor: &mut Editor,
    file_state: &mut HistoryFileState,
    output: &mut dyn Write,
) -> ExitStatus {
    let parsed = match HistoryCommand::try_parse_from(
        std::iter::once("history".to_string()).chain(args.iter().cloned()),
    ) {
        Ok(parsed) => parsed,
        Err(err) => {
            let _ = writeln!(output, "{err}");
            return ExitStatus::InvalidUsage;
        }
    };

    match parsed.execute(editor, file_state, output) {
        Ok(status) => status,
        Err(err) => {
            let _ = writeln!(output, "history: {err}");
            ExitStatus::GeneralError
        }
    }
}

impl HistoryCommand {
    fn file_path(file_state: &HistoryFileState) -> Option<PathBuf> {
        file_state.path.clone()
    }

    fn execute(
        &self,
        editor: &mut Editor,
        file_state: &mut HistoryFileState,
        output: &mut dyn Write,
    ) -> Result<ExitStatus, Box<dyn std::error::Error>> {
        if self.clear {
            editor.history_mut().clear();
            return Ok(ExitStatus::Success);
        }

        if let Some(number) = self.delete_offset {
            let history = editor.history_mut();
            let base = i64::try_from(history.base()).unwrap_or(1);
            let len = i64::try_from(history.len()).unwrap_or(0);
            // Negative offsets count back from the end.
            let logical = if number < 0 { base + len + number } else { number };
            let pos = logical - base;
            if pos < 0 || pos >= len {
                let _ = writeln!(output, "history: {number}: history position out of range");
                return Ok(ExitStatus::GeneralError);
            }
            #[allow(clippy::cast_sign_loss)]
            history.remove(pos as usize);
            return Ok(ExitStatus::Success);
        }

        if self.store {
            let line = self.args.join(" ");
            if !line.is_empty() {
                editor.history_mut().add(line);
            }
            return Ok(ExitStatus::Success);
        }

        if self.expand {
            let mut status = ExitStatus::Success;
            for arg in &self.args {
                match editor.history_mut().expand(arg) {
                    Ok((_, expanded)) => {
                        let _ = writeln!(output, "{expanded}");
                    }
                    Err(err) => {
                        let _ = writeln!(output, "history: {err}");
                        status = ExitStatus::GeneralError;
                    }
                }
            }
            return Ok(status);
        }

        let path_arg = self.args.first().map(PathBuf::from);

        if self.write {
            let path = path_arg.or_else(|| Self::file_path(file_state));
            editor.history_mut().write_file(path.as_deref())?;
            file_state.appended = editor.history().len();
            return Ok(ExitStatus::Success);
        }

        if self.append {
            let path = path_arg.or_else(|| Self::file_path(file_state));
            let new_entries = editor.history().len().saturating_sub(file_state.appended);
            if new_entries > 0 {
                editor
                    .history_mut()
                    .append_to_file(new_entries, path.as_deref())?;
                file_state.appended = editor.history().len();
            }
            return Ok(ExitStatus::Success);
        }

        if self.read || self.read_new {
            let path = path_arg.or_else(|| Self::file_path(file_state));
            self.read_from_file(editor, path.as_deref())?;
            return Ok(ExitStatus::Success);
        }

        self.list(editor, output)?;
        Ok(ExitStatus::Success)
    }

    fn read_from_file(
        &self,
        editor: &mut Editor,
        path: Option<&Path>,
    ) -> Result<(), reel_history::Error> {
        if self.read {
            editor.history_mut().clear();
        }
        editor.history_mut().read_file(path)
    }

    fn list(
        &self,
        editor: &Editor,
        output: &mut dyn Write,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let count: Option<usize> = match self.args.first() {
            Some(arg) => Some(arg.parse()?),
            None => None,
        };

        let history = editor.history();
        let len = history.len();
        let first = count.map_or(0, |n| len.saturating_sub(n));

        for (index, entry) in history.iter().enumerate().skip(first) {
            let number = history.base() + index;
            let _ = writeln!(output, "{number:5}  {}", entry.line);
        }

        Ok(())
    }
}

/// Expands history designators in a line the shell is about to run,
/// printing diagnostics the way the shell proper would. Returns the line
/// to execute, or `None` when the line should not run (an expansion error,
/// or a `:p` display-only expansion).
pub fn expand_for_execution(
    editor: &mut Editor,
    line: &str,
    output: &mut dyn Write,
) -> Option<String> {
    match editor.history_mut().expand(line) {
        Ok((Expansion::Unchanged, text)) => Some(text),
        Ok((Expansion::Changed, text)) => {
            let _ = writeln!(output, "{text}");
            Some(text)
        }
        Ok((Expansion::PrintOnly, text)) => {
            let _ = writeln!(output, "{text}");
            // The expansion still enters the history for recall.
            editor.history_mut().add(text);
            None
        }
        Err(err) => {
            let _ = writeln!(output, "{err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn editor() -> Editor {
        let mut editor = Editor::scripted(vec![], Box::new(std::io::sink()));
        for line in ["echo one", "echo two", "echo three"] {
            editor.history_mut().add(line);
        }
        editor
    }

    fn run_history(
        editor: &mut Editor,
        file_state: &mut HistoryFileState,
        args: &[&str],
    ) -> (ExitStatus, String) {
        let args: Vec<String> = args.iter().map(ToString::to_string).collect();
        let mut output = vec![];
        let status = run(&args, editor, file_state, &mut output);
        (status, String::from_utf8_lossy(&output).into_owned())
    }

    #[test]
    fn listing_numbers_entries() {
        let mut editor = editor();
        let mut state = HistoryFileState::default();
        let (status, out) = run_history(&mut editor, &mut state, &[]);
        assert_eq!(status, ExitStatus::Success);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("1  echo one"));
        assert!(lines[2].contains("3  echo three"));
    }

    #[test]
    fn listing_with_count_shows_tail() {
        let mut editor = editor();
        let mut state = HistoryFileState::default();
        let (_, out) = run_history(&mut editor, &mut state, &["2"]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("echo two"));
    }

    #[test]
    fn clear_empties_history() {
        let mut editor = editor();
        let mut state = HistoryFileState::default();
        let (status, _) = run_history(&mut editor, &mut state, &["-c"]);
        assert_eq!(status, ExitStatus::Success);
        assert_eq!(editor.history().len(), 0);
    }

    #[test]
    fn delete_by_number_and_negative_offset() {
        let mut editor = editor();
        let mut state = HistoryFileState::default();
        let (status, _) = run_history(&mut editor, &mut state, &["-d", "2"]);
        assert_eq!(status, ExitStatus::Success);
        assert_eq!(editor.history().len(), 2);
        assert_eq!(
            editor.history().get(1).map(|e| e.line.as_str()),
            Some("echo three")
        );

        let (status, _) = run_history(&mut editor, &mut state, &["-d", "-1"]);
        assert_eq!(status, ExitStatus::Success);
        assert_eq!(
            editor.history().get(editor.history().len() - 1).map(|e| e.line.as_str()),
            Some("echo one")
        );

        let (status, out) = run_history(&mut editor, &mut state, &["-d", "99"]);
        assert_eq!(status, ExitStatus::GeneralError);
        assert!(out.contains("out of range"));
    }

    #[test]
    fn store_adds_without_executing() {
        let mut editor = editor();
        let mut state = HistoryFileState::default();
        let (status, _) = run_history(&mut editor, &mut state, &["-s", "not", "run"]);
        assert_eq!(status, ExitStatus::Success);
        assert_eq!(
            editor.history().get(3).map(|e| e.line.as_str()),
            Some("not run")
        );
    }

    #[test]
    fn expand_prints_result() {
        let mut editor = editor();
        let mut state = HistoryFileState::default();
        let (status, out) = run_history(&mut editor, &mut state, &["-p", "!!:0"]);
        assert_eq!(status, ExitStatus::Success);
        assert_eq!(out.trim(), "echo");
    }

    #[test]
    fn write_and_append_track_new_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");

        let mut editor = editor();
        let mut state = HistoryFileState {
            path: Some(path.clone()),
            appended: 0,
        };

        let (status, _) = run_history(&mut editor, &mut state, &["-w"]);
        assert_eq!(status, ExitStatus::Success);
        assert_eq!(state.appended, 3);

        editor.history_mut().add("echo four");
        let (status, _) = run_history(&mut editor, &mut state, &["-a"]);
        assert_eq!(status, ExitStatus::Success);

        let mut reread = reel_history::History::new();
        reread.read_file(Some(&path)).unwrap();
        assert_eq!(reread.len(), 4);
        assert_eq!(
            reread.get(3).map(|e| e.line.as_str()),
            Some("echo four")
        );
    }

    #[test]
    fn expansion_for_execution_reports_errors() {
        let mut editor = editor();
        let mut output = vec![];
        let result = expand_for_execution(&mut editor, "!xyzzy", &mut output);
        assert_eq!(result, None);
        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("event not found"));
    }

    #[test]
    fn expansion_for_execution_scenario_substring() {
        // History: echo one / echo two / echo three; `!?tw?` runs echo two
        // and remembers the search string.
        let mut editor = editor();
        let mut output = vec![];
        let result = expand_for_execution(&mut editor, "!?tw?", &mut output);
        assert_eq!(result, Some("echo two".to_string()));
        assert_eq!(editor.history().last_search_string(), Some("tw"));
    }
}
