//! The read-expand-dispatch loop.

use std::io::Write as _;

use reel_builtins::{ExitStatus, HistoryFileState};
use reel_readline::{Editor, ReadResult};

use crate::args::ShellArgs;

pub(crate) fn run(args: &ShellArgs) -> i32 {
    install_tracing(args);

    let mut editor = match Editor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("reel: failed to initialize editor: {err}");
            return 1;
        }
    };

    editor.history_mut().comment_char = Some('#');

    if !args.no_inputrc {
        // A missing inputrc is not an error; parse problems inside one are
        // reported as they are found and do not stop us.
        let _ = editor.read_init_file(args.inputrc.as_deref());
    }

    let mut file_state = HistoryFileState {
        path: args.history_file.clone(),
        appended: 0,
    };

    if !args.no_history_file {
        if let Err(err) = editor.history_mut().read_file(file_state.path.as_deref()) {
            tracing::debug!(target: reel_history::trace_categories::HISTORY,
                "no history file loaded: {err}");
        }
        file_state.appended = editor.history().len();
    }

    let mut last_status = ExitStatus::Success;

    loop {
        match editor.read_line(&args.prompt) {
            Ok(ReadResult::Input(line)) => {
                if line.trim().is_empty() {
                    continue;
                }

                let mut stdout = std::io::stdout();
                let Some(expanded) =
                    reel_builtins::history::expand_for_execution(&mut editor, &line, &mut stdout)
                else {
                    let _ = stdout.flush();
                    continue;
                };

                editor.history_mut().add(expanded.clone());
                last_status = dispatch(&expanded, &mut editor, &mut file_state, &mut stdout);
                let _ = stdout.flush();

                if expanded.trim() == "exit" {
                    break;
                }
            }
            Ok(ReadResult::Eof) => break,
            Ok(ReadResult::Interrupted) => {
                last_status = ExitStatus::GeneralError;
            }
            Err(err) => {
                eprintln!("reel: {err}");
                return 1;
            }
        }
    }

    if !args.no_history_file {
        save_history(&mut editor, &file_state);
    }

    i32::from(last_status.code())
}

/// Runs a builtin line, or echoes it (command execution proper is not this
/// program's business).
fn dispatch(
    line: &str,
    editor: &mut Editor,
    file_state: &mut HistoryFileState,
    stdout: &mut dyn std::io::Write,
) -> ExitStatus {
    let words: Vec<String> = line.split_whitespace().map(ToString::to_string).collect();
    let Some((name, rest)) = words.split_first() else {
        return ExitStatus::Success;
    };

    if name == "exit" {
        return ExitStatus::Success;
    }

    if let Some(status) = reel_builtins::invoke(name, rest, editor, file_state, stdout) {
        return status;
    }

    let _ = writeln!(stdout, "{line}");
    ExitStatus::Success
}

fn save_history(editor: &mut Editor, file_state: &HistoryFileState) {
    let history = editor.history_mut();
    if let Err(err) = history.write_file(file_state.path.as_deref()) {
        tracing::debug!(target: reel_history::trace_categories::HISTORY,
            "failed to save history: {err}");
        return;
    }

    // Honor a `history-size` stifle bound on the file as well.
    if let Some(max) = history.max_entries() {
        let _ = history.truncate_file(file_state.path.as_deref(), max);
    }
}

fn install_tracing(args: &ShellArgs) {
    use tracing_subscriber::EnvFilter;

    let filter = args
        .log_filter
        .as_deref()
        .map_or_else(EnvFilter::default, EnvFilter::new);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
