//! Builtin-style commands (`bind`, `history`) layered over the editor and
//! history crates, with bash-compatible flag surfaces.

pub mod bind;
pub mod history;

use std::path::PathBuf;

/// Exit status of a builtin invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    /// The command succeeded.
    Success,
    /// The command failed.
    GeneralError,
    /// The command line itself was invalid.
    InvalidUsage,
}

impl ExitStatus {
    /// The numeric exit code.
    pub const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::GeneralError => 1,
            Self::InvalidUsage => 2,
        }
    }
}

/// Session state for the history file, shared between the `history`
/// builtin and the shell's exit path.
#[derive(Clone, Debug, Default)]
pub struct HistoryFileState {
    /// Where history is persisted; `None` uses the default location.
    pub path: Option<PathBuf>,
    /// How many entries have already been appended to the file this
    /// session (so `history -a` appends only new ones).
    pub appended: usize,
}

/// Dispatches a builtin by name. Returns `None` when the name is not a
/// builtin handled here.
pub fn invoke(
    name: &str,
    args: &[String],
    editor: &mut reel_readline::Editor,
    file_state: &mut HistoryFileState,
    output: &mut dyn std::io::Write,
) -> Option<ExitStatus> {
    match name {
        "bind" => Some(bind::run(args, editor, output)),
        "history" => Some(history::run(args, editor, file_state, output)),
        _ => None,
    }
}
