//! Error facilities

/// Unified error type for this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No history file path was given and none could be derived from the
    /// environment.
    #[error("cannot determine history file location")]
    NoHistoryFilePath,

    /// The history file is not a regular file.
    #[error("history file is not a regular file: {0}")]
    NotARegularFile(std::path::PathBuf),

    /// The referenced history entry does not exist.
    #[error("history position out of range: {0}")]
    PositionOutOfRange(usize),

    /// An I/O error occurred.
    #[error("i/o error: {0}")]
    IoError(#[from] std::io::Error),

    /// A history expansion failed.
    #[error(transparent)]
    Expansion(#[from] ExpansionError),
}

/// Error produced by a failed history expansion. Displays as the offending
/// specifier text followed by a description, e.g. `!xyzzy: event not found`;
/// the shell proper prints this and refuses to execute the line.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("{spec}: {kind}")]
pub struct ExpansionError {
    /// The specifier text that failed to expand.
    pub spec: String,
    /// What went wrong.
    pub kind: ExpansionErrorKind,
}

impl ExpansionError {
    pub(crate) fn new(spec: impl Into<String>, kind: ExpansionErrorKind) -> Self {
        Self {
            spec: spec.into(),
            kind,
        }
    }
}

/// The ways a history expansion can fail.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionErrorKind {
    /// The event designator did not resolve to a history entry.
    #[error("event not found")]
    EventNotFound,

    /// A word designator selected words the event does not have.
    #[error("bad word specifier")]
    BadWordSpecifier,

    /// A `:s` (or `:&`) modifier found nothing to replace.
    #[error("substitution failed")]
    SubstitutionFailed,

    /// An unknown character followed `:`.
    #[error("unrecognized history modifier")]
    BadModifier,

    /// `:&` or an empty `:s` lhs with no previous substitution to reuse.
    #[error("no previous substitution")]
    NoPreviousSubstitution,
}
