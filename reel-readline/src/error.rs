//! Error facilities

/// Unified error type for this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An editing command aborted (`C-g`).
    #[error("aborted")]
    Aborted,

    /// End of input was reached with nothing read.
    #[error("end of input")]
    Eof,

    /// A key sequence could not be translated.
    #[error("invalid key sequence: {0}")]
    InvalidKeySequence(String),

    /// An unknown named command was referenced.
    #[error("unknown command name: {0}")]
    UnknownCommand(String),

    /// An unknown keymap was referenced.
    #[error("unknown keymap: {0}")]
    UnknownKeymap(String),

    /// The terminal is missing or could not be configured.
    #[error("terminal error: {0}")]
    Terminal(String),

    /// An I/O error occurred.
    #[error("i/o error: {0}")]
    IoError(#[from] std::io::Error),

    /// A history operation failed.
    #[error(transparent)]
    History(#[from] reel_history::Error),

    /// A signal arrived that ends the current line.
    #[error("interrupted by signal {0}")]
    Signal(i32),
}

#[cfg(unix)]
impl From<nix::errno::Errno> for Error {
    fn from(errno: nix::errno::Errno) -> Self {
        Self::IoError(std::io::Error::from_raw_os_error(errno as i32))
    }
}
