//! Command history for an interactive shell: an ordered store of entry
//! lines with timestamps, csh-style history expansion (`!!`, `!n`, `^a^b^`,
//! word designators and modifiers), substring/prefix/pattern search, and
//! history-file persistence with atomic truncation.

mod error;
mod expand;
mod file;
mod list;
mod pattern;
mod search;
mod tokenize;

/// Trace categories used with the `tracing` crate.
pub mod trace_categories {
    /// Trace category for history expansion.
    pub const EXPANSION: &str = "expansion";
    /// Trace category for the history store and file persistence.
    pub const HISTORY: &str = "history";
}

pub use error::{Error, ExpansionError, ExpansionErrorKind};
pub use expand::Expansion;
pub use list::{Entry, EntryData, History};
pub use search::Direction;
