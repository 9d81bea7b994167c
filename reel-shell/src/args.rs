//! Command-line arguments for the shell driver.

use std::path::PathBuf;

/// An interactive shell front-end exercising the reel line editor.
#[derive(clap::Parser)]
#[command(name = "reel", version, about)]
pub(crate) struct ShellArgs {
    /// Do not read an inputrc file at startup.
    #[arg(long = "norc")]
    pub no_inputrc: bool,

    /// Read bindings from this file instead of the default inputrc.
    #[arg(long = "rcfile", value_name = "PATH")]
    pub inputrc: Option<PathBuf>,

    /// Use this history file (default: ~/.history).
    #[arg(long = "history-file", value_name = "PATH")]
    pub history_file: Option<PathBuf>,

    /// Do not load or save the history file.
    #[arg(long = "no-history-file")]
    pub no_history_file: bool,

    /// Prompt string ('\x01'..'\x02' bracket non-printing escapes).
    #[arg(long = "prompt", default_value = "reel$ ")]
    pub prompt: String,

    /// Tracing filter (e.g. "input=debug,history=trace").
    #[arg(long = "log-filter", env = "REEL_LOG", value_name = "FILTER")]
    pub log_filter: Option<String>,
}
