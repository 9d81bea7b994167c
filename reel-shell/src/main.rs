//! Interactive driver: reads lines with full editing, performs history
//! expansion, dispatches the `bind` and `history` builtins, and persists
//! the history file.

mod args;
mod repl;

use clap::Parser as _;

fn main() {
    let parsed = args::ShellArgs::parse();
    let code = repl::run(&parsed);
    std::process::exit(code);
}
