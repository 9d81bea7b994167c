//! A keymap-driven terminal line editor in the readline tradition: emacs
//! and vi keymaps with shadowed prefix bindings, an inputrc parser with
//! conditional directives, differential redisplay with multibyte and
//! invisible-prompt awareness, incremental and non-incremental history
//! search, and deferred signal handling.

mod bindings;
mod commands;
mod dispatch;
mod display;
mod editor;
mod error;
mod input;
mod inputrc;
mod isearch;
mod keymap;
mod keyseq;
mod kill;
mod line;
mod mbutil;
mod options;
mod prompt;
mod signals;
mod terminal;
mod text;
mod undo;

pub mod trace_categories;

pub use commands::Command;
pub use editor::{Editor, ReadResult};
pub use error::Error;
pub use keymap::{ANYOTHERKEY, KEYMAP_SIZE, Keymap, KeymapLocation, Keymaps, Slot};
pub use keyseq::{translate_keyseq, untranslate_key, untranslate_seq};
pub use line::LineBuffer;
pub use options::{EditingMode, VarEffect, VarError, Variables};
pub use prompt::{PROMPT_END_IGNORE, PROMPT_START_IGNORE, PromptInfo};
pub use terminal::BellStyle;
