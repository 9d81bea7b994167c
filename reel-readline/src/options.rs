//! User-settable readline variables (`set name value` in an inputrc).

use crate::keyseq;
use crate::terminal::BellStyle;

/// The two editing personalities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EditingMode {
    /// Emacs-style editing (the default).
    #[default]
    Emacs,
    /// Vi-style modal editing.
    Vi,
}

/// Effects a variable assignment can have beyond updating stored state; the
/// editor applies these (they touch keymaps or the history list).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VarEffect {
    /// Nothing further to do.
    None,
    /// The editing mode changed; switch the active keymap.
    EditingMode(EditingMode),
    /// Switch the active keymap by name.
    Keymap(String),
    /// Stifle the history to this size (or unstifle if `None`).
    HistorySize(Option<usize>),
}

/// Why a variable assignment failed.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum VarError {
    /// No variable has the given name.
    #[error("{0}: unknown variable name")]
    Unknown(String),
    /// The value is not valid for the variable.
    #[error("{0}: could not set value to `{1}'")]
    BadValue(String, String),
}

/// A boolean value in a `set` command is true if the value is empty, `on`
/// (case-insensitively), or `1`.
fn str_to_bool(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("on") || value == "1"
}

const fn onoff(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

/// The full set of user-settable variables, with shell-style defaults.
#[derive(Clone, Debug)]
pub struct Variables {
    /// Attempt to bind the terminal's special characters to their readline
    /// equivalents.
    pub bind_tty_special_chars: bool,
    /// Briefly move the cursor to a matching open paren on insert.
    pub blink_matching_paren: bool,
    /// Treat input as a byte sequence rather than multibyte characters.
    pub byte_oriented: bool,
    /// Convert high-bit input bytes to an ESC prefix plus the stripped byte.
    pub convert_meta: bool,
    /// Echo the control character that corresponds to a delivered signal.
    pub echo_control_chars: bool,
    /// Surround pasted text with bracketed-paste markers.
    pub enable_bracketed_paste: bool,
    /// Put the keypad into transmit mode while editing.
    pub enable_keypad: bool,
    /// Ask the terminal to pass eight-bit input through.
    pub enable_meta_key: bool,
    /// Keep point at the same position when moving through history.
    pub history_preserve_point: bool,
    /// Scroll long lines horizontally on a single screen line instead of
    /// wrapping.
    pub horizontal_scroll_mode: bool,
    /// Accept eight-bit input (do not strip the high bit).
    pub input_meta: bool,
    /// Prefix modified history lines with `*` in the display.
    pub mark_modified_lines: bool,
    /// Display high-bit characters directly rather than as `\NNN` escapes.
    pub output_meta: bool,
    /// Use the visible bell when available.
    pub prefer_visible_bell: bool,
    /// Undo all modifications to history lines when a line is accepted.
    pub revert_all_at_newline: bool,
    /// Completion behavior flag, kept for inputrc compatibility.
    pub show_all_if_ambiguous: bool,
    /// Show a mode indicator string at the start of the prompt.
    pub show_mode_in_prompt: bool,

    /// How to ring the bell.
    pub bell_style: BellStyle,
    /// The string that begins an inserted comment.
    pub comment_begin: String,
    /// The editing mode in effect.
    pub editing_mode: EditingMode,
    /// Mode indicator for emacs mode.
    pub emacs_mode_string: String,
    /// Bytes that terminate an incremental search.
    pub isearch_terminators: Vec<u8>,
    /// Milliseconds to wait for an ambiguous key sequence to complete; zero
    /// waits forever.
    pub keyseq_timeout_ms: u32,
    /// Mode indicator for vi command mode.
    pub vi_cmd_mode_string: String,
    /// Mode indicator for vi insert mode.
    pub vi_ins_mode_string: String,
}

impl Default for Variables {
    fn default() -> Self {
        Self {
            bind_tty_special_chars: true,
            blink_matching_paren: false,
            byte_oriented: false,
            convert_meta: true,
            echo_control_chars: true,
            enable_bracketed_paste: true,
            enable_keypad: false,
            enable_meta_key: true,
            history_preserve_point: false,
            horizontal_scroll_mode: false,
            input_meta: false,
            mark_modified_lines: false,
            output_meta: false,
            prefer_visible_bell: false,
            revert_all_at_newline: false,
            show_all_if_ambiguous: false,
            show_mode_in_prompt: false,
            bell_style: BellStyle::Audible,
            comment_begin: "#".to_string(),
            editing_mode: EditingMode::Emacs,
            emacs_mode_string: "@".to_string(),
            isearch_terminators: vec![0x1b, 0x0a],
            keyseq_timeout_ms: 500,
            vi_cmd_mode_string: "(cmd)".to_string(),
            vi_ins_mode_string: "(ins)".to_string(),
        }
    }
}

impl Variables {
    /// Whether `name` names a boolean variable.
    pub fn is_boolean(&self, name: &str) -> bool {
        self.boolean_get(name).is_some()
    }

    fn boolean_get(&self, name: &str) -> Option<bool> {
        let name = name.to_ascii_lowercase();
        let value = match name.as_str() {
            "bind-tty-special-chars" => self.bind_tty_special_chars,
            "blink-matching-paren" => self.blink_matching_paren,
            "byte-oriented" => self.byte_oriented,
            "convert-meta" => self.convert_meta,
            "echo-control-characters" => self.echo_control_chars,
            "enable-bracketed-paste" => self.enable_bracketed_paste,
            "enable-keypad" => self.enable_keypad,
            "enable-meta-key" => self.enable_meta_key,
            "history-preserve-point" => self.history_preserve_point,
            "horizontal-scroll-mode" => self.horizontal_scroll_mode,
            "input-meta" | "meta-flag" => self.input_meta,
            "mark-modified-lines" => self.mark_modified_lines,
            "output-meta" => self.output_meta,
            "prefer-visible-bell" => self.prefer_visible_bell,
            "revert-all-at-newline" => self.revert_all_at_newline,
            "show-all-if-ambiguous" => self.show_all_if_ambiguous,
            "show-mode-in-prompt" => self.show_mode_in_prompt,
            _ => return None,
        };
        Some(value)
    }

    fn boolean_mut(&mut self, name: &str) -> Option<&mut bool> {
        let name = name.to_ascii_lowercase();
        let field = match name.as_str() {
            "bind-tty-special-chars" => &mut self.bind_tty_special_chars,
            "blink-matching-paren" => &mut self.blink_matching_paren,
            "byte-oriented" => &mut self.byte_oriented,
            "convert-meta" => &mut self.convert_meta,
            "echo-control-characters" => &mut self.echo_control_chars,
            "enable-bracketed-paste" => &mut self.enable_bracketed_paste,
            "enable-keypad" => &mut self.enable_keypad,
            "enable-meta-key" => &mut self.enable_meta_key,
            "history-preserve-point" => &mut self.history_preserve_point,
            "horizontal-scroll-mode" => &mut self.horizontal_scroll_mode,
            "input-meta" | "meta-flag" => &mut self.input_meta,
            "mark-modified-lines" => &mut self.mark_modified_lines,
            "output-meta" => &mut self.output_meta,
            "prefer-visible-bell" => &mut self.prefer_visible_bell,
            "revert-all-at-newline" => &mut self.revert_all_at_newline,
            "show-all-if-ambiguous" => &mut self.show_all_if_ambiguous,
            "show-mode-in-prompt" => &mut self.show_mode_in_prompt,
            _ => return None,
        };
        Some(field)
    }

    /// Assigns a variable by name. Returns the side effect the caller must
    /// apply, or an error when the name or value is not recognized.
    pub fn set(&mut self, name: &str, value: &str) -> Result<VarEffect, VarError> {
        if let Some(field) = self.boolean_mut(name) {
            *field = str_to_bool(value);
            if name.eq_ignore_ascii_case("prefer-visible-bell") {
                self.bell_style = if self.prefer_visible_bell {
                    BellStyle::Visible
                } else {
                    BellStyle::Audible
                };
            }
            return Ok(VarEffect::None);
        }

        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "bell-style" => {
                self.bell_style = match value.to_ascii_lowercase().as_str() {
                    "" | "audible" | "on" => BellStyle::Audible,
                    "none" | "off" => BellStyle::None,
                    "visible" => BellStyle::Visible,
                    _ => return Err(VarError::BadValue(lower, value.to_string())),
                };
                Ok(VarEffect::None)
            }
            "comment-begin" => {
                if value.is_empty() {
                    return Err(VarError::BadValue(lower, value.to_string()));
                }
                self.comment_begin = value.to_string();
                Ok(VarEffect::None)
            }
            "editing-mode" => {
                let mode = if value.len() >= 2 && value[..2].eq_ignore_ascii_case("vi") {
                    EditingMode::Vi
                } else if value.to_ascii_lowercase().starts_with("emacs") {
                    EditingMode::Emacs
                } else {
                    return Err(VarError::BadValue(lower, value.to_string()));
                };
                self.editing_mode = mode;
                Ok(VarEffect::EditingMode(mode))
            }
            "emacs-mode-string" => {
                self.emacs_mode_string = translate_mode_string(value);
                Ok(VarEffect::None)
            }
            "history-size" => {
                let parsed: i64 = value.trim().parse().unwrap_or(500);
                if parsed < 0 {
                    Ok(VarEffect::HistorySize(None))
                } else {
                    Ok(VarEffect::HistorySize(usize::try_from(parsed).ok()))
                }
            }
            "isearch-terminators" => {
                let inner = strip_quotes(value);
                let bytes = keyseq::translate_keyseq(inner, false)
                    .map_err(|_| VarError::BadValue(lower.clone(), value.to_string()))?;
                self.isearch_terminators = bytes;
                Ok(VarEffect::None)
            }
            "keymap" => Ok(VarEffect::Keymap(value.to_string())),
            "keyseq-timeout" => {
                let parsed: i64 = value.trim().parse().unwrap_or(0);
                self.keyseq_timeout_ms = u32::try_from(parsed.max(0)).unwrap_or(0);
                Ok(VarEffect::None)
            }
            "vi-cmd-mode-string" => {
                self.vi_cmd_mode_string = translate_mode_string(value);
                Ok(VarEffect::None)
            }
            "vi-ins-mode-string" => {
                self.vi_ins_mode_string = translate_mode_string(value);
                Ok(VarEffect::None)
            }
            _ => Err(VarError::Unknown(name.to_string())),
        }
    }

    /// The displayable value of a variable, for `$if var == value` and for
    /// the `bind` listings. Unknown names yield `None`.
    pub fn value_of(&self, name: &str) -> Option<String> {
        if let Some(value) = self.boolean_get(name) {
            return Some(onoff(value).to_string());
        }

        let value = match name.to_ascii_lowercase().as_str() {
            "bell-style" => match self.bell_style {
                BellStyle::None => "none".to_string(),
                BellStyle::Audible => "audible".to_string(),
                BellStyle::Visible => "visible".to_string(),
            },
            "comment-begin" => self.comment_begin.clone(),
            "editing-mode" => match self.editing_mode {
                EditingMode::Emacs => "emacs".to_string(),
                EditingMode::Vi => "vi".to_string(),
            },
            "emacs-mode-string" => self.emacs_mode_string.clone(),
            "isearch-terminators" => keyseq::untranslate_seq(&self.isearch_terminators, true),
            "keyseq-timeout" => self.keyseq_timeout_ms.to_string(),
            "vi-cmd-mode-string" => self.vi_cmd_mode_string.clone(),
            "vi-ins-mode-string" => self.vi_ins_mode_string.clone(),
            _ => return None,
        };
        Some(value)
    }

    /// All boolean variables with their current values, sorted by name.
    pub fn booleans(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("bind-tty-special-chars", self.bind_tty_special_chars),
            ("blink-matching-paren", self.blink_matching_paren),
            ("byte-oriented", self.byte_oriented),
            ("convert-meta", self.convert_meta),
            ("echo-control-characters", self.echo_control_chars),
            ("enable-bracketed-paste", self.enable_bracketed_paste),
            ("enable-keypad", self.enable_keypad),
            ("enable-meta-key", self.enable_meta_key),
            ("history-preserve-point", self.history_preserve_point),
            ("horizontal-scroll-mode", self.horizontal_scroll_mode),
            ("input-meta", self.input_meta),
            ("mark-modified-lines", self.mark_modified_lines),
            ("output-meta", self.output_meta),
            ("prefer-visible-bell", self.prefer_visible_bell),
            ("revert-all-at-newline", self.revert_all_at_newline),
            ("show-all-if-ambiguous", self.show_all_if_ambiguous),
            ("show-mode-in-prompt", self.show_mode_in_prompt),
        ]
    }

    /// All string-valued variables with their current display values.
    pub fn strings(&self) -> Vec<(&'static str, String)> {
        [
            "bell-style",
            "comment-begin",
            "editing-mode",
            "emacs-mode-string",
            "isearch-terminators",
            "keyseq-timeout",
            "vi-cmd-mode-string",
            "vi-ins-mode-string",
        ]
        .iter()
        .filter_map(|name| self.value_of(name).map(|v| (*name, v)))
        .collect()
    }
}

/// Mode strings may carry key-sequence escapes (to embed color codes).
fn translate_mode_string(value: &str) -> String {
    let inner = strip_quotes(value);
    keyseq::translate_keyseq(inner, false)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_else(|_| inner.to_string())
}

fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 && (bytes[0] == b'"' || bytes[0] == b'\'') && bytes[bytes.len() - 1] == bytes[0]
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn booleans_accept_on_off_and_empty() {
        let mut vars = Variables::default();
        assert_eq!(vars.set("input-meta", "on"), Ok(VarEffect::None));
        assert!(vars.input_meta);
        assert_eq!(vars.set("Input-Meta", "off"), Ok(VarEffect::None));
        assert!(!vars.input_meta);
        assert_eq!(vars.set("meta-flag", ""), Ok(VarEffect::None));
        assert!(vars.input_meta);
        assert_eq!(vars.set("input-meta", "1"), Ok(VarEffect::None));
        assert!(vars.input_meta);
    }

    #[test]
    fn unknown_variable_reports_error() {
        let mut vars = Variables::default();
        assert_eq!(
            vars.set("no-such-thing", "on"),
            Err(VarError::Unknown("no-such-thing".to_string()))
        );
    }

    #[test]
    fn editing_mode_side_effect() {
        let mut vars = Variables::default();
        assert_eq!(
            vars.set("editing-mode", "vi"),
            Ok(VarEffect::EditingMode(EditingMode::Vi))
        );
        assert_eq!(vars.value_of("editing-mode"), Some("vi".to_string()));
    }

    #[test]
    fn history_size_effects() {
        let mut vars = Variables::default();
        assert_eq!(
            vars.set("history-size", "100"),
            Ok(VarEffect::HistorySize(Some(100)))
        );
        assert_eq!(
            vars.set("history-size", "-1"),
            Ok(VarEffect::HistorySize(None))
        );
    }

    #[test]
    fn isearch_terminators_translate() {
        let mut vars = Variables::default();
        vars.set("isearch-terminators", r"\C-g\C-j").unwrap();
        assert_eq!(vars.isearch_terminators, vec![0x07, 0x0a]);
    }

    #[test]
    fn bell_style_values() {
        let mut vars = Variables::default();
        vars.set("bell-style", "none").unwrap();
        assert_eq!(vars.bell_style, BellStyle::None);
        vars.set("bell-style", "visible").unwrap();
        assert_eq!(vars.bell_style, BellStyle::Visible);
        assert!(vars.set("bell-style", "loud").is_err());
    }

    #[test]
    fn value_of_booleans() {
        let vars = Variables::default();
        assert_eq!(vars.value_of("convert-meta"), Some("on".to_string()));
        assert_eq!(vars.value_of("output-meta"), Some("off".to_string()));
        assert_eq!(vars.value_of("bogus"), None);
    }
}
