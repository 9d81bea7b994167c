//! Parsing the inputrc startup file: variable settings, conditional
//! directives, and key bindings.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::commands::Command;
use crate::editor::Editor;
use crate::error::Error;
use crate::keymap::{ESC, RUBOUT, Slot, ctrl, meta};
use crate::keyseq;
use crate::options::VarEffect;
use crate::trace_categories;

/// Major * 10 + minor, compared by `$if version` conditions.
const VERSION_FOR_IF: i64 = 1;

/// Conditional-inclusion state carried through one parse.
#[derive(Debug, Default)]
struct ParseState {
    if_stack: Vec<bool>,
    skipping: bool,
    file: String,
    lineno: usize,
    depth: usize,
}

impl ParseState {
    fn error(&self, message: &str) {
        if self.file.is_empty() {
            eprintln!("readline: {message}");
        } else {
            eprintln!("readline: {}: line {}: {message}", self.file, self.lineno);
        }
    }
}

/// What a single binding line resolved to.
#[derive(Debug, PartialEq, Eq)]
enum BindingAction {
    Function(String),
    Macro(String),
}

peg::parser! {
    grammar inputrc_line() for str {
        rule _() = [' ' | '\t']*

        /// `"KEYSEQ": function-or-macro` (new-style binding). Anything
        /// after the action is ignored.
        pub rule quoted_binding() -> (String, BindingAction) =
            _ "\"" seq:seq_body() "\"" _ ":" _ action:action() _ [_]* {
                (seq, action)
            }

        /// `"KEYSEQ":= ...` equivalency bindings are recognized so they can
        /// be explicitly ignored.
        pub rule equivalency() -> String =
            _ "\"" seq:seq_body() "\"" _ ":=" [_]* { seq }

        /// `KEYNAME: function-or-macro` (old-style binding).
        pub rule keyname_binding() -> (String, BindingAction) =
            _ name:$((!([' ' | '\t' | ':']) [_])+) _ ":" _ action:action() _ [_]* {
                (name.to_string(), action)
            }

        rule seq_body() -> String =
            s:$((escaped() / (!dquote() [_]))*) { s.to_string() }

        rule dquote() = "\""
        rule escaped() = "\\" [_]

        rule action() -> BindingAction =
            "\"" m:$((escaped() / (!dquote() [_]))*) "\"" { BindingAction::Macro(m.to_string()) } /
            "'" m:$((!"'" [_])*) "'" { BindingAction::Macro(m.to_string()) } /
            f:$((![' ' | '\t'] [_])+) { BindingAction::Function(f.to_string()) }
    }
}

/// Resolves a key name from the old-style syntax (`Control-u`,
/// `Meta-Rubout`, `DEL`, ...).
fn glean_key_from_name(name: &str) -> Option<u8> {
    let upper = name.to_ascii_uppercase();
    let key = match upper.as_str() {
        "DEL" | "RUBOUT" => RUBOUT,
        "ESC" | "ESCAPE" => ESC,
        "LFD" | "NEWLINE" => b'\n',
        "RET" | "RETURN" => b'\r',
        "SPACE" | "SPC" => b' ',
        "TAB" => b'\t',
        _ => {
            let mut chars = name.chars();
            let c = chars.next()?;
            if chars.next().is_some() || !c.is_ascii() {
                return None;
            }
            c as u8
        }
    };
    Some(key)
}

fn parse_comparison_op(s: &str) -> Option<(&'static str, &str)> {
    for op in ["==", "!=", "<=", ">=", "=", "<", ">"] {
        if let Some(rest) = s.strip_prefix(op) {
            let canonical = if op == "==" { "=" } else { op };
            return Some((canonical, rest));
        }
    }
    None
}

impl Editor {
    /// Reads key bindings and variable assignments from an inputrc-style
    /// file. With no path, the default resolution order is: the file used
    /// by the previous call, `$INPUTRC`, `~/.inputrc`, `/etc/inputrc`.
    pub fn read_init_file(&mut self, path: Option<&Path>) -> Result<(), Error> {
        let mut state = ParseState::default();

        if let Some(path) = path {
            let path = path.to_path_buf();
            self.read_init_file_at(&path, &mut state)?;
            self.last_inputrc = Some(path);
            return Ok(());
        }

        if let Some(previous) = self.last_inputrc.clone() {
            return self.read_init_file_at(&previous, &mut state);
        }

        if let Ok(from_env) = std::env::var("INPUTRC") {
            if !from_env.is_empty() {
                let path = PathBuf::from(from_env);
                self.read_init_file_at(&path, &mut state)?;
                self.last_inputrc = Some(path);
                return Ok(());
            }
        }

        let home_rc = std::env::var("HOME")
            .ok()
            .filter(|h| !h.is_empty())
            .map(|h| Path::new(&h).join(".inputrc"));
        if let Some(path) = home_rc {
            if self.read_init_file_at(&path, &mut state).is_ok() {
                self.last_inputrc = Some(path);
                return Ok(());
            }
        }

        let etc = PathBuf::from("/etc/inputrc");
        self.read_init_file_at(&etc, &mut state)?;
        self.last_inputrc = Some(etc);
        Ok(())
    }

    fn read_init_file_at(&mut self, path: &Path, state: &mut ParseState) -> Result<(), Error> {
        let contents = std::fs::read_to_string(tilde_expand(path))?;

        tracing::debug!(target: trace_categories::BINDINGS,
            "reading bindings from {}", path.display());

        let saved_file = std::mem::replace(&mut state.file, path.display().to_string());
        let saved_lineno = state.lineno;
        state.lineno = 0;

        for raw_line in contents.lines() {
            state.lineno += 1;
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
            self.parse_line(line, state);
        }

        state.file = saved_file;
        state.lineno = saved_lineno;
        Ok(())
    }

    /// Parses and applies a single inputrc-style line, as the `bind`
    /// builtin does for its arguments.
    pub fn parse_and_bind(&mut self, line: &str) -> Result<(), Error> {
        let mut state = ParseState::default();
        self.parse_line(line, &mut state);
        Ok(())
    }

    fn parse_line(&mut self, line: &str, state: &mut ParseState) {
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') {
            return;
        }

        // Parser directives work even while skipping; everything else is
        // suppressed inside a false conditional.
        if let Some(directive) = line.strip_prefix('$') {
            self.handle_directive(directive, state);
            return;
        }

        if state.skipping {
            return;
        }

        if let Some(rest) = line.strip_prefix("set ").or_else(|| line.strip_prefix("set\t")) {
            self.handle_set(rest.trim_start(), state);
            return;
        }

        if let Ok(seq) = inputrc_line::equivalency(line) {
            // Parsed and deliberately dropped; equivalency bindings are
            // unimplemented.
            tracing::debug!(target: trace_categories::BINDINGS,
                "ignoring equivalency binding for \"{seq}\"");
            return;
        }

        if let Ok((seq, action)) = inputrc_line::quoted_binding(line) {
            if let Ok(bytes) = keyseq::translate_keyseq(&seq, self.vars.convert_meta) {
                self.apply_binding(&bytes, &action, state);
            } else {
                state.error(&format!("`{seq}': invalid key sequence"));
            }
            return;
        }

        if let Ok((keyname, action)) = inputrc_line::keyname_binding(line) {
            self.apply_keyname_binding(&keyname, &action, state);
            return;
        }

        state.error(&format!("`{line}': invalid key binding: missing key sequence"));
    }

    fn handle_directive(&mut self, directive: &str, state: &mut ParseState) {
        let mut parts = directive.trim().splitn(2, [' ', '\t']);
        let name = parts.next().unwrap_or_default();
        let args = parts.next().unwrap_or("").trim();

        match name.to_ascii_lowercase().as_str() {
            "if" => {
                state.if_stack.push(state.skipping);
                // Once parsing is off, only the matching endif turns it on.
                if !state.skipping {
                    state.skipping = !self.eval_if_condition(args, state);
                }
            }
            "else" => {
                if state.if_stack.is_empty() {
                    state.error("$else found without matching $if");
                    return;
                }
                // Only invert at top level: an enclosing false conditional
                // keeps everything off.
                if state.if_stack.iter().any(|outer| *outer) {
                    return;
                }
                state.skipping = !state.skipping;
            }
            "endif" => {
                if let Some(previous) = state.if_stack.pop() {
                    state.skipping = previous;
                } else {
                    state.error("$endif without matching $if");
                }
            }
            "include" => {
                if state.skipping {
                    return;
                }
                if state.depth >= 10 {
                    state.error("$include nested too deeply");
                    return;
                }
                state.depth += 1;
                let path = PathBuf::from(args);
                if let Err(err) = self.read_init_file_at(&path, state) {
                    state.error(&format!("{}: cannot read included file: {err}", args));
                }
                state.depth -= 1;
            }
            other => {
                state.error(&format!("{other}: unknown parser directive"));
            }
        }
    }

    fn eval_if_condition(&self, args: &str, state: &ParseState) -> bool {
        let lower = args.to_ascii_lowercase();

        if let Some(term) = lower.strip_prefix("term=") {
            let full = self.term.term_name.to_ascii_lowercase();
            let short = full.split('-').next().unwrap_or_default();
            return term == full || term == short;
        }

        if let Some(mode) = lower.strip_prefix("mode=") {
            let current = match self.vars.editing_mode {
                crate::options::EditingMode::Emacs => "emacs",
                crate::options::EditingMode::Vi => "vi",
            };
            return mode == current;
        }

        if let Some(rest) = lower.strip_prefix("version") {
            let rest = rest.trim_start();
            let Some((op, operand)) = parse_comparison_op(rest) else {
                state.error(&format!(
                    "comparison operator expected, found `{}'",
                    if rest.is_empty() { "end-of-line" } else { rest }
                ));
                return false;
            };
            let operand = operand.trim();
            let mut pieces = operand.splitn(2, '.');
            let major: i64 = pieces.next().unwrap_or("").trim().parse().unwrap_or(-1);
            let minor: i64 = pieces.next().unwrap_or("0").trim().parse().unwrap_or(0);
            if major < 0 {
                state.error(&format!("numeric argument expected, found `{operand}'"));
                return false;
            }
            let version_arg = major * 10 + minor;
            return match op {
                "=" => VERSION_FOR_IF == version_arg,
                "!=" => VERSION_FOR_IF != version_arg,
                "<" => VERSION_FOR_IF < version_arg,
                "<=" => VERSION_FOR_IF <= version_arg,
                ">" => VERSION_FOR_IF > version_arg,
                ">=" => VERSION_FOR_IF >= version_arg,
                _ => false,
            };
        }

        // Application name equality.
        if lower == self.app_name.to_ascii_lowercase() {
            return true;
        }

        // Variable comparison: VAR = VALUE (or ==, !=).
        let mut split = args.splitn(2, |c: char| c == '=' || c == '!');
        let var_name = split.next().unwrap_or("").trim();
        if self.vars.value_of(var_name).is_some() {
            let rest = args[var_name.len()..].trim_start();
            let Some((op, operand)) = parse_comparison_op(rest) else {
                state.error(&format!(
                    "equality comparison operator expected, found `{}'",
                    if rest.is_empty() { "end-of-line" } else { rest }
                ));
                return false;
            };
            if op != "=" && op != "!=" {
                state.error(&format!("equality comparison operator expected, found `{op}'"));
                return false;
            }
            let operand = operand.trim();
            let value = self.vars.value_of(var_name).unwrap_or_default();
            let equal = value.eq_ignore_ascii_case(operand);
            return if op == "=" { equal } else { !equal };
        }

        // An unknown left-hand side turns parsing off.
        false
    }

    fn handle_set(&mut self, rest: &str, state: &ParseState) {
        let mut parts = rest.splitn(2, [' ', '\t']);
        let name = parts.next().unwrap_or_default();
        let raw_value = parts.next().unwrap_or("").trim();

        // Boolean variables take a single whitespace-delimited word; string
        // variables may be quoted.
        let value = if self.vars.is_boolean(name) {
            raw_value
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string()
        } else if raw_value.starts_with('"') {
            let inner = raw_value
                .strip_prefix('"')
                .and_then(|v| v.split('"').next())
                .unwrap_or_default();
            inner.to_string()
        } else {
            raw_value.to_string()
        };

        match self.vars.set(name, &value) {
            Ok(VarEffect::None) => {}
            Ok(VarEffect::EditingMode(mode)) => {
                self.active_keymap = match mode {
                    crate::options::EditingMode::Emacs => "emacs".to_string(),
                    crate::options::EditingMode::Vi => "vi-insert".to_string(),
                };
            }
            Ok(VarEffect::Keymap(name)) => {
                if self.set_active_keymap(&name).is_err() {
                    state.error(&format!("{name}: unknown keymap name"));
                }
            }
            Ok(VarEffect::HistorySize(Some(size))) => self.history.stifle(size),
            Ok(VarEffect::HistorySize(None)) => {
                let _ = self.history.unstifle();
            }
            Err(err) => state.error(&err.to_string()),
        }
    }

    fn apply_binding(&mut self, bytes: &[u8], action: &BindingAction, state: &ParseState) {
        let slot = match action {
            BindingAction::Macro(body) => {
                match keyseq::translate_keyseq(body, false) {
                    Ok(expansion) => Slot::Macro(expansion),
                    Err(_) => {
                        state.error(&format!("`{body}': invalid macro body"));
                        return;
                    }
                }
            }
            BindingAction::Function(name) => match Command::from_str(name) {
                Ok(command) => Slot::Command(command),
                Err(_) => {
                    state.error(&format!("{name}: unknown function name"));
                    Slot::Unbound
                }
            },
        };

        let root = self.active_keymap.clone();
        if let Some(map) = self.keymaps.root_mut(&root) {
            if let Err(err) = map.generic_bind(bytes, slot) {
                state.error(&err.to_string());
            }
        }
    }

    fn apply_keyname_binding(
        &mut self,
        keyname: &str,
        action: &BindingAction,
        state: &ParseState,
    ) {
        let mut rest = keyname;
        let mut has_control = false;
        let mut has_meta = false;

        loop {
            if let Some(stripped) = strip_prefix_ci(rest, &["control-", "ctrl-", "c-"]) {
                has_control = true;
                rest = stripped;
            } else if let Some(stripped) = strip_prefix_ci(rest, &["meta-", "m-"]) {
                has_meta = true;
                rest = stripped;
            } else {
                break;
            }
        }

        let Some(mut key) = glean_key_from_name(rest) else {
            state.error(&format!("{keyname}: unknown key name"));
            return;
        };

        if has_control {
            key = if key == b'?' {
                RUBOUT
            } else {
                ctrl(key.to_ascii_uppercase())
            };
        }

        let bytes = if has_meta {
            if self.vars.convert_meta {
                vec![ESC, key]
            } else {
                vec![meta(key)]
            }
        } else {
            vec![key]
        };

        self.apply_binding(&bytes, action, state);
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    for prefix in prefixes {
        if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
            return Some(&s[prefix.len()..]);
        }
    }
    None
}

fn tilde_expand(path: &Path) -> PathBuf {
    let Some(s) = path.to_str() else {
        return path.to_path_buf();
    };
    if let Some(rest) = s.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            if !home.is_empty() {
                return Path::new(&home).join(rest);
            }
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::test_support::editor_with_input;
    use crate::options::EditingMode;
    use pretty_assertions::assert_eq;
    use std::io::Write as _;

    fn editor() -> Editor {
        editor_with_input(vec![])
    }

    fn lookup(editor: &Editor, seq: &[u8]) -> Slot {
        editor
            .keymaps()
            .root(editor.active_keymap_name())
            .unwrap()
            .lookup(seq)
            .clone()
    }

    #[test]
    fn set_and_bind_lines() {
        let mut editor = editor();
        editor.parse_and_bind("set bell-style none").unwrap();
        assert_eq!(
            editor.vars().bell_style,
            crate::terminal::BellStyle::None
        );

        editor
            .parse_and_bind(r#""\C-xm": "echo hi""#)
            .unwrap();
        assert_eq!(
            lookup(&editor, &[ctrl(b'X'), b'm']),
            Slot::Macro(b"echo hi".to_vec())
        );

        editor
            .parse_and_bind(r#""\C-t": kill-whole-line"#)
            .unwrap();
        assert_eq!(
            lookup(&editor, &[ctrl(b'T')]),
            Slot::Command(Command::KillWholeLine)
        );
    }

    #[test]
    fn keyname_bindings() {
        let mut editor = editor();
        editor
            .parse_and_bind("Control-u: universal-argument")
            .unwrap();
        assert_eq!(
            lookup(&editor, &[ctrl(b'U')]),
            Slot::Command(Command::UniversalArgument)
        );

        editor.vars.convert_meta = true;
        editor
            .parse_and_bind("Meta-Rubout: backward-kill-word")
            .unwrap();
        assert_eq!(
            lookup(&editor, &[ESC, RUBOUT]),
            Slot::Command(Command::BackwardKillWord)
        );

        editor.parse_and_bind("TAB: tab-insert").unwrap();
        assert_eq!(
            lookup(&editor, &[b'\t']),
            Slot::Command(Command::TabInsert)
        );
    }

    #[test]
    fn conditional_blocks_honor_editing_mode() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join("inputrc");
        let mut file = std::fs::File::create(&rc).unwrap();
        writeln!(file, "set editing-mode vi").unwrap();
        writeln!(file, "$if mode=emacs").unwrap();
        writeln!(file, "\"\\C-a\": kill-whole-line").unwrap();
        writeln!(file, "$endif").unwrap();
        drop(file);

        let mut editor = editor();
        editor.read_init_file(Some(&rc)).unwrap();

        assert_eq!(editor.vars().editing_mode, EditingMode::Vi);
        assert_eq!(editor.active_keymap_name(), "vi-insert");
        // The emacs-conditional binding must not have been applied.
        assert_ne!(
            lookup(&editor, &[ctrl(b'A')]),
            Slot::Command(Command::KillWholeLine)
        );
    }

    #[test]
    fn else_inverts_only_at_top_level() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join("inputrc");
        let mut file = std::fs::File::create(&rc).unwrap();
        writeln!(file, "$if mode=vi").unwrap();
        writeln!(file, "\"\\C-t\": abort").unwrap();
        writeln!(file, "$else").unwrap();
        writeln!(file, "\"\\C-t\": kill-whole-line").unwrap();
        writeln!(file, "$endif").unwrap();
        drop(file);

        let mut editor = editor();
        editor.read_init_file(Some(&rc)).unwrap();
        assert_eq!(
            lookup(&editor, &[ctrl(b'T')]),
            Slot::Command(Command::KillWholeLine)
        );
    }

    #[test]
    fn include_restores_outer_position() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("inner");
        std::fs::write(&inner, "\"\\C-xq\": abort\n").unwrap();

        let outer = dir.path().join("outer");
        std::fs::write(
            &outer,
            format!("$include {}\n\"\\C-xz\": kill-whole-line\n", inner.display()),
        )
        .unwrap();

        let mut editor = editor();
        editor.read_init_file(Some(&outer)).unwrap();
        assert_eq!(
            lookup(&editor, &[ctrl(b'X'), b'q']),
            Slot::Command(Command::Abort)
        );
        assert_eq!(
            lookup(&editor, &[ctrl(b'X'), b'z']),
            Slot::Command(Command::KillWholeLine)
        );
    }

    #[test]
    fn version_conditions() {
        let editor = editor();
        let state = ParseState::default();
        assert!(editor.eval_if_condition("version >= 0.1", &state));
        assert!(!editor.eval_if_condition("version > 99", &state));
    }

    #[test]
    fn variable_comparison_conditions() {
        let mut editor = editor();
        editor.parse_and_bind("set bell-style visible").unwrap();
        let state = ParseState::default();
        assert!(editor.eval_if_condition("bell-style=visible", &state));
        assert!(!editor.eval_if_condition("bell-style=none", &state));
        assert!(editor.eval_if_condition("bell-style != none", &state));
        // Unknown names turn parsing off.
        assert!(!editor.eval_if_condition("frobozz=1", &state));
    }

    #[test]
    fn equivalency_is_parsed_and_ignored() {
        let mut editor = editor();
        let before = lookup(&editor, &[ctrl(b'P')]);
        editor.parse_and_bind(r#""\C-p":= "\C-n""#).unwrap();
        assert_eq!(lookup(&editor, &[ctrl(b'P')]), before);
    }
}
