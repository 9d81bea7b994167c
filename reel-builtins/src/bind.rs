//! The `bind` builtin: inspect and modify key bindings and editor
//! variables.

use std::io::Write;

use clap::Parser;
use itertools::Itertools as _;
use strum::IntoEnumIterator as _;

use reel_readline::{Command, Editor};

use crate::ExitStatus;

/// Inspect and modify key bindings and other input configuration.
#[derive(Parser)]
#[command(name = "bind", disable_help_flag = true)]
pub(crate) struct BindCommand {
    /// Name of key map to use for the duration of this command.
    #[arg(short = 'm', value_name = "KEYMAP")]
    keymap: Option<String>,
    /// List function names.
    #[arg(short = 'l')]
    list_funcs: bool,
    /// List functions and bindings.
    #[arg(short = 'P')]
    list_funcs_and_bindings: bool,
    /// List functions and bindings in a form suitable for reuse as input.
    #[arg(short = 'p')]
    list_funcs_and_bindings_reusable: bool,
    /// List key sequences that invoke macros.
    #[arg(short = 'S')]
    list_macros: bool,
    /// List key sequences that invoke macros, reusable as input.
    #[arg(short = 's')]
    list_macros_reusable: bool,
    /// List variable names and values.
    #[arg(short = 'V')]
    list_vars: bool,
    /// List variable names and values, reusable as input.
    #[arg(short = 'v')]
    list_vars_reusable: bool,
    /// Find the keys bound to the given named function.
    #[arg(short = 'q', value_name = "FUNC_NAME")]
    query_func_bindings: Option<String>,
    /// Remove all bindings for the given named function.
    #[arg(short = 'u', value_name = "FUNC_NAME")]
    remove_func_bindings: Option<String>,
    /// Remove the binding for the given key sequence.
    #[arg(short = 'r', value_name = "KEY_SEQ")]
    remove_key_seq_binding: Option<String>,
    /// Import bindings from the given file.
    #[arg(short = 'f', value_name = "PATH")]
    bindings_file: Option<String>,
    /// Bind a key sequence to a shell command (`"seq": command`).
    #[arg(short = 'x', value_name = "BINDING")]
    key_seq_shell_bindings: Vec<String>,
    /// List shell-command bindings installed with -x.
    #[arg(short = 'X')]
    list_shell_bindings: bool,
    /// Key sequence binding to a readline function or macro.
    key_sequence: Option<String>,
}

/// Errors specific to the bind builtin.
#[derive(Debug, thiserror::Error)]
pub(crate) enum BindError {
    /// Unknown function specified.
    #[error("bind: {0}: unknown function name")]
    UnknownFunction(String),

    /// Invalid shell-command binding specification.
    #[error("bind: {0}: missing colon separator or quoted key sequence")]
    InvalidShellBinding(String),

    /// An I/O error occurred.
    #[error("bind: i/o error: {0}")]
    IoError(#[from] std::io::Error),

    /// The editor rejected the operation.
    #[error("bind: {0}")]
    Editor(#[from] reel_readline::Error),
}

/// Entry point: parses arguments and runs the command.
pub(crate) fn run(args: &[String], editor: &mut Editor, output: &mut dyn Write) -> ExitStatus {
    let parsed = match BindCommand::try_parse_from(
        std::iter::once("bind".to_string()).chain(args.iter().cloned()),
    ) {
        Ok(parsed) => parsed,
        Err(err) => {
            let _ = writeln!(output, "{err}");
            return ExitStatus::InvalidUsage;
        }
    };

    // Operate on the requested keymap for the duration of the call.
    let saved_keymap = editor.active_keymap_name().to_string();
    if let Some(keymap) = &parsed.keymap {
        if editor.set_active_keymap(keymap).is_err() {
            let _ = writeln!(output, "bind: {keymap}: unknown keymap name");
            return ExitStatus::GeneralError;
        }
    }

    let result = parsed.execute(editor, output);

    if parsed.keymap.is_some() {
        let _ = editor.set_active_keymap(&saved_keymap);
    }

    match result {
        Ok(status) => status,
        Err(err) => {
            let _ = writeln!(output, "{err}");
            ExitStatus::GeneralError
        }
    }
}

impl BindCommand {
    #[allow(clippy::too_many_lines)]
    fn execute(&self, editor: &mut Editor, output: &mut dyn Write) -> Result<ExitStatus, BindError> {
        let mut status = ExitStatus::Success;

        if self.list_funcs {
            for command in Command::iter() {
                writeln!(output, "{command}")?;
            }
        }

        if self.list_funcs_and_bindings || self.list_funcs_and_bindings_reusable {
            self.display_funcs_and_bindings(
                editor,
                output,
                self.list_funcs_and_bindings_reusable,
            )?;
        }

        if self.list_macros || self.list_macros_reusable {
            for (seq, body) in editor.macro_bindings(None) {
                if self.list_macros_reusable {
                    writeln!(output, "\"{seq}\": \"{body}\"")?;
                } else {
                    writeln!(output, "{seq} outputs {body}")?;
                }
            }
        }

        if self.list_vars || self.list_vars_reusable {
            self.display_vars(editor, output)?;
        }

        if let Some(func_name) = &self.query_func_bindings {
            let command = parse_command_name(func_name)?;
            let seqs = editor.sequences_bound_to(command, None);
            if seqs.is_empty() {
                writeln!(output, "{func_name} is not bound to any keys.")?;
                status = ExitStatus::GeneralError;
            } else {
                writeln!(
                    output,
                    "{func_name} can be invoked via {}.",
                    seqs.iter().map(|seq| format!("\"{seq}\"")).join(", ")
                )?;
            }
        }

        if let Some(func_name) = &self.remove_func_bindings {
            editor.unbind_command(None, func_name)?;
        }

        if let Some(seq) = &self.remove_key_seq_binding {
            editor.unbind_keyseq(None, strip_seq_quotes(seq))?;
        }

        if let Some(path) = &self.bindings_file {
            editor.read_init_file(Some(std::path::Path::new(path)))?;
        }

        if self.list_shell_bindings {
            for (seq, command) in editor.shell_cmd_bindings() {
                writeln!(
                    output,
                    "\"{}\" \"{command}\"",
                    reel_readline::untranslate_seq(seq, false)
                )?;
            }
        }

        for binding in &self.key_seq_shell_bindings {
            let (seq, command) = parse_shell_binding(binding)?;
            let bytes = reel_readline::translate_keyseq(&seq, editor.vars().convert_meta)?;
            tracing::debug!(target: reel_readline::trace_categories::BINDINGS,
                "binding key sequence '{seq}' => shell command '{command}'");
            editor.bind_shell_command(bytes, command);
        }

        if let Some(spec) = &self.key_sequence {
            editor.parse_and_bind(spec)?;
        }

        Ok(status)
    }

    fn display_funcs_and_bindings(
        &self,
        editor: &Editor,
        output: &mut dyn Write,
        reusable: bool,
    ) -> Result<(), BindError> {
        let bound = editor.command_bindings(None);

        for command in Command::iter().sorted_by_key(ToString::to_string) {
            let seqs = bound
                .iter()
                .find(|(c, _)| *c == command)
                .map(|(_, seqs)| seqs.clone())
                .unwrap_or_default();

            if seqs.is_empty() {
                if reusable {
                    writeln!(output, "# {command} (not bound)")?;
                } else {
                    writeln!(output, "{command} is not bound to any keys")?;
                }
            } else if reusable {
                for seq in seqs {
                    writeln!(output, "\"{seq}\": {command}")?;
                }
            } else {
                writeln!(
                    output,
                    "{command} can be found on {}.",
                    seqs.iter().map(|seq| format!("\"{seq}\"")).join(", ")
                )?;
            }
        }

        Ok(())
    }

    fn display_vars(&self, editor: &Editor, output: &mut dyn Write) -> Result<(), BindError> {
        let vars = editor.vars();

        for (name, value) in vars.booleans() {
            let value = if value { "on" } else { "off" };
            if self.list_vars_reusable {
                writeln!(output, "set {name} {value}")?;
            }
            if self.list_vars {
                writeln!(output, "{name} is set to `{value}'")?;
            }
        }
        for (name, value) in vars.strings() {
            if self.list_vars_reusable {
                writeln!(output, "set {name} {value}")?;
            }
            if self.list_vars {
                writeln!(output, "{name} is set to `{value}'")?;
            }
        }

        Ok(())
    }
}

fn parse_command_name(name: &str) -> Result<Command, BindError> {
    use std::str::FromStr as _;
    Command::from_str(name).map_err(|_| BindError::UnknownFunction(name.to_string()))
}

fn strip_seq_quotes(seq: &str) -> &str {
    let trimmed = seq.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
}

/// Parses a `-x` argument of the form `"KEYSEQ": shell-command`.
fn parse_shell_binding(input: &str) -> Result<(String, String), BindError> {
    let trimmed = input.trim_start();
    let rest = trimmed
        .strip_prefix('"')
        .ok_or_else(|| BindError::InvalidShellBinding(input.to_string()))?;

    // Find the closing quote, honoring backslash escapes.
    let bytes = rest.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => break,
            _ => i += 1,
        }
    }
    if i >= bytes.len() {
        return Err(BindError::InvalidShellBinding(input.to_string()));
    }

    let seq = rest[..i].to_string();
    let after = rest[i + 1..].trim_start();
    let command = after
        .strip_prefix(':')
        .map(str::trim)
        .ok_or_else(|| BindError::InvalidShellBinding(input.to_string()))?;

    Ok((seq, command.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run_bind(editor: &mut Editor, args: &[&str]) -> (ExitStatus, String) {
        let args: Vec<String> = args.iter().map(ToString::to_string).collect();
        let mut output = vec![];
        let status = run(&args, editor, &mut output);
        (status, String::from_utf8_lossy(&output).into_owned())
    }

    fn editor() -> Editor {
        Editor::scripted(vec![], Box::new(std::io::sink()))
    }

    #[test]
    fn list_functions_includes_known_names() {
        let mut editor = editor();
        let (status, out) = run_bind(&mut editor, &["-l"]);
        assert_eq!(status, ExitStatus::Success);
        assert!(out.lines().any(|l| l == "beginning-of-line"));
        assert!(out.lines().any(|l| l == "reverse-search-history"));
    }

    #[test]
    fn query_reports_bindings() {
        let mut editor = editor();
        let (status, out) = run_bind(&mut editor, &["-q", "beginning-of-line"]);
        assert_eq!(status, ExitStatus::Success);
        assert!(out.contains("can be invoked via"));
        assert!(out.contains(r"\C-a"));
    }

    #[test]
    fn query_unbound_fails() {
        let mut editor = editor();
        let (_, _) = run_bind(&mut editor, &["-u", "transpose-words"]);
        let (status, out) = run_bind(&mut editor, &["-q", "transpose-words"]);
        assert_eq!(status, ExitStatus::GeneralError);
        assert!(out.contains("is not bound to any keys"));
    }

    #[test]
    fn positional_binding_binds() {
        let mut editor = editor();
        let (status, _) = run_bind(&mut editor, &[r#""\C-x\C-z": kill-whole-line"#]);
        assert_eq!(status, ExitStatus::Success);
        assert_eq!(
            editor.sequences_bound_to(Command::KillWholeLine, None),
            vec![r"\C-x\C-z".to_string()]
        );
    }

    #[test]
    fn remove_binding_by_sequence() {
        let mut editor = editor();
        run_bind(&mut editor, &[r#""\C-x\C-z": kill-whole-line"#]);
        let (status, _) = run_bind(&mut editor, &["-r", r"\C-x\C-z"]);
        assert_eq!(status, ExitStatus::Success);
        assert!(
            editor
                .sequences_bound_to(Command::KillWholeLine, None)
                .is_empty()
        );
    }

    #[test]
    fn shell_command_binding_and_listing() {
        let mut editor = editor();
        let (status, _) = run_bind(&mut editor, &["-x", r#""\C-t": date"#]);
        assert_eq!(status, ExitStatus::Success);

        let (status, out) = run_bind(&mut editor, &["-X"]);
        assert_eq!(status, ExitStatus::Success);
        assert!(out.contains("date"));
    }

    #[test]
    fn invalid_flag_is_usage_error() {
        let mut editor = editor();
        let (status, _) = run_bind(&mut editor, &["-Z"]);
        assert_eq!(status, ExitStatus::InvalidUsage);
    }

    #[test]
    fn variables_listing_is_reusable() {
        let mut editor = editor();
        let (status, out) = run_bind(&mut editor, &["-v"]);
        assert_eq!(status, ExitStatus::Success);
        assert!(out.lines().any(|l| l.starts_with("set bell-style ")));
        assert!(out.lines().any(|l| l.starts_with("set keyseq-timeout ")));
    }

    #[test]
    fn keymap_scoped_binding() {
        let mut editor = editor();
        let (status, _) = run_bind(
            &mut editor,
            &["-m", "vi-insert", r#""\C-x\C-z": kill-whole-line"#],
        );
        assert_eq!(status, ExitStatus::Success);
        // The binding landed in vi-insert, not the active emacs map.
        assert!(
            editor
                .sequences_bound_to(Command::KillWholeLine, None)
                .is_empty()
        );
        assert_eq!(
            editor.sequences_bound_to(Command::KillWholeLine, Some("vi-insert")),
            vec![r"\C-x\C-z".to_string()]
        );
    }
}
