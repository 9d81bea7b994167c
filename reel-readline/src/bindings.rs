//! Binding inspection and mutation on top of the keymap registry; this is
//! the surface the `bind` builtin drives.

use std::str::FromStr as _;

use crate::commands::Command;
use crate::editor::Editor;
use crate::error::Error;
use crate::keymap::Slot;
use crate::keyseq;

impl Editor {
    fn keymap_for(&self, name: Option<&str>) -> Result<crate::keymap::KeymapLocation, Error> {
        let name = name.unwrap_or_else(|| self.active_keymap_name());
        self.keymaps
            .resolve(name)
            .ok_or_else(|| Error::UnknownKeymap(name.to_string()))
    }

    /// All key sequences (in `\C-x` notation) bound to `command` in the
    /// given keymap (default: the active one).
    pub fn sequences_bound_to(&self, command: Command, keymap: Option<&str>) -> Vec<String> {
        let Ok(location) = self.keymap_for(keymap) else {
            return vec![];
        };
        let Some(map) = self.keymaps.at(&location) else {
            return vec![];
        };

        let mut found = vec![];
        map.visit(&mut |seq, slot| {
            if matches!(slot, Slot::Command(c) if *c == command) {
                found.push(keyseq::untranslate_seq(seq, false));
            }
        });
        found
    }

    /// Every command binding in a keymap, as (command, sequences) pairs for
    /// commands with at least one binding.
    pub fn command_bindings(&self, keymap: Option<&str>) -> Vec<(Command, Vec<String>)> {
        let mut by_command: Vec<(Command, Vec<String>)> = vec![];
        let Ok(location) = self.keymap_for(keymap) else {
            return by_command;
        };
        let Some(map) = self.keymaps.at(&location) else {
            return by_command;
        };

        map.visit(&mut |seq, slot| {
            if let Slot::Command(command) = slot {
                let rendered = keyseq::untranslate_seq(seq, false);
                if let Some(entry) = by_command.iter_mut().find(|(c, _)| c == command) {
                    entry.1.push(rendered);
                } else {
                    by_command.push((*command, vec![rendered]));
                }
            }
        });
        by_command.sort_by_key(|(command, _)| command.to_string());
        by_command
    }

    /// Every macro binding in a keymap, as (sequence, expansion) pairs in
    /// reusable notation.
    pub fn macro_bindings(&self, keymap: Option<&str>) -> Vec<(String, String)> {
        let mut found = vec![];
        let Ok(location) = self.keymap_for(keymap) else {
            return found;
        };
        let Some(map) = self.keymaps.at(&location) else {
            return found;
        };

        map.visit(&mut |seq, slot| {
            if let Slot::Macro(body) = slot {
                found.push((
                    keyseq::untranslate_seq(seq, false),
                    keyseq::untranslate_seq(body, true),
                ));
            }
        });
        found
    }

    /// Binds a key sequence (inputrc escape notation) to a named command.
    pub fn bind_keyseq(
        &mut self,
        keymap: Option<&str>,
        seq: &str,
        command_name: &str,
    ) -> Result<(), Error> {
        let command = Command::from_str(command_name)
            .map_err(|_| Error::UnknownCommand(command_name.to_string()))?;
        let bytes = keyseq::translate_keyseq(seq, self.vars.convert_meta)?;
        let location = self.keymap_for(keymap)?;

        let root = self
            .keymaps
            .root_mut(&location.root)
            .ok_or_else(|| Error::UnknownKeymap(location.root.clone()))?;
        let mut full = location.prefix.clone();
        full.extend_from_slice(&bytes);
        root.generic_bind(&full, Slot::Command(command))
    }

    /// Binds a key sequence to a macro (both in escape notation).
    pub fn bind_macro(
        &mut self,
        keymap: Option<&str>,
        seq: &str,
        body: &str,
    ) -> Result<(), Error> {
        let bytes = keyseq::translate_keyseq(seq, self.vars.convert_meta)?;
        let expansion = keyseq::translate_keyseq(body, false)?;
        let location = self.keymap_for(keymap)?;

        let root = self
            .keymaps
            .root_mut(&location.root)
            .ok_or_else(|| Error::UnknownKeymap(location.root.clone()))?;
        let mut full = location.prefix.clone();
        full.extend_from_slice(&bytes);
        root.generic_bind(&full, Slot::Macro(expansion))
    }

    /// Removes whatever binding a key sequence has.
    pub fn unbind_keyseq(&mut self, keymap: Option<&str>, seq: &str) -> Result<(), Error> {
        let bytes = keyseq::translate_keyseq(seq, self.vars.convert_meta)?;
        let location = self.keymap_for(keymap)?;

        let root = self
            .keymaps
            .root_mut(&location.root)
            .ok_or_else(|| Error::UnknownKeymap(location.root.clone()))?;
        let mut full = location.prefix.clone();
        full.extend_from_slice(&bytes);
        root.generic_bind(&full, Slot::Unbound)
    }

    /// Unbinds every key sequence bound to the named command. Returns
    /// whether anything was removed.
    pub fn unbind_command(
        &mut self,
        keymap: Option<&str>,
        command_name: &str,
    ) -> Result<bool, Error> {
        let command = Command::from_str(command_name)
            .map_err(|_| Error::UnknownCommand(command_name.to_string()))?;
        let location = self.keymap_for(keymap)?;
        let root = self
            .keymaps
            .root_mut(&location.root)
            .ok_or_else(|| Error::UnknownKeymap(location.root.clone()))?;
        Ok(root.unbind_command(command))
    }

    /// Bindings in reusable inputrc form, one per line.
    pub(crate) fn format_function_bindings(&self) -> String {
        use std::fmt::Write as _;

        let mut out = String::new();
        for (command, seqs) in self.command_bindings(None) {
            for seq in seqs {
                let _ = write!(out, "\"{seq}\": {command}\r\n");
            }
        }
        out
    }

    /// Macro bindings in reusable inputrc form.
    pub(crate) fn format_macro_bindings(&self) -> String {
        use std::fmt::Write as _;

        let mut out = String::new();
        for (seq, body) in self.macro_bindings(None) {
            let _ = write!(out, "\"{seq}\": \"{body}\"\r\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::test_support::editor_with_input;
    use pretty_assertions::assert_eq;

    #[test]
    fn query_bindings_by_command() {
        let editor = editor_with_input(vec![]);
        let seqs = editor.sequences_bound_to(Command::TransposeWords, None);
        assert_eq!(seqs, vec!["\\et".to_string()]);
    }

    #[test]
    fn bind_and_unbind_round_trip() {
        let mut editor = editor_with_input(vec![]);
        editor
            .bind_keyseq(None, r"\C-x\C-z", "kill-whole-line")
            .unwrap();
        assert_eq!(
            editor.sequences_bound_to(Command::KillWholeLine, None),
            vec![r"\C-x\C-z".to_string()]
        );

        editor.unbind_keyseq(None, r"\C-x\C-z").unwrap();
        assert!(
            editor
                .sequences_bound_to(Command::KillWholeLine, None)
                .is_empty()
        );
    }

    #[test]
    fn bind_in_named_keymap() {
        let mut editor = editor_with_input(vec![]);
        editor
            .bind_keyseq(Some("emacs-ctlx"), "z", "abort")
            .unwrap();
        // The binding lives under the C-x prefix of the emacs map.
        let seqs = editor.sequences_bound_to(Command::Abort, None);
        assert!(seqs.contains(&r"\C-xz".to_string()));
    }

    #[test]
    fn unknown_names_error() {
        let mut editor = editor_with_input(vec![]);
        assert!(matches!(
            editor.bind_keyseq(None, r"\C-a", "frobnicate"),
            Err(Error::UnknownCommand(_))
        ));
        assert!(matches!(
            editor.bind_keyseq(Some("klingon"), r"\C-a", "abort"),
            Err(Error::UnknownKeymap(_))
        ));
    }

    #[test]
    fn macro_listing_uses_escapes() {
        let mut editor = editor_with_input(vec![]);
        editor.bind_macro(None, r"\C-xm", "echo hi").unwrap();
        let macros = editor.macro_bindings(None);
        assert_eq!(
            macros,
            vec![(r"\C-xm".to_string(), "echo hi".to_string())]
        );
    }
}
