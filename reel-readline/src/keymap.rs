//! Keymaps: fixed 257-slot dispatch tables keyed by input byte, plus the
//! named-keymap registry.

use std::collections::HashMap;

use crate::commands::Command;
use crate::error::Error;
use crate::trace_categories;

/// Index of the "any other key" slot, dispatched when a prefix fails to
/// complete. It holds the binding a new submap displaced (the shadow).
pub const ANYOTHERKEY: usize = 256;

/// Total number of slots in a keymap.
pub const KEYMAP_SIZE: usize = 257;

pub(crate) const ESC: u8 = 0x1b;
pub(crate) const RUBOUT: u8 = 0x7f;

/// Computes the control-modified form of a byte.
pub(crate) const fn ctrl(c: u8) -> u8 {
    c & 0x1f
}

/// Sets the meta bit of a byte.
pub(crate) const fn meta(c: u8) -> u8 {
    c | 0x80
}

/// A forever-unbound slot, for lookups that fall off the map.
static UNBOUND_SLOT: Slot = Slot::Unbound;

/// One keymap slot: what happens when the corresponding byte is read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Slot {
    /// Nothing is bound here.
    #[default]
    Unbound,
    /// A do-nothing binding, used to mask a shadowed binding when a key
    /// sequence is unbound out of a submap.
    Null,
    /// An editing command.
    Command(Command),
    /// A macro: bytes fed back into the input stream.
    Macro(Vec<u8>),
    /// A prefix: dispatch continues in the nested keymap.
    Submap(Box<Keymap>),
}

impl Slot {
    /// Whether the slot carries a binding a dispatcher can act on.
    pub const fn is_bound(&self) -> bool {
        !matches!(self, Self::Unbound)
    }
}

/// A 257-entry dispatch table: indices 0..=255 for raw bytes, index 256
/// ([`ANYOTHERKEY`]) for "any other key after this prefix". Submaps are
/// owned by the slot that references them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Keymap {
    slots: Vec<Slot>,
}

impl Default for Keymap {
    fn default() -> Self {
        Self::bare()
    }
}

impl Keymap {
    /// Creates a keymap with every slot unbound.
    pub fn bare() -> Self {
        Self {
            slots: vec![Slot::Unbound; KEYMAP_SIZE],
        }
    }

    /// Returns the slot for a byte (or [`ANYOTHERKEY`]).
    pub fn slot(&self, index: usize) -> &Slot {
        self.slots.get(index).unwrap_or(&UNBOUND_SLOT)
    }

    /// Directly sets the slot for a byte (or [`ANYOTHERKEY`]).
    pub fn set_slot(&mut self, index: usize, value: Slot) {
        if index < KEYMAP_SIZE {
            self.slots[index] = value;
        }
    }

    /// Binds a single byte, replacing whatever was there. If the slot holds
    /// a submap, the binding is routed through the generic binder so the
    /// displaced prefix map is handled properly.
    pub fn bind_key(&mut self, key: u8, command: Command) -> Result<(), Error> {
        if matches!(self.slots[key as usize], Slot::Submap(_)) {
            return self.generic_bind(&[key], Slot::Command(command));
        }
        self.slots[key as usize] = Slot::Command(command);
        Ok(())
    }

    /// Binds `keys` to `value`, creating submaps as necessary. When a new
    /// submap displaces an existing command or macro binding, the displaced
    /// binding is saved in the submap's [`ANYOTHERKEY`] slot so dispatch can
    /// fall back to it if the longer sequence fails to complete. Unbinding
    /// (binding [`Slot::Unbound`]) through a submap installs [`Slot::Null`]
    /// instead, and collapses the submap one level when it becomes empty.
    pub fn generic_bind(&mut self, keys: &[u8], value: Slot) -> Result<(), Error> {
        if keys.is_empty() {
            return Err(Error::InvalidKeySequence(String::new()));
        }
        Self::bind_walk(self, keys, value);
        Ok(())
    }

    fn bind_walk(map: &mut Self, keys: &[u8], value: Slot) {
        let ic = keys[0] as usize;
        let unbinding = matches!(value, Slot::Unbound);

        if keys.len() > 1 {
            if !matches!(map.slots[ic], Slot::Submap(_)) {
                let displaced = std::mem::take(&mut map.slots[ic]);
                let mut submap = Self::bare();
                match displaced {
                    Slot::Command(Command::DoLowercaseVersion) | Slot::Unbound | Slot::Null => {}
                    shadowed @ (Slot::Command(_) | Slot::Macro(_)) => {
                        submap.slots[ANYOTHERKEY] = shadowed;
                    }
                    Slot::Submap(_) => {}
                }
                map.slots[ic] = Slot::Submap(Box::new(submap));
            }

            if let Slot::Submap(submap) = &mut map.slots[ic] {
                Self::bind_walk(submap, &keys[1..], value);
            }

            // If unbinding emptied the submap directly below us, replace it
            // with whatever binding it was shadowing.
            if unbinding && keys.len() == 2 {
                if let Slot::Submap(submap) = &map.slots[ic] {
                    if submap.is_empty() && !matches!(submap.slots[ANYOTHERKEY], Slot::Submap(_)) {
                        let shadow = submap.slots[ANYOTHERKEY].clone();
                        map.slots[ic] = shadow;
                    }
                }
            }
            return;
        }

        if let Slot::Submap(submap) = &mut map.slots[ic] {
            // Overriding a prefix with a null binding must be recorded as a
            // real do-nothing function; a plain unbound slot would be
            // indistinguishable from never having been overridden.
            let value = if unbinding { Slot::Null } else { value };
            submap.slots[ANYOTHERKEY] = value;
        } else {
            map.slots[ic] = value;
        }
    }

    /// Unbinds every slot (recursively) bound to `command`. Returns whether
    /// anything changed.
    pub fn unbind_command(&mut self, command: Command) -> bool {
        let mut changed = false;
        for slot in &mut self.slots {
            match slot {
                Slot::Command(c) if *c == command => {
                    *slot = Slot::Unbound;
                    changed = true;
                }
                Slot::Submap(submap) => {
                    changed |= submap.unbind_command(command);
                }
                _ => {}
            }
        }
        changed
    }

    /// Follows `keys` through submaps and returns the slot it reaches.
    /// Returns [`Slot::Unbound`] when the walk falls off the map.
    pub fn lookup(&self, keys: &[u8]) -> &Slot {
        let mut map = self;
        for (i, key) in keys.iter().enumerate() {
            let slot = &map.slots[*key as usize];
            if i + 1 == keys.len() {
                return slot;
            }
            if let Slot::Submap(submap) = slot {
                map = submap;
            } else {
                return &UNBOUND_SLOT;
            }
        }
        &UNBOUND_SLOT
    }

    /// Returns the submap reached by following `prefix`, if any.
    pub fn submap_at(&self, prefix: &[u8]) -> Option<&Self> {
        if prefix.is_empty() {
            return Some(self);
        }
        if let Slot::Submap(submap) = self.lookup(prefix) {
            submap.submap_at(&[])
        } else {
            None
        }
    }

    fn submap_at_mut(&mut self, prefix: &[u8]) -> Option<&mut Self> {
        let mut map = self;
        for key in prefix {
            if let Slot::Submap(submap) = &mut map.slots[*key as usize] {
                map = submap;
            } else {
                return None;
            }
        }
        Some(map)
    }

    /// Whether no byte slot carries a binding. The [`ANYOTHERKEY`] slot is
    /// not considered.
    pub fn is_empty(&self) -> bool {
        self.slots[..ANYOTHERKEY]
            .iter()
            .all(|slot| matches!(slot, Slot::Unbound))
    }

    /// Visits every binding reachable from this keymap, passing the full key
    /// sequence (with [`ANYOTHERKEY`] never included) and the slot.
    pub fn visit(&self, f: &mut impl FnMut(&[u8], &Slot)) {
        let mut prefix = vec![];
        self.visit_in(&mut prefix, f);
    }

    fn visit_in(&self, prefix: &mut Vec<u8>, f: &mut impl FnMut(&[u8], &Slot)) {
        for (i, slot) in self.slots[..ANYOTHERKEY].iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let key = i as u8;
            match slot {
                Slot::Unbound | Slot::Null => {}
                Slot::Submap(submap) => {
                    prefix.push(key);
                    submap.visit_in(prefix, f);
                    prefix.pop();
                }
                bound => {
                    prefix.push(key);
                    f(prefix, bound);
                    prefix.pop();
                }
            }
        }
    }
}

/// Builders for the stock keymaps.
impl Keymap {
    /// The standard emacs keymap, with its meta and C-x submaps attached.
    #[allow(clippy::too_many_lines)]
    pub fn emacs() -> Self {
        use Command as C;

        let mut map = Self::bare();

        map.set_slot(0, Slot::Command(C::SetMark)); // C-@
        map.set_slot(ctrl(b'A') as usize, Slot::Command(C::BeginningOfLine));
        map.set_slot(ctrl(b'B') as usize, Slot::Command(C::BackwardChar));
        map.set_slot(ctrl(b'D') as usize, Slot::Command(C::DeleteChar));
        map.set_slot(ctrl(b'E') as usize, Slot::Command(C::EndOfLine));
        map.set_slot(ctrl(b'F') as usize, Slot::Command(C::ForwardChar));
        map.set_slot(ctrl(b'G') as usize, Slot::Command(C::Abort));
        map.set_slot(ctrl(b'H') as usize, Slot::Command(C::BackwardDeleteChar));
        map.set_slot(ctrl(b'I') as usize, Slot::Command(C::TabInsert));
        map.set_slot(ctrl(b'J') as usize, Slot::Command(C::AcceptLine));
        map.set_slot(ctrl(b'K') as usize, Slot::Command(C::KillLine));
        map.set_slot(ctrl(b'L') as usize, Slot::Command(C::ClearScreen));
        map.set_slot(ctrl(b'M') as usize, Slot::Command(C::AcceptLine));
        map.set_slot(ctrl(b'N') as usize, Slot::Command(C::NextHistory));
        map.set_slot(ctrl(b'O') as usize, Slot::Command(C::OperateAndGetNext));
        map.set_slot(ctrl(b'P') as usize, Slot::Command(C::PreviousHistory));
        map.set_slot(ctrl(b'Q') as usize, Slot::Command(C::QuotedInsert));
        map.set_slot(ctrl(b'R') as usize, Slot::Command(C::ReverseSearchHistory));
        map.set_slot(ctrl(b'S') as usize, Slot::Command(C::ForwardSearchHistory));
        map.set_slot(ctrl(b'T') as usize, Slot::Command(C::TransposeChars));
        map.set_slot(ctrl(b'U') as usize, Slot::Command(C::UnixLineDiscard));
        map.set_slot(ctrl(b'V') as usize, Slot::Command(C::QuotedInsert));
        map.set_slot(ctrl(b'W') as usize, Slot::Command(C::UnixWordRubout));
        map.set_slot(ctrl(b'Y') as usize, Slot::Command(C::Yank));
        map.set_slot(0x1f, Slot::Command(C::Undo)); // C-_

        for b in 0x20..0x7f {
            map.set_slot(b, Slot::Command(C::SelfInsert));
        }
        map.set_slot(RUBOUT as usize, Slot::Command(C::BackwardDeleteChar));

        // In byte-oriented input, high-bit bytes insert themselves.
        for b in 0x80..=0xff {
            map.set_slot(b, Slot::Command(C::SelfInsert));
        }

        map.set_slot(ESC as usize, Slot::Submap(Box::new(Self::emacs_meta())));
        map.set_slot(
            ctrl(b'X') as usize,
            Slot::Submap(Box::new(Self::emacs_ctlx())),
        );

        map
    }

    /// The emacs meta (ESC-prefixed) keymap.
    fn emacs_meta() -> Self {
        use Command as C;

        let mut map = Self::bare();

        map.set_slot(ctrl(b'G') as usize, Slot::Command(C::Abort));
        map.set_slot(ctrl(b'H') as usize, Slot::Command(C::BackwardKillWord));
        map.set_slot(ctrl(b'Y') as usize, Slot::Command(C::YankNthArg));
        map.set_slot(b' ' as usize, Slot::Command(C::SetMark));
        map.set_slot(b'#' as usize, Slot::Command(C::InsertComment));
        map.set_slot(b'&' as usize, Slot::Command(C::DumpMacros));
        map.set_slot(b'-' as usize, Slot::Command(C::DigitArgument));
        map.set_slot(b'.' as usize, Slot::Command(C::YankLastArg));
        for d in b'0'..=b'9' {
            map.set_slot(d as usize, Slot::Command(C::DigitArgument));
        }
        map.set_slot(b'<' as usize, Slot::Command(C::BeginningOfHistory));
        map.set_slot(b'>' as usize, Slot::Command(C::EndOfHistory));
        for c in b'A'..=b'Z' {
            map.set_slot(c as usize, Slot::Command(C::DoLowercaseVersion));
        }
        map.set_slot(b'\\' as usize, Slot::Command(C::DeleteHorizontalSpace));
        map.set_slot(b'^' as usize, Slot::Command(C::HistoryExpandLine));
        map.set_slot(b'_' as usize, Slot::Command(C::YankLastArg));
        map.set_slot(b'b' as usize, Slot::Command(C::BackwardWord));
        map.set_slot(b'c' as usize, Slot::Command(C::CapitalizeWord));
        map.set_slot(b'd' as usize, Slot::Command(C::KillWord));
        map.set_slot(b'f' as usize, Slot::Command(C::ForwardWord));
        map.set_slot(b'l' as usize, Slot::Command(C::DowncaseWord));
        map.set_slot(
            b'n' as usize,
            Slot::Command(C::NonIncrementalForwardSearchHistory),
        );
        map.set_slot(
            b'p' as usize,
            Slot::Command(C::NonIncrementalReverseSearchHistory),
        );
        map.set_slot(b'r' as usize, Slot::Command(C::RevertLine));
        map.set_slot(b't' as usize, Slot::Command(C::TransposeWords));
        map.set_slot(b'u' as usize, Slot::Command(C::UpcaseWord));
        map.set_slot(b'y' as usize, Slot::Command(C::YankPop));
        map.set_slot(RUBOUT as usize, Slot::Command(C::BackwardKillWord));

        map.set_slot(b'[' as usize, Slot::Submap(Box::new(Self::arrow_keys())));
        map.set_slot(b'O' as usize, Slot::Submap(Box::new(Self::arrow_keys_o())));

        map
    }

    /// CSI-style arrow and editing keys (`ESC [ ...`).
    fn arrow_keys() -> Self {
        use Command as C;

        let mut map = Self::bare();
        map.set_slot(b'A' as usize, Slot::Command(C::PreviousHistory));
        map.set_slot(b'B' as usize, Slot::Command(C::NextHistory));
        map.set_slot(b'C' as usize, Slot::Command(C::ForwardChar));
        map.set_slot(b'D' as usize, Slot::Command(C::BackwardChar));
        map.set_slot(b'F' as usize, Slot::Command(C::EndOfLine));
        map.set_slot(b'H' as usize, Slot::Command(C::BeginningOfLine));

        // \e[1~ home, \e[3~ delete, \e[4~ end.
        let mut one = Self::bare();
        one.set_slot(b'~' as usize, Slot::Command(C::BeginningOfLine));
        map.set_slot(b'1' as usize, Slot::Submap(Box::new(one)));
        let mut three = Self::bare();
        three.set_slot(b'~' as usize, Slot::Command(C::DeleteChar));
        map.set_slot(b'3' as usize, Slot::Submap(Box::new(three)));
        let mut four = Self::bare();
        four.set_slot(b'~' as usize, Slot::Command(C::EndOfLine));
        map.set_slot(b'4' as usize, Slot::Submap(Box::new(four)));

        // Bracketed paste: \e[200~
        let mut two_zero_zero = Self::bare();
        two_zero_zero.set_slot(b'~' as usize, Slot::Command(C::BracketedPasteBegin));
        let mut two_zero = Self::bare();
        two_zero.set_slot(b'0' as usize, Slot::Submap(Box::new(two_zero_zero)));
        let mut two = Self::bare();
        two.set_slot(b'0' as usize, Slot::Submap(Box::new(two_zero)));
        map.set_slot(b'2' as usize, Slot::Submap(Box::new(two)));

        map
    }

    /// Application-mode arrow keys (`ESC O ...`).
    fn arrow_keys_o() -> Self {
        use Command as C;

        let mut map = Self::bare();
        map.set_slot(b'A' as usize, Slot::Command(C::PreviousHistory));
        map.set_slot(b'B' as usize, Slot::Command(C::NextHistory));
        map.set_slot(b'C' as usize, Slot::Command(C::ForwardChar));
        map.set_slot(b'D' as usize, Slot::Command(C::BackwardChar));
        map.set_slot(b'F' as usize, Slot::Command(C::EndOfLine));
        map.set_slot(b'H' as usize, Slot::Command(C::BeginningOfLine));
        map
    }

    /// The emacs C-x prefix keymap.
    fn emacs_ctlx() -> Self {
        use Command as C;

        let mut map = Self::bare();
        map.set_slot(ctrl(b'G') as usize, Slot::Command(C::Abort));
        map.set_slot(ctrl(b'R') as usize, Slot::Command(C::ReReadInitFile));
        map.set_slot(ctrl(b'U') as usize, Slot::Command(C::Undo));
        map.set_slot(ctrl(b'X') as usize, Slot::Command(C::ExchangePointAndMark));
        map.set_slot(RUBOUT as usize, Slot::Command(C::BackwardKillLine));
        map
    }

    /// The vi insertion keymap.
    pub fn vi_insert() -> Self {
        use Command as C;

        let mut map = Self::bare();
        map.set_slot(ctrl(b'A') as usize, Slot::Command(C::SelfInsert));
        map.set_slot(ctrl(b'D') as usize, Slot::Command(C::DeleteChar));
        map.set_slot(ctrl(b'G') as usize, Slot::Command(C::Abort));
        map.set_slot(ctrl(b'H') as usize, Slot::Command(C::BackwardDeleteChar));
        map.set_slot(ctrl(b'I') as usize, Slot::Command(C::TabInsert));
        map.set_slot(ctrl(b'J') as usize, Slot::Command(C::AcceptLine));
        map.set_slot(ctrl(b'M') as usize, Slot::Command(C::AcceptLine));
        map.set_slot(ctrl(b'R') as usize, Slot::Command(C::ReverseSearchHistory));
        map.set_slot(ctrl(b'S') as usize, Slot::Command(C::ForwardSearchHistory));
        map.set_slot(ctrl(b'T') as usize, Slot::Command(C::TransposeChars));
        map.set_slot(ctrl(b'U') as usize, Slot::Command(C::UnixLineDiscard));
        map.set_slot(ctrl(b'V') as usize, Slot::Command(C::QuotedInsert));
        map.set_slot(ctrl(b'W') as usize, Slot::Command(C::UnixWordRubout));
        map.set_slot(ctrl(b'Y') as usize, Slot::Command(C::Yank));
        map.set_slot(0x1f, Slot::Command(C::Undo)); // C-_

        for b in 0x20..0x7f {
            map.set_slot(b, Slot::Command(C::SelfInsert));
        }
        map.set_slot(RUBOUT as usize, Slot::Command(C::BackwardDeleteChar));
        for b in 0x80..=0xff {
            map.set_slot(b, Slot::Command(C::SelfInsert));
        }

        // ESC is a prefix (arrow keys still work in insert mode); with no
        // completing byte, the shadow switches to command mode.
        let mut esc = Self::arrow_keys_esc_bridge();
        esc.set_slot(ANYOTHERKEY, Slot::Command(C::ViMovementMode));
        map.set_slot(ESC as usize, Slot::Submap(Box::new(esc)));

        map
    }

    fn arrow_keys_esc_bridge() -> Self {
        let mut map = Self::bare();
        map.set_slot(b'[' as usize, Slot::Submap(Box::new(Self::arrow_keys())));
        map.set_slot(b'O' as usize, Slot::Submap(Box::new(Self::arrow_keys_o())));
        map
    }

    /// The vi command/movement keymap. Only the core motions and the
    /// insert-mode handshake are populated.
    pub fn vi_command() -> Self {
        use Command as C;

        let mut map = Self::bare();
        map.set_slot(ctrl(b'G') as usize, Slot::Command(C::Abort));
        map.set_slot(ctrl(b'J') as usize, Slot::Command(C::AcceptLine));
        map.set_slot(ctrl(b'M') as usize, Slot::Command(C::AcceptLine));
        map.set_slot(ctrl(b'R') as usize, Slot::Command(C::ReverseSearchHistory));
        map.set_slot(b' ' as usize, Slot::Command(C::ForwardChar));
        map.set_slot(b'$' as usize, Slot::Command(C::EndOfLine));
        map.set_slot(b'0' as usize, Slot::Command(C::BeginningOfLine));
        for d in b'1'..=b'9' {
            map.set_slot(d as usize, Slot::Command(C::DigitArgument));
        }
        map.set_slot(b'h' as usize, Slot::Command(C::BackwardChar));
        map.set_slot(b'i' as usize, Slot::Command(C::ViInsertionMode));
        map.set_slot(b'j' as usize, Slot::Command(C::NextHistory));
        map.set_slot(b'k' as usize, Slot::Command(C::PreviousHistory));
        map.set_slot(b'l' as usize, Slot::Command(C::ForwardChar));
        map.set_slot(b'x' as usize, Slot::Command(C::DeleteChar));
        map.set_slot(ESC as usize, Slot::Submap(Box::new(Self::arrow_keys_esc_bridge())));
        map
    }
}

/// The named-keymap registry. Root keymaps (`emacs`, `vi-insert`,
/// `vi-command`, and any user-defined maps) are owned here; the traditional
/// prefix names (`emacs-meta`, `emacs-ctlx`) resolve to locations inside
/// their root.
pub struct Keymaps {
    roots: HashMap<String, Keymap>,
}

/// A resolved keymap location: a root keymap name plus the byte prefix of a
/// submap within it (empty for the root itself).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeymapLocation {
    /// Name of the root keymap in the registry.
    pub root: String,
    /// Byte prefix identifying a submap inside the root.
    pub prefix: Vec<u8>,
}

impl Default for Keymaps {
    fn default() -> Self {
        Self::new()
    }
}

impl Keymaps {
    /// Creates the registry with the stock keymaps installed.
    pub fn new() -> Self {
        let mut roots = HashMap::new();
        roots.insert("emacs".to_string(), Keymap::emacs());
        roots.insert("vi-insert".to_string(), Keymap::vi_insert());
        roots.insert("vi-command".to_string(), Keymap::vi_command());
        Self { roots }
    }

    /// Resolves a keymap name to a location. Accepts the traditional
    /// aliases: `emacs-standard`, `emacs-meta`, `emacs-ctlx`, `vi`,
    /// `vi-move`.
    pub fn resolve(&self, name: &str) -> Option<KeymapLocation> {
        let (root, prefix): (&str, Vec<u8>) = match name {
            "emacs" | "emacs-standard" => ("emacs", vec![]),
            "emacs-meta" => ("emacs", vec![ESC]),
            "emacs-ctlx" => ("emacs", vec![ctrl(b'X')]),
            "vi" | "vi-command" | "vi-move" => ("vi-command", vec![]),
            "vi-insert" => ("vi-insert", vec![]),
            other => (other, vec![]),
        };

        if !self.roots.contains_key(root) {
            return None;
        }

        Some(KeymapLocation {
            root: root.to_string(),
            prefix,
        })
    }

    /// Registers (or replaces) a user-defined root keymap.
    pub fn register(&mut self, name: impl Into<String>, map: Keymap) {
        let name = name.into();
        tracing::debug!(target: trace_categories::BINDINGS, "registering keymap '{name}'");
        self.roots.insert(name, map);
    }

    /// Renames a root keymap. Returns false if the source is missing.
    pub fn rename(&mut self, old: &str, new: impl Into<String>) -> bool {
        if let Some(map) = self.roots.remove(old) {
            self.roots.insert(new.into(), map);
            true
        } else {
            false
        }
    }

    /// Borrows a root keymap.
    pub fn root(&self, name: &str) -> Option<&Keymap> {
        self.roots.get(name)
    }

    /// Mutably borrows a root keymap.
    pub fn root_mut(&mut self, name: &str) -> Option<&mut Keymap> {
        self.roots.get_mut(name)
    }

    /// Borrows the keymap at a location.
    pub fn at(&self, location: &KeymapLocation) -> Option<&Keymap> {
        self.roots.get(&location.root)?.submap_at(&location.prefix)
    }

    /// Mutably borrows the keymap at a location.
    pub fn at_mut(&mut self, location: &KeymapLocation) -> Option<&mut Keymap> {
        self.roots
            .get_mut(&location.root)?
            .submap_at_mut(&location.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn simple_bind_and_lookup() {
        let mut map = Keymap::bare();
        map.bind_key(ctrl(b'A'), Command::BeginningOfLine).unwrap();
        assert_eq!(
            map.lookup(&[ctrl(b'A')]),
            &Slot::Command(Command::BeginningOfLine)
        );
        assert_eq!(map.lookup(&[ctrl(b'B')]), &Slot::Unbound);
    }

    #[test]
    fn prefix_binding_shadows_displaced_command() {
        let mut map = Keymap::bare();
        map.bind_key(ctrl(b'X'), Command::Abort).unwrap();

        map.generic_bind(&[ctrl(b'X'), b'm'], Slot::Command(Command::KillLine))
            .unwrap();

        // The displaced binding moved into the submap's ANYOTHERKEY slot.
        let Slot::Submap(sub) = map.lookup(&[ctrl(b'X')]) else {
            panic!("expected a submap");
        };
        assert_eq!(sub.slot(ANYOTHERKEY), &Slot::Command(Command::Abort));
        assert_eq!(
            map.lookup(&[ctrl(b'X'), b'm']),
            &Slot::Command(Command::KillLine)
        );
    }

    #[test]
    fn bind_then_unbind_restores_keymap() {
        let mut map = Keymap::emacs();
        let pristine = map.clone();

        map.generic_bind(&[ctrl(b'X'), ctrl(b'Z'), b'q'], Slot::Command(Command::Abort))
            .unwrap();
        assert_ne!(map, pristine);

        map.generic_bind(&[ctrl(b'X'), ctrl(b'Z'), b'q'], Slot::Unbound)
            .unwrap();
        assert_eq!(map, pristine);
    }

    #[test]
    fn unbind_command_scrubs_submaps() {
        let mut map = Keymap::emacs();
        assert!(map.unbind_command(Command::TransposeWords));
        assert_eq!(map.lookup(&[ESC, b't']), &Slot::Unbound);
        assert!(!map.unbind_command(Command::TransposeWords));
    }

    #[test]
    fn macro_binding_round_trip() {
        let mut map = Keymap::emacs();
        map.generic_bind(&[ctrl(b'X'), b'm'], Slot::Macro(b"echo hi".to_vec()))
            .unwrap();
        assert_eq!(
            map.lookup(&[ctrl(b'X'), b'm']),
            &Slot::Macro(b"echo hi".to_vec())
        );
    }

    #[test]
    fn registry_resolves_aliases() {
        let maps = Keymaps::new();
        let meta = maps.resolve("emacs-meta").unwrap();
        assert_eq!(meta.prefix, vec![ESC]);
        assert!(maps.at(&meta).is_some());

        let vi = maps.resolve("vi").unwrap();
        assert_eq!(vi.root, "vi-command");
        assert!(maps.resolve("no-such-map").is_none());
    }

    #[test]
    fn visit_reports_full_sequences() {
        let mut found = vec![];
        Keymap::emacs().visit(&mut |seq, slot| {
            if matches!(slot, Slot::Command(Command::TransposeWords)) {
                found.push(seq.to_vec());
            }
        });
        assert_eq!(found, vec![vec![ESC, b't']]);
    }
}
