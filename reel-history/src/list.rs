//! The in-memory history list.

use std::collections::VecDeque;

use crate::trace_categories;

/// Characters that may not follow the expansion character if expansion is to
/// take place.
pub(crate) const NO_EXPAND_CHARS: &str = " \t\n\r=";

/// Characters used to split words by the tokenizer.
pub(crate) const WORD_DELIMITERS: &str = " \t\n;&()|<>";

/// Characters that delimit history event specifications and separate event
/// specifications from word designators.
#[allow(dead_code)]
pub(crate) const EVENT_DELIMITERS: &str = "^$*%-";

/// Opaque data an application may attach to a history entry. The entry owns
/// the attachment and drops it when the entry is removed or replaced.
pub trait EntryData: std::fmt::Debug + Send {}

/// A single recorded command line.
#[derive(Debug, Default)]
pub struct Entry {
    /// The command line itself.
    pub line: String,
    /// The timestamp line associated with the entry, if any; stored in file
    /// form (comment character followed by decimal seconds since the epoch).
    pub timestamp: Option<String>,
    /// Application data attached to the entry.
    pub data: Option<Box<dyn EntryData>>,
}

impl Entry {
    /// Creates an entry holding the given line, with no timestamp or data.
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            timestamp: None,
            data: None,
        }
    }

    /// Parses the entry's timestamp into seconds since the epoch. The leading
    /// comment character is skipped; a missing or malformed timestamp yields
    /// `None`.
    pub fn time(&self) -> Option<i64> {
        let ts = self.timestamp.as_deref()?;
        ts.get(1..)?.trim().parse().ok()
    }
}

/// Callback consulted before expanding at a given byte offset; returning true
/// vetoes the expansion at that position.
pub type InhibitExpansionPredicate = dyn Fn(&str, usize) -> bool + Send;

/// The history list: an ordered sequence of entries plus a movable cursor.
///
/// Entries are numbered logically starting at `base` (1 by default); stifling
/// evicts the oldest entries and raises `base` so logical numbers remain
/// stable for the life of a session. The cursor (`offset`) always lies in
/// `[0, len]`, with `len` denoting the not-yet-recorded line being edited.
pub struct History {
    entries: VecDeque<Entry>,
    base: usize,
    offset: usize,
    max_entries: Option<usize>,
    multiline_entries: bool,

    pub(crate) lines_read_from_file: usize,
    pub(crate) lines_written_to_file: usize,

    /// The character that introduces a history expansion; `None` inhibits
    /// expansion entirely.
    pub expansion_char: Option<char>,
    /// The character that invokes quick substitution at the start of a line.
    pub subst_char: char,
    /// Comment character; a word starting with it ends expansion scanning,
    /// and it prefixes timestamp lines in history files.
    pub comment_char: Option<char>,
    /// Set by the caller when the line being expanded continues a quoted
    /// region (`'\''` or `'"'`).
    pub quoting_state: Option<char>,
    /// Whether single quotes inhibit history expansion.
    pub quotes_inhibit_expansion: bool,
    /// Whether timestamps are written out by the file writer.
    pub write_timestamps: bool,

    /// Additional characters that may delimit a `!str` search specification.
    pub search_delimiters: Option<String>,

    pub(crate) last_search_string: Option<String>,
    pub(crate) last_search_match: Option<String>,
    pub(crate) subst_lhs: Option<String>,
    pub(crate) subst_rhs: Option<String>,

    pub(crate) inhibit_expansion: Option<Box<InhibitExpansionPredicate>>,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    /// Creates an empty history list with shell-style defaults.
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            base: 1,
            offset: 0,
            max_entries: None,
            multiline_entries: false,
            lines_read_from_file: 0,
            lines_written_to_file: 0,
            expansion_char: Some('!'),
            subst_char: '^',
            comment_char: None,
            quoting_state: None,
            quotes_inhibit_expansion: false,
            write_timestamps: false,
            search_delimiters: None,
            last_search_string: None,
            last_search_match: None,
            subst_lhs: None,
            subst_rhs: None,
            inhibit_expansion: None,
        }
    }

    /// Registers a predicate that can veto expansion at a given offset.
    pub fn set_inhibit_expansion(&mut self, pred: Box<InhibitExpansionPredicate>) {
        self.inhibit_expansion = Some(pred);
    }

    /// Number of entries currently retained.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Logical number of the oldest retained entry.
    pub const fn base(&self) -> usize {
        self.base
    }

    /// The cursor position, as an index relative to the oldest entry.
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Whether entries read from a file may span multiple lines.
    pub const fn multiline_entries(&self) -> bool {
        self.multiline_entries
    }

    pub(crate) const fn set_multiline_entries(&mut self, value: bool) {
        self.multiline_entries = value;
    }

    /// Appends an entry to the end of the list. If the list is stifled and at
    /// capacity, the oldest entry is evicted and `base` is raised.
    pub fn add(&mut self, line: impl Into<String>) {
        if let Some(max) = self.max_entries {
            if max == 0 {
                return;
            }
            while self.entries.len() >= max {
                self.entries.pop_front();
                self.base += 1;
                self.offset = self.offset.saturating_sub(1);
            }
        }

        self.entries.push_back(Entry::new(line));
    }

    /// Sets the timestamp of the most recently added entry, in file form.
    pub fn add_timestamp(&mut self, seconds: i64) {
        let comment = self.comment_char.unwrap_or('#');
        if let Some(entry) = self.entries.back_mut() {
            entry.timestamp = Some(format!("{comment}{seconds}"));
        }
    }

    /// Sets the timestamp of the most recently added entry from a raw
    /// timestamp line (as read from a history file).
    pub(crate) fn add_timestamp_line(&mut self, ts: &str) {
        if let Some(entry) = self.entries.back_mut() {
            entry.timestamp = Some(ts.to_string());
        }
    }

    /// Appends a line to the entry at the given position, separating it from
    /// the existing text with a newline. Used to reconstruct multi-line
    /// entries while reading timestamped history files.
    pub(crate) fn append_to_entry(&mut self, pos: usize, line: &str) {
        if let Some(entry) = self.entries.get_mut(pos) {
            entry.line.push('\n');
            entry.line.push_str(line);
        }
    }

    /// Replaces the entry at the given position, returning the old entry so
    /// the caller can dispose of its data. Returns `None` if the position is
    /// out of range (and does not install the new entry).
    pub fn replace(&mut self, pos: usize, entry: Entry) -> Option<Entry> {
        let slot = self.entries.get_mut(pos)?;
        Some(std::mem::replace(slot, entry))
    }

    /// Removes and returns the entry at the given position.
    pub fn remove(&mut self, pos: usize) -> Option<Entry> {
        let removed = self.entries.remove(pos);
        if removed.is_some() && self.offset > self.entries.len() {
            self.offset = self.entries.len();
        }
        removed
    }

    /// Removes the entries from `first` through `last`, inclusive, returning
    /// them in order.
    pub fn remove_range(&mut self, first: usize, last: usize) -> Vec<Entry> {
        let mut removed = vec![];
        let last = last.min(self.entries.len().saturating_sub(1));
        for pos in (first..=last).rev() {
            if let Some(entry) = self.entries.remove(pos) {
                removed.push(entry);
            }
        }
        removed.reverse();
        if self.offset > self.entries.len() {
            self.offset = self.entries.len();
        }
        removed
    }

    /// Clears the list and resets the logical base to its default.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.offset = 0;
        self.base = 1;
    }

    /// Bounds the list to at most `max` entries, evicting the oldest now and
    /// on every future `add` past capacity.
    pub fn stifle(&mut self, max: usize) {
        tracing::debug!(target: trace_categories::HISTORY, "stifling history at {max}");
        while self.entries.len() > max {
            self.entries.pop_front();
            self.base += 1;
            self.offset = self.offset.saturating_sub(1);
        }
        self.max_entries = Some(max);
    }

    /// Removes the stifle bound, returning the previous bound if there was
    /// one. The store is kept linear, so no ring rearrangement is needed.
    pub fn unstifle(&mut self) -> Option<usize> {
        self.max_entries.take()
    }

    /// Whether the list is currently stifled.
    pub const fn is_stifled(&self) -> bool {
        self.max_entries.is_some()
    }

    /// The stifle bound, if one is in effect.
    pub const fn max_entries(&self) -> Option<usize> {
        self.max_entries
    }

    /// Moves the cursor just past the newest entry. Called at the start of a
    /// read-line session.
    pub fn using_history(&mut self) {
        self.offset = self.entries.len();
    }

    /// Sets the cursor. Returns false (leaving the cursor unchanged) if `pos`
    /// exceeds the list length.
    pub fn set_pos(&mut self, pos: usize) -> bool {
        if pos > self.entries.len() {
            return false;
        }
        self.offset = pos;
        true
    }

    /// The entry under the cursor, or `None` when the cursor rests past the
    /// newest entry.
    pub fn current(&self) -> Option<&Entry> {
        self.entries.get(self.offset)
    }

    /// Steps the cursor back one entry and returns it; `None` at the oldest.
    pub fn previous(&mut self) -> Option<&Entry> {
        if self.offset == 0 {
            return None;
        }
        self.offset -= 1;
        self.entries.get(self.offset)
    }

    /// Steps the cursor forward one entry and returns it; `None` once the
    /// cursor moves past the newest entry.
    pub fn next(&mut self) -> Option<&Entry> {
        if self.offset >= self.entries.len() {
            return None;
        }
        self.offset += 1;
        self.entries.get(self.offset)
    }

    /// Looks up an entry by logical number (`base`-relative).
    pub fn get_logical(&self, number: usize) -> Option<&Entry> {
        let pos = number.checked_sub(self.base)?;
        self.entries.get(pos)
    }

    /// Looks up an entry by position relative to the oldest entry.
    pub fn get(&self, pos: usize) -> Option<&Entry> {
        self.entries.get(pos)
    }

    /// Iterates over entries oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Number of lines consumed by the most recent file read.
    pub const fn lines_read_from_file(&self) -> usize {
        self.lines_read_from_file
    }

    /// Number of entries emitted by the most recent file write or truncate.
    pub const fn lines_written_to_file(&self) -> usize {
        self.lines_written_to_file
    }

    /// The string last searched for with a `!?str?` event.
    pub fn last_search_string(&self) -> Option<&str> {
        self.last_search_string.as_deref()
    }

    /// The word matched by the last `!?str?` event.
    pub fn last_search_match(&self) -> Option<&str> {
        self.last_search_match.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(history: &History) -> Vec<&str> {
        history.iter().map(|e| e.line.as_str()).collect()
    }

    #[test]
    fn add_and_navigate() {
        let mut history = History::new();
        history.add("one");
        history.add("two");
        history.add("three");
        history.using_history();

        assert_eq!(history.len(), 3);
        assert!(history.current().is_none());
        assert_eq!(history.previous().map(|e| e.line.as_str()), Some("three"));
        assert_eq!(history.previous().map(|e| e.line.as_str()), Some("two"));
        assert_eq!(history.previous().map(|e| e.line.as_str()), Some("one"));
        assert!(history.previous().is_none());
        assert_eq!(history.next().map(|e| e.line.as_str()), Some("two"));
    }

    #[test]
    fn stifle_evicts_oldest_and_raises_base() {
        let mut history = History::new();
        for i in 0..10 {
            history.add(format!("cmd {i}"));
        }

        history.stifle(5);
        assert_eq!(history.len(), 5);
        assert_eq!(history.base(), 6);
        assert_eq!(
            lines(&history),
            vec!["cmd 5", "cmd 6", "cmd 7", "cmd 8", "cmd 9"]
        );

        // Adding at capacity keeps evicting.
        history.add("cmd 10");
        assert_eq!(history.len(), 5);
        assert_eq!(history.base(), 7);

        assert_eq!(history.unstifle(), Some(5));
        history.add("cmd 11");
        assert_eq!(history.len(), 6);
    }

    #[test]
    fn logical_lookup_tracks_base() {
        let mut history = History::new();
        history.add("a");
        history.add("b");
        history.add("c");
        history.stifle(2);

        assert_eq!(history.base(), 2);
        assert!(history.get_logical(1).is_none());
        assert_eq!(history.get_logical(2).map(|e| e.line.as_str()), Some("b"));
        assert_eq!(history.get_logical(3).map(|e| e.line.as_str()), Some("c"));
    }

    #[test]
    fn replace_returns_old_entry() {
        let mut history = History::new();
        history.add("original");
        let old = history.replace(0, Entry::new("updated"));
        assert_eq!(old.map(|e| e.line), Some("original".to_string()));
        assert_eq!(lines(&history), vec!["updated"]);
        assert!(history.replace(5, Entry::new("nope")).is_none());
    }

    #[test]
    fn remove_range_is_inclusive() {
        let mut history = History::new();
        for line in ["a", "b", "c", "d", "e"] {
            history.add(line);
        }
        let removed = history.remove_range(1, 3);
        assert_eq!(
            removed.iter().map(|e| e.line.as_str()).collect::<Vec<_>>(),
            vec!["b", "c", "d"]
        );
        assert_eq!(lines(&history), vec!["a", "e"]);
    }

    #[test]
    fn timestamp_round_trip() {
        let mut history = History::new();
        history.add("dated");
        history.add_timestamp(1_700_000_000);
        let entry = history.get(0).unwrap();
        assert_eq!(entry.timestamp.as_deref(), Some("#1700000000"));
        assert_eq!(entry.time(), Some(1_700_000_000));
    }
}
