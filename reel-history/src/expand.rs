//! History expansion: event designators, word designators, and modifiers.

use crate::error::{ExpansionError, ExpansionErrorKind};
use crate::list::{History, NO_EXPAND_CHARS};
use crate::search::Direction;
use crate::tokenize::{self, WordSel};
use crate::trace_categories;

/// The outcome of a successful history expansion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expansion {
    /// No expansion took place; the line is unchanged.
    Unchanged,
    /// One or more expansions took place.
    Changed,
    /// The `:p` modifier was present: display the result but do not run it.
    PrintOnly,
}

/// Length of the UTF-8 sequence introduced by `b`, treating continuation and
/// invalid bytes as single units.
const fn char_len(b: u8) -> usize {
    match b {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 1,
    }
}

fn substr(s: &str, start: usize, end: usize) -> String {
    let bytes = s.as_bytes();
    let end = end.min(bytes.len());
    let start = start.min(end);
    String::from_utf8_lossy(&bytes[start..end]).into_owned()
}

/// Advances past the contents of a single-quoted string; `index` enters at
/// the character after the opening quote and exits at the closing quote (or
/// end of string). With `backslash_escapes`, a backslash protects the
/// following character (for `$'...'`).
fn skip_single_quoted(bytes: &[u8], mut index: usize, backslash_escapes: bool) -> usize {
    while index < bytes.len() && bytes[index] != b'\'' {
        if backslash_escapes && bytes[index] == b'\\' && index + 1 < bytes.len() {
            index += 1;
        }
        index += 1;
    }
    index
}

/// Quotes `s` so the shell reads it as one single-quoted word.
fn single_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

/// Like [`single_quote`], but closes and reopens the quotes around every
/// whitespace run so each word is individually quoted.
fn quote_breaks(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else if c == ' ' || c == '\t' || c == '\n' {
            out.push('\'');
            out.push(c);
            out.push('\'');
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

/// Extracts a substitution pattern from `s` at `*index`, stopping at an
/// unescaped `delimiter`. An empty lhs yields `None` so the caller can fall
/// back to the previous pattern; the rhs is materialized even when empty.
fn get_subst_pattern(s: &str, index: &mut usize, delimiter: u8, is_rhs: bool) -> Option<String> {
    let bytes = s.as_bytes();
    let i = *index;

    let mut si = i;
    while si < bytes.len() && bytes[si] != delimiter {
        if bytes[si] >= 0x80 {
            si += char_len(bytes[si]);
        } else if bytes[si] == b'\\' && bytes.get(si + 1) == Some(&delimiter) {
            si += 2;
        } else {
            si += 1;
        }
    }

    let result = if si > i || is_rhs {
        let mut out: Vec<u8> = Vec::with_capacity(si - i);
        let mut k = i;
        while k < si {
            if bytes[k] == b'\\' && bytes.get(k + 1) == Some(&delimiter) {
                k += 1;
            }
            out.push(bytes[k]);
            k += 1;
        }
        Some(String::from_utf8_lossy(&out).into_owned())
    } else {
        None
    };

    let mut i = si;
    if i < bytes.len() {
        i += 1;
    }
    *index = i;

    result
}

impl History {
    /// Replaces every unescaped `&` in the saved rhs with the saved lhs.
    fn postproc_subst_rhs(&mut self) {
        let lhs = self.subst_lhs.clone().unwrap_or_default();
        let rhs = self.subst_rhs.take().unwrap_or_default();

        let mut new_rhs = String::with_capacity(rhs.len());
        let bytes = rhs.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'&' {
                new_rhs.push_str(&lhs);
            } else {
                // A single backslash protects the `&` from lhs interpolation.
                if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'&') {
                    i += 1;
                }
                let len = char_len(bytes[i]);
                new_rhs.push_str(&substr(&rhs, i, i + len));
                i += len - 1;
            }
            i += 1;
        }

        self.subst_rhs = Some(new_rhs);
    }

    /// Resolves the event specification beginning at `*index` in `string`
    /// (which must point at the expansion character). On success the entry's
    /// text is returned and `*index` is left just past the specification.
    ///
    /// `delimiting_quote` is an extra character allowed to end a search
    /// specification, beyond `:`, whitespace, and the event delimiters.
    pub(crate) fn get_history_event(
        &mut self,
        string: &str,
        index: &mut usize,
        delimiting_quote: Option<char>,
    ) -> Option<String> {
        let bytes = string.as_bytes();
        let expansion_char = self.expansion_char?;
        if !expansion_char.is_ascii() {
            return None;
        }
        let expansion_char = expansion_char as u8;

        let mut i = *index;
        if bytes.get(i) != Some(&expansion_char) {
            return None;
        }
        i += 1;

        // !!
        if bytes.get(i) == Some(&expansion_char) {
            i += 1;
            *index = i;
            let which = self.base() + self.len().checked_sub(1)?;
            return self.get_logical(which).map(|e| e.line.clone());
        }

        // Numeric specification, possibly negative.
        let mut sign = 1i64;
        if bytes.get(i) == Some(&b'-') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
            sign = -1;
            i += 1;
        }

        if bytes.get(i).is_some_and(u8::is_ascii_digit) {
            let mut which = 0i64;
            while let Some(d) = bytes.get(i).filter(|b| b.is_ascii_digit()) {
                which = which.saturating_mul(10) + i64::from(d - b'0');
                i += 1;
            }
            *index = i;

            if sign < 0 {
                which = i64::try_from(self.len() + self.base()).ok()? - which;
            }

            let which = usize::try_from(which).ok()?;
            return self.get_logical(which).map(|e| e.line.clone());
        }

        // A string to search for. A leading `?` permits the match anywhere in
        // the line; otherwise it must start the line.
        let mut substring_okay = false;
        if bytes.get(i) == Some(&b'?') {
            substring_okay = true;
            i += 1;
        }

        let local_index = i;
        let delimiting_quote = delimiting_quote.filter(char::is_ascii).map(|c| c as u8);
        while i < bytes.len() {
            let c = bytes[i];
            if c >= 0x80 {
                i += char_len(c);
                continue;
            }

            if bytes[i] == b'\n' || (substring_okay && c == b'?') {
                break;
            }

            if !substring_okay {
                let event_delim =
                    (i > local_index && c == b'-') || (c != b'-' && b"^$*%-".contains(&c));
                let search_delim = self
                    .search_delimiters
                    .as_deref()
                    .is_some_and(|d| d.as_bytes().contains(&c));
                if c == b' '
                    || c == b'\t'
                    || c == b':'
                    || event_delim
                    || search_delim
                    || Some(c) == delimiting_quote
                {
                    break;
                }
            }

            i += 1;
        }

        let mut term = substr(string, local_index, i);
        if substring_okay && bytes.get(i) == Some(&b'?') {
            i += 1;
        }
        *index = i;

        // An empty substring search reuses the previous search string.
        if term.is_empty() {
            if substring_okay && self.last_search_string.is_some() {
                term = self.last_search_string.clone().unwrap_or_default();
            } else {
                self.using_history();
                return None;
            }
        }

        let found = if substring_okay {
            self.search(&term, Direction::Backward)
        } else {
            self.search_prefix(&term, Direction::Backward)
        };

        match found {
            Some(line_index) => {
                let line = self.current()?.line.clone();
                self.using_history();
                if substring_okay {
                    // Remember the string and the word it matched for later
                    // use by `!?str?` repeats and the `%` designator.
                    self.last_search_match = self.find_word(&line, line_index);
                    self.last_search_string = Some(term);
                }
                Some(line)
            }
            None => {
                self.using_history();
                None
            }
        }
    }

    /// Parses an optional word designator at `*index`, returning the selected
    /// words from `from`. `Ok(None)` means no designator was present; an
    /// error means a designator was present but selected nonexistent words.
    fn get_history_word_specifier(
        &self,
        spec: &str,
        from: &str,
        index: &mut usize,
    ) -> Result<Option<String>, ()> {
        let bytes = spec.as_bytes();
        let mut i = *index;
        let mut expecting_word_spec = false;

        // A colon here makes whatever follows a word specification.
        if bytes.get(i) == Some(&b':') {
            i += 1;
            expecting_word_spec = true;
        }

        // `%` is the word last matched by a substring search.
        if bytes.get(i) == Some(&b'%') {
            *index = i + 1;
            return Ok(Some(self.last_search_match.clone().unwrap_or_default()));
        }

        let words = self.tokenize(from);

        // `*` selects all of the arguments, but not the command.
        if bytes.get(i) == Some(&b'*') {
            *index = i + 1;
            let result = tokenize::arg_extract(&words, WordSel::Index(1), WordSel::Last);
            return Ok(Some(result.unwrap_or_default()));
        }

        // `$` is the last argument.
        if bytes.get(i) == Some(&b'$') {
            *index = i + 1;
            return Ok(tokenize::arg_extract(&words, WordSel::Last, WordSel::Last));
        }

        let first: i64;
        match bytes.get(i) {
            Some(b'-') => first = 0,
            Some(b'^') => {
                first = 1;
                i += 1;
            }
            Some(d) if d.is_ascii_digit() && expecting_word_spec => {
                let mut n = 0i64;
                while let Some(d) = bytes.get(i).filter(|b| b.is_ascii_digit()) {
                    n = n.saturating_mul(10) + i64::from(d - b'0');
                    i += 1;
                }
                first = n;
            }
            _ => return Ok(None), // no valid `first` for a word specifier
        }

        let last: WordSel;
        if bytes.get(i) == Some(&b'^') {
            last = WordSel::Index(1);
            i += 1;
        } else if bytes.get(i) == Some(&b'*') {
            // x* abbreviates x-$.
            last = WordSel::Last;
            i += 1;
        } else if bytes.get(i) != Some(&b'-') {
            last = WordSel::Index(first);
        } else {
            i += 1;
            if bytes.get(i).is_some_and(u8::is_ascii_digit) {
                let mut n = 0i64;
                while let Some(d) = bytes.get(i).filter(|b| b.is_ascii_digit()) {
                    n = n.saturating_mul(10) + i64::from(d - b'0');
                    i += 1;
                }
                last = WordSel::Index(n);
            } else if bytes.get(i) == Some(&b'$') {
                i += 1;
                last = WordSel::Last;
            } else if bytes.get(i) == Some(&b'^') {
                i += 1;
                last = WordSel::Index(1);
            } else {
                // x- abbreviates x-$, omitting the final word.
                last = WordSel::Index(-1);
            }
        }

        *index = i;

        let in_range = match last {
            WordSel::Last => true,
            WordSel::Index(n) => n >= first || n < 0,
        };
        if in_range {
            if let Some(result) = tokenize::arg_extract(&words, WordSel::Index(first), last) {
                return Ok(Some(result));
            }
        }

        Err(())
    }

    /// Expands the specifier starting at `string[start]` (the expansion
    /// character). Returns the expansion text, the index of the first
    /// unconsumed byte, and whether `:p` was given. `current_line` is the
    /// output accumulated so far, for the `!#` event.
    #[allow(clippy::too_many_lines)]
    fn expand_internal(
        &mut self,
        string: &str,
        start: usize,
        delimiting_quote: Option<char>,
        current_line: &str,
    ) -> Result<(String, usize, bool), ExpansionError> {
        let bytes = string.as_bytes();
        let mut i = start;

        // If the designator is followed by something that starts a word
        // specifier, `!!` is the implied event.
        let event = if matches!(bytes.get(i + 1), Some(b':' | b'$' | b'*' | b'%' | b'^')) {
            i += 1;
            let expansion_char = self.expansion_char.unwrap_or('!');
            let fake = format!("{expansion_char}{expansion_char}");
            let mut fake_index = 0;
            self.get_history_event(&fake, &mut fake_index, None)
        } else if bytes.get(i + 1) == Some(&b'#') {
            i += 2;
            Some(current_line.to_string())
        } else {
            self.get_history_event(string, &mut i, delimiting_quote)
        };

        let Some(event) = event else {
            return Err(ExpansionError::new(
                substr(string, start, i),
                ExpansionErrorKind::EventNotFound,
            ));
        };

        let starting_index = i;
        let word_spec = match self.get_history_word_specifier(string, &event, &mut i) {
            Ok(spec) => spec,
            Err(()) => {
                return Err(ExpansionError::new(
                    substr(string, starting_index, i),
                    ExpansionErrorKind::BadWordSpecifier,
                ));
            }
        };

        // With no word specifier, the thing of interest is the whole event.
        let mut temp = word_spec.unwrap_or_else(|| event.clone());

        let mut want_quotes: Option<u8> = None;
        let mut print_only = false;
        let mut substitute_globally = false;
        let mut subst_bywords = false;
        let starting_index = i;

        while bytes.get(i) == Some(&b':') {
            let mut c = bytes.get(i + 1).copied().unwrap_or(0);

            if c == b'g' || c == b'a' {
                substitute_globally = true;
                i += 1;
                c = bytes.get(i + 1).copied().unwrap_or(0);
            } else if c == b'G' {
                subst_bywords = true;
                i += 1;
                c = bytes.get(i + 1).copied().unwrap_or(0);
            }

            match c {
                b'q' => want_quotes = Some(b'q'),
                b'x' => want_quotes = Some(b'x'),
                // :p means display only; the caller reports the expansion but
                // does not run it.
                b'p' => print_only = true,
                // :t discards all but the last component of the pathname.
                b't' => {
                    if let Some(idx) = temp.rfind('/') {
                        temp = temp.split_off(idx + 1);
                    }
                }
                // :h discards the last component.
                b'h' => {
                    if let Some(idx) = temp.rfind('/') {
                        temp.truncate(idx);
                    }
                }
                // :r discards the suffix.
                b'r' => {
                    if let Some(idx) = temp.rfind('.') {
                        temp.truncate(idx);
                    }
                }
                // :e discards everything but the suffix.
                b'e' => {
                    if let Some(idx) = temp.rfind('.') {
                        temp = temp.split_off(idx);
                    }
                }
                b's' | b'&' => {
                    if c == b's' {
                        let Some(&delim) = bytes.get(i + 2) else {
                            // No search delimiter; treat `:s` as inert.
                            i += 2;
                            continue;
                        };
                        // A multibyte delimiter never matches a byte.
                        let delimiter = if delim >= 0x80 { 0 } else { delim };
                        i += 3;

                        if let Some(lhs) = get_subst_pattern(string, &mut i, delimiter, false) {
                            self.subst_lhs = Some(lhs);
                        } else if self.subst_lhs.is_none() {
                            // An empty lhs with no previous substitution uses
                            // the last search string.
                            self.subst_lhs = self
                                .last_search_string
                                .clone()
                                .filter(|s| !s.is_empty());
                        }

                        self.subst_rhs = get_subst_pattern(string, &mut i, delimiter, true);
                        if self.subst_rhs.as_deref().is_some_and(|r| r.contains('&')) {
                            self.postproc_subst_rhs();
                        }
                    } else {
                        i += 2;
                    }

                    let lhs = self.subst_lhs.clone().unwrap_or_default();
                    if lhs.is_empty() {
                        return Err(ExpansionError::new(
                            substr(string, starting_index, i),
                            ExpansionErrorKind::NoPreviousSubstitution,
                        ));
                    }
                    let rhs = self.subst_rhs.clone().unwrap_or_default();

                    if lhs.len() > temp.len() {
                        return Err(ExpansionError::new(
                            substr(string, starting_index, i),
                            ExpansionErrorKind::SubstitutionFailed,
                        ));
                    }

                    let mut si = 0usize;
                    let mut word_end = 0usize;
                    let mut failed = true;
                    while si + lhs.len() <= temp.len() {
                        if subst_bywords && si > word_end {
                            while si < temp.len() && tokenize::field_delim(temp.as_bytes()[si]) {
                                si += 1;
                            }
                            word_end = tokenize::tokenize_word(temp.as_bytes(), si);
                        }

                        if temp.as_bytes()[si..].starts_with(lhs.as_bytes()) {
                            temp.replace_range(si..si + lhs.len(), &rhs);
                            failed = false;

                            if substitute_globally {
                                si += rhs.len();
                                continue;
                            } else if subst_bywords {
                                si = word_end + 1;
                                continue;
                            }
                            break;
                        }

                        si += 1;
                    }

                    if failed {
                        return Err(ExpansionError::new(
                            substr(string, starting_index, i),
                            ExpansionErrorKind::SubstitutionFailed,
                        ));
                    }

                    substitute_globally = false;
                    continue; // `i` already points past the patterns
                }
                _ => {
                    return Err(ExpansionError::new(
                        substr(string, i + 1, i + 2),
                        ExpansionErrorKind::BadModifier,
                    ));
                }
            }

            i += 2;
        }

        if let Some(q) = want_quotes {
            temp = if q == b'q' {
                single_quote(&temp)
            } else {
                quote_breaks(&temp)
            };
        }

        Ok((temp, i, print_only))
    }

    /// Expands history references in `input`.
    ///
    /// Returns the (possibly rewritten) line together with an [`Expansion`]
    /// describing whether anything changed or the result is display-only. A
    /// failed expansion yields an [`ExpansionError`] whose rendering is the
    /// offending specifier followed by a description; the caller is expected
    /// to refuse to execute the line.
    #[allow(clippy::too_many_lines)]
    pub fn expand(&mut self, input: &str) -> Result<(Expansion, String), ExpansionError> {
        // An unset expansion character inhibits all expansion.
        let Some(expansion_char) = self.expansion_char.filter(char::is_ascii) else {
            return Ok((Expansion::Unchanged, input.to_string()));
        };
        let expansion_char = expansion_char as u8;
        let comment_char = self
            .comment_char
            .filter(char::is_ascii)
            .map(|c| c as u8)
            .unwrap_or(0);

        // The quick substitution character is a history expansion all right:
        // `^this^that^` is equivalent to `!!:s^this^that^`, and that is the
        // substitution we perform.
        let quick_subst = input
            .chars()
            .next()
            .is_some_and(|c| c == self.subst_char);
        let string = if quick_subst {
            let e = expansion_char as char;
            format!("{e}{e}:s{input}")
        } else {
            input.to_string()
        };
        let bytes = string.as_bytes();

        let mut dquote = self.quoting_state == Some('"');
        let squote = self.quoting_state == Some('\'');

        if !quick_subst {
            // See whether the expansion character appears anywhere within the
            // text in a position where it is active, before groveling through
            // the whole string.
            let mut i = 0;

            if squote && self.quotes_inhibit_expansion {
                i = skip_single_quoted(bytes, i, false);
                if i < bytes.len() {
                    i += 1;
                }
            }

            let mut found = false;
            while i < bytes.len() {
                let c = bytes[i];
                if c >= 0x80 {
                    i += char_len(c);
                    continue;
                }
                let cc = bytes.get(i + 1).copied().unwrap_or(0);

                // The comment character at the start of a word means the rest
                // of the line is not expanded.
                if comment_char != 0
                    && c == comment_char
                    && !dquote
                    && (i == 0 || crate::list::WORD_DELIMITERS.as_bytes().contains(&bytes[i - 1]))
                {
                    break;
                } else if c == expansion_char {
                    if cc == 0 || NO_EXPAND_CHARS.as_bytes().contains(&cc) {
                        // inert
                    } else if dquote && cc == b'"' {
                        // Treat a double-quoted string like the word outside
                        // double quotes: `!"` is inert.
                    } else if self
                        .inhibit_expansion
                        .as_ref()
                        .is_some_and(|pred| pred(&string, i))
                    {
                        // vetoed by the application
                    } else {
                        found = true;
                        break;
                    }
                } else if dquote && c == b'\\' && cc == b'"' {
                    i += 1;
                } else if self.quotes_inhibit_expansion && c == b'"' {
                    dquote = !dquote;
                } else if !dquote && self.quotes_inhibit_expansion && c == b'\'' {
                    let flag = i > 0 && bytes[i - 1] == b'$';
                    i += 1;
                    i = skip_single_quoted(bytes, i, flag);
                } else if self.quotes_inhibit_expansion && c == b'\\' {
                    if cc == b'\'' || cc == expansion_char {
                        i += 1;
                    }
                }

                i += 1;
            }

            if !found {
                return Ok((Expansion::Unchanged, input.to_string()));
            }
        }

        // Extract and perform the substitutions.
        let mut result = String::with_capacity(string.len());
        let mut dquote = self.quoting_state == Some('"');
        let mut squote = self.quoting_state == Some('\'');
        let mut i = 0;

        if squote && self.quotes_inhibit_expansion {
            let end = skip_single_quoted(bytes, 0, false);
            result.push_str(&substr(&string, 0, end));
            i = end;
            if i < bytes.len() {
                result.push('\'');
                i += 1;
            }
            squote = false;
        }

        let mut passc = false;
        let mut modified = false;
        let mut only_printing = false;

        while i < bytes.len() {
            let c = bytes[i];

            if passc {
                passc = false;
                let len = char_len(c);
                result.push_str(&substr(&string, i, i + len));
                i += len;
                continue;
            }

            if c >= 0x80 {
                let len = char_len(c);
                result.push_str(&substr(&string, i, i + len));
                i += len;
                continue;
            }

            if c == expansion_char {
                let cc = bytes.get(i + 1).copied().unwrap_or(0);
                if cc == 0
                    || NO_EXPAND_CHARS.as_bytes().contains(&cc)
                    || (dquote && cc == b'"')
                    || self
                        .inhibit_expansion
                        .as_ref()
                        .is_some_and(|pred| pred(&string, i))
                {
                    result.push(c as char);
                    i += 1;
                    continue;
                }

                let quote = if squote {
                    Some('\'')
                } else if dquote {
                    Some('"')
                } else {
                    None
                };

                let (temp, next_index, r_print) =
                    self.expand_internal(&string, i, quote, &result)?;

                tracing::debug!(target: trace_categories::EXPANSION,
                    "expanded '{}' => '{temp}'", substr(&string, i, next_index));

                modified = true;
                result.push_str(&temp);
                only_printing |= r_print;
                i = next_index;
                continue;
            }

            if comment_char != 0 && c == comment_char {
                if (!dquote || !self.quotes_inhibit_expansion)
                    && (i == 0 || crate::list::WORD_DELIMITERS.as_bytes().contains(&bytes[i - 1]))
                {
                    result.push_str(&substr(&string, i, bytes.len()));
                    break;
                }
                result.push(c as char);
                i += 1;
                continue;
            }

            match c {
                b'\\' => {
                    passc = true;
                    result.push('\\');
                    i += 1;
                }
                b'"' => {
                    dquote = !dquote;
                    result.push('"');
                    i += 1;
                }
                b'\'' => {
                    if squote {
                        squote = false;
                        result.push('\'');
                        i += 1;
                    } else if !dquote && self.quotes_inhibit_expansion {
                        let flag = i > 0 && bytes[i - 1] == b'$';
                        let quote_start = i;
                        i += 1;
                        i = skip_single_quoted(bytes, i, flag);
                        if i < bytes.len() {
                            i += 1; // include the closing quote
                        }
                        result.push_str(&substr(&string, quote_start, i));
                    } else if !dquote && !squote {
                        squote = true;
                        result.push('\'');
                        i += 1;
                    } else {
                        result.push('\'');
                        i += 1;
                    }
                }
                _ => {
                    result.push(c as char);
                    i += 1;
                }
            }
        }

        if only_printing {
            return Ok((Expansion::PrintOnly, result));
        }

        if modified {
            Ok((Expansion::Changed, result))
        } else {
            Ok((Expansion::Unchanged, result))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> History {
        let mut history = History::new();
        for line in ["echo one", "echo two", "echo three"] {
            history.add(line);
        }
        history.using_history();
        history
    }

    fn expand_ok(history: &mut History, input: &str) -> (Expansion, String) {
        history.expand(input).unwrap()
    }

    #[test]
    fn plain_text_is_unchanged() {
        let mut history = sample();
        let (outcome, line) = expand_ok(&mut history, "ls -l /tmp");
        assert_eq!(outcome, Expansion::Unchanged);
        assert_eq!(line, "ls -l /tmp");
    }

    #[test]
    fn bang_bang_expands_to_last_entry() {
        let mut history = sample();
        let (outcome, line) = expand_ok(&mut history, "!!");
        assert_eq!(outcome, Expansion::Changed);
        assert_eq!(line, "echo three");
    }

    #[test]
    fn numeric_events_resolve_against_base() {
        let mut history = sample();
        assert_eq!(expand_ok(&mut history, "!1").1, "echo one");
        assert_eq!(expand_ok(&mut history, "!3").1, "echo three");
        assert_eq!(expand_ok(&mut history, "!-1").1, "echo three");
        assert_eq!(expand_ok(&mut history, "!-3").1, "echo one");

        let err = history.expand("!99").unwrap_err();
        assert_eq!(err.kind, ExpansionErrorKind::EventNotFound);
        assert_eq!(err.to_string(), "!99: event not found");
    }

    #[test]
    fn prefix_search_event() {
        let mut history = sample();
        assert_eq!(expand_ok(&mut history, "!echo").1, "echo three");
        let err = history.expand("!xyzzy").unwrap_err();
        assert_eq!(err.kind, ExpansionErrorKind::EventNotFound);
    }

    #[test]
    fn substring_search_remembers_string() {
        let mut history = sample();
        let (_, line) = expand_ok(&mut history, "!?tw?");
        assert_eq!(line, "echo two");
        assert_eq!(history.last_search_string(), Some("tw"));
        assert_eq!(history.last_search_match(), Some("two"));

        // An empty search string reuses the previous one.
        assert_eq!(expand_ok(&mut history, "!??").1, "echo two");
    }

    #[test]
    fn word_designators() {
        let mut history = History::new();
        history.add("/usr/bin/vi hello.c extra");
        history.using_history();

        assert_eq!(expand_ok(&mut history, "!!:0").1, "/usr/bin/vi");
        assert_eq!(expand_ok(&mut history, "!!:1").1, "hello.c");
        assert_eq!(expand_ok(&mut history, "!!:$").1, "extra");
        assert_eq!(expand_ok(&mut history, "!!:*").1, "hello.c extra");
        assert_eq!(expand_ok(&mut history, "!!:1-2").1, "hello.c extra");
        assert_eq!(expand_ok(&mut history, "!!:^").1, "hello.c");
        assert_eq!(expand_ok(&mut history, "!$").1, "extra");

        let err = history.expand("!!:9").unwrap_err();
        assert_eq!(err.kind, ExpansionErrorKind::BadWordSpecifier);
    }

    #[test]
    fn pathname_modifiers() {
        let mut history = History::new();
        history.add("/usr/bin/vi hello.c");
        history.using_history();

        assert_eq!(expand_ok(&mut history, "!!:t:r").1, "vi hello");
        assert_eq!(expand_ok(&mut history, "!!:h").1, "/usr/bin");
        assert_eq!(expand_ok(&mut history, "!!:1:e").1, ".c");
    }

    #[test]
    fn quick_substitution_first_occurrence_only() {
        let mut history = History::new();
        history.add("foo bar foo");
        history.using_history();

        let (outcome, line) = expand_ok(&mut history, "^foo^qux^rest");
        assert_eq!(outcome, Expansion::Changed);
        assert_eq!(line, "qux bar foorest");
    }

    #[test]
    fn quick_substitution_matches_explicit_form() {
        let mut a = History::new();
        a.add("foo bar foo");
        a.using_history();
        let mut b = History::new();
        b.add("foo bar foo");
        b.using_history();

        assert_eq!(
            expand_ok(&mut a, "^foo^qux^").1,
            expand_ok(&mut b, "!!:s^foo^qux^").1
        );
    }

    #[test]
    fn global_substitution() {
        let mut history = History::new();
        history.add("foo bar foo");
        history.using_history();

        let (outcome, line) = expand_ok(&mut history, "!!:gs/foo/qux/");
        assert_eq!(outcome, Expansion::Changed);
        assert_eq!(line, "qux bar qux");
    }

    #[test]
    fn per_word_substitution() {
        let mut history = History::new();
        history.add("echo aa aaa");
        history.using_history();

        let (_, line) = expand_ok(&mut history, "!!:Gs/a/b/");
        assert_eq!(line, "echo ba baa");
    }

    #[test]
    fn ampersand_reinserts_lhs() {
        let mut history = History::new();
        history.add("grep foo");
        history.using_history();

        assert_eq!(expand_ok(&mut history, "!!:s/foo/<&>/").1, "grep <foo>");
    }

    #[test]
    fn repeat_substitution() {
        let mut history = History::new();
        history.add("foo one");
        history.add("foo two");
        history.using_history();

        assert_eq!(expand_ok(&mut history, "!-2:s/foo/bar/").1, "bar one");
        assert_eq!(expand_ok(&mut history, "!!:&").1, "bar two");

        let mut fresh = History::new();
        fresh.add("anything");
        fresh.using_history();
        let err = fresh.expand("!!:&").unwrap_err();
        assert_eq!(err.kind, ExpansionErrorKind::NoPreviousSubstitution);
    }

    #[test]
    fn failed_substitution_reports_error() {
        let mut history = sample();
        let err = history.expand("!!:s/xyzzy/a/").unwrap_err();
        assert_eq!(err.kind, ExpansionErrorKind::SubstitutionFailed);
        assert_eq!(err.to_string(), ":s/xyzzy/a/: substitution failed");
    }

    #[test]
    fn unknown_modifier_reports_error() {
        let mut history = sample();
        let err = history.expand("!!:z").unwrap_err();
        assert_eq!(err.kind, ExpansionErrorKind::BadModifier);
        assert_eq!(err.to_string(), "z: unrecognized history modifier");
    }

    #[test]
    fn print_only_modifier() {
        let mut history = sample();
        let (outcome, line) = expand_ok(&mut history, "!!:p");
        assert_eq!(outcome, Expansion::PrintOnly);
        assert_eq!(line, "echo three");
    }

    #[test]
    fn quote_modifiers() {
        let mut history = History::new();
        history.add("one two");
        history.using_history();

        assert_eq!(expand_ok(&mut history, "!!:q").1, "'one two'");
        assert_eq!(expand_ok(&mut history, "!!:x").1, "'one' 'two'");
    }

    #[test]
    fn single_quotes_inhibit_when_configured() {
        let mut history = sample();
        history.quotes_inhibit_expansion = true;
        let (outcome, line) = expand_ok(&mut history, "echo '!!'");
        assert_eq!(outcome, Expansion::Unchanged);
        assert_eq!(line, "echo '!!'");

        history.quotes_inhibit_expansion = false;
        let (outcome, line) = expand_ok(&mut history, "echo '!!'");
        assert_eq!(outcome, Expansion::Changed);
        assert_eq!(line, "echo 'echo three'");
    }

    #[test]
    fn backslash_protects_expansion_char() {
        let mut history = sample();
        history.quotes_inhibit_expansion = true;
        let (outcome, line) = expand_ok(&mut history, r"echo \!!");
        assert_eq!(outcome, Expansion::Unchanged);
        assert_eq!(line, r"echo \!!");
    }

    #[test]
    fn comment_char_stops_expansion() {
        let mut history = sample();
        history.comment_char = Some('#');
        let (outcome, line) = expand_ok(&mut history, "echo hi # !!");
        assert_eq!(outcome, Expansion::Unchanged);
        assert_eq!(line, "echo hi # !!");
    }

    #[test]
    fn no_expand_chars_are_inert() {
        let mut history = sample();
        for input in ["size != 3", "echo ! ", "echo !\ttab", "a != b"] {
            let (outcome, line) = expand_ok(&mut history, input);
            assert_eq!(outcome, Expansion::Unchanged, "input: {input}");
            assert_eq!(line, input);
        }
    }

    #[test]
    fn bang_hash_inserts_line_so_far() {
        let mut history = sample();
        let (_, line) = expand_ok(&mut history, "echo abc !#");
        assert_eq!(line, "echo abc echo abc ");
    }

    #[test]
    fn inhibition_predicate_vetoes() {
        let mut history = sample();
        // Veto expansions directly following `$` (as a shell would for `$!`).
        history.set_inhibit_expansion(Box::new(|s: &str, i: usize| {
            i > 0 && s.as_bytes()[i - 1] == b'$'
        }));
        let (outcome, line) = expand_ok(&mut history, "echo $!!");
        assert_eq!(outcome, Expansion::Unchanged);
        assert_eq!(line, "echo $!!");
    }
}
