//! Prompt expansion: stripping invisible-character markers and measuring
//! what the prompt occupies on screen.

use crate::mbutil;

/// Marks the start of a run of non-printing characters in a prompt.
pub const PROMPT_START_IGNORE: char = '\u{1}';
/// Marks the end of a run of non-printing characters in a prompt.
pub const PROMPT_END_IGNORE: char = '\u{2}';

/// The expanded form of a prompt, with everything redisplay needs to know
/// about it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PromptInfo {
    /// Expanded text of everything before the last embedded newline; written
    /// once per forced redraw rather than on every update.
    pub prefix: String,
    /// Visible columns occupied by the prefix.
    pub prefix_columns: usize,
    /// Expanded text of the final prompt line, markers stripped, invisible
    /// bytes retained.
    pub text: String,
    /// Byte ranges of `text` that do not occupy screen columns.
    pub invisible: Vec<std::ops::Range<usize>>,
    /// Number of bytes of `text` that contribute characters to the screen.
    pub visible_bytes: usize,
    /// Byte offset just past the last invisible byte, or 0 if none.
    pub last_invisible: usize,
    /// Invisible bytes falling on the first screen line.
    pub invis_chars_first_line: usize,
    /// Visible columns occupied by `text`.
    pub physical_chars: usize,
    /// Byte offsets into `text` at which each wrapped screen line begins.
    pub newlines: Vec<usize>,
}

impl PromptInfo {
    /// Expands `prompt` for a screen of the given width. `mode_indicator`,
    /// when present, is prepended to the final line.
    pub fn expand(prompt: &str, screen_width: usize, mode_indicator: Option<&str>) -> Self {
        let width = if screen_width == 0 { 80 } else { screen_width };

        let (prefix_src, last_line) = match prompt.rfind('\n') {
            Some(pos) => (&prompt[..=pos], &prompt[pos + 1..]),
            None => ("", prompt),
        };

        let (prefix, prefix_columns) = if prefix_src.is_empty() {
            (String::new(), 0)
        } else {
            let expanded = expand_line(prefix_src, width);
            let columns = expanded.physical_chars;
            (expanded.text, columns)
        };

        let source = mode_indicator.map_or_else(
            || last_line.to_string(),
            |mode| format!("{mode}{last_line}"),
        );

        let mut info = expand_line(&source, width);
        info.prefix = prefix;
        info.prefix_columns = prefix_columns;
        info
    }

    /// Whether the byte at `offset` in `text` is invisible.
    pub fn is_invisible(&self, offset: usize) -> bool {
        self.invisible.iter().any(|r| r.contains(&offset))
    }
}

fn expand_line(source: &str, width: usize) -> PromptInfo {
    let mut info = PromptInfo::default();
    let mut ignoring = false;
    let mut ignore_start = 0usize;
    let mut physchars = 0usize;
    let mut invis_count = 0usize;
    let mut invfl_set = false;

    info.newlines.push(0);

    for c in source.chars() {
        if !ignoring && c == PROMPT_START_IGNORE {
            ignoring = true;
            ignore_start = info.text.len();
            continue;
        }
        if ignoring && c == PROMPT_END_IGNORE {
            ignoring = false;
            if info.text.len() > ignore_start {
                info.invisible.push(ignore_start..info.text.len());
                info.last_invisible = info.text.len();
            }
            continue;
        }

        info.text.push(c);
        if ignoring {
            invis_count += c.len_utf8();
        } else {
            info.visible_bytes += c.len_utf8();
            physchars += mbutil::char_width(c);
        }

        if !invfl_set && physchars >= width {
            info.invis_chars_first_line = invis_count;
            invfl_set = true;
        }

        if physchars >= info.newlines.len() * width {
            info.newlines.push(info.text.len());
        }
    }

    // An unterminated ignore run still counts as invisible.
    if ignoring && info.text.len() > ignore_start {
        info.invisible.push(ignore_start..info.text.len());
        info.last_invisible = info.text.len();
    }

    if physchars < width {
        info.invis_chars_first_line = invis_count;
    }
    info.physical_chars = physchars;
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_prompt_measures_bytes_and_columns() {
        let info = PromptInfo::expand("$ ", 80, None);
        assert_eq!(info.text, "$ ");
        assert_eq!(info.visible_bytes, 2);
        assert_eq!(info.physical_chars, 2);
        assert!(info.invisible.is_empty());
    }

    #[test]
    fn invisible_markers_are_stripped_but_content_kept() {
        // \x01...\x02 wraps a color escape.
        let prompt = "\u{1}\u{1b}[31m\u{2}$ \u{1}\u{1b}[0m\u{2}";
        let info = PromptInfo::expand(prompt, 80, None);

        assert_eq!(info.text, "\u{1b}[31m$ \u{1b}[0m");
        assert_eq!(info.physical_chars, 2);
        assert_eq!(info.visible_bytes, 2);
        assert_eq!(info.invisible.len(), 2);
        assert!(info.is_invisible(0));
        assert!(!info.is_invisible(5));
        assert_eq!(info.last_invisible, info.text.len());
    }

    #[test]
    fn visible_length_matches_stripped_width() {
        // The visible column count equals the width of the prompt with its
        // ignored regions removed.
        let prompt = "\u{1}ZZZ\u{2}abc\u{1}Q\u{2}déf";
        let info = PromptInfo::expand(prompt, 80, None);
        assert_eq!(info.physical_chars, "abcdéf".chars().count());
    }

    #[test]
    fn multiline_prompt_splits_prefix() {
        let info = PromptInfo::expand("line1\nline2\n$ ", 80, None);
        assert_eq!(info.prefix, "line1\nline2\n");
        assert_eq!(info.text, "$ ");
    }

    #[test]
    fn wide_prompt_records_wrap_offsets() {
        let prompt = "abcdefghij";
        let info = PromptInfo::expand(prompt, 4, None);
        assert_eq!(info.newlines, vec![0, 4, 8]);
    }

    #[test]
    fn mode_indicator_prepends_to_last_line() {
        let info = PromptInfo::expand("$ ", 80, Some("(ins)"));
        assert_eq!(info.text, "(ins)$ ");
        assert_eq!(info.physical_chars, 7);
    }
}
