//! Shell glob matching for history searches, via translation to a regex.

use crate::trace_categories;

/// Translates a shell glob into an anchored regex string. Returns `None` for
/// a pattern ending in an unescaped backslash or with no closing bracket
/// cleanly expressible.
fn glob_to_regex_str(pattern: &str) -> Option<String> {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str(r"(?s)\A");

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => {
                let next = chars.next()?;
                push_literal(&mut out, next);
            }
            '[' => {
                // Collect the bracket expression; a ']' directly after the
                // opening (or after '!') is a member, not the terminator.
                let mut class = String::new();
                let mut negated = false;
                if chars.peek() == Some(&'!') || chars.peek() == Some(&'^') {
                    negated = true;
                    chars.next();
                }
                if chars.peek() == Some(&']') {
                    class.push(']');
                    chars.next();
                }
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    class.push(c);
                }
                if closed {
                    out.push('[');
                    if negated {
                        out.push('^');
                    }
                    for c in class.chars() {
                        if matches!(c, '\\' | '[' | ']' | '^') {
                            out.push('\\');
                        }
                        out.push(c);
                    }
                    out.push(']');
                } else {
                    // Unterminated bracket matches itself.
                    push_literal(&mut out, '[');
                    if negated {
                        push_literal(&mut out, '!');
                    }
                    for c in class.chars() {
                        push_literal(&mut out, c);
                    }
                }
            }
            c => push_literal(&mut out, c),
        }
    }

    out.push_str(r"\z");
    Some(out)
}

fn push_literal(out: &mut String, c: char) {
    if matches!(
        c,
        '.' | '+' | '*' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '^' | '$' | '\\'
    ) {
        out.push('\\');
    }
    out.push(c);
}

/// Compiles a shell glob into a whole-string matcher.
pub(crate) fn compile_glob(pattern: &str) -> Option<fancy_regex::Regex> {
    let regex_str = glob_to_regex_str(pattern)?;
    match fancy_regex::Regex::new(&regex_str) {
        Ok(regex) => Some(regex),
        Err(err) => {
            tracing::debug!(target: trace_categories::HISTORY,
                "failed to compile history search pattern '{pattern}': {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, line: &str) -> bool {
        compile_glob(pattern).is_some_and(|re| re.is_match(line).unwrap_or(false))
    }

    #[test]
    fn star_and_question() {
        assert!(matches("*echo*", "well echo there"));
        assert!(matches("echo ?", "echo x"));
        assert!(!matches("echo ?", "echo xy"));
    }

    #[test]
    fn classes() {
        assert!(matches("make [ab]*", "make all"));
        assert!(!matches("make [!ab]*", "make all"));
    }

    #[test]
    fn regex_metachars_are_literal() {
        assert!(matches("a.b*", "a.b c"));
        assert!(!matches("a.b*", "axb c"));
        assert!(matches("x(1)*", "x(1) y"));
    }

    #[test]
    fn escaped_star_is_literal() {
        assert!(matches(r"a\*b", "a*b"));
        assert!(!matches(r"a\*b", "axb"));
    }
}
