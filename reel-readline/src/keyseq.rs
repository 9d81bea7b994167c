//! Translation between the inputrc escape syntax for key sequences and raw
//! bytes.

use crate::error::Error;
use crate::keymap::{ESC, RUBOUT, ctrl, meta};

/// Translates the escaped representation of a key sequence (`\C-x`, `\M-a`,
/// `\e`, octal, hex, and the usual C escapes) into raw bytes.
///
/// A trailing `\C-` or `\M-` with no base character modifies a NUL byte. A
/// lone trailing backslash is taken verbatim. When `convert_meta` is set,
/// bytes with the high bit become an ESC prefix followed by the stripped
/// byte.
pub fn translate_keyseq(seq: &str, convert_meta: bool) -> Result<Vec<u8>, Error> {
    let bytes = seq.as_bytes();
    let mut out = vec![];

    let mut has_control = false;
    let mut has_meta = false;

    let mut i = 0;
    while i < bytes.len() || has_control || has_meta {
        let mut c: u8 = bytes.get(i).copied().unwrap_or(0);

        // Only backslashes followed by another character are special; a
        // trailing backslash is processed as a normal character.
        if c == b'\\' && i + 1 < bytes.len() {
            i += 1;
            c = bytes[i];

            if c == b'C' && bytes.get(i + 1) == Some(&b'-') {
                i += 2;
                has_control = true;
                continue;
            }
            if c == b'M' && bytes.get(i + 1) == Some(&b'-') {
                i += 2;
                has_meta = true;
                continue;
            }

            c = match c {
                b'a' => 0x07,
                b'b' => 0x08,
                b'd' => RUBOUT,
                b'e' => ESC,
                b'f' => 0x0c,
                b'n' => b'\n',
                b'r' => b'\r',
                b't' => b'\t',
                b'v' => 0x0b,
                b'\\' => b'\\',
                b'0'..=b'7' => {
                    let mut value = u32::from(c - b'0');
                    let mut digits = 0;
                    while digits < 2 && bytes.get(i + 1).is_some_and(|b| (b'0'..=b'7').contains(b))
                    {
                        i += 1;
                        value = value * 8 + u32::from(bytes[i] - b'0');
                        digits += 1;
                    }
                    #[allow(clippy::cast_possible_truncation)]
                    {
                        (value & 0xff) as u8
                    }
                }
                b'x' => {
                    let mut value = 0u32;
                    let mut digits = 0;
                    while digits < 2 && bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit) {
                        i += 1;
                        let d = bytes[i];
                        let d = match d {
                            b'0'..=b'9' => d - b'0',
                            b'a'..=b'f' => d - b'a' + 10,
                            _ => d - b'A' + 10,
                        };
                        value = value * 16 + u32::from(d);
                        digits += 1;
                    }
                    if digits == 0 {
                        b'x'
                    } else {
                        #[allow(clippy::cast_possible_truncation)]
                        {
                            (value & 0xff) as u8
                        }
                    }
                }
                // A backslash before a non-special character is stripped.
                other => other,
            };
            i += 1;
        } else {
            i += 1;
        }

        if has_control {
            c = if c == b'?' {
                RUBOUT
            } else {
                ctrl(c.to_ascii_uppercase())
            };
            has_control = false;
        }
        if has_meta {
            c = meta(c);
            has_meta = false;
        }

        if c & 0x80 != 0 && convert_meta {
            out.push(ESC);
            out.push(c & 0x7f);
        } else {
            out.push(c);
        }
    }

    Ok(out)
}

/// Renders a single key byte in reusable `"\C-x"` form.
pub fn untranslate_key(key: u8) -> String {
    let mut out = String::new();
    let mut c = key;

    if c & 0x80 != 0 {
        out.push_str("\\M-");
        c &= 0x7f;
    }

    if c == ESC {
        out.push_str("\\e");
        return out;
    }

    if c < 0x20 {
        out.push_str("\\C-");
        c = (c | 0x60).to_ascii_lowercase();
    } else if c == RUBOUT {
        out.push_str("\\C-");
        c = b'?';
    }

    if c == b'\\' || c == b'"' {
        out.push('\\');
    }

    out.push(c as char);
    out
}

/// Renders a byte sequence (a key sequence or macro body) in reusable
/// double-quotable form. With `use_escapes`, common control characters are
/// rendered as their mnemonic escapes (`\n`, `\t`, ...) rather than `\C-x`
/// forms.
pub fn untranslate_seq(seq: &[u8], use_escapes: bool) -> String {
    let mut out = String::new();

    for &key in seq {
        let mut c = key;

        if c & 0x80 != 0 {
            out.push_str("\\M-");
            c &= 0x7f;
        }

        if c == ESC {
            out.push_str("\\e");
            continue;
        }

        if c < 0x20 || c == RUBOUT {
            if use_escapes {
                let escaped = match c {
                    0x07 => Some('a'),
                    0x08 => Some('b'),
                    0x0c => Some('f'),
                    b'\n' => Some('n'),
                    b'\r' => Some('r'),
                    b'\t' => Some('t'),
                    0x0b => Some('v'),
                    _ => None,
                };
                if let Some(e) = escaped {
                    out.push('\\');
                    out.push(e);
                    continue;
                }
            }
            out.push_str("\\C-");
            c = if c == RUBOUT {
                b'?'
            } else {
                (c | 0x60).to_ascii_lowercase()
            };
        }

        if c == b'\\' || c == b'"' {
            out.push('\\');
        }
        out.push(c as char);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn control_and_meta_prefixes() {
        assert_eq!(translate_keyseq(r"\C-a", false).unwrap(), vec![0x01]);
        assert_eq!(translate_keyseq(r"\C-?", false).unwrap(), vec![0x7f]);
        assert_eq!(translate_keyseq(r"\M-a", false).unwrap(), vec![0xe1]);
        assert_eq!(translate_keyseq(r"\M-a", true).unwrap(), vec![0x1b, b'a']);
        assert_eq!(
            translate_keyseq(r"\C-x\C-r", false).unwrap(),
            vec![0x18, 0x12]
        );
    }

    #[test]
    fn escapes_and_numeric_forms() {
        assert_eq!(translate_keyseq(r"\e[A", false).unwrap(), b"\x1b[A".to_vec());
        assert_eq!(translate_keyseq(r"\n\t", false).unwrap(), vec![b'\n', b'\t']);
        assert_eq!(translate_keyseq(r"\033", false).unwrap(), vec![0x1b]);
        assert_eq!(translate_keyseq(r"\x41", false).unwrap(), vec![b'A']);
        assert_eq!(translate_keyseq(r"\d", false).unwrap(), vec![0x7f]);
        // A backslash before an ordinary character is stripped.
        assert_eq!(translate_keyseq(r"\q", false).unwrap(), vec![b'q']);
    }

    #[test]
    fn trailing_prefixes_modify_nul() {
        assert_eq!(translate_keyseq(r"\C-", false).unwrap(), vec![0x00]);
        assert_eq!(translate_keyseq(r"\M-", false).unwrap(), vec![0x80]);
    }

    #[test]
    fn trailing_backslash_is_verbatim() {
        assert_eq!(translate_keyseq("a\\", false).unwrap(), vec![b'a', b'\\']);
    }

    #[test]
    fn untranslate_round_trip() {
        for key in [0x01u8, 0x1b, 0x7f, b'a', b'"', b'\\', 0xe1] {
            let rendered = untranslate_key(key);
            let bytes = translate_keyseq(&rendered, false).unwrap();
            assert_eq!(bytes, vec![key], "key {key:#x} via {rendered:?}");
        }
    }

    #[test]
    fn untranslate_macro_with_escapes() {
        assert_eq!(untranslate_seq(b"echo hi\n", true), "echo hi\\n");
        assert_eq!(untranslate_seq(b"\x18q", false), "\\C-xq");
    }
}
