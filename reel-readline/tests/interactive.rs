//! End-to-end tests driving the editor through scripted keystrokes.

use anyhow::Result;
use pretty_assertions::assert_eq;
use reel_readline::{Command, Editor, ReadResult};

fn scripted(input: &[u8]) -> Editor {
    Editor::scripted(input.to_vec(), Box::new(std::io::sink()))
}

#[test]
fn inputrc_macro_binding_feeds_keys_back() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rc = dir.path().join("inputrc");
    std::fs::write(&rc, "\"\\C-xm\": \"echo hi\"\n")?;

    // Press C-x m, then accept the line the macro typed for us.
    let mut editor = scripted(b"\x18m\r");
    editor.read_init_file(Some(&rc))?;

    let result = editor.read_line("$ ")?;
    assert_eq!(result, ReadResult::Input("echo hi".to_string()));
    Ok(())
}

#[test]
fn lines_accumulate_in_history_and_recall() -> Result<()> {
    let mut editor = scripted(b"first\rsecond\r\x10\x10\r");

    let first = editor.read_line("$ ")?;
    assert_eq!(first, ReadResult::Input("first".to_string()));
    editor.history_mut().add("first");

    let second = editor.read_line("$ ")?;
    assert_eq!(second, ReadResult::Input("second".to_string()));
    editor.history_mut().add("second");

    // C-p twice recalls the first line.
    let recalled = editor.read_line("$ ")?;
    assert_eq!(recalled, ReadResult::Input("first".to_string()));
    Ok(())
}

#[test]
fn inputrc_rebinds_and_sets_variables() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rc = dir.path().join("inputrc");
    std::fs::write(
        &rc,
        "set bell-style none\n\
         \"\\C-t\": beginning-of-line\n",
    )?;

    // Type "ab", then C-t (now beginning-of-line, not transpose), then "X".
    let mut editor = scripted(b"ab\x14X\r");
    editor.read_init_file(Some(&rc))?;

    let seqs = editor.sequences_bound_to(Command::BeginningOfLine, None);
    assert!(seqs.contains(&r"\C-a".to_string()));
    assert!(seqs.contains(&r"\C-t".to_string()));

    let result = editor.read_line("$ ")?;
    assert_eq!(result, ReadResult::Input("Xab".to_string()));
    Ok(())
}

#[test]
fn incremental_search_pulls_matching_entry() -> Result<()> {
    let mut editor = scripted(b"\x12sec\n\r");
    for line in ["first command", "second command", "third command"] {
        editor.history_mut().add(line);
    }

    let result = editor.read_line("$ ")?;
    assert_eq!(result, ReadResult::Input("second command".to_string()));
    Ok(())
}

#[test]
fn unbound_sequences_ring_and_do_not_hang() -> Result<()> {
    // C-x followed by an unbound byte dings and leaves the line intact.
    let mut editor = scripted(b"ok\x18\x06\r");
    let result = editor.read_line("$ ")?;
    assert_eq!(result, ReadResult::Input("ok".to_string()));
    Ok(())
}
