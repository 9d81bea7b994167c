//! Reading, writing, and truncating history files.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::list::History;
use crate::trace_categories;

/// Does this buffer position look like the start of a timestamp line?
fn is_timestamp_start(bytes: &[u8], comment_char: Option<u8>) -> bool {
    comment_char.is_some_and(|c| bytes.first() == Some(&c))
        && bytes.get(1).is_some_and(u8::is_ascii_digit)
}

fn resolve_path(path: Option<&Path>) -> Result<PathBuf, Error> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }

    if let Ok(home) = std::env::var("HOME") {
        if !home.is_empty() {
            return Ok(Path::new(&home).join(".history"));
        }
    }

    if cfg!(windows) {
        if let Ok(appdata) = std::env::var("APPDATA") {
            if !appdata.is_empty() {
                return Ok(Path::new(&appdata).join(".history"));
            }
        }
    }

    Err(Error::NoHistoryFilePath)
}

/// Returns `filename-<pid>.tmp`, following a symlink first so the temporary
/// file is created in the same directory as the real history file.
fn tempfile_path(target: &Path) -> PathBuf {
    let resolved = resolve_symlink(target);
    PathBuf::from(format!("{}-{}.tmp", resolved.display(), std::process::id()))
}

fn resolve_symlink(target: &Path) -> PathBuf {
    match std::fs::read_link(target) {
        Ok(link) if link.is_absolute() => link,
        Ok(link) => target.parent().map_or(link.clone(), |dir| dir.join(link)),
        Err(_) => target.to_path_buf(),
    }
}

/// Renames `backup` onto `orig`, renaming onto the symlink target rather
/// than the symlink itself.
fn restore_over(backup: &Path, orig: &Path) -> std::io::Result<()> {
    std::fs::rename(backup, resolve_symlink(orig))
}

#[cfg(unix)]
fn ids_of(metadata: &std::fs::Metadata) -> (u32, u32) {
    use std::os::unix::fs::MetadataExt;
    (metadata.uid(), metadata.gid())
}

/// Restores ownership of `path` to match `old`. If one user is running this
/// it's a no-op; after sudo with a shared history file we don't want to
/// leave the file owned by root.
#[cfg(unix)]
fn maybe_restore_owner(path: &Path, old: &std::fs::Metadata) {
    let Ok(new_meta) = std::fs::metadata(path) else {
        return;
    };
    let (old_uid, old_gid) = ids_of(old);
    if ids_of(&new_meta) != (old_uid, old_gid) {
        let _ = nix::unistd::chown(
            path,
            Some(nix::unistd::Uid::from_raw(old_uid)),
            Some(nix::unistd::Gid::from_raw(old_gid)),
        );
    }
}

#[cfg(not(unix))]
fn maybe_restore_owner(_path: &Path, _old: &std::fs::Metadata) {}

fn open_for_write(path: &Path, append: bool) -> std::io::Result<std::fs::File> {
    let mut options = std::fs::OpenOptions::new();
    if append {
        options.append(true).create(true);
    } else {
        options.write(true).create(true).truncate(true);
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

impl History {
    fn effective_comment_char(&self, data: &[u8]) -> Option<u8> {
        let configured = self
            .comment_char
            .filter(char::is_ascii)
            .map(|c| c as u8);
        if configured.is_some() {
            return configured;
        }
        // The comment character rarely changes; assume timestamps if the
        // buffer starts with `#<digit>`.
        if data.first() == Some(&b'#') && data.get(1).is_some_and(u8::is_ascii_digit) {
            Some(b'#')
        } else {
            None
        }
    }

    /// Reads a history file, adding its entries to the list. With no path,
    /// `~/.history` is used.
    pub fn read_file(&mut self, path: Option<&Path>) -> Result<(), Error> {
        self.read_file_range(path, 0, None)
    }

    /// Reads lines `from` up to (but not including) `to` of a history file.
    /// Timestamp lines do not count toward the range; lines under a
    /// timestamp that are not themselves timestamped extend the previous
    /// entry when multi-line entries are in effect.
    pub fn read_file_range(
        &mut self,
        path: Option<&Path>,
        from: usize,
        to: Option<usize>,
    ) -> Result<(), Error> {
        self.lines_read_from_file = 0;

        let path = resolve_path(path)?;
        let metadata = std::fs::metadata(&path)?;
        if !metadata.is_file() {
            return Err(Error::NotARegularFile(path));
        }

        let data = std::fs::read(&path)?;
        if data.is_empty() {
            return Ok(());
        }

        let to = to.unwrap_or(usize::MAX);
        let comment_char = self.effective_comment_char(&data);

        let has_timestamps = is_timestamp_start(&data, comment_char);
        if has_timestamps && self.write_timestamps {
            self.set_multiline_entries(true);
        }

        let mut last_ts: Option<String> = None;
        let mut current_line = 0usize;

        // The final fragment is either empty (file ends in a newline) or an
        // unterminated partial line; either way it is not an entry.
        let mut fragments: Vec<&[u8]> = data.split(|b| *b == b'\n').collect();
        fragments.pop();

        for raw_line in fragments {
            let line = raw_line.strip_suffix(b"\r").unwrap_or(raw_line);

            if is_timestamp_start(line, comment_char) {
                last_ts = Some(String::from_utf8_lossy(line).into_owned());
                continue;
            }

            if current_line < from {
                current_line += 1;
                continue;
            }

            if !line.is_empty() {
                let text = String::from_utf8_lossy(line);
                if last_ts.is_none() && !self.is_empty() && self.multiline_entries() {
                    let pos = self.len() - 1;
                    self.append_to_entry(pos, &text);
                } else {
                    self.add(text.into_owned());
                    if let Some(ts) = last_ts.take() {
                        self.add_timestamp_line(&ts);
                    }
                }
            }

            current_line += 1;
            if current_line >= to {
                break;
            }
        }

        self.lines_read_from_file = current_line.saturating_sub(from);
        tracing::debug!(target: trace_categories::HISTORY,
            "read {} line(s) from {}", self.lines_read_from_file, path.display());

        Ok(())
    }

    /// Overwrites the history file with the full contents of the list.
    pub fn write_file(&mut self, path: Option<&Path>) -> Result<(), Error> {
        self.do_write(path, self.len(), true)
    }

    /// Appends the most recent `nelements` entries to the history file.
    pub fn append_to_file(&mut self, nelements: usize, path: Option<&Path>) -> Result<(), Error> {
        self.do_write(path, nelements, false)
    }

    fn do_write(
        &mut self,
        path: Option<&Path>,
        nelements: usize,
        overwrite: bool,
    ) -> Result<(), Error> {
        self.lines_written_to_file = 0;

        let histname = resolve_path(path)?;
        let old_metadata = std::fs::metadata(&histname).ok();

        let tempname = if overwrite && old_metadata.as_ref().is_some_and(|m| m.is_file()) {
            Some(tempfile_path(&histname))
        } else {
            None
        };
        let output = tempname.as_deref().unwrap_or(&histname);

        let nelements = nelements.min(self.len());
        let first = self.len() - nelements;

        let mut buffer = String::new();
        for entry in self.iter().skip(first) {
            if self.write_timestamps {
                if let Some(ts) = &entry.timestamp {
                    buffer.push_str(ts);
                    buffer.push('\n');
                }
            }
            buffer.push_str(&entry.line);
            buffer.push('\n');
        }

        let write_result = open_for_write(output, !overwrite)
            .and_then(|mut file| file.write_all(buffer.as_bytes()).and(file.flush()));

        let final_result = match (write_result, &tempname) {
            (Ok(()), Some(temp)) => restore_over(temp, &histname),
            (result, _) => result,
        };

        if let Err(err) = final_result {
            if let Some(temp) = &tempname {
                let _ = std::fs::remove_file(temp);
            }
            return Err(err.into());
        }

        self.lines_written_to_file = nelements;

        if let Some(old) = &old_metadata {
            maybe_restore_owner(&histname, old);
        }

        tracing::debug!(target: trace_categories::HISTORY,
            "wrote {nelements} entrie(s) to {}", histname.display());

        Ok(())
    }

    /// Truncates the history file, leaving only the last `lines` entries.
    /// The new contents are written to a `-<pid>.tmp` file beside the target
    /// and renamed into place; ownership of the original is preserved.
    pub fn truncate_file(&mut self, path: Option<&Path>, lines: usize) -> Result<(), Error> {
        self.lines_written_to_file = 0;

        let filename = resolve_path(path)?;
        let old_metadata = std::fs::metadata(&filename)?;
        if !old_metadata.is_file() {
            return Err(Error::NotARegularFile(filename));
        }

        let data = std::fs::read(&filename)?;
        if data.is_empty() {
            return Ok(());
        }

        let comment_char = self.effective_comment_char(&data);
        let is_ts_at = |idx: usize| is_timestamp_start(&data[idx.min(data.len())..], comment_char);

        // Count backwards from the end of the buffer until we have passed
        // `lines` entry lines; timestamp lines belong to the entry after
        // them and are not counted.
        let mut remaining = lines;
        let mut bp = data.len() - 1;
        let mut bp1 = bp + 1;
        while remaining > 0 && bp > 0 {
            if data[bp] == b'\n' && !is_ts_at(bp1) {
                remaining -= 1;
            }
            bp1 = bp;
            bp -= 1;
        }

        // Find the start of the first retained line.
        let mut start = None;
        while bp > 0 {
            if data[bp] == b'\n' && !is_ts_at(bp1) {
                start = Some(bp + 1);
                break;
            }
            bp1 = bp;
            bp -= 1;
        }

        // If the file holds no more lines than we want, leave it alone.
        let Some(start) = start else {
            self.lines_written_to_file = lines - remaining;
            return Ok(());
        };

        let tempname = tempfile_path(&filename);
        let write_result = open_for_write(&tempname, false)
            .and_then(|mut file| file.write_all(&data[start..]).and(file.flush()))
            .and_then(|()| restore_over(&tempname, &filename));

        if let Err(err) = write_result {
            let _ = std::fs::remove_file(&tempname);
            return Err(err.into());
        }

        self.lines_written_to_file = lines - remaining;
        maybe_restore_owner(&filename, &old_metadata);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use pretty_assertions::assert_eq;

    fn lines(history: &History) -> Vec<&str> {
        history.iter().map(|e| e.line.as_str()).collect()
    }

    #[test]
    fn write_and_read_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("history");

        let mut history = History::new();
        history.write_timestamps = true;
        history.comment_char = Some('#');
        for (i, line) in ["echo one", "echo two", "echo three"].iter().enumerate() {
            history.add(*line);
            history.add_timestamp(1_700_000_000 + i64::try_from(i)?);
        }
        history.write_file(Some(&path))?;
        assert_eq!(history.lines_written_to_file(), 3);

        let mut reread = History::new();
        reread.write_timestamps = true;
        reread.read_file(Some(&path))?;

        assert_eq!(lines(&reread), lines(&history));
        let timestamps: Vec<_> = reread.iter().map(|e| e.timestamp.clone()).collect();
        assert_eq!(
            timestamps,
            vec![
                Some("#1700000000".to_string()),
                Some("#1700000001".to_string()),
                Some("#1700000002".to_string())
            ]
        );

        Ok(())
    }

    #[test]
    fn multi_line_entries_survive_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("history");

        let mut history = History::new();
        history.write_timestamps = true;
        history.comment_char = Some('#');
        history.add("for f in *\ndo\n  echo $f\ndone");
        history.add_timestamp(1_700_000_000);
        history.add("echo after");
        history.add_timestamp(1_700_000_050);
        history.write_file(Some(&path))?;

        let mut reread = History::new();
        reread.write_timestamps = true;
        reread.read_file(Some(&path))?;

        assert_eq!(reread.len(), 2);
        assert_eq!(
            reread.get(0).map(|e| e.line.as_str()),
            Some("for f in *\ndo\n  echo $f\ndone")
        );
        assert_eq!(reread.get(1).map(|e| e.line.as_str()), Some("echo after"));

        Ok(())
    }

    #[test]
    fn append_adds_to_existing_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("history");

        let mut history = History::new();
        history.add("first");
        history.add("second");
        history.write_file(Some(&path))?;

        history.add("third");
        history.append_to_file(1, Some(&path))?;

        let mut reread = History::new();
        reread.read_file(Some(&path))?;
        assert_eq!(lines(&reread), vec!["first", "second", "third"]);

        Ok(())
    }

    #[test]
    fn truncate_keeps_trailing_lines() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("history");

        let mut history = History::new();
        for i in 0..10 {
            history.add(format!("cmd {i}"));
        }
        history.write_file(Some(&path))?;

        history.truncate_file(Some(&path), 4)?;
        assert_eq!(history.lines_written_to_file(), 4);

        let mut reread = History::new();
        reread.read_file(Some(&path))?;
        assert_eq!(lines(&reread), vec!["cmd 6", "cmd 7", "cmd 8", "cmd 9"]);

        Ok(())
    }

    #[test]
    fn truncate_counts_entries_not_timestamp_lines() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("history");

        let mut history = History::new();
        history.write_timestamps = true;
        history.comment_char = Some('#');
        for i in 0..6 {
            history.add(format!("cmd {i}"));
            history.add_timestamp(1_700_000_000 + i64::try_from(i)?);
        }
        history.write_file(Some(&path))?;

        history.truncate_file(Some(&path), 2)?;

        let mut reread = History::new();
        reread.write_timestamps = true;
        reread.read_file(Some(&path))?;
        assert_eq!(lines(&reread), vec!["cmd 4", "cmd 5"]);
        assert_eq!(
            reread.get(0).and_then(|e| e.timestamp.clone()),
            Some("#1700000004".to_string())
        );

        Ok(())
    }

    #[test]
    fn truncate_to_more_lines_than_present_is_a_no_op() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("history");

        let mut history = History::new();
        history.add("only");
        history.write_file(Some(&path))?;

        history.truncate_file(Some(&path), 100)?;

        let mut reread = History::new();
        reread.read_file(Some(&path))?;
        assert_eq!(lines(&reread), vec!["only"]);

        Ok(())
    }

    #[test]
    fn missing_file_surfaces_io_error() {
        let mut history = History::new();
        let result = history.read_file(Some(Path::new("/nonexistent/history-file")));
        assert!(matches!(result, Err(Error::IoError(_))));
    }

    #[test]
    fn stifled_write_and_read_back() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("history");

        let mut history = History::new();
        for i in 0..10 {
            history.add(format!("cmd {i}"));
        }
        history.stifle(5);
        history.write_file(Some(&path))?;

        let mut reread = History::new();
        reread.read_file(Some(&path))?;
        assert_eq!(reread.len(), 5);
        assert_eq!(
            lines(&reread),
            vec!["cmd 5", "cmd 6", "cmd 7", "cmd 8", "cmd 9"]
        );

        Ok(())
    }
}
