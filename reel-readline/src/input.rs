//! Keyboard input plumbing: typeahead, pushback, macro expansion, and
//! timeout polling.

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::Error;
use crate::trace_categories;

/// A source of raw input bytes. The real implementation reads the terminal;
/// tests substitute a scripted byte stream.
pub(crate) trait ByteReader {
    /// Reads one byte, blocking if necessary. `None` means end of input.
    fn read_byte(&mut self) -> std::io::Result<Option<u8>>;

    /// Waits up to `timeout` for input to become readable.
    fn poll_ready(&mut self, timeout: Duration) -> std::io::Result<bool>;
}

/// Reads bytes from a terminal file descriptor.
#[cfg(unix)]
pub(crate) struct TtyReader {
    fd: std::os::fd::RawFd,
}

#[cfg(unix)]
impl TtyReader {
    pub const fn new(fd: std::os::fd::RawFd) -> Self {
        Self { fd }
    }

    fn borrowed(&self) -> std::os::fd::BorrowedFd<'_> {
        // SAFETY: the file descriptor is owned by the process for the
        // lifetime of the editor (stdin or a caller-supplied terminal fd)
        // and remains open while this reader exists.
        unsafe { std::os::fd::BorrowedFd::borrow_raw(self.fd) }
    }
}

#[cfg(unix)]
impl ByteReader for TtyReader {
    fn read_byte(&mut self) -> std::io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match nix::unistd::read(self.borrowed(), &mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(errno) => Err(std::io::Error::from_raw_os_error(errno as i32)),
        }
    }

    fn poll_ready(&mut self, timeout: Duration) -> std::io::Result<bool> {
        use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let poll_timeout = PollTimeout::try_from(timeout_ms).unwrap_or(PollTimeout::MAX);
        let fd = self.borrowed();
        let mut poll_fds = [PollFd::new(fd, PollFlags::POLLIN)];

        match poll(&mut poll_fds, poll_timeout) {
            Ok(0) => Ok(false),
            Ok(_) => {
                let revents = poll_fds[0].revents().unwrap_or(PollFlags::empty());
                Ok(revents
                    .intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR))
            }
            // A signal interrupting the poll counts as "no input yet"; the
            // caller's signal check will pick it up.
            Err(nix::errno::Errno::EINTR) => Ok(false),
            Err(errno) => Err(std::io::Error::from_raw_os_error(errno as i32)),
        }
    }
}

/// A scripted byte source for tests and non-interactive use.
pub(crate) struct ScriptedReader {
    data: VecDeque<u8>,
}

impl ScriptedReader {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into().into(),
        }
    }
}

impl ByteReader for ScriptedReader {
    fn read_byte(&mut self) -> std::io::Result<Option<u8>> {
        Ok(self.data.pop_front())
    }

    fn poll_ready(&mut self, _timeout: Duration) -> std::io::Result<bool> {
        Ok(!self.data.is_empty())
    }
}

/// The editor's input funnel. Bytes come, in order, from the pushback queue
/// (ungotten or stuffed bytes), then from any executing macros, then from
/// the underlying reader.
pub(crate) struct InputSource {
    reader: Box<dyn ByteReader>,
    pushback: VecDeque<u8>,
    macro_stack: Vec<MacroFrame>,
}

struct MacroFrame {
    bytes: Vec<u8>,
    pos: usize,
}

impl InputSource {
    pub fn new(reader: Box<dyn ByteReader>) -> Self {
        Self {
            reader,
            pushback: VecDeque::new(),
            macro_stack: vec![],
        }
    }

    /// Reads the next key byte. `None` means end of input.
    pub fn read_key(&mut self) -> Result<Option<u8>, Error> {
        if let Some(byte) = self.pushback.pop_front() {
            return Ok(Some(byte));
        }

        while let Some(frame) = self.macro_stack.last_mut() {
            if frame.pos < frame.bytes.len() {
                let byte = frame.bytes[frame.pos];
                frame.pos += 1;
                return Ok(Some(byte));
            }
            self.macro_stack.pop();
        }

        Ok(self.reader.read_byte()?)
    }

    /// Returns a just-read key to the front of the queue.
    pub fn unget(&mut self, byte: u8) {
        self.pushback.push_front(byte);
    }

    /// Appends a byte to the typeahead queue (FIFO order).
    #[allow(dead_code)]
    pub fn stuff(&mut self, byte: u8) {
        self.pushback.push_back(byte);
    }

    /// Begins executing a macro; its bytes are read before further keyboard
    /// input. Macros may nest.
    pub fn push_macro(&mut self, bytes: Vec<u8>) {
        tracing::debug!(target: trace_categories::INPUT, "executing {}-byte macro", bytes.len());
        self.macro_stack.push(MacroFrame { bytes, pos: 0 });
    }

    /// Whether macro input is currently being consumed.
    pub fn in_macro(&self) -> bool {
        self.macro_stack
            .last()
            .is_some_and(|frame| frame.pos < frame.bytes.len())
    }

    /// Steps back one byte within the executing macro.
    pub fn prev_macro_key(&mut self) {
        if let Some(frame) = self.macro_stack.last_mut() {
            frame.pos = frame.pos.saturating_sub(1);
        }
    }

    /// Whether pushed-back input is waiting.
    pub fn pushed_available(&self) -> bool {
        !self.pushback.is_empty()
    }

    /// Waits up to `timeout` for keyboard input (pushback and macros are not
    /// considered).
    pub fn queued(&mut self, timeout: Duration) -> Result<bool, Error> {
        Ok(self.reader.poll_ready(timeout)?)
    }

    /// Whether keyboard input is immediately available.
    pub fn available(&mut self) -> Result<bool, Error> {
        self.queued(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn drain(input: &mut InputSource) -> Vec<u8> {
        let mut out = vec![];
        while let Ok(Some(b)) = input.read_key() {
            out.push(b);
        }
        out
    }

    #[test]
    fn pushback_takes_priority() {
        let mut input = InputSource::new(Box::new(ScriptedReader::new(b"xyz".to_vec())));
        assert_eq!(input.read_key().unwrap(), Some(b'x'));
        input.unget(b'x');
        input.stuff(b'q');
        assert_eq!(drain(&mut input), b"xqyz".to_vec());
    }

    #[test]
    fn macros_nest_and_precede_keyboard() {
        let mut input = InputSource::new(Box::new(ScriptedReader::new(b"z".to_vec())));
        input.push_macro(b"ab".to_vec());
        assert_eq!(input.read_key().unwrap(), Some(b'a'));
        input.push_macro(b"12".to_vec());
        assert_eq!(drain(&mut input), b"12bz".to_vec());
    }
}
