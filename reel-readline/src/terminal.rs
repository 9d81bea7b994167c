//! Terminal control: raw mode, termcap capability strings, screen size, and
//! buffered output.

use std::io::Write as _;
use std::time::Duration;

use crate::error::Error;
use crate::trace_categories;

/// Byte sequence a terminal sends to introduce a bracketed paste.
pub const BRACKETED_PASTE_PREFIX: &[u8] = b"\x1b[200~";
/// Byte sequence a terminal sends to end a bracketed paste.
pub const BRACKETED_PASTE_SUFFIX: &[u8] = b"\x1b[201~";

const BRACKETED_PASTE_ENABLE: &[u8] = b"\x1b[?2004h";
const BRACKETED_PASTE_DISABLE: &[u8] = b"\x1b[?2004l";

/// How the bell should be sounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BellStyle {
    /// No bell at all.
    None,
    /// The audible bell capability.
    #[default]
    Audible,
    /// The visible-flash capability (falling back to audible).
    Visible,
}

/// Capability strings looked up once at startup.
#[derive(Default)]
struct Caps {
    cursor_up: Option<Vec<u8>>,
    cursor_down: Option<Vec<u8>>,
    #[allow(dead_code)]
    cursor_right: Option<Vec<u8>>,
    carriage_return: Option<Vec<u8>>,
    clr_eol: Option<Vec<u8>>,
    clear_screen: Option<Vec<u8>>,
    delete_character: Option<Vec<u8>>,
    enter_insert: Option<Vec<u8>>,
    exit_insert: Option<Vec<u8>>,
    enter_standout: Option<Vec<u8>>,
    exit_standout: Option<Vec<u8>>,
    bell: Option<Vec<u8>>,
    flash: Option<Vec<u8>>,
    keypad_xmit: Option<Vec<u8>>,
    keypad_local: Option<Vec<u8>>,
    meta_on: Option<Vec<u8>>,
    auto_wrap: bool,
    columns: Option<usize>,
    lines: Option<usize>,
}

#[cfg(unix)]
fn load_caps() -> Caps {
    use terminfo::capability as cap;

    macro_rules! string_cap {
        ($db:expr, $cap:ty) => {
            $db.get::<$cap>().and_then(|c| c.expand().to_vec().ok())
        };
    }

    let Ok(db) = terminfo::Database::from_env() else {
        return Caps {
            auto_wrap: true,
            ..Caps::default()
        };
    };

    Caps {
        cursor_up: string_cap!(db, cap::CursorUp<'_>),
        cursor_down: string_cap!(db, cap::CursorDown<'_>),
        cursor_right: string_cap!(db, cap::CursorRight<'_>),
        carriage_return: string_cap!(db, cap::CarriageReturn<'_>),
        clr_eol: string_cap!(db, cap::ClrEol<'_>),
        clear_screen: string_cap!(db, cap::ClearScreen<'_>),
        delete_character: string_cap!(db, cap::DeleteCharacter<'_>),
        enter_insert: string_cap!(db, cap::EnterInsertMode<'_>),
        exit_insert: string_cap!(db, cap::ExitInsertMode<'_>),
        enter_standout: string_cap!(db, cap::EnterStandoutMode<'_>),
        exit_standout: string_cap!(db, cap::ExitStandoutMode<'_>),
        bell: string_cap!(db, cap::Bell<'_>),
        flash: string_cap!(db, cap::FlashScreen<'_>),
        keypad_xmit: string_cap!(db, cap::KeypadXmit<'_>),
        keypad_local: string_cap!(db, cap::KeypadLocal<'_>),
        meta_on: string_cap!(db, cap::MetaOn<'_>),
        auto_wrap: db
            .get::<cap::AutoRightMargin>()
            .is_some_and(|cap::AutoRightMargin(am)| am),
        columns: db
            .get::<cap::Columns>()
            .and_then(|cap::Columns(n)| usize::try_from(n).ok())
            .filter(|n| *n > 0),
        lines: db
            .get::<cap::Lines>()
            .and_then(|cap::Lines(n)| usize::try_from(n).ok())
            .filter(|n| *n > 0),
    }
}

#[cfg(not(unix))]
fn load_caps() -> Caps {
    Caps {
        auto_wrap: true,
        ..Caps::default()
    }
}

#[cfg(unix)]
fn ioctl_window_size(fd: std::os::fd::RawFd) -> Option<(usize, usize)> {
    // SAFETY: winsize is plain-old-data; zeroed is a valid representation.
    let mut ws: nix::libc::winsize = unsafe { std::mem::zeroed() };
    // SAFETY: TIOCGWINSZ only writes into the winsize out-parameter, which
    // outlives the call.
    let rc = unsafe { nix::libc::ioctl(fd, nix::libc::TIOCGWINSZ, &raw mut ws) };
    if rc == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some((usize::from(ws.ws_col), usize::from(ws.ws_row)))
    } else {
        None
    }
}

#[cfg(not(unix))]
fn ioctl_window_size(_fd: i32) -> Option<(usize, usize)> {
    None
}

#[cfg(unix)]
struct RawModeState {
    original: nix::sys::termios::Termios,
    fd: std::os::fd::RawFd,
}

#[cfg(not(unix))]
struct RawModeState;

/// The editor's view of the controlling terminal. Owns the output stream and
/// the saved terminal mode; raw mode is entered at the start of a read-line
/// call and restored on every exit path.
pub struct Terminal {
    out: Box<dyn std::io::Write>,
    caps: Caps,
    input_fd: i32,
    raw_state: Option<RawModeState>,

    /// Screen width in columns.
    pub screen_width: usize,
    /// Screen height in rows.
    pub screen_height: usize,
    /// Whether the terminal wraps to the next line when writing past the
    /// right edge.
    pub auto_wrap: bool,
    /// The terminal's end-of-file character (usually `C-d`).
    pub eof_char: u8,
    /// The `$TERM` name, for `$if term=` conditions.
    pub term_name: String,
}

impl Terminal {
    /// Creates a terminal on the given input file descriptor, writing to
    /// stdout.
    pub fn new(input_fd: i32) -> Self {
        Self::with_writer(input_fd, Box::new(std::io::stdout()))
    }

    /// Creates a terminal writing to the supplied stream. Used by tests to
    /// capture output.
    pub fn with_writer(input_fd: i32, out: Box<dyn std::io::Write>) -> Self {
        let caps = load_caps();
        let term_name = std::env::var("TERM").unwrap_or_default();

        let mut terminal = Self {
            out,
            caps,
            input_fd,
            raw_state: None,
            screen_width: 0,
            screen_height: 0,
            auto_wrap: true,
            eof_char: 0x04,
            term_name,
        };
        terminal.auto_wrap = terminal.caps.auto_wrap;
        terminal.update_screen_size();
        terminal
    }

    /// Re-reads the screen dimensions (cheap; called again on SIGWINCH).
    pub fn update_screen_size(&mut self) {
        let from_ioctl = ioctl_window_size(self.input_fd);

        let env_dim = |name: &str| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|n| *n > 0)
        };

        self.screen_width = from_ioctl
            .map(|(w, _)| w)
            .or_else(|| env_dim("COLUMNS"))
            .or(self.caps.columns)
            .unwrap_or(80);
        self.screen_height = from_ioctl
            .map(|(_, h)| h)
            .or_else(|| env_dim("LINES"))
            .or(self.caps.lines)
            .unwrap_or(24);

        tracing::debug!(target: trace_categories::DISPLAY,
            "screen size {}x{}", self.screen_width, self.screen_height);
    }

    /// Enters raw (character-at-a-time, no-echo) input mode, saving the
    /// previous settings. Signal-generating keys stay enabled.
    #[cfg(unix)]
    pub fn prepare(&mut self) -> Result<(), Error> {
        use nix::sys::termios;

        if self.raw_state.is_some() || self.input_fd < 0 {
            return Ok(());
        }

        let fd = self.borrowed_fd();
        // Not a terminal (a pipe, a scripted test): edit without raw mode.
        let Ok(original) = termios::tcgetattr(fd) else {
            return Ok(());
        };

        self.eof_char = original.control_chars[termios::SpecialCharacterIndices::VEOF as usize];

        let mut raw = original.clone();
        raw.local_flags -= termios::LocalFlags::ECHO
            | termios::LocalFlags::ICANON
            | termios::LocalFlags::IEXTEN;
        raw.input_flags -= termios::InputFlags::IXON
            | termios::InputFlags::ICRNL
            | termios::InputFlags::INLCR;
        raw.control_chars[termios::SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[termios::SpecialCharacterIndices::VTIME as usize] = 0;

        let fd = self.borrowed_fd();
        termios::tcsetattr(fd, termios::SetArg::TCSADRAIN, &raw)
            .map_err(|e| Error::Terminal(e.to_string()))?;

        self.raw_state = Some(RawModeState {
            original,
            fd: self.input_fd,
        });
        Ok(())
    }

    /// Restores the terminal settings saved by [`Terminal::prepare`].
    #[cfg(unix)]
    pub fn restore(&mut self) {
        use nix::sys::termios;

        if let Some(state) = self.raw_state.take() {
            // SAFETY: the descriptor was valid when raw mode was entered and
            // the editor keeps it open for its whole lifetime.
            let fd = unsafe { std::os::fd::BorrowedFd::borrow_raw(state.fd) };
            let _ = termios::tcsetattr(fd, termios::SetArg::TCSADRAIN, &state.original);
        }
    }

    #[cfg(not(unix))]
    pub fn prepare(&mut self) -> Result<(), Error> {
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn restore(&mut self) {}

    /// Whether raw mode is currently in effect.
    #[allow(dead_code)]
    pub const fn is_prepared(&self) -> bool {
        self.raw_state.is_some()
    }

    #[cfg(unix)]
    fn borrowed_fd(&self) -> std::os::fd::BorrowedFd<'_> {
        // SAFETY: see TtyReader::borrowed; the fd outlives the terminal.
        unsafe { std::os::fd::BorrowedFd::borrow_raw(self.input_fd) }
    }

    /// Buffers raw bytes for the terminal.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let _ = self.out.write_all(bytes);
    }

    /// Buffers a string for the terminal.
    pub fn write_str(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    /// Flushes buffered output to the terminal.
    pub fn flush(&mut self) {
        let _ = self.out.flush();
    }

    fn write_cap(&mut self, cap: fn(&Caps) -> &Option<Vec<u8>>) -> bool {
        if let Some(bytes) = cap(&self.caps).clone() {
            self.write_bytes(&bytes);
            true
        } else {
            false
        }
    }

    /// Moves to column 0 of the current row.
    pub fn carriage_return(&mut self) {
        if !self.write_cap(|c| &c.carriage_return) {
            self.write_bytes(b"\r");
        }
    }

    /// Moves up `n` rows. Returns false if the terminal cannot.
    pub fn cursor_up(&mut self, n: usize) -> bool {
        if self.caps.cursor_up.is_none() {
            return false;
        }
        for _ in 0..n {
            self.write_cap(|c| &c.cursor_up);
        }
        true
    }

    /// Moves down `n` rows, falling back to newlines.
    pub fn cursor_down(&mut self, n: usize) {
        for _ in 0..n {
            if !self.write_cap(|c| &c.cursor_down) {
                self.write_bytes(b"\n");
            }
        }
    }

    /// Moves right one column. Returns false if the terminal cannot.
    #[allow(dead_code)]
    pub fn cursor_right(&mut self) -> bool {
        self.write_cap(|c| &c.cursor_right)
    }

    /// Erases from the cursor to the end of the line. Returns false if the
    /// terminal cannot.
    pub fn clear_to_eol(&mut self) -> bool {
        self.write_cap(|c| &c.clr_eol)
    }

    /// Clears the screen and homes the cursor. Returns false if the
    /// terminal cannot.
    pub fn clear_screen(&mut self) -> bool {
        self.write_cap(|c| &c.clear_screen)
    }

    /// Deletes `n` characters at the cursor. Returns false if the terminal
    /// cannot.
    pub fn delete_chars(&mut self, n: usize) -> bool {
        if self.caps.delete_character.is_none() {
            return false;
        }
        for _ in 0..n {
            self.write_cap(|c| &c.delete_character);
        }
        true
    }

    /// Whether the terminal supports insert mode.
    #[allow(dead_code)]
    pub const fn can_insert(&self) -> bool {
        self.caps.enter_insert.is_some()
    }

    /// Writes `bytes` in insert mode, pushing existing text right.
    pub fn insert_bytes(&mut self, bytes: &[u8]) -> bool {
        if !self.write_cap(|c| &c.enter_insert) {
            return false;
        }
        self.write_bytes(bytes);
        self.write_cap(|c| &c.exit_insert);
        true
    }

    /// Turns standout (highlight) mode on or off.
    pub fn standout(&mut self, on: bool) {
        if on {
            self.write_cap(|c| &c.enter_standout);
        } else {
            self.write_cap(|c| &c.exit_standout);
        }
    }

    /// Rings the bell according to the given style.
    pub fn ding(&mut self, style: BellStyle) {
        match style {
            BellStyle::None => return,
            BellStyle::Visible => {
                if self.write_cap(|c| &c.flash) {
                    self.flush();
                    return;
                }
            }
            BellStyle::Audible => {}
        }
        if !self.write_cap(|c| &c.bell) {
            self.write_bytes(b"\x07");
        }
        self.flush();
    }

    /// Enables or disables the keypad-transmit mode.
    pub fn keypad(&mut self, on: bool) {
        if on {
            self.write_cap(|c| &c.keypad_xmit);
        } else {
            self.write_cap(|c| &c.keypad_local);
        }
    }

    /// Asks the terminal to pass eight-bit input through unmodified.
    pub fn enable_meta_key(&mut self) {
        self.write_cap(|c| &c.meta_on);
    }

    /// Turns bracketed-paste reporting on or off.
    pub fn bracketed_paste(&mut self, on: bool) {
        self.write_bytes(if on {
            BRACKETED_PASTE_ENABLE
        } else {
            BRACKETED_PASTE_DISABLE
        });
    }

    /// Waits up to `timeout` for terminal input, without consuming any.
    #[cfg(unix)]
    #[allow(dead_code)]
    pub fn input_ready(&self, timeout: Duration) -> bool {
        use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

        if self.input_fd < 0 {
            return false;
        }

        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let poll_timeout = PollTimeout::try_from(timeout_ms).unwrap_or(PollTimeout::MAX);
        let fd = self.borrowed_fd();
        let mut poll_fds = [PollFd::new(fd, PollFlags::POLLIN)];
        matches!(poll(&mut poll_fds, poll_timeout), Ok(n) if n > 0)
    }

    #[cfg(not(unix))]
    #[allow(dead_code)]
    pub fn input_ready(&self, _timeout: Duration) -> bool {
        false
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        self.restore();
        self.flush();
    }
}
