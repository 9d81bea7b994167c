//! Signal coordination: handlers only set a flag; the editor polls the flag
//! at safe points and performs cleanup, redraw, or re-raise from its own
//! control flow.

use std::sync::atomic::{AtomicI32, Ordering};

use crate::trace_categories;

/// The most recently caught signal, or 0. Written from signal context,
/// drained at the editor's safe points.
static CAUGHT_SIGNAL: AtomicI32 = AtomicI32::new(0);

#[cfg(unix)]
extern "C" fn flag_signal(sig: nix::libc::c_int) {
    CAUGHT_SIGNAL.store(sig, Ordering::Relaxed);
}

/// Drains and returns a pending signal, if any.
pub(crate) fn take_caught_signal() -> Option<i32> {
    let sig = CAUGHT_SIGNAL.swap(0, Ordering::Relaxed);
    (sig != 0).then_some(sig)
}

/// Installs flag-setting handlers for the signals the line editor cares
/// about, remembering the dispositions they replaced. Handlers previously
/// set to "ignore" are left ignored.
#[cfg(unix)]
pub(crate) struct Signals {
    saved: Vec<(nix::sys::signal::Signal, nix::sys::signal::SigAction)>,
}

#[cfg(unix)]
impl Signals {
    /// The signals handled during line editing.
    const CATCHABLE: &'static [nix::sys::signal::Signal] = &[
        nix::sys::signal::Signal::SIGINT,
        nix::sys::signal::Signal::SIGTERM,
        nix::sys::signal::Signal::SIGHUP,
        nix::sys::signal::Signal::SIGQUIT,
        nix::sys::signal::Signal::SIGALRM,
        nix::sys::signal::Signal::SIGTSTP,
        nix::sys::signal::Signal::SIGTTIN,
        nix::sys::signal::Signal::SIGTTOU,
        nix::sys::signal::Signal::SIGWINCH,
    ];

    /// Installs the handlers.
    pub fn install() -> Self {
        use nix::sys::signal;

        let mut saved = vec![];

        for &sig in Self::CATCHABLE {
            // SIGWINCH restarts interrupted reads; the others interrupt them
            // so the editor notices promptly.
            let flags = if sig == signal::Signal::SIGWINCH {
                signal::SaFlags::SA_RESTART
            } else {
                signal::SaFlags::empty()
            };
            let action = signal::SigAction::new(
                signal::SigHandler::Handler(flag_signal),
                flags,
                signal::SigSet::empty(),
            );

            // SAFETY: the handler only stores into an atomic, which is
            // async-signal-safe; no allocation or locking happens in signal
            // context.
            let old = unsafe { signal::sigaction(sig, &action) };

            match old {
                Ok(old) => {
                    if matches!(old.handler(), signal::SigHandler::SigIgn) {
                        // The application ignored this signal; put the
                        // ignore disposition back and leave it alone.
                        // SAFETY: restoring a previously retrieved action.
                        let _ = unsafe { signal::sigaction(sig, &old) };
                    }
                    saved.push((sig, old));
                }
                Err(errno) => {
                    tracing::debug!(target: trace_categories::SIGNALS,
                        "failed to install handler for {sig}: {errno}");
                }
            }
        }

        Self { saved }
    }

    /// Restores every saved disposition.
    pub fn restore(&mut self) {
        use nix::sys::signal;

        for (sig, old) in self.saved.drain(..) {
            // SAFETY: restoring actions previously returned by sigaction.
            let _ = unsafe { signal::sigaction(sig, &old) };
        }
    }

    /// Temporarily restores the application's disposition for `sig`,
    /// re-raises it, and reinstalls our handler when (if) control returns.
    /// SIGTTOU is blocked while the terminal is being restored around the
    /// raise so a background shell doesn't stop mid-cleanup.
    pub fn reraise(&self, sig: nix::sys::signal::Signal) {
        use nix::sys::signal;

        tracing::debug!(target: trace_categories::SIGNALS, "re-raising {sig}");

        let old = self.saved.iter().find(|(s, _)| *s == sig).map(|(_, a)| a);

        if let Some(old) = old {
            // SAFETY: restoring an action previously returned by sigaction.
            let _ = unsafe { signal::sigaction(sig, old) };
        } else {
            let default = signal::SigAction::new(
                signal::SigHandler::SigDfl,
                signal::SaFlags::empty(),
                signal::SigSet::empty(),
            );
            // SAFETY: installing the default disposition.
            let _ = unsafe { signal::sigaction(sig, &default) };
        }

        let mut set = signal::SigSet::empty();
        set.add(sig);
        let _ = set.thread_unblock();

        let _ = signal::raise(sig);

        // If we get here the signal stopped (SIGTSTP) or was handled;
        // reinstall our flag handler.
        let flags = if sig == signal::Signal::SIGWINCH {
            signal::SaFlags::SA_RESTART
        } else {
            signal::SaFlags::empty()
        };
        let action = signal::SigAction::new(
            signal::SigHandler::Handler(flag_signal),
            flags,
            signal::SigSet::empty(),
        );
        // SAFETY: see install().
        let _ = unsafe { signal::sigaction(sig, &action) };
    }

    /// Blocks SIGTTOU for the duration of terminal cleanup.
    pub fn block_sigttou() -> Option<nix::sys::signal::SigSet> {
        let mut set = nix::sys::signal::SigSet::empty();
        set.add(nix::sys::signal::Signal::SIGTTOU);
        set.thread_block().ok().map(|()| set)
    }

    /// Unblocks a set blocked by [`Signals::block_sigttou`].
    pub fn unblock(set: &nix::sys::signal::SigSet) {
        let _ = set.thread_unblock();
    }

    /// Blocks SIGWINCH delivery; used around redisplay so a resize takes
    /// effect at the next boundary rather than mid-draw.
    pub fn block_sigwinch() -> Option<nix::sys::signal::SigSet> {
        let mut set = nix::sys::signal::SigSet::empty();
        set.add(nix::sys::signal::Signal::SIGWINCH);
        set.thread_block().ok().map(|()| set)
    }
}

#[cfg(unix)]
impl Drop for Signals {
    fn drop(&mut self) {
        self.restore();
    }
}

#[cfg(not(unix))]
pub(crate) struct Signals;

#[cfg(not(unix))]
impl Signals {
    pub fn install() -> Self {
        Self
    }
    pub fn restore(&mut self) {}
}
