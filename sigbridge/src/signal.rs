//! Inter-thread signal channel.
//!
//! A [`SignalChannel`] is a pollable descriptor that a reader thread marks
//! readable after it has decoded a unit of data from a socket the event loop
//! can no longer poll directly. The event loop watches the channel's read end
//! and calls [`consume`](SignalChannel::consume) when woken.
//!
//! On Linux the channel is an `eventfd` in counter mode: every
//! [`signal`](SignalChannel::signal) adds one, and a single `consume` reads
//! and resets the counter. Elsewhere it is a non-blocking pipe carrying one
//! byte per signal. In both cases the kernel object is the only
//! synchronization point between producer and consumer, so a signal racing a
//! consume is either drained by it or leaves the channel readable for the
//! next poll. It is never lost.

use crate::reactor::poller::platform::{sys_read, sys_write};

use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};

/// Outcome of [`SignalChannel::consume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drained {
    /// Nothing was pending: the wakeup was spurious.
    Empty,

    /// This many signals were coalesced since the previous consume.
    Units(u64),
}

impl Drained {
    /// Number of signals drained, zero for [`Drained::Empty`].
    pub fn units(self) -> u64 {
        match self {
            Drained::Empty => 0,
            Drained::Units(n) => n,
        }
    }
}

/// A self-signalling descriptor shared between one reader thread and the
/// event loop.
#[derive(Debug)]
pub struct SignalChannel {
    /// End polled by the event loop.
    read: OwnedFd,

    /// End written by the reader thread. `None` when both ends are the same
    /// descriptor (`eventfd`).
    write: Option<OwnedFd>,

    /// Set once the owning socket is closed. Signals are dropped after that.
    closed: AtomicBool,
}

impl SignalChannel {
    /// Creates a new, empty channel.
    #[cfg(target_os = "linux")]
    pub fn new() -> io::Result<Self> {
        let fd = crate::reactor::poller::platform::sys_eventfd()?;

        Ok(Self {
            read: fd,
            write: None,
            closed: AtomicBool::new(false),
        })
    }

    /// Creates a new, empty channel.
    #[cfg(all(unix, not(target_os = "linux")))]
    pub fn new() -> io::Result<Self> {
        let (read, write) = crate::reactor::poller::platform::sys_pipe()?;

        Ok(Self {
            read,
            write: Some(write),
            closed: AtomicBool::new(false),
        })
    }

    /// Descriptor the event loop should poll for readability.
    pub fn raw_fd(&self) -> RawFd {
        self.read.as_raw_fd()
    }

    /// Marks the channel readable.
    ///
    /// Safe to call from any thread, concurrently with [`consume`](Self::consume).
    /// Never blocks and never fails loudly: once the channel is closed, or if
    /// the kernel refuses the write, the signal is dropped. A full channel
    /// (`EAGAIN`) is already readable, so that signal is coalesced rather
    /// than lost.
    ///
    /// Returns `false` if the channel was closed.
    pub fn signal(&self) -> bool {
        if self.is_closed() {
            return false;
        }

        let fd = self.write.as_ref().unwrap_or(&self.read).as_raw_fd();
        let rc = if self.write.is_some() {
            sys_write(fd, &[1u8])
        } else {
            sys_write(fd, &1u64.to_ne_bytes())
        };

        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::WouldBlock {
                tracing::debug!(message = "signal channel: write failed", fd, error = %err);
            }
        }

        true
    }

    /// Clears the readable state and reports how many signals were pending.
    ///
    /// Must only be called from the event-loop thread.
    pub fn consume(&self) -> io::Result<Drained> {
        if self.write.is_none() {
            self.consume_counter()
        } else {
            self.consume_bytes()
        }
    }

    /// Closes the channel for signalling.
    ///
    /// The descriptor itself stays open until the last owner drops the
    /// channel, so a reader thread that raced this call never writes into a
    /// recycled descriptor number.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn consume_counter(&self) -> io::Result<Drained> {
        let mut buf = [0u8; 8];

        loop {
            let n = sys_read(self.read.as_raw_fd(), &mut buf);

            if n == 8 {
                let units = u64::from_ne_bytes(buf);
                return Ok(if units == 0 {
                    Drained::Empty
                } else {
                    Drained::Units(units)
                });
            }

            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::WouldBlock => return Ok(Drained::Empty),
                io::ErrorKind::Interrupted => continue,
                _ => return Err(err),
            }
        }
    }

    fn consume_bytes(&self) -> io::Result<Drained> {
        let mut buf = [0u8; 256];
        let mut units = 0u64;

        loop {
            let n = sys_read(self.read.as_raw_fd(), &mut buf);

            match n {
                (1..) => units += n as u64,
                // The write end is owned by `self`, so EOF cannot happen.
                0 => break,
                _ => {
                    let err = io::Error::last_os_error();
                    match err.kind() {
                        io::ErrorKind::WouldBlock => break,
                        io::ErrorKind::Interrupted => continue,
                        _ => return Err(err),
                    }
                }
            }
        }

        Ok(if units == 0 {
            Drained::Empty
        } else {
            Drained::Units(units)
        })
    }
}
