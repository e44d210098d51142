//! Linux `epoll`-based poller implementation.
//!
//! Responsibilities:
//! - Register file descriptors with read interest
//! - Block waiting for readiness, honouring an optional timeout
//! - Report level-triggered readiness as [`Event`]s
//!
//! This backend is selected automatically on Linux targets.

use super::platform::timeout_millis;
use crate::reactor::event::Event;

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLLERR, EPOLLHUP, EPOLLIN, epoll_create1,
    epoll_ctl, epoll_event, epoll_wait,
};
use std::cell::RefCell;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

/// Linux `epoll` poller.
///
/// This poller owns:
/// - an `epoll` instance,
/// - a reusable event buffer.
///
/// Unlike a cross-thread reactor, it never needs an internal wake-up
/// descriptor: the only thread that blocks in [`poll`](Self::poll) is the
/// event-loop thread, and background threads reach it through signal
/// channels registered like any other descriptor.
pub(crate) struct EpollPoller {
    /// Epoll file descriptor.
    epoll: OwnedFd,

    /// Reusable buffer for epoll events.
    events: RefCell<Vec<epoll_event>>,
}

impl EpollPoller {
    /// Creates a new `EpollPoller` collecting at most `capacity` events per
    /// call to [`poll`](Self::poll).
    pub(crate) fn new(capacity: usize) -> io::Result<Self> {
        let epoll = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if epoll < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            // SAFETY: `epoll_create1` returned a fresh descriptor.
            epoll: unsafe { OwnedFd::from_raw_fd(epoll) },
            events: RefCell::new(Vec::with_capacity(capacity.max(1))),
        })
    }

    /// Registers a file descriptor for read readiness.
    pub(crate) fn register(&self, fd: RawFd, token: usize) -> io::Result<()> {
        let mut event = epoll_event {
            events: EPOLLIN as u32,
            u64: token as u64,
        };

        let rc = unsafe { epoll_ctl(self.epoll.as_raw_fd(), EPOLL_CTL_ADD, fd, &mut event) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    /// Removes a file descriptor from the poller.
    pub(crate) fn deregister(&self, fd: RawFd) -> io::Result<()> {
        let rc = unsafe {
            epoll_ctl(
                self.epoll.as_raw_fd(),
                EPOLL_CTL_DEL,
                fd,
                std::ptr::null_mut(),
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    /// Drops the entry for a descriptor that has already been closed.
    ///
    /// Closing the last reference removes it from the interest list, so
    /// there is nothing to undo.
    pub(crate) fn forget(&self, _fd: RawFd, _token: usize) {}

    /// Polls for readiness events.
    ///
    /// Blocks until:
    /// - at least one file descriptor becomes ready,
    /// - or the optional timeout expires.
    ///
    /// An interrupted wait (`EINTR`) is reported as zero events.
    pub(crate) fn poll(&self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<()> {
        events.clear();

        let mut buffer = self.events.borrow_mut();
        buffer.clear();

        let n = unsafe {
            epoll_wait(
                self.epoll.as_raw_fd(),
                buffer.as_mut_ptr(),
                buffer.capacity() as i32,
                timeout_millis(timeout),
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }

        // SAFETY: the kernel initialized the first `n` entries.
        unsafe {
            buffer.set_len(n as usize);
        }

        for ev in buffer.iter() {
            let readable = ev.events & ((EPOLLIN | EPOLLERR | EPOLLHUP) as u32) != 0;

            events.push(Event {
                token: ev.u64 as usize,
                readable,
            });
        }

        Ok(())
    }
}
