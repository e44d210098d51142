//! Portable `poll(2)`-based poller used on unix targets without `epoll`.
//!
//! It exposes the same interface as the Linux backend. The registration
//! table is rebuilt into a `pollfd` array on every call, which is linear in
//! the number of registrations; that is acceptable for the handful of
//! control sockets a daemon bridges.

use super::platform::timeout_millis;
use crate::reactor::event::Event;

use libc::{POLLERR, POLLHUP, POLLIN, POLLNVAL, nfds_t, pollfd};
use std::cell::RefCell;
use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// `poll(2)` poller.
pub(crate) struct PollPoller {
    /// Registered descriptors and their tokens.
    registrations: RefCell<Vec<(RawFd, usize)>>,

    /// Reusable `pollfd` array.
    fds: RefCell<Vec<pollfd>>,

    /// Maximum number of events reported per call.
    capacity: usize,
}

impl PollPoller {
    /// Creates a new `PollPoller`.
    pub(crate) fn new(capacity: usize) -> io::Result<Self> {
        Ok(Self {
            registrations: RefCell::new(Vec::new()),
            fds: RefCell::new(Vec::new()),
            capacity: capacity.max(1),
        })
    }

    /// Registers a file descriptor for read readiness.
    ///
    /// Fails with `AlreadyExists` if the descriptor is already registered,
    /// mirroring `EEXIST` from `epoll_ctl`.
    pub(crate) fn register(&self, fd: RawFd, token: usize) -> io::Result<()> {
        let mut registrations = self.registrations.borrow_mut();

        if registrations.iter().any(|(f, _)| *f == fd) {
            return Err(io::Error::from(io::ErrorKind::AlreadyExists));
        }

        registrations.push((fd, token));
        Ok(())
    }

    /// Removes a file descriptor from the poller.
    pub(crate) fn deregister(&self, fd: RawFd) -> io::Result<()> {
        let mut registrations = self.registrations.borrow_mut();

        match registrations.iter().position(|(f, _)| *f == fd) {
            Some(i) => {
                registrations.swap_remove(i);
                Ok(())
            }
            None => Err(io::Error::from(io::ErrorKind::NotFound)),
        }
    }

    /// Drops the entry for a descriptor that has already been closed.
    ///
    /// Matches on the token too: the descriptor number may already belong
    /// to a newer registration.
    pub(crate) fn forget(&self, fd: RawFd, token: usize) {
        self.registrations
            .borrow_mut()
            .retain(|&(f, t)| f != fd || t != token);
    }

    /// Polls for readiness events.
    ///
    /// An interrupted wait (`EINTR`) is reported as zero events.
    pub(crate) fn poll(&self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<()> {
        events.clear();

        let registrations = self.registrations.borrow();
        let mut fds = self.fds.borrow_mut();

        fds.clear();
        fds.extend(registrations.iter().map(|(fd, _)| pollfd {
            fd: *fd,
            events: POLLIN,
            revents: 0,
        }));

        let n = unsafe {
            libc::poll(
                fds.as_mut_ptr(),
                fds.len() as nfds_t,
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

        for (pfd, (_, token)) in fds.iter().zip(registrations.iter()) {
            if events.len() == self.capacity {
                break;
            }

            if pfd.revents & (POLLIN | POLLERR | POLLHUP | POLLNVAL) != 0 {
                events.push(Event {
                    token: *token,
                    readable: true,
                });
            }
        }

        Ok(())
    }
}
