//! Thin wrappers over the unix system calls used by the poller and the
//! signal channel.
//!
//! Every wrapper returns the raw libc result or converts it into an
//! [`io::Result`]; none of them retries on `EINTR` or `EAGAIN`, callers decide.

use libc::{read, write};
use std::io;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

/// Reads from a file descriptor into the given buffer.
///
/// Returns the number of bytes read, or a negative value on error.
/// The file descriptor **must** be non-blocking.
pub(crate) fn sys_read(fd: RawFd, buffer: &mut [u8]) -> isize {
    unsafe { read(fd, buffer.as_mut_ptr() as *mut _, buffer.len()) }
}

/// Writes the buffer to a file descriptor.
///
/// Returns the number of bytes written, or a negative value on error.
/// The file descriptor **must** be non-blocking.
pub(crate) fn sys_write(fd: RawFd, buffer: &[u8]) -> isize {
    unsafe { write(fd, buffer.as_ptr() as *const _, buffer.len()) }
}

/// Sets a file descriptor to non-blocking mode.
#[cfg(not(target_os = "linux"))]
pub(crate) fn sys_set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// Sets the close-on-exec flag on a file descriptor.
#[cfg(not(target_os = "linux"))]
pub(crate) fn sys_set_cloexec(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    let rc = unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// Creates a non-blocking, close-on-exec `eventfd` in counter mode.
#[cfg(target_os = "linux")]
pub(crate) fn sys_eventfd() -> io::Result<OwnedFd> {
    let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: `eventfd` returned a fresh descriptor that nothing else owns.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Creates a pipe whose both ends are non-blocking and close-on-exec.
///
/// Returns `(read_end, write_end)`.
#[cfg(not(target_os = "linux"))]
pub(crate) fn sys_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds: [libc::c_int; 2] = [-1; 2];

    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: `pipe` returned two fresh descriptors that nothing else owns.
    let (rx, tx) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

    for fd in [fds[0], fds[1]] {
        sys_set_nonblocking(fd)?;
        sys_set_cloexec(fd)?;
    }

    Ok((rx, tx))
}

/// Converts an optional timeout into the millisecond argument of
/// `epoll_wait(2)` and `poll(2)`.
///
/// `None` blocks forever (`-1`). Sub-millisecond timeouts round up so that a
/// short, non-zero wait does not degrade into a busy poll.
pub(crate) fn timeout_millis(timeout: Option<std::time::Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(t) => {
            let mut ms = t.as_millis();
            if t.as_nanos() > ms * 1_000_000 {
                ms += 1;
            }
            ms.min(libc::c_int::MAX as u128) as libc::c_int
        }
    }
}
