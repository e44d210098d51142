//! Error types.
//!
//! Only conditions a caller can act on are errors. Spurious wakeups, stale
//! bridge invocations, duplicate bridge requests and notifications that
//! arrive before a handler is bound are expected during normal operation and
//! are handled as logged no-ops instead.

use crate::socket::SocketId;

use std::io;

/// Errors returned by the runtime, bridges and reader threads.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A system call on a descriptor, the poller or a reader stream failed.
    #[error("i/o failure")]
    Io(#[from] io::Error),

    /// The bridge for this socket has already been torn down.
    #[error("readiness bridge for {0} has been torn down")]
    TornDown(SocketId),

    /// The signal channel for this socket is closed.
    #[error("signal channel for {0} is closed")]
    ChannelClosed(SocketId),

    /// A decoded frame announced a length above the decoder limit.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
