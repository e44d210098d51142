//! Socket handles and the capability the bridge needs from them.
//!
//! A [`SocketHandle`] stands for one logical connection whose bytes are read
//! by a dedicated reader thread. It owns the connection's [`SignalChannel`];
//! the reader thread only gets a [`Signaller`], which can mark the channel
//! readable but can neither consume it nor keep it alive.

use crate::signal::SignalChannel;

use std::fmt;
use std::io;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Stable identity of a connection, used as the bridge registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(u64);

impl SocketId {
    /// Allocates a process-unique identifier.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        SocketId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Builds an identifier from an external connection key, e.g. the real
    /// socket's descriptor number before it was handed to a reader thread.
    pub const fn from_raw(raw: u64) -> Self {
        SocketId(raw)
    }

    /// Raw value of the identifier.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "socket#{}", self.0)
    }
}

/// What a readiness bridge needs from the reader-thread subsystem.
///
/// Implementors expose a stable identity and the channel their reader thread
/// signals. The bridge keeps only a weak reference to that channel and never
/// closes it.
pub trait SignalSource {
    /// Identity used to deduplicate bridges.
    fn socket_id(&self) -> SocketId;

    /// The channel this socket's reader thread signals.
    fn signal_channel(&self) -> &Arc<SignalChannel>;

    /// Descriptor polled by the event loop on this socket's behalf.
    fn signal_fd(&self) -> RawFd {
        self.signal_channel().raw_fd()
    }
}

/// Owning handle of a reader-thread-backed connection.
///
/// Dropping the handle closes the signal channel; the descriptor is released
/// once no in-flight [`Signaller::signal`] still holds it.
#[derive(Debug)]
pub struct SocketHandle {
    id: SocketId,
    channel: Arc<SignalChannel>,
}

impl SocketHandle {
    /// Creates a handle with a fresh identity and signal channel.
    pub fn new() -> io::Result<Self> {
        Self::with_id(SocketId::next())
    }

    /// Creates a handle with a caller-chosen identity.
    pub fn with_id(id: SocketId) -> io::Result<Self> {
        Ok(Self {
            id,
            channel: Arc::new(SignalChannel::new()?),
        })
    }

    /// Identity of this connection.
    pub fn id(&self) -> SocketId {
        self.id
    }

    /// Returns a signaller for the reader thread.
    pub fn signaller(&self) -> Signaller {
        Signaller {
            id: self.id,
            channel: Arc::downgrade(&self.channel),
        }
    }

    /// Closes the signal channel. Later signals become no-ops.
    pub fn close(self) {
        drop(self);
    }
}

impl SignalSource for SocketHandle {
    fn socket_id(&self) -> SocketId {
        self.id
    }

    fn signal_channel(&self) -> &Arc<SignalChannel> {
        &self.channel
    }
}

impl Drop for SocketHandle {
    fn drop(&mut self) {
        self.channel.close();
    }
}

/// Producer side of a socket's signal channel, handed to its reader thread.
#[derive(Debug, Clone)]
pub struct Signaller {
    id: SocketId,
    channel: Weak<SignalChannel>,
}

impl Signaller {
    /// Signals that one decoded unit is ready.
    ///
    /// Returns `false` once the socket has been closed or torn down; the
    /// reader thread may use that to stop early. Never blocks, never panics.
    pub fn signal(&self) -> bool {
        match self.channel.upgrade() {
            Some(channel) => channel.signal(),
            None => false,
        }
    }

    /// Identity of the socket this signaller belongs to.
    pub fn socket_id(&self) -> SocketId {
        self.id
    }

    /// Returns `true` if signals would still be delivered.
    pub fn is_open(&self) -> bool {
        self.channel
            .upgrade()
            .is_some_and(|channel| !channel.is_closed())
    }
}
