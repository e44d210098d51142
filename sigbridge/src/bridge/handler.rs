use crate::runtime::Runtime;
use crate::socket::SocketId;

/// Delivered to a [`LogicalHandler`] when its socket has decoded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    /// Socket whose reader thread signalled.
    pub socket: SocketId,

    /// Signals coalesced into this wakeup. Always at least one.
    pub units: u64,
}

/// Current consumer of a socket's decoded data.
///
/// Exactly one logical handler is bound to a bridge at a time. It is swapped
/// with [`ReadinessBridge::set_current_handler`] as the connection moves
/// between phases (handshake, steady state, ...).
///
/// The return value is forwarded to the event loop: `false` stops monitoring
/// the socket and tears its bridge down.
///
/// [`ReadinessBridge::set_current_handler`]: super::ReadinessBridge::set_current_handler
pub trait LogicalHandler {
    /// Handles a readiness notification.
    fn handle_readiness(&self, rt: &Runtime, notification: &Notification) -> bool;
}

impl<F> LogicalHandler for F
where
    F: Fn(&Runtime, &Notification) -> bool,
{
    fn handle_readiness(&self, rt: &Runtime, notification: &Notification) -> bool {
        self(rt, notification)
    }
}
