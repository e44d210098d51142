use super::handler::{LogicalHandler, Notification};
use crate::error::{Error, Result};
use crate::reactor::{EventLoop, FileHandler, Token};
use crate::runtime::Runtime;
use crate::signal::{Drained, SignalChannel};
use crate::socket::{SignalSource, SocketId};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::sync::{Arc, Weak};

/// Lifecycle of a bridge.
///
/// `Unbound -> Bound(H1) -> Bound(H2) -> ... -> TornDown`. No transition
/// leaves `TornDown`.
enum BridgeState {
    /// Constructed, no handler installed yet.
    Unbound,

    /// Forwarding wakeups to this handler.
    Bound(Rc<dyn LogicalHandler>),

    /// Deregistered. Wakeups that were already in flight are dropped.
    TornDown,
}

/// Observable phase of a [`ReadinessBridge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgePhase {
    /// Registered, waiting for its first handler.
    Unbound,

    /// Forwarding wakeups to a handler.
    Bound,

    /// Deregistered for good.
    TornDown,
}

/// The event-loop-visible handler for one reader-thread-backed socket.
///
/// The bridge is registered on the socket's signal channel, not on the
/// socket itself: by the time the loop wakes up, the reader thread has
/// already consumed the bytes. On every wakeup the bridge drains the channel
/// and forwards the notification to whichever [`LogicalHandler`] currently
/// owns the connection.
///
/// Bridges are created through [`BridgeRegistry::get_or_create`] so that a
/// socket never has more than one. They are `!Send`; all state lives on the
/// event-loop thread.
///
/// [`BridgeRegistry::get_or_create`]: super::BridgeRegistry::get_or_create
pub struct ReadinessBridge {
    /// Socket this bridge serves.
    socket: SocketId,

    /// Signal channel of the socket. Never owned: the socket closes it.
    channel: Weak<SignalChannel>,

    /// Descriptor registered with the event loop.
    fd: RawFd,

    /// Event loop registration, `None` before attach and after teardown.
    token: Cell<Option<Token>>,

    /// Current lifecycle state.
    state: RefCell<BridgeState>,

    /// Signals drained while no handler was bound.
    swallowed: Cell<u64>,
}

impl ReadinessBridge {
    /// Creates an unbound, unregistered bridge for `source`.
    pub(crate) fn new<S: SignalSource + ?Sized>(source: &S) -> Self {
        Self {
            socket: source.socket_id(),
            channel: Arc::downgrade(source.signal_channel()),
            fd: source.signal_fd(),
            token: Cell::new(None),
            state: RefCell::new(BridgeState::Unbound),
            swallowed: Cell::new(0),
        }
    }

    /// Registers the bridge with the event loop on its signal descriptor.
    pub(crate) fn attach(self: &Rc<Self>, event_loop: &EventLoop) -> Result<()> {
        let handler: Rc<dyn FileHandler> = Rc::clone(self) as Rc<dyn FileHandler>;
        let token = event_loop.register(self.fd, handler)?;

        self.token.set(Some(token));
        Ok(())
    }

    /// Socket this bridge serves.
    pub fn socket_id(&self) -> SocketId {
        self.socket
    }

    /// Event loop registration, if the bridge is still registered.
    pub fn token(&self) -> Option<Token> {
        self.token.get()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> BridgePhase {
        match &*self.state.borrow() {
            BridgeState::Unbound => BridgePhase::Unbound,
            BridgeState::Bound(_) => BridgePhase::Bound,
            BridgeState::TornDown => BridgePhase::TornDown,
        }
    }

    /// Returns `true` once the bridge has been torn down.
    pub fn is_torn_down(&self) -> bool {
        self.phase() == BridgePhase::TornDown
    }

    /// Returns `true` if the socket behind this bridge has been closed.
    pub fn is_orphaned(&self) -> bool {
        self.channel
            .upgrade()
            .is_none_or(|channel| channel.is_closed())
    }

    /// Handler that the next wakeup will be forwarded to.
    pub fn current_handler(&self) -> Option<Rc<dyn LogicalHandler>> {
        match &*self.state.borrow() {
            BridgeState::Bound(handler) => Some(Rc::clone(handler)),
            _ => None,
        }
    }

    /// Installs `handler` as the current owner of the socket.
    ///
    /// Takes effect immediately: any notification dispatched after this call
    /// reaches `handler`, including one dispatched later in the same turn.
    /// Must be called from the event-loop thread, which `!Send` enforces.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TornDown`] if the bridge has been torn down.
    pub fn set_current_handler(&self, handler: Rc<dyn LogicalHandler>) -> Result<()> {
        let previous = {
            let mut state = self.state.borrow_mut();

            if matches!(*state, BridgeState::TornDown) {
                return Err(Error::TornDown(self.socket));
            }

            std::mem::replace(&mut *state, BridgeState::Bound(handler))
        };

        match previous {
            BridgeState::Unbound => {
                tracing::debug!(message = "bridge: bound", socket = %self.socket);
                self.replay_swallowed();
            }
            _ => {
                tracing::debug!(message = "bridge: retargeted", socket = %self.socket);
            }
        }

        // Dropped outside the borrow: the old handler may own things that
        // reach back into this bridge.
        drop(previous);
        Ok(())
    }

    /// Deregisters the bridge and drops its handler.
    ///
    /// If the signal channel is already gone, its descriptor may have been
    /// recycled, so the registration is forgotten without a syscall.
    ///
    /// Returns `false` if the bridge was already torn down.
    pub(crate) fn tear_down(&self, event_loop: &EventLoop) -> bool {
        let previous = std::mem::replace(&mut *self.state.borrow_mut(), BridgeState::TornDown);

        if matches!(previous, BridgeState::TornDown) {
            return false;
        }

        if let Some(token) = self.token.take() {
            // Holding the channel keeps the descriptor open across the syscall.
            match self.channel.upgrade() {
                Some(channel) => {
                    event_loop.deregister(token);
                    drop(channel);
                }
                None => {
                    event_loop.forget(token);
                }
            }
        }

        tracing::debug!(message = "bridge: torn down", socket = %self.socket);
        drop(previous);
        true
    }

    /// Re-arms the channel for signals drained while unbound.
    fn replay_swallowed(&self) {
        if self.swallowed.replace(0) == 0 {
            return;
        }

        if let Some(channel) = self.channel.upgrade() {
            channel.signal();
        }
    }

    /// Removes this bridge from the runtime and tears it down.
    fn retire(&self, rt: &Runtime) {
        rt.bridges().retire(self, rt.event_loop());
    }
}

impl FileHandler for ReadinessBridge {
    /// Drains the signal channel and forwards to the current handler.
    ///
    /// Spurious wakeups and wakeups that arrive before a handler is bound
    /// keep the registration and do nothing else. Wakeups that race a
    /// teardown are dropped.
    fn read_notify(&self, rt: &Runtime) -> bool {
        let handler = match &*self.state.borrow() {
            BridgeState::TornDown => {
                tracing::trace!(message = "bridge: stale wakeup", socket = %self.socket);
                return false;
            }
            BridgeState::Unbound => None,
            BridgeState::Bound(handler) => Some(Rc::clone(handler)),
        };

        let Some(channel) = self.channel.upgrade() else {
            tracing::warn!(message = "bridge: signal channel gone", socket = %self.socket);
            self.retire(rt);
            return false;
        };

        let drained = channel.consume();
        drop(channel);

        let units = match drained {
            Ok(Drained::Units(n)) => n,
            Ok(Drained::Empty) => {
                tracing::trace!(message = "bridge: spurious wakeup", socket = %self.socket);
                return true;
            }
            Err(err) => {
                tracing::warn!(
                    message = "bridge: signal channel unreadable",
                    socket = %self.socket,
                    error = %err
                );
                self.retire(rt);
                return false;
            }
        };

        let Some(handler) = handler else {
            tracing::warn!(
                message = "bridge: wakeup with no handler bound",
                socket = %self.socket,
                units
            );
            self.swallowed.set(self.swallowed.get() + units);
            return true;
        };

        let notification = Notification {
            socket: self.socket,
            units,
        };

        let keep = handler.handle_readiness(rt, &notification);

        if !keep {
            self.retire(rt);
        }

        keep
    }
}

impl fmt::Debug for ReadinessBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessBridge")
            .field("socket", &self.socket)
            .field("fd", &self.fd)
            .field("token", &self.token.get())
            .field("phase", &self.phase())
            .finish()
    }
}
