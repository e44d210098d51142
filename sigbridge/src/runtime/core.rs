use crate::bridge::{BridgeRegistry, LogicalHandler, ReadinessBridge};
use crate::error::Result;
use crate::reactor::EventLoop;
use crate::socket::{SignalSource, SocketHandle, SocketId};

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

/// Owner of the event loop and of the bridge registry.
///
/// `Runtime` is responsible for:
/// - driving the single-threaded event loop,
/// - creating, finding and tearing down readiness bridges,
/// - ordering socket shutdown so that no bridge ever polls a closed
///   descriptor.
///
/// Handlers receive `&Runtime` on every notification and may call any
/// method on it, including from inside a dispatch turn. The runtime is not
/// `Send`: it lives on the event-loop thread.
///
/// Dropping the runtime tears down every remaining bridge.
#[derive(Debug)]
pub struct Runtime {
    /// Readiness loop polling the signal channels.
    event_loop: EventLoop,

    /// Live bridges keyed by socket.
    bridges: BridgeRegistry,

    /// Timeout of each turn driven by [`run`](Self::run).
    poll_timeout: Option<Duration>,

    /// Set by [`stop`](Self::stop).
    stopped: Cell<bool>,
}

impl Runtime {
    /// Creates a runtime.
    ///
    /// Use [`RuntimeBuilder`](super::RuntimeBuilder) to configure it.
    pub(crate) fn new(event_capacity: usize, poll_timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            event_loop: EventLoop::new(event_capacity)?,
            bridges: BridgeRegistry::new(),
            poll_timeout,
            stopped: Cell::new(false),
        })
    }

    /// The event loop.
    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    /// The bridge registry.
    pub fn bridges(&self) -> &BridgeRegistry {
        &self.bridges
    }

    /// Returns the bridge for `source`, creating it on first use.
    ///
    /// See [`BridgeRegistry::get_or_create`].
    pub fn get_or_create_bridge<S>(
        &self,
        initial: Rc<dyn LogicalHandler>,
        source: &S,
    ) -> Result<Rc<ReadinessBridge>>
    where
        S: SignalSource + ?Sized,
    {
        self.bridges.get_or_create(&self.event_loop, initial, source)
    }

    /// Live bridge for `id`, if any.
    pub fn bridge(&self, id: SocketId) -> Option<Rc<ReadinessBridge>> {
        self.bridges.get(id)
    }

    /// Tears down the bridge for `id`. Returns `false` if there was none.
    pub fn teardown(&self, id: SocketId) -> bool {
        self.bridges.teardown(&self.event_loop, id)
    }

    /// Tears down the socket's bridge, then closes the socket.
    ///
    /// In-flight signals from its reader thread become no-ops.
    pub fn close_socket(&self, socket: SocketHandle) {
        self.teardown(socket.id());
        socket.close();
    }

    /// Runs a single poll cycle, blocking for at most `timeout`.
    ///
    /// Bridges whose socket was dropped without a teardown are removed first:
    /// a closed descriptor leaves the poller's interest set silently and
    /// never wakes the loop again.
    ///
    /// Returns the number of handlers invoked.
    ///
    /// # Errors
    ///
    /// Fails only if the poller itself fails; handler verdicts are never
    /// turned into errors.
    pub fn turn(&self, timeout: Option<Duration>) -> Result<usize> {
        self.bridges.purge_orphans(&self.event_loop);
        self.event_loop.turn(self, timeout)
    }

    /// Runs turns until [`stop`](Self::stop) is called or nothing is left to
    /// monitor.
    ///
    /// A socket dropped while a turn is blocked is noticed once that turn
    /// returns, so with no poll timeout the loop only exits on the next
    /// wakeup.
    ///
    /// Returns the total number of handlers invoked.
    pub fn run(&self) -> Result<usize> {
        self.stopped.set(false);

        let mut dispatched = 0;

        while !self.stopped.get() {
            self.bridges.purge_orphans(&self.event_loop);

            if self.event_loop.is_empty() {
                break;
            }

            dispatched += self.event_loop.turn(self, self.poll_timeout)?;
        }

        tracing::debug!(message = "runtime: run finished", dispatched);
        Ok(dispatched)
    }

    /// Makes [`run`](Self::run) return after the current turn.
    pub fn stop(&self) {
        self.stopped.set(true);
    }
}

impl Drop for Runtime {
    /// Tears down every remaining bridge so that each one is deregistered
    /// before its socket's channel can be closed.
    fn drop(&mut self) {
        self.bridges.clear(&self.event_loop);
    }
}
