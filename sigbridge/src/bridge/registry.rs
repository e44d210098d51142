use super::core::ReadinessBridge;
use super::handler::LogicalHandler;
use crate::error::{Error, Result};
use crate::reactor::EventLoop;
use crate::socket::{SignalSource, SocketId};

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Table of live bridges, keyed by socket identity.
///
/// Owned by a [`Runtime`](crate::runtime::Runtime) and scoped to its
/// lifetime. Guarantees at most one live bridge per socket: two bridges on
/// the same signal channel would both wake and race to drain it.
#[derive(Debug, Default)]
pub struct BridgeRegistry {
    bridges: RefCell<HashMap<SocketId, Rc<ReadinessBridge>>>,
}

impl BridgeRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the bridge for `source`, creating and registering it if needed.
    ///
    /// When a live bridge already exists it is returned unchanged and
    /// `initial` is ignored, even if it differs from the bridge's current
    /// handler; retargeting is a separate, explicit step. A bridge left
    /// behind by a dropped socket with the same identity is torn down and
    /// replaced. Otherwise a new bridge is
    /// registered with `event_loop` on the socket's signal descriptor, bound
    /// to `initial`, and recorded.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelClosed`] if the socket has already been closed.
    /// - [`Error::Io`] if the event loop refuses the registration.
    pub fn get_or_create<S>(
        &self,
        event_loop: &EventLoop,
        initial: Rc<dyn LogicalHandler>,
        source: &S,
    ) -> Result<Rc<ReadinessBridge>>
    where
        S: SignalSource + ?Sized,
    {
        let id = source.socket_id();

        if let Some(existing) = self.get(id) {
            if !existing.is_orphaned() {
                tracing::trace!(message = "bridge registry: reusing bridge", socket = %id);
                return Ok(existing);
            }

            // The identity outlived its previous socket. The old bridge polls
            // a dead channel and would swallow every wakeup of the new one.
            tracing::debug!(message = "bridge registry: replacing orphaned bridge", socket = %id);
            self.retire(&existing, event_loop);
        }

        if source.signal_channel().is_closed() {
            return Err(Error::ChannelClosed(id));
        }

        let bridge = Rc::new(ReadinessBridge::new(source));
        bridge.attach(event_loop)?;
        bridge.set_current_handler(initial)?;

        self.bridges.borrow_mut().insert(id, Rc::clone(&bridge));

        tracing::debug!(
            message = "bridge registry: created bridge",
            socket = %id,
            fd = source.signal_fd()
        );
        Ok(bridge)
    }

    /// Live bridge for `id`, if any.
    pub fn get(&self, id: SocketId) -> Option<Rc<ReadinessBridge>> {
        self.bridges.borrow().get(&id).cloned()
    }

    /// Returns `true` if `id` has a live bridge.
    pub fn contains(&self, id: SocketId) -> bool {
        self.bridges.borrow().contains_key(&id)
    }

    /// Number of live bridges.
    pub fn len(&self) -> usize {
        self.bridges.borrow().len()
    }

    /// Returns `true` if no bridge is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identities of all live bridges, in no particular order.
    pub fn ids(&self) -> Vec<SocketId> {
        self.bridges.borrow().keys().copied().collect()
    }

    /// Removes the bridge for `id` and tears it down.
    ///
    /// Deregistration happens before this returns, so the socket's signal
    /// channel may be closed right after. Returns `false` if `id` had no
    /// bridge.
    pub fn teardown(&self, event_loop: &EventLoop, id: SocketId) -> bool {
        let Some(bridge) = self.bridges.borrow_mut().remove(&id) else {
            return false;
        };

        bridge.tear_down(event_loop);
        true
    }

    /// Tears down every bridge whose socket has been dropped without an
    /// explicit teardown. Returns how many were removed.
    pub fn purge_orphans(&self, event_loop: &EventLoop) -> usize {
        let orphans: Vec<_> = self
            .bridges
            .borrow()
            .values()
            .filter(|bridge| bridge.is_orphaned())
            .map(|bridge| bridge.socket_id())
            .collect();

        for id in &orphans {
            self.teardown(event_loop, *id);
        }

        if !orphans.is_empty() {
            tracing::debug!(message = "bridge registry: purged orphans", count = orphans.len());
        }

        orphans.len()
    }

    /// Tears down every bridge.
    pub(crate) fn clear(&self, event_loop: &EventLoop) {
        let bridges: Vec<_> = self.bridges.borrow_mut().drain().map(|(_, b)| b).collect();

        for bridge in bridges {
            bridge.tear_down(event_loop);
        }
    }

    /// Removes `bridge` if it is the one recorded for its socket, then tears
    /// it down.
    pub(crate) fn retire(&self, bridge: &ReadinessBridge, event_loop: &EventLoop) {
        let id = bridge.socket_id();

        {
            let mut bridges = self.bridges.borrow_mut();
            if bridges
                .get(&id)
                .is_some_and(|current| std::ptr::eq(Rc::as_ptr(current), bridge))
            {
                bridges.remove(&id);
            }
        }

        bridge.tear_down(event_loop);
    }
}
