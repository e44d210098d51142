//! Readiness bridges.
//!
//! A socket whose bytes are read by a dedicated reader thread cannot be
//! polled on its own descriptor: the reader has already drained it. Instead
//! the reader signals a [`SignalChannel`](crate::signal::SignalChannel), and
//! a [`ReadinessBridge`] registered on that channel forwards each wakeup to
//! the socket's current [`LogicalHandler`].
//!
//! The owner of a socket changes over its lifetime (for example a handshake
//! handler, then a steady-state handler) while the event loop keeps polling
//! the same channel. The [`BridgeRegistry`] keeps one bridge per socket and
//! the bridge's handler is retargeted in place.

mod core;
mod handler;
mod registry;

pub use self::core::{BridgePhase, ReadinessBridge};
pub use handler::{LogicalHandler, Notification};
pub use registry::BridgeRegistry;
