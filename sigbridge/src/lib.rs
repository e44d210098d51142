//! # sigbridge
//!
//! **sigbridge** surfaces "data ready" signals from dedicated socket reader
//! threads as pollable events inside a single-threaded readiness loop.
//!
//! Some connections cannot be monitored on their own descriptor because a
//! background thread owns the reads: by the time the event loop would see the
//! socket readable, the reader thread has already drained it. sigbridge gives
//! each such connection a signal channel that the reader thread marks
//! readable after decoding a unit, and registers a readiness bridge on that
//! channel which forwards every wakeup to whichever logical handler owns the
//! connection right now.
//!
//! It provides:
//!
//! - A **signal channel** (`eventfd` on Linux, a pipe elsewhere) that never
//!   loses a wakeup and tolerates signals racing teardown
//! - A **readiness bridge** per socket, retargetable between handlers as the
//!   connection changes phase
//! - A **bridge registry** that deduplicates bridges per socket, scoped to
//!   the runtime that owns the event loop
//! - A small **epoll/poll event loop** whose handlers may register, retarget
//!   and tear down from inside a dispatch turn
//! - A reference **reader thread** with a length-prefixed frame decoder
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sigbridge::reader::{FrameDecoder, ReaderThread};
//! use sigbridge::{Notification, Runtime, RuntimeBuilder};
//! use std::rc::Rc;
//!
//! let rt = RuntimeBuilder::new().build()?;
//! let (socket, inbox, _reader) = ReaderThread::spawn(stream, FrameDecoder::new())?;
//!
//! let handshake = Rc::new(move |rt: &Runtime, n: &Notification| {
//!     for frame in inbox.drain() {
//!         // ... complete the handshake, then hand the socket over
//!         let steady = Rc::new(|_: &Runtime, _: &Notification| true);
//!         rt.bridge(n.socket).unwrap().set_current_handler(steady).ok();
//!     }
//!     true
//! });
//!
//! rt.get_or_create_bridge(handshake, &socket)?;
//! rt.run()?;
//! ```
//!
//! ## Modules
//!
//! - [`bridge`] — Readiness bridges and their registry
//! - [`reactor`] — The event loop
//! - [`reader`] — Reader threads, inboxes and frame decoding
//! - [`signal`] — The inter-thread signal channel
//! - [`socket`] — Socket handles and signallers

mod error;
mod runtime;
mod utils;

pub mod bridge;
pub mod reactor;
pub mod reader;
pub mod signal;
pub mod socket;

pub use bridge::{BridgePhase, BridgeRegistry, LogicalHandler, Notification, ReadinessBridge};
pub use error::{Error, Result};
pub use runtime::Runtime;
pub use runtime::builder::RuntimeBuilder;
pub use signal::{Drained, SignalChannel};
pub use socket::{SignalSource, Signaller, SocketHandle, SocketId};
