//! Readiness event loop.
//!
//! This module implements the single-threaded event loop the bridges plug
//! into. It is responsible for:
//! - registering descriptors together with a [`FileHandler`],
//! - blocking until one or more of them become readable,
//! - invoking the handlers inline and honouring their keep/stop verdict.
//!
//! Only read interest exists. Background threads never touch the loop; they
//! reach it by making a registered descriptor readable.

mod core;
mod event;

pub(crate) mod poller;

pub use self::core::{EventLoop, FileHandler, Token};
