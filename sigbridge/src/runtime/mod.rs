//! Runtime: the event loop and the bridge registry, with one lifetime.
//!
//! The registry is not a global. It belongs to the [`Runtime`] that owns the
//! event loop, and is reached through the `&Runtime` every handler receives.

mod core;

pub(crate) mod builder;

pub use self::core::Runtime;
