//! Utilities for memory-efficient data structures.
//!
//! This module provides low-level utilities used internally by the event
//! loop. In particular, it exposes a [`Slab`] allocator whose indices double
//! as poller tokens.

mod slab;

pub(crate) use slab::Slab;
