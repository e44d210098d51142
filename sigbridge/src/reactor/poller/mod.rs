//! Platform-specific readiness poller abstraction.
//!
//! This module provides a unified interface over platform-specific polling
//! mechanisms (`epoll` on Linux, `poll(2)` on other unix systems).
//!
//! The concrete implementation is selected at compile time depending on the
//! target operating system.

#[cfg(target_os = "linux")]
mod epoll;

#[cfg(all(unix, not(target_os = "linux")))]
mod poll;

#[cfg(target_os = "linux")]
pub(crate) type Poller = epoll::EpollPoller;

#[cfg(all(unix, not(target_os = "linux")))]
pub(crate) type Poller = poll::PollPoller;

#[cfg(unix)]
pub(crate) mod unix;

#[cfg(unix)]
pub(crate) use unix as platform;
