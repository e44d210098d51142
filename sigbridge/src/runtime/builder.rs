use super::Runtime;
use crate::error::Result;

use std::time::Duration;

/// Default number of readiness events collected per poll.
const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Default poll timeout used by [`Runtime::run`].
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Builder for configuring and creating a runtime.
///
/// # Examples
///
/// ```rust,ignore
/// let runtime = RuntimeBuilder::new()
///     .event_capacity(128)
///     .poll_timeout(Some(Duration::from_millis(50)))
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct RuntimeBuilder {
    /// Readiness events collected per poll.
    event_capacity: usize,

    /// Timeout of each turn driven by [`Runtime::run`].
    poll_timeout: Option<Duration>,
}

impl RuntimeBuilder {
    /// Creates a new `RuntimeBuilder` with default configuration.
    pub fn new() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            poll_timeout: Some(DEFAULT_POLL_TIMEOUT),
        }
    }

    /// Sets how many readiness events a single turn may collect.
    ///
    /// Descriptors beyond this count stay readable and are picked up on the
    /// next turn.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn event_capacity(mut self, n: usize) -> Self {
        assert!(n > 0, "event_capacity must be > 0");

        self.event_capacity = n;
        self
    }

    /// Sets the timeout of each turn driven by [`Runtime::run`].
    ///
    /// `None` blocks until a descriptor becomes readable, in which case
    /// [`Runtime::stop`] is only observed after the next wakeup.
    pub fn poll_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Builds the runtime with the configured options.
    ///
    /// # Errors
    ///
    /// Fails if the platform poller cannot be created.
    pub fn build(self) -> Result<Runtime> {
        Runtime::new(self.event_capacity, self.poll_timeout)
    }
}

impl Default for RuntimeBuilder {
    /// Creates a default `RuntimeBuilder`.
    fn default() -> Self {
        Self::new()
    }
}
