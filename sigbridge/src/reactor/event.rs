/// A readiness event reported by the poller.
///
/// An `Event` represents readiness information for a registered file
/// descriptor. It is produced by the poller and consumed by the event loop
/// to invoke the matching handler.
///
/// Only read interest is ever registered, so error and hang-up conditions
/// are folded into `readable`: the handler is expected to discover them on
/// its next read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Event {
    /// Token associated with the registered file descriptor.
    pub(crate) token: usize,

    /// Indicates that the file descriptor is readable.
    pub(crate) readable: bool,
}
