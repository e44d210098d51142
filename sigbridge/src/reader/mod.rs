//! Reader-thread subsystem.
//!
//! One dedicated thread per connection performs the blocking reads, decodes
//! units with a [`Decoder`], queues them in an [`Inbox`] and signals the
//! connection's channel. This is the producer side of the bridge; the event
//! loop never reads the connection's bytes itself.

mod frame;
mod inbox;
mod thread;

pub use frame::{DEFAULT_MAX_FRAME_LEN, Decoder, FrameDecoder};
pub use inbox::Inbox;
pub use thread::{ReaderExit, ReaderThread};
