use super::frame::Decoder;
use super::inbox::Inbox;
use crate::error::{Error, Result};
use crate::socket::{SocketHandle, SocketId};

use std::io::Read;
use std::thread::{self, JoinHandle};

/// Why a reader thread stopped.
#[derive(Debug)]
pub enum ReaderExit {
    /// The stream ended at a unit boundary.
    Eof,

    /// The socket was closed on the event-loop side.
    Closed,

    /// Reading or decoding failed.
    Failed(Error),

    /// The thread panicked.
    Panicked,
}

/// A dedicated thread that reads one connection.
///
/// For every decoded unit the thread pushes it into the connection's
/// [`Inbox`] and then signals the socket's channel. When the stream ends the
/// inbox is closed and signalled once more, so the logical handler observes
/// the end of stream on its next notification.
///
/// The thread blocks in `read`. Closing the socket makes further signals
/// no-ops but cannot interrupt a blocked read; shut the underlying stream
/// down to stop the thread promptly.
#[derive(Debug)]
pub struct ReaderThread {
    socket: SocketId,
    handle: JoinHandle<ReaderExit>,
}

impl ReaderThread {
    /// Creates a socket handle and starts reading `stream` into a new inbox.
    ///
    /// # Errors
    ///
    /// Fails if the signal channel or the thread cannot be created.
    pub fn spawn<R, D>(stream: R, decoder: D) -> Result<(SocketHandle, Inbox<D::Item>, ReaderThread)>
    where
        R: Read + Send + 'static,
        D: Decoder,
    {
        let socket = SocketHandle::new()?;
        let (inbox, reader) = Self::attach(stream, decoder, &socket)?;

        Ok((socket, inbox, reader))
    }

    /// Starts reading `stream` on behalf of an existing socket handle.
    ///
    /// # Errors
    ///
    /// Fails if the thread cannot be created.
    pub fn attach<R, D>(stream: R, decoder: D, socket: &SocketHandle) -> Result<(Inbox<D::Item>, ReaderThread)>
    where
        R: Read + Send + 'static,
        D: Decoder,
    {
        let inbox = Inbox::new();
        let signaller = socket.signaller();
        let id = socket.id();

        let thread_inbox = inbox.clone();
        let handle = thread::Builder::new()
            .name(format!("sigbridge-reader-{}", id.as_u64()))
            .spawn(move || {
                let mut stream = stream;
                let mut decoder = decoder;

                tracing::debug!(message = "reader thread: started", socket = %id);

                let exit = loop {
                    match decoder.decode(&mut stream) {
                        Ok(Some(item)) => {
                            thread_inbox.push(item);
                            if !signaller.signal() {
                                break ReaderExit::Closed;
                            }
                        }
                        Ok(None) => break ReaderExit::Eof,
                        Err(err) => break ReaderExit::Failed(err),
                    }
                };

                thread_inbox.close();
                signaller.signal();

                tracing::debug!(message = "reader thread: exiting", socket = %id, exit = ?exit);
                exit
            })?;

        Ok((
            inbox,
            ReaderThread {
                socket: id,
                handle,
            },
        ))
    }

    /// Socket this thread reads for.
    pub fn socket_id(&self) -> SocketId {
        self.socket
    }

    /// Returns `true` once the thread has stopped.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the thread to stop.
    pub fn join(self) -> ReaderExit {
        self.handle.join().unwrap_or(ReaderExit::Panicked)
    }
}
