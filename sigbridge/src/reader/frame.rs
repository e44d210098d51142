use crate::error::{Error, Result};

use std::io::{self, Read};

/// Default upper bound on a single frame's payload.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Turns a blocking byte stream into units.
///
/// Runs on the reader thread, so it may block.
pub trait Decoder: Send + 'static {
    /// A decoded unit.
    type Item: Send + 'static;

    /// Reads the next unit.
    ///
    /// Returns `Ok(None)` on a clean end of stream (at a unit boundary).
    fn decode(&mut self, reader: &mut dyn Read) -> Result<Option<Self::Item>>;
}

/// Length-prefixed frames: a big-endian `u32` payload length followed by the
/// payload.
#[derive(Debug, Clone, Copy)]
pub struct FrameDecoder {
    max_len: usize,
}

impl FrameDecoder {
    /// Creates a decoder accepting frames up to [`DEFAULT_MAX_FRAME_LEN`].
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_FRAME_LEN)
    }

    /// Creates a decoder accepting frames up to `max_len` bytes.
    pub fn with_max_len(max_len: usize) -> Self {
        Self { max_len }
    }

    /// Encodes `payload` as a frame. Counterpart of [`decode`](Decoder::decode).
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`] if the payload length does not fit
    /// the `u32` header.
    pub fn encode(payload: &[u8]) -> Result<Vec<u8>> {
        let header = encode_header(payload.len())?;

        let mut frame = Vec::with_capacity(header.len() + payload.len());
        frame.extend_from_slice(&header);
        frame.extend_from_slice(payload);
        Ok(frame)
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameDecoder {
    type Item = Vec<u8>;

    fn decode(&mut self, reader: &mut dyn Read) -> Result<Option<Vec<u8>>> {
        let mut header = [0u8; 4];

        if !read_header(reader, &mut header)? {
            return Ok(None);
        }

        let len = u32::from_be_bytes(header) as usize;
        if len > self.max_len {
            return Err(Error::FrameTooLarge {
                len,
                max: self.max_len,
            });
        }

        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload)?;

        Ok(Some(payload))
    }
}

/// Big-endian length header for a payload of `len` bytes.
fn encode_header(len: usize) -> Result<[u8; 4]> {
    let len = u32::try_from(len).map_err(|_| Error::FrameTooLarge {
        len,
        max: u32::MAX as usize,
    })?;

    Ok(len.to_be_bytes())
}

/// Fills `header`, returning `false` on EOF before its first byte.
///
/// EOF in the middle of the header is an error.
fn read_header(reader: &mut dyn Read, header: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;

    while filled < header.len() {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    Ok(true)
}
