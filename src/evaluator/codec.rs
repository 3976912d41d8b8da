//! Console line codec.
//!
//! Frames the serial byte stream into newline-terminated lines with a cap on
//! line length, so a console that never sends a newline (wrong baud rate, a
//! stuck UART) cannot grow the read buffer without bound.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// Default cap on a single console line, terminator included.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8 * 1024;

/// One framed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine {
    /// Line text with its terminator (absent only for a final partial line)
    Text(String),
    /// Line that is not valid UTF-8
    Undecodable(Vec<u8>),
    /// Line over the cap; holds how many bytes were dropped
    Overlong(usize),
}

/// Newline-delimited decoder with a maximum line length.
///
/// Once a line outgrows the cap its bytes are dropped as they arrive and a
/// single [`ConsoleLine::Overlong`] is produced at its terminator.
#[derive(Debug, Clone)]
pub struct ConsoleCodec {
    max_length: usize,
    /// Index to resume the newline search from
    next_index: usize,
    /// Bytes dropped so far from an overlong line
    discarded: Option<usize>,
}

impl ConsoleCodec {
    /// Create a codec with the default max length.
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Create a codec with a custom max length.
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarded: None,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn decode_line(raw: BytesMut) -> ConsoleLine {
        match String::from_utf8(raw.to_vec()) {
            Ok(line) => ConsoleLine::Text(line),
            Err(e) => ConsoleLine::Undecodable(e.into_bytes()),
        }
    }
}

impl Default for ConsoleCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ConsoleCodec {
    type Item = ConsoleLine;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> std::result::Result<Option<Self::Item>, Self::Error> {
        let newline = src[self.next_index..]
            .iter()
            .position(|b| *b == b'\n')
            .map(|offset| self.next_index + offset);

        match (self.discarded, newline) {
            (Some(dropped), Some(end)) => {
                src.advance(end + 1);
                self.next_index = 0;
                self.discarded = None;
                Ok(Some(ConsoleLine::Overlong(dropped + end + 1)))
            }
            (Some(dropped), None) => {
                self.discarded = Some(dropped + src.len());
                src.clear();
                self.next_index = 0;
                Ok(None)
            }
            (None, Some(end)) => {
                self.next_index = 0;
                let raw = src.split_to(end + 1);
                if raw.len() > self.max_length {
                    return Ok(Some(ConsoleLine::Overlong(raw.len())));
                }
                Ok(Some(Self::decode_line(raw)))
            }
            (None, None) if src.len() > self.max_length => {
                self.discarded = Some(src.len());
                src.clear();
                self.next_index = 0;
                Ok(None)
            }
            (None, None) => {
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    /// A final line without a terminator is still delivered.
    fn decode_eof(&mut self, src: &mut BytesMut) -> std::result::Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        if let Some(dropped) = self.discarded.take() {
            return Ok(Some(ConsoleLine::Overlong(dropped)));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let raw = src.split_to(src.len());
        Ok(Some(Self::decode_line(raw)))
    }
}
