//! Line codec for DCC CHAT.
//!
//! DCC CHAT is plain newline-delimited text over TCP. Lines are decoded
//! with a configurable character encoding and handed out without their
//! line terminator; outgoing lines get a single `\n` appended and are held
//! to the same length limit the decoder applies.

use bytes::BytesMut;
use encoding::Encoding;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::LineError;

/// Default maximum line length in bytes.
pub const DEFAULT_MAX_LINE: usize = 8192;

/// Newline-delimited text codec with encoding support.
#[derive(Clone, Debug)]
pub struct ChatLineCodec {
    encoding: &'static Encoding,
    /// Index of next byte to check for newline
    next_index: usize,
    max_len: usize,
}

impl ChatLineCodec {
    /// Create a codec for the given encoding label (e.g. `"utf-8"`,
    /// `"iso-8859-1"`).
    pub fn new(label: &str) -> Result<Self, LineError> {
        Self::with_max_len(label, DEFAULT_MAX_LINE)
    }

    /// Create a codec with a custom maximum line length.
    pub fn with_max_len(label: &str, max_len: usize) -> Result<Self, LineError> {
        let encoding = Encoding::for_label(label.as_bytes())
            .ok_or_else(|| LineError::UnknownEncoding(label.to_owned()))?;
        Ok(Self {
            encoding,
            next_index: 0,
            max_len,
        })
    }

    /// Name of the active encoding.
    pub fn encoding_name(&self) -> &'static str {
        self.encoding.name()
    }
}

impl Decoder for ChatLineCodec {
    type Item = String;
    type Error = LineError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, LineError> {
        if let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') {
            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if line.len() > self.max_len {
                return Err(LineError::LineTooLong {
                    actual: line.len(),
                    limit: self.max_len,
                });
            }

            let (text, _enc, _had_errors) = self.encoding.decode(line.as_ref());
            Ok(Some(text.trim_end_matches(['\r', '\n']).to_owned()))
        } else {
            self.next_index = src.len();

            if src.len() > self.max_len {
                return Err(LineError::LineTooLong {
                    actual: src.len(),
                    limit: self.max_len,
                });
            }

            Ok(None)
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, LineError> {
        // Peer closed mid-line: hand out what is left.
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() => Ok(None),
            None => {
                let rest = src.split();
                self.next_index = 0;
                let (text, _enc, _had_errors) = self.encoding.decode(rest.as_ref());
                Ok(Some(text.trim_end_matches('\r').to_owned()))
            }
        }
    }
}

impl Encoder<String> for ChatLineCodec {
    type Error = LineError;

    fn encode(&mut self, msg: String, dst: &mut BytesMut) -> Result<(), LineError> {
        let line = msg.trim_end_matches(['\r', '\n']);
        if line.contains(['\r', '\n']) {
            return Err(LineError::EmbeddedLineBreak);
        }

        let (encoded, _enc, _had_errors) = self.encoding.encode(line);
        let bytes: &[u8] = &encoded;
        // The decoder counts the terminator.
        if bytes.len() + 1 > self.max_len {
            return Err(LineError::LineTooLong {
                actual: bytes.len() + 1,
                limit: self.max_len,
            });
        }

        dst.reserve(bytes.len() + 1);
        dst.extend_from_slice(bytes);
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}
