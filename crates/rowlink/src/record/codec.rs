//! Quote-aware delimited framing for [`Record`] streams.
//!
//! Decoding is incremental: the codec consumes whatever bytes are available,
//! keeps partially parsed field/record state across calls, and emits one
//! record per completed line. Quoting follows the common CSV rules: a quote
//! at the start of a field opens a quoted field, `""` inside it is a literal
//! quote, and delimiters/newlines inside quotes are data. A `\r` directly
//! before a record-terminating `\n` is stripped, blank lines (LF or CRLF
//! alike) are skipped, and a final record without a trailing newline is
//! emitted at end of input.

use crate::record::Record;
use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// Default field delimiter.
pub const DEFAULT_DELIMITER: u8 = b',';

const QUOTE: u8 = b'"';

/// Framing failures. All of these are fatal reads for the pipeline.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// The underlying stream failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A quoted field was still open when the input ended.
    #[error("Unterminated quoted field at end of input")]
    UnterminatedQuote,

    /// A completed field was not valid UTF-8.
    #[error("Input is not valid UTF-8")]
    NotUtf8,
}

/// Where the decoder currently stands inside a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FieldState {
    /// At the start of a field; a quote here opens a quoted field.
    Start,
    /// Inside an unquoted field; quotes are literal here.
    Unquoted,
    /// Inside a quoted field; delimiters and newlines are data.
    Quoted,
    /// Saw a quote inside a quoted field: either an escape or the close.
    QuotedQuote,
}

/// Incremental [`Decoder`]/[`Encoder`] pair for delimited [`Record`]s.
///
/// Construct one instance per framed half; the decoder carries partial
/// parse state between reads.
#[derive(Debug)]
pub struct RecordCodec {
    delimiter: u8,
    state: FieldState,
    fields: Vec<String>,
    current: Vec<u8>,
}

impl RecordCodec {
    /// Creates a codec splitting on the given single-byte delimiter.
    pub fn new(delimiter: u8) -> Self {
        Self {
            delimiter,
            state: FieldState::Start,
            fields: Vec::new(),
            current: Vec::new(),
        }
    }

    fn finish_field(&mut self) -> Result<(), CodecError> {
        let bytes = std::mem::take(&mut self.current);
        let field = String::from_utf8(bytes).map_err(|_| CodecError::NotUtf8)?;
        self.fields.push(field);
        self.state = FieldState::Start;
        Ok(())
    }

    /// Terminates the in-progress record. `strip_cr` removes one `\r` left
    /// behind by a CRLF line ending; it is false when the field closed with
    /// a quote, where a trailing `\r` is data.
    fn finish_record(&mut self, strip_cr: bool) -> Result<Record, CodecError> {
        if strip_cr && self.current.last() == Some(&b'\r') {
            self.current.pop();
        }
        self.finish_field()?;
        Ok(Record::new(std::mem::take(&mut self.fields)))
    }

    fn record_is_blank(&self) -> bool {
        self.state == FieldState::Start && self.fields.is_empty() && self.current.is_empty()
    }

    /// Feeds one byte into the state machine. Returns a record when the byte
    /// terminates one.
    fn feed(&mut self, byte: u8) -> Result<Option<Record>, CodecError> {
        match self.state {
            FieldState::Start => {
                if byte == QUOTE {
                    self.state = FieldState::Quoted;
                } else if byte == self.delimiter {
                    self.finish_field()?;
                } else if byte == b'\n' {
                    if !self.record_is_blank() {
                        return self.finish_record(true).map(Some);
                    }
                } else {
                    self.current.push(byte);
                    self.state = FieldState::Unquoted;
                }
            }
            FieldState::Unquoted => {
                if byte == self.delimiter {
                    self.finish_field()?;
                } else if byte == b'\n' {
                    // A lone `\r` before the terminator is a CRLF blank line.
                    if self.fields.is_empty() && self.current == b"\r" {
                        self.current.clear();
                        self.state = FieldState::Start;
                    } else {
                        return self.finish_record(true).map(Some);
                    }
                } else {
                    self.current.push(byte);
                }
            }
            FieldState::Quoted => {
                if byte == QUOTE {
                    self.state = FieldState::QuotedQuote;
                } else {
                    self.current.push(byte);
                }
            }
            FieldState::QuotedQuote => {
                if byte == QUOTE {
                    // Escaped literal quote.
                    self.current.push(QUOTE);
                    self.state = FieldState::Quoted;
                } else if byte == self.delimiter {
                    self.finish_field()?;
                } else if byte == b'\n' {
                    return self.finish_record(false).map(Some);
                } else {
                    // Lenient: bytes after a closing quote are kept as data.
                    self.current.push(byte);
                    self.state = FieldState::Unquoted;
                }
            }
        }
        Ok(None)
    }
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER)
    }
}

impl Decoder for RecordCodec {
    type Item = Record;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Record>, CodecError> {
        let mut consumed = 0;
        let mut emitted = None;
        for &byte in src.iter() {
            consumed += 1;
            if let Some(record) = self.feed(byte)? {
                emitted = Some(record);
                break;
            }
        }
        src.advance(consumed);
        Ok(emitted)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Record>, CodecError> {
        if let Some(record) = self.decode(buf)? {
            return Ok(Some(record));
        }
        match self.state {
            FieldState::Quoted => Err(CodecError::UnterminatedQuote),
            _ if self.record_is_blank() => Ok(None),
            // Final record without a trailing newline.
            _ => self.finish_record(false).map(Some),
        }
    }
}

impl Encoder<Record> for RecordCodec {
    type Error = CodecError;

    fn encode(&mut self, record: Record, dst: &mut BytesMut) -> Result<(), CodecError> {
        let unquoted_len: usize = record.fields().map(str::len).sum();
        dst.reserve(unquoted_len + record.len() + 1);
        for (index, field) in record.fields().enumerate() {
            if index > 0 {
                dst.put_u8(self.delimiter);
            }
            if needs_quoting(field, self.delimiter) {
                dst.put_u8(QUOTE);
                for byte in field.bytes() {
                    if byte == QUOTE {
                        dst.put_u8(QUOTE);
                    }
                    dst.put_u8(byte);
                }
                dst.put_u8(QUOTE);
            } else {
                dst.put_slice(field.as_bytes());
            }
        }
        dst.put_u8(b'\n');
        Ok(())
    }
}

fn needs_quoting(field: &str, delimiter: u8) -> bool {
    field
        .bytes()
        .any(|b| b == delimiter || b == QUOTE || b == b'\n' || b == b'\r')
}
