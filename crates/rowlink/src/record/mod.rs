//! # Records and the delimited-record codec
//!
//! A [`Record`] is one unit of input/output data: an ordered list of string
//! fields. One field (chosen by the configured column index) acts as the
//! lookup key, and a successfully resolved link is appended as a new trailing
//! field. Original fields are never reordered or rewritten.
//!
//! [`RecordCodec`] frames records over any `AsyncRead`/`AsyncWrite` via
//! `tokio_util::codec`, with quote-aware splitting on a configurable
//! single-byte delimiter.

mod codec;

pub use codec::*;

/// One unit of input/output data: an ordered list of string fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<String>,
}

impl Record {
    /// Creates a record from its fields.
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// Returns the field at `index`, or `None` when the record is shorter.
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// Appends a derived field to the end of the record.
    ///
    /// This is the only mutation a record undergoes between decode and
    /// encode: existing fields keep their positions and contents.
    pub fn push(&mut self, field: impl Into<String>) {
        self.fields.push(field.into());
    }

    /// Number of fields in the record.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates the fields in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for Record {
    fn from(fields: Vec<String>) -> Self {
        Self::new(fields)
    }
}

impl FromIterator<String> for Record {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
