//! Error types for the lookup pipeline.
//!
//! Fatality is encoded in the type: [`Error`] covers conditions that abort the
//! whole pipeline, while [`TaskError`] covers per-record outcomes that stay
//! isolated to a single task and are reported through the configured emission
//! policy.
//!
//! ## Fatal cases
//! - `Read`: the input stream failed to read or decode.
//! - `Write`: the output stream failed to accept a committed record.
//! - `Channel`: an internal coordination channel closed unexpectedly.
//!
//! ## Per-record cases
//! - `KeyColumnOutOfRange`: the record is too short to contain the key.
//! - `LookupFailed`: the lookup client reported an error.
//! - `NoResults`: the lookup succeeded but returned nothing.
//! - `DeadlineExceeded`: the task ran past its deadline.
//! - `Cancelled`: the pipeline was cancelled before the task launched.

use crate::record::CodecError;
use core::time::Duration;

pub type Result<T> = core::result::Result<T, Error>;

/// Fatal pipeline errors. Any of these terminates admission and draining.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Reading or decoding the input stream failed.
    #[error("Input stream error: {0}")]
    Read(#[source] CodecError),

    /// Writing or flushing the output stream failed.
    #[error("Output stream error: {0}")]
    Write(#[source] CodecError),

    /// Internal channel send/receive failure (e.g., a closed channel).
    #[error("Channel error: {context}")]
    Channel { context: String },
}

/// Per-record outcomes. These are logged and routed through the emission
/// policy; they never abort the pipeline or affect neighboring tasks.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum TaskError {
    /// The record has fewer fields than the configured key column index.
    #[error("Key column {column} out of range for record with {fields} fields")]
    KeyColumnOutOfRange { column: usize, fields: usize },

    /// The lookup client failed (transport, auth, server-side error).
    #[error("Lookup failed: {message}")]
    LookupFailed { message: String },

    /// The lookup client returned zero results for the key.
    #[error("Lookup returned no results")]
    NoResults,

    /// The task did not finish within its deadline.
    #[error("Task deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// The pipeline was cancelled before this task was launched.
    #[error("Cancelled before launch")]
    Cancelled,
}
