#![forbid(unsafe_code)]

//! Wire framing for the Kafka protocol.
//!
//! Outbound requests are assembled by [`append_request`]; inbound record
//! data is split into units by [`read_records`] and the batch decoders
//! [`read_record_batches`], [`read_v1_messages`] and [`read_v0_messages`].

use thiserror::Error;

pub mod batch;
pub mod codec;
pub mod messages;
pub mod records;
pub mod request;

pub use batch::{
    read_frames, read_record_batches, read_v0_messages, read_v1_messages, MessageV0, MessageV1,
    ReadFrom, RecordBatch, FRAME_HEADER_LEN, FRAME_LENGTH_OFFSET,
};
pub use codec::{
    decode_varint, decode_varlong, encode_varint, encode_varlong, size_of_varint,
    size_of_varlong, Reader,
};
pub use records::{read_records, Record, RecordHeader};
pub use request::{
    append_request, AdminRequest, GroupCoordinatorRequest, Request, RequestHeader, Response,
    TxnCoordinatorRequest,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("not enough data")]
    NotEnoughData,
    #[error("malformed length value: {0}")]
    MalformedLength(i32),
    #[error("varint overflow (more than 5 bytes)")]
    VarintTooLong,
    #[error("varlong overflow (more than 10 bytes)")]
    VarlongTooLong,
    #[error("unsupported version {version} for {api}")]
    InvalidVersion { api: &'static str, version: i16 },
    #[error("invalid magic byte: {0}")]
    InvalidMagic(i8),
    #[error("invalid boolean value: {0}")]
    InvalidBoolean(u8),
    #[error("invalid UTF-8 string")]
    InvalidString,
    #[error("invalid batch length: {0}")]
    InvalidBatchLength(i32),
    #[error("invalid records count: {0}")]
    InvalidRecordsCount(i32),
    #[error("unsupported compression codec: {0}")]
    UnsupportedCompression(i16),
    #[error("declared length {declared} does not match {actual} available bytes")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("{0} unread trailing bytes")]
    TrailingBytes(usize),
    #[error("correlation id mismatch: expected {expected}, got {actual}")]
    CorrelationMismatch { expected: i32, actual: i32 },
}

impl ProtocolError {
    /// Whether this error means the input ended before a declared length.
    pub fn is_not_enough_data(&self) -> bool {
        matches!(self, Self::NotEnoughData)
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
