#![forbid(unsafe_code)]

//! Length-framed containers: v2 record batches and legacy v0/v1 message sets.
//!
//! All three share one frame layout:
//!
//! ```text
//! bytes 0..8    base offset
//! bytes 8..12   big-endian body length
//! bytes 12..    body (body length bytes)
//! ```

use tracing::debug;

use crate::codec::{
    len_to_i32, write_bytes, write_i16, write_i32, write_i64, write_i8, write_nullable_bytes,
    write_u32, Reader,
};
use crate::records::{read_records, Record};
use crate::{ProtocolError, Result};

/// Bytes preceding a frame body: base offset plus body length.
pub const FRAME_HEADER_LEN: usize = 12;
/// Position of the body length within the frame header.
pub const FRAME_LENGTH_OFFSET: usize = 8;

pub const RECORD_BATCH_MAGIC: i8 = 2;
pub const MESSAGE_V1_MAGIC: i8 = 1;
pub const MESSAGE_V0_MAGIC: i8 = 0;
pub const RECORD_BATCH_HEADER_LEN: usize = 61;

const COMPRESSION_MASK: i16 = 0x07;
const TRANSACTIONAL_FLAG: i16 = 0x10;
const CONTROL_FLAG: i16 = 0x20;

/// A unit decodable from a slice it must consume entirely.
pub trait ReadFrom: Sized {
    fn read_from(input: &[u8]) -> Result<Self>;
}

/// Decodes as many complete frames as `input` holds.
///
/// Decoding stops, without error, at the first frame that is truncated,
/// declares a negative length, or whose body fails to decode. Everything
/// decoded before that point is returned; the rest is discarded.
pub fn read_frames<T: ReadFrom>(mut input: &[u8]) -> Vec<T> {
    let mut frames = Vec::new();
    while input.len() > FRAME_HEADER_LEN {
        let mut length = [0_u8; 4];
        length.copy_from_slice(&input[FRAME_LENGTH_OFFSET..FRAME_HEADER_LEN]);
        let length = i32::from_be_bytes(length);
        if length < 0 {
            debug!(length, decoded = frames.len(), "negative frame length, stopping");
            return frames;
        }
        let total = (length as usize).saturating_add(FRAME_HEADER_LEN);
        if input.len() < total {
            debug!(
                needed = total,
                available = input.len(),
                decoded = frames.len(),
                "discarding truncated trailing frame"
            );
            return frames;
        }
        match T::read_from(&input[..total]) {
            Ok(frame) => frames.push(frame),
            Err(err) => {
                debug!(%err, decoded = frames.len(), "frame body failed to decode, stopping");
                return frames;
            }
        }
        input = &input[total..];
    }
    frames
}

/// Reads as many record batches as possible, discarding a partial final
/// batch such as the one a fetch response may end with.
pub fn read_record_batches(input: &[u8]) -> Vec<RecordBatch> {
    read_frames(input)
}

/// Reads as many v1 messages as possible, discarding a partial final one.
pub fn read_v1_messages(input: &[u8]) -> Vec<MessageV1> {
    read_frames(input)
}

/// Reads as many v0 messages as possible, discarding a partial final one.
pub fn read_v0_messages(input: &[u8]) -> Vec<MessageV0> {
    read_frames(input)
}

/// Reads the frame header and checks the declared body length against the
/// slice, which must hold exactly one frame.
fn read_frame_header(reader: &mut Reader<'_>) -> Result<(i64, i32)> {
    let base_offset = reader.read_i64()?;
    let length = reader.read_i32()?;
    if length < 0 {
        return Err(ProtocolError::InvalidBatchLength(length));
    }
    if length as usize != reader.remaining() {
        return Err(ProtocolError::LengthMismatch {
            declared: length as usize,
            actual: reader.remaining(),
        });
    }
    Ok((base_offset, length))
}

/// A v2 record batch. The records section is kept as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBatch {
    pub base_offset: i64,
    pub batch_length: i32,
    pub partition_leader_epoch: i32,
    pub magic: i8,
    pub crc: u32,
    pub attributes: i16,
    pub last_offset_delta: i32,
    pub first_timestamp: i64,
    pub max_timestamp: i64,
    pub producer_id: i64,
    pub producer_epoch: i16,
    pub base_sequence: i32,
    pub num_records: i32,
    pub records: Vec<u8>,
}

impl Default for RecordBatch {
    fn default() -> Self {
        Self {
            base_offset: 0,
            batch_length: 0,
            partition_leader_epoch: -1,
            magic: RECORD_BATCH_MAGIC,
            crc: 0,
            attributes: 0,
            last_offset_delta: 0,
            first_timestamp: 0,
            max_timestamp: 0,
            producer_id: -1,
            producer_epoch: -1,
            base_sequence: -1,
            num_records: 0,
            records: Vec::new(),
        }
    }
}

impl RecordBatch {
    /// Builds an uncompressed batch holding `records`.
    pub fn from_records(base_offset: i64, records: &[Record]) -> Self {
        let mut encoded = Vec::new();
        for record in records {
            record.append_to(&mut encoded);
        }
        let last_offset_delta = records
            .iter()
            .map(|record| record.offset_delta)
            .max()
            .unwrap_or(0);
        let mut batch = Self {
            base_offset,
            last_offset_delta,
            num_records: len_to_i32(records.len()),
            records: encoded,
            ..Self::default()
        };
        batch.batch_length = batch.declared_length();
        batch
    }

    /// Codec id from the low attribute bits; 0 means uncompressed.
    pub fn compression(&self) -> i16 {
        self.attributes & COMPRESSION_MASK
    }

    pub fn is_transactional(&self) -> bool {
        self.attributes & TRANSACTIONAL_FLAG != 0
    }

    pub fn is_control(&self) -> bool {
        self.attributes & CONTROL_FLAG != 0
    }

    /// Decodes the records of an uncompressed batch.
    pub fn records(&self) -> Result<Vec<Record>> {
        let compression = self.compression();
        if compression != 0 {
            return Err(ProtocolError::UnsupportedCompression(compression));
        }
        read_records(self.num_records as usize, &self.records)
    }

    fn declared_length(&self) -> i32 {
        len_to_i32(RECORD_BATCH_HEADER_LEN - FRAME_HEADER_LEN + self.records.len())
    }

    /// Appends the batch; `batch_length` is derived from the records section.
    pub fn append_to(&self, dst: &mut Vec<u8>) {
        write_i64(dst, self.base_offset);
        write_i32(dst, self.declared_length());
        write_i32(dst, self.partition_leader_epoch);
        write_i8(dst, self.magic);
        write_u32(dst, self.crc);
        write_i16(dst, self.attributes);
        write_i32(dst, self.last_offset_delta);
        write_i64(dst, self.first_timestamp);
        write_i64(dst, self.max_timestamp);
        write_i64(dst, self.producer_id);
        write_i16(dst, self.producer_epoch);
        write_i32(dst, self.base_sequence);
        write_i32(dst, self.num_records);
        dst.extend_from_slice(&self.records);
    }
}

impl ReadFrom for RecordBatch {
    fn read_from(input: &[u8]) -> Result<Self> {
        if input.len() < RECORD_BATCH_HEADER_LEN {
            return Err(ProtocolError::NotEnoughData);
        }
        let mut reader = Reader::new(input);
        let (base_offset, batch_length) = read_frame_header(&mut reader)?;
        let partition_leader_epoch = reader.read_i32()?;
        let magic = reader.read_i8()?;
        if magic != RECORD_BATCH_MAGIC {
            return Err(ProtocolError::InvalidMagic(magic));
        }
        let crc = reader.read_u32()?;
        let attributes = reader.read_i16()?;
        let last_offset_delta = reader.read_i32()?;
        let first_timestamp = reader.read_i64()?;
        let max_timestamp = reader.read_i64()?;
        let producer_id = reader.read_i64()?;
        let producer_epoch = reader.read_i16()?;
        let base_sequence = reader.read_i32()?;
        let num_records = reader.read_i32()?;
        if num_records < 0 {
            return Err(ProtocolError::InvalidRecordsCount(num_records));
        }
        let records = reader.rest().to_vec();

        Ok(Self {
            base_offset,
            batch_length,
            partition_leader_epoch,
            magic,
            crc,
            attributes,
            last_offset_delta,
            first_timestamp,
            max_timestamp,
            producer_id,
            producer_epoch,
            base_sequence,
            num_records,
            records,
        })
    }
}

/// A single legacy message with a timestamp (magic 1).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageV1 {
    pub offset: i64,
    pub message_size: i32,
    pub crc: u32,
    pub magic: i8,
    pub attributes: i8,
    pub timestamp: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
}

impl MessageV1 {
    pub fn new(offset: i64, timestamp: i64, key: Option<Vec<u8>>, value: Option<Vec<u8>>) -> Self {
        Self {
            offset,
            magic: MESSAGE_V1_MAGIC,
            timestamp,
            key,
            value,
            ..Self::default()
        }
    }

    pub fn append_to(&self, dst: &mut Vec<u8>) {
        let mut body = Vec::new();
        write_u32(&mut body, self.crc);
        write_i8(&mut body, self.magic);
        write_i8(&mut body, self.attributes);
        write_i64(&mut body, self.timestamp);
        write_nullable_bytes(&mut body, self.key.as_deref());
        write_nullable_bytes(&mut body, self.value.as_deref());
        write_i64(dst, self.offset);
        write_bytes(dst, &body);
    }
}

impl ReadFrom for MessageV1 {
    fn read_from(input: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(input);
        let (offset, message_size) = read_frame_header(&mut reader)?;
        let crc = reader.read_u32()?;
        let magic = reader.read_i8()?;
        if magic != MESSAGE_V1_MAGIC {
            return Err(ProtocolError::InvalidMagic(magic));
        }
        let attributes = reader.read_i8()?;
        let timestamp = reader.read_i64()?;
        let key = reader.read_nullable_bytes()?;
        let value = reader.read_nullable_bytes()?;
        reader.finish()?;
        Ok(Self {
            offset,
            message_size,
            crc,
            magic,
            attributes,
            timestamp,
            key,
            value,
        })
    }
}

/// A single legacy message without a timestamp (magic 0).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageV0 {
    pub offset: i64,
    pub message_size: i32,
    pub crc: u32,
    pub magic: i8,
    pub attributes: i8,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
}

impl MessageV0 {
    pub fn new(offset: i64, key: Option<Vec<u8>>, value: Option<Vec<u8>>) -> Self {
        Self {
            offset,
            magic: MESSAGE_V0_MAGIC,
            key,
            value,
            ..Self::default()
        }
    }

    pub fn append_to(&self, dst: &mut Vec<u8>) {
        let mut body = Vec::new();
        write_u32(&mut body, self.crc);
        write_i8(&mut body, self.magic);
        write_i8(&mut body, self.attributes);
        write_nullable_bytes(&mut body, self.key.as_deref());
        write_nullable_bytes(&mut body, self.value.as_deref());
        write_i64(dst, self.offset);
        write_bytes(dst, &body);
    }
}

impl ReadFrom for MessageV0 {
    fn read_from(input: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(input);
        let (offset, message_size) = read_frame_header(&mut reader)?;
        let crc = reader.read_u32()?;
        let magic = reader.read_i8()?;
        if magic != MESSAGE_V0_MAGIC {
            return Err(ProtocolError::InvalidMagic(magic));
        }
        let attributes = reader.read_i8()?;
        let key = reader.read_nullable_bytes()?;
        let value = reader.read_nullable_bytes()?;
        reader.finish()?;
        Ok(Self {
            offset,
            message_size,
            crc,
            magic,
            attributes,
            key,
            value,
        })
    }
}
