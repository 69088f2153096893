#![forbid(unsafe_code)]

use crate::batch::ReadFrom;
use crate::codec::{
    decode_varint, len_to_i32, write_i8, write_varint, write_varint_bytes, write_varlong, Reader,
};
use crate::{ProtocolError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordHeader {
    pub key: String,
    pub value: Option<Vec<u8>>,
}

/// One entry of a v2 record batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// Byte length of everything after the length varint.
    pub length: i32,
    pub attributes: i8,
    pub timestamp_delta: i64,
    pub offset_delta: i32,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub headers: Vec<RecordHeader>,
}

impl Record {
    pub fn new(offset_delta: i32, key: Option<Vec<u8>>, value: Option<Vec<u8>>) -> Self {
        Self {
            offset_delta,
            key,
            value,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: Option<Vec<u8>>) -> Self {
        self.headers.push(RecordHeader {
            key: key.into(),
            value,
        });
        self
    }

    /// Appends the varint-length-prefixed record; `length` is recomputed.
    pub fn append_to(&self, dst: &mut Vec<u8>) {
        let mut body = Vec::new();
        write_i8(&mut body, self.attributes);
        write_varlong(&mut body, self.timestamp_delta);
        write_varint(&mut body, self.offset_delta);
        write_varint_bytes(&mut body, self.key.as_deref());
        write_varint_bytes(&mut body, self.value.as_deref());
        write_varint(&mut body, len_to_i32(self.headers.len()));
        for header in &self.headers {
            write_varint_bytes(&mut body, Some(header.key.as_bytes()));
            write_varint_bytes(&mut body, header.value.as_deref());
        }
        write_varint(dst, len_to_i32(body.len()));
        dst.extend_from_slice(&body);
    }

    /// Size of the record on the wire, including its length prefix.
    pub fn wire_size(&self) -> usize {
        let mut out = Vec::new();
        self.append_to(&mut out);
        out.len()
    }
}

impl ReadFrom for Record {
    fn read_from(input: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(input);
        let length = reader.read_varint()?;
        if length < 0 {
            return Err(ProtocolError::MalformedLength(length));
        }
        if length as usize != reader.remaining() {
            return Err(ProtocolError::LengthMismatch {
                declared: length as usize,
                actual: reader.remaining(),
            });
        }
        let attributes = reader.read_i8()?;
        let timestamp_delta = reader.read_varlong()?;
        let offset_delta = reader.read_varint()?;
        let key = reader.read_varint_bytes()?;
        let value = reader.read_varint_bytes()?;

        let header_count = reader.read_varint()?;
        if header_count < 0 {
            return Err(ProtocolError::MalformedLength(header_count));
        }
        if header_count as usize > reader.remaining() {
            return Err(ProtocolError::NotEnoughData);
        }
        let mut headers = Vec::with_capacity(header_count as usize);
        for _ in 0..header_count {
            let key = reader.read_varint_string()?;
            let value = reader.read_varint_bytes()?;
            headers.push(RecordHeader { key, value });
        }
        reader.finish()?;

        Ok(Self {
            length,
            attributes,
            timestamp_delta,
            offset_delta,
            key,
            value,
            headers,
        })
    }
}

/// Reads exactly `n` varint-length-prefixed records from `input`.
///
/// Any record whose length varint is unreadable or negative, or whose
/// declared length runs past the input, fails the whole call with
/// [`ProtocolError::NotEnoughData`]. Bytes after the `n`th record are left
/// alone.
pub fn read_records(n: usize, mut input: &[u8]) -> Result<Vec<Record>> {
    let mut records = Vec::with_capacity(n.min(input.len()));
    for _ in 0..n {
        let (length, used) = decode_varint(input).map_err(|_| ProtocolError::NotEnoughData)?;
        if length < 0 {
            return Err(ProtocolError::NotEnoughData);
        }
        let total = used + length as usize;
        if input.len() < total {
            return Err(ProtocolError::NotEnoughData);
        }
        records.push(Record::read_from(&input[..total])?);
        input = &input[total..];
    }
    Ok(records)
}
