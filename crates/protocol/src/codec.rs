#![forbid(unsafe_code)]

//! Primitive big-endian and zig-zag varint encodings.
//!
//! Writers append to a `Vec<u8>` and never fail. Readers go through
//! [`Reader`], which narrows a cursor over an immutable slice and reports
//! every shortfall as [`ProtocolError::NotEnoughData`].

use crate::{ProtocolError, Result};

pub fn size_of_varint(value: i32) -> usize {
    size_of_unsigned(u64::from(zigzag_encode_i32(value)))
}

pub fn size_of_varlong(value: i64) -> usize {
    size_of_unsigned(zigzag_encode_i64(value))
}

pub fn encode_varint(value: i32) -> Vec<u8> {
    let mut out = Vec::with_capacity(5);
    write_varint(&mut out, value);
    out
}

pub fn encode_varlong(value: i64) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    write_varlong(&mut out, value);
    out
}

/// Decodes a zig-zag varint, returning the value and the bytes it used.
pub fn decode_varint(input: &[u8]) -> Result<(i32, usize)> {
    let (raw, read) = decode_unsigned_varint(input)?;
    Ok((zigzag_decode_i32(raw), read))
}

pub fn decode_varlong(input: &[u8]) -> Result<(i64, usize)> {
    let (raw, read) = decode_unsigned_varlong(input)?;
    Ok((zigzag_decode_i64(raw), read))
}

pub fn write_varint(out: &mut Vec<u8>, value: i32) {
    write_unsigned(out, u64::from(zigzag_encode_i32(value)));
}

pub fn write_varlong(out: &mut Vec<u8>, value: i64) {
    write_unsigned(out, zigzag_encode_i64(value));
}

/// Varint-length-prefixed bytes as used inside v2 records; `None` is `-1`.
pub fn write_varint_bytes(out: &mut Vec<u8>, value: Option<&[u8]>) {
    match value {
        None => write_varint(out, -1),
        Some(bytes) => {
            write_varint(out, len_to_i32(bytes.len()));
            out.extend_from_slice(bytes);
        }
    }
}

pub fn write_i8(out: &mut Vec<u8>, value: i8) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub fn write_i16(out: &mut Vec<u8>, value: i16) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub fn write_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub fn write_i64(out: &mut Vec<u8>, value: i64) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub fn write_bool(out: &mut Vec<u8>, value: bool) {
    out.push(u8::from(value));
}

/// Writes an int16-length-prefixed string.
///
/// Strings longer than `i16::MAX` bytes cannot be represented; they are cut
/// at the last char boundary that fits.
pub fn write_string(out: &mut Vec<u8>, value: &str) {
    let value = clamp_to_i16(value);
    write_i16(out, value.len() as i16);
    out.extend_from_slice(value.as_bytes());
}

/// Writes a nullable string: `None` is length `-1`, `Some("")` is length `0`.
pub fn write_nullable_string(out: &mut Vec<u8>, value: Option<&str>) {
    match value {
        Some(value) => write_string(out, value),
        None => write_i16(out, -1),
    }
}

pub fn write_bytes(out: &mut Vec<u8>, value: &[u8]) {
    write_i32(out, len_to_i32(value.len()));
    out.extend_from_slice(value);
}

pub fn write_nullable_bytes(out: &mut Vec<u8>, value: Option<&[u8]>) {
    match value {
        Some(bytes) => write_bytes(out, bytes),
        None => write_i32(out, -1),
    }
}

pub fn write_array_len(out: &mut Vec<u8>, len: usize) {
    write_i32(out, len_to_i32(len));
}

pub(crate) fn len_to_i32(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

fn clamp_to_i16(value: &str) -> &str {
    let max = i16::MAX as usize;
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

fn zigzag_encode_i32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

fn zigzag_decode_i32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ (-((value & 1) as i32))
}

fn zigzag_encode_i64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn zigzag_decode_i64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ (-((value & 1) as i64))
}

fn size_of_unsigned(mut value: u64) -> usize {
    let mut size = 1;
    while value >= 0x80 {
        value >>= 7;
        size += 1;
    }
    size
}

fn write_unsigned(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push(((value & 0x7f) as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn decode_unsigned_varint(input: &[u8]) -> Result<(u32, usize)> {
    let mut value = 0_u32;
    for i in 0..5 {
        let Some(&byte) = input.get(i) else {
            return Err(ProtocolError::NotEnoughData);
        };
        if i == 4 && (byte & 0xf0) != 0 {
            return Err(ProtocolError::VarintTooLong);
        }
        value |= ((byte & 0x7f) as u32) << (7 * i);
        if (byte & 0x80) == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(ProtocolError::VarintTooLong)
}

fn decode_unsigned_varlong(input: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0_u64;
    for i in 0..10 {
        let Some(&byte) = input.get(i) else {
            return Err(ProtocolError::NotEnoughData);
        };
        if i == 9 && (byte & 0xfe) != 0 {
            return Err(ProtocolError::VarlongTooLong);
        }
        value |= ((byte & 0x7f) as u64) << (7 * i);
        if (byte & 0x80) == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(ProtocolError::VarlongTooLong)
}

/// Read cursor over an immutable input slice.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    input: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, cursor: 0 }
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.input.len().saturating_sub(self.cursor)
    }

    /// The unread tail of the input.
    pub fn rest(&self) -> &'a [u8] {
        &self.input[self.cursor.min(self.input.len())..]
    }

    /// Fails with [`ProtocolError::TrailingBytes`] if input is left over.
    pub fn finish(&self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            left => Err(ProtocolError::TrailingBytes(left)),
        }
    }

    pub fn read_exact(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(ProtocolError::NotEnoughData);
        }
        let start = self.cursor;
        self.cursor += len;
        Ok(&self.input[start..self.cursor])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_exact(1)?[0] as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let bytes = self.read_exact(2)?;
        let mut buf = [0_u8; 2];
        buf.copy_from_slice(bytes);
        Ok(i16::from_be_bytes(buf))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.read_exact(4)?;
        let mut buf = [0_u8; 4];
        buf.copy_from_slice(bytes);
        Ok(i32::from_be_bytes(buf))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_exact(4)?;
        let mut buf = [0_u8; 4];
        buf.copy_from_slice(bytes);
        Ok(u32::from_be_bytes(buf))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let bytes = self.read_exact(8)?;
        let mut buf = [0_u8; 8];
        buf.copy_from_slice(bytes);
        Ok(i64::from_be_bytes(buf))
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_exact(1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            invalid => Err(ProtocolError::InvalidBoolean(invalid)),
        }
    }

    pub fn read_varint(&mut self) -> Result<i32> {
        let (value, read) = decode_varint(self.rest())?;
        self.cursor += read;
        Ok(value)
    }

    pub fn read_varlong(&mut self) -> Result<i64> {
        let (value, read) = decode_varlong(self.rest())?;
        self.cursor += read;
        Ok(value)
    }

    pub fn read_string(&mut self) -> Result<String> {
        self.read_nullable_string()?
            .ok_or(ProtocolError::MalformedLength(-1))
    }

    pub fn read_nullable_string(&mut self) -> Result<Option<String>> {
        let len = self.read_i16()?;
        if len == -1 {
            return Ok(None);
        }
        if len < -1 {
            return Err(ProtocolError::MalformedLength(i32::from(len)));
        }
        self.read_utf8(len as usize).map(Some)
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        self.read_nullable_bytes()?
            .ok_or(ProtocolError::MalformedLength(-1))
    }

    pub fn read_nullable_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        let len = self.read_i32()?;
        if len == -1 {
            return Ok(None);
        }
        if len < -1 {
            return Err(ProtocolError::MalformedLength(len));
        }
        Ok(Some(self.read_exact(len as usize)?.to_vec()))
    }

    /// Reads varint-length-prefixed nullable bytes.
    pub fn read_varint_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        let len = self.read_varint()?;
        if len == -1 {
            return Ok(None);
        }
        if len < -1 {
            return Err(ProtocolError::MalformedLength(len));
        }
        Ok(Some(self.read_exact(len as usize)?.to_vec()))
    }

    pub fn read_varint_string(&mut self) -> Result<String> {
        let len = self.read_varint()?;
        if len < 0 {
            return Err(ProtocolError::MalformedLength(len));
        }
        self.read_utf8(len as usize)
    }

    pub fn read_array_len(&mut self) -> Result<usize> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(ProtocolError::MalformedLength(len));
        }
        // Each element takes at least one byte.
        if len as usize > self.remaining() {
            return Err(ProtocolError::NotEnoughData);
        }
        Ok(len as usize)
    }

    fn read_utf8(&mut self, len: usize) -> Result<String> {
        let bytes = self.read_exact(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidString)
    }
}
