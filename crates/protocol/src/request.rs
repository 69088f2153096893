#![forbid(unsafe_code)]

use crate::codec::{write_i16, write_i32, write_nullable_string, Reader};
use crate::{ProtocolError, Result};

/// A message kind that can be sent to a broker.
pub trait Request {
    /// Response kind the broker answers this request with.
    type Response: Response;

    /// Protocol API key.
    fn key(&self) -> i16;

    fn min_version(&self) -> i16 {
        0
    }

    /// Highest version this request knows how to encode.
    fn max_version(&self) -> i16;

    /// Version the request and its response are encoded with.
    fn version(&self) -> i16;

    fn set_version(&mut self, version: i16);

    /// Appends the version-specific body.
    fn append_to(&self, dst: &mut Vec<u8>);

    /// An empty response of the matching kind, at this request's version.
    fn response_kind(&self) -> Self::Response {
        let mut response = Self::Response::default();
        response.set_version(self.version());
        response
    }
}

/// Requests that must be issued to a controller.
pub trait AdminRequest: Request {}

/// Requests that must be issued to a group coordinator.
pub trait GroupCoordinatorRequest: Request {}

/// Requests that must be issued to a transaction coordinator.
pub trait TxnCoordinatorRequest: Request {}

/// A message kind a broker responds with.
pub trait Response: Default {
    fn version(&self) -> i16;

    fn set_version(&mut self, version: i16);

    /// Parses all of `input` into `self`.
    ///
    /// Too little input fails with [`ProtocolError::NotEnoughData`], too
    /// much with [`ProtocolError::TrailingBytes`].
    fn read_from(&mut self, input: &[u8]) -> Result<()>;
}

/// Appends a complete request frame to `dst`.
///
/// The frame is `length | api_key | api_version | correlation_id |
/// client_id | body`, where `length` counts every byte after itself.
/// `client_id` of `None` is not sent (length -1); `Some("")` is sent as the
/// empty string.
pub fn append_request<R>(
    dst: &mut Vec<u8>,
    request: &R,
    correlation_id: i32,
    client_id: Option<&str>,
) where
    R: Request + ?Sized,
{
    let start = dst.len();
    dst.extend_from_slice(&[0; 4]);
    write_i16(dst, request.key());
    write_i16(dst, request.version());
    write_i32(dst, correlation_id);
    write_nullable_string(dst, client_id);
    request.append_to(dst);

    let length = i32::try_from(dst.len() - start - 4).unwrap_or(i32::MAX);
    dst[start..start + 4].copy_from_slice(&length.to_be_bytes());
}

/// Request header as read back from a frame whose length prefix has been
/// stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader<'a> {
    pub api_key: i16,
    pub api_version: i16,
    pub correlation_id: i32,
    pub client_id: Option<String>,
    pub body: &'a [u8],
}

impl<'a> RequestHeader<'a> {
    pub fn read_from(frame: &'a [u8]) -> Result<Self> {
        let mut reader = Reader::new(frame);
        let api_key = reader.read_i16()?;
        let api_version = reader.read_i16()?;
        let correlation_id = reader.read_i32()?;
        let client_id = reader.read_nullable_string()?;
        Ok(Self {
            api_key,
            api_version,
            correlation_id,
            client_id,
            body: reader.rest(),
        })
    }

    /// Splits a length-prefixed frame, checking the prefix against the input.
    pub fn read_framed(input: &'a [u8]) -> Result<Self> {
        let mut reader = Reader::new(input);
        let length = reader.read_i32()?;
        if length < 0 {
            return Err(ProtocolError::MalformedLength(length));
        }
        if length as usize != reader.remaining() {
            return Err(ProtocolError::LengthMismatch {
                declared: length as usize,
                actual: reader.remaining(),
            });
        }
        Self::read_from(reader.rest())
    }
}
