#![forbid(unsafe_code)]

//! Client side of the request/response framing: correlation ids, version
//! negotiation and matching response frames back to their requests.

use std::collections::BTreeMap;

use kwire_protocol::codec::Reader;
use kwire_protocol::messages::ApiVersionsResponse;
use kwire_protocol::{append_request, ProtocolError, Request, Response};
use thiserror::Error;
use tracing::{debug, trace};

pub mod config;

pub use config::ClientConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("broker does not support api key {0} at any version we speak")]
    UnsupportedApi(i16),
    #[error("response frame of {0} bytes exceeds the configured maximum")]
    FrameTooLarge(usize),
    #[error("no outstanding request with correlation id {0}")]
    UnknownCorrelation(i32),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    pub api_key: i16,
    pub version: i16,
}

/// Picks the highest version both sides support and sets it on `request`.
pub fn negotiate_version<R: Request>(
    request: &mut R,
    broker: &ApiVersionsResponse,
) -> Result<i16, ClientError> {
    let key = request.key();
    let Some(range) = broker.find(key) else {
        return Err(ClientError::UnsupportedApi(key));
    };
    let version = request.max_version().min(range.max_version);
    if version < request.min_version().max(range.min_version) {
        return Err(ClientError::UnsupportedApi(key));
    }
    request.set_version(version);
    debug!(api_key = key, version, "negotiated request version");
    Ok(version)
}

/// Splits one complete length-prefixed frame off the front of `input`.
///
/// Returns `Ok(None)` while the frame is still incomplete.
pub fn next_frame(
    input: &[u8],
    max_frame_size: usize,
) -> Result<Option<(&[u8], &[u8])>, ClientError> {
    if input.len() < 4 {
        return Ok(None);
    }
    let length = i32::from_be_bytes([input[0], input[1], input[2], input[3]]);
    if length < 0 {
        return Err(ProtocolError::MalformedLength(length).into());
    }
    let length = length as usize;
    if length > max_frame_size {
        return Err(ClientError::FrameTooLarge(length));
    }
    if input.len() - 4 < length {
        return Ok(None);
    }
    Ok(Some((&input[4..4 + length], &input[4 + length..])))
}

/// Writes request frames and tracks which are awaiting a response.
#[derive(Debug)]
pub struct FrameWriter {
    config: ClientConfig,
    next_correlation_id: i32,
    in_flight: BTreeMap<i32, InFlight>,
}

impl FrameWriter {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        Ok(Self {
            next_correlation_id: config.first_correlation_id,
            config,
            in_flight: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn pending(&self, correlation_id: i32) -> Option<InFlight> {
        self.in_flight.get(&correlation_id).copied()
    }

    /// Appends a request frame to `dst` and returns its correlation id.
    pub fn write_request<R: Request>(&mut self, dst: &mut Vec<u8>, request: &R) -> i32 {
        let correlation_id = self.next_correlation_id;
        self.next_correlation_id = self.next_correlation_id.wrapping_add(1);

        let start = dst.len();
        append_request(dst, request, correlation_id, self.config.client_id.as_deref());
        self.in_flight.insert(
            correlation_id,
            InFlight {
                api_key: request.key(),
                version: request.version(),
            },
        );
        trace!(
            correlation_id,
            api_key = request.key(),
            version = request.version(),
            bytes = dst.len() - start,
            "wrote request frame"
        );
        correlation_id
    }

    /// Decodes a response frame (length prefix included) for `request`.
    ///
    /// The frame's correlation id must belong to an outstanding request of
    /// the same api key; it is retired once the body decodes.
    pub fn read_response<R: Request>(
        &mut self,
        request: &R,
        frame: &[u8],
    ) -> Result<R::Response, ClientError> {
        let Some((body, rest)) = next_frame(frame, self.config.max_frame_size)? else {
            return Err(ProtocolError::NotEnoughData.into());
        };
        if !rest.is_empty() {
            return Err(ProtocolError::TrailingBytes(rest.len()).into());
        }

        let mut reader = Reader::new(body);
        let correlation_id = reader.read_i32()?;
        let Some(in_flight) = self.in_flight.get(&correlation_id).copied() else {
            return Err(ClientError::UnknownCorrelation(correlation_id));
        };
        if in_flight.api_key != request.key() {
            return Err(ClientError::UnknownCorrelation(correlation_id));
        }

        let mut response = request.response_kind();
        response.set_version(in_flight.version);
        response.read_from(reader.rest())?;
        self.in_flight.remove(&correlation_id);
        debug!(
            correlation_id,
            api_key = in_flight.api_key,
            version = in_flight.version,
            "decoded response"
        );
        Ok(response)
    }

    /// Forgets an outstanding request, e.g. after its connection dropped.
    pub fn abandon(&mut self, correlation_id: i32) -> Option<InFlight> {
        self.in_flight.remove(&correlation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kwire_protocol::messages::{
        ApiVersionsRequest, ApiVersionsResponseApiVersion, HeartbeatRequest, API_KEY_HEARTBEAT,
    };
    use kwire_protocol::RequestHeader;

    fn broker_versions(entries: &[(i16, i16, i16)]) -> ApiVersionsResponse {
        ApiVersionsResponse {
            api_keys: entries
                .iter()
                .map(|&(api_key, min_version, max_version)| ApiVersionsResponseApiVersion {
                    api_key,
                    min_version,
                    max_version,
                })
                .collect(),
            ..ApiVersionsResponse::default()
        }
    }

    fn response_frame(correlation_id: i32, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&((body.len() + 4) as i32).to_be_bytes());
        out.extend_from_slice(&correlation_id.to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn correlation_ids_increase_and_wrap() {
        let config = ClientConfig::new().with_first_correlation_id(i32::MAX);
        let mut writer = FrameWriter::new(config).expect("writer");
        let request = ApiVersionsRequest::default();
        let mut out = Vec::new();
        assert_eq!(writer.write_request(&mut out, &request), i32::MAX);
        assert_eq!(writer.write_request(&mut out, &request), i32::MIN);
        assert_eq!(writer.in_flight(), 2);
    }

    #[test]
    fn frames_carry_configured_client_id() {
        let config = ClientConfig::new().with_client_id(Some("svc"));
        let mut writer = FrameWriter::new(config).expect("writer");
        let mut out = Vec::new();
        writer.write_request(&mut out, &ApiVersionsRequest::default());
        let header = RequestHeader::read_framed(&out).expect("header");
        assert_eq!(header.client_id.as_deref(), Some("svc"));
        assert_eq!(header.correlation_id, 0);
    }

    #[test]
    fn negotiation_takes_lowest_common_max() {
        let mut request = HeartbeatRequest::default();
        let broker = broker_versions(&[(API_KEY_HEARTBEAT, 0, 1)]);
        assert_eq!(negotiate_version(&mut request, &broker), Ok(1));
        assert_eq!(request.version(), 1);

        let broker = broker_versions(&[(API_KEY_HEARTBEAT, 0, 9)]);
        assert_eq!(negotiate_version(&mut request, &broker), Ok(3));
    }

    #[test]
    fn negotiation_fails_without_overlap() {
        let mut request = HeartbeatRequest::default();
        let broker = broker_versions(&[(API_KEY_HEARTBEAT, 5, 9)]);
        assert_eq!(
            negotiate_version(&mut request, &broker),
            Err(ClientError::UnsupportedApi(API_KEY_HEARTBEAT))
        );
        let broker = broker_versions(&[]);
        assert_eq!(
            negotiate_version(&mut request, &broker),
            Err(ClientError::UnsupportedApi(API_KEY_HEARTBEAT))
        );
    }

    #[test]
    fn next_frame_waits_for_complete_frame() {
        let frame = response_frame(3, &[1, 2, 3]);
        assert_eq!(next_frame(&frame[..2], 1024), Ok(None));
        assert_eq!(next_frame(&frame[..8], 1024), Ok(None));
        let (body, rest) = next_frame(&frame, 1024).expect("frame").expect("complete");
        assert_eq!(body, &frame[4..]);
        assert!(rest.is_empty());
        assert_eq!(next_frame(&frame, 4), Err(ClientError::FrameTooLarge(7)));
    }

    #[test]
    fn response_is_matched_and_retired() {
        let mut writer = FrameWriter::new(ClientConfig::new()).expect("writer");
        let mut request = HeartbeatRequest::default();
        request.set_version(1);
        let mut out = Vec::new();
        let correlation_id = writer.write_request(&mut out, &request);

        let frame = response_frame(correlation_id, &[0, 0, 0, 0, 0, 25]);
        let response = writer.read_response(&request, &frame).expect("response");
        assert_eq!(response.error_code, 25);
        assert_eq!(response.version, 1);
        assert_eq!(writer.in_flight(), 0);

        assert_eq!(
            writer.read_response(&request, &frame),
            Err(ClientError::UnknownCorrelation(correlation_id))
        );
    }

    #[test]
    fn failed_decode_keeps_request_outstanding() {
        let mut writer = FrameWriter::new(ClientConfig::new()).expect("writer");
        let request = HeartbeatRequest::default();
        let mut out = Vec::new();
        let correlation_id = writer.write_request(&mut out, &request);

        let frame = response_frame(correlation_id, &[0, 0]);
        assert_eq!(
            writer.read_response(&request, &frame),
            Err(ClientError::Protocol(ProtocolError::NotEnoughData))
        );
        assert!(writer.pending(correlation_id).is_some());
        assert!(writer.abandon(correlation_id).is_some());
        assert_eq!(writer.in_flight(), 0);
    }
}
