#![forbid(unsafe_code)]

//! Concrete request and response carriers.
//!
//! Only non-flexible versions are implemented, so every request here uses
//! the plain request header written by [`crate::append_request`].

use crate::codec::{
    write_array_len, write_bool, write_i16, write_i32, write_i64, write_nullable_string,
    write_string, Reader,
};
use crate::request::{
    AdminRequest, GroupCoordinatorRequest, Request, Response, TxnCoordinatorRequest,
};
use crate::{ProtocolError, Result};

pub const API_KEY_HEARTBEAT: i16 = 12;
pub const API_KEY_API_VERSIONS: i16 = 18;
pub const API_KEY_DELETE_TOPICS: i16 = 20;
pub const API_KEY_END_TXN: i16 = 26;

pub const API_VERSIONS_MIN_VERSION: i16 = 0;
pub const API_VERSIONS_MAX_VERSION: i16 = 2;

pub const HEARTBEAT_MIN_VERSION: i16 = 0;
pub const HEARTBEAT_MAX_VERSION: i16 = 3;

pub const DELETE_TOPICS_MIN_VERSION: i16 = 0;
pub const DELETE_TOPICS_MAX_VERSION: i16 = 3;

pub const END_TXN_MIN_VERSION: i16 = 0;
pub const END_TXN_MAX_VERSION: i16 = 2;

fn ensure_version(
    api: &'static str,
    version: i16,
    min_version: i16,
    max_version: i16,
) -> Result<()> {
    if version < min_version || version > max_version {
        return Err(ProtocolError::InvalidVersion { api, version });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersionsRequest {
    pub version: i16,
}

impl Default for ApiVersionsRequest {
    fn default() -> Self {
        Self {
            version: API_VERSIONS_MAX_VERSION,
        }
    }
}

impl Request for ApiVersionsRequest {
    type Response = ApiVersionsResponse;

    fn key(&self) -> i16 {
        API_KEY_API_VERSIONS
    }

    fn max_version(&self) -> i16 {
        API_VERSIONS_MAX_VERSION
    }

    fn version(&self) -> i16 {
        self.version
    }

    fn set_version(&mut self, version: i16) {
        self.version = version;
    }

    fn append_to(&self, _dst: &mut Vec<u8>) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersionsResponseApiVersion {
    pub api_key: i16,
    pub min_version: i16,
    pub max_version: i16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiVersionsResponse {
    pub version: i16,
    pub error_code: i16,
    pub api_keys: Vec<ApiVersionsResponseApiVersion>,
    pub throttle_time_ms: i32,
}

impl ApiVersionsResponse {
    pub fn find(&self, api_key: i16) -> Option<&ApiVersionsResponseApiVersion> {
        self.api_keys.iter().find(|api| api.api_key == api_key)
    }

    pub fn append_to(&self, dst: &mut Vec<u8>) {
        write_i16(dst, self.error_code);
        write_array_len(dst, self.api_keys.len());
        for api in &self.api_keys {
            write_i16(dst, api.api_key);
            write_i16(dst, api.min_version);
            write_i16(dst, api.max_version);
        }
        if self.version >= 1 {
            write_i32(dst, self.throttle_time_ms);
        }
    }
}

impl Response for ApiVersionsResponse {
    fn version(&self) -> i16 {
        self.version
    }

    fn set_version(&mut self, version: i16) {
        self.version = version;
    }

    fn read_from(&mut self, input: &[u8]) -> Result<()> {
        ensure_version(
            "ApiVersionsResponse",
            self.version,
            API_VERSIONS_MIN_VERSION,
            API_VERSIONS_MAX_VERSION,
        )?;
        let mut reader = Reader::new(input);
        self.error_code = reader.read_i16()?;
        let api_len = reader.read_array_len()?;
        let mut api_keys = Vec::with_capacity(api_len);
        for _ in 0..api_len {
            api_keys.push(ApiVersionsResponseApiVersion {
                api_key: reader.read_i16()?,
                min_version: reader.read_i16()?,
                max_version: reader.read_i16()?,
            });
        }
        self.api_keys = api_keys;
        if self.version >= 1 {
            self.throttle_time_ms = reader.read_i32()?;
        }
        reader.finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatRequest {
    pub version: i16,
    pub group_id: String,
    pub generation_id: i32,
    pub member_id: String,
    /// Sent from v3.
    pub group_instance_id: Option<String>,
}

impl Default for HeartbeatRequest {
    fn default() -> Self {
        Self {
            version: HEARTBEAT_MAX_VERSION,
            group_id: String::new(),
            generation_id: -1,
            member_id: String::new(),
            group_instance_id: None,
        }
    }
}

impl Request for HeartbeatRequest {
    type Response = HeartbeatResponse;

    fn key(&self) -> i16 {
        API_KEY_HEARTBEAT
    }

    fn max_version(&self) -> i16 {
        HEARTBEAT_MAX_VERSION
    }

    fn version(&self) -> i16 {
        self.version
    }

    fn set_version(&mut self, version: i16) {
        self.version = version;
    }

    fn append_to(&self, dst: &mut Vec<u8>) {
        write_string(dst, &self.group_id);
        write_i32(dst, self.generation_id);
        write_string(dst, &self.member_id);
        if self.version >= 3 {
            write_nullable_string(dst, self.group_instance_id.as_deref());
        }
    }
}

impl GroupCoordinatorRequest for HeartbeatRequest {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeartbeatResponse {
    pub version: i16,
    pub throttle_time_ms: i32,
    pub error_code: i16,
}

impl Response for HeartbeatResponse {
    fn version(&self) -> i16 {
        self.version
    }

    fn set_version(&mut self, version: i16) {
        self.version = version;
    }

    fn read_from(&mut self, input: &[u8]) -> Result<()> {
        ensure_version(
            "HeartbeatResponse",
            self.version,
            HEARTBEAT_MIN_VERSION,
            HEARTBEAT_MAX_VERSION,
        )?;
        let mut reader = Reader::new(input);
        if self.version >= 1 {
            self.throttle_time_ms = reader.read_i32()?;
        }
        self.error_code = reader.read_i16()?;
        reader.finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTopicsRequest {
    pub version: i16,
    pub topic_names: Vec<String>,
    pub timeout_ms: i32,
}

impl Default for DeleteTopicsRequest {
    fn default() -> Self {
        Self {
            version: DELETE_TOPICS_MAX_VERSION,
            topic_names: Vec::new(),
            timeout_ms: 15_000,
        }
    }
}

impl Request for DeleteTopicsRequest {
    type Response = DeleteTopicsResponse;

    fn key(&self) -> i16 {
        API_KEY_DELETE_TOPICS
    }

    fn max_version(&self) -> i16 {
        DELETE_TOPICS_MAX_VERSION
    }

    fn version(&self) -> i16 {
        self.version
    }

    fn set_version(&mut self, version: i16) {
        self.version = version;
    }

    fn append_to(&self, dst: &mut Vec<u8>) {
        write_array_len(dst, self.topic_names.len());
        for name in &self.topic_names {
            write_string(dst, name);
        }
        write_i32(dst, self.timeout_ms);
    }
}

impl AdminRequest for DeleteTopicsRequest {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletableTopicResult {
    pub name: String,
    pub error_code: i16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteTopicsResponse {
    pub version: i16,
    pub throttle_time_ms: i32,
    pub responses: Vec<DeletableTopicResult>,
}

impl Response for DeleteTopicsResponse {
    fn version(&self) -> i16 {
        self.version
    }

    fn set_version(&mut self, version: i16) {
        self.version = version;
    }

    fn read_from(&mut self, input: &[u8]) -> Result<()> {
        ensure_version(
            "DeleteTopicsResponse",
            self.version,
            DELETE_TOPICS_MIN_VERSION,
            DELETE_TOPICS_MAX_VERSION,
        )?;
        let mut reader = Reader::new(input);
        if self.version >= 1 {
            self.throttle_time_ms = reader.read_i32()?;
        }
        let len = reader.read_array_len()?;
        let mut responses = Vec::with_capacity(len);
        for _ in 0..len {
            let name = reader.read_string()?;
            let error_code = reader.read_i16()?;
            responses.push(DeletableTopicResult { name, error_code });
        }
        self.responses = responses;
        reader.finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndTxnRequest {
    pub version: i16,
    pub transactional_id: String,
    pub producer_id: i64,
    pub producer_epoch: i16,
    pub committed: bool,
}

impl Default for EndTxnRequest {
    fn default() -> Self {
        Self {
            version: END_TXN_MAX_VERSION,
            transactional_id: String::new(),
            producer_id: -1,
            producer_epoch: -1,
            committed: false,
        }
    }
}

impl Request for EndTxnRequest {
    type Response = EndTxnResponse;

    fn key(&self) -> i16 {
        API_KEY_END_TXN
    }

    fn max_version(&self) -> i16 {
        END_TXN_MAX_VERSION
    }

    fn version(&self) -> i16 {
        self.version
    }

    fn set_version(&mut self, version: i16) {
        self.version = version;
    }

    fn append_to(&self, dst: &mut Vec<u8>) {
        write_string(dst, &self.transactional_id);
        write_i64(dst, self.producer_id);
        write_i16(dst, self.producer_epoch);
        write_bool(dst, self.committed);
    }
}

impl TxnCoordinatorRequest for EndTxnRequest {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndTxnResponse {
    pub version: i16,
    pub throttle_time_ms: i32,
    pub error_code: i16,
}

impl Response for EndTxnResponse {
    fn version(&self) -> i16 {
        self.version
    }

    fn set_version(&mut self, version: i16) {
        self.version = version;
    }

    fn read_from(&mut self, input: &[u8]) -> Result<()> {
        ensure_version(
            "EndTxnResponse",
            self.version,
            END_TXN_MIN_VERSION,
            END_TXN_MAX_VERSION,
        )?;
        let mut reader = Reader::new(input);
        self.throttle_time_ms = reader.read_i32()?;
        self.error_code = reader.read_i16()?;
        reader.finish()
    }
}
