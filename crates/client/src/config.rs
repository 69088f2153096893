#![forbid(unsafe_code)]

use serde::Deserialize;

use crate::ClientError;

pub const DEFAULT_CLIENT_ID: &str = "kwire";
pub const DEFAULT_MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Sent in every request header; `None` omits it (length -1).
    pub client_id: Option<String>,
    pub first_correlation_id: i32,
    /// Upper bound on an inbound response frame, length prefix excluded.
    pub max_frame_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: Some(DEFAULT_CLIENT_ID.to_string()),
            first_correlation_id: 0,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client_id(mut self, client_id: Option<impl Into<String>>) -> Self {
        self.client_id = client_id.map(Into::into);
        self
    }

    pub fn with_first_correlation_id(mut self, correlation_id: i32) -> Self {
        self.first_correlation_id = correlation_id;
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if let Some(client_id) = &self.client_id {
            if client_id.len() > i16::MAX as usize {
                return Err(ClientError::InvalidConfig(format!(
                    "client_id is {} bytes, at most {} fit in a request header",
                    client_id.len(),
                    i16::MAX
                )));
            }
        }
        if self.max_frame_size < 4 {
            return Err(ClientError::InvalidConfig(format!(
                "max_frame_size {} cannot hold a correlation id",
                self.max_frame_size
            )));
        }
        Ok(())
    }
}
