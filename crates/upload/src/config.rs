use std::time::Duration;

use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::relay::DEFAULT_CAPACITY;

/// Status answered for a committed upload.
///
/// A PUT without response body may be answered with either, git-lfs clients accept both.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessStatus {
    #[default]
    Ok,
    NoContent,
}

impl SuccessStatus {
    pub fn status_code(self) -> StatusCode {
        match self {
            SuccessStatus::Ok => StatusCode::OK,
            SuccessStatus::NoContent => StatusCode::NO_CONTENT,
        }
    }
}

/// Settings shared by every upload of an [`ObjectUploadService`](crate::ObjectUploadService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Capacity of the relay buffer of each session.
    pub buffer_capacity: usize,
    pub success_status: SuccessStatus,
    /// Abort an upload when the client sends nothing for this many seconds.
    pub idle_timeout_secs: Option<u64>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self { buffer_capacity: DEFAULT_CAPACITY, success_status: SuccessStatus::Ok, idle_timeout_secs: None }
    }
}

impl UploadConfig {
    pub fn builder() -> UploadConfigBuilder {
        UploadConfigBuilder::new()
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug)]
pub struct UploadConfigBuilder {
    config: UploadConfig,
}

impl UploadConfigBuilder {
    fn new() -> Self {
        Self { config: UploadConfig::default() }
    }

    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    pub fn success_status(mut self, status: SuccessStatus) -> Self {
        self.config.success_status = status;
        self
    }

    pub fn idle_timeout_secs(mut self, secs: u64) -> Self {
        self.config.idle_timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> UploadConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: UploadConfig = serde_json::from_str(r#"{"success_status": "no_content"}"#).unwrap();
        assert_eq!(config.buffer_capacity, DEFAULT_CAPACITY);
        assert_eq!(config.success_status.status_code(), StatusCode::NO_CONTENT);
        assert_eq!(config.idle_timeout(), None);
    }

    #[test]
    fn test_builder() {
        let config = UploadConfig::builder().buffer_capacity(1024).idle_timeout_secs(30).build();
        assert_eq!(config.buffer_capacity, 1024);
        assert_eq!(config.success_status, SuccessStatus::Ok);
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(30)));
    }
}
