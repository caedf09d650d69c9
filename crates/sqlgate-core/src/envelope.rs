//! The uniform response structure returned for every statement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Cache metadata attached to read responses that asked for caching.
///
/// Serializes as `false` on a miss and as an object on a hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheStatus {
    Hit(CacheHitInfo),
    Miss(bool),
}

impl CacheStatus {
    pub fn miss() -> Self {
        CacheStatus::Miss(false)
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, CacheStatus::Hit(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheHitInfo {
    /// When the cached payload was produced.
    pub created_at: DateTime<Utc>,
    /// Hex digest of the cached payload.
    pub signature: String,
    /// When the entry stops being served, if it expires at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_hit: Option<CacheStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_check: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_memory_usage: Option<String>,

    /// Executor-specific fields passed through unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResponseEnvelope {
    pub fn success(data: Option<Value>) -> Self {
        Self {
            success: true,
            code: None,
            message: None,
            data,
            affected_rows: None,
            cache_hit: None,
            auth_check: None,
            peak_memory_usage: None,
            extra: Map::new(),
        }
    }

    pub fn failure(code: u16, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            message: Some(message.into()),
            ..Self::success(None)
        }
    }

    pub fn with_cache_status(mut self, status: CacheStatus) -> Self {
        self.cache_hit = Some(status);
        self
    }

    pub fn with_auth_check(mut self, auth_check: Map<String, Value>) -> Self {
        self.auth_check = Some(auth_check);
        self
    }

    pub fn with_peak_memory(mut self, usage: Option<String>) -> Self {
        self.peak_memory_usage = usage;
        self
    }

    /// HTTP status matching this envelope: 200 on success, `code` otherwise.
    pub fn http_status(&self) -> u16 {
        if self.success {
            200
        } else {
            self.code.unwrap_or(500)
        }
    }
}
