//! Envelopes exchanged between the gateway and upstream service nodes.
//!
//! The `api` handler wraps each HTTP request in an [`ApiRequest`] and expects an
//! [`ApiResponse`] back; the `event` handler publishes an [`Event`]. All types are
//! serialised as JSON.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any gateway-generated non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"not_found"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Multi-valued pairs
// ---------------------------------------------------------------------------

/// A key with every value it was sent with (headers, query parameters).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub key: String,
    pub values: Vec<String>,
}

/// Map of pairs keyed by their name.
pub type Pairs = BTreeMap<String, Pair>;

/// Append `value` under `key`, creating the pair on first use.
pub fn push_pair(pairs: &mut Pairs, key: &str, value: impl Into<String>) {
    pairs
        .entry(key.to_owned())
        .or_insert_with(|| Pair {
            key: key.to_owned(),
            values: Vec::new(),
        })
        .values
        .push(value.into());
}

// ---------------------------------------------------------------------------
// API envelope
// ---------------------------------------------------------------------------

/// Request envelope POSTed to the upstream node by the `api` handler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiRequest {
    pub method: String,
    pub path: String,
    pub url: String,
    #[serde(default)]
    pub header: Pairs,
    /// Query string parameters.
    #[serde(default)]
    pub get: Pairs,
    #[serde(default)]
    pub body: String,
}

impl ApiRequest {
    /// Set the body from raw bytes; non UTF-8 sequences are replaced.
    pub fn with_body(mut self, body: &Bytes) -> Self {
        self.body = String::from_utf8_lossy(body).into_owned();
        self
    }
}

/// Response envelope the upstream node answers an [`ApiRequest`] with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    #[serde(default)]
    pub header: Pairs,
    #[serde(default)]
    pub body: String,
}

fn default_status_code() -> u16 {
    200
}

// ---------------------------------------------------------------------------
// Event envelope
// ---------------------------------------------------------------------------

/// Event published upstream by the `event` handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event id (UUID v4).
    pub id: String,
    /// `service.method` the event was routed to.
    pub topic: String,
    /// Seconds since the unix epoch.
    pub timestamp: u64,
    #[serde(default)]
    pub header: Pairs,
    #[serde(default)]
    pub data: String,
}
