//! Cloudflare v4 response envelope
//!
//! Every list endpoint wraps its payload as
//! `{result, result_info, success, errors, messages}`.

use ddns_core::record::{DnsRecord, ZoneRecord};
use ddns_core::{Error, Result};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Zone list response
pub type ZoneResults = ApiEnvelope<ZoneRecord>;

/// DNS record list response
pub type DnsResults = ApiEnvelope<DnsRecord>;

/// Generic list envelope
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    /// The listed items, in API order; `null` on failed calls
    #[serde(default = "Vec::new", deserialize_with = "null_as_empty")]
    pub result: Vec<T>,

    /// Pagination details
    #[serde(default)]
    pub result_info: Option<ResultInfo>,

    /// Whether the API considers the call successful
    #[serde(default = "default_success")]
    pub success: bool,

    /// Errors reported by the API
    #[serde(default)]
    pub errors: Vec<ApiMessage>,

    /// Informational messages
    #[serde(default)]
    pub messages: Vec<ApiMessage>,
}

impl<T> ApiEnvelope<T> {
    /// Turn `success: false` into a provider error listing the API errors
    pub fn ensure_success(self) -> Result<Self> {
        if self.success {
            return Ok(self);
        }

        let detail = if self.errors.is_empty() {
            "no error details".to_string()
        } else {
            join_messages(&self.errors)
        };
        Err(Error::provider(
            "cloudflare",
            format!("API reported failure: {}", detail),
        ))
    }

    /// Whether another page follows this one
    pub fn has_next_page(&self) -> bool {
        self.result_info
            .as_ref()
            .is_some_and(|info| matches!((info.page, info.total_pages), (Some(page), Some(total)) if page < total))
    }
}

/// Pagination block of a list response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultInfo {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub total_pages: Option<u32>,
    pub count: Option<u32>,
    pub total_count: Option<u32>,
}

/// An entry of the `errors` or `messages` list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ApiMessage {
    /// `{"code": 1003, "message": "Invalid or missing zone id."}`
    Detailed {
        #[serde(default)]
        code: i64,
        #[serde(default)]
        message: String,
    },
    /// Bare string
    Text(String),
}

impl fmt::Display for ApiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiMessage::Detailed { code, message } => write!(f, "[{}] {}", code, message),
            ApiMessage::Text(text) => f.write_str(text),
        }
    }
}

/// Render API messages as one line
pub fn join_messages(messages: &[ApiMessage]) -> String {
    messages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Best-effort summary of an error response body
///
/// Uses the envelope's `errors` when the body is a Cloudflare envelope,
/// the raw text otherwise.
pub fn error_summary(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        errors: Vec<ApiMessage>,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => join_messages(&parsed.errors),
        _ => body.trim().to_string(),
    }
}

fn default_success() -> bool {
    true
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
