//! Structured model-invocation errors and rate-limit detection.
//!
//! Providers signal throttling in three different ways: an HTTP 429, a
//! gRPC-style `RESOURCE_EXHAUSTED` status string, or a `RetryInfo` entry in
//! the error's `details` list telling the caller how long to back off.
//! [`ModelError`] carries all three so the retry loop in [`super::retry`] can
//! decide without matching on message text.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// HTTP status for "too many requests".
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Provider status code for quota / rate exhaustion.
pub const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

/// Type URL of the retry-info detail entry.
pub const RETRY_INFO_TYPE: &str = "type.googleapis.com/google.rpc.RetryInfo";

/// Longest provider delay hint honored. Larger hints are ignored and the
/// linear backoff applies instead.
pub const MAX_RETRY_HINT: Duration = Duration::from_secs(300);

/// Maximum number of body bytes kept in an error message.
const MAX_BODY_IN_MESSAGE: usize = 500;

/// One typed entry of a provider error's `details` list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "@type", default)]
    pub type_url: String,
    /// Suggested delay, e.g. `"1s"`, `"1.5s"`, `2` or `{"seconds": 2}`.
    #[serde(rename = "retryDelay", default)]
    pub retry_delay: Option<Value>,
}

impl ErrorDetail {
    /// A `RetryInfo` entry carrying the given delay.
    pub fn retry_info(delay: Duration) -> Self {
        Self {
            type_url: RETRY_INFO_TYPE.to_string(),
            retry_delay: Some(Value::String(format!("{}s", delay.as_secs_f64()))),
        }
    }

    /// Whether this entry is typed as a retry-info hint.
    pub fn is_retry_info(&self) -> bool {
        self.type_url.ends_with("RetryInfo")
    }

    /// The hinted delay, if this is a retry-info entry with a readable delay.
    pub fn delay(&self) -> Option<Duration> {
        if !self.is_retry_info() {
            return None;
        }
        self.retry_delay.as_ref().and_then(parse_retry_delay)
    }
}

/// Parse a retry delay expressed in seconds.
///
/// Accepts `"1s"`, `"1.5s"`, `"250ms"`, bare numbers (`2`, `"2"`) and the
/// protobuf `Duration` object form `{"seconds": 2, "nanos": 500000000}`.
/// Negative, unrepresentable, or longer than [`MAX_RETRY_HINT`] yields `None`.
pub fn parse_retry_delay(value: &Value) -> Option<Duration> {
    let secs = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if let Some(ms) = s.strip_suffix("ms") {
                ms.trim().parse::<f64>().ok()? / 1000.0
            } else {
                s.strip_suffix('s').unwrap_or(s).trim().parse::<f64>().ok()?
            }
        }
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .and_then(|v| v.as_f64().or_else(|| v.as_str()?.parse().ok()))
                .unwrap_or(0.0);
            let nanos = map.get("nanos").and_then(Value::as_f64).unwrap_or(0.0);
            seconds + nanos / 1e9
        }
        _ => return None,
    };
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|delay| *delay <= MAX_RETRY_HINT)
}

/// A failed upstream model call.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("model call failed{}: {message}", status_label(.status, .code))]
pub struct ModelError {
    /// HTTP-style status, when the failure came from an HTTP response.
    pub status: Option<u16>,
    /// Provider status code such as `RESOURCE_EXHAUSTED`.
    pub code: Option<String>,
    pub message: String,
    /// Structured detail entries reported by the provider.
    pub details: Vec<ErrorDetail>,
}

fn status_label(status: &Option<u16>, code: &Option<String>) -> String {
    match (status, code) {
        (Some(s), Some(c)) => format!(" (HTTP {s}, {c})"),
        (Some(s), None) => format!(" (HTTP {s})"),
        (None, Some(c)) => format!(" ({c})"),
        (None, None) => String::new(),
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

impl ModelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Shorthand for an HTTP 429 error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(message).with_status(TOO_MANY_REQUESTS)
    }

    /// A network-level failure (no response received).
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::new(format!("request failed: {err}"))
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_detail(mut self, detail: ErrorDetail) -> Self {
        self.details.push(detail);
        self
    }

    /// Build an error from a non-success HTTP response.
    ///
    /// Understands both the OpenRouter envelope (`{"error":{"code":429,
    /// "message":...}}`) and the Google RPC envelope, which adds `status`
    /// and `details`. A `Retry-After` header value is folded into a
    /// retry-info detail when the body does not already carry one.
    pub fn from_http(status: u16, body: &str, retry_after: Option<Duration>) -> Self {
        let mut err = Self::new(String::new()).with_status(status);

        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(ErrorEnvelope { error: Some(body) }) => {
                err.message = body.message.unwrap_or_default();
                err.code = body.status.or_else(|| match body.code {
                    Some(Value::String(s)) => Some(s),
                    _ => None,
                });
                err.details = body.details;
            }
            _ => {
                err.message = body.chars().take(MAX_BODY_IN_MESSAGE).collect();
            }
        }

        if err.message.is_empty() {
            err.message = format!("HTTP {status}");
        }
        if let Some(delay) = retry_after
            && err.retry_hint().is_none()
        {
            err.details.push(ErrorDetail::retry_info(delay));
        }
        err
    }

    /// Whether this error is a provider rate-limit signal.
    ///
    /// True for HTTP 429, a `RESOURCE_EXHAUSTED` code, or the presence of a
    /// retry-info detail.
    pub fn is_rate_limited(&self) -> bool {
        self.status == Some(TOO_MANY_REQUESTS)
            || self.code.as_deref() == Some(RESOURCE_EXHAUSTED)
            || self.details.iter().any(ErrorDetail::is_retry_info)
    }

    /// The first readable retry-info delay, if any.
    pub fn retry_hint(&self) -> Option<Duration> {
        self.details.iter().find_map(ErrorDetail::delay)
    }
}
