//! Push dispatcher.
//!
//! Sends one encrypted body to one push endpoint and classifies the
//! response. A single attempt is made; nothing here retries.
//!
//! | Status | Result |
//! |--------|--------|
//! | 2xx | delivered |
//! | 404, 410 | gone, subscription should be pruned |
//! | anything else | rejected, status and body logged |
//! | no response | transport failure, error logged |

use reqwest::header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum characters of a push service error body kept in logs.
pub const MAX_LOGGED_BODY_CHARS: usize = 500;

/// Endpoint characters kept in logs; the full URL is a capability.
pub const MAX_LOGGED_ENDPOINT_CHARS: usize = 60;

/// `Urgency` header values (RFC 8030 §5.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Urgency {
    VeryLow,
    Low,
    Normal,
    #[default]
    High,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::VeryLow => "very-low",
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::High => "high",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Urgency {
    type Err = UnknownUrgency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "very-low" => Ok(Urgency::VeryLow),
            "low" => Ok(Urgency::Low),
            "normal" => Ok(Urgency::Normal),
            "high" => Ok(Urgency::High),
            other => Err(UnknownUrgency(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown urgency {0:?}")]
pub struct UnknownUrgency(String);

/// What a push service status code means for the subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Delivered,
    Gone,
    Rejected,
}

/// Classify a push service response status.
pub fn classify(status: u16) -> Disposition {
    match status {
        200..=299 => Disposition::Delivered,
        404 | 410 => Disposition::Gone,
        _ => Disposition::Rejected,
    }
}

/// Result of one dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchResult {
    /// Any response was received
    Response { status: u16, disposition: Disposition },
    /// Connection, TLS or timeout failure
    Transport,
}

/// HTTP client for push services
#[derive(Clone)]
pub struct PushDispatcher {
    client: reqwest::Client,
    ttl_secs: u64,
    urgency: Urgency,
}

impl PushDispatcher {
    /// Create a dispatcher with a per-request timeout
    pub fn new(ttl: Duration, urgency: Urgency, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            // A redirected push would be replayed as a bodiless GET
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("duet-backend/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            ttl_secs: ttl.as_secs(),
            urgency,
        })
    }

    /// POST an `aes128gcm` body to `endpoint` (best-effort, single attempt)
    pub async fn send(&self, endpoint: &str, authorization: &str, body: Vec<u8>) -> DispatchResult {
        let result = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_ENCODING, "aes128gcm")
            .header(AUTHORIZATION, authorization)
            .header("TTL", self.ttl_secs.to_string())
            .header("Urgency", self.urgency.as_str())
            .body(body)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    endpoint = %truncate_string(endpoint, MAX_LOGGED_ENDPOINT_CHARS),
                    error = %e,
                    timeout = e.is_timeout(),
                    "Push request failed"
                );
                return DispatchResult::Transport;
            }
        };

        let status = response.status().as_u16();
        let disposition = classify(status);

        match disposition {
            Disposition::Delivered => {
                debug!(status, "Push accepted");
            }
            Disposition::Gone => {
                debug!(status, "Push endpoint gone");
            }
            Disposition::Rejected => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<failed to read response body>".to_string());
                warn!(
                    endpoint = %truncate_string(endpoint, MAX_LOGGED_ENDPOINT_CHARS),
                    status,
                    body = %truncate_string(&body, MAX_LOGGED_BODY_CHARS),
                    "Push service rejected message"
                );
            }
        }

        DispatchResult::Response {
            status,
            disposition,
        }
    }
}

/// Truncate to `max_chars` characters, marking the cut with `…`.
pub fn truncate_string(input: &str, max_chars: usize) -> String {
    let mut chars = input.chars();
    let mut out: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        out.push('…');
    }
    out
}
