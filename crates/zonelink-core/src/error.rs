// ── Core error types ──
//
// User-facing errors from zonelink-core. These are NOT wire-specific --
// consumers never see HTTP status codes or JSON parse failures directly.
// The `From<zonelink_api::Error>` impl translates transport-layer errors
// into domain-appropriate variants.

use thiserror::Error;

use crate::config::MonitorId;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    /// Local precondition failure: no session attached or the session
    /// is disconnected. No network call was attempted.
    #[error("Not connected to the ZoneMinder server")]
    NotConnected,

    #[error("Cannot reach server: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Server call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Server rejected request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Command not applicable to monitor {id}: {reason}")]
    CommandNotApplicable { id: MonitorId, reason: String },

    #[error("Streaming URLs are unavailable on this server")]
    StreamingUnavailable,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<zonelink_api::Error> for CoreError {
    fn from(err: zonelink_api::Error) -> Self {
        match err {
            zonelink_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            zonelink_api::Error::AuthHashDisabled => CoreError::StreamingUnavailable,
            zonelink_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Internal(format!("transport error: {e}"))
                }
            }
            zonelink_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            zonelink_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            zonelink_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                reason: format!("TLS error: {msg}"),
            },
            zonelink_api::Error::ServerRejected { status, message } => {
                CoreError::Rejected { status, message }
            }
            zonelink_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            zonelink_api::Error::Trigger(e) => CoreError::ConnectionFailed {
                reason: format!("trigger port: {e}"),
            },
        }
    }
}
