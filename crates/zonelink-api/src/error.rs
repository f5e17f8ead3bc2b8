use thiserror::Error;

/// Top-level error type for the `zonelink-api` crate.
///
/// Covers every failure mode across both API surfaces: authentication,
/// transport, malformed requests, server-rejected calls, and the trigger
/// port. `zonelink-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed or the access token was rejected.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Streaming/image URLs require the server to relay auth in the
    /// query string, which this server has disabled.
    #[error("Server does not allow authenticated stream URLs")]
    AuthHashDisabled,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL construction error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Server ──────────────────────────────────────────────────────
    /// The server answered with a non-success status.
    #[error("Server rejected request (HTTP {status}): {message}")]
    ServerRejected { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Trigger port ────────────────────────────────────────────────
    /// I/O error on the trigger TCP connection.
    #[error("Trigger connection error: {0}")]
    Trigger(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if this error indicates auth has expired and
    /// re-authentication might resolve it.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying on a
    /// later cycle.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::Trigger(_) => true,
            _ => false,
        }
    }
}
