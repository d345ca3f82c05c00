use thiserror::Error;

/// Top-level error type for the `poolside-api` crate.
///
/// Covers authentication, transport, and cloud-envelope failures.
/// `poolside-core` maps these into setup errors and poll-cycle failures.
#[derive(Debug, Error)]
pub enum ApiError {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (wrong credentials, account locked, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// No active session token (call `connect()` first).
    #[error("Not connected -- authentication required")]
    NotConnected,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Cloud API ───────────────────────────────────────────────────
    /// The cloud service returned a non-zero status envelope.
    #[error("OmniLogic API error (status {status}): {message}")]
    Api { message: String, status: i64 },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl ApiError {
    /// Returns `true` if this is a transient error worth retrying on the
    /// next poll cycle (as opposed to a credential or protocol problem).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Api { .. } => false,
            _ => false,
        }
    }

    /// Returns `true` if re-authenticating might resolve this error.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::NotConnected)
    }
}
