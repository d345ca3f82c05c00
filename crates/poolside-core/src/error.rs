use poolside_api::ApiError;
use thiserror::Error;

/// Top-level error type for the `poolside-core` crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Credential rejection during session setup. Fatal -- not retried.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// A poll cycle failed with a non-timeout cloud error. Entities are
    /// unavailable until a subsequent successful poll.
    #[error("Telemetry poll failed: {source}")]
    PollFailed {
        #[source]
        source: ApiError,
    },

    /// Consecutive poll timeouts exceeded the recovery bound (or the very
    /// first poll timed out, leaving nothing to fall back to).
    #[error("Telemetry poll timed out ({consecutive} consecutive attempts)")]
    PollTimeout { consecutive: u32 },

    /// Command-path cloud failure.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A command parameter was out of range. Raised synchronously before
    /// any remote call is issued; values are never silently clamped.
    #[error("Invalid {field}: {reason}")]
    InvalidParameter {
        field: &'static str,
        reason: String,
    },

    /// A command needed a telemetry field the current snapshot lacks.
    #[error("Telemetry data missing: {what}")]
    MissingTelemetry { what: String },

    /// Operation requires a connected coordinator.
    #[error("Coordinator is not connected")]
    NotConnected,
}
