//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use poolside_config::ConfigError;
use poolside_core::CoreError;

/// Exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(poolside::auth_failed),
        help(
            "Verify your OmniLogic account credentials.\n\
             Set username/password in the config file, or export\n\
             POOLSIDE_USERNAME and POOLSIDE_PASSWORD."
        )
    )]
    AuthFailed { message: String },

    #[error("Could not fetch telemetry from the OmniLogic cloud")]
    #[diagnostic(
        code(poolside::poll_failed),
        help("Check your network connection and https://status.hayward.com outages.")
    )]
    PollFailed {
        #[source]
        source: poolside_api::ApiError,
    },

    #[error("Telemetry polling timed out ({consecutive} consecutive timeouts)")]
    #[diagnostic(
        code(poolside::poll_timeout),
        help("The cloud service is slow or unreachable; try again shortly.")
    )]
    PollTimeout { consecutive: u32 },

    #[error("Invalid {field}: {reason}")]
    #[diagnostic(code(poolside::invalid_parameter))]
    InvalidParameter { field: String, reason: String },

    #[error("No entity with unique id '{unique_id}'")]
    #[diagnostic(
        code(poolside::entity_not_found),
        help("Run `poolside entities` to list unique ids.")
    )]
    EntityNotFound { unique_id: String },

    #[error("Entity '{unique_id}' does not accept this command")]
    #[diagnostic(
        code(poolside::not_settable),
        help("Check the entity's category with `poolside entities`.")
    )]
    NotSettable { unique_id: String },

    #[error(transparent)]
    #[diagnostic(code(poolside::config))]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(code(poolside::core))]
    Core(CoreError),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::PollFailed { .. } => exit_code::CONNECTION,
            Self::PollTimeout { .. } => exit_code::TIMEOUT,
            Self::InvalidParameter { .. } | Self::NotSettable { .. } => exit_code::USAGE,
            Self::EntityNotFound { .. } => exit_code::NOT_FOUND,
            Self::Config(_) | Self::Core(_) => exit_code::GENERAL,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Authentication { message } => Self::AuthFailed { message },
            CoreError::PollFailed { source } => Self::PollFailed { source },
            CoreError::PollTimeout { consecutive } => Self::PollTimeout { consecutive },
            CoreError::InvalidParameter { field, reason } => Self::InvalidParameter {
                field: field.to_owned(),
                reason,
            },
            other => Self::Core(other),
        }
    }
}
