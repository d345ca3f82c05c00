// Shared transport configuration for building reqwest::Client instances.
//
// The cloud endpoint is plain HTTPS with system roots; the only knob that
// matters in practice is the per-request timeout, which the poll loop also
// uses as its fetch deadline.

use std::time::Duration;

use crate::error::ApiError;

/// Transport configuration for the OmniLogic cloud client.
#[derive(Debug, Clone)]
pub struct Transport {
    pub timeout: Duration,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

impl Transport {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, ApiError> {
        Ok(reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("poolside/", env!("CARGO_PKG_VERSION")))
            .build()?)
    }
}
