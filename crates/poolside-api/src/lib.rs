//! Async client for the Hayward OmniLogic cloud API.
//!
//! The cloud service exposes a single RPC-style endpoint: every call posts a
//! named request with positional parameters and gets back a status envelope,
//! plus (for telemetry/config fetches) a nested JSON tree describing the
//! controller state. This crate owns transport mechanics only — the telemetry
//! tree is handed to `poolside-core` untouched for flattening and entity
//! derivation.
//!
//! - [`OmniClient`] — authenticated session with telemetry fetch and the
//!   equipment control surface (`set_relay_valve`, `set_heater_temperature`,
//!   light shows, chlorinator configuration).
//! - [`Transport`] — shared `reqwest::Client` construction (timeouts, UA).
//! - [`ApiError`] — crate-wide error taxonomy. `poolside-core` maps these
//!   into poll-cycle and setup failures.

pub mod client;
pub mod error;
pub mod transport;

pub use client::OmniClient;
pub use error::ApiError;
pub use transport::Transport;
