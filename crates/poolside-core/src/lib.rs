//! Telemetry normalization and entity derivation for OmniLogic pool
//! controllers.
//!
//! This crate sits between `poolside-api` (the cloud RPC client) and
//! consumers (the CLI, or any host automation platform):
//!
//! - **[`telemetry`]** — the raw nested telemetry tree is flattened into a
//!   [`Snapshot`]: an insertion-ordered map from [`ItemId`] (alternating
//!   kind / system-id path) to the node's own record. Rebuilt wholesale on
//!   every poll, published atomically.
//!
//! - **[`rules`]** — a static, declarative table keyed by `(id length,
//!   node kind)`. Each [`EntitySpec`] binds telemetry state keys to entity
//!   constructors and carries guard-condition groups that suppress
//!   derivation when equipment is in an inapplicable sub-mode.
//!
//! - **[`derive`]** — walks one snapshot against the rule table and
//!   produces the concrete [`PoolEntity`] set. Runs once per session, on
//!   the first successful poll; later polls refresh values only.
//!
//! - **[`entity`]** — typed wrappers (sensors, switches, lights, heaters)
//!   that read live values out of the latest snapshot and translate user
//!   actions back into positional cloud commands. Switches and lights keep
//!   a short optimistic window after a command because the cloud is slow
//!   to reflect state.
//!
//! - **[`Coordinator`]** — session facade: authenticates, polls on a fixed
//!   interval with bounded timeout tolerance, and owns the current
//!   snapshot behind an `ArcSwap` (single writer, many readers).

pub mod coordinator;
pub mod derive;
pub mod entity;
pub mod error;
pub mod rules;
pub mod telemetry;

pub use coordinator::{Coordinator, CoordinatorConfig};
pub use derive::derive_entities;
pub use entity::PoolEntity;
pub use error::CoreError;
pub use rules::{EntityFactory, EntitySpec, excluded};
pub use telemetry::{ItemId, ItemKind, Snapshot, flatten};
