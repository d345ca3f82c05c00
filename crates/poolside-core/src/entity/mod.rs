//! Typed entity wrappers over the flattened telemetry.
//!
//! Each entity reads one state key out of the latest snapshot at its item
//! id and translates user actions back into positional cloud commands.
//! Session-local state (optimistic overrides, last commanded speed) lives
//! in the instances themselves, never in the snapshot.

mod binary;
mod heater;
mod light;
mod sensor;
mod switch;

use std::time::{Duration, Instant};

use serde_json::Value;

use crate::coordinator::Coordinator;
use crate::rules::EntitySpec;
use crate::telemetry::{ItemId, ItemKind, Snapshot};

pub use binary::{AlarmScope, AlarmSensor, AlarmState};
pub use heater::HeaterEntity;
pub use light::{LightEffect, LightEntity};
pub use sensor::{
    ChlorinatorSettingSensor, OrpSensor, PhSensor, PumpSpeedSensor, SaltLevelSensor, SpeedReading,
    TemperatureSensor,
};
pub use switch::{ChlorinatorSwitch, SuperchlorinateSwitch, SwitchEntity, SwitchRole};

// ── Shared entity context ───────────────────────────────────────────

/// Data common to every derived entity: the coordinator handle, the item
/// id, and the identity computed once at derivation time.
#[derive(Clone)]
pub struct EntityContext {
    coordinator: Coordinator,
    item_id: ItemId,
    state_key: &'static str,
    name: String,
    unique_id: String,
    category: &'static str,
    icon: Option<&'static str>,
    unit: Option<&'static str>,
    /// Whether the backyard reports the Metric display preference.
    metric: bool,
}

impl EntityContext {
    /// Build the context for one `(item id, state key)` binding.
    ///
    /// Returns `None` when the snapshot lacks the backyard record the
    /// naming scheme needs -- the entity is then omitted rather than
    /// derived half-formed.
    pub(crate) fn new(
        coordinator: &Coordinator,
        snapshot: &Snapshot,
        item_id: &ItemId,
        state_key: &'static str,
        spec: &EntitySpec,
    ) -> Option<Self> {
        let backyard_id = item_id.backyard()?;
        let backyard = snapshot.get(&backyard_id)?;
        let msp_system_id = item_id.msp_system_id()?;

        let backyard_name = backyard
            .get("BackyardName")
            .and_then(Value::as_str)
            .unwrap_or("Backyard");
        let metric = backyard
            .get("Unit-of-Measurement")
            .and_then(Value::as_str)
            .is_some_and(|unit| unit == "Metric");

        let mut name = backyard_name.to_owned();
        let mut unique_id = msp_system_id.to_string();

        // The bow segment is added for equipment nested under a body of
        // water, not for the bow record itself (its own name lands in the
        // equipment-name slot below).
        if let Some(bow_id) = item_id.bow().filter(|_| item_id.len() == 6) {
            if let Some(bow_system_id) = item_id.bow_system_id() {
                unique_id = format!("{unique_id}_{bow_system_id}");
            }
            if let Some(bow) = snapshot.get(&bow_id) {
                // Heaters are grouped under the virtual heater's own name
                // rather than the body of water's.
                let bow_name = if item_id.kind() == Some(ItemKind::Heaters) {
                    bow.get("Operation")
                        .and_then(|op| op.get("VirtualHeater"))
                        .and_then(|vh| vh.get("Name"))
                        .and_then(Value::as_str)
                } else {
                    bow.get("Name").and_then(Value::as_str)
                };
                if let Some(bow_name) = bow_name {
                    name = format!("{name} {bow_name}");
                }
            }
        }

        if let Some(system_id) = item_id.system_id() {
            unique_id = format!("{unique_id}_{system_id}");
        }
        unique_id = format!("{unique_id}_{}", spec.category).replace(' ', "_");

        if let Some(equipment_name) = snapshot.field_str(item_id, "Name") {
            name = format!("{name} {equipment_name}");
        }
        if !spec.name.is_empty() {
            name = format!("{name} {}", spec.name);
        }

        Some(Self {
            coordinator: coordinator.clone(),
            item_id: item_id.clone(),
            state_key,
            name,
            unique_id,
            category: spec.category,
            icon: spec.icon,
            unit: spec.unit,
            metric,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn category(&self) -> &'static str {
        self.category
    }

    pub fn icon(&self) -> Option<&'static str> {
        self.icon
    }

    pub fn unit(&self) -> Option<&'static str> {
        self.unit
    }

    pub fn item_id(&self) -> &ItemId {
        &self.item_id
    }

    /// Entity availability tracks poll health.
    pub fn available(&self) -> bool {
        self.coordinator.available()
    }

    pub(crate) fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub(crate) fn state_key(&self) -> &'static str {
        self.state_key
    }

    pub(crate) fn metric(&self) -> bool {
        self.metric
    }

    pub(crate) fn snapshot(&self) -> std::sync::Arc<Snapshot> {
        self.coordinator.snapshot()
    }

    /// The state key's current value, coerced to `f64`.
    pub(crate) fn raw_f64(&self) -> Option<f64> {
        self.snapshot().field_f64(&self.item_id, self.state_key)
    }

    /// The state key's current value, coerced to `i64`.
    pub(crate) fn raw_i64(&self) -> Option<i64> {
        self.snapshot().field_i64(&self.item_id, self.state_key)
    }
}

// ── Positional command ids ──────────────────────────────────────────

/// The `(msp, pool, equipment)` triple a control call expects, decoded
/// from an item id. Equipment without an enclosing body of water (a
/// backyard-level relay) addresses pool 0.
pub(crate) fn command_ids(item_id: &ItemId) -> Option<(i64, i64, i64)> {
    let msp = item_id.msp_system_id()?;
    let equipment = item_id.system_id()?;
    let pool = item_id.bow_system_id().unwrap_or(0);
    Some((msp, pool, equipment))
}

// ── Optimistic state window ─────────────────────────────────────────

/// Locally held commanded value, reported instead of the polled value for
/// a bounded window after a command. The cloud is slow to reflect state
/// changes; without this, a switch flips back to its stale reading for a
/// poll cycle or two after every command.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Optimistic<T> {
    window: Duration,
    held: Option<(Instant, T)>,
}

impl<T: Copy> Optimistic<T> {
    pub(crate) fn new(window: Duration) -> Self {
        Self { window, held: None }
    }

    /// Record a commanded value, opening the window.
    pub(crate) fn hold(&mut self, value: T) {
        self.held = Some((Instant::now(), value));
    }

    /// The held value while the window is open, `None` once it elapses.
    pub(crate) fn current(&self) -> Option<T> {
        match self.held {
            Some((at, value)) if at.elapsed() < self.window => Some(value),
            _ => None,
        }
    }

    #[cfg(test)]
    pub(crate) fn expire(&mut self) {
        self.held = None;
    }
}

// ── PoolEntity ──────────────────────────────────────────────────────

/// A derived entity, tagged by concrete variant.
pub enum PoolEntity {
    Temperature(TemperatureSensor),
    PumpSpeed(PumpSpeedSensor),
    SaltLevel(SaltLevelSensor),
    ChlorinatorSetting(ChlorinatorSettingSensor),
    Ph(PhSensor),
    Orp(OrpSensor),
    Alarm(AlarmSensor),
    Switch(SwitchEntity),
    ChlorinatorSwitch(ChlorinatorSwitch),
    Superchlorinate(SuperchlorinateSwitch),
    Light(LightEntity),
    Heater(HeaterEntity),
}

impl PoolEntity {
    fn context(&self) -> &EntityContext {
        match self {
            Self::Temperature(e) => e.context(),
            Self::PumpSpeed(e) => e.context(),
            Self::SaltLevel(e) => e.context(),
            Self::ChlorinatorSetting(e) => e.context(),
            Self::Ph(e) => e.context(),
            Self::Orp(e) => e.context(),
            Self::Alarm(e) => e.context(),
            Self::Switch(e) => e.context(),
            Self::ChlorinatorSwitch(e) => e.context(),
            Self::Superchlorinate(e) => e.context(),
            Self::Light(e) => e.context(),
            Self::Heater(e) => e.context(),
        }
    }

    pub fn name(&self) -> &str {
        self.context().name()
    }

    pub fn unique_id(&self) -> &str {
        self.context().unique_id()
    }

    pub fn category(&self) -> &'static str {
        self.context().category()
    }

    pub fn item_id(&self) -> &ItemId {
        self.context().item_id()
    }

    pub fn available(&self) -> bool {
        match self {
            Self::Superchlorinate(e) => e.available(),
            other => other.context().available(),
        }
    }

    /// Human-readable current value, for display surfaces.
    pub fn state_display(&self) -> Option<String> {
        match self {
            Self::Temperature(e) => e.value().map(|v| format!("{v}")),
            Self::PumpSpeed(e) => e.value().map(|v| v.to_string()),
            Self::SaltLevel(e) => e.value().map(|v| format!("{v}")),
            Self::ChlorinatorSetting(e) => e.value().map(|v| format!("{v}")),
            Self::Ph(e) => e.value().map(|v| format!("{v:.1}")),
            Self::Orp(e) => e.value().map(|v| format!("{v}")),
            Self::Alarm(e) => Some(if e.is_on() { "alarm" } else { "clear" }.to_owned()),
            Self::Switch(e) => Some(on_off(e.is_on())),
            Self::ChlorinatorSwitch(e) => Some(on_off(e.is_on())),
            Self::Superchlorinate(e) => Some(on_off(e.is_on())),
            Self::Light(e) => Some(on_off(e.is_on())),
            Self::Heater(e) => Some(on_off(e.is_on())),
        }
    }
}

fn on_off(on: bool) -> String {
    if on { "on" } else { "off" }.to_owned()
}

// ── Pump classification ─────────────────────────────────────────────

/// Pump drive classification, from the equipment-type field
/// (`Filter-Type` on filters, `Type` on standalone pumps).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpType {
    /// Raw percentage speed.
    Variable,
    /// Three discrete bands: off, low, high.
    Dual,
    /// On/off only, no speed.
    Single,
}

impl PumpType {
    /// Classify from the record's equipment-type field. Unknown type
    /// strings degrade to `Variable` (raw pass-through).
    pub(crate) fn from_record(record: &serde_json::Map<String, Value>) -> Self {
        let type_field = record
            .get("Filter-Type")
            .or_else(|| record.get("Type"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        match type_field {
            "FMT_SINGLE_SPEED" | "PMP_SINGLE_SPEED" => Self::Single,
            "FMT_DUAL_SPEED" | "PMP_DUAL_SPEED" => Self::Dual,
            _ => Self::Variable,
        }
    }
}
