//! Static entity rule table and guard evaluation.
//!
//! Each table entry is keyed by `(identifier length, node kind)` and lists
//! the entity specifications a node of that shape can emit. One node kind
//! may emit several independent entities (a chlorinator yields an enable
//! switch, salt sensors, and an alarm sensor). Guard-condition groups
//! suppress a binding when the equipment is in a sub-mode where the state
//! key is meaningless -- e.g. a chlorinator's setting only applies when it
//! is dedicated (not shared) equipment, or in a particular operating mode.
//!
//! The table substitutes for a type hierarchy: [`EntityFactory`] tags name
//! the concrete entity variants, and a single dispatch function in
//! [`crate::derive`] resolves them.

use serde_json::{Map, Value};

use crate::telemetry::{ItemKind, scalar_to_string};

// ── Specification types ─────────────────────────────────────────────

/// What concrete entity a binding constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityFactory {
    TemperatureSensor,
    PumpSpeedSensor,
    ChlorinatorSettingSensor,
    SaltLevelSensor,
    PhSensor,
    OrpSensor,
    AlarmSensor,
    RelaySwitch,
    PumpSwitch,
    ChlorinatorSwitch,
    SuperchlorinateSwitch,
    Light,
    Heater,
}

/// One guard group: every `(field, literal)` pair must match the record
/// for the group to fire. Groups within a spec are OR'd.
pub type GuardGroup = &'static [(&'static str, &'static str)];

/// A declarative entity specification.
///
/// Immutable, defined once in the static tables below, never mutated.
#[derive(Debug, Clone, Copy)]
pub struct EntitySpec {
    /// Display-name suffix appended to the derived friendly name.
    pub name: &'static str,
    /// Category tag; also the trailing component of the unique id.
    pub category: &'static str,
    /// State key → constructor bindings. Each eligible binding yields one
    /// entity instance.
    pub bindings: &'static [(&'static str, EntityFactory)],
    /// Guard-condition groups (OR'd; fields within a group AND'd).
    pub guards: &'static [GuardGroup],
    // Presentation metadata, passed through to consumers untouched.
    pub icon: Option<&'static str>,
    pub unit: Option<&'static str>,
    pub device_class: Option<&'static str>,
    pub state_class: Option<&'static str>,
}

const fn spec(
    name: &'static str,
    category: &'static str,
    bindings: &'static [(&'static str, EntityFactory)],
    guards: &'static [GuardGroup],
) -> EntitySpec {
    EntitySpec {
        name,
        category,
        bindings,
        guards,
        icon: None,
        unit: None,
        device_class: None,
        state_class: None,
    }
}

// ── Guard evaluation ────────────────────────────────────────────────

/// Decide whether a `(state key, record)` pair is excluded from derivation.
///
/// Excluded iff the state key is absent from the record, or any non-empty
/// guard group matches the record in full. An empty guard list (or a spec
/// containing only empty groups) never excludes. Never fails on missing
/// data -- absent guard fields simply don't match.
pub fn excluded(state_key: &str, record: &Map<String, Value>, spec: &EntitySpec) -> bool {
    if !record.contains_key(state_key) {
        return true;
    }

    spec.guards.iter().any(|group| {
        !group.is_empty()
            && group
                .iter()
                .all(|(field, literal)| guard_field_matches(record.get(*field), literal))
    })
}

/// Literal comparison against a telemetry scalar, by canonical string form
/// (the cloud serializes the same field as `"0"` or `0` across firmware
/// versions).
fn guard_field_matches(value: Option<&Value>, literal: &str) -> bool {
    value
        .and_then(scalar_to_string)
        .is_some_and(|s| s == literal)
}

// ── Rule table ──────────────────────────────────────────────────────

const SHARED_AND_IDLE: GuardGroup = &[("Shared-Type", "BOW_SHARED_EQUIPMENT"), ("status", "0")];
const OPERATING_MODE_2: GuardGroup = &[("operatingMode", "2")];

const BACKYARD_SPECS: &[EntitySpec] = &[EntitySpec {
    unit: Some("°F"),
    device_class: Some("temperature"),
    state_class: Some("measurement"),
    ..spec(
        "Air Temperature",
        "air_temperature",
        &[("airTemp", EntityFactory::TemperatureSensor)],
        &[],
    )
}];

const BOW_SPECS: &[EntitySpec] = &[EntitySpec {
    unit: Some("°F"),
    device_class: Some("temperature"),
    state_class: Some("measurement"),
    ..spec(
        "Water Temperature",
        "water_temperature",
        &[("waterTemp", EntityFactory::TemperatureSensor)],
        &[],
    )
}];

const RELAY_SPECS: &[EntitySpec] = &[
    EntitySpec {
        icon: Some("mdi:electric-switch"),
        ..spec("", "relay", &[("relayState", EntityFactory::RelaySwitch)], &[])
    },
    EntitySpec {
        icon: Some("mdi:alarm-light"),
        ..spec("Alarm", "alarm", &[("Alarms", EntityFactory::AlarmSensor)], &[])
    },
];

const FILTER_SPECS: &[EntitySpec] = &[
    EntitySpec {
        icon: Some("mdi:speedometer"),
        unit: Some("%"),
        ..spec(
            "Speed",
            "filter_pump_speed",
            &[("filterSpeed", EntityFactory::PumpSpeedSensor)],
            &[&[("Filter-Type", "FMT_SINGLE_SPEED")]],
        )
    },
    EntitySpec {
        icon: Some("mdi:pump"),
        ..spec("", "pump", &[("filterState", EntityFactory::PumpSwitch)], &[])
    },
    EntitySpec {
        icon: Some("mdi:alarm-light"),
        ..spec("Alarm", "alarm", &[("Alarms", EntityFactory::AlarmSensor)], &[])
    },
];

const PUMP_SPECS: &[EntitySpec] = &[
    EntitySpec {
        icon: Some("mdi:speedometer"),
        unit: Some("%"),
        ..spec(
            "Pump Speed",
            "pump_speed",
            &[("pumpSpeed", EntityFactory::PumpSpeedSensor)],
            &[&[("Type", "PMP_SINGLE_SPEED")]],
        )
    },
    EntitySpec {
        icon: Some("mdi:pump"),
        ..spec("", "pump", &[("pumpState", EntityFactory::PumpSwitch)], &[])
    },
    EntitySpec {
        icon: Some("mdi:alarm-light"),
        ..spec(
            "Pump Alarm",
            "alarm",
            &[("Alarms", EntityFactory::AlarmSensor)],
            &[],
        )
    },
];

const CHLORINATOR_SPECS: &[EntitySpec] = &[
    EntitySpec {
        icon: Some("mdi:gauge"),
        unit: Some("%"),
        ..spec(
            "Setting",
            "chlorinator",
            &[("Timed-Percent", EntityFactory::ChlorinatorSettingSensor)],
            &[SHARED_AND_IDLE, OPERATING_MODE_2],
        )
    },
    EntitySpec {
        icon: Some("mdi:gauge"),
        unit: Some("ppm"),
        state_class: Some("measurement"),
        ..spec(
            "Average Salt Level",
            "average_salt_level",
            &[("avgSaltLevel", EntityFactory::SaltLevelSensor)],
            &[SHARED_AND_IDLE],
        )
    },
    EntitySpec {
        icon: Some("mdi:gauge"),
        unit: Some("ppm"),
        state_class: Some("measurement"),
        ..spec(
            "Instant Salt Level",
            "instant_salt_level",
            &[("instantSaltLevel", EntityFactory::SaltLevelSensor)],
            &[SHARED_AND_IDLE],
        )
    },
    EntitySpec {
        icon: Some("mdi:pool"),
        ..spec(
            "",
            "chlorinator_switch",
            &[("enable", EntityFactory::ChlorinatorSwitch)],
            &[],
        )
    },
    EntitySpec {
        icon: Some("mdi:pool-thermometer"),
        ..spec(
            "Superchlorinate",
            "superchlorinate",
            &[("scMode", EntityFactory::SuperchlorinateSwitch)],
            &[],
        )
    },
    EntitySpec {
        icon: Some("mdi:alarm-light"),
        ..spec(
            "Alarm",
            "alarm",
            &[("Alarms", EntityFactory::AlarmSensor)],
            &[SHARED_AND_IDLE, OPERATING_MODE_2],
        )
    },
];

const CSAD_SPECS: &[EntitySpec] = &[
    EntitySpec {
        icon: Some("mdi:gauge"),
        unit: Some("pH"),
        state_class: Some("measurement"),
        ..spec(
            "pH",
            "csad_ph",
            &[("ph", EntityFactory::PhSensor)],
            &[&[("ph", "")]],
        )
    },
    EntitySpec {
        icon: Some("mdi:gauge"),
        unit: Some("mV"),
        state_class: Some("measurement"),
        ..spec(
            "ORP",
            "csad_orp",
            &[("orp", EntityFactory::OrpSensor)],
            &[&[("orp", "")]],
        )
    },
    EntitySpec {
        icon: Some("mdi:alarm-light"),
        ..spec(
            "CSAD Alarm",
            "alarm",
            &[("Alarms", EntityFactory::AlarmSensor)],
            &[&[("ph", ""), ("orp", "")]],
        )
    },
];

const HEATER_SPECS: &[EntitySpec] = &[
    EntitySpec {
        icon: Some("mdi:water-boiler"),
        ..spec("Heater", "heater", &[("enable", EntityFactory::Heater)], &[])
    },
    EntitySpec {
        icon: Some("mdi:alarm-light"),
        ..spec(
            "Heater Alarm",
            "alarm",
            &[("Alarms", EntityFactory::AlarmSensor)],
            &[],
        )
    },
];

const LIGHT_SPECS: &[EntitySpec] = &[
    spec("", "lights", &[("lightState", EntityFactory::Light)], &[]),
    EntitySpec {
        icon: Some("mdi:alarm-light"),
        ..spec("Alarm", "alarm", &[("Alarms", EntityFactory::AlarmSensor)], &[])
    },
];

/// Look up the specifications for a node of the given identifier length
/// and kind. Unknown combinations yield nothing -- schema drift degrades
/// to entity omission, never an error.
pub fn specs_for(id_len: usize, kind: ItemKind) -> &'static [EntitySpec] {
    match (id_len, kind) {
        (2, ItemKind::Backyard) => BACKYARD_SPECS,
        (4, ItemKind::Bows) => BOW_SPECS,
        (4 | 6, ItemKind::Relays) => RELAY_SPECS,
        (6, ItemKind::Filter) => FILTER_SPECS,
        (6, ItemKind::Pumps) => PUMP_SPECS,
        (6, ItemKind::Chlorinator) => CHLORINATOR_SPECS,
        (6, ItemKind::Csad) => CSAD_SPECS,
        (6, ItemKind::Heaters) => HEATER_SPECS,
        (6, ItemKind::Lights) => LIGHT_SPECS,
        _ => &[],
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: serde_json::Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    const GUARDED: EntitySpec = spec(
        "Setting",
        "chlorinator",
        &[("Timed-Percent", EntityFactory::ChlorinatorSettingSensor)],
        &[SHARED_AND_IDLE, OPERATING_MODE_2],
    );

    #[test]
    fn absent_state_key_excludes() {
        let rec = record(json!({ "operatingMode": "1" }));
        assert!(excluded("Timed-Percent", &rec, &GUARDED));
    }

    #[test]
    fn matching_guard_group_excludes() {
        // Second group matches on its own; groups are OR'd.
        let rec = record(json!({ "Timed-Percent": "60", "operatingMode": "2" }));
        assert!(excluded("Timed-Percent", &rec, &GUARDED));
    }

    #[test]
    fn partially_matching_group_does_not_exclude() {
        // First group needs both fields; only one matches.
        let rec = record(json!({
            "Timed-Percent": "60",
            "Shared-Type": "BOW_SHARED_EQUIPMENT",
            "status": "1",
            "operatingMode": "1",
        }));
        assert!(!excluded("Timed-Percent", &rec, &GUARDED));
    }

    #[test]
    fn full_group_match_excludes() {
        let rec = record(json!({
            "Timed-Percent": "60",
            "Shared-Type": "BOW_SHARED_EQUIPMENT",
            "status": "0",
        }));
        assert!(excluded("Timed-Percent", &rec, &GUARDED));
    }

    #[test]
    fn empty_guard_list_never_excludes() {
        let unguarded = spec("", "relay", &[("relayState", EntityFactory::RelaySwitch)], &[]);
        let rec = record(json!({ "relayState": "1" }));
        assert!(!excluded("relayState", &rec, &unguarded));
    }

    #[test]
    fn numeric_scalars_match_string_literals() {
        let rec = record(json!({ "Timed-Percent": 60, "operatingMode": 2 }));
        assert!(excluded("Timed-Percent", &rec, &GUARDED));
    }

    #[test]
    fn single_speed_filter_speed_sensor_is_guarded_out() {
        let filter_speed = &FILTER_SPECS[0];
        let rec = record(json!({
            "filterSpeed": "0",
            "Filter-Type": "FMT_SINGLE_SPEED",
        }));
        assert!(excluded("filterSpeed", &rec, filter_speed));

        let variable = record(json!({
            "filterSpeed": "60",
            "Filter-Type": "FMT_VARIABLE_SPEED_PUMP",
        }));
        assert!(!excluded("filterSpeed", &variable, filter_speed));
    }

    #[test]
    fn rule_table_lookup_covers_both_relay_depths() {
        assert!(!specs_for(4, ItemKind::Relays).is_empty());
        assert!(!specs_for(6, ItemKind::Relays).is_empty());
        assert!(specs_for(8, ItemKind::Relays).is_empty());
        assert!(specs_for(2, ItemKind::Filter).is_empty());
    }
}
