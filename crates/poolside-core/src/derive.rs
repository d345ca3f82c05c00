//! Entity derivation: one walk of a flattened snapshot against the rule
//! table, producing the session's entity set.
//!
//! Derivation runs once, on the first successful poll. Equipment added or
//! removed at the controller afterwards is picked up on the next session,
//! not mid-flight; later polls only refresh the values entities read.

use serde_json::{Map, Value};
use tracing::debug;

use crate::coordinator::Coordinator;
use crate::entity::{
    AlarmScope, AlarmSensor, ChlorinatorSettingSensor, ChlorinatorSwitch, EntityContext,
    HeaterEntity, LightEntity, OrpSensor, PhSensor, PoolEntity, PumpSpeedSensor, PumpType,
    SaltLevelSensor, SuperchlorinateSwitch, SwitchEntity, TemperatureSensor,
};
use crate::rules::{EntityFactory, EntitySpec, excluded, specs_for};
use crate::telemetry::ItemId;

/// The system-wide alarm sensor every backyard gets, independent of the
/// per-equipment alarm bindings in the rule table.
const SYSTEM_ALARM_SPEC: EntitySpec = EntitySpec {
    name: "Alarm",
    category: "alarm",
    bindings: &[("Alarms", EntityFactory::AlarmSensor)],
    guards: &[],
    icon: Some("mdi:alarm-light"),
    unit: None,
    device_class: None,
    state_class: None,
};

/// Derive the entity set from the coordinator's current snapshot.
///
/// Walks records in traversal order, so the result is deterministic for a
/// given snapshot. Nodes the rule table doesn't know, guarded-out
/// bindings, and records too malformed to name all degrade to omission.
pub fn derive_entities(coordinator: &Coordinator) -> Vec<PoolEntity> {
    let snapshot = coordinator.snapshot();
    let mut entities = Vec::new();

    for (item_id, record) in snapshot.iter() {
        let Some(kind) = item_id.kind() else {
            continue;
        };

        for spec in specs_for(item_id.len(), kind) {
            for (state_key, factory) in spec.bindings {
                if excluded(state_key, record, spec) {
                    continue;
                }
                let Some(ctx) =
                    EntityContext::new(coordinator, &snapshot, item_id, state_key, spec)
                else {
                    continue;
                };
                entities.push(build(*factory, ctx, item_id, record));
            }
        }
    }

    // One alarm sensor watching the root-level alarm list.
    if let Some(backyard_id) = snapshot.backyard_id() {
        if let Some(ctx) = EntityContext::new(
            coordinator,
            &snapshot,
            backyard_id,
            "Alarms",
            &SYSTEM_ALARM_SPEC,
        ) {
            entities.push(PoolEntity::Alarm(AlarmSensor::new(ctx, AlarmScope::System)));
        }
    }

    debug!(count = entities.len(), "entity derivation complete");
    entities
}

fn build(
    factory: EntityFactory,
    ctx: EntityContext,
    item_id: &ItemId,
    record: &Map<String, Value>,
) -> PoolEntity {
    match factory {
        EntityFactory::TemperatureSensor => {
            PoolEntity::Temperature(TemperatureSensor::new(ctx))
        }
        EntityFactory::PumpSpeedSensor => PoolEntity::PumpSpeed(PumpSpeedSensor::new(
            ctx,
            PumpType::from_record(record),
        )),
        EntityFactory::ChlorinatorSettingSensor => {
            PoolEntity::ChlorinatorSetting(ChlorinatorSettingSensor::new(ctx))
        }
        EntityFactory::SaltLevelSensor => PoolEntity::SaltLevel(SaltLevelSensor::new(ctx)),
        EntityFactory::PhSensor => PoolEntity::Ph(PhSensor::new(ctx)),
        EntityFactory::OrpSensor => PoolEntity::Orp(OrpSensor::new(ctx)),
        EntityFactory::AlarmSensor => {
            PoolEntity::Alarm(AlarmSensor::new(ctx, AlarmScope::Item))
        }
        EntityFactory::RelaySwitch => PoolEntity::Switch(SwitchEntity::relay(ctx)),
        EntityFactory::PumpSwitch => PoolEntity::Switch(SwitchEntity::pump(ctx, record)),
        EntityFactory::ChlorinatorSwitch => {
            PoolEntity::ChlorinatorSwitch(ChlorinatorSwitch::new(ctx))
        }
        EntityFactory::SuperchlorinateSwitch => PoolEntity::Superchlorinate(
            SuperchlorinateSwitch::new(ctx, superchlorinate_operation_id(item_id, record)),
        ),
        EntityFactory::Light => PoolEntity::Light(LightEntity::new(ctx, record)),
        EntityFactory::Heater => PoolEntity::Heater(HeaterEntity::new(ctx, record)),
    }
}

/// Superchlorination is commanded against the chlorinator's operation
/// record id, falling back to the node's own id when absent.
fn superchlorinate_operation_id(item_id: &ItemId, record: &Map<String, Value>) -> i64 {
    record
        .get("Operation")
        .and_then(Value::as_array)
        .and_then(|ops| ops.first())
        .and_then(|op| op.get("System-Id"))
        .and_then(Value::as_i64)
        .or_else(|| item_id.system_id())
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::coordinator::CoordinatorConfig;
    use crate::entity::test_support::{coordinator_with, sample_tree};

    use super::*;

    fn names(entities: &[PoolEntity]) -> Vec<String> {
        entities.iter().map(|e| e.name().to_owned()).collect()
    }

    #[test]
    fn sample_backyard_derives_the_full_entity_set() {
        let coordinator = coordinator_with(&sample_tree(), CoordinatorConfig::default());
        let entities = derive_entities(&coordinator);
        let names = names(&entities);

        assert!(names.contains(&"Backyard Air Temperature".to_owned()));
        assert!(names.contains(&"Backyard Pool Water Temperature".to_owned()));
        assert!(names.contains(&"Backyard Pool Filter Pump Speed".to_owned()));
        assert!(names.contains(&"Backyard Pool Filter Pump".to_owned()));
        assert!(names.contains(&"Backyard Pool Heater Heater".to_owned()));
        assert!(names.contains(&"Backyard Pool Chlorinator Setting".to_owned()));
        assert!(names.contains(&"Backyard Pool Chlorinator Superchlorinate".to_owned()));
        assert!(names.contains(&"Backyard Pool pH".to_owned()));
        assert!(names.contains(&"Backyard Pool ORP".to_owned()));
        assert!(names.contains(&"Backyard Pool Pool Light".to_owned()));
        assert!(names.contains(&"Backyard Deck Light".to_owned()));
        // The unconditional system-wide alarm sensor.
        assert!(names.contains(&"Backyard Alarm".to_owned()));
    }

    #[test]
    fn derivation_is_deterministic() {
        let coordinator = coordinator_with(&sample_tree(), CoordinatorConfig::default());
        let first = names(&derive_entities(&coordinator));
        let second = names(&derive_entities(&coordinator));
        assert_eq!(first, second);
    }

    #[test]
    fn single_speed_filter_loses_the_speed_sensor_but_keeps_the_switch() {
        let mut tree = sample_tree();
        tree["BOWS"][0]["Filter"][0]["Filter-Type"] = json!("FMT_SINGLE_SPEED");
        let coordinator = coordinator_with(&tree, CoordinatorConfig::default());
        let names = names(&derive_entities(&coordinator));

        assert!(!names.contains(&"Backyard Pool Filter Pump Speed".to_owned()));
        assert!(names.contains(&"Backyard Pool Filter Pump".to_owned()));
        assert!(names.contains(&"Backyard Pool Filter Pump Alarm".to_owned()));
    }

    #[test]
    fn empty_ph_reading_suppresses_the_ph_sensor_only() {
        let mut tree = sample_tree();
        tree["BOWS"][0]["CSAD"][0]["ph"] = json!("");
        let coordinator = coordinator_with(&tree, CoordinatorConfig::default());
        let names = names(&derive_entities(&coordinator));

        assert!(!names.contains(&"Backyard Pool pH".to_owned()));
        assert!(names.contains(&"Backyard Pool ORP".to_owned()));
        assert!(names.contains(&"Backyard Pool CSAD Alarm".to_owned()));
    }

    #[test]
    fn unique_ids_are_distinct_across_the_set() {
        let coordinator = coordinator_with(&sample_tree(), CoordinatorConfig::default());
        let entities = derive_entities(&coordinator);
        let mut ids: Vec<&str> = entities.iter().map(PoolEntity::unique_id).collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn superchlorinate_uses_the_operation_record_id() {
        let tree = sample_tree();
        let record = tree["BOWS"][0]["Chlorinator"][0].as_object().unwrap();
        let id = ItemId::from_pairs([
            (crate::telemetry::ItemKind::Backyard, 49840),
            (crate::telemetry::ItemKind::Bows, 2),
            (crate::telemetry::ItemKind::Chlorinator, 5),
        ]);
        assert_eq!(superchlorinate_operation_id(&id, record), 15);

        let mut without = record.clone();
        without.remove("Operation");
        assert_eq!(superchlorinate_operation_id(&id, &without), 5);
    }
}
