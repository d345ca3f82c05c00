// ── Telemetry flattener ──
//
// Recursive depth-first walk of the raw nested telemetry tree, producing
// the flat ItemId → record mapping the rest of the crate consumes. This
// must never fail on well-formed input: missing or malformed fields mean
// a node is skipped for storage, never an error.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::{ItemId, ItemKind, Snapshot, value_as_i64};

/// Flatten a raw telemetry tree into a [`Snapshot`].
///
/// The root node is walked under the `Backyard` kind label with an empty
/// identifier prefix. The root-level `Alarms` list (system-wide alarms, as
/// opposed to the per-equipment `Alarms` fields) is lifted out into the
/// snapshot's synthetic alarm slot.
pub fn flatten(raw: &Value) -> Snapshot {
    let mut items = IndexMap::new();
    walk(raw, ItemKind::Backyard, &ItemId::root(), &mut items);

    let system_alarms = raw
        .get("Alarms")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Snapshot::new(items, system_alarms)
}

fn walk(
    node: &Value,
    kind: ItemKind,
    prefix: &ItemId,
    out: &mut IndexMap<ItemId, Map<String, Value>>,
) {
    match node {
        // A list holds sibling records of the same kind; each element
        // extends the identifier independently once its own system id is
        // discovered below.
        Value::Array(elements) => {
            for element in elements {
                walk(element, kind, prefix, out);
            }
        }
        Value::Object(record) => {
            // A record with an integral system id is stored under the
            // extended identifier, which also becomes the prefix for its
            // children. Id-less records are traversed but not stored.
            let current = match record.get("systemId").and_then(value_as_i64) {
                Some(system_id) => {
                    let id = prefix.extend(kind, system_id);
                    out.insert(id.clone(), record.clone());
                    id
                }
                None => prefix.clone(),
            };

            for child_kind in ItemKind::CHILD_KINDS {
                if let Some(child) = record.get(child_kind.key()) {
                    walk(child, child_kind, &current, out);
                }
            }
        }
        // Scalars carry no structure.
        _ => {}
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn sample_tree() -> Value {
        json!({
            "systemId": 49840,
            "BackyardName": "Backyard",
            "airTemp": "75",
            "Unit-of-Measurement": "Standard",
            "Alarms": [{ "Message": "Low flow", "Comment": "check skimmer" }],
            "BOWS": [
                {
                    "systemId": 12,
                    "Name": "Pool",
                    "waterTemp": "82",
                    "Filter": [
                        {
                            "systemId": 3,
                            "Name": "Filter Pump",
                            "Filter-Type": "FMT_VARIABLE_SPEED_PUMP",
                            "filterSpeed": "65",
                            "filterState": "1",
                            "Alarms": []
                        }
                    ],
                    "Chlorinator": [
                        {
                            "systemId": 9,
                            "Name": "Chlorinator",
                            "operatingMode": "1",
                            "Timed-Percent": "60",
                            "enable": "1",
                            "Alarms": []
                        }
                    ]
                }
            ],
            "Relays": [
                { "systemId": 5, "Name": "Deck Light", "relayState": "0", "Alarms": [] }
            ]
        })
    }

    #[test]
    fn every_node_with_system_id_appears_exactly_once() {
        let snapshot = flatten(&sample_tree());
        assert_eq!(snapshot.len(), 5);

        let backyard = ItemId::from_pairs([(ItemKind::Backyard, 49840)]);
        let bow = backyard.extend(ItemKind::Bows, 12);
        let filter = bow.extend(ItemKind::Filter, 3);
        let chlor = bow.extend(ItemKind::Chlorinator, 9);
        let relay = backyard.extend(ItemKind::Relays, 5);

        for id in [&backyard, &bow, &filter, &chlor, &relay] {
            assert!(snapshot.get(id).is_some(), "missing {id}");
        }
    }

    #[test]
    fn identifier_lengths_are_even_and_kinds_alternate_with_nesting() {
        let snapshot = flatten(&sample_tree());
        for (id, _) in snapshot.iter() {
            assert_eq!(id.len() % 2, 0);
            // Every path starts at the backyard root.
            assert_eq!(id.pairs()[0].0, ItemKind::Backyard);
        }

        let filter = ItemId::from_pairs([
            (ItemKind::Backyard, 49840),
            (ItemKind::Bows, 12),
            (ItemKind::Filter, 3),
        ]);
        assert_eq!(snapshot.get(&filter).unwrap()["Name"], "Filter Pump");
    }

    #[test]
    fn flattening_is_idempotent() {
        let tree = sample_tree();
        let first = flatten(&tree);
        let second = flatten(&tree);

        assert_eq!(first.len(), second.len());
        for ((id_a, record_a), (id_b, record_b)) in first.iter().zip(second.iter()) {
            assert_eq!(id_a, id_b);
            assert_eq!(record_a, record_b);
        }
    }

    #[test]
    fn records_keep_raw_child_lists_in_place() {
        // Consumers index past nested lists; the flattener does not strip
        // them from the stored record.
        let snapshot = flatten(&sample_tree());
        let backyard = ItemId::from_pairs([(ItemKind::Backyard, 49840)]);
        assert!(snapshot.get(&backyard).unwrap().contains_key("BOWS"));
    }

    #[test]
    fn string_system_ids_are_normalized() {
        let tree = json!({
            "systemId": "77",
            "BackyardName": "Backyard",
        });
        let snapshot = flatten(&tree);
        let id = ItemId::from_pairs([(ItemKind::Backyard, 77)]);
        assert!(snapshot.get(&id).is_some());
    }

    #[test]
    fn id_less_nodes_are_traversed_but_not_stored() {
        let tree = json!({
            "BackyardName": "No id here",
            "BOWS": [
                { "systemId": 2, "Name": "Pool" }
            ]
        });
        let snapshot = flatten(&tree);
        // The root was skipped, but its child was reached with the empty
        // prefix still in effect.
        assert_eq!(snapshot.len(), 1);
        let bow = ItemId::from_pairs([(ItemKind::Bows, 2)]);
        assert!(snapshot.get(&bow).is_some());
    }

    #[test]
    fn malformed_system_id_skips_storage() {
        let tree = json!({
            "systemId": "not-a-number",
            "BOWS": [{ "systemId": 2 }]
        });
        let snapshot = flatten(&tree);
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn root_alarm_list_becomes_the_synthetic_key() {
        let snapshot = flatten(&sample_tree());
        assert_eq!(snapshot.system_alarms().len(), 1);
        assert_eq!(snapshot.system_alarms()[0]["Message"], "Low flow");

        let no_alarms = flatten(&json!({ "systemId": 1 }));
        assert!(no_alarms.system_alarms().is_empty());
    }

    #[test]
    fn sibling_lists_nested_directly_under_a_list_are_handled() {
        // A same-kind list directly wrapping records: list recursion runs
        // before any prefix extension is committed.
        let tree = json!({
            "systemId": 1,
            "BOWS": [
                [
                    { "systemId": 2, "Name": "Pool" },
                    { "systemId": 3, "Name": "Spa" }
                ]
            ]
        });
        let snapshot = flatten(&tree);
        assert_eq!(snapshot.len(), 3);
        let spa = ItemId::from_pairs([(ItemKind::Backyard, 1), (ItemKind::Bows, 3)]);
        assert_eq!(snapshot.get(&spa).unwrap()["Name"], "Spa");
    }
}
