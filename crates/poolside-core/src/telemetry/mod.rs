//! Telemetry data model: item kinds, composite item identifiers, and the
//! flattened per-poll [`Snapshot`].

mod flatten;

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use strum::{Display, EnumString};

pub use flatten::flatten;

// ── ItemKind ────────────────────────────────────────────────────────

/// The closed vocabulary of kind-marker keys in the telemetry tree.
///
/// `Backyard` labels the root node only; the remaining kinds are the field
/// names under which a record nests child equipment lists. The vocabulary
/// is assumed stable across controller firmware versions -- unknown keys
/// are simply not traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum ItemKind {
    Backyard,
    #[strum(serialize = "BOWS")]
    Bows,
    Filter,
    Pumps,
    Heaters,
    Chlorinator,
    #[strum(serialize = "CSAD")]
    Csad,
    Lights,
    Relays,
}

impl ItemKind {
    /// The kinds scanned as child-list keys during flattening.
    pub const CHILD_KINDS: [ItemKind; 8] = [
        ItemKind::Bows,
        ItemKind::Filter,
        ItemKind::Pumps,
        ItemKind::Heaters,
        ItemKind::Chlorinator,
        ItemKind::Csad,
        ItemKind::Lights,
        ItemKind::Relays,
    ];

    /// The literal field name this kind appears under in the raw tree.
    pub fn key(self) -> &'static str {
        match self {
            Self::Backyard => "Backyard",
            Self::Bows => "BOWS",
            Self::Filter => "Filter",
            Self::Pumps => "Pumps",
            Self::Heaters => "Heaters",
            Self::Chlorinator => "Chlorinator",
            Self::Csad => "CSAD",
            Self::Lights => "Lights",
            Self::Relays => "Relays",
        }
    }
}

// ── ItemId ──────────────────────────────────────────────────────────

/// Composite identifier: the ordered `(kind, system-id)` path from the
/// telemetry root to a node.
///
/// System ids are normalized to `i64` at the flattening boundary (the
/// cloud serializes them both as JSON numbers and as numeric strings);
/// a node whose `systemId` is non-integral is treated as malformed and
/// skipped for storage. Positional accessors hand the same values back to
/// the command translation layer, so construction and decoding stay in
/// lockstep.
///
/// Identifier paths are unique within one snapshot and stable across
/// polls as long as the controller keeps its system-id assignments --
/// which is what lets entities retain identity (and session-local state
/// like last commanded speed) between polls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ItemId(Vec<(ItemKind, i64)>);

impl ItemId {
    /// The empty root prefix.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build an id directly from `(kind, system-id)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (ItemKind, i64)>) -> Self {
        Self(pairs.into_iter().collect())
    }

    /// A new id extended by one `(kind, system-id)` pair.
    pub fn extend(&self, kind: ItemKind, system_id: i64) -> Self {
        let mut pairs = self.0.clone();
        pairs.push((kind, system_id));
        Self(pairs)
    }

    /// Identifier length as used by the rule table: `2 × depth`, always
    /// even, counting kind labels and system ids alike.
    pub fn len(&self) -> usize {
        self.0.len() * 2
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn pairs(&self) -> &[(ItemKind, i64)] {
        &self.0
    }

    /// The node's immediate kind label (`item_id[-2]` in path terms).
    pub fn kind(&self) -> Option<ItemKind> {
        self.0.last().map(|(kind, _)| *kind)
    }

    /// The node's own system id (last path component).
    pub fn system_id(&self) -> Option<i64> {
        self.0.last().map(|(_, sid)| *sid)
    }

    /// The root (MSP / backyard) system id.
    pub fn msp_system_id(&self) -> Option<i64> {
        self.0.first().map(|(_, sid)| *sid)
    }

    /// The enclosing body-of-water system id, if this node sits under one.
    pub fn bow_system_id(&self) -> Option<i64> {
        match self.0.get(1) {
            Some((ItemKind::Bows, sid)) => Some(*sid),
            _ => None,
        }
    }

    /// The id of the root backyard node this node belongs to.
    pub fn backyard(&self) -> Option<ItemId> {
        self.0.first().map(|pair| Self(vec![*pair]))
    }

    /// The id of the enclosing body of water, if any.
    pub fn bow(&self) -> Option<ItemId> {
        match self.0.get(1) {
            Some((ItemKind::Bows, _)) => Some(Self(self.0[..2].to_vec())),
            _ => None,
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (kind, sid) in &self.0 {
            if !first {
                write!(f, "/")?;
            }
            write!(f, "{}:{sid}", kind.key())?;
            first = false;
        }
        Ok(())
    }
}

// ── Snapshot ────────────────────────────────────────────────────────

/// One poll cycle's flattened telemetry: `ItemId → record`, in traversal
/// order, plus the synthetic system-wide alarm list.
///
/// Immutable once built; the coordinator replaces the whole snapshot
/// atomically at the end of each successful poll.
#[derive(Debug, Clone)]
pub struct Snapshot {
    items: IndexMap<ItemId, Map<String, Value>>,
    system_alarms: Vec<Value>,
    captured_at: DateTime<Utc>,
}

impl Snapshot {
    pub(crate) fn new(items: IndexMap<ItemId, Map<String, Value>>, system_alarms: Vec<Value>) -> Self {
        Self {
            items,
            system_alarms,
            captured_at: Utc::now(),
        }
    }

    /// An empty snapshot (pre-first-poll placeholder).
    pub fn empty() -> Self {
        Self::new(IndexMap::new(), Vec::new())
    }

    pub fn get(&self, id: &ItemId) -> Option<&Map<String, Value>> {
        self.items.get(id)
    }

    /// Iterate records in traversal (insertion) order -- the order entity
    /// derivation observes, kept stable to avoid entity churn.
    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, &Map<String, Value>)> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// System-wide alarms reported at the tree root.
    pub fn system_alarms(&self) -> &[Value] {
        &self.system_alarms
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// A field of the record at `id`, if both exist.
    pub fn field<'a>(&'a self, id: &ItemId, key: &str) -> Option<&'a Value> {
        self.items.get(id).and_then(|record| record.get(key))
    }

    /// A field coerced to string form (telemetry scalars arrive as both
    /// JSON strings and numbers).
    pub fn field_str(&self, id: &ItemId, key: &str) -> Option<String> {
        self.field(id, key).and_then(scalar_to_string)
    }

    /// A field coerced to `f64`.
    pub fn field_f64(&self, id: &ItemId, key: &str) -> Option<f64> {
        self.field(id, key).and_then(value_as_f64)
    }

    /// A field coerced to `i64`.
    pub fn field_i64(&self, id: &ItemId, key: &str) -> Option<i64> {
        self.field(id, key).and_then(value_as_i64)
    }

    /// The first backyard (root) item id in this snapshot, if present.
    pub fn backyard_id(&self) -> Option<&ItemId> {
        self.items
            .keys()
            .find(|id| id.len() == 2 && id.kind() == Some(ItemKind::Backyard))
    }
}

// ── Scalar coercion helpers ─────────────────────────────────────────
//
// The cloud serializes most telemetry scalars as strings ("75", "yes").
// These helpers give entity code one consistent view.

pub(crate) fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
