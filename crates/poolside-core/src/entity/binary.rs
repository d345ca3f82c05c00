// ── Alarm binary sensors ──

use serde_json::Value;

use super::EntityContext;

/// Where an alarm sensor reads its alarm list from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmScope {
    /// The `Alarms` field of the record at the entity's item id.
    Item,
    /// The synthetic system-wide alarm list lifted out of the tree root.
    System,
}

/// The first active alarm, exposed as entity attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmState {
    pub message: String,
    pub comment: Option<String>,
}

/// On iff the watched alarm list is non-empty.
pub struct AlarmSensor {
    ctx: EntityContext,
    scope: AlarmScope,
}

impl AlarmSensor {
    pub(crate) fn new(ctx: EntityContext, scope: AlarmScope) -> Self {
        Self { ctx, scope }
    }

    pub fn context(&self) -> &EntityContext {
        &self.ctx
    }

    pub fn scope(&self) -> AlarmScope {
        self.scope
    }

    fn alarms(&self) -> Vec<Value> {
        let snapshot = self.ctx.snapshot();
        match self.scope {
            AlarmScope::Item => snapshot
                .field(self.ctx.item_id(), self.ctx.state_key())
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            AlarmScope::System => snapshot.system_alarms().to_vec(),
        }
    }

    pub fn is_on(&self) -> bool {
        !self.alarms().is_empty()
    }

    /// The first active alarm's message and comment, if any.
    pub fn first_alarm(&self) -> Option<AlarmState> {
        let alarms = self.alarms();
        let first = alarms.first()?;
        Some(AlarmState {
            message: first
                .get("Message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            comment: first
                .get("Comment")
                .and_then(Value::as_str)
                .map(str::to_owned),
        })
    }
}
