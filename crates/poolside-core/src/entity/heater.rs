// ── Water heater ──
//
// A heater node is commanded through its bow's virtual heater, not its
// own system id. The virtual heater's id is resolved once at derivation
// time; set points, bounds, and readings stay in °F, the scale the cloud
// stores set points in regardless of the display preference.

use serde_json::Value;

use crate::error::CoreError;

use super::{EntityContext, command_ids};

pub struct HeaterEntity {
    ctx: EntityContext,
    /// The virtual heater's system id, the target of heater commands.
    equipment_id: i64,
}

impl HeaterEntity {
    pub(crate) fn new(ctx: EntityContext, record: &serde_json::Map<String, Value>) -> Self {
        let equipment_id = record
            .get("Operation")
            .and_then(|op| op.pointer("/VirtualHeater/systemId"))
            .and_then(Value::as_i64)
            .or_else(|| ctx.item_id().system_id())
            .unwrap_or_default();
        Self { ctx, equipment_id }
    }

    pub fn context(&self) -> &EntityContext {
        &self.ctx
    }

    /// Whether heating is enabled, from the bow-level virtual heater.
    pub fn is_on(&self) -> bool {
        let Some(bow_id) = self.ctx.item_id().bow() else {
            return false;
        };
        self.ctx
            .snapshot()
            .field(&bow_id, "VirtualHeater")
            .and_then(|vh| vh.get("enable"))
            .and_then(Value::as_str)
            .is_some_and(|enable| enable == "yes")
    }

    /// Whether the burner is actually firing right now.
    pub fn is_heating(&self) -> bool {
        self.ctx
            .snapshot()
            .field_i64(self.ctx.item_id(), "heaterState")
            .unwrap_or(0)
            != 0
    }

    pub fn target_temperature(&self) -> Option<f64> {
        self.virtual_heater_f64("Current-Set-Point")
    }

    pub fn min_temperature(&self) -> Option<f64> {
        self.virtual_heater_f64("Min-Settable-Water-Temp")
    }

    pub fn max_temperature(&self) -> Option<f64> {
        self.virtual_heater_f64("Max-Settable-Water-Temp")
    }

    /// The enclosing body of water's current temperature.
    pub fn current_temperature(&self) -> Option<f64> {
        let bow_id = self.ctx.item_id().bow()?;
        self.ctx.snapshot().field_f64(&bow_id, "waterTemp")
    }

    /// Change the set point. Values outside the heater's declared
    /// settable range are rejected without a cloud call; a heater that
    /// declares no bounds accepts any value.
    pub async fn set_temperature(&mut self, temperature: f64) -> Result<(), CoreError> {
        let below = self
            .min_temperature()
            .is_some_and(|min| temperature < min);
        let above = self
            .max_temperature()
            .is_some_and(|max| temperature > max);
        if below || above {
            return Err(CoreError::InvalidParameter {
                field: "temperature",
                reason: format!(
                    "{temperature} is outside the settable range {:?}..{:?}",
                    self.min_temperature(),
                    self.max_temperature()
                ),
            });
        }

        let (msp, pool, _) = self.ids()?;
        #[allow(clippy::cast_possible_truncation)]
        let set_point = temperature.round() as i64;
        self.ctx
            .coordinator()
            .client()
            .set_heater_temperature(msp, pool, self.equipment_id, set_point)
            .await?;
        Ok(())
    }

    /// Enable or disable heating.
    pub async fn set_enabled(&mut self, enabled: bool) -> Result<(), CoreError> {
        let (msp, pool, _) = self.ids()?;
        self.ctx
            .coordinator()
            .client()
            .set_heater_enable(msp, pool, self.equipment_id, enabled)
            .await?;
        Ok(())
    }

    fn virtual_heater_f64(&self, field: &str) -> Option<f64> {
        let snapshot = self.ctx.snapshot();
        let value = snapshot
            .field(self.ctx.item_id(), "Operation")?
            .pointer(&format!("/VirtualHeater/{field}"))?
            .clone();
        crate::telemetry::value_as_f64(&value)
    }

    fn ids(&self) -> Result<(i64, i64, i64), CoreError> {
        command_ids(self.ctx.item_id()).ok_or_else(|| CoreError::MissingTelemetry {
            what: format!("positional ids for {}", self.ctx.item_id()),
        })
    }
}
