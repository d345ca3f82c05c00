// ── Read-only sensors ──
//
// Each sensor reads one state key at its item id and applies the unit or
// sentinel handling the cloud format requires. Sentinel raw values mean
// "reading unavailable" and map to `None`, never to an error.

use std::fmt;

use super::{EntityContext, PumpType};

// ── Temperature ─────────────────────────────────────────────────────

/// Air or water temperature, reported in °F by the controller.
pub struct TemperatureSensor {
    ctx: EntityContext,
}

impl TemperatureSensor {
    pub(crate) fn new(ctx: EntityContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &EntityContext {
        &self.ctx
    }

    /// Current temperature, converted to °C (1 decimal, half away from
    /// zero) when the backyard reports the Metric display preference.
    /// Raw `-1` and `255` are unavailable-sentinels.
    pub fn value(&self) -> Option<f64> {
        let raw = self.ctx.raw_f64()?;
        if is_sentinel(raw, -1.0) || is_sentinel(raw, 255.0) {
            return None;
        }
        if self.ctx.metric() {
            Some(fahrenheit_to_celsius(raw))
        } else {
            Some(raw)
        }
    }
}

pub(crate) fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    ((fahrenheit - 32.0) * 5.0 / 9.0 * 10.0).round() / 10.0
}

pub(crate) fn is_sentinel(value: f64, sentinel: f64) -> bool {
    (value - sentinel).abs() < f64::EPSILON
}

// ── Pump speed ──────────────────────────────────────────────────────

/// Speed reading, shaped by the pump's drive classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedReading {
    /// Variable-speed drives report a raw percentage.
    Percent(f64),
    Off,
    Low,
    High,
}

impl fmt::Display for SpeedReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percent(v) => write!(f, "{v}"),
            Self::Off => write!(f, "off"),
            Self::Low => write!(f, "low"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Filter or standalone pump speed.
pub struct PumpSpeedSensor {
    ctx: EntityContext,
    pump_type: PumpType,
}

impl PumpSpeedSensor {
    pub(crate) fn new(ctx: EntityContext, pump_type: PumpType) -> Self {
        Self { ctx, pump_type }
    }

    pub fn context(&self) -> &EntityContext {
        &self.ctx
    }

    pub fn pump_type(&self) -> PumpType {
        self.pump_type
    }

    /// Dual-speed drives classify the raw speed into bands against the
    /// record's declared min/max; anything in between is an unexpected
    /// reading and reported as unavailable.
    pub fn value(&self) -> Option<SpeedReading> {
        match self.pump_type {
            PumpType::Dual => {
                let speed = self.ctx.raw_i64()?;
                let snapshot = self.ctx.snapshot();
                let min = snapshot.field_i64(self.ctx.item_id(), "Min-Pump-Speed");
                let max = snapshot.field_i64(self.ctx.item_id(), "Max-Pump-Speed");
                if speed == 0 {
                    Some(SpeedReading::Off)
                } else if Some(speed) == min {
                    Some(SpeedReading::Low)
                } else if Some(speed) == max {
                    Some(SpeedReading::High)
                } else {
                    None
                }
            }
            PumpType::Variable | PumpType::Single => {
                self.ctx.raw_f64().map(SpeedReading::Percent)
            }
        }
    }
}

// ── Salt level ──────────────────────────────────────────────────────

/// Chlorinator salt level (average or instant), ppm natively.
pub struct SaltLevelSensor {
    ctx: EntityContext,
}

impl SaltLevelSensor {
    pub(crate) fn new(ctx: EntityContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &EntityContext {
        &self.ctx
    }

    /// Metric preference reports g/L (ppm ÷ 1000, 2 decimals).
    pub fn value(&self) -> Option<f64> {
        let raw = self.ctx.raw_f64()?;
        if self.ctx.metric() {
            Some((raw / 1000.0 * 100.0).round() / 100.0)
        } else {
            Some(raw)
        }
    }
}

// ── Chlorinator setting ─────────────────────────────────────────────

/// Chlorinator timed output percentage, raw pass-through.
pub struct ChlorinatorSettingSensor {
    ctx: EntityContext,
}

impl ChlorinatorSettingSensor {
    pub(crate) fn new(ctx: EntityContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &EntityContext {
        &self.ctx
    }

    pub fn value(&self) -> Option<f64> {
        self.ctx.raw_f64()
    }
}

// ── pH ──────────────────────────────────────────────────────────────

/// CSAD pH reading with the user calibration offset applied.
pub struct PhSensor {
    ctx: EntityContext,
}

impl PhSensor {
    pub(crate) fn new(ctx: EntityContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &EntityContext {
        &self.ctx
    }

    /// Raw `0` means the probe has no reading.
    pub fn value(&self) -> Option<f64> {
        let raw = self.ctx.raw_f64()?;
        if raw.abs() < f64::EPSILON {
            return None;
        }
        Some(raw + self.ctx.coordinator().config().ph_offset)
    }
}

// ── ORP ─────────────────────────────────────────────────────────────

/// CSAD oxidation-reduction potential, mV. Raw `-1` means no reading.
pub struct OrpSensor {
    ctx: EntityContext,
}

impl OrpSensor {
    pub(crate) fn new(ctx: EntityContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &EntityContext {
        &self.ctx
    }

    pub fn value(&self) -> Option<i64> {
        let raw = self.ctx.raw_i64()?;
        if raw == -1 { None } else { Some(raw) }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use crate::coordinator::CoordinatorConfig;
    use crate::entity::test_support::{coordinator_with, sample_tree};
    use crate::rules::specs_for;
    use crate::telemetry::{ItemId, ItemKind};

    use super::*;

    fn metric_tree() -> Value {
        let mut tree = sample_tree();
        tree["Unit-of-Measurement"] = json!("Metric");
        tree
    }

    fn temperature_sensor(tree: &Value, air_temp: &str) -> TemperatureSensor {
        let mut tree = tree.clone();
        tree["airTemp"] = json!(air_temp);
        let coordinator = coordinator_with(&tree, CoordinatorConfig::default());
        let snapshot = coordinator.snapshot();
        let id = ItemId::from_pairs([(ItemKind::Backyard, 49840)]);
        let ctx = EntityContext::new(
            &coordinator,
            &snapshot,
            &id,
            "airTemp",
            &specs_for(2, ItemKind::Backyard)[0],
        )
        .unwrap();
        TemperatureSensor::new(ctx)
    }

    #[test]
    fn fahrenheit_passes_through_for_standard_unit() {
        let sensor = temperature_sensor(&sample_tree(), "75");
        assert_eq!(sensor.value(), Some(75.0));
    }

    #[test]
    fn metric_unit_converts_and_rounds_half_away_from_zero() {
        // (75 − 32) × 5/9 = 23.888…, one decimal, half away from zero.
        let sensor = temperature_sensor(&metric_tree(), "75");
        assert_eq!(sensor.value(), Some(23.9));
    }

    #[test]
    fn sentinel_temperatures_are_unavailable() {
        assert_eq!(temperature_sensor(&sample_tree(), "255").value(), None);
        assert_eq!(temperature_sensor(&sample_tree(), "-1").value(), None);
        assert_eq!(temperature_sensor(&metric_tree(), "255").value(), None);
    }

    fn csad_context(tree: &Value, state_key: &'static str, spec_index: usize) -> EntityContext {
        let coordinator = coordinator_with(tree, CoordinatorConfig { ph_offset: 0.1, ..CoordinatorConfig::default() });
        let snapshot = coordinator.snapshot();
        let id = ItemId::from_pairs([
            (ItemKind::Backyard, 49840),
            (ItemKind::Bows, 2),
            (ItemKind::Csad, 6),
        ]);
        EntityContext::new(
            &coordinator,
            &snapshot,
            &id,
            state_key,
            &specs_for(6, ItemKind::Csad)[spec_index],
        )
        .unwrap()
    }

    #[test]
    fn ph_applies_configured_offset() {
        let sensor = PhSensor::new(csad_context(&sample_tree(), "ph", 0));
        let value = sensor.value().unwrap();
        assert!((value - 7.3).abs() < 1e-9);
    }

    #[test]
    fn ph_zero_is_unavailable() {
        let mut tree = sample_tree();
        tree["BOWS"][0]["CSAD"][0]["ph"] = json!(0);
        let sensor = PhSensor::new(csad_context(&tree, "ph", 0));
        assert_eq!(sensor.value(), None);
    }

    #[test]
    fn orp_negative_one_is_unavailable() {
        let mut tree = sample_tree();
        tree["BOWS"][0]["CSAD"][0]["orp"] = json!("-1");
        let sensor = OrpSensor::new(csad_context(&tree, "orp", 1));
        assert_eq!(sensor.value(), None);

        let live = OrpSensor::new(csad_context(&sample_tree(), "orp", 1));
        assert_eq!(live.value(), Some(650));
    }

    fn dual_speed_sensor(speed: &str) -> PumpSpeedSensor {
        let mut tree = sample_tree();
        tree["BOWS"][0]["Filter"][0]["Filter-Type"] = json!("FMT_DUAL_SPEED");
        tree["BOWS"][0]["Filter"][0]["filterSpeed"] = json!(speed);
        let coordinator = coordinator_with(&tree, CoordinatorConfig::default());
        let snapshot = coordinator.snapshot();
        let id = ItemId::from_pairs([
            (ItemKind::Backyard, 49840),
            (ItemKind::Bows, 2),
            (ItemKind::Filter, 3),
        ]);
        let record = snapshot.get(&id).unwrap().clone();
        let ctx = EntityContext::new(
            &coordinator,
            &snapshot,
            &id,
            "filterSpeed",
            &specs_for(6, ItemKind::Filter)[0],
        )
        .unwrap();
        PumpSpeedSensor::new(ctx, crate::entity::PumpType::from_record(&record))
    }

    #[test]
    fn dual_speed_classifies_into_bands() {
        // Sample filter declares Min-Pump-Speed 18, Max-Pump-Speed 100.
        assert_eq!(dual_speed_sensor("0").value(), Some(SpeedReading::Off));
        assert_eq!(dual_speed_sensor("18").value(), Some(SpeedReading::Low));
        assert_eq!(dual_speed_sensor("100").value(), Some(SpeedReading::High));
        assert_eq!(dual_speed_sensor("55").value(), None);
    }

    #[test]
    fn variable_speed_reports_raw_percent() {
        let coordinator = coordinator_with(&sample_tree(), CoordinatorConfig::default());
        let snapshot = coordinator.snapshot();
        let id = ItemId::from_pairs([
            (ItemKind::Backyard, 49840),
            (ItemKind::Bows, 2),
            (ItemKind::Filter, 3),
        ]);
        let record = snapshot.get(&id).unwrap().clone();
        let ctx = EntityContext::new(
            &coordinator,
            &snapshot,
            &id,
            "filterSpeed",
            &specs_for(6, ItemKind::Filter)[0],
        )
        .unwrap();
        let sensor = PumpSpeedSensor::new(ctx, crate::entity::PumpType::from_record(&record));
        assert_eq!(sensor.value(), Some(SpeedReading::Percent(65.0)));
    }

    #[test]
    fn salt_level_converts_to_grams_per_liter_for_metric() {
        let coordinator = coordinator_with(&metric_tree(), CoordinatorConfig::default());
        let snapshot = coordinator.snapshot();
        let id = ItemId::from_pairs([
            (ItemKind::Backyard, 49840),
            (ItemKind::Bows, 2),
            (ItemKind::Chlorinator, 5),
        ]);
        let ctx = EntityContext::new(
            &coordinator,
            &snapshot,
            &id,
            "avgSaltLevel",
            &specs_for(6, ItemKind::Chlorinator)[1],
        )
        .unwrap();
        let sensor = SaltLevelSensor::new(ctx);
        assert_eq!(sensor.value(), Some(3.1));
    }
}
