// ── Switches ──
//
// Relay/valve circuits, filter and standalone pumps, and the chlorinator
// controls. All command translations decode the positional ids back out
// of the entity's item id; parameter validation happens here, before any
// remote call, and never clamps.

use std::time::Duration;

use serde_json::Value;

use crate::error::CoreError;

use super::{EntityContext, Optimistic, PumpType, command_ids};

const SWITCH_STATE_DELAY: Duration = Duration::from_secs(30);

/// The cloud occasionally reports this magic state for a circuit that is
/// actually off.
const SWITCH_STATE_OFF_QUIRK: i64 = 7;

const CHLOR_CFG_STATE_ON: u8 = 3;
const CHLOR_CFG_STATE_OFF: u8 = 2;

// ── Relay / pump switch ─────────────────────────────────────────────

/// What a [`SwitchEntity`] drives.
pub enum SwitchRole {
    /// Plain on/off circuit (relay or valve actuator).
    Relay,
    /// Filter or standalone pump. Non-single-speed pumps restore the last
    /// commanded speed on turn-on.
    Pump {
        pump_type: PumpType,
        min_speed: u32,
        max_speed: u32,
        last_speed: Option<u32>,
    },
}

pub struct SwitchEntity {
    ctx: EntityContext,
    role: SwitchRole,
    optimistic: Optimistic<bool>,
}

impl SwitchEntity {
    pub(crate) fn relay(ctx: EntityContext) -> Self {
        Self {
            ctx,
            role: SwitchRole::Relay,
            optimistic: Optimistic::new(SWITCH_STATE_DELAY),
        }
    }

    pub(crate) fn pump(ctx: EntityContext, record: &serde_json::Map<String, Value>) -> Self {
        let pump_type = PumpType::from_record(record);
        let min_speed = speed_field(record, "Min-Pump-Speed").unwrap_or(0);
        let max_speed = speed_field(record, "Max-Pump-Speed").unwrap_or(100);
        Self {
            ctx,
            role: SwitchRole::Pump {
                pump_type,
                min_speed,
                max_speed,
                last_speed: None,
            },
            optimistic: Optimistic::new(SWITCH_STATE_DELAY),
        }
    }

    pub fn context(&self) -> &EntityContext {
        &self.ctx
    }

    pub fn role(&self) -> &SwitchRole {
        &self.role
    }

    /// Current state: the optimistically held value while the command
    /// window is open, the polled value afterwards.
    pub fn is_on(&self) -> bool {
        if let Some(held) = self.optimistic.current() {
            return held;
        }
        let raw = self.ctx.raw_i64().unwrap_or(0);
        raw != 0 && raw != SWITCH_STATE_OFF_QUIRK
    }

    pub async fn turn_on(&mut self) -> Result<(), CoreError> {
        let (msp, pool, equipment) = self.ids()?;

        let on_value = match &self.role {
            SwitchRole::Relay => 1,
            SwitchRole::Pump {
                pump_type,
                last_speed,
                ..
            } => match (pump_type, last_speed) {
                (PumpType::Single, _) | (_, None) => 100,
                (_, Some(speed)) => *speed,
            },
        };

        self.ctx
            .coordinator()
            .client()
            .set_relay_valve(msp, pool, equipment, on_value)
            .await?;
        self.optimistic.hold(true);
        Ok(())
    }

    pub async fn turn_off(&mut self) -> Result<(), CoreError> {
        let (msp, pool, equipment) = self.ids()?;

        // Remember the running speed so the next turn-on restores it.
        if let SwitchRole::Pump {
            pump_type,
            last_speed,
            ..
        } = &mut self.role
        {
            if *pump_type != PumpType::Single {
                let snapshot = self.ctx.coordinator().snapshot();
                let current = snapshot
                    .field_i64(self.ctx.item_id(), "filterSpeed")
                    .or_else(|| snapshot.field_i64(self.ctx.item_id(), "pumpSpeed"));
                if let Some(speed) = current.and_then(|s| u32::try_from(s).ok()) {
                    *last_speed = Some(speed);
                }
            }
        }

        self.ctx
            .coordinator()
            .client()
            .set_relay_valve(msp, pool, equipment, 0)
            .await?;
        self.optimistic.hold(false);
        Ok(())
    }

    /// Set a pump speed. Rejected synchronously for single-speed pumps
    /// and for speeds outside the equipment's declared range.
    pub async fn set_speed(&mut self, speed: u32) -> Result<(), CoreError> {
        let SwitchRole::Pump {
            pump_type,
            min_speed,
            max_speed,
            last_speed,
        } = &mut self.role
        else {
            return Err(CoreError::InvalidParameter {
                field: "speed",
                reason: "equipment is not a pump".into(),
            });
        };

        if *pump_type == PumpType::Single {
            return Err(CoreError::InvalidParameter {
                field: "speed",
                reason: "single-speed pumps have no adjustable speed".into(),
            });
        }
        if speed < *min_speed || speed > *max_speed {
            return Err(CoreError::InvalidParameter {
                field: "speed",
                reason: format!(
                    "{speed} is outside the pump range {}..={}",
                    *min_speed, *max_speed
                ),
            });
        }

        *last_speed = Some(speed);
        let (msp, pool, equipment) = self.ids()?;
        self.ctx
            .coordinator()
            .client()
            .set_relay_valve(msp, pool, equipment, speed)
            .await?;
        Ok(())
    }

    fn ids(&self) -> Result<(i64, i64, i64), CoreError> {
        command_ids(self.ctx.item_id()).ok_or_else(|| CoreError::MissingTelemetry {
            what: format!("positional ids for {}", self.ctx.item_id()),
        })
    }

    #[cfg(test)]
    pub(crate) fn expire_optimistic(&mut self) {
        self.optimistic.expire();
    }
}

fn speed_field(record: &serde_json::Map<String, Value>, key: &str) -> Option<u32> {
    record
        .get(key)
        .and_then(crate::telemetry::value_as_i64)
        .and_then(|v| u32::try_from(v).ok())
}

// ── Chlorinator switch ──────────────────────────────────────────────

/// Chlorinator enable/disable plus the timed-percent setter.
pub struct ChlorinatorSwitch {
    ctx: EntityContext,
    optimistic: Optimistic<bool>,
}

impl ChlorinatorSwitch {
    pub(crate) fn new(ctx: EntityContext) -> Self {
        Self {
            ctx,
            optimistic: Optimistic::new(SWITCH_STATE_DELAY),
        }
    }

    pub fn context(&self) -> &EntityContext {
        &self.ctx
    }

    pub fn is_on(&self) -> bool {
        if let Some(held) = self.optimistic.current() {
            return held;
        }
        self.ctx.raw_i64().unwrap_or(0) != 0
    }

    pub async fn turn_on(&mut self) -> Result<(), CoreError> {
        self.set_cfg_state(CHLOR_CFG_STATE_ON).await?;
        self.optimistic.hold(true);
        Ok(())
    }

    pub async fn turn_off(&mut self) -> Result<(), CoreError> {
        self.set_cfg_state(CHLOR_CFG_STATE_OFF).await?;
        self.optimistic.hold(false);
        Ok(())
    }

    /// Set the chlorinator's timed output percentage (0..=100).
    pub async fn set_timed_percent(&self, percent: u8) -> Result<(), CoreError> {
        if percent > 100 {
            return Err(CoreError::InvalidParameter {
                field: "timed_percent",
                reason: format!("{percent} is outside 0..=100"),
            });
        }
        let (pool, chlor) = self.pool_and_chlor()?;
        self.ctx
            .coordinator()
            .client()
            .set_chlorinator_params(pool, chlor, None, Some(percent))
            .await?;
        Ok(())
    }

    async fn set_cfg_state(&self, cfg_state: u8) -> Result<(), CoreError> {
        let (pool, chlor) = self.pool_and_chlor()?;
        self.ctx
            .coordinator()
            .client()
            .set_chlorinator_params(pool, chlor, Some(cfg_state), None)
            .await?;
        Ok(())
    }

    fn pool_and_chlor(&self) -> Result<(i64, i64), CoreError> {
        let (_, pool, chlor) =
            command_ids(self.ctx.item_id()).ok_or_else(|| CoreError::MissingTelemetry {
                what: format!("positional ids for {}", self.ctx.item_id()),
            })?;
        Ok((pool, chlor))
    }
}

// ── Superchlorinate switch ──────────────────────────────────────────

/// Superchlorination toggle. Addressed by the chlorinator's operation
/// system id rather than the node's own, and only available while the
/// parent chlorinator is running.
pub struct SuperchlorinateSwitch {
    ctx: EntityContext,
    operation_id: i64,
    optimistic: Optimistic<bool>,
}

impl SuperchlorinateSwitch {
    pub(crate) fn new(ctx: EntityContext, operation_id: i64) -> Self {
        Self {
            ctx,
            operation_id,
            optimistic: Optimistic::new(SWITCH_STATE_DELAY),
        }
    }

    pub fn context(&self) -> &EntityContext {
        &self.ctx
    }

    fn operating_mode(&self) -> String {
        self.ctx
            .snapshot()
            .field_str(self.ctx.item_id(), "operatingMode")
            .unwrap_or_else(|| "0".to_owned())
    }

    pub fn available(&self) -> bool {
        self.ctx.available() && self.operating_mode() != "0"
    }

    pub fn is_on(&self) -> bool {
        if let Some(held) = self.optimistic.current() {
            return held;
        }
        self.ctx.raw_i64().unwrap_or(0) != 0
    }

    pub async fn turn_on(&mut self) -> Result<(), CoreError> {
        let (msp, pool, _) = self.ids()?;

        // The parent chlorinator must be running first.
        if self.operating_mode() == "0" {
            self.ctx
                .coordinator()
                .client()
                .set_equipment(pool, self.operation_id, true)
                .await?;
        }

        self.ctx
            .coordinator()
            .client()
            .set_superchlorination(msp, pool, self.operation_id, true)
            .await?;
        self.optimistic.hold(true);
        Ok(())
    }

    pub async fn turn_off(&mut self) -> Result<(), CoreError> {
        let (msp, pool, _) = self.ids()?;
        self.ctx
            .coordinator()
            .client()
            .set_superchlorination(msp, pool, self.operation_id, false)
            .await?;
        self.optimistic.hold(false);
        Ok(())
    }

    fn ids(&self) -> Result<(i64, i64, i64), CoreError> {
        command_ids(self.ctx.item_id()).ok_or_else(|| CoreError::MissingTelemetry {
            what: format!("positional ids for {}", self.ctx.item_id()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use poolside_api::OmniClient;

    use crate::coordinator::{Coordinator, CoordinatorConfig};
    use crate::entity::test_support::{coordinator_with, sample_tree};
    use crate::rules::specs_for;
    use crate::telemetry::{ItemId, ItemKind, flatten};

    use super::*;

    fn filter_id() -> ItemId {
        ItemId::from_pairs([
            (ItemKind::Backyard, 49840),
            (ItemKind::Bows, 2),
            (ItemKind::Filter, 3),
        ])
    }

    fn pump_switch(coordinator: &Coordinator) -> SwitchEntity {
        let snapshot = coordinator.snapshot();
        let id = filter_id();
        let record = snapshot.get(&id).unwrap().clone();
        let ctx = EntityContext::new(
            coordinator,
            &snapshot,
            &id,
            "filterState",
            &specs_for(6, ItemKind::Filter)[1],
        )
        .unwrap();
        SwitchEntity::pump(ctx, &record)
    }

    /// Coordinator wired to a mock cloud that accepts every command.
    async fn connected_coordinator(server: &MockServer) -> Coordinator {
        Mock::given(method("POST"))
            .and(path("/api/v1/rpc"))
            .and(body_partial_json(json!({ "Name": "Login" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Status": 0, "Token": "tok", "UserID": 99
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/rpc"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "Status": 0 })),
            )
            .mount(server)
            .await;

        let url = Url::parse(&format!("{}/api/v1", server.uri())).unwrap();
        let client = OmniClient::with_client(reqwest::Client::new(), url);
        client
            .connect("user", &SecretString::from("pass"))
            .await
            .unwrap();

        let coordinator = Coordinator::new(client, CoordinatorConfig::default());
        coordinator.inject_snapshot(flatten(&sample_tree()));
        coordinator
    }

    #[tokio::test]
    async fn optimistic_window_overrides_the_polled_value() {
        let server = MockServer::start().await;
        let coordinator = connected_coordinator(&server).await;

        let mut tree = sample_tree();
        tree["BOWS"][0]["Filter"][0]["filterState"] = json!("0");
        coordinator.inject_snapshot(flatten(&tree));

        let mut switch = pump_switch(&coordinator);
        assert!(!switch.is_on());

        switch.turn_on().await.unwrap();
        // Snapshot still says off; the held value wins inside the window.
        assert!(switch.is_on());

        switch.expire_optimistic();
        assert!(!switch.is_on());
    }

    #[tokio::test]
    async fn turn_on_restores_the_last_commanded_speed() {
        let server = MockServer::start().await;
        let coordinator = connected_coordinator(&server).await;
        let mut switch = pump_switch(&coordinator);

        // turn_off records the running speed (65 in the sample tree)...
        switch.turn_off().await.unwrap();
        match switch.role() {
            SwitchRole::Pump { last_speed, .. } => assert_eq!(*last_speed, Some(65)),
            SwitchRole::Relay => panic!("expected a pump"),
        }

        // ...and turn_on sends it back instead of the 100 default.
        server.reset().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/rpc"))
            .and(body_partial_json(json!({ "Parameters": { "IsOn": 65 } })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "Status": 0 })),
            )
            .expect(1)
            .mount(&server)
            .await;
        switch.turn_on().await.unwrap();
    }

    #[tokio::test]
    async fn out_of_range_speed_is_rejected_before_any_remote_call() {
        // The dummy client would fail with NotConnected if a call were
        // attempted; InvalidParameter proves validation ran first.
        let coordinator = coordinator_with(&sample_tree(), CoordinatorConfig::default());
        let mut switch = pump_switch(&coordinator);

        // Sample filter range is 18..=100.
        let below = switch.set_speed(10).await.unwrap_err();
        assert!(matches!(below, CoreError::InvalidParameter { field: "speed", .. }));
        let above = switch.set_speed(120).await.unwrap_err();
        assert!(matches!(above, CoreError::InvalidParameter { field: "speed", .. }));
    }

    #[tokio::test]
    async fn single_speed_pump_rejects_set_speed() {
        let mut tree = sample_tree();
        tree["BOWS"][0]["Filter"][0]["Filter-Type"] = json!("FMT_SINGLE_SPEED");
        let coordinator = coordinator_with(&tree, CoordinatorConfig::default());
        let mut switch = pump_switch(&coordinator);

        let err = switch.set_speed(50).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidParameter { field: "speed", .. }));
    }

    #[test]
    fn off_quirk_state_reads_as_off() {
        let mut tree = sample_tree();
        tree["BOWS"][0]["Filter"][0]["filterState"] = json!("7");
        let coordinator = coordinator_with(&tree, CoordinatorConfig::default());
        let switch = pump_switch(&coordinator);
        assert!(!switch.is_on());
    }

    #[tokio::test]
    async fn chlorinator_timed_percent_is_range_checked() {
        let coordinator = coordinator_with(&sample_tree(), CoordinatorConfig::default());
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
            "enable",
            &specs_for(6, ItemKind::Chlorinator)[3],
        )
        .unwrap();
        let switch = ChlorinatorSwitch::new(ctx);

        let err = switch.set_timed_percent(101).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidParameter { field: "timed_percent", .. }
        ));
    }

    #[tokio::test]
    async fn superchlorinate_turns_parent_on_first_when_idle() {
        let server = MockServer::start().await;
        let coordinator = connected_coordinator(&server).await;

        let mut tree = sample_tree();
        tree["BOWS"][0]["Chlorinator"][0]["operatingMode"] = json!("0");
        coordinator.inject_snapshot(flatten(&tree));

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
            "scMode",
            &specs_for(6, ItemKind::Chlorinator)[4],
        )
        .unwrap();
        let mut switch = SuperchlorinateSwitch::new(ctx, 15);

        // Idle parent chlorinator makes the switch unavailable.
        assert!(!switch.available());

        server.reset().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/rpc"))
            .and(body_partial_json(json!({ "Name": "SetEquipment" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "Status": 0 })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/rpc"))
            .and(body_partial_json(json!({ "Name": "SetUISuperCHLORCmd" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "Status": 0 })),
            )
            .expect(1)
            .mount(&server)
            .await;

        switch.turn_on().await.unwrap();
        assert!(switch.is_on());
    }
}
