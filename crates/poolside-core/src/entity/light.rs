// ── Color lights ──
//
// ColorLogic lights switch through the relay command and select shows
// through the light-show commands. V2 hardware extends the show set and
// adds per-show speed and brightness. The cloud is even slower to report
// light state than relay state, hence the longer optimistic window.

use std::time::Duration;

use strum::{Display, EnumIter, EnumString, FromRepr, IntoEnumIterator};

use crate::error::CoreError;

use super::{EntityContext, Optimistic, command_ids};

const LIGHT_STATE_DELAY: Duration = Duration::from_secs(60);

const V2_EFFECT_MIN: u8 = 18;
const MAX_EFFECT_SPEED: u8 = 8;
const MAX_EFFECT_BRIGHTNESS: u8 = 4;

/// Light shows, in the controller's numbering. Shows from
/// [`Yellow`](LightEffect::Yellow) up exist on V2 hardware only.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, FromRepr,
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum LightEffect {
    VoodooLounge = 1,
    DeepBlueSea = 2,
    RoyalBlue = 3,
    AfternoonSkies = 4,
    AquaGreen = 5,
    Emerald = 6,
    CloudWhite = 7,
    WarmRed = 8,
    Flamingo = 9,
    VividViolet = 10,
    Sangria = 11,
    Twilight = 12,
    Tranquility = 13,
    Gemstone = 14,
    Usa = 15,
    MardiGras = 16,
    CoolCabaret = 17,
    Yellow = 18,
    Orange = 19,
    Gold = 20,
    Mint = 21,
    Teal = 22,
    BurntOrange = 23,
    PureWhite = 24,
    CrispWhite = 25,
    WarmWhite = 26,
    BrightYellow = 27,
}

impl LightEffect {
    pub fn is_v2(self) -> bool {
        self as u8 >= V2_EFFECT_MIN
    }
}

pub struct LightEntity {
    ctx: EntityContext,
    version: u8,
    /// Defaults sent when a V2 show command omits speed or brightness.
    speed: u8,
    brightness: u8,
    optimistic: Optimistic<bool>,
    held_effect: Optimistic<LightEffect>,
}

impl LightEntity {
    pub(crate) fn new(ctx: EntityContext, record: &serde_json::Map<String, serde_json::Value>) -> Self {
        // V2 hardware either declares itself or reports a show speed.
        let v2 = record
            .get("V2")
            .and_then(serde_json::Value::as_str)
            .is_some_and(|v| v == "yes")
            || record.contains_key("speed");

        Self {
            ctx,
            version: if v2 { 2 } else { 1 },
            speed: 4,
            brightness: 4,
            optimistic: Optimistic::new(LIGHT_STATE_DELAY),
            held_effect: Optimistic::new(LIGHT_STATE_DELAY),
        }
    }

    pub fn context(&self) -> &EntityContext {
        &self.ctx
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn is_on(&self) -> bool {
        if let Some(held) = self.optimistic.current() {
            return held;
        }
        self.ctx.raw_i64().unwrap_or(0) != 0
    }

    /// The active show, optimistically held after a show command.
    pub fn effect(&self) -> Option<LightEffect> {
        if let Some(held) = self.held_effect.current() {
            return Some(held);
        }
        self.ctx
            .snapshot()
            .field_i64(self.ctx.item_id(), "currentShow")
            .and_then(|show| u8::try_from(show).ok())
            .and_then(LightEffect::from_repr)
    }

    /// The shows this light's hardware generation supports.
    pub fn effect_list(&self) -> Vec<LightEffect> {
        LightEffect::iter()
            .filter(|effect| self.version == 2 || !effect.is_v2())
            .collect()
    }

    pub async fn turn_on(&mut self) -> Result<(), CoreError> {
        let (msp, pool, light) = self.ids()?;
        self.ctx
            .coordinator()
            .client()
            .set_relay_valve(msp, pool, light, 1)
            .await?;
        self.optimistic.hold(true);
        Ok(())
    }

    pub async fn turn_off(&mut self) -> Result<(), CoreError> {
        let (msp, pool, light) = self.ids()?;
        self.ctx
            .coordinator()
            .client()
            .set_relay_valve(msp, pool, light, 0)
            .await?;
        self.optimistic.hold(false);
        Ok(())
    }

    /// Select a show. V2-only shows are rejected on V1 hardware.
    pub async fn set_effect(&mut self, effect: LightEffect) -> Result<(), CoreError> {
        if self.version == 1 && effect.is_v2() {
            return Err(CoreError::InvalidParameter {
                field: "effect",
                reason: format!("show '{effect}' requires a V2 light"),
            });
        }

        let (msp, pool, light) = self.ids()?;
        self.ctx
            .coordinator()
            .client()
            .set_light_show(msp, pool, light, effect as u8)
            .await?;
        self.held_effect.hold(effect);
        Ok(())
    }

    /// Adjust show speed (0..=8) and brightness (0..=4) on a V2 light,
    /// re-sending the current show. Omitted parameters keep the last
    /// commanded value.
    pub async fn set_v2_effect(
        &mut self,
        speed: Option<u8>,
        brightness: Option<u8>,
    ) -> Result<(), CoreError> {
        if self.version != 2 {
            return Err(CoreError::InvalidParameter {
                field: "effect",
                reason: "show speed and brightness require a V2 light".into(),
            });
        }

        let speed = speed.unwrap_or(self.speed);
        let brightness = brightness.unwrap_or(self.brightness);
        if speed > MAX_EFFECT_SPEED {
            return Err(CoreError::InvalidParameter {
                field: "speed",
                reason: format!("{speed} is outside 0..={MAX_EFFECT_SPEED}"),
            });
        }
        if brightness > MAX_EFFECT_BRIGHTNESS {
            return Err(CoreError::InvalidParameter {
                field: "brightness",
                reason: format!("{brightness} is outside 0..={MAX_EFFECT_BRIGHTNESS}"),
            });
        }

        let show = self
            .ctx
            .snapshot()
            .field_i64(self.ctx.item_id(), "currentShow")
            .and_then(|s| u8::try_from(s).ok())
            .ok_or_else(|| CoreError::MissingTelemetry {
                what: format!("currentShow for {}", self.ctx.item_id()),
            })?;

        let (msp, pool, light) = self.ids()?;
        self.ctx
            .coordinator()
            .client()
            .set_light_show_v2(msp, pool, light, show, speed, brightness)
            .await?;
        self.speed = speed;
        self.brightness = brightness;
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
        self.held_effect.expire();
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

    fn light_id() -> ItemId {
        ItemId::from_pairs([
            (ItemKind::Backyard, 49840),
            (ItemKind::Bows, 2),
            (ItemKind::Lights, 7),
        ])
    }

    fn light(coordinator: &Coordinator) -> LightEntity {
        let snapshot = coordinator.snapshot();
        let id = light_id();
        let record = snapshot.get(&id).unwrap().clone();
        let ctx = EntityContext::new(
            coordinator,
            &snapshot,
            &id,
            "lightState",
            &specs_for(6, ItemKind::Lights)[0],
        )
        .unwrap();
        LightEntity::new(ctx, &record)
    }

    #[test]
    fn version_detection_uses_the_v2_marker_or_speed_field() {
        let coordinator = coordinator_with(&sample_tree(), CoordinatorConfig::default());
        assert_eq!(light(&coordinator).version(), 2);

        let mut tree = sample_tree();
        let record = tree["BOWS"][0]["Lights"][0].as_object_mut().unwrap();
        record.remove("V2");
        record.remove("speed");
        let coordinator = coordinator_with(&tree, CoordinatorConfig::default());
        assert_eq!(light(&coordinator).version(), 1);
    }

    #[test]
    fn effect_list_hides_v2_shows_on_v1_hardware() {
        let mut tree = sample_tree();
        let record = tree["BOWS"][0]["Lights"][0].as_object_mut().unwrap();
        record.remove("V2");
        record.remove("speed");
        let coordinator = coordinator_with(&tree, CoordinatorConfig::default());
        let v1 = light(&coordinator);
        assert_eq!(v1.effect_list().len(), 17);
        assert!(!v1.effect_list().contains(&LightEffect::Yellow));

        let coordinator = coordinator_with(&sample_tree(), CoordinatorConfig::default());
        let v2 = light(&coordinator);
        assert_eq!(v2.effect_list().len(), 27);
    }

    #[test]
    fn effect_reads_the_current_show() {
        let coordinator = coordinator_with(&sample_tree(), CoordinatorConfig::default());
        assert_eq!(light(&coordinator).effect(), Some(LightEffect::DeepBlueSea));
    }

    #[tokio::test]
    async fn v1_light_rejects_v2_only_shows_and_v2_effect_settings() {
        let mut tree = sample_tree();
        let record = tree["BOWS"][0]["Lights"][0].as_object_mut().unwrap();
        record.remove("V2");
        record.remove("speed");
        let coordinator = coordinator_with(&tree, CoordinatorConfig::default());
        let mut v1 = light(&coordinator);

        let err = v1.set_effect(LightEffect::Mint).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidParameter { field: "effect", .. }));

        let err = v1.set_v2_effect(Some(3), None).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidParameter { field: "effect", .. }));
    }

    #[tokio::test]
    async fn v2_effect_parameters_are_range_checked() {
        let coordinator = coordinator_with(&sample_tree(), CoordinatorConfig::default());
        let mut v2 = light(&coordinator);

        let err = v2.set_v2_effect(Some(9), None).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidParameter { field: "speed", .. }));

        let err = v2.set_v2_effect(None, Some(5)).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidParameter { field: "brightness", .. }
        ));
    }

    #[test]
    fn effect_names_round_trip_through_strings() {
        assert_eq!(LightEffect::DeepBlueSea.to_string(), "deep_blue_sea");
        assert_eq!(
            "mardi_gras".parse::<LightEffect>().unwrap(),
            LightEffect::MardiGras
        );
        assert_eq!(LightEffect::from_repr(15), Some(LightEffect::Usa));
        assert_eq!(LightEffect::from_repr(0), None);
        assert_eq!(LightEffect::from_repr(28), None);
    }

    #[tokio::test]
    async fn optimistic_hold_wins_until_the_window_expires() {
        let server = MockServer::start().await;
        let coordinator = connected_coordinator(&server).await;

        // The sample light is off; turn_on must win over the stale snapshot.
        let mut entity = light(&coordinator);
        assert!(!entity.is_on());

        entity.turn_on().await.unwrap();
        assert!(entity.is_on());

        entity.expire_optimistic();
        assert!(!entity.is_on());
    }

    #[tokio::test]
    async fn commanded_show_is_held_over_the_polled_show() {
        let server = MockServer::start().await;
        let coordinator = connected_coordinator(&server).await;

        // Snapshot reports show 2; the commanded show wins inside the window.
        let mut entity = light(&coordinator);
        entity.set_effect(LightEffect::Twilight).await.unwrap();
        assert_eq!(entity.effect(), Some(LightEffect::Twilight));

        entity.expire_optimistic();
        assert_eq!(entity.effect(), Some(LightEffect::DeepBlueSea));
    }
}
