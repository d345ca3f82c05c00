// OmniLogic cloud RPC client
//
// Every cloud call is a POST of a named request against a single endpoint,
// wrapped in a `{ Status, StatusMessage, Payload }` envelope. Methods here
// return unwrapped payloads -- the envelope is stripped before the caller
// sees it. Telemetry and configuration payloads are returned as raw
// `serde_json::Value` trees; their shape is owned by `poolside-core`.

use std::sync::RwLock;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, trace};
use url::Url;

use crate::error::ApiError;
use crate::transport::Transport;

/// Production cloud endpoint.
pub const DEFAULT_BASE_URL: &str = "https://app1.haywardomnilogic.com/api/v1";

/// Cloud response envelope. `Payload` is absent on plain command acks.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Status")]
    status: i64,
    #[serde(rename = "StatusMessage", default)]
    status_message: Option<String>,
    #[serde(rename = "Payload", default)]
    payload: Option<Value>,
}

/// Authenticated client for the OmniLogic cloud API.
pub struct OmniClient {
    http: reqwest::Client,
    base_url: Url,
    /// Session token issued on login, sent with every subsequent request.
    token: RwLock<Option<String>>,
    user_id: RwLock<Option<i64>>,
}

impl OmniClient {
    /// Create a client against the given base URL.
    ///
    /// Does NOT authenticate -- call [`connect()`](Self::connect) first.
    pub fn new(base_url: Url, transport: &Transport) -> Result<Self, ApiError> {
        Ok(Self {
            http: transport.build_client()?,
            base_url,
            token: RwLock::new(None),
            user_id: RwLock::new(None),
        })
    }

    /// Create a client with a pre-built `reqwest::Client` (used by tests).
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            token: RwLock::new(None),
            user_id: RwLock::new(None),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns `true` once a session token is held.
    pub fn is_connected(&self) -> bool {
        self.token.read().is_ok_and(|t| t.is_some())
    }

    // ── Session ──────────────────────────────────────────────────────

    /// Authenticate against the cloud service.
    ///
    /// Any credential rejection (non-zero envelope status or 401/403) maps
    /// to [`ApiError::Authentication`] -- fatal to session setup, no retry.
    pub async fn connect(&self, username: &str, password: &SecretString) -> Result<(), ApiError> {
        let url = self.rpc_url()?;
        let body = json!({
            "Name": "Login",
            "Parameters": {
                "UserName": username,
                "Password": password.expose_secret(),
            },
        });

        let response = self.http.post(url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ApiError::Authentication {
                message: format!("login rejected (HTTP {status})"),
            });
        }

        let envelope: LoginResponse = parse_body(&text)?;
        if envelope.status != 0 {
            return Err(ApiError::Authentication {
                message: envelope
                    .status_message
                    .unwrap_or_else(|| format!("login failed (status {})", envelope.status)),
            });
        }

        let token = envelope.token.ok_or_else(|| ApiError::Authentication {
            message: "login succeeded but no token was issued".into(),
        })?;

        if let Ok(mut guard) = self.token.write() {
            *guard = Some(token);
        }
        if let Ok(mut guard) = self.user_id.write() {
            *guard = envelope.user_id;
        }

        debug!("authenticated against OmniLogic cloud");
        Ok(())
    }

    // ── Fetch surface ────────────────────────────────────────────────

    /// Fetch the current controller telemetry tree.
    ///
    /// The returned value is the raw nested snapshot; `poolside-core`
    /// flattens it into the per-poll `Snapshot`.
    pub async fn get_telemetry(&self) -> Result<Value, ApiError> {
        let payload = self.call("GetTelemetryData", json!({})).await?;
        payload.ok_or_else(|| ApiError::Deserialization {
            message: "telemetry response carried no payload".into(),
            body: String::new(),
        })
    }

    /// Fetch the static MSP equipment configuration tree.
    pub async fn get_msp_config(&self) -> Result<Value, ApiError> {
        let payload = self.call("GetMspConfigFile", json!({})).await?;
        payload.ok_or_else(|| ApiError::Deserialization {
            message: "config response carried no payload".into(),
            body: String::new(),
        })
    }

    // ── Control surface ──────────────────────────────────────────────
    //
    // Positional (msp, pool, equipment) ids come from the flattened item
    // ids in poolside-core. Parameter range validation happens there; these
    // methods only carry values over the wire.

    /// Switch a relay, valve, pump, or light circuit. `state` is 0/1 for
    /// on/off circuits and a raw percentage for variable-speed pumps.
    pub async fn set_relay_valve(
        &self,
        msp_id: i64,
        pool_id: i64,
        equipment_id: i64,
        state: u32,
    ) -> Result<(), ApiError> {
        self.call(
            "SetUIEquipmentCmd",
            json!({
                "MspSystemID": msp_id,
                "PoolID": pool_id,
                "EquipmentID": equipment_id,
                "IsOn": state,
            }),
        )
        .await?;
        Ok(())
    }

    /// Set a virtual heater's target temperature (native unit).
    pub async fn set_heater_temperature(
        &self,
        msp_id: i64,
        pool_id: i64,
        heater_id: i64,
        temperature: i64,
    ) -> Result<(), ApiError> {
        self.call(
            "SetUIHeaterCmd",
            json!({
                "MspSystemID": msp_id,
                "PoolID": pool_id,
                "HeaterID": heater_id,
                "Temp": temperature,
            }),
        )
        .await?;
        Ok(())
    }

    /// Enable or disable a virtual heater.
    pub async fn set_heater_enable(
        &self,
        msp_id: i64,
        pool_id: i64,
        heater_id: i64,
        enabled: bool,
    ) -> Result<(), ApiError> {
        self.call(
            "SetHeaterEnable",
            json!({
                "MspSystemID": msp_id,
                "PoolID": pool_id,
                "HeaterID": heater_id,
                "Enabled": enabled,
            }),
        )
        .await?;
        Ok(())
    }

    /// Select a light show on a V1 color light.
    pub async fn set_light_show(
        &self,
        msp_id: i64,
        pool_id: i64,
        light_id: i64,
        show: u8,
    ) -> Result<(), ApiError> {
        self.call(
            "SetStandAloneLightShow",
            json!({
                "MspSystemID": msp_id,
                "PoolID": pool_id,
                "LightID": light_id,
                "Show": show,
            }),
        )
        .await?;
        Ok(())
    }

    /// Select a light show with speed and brightness on a V2 color light.
    pub async fn set_light_show_v2(
        &self,
        msp_id: i64,
        pool_id: i64,
        light_id: i64,
        show: u8,
        speed: u8,
        brightness: u8,
    ) -> Result<(), ApiError> {
        self.call(
            "SetStandAloneLightShowV2",
            json!({
                "MspSystemID": msp_id,
                "PoolID": pool_id,
                "LightID": light_id,
                "Show": show,
                "Speed": speed,
                "Brightness": brightness,
            }),
        )
        .await?;
        Ok(())
    }

    /// Reconfigure a chlorinator. `cfg_state` selects enable (3) / disable
    /// (2); `timed_percent` sets the timed output. Absent fields are left
    /// unchanged by the cloud service.
    pub async fn set_chlorinator_params(
        &self,
        pool_id: i64,
        chlor_id: i64,
        cfg_state: Option<u8>,
        timed_percent: Option<u8>,
    ) -> Result<(), ApiError> {
        let mut params = json!({
            "PoolID": pool_id,
            "ChlorID": chlor_id,
        });
        if let (Some(obj), Some(state)) = (params.as_object_mut(), cfg_state) {
            obj.insert("CfgState".into(), json!(state));
        }
        if let (Some(obj), Some(percent)) = (params.as_object_mut(), timed_percent) {
            obj.insert("TimedPercent".into(), json!(percent));
        }
        self.call("SetCHLORParams", params).await?;
        Ok(())
    }

    /// Toggle superchlorination on a chlorinator.
    pub async fn set_superchlorination(
        &self,
        msp_id: i64,
        pool_id: i64,
        chlor_id: i64,
        enabled: bool,
    ) -> Result<(), ApiError> {
        self.call(
            "SetUISuperCHLORCmd",
            json!({
                "MspSystemID": msp_id,
                "PoolID": pool_id,
                "ChlorID": chlor_id,
                "IsOn": u8::from(enabled),
            }),
        )
        .await?;
        Ok(())
    }

    /// Generic equipment on/off by system id.
    pub async fn set_equipment(
        &self,
        pool_id: i64,
        equipment_id: i64,
        is_on: bool,
    ) -> Result<(), ApiError> {
        self.call(
            "SetEquipment",
            json!({
                "PoolID": pool_id,
                "EquipmentID": equipment_id,
                "IsOn": u8::from(is_on),
            }),
        )
        .await?;
        Ok(())
    }

    // ── RPC plumbing ─────────────────────────────────────────────────

    fn rpc_url(&self) -> Result<Url, ApiError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/rpc"))?)
    }

    /// Post a named request and unwrap the status envelope.
    async fn call(&self, name: &str, params: Value) -> Result<Option<Value>, ApiError> {
        let token = self
            .token
            .read()
            .ok()
            .and_then(|guard| guard.clone())
            .ok_or(ApiError::NotConnected)?;

        let url = self.rpc_url()?;
        let body = json!({
            "Name": name,
            "Token": token,
            "Parameters": params,
        });

        trace!(request = name, "cloud RPC");
        let response = self.http.post(url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ApiError::Authentication {
                message: format!("session rejected during '{name}' (HTTP {status})"),
            });
        }
        if !status.is_success() {
            return Err(ApiError::Api {
                message: format!("'{name}' failed (HTTP {status})"),
                status: i64::from(status.as_u16()),
            });
        }

        let envelope: Envelope = parse_body(&text)?;
        if envelope.status != 0 {
            return Err(ApiError::Api {
                message: envelope
                    .status_message
                    .unwrap_or_else(|| format!("'{name}' rejected by cloud service")),
                status: envelope.status,
            });
        }

        Ok(envelope.payload)
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "Status")]
    status: i64,
    #[serde(rename = "StatusMessage", default)]
    status_message: Option<String>,
    #[serde(rename = "Token", default)]
    token: Option<String>,
    #[serde(rename = "UserID", default)]
    user_id: Option<i64>,
}

fn parse_body<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    serde_json::from_str(text).map_err(|e| ApiError::Deserialization {
        message: e.to_string(),
        body: text.to_owned(),
    })
}
