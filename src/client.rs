use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::legacy;
use crate::logger::{CommandLogMode, CommandLogger};
use crate::types::{CommandVerb, Protocol, Snapshot};
use crate::{Error, Result};

const OK_RESULT_CODE: &str = "0000";
const MONITOR_TIMEOUT_SECS: &str = "70";

/// Remote side of the characteristic layer: everything a controller or the
/// sync loop asks of the vendor cloud.
#[async_trait]
pub trait DevicePort: Send + Sync {
    /// Fetch the authoritative device snapshot for one refresh cycle.
    async fn fetch_snapshot(&self, device_id: &str, protocol: Protocol) -> Result<Snapshot>;

    /// Push one field write to the device.
    async fn send_command(
        &self,
        device_id: &str,
        verb: CommandVerb,
        data_key: &str,
        data_value: Value,
    ) -> Result<()>;

    /// Legacy-protocol write; `lease_id` is the monitoring work lease the
    /// account holds for the device.
    async fn send_legacy_command(
        &self,
        device_id: &str,
        lease_id: &str,
        data_key: &str,
        data_value: Value,
    ) -> Result<()>;

    /// Renew the remote monitoring lease so the device keeps reporting.
    async fn renew_monitoring(&self, device_id: &str) -> Result<()>;
}

pub struct ThinqClientBuilder {
    base_url: String,
    access_token: String,
    user_number: String,
    country_code: String,
    language_code: String,
    log_mode: Option<CommandLogMode>,
    log_path: Option<String>,
}

impl ThinqClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: String::new(),
            user_number: String::new(),
            country_code: "US".to_string(),
            language_code: "en-US".to_string(),
            log_mode: None,
            log_path: None,
        }
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = token.into();
        self
    }

    pub fn user_number(mut self, user_number: impl Into<String>) -> Self {
        self.user_number = user_number.into();
        self
    }

    pub fn country_code(mut self, code: impl Into<String>) -> Self {
        self.country_code = code.into();
        self
    }

    pub fn language_code(mut self, code: impl Into<String>) -> Self {
        self.language_code = code.into();
        self
    }

    pub fn command_log(mut self, mode: CommandLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> ThinqClient {
        let http = reqwest::Client::builder()
            .build()
            .expect("failed to build HTTP client");

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(
                CommandLogger::new(mode, &path).expect("failed to open log file"),
            )),
            _ => None,
        };

        ThinqClient {
            http,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            access_token: self.access_token,
            user_number: self.user_number,
            country_code: self.country_code,
            language_code: self.language_code,
            logger,
        }
    }
}

/// HTTP client for the ThinQ v2 cloud API, with a legacy (v1 RTI) path for
/// devices still on the old protocol. Auth token acquisition/refresh is the
/// caller's concern; the client only attaches the credentials it is given.
pub struct ThinqClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    user_number: String,
    country_code: String,
    language_code: String,
    logger: Option<Mutex<CommandLogger>>,
}

impl ThinqClient {
    pub fn builder(base_url: impl Into<String>) -> ThinqClientBuilder {
        ThinqClientBuilder::new(base_url)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("X-Thinq-App-Ver", "3.0.2100")
            .header("X-Thinq-App-Type", "NUTS")
            .header("X-Thinq-App-Level", "PRD")
            .header("X-Thinq-App-Os", "IOS")
            .header("X-Service-Code", "SVC202")
            .header("X-Service-Phase", "OP")
            .header("X-Country-Code", &self.country_code)
            .header("X-Language-Code", &self.language_code)
            .header("Accept-Language", &self.language_code)
            .header("X-Message-Id", Uuid::new_v4().to_string())
            .header("X-User-No", &self.user_number)
            .header("X-Emp-Token", &self.access_token)
            .header("Accept", "application/json")
    }

    fn log_command(&self, action: &str, data_key: &str, body: &Value) {
        if let Some(logger) = &self.logger
            && let Ok(mut logger) = logger.lock()
        {
            logger.log_command(action, data_key, body);
        }
    }

    fn log_snapshot(&self, device_id: &str, snapshot: &Snapshot) {
        if let Some(logger) = &self.logger
            && let Ok(mut logger) = logger.lock()
        {
            logger.log_snapshot(device_id, snapshot);
        }
    }

    /// Unwrap the standard `{resultCode, result}` envelope.
    fn check_envelope<'a>(body: &'a Value, data_key: &str) -> Result<&'a Value> {
        let code = body
            .get("resultCode")
            .and_then(|v| v.as_str())
            .unwrap_or("missing");
        if code != OK_RESULT_CODE {
            return Err(Error::Command {
                data_key: data_key.to_string(),
                code: code.to_string(),
            });
        }
        Ok(body.get("result").unwrap_or(&Value::Null))
    }

    async fn fetch_v2_snapshot(&self, device_id: &str) -> Result<Snapshot> {
        let url = format!("{}/service/devices/{}", self.base_url, device_id);
        debug!(url = %url, "fetching device snapshot");
        let body: Value = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let result = Self::check_envelope(&body, "snapshot")?;
        let fields = match result.get("snapshot") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        let snapshot = Snapshot::from_map(fields);
        self.log_snapshot(device_id, &snapshot);
        Ok(snapshot)
    }

    async fn fetch_v1_snapshot(&self, device_id: &str) -> Result<Snapshot> {
        let url = format!("{}/rti/rtiResult", self.base_url);
        debug!(url = %url, device_id, "fetching legacy device record");
        let body: Value = self
            .request(reqwest::Method::POST, &url)
            .json(&json!({ "lgedmRoot": { "deviceId": device_id } }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let record = match body.pointer("/lgedmRoot/returnData") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        let snapshot = legacy::pseudo_snapshot(&record);
        self.log_snapshot(device_id, &snapshot);
        Ok(snapshot)
    }
}

#[async_trait]
impl DevicePort for ThinqClient {
    async fn fetch_snapshot(&self, device_id: &str, protocol: Protocol) -> Result<Snapshot> {
        match protocol {
            Protocol::Thinq2 => self.fetch_v2_snapshot(device_id).await,
            Protocol::Thinq1 => self.fetch_v1_snapshot(device_id).await,
        }
    }

    async fn send_command(
        &self,
        device_id: &str,
        verb: CommandVerb,
        data_key: &str,
        data_value: Value,
    ) -> Result<()> {
        let url = format!("{}/service/devices/{}/control-sync", self.base_url, device_id);
        let payload = json!({
            "ctrlKey": "basicCtrl",
            "command": verb.as_str(),
            "dataKey": data_key,
            "dataValue": data_value,
        });
        debug!(url = %url, data_key, "sending command");
        self.log_command("command", data_key, &payload);
        let body: Value = self
            .request(reqwest::Method::POST, &url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Self::check_envelope(&body, data_key)?;
        Ok(())
    }

    async fn send_legacy_command(
        &self,
        device_id: &str,
        lease_id: &str,
        data_key: &str,
        data_value: Value,
    ) -> Result<()> {
        let url = format!("{}/rti/rtiControl", self.base_url);
        let payload = json!({
            "lgedmRoot": {
                "deviceId": device_id,
                "workId": lease_id,
                "cmd": "Control",
                "cmdOpt": "Set",
                "value": data_value,
            }
        });
        debug!(url = %url, data_key, "sending legacy command");
        self.log_command("legacy_command", data_key, &payload);
        self.request(reqwest::Method::POST, &url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn renew_monitoring(&self, device_id: &str) -> Result<()> {
        let url = format!("{}/service/devices/{}/control", self.base_url, device_id);
        let payload = json!({
            "ctrlKey": "allEventEnable",
            "command": "Set",
            "dataKey": "airState.mon.timeout",
            "dataValue": MONITOR_TIMEOUT_SECS,
        });
        debug!(url = %url, device_id, "renewing monitoring lease");
        self.log_command("renew_monitoring", "airState.mon.timeout", &payload);
        let body: Value = self
            .request(reqwest::Method::POST, &url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Self::check_envelope(&body, "airState.mon.timeout")?;
        Ok(())
    }
}
