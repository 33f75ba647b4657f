use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error};

use crate::client::DevicePort;
use crate::controller::{Characteristic, DeviceLink, ModeShared, SetOutcome};
use crate::registry::{CapabilityProfile, build_controllers, profile_for_model};
use crate::temperature::TemperatureBridge;
use crate::types::{CharacteristicKind, CharacteristicUpdate, Protocol, Snapshot};
use crate::{Error, Result};

type UpdateCallback = Box<dyn Fn(&CharacteristicUpdate) + Send + Sync>;

/// Per-device settings handed in by the surrounding plugin layer.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessoryConfig {
    pub device_id: String,
    pub model: String,
    pub protocol: Protocol,
    /// Remap COOL to the alternate "eco cool" vendor code on heat-capable
    /// hardware.
    pub eco_cool: bool,
    /// Monitoring work lease, required for legacy-protocol writes.
    pub lease_id: String,
}

/// One air-conditioner accessory: the controller set for its model plus the
/// snapshot-refresh and write-dispatch orchestration. Scheduling of the
/// refresh and lease-renewal intervals stays with the caller; this type owns
/// what happens on each tick.
pub struct AcAccessory {
    device_id: String,
    protocol: Protocol,
    profile: CapabilityProfile,
    port: Arc<dyn DevicePort>,
    controllers: Vec<Box<dyn Characteristic>>,
    shared: Arc<ModeShared>,
    last_snapshot: Option<Snapshot>,
    refreshing: AtomicBool,
    update_callbacks: Vec<UpdateCallback>,
}

impl AcAccessory {
    pub fn new(
        config: AccessoryConfig,
        bridge: Arc<TemperatureBridge>,
        port: Arc<dyn DevicePort>,
    ) -> Self {
        let profile = profile_for_model(&config.model);
        let link = DeviceLink::new(config.device_id.clone(), config.protocol, port.clone())
            .with_lease(config.lease_id);
        let (controllers, shared) = build_controllers(&profile, link, bridge, config.eco_cool);
        Self {
            device_id: config.device_id,
            protocol: config.protocol,
            profile,
            port,
            controllers,
            shared,
            last_snapshot: None,
            refreshing: AtomicBool::new(false),
            update_callbacks: Vec::new(),
        }
    }

    /// Register a callback for externally-visible value changes (the host
    /// framework's change-notification channel).
    pub fn on_update(&mut self, f: impl Fn(&CharacteristicUpdate) + Send + Sync + 'static) {
        self.update_callbacks.push(Box::new(f));
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn profile(&self) -> &CapabilityProfile {
        &self.profile
    }

    pub fn mode_shared(&self) -> &Arc<ModeShared> {
        &self.shared
    }

    /// Fetch a fresh snapshot and apply it to every controller in
    /// capability-list order. A tick arriving while a prior fetch is still
    /// outstanding is skipped, never queued.
    pub async fn refresh(&mut self) -> Result<()> {
        if self.refreshing.swap(true, Ordering::SeqCst) {
            debug!(device_id = %self.device_id, "refresh still in flight, skipping tick");
            return Ok(());
        }
        let fetched = self
            .port
            .fetch_snapshot(&self.device_id, self.protocol)
            .await;
        self.refreshing.store(false, Ordering::SeqCst);

        let snapshot = fetched.inspect_err(|e| {
            error!(device_id = %self.device_id, "snapshot fetch failed: {e}");
        })?;
        self.apply(&snapshot);
        self.last_snapshot = Some(snapshot);
        Ok(())
    }

    /// Re-apply the last fetched snapshot to every controller, pushing the
    /// resulting values out as updates. Used to put the UI back on ground
    /// truth after a rejected or failed write.
    pub fn resync_from_cache(&mut self) {
        if let Some(snapshot) = self.last_snapshot.clone() {
            self.apply(&snapshot);
        }
    }

    fn apply(&mut self, snapshot: &Snapshot) {
        for controller in &mut self.controllers {
            if let Some(update) = controller.apply_snapshot(snapshot) {
                for cb in &self.update_callbacks {
                    cb(&update);
                }
            }
        }
    }

    fn apply_to_kinds(&mut self, kinds: &[CharacteristicKind]) {
        let Some(snapshot) = self.last_snapshot.clone() else {
            return;
        };
        for controller in &mut self.controllers {
            if !kinds.contains(&controller.kind()) {
                continue;
            }
            if let Some(update) = controller.apply_snapshot(&snapshot) {
                for cb in &self.update_callbacks {
                    cb(&update);
                }
            }
        }
    }

    fn controller_index(&self, kind: CharacteristicKind) -> Result<usize> {
        self.controllers
            .iter()
            .position(|c| c.kind() == kind)
            .ok_or(Error::UnknownCharacteristic(kind))
    }

    /// Handle a "set" from the host framework. Returns the value actually
    /// in effect after normalization.
    pub async fn handle_set(&mut self, kind: CharacteristicKind, value: f64) -> Result<f64> {
        let idx = self.controller_index(kind)?;
        let outcome = self.controllers[idx].set_value(value).await;
        match outcome {
            Ok(SetOutcome::Sent(applied)) => {
                if kind == CharacteristicKind::TargetHeaterCoolerState {
                    // The applicable setpoint changes with the mode.
                    self.apply_to_kinds(&[
                        CharacteristicKind::CoolingThresholdTemperature,
                        CharacteristicKind::HeatingThresholdTemperature,
                    ]);
                }
                Ok(applied)
            }
            Ok(SetOutcome::Suppressed(applied)) => Ok(applied),
            Ok(SetOutcome::RevertToCache) => {
                self.resync_from_cache();
                let current = self.controllers[idx].current_value().unwrap_or(value);
                Ok(current)
            }
            Err(e) => {
                if MODE_GROUP.contains(&kind) {
                    // The optimistic UI assumed the write landed; put every
                    // controller back on ground truth before surfacing the
                    // failure.
                    self.resync_from_cache();
                }
                Err(e)
            }
        }
    }

    /// Handle a "get" from the host framework: always served from cache.
    pub fn handle_get(&self, kind: CharacteristicKind) -> Result<Option<f64>> {
        let idx = self.controller_index(kind)?;
        Ok(self.controllers[idx].current_value())
    }

    pub fn characteristics(&self) -> impl Iterator<Item = CharacteristicKind> + '_ {
        self.controllers.iter().map(|c| c.kind())
    }

    /// Renew the remote monitoring lease (runs on a faster interval than
    /// the snapshot refresh).
    pub async fn renew_monitoring(&self) -> Result<()> {
        self.port.renew_monitoring(&self.device_id).await
    }
}

const MODE_GROUP: &[CharacteristicKind] = &[
    CharacteristicKind::TargetHeaterCoolerState,
    CharacteristicKind::CoolingThresholdTemperature,
    CharacteristicKind::HeatingThresholdTemperature,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_deserializes_from_plugin_json() {
        let config: AccessoryConfig = serde_json::from_str(
            r#"{"deviceId": "abc-123", "model": "RAC_056905_WW", "protocol": "thinq1"}"#,
        )
        .unwrap();
        assert_eq!(config.device_id, "abc-123");
        assert_eq!(config.protocol, Protocol::Thinq1);
        assert!(!config.eco_cool);
        assert!(config.lease_id.is_empty());
    }
}
