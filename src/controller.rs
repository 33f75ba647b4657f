use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, trace, warn};

use crate::client::DevicePort;
use crate::codec::Codec;
use crate::legacy;
use crate::types::{
    CharacteristicKind, CharacteristicUpdate, CommandVerb, Protocol, Snapshot, TargetMode,
};
use crate::{Error, Result};

/// Settable target-temperature bounds, as defined in the product manuals.
pub const MIN_TARGET_CELSIUS: f64 = 16.0;
pub const MAX_TARGET_CELSIUS: f64 = 30.0;
pub const TARGET_CELSIUS_STEP: f64 = 0.5;

const USE_TIME_KEY: &str = "airState.filterMngStates.useTime";
const MAX_TIME_KEY: &str = "airState.filterMngStates.maxTime";
const FILTER_CHANGE_KEY: &str = "_derived.filterChange";
const FILTER_LIFE_KEY: &str = "_derived.filterLife";

/// Whether a controller accepts writes. Explicit at construction time, so a
/// "set" on a read-only controller is a checked contract violation rather
/// than a missing method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// Outcome of a write request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetOutcome {
    /// Command sent and accepted; cache now holds the normalized value.
    Sent(f64),
    /// Normalized value equals the cache; the remote call was suppressed.
    /// Physical units chime on every remote command, so no-op writes are
    /// deliberately never forwarded.
    Suppressed(f64),
    /// Write rejected by field-specific policy (wrong mode or auto-mode
    /// lockout); the caller should re-push cached values so the UI snaps
    /// back instead of silently setting an inert field.
    RevertToCache,
}

const MODE_UNKNOWN: u8 = u8::MAX;

/// Operating-mode state shared between the mode controller and the two
/// threshold-temperature controllers. The mode controller is the only
/// writer; siblings read it to gate their writes.
#[derive(Debug, Default)]
pub struct ModeShared {
    mode: AtomicU8,
}

impl ModeShared {
    pub fn new() -> Self {
        Self {
            mode: AtomicU8::new(MODE_UNKNOWN),
        }
    }

    pub fn observe(&self, mode: TargetMode) {
        self.mode.store(mode.value() as u8, Ordering::Relaxed);
    }

    pub fn mode(&self) -> Option<TargetMode> {
        let raw = self.mode.load(Ordering::Relaxed);
        if raw == MODE_UNKNOWN {
            return None;
        }
        TargetMode::from_value(f64::from(raw))
    }

    /// Auto mode locks both temperature setpoints: the device holds no
    /// discrete target, so edits would be inert.
    pub fn locked(&self) -> bool {
        self.mode() == Some(TargetMode::Auto)
    }
}

/// Which of the two split setpoints a threshold controller owns. Both read
/// the same vendor field; only the one matching the current operating mode
/// accepts writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetpointMode {
    Cool,
    Heat,
}

impl SetpointMode {
    fn target_mode(self) -> TargetMode {
        match self {
            SetpointMode::Cool => TargetMode::Cool,
            SetpointMode::Heat => TargetMode::Heat,
        }
    }

    /// Value shown while locked: the full-range bound signals that no
    /// discrete setpoint is active.
    fn locked_value(self) -> f64 {
        match self {
            SetpointMode::Cool => MAX_TARGET_CELSIUS,
            SetpointMode::Heat => MIN_TARGET_CELSIUS,
        }
    }
}

/// Derived filter telemetry, synthesized from the use/max counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMetric {
    ChangeIndicator,
    LifePercent,
}

impl FilterMetric {
    fn synthetic_key(self) -> &'static str {
        match self {
            FilterMetric::ChangeIndicator => FILTER_CHANGE_KEY,
            FilterMetric::LifePercent => FILTER_LIFE_KEY,
        }
    }
}

/// Field-specific policy layered over the generic controller protocol.
pub enum Behavior {
    Plain,
    /// Split threshold temperature: mode-gated writes and the auto-mode
    /// lockout override.
    Setpoint {
        mode: SetpointMode,
        shared: Arc<ModeShared>,
    },
    /// Target operating mode: publishes each observed mode into the shared
    /// state so the setpoint controllers can gate on it.
    ModeGroup { shared: Arc<ModeShared> },
    /// Read-only transform injected ahead of the generic decode: builds a
    /// synthetic snapshot field from the two real filter counters.
    DerivedFilter(FilterMetric),
}

/// Connection from a controller to the remote device: identity, protocol
/// generation, and the port commands go out through.
#[derive(Clone)]
pub struct DeviceLink {
    device_id: String,
    protocol: Protocol,
    lease_id: String,
    port: Arc<dyn DevicePort>,
}

impl DeviceLink {
    pub fn new(device_id: impl Into<String>, protocol: Protocol, port: Arc<dyn DevicePort>) -> Self {
        Self {
            device_id: device_id.into(),
            protocol,
            lease_id: String::new(),
            port,
        }
    }

    pub fn with_lease(mut self, lease_id: impl Into<String>) -> Self {
        self.lease_id = lease_id.into();
        self
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    async fn send(&self, verb: CommandVerb, data_key: &str, api_value: f64) -> Result<()> {
        match self.protocol {
            Protocol::Thinq2 => {
                self.port
                    .send_command(&self.device_id, verb, data_key, json!(api_value))
                    .await
            }
            Protocol::Thinq1 => {
                let value = legacy::translate_command(data_key, verb, api_value).ok_or_else(
                    || Error::UnsupportedProtocol(format!("no legacy mapping for {data_key}")),
                )?;
                self.port
                    .send_legacy_command(&self.device_id, &self.lease_id, data_key, value)
                    .await
            }
        }
    }
}

/// One exposed characteristic, wired to the host framework through explicit
/// method calls (`apply_snapshot` / `set_value` / `current_value`).
#[async_trait]
pub trait Characteristic: Send + Sync {
    fn kind(&self) -> CharacteristicKind;

    fn access(&self) -> Access;

    /// Take in an updated device snapshot. Returns the externally-visible
    /// value to push to the framework, or `None` when this cycle carries
    /// nothing for this field (missing key, decode failure, NaN guard).
    fn apply_snapshot(&mut self, snapshot: &Snapshot) -> Option<CharacteristicUpdate>;

    /// Cache read; never triggers a remote call. Freshness is the periodic
    /// refresh's responsibility.
    fn current_value(&self) -> Option<f64>;

    /// Normalize, maybe suppress, maybe send. See [`SetOutcome`].
    async fn set_value(&mut self, value: f64) -> Result<SetOutcome>;
}

/// The one concrete controller: cached last-known state for a single vendor
/// field, a codec, and a behavior strategy for the field-specific edge
/// cases. Covers every exposed characteristic; no per-field subclassing.
pub struct FieldController {
    kind: CharacteristicKind,
    data_key: &'static str,
    verb: CommandVerb,
    access: Access,
    codec: Box<dyn Codec>,
    behavior: Behavior,
    link: DeviceLink,
    cached: Option<f64>,
}

impl FieldController {
    pub fn new(
        codec: Box<dyn Codec>,
        verb: CommandVerb,
        data_key: &'static str,
        access: Access,
        behavior: Behavior,
        link: DeviceLink,
    ) -> Self {
        let data_key = match &behavior {
            Behavior::DerivedFilter(metric) => metric.synthetic_key(),
            _ => data_key,
        };
        Self {
            kind: codec.kind(),
            data_key,
            verb,
            access,
            codec,
            behavior,
            link,
            cached: None,
        }
    }

    /// Derive the synthetic filter field, or bail out when the counters are
    /// unusable (`maxTime` of zero would otherwise propagate NaN).
    fn synthesize_filter(&self, metric: FilterMetric, snapshot: &Snapshot) -> Option<Snapshot> {
        let use_time = snapshot.number(USE_TIME_KEY)?;
        let max_time = snapshot.number(MAX_TIME_KEY)?;
        match metric {
            FilterMetric::ChangeIndicator => {
                let needs_change = use_time >= max_time;
                Some(snapshot.with_field(self.data_key, json!(needs_change)))
            }
            FilterMetric::LifePercent => {
                if max_time <= 0.0 {
                    debug!(
                        device_id = self.link.device_id(),
                        "filter life not available for this device; skipping update"
                    );
                    return None;
                }
                let life = (100.0 - (use_time / max_time) * 100.0).floor();
                Some(snapshot.with_field(self.data_key, json!(life)))
            }
        }
    }

    fn decode_snapshot_value(&self, snapshot: &Snapshot) -> Option<f64> {
        let raw = match snapshot.number(self.data_key) {
            Some(raw) => raw,
            None => {
                trace!(characteristic = %self.kind, key = self.data_key, "field absent from snapshot");
                return None;
            }
        };
        match self.codec.decode(raw) {
            Ok(state) => Some(state),
            Err(e) => {
                // Last known good value is retained; one field's bad data
                // must not block its siblings.
                warn!(characteristic = %self.kind, raw, "snapshot decode failed: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl Characteristic for FieldController {
    fn kind(&self) -> CharacteristicKind {
        self.kind
    }

    fn access(&self) -> Access {
        self.access
    }

    fn apply_snapshot(&mut self, snapshot: &Snapshot) -> Option<CharacteristicUpdate> {
        let state = match &self.behavior {
            Behavior::DerivedFilter(metric) => {
                let derived = self.synthesize_filter(*metric, snapshot)?;
                self.decode_snapshot_value(&derived)?
            }
            Behavior::Setpoint { mode, shared } if shared.locked() => {
                // No discrete setpoint is active in auto mode; show the full
                // range regardless of what the device reports.
                snapshot.number(self.data_key)?;
                mode.locked_value()
            }
            _ => self.decode_snapshot_value(snapshot)?,
        };

        if let Behavior::ModeGroup { shared } = &self.behavior
            && let Some(mode) = TargetMode::from_value(state)
        {
            shared.observe(mode);
        }

        self.cached = Some(state);
        Some(CharacteristicUpdate {
            kind: self.kind,
            value: state,
        })
    }

    fn current_value(&self) -> Option<f64> {
        self.cached
    }

    async fn set_value(&mut self, value: f64) -> Result<SetOutcome> {
        if self.access == Access::ReadOnly {
            return Err(Error::ReadOnly(self.kind));
        }

        if let Behavior::Setpoint { mode, shared } = &self.behavior
            && (shared.locked() || shared.mode() != Some(mode.target_mode()))
        {
            debug!(
                characteristic = %self.kind,
                "setpoint not active in current mode; reverting to cache"
            );
            return Ok(SetOutcome::RevertToCache);
        }

        // Round-trip through the codec to snap the request onto the nearest
        // representable domain value before comparing against the cache.
        let api_value = self.codec.encode(value)?;
        let normalized = self.codec.decode(api_value)?;

        if self.cached == Some(normalized) {
            debug!(characteristic = %self.kind, value = normalized, "no-op write suppressed");
            return Ok(SetOutcome::Suppressed(normalized));
        }

        self.link.send(self.verb, self.data_key, api_value).await?;

        // Last-writer-wins by completion order: an interleaved snapshot
        // apply may have touched the cache while the call was in flight,
        // and the confirmed write still overwrites it.
        self.cached = Some(normalized);

        if let Behavior::ModeGroup { shared } = &self.behavior
            && let Some(mode) = TargetMode::from_value(normalized)
        {
            shared.observe(mode);
        }

        Ok(SetOutcome::Sent(normalized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FanSpeedCodec, PowerCodec, TargetModeCodec};
    use serde_json::Value;
    use std::sync::Mutex;

    struct RecordingPort {
        sent: Mutex<Vec<(String, String, Value)>>,
        fail: bool,
    }

    impl RecordingPort {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl DevicePort for RecordingPort {
        async fn fetch_snapshot(&self, _: &str, _: Protocol) -> Result<Snapshot> {
            Ok(Snapshot::new())
        }

        async fn send_command(
            &self,
            _device_id: &str,
            verb: CommandVerb,
            data_key: &str,
            data_value: Value,
        ) -> Result<()> {
            if self.fail {
                return Err(Error::Command {
                    data_key: data_key.to_string(),
                    code: "0106".to_string(),
                });
            }
            self.sent.lock().unwrap().push((
                verb.as_str().to_string(),
                data_key.to_string(),
                data_value,
            ));
            Ok(())
        }

        async fn send_legacy_command(
            &self,
            _device_id: &str,
            _lease_id: &str,
            data_key: &str,
            data_value: Value,
        ) -> Result<()> {
            self.sent.lock().unwrap().push((
                "legacy".to_string(),
                data_key.to_string(),
                data_value,
            ));
            Ok(())
        }

        async fn renew_monitoring(&self, _: &str) -> Result<()> {
            Ok(())
        }
    }

    fn link(port: Arc<RecordingPort>, protocol: Protocol) -> DeviceLink {
        DeviceLink::new("device-1", protocol, port)
    }

    fn power_controller(port: Arc<RecordingPort>) -> FieldController {
        FieldController::new(
            Box::new(PowerCodec),
            CommandVerb::Operation,
            "airState.operation",
            Access::ReadWrite,
            Behavior::Plain,
            link(port, Protocol::Thinq2),
        )
    }

    fn snapshot(pairs: &[(&str, f64)]) -> Snapshot {
        let mut snap = Snapshot::new();
        for (k, v) in pairs {
            snap.insert(*k, serde_json::json!(v));
        }
        snap
    }

    #[tokio::test]
    async fn set_sends_command_and_caches() {
        let port = Arc::new(RecordingPort::new());
        let mut controller = power_controller(port.clone());
        let outcome = controller.set_value(1.0).await.unwrap();
        assert_eq!(outcome, SetOutcome::Sent(1.0));
        assert_eq!(controller.current_value(), Some(1.0));
        assert_eq!(port.sent_count(), 1);
        let sent = port.sent.lock().unwrap();
        assert_eq!(sent[0].0, "Operation");
        assert_eq!(sent[0].1, "airState.operation");
    }

    #[tokio::test]
    async fn repeated_set_of_cached_value_is_suppressed() {
        let port = Arc::new(RecordingPort::new());
        let mut controller = power_controller(port.clone());
        controller.apply_snapshot(&snapshot(&[("airState.operation", 1.0)]));
        let outcome = controller.set_value(1.0).await.unwrap();
        assert_eq!(outcome, SetOutcome::Suppressed(1.0));
        assert_eq!(port.sent_count(), 0);
    }

    #[tokio::test]
    async fn failed_write_leaves_cache_untouched() {
        let port = Arc::new(RecordingPort::failing());
        let mut controller = power_controller(port.clone());
        controller.apply_snapshot(&snapshot(&[("airState.operation", 0.0)]));
        let err = controller.set_value(1.0).await.unwrap_err();
        assert!(matches!(err, Error::Command { .. }));
        assert_eq!(controller.current_value(), Some(0.0));
    }

    #[tokio::test]
    async fn fan_set_normalizes_before_suppression_check() {
        let port = Arc::new(RecordingPort::new());
        let mut controller = FieldController::new(
            Box::new(FanSpeedCodec { num_speeds: 3 }),
            CommandVerb::Set,
            "airState.windStrength",
            Access::ReadWrite,
            Behavior::Plain,
            link(port.clone(), Protocol::Thinq2),
        );
        controller.apply_snapshot(&snapshot(&[("airState.windStrength", 6.0)]));
        // 5 snaps to 6, which is already cached: suppressed
        let outcome = controller.set_value(5.0).await.unwrap();
        assert_eq!(outcome, SetOutcome::Suppressed(6.0));
        assert_eq!(port.sent_count(), 0);
    }

    #[tokio::test]
    async fn read_only_set_is_a_contract_violation() {
        let port = Arc::new(RecordingPort::new());
        let mut controller = FieldController::new(
            Box::new(PowerCodec),
            CommandVerb::Operation,
            "airState.operation",
            Access::ReadOnly,
            Behavior::Plain,
            link(port, Protocol::Thinq2),
        );
        let err = controller.set_value(1.0).await.unwrap_err();
        assert!(matches!(err, Error::ReadOnly(CharacteristicKind::Active)));
    }

    #[tokio::test]
    async fn decode_failure_retains_cached_value() {
        let port = Arc::new(RecordingPort::new());
        let mut controller = power_controller(port);
        controller.apply_snapshot(&snapshot(&[("airState.operation", 1.0)]));
        let update = controller.apply_snapshot(&snapshot(&[("airState.operation", 7.0)]));
        assert!(update.is_none());
        assert_eq!(controller.current_value(), Some(1.0));
    }

    #[tokio::test]
    async fn mode_group_publishes_shared_mode() {
        let port = Arc::new(RecordingPort::new());
        let shared = Arc::new(ModeShared::new());
        let mut controller = FieldController::new(
            Box::new(TargetModeCodec {
                supports_heat: false,
                eco_cool: false,
            }),
            CommandVerb::Set,
            "airState.opMode",
            Access::ReadWrite,
            Behavior::ModeGroup {
                shared: shared.clone(),
            },
            link(port, Protocol::Thinq2),
        );
        controller.apply_snapshot(&snapshot(&[("airState.opMode", 2.0)]));
        assert_eq!(shared.mode(), Some(TargetMode::Auto));
        assert!(shared.locked());

        controller.set_value(TargetMode::Cool.value()).await.unwrap();
        assert_eq!(shared.mode(), Some(TargetMode::Cool));
        assert!(!shared.locked());
    }

    #[tokio::test]
    async fn legacy_link_translates_operation_writes() {
        let port = Arc::new(RecordingPort::new());
        let mut controller = FieldController::new(
            Box::new(PowerCodec),
            CommandVerb::Operation,
            "airState.operation",
            Access::ReadWrite,
            Behavior::Plain,
            link(port.clone(), Protocol::Thinq1),
        );
        controller.set_value(1.0).await.unwrap();
        let sent = port.sent.lock().unwrap();
        assert_eq!(sent[0].0, "legacy");
        assert_eq!(sent[0].2, serde_json::json!("Start"));
    }
}
