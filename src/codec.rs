use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use crate::temperature::TemperatureBridge;
use crate::types::{CharacteristicKind, CurrentMode, Power, SwingState, TargetMode};
use crate::{Error, Result};

/// Bidirectional pure mapping between a vendor-encoded value and the
/// HomeKit characteristic value for one field.
///
/// `decode(encode(x)) == x` for every value `x` in the characteristic's
/// declared domain set. Vendor codes outside the known range decode to
/// [`Error::Decode`]; domain values outside the closed set encode to
/// [`Error::Encode`].
pub trait Codec: Send + Sync {
    fn kind(&self) -> CharacteristicKind;

    /// Vendor API value -> HomeKit characteristic value.
    fn decode(&self, api: f64) -> Result<f64>;

    /// HomeKit characteristic value -> vendor API value.
    fn encode(&self, state: f64) -> Result<f64>;
}

fn decode_err(kind: CharacteristicKind, raw: f64) -> Error {
    Error::Decode {
        characteristic: kind,
        raw,
    }
}

fn encode_err(kind: CharacteristicKind, value: f64) -> Error {
    Error::Encode {
        characteristic: kind,
        value,
    }
}

/// `airState.operation`: 1/0 power toggle, sent with the Operation verb.
pub struct PowerCodec;

impl Codec for PowerCodec {
    fn kind(&self) -> CharacteristicKind {
        CharacteristicKind::Active
    }

    fn decode(&self, api: f64) -> Result<f64> {
        match api as i64 {
            1 => Ok(Power::Active.value()),
            0 => Ok(Power::Inactive.value()),
            _ => Err(decode_err(self.kind(), api)),
        }
    }

    fn encode(&self, state: f64) -> Result<f64> {
        match Power::from_value(state) {
            Some(Power::Active) => Ok(1.0),
            Some(Power::Inactive) => Ok(0.0),
            None => Err(encode_err(self.kind(), state)),
        }
    }
}

/// `airState.opMode` as a settable target state.
///
/// Heat-capable hardware uses a shifted enum range (4 = heat) and an
/// alternate "eco cool" code 8; both 0 and 8 decode to COOL, and 8 is only
/// emitted when eco cooling is enabled by config.
pub struct TargetModeCodec {
    pub supports_heat: bool,
    pub eco_cool: bool,
}

impl Codec for TargetModeCodec {
    fn kind(&self) -> CharacteristicKind {
        CharacteristicKind::TargetHeaterCoolerState
    }

    fn decode(&self, api: f64) -> Result<f64> {
        let mode = if self.supports_heat {
            match api as i64 {
                0 | 8 => TargetMode::Cool,
                4 => TargetMode::Heat,
                2 => TargetMode::Auto,
                _ => return Err(decode_err(self.kind(), api)),
            }
        } else {
            match api as i64 {
                0 => TargetMode::Cool,
                1 => TargetMode::Heat,
                2 => TargetMode::Auto,
                _ => return Err(decode_err(self.kind(), api)),
            }
        };
        Ok(mode.value())
    }

    fn encode(&self, state: f64) -> Result<f64> {
        let mode = TargetMode::from_value(state).ok_or_else(|| encode_err(self.kind(), state))?;
        let api = if self.supports_heat {
            match mode {
                TargetMode::Cool if self.eco_cool => 8,
                TargetMode::Cool => 0,
                TargetMode::Heat => 4,
                TargetMode::Auto => 2,
            }
        } else {
            match mode {
                TargetMode::Cool => 0,
                TargetMode::Heat => 1,
                TargetMode::Auto => 2,
            }
        };
        Ok(api as f64)
    }
}

/// `airState.opMode` re-read as the current running state.
pub struct CurrentModeCodec {
    pub supports_heat: bool,
}

impl Codec for CurrentModeCodec {
    fn kind(&self) -> CharacteristicKind {
        CharacteristicKind::CurrentHeaterCoolerState
    }

    fn decode(&self, api: f64) -> Result<f64> {
        let heating_code = if self.supports_heat { 4 } else { 1 };
        let state = match api as i64 {
            0 => CurrentMode::Cooling,
            c if c == heating_code => CurrentMode::Heating,
            2 => CurrentMode::Idle,
            _ => return Err(decode_err(self.kind(), api)),
        };
        Ok(state.value())
    }

    fn encode(&self, state: f64) -> Result<f64> {
        let heating_code = if self.supports_heat { 4.0 } else { 1.0 };
        match state as i64 {
            3 => Ok(0.0),
            2 => Ok(heating_code),
            1 => Ok(2.0),
            _ => Err(encode_err(self.kind(), state)),
        }
    }
}

/// `airState.wDir.vStep`: 0 = no swing, 100 = full swing.
///
/// Some units report variable-position swing (codes 1..9) the domain cannot
/// represent; those decode to ENABLED with a one-time warning.
pub struct SwingCodec {
    warned_variable: AtomicBool,
}

impl SwingCodec {
    pub fn new() -> Self {
        Self {
            warned_variable: AtomicBool::new(false),
        }
    }
}

impl Default for SwingCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for SwingCodec {
    fn kind(&self) -> CharacteristicKind {
        CharacteristicKind::SwingMode
    }

    fn decode(&self, api: f64) -> Result<f64> {
        if api > 0.0 && api < 10.0 {
            if !self.warned_variable.swap(true, Ordering::Relaxed) {
                warn!(
                    value = api,
                    "unit reports variable-position swing, which HomeKit cannot represent; \
                     treating as enabled"
                );
            }
            return Ok(SwingState::Enabled.value());
        }
        match api as i64 {
            0 => Ok(SwingState::Disabled.value()),
            100 => Ok(SwingState::Enabled.value()),
            _ => Err(decode_err(self.kind(), api)),
        }
    }

    fn encode(&self, state: f64) -> Result<f64> {
        match state as i64 {
            0 => Ok(0.0),
            1 => Ok(100.0),
            _ => Err(encode_err(self.kind(), state)),
        }
    }
}

const FAN_STEP: f64 = 2.0;
const FAN_MIN: f64 = 2.0;

/// `airState.windStrength` on variable-step hardware: integer multiples of
/// the per-model step size, bounded by the model's speed count. Decode
/// doubles as
/// the normalization function, so encode snaps requested values to the
/// nearest valid step.
pub struct FanSpeedCodec {
    pub num_speeds: u32,
}

impl FanSpeedCodec {
    fn snap(&self, value: f64) -> f64 {
        let top = f64::from(self.num_speeds) * FAN_STEP;
        let normalized = (value / FAN_STEP).round() * FAN_STEP;
        normalized.clamp(FAN_MIN, top)
    }
}

impl Codec for FanSpeedCodec {
    fn kind(&self) -> CharacteristicKind {
        CharacteristicKind::RotationSpeed
    }

    fn decode(&self, api: f64) -> Result<f64> {
        Ok(self.snap(api))
    }

    fn encode(&self, state: f64) -> Result<f64> {
        Ok(self.snap(state))
    }
}

/// Fixed 3-step fan codec used by the legacy protocol: wind strength codes
/// 2/4/6 map to 33/66/100 percent.
pub struct PercentFanSpeedCodec;

impl Codec for PercentFanSpeedCodec {
    fn kind(&self) -> CharacteristicKind {
        CharacteristicKind::RotationSpeed
    }

    fn decode(&self, api: f64) -> Result<f64> {
        match api as i64 {
            2 => Ok(33.0),
            4 => Ok(66.0),
            6 => Ok(100.0),
            _ => Err(decode_err(self.kind(), api)),
        }
    }

    fn encode(&self, state: f64) -> Result<f64> {
        if state > 90.0 {
            Ok(6.0)
        } else if state > 40.0 {
            Ok(4.0)
        } else {
            Ok(2.0)
        }
    }
}

/// Synthesized `useTime >= maxTime` indicator (see the filter controllers'
/// derived-field behavior; the synthetic key carries 0/1).
pub struct FilterChangeCodec;

impl Codec for FilterChangeCodec {
    fn kind(&self) -> CharacteristicKind {
        CharacteristicKind::FilterChangeIndication
    }

    fn decode(&self, api: f64) -> Result<f64> {
        match api as i64 {
            1 => Ok(1.0),
            0 => Ok(0.0),
            _ => Err(decode_err(self.kind(), api)),
        }
    }

    fn encode(&self, state: f64) -> Result<f64> {
        match state as i64 {
            1 => Ok(1.0),
            0 => Ok(0.0),
            _ => Err(encode_err(self.kind(), state)),
        }
    }
}

/// Synthesized remaining-filter-life percentage, already 0-100.
pub struct FilterLifeCodec;

impl Codec for FilterLifeCodec {
    fn kind(&self) -> CharacteristicKind {
        CharacteristicKind::FilterLifeLevel
    }

    fn decode(&self, api: f64) -> Result<f64> {
        Ok(api)
    }

    fn encode(&self, state: f64) -> Result<f64> {
        Ok(state)
    }
}

/// Temperature field: both directions go through the unit bridge, which is
/// the identity for Celsius locales and a firmware lookup table for
/// Fahrenheit ones.
pub struct TemperatureCodec {
    kind: CharacteristicKind,
    bridge: Arc<TemperatureBridge>,
}

impl TemperatureCodec {
    pub fn new(kind: CharacteristicKind, bridge: Arc<TemperatureBridge>) -> Self {
        Self { kind, bridge }
    }
}

impl Codec for TemperatureCodec {
    fn kind(&self) -> CharacteristicKind {
        self.kind
    }

    fn decode(&self, api: f64) -> Result<f64> {
        Ok(self.bridge.to_display(api))
    }

    fn encode(&self, state: f64) -> Result<f64> {
        Ok(self.bridge.to_internal(state))
    }
}
