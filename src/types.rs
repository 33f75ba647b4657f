use std::fmt;

use serde_json::{Map, Value};

/// Semantic characteristic exposed to the home-automation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacteristicKind {
    Active,
    TargetHeaterCoolerState,
    CurrentHeaterCoolerState,
    RotationSpeed,
    SwingMode,
    CoolingThresholdTemperature,
    HeatingThresholdTemperature,
    CurrentTemperature,
    FilterChangeIndication,
    FilterLifeLevel,
}

impl fmt::Display for CharacteristicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CharacteristicKind::Active => "Active",
            CharacteristicKind::TargetHeaterCoolerState => "TargetHeaterCoolerState",
            CharacteristicKind::CurrentHeaterCoolerState => "CurrentHeaterCoolerState",
            CharacteristicKind::RotationSpeed => "RotationSpeed",
            CharacteristicKind::SwingMode => "SwingMode",
            CharacteristicKind::CoolingThresholdTemperature => "CoolingThresholdTemperature",
            CharacteristicKind::HeatingThresholdTemperature => "HeatingThresholdTemperature",
            CharacteristicKind::CurrentTemperature => "CurrentTemperature",
            CharacteristicKind::FilterChangeIndication => "FilterChangeIndication",
            CharacteristicKind::FilterLifeLevel => "FilterLifeLevel",
        };
        write!(f, "{name}")
    }
}

/// The vendor API segregates instantaneous actions ("Operation") from
/// configuration changes ("Set"); a mispaired verb is rejected server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandVerb {
    Set,
    Operation,
}

impl CommandVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandVerb::Set => "Set",
            CommandVerb::Operation => "Operation",
        }
    }
}

/// Device-control protocol generation for the owning account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Thinq2,
    /// Older protocol requiring field-name and value-shape translation.
    Thinq1,
}

impl Protocol {
    pub fn from_platform_type(s: &str) -> Option<Self> {
        match s {
            "thinq2" => Some(Protocol::Thinq2),
            "thinq1" => Some(Protocol::Thinq1),
            _ => None,
        }
    }
}

/// HomeKit `Active` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Power {
    Inactive,
    Active,
}

impl Power {
    pub fn value(self) -> f64 {
        match self {
            Power::Inactive => 0.0,
            Power::Active => 1.0,
        }
    }

    pub fn from_value(v: f64) -> Option<Self> {
        match v as i64 {
            0 => Some(Power::Inactive),
            1 => Some(Power::Active),
            _ => None,
        }
    }
}

/// HomeKit `TargetHeaterCoolerState` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMode {
    Auto,
    Heat,
    Cool,
}

impl TargetMode {
    pub fn value(self) -> f64 {
        match self {
            TargetMode::Auto => 0.0,
            TargetMode::Heat => 1.0,
            TargetMode::Cool => 2.0,
        }
    }

    pub fn from_value(v: f64) -> Option<Self> {
        match v as i64 {
            0 => Some(TargetMode::Auto),
            1 => Some(TargetMode::Heat),
            2 => Some(TargetMode::Cool),
            _ => None,
        }
    }
}

/// HomeKit `CurrentHeaterCoolerState` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentMode {
    Inactive,
    Idle,
    Heating,
    Cooling,
}

impl CurrentMode {
    pub fn value(self) -> f64 {
        match self {
            CurrentMode::Inactive => 0.0,
            CurrentMode::Idle => 1.0,
            CurrentMode::Heating => 2.0,
            CurrentMode::Cooling => 3.0,
        }
    }
}

/// HomeKit `SwingMode` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwingState {
    Disabled,
    Enabled,
}

impl SwingState {
    pub fn value(self) -> f64 {
        match self {
            SwingState::Disabled => 0.0,
            SwingState::Enabled => 1.0,
        }
    }
}

/// Point-in-time read of the vendor-reported device fields: a flat mapping
/// from dot-path key (e.g. `airState.tempState.target`) to a scalar.
/// Produced once per refresh cycle; each controller reads only its own keys.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    fields: Map<String, Value>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self { fields: Map::new() }
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.fields.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Copy with one extra key, used to inject synthesized/derived fields
    /// ahead of the generic decode path.
    pub fn with_field(&self, key: &str, value: Value) -> Self {
        let mut fields = self.fields.clone();
        fields.insert(key.to_string(), value);
        Self { fields }
    }
}

/// Externally-visible value change pushed to the host framework after a
/// snapshot apply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacteristicUpdate {
    pub kind: CharacteristicKind,
    pub value: f64,
}
