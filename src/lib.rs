mod accessory;
mod client;
mod codec;
mod controller;
mod error;
mod legacy;
mod logger;
mod registry;
mod temperature;
mod types;

pub use accessory::{AcAccessory, AccessoryConfig};
pub use client::{DevicePort, ThinqClient, ThinqClientBuilder};
pub use codec::{
    Codec, CurrentModeCodec, FanSpeedCodec, FilterChangeCodec, FilterLifeCodec,
    PercentFanSpeedCodec, PowerCodec, SwingCodec, TargetModeCodec, TemperatureCodec,
};
pub use controller::{
    Access, Behavior, Characteristic, DeviceLink, FieldController, FilterMetric, ModeShared,
    SetOutcome, SetpointMode, MAX_TARGET_CELSIUS, MIN_TARGET_CELSIUS, TARGET_CELSIUS_STEP,
};
pub use error::{Error, Result};
pub use logger::CommandLogMode;
pub use registry::{CapabilityProfile, FanCapability, build_controllers, profile_for_model};
pub use temperature::{DisplayUnit, TemperatureBridge, round_half_celsius};
pub use types::*;
