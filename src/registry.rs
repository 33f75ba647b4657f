use std::sync::Arc;

use tracing::warn;

use crate::codec::{
    CurrentModeCodec, FanSpeedCodec, FilterChangeCodec, FilterLifeCodec, PercentFanSpeedCodec,
    PowerCodec, SwingCodec, TargetModeCodec, TemperatureCodec,
};
use crate::controller::{
    Access, Behavior, Characteristic, DeviceLink, FieldController, FilterMetric, ModeShared,
    SetpointMode,
};
use crate::temperature::TemperatureBridge;
use crate::types::{CharacteristicKind, CommandVerb, Protocol};

/// Fan control as the hardware exposes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanCapability {
    /// Variable-step wind strength, `num_speeds` discrete steps of size 2.
    Stepped(u32),
    /// Fixed 3-step percentage mapping used by legacy-protocol devices.
    LegacyPercent,
    /// No representable fan control (e.g. ranges like 2056 on some
    /// portables).
    Unsupported,
}

/// Per-model capability profile: which controllers exist for a device and
/// how they are parametrized. Read-only after load.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityProfile {
    pub model: &'static str,
    pub swing: bool,
    pub fan: FanCapability,
    pub supports_heat: bool,
}

const FALLBACK_PROFILE: CapabilityProfile = CapabilityProfile {
    model: "POT_056905_WW",
    swing: true,
    fan: FanCapability::Stepped(3),
    supports_heat: false,
};

/// Resolve the capability profile for a device model string. Unrecognized
/// models fall back to the default profile with a warning naming the model;
/// guessing a newer encoding's semantics is worse than degrading.
pub fn profile_for_model(model: &str) -> CapabilityProfile {
    match model {
        "RAC_056905_WW" | "CVT_493401_WW" => CapabilityProfile {
            model: "RAC_056905_WW",
            swing: true,
            fan: FanCapability::Stepped(4),
            supports_heat: true,
        },
        // LW8017ERSM has 3 fan modes, LW1517IVSM has 4
        "WIN_056905_WW" => CapabilityProfile {
            model: "WIN_056905_WW",
            swing: false,
            fan: FanCapability::Stepped(3),
            supports_heat: false,
        },
        // FQ17SADWEN: swing uses upDown/leftRight values and fan speeds run
        // in ranges like 2056, neither representable here
        "PAC_910604_WW" => CapabilityProfile {
            model: "PAC_910604_WW",
            swing: false,
            fan: FanCapability::Unsupported,
            supports_heat: false,
        },
        // LP1419IVSM
        "POT_056905_WW" => FALLBACK_PROFILE,
        other => {
            warn!(
                model = other,
                fallback = FALLBACK_PROFILE.model,
                "unrecognized device model, using fallback capability profile"
            );
            FALLBACK_PROFILE
        }
    }
}

/// Build the ordered controller set for a device. Controllers are created
/// once at accessory construction and live for the accessory's lifetime;
/// the returned `ModeShared` is the lock/mode state the accessory can also
/// inspect.
pub fn build_controllers(
    profile: &CapabilityProfile,
    link: DeviceLink,
    bridge: Arc<TemperatureBridge>,
    eco_cool: bool,
) -> (Vec<Box<dyn Characteristic>>, Arc<ModeShared>) {
    let shared = Arc::new(ModeShared::new());
    let mut controllers: Vec<Box<dyn Characteristic>> = Vec::new();

    controllers.push(Box::new(FieldController::new(
        Box::new(PowerCodec),
        CommandVerb::Operation,
        "airState.operation",
        Access::ReadWrite,
        Behavior::Plain,
        link.clone(),
    )));

    if profile.swing {
        controllers.push(Box::new(FieldController::new(
            Box::new(SwingCodec::new()),
            CommandVerb::Set,
            "airState.wDir.vStep",
            Access::ReadWrite,
            Behavior::Plain,
            link.clone(),
        )));
    }

    // Legacy-protocol devices report only the fixed 3-step wind strengths.
    let fan = if link.protocol() == Protocol::Thinq1 {
        FanCapability::LegacyPercent
    } else {
        profile.fan
    };
    match fan {
        FanCapability::Stepped(num_speeds) => {
            controllers.push(Box::new(FieldController::new(
                Box::new(FanSpeedCodec { num_speeds }),
                CommandVerb::Set,
                "airState.windStrength",
                Access::ReadWrite,
                Behavior::Plain,
                link.clone(),
            )));
        }
        FanCapability::LegacyPercent => {
            controllers.push(Box::new(FieldController::new(
                Box::new(PercentFanSpeedCodec),
                CommandVerb::Set,
                "airState.windStrength",
                Access::ReadWrite,
                Behavior::Plain,
                link.clone(),
            )));
        }
        FanCapability::Unsupported => {}
    }

    for mode in [SetpointMode::Cool, SetpointMode::Heat] {
        let kind = match mode {
            SetpointMode::Cool => CharacteristicKind::CoolingThresholdTemperature,
            SetpointMode::Heat => CharacteristicKind::HeatingThresholdTemperature,
        };
        controllers.push(Box::new(FieldController::new(
            Box::new(TemperatureCodec::new(kind, bridge.clone())),
            CommandVerb::Set,
            "airState.tempState.target",
            Access::ReadWrite,
            Behavior::Setpoint {
                mode,
                shared: shared.clone(),
            },
            link.clone(),
        )));
    }

    controllers.push(Box::new(FieldController::new(
        Box::new(TargetModeCodec {
            supports_heat: profile.supports_heat,
            eco_cool,
        }),
        CommandVerb::Set,
        "airState.opMode",
        Access::ReadWrite,
        Behavior::ModeGroup {
            shared: shared.clone(),
        },
        link.clone(),
    )));

    controllers.push(Box::new(FieldController::new(
        Box::new(CurrentModeCodec {
            supports_heat: profile.supports_heat,
        }),
        CommandVerb::Set,
        "airState.opMode",
        Access::ReadOnly,
        Behavior::Plain,
        link.clone(),
    )));

    controllers.push(Box::new(FieldController::new(
        Box::new(TemperatureCodec::new(
            CharacteristicKind::CurrentTemperature,
            bridge.clone(),
        )),
        CommandVerb::Set,
        "airState.tempState.current",
        Access::ReadOnly,
        Behavior::Plain,
        link.clone(),
    )));

    controllers.push(Box::new(FieldController::new(
        Box::new(FilterChangeCodec),
        CommandVerb::Operation,
        "",
        Access::ReadOnly,
        Behavior::DerivedFilter(FilterMetric::ChangeIndicator),
        link.clone(),
    )));

    controllers.push(Box::new(FieldController::new(
        Box::new(FilterLifeCodec),
        CommandVerb::Operation,
        "",
        Access::ReadOnly,
        Behavior::DerivedFilter(FilterMetric::LifePercent),
        link,
    )));

    (controllers, shared)
}
