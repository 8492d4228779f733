use std::path::PathBuf;

use luxsync_fixtures::Rgb;
use serde::{Deserialize, Serialize};

use crate::instance::InstanceId;
use crate::color_wheel::WheelSettings;

/// Commands sent to the engine task
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    // Patching
    Patch {
        definition_id: String,
        address: Option<u16>,
        universe: Option<u16>,
        label: Option<String>,
    },
    Unpatch {
        id: InstanceId,
    },
    EditAddress {
        id: InstanceId,
        address: u16,
        universe: Option<u16>,
    },

    // Fixture control
    SetColor {
        id: InstanceId,
        red: f64,
        green: f64,
        blue: f64,
        white: f64,
    },
    SetDimmer {
        id: InstanceId,
        value: f64,
    },
    SetStrobe {
        id: InstanceId,
        value: f64,
    },
    MoveTo {
        id: InstanceId,
        pan: f64,
        tilt: f64,
    },
    SetGobo {
        id: InstanceId,
        index: f64,
        rotation: f64,
    },
    SetPrism {
        id: InstanceId,
        enabled: bool,
        rotation: f64,
    },
    SetZoom {
        id: InstanceId,
        value: f64,
    },
    SetFocus {
        id: InstanceId,
        value: f64,
    },
    SetFrost {
        id: InstanceId,
        value: f64,
    },
    SetColorWheel {
        id: InstanceId,
        red: f64,
        green: f64,
        blue: f64,
    },
    Blackout {
        id: InstanceId,
    },
    BlackoutAll,
    FullOn {
        id: InstanceId,
        color: Rgb,
    },
}

/// Events reported by the engine task
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Patched {
        id: InstanceId,
        definition_id: String,
        universe: u16,
        address: u16,
    },
    Unpatched {
        id: InstanceId,
    },
    AddressChanged {
        id: InstanceId,
        universe: u16,
        address: u16,
    },
}

/// Settings configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    // Engine settings
    pub tick_rate_hz: u32,

    // Fixture definitions
    pub definitions_dir: PathBuf,
    pub include_builtin_definitions: bool,

    // Output settings (DMX/Art-Net)
    pub dmx_enabled: bool,
    pub dmx_broadcast: bool,
    pub dmx_source_ip: String,
    pub dmx_dest_ip: String,
    pub dmx_port: u16,

    // Color wheel protection
    pub wheel_safety_margin: f64,
    pub wheel_chaos_threshold: u32,
    pub wheel_latch_ms: u64,
}

impl Settings {
    pub fn wheel_settings(&self) -> WheelSettings {
        WheelSettings {
            safety_margin: self.wheel_safety_margin,
            chaos_threshold: self.wheel_chaos_threshold,
            latch_duration_ms: self.wheel_latch_ms,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Engine defaults
            tick_rate_hz: 44,

            // Definition defaults
            definitions_dir: default_definitions_dir(),
            include_builtin_definitions: true,

            // Output defaults
            dmx_enabled: true,
            dmx_broadcast: false,
            dmx_source_ip: "192.168.1.100".to_string(),
            dmx_dest_ip: "192.168.1.200".to_string(),
            dmx_port: 6454,

            // Wheel defaults
            wheel_safety_margin: 1.0,
            wheel_chaos_threshold: 3,
            wheel_latch_ms: 2000,
        }
    }
}

fn default_definitions_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("luxsync").join("fixtures"))
        .unwrap_or_else(|| PathBuf::from("fixtures"))
}
