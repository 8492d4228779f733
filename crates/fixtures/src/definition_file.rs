//! On-disk fixture definition format.
//!
//! One JSON document per fixture model. Everything except `name` and
//! `channels` is optional; a partial `physics` block is layered over the
//! defaults of its motor class.

use std::path::Path;

use serde::Deserialize;

use crate::{
    Channel, ChannelType, ColorWheelMap, DefinitionParseError, FixtureDefinition, FixtureType,
    HomePosition, MotorType, Orientation, PhysicsProfile, Rgb, TiltLimits, WheelColor,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionFile {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    manufacturer: String,
    #[serde(default, rename = "type")]
    fixture_type: Option<String>,
    #[serde(default)]
    channels: Vec<ChannelEntry>,
    #[serde(default)]
    physics: Option<PhysicsEntry>,
    #[serde(default, alias = "wheel")]
    wheels: Option<WheelEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelEntry {
    #[serde(default)]
    index: Option<usize>,
    #[serde(rename = "type")]
    channel_type: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    default_value: Option<u8>,
    #[serde(default, rename = "is16bit", alias = "is16Bit")]
    is_16bit: bool,
}

/// Older files carry a numeric safety factor where newer ones carry a flag.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SafetyCapEntry {
    Flag(bool),
    Factor(f64),
}

impl SafetyCapEntry {
    fn enabled(&self) -> bool {
        match self {
            SafetyCapEntry::Flag(flag) => *flag,
            SafetyCapEntry::Factor(factor) => *factor > 0.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhysicsEntry {
    motor_type: Option<String>,
    max_acceleration: Option<f64>,
    max_velocity: Option<f64>,
    safety_cap: Option<SafetyCapEntry>,
    orientation: Option<Orientation>,
    invert_pan: Option<bool>,
    invert_tilt: Option<bool>,
    swap_pan_tilt: Option<bool>,
    home_position: Option<HomePosition>,
    tilt_limits: Option<TiltLimits>,
}

impl PhysicsEntry {
    fn into_profile(self) -> PhysicsProfile {
        let motor_type = self
            .motor_type
            .as_deref()
            .map(MotorType::from_token)
            .unwrap_or_default();
        let defaults = motor_type.default_profile();

        PhysicsProfile {
            motor_type,
            max_acceleration: self.max_acceleration.unwrap_or(defaults.max_acceleration),
            max_velocity: self.max_velocity.unwrap_or(defaults.max_velocity),
            safety_cap: self
                .safety_cap
                .map(|cap| cap.enabled())
                .unwrap_or(defaults.safety_cap),
            orientation: self.orientation.unwrap_or(defaults.orientation),
            invert_pan: self.invert_pan.unwrap_or(defaults.invert_pan),
            invert_tilt: self.invert_tilt.unwrap_or(defaults.invert_tilt),
            swap_pan_tilt: self.swap_pan_tilt.unwrap_or(defaults.swap_pan_tilt),
            home_position: self.home_position.unwrap_or(defaults.home_position),
            tilt_limits: self.tilt_limits.unwrap_or(defaults.tilt_limits),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WheelEntry {
    #[serde(default)]
    colors: Vec<WheelColorEntry>,
    #[serde(default)]
    allows_continuous_spin: bool,
    #[serde(default)]
    spin_start_dmx: Option<u8>,
    #[serde(default)]
    min_change_time_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WheelColorEntry {
    dmx: u8,
    name: String,
    rgb: Rgb,
    #[serde(default)]
    has_texture: bool,
}

impl WheelEntry {
    fn into_map(self) -> ColorWheelMap {
        let colors = self
            .colors
            .into_iter()
            .map(|c| WheelColor {
                dmx: c.dmx,
                name: c.name,
                rgb: c.rgb,
                has_texture: c.has_texture,
            })
            .collect();

        let mut map = ColorWheelMap::new(colors);
        map.allows_continuous_spin = self.allows_continuous_spin || self.spin_start_dmx.is_some();
        map.spin_start_dmx = self.spin_start_dmx;
        map.min_change_time_ms = self
            .min_change_time_ms
            .unwrap_or(ColorWheelMap::DEFAULT_MIN_CHANGE_TIME_MS);
        map
    }
}

/// Parses a single JSON definition document.
pub fn parse_definition(json: &str) -> Result<FixtureDefinition, DefinitionParseError> {
    let file: DefinitionFile = serde_json::from_str(json)?;

    let channels = file
        .channels
        .into_iter()
        .enumerate()
        .map(|(position, entry)| {
            let channel_type = ChannelType::from_token(&entry.channel_type);
            let name = entry.name.unwrap_or_else(|| channel_type.to_string());
            Channel {
                index: entry.index.unwrap_or(position),
                name,
                channel_type,
                default_value: entry
                    .default_value
                    .unwrap_or_else(|| channel_type.resting_value()),
                is_16bit: entry.is_16bit,
            }
        })
        .collect();

    let fixture_type = file.fixture_type.as_deref().and_then(FixtureType::from_token);
    let physics = file.physics.unwrap_or_default().into_profile();
    let wheel = file.wheels.map(WheelEntry::into_map);

    FixtureDefinition::new(
        file.id.as_deref().unwrap_or(""),
        &file.name,
        &file.manufacturer,
        fixture_type,
        channels,
        physics,
        wheel,
    )
}

pub fn parse_definition_file(path: &Path) -> Result<FixtureDefinition, DefinitionParseError> {
    let contents = std::fs::read_to_string(path).map_err(|source| DefinitionParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_definition(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BEAM: &str = r#"{
        "id": "beam-2r",
        "name": "Beam 2R",
        "manufacturer": "Generic",
        "type": "moving-head",
        "channels": [
            { "index": 0, "type": "pan", "name": "Pan" },
            { "index": 1, "type": "pan_fine", "name": "Pan Fine", "is16bit": true },
            { "index": 2, "type": "tilt", "name": "Tilt" },
            { "index": 3, "type": "color_wheel", "name": "Color" },
            { "index": 4, "type": "dimmer", "name": "Dimmer", "defaultValue": 255 },
            { "index": 5, "type": "mystery_motor", "name": "Mystery" }
        ],
        "physics": { "motorType": "stepper", "maxVelocity": 350, "safetyCap": 0.85 },
        "wheels": {
            "colors": [
                { "dmx": 15, "name": "Red", "rgb": { "r": 255, "g": 0, "b": 0 } },
                { "dmx": 0, "name": "Open", "rgb": { "r": 255, "g": 255, "b": 255 } }
            ],
            "allowsContinuousSpin": true,
            "spinStartDmx": 190
        }
    }"#;

    #[test]
    fn test_parse_full_definition() {
        let def = parse_definition(BEAM).unwrap();
        assert_eq!(def.id(), "beam-2r");
        assert_eq!(def.fixture_type(), FixtureType::MovingHead);
        assert_eq!(def.channel_count(), 6);
        assert_eq!(def.channels()[5].channel_type, ChannelType::Unknown);
        assert_eq!(def.channels()[4].default_value, 255);
        assert!(def.channels()[1].is_16bit);

        let wheel = def.wheel().unwrap();
        assert_eq!(wheel.colors[0].name, "Open");
        assert_eq!(wheel.spin_start_dmx, Some(190));
        assert_eq!(wheel.min_change_time_ms, 500);
    }

    #[test]
    fn test_partial_physics_merges_over_motor_defaults() {
        let def = parse_definition(BEAM).unwrap();
        let physics = def.physics();
        assert_eq!(physics.motor_type, MotorType::StepperQuality);
        assert_eq!(physics.max_velocity, 350.0);
        assert_eq!(physics.max_acceleration, 2500.0);
        assert!(physics.safety_cap);
        assert_eq!(physics.tilt_limits, TiltLimits { min: 20, max: 200 });
    }

    #[test]
    fn test_missing_physics_uses_unknown_motor() {
        let def = parse_definition(
            r#"{ "name": "Tiny Par", "manufacturer": "Acme",
                 "channels": [ { "type": "red" }, { "type": "green" }, { "type": "blue" } ] }"#,
        )
        .unwrap();
        assert_eq!(def.id(), "acme_tiny_par");
        assert_eq!(def.fixture_type(), FixtureType::Par);
        assert_eq!(def.physics(), &PhysicsProfile::default());
        assert_eq!(def.channels()[0].name, "Red");
    }

    #[test]
    fn test_shutter_rests_open_unless_told_otherwise() {
        let def = parse_definition(
            r#"{ "name": "Blinder", "manufacturer": "Acme",
                 "channels": [ { "type": "dimmer" }, { "type": "shutter" },
                               { "type": "shutter", "defaultValue": 0 } ] }"#,
        )
        .unwrap();
        let defaults: Vec<u8> = def.channels().iter().map(|c| c.default_value).collect();
        assert_eq!(defaults, vec![0, 255, 0]);
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(
            parse_definition("{ not json"),
            Err(DefinitionParseError::Json(_))
        ));
        assert!(matches!(
            parse_definition(r#"{ "name": "Empty", "channels": [] }"#),
            Err(DefinitionParseError::NoChannels)
        ));
        assert!(matches!(
            parse_definition(
                r#"{ "name": "Bad", "channels": [ { "type": "dimmer" } ],
                     "physics": { "maxAcceleration": -5 } }"#
            ),
            Err(DefinitionParseError::InvalidPhysics(_))
        ));
    }
}
