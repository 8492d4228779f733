use luxsync_fixtures::FixtureDefinition;
use serde::{Deserialize, Serialize};

/// Clamps a control value into the DMX byte range. NaN maps to 0.
pub fn clamp_dmx(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 255.0) as u8
}

/// Converts a position in the 0-255 DMX domain to the 16-bit logical
/// position: the integer part becomes the coarse byte, the fraction the fine
/// byte.
pub fn position_to_u16(position: f64) -> u16 {
    if !position.is_finite() {
        return 0;
    }
    (position.clamp(0.0, 255.0) * 256.0).round().min(u16::MAX as f64) as u16
}

pub fn u16_to_position(value: u16) -> f64 {
    value as f64 / 256.0
}

/// Semantic state of one patched fixture. Byte fields hold their DMX value
/// directly; pan and tilt are 16-bit logical positions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureState {
    pub dimmer: u8,
    /// Explicit shutter position. `None` leaves the shutter at the channel's
    /// resting value.
    pub shutter: Option<u8>,
    pub strobe: u8,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub white: u8,
    pub pan: u16,
    pub tilt: u16,
    pub gobo: u8,
    pub gobo_rotation: u8,
    pub prism: bool,
    pub prism_rotation: u8,
    pub focus: u8,
    pub zoom: u8,
    pub frost: u8,
    pub color_wheel: u8,
}

impl Default for FixtureState {
    fn default() -> Self {
        FixtureState {
            dimmer: 0,
            shutter: None,
            strobe: 0,
            red: 0,
            green: 0,
            blue: 0,
            white: 0,
            pan: position_to_u16(127.0),
            tilt: position_to_u16(127.0),
            gobo: 0,
            gobo_rotation: 0,
            prism: false,
            prism_rotation: 0,
            focus: 127,
            zoom: 127,
            frost: 0,
            color_wheel: 0,
        }
    }
}

impl FixtureState {
    /// Resting state for a fixture of this model: dark, parked at home.
    pub fn home(definition: &FixtureDefinition) -> Self {
        let home = definition.physics().home_position;
        FixtureState {
            pan: position_to_u16(home.pan as f64),
            tilt: position_to_u16(home.tilt as f64),
            ..FixtureState::default()
        }
    }

    pub fn pan_position(&self) -> f64 {
        u16_to_position(self.pan)
    }

    pub fn tilt_position(&self) -> f64 {
        u16_to_position(self.tilt)
    }

    pub fn set_position(&mut self, pan: f64, tilt: f64) {
        self.pan = position_to_u16(pan);
        self.tilt = position_to_u16(tilt);
    }

    pub fn set_color(&mut self, red: f64, green: f64, blue: f64, white: f64) {
        self.red = clamp_dmx(red);
        self.green = clamp_dmx(green);
        self.blue = clamp_dmx(blue);
        self.white = clamp_dmx(white);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_clamp_dmx() {
        assert_eq!(clamp_dmx(-20.0), 0);
        assert_eq!(clamp_dmx(300.0), 255);
        assert_eq!(clamp_dmx(f64::NAN), 0);
        assert_eq!(clamp_dmx(f64::INFINITY), 255);
        assert_eq!(clamp_dmx(127.6), 128);
        for v in [-5.0, 0.0, 64.2, 255.0, 999.0] {
            let once = clamp_dmx(v);
            assert_eq!(clamp_dmx(once as f64), once);
        }
    }

    #[test]
    fn test_position_encoding() {
        assert_eq!(position_to_u16(100.0), 100 << 8);
        assert_eq!(position_to_u16(100.5), (100 << 8) | 128);
        assert_eq!(position_to_u16(255.0), 255 << 8);
        assert_eq!(position_to_u16(-3.0), 0);
        assert_relative_eq!(u16_to_position(position_to_u16(42.25)), 42.25);
    }

    #[test]
    fn test_default_state() {
        let state = FixtureState::default();
        assert_eq!(state.pan >> 8, 127);
        assert_eq!(state.focus, 127);
        assert_eq!(state.zoom, 127);
        assert_eq!(state.dimmer, 0);
        assert!(!state.prism);
    }
}
