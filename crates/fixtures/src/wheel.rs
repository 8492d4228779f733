use serde::{Deserialize, Serialize};

use crate::DefinitionParseError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);
    pub const YELLOW: Rgb = Rgb::new(255, 255, 0);
    pub const CYAN: Rgb = Rgb::new(0, 255, 255);
    pub const MAGENTA: Rgb = Rgb::new(255, 0, 255);
    pub const ORANGE: Rgb = Rgb::new(255, 128, 0);
    pub const PURPLE: Rgb = Rgb::new(128, 0, 255);
    pub const PINK: Rgb = Rgb::new(255, 105, 180);
    pub const LIME: Rgb = Rgb::new(50, 255, 50);
    pub const AMBER: Rgb = Rgb::new(255, 191, 0);
    pub const TEAL: Rgb = Rgb::new(0, 128, 128);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// Squared Euclidean distance in RGB space.
    pub fn distance_squared(&self, other: &Rgb) -> u32 {
        let d = |a: u8, b: u8| {
            let diff = a as i32 - b as i32;
            (diff * diff) as u32
        };
        d(self.r, other.r) + d(self.g, other.g) + d(self.b, other.b)
    }

    /// Looks up one of the named palette colors, case-insensitively.
    pub fn named(name: &str) -> Option<Rgb> {
        let color = match name.trim().to_lowercase().as_str() {
            "off" | "black" => Rgb::OFF,
            "white" => Rgb::WHITE,
            "red" => Rgb::RED,
            "green" => Rgb::GREEN,
            "blue" => Rgb::BLUE,
            "yellow" => Rgb::YELLOW,
            "cyan" => Rgb::CYAN,
            "magenta" => Rgb::MAGENTA,
            "orange" => Rgb::ORANGE,
            "purple" => Rgb::PURPLE,
            "pink" => Rgb::PINK,
            "lime" => Rgb::LIME,
            "amber" => Rgb::AMBER,
            "teal" => Rgb::TEAL,
            _ => return None,
        };
        Some(color)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelColor {
    pub dmx: u8,
    pub name: String,
    pub rgb: Rgb,
    #[serde(default)]
    pub has_texture: bool,
}

impl WheelColor {
    pub fn new(dmx: u8, name: &str, rgb: Rgb) -> Self {
        WheelColor {
            dmx,
            name: name.to_string(),
            rgb,
            has_texture: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorWheelMap {
    /// Slots in ascending DMX order.
    pub colors: Vec<WheelColor>,
    pub allows_continuous_spin: bool,
    pub spin_start_dmx: Option<u8>,
    pub min_change_time_ms: u64,
}

impl ColorWheelMap {
    pub const DEFAULT_MIN_CHANGE_TIME_MS: u64 = 500;

    pub fn new(mut colors: Vec<WheelColor>) -> Self {
        colors.sort_by_key(|c| c.dmx);
        ColorWheelMap {
            colors,
            allows_continuous_spin: false,
            spin_start_dmx: None,
            min_change_time_ms: Self::DEFAULT_MIN_CHANGE_TIME_MS,
        }
    }

    pub fn with_spin(mut self, spin_start_dmx: u8) -> Self {
        self.allows_continuous_spin = true;
        self.spin_start_dmx = Some(spin_start_dmx);
        self
    }

    pub fn with_min_change_time(mut self, min_change_time_ms: u64) -> Self {
        self.min_change_time_ms = min_change_time_ms;
        self
    }

    pub fn slot(&self, dmx: u8) -> Option<&WheelColor> {
        self.colors.iter().find(|c| c.dmx == dmx)
    }

    pub fn validate(&self) -> Result<(), DefinitionParseError> {
        if self.colors.is_empty() {
            return Err(DefinitionParseError::InvalidWheel(
                "wheel has no colors".to_string(),
            ));
        }
        for pair in self.colors.windows(2) {
            if pair[0].dmx == pair[1].dmx {
                return Err(DefinitionParseError::InvalidWheel(format!(
                    "duplicate wheel slot at dmx {}",
                    pair[0].dmx
                )));
            }
        }
        if let Some(spin) = self.spin_start_dmx {
            if let Some(slot) = self.colors.iter().find(|c| c.dmx >= spin) {
                return Err(DefinitionParseError::InvalidWheel(format!(
                    "slot '{}' at dmx {} overlaps the spin range starting at {}",
                    slot.name, slot.dmx, spin
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        assert_eq!(Rgb::RED.distance_squared(&Rgb::RED), 0);
        assert_eq!(Rgb::RED.distance_squared(&Rgb::OFF), 255 * 255);
        assert_eq!(Rgb::named("Orange"), Some(Rgb::ORANGE));
        assert_eq!(Rgb::named("chartreuse"), None);
    }

    #[test]
    fn test_wheel_sorted_and_validated() {
        let wheel = ColorWheelMap::new(vec![
            WheelColor::new(30, "Blue", Rgb::BLUE),
            WheelColor::new(0, "Open", Rgb::WHITE),
        ]);
        assert_eq!(wheel.colors[0].dmx, 0);
        assert_eq!(wheel.min_change_time_ms, 500);
        assert!(wheel.validate().is_ok());

        let spinning_into_slots = wheel.clone().with_spin(20);
        assert!(spinning_into_slots.validate().is_err());

        let duplicate = ColorWheelMap::new(vec![
            WheelColor::new(10, "Red", Rgb::RED),
            WheelColor::new(10, "Green", Rgb::GREEN),
        ]);
        assert!(duplicate.validate().is_err());
    }
}
