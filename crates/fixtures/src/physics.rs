use serde::{Deserialize, Serialize};

use crate::DefinitionParseError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MotorType {
    ServoPro,
    #[serde(alias = "stepper")]
    StepperQuality,
    StepperCheap,
    #[default]
    Unknown,
}

impl MotorType {
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_lowercase().replace('_', "-").as_str() {
            "servo-pro" | "servo" => MotorType::ServoPro,
            "stepper-quality" | "stepper" => MotorType::StepperQuality,
            "stepper-cheap" => MotorType::StepperCheap,
            _ => MotorType::Unknown,
        }
    }

    /// Factory limits for this class of motor.
    pub fn default_profile(self) -> PhysicsProfile {
        let (max_acceleration, max_velocity, safety_cap, tilt_limits) = match self {
            MotorType::ServoPro => (4000.0, 800.0, false, TiltLimits { min: 20, max: 200 }),
            MotorType::StepperQuality => (2500.0, 600.0, true, TiltLimits { min: 20, max: 200 }),
            MotorType::StepperCheap => (1500.0, 400.0, true, TiltLimits { min: 30, max: 180 }),
            MotorType::Unknown => (2000.0, 500.0, true, TiltLimits { min: 20, max: 200 }),
        };

        PhysicsProfile {
            motor_type: self,
            max_acceleration,
            max_velocity,
            safety_cap,
            orientation: Orientation::Ceiling,
            invert_pan: false,
            invert_tilt: false,
            swap_pan_tilt: false,
            home_position: HomePosition::default(),
            tilt_limits,
        }
    }
}

impl std::fmt::Display for MotorType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MotorType::ServoPro => write!(f, "servo-pro"),
            MotorType::StepperQuality => write!(f, "stepper-quality"),
            MotorType::StepperCheap => write!(f, "stepper-cheap"),
            MotorType::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    #[default]
    Ceiling,
    Floor,
    WallLeft,
    WallRight,
    TrussFront,
    TrussBack,
}

/// Axis corrections an installer would usually want for a mounting position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AxisHint {
    pub invert_pan: bool,
    pub invert_tilt: bool,
    pub swap_pan_tilt: bool,
}

impl Orientation {
    /// Suggested corrections for this mounting. Never applied by the engine;
    /// the profile's explicit invert/swap flags are authoritative.
    pub fn suggested_axes(self) -> AxisHint {
        match self {
            Orientation::Ceiling => AxisHint::default(),
            Orientation::Floor => AxisHint {
                invert_tilt: true,
                ..AxisHint::default()
            },
            Orientation::WallLeft | Orientation::WallRight => AxisHint {
                swap_pan_tilt: true,
                ..AxisHint::default()
            },
            Orientation::TrussFront => AxisHint::default(),
            Orientation::TrussBack => AxisHint {
                invert_pan: true,
                ..AxisHint::default()
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomePosition {
    pub pan: u8,
    pub tilt: u8,
}

impl Default for HomePosition {
    fn default() -> Self {
        HomePosition { pan: 127, tilt: 127 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TiltLimits {
    pub min: u8,
    pub max: u8,
}

impl TiltLimits {
    pub fn clamp(&self, tilt: f64) -> f64 {
        tilt.clamp(self.min as f64, self.max as f64)
    }
}

impl Default for TiltLimits {
    fn default() -> Self {
        TiltLimits { min: 0, max: 255 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicsProfile {
    pub motor_type: MotorType,
    /// DMX units per second squared.
    pub max_acceleration: f64,
    /// DMX units per second.
    pub max_velocity: f64,
    pub safety_cap: bool,
    pub orientation: Orientation,
    pub invert_pan: bool,
    pub invert_tilt: bool,
    pub swap_pan_tilt: bool,
    pub home_position: HomePosition,
    pub tilt_limits: TiltLimits,
}

impl Default for PhysicsProfile {
    fn default() -> Self {
        MotorType::Unknown.default_profile()
    }
}

impl PhysicsProfile {
    pub fn validate(&self) -> Result<(), DefinitionParseError> {
        if !self.max_acceleration.is_finite() || self.max_acceleration <= 0.0 {
            return Err(DefinitionParseError::InvalidPhysics(format!(
                "max_acceleration must be positive, got {}",
                self.max_acceleration
            )));
        }
        if !self.max_velocity.is_finite() || self.max_velocity <= 0.0 {
            return Err(DefinitionParseError::InvalidPhysics(format!(
                "max_velocity must be positive, got {}",
                self.max_velocity
            )));
        }
        if self.tilt_limits.min > self.tilt_limits.max {
            return Err(DefinitionParseError::InvalidPhysics(format!(
                "tilt limits inverted: min {} > max {}",
                self.tilt_limits.min, self.tilt_limits.max
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motor_defaults() {
        let cheap = MotorType::StepperCheap.default_profile();
        assert_eq!(cheap.max_velocity, 400.0);
        assert!(cheap.safety_cap);
        assert_eq!(cheap.tilt_limits, TiltLimits { min: 30, max: 180 });

        let servo = MotorType::ServoPro.default_profile();
        assert!(!servo.safety_cap);
        assert_eq!(servo.home_position, HomePosition { pan: 127, tilt: 127 });
    }

    #[test]
    fn test_stepper_alias() {
        assert_eq!(MotorType::from_token("stepper"), MotorType::StepperQuality);
        assert_eq!(MotorType::from_token("Servo_Pro"), MotorType::ServoPro);
        assert_eq!(MotorType::from_token("gearbox"), MotorType::Unknown);
    }

    #[test]
    fn test_validate_rejects_inverted_limits() {
        let mut profile = PhysicsProfile::default();
        profile.tilt_limits = TiltLimits { min: 200, max: 20 };
        assert!(matches!(
            profile.validate(),
            Err(DefinitionParseError::InvalidPhysics(_))
        ));

        let mut profile = PhysicsProfile::default();
        profile.max_velocity = 0.0;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_orientation_is_only_a_hint() {
        assert!(Orientation::Floor.suggested_axes().invert_tilt);
        let profile = PhysicsProfile {
            orientation: Orientation::Floor,
            ..PhysicsProfile::default()
        };
        assert!(!profile.invert_tilt);
    }
}
