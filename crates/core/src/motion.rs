//! Pan/tilt safety governor.
//!
//! Every pan/tilt write passes through here. Axis corrections and the tilt
//! clamp are always applied. With `safety_cap` set, the output chases its
//! target under the motor's velocity and acceleration limits, braking early
//! enough to stop on the target rather than past it.

use luxsync_fixtures::PhysicsProfile;

const DMX_MAX: f64 = 255.0;

/// Distance below which an axis is considered to have arrived.
const SETTLE_EPSILON: f64 = 1e-3;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Axis {
    position: f64,
    velocity: f64,
    target: f64,
}

impl Axis {
    fn at(position: f64) -> Self {
        Axis {
            position,
            velocity: 0.0,
            target: position,
        }
    }

    fn snap(&mut self) {
        self.position = self.target;
        self.velocity = 0.0;
    }

    fn is_settled(&self) -> bool {
        (self.target - self.position).abs() <= SETTLE_EPSILON && self.velocity == 0.0
    }

    fn advance(&mut self, max_velocity: f64, max_acceleration: f64, dt: f64) {
        let delta = self.target - self.position;
        let distance = delta.abs();
        if distance <= SETTLE_EPSILON {
            self.snap();
            return;
        }
        if dt <= 0.0 {
            return;
        }

        let direction = delta.signum();
        let stopping_speed = (2.0 * max_acceleration * distance).sqrt();
        let desired = max_velocity.min(stopping_speed).min(distance / dt) * direction;

        let max_dv = max_acceleration * dt;
        let dv = (desired - self.velocity).clamp(-max_dv, max_dv);
        let velocity = (self.velocity + dv).clamp(-max_velocity, max_velocity);
        let position = self.position + velocity * dt;

        let remaining = (self.target - position) * direction;
        if remaining <= SETTLE_EPSILON {
            self.snap();
        } else {
            self.position = position;
            self.velocity = velocity;
        }
    }
}

/// Per-instance motion state: where the head is, how fast it moves and where
/// it is heading.
#[derive(Clone, Debug, PartialEq)]
pub struct MotionGovernor {
    pan: Axis,
    tilt: Axis,
}

impl MotionGovernor {
    /// A governor parked at the profile's home position.
    pub fn new(profile: &PhysicsProfile) -> Self {
        let (pan, tilt) = home(profile);
        MotionGovernor {
            pan: Axis::at(pan),
            tilt: Axis::at(tilt),
        }
    }

    /// Applies axis corrections and limits to a requested position and
    /// returns the corrected `(pan, tilt)` target.
    pub fn correct(profile: &PhysicsProfile, pan: f64, tilt: f64) -> (f64, f64) {
        let (pan, tilt) = if profile.swap_pan_tilt {
            (tilt, pan)
        } else {
            (pan, tilt)
        };
        let (home_pan, home_tilt) = home(profile);

        let pan = if pan.is_finite() {
            let pan = pan.clamp(0.0, DMX_MAX);
            if profile.invert_pan {
                DMX_MAX - pan
            } else {
                pan
            }
        } else {
            home_pan
        };
        let tilt = if tilt.is_finite() {
            let tilt = tilt.clamp(0.0, DMX_MAX);
            if profile.invert_tilt {
                DMX_MAX - tilt
            } else {
                tilt
            }
        } else {
            home_tilt
        };

        (pan, profile.tilt_limits.clamp(tilt))
    }

    /// Sets a new target. Without a safety cap the position jumps straight to
    /// it; with one, only [`MotionGovernor::step`] moves the head.
    pub fn request(&mut self, profile: &PhysicsProfile, pan: f64, tilt: f64) {
        let (pan, tilt) = Self::correct(profile, pan, tilt);
        self.pan.target = pan;
        self.tilt.target = tilt;

        if !profile.safety_cap {
            self.pan.snap();
            self.tilt.snap();
        }
    }

    /// Advances both axes by `dt` seconds and returns the new position.
    pub fn step(&mut self, profile: &PhysicsProfile, dt: f64) -> (f64, f64) {
        if profile.safety_cap {
            let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
            self.pan
                .advance(profile.max_velocity, profile.max_acceleration, dt);
            self.tilt
                .advance(profile.max_velocity, profile.max_acceleration, dt);
        } else {
            self.pan.snap();
            self.tilt.snap();
        }

        if !self.pan.position.is_finite() || !self.tilt.position.is_finite() {
            log::warn!("Motion state diverged, returning to home");
            self.reset_home(profile);
        }

        self.position()
    }

    /// Parks the head at home immediately, discarding any motion in progress.
    pub fn reset_home(&mut self, profile: &PhysicsProfile) {
        let (pan, tilt) = home(profile);
        self.pan = Axis::at(pan);
        self.tilt = Axis::at(tilt);
    }

    pub fn position(&self) -> (f64, f64) {
        (self.pan.position, self.tilt.position)
    }

    pub fn target(&self) -> (f64, f64) {
        (self.pan.target, self.tilt.target)
    }

    pub fn velocity(&self) -> (f64, f64) {
        (self.pan.velocity, self.tilt.velocity)
    }

    pub fn is_settled(&self) -> bool {
        self.pan.is_settled() && self.tilt.is_settled()
    }
}

fn home(profile: &PhysicsProfile) -> (f64, f64) {
    let home = profile.home_position;
    (
        home.pan as f64,
        profile.tilt_limits.clamp(home.tilt as f64),
    )
}
