use std::fmt;
use std::sync::Arc;

use luxsync_fixtures::FixtureDefinition;
use slotmap::{new_key_type, Key};

use crate::color_wheel::WheelGate;
use crate::motion::MotionGovernor;
use crate::state::FixtureState;

new_key_type! {
    /// Handle to a patched fixture. It stops resolving once the fixture is
    /// unpatched, even after its slot is reused.
    pub struct InstanceId;
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:?}", self.data())
    }
}

/// A patched fixture: a shared model plus everything that belongs to this one
/// physical unit.
#[derive(Clone, Debug)]
pub struct FixtureInstance {
    definition: Arc<FixtureDefinition>,
    pub(crate) state: FixtureState,
    pub(crate) dmx_address: u16,
    pub(crate) universe: u16,
    pub(crate) label: String,
    pub(crate) governor: MotionGovernor,
    pub(crate) wheel_gate: Option<WheelGate>,
}

impl FixtureInstance {
    pub(crate) fn new(
        definition: Arc<FixtureDefinition>,
        universe: u16,
        dmx_address: u16,
        label: String,
    ) -> Self {
        let governor = MotionGovernor::new(definition.physics());
        let mut state = FixtureState::home(&definition);
        let (pan, tilt) = governor.position();
        state.set_position(pan, tilt);
        let wheel_gate = definition.wheel().map(|_| WheelGate::new(state.color_wheel));
        FixtureInstance {
            definition,
            state,
            dmx_address,
            universe,
            label,
            governor,
            wheel_gate,
        }
    }

    pub fn definition(&self) -> &Arc<FixtureDefinition> {
        &self.definition
    }

    pub fn state(&self) -> &FixtureState {
        &self.state
    }

    pub fn dmx_address(&self) -> u16 {
        self.dmx_address
    }

    pub fn universe(&self) -> u16 {
        self.universe
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn channel_count(&self) -> usize {
        self.definition.channel_count()
    }

    /// Last absolute slot this fixture occupies.
    pub fn end_address(&self) -> usize {
        self.dmx_address as usize + self.channel_count() - 1
    }

    pub fn governor(&self) -> &MotionGovernor {
        &self.governor
    }

    pub fn wheel_gate(&self) -> Option<&WheelGate> {
        self.wheel_gate.as_ref()
    }

    /// Back to the resting state: dark with the shutter closed, parked at
    /// home, wheel at 0.
    pub(crate) fn reset(&mut self, now_ms: f64) {
        self.governor.reset_home(self.definition.physics());
        self.state = FixtureState::home(&self.definition);
        self.state.shutter = Some(0);
        let (pan, tilt) = self.governor.position();
        self.state.set_position(pan, tilt);
        if let Some(gate) = self.wheel_gate.as_mut() {
            gate.reset(self.state.color_wheel, now_ms);
        }
    }

    /// The state as it goes to the wire. While the chaos latch holds the wheel
    /// the fixture strobes instead, on its shutter if it has one.
    pub fn output_state(&self, now_ms: f64) -> FixtureState {
        let mut state = self.state.clone();
        let delegated = self
            .wheel_gate
            .as_ref()
            .and_then(|gate| gate.suggested_shutter(now_ms));
        if let Some(shutter) = delegated {
            if self.definition.capabilities().has_shutter {
                state.shutter = Some(shutter);
            } else {
                state.strobe = shutter;
            }
        }
        state
    }
}
