use std::sync::Arc;
use std::time::Duration;

use luxsync_fixtures::{ColorMixing, FixtureDefinition, FixtureLibrary, Rgb, DMX_UNIVERSE_SIZE};
use slotmap::SlotMap;

use crate::color_wheel::{nearest_slot, WheelDecision, WheelMetrics, WheelSettings};
use crate::error::EngineError;
use crate::frame::FrameBuffer;
use crate::instance::{FixtureInstance, InstanceId};
use crate::messages::{ControlCommand, EngineEvent};
use crate::patch::{check_range, current_universe, find_overlap, next_free, Footprint, Placement};
use crate::serializer::{self, DmxCommand};
use crate::state::clamp_dmx;

/// Owns every patched fixture and turns control calls into DMX.
///
/// Control calls update semantic state and return the instance's fresh
/// commands. [`FixtureEngine::tick`] advances time: motion moves toward its
/// targets, queued wheel changes land, and a complete set of universe frames
/// is published.
pub struct FixtureEngine {
    library: FixtureLibrary,
    instances: SlotMap<InstanceId, FixtureInstance>,
    frames: FrameBuffer,
    wheel_settings: WheelSettings,
    clock_ms: f64,
    ticks: u64,
}

impl FixtureEngine {
    pub fn new(library: FixtureLibrary) -> Self {
        FixtureEngine {
            library,
            instances: SlotMap::with_key(),
            frames: FrameBuffer::new(),
            wheel_settings: WheelSettings::default(),
            clock_ms: 0.0,
            ticks: 0,
        }
    }

    pub fn with_wheel_settings(mut self, wheel_settings: WheelSettings) -> Self {
        self.wheel_settings = wheel_settings;
        self
    }

    pub fn library(&self) -> &FixtureLibrary {
        &self.library
    }

    /// Milliseconds of engine time, advanced only by ticks.
    pub fn clock_ms(&self) -> f64 {
        self.clock_ms
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    // Patching

    /// Patches a fixture. Without an address it goes after the last fixture
    /// of the current universe, spilling into the next universe when it would
    /// not fit. An explicit address without a universe means universe 0.
    pub fn patch(
        &mut self,
        definition_id: &str,
        address: Option<u16>,
        universe: Option<u16>,
    ) -> Result<InstanceId, EngineError> {
        self.patch_labeled(definition_id, address, universe, None)
    }

    pub fn patch_labeled(
        &mut self,
        definition_id: &str,
        address: Option<u16>,
        universe: Option<u16>,
        label: Option<&str>,
    ) -> Result<InstanceId, EngineError> {
        let definition = self
            .library
            .get(definition_id)
            .ok_or_else(|| EngineError::UnknownDefinition(definition_id.to_string()))?;
        let channel_count = definition.channel_count();
        if channel_count > DMX_UNIVERSE_SIZE {
            return Err(EngineError::FixtureTooLarge {
                definition: definition_id.to_string(),
                channel_count,
            });
        }

        let existing = self.footprints(None);
        let placement = match address {
            Some(address) => {
                let universe = universe.unwrap_or(0);
                validate_placement(&existing, universe, address, channel_count)?;
                Placement { universe, address }
            }
            None => {
                let universe = universe.unwrap_or_else(|| current_universe(&existing));
                next_free(&existing, universe, channel_count)?
            }
        };

        let label = label
            .map(str::to_string)
            .unwrap_or_else(|| definition.name().to_string());
        let instance =
            FixtureInstance::new(definition, placement.universe, placement.address, label);
        let id = self.instances.insert(instance);

        log::info!(
            "Patched {} ({}) as {} at universe {} address {}",
            definition_id,
            channel_count,
            id,
            placement.universe,
            placement.address
        );
        Ok(id)
    }

    pub fn unpatch(&mut self, id: InstanceId) -> Result<FixtureInstance, EngineError> {
        let instance = self
            .instances
            .remove(id)
            .ok_or(EngineError::UnknownInstance(id))?;
        log::info!("Unpatched {} ({})", id, instance.label());
        Ok(instance)
    }

    /// Moves a patched fixture, re-checking the new range against every other
    /// fixture. The universe is kept when none is given.
    pub fn edit_address(
        &mut self,
        id: InstanceId,
        address: u16,
        universe: Option<u16>,
    ) -> Result<(), EngineError> {
        let instance = self.instance(id)?;
        let universe = universe.unwrap_or(instance.universe());
        let channel_count = instance.channel_count();

        let others = self.footprints(Some(id));
        validate_placement(&others, universe, address, channel_count)?;

        let instance = self.instance_mut(id)?;
        instance.universe = universe;
        instance.dmx_address = address;
        log::info!("Moved {} to universe {} address {}", id, universe, address);
        Ok(())
    }

    pub fn set_label(&mut self, id: InstanceId, label: &str) -> Result<(), EngineError> {
        self.instance_mut(id)?.label = label.to_string();
        Ok(())
    }

    pub fn instance(&self, id: InstanceId) -> Result<&FixtureInstance, EngineError> {
        self.instances.get(id).ok_or(EngineError::UnknownInstance(id))
    }

    pub fn instances(&self) -> impl Iterator<Item = (InstanceId, &FixtureInstance)> {
        self.instances.iter()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    // Control

    pub fn set_color(
        &mut self,
        id: InstanceId,
        red: f64,
        green: f64,
        blue: f64,
        white: f64,
    ) -> Result<Vec<DmxCommand>, EngineError> {
        let now = self.clock_ms;
        let settings = self.wheel_settings;
        let instance = self.instance_mut(id)?;
        instance.state.set_color(red, green, blue, white);
        if mixes_by_wheel(instance.definition()) {
            let rgb = Rgb::new(clamp_dmx(red), clamp_dmx(green), clamp_dmx(blue));
            request_wheel(instance, rgb, now, &settings);
        }
        self.commands(id)
    }

    /// Sets the dimmer and reopens a shutter closed by blackout.
    pub fn set_dimmer(&mut self, id: InstanceId, value: f64) -> Result<Vec<DmxCommand>, EngineError> {
        let instance = self.instance_mut(id)?;
        instance.state.dimmer = clamp_dmx(value);
        instance.state.shutter = None;
        self.commands(id)
    }

    pub fn set_strobe(&mut self, id: InstanceId, value: f64) -> Result<Vec<DmxCommand>, EngineError> {
        self.instance_mut(id)?.state.strobe = clamp_dmx(value);
        self.commands(id)
    }

    /// Sets a new pan/tilt target. Fixtures without a safety cap jump there
    /// now; capped fixtures travel over the following ticks.
    pub fn move_to(&mut self, id: InstanceId, pan: f64, tilt: f64) -> Result<Vec<DmxCommand>, EngineError> {
        let instance = self.instance_mut(id)?;
        let definition = Arc::clone(instance.definition());
        let physics = definition.physics();

        instance.governor.request(physics, pan, tilt);
        if !physics.safety_cap {
            let (pan, tilt) = instance.governor.position();
            instance.state.set_position(pan, tilt);
        }
        self.commands(id)
    }

    pub fn set_gobo(&mut self, id: InstanceId, index: f64, rotation: f64) -> Result<Vec<DmxCommand>, EngineError> {
        let instance = self.instance_mut(id)?;
        instance.state.gobo = clamp_dmx(index);
        instance.state.gobo_rotation = clamp_dmx(rotation);
        self.commands(id)
    }

    pub fn set_prism(&mut self, id: InstanceId, enabled: bool, rotation: f64) -> Result<Vec<DmxCommand>, EngineError> {
        let instance = self.instance_mut(id)?;
        instance.state.prism = enabled;
        instance.state.prism_rotation = clamp_dmx(rotation);
        self.commands(id)
    }

    pub fn set_zoom(&mut self, id: InstanceId, value: f64) -> Result<Vec<DmxCommand>, EngineError> {
        self.instance_mut(id)?.state.zoom = clamp_dmx(value);
        self.commands(id)
    }

    pub fn set_focus(&mut self, id: InstanceId, value: f64) -> Result<Vec<DmxCommand>, EngineError> {
        self.instance_mut(id)?.state.focus = clamp_dmx(value);
        self.commands(id)
    }

    pub fn set_frost(&mut self, id: InstanceId, value: f64) -> Result<Vec<DmxCommand>, EngineError> {
        self.instance_mut(id)?.state.frost = clamp_dmx(value);
        self.commands(id)
    }

    /// Moves the color wheel to the slot nearest the requested color, subject
    /// to the wheel's dwell time. Fixtures without a wheel ignore it.
    pub fn set_color_wheel(
        &mut self,
        id: InstanceId,
        red: f64,
        green: f64,
        blue: f64,
    ) -> Result<Vec<DmxCommand>, EngineError> {
        let now = self.clock_ms;
        let settings = self.wheel_settings;
        let instance = self.instance_mut(id)?;
        let rgb = Rgb::new(clamp_dmx(red), clamp_dmx(green), clamp_dmx(blue));
        if !request_wheel(instance, rgb, now, &settings) {
            log::debug!("{} has no color wheel, ignoring wheel request", id);
        }
        self.commands(id)
    }

    pub fn blackout(&mut self, id: InstanceId) -> Result<Vec<DmxCommand>, EngineError> {
        let now = self.clock_ms;
        self.instance_mut(id)?.reset(now);
        self.commands(id)
    }

    /// Resets every fixture and zeroes all universe frames on the next tick.
    pub fn blackout_all(&mut self) -> Vec<DmxCommand> {
        let now = self.clock_ms;
        for (_, instance) in self.instances.iter_mut() {
            instance.reset(now);
        }
        self.frames.zero_next_frame();
        log::info!("Blackout on {} fixtures", self.instances.len());

        let mut commands = Vec::new();
        let ids: Vec<InstanceId> = self.instances.keys().collect();
        for id in ids {
            match self.commands(id) {
                Ok(mut instance_commands) => commands.append(&mut instance_commands),
                Err(e) => log::warn!("Blackout skipped {}: {}", id, e),
            }
        }
        commands
    }

    pub fn full_on(&mut self, id: InstanceId, color: Rgb) -> Result<Vec<DmxCommand>, EngineError> {
        let now = self.clock_ms;
        let settings = self.wheel_settings;
        let instance = self.instance_mut(id)?;
        instance.state.dimmer = 255;
        instance.state.shutter = None;
        instance.state.red = color.r;
        instance.state.green = color.g;
        instance.state.blue = color.b;
        if mixes_by_wheel(instance.definition()) {
            request_wheel(instance, color, now, &settings);
        }
        self.commands(id)
    }

    /// Current commands for one fixture.
    pub fn commands(&self, id: InstanceId) -> Result<Vec<DmxCommand>, EngineError> {
        let instance = self.instance(id)?;
        let state = instance.output_state(self.clock_ms);
        serializer::serialize(instance.definition(), &state, instance.dmx_address())
            .map_err(|channel| EngineError::ChannelOutOfRange {
                instance: id,
                channel,
            })
    }

    pub fn wheel_metrics(&self, id: InstanceId) -> Result<Option<WheelMetrics>, EngineError> {
        Ok(self.instance(id)?.wheel_gate().map(|gate| gate.metrics()))
    }

    /// Applies one queued command, returning the patch event it caused.
    pub fn execute(&mut self, command: ControlCommand) -> Result<Option<EngineEvent>, EngineError> {
        match command {
            ControlCommand::Patch {
                definition_id,
                address,
                universe,
                label,
            } => {
                let id = self.patch_labeled(&definition_id, address, universe, label.as_deref())?;
                let instance = self.instance(id)?;
                return Ok(Some(EngineEvent::Patched {
                    id,
                    definition_id,
                    universe: instance.universe(),
                    address: instance.dmx_address(),
                }));
            }
            ControlCommand::Unpatch { id } => {
                self.unpatch(id)?;
                return Ok(Some(EngineEvent::Unpatched { id }));
            }
            ControlCommand::EditAddress {
                id,
                address,
                universe,
            } => {
                self.edit_address(id, address, universe)?;
                let instance = self.instance(id)?;
                return Ok(Some(EngineEvent::AddressChanged {
                    id,
                    universe: instance.universe(),
                    address: instance.dmx_address(),
                }));
            }
            ControlCommand::SetColor {
                id,
                red,
                green,
                blue,
                white,
            } => self.set_color(id, red, green, blue, white)?,
            ControlCommand::SetDimmer { id, value } => self.set_dimmer(id, value)?,
            ControlCommand::SetStrobe { id, value } => self.set_strobe(id, value)?,
            ControlCommand::MoveTo { id, pan, tilt } => self.move_to(id, pan, tilt)?,
            ControlCommand::SetGobo {
                id,
                index,
                rotation,
            } => self.set_gobo(id, index, rotation)?,
            ControlCommand::SetPrism {
                id,
                enabled,
                rotation,
            } => self.set_prism(id, enabled, rotation)?,
            ControlCommand::SetZoom { id, value } => self.set_zoom(id, value)?,
            ControlCommand::SetFocus { id, value } => self.set_focus(id, value)?,
            ControlCommand::SetFrost { id, value } => self.set_frost(id, value)?,
            ControlCommand::SetColorWheel {
                id,
                red,
                green,
                blue,
            } => self.set_color_wheel(id, red, green, blue)?,
            ControlCommand::Blackout { id } => self.blackout(id)?,
            ControlCommand::BlackoutAll => self.blackout_all(),
            ControlCommand::FullOn { id, color } => self.full_on(id, color)?,
        };
        Ok(None)
    }

    // Output

    /// Advances engine time by `dt` and publishes a new set of frames.
    pub fn tick(&mut self, dt: Duration) -> &FrameBuffer {
        let dt_secs = dt.as_secs_f64();
        self.clock_ms += dt_secs * 1000.0;
        self.ticks += 1;
        let now = self.clock_ms;
        let settings = self.wheel_settings;

        self.frames.begin();
        for (id, instance) in self.instances.iter_mut() {
            let definition = Arc::clone(instance.definition());

            let (pan, tilt) = instance.governor.step(definition.physics(), dt_secs);
            instance.state.set_position(pan, tilt);

            if let (Some(wheel), Some(gate)) = (definition.wheel(), instance.wheel_gate.as_mut()) {
                if let Some(slot) = gate.poll(now, wheel, &settings) {
                    instance.state.color_wheel = slot;
                }
            }

            let state = instance.output_state(now);
            match serializer::serialize(&definition, &state, instance.dmx_address) {
                Ok(commands) => self.frames.write(instance.universe, &commands),
                Err(channel) => log::warn!(
                    "{} ({}) channel {} falls outside universe {}, output skipped",
                    id,
                    instance.label,
                    channel,
                    instance.universe
                ),
            }
        }
        self.frames.swap();

        &self.frames
    }

    /// The most recently published frames.
    pub fn frames(&self) -> &FrameBuffer {
        &self.frames
    }

    fn instance_mut(&mut self, id: InstanceId) -> Result<&mut FixtureInstance, EngineError> {
        self.instances
            .get_mut(id)
            .ok_or(EngineError::UnknownInstance(id))
    }

    fn footprints(&self, excluding: Option<InstanceId>) -> Vec<Footprint> {
        self.instances
            .iter()
            .filter(|(id, _)| Some(*id) != excluding)
            .map(|(id, instance)| Footprint {
                id,
                universe: instance.universe(),
                address: instance.dmx_address(),
                channel_count: instance.channel_count(),
            })
            .collect()
    }
}

fn validate_placement(
    existing: &[Footprint],
    universe: u16,
    address: u16,
    channel_count: usize,
) -> Result<(), EngineError> {
    check_range(address, channel_count)?;
    if let Some(conflicting) = find_overlap(existing, universe, address, channel_count) {
        return Err(EngineError::AddressOverlap {
            conflicting,
            universe,
            address,
        });
    }
    Ok(())
}

fn mixes_by_wheel(definition: &FixtureDefinition) -> bool {
    definition.capabilities().color_mixing == ColorMixing::Wheel
}

/// Routes an RGB request to the fixture's wheel. Returns false when the
/// fixture has no wheel.
fn request_wheel(
    instance: &mut FixtureInstance,
    rgb: Rgb,
    now_ms: f64,
    settings: &WheelSettings,
) -> bool {
    let definition = Arc::clone(instance.definition());
    let (Some(wheel), Some(gate)) = (definition.wheel(), instance.wheel_gate.as_mut()) else {
        return false;
    };
    let Some(slot) = nearest_slot(wheel, rgb) else {
        return true;
    };

    if let WheelDecision::Applied(dmx) = gate.request(slot.dmx, now_ms, wheel, settings) {
        instance.state.color_wheel = dmx;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> FixtureEngine {
        FixtureEngine::new(FixtureLibrary::builtin())
    }

    #[test]
    fn test_unknown_ids() {
        let mut engine = engine();
        assert!(matches!(
            engine.patch("no-such-fixture", None, None),
            Err(EngineError::UnknownDefinition(_))
        ));

        let id = engine.patch("generic-strobe", None, None).unwrap();
        engine.unpatch(id).unwrap();
        assert_eq!(engine.set_dimmer(id, 10.0), Err(EngineError::UnknownInstance(id)));
        assert!(matches!(engine.unpatch(id), Err(EngineError::UnknownInstance(_))));
    }

    #[test]
    fn test_reused_slot_does_not_revive_old_handle() {
        let mut engine = engine();
        let old = engine.patch("generic-strobe", Some(1), None).unwrap();
        engine.unpatch(old).unwrap();
        let new = engine.patch("generic-strobe", Some(1), None).unwrap();

        assert_ne!(old, new);
        assert_eq!(engine.len(), 1);
        assert!(matches!(engine.instance(old), Err(EngineError::UnknownInstance(_))));
        assert_eq!(engine.set_dimmer(new, 80.0).unwrap()[0], DmxCommand::new(1, 80));
    }

    #[test]
    fn test_control_values_clamp() {
        let mut engine = engine();
        let id = engine.patch("generic-strobe", Some(1), None).unwrap();

        let commands = engine.set_dimmer(id, 400.0).unwrap();
        assert_eq!(commands[0], DmxCommand::new(1, 255));
        let commands = engine.set_strobe(id, f64::NAN).unwrap();
        assert_eq!(commands[1], DmxCommand::new(2, 0));
    }

    #[test]
    fn test_label_defaults_to_model_name() {
        let mut engine = engine();
        let a = engine.patch("generic-strobe", None, None).unwrap();
        let b = engine
            .patch_labeled("generic-strobe", None, None, Some("Stage Left"))
            .unwrap();
        assert_eq!(engine.instance(a).unwrap().label(), "DMX Strobe");
        assert_eq!(engine.instance(b).unwrap().label(), "Stage Left");
        engine.set_label(a, "Stage Right").unwrap();
        assert_eq!(engine.instance(a).unwrap().label(), "Stage Right");
    }

    #[test]
    fn test_execute_reports_patch_events() {
        let mut engine = engine();
        let event = engine
            .execute(ControlCommand::Patch {
                definition_id: "led-par-rgb".to_string(),
                address: Some(10),
                universe: Some(2),
                label: None,
            })
            .unwrap();
        let (id, universe, address) = match event {
            Some(EngineEvent::Patched {
                id,
                universe,
                address,
                ..
            }) => (id, universe, address),
            other => panic!("expected a patch event, got {:?}", other),
        };
        assert_eq!((universe, address), (2, 10));

        let event = engine
            .execute(ControlCommand::SetDimmer { id, value: 99.0 })
            .unwrap();
        assert_eq!(event, None);
        assert_eq!(engine.instance(id).unwrap().state().dimmer, 99);
    }
}
