use luxsync_fixtures::{Channel, ChannelType, FixtureDefinition, DMX_UNIVERSE_SIZE};
use serde::{Deserialize, Serialize};

use crate::state::FixtureState;

/// One absolute DMX slot write. `channel` is 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DmxCommand {
    pub channel: u16,
    pub value: u8,
}

impl DmxCommand {
    pub fn new(channel: u16, value: u8) -> Self {
        DmxCommand { channel, value }
    }
}

/// The byte a channel carries for a given state.
pub fn channel_value(channel: &Channel, state: &FixtureState) -> u8 {
    match channel.channel_type {
        ChannelType::Dimmer => state.dimmer,
        ChannelType::Shutter => state.shutter.unwrap_or(channel.default_value),
        ChannelType::Strobe => state.strobe,
        ChannelType::Red => state.red,
        ChannelType::Green => state.green,
        ChannelType::Blue => state.blue,
        ChannelType::White => state.white,
        ChannelType::Pan => (state.pan >> 8) as u8,
        ChannelType::PanFine => (state.pan & 0xff) as u8,
        ChannelType::Tilt => (state.tilt >> 8) as u8,
        ChannelType::TiltFine => (state.tilt & 0xff) as u8,
        ChannelType::ColorWheel => state.color_wheel,
        ChannelType::Gobo => state.gobo,
        ChannelType::GoboRotation => state.gobo_rotation,
        ChannelType::Prism => {
            if state.prism {
                255
            } else {
                0
            }
        }
        ChannelType::PrismRotation => state.prism_rotation,
        ChannelType::Focus => state.focus,
        ChannelType::Zoom => state.zoom,
        ChannelType::Frost => state.frost,
        ChannelType::Amber
        | ChannelType::UV
        | ChannelType::Iris
        | ChannelType::Speed
        | ChannelType::Macro
        | ChannelType::Control => channel.default_value,
        ChannelType::Unknown => 0,
    }
}

/// Walks the channel list and produces absolute slot writes starting at
/// `dmx_address`. Returns the 0-based index of the first channel that would
/// land past slot 512 if the fixture does not fit.
pub fn serialize(
    definition: &FixtureDefinition,
    state: &FixtureState,
    dmx_address: u16,
) -> Result<Vec<DmxCommand>, usize> {
    definition
        .channels()
        .iter()
        .map(|channel| {
            let absolute = dmx_address as usize + channel.index;
            if dmx_address == 0 || absolute > DMX_UNIVERSE_SIZE {
                return Err(channel.index);
            }
            Ok(DmxCommand::new(absolute as u16, channel_value(channel, state)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use luxsync_fixtures::{channel_layout, PhysicsProfile};

    fn definition(channels: Vec<Channel>) -> FixtureDefinition {
        FixtureDefinition::new("test", "Test", "Acme", None, channels, PhysicsProfile::default(), None)
            .unwrap()
    }

    #[test]
    fn test_serialize_basic_layout() {
        let def = definition(channel_layout![
            ("Dimmer", ChannelType::Dimmer),
            ("Red", ChannelType::Red),
            ("Green", ChannelType::Green),
            ("Blue", ChannelType::Blue),
            ("Pan", ChannelType::Pan),
            ("Tilt", ChannelType::Tilt),
        ]);
        let mut state = FixtureState::default();
        state.dimmer = 200;
        state.set_color(10.0, 20.0, 30.0, 0.0);
        state.set_position(100.0, 150.0);

        let commands = serialize(&def, &state, 5).unwrap();
        let pairs: Vec<(u16, u8)> = commands.iter().map(|c| (c.channel, c.value)).collect();
        assert_eq!(
            pairs,
            vec![(5, 200), (6, 10), (7, 20), (8, 30), (9, 100), (10, 150)]
        );
    }

    #[test]
    fn test_fine_channels_carry_low_byte() {
        let def = definition(channel_layout![
            ("Pan", ChannelType::Pan),
            ("Pan Fine", ChannelType::PanFine),
            ("Tilt", ChannelType::Tilt),
            ("Tilt Fine", ChannelType::TiltFine),
        ]);
        let mut state = FixtureState::default();
        state.pan = 0x1234;
        state.tilt = 0xabcd;

        let values: Vec<u8> = serialize(&def, &state, 1)
            .unwrap()
            .iter()
            .map(|c| c.value)
            .collect();
        assert_eq!(values, vec![0x12, 0x34, 0xab, 0xcd]);
    }

    #[test]
    fn test_stateless_channels() {
        let def = definition(channel_layout![
            ("Prism", ChannelType::Prism),
            ("Speed", ChannelType::Speed, 128),
            ("Mystery", ChannelType::Unknown, 99),
        ]);
        let mut state = FixtureState::default();
        state.prism = true;

        let values: Vec<u8> = serialize(&def, &state, 1)
            .unwrap()
            .iter()
            .map(|c| c.value)
            .collect();
        assert_eq!(values, vec![255, 128, 0]);
    }

    #[test]
    fn test_shutter_is_independent_of_dimmer() {
        let def = definition(channel_layout![
            ("Dimmer", ChannelType::Dimmer),
            ("Shutter", ChannelType::Shutter),
        ]);
        let mut state = FixtureState::default();
        state.dimmer = 128;

        let pairs: Vec<(u16, u8)> = serialize(&def, &state, 1)
            .unwrap()
            .iter()
            .map(|c| (c.channel, c.value))
            .collect();
        assert_eq!(pairs, vec![(1, 128), (2, 255)]);

        state.shutter = Some(0);
        assert_eq!(serialize(&def, &state, 1).unwrap()[1].value, 0);
    }

    #[test]
    fn test_channels_past_universe_end() {
        let def = definition(channel_layout![
            ("Dimmer", ChannelType::Dimmer),
            ("Strobe", ChannelType::Strobe),
        ]);
        let state = FixtureState::default();
        assert!(serialize(&def, &state, 511).is_ok());
        assert_eq!(serialize(&def, &state, 512), Err(1));
    }
}
