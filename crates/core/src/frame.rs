use std::collections::BTreeMap;

use luxsync_fixtures::DMX_UNIVERSE_SIZE;

use crate::serializer::DmxCommand;

pub type DmxFrame = [u8; DMX_UNIVERSE_SIZE];

/// Double-buffered universe frames. Writers fill the back buffer; readers only
/// ever see the front buffer, which changes in one swap.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    front: BTreeMap<u16, Box<DmxFrame>>,
    back: BTreeMap<u16, Box<DmxFrame>>,
    zero_next: bool,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new back frame from the last published one, so slots nobody
    /// writes keep their value.
    pub fn begin(&mut self) {
        self.back.clone_from(&self.front);
        if self.zero_next {
            for frame in self.back.values_mut() {
                frame.fill(0);
            }
            self.zero_next = false;
        }
    }

    pub fn write(&mut self, universe: u16, commands: &[DmxCommand]) {
        let frame = self
            .back
            .entry(universe)
            .or_insert_with(|| Box::new([0; DMX_UNIVERSE_SIZE]));
        for command in commands {
            match (command.channel as usize).checked_sub(1) {
                Some(slot) if slot < DMX_UNIVERSE_SIZE => frame[slot] = command.value,
                _ => log::warn!(
                    "Dropping write to channel {} in universe {}",
                    command.channel,
                    universe
                ),
            }
        }
    }

    /// Zeroes every known universe in the next frame.
    pub fn zero_next_frame(&mut self) {
        self.zero_next = true;
    }

    pub fn swap(&mut self) {
        std::mem::swap(&mut self.front, &mut self.back);
    }

    pub fn universe(&self, universe: u16) -> Option<&DmxFrame> {
        self.front.get(&universe).map(|frame| frame.as_ref())
    }

    pub fn universes(&self) -> impl Iterator<Item = (u16, &DmxFrame)> {
        self.front.iter().map(|(universe, frame)| (*universe, frame.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.front.len()
    }

    pub fn is_empty(&self) -> bool {
        self.front.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_buffer_hidden_until_swap() {
        let mut frames = FrameBuffer::new();
        frames.begin();
        frames.write(0, &[DmxCommand::new(1, 200)]);
        assert!(frames.universe(0).is_none());

        frames.swap();
        assert_eq!(frames.universe(0).map(|f| f[0]), Some(200));
    }

    #[test]
    fn test_unwritten_slots_are_retained() {
        let mut frames = FrameBuffer::new();
        frames.begin();
        frames.write(0, &[DmxCommand::new(1, 200), DmxCommand::new(10, 7)]);
        frames.swap();

        frames.begin();
        frames.write(0, &[DmxCommand::new(1, 50)]);
        frames.swap();

        let frame = frames.universe(0).unwrap();
        assert_eq!(frame[0], 50);
        assert_eq!(frame[9], 7);
    }

    #[test]
    fn test_zero_next_frame() {
        let mut frames = FrameBuffer::new();
        frames.begin();
        frames.write(2, &[DmxCommand::new(512, 99), DmxCommand::new(0, 1)]);
        frames.swap();
        assert_eq!(frames.universe(2).map(|f| f[511]), Some(99));

        frames.zero_next_frame();
        frames.begin();
        frames.swap();
        assert!(frames.universe(2).unwrap().iter().all(|v| *v == 0));
    }
}
