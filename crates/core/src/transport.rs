use crate::error::TransportError;
use crate::frame::DmxFrame;

/// Where finished universe frames go.
pub trait DmxTransport: Send + Sync {
    fn send_universe(&mut self, universe: u16, data: &DmxFrame) -> Result<(), TransportError>;

    fn name(&self) -> String;
}

/// Discards frames. Used for dry runs.
#[derive(Debug, Default)]
pub struct NullTransport {
    frames: u64,
}

impl NullTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl DmxTransport for NullTransport {
    fn send_universe(&mut self, universe: u16, data: &DmxFrame) -> Result<(), TransportError> {
        self.frames += 1;
        log::trace!(
            "universe {}: {:?}",
            universe,
            &data[..data.iter().rposition(|v| *v != 0).map_or(0, |i| i + 1)]
        );
        Ok(())
    }

    fn name(&self) -> String {
        "null".to_string()
    }
}
