use thiserror::Error;

use crate::instance::InstanceId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("unknown fixture definition '{0}'")]
    UnknownDefinition(String),
    #[error("unknown fixture instance {0}")]
    UnknownInstance(InstanceId),
    #[error("address {address} in universe {universe} overlaps fixture {conflicting}")]
    AddressOverlap {
        conflicting: InstanceId,
        universe: u16,
        address: u16,
    },
    #[error("a {channel_count}-channel fixture at address {address} does not fit in 1-512")]
    AddressOutOfRange { address: u16, channel_count: usize },
    #[error("definition '{definition}' has {channel_count} channels, more than a universe holds")]
    FixtureTooLarge {
        definition: String,
        channel_count: usize,
    },
    #[error("no universe left to place the fixture")]
    UniversesExhausted,
    #[error("fixture {instance} channel {channel} falls outside its universe")]
    ChannelOutOfRange { instance: InstanceId, channel: usize },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Art-Net encoding failed: {0}")]
    Protocol(String),
    #[error("no destination configured for universe {0}")]
    NoDestination(u16),
}
