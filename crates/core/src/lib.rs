pub use artnet::artnet::{ArtNet, ArtNetMode, ArtNetTransport};
pub use artnet::network_config::{ArtNetDestination, NetworkConfig};
pub use color_wheel::{nearest_slot, WheelDecision, WheelGate, WheelMetrics, WheelSettings};
pub use config::{ConfigError, ConfigManager, ConfigSchema};
pub use engine::FixtureEngine;
pub use error::{EngineError, TransportError};
pub use frame::{DmxFrame, FrameBuffer};
pub use instance::{FixtureInstance, InstanceId};
pub use messages::{ControlCommand, EngineEvent, Settings};
pub use motion::MotionGovernor;
pub use serializer::{channel_value, serialize, DmxCommand};
pub use state::{clamp_dmx, FixtureState};
pub use transport::{DmxTransport, NullTransport};
// Async module system exports
pub use modules::{AsyncModule, DmxModule, ModuleEvent, ModuleId, ModuleMessage};

mod artnet;
mod color_wheel;
mod config;
mod engine;
mod error;
mod frame;
mod instance;
pub mod messages;
mod modules;
mod motion;
pub mod patch;
mod serializer;
mod state;
mod transport;
