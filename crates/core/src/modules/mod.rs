pub mod dmx_module;
pub mod traits;

pub use dmx_module::DmxModule;
pub use traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage};
