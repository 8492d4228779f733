use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::messages::{ControlCommand, EngineEvent};

/// Which module a status map or error came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleId {
    Dmx,
}

/// Events sent into a module
#[derive(Debug, Clone)]
pub enum ModuleEvent {
    /// Patch or control request for the fixture engine
    Control(ControlCommand),
    Shutdown,
}

/// Messages reported back by a module
#[derive(Debug)]
pub enum ModuleMessage {
    Event(EngineEvent),
    Status(String),
    Error(String),
}

/// A long-running task driven by `ModuleEvent`s
#[async_trait]
pub trait AsyncModule: Send + Sync {
    fn id(&self) -> ModuleId;

    /// One-time setup before `run`
    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Main loop. Returns once a shutdown event arrives or the event channel closes.
    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Final cleanup after `run` returns
    async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Snapshot of counters for display
    fn status(&self) -> HashMap<String, String>;
}
