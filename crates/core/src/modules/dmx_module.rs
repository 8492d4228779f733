use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

use super::traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage};
use crate::engine::FixtureEngine;
use crate::transport::DmxTransport;

const STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// Runs the fixture engine at a fixed tick rate and pushes every published
/// frame to the transport. Control commands are applied between ticks in the
/// order they arrive.
pub struct DmxModule {
    engine: FixtureEngine,
    transport: Box<dyn DmxTransport>,
    tick_rate_hz: f64,
    initialized: bool,
    frames_sent: u64,
    send_errors: u64,
    transport_healthy: bool,
    status: HashMap<String, String>,
}

impl DmxModule {
    pub fn new(engine: FixtureEngine, transport: Box<dyn DmxTransport>) -> Self {
        Self {
            engine,
            transport,
            tick_rate_hz: 44.0, // DMX standard 44Hz
            initialized: false,
            frames_sent: 0,
            send_errors: 0,
            transport_healthy: true,
            status: HashMap::new(),
        }
    }

    pub fn set_tick_rate(&mut self, hz: f64) {
        if hz.is_finite() && hz > 0.0 {
            self.tick_rate_hz = hz;
        } else {
            log::warn!("Ignoring invalid tick rate {}", hz);
        }
    }

    pub fn tick_rate(&self) -> f64 {
        self.tick_rate_hz
    }

    pub fn engine(&self) -> &FixtureEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut FixtureEngine {
        &mut self.engine
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Ticks the engine once and hands every universe to the transport.
    /// Transport failures are counted and logged, never propagated.
    pub fn render_frame(&mut self, dt: Duration) {
        let frames = self.engine.tick(dt);
        let mut failed = false;
        for (universe, data) in frames.universes() {
            if let Err(e) = self.transport.send_universe(universe, data) {
                self.send_errors += 1;
                failed = true;
                if self.transport_healthy {
                    log::warn!(
                        "{} failed to send universe {}: {}",
                        self.transport.name(),
                        universe,
                        e
                    );
                }
            }
        }

        if failed {
            self.transport_healthy = false;
        } else if !self.transport_healthy {
            log::info!("{} recovered", self.transport.name());
            self.transport_healthy = true;
        }
        self.frames_sent += 1;
    }

    fn update_status(&mut self) {
        let universes = self.engine.frames().len();
        self.status
            .insert("frames_sent".to_string(), self.frames_sent.to_string());
        self.status
            .insert("fps".to_string(), format!("{:.1}", self.tick_rate_hz));
        self.status
            .insert("universes".to_string(), universes.to_string());
        self.status
            .insert("fixtures".to_string(), self.engine.len().to_string());
        self.status
            .insert("send_errors".to_string(), self.send_errors.to_string());
    }
}

#[async_trait]
impl AsyncModule for DmxModule {
    fn id(&self) -> ModuleId {
        ModuleId::Dmx
    }

    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        log::info!(
            "Initializing DMX module: {} fixtures, output via {}",
            self.engine.len(),
            self.transport.name()
        );

        self.status
            .insert("transport".to_string(), self.transport.name());
        self.status
            .insert("status".to_string(), "initialized".to_string());
        self.initialized = true;

        Ok(())
    }

    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.initialized {
            return Err("DMX module not initialized".into());
        }

        let frame_duration = Duration::from_secs_f64(1.0 / self.tick_rate_hz);
        let mut frame_interval = interval(frame_duration);
        frame_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_tick = Instant::now();
        let mut last_status = Instant::now();

        log::info!("DMX module started, running at {}Hz", self.tick_rate_hz);
        self.status
            .insert("status".to_string(), "running".to_string());

        let _ = tx
            .send(ModuleMessage::Status(format!(
                "DMX module running at {}Hz",
                self.tick_rate_hz
            )))
            .await;

        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Some(ModuleEvent::Control(command)) => {
                            match self.engine.execute(command) {
                                Ok(Some(event)) => {
                                    let _ = tx.send(ModuleMessage::Event(event)).await;
                                }
                                Ok(None) => {}
                                Err(e) => {
                                    log::warn!("Control command rejected: {}", e);
                                    let _ = tx.send(ModuleMessage::Error(e.to_string())).await;
                                }
                            }
                        }
                        Some(ModuleEvent::Shutdown) => {
                            log::info!("DMX module received shutdown signal");
                            break;
                        }
                        None => {
                            log::info!("DMX module event channel closed");
                            break;
                        }
                    }
                }

                _ = frame_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick);
                    last_tick = now;

                    self.render_frame(dt);

                    if now.duration_since(last_status) >= STATUS_INTERVAL {
                        last_status = now;
                        self.update_status();

                        let _ = tx.send(ModuleMessage::Status(format!(
                            "DMX: {} frames sent, {} universes active",
                            self.frames_sent,
                            self.engine.frames().len()
                        ))).await;
                    }
                }
            }
        }

        log::info!(
            "DMX module shutting down after sending {} frames",
            self.frames_sent
        );
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.update_status();
        self.status
            .insert("status".to_string(), "shutdown".to_string());
        log::info!("DMX module shutdown complete");
        Ok(())
    }

    fn status(&self) -> HashMap<String, String> {
        self.status.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ControlCommand;
    use crate::transport::testing::RecordingTransport;
    use luxsync_fixtures::FixtureLibrary;

    fn module(transport: &RecordingTransport) -> DmxModule {
        let engine = FixtureEngine::new(FixtureLibrary::builtin());
        DmxModule::new(engine, Box::new(transport.clone()))
    }

    #[tokio::test]
    async fn test_run_requires_initialize() {
        let transport = RecordingTransport::new();
        let mut module = module(&transport);
        let (_event_tx, event_rx) = mpsc::channel(8);
        let (message_tx, _message_rx) = mpsc::channel(8);

        assert!(module.run(event_rx, message_tx).await.is_err());
    }

    #[tokio::test]
    async fn test_commands_reach_the_wire() {
        let transport = RecordingTransport::new();
        let mut module = module(&transport);
        module.initialize().await.unwrap();

        let (event_tx, event_rx) = mpsc::channel(16);
        let (message_tx, mut message_rx) = mpsc::channel(16);

        let handle = tokio::spawn(async move {
            module.run(event_rx, message_tx).await.unwrap();
            module
        });

        event_tx
            .send(ModuleEvent::Control(ControlCommand::Patch {
                definition_id: "generic-strobe".to_string(),
                address: Some(5),
                universe: Some(1),
                label: None,
            }))
            .await
            .unwrap();

        let id = loop {
            match message_rx.recv().await {
                Some(ModuleMessage::Event(crate::EngineEvent::Patched { id, .. })) => break id,
                Some(_) => continue,
                None => panic!("module stopped before patching"),
            }
        };

        event_tx
            .send(ModuleEvent::Control(ControlCommand::SetDimmer { id, value: 180.0 }))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        event_tx.send(ModuleEvent::Shutdown).await.unwrap();

        let module = handle.await.unwrap();
        assert!(module.frames_sent() > 0);

        let frame = transport.last_frame(1).unwrap();
        assert_eq!(frame[4], 180);
        assert_eq!(frame[5], 0);
    }

    #[tokio::test]
    async fn test_rejected_commands_report_errors() {
        let transport = RecordingTransport::new();
        let mut module = module(&transport);
        module.initialize().await.unwrap();

        let (event_tx, event_rx) = mpsc::channel(16);
        let (message_tx, mut message_rx) = mpsc::channel(16);
        let handle = tokio::spawn(async move { module.run(event_rx, message_tx).await });

        event_tx
            .send(ModuleEvent::Control(ControlCommand::Patch {
                definition_id: "fog-machine".to_string(),
                address: None,
                universe: None,
                label: None,
            }))
            .await
            .unwrap();

        let error = loop {
            match message_rx.recv().await {
                Some(ModuleMessage::Error(e)) => break e,
                Some(_) => continue,
                None => panic!("module stopped before reporting"),
            }
        };
        assert!(error.contains("fog-machine"));

        drop(event_tx);
        assert!(handle.await.unwrap().is_ok());
    }
}
