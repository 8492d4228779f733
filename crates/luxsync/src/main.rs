use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use luxsync_core::{
    ArtNetTransport, AsyncModule, ConfigManager, DmxModule, DmxTransport, FixtureEngine,
    ModuleEvent, ModuleMessage, NetworkConfig, NullTransport, Settings,
};
use luxsync_fixtures::FixtureLibrary;
use tokio::sync::mpsc;

/// Fixture control engine that drives moving heads, pars and wheels over Art-Net.
#[derive(Parser, Debug)]
#[command(name = "luxsync")]
#[command(about = "LuxSync fixture engine")]
struct Args {
    /// Path to the settings file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Directory of fixture definition files (overrides the config)
    #[arg(long)]
    definitions: Option<PathBuf>,

    /// Art-Net Source IP address
    #[arg(long, value_parser = parse_ip)]
    source_ip: Option<IpAddr>,

    /// Art-Net Destination IP address
    #[arg(long, value_parser = parse_ip)]
    dest_ip: Option<IpAddr>,

    /// Art-Net port
    #[arg(long)]
    artnet_port: Option<u16>,

    /// Force broadcast mode even if destination IP is provided
    #[arg(long, default_value = "false")]
    broadcast: bool,

    /// Run the engine without sending any DMX
    #[arg(long)]
    dry_run: bool,

    /// Fixture to patch at startup, as `definition` or `definition@universe:address`
    #[arg(long = "patch", value_parser = parse_patch)]
    patches: Vec<PatchArg>,
}

#[derive(Clone, Debug, PartialEq)]
struct PatchArg {
    definition_id: String,
    universe: Option<u16>,
    address: Option<u16>,
}

fn parse_ip(s: &str) -> Result<IpAddr, String> {
    s.parse().map_err(|e| format!("Invalid IP address: {}", e))
}

fn parse_patch(s: &str) -> Result<PatchArg, String> {
    let (definition_id, placement) = match s.split_once('@') {
        Some((id, placement)) => (id, Some(placement)),
        None => (s, None),
    };
    if definition_id.is_empty() {
        return Err("Missing fixture definition id".to_string());
    }

    let (universe, address) = match placement {
        None => (None, None),
        Some(placement) => {
            let (universe, address) = match placement.split_once(':') {
                Some((universe, address)) => (Some(universe), address),
                None => (None, placement),
            };
            let universe = universe
                .map(|u| u.parse::<u16>().map_err(|e| format!("Invalid universe '{}': {}", u, e)))
                .transpose()?;
            let address = address
                .parse::<u16>()
                .map_err(|e| format!("Invalid address '{}': {}", address, e))?;
            (universe, Some(address))
        }
    };

    Ok(PatchArg {
        definition_id: definition_id.to_string(),
        universe,
        address,
    })
}

fn apply_overrides(settings: &mut Settings, args: &Args) {
    if let Some(dir) = &args.definitions {
        settings.definitions_dir = dir.clone();
    }
    if let Some(ip) = args.source_ip {
        settings.dmx_source_ip = ip.to_string();
    }
    if let Some(ip) = args.dest_ip {
        settings.dmx_dest_ip = ip.to_string();
    }
    if let Some(port) = args.artnet_port {
        settings.dmx_port = port;
    }
    if args.broadcast {
        settings.dmx_broadcast = true;
    }
}

fn load_library(settings: &Settings) -> FixtureLibrary {
    let mut library = FixtureLibrary::new();
    if let Err(e) = library.load_dir(&settings.definitions_dir) {
        log::warn!(
            "Could not read definitions from {}: {}",
            settings.definitions_dir.display(),
            e
        );
    }

    if settings.include_builtin_definitions {
        let added = library.merge_missing(FixtureLibrary::builtin());
        log::info!("Added {} builtin fixture definitions", added);
    }
    library
}

fn build_transport(settings: &Settings, dry_run: bool) -> anyhow::Result<Box<dyn DmxTransport>> {
    if dry_run || !settings.dmx_enabled {
        log::info!("DMX output disabled, frames will be discarded");
        return Ok(Box::new(NullTransport::new()));
    }

    let network_config = NetworkConfig::from_settings(settings)?;
    println!("Configuring LuxSync with Art-Net settings:");
    println!("Mode: {}", network_config.get_mode_string());
    println!("Destination: {}", network_config.get_destination());
    println!("Port: {}", network_config.port);

    let transport = ArtNetTransport::new(network_config).context("Failed to open Art-Net socket")?;
    Ok(Box::new(transport))
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = ConfigManager::new(Some(args.config.clone()));
    let mut settings = config
        .load()
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    apply_overrides(&mut settings, &args);

    let library = load_library(&settings);
    if library.is_empty() {
        anyhow::bail!("No fixture definitions available");
    }

    let mut engine = FixtureEngine::new(library).with_wheel_settings(settings.wheel_settings());
    for patch in &args.patches {
        let id = engine
            .patch(&patch.definition_id, patch.address, patch.universe)
            .with_context(|| format!("Failed to patch {}", patch.definition_id))?;
        let instance = engine.instance(id)?;
        println!(
            "{} {} -> universe {} address {}",
            id,
            instance.label(),
            instance.universe(),
            instance.dmx_address()
        );
    }

    let transport = build_transport(&settings, args.dry_run)?;
    let mut module = DmxModule::new(engine, transport);
    module.set_tick_rate(settings.tick_rate_hz as f64);
    module
        .initialize()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize DMX module: {}", e))?;

    let (event_tx, event_rx) = mpsc::channel::<ModuleEvent>(256);
    let (message_tx, mut message_rx) = mpsc::channel::<ModuleMessage>(256);

    let handle = tokio::spawn(async move {
        let result = module.run(event_rx, message_tx).await;
        if let Err(e) = module.shutdown().await {
            log::error!("DMX module shutdown failed: {}", e);
        }
        result
    });

    let monitor = tokio::spawn(async move {
        while let Some(message) = message_rx.recv().await {
            match message {
                ModuleMessage::Event(event) => log::info!("{:?}", event),
                ModuleMessage::Status(status) => log::info!("{}", status),
                ModuleMessage::Error(error) => log::error!("{}", error),
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    log::info!("Shutting down");
    let _ = event_tx.send(ModuleEvent::Shutdown).await;

    handle
        .await?
        .map_err(|e| anyhow::anyhow!("DMX module failed: {}", e))?;
    let _ = monitor.await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_patch() {
        assert_eq!(
            parse_patch("beam-2r").unwrap(),
            PatchArg {
                definition_id: "beam-2r".to_string(),
                universe: None,
                address: None,
            }
        );
        assert_eq!(
            parse_patch("beam-2r@2:101").unwrap(),
            PatchArg {
                definition_id: "beam-2r".to_string(),
                universe: Some(2),
                address: Some(101),
            }
        );
        assert_eq!(parse_patch("led-par-rgb@9").unwrap().address, Some(9));
        assert!(parse_patch("@1:1").is_err());
        assert!(parse_patch("beam-2r@x:1").is_err());
        assert!(parse_patch("beam-2r@1:").is_err());
    }

    #[test]
    fn test_overrides_win_over_config() {
        let args = Args::parse_from([
            "luxsync",
            "--dest-ip",
            "10.0.0.5",
            "--artnet-port",
            "6455",
            "--patch",
            "generic-strobe@0:1",
        ]);
        let mut settings = Settings::default();
        apply_overrides(&mut settings, &args);

        assert_eq!(settings.dmx_dest_ip, "10.0.0.5");
        assert_eq!(settings.dmx_port, 6455);
        assert!(!settings.dmx_broadcast);
        assert_eq!(args.patches.len(), 1);
    }
}
