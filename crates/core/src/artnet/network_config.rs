use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use super::artnet::ArtNetMode;
use crate::config::ConfigError;
use crate::Settings;

#[derive(Clone, Debug, PartialEq)]
pub struct NetworkConfig {
    pub destinations: Vec<ArtNetDestination>,
    pub universe_routing: HashMap<u16, usize>, // universe -> destination index
    pub port: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArtNetDestination {
    pub name: String,
    pub mode: ArtNetMode,
}

impl NetworkConfig {
    /// A single destination that receives every universe.
    pub fn new(source_ip: IpAddr, dest_ip: Option<IpAddr>, artnet_port: u16, broadcast: bool) -> Self {
        let mode = if broadcast {
            ArtNetMode::Broadcast
        } else {
            match dest_ip {
                Some(ip) => ArtNetMode::Unicast(
                    SocketAddr::new(source_ip, artnet_port),
                    SocketAddr::new(ip, artnet_port),
                ),
                None => ArtNetMode::Broadcast,
            }
        };

        NetworkConfig {
            destinations: vec![ArtNetDestination {
                name: "default".to_string(),
                mode,
            }],
            universe_routing: HashMap::new(),
            port: artnet_port,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let source_ip: IpAddr = settings.dmx_source_ip.parse().map_err(|e| {
            ConfigError::Validation(vec![format!(
                "dmx_source_ip '{}' is not an IP address: {}",
                settings.dmx_source_ip, e
            )])
        })?;
        let dest_ip = if settings.dmx_dest_ip.trim().is_empty() {
            None
        } else {
            Some(settings.dmx_dest_ip.parse::<IpAddr>().map_err(|e| {
                ConfigError::Validation(vec![format!(
                    "dmx_dest_ip '{}' is not an IP address: {}",
                    settings.dmx_dest_ip, e
                )])
            })?)
        };

        Ok(Self::new(
            source_ip,
            dest_ip,
            settings.dmx_port,
            settings.dmx_broadcast,
        ))
    }

    pub fn add_destination(&mut self, destination: ArtNetDestination) -> usize {
        self.destinations.push(destination);
        self.destinations.len() - 1
    }

    pub fn route_universe(&mut self, universe: u16, destination_index: usize) {
        if destination_index < self.destinations.len() {
            self.universe_routing.insert(universe, destination_index);
        }
    }

    /// Routed destination for a universe. Unrouted universes go to the first
    /// destination.
    pub fn get_destination_for_universe(&self, universe: u16) -> Option<usize> {
        match self.universe_routing.get(&universe) {
            Some(index) => Some(*index),
            None if !self.destinations.is_empty() => Some(0),
            None => None,
        }
    }

    pub fn get_destination(&self) -> String {
        if self.destinations.is_empty() {
            return "No destinations configured".to_string();
        }

        self.destinations
            .iter()
            .map(|dest| format!("{}: {}", dest.name, self.get_destination_string(&dest.mode)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn get_mode_string(&self) -> &str {
        if self.destinations.is_empty() {
            return "none";
        }
        let unicast = self
            .destinations
            .iter()
            .filter(|dest| matches!(dest.mode, ArtNetMode::Unicast(_, _)))
            .count();
        match (unicast, self.destinations.len()) {
            (0, _) => "broadcast",
            (u, n) if u == n && n == 1 => "unicast",
            (u, n) if u == n => "multi-unicast",
            _ => "mixed",
        }
    }

    fn get_destination_string(&self, mode: &ArtNetMode) -> String {
        match mode {
            ArtNetMode::Unicast(src, destination) => {
                format!("{} -> {}:{}", src.ip(), destination.ip(), destination.port())
            }
            ArtNetMode::Broadcast => format!("255.255.255.255:{}", self.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicast_from_settings() {
        let settings = Settings::default();
        let config = NetworkConfig::from_settings(&settings).unwrap();
        assert_eq!(config.get_mode_string(), "unicast");
        assert_eq!(
            config.get_destination(),
            "default: 192.168.1.100 -> 192.168.1.200:6454"
        );
        assert_eq!(config.get_destination_for_universe(7), Some(0));
    }

    #[test]
    fn test_broadcast_overrides_destination() {
        let settings = Settings {
            dmx_broadcast: true,
            ..Settings::default()
        };
        let config = NetworkConfig::from_settings(&settings).unwrap();
        assert_eq!(config.destinations[0].mode, ArtNetMode::Broadcast);
        assert_eq!(config.get_mode_string(), "broadcast");
    }

    #[test]
    fn test_invalid_ip_is_a_validation_error() {
        let settings = Settings {
            dmx_source_ip: "stage-left".to_string(),
            ..Settings::default()
        };
        assert!(matches!(
            NetworkConfig::from_settings(&settings),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_universe_routing() {
        let mut config = NetworkConfig::new("10.0.0.1".parse().unwrap(), None, 6454, false);
        let second = config.add_destination(ArtNetDestination {
            name: "upstage".to_string(),
            mode: ArtNetMode::Unicast(
                "10.0.0.1:6454".parse().unwrap(),
                "10.0.0.20:6454".parse().unwrap(),
            ),
        });
        config.route_universe(3, second);
        config.route_universe(4, 99);

        assert_eq!(config.get_destination_for_universe(3), Some(1));
        assert_eq!(config.get_destination_for_universe(4), Some(0));
        assert_eq!(config.get_mode_string(), "mixed");
    }
}
