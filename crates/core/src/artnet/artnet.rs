use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use artnet_protocol::{ArtCommand, Output, PortAddress};
use serde::{Deserialize, Serialize};

use super::network_config::NetworkConfig;
use crate::error::TransportError;
use crate::frame::DmxFrame;
use crate::transport::DmxTransport;

const BROADCAST_IP: &str = "255.255.255.255";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ArtNetMode {
    Broadcast,
    /// Specify from (interface) + to (destination) addresses
    Unicast(SocketAddr, SocketAddr),
}

/// One UDP socket bound for one Art-Net destination.
#[derive(Debug)]
pub struct ArtNet {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl ArtNet {
    pub fn new(mode: &ArtNetMode, port: u16) -> Result<Self, TransportError> {
        match mode {
            ArtNetMode::Broadcast => {
                let socket = UdpSocket::bind(("0.0.0.0", 0))?;
                socket.set_broadcast(true)?;
                let destination = (BROADCAST_IP, port)
                    .to_socket_addrs()?
                    .next()
                    .ok_or_else(|| TransportError::Protocol("no broadcast address".to_string()))?;
                log::debug!("Art-Net broadcast to {}", destination);
                Ok(ArtNet {
                    socket,
                    destination,
                })
            }
            ArtNetMode::Unicast(src, destination) => {
                log::debug!(
                    "Art-Net unicast from interface {} to destination {}",
                    src,
                    destination
                );
                let socket = UdpSocket::bind(SocketAddr::new(src.ip(), 0))?;
                socket.set_broadcast(false)?;
                Ok(ArtNet {
                    socket,
                    destination: *destination,
                })
            }
        }
    }

    pub fn send_data(&self, universe: u16, sequence: u8, data: &DmxFrame) -> Result<(), TransportError> {
        let port_address = PortAddress::try_from(universe)
            .map_err(|e| TransportError::Protocol(format!("universe {}: {:?}", universe, e)))?;
        let command = ArtCommand::Output(Output {
            sequence,
            port_address,
            data: data.to_vec().into(),
            ..Output::default()
        });

        let bytes = command
            .write_to_buffer()
            .map_err(|e| TransportError::Protocol(format!("{:?}", e)))?;
        self.socket.send_to(&bytes, self.destination)?;
        Ok(())
    }
}

/// Sends each universe as an ArtDMX packet to the destination its routing
/// names.
pub struct ArtNetTransport {
    network_config: NetworkConfig,
    outputs: Vec<ArtNet>,
    sequence: u8,
}

impl ArtNetTransport {
    pub fn new(network_config: NetworkConfig) -> Result<Self, TransportError> {
        let outputs = network_config
            .destinations
            .iter()
            .map(|destination| ArtNet::new(&destination.mode, network_config.port))
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "Art-Net output ready ({}): {}",
            network_config.get_mode_string(),
            network_config.get_destination()
        );
        Ok(ArtNetTransport {
            network_config,
            outputs,
            sequence: 0,
        })
    }

    pub fn network_config(&self) -> &NetworkConfig {
        &self.network_config
    }
}

impl DmxTransport for ArtNetTransport {
    fn send_universe(&mut self, universe: u16, data: &DmxFrame) -> Result<(), TransportError> {
        // 0 marks a packet as unsequenced; cycle through 1-255.
        self.sequence = self.sequence.wrapping_add(1).max(1);

        let output = self
            .network_config
            .get_destination_for_universe(universe)
            .and_then(|index| self.outputs.get(index))
            .ok_or(TransportError::NoDestination(universe))?;
        output.send_data(universe, self.sequence, data)
    }

    fn name(&self) -> String {
        format!("Art-Net {}", self.network_config.get_destination())
    }
}
