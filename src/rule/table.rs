use crate::cert::{CaPool, PeerCertificate};
use crate::error::Result;
use crate::packet::{Direction, Fingerprint, Protocol};
use crate::rule::port_map::PortMap;
use ipnet::Ipv4Net;

/// Four port slots keyed by transport protocol (TCP, UDP, ICMP, ANY).
#[derive(Debug, Default, Clone)]
pub struct RuleTable {
    tcp: PortMap,
    udp: PortMap,
    icmp: PortMap,
    any: PortMap,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &mut self,
        table: &'static str,
        index: usize,
        proto: Protocol,
        start_port: i32,
        end_port: i32,
        groups: &[String],
        host: &str,
        cidr: Option<Ipv4Net>,
        local_cidr: Option<Ipv4Net>,
        ca_name: &str,
        ca_sha: &str,
    ) -> Result<()> {
        let map = match proto {
            Protocol::Tcp => &mut self.tcp,
            Protocol::Udp => &mut self.udp,
            Protocol::Icmp => &mut self.icmp,
            Protocol::Any => &mut self.any,
        };
        map.add(
            table, index, start_port, end_port, groups, host, cidr, local_cidr, ca_name, ca_sha,
        )
    }

    /// First tests the protocol-agnostic PortMap; only on its refusal does
    /// the packet get dispatched to its protocol-specific PortMap. Protocols
    /// other than TCP/UDP/ICMP only ever match through the ANY map.
    pub fn matches(
        &self,
        packet: &Fingerprint,
        direction: Direction,
        cert: &dyn PeerCertificate,
        ca_pool: &dyn CaPool,
    ) -> bool {
        if self.any.matches(packet, direction, cert, ca_pool) {
            return true;
        }
        match packet.protocol {
            Protocol::Tcp => self.tcp.matches(packet, direction, cert, ca_pool),
            Protocol::Udp => self.udp.matches(packet, direction, cert, ca_pool),
            Protocol::Icmp => self.icmp.matches(packet, direction, cert, ca_pool),
            Protocol::Any => false,
        }
    }
}
