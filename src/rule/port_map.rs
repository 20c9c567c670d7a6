use crate::cert::{CaPool, PeerCertificate};
use crate::error::{FirewallError, Result};
use crate::packet::{Direction, Fingerprint, ANY_PORT};
use crate::rule::ca_scope::CaScope;
use ahash::AHashMap;
use ipnet::Ipv4Net;

/// Maps a port number (plus the `ANY` and `FRAGMENT` sentinels) to a
/// CA-scoped rule set.
#[derive(Debug, Default, Clone)]
pub struct PortMap {
    scopes: AHashMap<i32, CaScope>,
}

impl PortMap {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &mut self,
        table: &'static str,
        index: usize,
        start: i32,
        end: i32,
        groups: &[String],
        host: &str,
        cidr: Option<Ipv4Net>,
        local_cidr: Option<Ipv4Net>,
        ca_name: &str,
        ca_sha: &str,
    ) -> Result<()> {
        if start > end {
            return Err(FirewallError::InvalidPortRange { table, index, start, end });
        }
        for port in start..=end {
            self.scopes.entry(port).or_default().add(
                groups, host, cidr, local_cidr, ca_name, ca_sha,
            );
        }
        Ok(())
    }

    pub fn matches(
        &self,
        packet: &Fingerprint,
        direction: Direction,
        cert: &dyn PeerCertificate,
        ca_pool: &dyn CaPool,
    ) -> bool {
        let probe = packet.probe_port(direction);
        if let Some(scope) = self.scopes.get(&probe) {
            if scope.matches(packet, cert, ca_pool) {
                return true;
            }
        }
        if probe != ANY_PORT {
            if let Some(scope) = self.scopes.get(&ANY_PORT) {
                if scope.matches(packet, cert, ca_pool) {
                    return true;
                }
            }
        }
        false
    }
}
