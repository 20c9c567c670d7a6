use meshwall_core::{CaPool, PeerCertificate};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::str::FromStr;

// `Ipv4Lpm` isn't re-exported at the crate root since it's an implementation
// detail of rule predicates; claimed-subnet certs build one via `lpm`.
pub use meshwall_core::lpm::Ipv4Lpm;

pub struct FakeCert {
    pub subject: String,
    pub issuer_sha: String,
    pub groups: HashSet<String>,
    pub claimed_subnets: Option<Ipv4Lpm>,
    pub single_vpn_ip: Option<Ipv4Addr>,
}

impl FakeCert {
    pub fn new(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            issuer_sha: String::new(),
            groups: HashSet::new(),
            claimed_subnets: None,
            single_vpn_ip: None,
        }
    }

    pub fn with_claimed_subnet(mut self, cidr: &str) -> Self {
        let mut lpm = Ipv4Lpm::new();
        lpm.insert(ipnet::Ipv4Net::from_str(cidr).unwrap());
        self.claimed_subnets = Some(lpm);
        self
    }

    pub fn with_single_vpn_ip(mut self, ip: &str) -> Self {
        self.single_vpn_ip = Some(Ipv4Addr::from_str(ip).unwrap());
        self
    }
}

impl PeerCertificate for FakeCert {
    fn subject_name(&self) -> &str {
        &self.subject
    }
    fn issuer_fingerprint(&self) -> &str {
        &self.issuer_sha
    }
    fn groups(&self) -> &HashSet<String> {
        &self.groups
    }
    fn claimed_subnets(&self) -> Option<&Ipv4Lpm> {
        self.claimed_subnets.as_ref()
    }
    fn single_vpn_ip(&self) -> Option<Ipv4Addr> {
        self.single_vpn_ip
    }
}

pub struct NoCaPool;
impl CaPool for NoCaPool {
    fn resolve_ca_subject_name(&self, _cert: &dyn PeerCertificate) -> Option<String> {
        None
    }
}
