use crate::cert::{CaPool, PeerCertificate};
use crate::packet::Fingerprint;
use crate::rule::leaf::RuleLeaf;
use ahash::AHashMap;
use ipnet::Ipv4Net;

/// One slot of a `PortMap`: partitions rules by how the peer certificate's
/// issuing CA must be identified.
#[derive(Debug, Default, Clone)]
pub struct CaScope {
    any: Option<RuleLeaf>,
    by_name: AHashMap<String, RuleLeaf>,
    by_sha: AHashMap<String, RuleLeaf>,
}

impl CaScope {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &mut self,
        groups: &[String],
        host: &str,
        cidr: Option<Ipv4Net>,
        local_cidr: Option<Ipv4Net>,
        ca_name: &str,
        ca_sha: &str,
    ) {
        if ca_name.is_empty() && ca_sha.is_empty() {
            self.any.get_or_insert_with(RuleLeaf::new).add(groups, host, cidr, local_cidr);
            return;
        }
        // Both may be set; the rule is installed under both scopes
        // independently, matching the sha scope tried first at match time.
        if !ca_sha.is_empty() {
            self.by_sha
                .entry(ca_sha.to_string())
                .or_default()
                .add(groups, host, cidr, local_cidr);
        }
        if !ca_name.is_empty() {
            self.by_name
                .entry(ca_name.to_string())
                .or_default()
                .add(groups, host, cidr, local_cidr);
        }
    }

    pub fn matches(
        &self,
        packet: &Fingerprint,
        cert: &dyn PeerCertificate,
        ca_pool: &dyn CaPool,
    ) -> bool {
        if let Some(leaf) = &self.any {
            if leaf.matches(packet, cert) {
                return true;
            }
        }
        if let Some(leaf) = self.by_sha.get(cert.issuer_fingerprint()) {
            if leaf.matches(packet, cert) {
                return true;
            }
        }
        if let Some(ca_subject) = ca_pool.resolve_ca_subject_name(cert) {
            if let Some(leaf) = self.by_name.get(&ca_subject) {
                if leaf.matches(packet, cert) {
                    return true;
                }
            }
        }
        false
    }
}
