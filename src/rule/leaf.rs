use crate::cert::PeerCertificate;
use crate::lpm::Ipv4Lpm;
use crate::packet::Fingerprint;
use ipnet::Ipv4Net;
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// The most-specific rule predicate: a disjunction of group-set, host-name,
/// remote-CIDR and local-CIDR predicates, with a fast-path "any" flag.
#[derive(Debug, Default, Clone)]
pub struct RuleLeaf {
    any: bool,
    hosts: HashSet<String>,
    /// Each inner set is conjunctive (all groups must be present on the
    /// cert); the outer sequence is disjunctive (any set may match).
    group_sets: Vec<HashSet<String>>,
    cidr: Ipv4Lpm,
    local_cidr: Ipv4Lpm,
}

impl RuleLeaf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_any(&self) -> bool {
        self.any
    }

    /// Merge a predicate into this leaf. A no-op once the leaf has already
    /// collapsed to `any`. Collapses the leaf to `any` itself when the
    /// incoming predicate is trivially universal.
    pub fn add(
        &mut self,
        groups: &[String],
        host: &str,
        cidr: Option<Ipv4Net>,
        local_cidr: Option<Ipv4Net>,
    ) {
        if self.any {
            return;
        }

        let trivially_universal =
            groups.is_empty() && host.is_empty() && cidr.is_none() && local_cidr.is_none();
        let any_group_token = groups.iter().any(|g| g == "any");
        let any_host = host == "any";
        let any_cidr = cidr.map(|n| n.contains(&Ipv4Addr::UNSPECIFIED)).unwrap_or(false);

        if trivially_universal || any_group_token || any_host || any_cidr {
            self.any = true;
            self.hosts.clear();
            self.group_sets.clear();
            self.cidr = Ipv4Lpm::new();
            self.local_cidr = Ipv4Lpm::new();
            return;
        }

        if !groups.is_empty() {
            self.group_sets.push(groups.iter().cloned().collect());
        }
        if !host.is_empty() {
            self.hosts.insert(host.to_string());
        }
        if let Some(net) = cidr {
            self.cidr.insert(net);
        }
        if let Some(net) = local_cidr {
            self.local_cidr.insert(net);
        }
    }

    /// True if the leaf authorizes `packet` for the peer presenting `cert`.
    /// Checks groups first as a hot-path heuristic; order is otherwise
    /// immaterial to correctness.
    pub fn matches(&self, packet: &Fingerprint, cert: &dyn PeerCertificate) -> bool {
        if self.any {
            return true;
        }
        let cert_groups = cert.groups();
        if self.group_sets.iter().any(|set| set.is_subset(cert_groups)) {
            return true;
        }
        if self.hosts.contains(cert.subject_name()) {
            return true;
        }
        if self.cidr.contains(packet.remote_ip) {
            return true;
        }
        if self.local_cidr.contains(packet.local_ip) {
            return true;
        }
        false
    }
}
