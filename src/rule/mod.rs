mod ca_scope;
mod leaf;
mod port_map;
mod table;

pub use ca_scope::CaScope;
pub use leaf::RuleLeaf;
pub use port_map::PortMap;
pub use table::RuleTable;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::{CaPool, PeerCertificate};
    use crate::lpm::Ipv4Lpm;
    use crate::packet::{Direction, Fingerprint, Protocol};
    use std::collections::HashSet;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    struct FakeCert {
        subject: String,
        issuer_sha: String,
        groups: HashSet<String>,
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
            None
        }
        fn single_vpn_ip(&self) -> Option<Ipv4Addr> {
            None
        }
    }

    struct NoCaPool;
    impl CaPool for NoCaPool {
        fn resolve_ca_subject_name(&self, _cert: &dyn PeerCertificate) -> Option<String> {
            None
        }
    }

    struct StaticCaPool(&'static str);
    impl CaPool for StaticCaPool {
        fn resolve_ca_subject_name(&self, _cert: &dyn PeerCertificate) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    fn packet(proto: Protocol, local_port: u16, fragment: bool) -> Fingerprint {
        Fingerprint {
            remote_ip: Ipv4Addr::from_str("10.0.0.5").unwrap(),
            local_ip: Ipv4Addr::from_str("10.0.0.1").unwrap(),
            remote_port: 55000,
            local_port,
            protocol: proto,
            fragment,
        }
    }

    #[test]
    fn tcp_allow_by_host() {
        let mut table = RuleTable::new();
        table
            .add("in", 0, Protocol::Tcp, 443, 443, &[], "alice", None, None, "", "")
            .unwrap();
        let cert = FakeCert { subject: "alice".into(), issuer_sha: "".into(), groups: HashSet::new() };
        let pkt = packet(Protocol::Tcp, 443, false);
        assert!(table.matches(&pkt, Direction::Inbound, &cert, &NoCaPool));
    }

    #[test]
    fn no_matching_rule_on_wrong_port() {
        let mut table = RuleTable::new();
        table.add("in", 0, Protocol::Tcp, 80, 80, &[], "any", None, None, "", "").unwrap();
        let cert = FakeCert { subject: "x".into(), issuer_sha: "".into(), groups: HashSet::new() };
        let pkt = packet(Protocol::Tcp, 22, false);
        assert!(!table.matches(&pkt, Direction::Inbound, &cert, &NoCaPool));
    }

    #[test]
    fn any_proto_overrides_per_proto_absence() {
        let mut table = RuleTable::new();
        table.add("in", 0, Protocol::Any, 0, 0, &[], "any", None, None, "", "").unwrap();
        let cert = FakeCert { subject: "x".into(), issuer_sha: "".into(), groups: HashSet::new() };
        let pkt = packet(Protocol::Icmp, 0, false);
        assert!(table.matches(&pkt, Direction::Inbound, &cert, &NoCaPool));
    }

    #[test]
    fn fragment_routing_uses_fragment_sentinel() {
        let mut table = RuleTable::new();
        table
            .add("in", 0, Protocol::Tcp, -1, -1, &[], "any", None, None, "", "")
            .unwrap();
        let cert = FakeCert { subject: "x".into(), issuer_sha: "".into(), groups: HashSet::new() };
        let fragment_pkt = packet(Protocol::Tcp, 0, true);
        assert!(table.matches(&fragment_pkt, Direction::Inbound, &cert, &NoCaPool));

        let mut table_without_fragment = RuleTable::new();
        table_without_fragment
            .add("in", 0, Protocol::Tcp, 443, 443, &[], "any", None, None, "", "")
            .unwrap();
        assert!(!table_without_fragment.matches(&fragment_pkt, Direction::Inbound, &cert, &NoCaPool));
    }

    #[test]
    fn invalid_port_range_is_rejected() {
        let mut table = RuleTable::new();
        let err = table
            .add("in", 2, Protocol::Tcp, 500, 100, &[], "any", None, None, "", "")
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::FirewallError::InvalidPortRange { table: "in", index: 2, start: 500, end: 100 }
        ));
    }

    #[test]
    fn ca_sha_scope_tried_before_ca_name_scope() {
        let mut table = RuleTable::new();
        table
            .add("in", 0, Protocol::Tcp, 443, 443, &[], "any", None, None, "", "ca-sha-1")
            .unwrap();
        let cert = FakeCert {
            subject: "x".into(),
            issuer_sha: "ca-sha-1".into(),
            groups: HashSet::new(),
        };
        let pkt = packet(Protocol::Tcp, 443, false);
        // Resolves to a CA name that has no rule, but the sha scope matches.
        assert!(table.matches(&pkt, Direction::Inbound, &cert, &StaticCaPool("unrelated-ca")));
    }

    #[test]
    fn ca_name_scope_requires_pool_resolution() {
        let mut table = RuleTable::new();
        table
            .add("in", 0, Protocol::Tcp, 443, 443, &[], "any", None, None, "trusted-ca", "")
            .unwrap();
        let cert = FakeCert { subject: "x".into(), issuer_sha: "".into(), groups: HashSet::new() };
        let pkt = packet(Protocol::Tcp, 443, false);
        assert!(!table.matches(&pkt, Direction::Inbound, &cert, &NoCaPool));
        assert!(table.matches(&pkt, Direction::Inbound, &cert, &StaticCaPool("trusted-ca")));
    }
}
