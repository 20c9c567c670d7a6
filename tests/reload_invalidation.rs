mod common;

use common::{FakeCert, NoCaPool};
use meshwall_core::{normalize_rule, Direction, Fingerprint, FirewallBuilder, FirewallError, Protocol, RawRuleDict, RuleTable};
use std::net::Ipv4Addr;
use std::str::FromStr;

// Scenario 7: reload invalidation. Allow a TCP flow, bump rules_version by
// swapping in an empty table, and confirm the next packet of that flow is
// denied and its conntrack entry is gone.
#[test]
fn reload_with_a_narrower_table_evicts_an_established_flow() {
    let fw = FirewallBuilder::new().local_ip(ipnet::Ipv4Net::from_str("10.0.0.1/32").unwrap()).build();
    let args = normalize_rule(
        "inbound",
        0,
        true,
        &RawRuleDict { port: Some("443".into()), proto: Some("tcp".into()), host: Some("alice".into()), ..Default::default() },
    )
    .unwrap();
    fw.add_rule(args).unwrap();

    let cert = FakeCert::new("alice").with_claimed_subnet("10.0.0.0/24");
    let fp = Fingerprint {
        remote_ip: Ipv4Addr::from_str("10.0.0.5").unwrap(),
        local_ip: Ipv4Addr::from_str("10.0.0.1").unwrap(),
        remote_port: 55000,
        local_port: 443,
        protocol: Protocol::Tcp,
        fragment: false,
    };

    assert!(fw.decide(&[], fp, Direction::Inbound, &cert, &NoCaPool, None).is_ok());
    assert_eq!(fw.conntrack_len(), 1);

    let version_before = fw.rules_version();
    fw.reload_in_table(RuleTable::new());
    assert_eq!(fw.rules_version(), version_before + 1);

    let result = fw.decide(&[], fp, Direction::Inbound, &cert, &NoCaPool, None);
    assert_eq!(result, Err(FirewallError::NoMatchingRule));
    assert_eq!(fw.conntrack_len(), 0, "a failed rematch must remove the stale conntrack entry");
}
