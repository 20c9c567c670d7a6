mod common;

use common::{FakeCert, NoCaPool};
use meshwall_core::{normalize_rule, Direction, Fingerprint, FirewallBuilder, Protocol, RawRuleDict};
use std::net::Ipv4Addr;
use std::str::FromStr;

fn fingerprint() -> Fingerprint {
    Fingerprint {
        remote_ip: Ipv4Addr::from_str("10.0.0.5").unwrap(),
        local_ip: Ipv4Addr::from_str("10.0.0.1").unwrap(),
        remote_port: 55000,
        local_port: 443,
        protocol: Protocol::Tcp,
        fragment: false,
    }
}

// Universal property: a second allowed packet on an established flow never
// flips the verdict to deny, and does not install a second conntrack entry.
#[test]
fn second_packet_on_an_established_flow_stays_allowed() {
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
    let fp = fingerprint();

    assert!(fw.decide(&[], fp, Direction::Inbound, &cert, &NoCaPool, None).is_ok());
    assert_eq!(fw.conntrack_len(), 1);

    // Second packet: same fingerprint, goes through the fast path.
    assert!(fw.decide(&[], fp, Direction::Inbound, &cert, &NoCaPool, None).is_ok());
    assert_eq!(fw.conntrack_len(), 1, "refresh must not grow the conntrack table");
}

#[test]
fn per_call_cache_hit_allows_without_touching_the_lock_protected_map() {
    use meshwall_core::conntrack::ConntrackCache;

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
    let fp = fingerprint();
    let mut cache = ConntrackCache::new();

    assert!(fw.decide(&[], fp, Direction::Inbound, &cert, &NoCaPool, Some(&mut cache)).is_ok());
    assert!(cache.contains(&fp));
}
