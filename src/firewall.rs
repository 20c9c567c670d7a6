//! The top-level facade: owns both rule tables, the conntrack state, and
//! the per-node tunables, and exposes `add_rule` / `decide` as the crate's
//! two real entry points.

use crate::cert::{CaPool, PeerCertificate};
use crate::conntrack::{Conntrack, ConntrackCache, Timeouts};
use crate::error::{FirewallError, Result};
use crate::hash::RuleTextAccumulator;
use crate::lpm::Ipv4Lpm;
use crate::metrics::FirewallMetrics;
use crate::packet::{Direction, Fingerprint};
use crate::rule::RuleTable;
use crate::rule_spec::AddRuleArgs;
use arc_swap::ArcSwap;
use ipnet::Ipv4Net;
use opentelemetry::metrics::Meter;
use std::sync::atomic::{AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Construct-then-freeze builder for [`Firewall`]: collects tunables behind
/// a struct-of-defaults and produces an immutable `Firewall` on `build()`.
pub struct FirewallBuilder {
    tcp_timeout: Duration,
    udp_timeout: Duration,
    default_timeout: Duration,
    send_reject_in: bool,
    send_reject_out: bool,
    local_ips: Vec<Ipv4Net>,
    meter: Option<Meter>,
}

impl Default for FirewallBuilder {
    fn default() -> Self {
        Self {
            tcp_timeout: Duration::from_secs(12 * 60 * 60),
            udp_timeout: Duration::from_secs(3 * 60),
            default_timeout: Duration::from_secs(10 * 60),
            send_reject_in: false,
            send_reject_out: false,
            local_ips: Vec::new(),
            meter: None,
        }
    }
}

impl FirewallBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tcp_timeout(mut self, timeout: Duration) -> Self {
        self.tcp_timeout = timeout;
        self
    }

    pub fn udp_timeout(mut self, timeout: Duration) -> Self {
        self.udp_timeout = timeout;
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn send_reject_in(mut self, reject: bool) -> Self {
        self.send_reject_in = reject;
        self
    }

    pub fn send_reject_out(mut self, reject: bool) -> Self {
        self.send_reject_out = reject;
        self
    }

    pub fn local_ip(mut self, net: Ipv4Net) -> Self {
        self.local_ips.push(net);
        self
    }

    pub fn meter(mut self, meter: Meter) -> Self {
        self.meter = Some(meter);
        self
    }

    pub fn build(self) -> Firewall {
        let meter = self
            .meter
            .unwrap_or_else(|| opentelemetry::global::meter("meshwall-core"));
        let metrics = FirewallMetrics::new(&meter);

        let mut local_ips = Ipv4Lpm::new();
        for net in self.local_ips {
            local_ips.insert(net);
        }

        Firewall {
            in_table: ArcSwap::new(Arc::new(RuleTable::new())),
            out_table: ArcSwap::new(Arc::new(RuleTable::new())),
            conntrack: Conntrack::new(),
            local_ips,
            timeouts: Timeouts {
                tcp: self.tcp_timeout,
                udp: self.udp_timeout,
                default: self.default_timeout,
            },
            send_reject_in: self.send_reject_in,
            send_reject_out: self.send_reject_out,
            rules_version: AtomicU16::new(1),
            rules_text: Mutex::new(RuleTextAccumulator::new()),
            in_count: AtomicUsize::new(0),
            out_count: AtomicUsize::new(0),
            dropped_local_ip_in: AtomicU64::new(0),
            dropped_remote_ip_in: AtomicU64::new(0),
            dropped_no_rule_in: AtomicU64::new(0),
            dropped_local_ip_out: AtomicU64::new(0),
            dropped_remote_ip_out: AtomicU64::new(0),
            dropped_no_rule_out: AtomicU64::new(0),
            metrics,
        }
    }
}

/// Process-wide firewall state: two rule tables, conntrack, and the
/// counters/tunables that orbit them. Constructed once per node
/// certificate via [`FirewallBuilder`]; `Send + Sync` so it can be shared
/// across the tunnel's worker threads.
pub struct Firewall {
    in_table: ArcSwap<RuleTable>,
    out_table: ArcSwap<RuleTable>,
    conntrack: Conntrack,
    local_ips: Ipv4Lpm,
    timeouts: Timeouts,
    send_reject_in: bool,
    send_reject_out: bool,
    rules_version: AtomicU16,
    rules_text: Mutex<RuleTextAccumulator>,
    in_count: AtomicUsize,
    out_count: AtomicUsize,
    dropped_local_ip_in: AtomicU64,
    dropped_remote_ip_in: AtomicU64,
    dropped_no_rule_in: AtomicU64,
    dropped_local_ip_out: AtomicU64,
    dropped_remote_ip_out: AtomicU64,
    dropped_no_rule_out: AtomicU64,
    metrics: FirewallMetrics,
}

impl Firewall {
    /// Install one rule into the table `args.incoming` selects, via
    /// copy-on-write over the `ArcSwap`-held table (safe during the
    /// construction phase when no packets are yet in flight) and append its
    /// canonical text to the rule-hash accumulator.
    pub fn add_rule(&self, args: AddRuleArgs) -> Result<()> {
        let (swap, counter, table_name) = if args.incoming {
            (&self.in_table, &self.in_count, "inbound")
        } else {
            (&self.out_table, &self.out_count, "outbound")
        };
        let index = counter.fetch_add(1, Ordering::Relaxed);

        let current = swap.load();
        let mut next = (**current).clone();
        next.add(
            table_name,
            index,
            args.proto,
            args.start_port,
            args.end_port,
            &args.groups,
            &args.host,
            args.cidr,
            args.local_cidr,
            &args.ca_name,
            &args.ca_sha,
        )?;
        swap.store(Arc::new(next));

        let mut text = self.rules_text.lock().unwrap();
        text.push(
            args.incoming,
            args.proto.as_str(),
            args.start_port,
            args.end_port,
            &args.groups,
            &args.host,
            &args.cidr.map(|n| n.to_string()).unwrap_or_default(),
            &args.local_cidr.map(|n| n.to_string()).unwrap_or_default(),
            &args.ca_name,
            &args.ca_sha,
        );
        self.metrics.rules_hash.record(text.fnv32() as u64, &[]);
        debug!(table = table_name, index, "rule installed");
        Ok(())
    }

    /// Publish a freshly-built `RuleTable` atomically and bump
    /// `rules_version`, invalidating conntrack entries that no longer match
    /// on their next packet.
    pub fn reload_in_table(&self, table: RuleTable) {
        self.in_table.store(Arc::new(table));
        self.bump_version();
    }

    pub fn reload_out_table(&self, table: RuleTable) {
        self.out_table.store(Arc::new(table));
        self.bump_version();
    }

    fn bump_version(&self) {
        let version = self.rules_version.fetch_add(1, Ordering::AcqRel) + 1;
        self.metrics.rules_version.record(version as u64, &[]);
        debug!(version, "rules_version bumped");
    }

    pub fn rules_version(&self) -> u16 {
        self.rules_version.load(Ordering::Acquire)
    }

    pub fn rules_text(&self) -> String {
        self.rules_text.lock().unwrap().as_str().to_string()
    }

    pub fn rule_hash_sha256(&self) -> String {
        self.rules_text.lock().unwrap().sha256_hex()
    }

    pub fn rule_hash_fnv32(&self) -> u32 {
        self.rules_text.lock().unwrap().fnv32()
    }

    pub fn conntrack_len(&self) -> usize {
        self.conntrack.len()
    }

    pub fn send_reject_in(&self) -> bool {
        self.send_reject_in
    }

    pub fn send_reject_out(&self) -> bool {
        self.send_reject_out
    }

    pub fn dropped_local_ip(&self, direction: Direction) -> u64 {
        self.counter_for(direction, &self.dropped_local_ip_in, &self.dropped_local_ip_out)
    }

    pub fn dropped_remote_ip(&self, direction: Direction) -> u64 {
        self.counter_for(direction, &self.dropped_remote_ip_in, &self.dropped_remote_ip_out)
    }

    pub fn dropped_no_rule(&self, direction: Direction) -> u64 {
        self.counter_for(direction, &self.dropped_no_rule_in, &self.dropped_no_rule_out)
    }

    fn counter_for(&self, direction: Direction, inbound: &AtomicU64, outbound: &AtomicU64) -> u64 {
        let counter = if direction.is_inbound() { inbound } else { outbound };
        counter.load(Ordering::Relaxed)
    }

    /// Decides whether to allow a packet: conntrack fast path, then
    /// remote-IP validation, local-IP ownership, rule match, and conntrack
    /// install. Exactly one counter is incremented per drop outcome; none
    /// on allow.
    pub fn decide(
        &self,
        raw_packet: &[u8],
        fingerprint: Fingerprint,
        direction: Direction,
        cert: &dyn PeerCertificate,
        ca_pool: &dyn CaPool,
        local_cache: Option<&mut ConntrackCache>,
    ) -> Result<()> {
        let rules_version = self.rules_version();
        let in_table = self.in_table.load();
        let out_table = self.out_table.load();

        let mut local_cache = local_cache;
        if self.conntrack.lookup_and_refresh(
            raw_packet,
            fingerprint,
            direction,
            cert,
            ca_pool,
            local_cache.as_mut().map(|c| &mut **c),
            rules_version,
            &in_table,
            &out_table,
            &self.timeouts,
            &self.metrics.tcp_rtt,
        ) {
            return Ok(());
        }

        let remote_ok = match cert.claimed_subnets() {
            Some(subnets) => subnets.contains(fingerprint.remote_ip),
            None => cert
                .single_vpn_ip()
                .map(|ip| ip == fingerprint.remote_ip)
                .unwrap_or(false),
        };
        if !remote_ok {
            self.record_drop(direction, &self.dropped_remote_ip_in, &self.dropped_remote_ip_out);
            self.emit_drop_metric(direction, &self.metrics.incoming_dropped_remote_ip, &self.metrics.outgoing_dropped_remote_ip);
            return Err(FirewallError::InvalidRemoteIp);
        }

        if !self.local_ips.contains(fingerprint.local_ip) {
            self.record_drop(direction, &self.dropped_local_ip_in, &self.dropped_local_ip_out);
            self.emit_drop_metric(direction, &self.metrics.incoming_dropped_local_ip, &self.metrics.outgoing_dropped_local_ip);
            return Err(FirewallError::InvalidLocalIp);
        }

        let table = if direction.is_inbound() { &in_table } else { &out_table };
        if !table.matches(&fingerprint, direction, cert, ca_pool) {
            self.record_drop(direction, &self.dropped_no_rule_in, &self.dropped_no_rule_out);
            self.emit_drop_metric(direction, &self.metrics.incoming_dropped_no_rule, &self.metrics.outgoing_dropped_no_rule);
            return Err(FirewallError::NoMatchingRule);
        }

        self.conntrack.install(raw_packet, fingerprint, direction, rules_version, &self.timeouts);
        if let Some(cache) = local_cache {
            cache.insert(fingerprint);
        }
        self.metrics.conntrack_count.record(self.conntrack.len() as u64, &[]);
        Ok(())
    }

    fn record_drop(&self, direction: Direction, inbound: &AtomicU64, outbound: &AtomicU64) {
        let counter = if direction.is_inbound() { inbound } else { outbound };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn emit_drop_metric(
        &self,
        direction: Direction,
        inbound: &opentelemetry::metrics::Counter<u64>,
        outbound: &opentelemetry::metrics::Counter<u64>,
    ) {
        let counter = if direction.is_inbound() { inbound } else { outbound };
        counter.add(1, &[]);
    }
}

/// Parses `inbound_action`/`outbound_action`: unknown values log a warning
/// and default to drop.
pub fn parse_reject_action(raw: &str) -> bool {
    match raw.to_ascii_lowercase().as_str() {
        "reject" => true,
        "drop" => false,
        other => {
            warn!(value = other, "unknown action, defaulting to drop");
            false
        }
    }
}
