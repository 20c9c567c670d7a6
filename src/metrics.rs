//! Counter/histogram instruments for the firewall core.
//!
//! Building the registry or exporter that backs a [`Meter`] — Prometheus,
//! OTLP, whatever the host exports to — is the host's job. This module only
//! builds instruments against whatever `Meter` it is handed, the same way
//! the rest of the crate only consumes a certificate and a CA pool it does
//! not construct.

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};

/// Counter and histogram handles for the six drop counters, the rule-version
/// and rule-hash gauges, and the TCP-RTT histogram.
#[derive(Clone)]
pub struct FirewallMetrics {
    pub conntrack_count: Gauge<u64>,
    pub rules_version: Gauge<u64>,
    pub rules_hash: Gauge<u64>,

    pub incoming_dropped_local_ip: Counter<u64>,
    pub incoming_dropped_remote_ip: Counter<u64>,
    pub incoming_dropped_no_rule: Counter<u64>,
    pub outgoing_dropped_local_ip: Counter<u64>,
    pub outgoing_dropped_remote_ip: Counter<u64>,
    pub outgoing_dropped_no_rule: Counter<u64>,

    pub tcp_rtt: Histogram<f64>,
}

impl FirewallMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            conntrack_count: meter
                .u64_gauge("firewall.conntrack.count")
                .with_description("Active conntrack entries")
                .build(),
            rules_version: meter
                .u64_gauge("firewall.rules.version")
                .with_description("Current rules_version")
                .build(),
            rules_hash: meter
                .u64_gauge("firewall.rules.hash")
                .with_description("FNV-1a hash of the current ruleset")
                .build(),

            incoming_dropped_local_ip: meter
                .u64_counter("firewall.incoming.dropped.local_ip")
                .with_description("Inbound packets dropped for an unowned local IP")
                .build(),
            incoming_dropped_remote_ip: meter
                .u64_counter("firewall.incoming.dropped.remote_ip")
                .with_description("Inbound packets dropped for an unauthorized remote IP")
                .build(),
            incoming_dropped_no_rule: meter
                .u64_counter("firewall.incoming.dropped.no_rule")
                .with_description("Inbound packets dropped for no matching rule")
                .build(),
            outgoing_dropped_local_ip: meter
                .u64_counter("firewall.outgoing.dropped.local_ip")
                .with_description("Outbound packets dropped for an unowned local IP")
                .build(),
            outgoing_dropped_remote_ip: meter
                .u64_counter("firewall.outgoing.dropped.remote_ip")
                .with_description("Outbound packets dropped for an unauthorized remote IP")
                .build(),
            outgoing_dropped_no_rule: meter
                .u64_counter("firewall.outgoing.dropped.no_rule")
                .with_description("Outbound packets dropped for no matching rule")
                .build(),

            tcp_rtt: meter
                .f64_histogram("network.tcp.rtt")
                .with_description("Sampled TCP round-trip time, in seconds")
                .build(),
        }
    }
}
