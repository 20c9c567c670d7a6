//! Mutex-protected connection tracking: fingerprint → connection record,
//! paired with an expiry wheel under the same lock, matching the
//! "Conntrack is the sole shared mutable core state" concurrency model.

mod cache;
mod record;
mod wheel;

pub use cache::ConntrackCache;
pub use record::ConnRecord;
pub use wheel::ExpiryWheel;

use crate::cert::{CaPool, PeerCertificate};
use crate::packet::{Direction, Fingerprint, Protocol};
use crate::rtt;
use crate::rule::RuleTable;
use ahash::AHashMap;
use opentelemetry::metrics::Histogram;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// The three timeout tunables selected by protocol.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub tcp: Duration,
    pub udp: Duration,
    pub default: Duration,
}

impl Timeouts {
    pub fn for_protocol(&self, proto: Protocol) -> Duration {
        match proto {
            Protocol::Tcp => self.tcp,
            Protocol::Udp => self.udp,
            Protocol::Icmp | Protocol::Any => self.default,
        }
    }
}

struct Inner {
    map: AHashMap<Fingerprint, ConnRecord>,
    wheel: ExpiryWheel<Fingerprint>,
}

pub struct Conntrack {
    inner: Mutex<Inner>,
}

impl Default for Conntrack {
    fn default() -> Self {
        Self::new()
    }
}

impl Conntrack {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner { map: AHashMap::new(), wheel: ExpiryWheel::new() }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().map.len()
    }

    /// Looks up an established flow and refreshes it. `direction` is the
    /// direction of the *current* packet (used only for RTT arm/check);
    /// re-match against a stale `rules_version` uses the record's own
    /// sticky `incoming` flag to pick `in_table` or `out_table`, matching
    /// how the flow was originally authorized.
    #[allow(clippy::too_many_arguments)]
    pub fn lookup_and_refresh(
        &self,
        raw_packet: &[u8],
        fingerprint: Fingerprint,
        direction: Direction,
        cert: &dyn PeerCertificate,
        ca_pool: &dyn CaPool,
        mut local_cache: Option<&mut ConntrackCache>,
        rules_version: u16,
        in_table: &RuleTable,
        out_table: &RuleTable,
        timeouts: &Timeouts,
        rtt_histogram: &Histogram<f64>,
    ) -> bool {
        if let Some(cache) = local_cache.as_deref() {
            if cache.contains(&fingerprint) {
                return true;
            }
        }

        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap();

        let due = inner.wheel.advance(now);
        for due_fp in due {
            Self::evict_locked(&mut inner, due_fp, now);
        }

        let Some(record) = inner.map.get_mut(&fingerprint) else {
            return false;
        };

        if record.rules_version != rules_version {
            let record_direction =
                if record.incoming { Direction::Inbound } else { Direction::Outbound };
            let table = if record.incoming { in_table } else { out_table };
            if !table.matches(&fingerprint, record_direction, cert, ca_pool) {
                inner.map.remove(&fingerprint);
                debug!(?fingerprint, "conntrack entry invalidated by rule-version reload");
                return false;
            }
            record.rules_version = rules_version;
        }

        let timeout = timeouts.for_protocol(fingerprint.protocol);
        record.expires_at = now + timeout;

        if fingerprint.protocol == Protocol::Tcp {
            if direction.is_inbound() {
                rtt::check(record, raw_packet, now, rtt_histogram);
            } else {
                rtt::arm(record, raw_packet, now);
            }
        }

        drop(inner);
        if let Some(cache) = local_cache.as_mut() {
            cache.insert(fingerprint);
        }
        true
    }

    /// Installs a freshly-allowed packet's flow into the conntrack table.
    pub fn install(
        &self,
        raw_packet: &[u8],
        fingerprint: Fingerprint,
        direction: Direction,
        rules_version: u16,
        timeouts: &Timeouts,
    ) {
        let now = Instant::now();
        let timeout = timeouts.for_protocol(fingerprint.protocol);
        let mut record = ConnRecord::new(now + timeout, direction.is_inbound(), rules_version);

        if fingerprint.protocol == Protocol::Tcp && !direction.is_inbound() {
            rtt::arm(&mut record, raw_packet, now);
        }

        let mut inner = self.inner.lock().unwrap();
        if !inner.map.contains_key(&fingerprint) {
            let due = inner.wheel.advance(now);
            for due_fp in due {
                Self::evict_locked(&mut inner, due_fp, now);
            }
            inner.wheel.add(fingerprint, now, timeout);
        }
        inner.map.insert(fingerprint, record);
    }

    /// Evicts or re-arms an entry the wheel has reported due, called under
    /// the lock from the wheel drain.
    fn evict_locked(inner: &mut Inner, fingerprint: Fingerprint, now: Instant) {
        let Some(record) = inner.map.get(&fingerprint) else { return };
        let remaining = record.expires_at.saturating_duration_since(now);
        if remaining > Duration::ZERO {
            inner.wheel.add(fingerprint, now, remaining);
        } else {
            inner.map.remove(&fingerprint);
            debug!(?fingerprint, "conntrack entry expired");
        }
    }
}
