//! Opportunistic TCP round-trip-time sampling from raw packet bytes.
//!
//! Operates directly on Ethernet-stripped IPv4 + TCP header bytes. Assumes
//! well-formed IPv4+TCP framing; malformed packets are the caller's
//! responsibility (see crate-level error handling notes) and are simply
//! treated as a no-op here rather than rejected.

use crate::conntrack::record::ConnRecord;
use opentelemetry::metrics::Histogram;
use std::time::Instant;

const FIN: u8 = 0x01;
const ACK: u8 = 0x10;

fn ihl(packet: &[u8]) -> Option<usize> {
    let byte0 = *packet.first()?;
    Some(((byte0 & 0x0f) as usize) << 2)
}

fn tcp_flags(packet: &[u8], ihl: usize) -> Option<u8> {
    packet.get(ihl + 13).copied()
}

fn be_u32_at(packet: &[u8], offset: usize) -> Option<u32> {
    let bytes: [u8; 4] = packet.get(offset..offset + 4)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

/// Arm RTT sampling on an outbound packet: record the sequence number and
/// departure time, unless already armed or the packet carries FIN.
pub fn arm(conn: &mut ConnRecord, packet: &[u8], now: Instant) {
    if conn.is_armed() {
        return;
    }
    let Some(ihl) = ihl(packet) else { return };
    let Some(flags) = tcp_flags(packet, ihl) else { return };
    if flags & FIN != 0 {
        return;
    }
    let Some(seq) = be_u32_at(packet, ihl + 4) else { return };
    if seq == 0 {
        // Vanishingly unlikely in practice, but 0 is the sentinel for
        // "unarmed" — arming on it would make the next check() a no-op.
        return;
    }
    conn.expected_ack_seq = seq;
    conn.sent_at = Some(now);
}

/// Check an inbound packet against an armed sample: if its ACK covers the
/// armed sequence number, record the elapsed time and disarm.
pub fn check(conn: &mut ConnRecord, packet: &[u8], now: Instant, histogram: &Histogram<f64>) {
    if !conn.is_armed() {
        return;
    }
    let Some(ihl) = ihl(packet) else { return };
    let Some(flags) = tcp_flags(packet, ihl) else { return };
    if flags & ACK == 0 {
        return;
    }
    let Some(ack) = be_u32_at(packet, ihl + 8) else { return };

    let diff = (conn.expected_ack_seq.wrapping_sub(ack)) as i32;
    if diff >= 0 {
        // The ack does not yet cover the armed sequence.
        return;
    }

    if let Some(sent_at) = conn.sent_at {
        histogram.record(now.saturating_duration_since(sent_at).as_secs_f64(), &[]);
    }
    conn.expected_ack_seq = 0;
    conn.sent_at = None;
}
