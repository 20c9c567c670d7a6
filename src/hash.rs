//! Canonical rule-text accumulation and its two digests.
//!
//! The accumulator's line format is part of the external contract (observers
//! compare hashes across nodes to detect drift), so it is reproduced here
//! exactly as specified: one line per `add_rule` call, in call order.

use sha2::{Digest, Sha256};

/// Accumulates the canonical text form of every rule added so far and
/// exposes its two digests. Append-only; there is no way to remove a line,
/// matching a ruleset that is only ever replaced wholesale on reload.
#[derive(Debug, Default, Clone)]
pub struct RuleTextAccumulator {
    text: String,
}

impl RuleTextAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push(
        &mut self,
        incoming: bool,
        proto: &str,
        start_port: i32,
        end_port: i32,
        groups: &[String],
        host: &str,
        cidr: &str,
        local_cidr: &str,
        ca_name: &str,
        ca_sha: &str,
    ) {
        use std::fmt::Write;
        let _ = write!(
            self.text,
            "incoming: {incoming}, proto: {proto}, startPort: {start_port}, endPort: {end_port}, \
             groups: {groups}, host: {host}, ip: {cidr}, localIp: {local_cidr}, caName: {ca_name}, \
             caSha: {ca_sha}\n",
            groups = groups.join(","),
        );
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn sha256_hex(&self) -> String {
        let digest = Sha256::digest(self.text.as_bytes());
        hex_encode(&digest)
    }

    pub fn fnv32(&self) -> u32 {
        fnv1a_32(self.text.as_bytes())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(out, "{b:02x}");
    }
    out
}

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a, 32-bit variant. No pack dependency speaks `fnv`, and the
/// algorithm is fully pinned by the wire-format contract, so it is inlined
/// rather than pulled in as a crate.
fn fnv1a_32(data: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in data {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
