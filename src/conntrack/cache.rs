use crate::packet::Fingerprint;
use std::collections::HashSet;

/// Per-call cache of fingerprints already known allowed, avoiding a lock
/// acquisition for repeated packets of the same flow within one batch.
/// Strictly call-local: the caller owns it and may reuse one across a
/// batch of packets from the same tunnel, but must not share it across
/// threads.
#[derive(Debug, Default)]
pub struct ConntrackCache {
    seen: HashSet<Fingerprint>,
}

impl ConntrackCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.seen.contains(fingerprint)
    }

    pub fn insert(&mut self, fingerprint: Fingerprint) {
        self.seen.insert(fingerprint);
    }
}
