//! A fixed-slot expiry wheel: `advance(now)`, `add(key, duration)`, draining
//! due keys one tick at a time. Each slot holds the keys due in one second
//! of wall-clock time, and keys with a timeout past the wheel's one-hour
//! horizon go on an overflow list instead of round-robining through every
//! slot.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const WHEEL_SLOTS: usize = 3600;
const SLOT_GRANULARITY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ExpiryWheel<K> {
    slots: Vec<VecDeque<K>>,
    overflow: Vec<(Instant, K)>,
    cursor: usize,
    last_advance: Option<Instant>,
}

impl<K: Clone> Default for ExpiryWheel<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone> ExpiryWheel<K> {
    pub fn new() -> Self {
        Self {
            slots: (0..WHEEL_SLOTS).map(|_| VecDeque::new()).collect(),
            overflow: Vec::new(),
            cursor: 0,
            last_advance: None,
        }
    }

    /// Schedule `key` to fire no sooner than `now + timeout`.
    pub fn add(&mut self, key: K, now: Instant, timeout: Duration) {
        let ticks = (timeout.as_secs_f64() / SLOT_GRANULARITY.as_secs_f64()).ceil() as usize;
        if ticks >= WHEEL_SLOTS {
            self.overflow.push((now + timeout, key));
            return;
        }
        let slot = (self.cursor + ticks.max(1)) % WHEEL_SLOTS;
        self.slots[slot].push_back(key);
    }

    /// Advance the wheel to `now`, draining at most one due tick's worth of
    /// keys (the contract the rest of Conntrack relies on to bound the work
    /// done per call). Returns the keys that became due.
    pub fn advance(&mut self, now: Instant) -> Vec<K> {
        let first_call = self.last_advance.is_none();
        self.last_advance = Some(now);
        if first_call {
            return Vec::new();
        }

        let mut due = Vec::new();
        let slot = std::mem::take(&mut self.slots[self.cursor]);
        due.extend(slot);
        self.cursor = (self.cursor + 1) % WHEEL_SLOTS;

        self.overflow.retain(|(at, key)| {
            if *at <= now {
                due.push(key.clone());
                false
            } else {
                true
            }
        });

        due
    }
}
