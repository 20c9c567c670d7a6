#![forbid(unsafe_code)]

//! Packet-filtering core for a mesh VPN node.
//!
//! This crate compiles a flat rule list into a lookup structure that
//! resolves per-packet in near-constant time, tracks established flows in a
//! connection tracker with expiry and rule-version invalidation, and matches
//! certificate attributes (issuing CA, subject name, group membership)
//! alongside L3/L4 tuple attributes.
//!
//! Tunnel cryptography, certificate parsing, CA trust-store management,
//! config file parsing and the raw I/O path are all external collaborators;
//! see [`cert`] for the trait boundary this crate expects from them.

pub mod cert;
pub mod conntrack;
pub mod error;
pub mod firewall;
pub mod hash;
pub mod lpm;
pub mod metrics;
pub mod packet;
pub mod rtt;
pub mod rule;
pub mod rule_spec;

pub use cert::{CaPool, PeerCertificate};
pub use error::FirewallError;
pub use firewall::{Firewall, FirewallBuilder};
pub use packet::{Direction, Fingerprint, Protocol};
pub use rule::RuleTable;
pub use rule_spec::{normalize_rule, AddRuleArgs, RawRuleDict};
