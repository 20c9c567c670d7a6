//! Trait boundary toward the tunnel/certificate layer.
//!
//! Certificate parsing, CA trust-store management and session establishment
//! are external collaborators this crate never implements. This module only states
//! the accessors the firewall core needs from an already-verified peer
//! certificate, and the CA-resolution callable it is handed per packet.

use crate::lpm::Ipv4Lpm;
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// An opaque, already-verified peer certificate.
///
/// Implemented by the host application's certificate type; this crate never
/// constructs one.
pub trait PeerCertificate {
    /// The certificate's subject name (matched against `RuleLeaf::hosts`
    /// and, when resolved through a [`CaPool`], against `CAScope::by_name`).
    fn subject_name(&self) -> &str;

    /// Fingerprint of the CA that issued this certificate (matched against
    /// `CAScope::by_sha`).
    fn issuer_fingerprint(&self) -> &str;

    /// Group membership asserted by this certificate.
    fn groups(&self) -> &HashSet<String>;

    /// Subnets the peer is authorized to source/sink traffic from, if its
    /// certificate claims more than a single address.
    fn claimed_subnets(&self) -> Option<&Ipv4Lpm>;

    /// The peer's single VPN IP, when its certificate claims exactly one
    /// address rather than a subnet set.
    fn single_vpn_ip(&self) -> Option<Ipv4Addr>;
}

/// Resolves the CA that issued a peer certificate, given its issuer
/// fingerprint. Implemented by the host's trust-store; this crate only
/// needs the resolved CA's subject name.
pub trait CaPool {
    /// Returns the subject name of the CA that issued `cert`, if resolvable.
    fn resolve_ca_subject_name(&self, cert: &dyn PeerCertificate) -> Option<String>;
}
