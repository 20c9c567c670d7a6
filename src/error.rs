use thiserror::Error;

/// Errors surfaced by rule ingestion and per-packet filtering decisions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FirewallError {
    /// The packet's remote address is not authorized by the peer's certificate.
    #[error("remote ip not authorized by peer certificate")]
    InvalidRemoteIp,

    /// The packet's local address is not owned by this node.
    #[error("local ip not owned by this node")]
    InvalidLocalIp,

    /// The packet passed address validation but no rule authorizes it.
    #[error("no rule matches packet")]
    NoMatchingRule,

    /// `add_rule` was given a port range with `start > end`.
    #[error("invalid port range in {table} rule #{index}: start {start} > end {end}")]
    InvalidPortRange { table: &'static str, index: usize, start: i32, end: i32 },

    /// A rule carried no predicate at all and no explicit "any" wildcard.
    #[error("rule #{index} in {table} has no predicate (host, groups, cidr, local_cidr, ca_name or ca_sha)")]
    EmptyPredicate { table: &'static str, index: usize },

    /// The loader's raw dictionary set both `group` and `groups`.
    #[error("rule #{index} in {table} sets both `group` and `groups`")]
    ConflictingGroupFields { table: &'static str, index: usize },

    /// The loader's raw dictionary set both `port` and `code`, or neither.
    #[error("rule #{index} in {table} must set exactly one of `port` or `code`")]
    ConflictingPortFields { table: &'static str, index: usize },

    /// `proto` was not one of tcp/udp/icmp/any.
    #[error("rule #{index} in {table} has unknown proto `{proto}`")]
    UnknownProtocol { table: &'static str, index: usize, proto: String },

    /// Port syntax (`"N"`, `"N-M"`, `"any"`, `"fragment"`) failed to parse.
    #[error("rule #{index} in {table} has unparseable port `{raw}`")]
    InvalidPortSyntax { table: &'static str, index: usize, raw: String },
}

pub type Result<T> = std::result::Result<T, FirewallError>;
