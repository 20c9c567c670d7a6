//! Rule ingestion surface.
//!
//! `add_rule` (see [`crate::firewall::Firewall::add_rule`]) takes the typed
//! [`AddRuleArgs`]. Recognized configuration sources — TOML, YAML, whatever
//! an operator's loader speaks — are that loader's own responsibility; this
//! module only implements the normalization contract the loader is expected
//! to apply before calling `add_rule`, so the contract lives in one place
//! and every loader implementation agrees on it.

use crate::error::{FirewallError, Result};
use crate::packet::{Protocol, ANY_PORT, FRAGMENT_PORT};
use ipnet::Ipv4Net;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

/// A single rule dictionary as a loader would hand it to the normalizer,
/// after parsing whatever file format it speaks (TOML, YAML, ...) into this
/// shape. `group` is deliberately kept separate from `groups` so the
/// exclusivity rule in the load contract can be enforced explicitly, rather
/// than silently picking one if a format allows both.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRuleDict {
    pub port: Option<String>,
    pub code: Option<String>,
    pub proto: Option<String>,
    pub host: Option<String>,
    pub group: Option<String>,
    #[serde(default, deserialize_with = "deserialize_groups")]
    pub groups: Option<Vec<String>>,
    pub cidr: Option<String>,
    pub local_cidr: Option<String>,
    pub ca_name: Option<String>,
    pub ca_sha: Option<String>,
}

/// Accepts `groups` as either a bare scalar string or a sequence, promoting
/// a scalar to a length-1 sequence so config sources that don't distinguish
/// the two still load correctly.
fn deserialize_groups<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(Some(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    }))
}

/// The typed description `add_rule` consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct AddRuleArgs {
    pub incoming: bool,
    pub proto: Protocol,
    pub start_port: i32,
    pub end_port: i32,
    pub groups: Vec<String>,
    pub host: String,
    pub cidr: Option<Ipv4Net>,
    pub local_cidr: Option<Ipv4Net>,
    pub ca_name: String,
    pub ca_sha: String,
}

/// Normalize one raw rule dictionary into [`AddRuleArgs`], applying the load
/// contract verbatim: exactly one of `port`/`code`, `group`/`groups`
/// exclusivity (a scalar `groups` value is accepted as a length-1
/// sequence), the port syntax (`"any"`, `"fragment"`, `"N-M"`, `"N"`), and
/// the at-least-one-predicate requirement.
///
/// `table` and `index` identify the rule for error reporting only, so a
/// rejected rule can be traced back to its position in the loader's call
/// sequence.
pub fn normalize_rule(
    table: &'static str,
    index: usize,
    incoming: bool,
    dict: &RawRuleDict,
) -> Result<AddRuleArgs> {
    let port_raw = match (&dict.port, &dict.code) {
        (Some(p), None) => p,
        (None, Some(c)) => c,
        _ => return Err(FirewallError::ConflictingPortFields { table, index }),
    };
    let (start_port, end_port) = parse_port_spec(table, index, port_raw)?;

    let groups = match (&dict.group, &dict.groups) {
        (Some(_), Some(_)) => return Err(FirewallError::ConflictingGroupFields { table, index }),
        (Some(g), None) => vec![g.clone()],
        (None, Some(gs)) => gs.clone(),
        (None, None) => Vec::new(),
    };

    let host = dict.host.clone().unwrap_or_default();
    let ca_name = dict.ca_name.clone().unwrap_or_default();
    let ca_sha = dict.ca_sha.clone().unwrap_or_default();

    let cidr = dict
        .cidr
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| Ipv4Net::from_str(s))
        .transpose()
        .map_err(|_| FirewallError::InvalidPortSyntax {
            table,
            index,
            raw: dict.cidr.clone().unwrap_or_default(),
        })?;
    let local_cidr = dict
        .local_cidr
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| Ipv4Net::from_str(s))
        .transpose()
        .map_err(|_| FirewallError::InvalidPortSyntax {
            table,
            index,
            raw: dict.local_cidr.clone().unwrap_or_default(),
        })?;

    if host.is_empty()
        && groups.is_empty()
        && cidr.is_none()
        && local_cidr.is_none()
        && ca_name.is_empty()
        && ca_sha.is_empty()
    {
        return Err(FirewallError::EmptyPredicate { table, index });
    }

    let proto = match dict.proto.as_deref() {
        Some(p) => Protocol::parse(p)
            .ok_or_else(|| FirewallError::UnknownProtocol { table, index, proto: p.to_string() })?,
        // Absent proto defaults to matching any transport, the least
        // surprising choice for a rule that otherwise only scopes on host
        // or CA identity.
        None => Protocol::Any,
    };

    Ok(AddRuleArgs {
        incoming,
        proto,
        start_port,
        end_port,
        groups,
        host,
        cidr,
        local_cidr,
        ca_name,
        ca_sha,
    })
}

fn parse_port_spec(table: &'static str, index: usize, raw: &str) -> Result<(i32, i32)> {
    let s = raw.trim();
    if s.eq_ignore_ascii_case("any") {
        return Ok((ANY_PORT, ANY_PORT));
    }
    if s.eq_ignore_ascii_case("fragment") {
        return Ok((FRAGMENT_PORT, FRAGMENT_PORT));
    }
    let bad = || FirewallError::InvalidPortSyntax { table, index, raw: raw.to_string() };
    if let Some((a, b)) = s.split_once('-') {
        let start: i32 = a.trim().parse().map_err(|_| bad())?;
        let end: i32 = b.trim().parse().map_err(|_| bad())?;
        if start == ANY_PORT {
            return Ok((start, ANY_PORT));
        }
        return Ok((start, end));
    }
    let port: i32 = s.parse().map_err(|_| bad())?;
    Ok((port, port))
}
