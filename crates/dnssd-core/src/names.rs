//! Service-type name codec
//!
//! Converts between structured service types and their dotted DNS-SD
//! form (`_http._tcp`, `_printer._sub._http._tcp`) and derives the names
//! the engine queries and matches on.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Top-level domain for multicast DNS
pub const TLD: &str = "local";

/// Meta-query name enumerating every advertised service type (RFC 6763 §9)
pub const WILDCARD_NAME: &str = "_services._dns-sd._udp.local";

/// Label separating a subtype from its parent service type
const SUBTYPE_LABEL: &str = "_sub";

/// DNS name equality: ASCII case-insensitive, ignoring a trailing root dot
pub fn dns_eq(a: &str, b: &str) -> bool {
    a.trim_end_matches('.')
        .eq_ignore_ascii_case(b.trim_end_matches('.'))
}

fn prefix(label: &str) -> String {
    format!("_{}", label.trim_start_matches('_'))
}

fn unprefix(label: &str) -> &str {
    label.strip_prefix('_').unwrap_or(label)
}

fn strip_tld(name: &str) -> &str {
    let suffix = format!(".{}", TLD);
    match name.len().checked_sub(suffix.len()) {
        Some(cut)
            if name
                .get(cut..)
                .is_some_and(|tail| tail.eq_ignore_ascii_case(&suffix)) =>
        {
            &name[..cut]
        }
        _ => name,
    }
}

/// A structured service type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceType {
    /// Service name without underscore, e.g. `http`
    pub name: String,
    /// Transport protocol, e.g. `tcp`
    pub protocol: Option<String>,
    pub subtype: Option<String>,
}

impl ServiceType {
    /// Create a service type with a protocol and no subtype
    pub fn new(name: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            name: unprefix(&name.into()).to_string(),
            protocol: Some(unprefix(&protocol.into()).to_string()),
            subtype: None,
        }
    }

    /// Restrict to a subtype
    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(unprefix(&subtype.into()).to_string());
        self
    }

    /// Fully-qualified form under `.local`
    pub fn to_fqdn(&self) -> String {
        format!("{}.{}", self, TLD)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(subtype) = &self.subtype {
            write!(f, "{}.{}.", prefix(subtype), SUBTYPE_LABEL)?;
        }
        f.write_str(&prefix(&self.name))?;
        if let Some(protocol) = &self.protocol {
            write!(f, ".{}", prefix(protocol))?;
        }
        Ok(())
    }
}

impl FromStr for ServiceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let labels: Vec<&str> = strip_tld(s.trim_end_matches('.')).split('.').collect();
        let (subtype, rest) = match labels.iter().position(|l| l.eq_ignore_ascii_case(SUBTYPE_LABEL)) {
            Some(1) => (Some(unprefix(labels[0]).to_string()), &labels[2..]),
            Some(_) => return Err(Error::invalid_name(format!("misplaced subtype label in '{}'", s))),
            None => (None, &labels[..]),
        };

        match rest {
            [name] if !unprefix(name).is_empty() => Ok(Self {
                name: unprefix(name).to_string(),
                protocol: None,
                subtype,
            }),
            [name, protocol] if !unprefix(name).is_empty() => Ok(Self {
                name: unprefix(name).to_string(),
                protocol: Some(unprefix(protocol).to_string()),
                subtype,
            }),
            _ => Err(Error::invalid_name(format!("not a service type: '{}'", s))),
        }
    }
}

/// Name to PTR-query for a service type
///
/// `<instance>.` is prepended when browsing for a single named instance.
pub fn query_name(service_type: &str, protocol: &str, instance: Option<&str>) -> String {
    let base = ServiceType::new(service_type, protocol).to_fqdn();
    match instance {
        Some(instance) => format!("{}.{}", instance, base),
        None => base,
    }
}

/// Subtype advertised by a `<sub>._sub.<type>` PTR owner name
pub fn subtype_of(ptr_name: &str) -> Option<String> {
    let labels: Vec<&str> = ptr_name.split('.').collect();
    let index = labels
        .iter()
        .position(|l| l.eq_ignore_ascii_case(SUBTYPE_LABEL))?;
    let label = labels.get(index.checked_sub(1)?)?;
    Some(unprefix(label).to_string())
}

/// Whether a PTR owner name carries the subtype marker
pub fn is_subtype_name(ptr_name: &str) -> bool {
    ptr_name
        .to_ascii_lowercase()
        .contains(&format!(".{}.", SUBTYPE_LABEL))
}

/// Parts of a service instance name (`<instance>.<type>.<protocol>.local`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceName {
    pub instance: String,
    pub service_type: String,
    pub protocol: Option<String>,
}

/// Split an SRV owner name into instance, type and protocol
///
/// The first label is the instance; the labels between it and the final
/// domain label name the service type. Missing parts decode as empty.
pub fn split_instance(fqdn: &str) -> InstanceName {
    let labels: Vec<&str> = fqdn.trim_end_matches('.').split('.').collect();
    let instance = labels.first().copied().unwrap_or_default().to_string();
    let type_labels = if labels.len() > 2 {
        &labels[1..labels.len() - 1]
    } else {
        &[][..]
    };

    InstanceName {
        instance,
        service_type: type_labels
            .first()
            .map(|l| unprefix(l).to_string())
            .unwrap_or_default(),
        protocol: type_labels.get(1).map(|l| unprefix(l).to_string()),
    }
}
