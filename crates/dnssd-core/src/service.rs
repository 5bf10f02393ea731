//! Service records produced by the engine

use crate::names::dns_eq;
use crate::traits::Referrer;
use crate::txt::TxtRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::net::IpAddr;

/// A discovered service instance
///
/// Built from one packet's PTR, SRV, TXT and A/AAAA records. The
/// fully-qualified name is unique within a browser's known set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceRecord {
    /// SRV owner name, e.g. `myprinter._http._tcp.local`
    pub fqdn: String,
    /// Instance label, e.g. `myprinter`
    pub name: String,
    /// Service type without underscore, e.g. `http`
    pub service_type: String,
    pub protocol: Option<String>,
    /// Subtypes in the order their PTR records appeared (may repeat)
    pub subtypes: Vec<String>,
    /// SRV target host
    pub host: String,
    pub port: u16,
    /// A/AAAA records for `host` found in the same packet
    pub addresses: Vec<IpAddr>,
    /// Decoded TXT content
    pub txt: TxtRecord,
    /// TXT character-strings as received
    pub raw_txt: Vec<Vec<u8>>,
    /// SRV time-to-live in seconds
    pub ttl: u32,
    /// When a packet last confirmed this service
    pub last_seen: DateTime<Utc>,
    /// Origin of the confirming packet
    pub referrer: Option<Referrer>,
}

impl ServiceRecord {
    /// Whether connection info (SRV-derived fields or address set) differs
    pub fn srv_differs(&self, other: &ServiceRecord) -> bool {
        let ours: BTreeSet<&IpAddr> = self.addresses.iter().collect();
        let theirs: BTreeSet<&IpAddr> = other.addresses.iter().collect();

        !dns_eq(&self.host, &other.host)
            || self.port != other.port
            || self.service_type != other.service_type
            || self.protocol != other.protocol
            || self.name != other.name
            || ours != theirs
    }

    /// Whether decoded TXT content differs, ignoring key order
    pub fn txt_differs(&self, other: &ServiceRecord) -> bool {
        self.txt != other.txt
    }

    /// Instant after which the service is stale, if it has a TTL
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        (self.ttl > 0).then(|| self.last_seen + chrono::Duration::seconds(i64::from(self.ttl)))
    }

    /// Whether the TTL has lapsed at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|deadline| deadline < now)
    }
}
