//! Correlation of one packet's records into candidate services
//!
//! A packet is partitioned once into per-kind indices; candidates are then
//! built lazily per tracked name, in the order their PTR records appear.

use crate::names::{self, dns_eq};
use crate::service::ServiceRecord;
use crate::traits::{RecordData, Referrer, ResourceRecord, ResponsePacket, SrvData};
use crate::txt;
use chrono::{DateTime, Utc};
use std::net::IpAddr;

/// Per-packet facts stamped onto every candidate
#[derive(Debug, Clone, Copy)]
pub(crate) struct MatchContext {
    pub seen_at: DateTime<Utc>,
    pub txt_binary: bool,
    pub referrer: Option<Referrer>,
}

/// Positive (ttl > 0) records of one packet, split by kind
#[derive(Debug, Default)]
pub(crate) struct PacketIndex<'a> {
    /// (owner, target)
    ptr: Vec<(&'a str, &'a str)>,
    /// (owner, ttl, payload)
    srv: Vec<(&'a str, u32, &'a SrvData)>,
    txt: Vec<(&'a str, &'a [Vec<u8>])>,
    addresses: Vec<(&'a str, IpAddr)>,
}

impl<'a> PacketIndex<'a> {
    pub fn new(packet: &'a ResponsePacket) -> Self {
        let mut index = Self::default();

        // goodbyes are handled separately
        for rr in packet.records().filter(|rr| rr.ttl > 0) {
            let name = rr.name.as_str();
            match &rr.data {
                RecordData::Ptr(target) => index.ptr.push((name, target.as_str())),
                RecordData::Srv(srv) => index.srv.push((name, rr.ttl, srv)),
                RecordData::Txt(strings) => index.txt.push((name, strings.as_slice())),
                RecordData::A(addr) => index.addresses.push((name, IpAddr::V4(*addr))),
                RecordData::Aaaa(addr) => index.addresses.push((name, IpAddr::V6(*addr))),
                RecordData::Other { .. } => {}
            }
        }

        index
    }

    /// Complete candidates for `tracked`, in PTR order
    ///
    /// Instances without an SRV record are skipped.
    pub fn candidates<'s>(
        &'s self,
        tracked: &'s str,
        ctx: MatchContext,
    ) -> impl Iterator<Item = ServiceRecord> + 's {
        self.ptr
            .iter()
            .filter(move |(owner, _)| dns_eq(owner, tracked))
            .filter_map(move |(_, instance)| self.build(instance, ctx))
    }

    /// Whether the packet carries a positive TXT record for `instance`
    pub fn has_txt(&self, instance: &str) -> bool {
        self.txt.iter().any(|(owner, _)| dns_eq(owner, instance))
    }

    fn build(&self, instance: &str, ctx: MatchContext) -> Option<ServiceRecord> {
        let (fqdn, ttl, srv) = self
            .srv
            .iter()
            .filter(|(owner, _, _)| dns_eq(owner, instance))
            .last()?;

        let subtypes = self
            .ptr
            .iter()
            .filter(|(owner, target)| dns_eq(target, instance) && names::is_subtype_name(owner))
            .filter_map(|(owner, _)| names::subtype_of(owner))
            .collect();

        let raw_txt = self
            .txt
            .iter()
            .filter(|(owner, _)| dns_eq(owner, instance))
            .last()
            .map(|(_, strings)| strings.to_vec())
            .unwrap_or_default();

        let addresses = self
            .addresses
            .iter()
            .filter(|(owner, _)| dns_eq(owner, &srv.target))
            .map(|(_, addr)| *addr)
            .collect();

        let parts = names::split_instance(fqdn);

        Some(ServiceRecord {
            fqdn: fqdn.to_string(),
            name: parts.instance,
            service_type: parts.service_type,
            protocol: parts.protocol,
            subtypes,
            host: srv.target.clone(),
            port: srv.port,
            addresses,
            txt: txt::decode(&raw_txt, ctx.txt_binary),
            raw_txt,
            ttl: *ttl,
            last_seen: ctx.seen_at,
            referrer: ctx.referrer,
        })
    }
}

/// Targets of goodbye PTRs (ttl 0) owned by `tracked`, from both sections
pub(crate) fn goodbyes<'a>(
    packet: &'a ResponsePacket,
    tracked: &'a str,
) -> impl Iterator<Item = &'a str> + 'a {
    packet
        .records()
        .filter(move |rr| rr.is_goodbye() && dns_eq(&rr.name, tracked))
        .filter_map(|rr| match &rr.data {
            RecordData::Ptr(target) => Some(target.as_str()),
            _ => None,
        })
}

/// Service types announced in answer to the wildcard meta-query
pub(crate) fn announced_types(packet: &ResponsePacket) -> impl Iterator<Item = &str> {
    packet
        .answers
        .iter()
        .filter(|rr| dns_eq(&rr.name, names::WILDCARD_NAME))
        .filter_map(|rr: &ResourceRecord| match &rr.data {
            RecordData::Ptr(target) => Some(target.as_str()),
            _ => None,
        })
}
