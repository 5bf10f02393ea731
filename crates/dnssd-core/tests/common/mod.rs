//! Test doubles and common utilities for contract tests
//!
//! This module provides a record source that records every call and a few
//! builders for realistic mDNS response packets.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use dnssd_core::error::Result;
use dnssd_core::traits::{
    OutboundQuery, PacketStream, RecordKind, RecordSource, ResourceRecord, ResponsePacket,
};
use dnssd_core::txt::{self, TxtRecord, TxtValue};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

pub const HTTP: &str = "_http._tcp.local";
pub const WILDCARD: &str = "_services._dns-sd._udp.local";
pub const TTL: u32 = 120;

/// A record source that records queries and lets tests push packets
pub struct RecordingSource {
    /// Sender for tests to push packets
    packets: broadcast::Sender<ResponsePacket>,
    /// Every query the engine sent
    queries: Arc<Mutex<Vec<OutboundQuery>>>,
    /// Call counter for subscribe()
    subscribe_call_count: Arc<AtomicUsize>,
}

impl RecordingSource {
    pub fn new() -> Self {
        let (packets, _) = broadcast::channel(64);
        Self {
            packets,
            queries: Arc::new(Mutex::new(Vec::new())),
            subscribe_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a source that shares counters and the packet channel with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            packets: other.packets.clone(),
            queries: Arc::clone(&other.queries),
            subscribe_call_count: Arc::clone(&other.subscribe_call_count),
        }
    }

    /// Push a packet to every live subscription
    pub fn push(&self, packet: ResponsePacket) -> usize {
        self.packets.send(packet).unwrap_or(0)
    }

    /// Names of all queries sent so far
    pub fn queried_names(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .map(|q| q.name.clone())
            .collect()
    }

    /// How many times `name` was queried
    pub fn query_count(&self, name: &str) -> usize {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|q| q.name.eq_ignore_ascii_case(name))
            .count()
    }

    /// Get the number of times subscribe() was called
    pub fn subscribe_call_count(&self) -> usize {
        self.subscribe_call_count.load(Ordering::SeqCst)
    }

    /// Number of subscriptions still alive
    pub fn live_subscriptions(&self) -> usize {
        self.packets.receiver_count()
    }
}

impl RecordSource for RecordingSource {
    fn query(&self, name: &str, kind: RecordKind) -> Result<()> {
        self.queries.lock().unwrap().push(OutboundQuery {
            name: name.to_string(),
            kind,
        });
        Ok(())
    }

    fn subscribe(&self) -> PacketStream {
        self.subscribe_call_count.fetch_add(1, Ordering::SeqCst);
        let stream = BroadcastStream::new(self.packets.subscribe()).filter_map(|p| p.ok());
        Box::pin(stream)
    }
}

/// Fixed point in time so TTL arithmetic is deterministic
pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

pub fn secs(n: i64) -> chrono::Duration {
    chrono::Duration::seconds(n)
}

/// TXT content from `key=value` pairs
pub fn txt_of(pairs: &[(&str, &str)]) -> TxtRecord {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), TxtValue::from(*v)))
        .collect()
}

/// Description of one advertised instance
#[derive(Clone)]
pub struct Announce {
    pub service_type: String,
    pub instance: String,
    pub host: String,
    pub port: u16,
    pub txt: TxtRecord,
    pub addresses: Vec<IpAddr>,
    pub ttl: u32,
}

impl Announce {
    pub fn http(instance: &str) -> Self {
        Self {
            service_type: HTTP.to_string(),
            instance: instance.to_string(),
            host: format!("{}.local", instance),
            port: 80,
            txt: txt_of(&[("path", "/")]),
            addresses: vec!["192.168.1.20".parse().unwrap()],
            ttl: TTL,
        }
    }

    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.instance, self.service_type)
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn txt(mut self, pairs: &[(&str, &str)]) -> Self {
        self.txt = txt_of(pairs);
        self
    }

    pub fn addresses(mut self, addresses: &[&str]) -> Self {
        self.addresses = addresses.iter().map(|a| a.parse().unwrap()).collect();
        self
    }

    pub fn ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// PTR answer plus SRV/TXT/address additionals, as a responder sends them
    pub fn records(&self) -> (Vec<ResourceRecord>, Vec<ResourceRecord>) {
        let fqdn = self.fqdn();
        let answers = vec![ResourceRecord::ptr(&self.service_type, &fqdn, 4500)];
        let mut additionals = vec![
            ResourceRecord::srv(&fqdn, &self.host, self.port, self.ttl),
            ResourceRecord::txt(&fqdn, txt::encode(&self.txt), 4500),
        ];
        for addr in &self.addresses {
            additionals.push(match addr {
                IpAddr::V4(v4) => ResourceRecord::a(&self.host, *v4, self.ttl),
                IpAddr::V6(v6) => ResourceRecord::aaaa(&self.host, *v6, self.ttl),
            });
        }
        (answers, additionals)
    }

    pub fn packet(&self) -> ResponsePacket {
        let (answers, additionals) = self.records();
        ResponsePacket::new(answers, additionals)
    }

    /// Goodbye PTR for this instance
    pub fn goodbye(&self) -> ResourceRecord {
        ResourceRecord::ptr(&self.service_type, self.fqdn(), 0)
    }
}

/// Merge several announcements into a single packet
pub fn packet_of(announces: &[Announce]) -> ResponsePacket {
    let mut packet = ResponsePacket::default();
    for announce in announces {
        let (answers, additionals) = announce.records();
        packet.answers.extend(answers);
        packet.additionals.extend(additionals);
    }
    packet
}

/// Meta-query answer announcing service types
pub fn type_announcement(types: &[&str]) -> ResponsePacket {
    ResponsePacket::new(
        types
            .iter()
            .map(|t| ResourceRecord::ptr(WILDCARD, *t, 4500))
            .collect(),
        Vec::new(),
    )
}

/// Drain every event currently queued
pub fn drain(rx: &mut tokio::sync::mpsc::Receiver<dnssd_core::BrowseEvent>) -> Vec<dnssd_core::BrowseEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Event names in order
pub fn names(events: &[dnssd_core::BrowseEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.name()).collect()
}
