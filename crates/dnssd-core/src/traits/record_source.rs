// # Record Source Trait
//
// Defines the interface to the mDNS transport: the component that owns the
// multicast socket, encodes queries and decodes response packets.
//
// ## Implementations
//
// - In-process channels: `ChannelRecordSource` (`crate::source`)
// - Future: UDP multicast socket with a DNS wire codec
//
// ## Usage
//
// ```rust,ignore
// use dnssd_core::{RecordKind, RecordSource};
// use tokio_stream::StreamExt;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* RecordSource implementation */;
//
//     let mut packets = source.subscribe();
//     source.query("_http._tcp.local", RecordKind::Ptr)?;
//
//     while let Some(packet) = packets.next().await {
//         println!("{} answers", packet.answers.len());
//     }
//
//     Ok(())
// }
// ```

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::pin::Pin;
use tokio_stream::Stream;

/// DNS record kinds the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Ptr,
    Srv,
    Txt,
    A,
    Aaaa,
}

impl RecordKind {
    /// The DNS mnemonic for this kind (e.g. "PTR")
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Ptr => "PTR",
            RecordKind::Srv => "SRV",
            RecordKind::Txt => "TXT",
            RecordKind::A => "A",
            RecordKind::Aaaa => "AAAA",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SRV record payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvData {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    /// Target host name
    pub target: String,
}

/// Record payload, one variant per kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    /// Domain name the PTR points at
    Ptr(String),
    Srv(SrvData),
    /// Raw character-strings, still TXT-encoded
    Txt(Vec<Vec<u8>>),
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    /// Any kind the engine does not interpret
    Other {
        rtype: u16,
        data: Vec<u8>,
    },
}

/// A single resource record from a response packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    /// Owner name
    pub name: String,
    /// Time-to-live in seconds; 0 on a PTR is a goodbye
    pub ttl: u32,
    pub data: RecordData,
}

impl ResourceRecord {
    /// Create a record with an arbitrary payload
    pub fn new(name: impl Into<String>, ttl: u32, data: RecordData) -> Self {
        Self {
            name: name.into(),
            ttl,
            data,
        }
    }

    /// PTR record `name -> target`
    pub fn ptr(name: impl Into<String>, target: impl Into<String>, ttl: u32) -> Self {
        Self::new(name, ttl, RecordData::Ptr(target.into()))
    }

    /// SRV record with zero priority and weight
    pub fn srv(name: impl Into<String>, target: impl Into<String>, port: u16, ttl: u32) -> Self {
        Self::new(
            name,
            ttl,
            RecordData::Srv(SrvData {
                priority: 0,
                weight: 0,
                port,
                target: target.into(),
            }),
        )
    }

    /// TXT record from pre-encoded character-strings
    pub fn txt(name: impl Into<String>, strings: Vec<Vec<u8>>, ttl: u32) -> Self {
        Self::new(name, ttl, RecordData::Txt(strings))
    }

    pub fn a(name: impl Into<String>, addr: Ipv4Addr, ttl: u32) -> Self {
        Self::new(name, ttl, RecordData::A(addr))
    }

    pub fn aaaa(name: impl Into<String>, addr: Ipv6Addr, ttl: u32) -> Self {
        Self::new(name, ttl, RecordData::Aaaa(addr))
    }

    /// The kind of this record, or `None` for uninterpreted kinds
    pub fn kind(&self) -> Option<RecordKind> {
        match self.data {
            RecordData::Ptr(_) => Some(RecordKind::Ptr),
            RecordData::Srv(_) => Some(RecordKind::Srv),
            RecordData::Txt(_) => Some(RecordKind::Txt),
            RecordData::A(_) => Some(RecordKind::A),
            RecordData::Aaaa(_) => Some(RecordKind::Aaaa),
            RecordData::Other { .. } => None,
        }
    }

    /// Whether this record is a goodbye announcement
    pub fn is_goodbye(&self) -> bool {
        self.ttl == 0 && matches!(self.data, RecordData::Ptr(_))
    }
}

/// Transport-level origin of a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Referrer {
    /// Sender address
    pub address: SocketAddr,
    /// Datagram size in bytes
    pub size: usize,
}

/// One inbound mDNS response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponsePacket {
    pub answers: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
    pub referrer: Option<Referrer>,
}

impl ResponsePacket {
    /// Create a packet from its answer and additional sections
    pub fn new(answers: Vec<ResourceRecord>, additionals: Vec<ResourceRecord>) -> Self {
        Self {
            answers,
            additionals,
            referrer: None,
        }
    }

    /// Attach the sender information
    pub fn with_referrer(mut self, referrer: Referrer) -> Self {
        self.referrer = Some(referrer);
        self
    }

    /// All records, answers first
    pub fn records(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.answers.iter().chain(self.additionals.iter())
    }
}

/// A query the engine asked the transport to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundQuery {
    pub name: String,
    pub kind: RecordKind,
}

/// Stream of inbound packets returned by [`RecordSource::subscribe`]
pub type PacketStream = Pin<Box<dyn Stream<Item = ResponsePacket> + Send + 'static>>;

/// Trait for record source implementations
///
/// A record source owns everything below the engine: sockets, retransmission
/// and the DNS wire format. The engine only sees decoded packets and only
/// asks for PTR queries to be sent.
///
/// # Allowed Capabilities
/// - ✅ Perform socket I/O and multicast group management
/// - ✅ Drop malformed packets silently
/// - ✅ Forward record kinds the engine does not know as [`RecordData::Other`]
///
/// # Forbidden Capabilities
/// - ❌ Correlate records into services (owned by `Browser`)
/// - ❌ Schedule re-queries or expiry (owned by the engine's owner)
/// - ❌ Block inside `query()`
pub trait RecordSource: Send + Sync {
    /// Submit a query for `name` and `kind`
    ///
    /// Fire-and-forget: the call returns once the query is queued. An error
    /// means the query could not be queued at all; the engine logs it and
    /// carries on.
    fn query(&self, name: &str, kind: RecordKind) -> Result<(), crate::Error>;

    /// Subscribe to inbound response packets
    ///
    /// Each call returns an independent stream. Dropping the stream is the
    /// unsubscription.
    fn subscribe(&self) -> PacketStream;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str {
        "record-source"
    }
}
