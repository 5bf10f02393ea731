//! Core traits for the discovery system
//!
//! This module defines the boundary between the engine and the transport.
//!
//! - [`RecordSource`]: Deliver response packets and accept outbound queries

pub mod record_source;

pub use record_source::{
    OutboundQuery, PacketStream, RecordData, RecordKind, RecordSource, Referrer,
    ResourceRecord, ResponsePacket, SrvData,
};
