// # dnssd-core
//
// Core library for event-driven multicast DNS service discovery.
//
// ## Architecture Overview
//
// This library turns loosely related mDNS resource records into coherent
// service descriptions and reports their lifecycle:
// - **RecordSource**: Trait for the transport that delivers response packets
//   and accepts outbound PTR queries
// - **Browser**: Core engine that correlates PTR/SRV/TXT/A/AAAA records,
//   maintains the set of known services and classifies updates
// - **TxtQuery**: Attribute filter applied to a service's decoded TXT record
// - **ChannelRecordSource**: In-process record source backed by tokio channels
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Wire format and sockets live behind `RecordSource`
// 2. **Event-Driven**: The engine only works when a packet arrives or the owner calls it
// 3. **Single Owner**: All mutation of the known-service set happens on one task
// 4. **Best Effort**: Partial or filtered records degrade to "not reported", never to errors

pub mod traits;
pub mod engine;
pub mod config;
pub mod error;
pub mod filter;
pub mod names;
pub mod service;
pub mod source;
pub mod txt;

// Re-export core types for convenience
pub use traits::{RecordSource, ResourceRecord, RecordData, RecordKind, ResponsePacket};
pub use engine::{Browser, BrowseEvent};
pub use config::{BrowserConfig, EngineConfig};
pub use error::{Error, Result};
pub use filter::{TxtMatch, TxtQuery};
pub use service::ServiceRecord;
pub use source::ChannelRecordSource;
pub use txt::{TxtRecord, TxtValue};
