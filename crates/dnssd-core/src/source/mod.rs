// # Record Source Implementations
//
// This module provides implementations of the RecordSource trait that do
// not need a network.

pub mod channel;

pub use channel::ChannelRecordSource;
