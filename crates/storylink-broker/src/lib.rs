//! In-process pub/sub broker for the Storylink sync engine.
//!
//! Implements the `SyncChannel` port with MQTT-style retained messages and
//! topic filters, so participants in one process (or bridged to it over the
//! WebSocket relay) can synchronize without an external broker.

pub mod memory_broker;
pub mod topic_filter;

pub use memory_broker::InMemoryBroker;
