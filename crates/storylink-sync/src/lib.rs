//! Storylink: Synchronization bounded context.
//!
//! Responsible for the wire contract between participants, the rules for
//! publishing local changes and applying remote ones, the rendering and
//! playback ports, and the async runtime that keeps one participant
//! connected, heartbeating and sweeping presence.

pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

#[cfg(test)]
pub(crate) mod testing;
