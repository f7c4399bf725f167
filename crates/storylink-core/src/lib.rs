//! Storylink Core: shared domain abstractions.
//!
//! This crate defines the traits and types every bounded context depends on:
//! time, randomness, commands, recorded events, errors and the publish/subscribe
//! port that the synchronization layer talks through. It contains no
//! infrastructure code.

pub mod aggregate;
pub mod channel;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod rng;
