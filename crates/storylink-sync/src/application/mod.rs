//! Application layer for the Synchronization context.

pub mod participant;
pub mod runtime;
