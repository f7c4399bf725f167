//! Application layer for the Narrative Model context.

pub mod content;
