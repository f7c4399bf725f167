//! Domain layer for the Session & Navigation context.

pub mod aggregates;
pub mod commands;
pub mod events;
pub mod identity;
pub mod presence;
