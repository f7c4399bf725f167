//! Application layer for the Session & Navigation context.

pub mod command_handlers;
pub mod query_handlers;
