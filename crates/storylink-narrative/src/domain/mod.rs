//! Domain layer for the Narrative Model context.

pub mod edit;
pub mod personalize;
pub mod position;
pub mod story;
pub mod validation;
