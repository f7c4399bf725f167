//! Storylink: Narrative Model bounded context.
//!
//! Responsible for the authored story (scenes of dialogue lines), its
//! validation and editing, the mapping between scene/line pairs and flat
//! positions, player-name personalization, and story import/export.

pub mod application;
pub mod domain;
