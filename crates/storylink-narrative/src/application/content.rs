//! Story import, export and content hashing.
//!
//! Every import passes validation before it is handed back, so callers can
//! replace in-memory state with the result directly.

use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::domain::story::Story;
use crate::domain::validation::{self, ValidationError};

/// Parses and validates a JSON story document (`{ "scenes": [...] }`).
///
/// # Errors
///
/// Returns `ValidationError::Unreadable` if the document is not a story, or
/// the first violated story invariant.
#[instrument(skip(source), fields(bytes = source.len()))]
pub fn import_story_json(source: &str) -> Result<Story, ValidationError> {
    let story: Story = serde_json::from_str(source)
        .map_err(|e| ValidationError::Unreadable(format!("invalid JSON: {e}")))?;
    let story = validation::validate(story)?;
    debug!(scenes = story.scenes.len(), "Story imported from JSON");
    Ok(story)
}

/// Parses and validates a YAML story document with the same shape as the
/// JSON form.
///
/// # Errors
///
/// Returns `ValidationError::Unreadable` if the document is not a story, or
/// the first violated story invariant.
#[instrument(skip(source), fields(bytes = source.len()))]
pub fn import_story_yaml(source: &str) -> Result<Story, ValidationError> {
    let story: Story = serde_yaml::from_str(source)
        .map_err(|e| ValidationError::Unreadable(format!("invalid YAML: {e}")))?;
    let story = validation::validate(story)?;
    debug!(scenes = story.scenes.len(), "Story imported from YAML");
    Ok(story)
}

/// Parses and validates a story already decoded into a JSON value, as carried
/// by `story-update` commands.
///
/// # Errors
///
/// Returns `ValidationError::Unreadable` if the value is not a story, or the
/// first violated story invariant.
pub fn import_story_value(value: serde_json::Value) -> Result<Story, ValidationError> {
    let story: Story = serde_json::from_value(value)
        .map_err(|e| ValidationError::Unreadable(format!("invalid story data: {e}")))?;
    validation::validate(story)
}

/// Serializes a story to its pretty-printed JSON export form.
///
/// # Panics
///
/// Panics if the story cannot be serialized, which cannot happen: every field
/// is a string, integer, boolean or a collection of those.
#[must_use]
pub fn export_story_json(story: &Story) -> String {
    serde_json::to_string_pretty(story).expect("story serialization is infallible")
}

/// SHA-256 of the story's compact JSON form, as lowercase hex.
///
/// Two stories with the same hash have identical content.
///
/// # Panics
///
/// Panics if the story cannot be serialized; see [`export_story_json`].
#[must_use]
pub fn content_hash(story: &Story) -> String {
    let canonical = serde_json::to_vec(story).expect("story serialization is infallible");
    format!("{:x}", Sha256::digest(&canonical))
}
