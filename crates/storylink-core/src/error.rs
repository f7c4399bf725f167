//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
///
/// None of these are fatal to a participant: the narrative keeps running
/// locally whatever happens to synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Story content failed validation and was not applied.
    #[error("validation error: {0}")]
    Validation(String),

    /// An authored reference points outside the current story.
    #[error("position out of range: scene {scene_index}, line {line_index}")]
    OutOfRange {
        /// The scene index that was referenced.
        scene_index: usize,
        /// The line index that was referenced.
        line_index: usize,
    },

    /// Publishing to or connecting with the sync channel failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// An inbound payload could not be decoded.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The participant that should handle a request is not running.
    #[error("unavailable: {0}")]
    Unavailable(String),
}
