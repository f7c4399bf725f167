//! Story validation.
//!
//! Used at load time and whenever a story is replaced wholesale (import or an
//! inbound controller broadcast). Validation is a pure check.

use storylink_core::error::DomainError;
use thiserror::Error;

use super::story::Story;

/// Why a story was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The scene list is empty.
    #[error("story has no scenes")]
    NoScenes,

    /// A scene has no dialogue lines.
    #[error("scene {scene_index} has no dialogue lines")]
    EmptyScene {
        /// The offending scene.
        scene_index: usize,
    },

    /// A line has a blank speaker.
    #[error("scene {scene_index}, line {line_index} is missing a speaker")]
    MissingSpeaker {
        /// The scene containing the line.
        scene_index: usize,
        /// The offending line.
        line_index: usize,
    },

    /// A line has blank text.
    #[error("scene {scene_index}, line {line_index} is missing text")]
    MissingText {
        /// The scene containing the line.
        scene_index: usize,
        /// The offending line.
        line_index: usize,
    },

    /// An edit would remove the only remaining scene.
    #[error("the last remaining scene cannot be deleted")]
    LastScene,

    /// The content could not be read as a story at all.
    #[error("story could not be read: {0}")]
    Unreadable(String),
}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        DomainError::Validation(err.to_string())
    }
}

/// Checks every story invariant without taking ownership.
///
/// # Errors
///
/// Returns the first violated invariant, scanning scenes and lines in order.
pub fn check(story: &Story) -> Result<(), ValidationError> {
    if story.scenes.is_empty() {
        return Err(ValidationError::NoScenes);
    }

    for (scene_index, scene) in story.scenes.iter().enumerate() {
        if scene.dialogue.is_empty() {
            return Err(ValidationError::EmptyScene { scene_index });
        }
        for (line_index, line) in scene.dialogue.iter().enumerate() {
            if line.speaker.trim().is_empty() {
                return Err(ValidationError::MissingSpeaker {
                    scene_index,
                    line_index,
                });
            }
            if line.text.trim().is_empty() {
                return Err(ValidationError::MissingText {
                    scene_index,
                    line_index,
                });
            }
        }
    }

    Ok(())
}

/// Validates a story, handing it back on success.
///
/// # Errors
///
/// Returns `ValidationError` if the story has no scenes, a scene has no lines,
/// or a line is missing its speaker or text.
pub fn validate(story: Story) -> Result<Story, ValidationError> {
    check(&story)?;
    Ok(story)
}
