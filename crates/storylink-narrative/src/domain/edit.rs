//! Authoring edits applied to a story.
//!
//! Edits run against a draft copy which is validated before it replaces the
//! original, so a rejected edit never leaves a half-applied story behind.

use serde::{Deserialize, Serialize};
use storylink_core::error::DomainError;
use tracing::debug;

use super::position::Position;
use super::story::{DialogueLine, DialogueMedia, Scene, Story};
use super::validation::{self, ValidationError};

/// A single authoring change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoryEdit {
    /// Replace a line's speaker and text.
    UpdateLine {
        /// Scene containing the line.
        scene_index: usize,
        /// The line to update.
        line_index: usize,
        /// New speaker.
        speaker: String,
        /// New text.
        text: String,
    },
    /// Replace a line's media wholesale. `None` removes it.
    SetMedia {
        /// Scene containing the line.
        scene_index: usize,
        /// The line whose media changes.
        line_index: usize,
        /// The new media.
        media: Option<DialogueMedia>,
    },
    /// Insert a scene before `index`. Indices past the end append.
    InsertScene {
        /// Insertion point.
        index: usize,
        /// The scene to insert.
        scene: Scene,
    },
    /// Remove a scene. The last remaining scene cannot be removed.
    DeleteScene {
        /// The scene to remove.
        scene_index: usize,
    },
    /// Insert a line into a scene before `line_index`. Indices past the end
    /// append.
    InsertLine {
        /// Scene receiving the line.
        scene_index: usize,
        /// Insertion point.
        line_index: usize,
        /// The line to insert.
        line: DialogueLine,
    },
    /// Remove a line. A scene's only line cannot be removed.
    DeleteLine {
        /// Scene containing the line.
        scene_index: usize,
        /// The line to remove.
        line_index: usize,
    },
}

impl StoryEdit {
    /// Returns the kind of edit as a static string, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpdateLine { .. } => "update_line",
            Self::SetMedia { .. } => "set_media",
            Self::InsertScene { .. } => "insert_scene",
            Self::DeleteScene { .. } => "delete_scene",
            Self::InsertLine { .. } => "insert_line",
            Self::DeleteLine { .. } => "delete_line",
        }
    }
}

impl Story {
    /// Applies an edit atomically.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::OutOfRange` if the edit addresses a scene or line
    /// that does not exist, or `DomainError::Validation` if the edited story
    /// would break a story invariant. On error `self` is unchanged.
    pub fn apply_edit(&mut self, edit: &StoryEdit) -> Result<(), DomainError> {
        let mut draft = self.clone();
        draft.apply_unchecked(edit)?;
        validation::check(&draft)?;

        debug!(kind = edit.kind(), "Story edit applied");
        *self = draft;
        Ok(())
    }

    fn apply_unchecked(&mut self, edit: &StoryEdit) -> Result<(), DomainError> {
        match edit {
            StoryEdit::UpdateLine {
                scene_index,
                line_index,
                speaker,
                text,
            } => {
                let line = self.existing_line(*scene_index, *line_index)?;
                speaker.clone_into(&mut line.speaker);
                text.clone_into(&mut line.text);
            }
            StoryEdit::SetMedia {
                scene_index,
                line_index,
                media,
            } => {
                let line = self.existing_line(*scene_index, *line_index)?;
                line.media = media.clone().filter(|m| !m.is_empty());
            }
            StoryEdit::InsertScene { index, scene } => {
                let index = (*index).min(self.scenes.len());
                self.scenes.insert(index, scene.clone());
            }
            StoryEdit::DeleteScene { scene_index } => {
                if *scene_index >= self.scenes.len() {
                    return Err(DomainError::OutOfRange {
                        scene_index: *scene_index,
                        line_index: 0,
                    });
                }
                if self.scenes.len() == 1 {
                    return Err(ValidationError::LastScene.into());
                }
                self.scenes.remove(*scene_index);
            }
            StoryEdit::InsertLine {
                scene_index,
                line_index,
                line,
            } => {
                let scene =
                    self.scenes
                        .get_mut(*scene_index)
                        .ok_or(DomainError::OutOfRange {
                            scene_index: *scene_index,
                            line_index: *line_index,
                        })?;
                let index = (*line_index).min(scene.dialogue.len());
                scene.dialogue.insert(index, line.clone());
            }
            StoryEdit::DeleteLine {
                scene_index,
                line_index,
            } => {
                self.existing_line(*scene_index, *line_index)?;
                self.scenes[*scene_index].dialogue.remove(*line_index);
            }
        }
        Ok(())
    }

    fn existing_line(
        &mut self,
        scene_index: usize,
        line_index: usize,
    ) -> Result<&mut DialogueLine, DomainError> {
        self.line_mut(Position::new(scene_index, line_index))
            .ok_or(DomainError::OutOfRange {
                scene_index,
                line_index,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::story::MediaAsset;

    fn story(counts: &[usize]) -> Story {
        Story::new(
            counts
                .iter()
                .enumerate()
                .map(|(s, &n)| {
                    Scene::new(
                        format!("Scene {s}"),
                        "bg",
                        (0..n)
                            .map(|l| DialogueLine::new("Narrator", format!("{s}.{l}")))
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn test_update_line_replaces_speaker_and_text() {
        let mut story = story(&[2]);

        story
            .apply_edit(&StoryEdit::UpdateLine {
                scene_index: 0,
                line_index: 1,
                speaker: "Jenkins".into(),
                text: "Hello {playerName}".into(),
            })
            .unwrap();

        let line = story.line(Position::new(0, 1)).unwrap();
        assert_eq!(line.speaker, "Jenkins");
        assert_eq!(line.text, "Hello {playerName}");
    }

    #[test]
    fn test_update_line_with_blank_text_is_rejected_and_story_unchanged() {
        let mut story = story(&[2]);
        let before = story.clone();

        let result = story.apply_edit(&StoryEdit::UpdateLine {
            scene_index: 0,
            line_index: 0,
            speaker: "Jenkins".into(),
            text: "   ".into(),
        });

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(story, before);
    }

    #[test]
    fn test_delete_only_scene_is_rejected() {
        let mut story = story(&[1]);

        let result = story.apply_edit(&StoryEdit::DeleteScene { scene_index: 0 });

        assert_eq!(result, Err(ValidationError::LastScene.into()));
        assert_eq!(story.scenes.len(), 1);
    }

    #[test]
    fn test_delete_scene_removes_it() {
        let mut story = story(&[1, 2, 3]);

        story
            .apply_edit(&StoryEdit::DeleteScene { scene_index: 1 })
            .unwrap();

        assert_eq!(story.scenes.len(), 2);
        assert_eq!(story.scenes[1].dialogue.len(), 3);
    }

    #[test]
    fn test_delete_only_line_of_scene_is_rejected() {
        let mut story = story(&[2, 1]);

        let result = story.apply_edit(&StoryEdit::DeleteLine {
            scene_index: 1,
            line_index: 0,
        });

        assert_eq!(
            result,
            Err(ValidationError::EmptyScene { scene_index: 1 }.into())
        );
        assert_eq!(story.scenes[1].dialogue.len(), 1);
    }

    #[test]
    fn test_insert_scene_past_end_appends() {
        let mut story = story(&[1]);
        let scene = Scene::new("New", "bg-new", vec![DialogueLine::new("A", "a")]);

        story
            .apply_edit(&StoryEdit::InsertScene {
                index: 42,
                scene: scene.clone(),
            })
            .unwrap();

        assert_eq!(story.scenes.last(), Some(&scene));
    }

    #[test]
    fn test_insert_empty_scene_is_rejected() {
        let mut story = story(&[1]);

        let result = story.apply_edit(&StoryEdit::InsertScene {
            index: 0,
            scene: Scene::new("Empty", "bg", vec![]),
        });

        assert_eq!(
            result,
            Err(ValidationError::EmptyScene { scene_index: 0 }.into())
        );
        assert_eq!(story.scenes.len(), 1);
    }

    #[test]
    fn test_insert_line_into_missing_scene_is_out_of_range() {
        let mut story = story(&[1]);

        let result = story.apply_edit(&StoryEdit::InsertLine {
            scene_index: 3,
            line_index: 0,
            line: DialogueLine::new("A", "a"),
        });

        assert_eq!(
            result,
            Err(DomainError::OutOfRange {
                scene_index: 3,
                line_index: 0
            })
        );
    }

    #[test]
    fn test_set_media_replaces_wholesale_and_empty_media_clears() {
        let mut story = story(&[1]);
        let media = DialogueMedia {
            image: Some(MediaAsset {
                data: "data:image/png;base64,AA".into(),
                file_name: "a.png".into(),
                autoplay: None,
                timestamp: 1,
            }),
            audio: None,
        };

        story
            .apply_edit(&StoryEdit::SetMedia {
                scene_index: 0,
                line_index: 0,
                media: Some(media.clone()),
            })
            .unwrap();
        assert_eq!(story.scenes[0].dialogue[0].media, Some(media));

        story
            .apply_edit(&StoryEdit::SetMedia {
                scene_index: 0,
                line_index: 0,
                media: Some(DialogueMedia::default()),
            })
            .unwrap();
        assert_eq!(story.scenes[0].dialogue[0].media, None);
    }
}
