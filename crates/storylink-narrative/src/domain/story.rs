//! The authored story: scenes of dialogue lines with optional media.

use serde::{Deserialize, Serialize};

use super::position::Position;

/// An embedded media file, carried as text (typically a base64 data URI).
///
/// Owned by the dialogue line that embeds it and replaced wholesale on edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    /// Encoded file contents.
    pub data: String,
    /// Original file name.
    pub file_name: String,
    /// Whether audio should start playing when the line is shown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoplay: Option<bool>,
    /// Epoch milliseconds when the asset was attached.
    #[serde(default)]
    pub timestamp: i64,
}

/// Media attached to a dialogue line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueMedia {
    /// Image shown with the line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<MediaAsset>,
    /// Audio played with the line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<MediaAsset>,
}

impl DialogueMedia {
    /// Returns `true` when neither image nor audio is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.audio.is_none()
    }
}

/// One speaker/text unit, the atomic unit of narrative progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueLine {
    /// Who is speaking. Blank speakers fail validation.
    #[serde(default)]
    pub speaker: String,
    /// What is said. May contain the player-name placeholder.
    #[serde(default)]
    pub text: String,
    /// Optional image/audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<DialogueMedia>,
}

impl DialogueLine {
    /// Creates a line without media.
    #[must_use]
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            media: None,
        }
    }
}

/// An ordered group of dialogue lines sharing a title and background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    /// Title shown when the scene is entered.
    #[serde(default)]
    pub title: String,
    /// Background identifier handed to the renderer.
    #[serde(default)]
    pub background: String,
    /// The scene's lines; must not be empty.
    #[serde(default)]
    pub dialogue: Vec<DialogueLine>,
}

impl Scene {
    /// Creates a scene from its parts.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        background: impl Into<String>,
        dialogue: Vec<DialogueLine>,
    ) -> Self {
        Self {
            title: title.into(),
            background: background.into(),
            dialogue,
        }
    }
}

/// A whole story. A valid story has at least one scene and every scene has at
/// least one line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    /// Scenes in reading order.
    #[serde(default)]
    pub scenes: Vec<Scene>,
}

impl Story {
    /// Creates a story from scenes. The result is not validated.
    #[must_use]
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }

    /// Returns the scene at `scene_index`, if any.
    #[must_use]
    pub fn scene(&self, scene_index: usize) -> Option<&Scene> {
        self.scenes.get(scene_index)
    }

    /// Returns the line at `position`, if it exists.
    #[must_use]
    pub fn line(&self, position: Position) -> Option<&DialogueLine> {
        self.scenes
            .get(position.scene_index)
            .and_then(|scene| scene.dialogue.get(position.line_index))
    }

    pub(crate) fn line_mut(&mut self, position: Position) -> Option<&mut DialogueLine> {
        self.scenes
            .get_mut(position.scene_index)
            .and_then(|scene| scene.dialogue.get_mut(position.line_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_deserializes_original_content_shape() {
        let json = r#"{
            "scenes": [{
                "id": 1,
                "title": "The Ordinary World",
                "background": "bg-office",
                "dialogue": [
                    { "speaker": "Narrator", "text": "Welcome, {playerName}.", "media": {} },
                    { "speaker": "Jenkins", "text": "Line two" }
                ]
            }]
        }"#;

        let story: Story = serde_json::from_str(json).unwrap();

        assert_eq!(story.scenes.len(), 1);
        assert_eq!(story.scenes[0].background, "bg-office");
        assert_eq!(story.scenes[0].dialogue.len(), 2);
        assert_eq!(
            story.scenes[0].dialogue[0].media,
            Some(DialogueMedia::default())
        );
        assert_eq!(story.scenes[0].dialogue[1].media, None);
    }

    #[test]
    fn test_media_asset_uses_camel_case_on_the_wire() {
        let asset = MediaAsset {
            data: "data:audio/mp3;base64,AAAA".to_owned(),
            file_name: "theme.mp3".to_owned(),
            autoplay: Some(true),
            timestamp: 1_700_000_000_000,
        };

        let value = serde_json::to_value(&asset).unwrap();

        assert_eq!(value["fileName"], "theme.mp3");
        assert_eq!(value["autoplay"], true);
        assert_eq!(value["timestamp"], 1_700_000_000_000_i64);
    }

    #[test]
    fn test_line_lookup_returns_none_outside_story() {
        let scene = Scene::new("Only", "bg", vec![DialogueLine::new("A", "a")]);
        let story = Story::new(vec![scene]);

        assert!(story.line(Position::new(0, 0)).is_some());
        assert!(story.line(Position::new(0, 1)).is_none());
        assert!(story.line(Position::new(1, 0)).is_none());
    }
}
