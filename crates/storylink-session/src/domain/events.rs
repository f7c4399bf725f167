//! Domain events for the Session & Navigation context.

use serde::{Deserialize, Serialize};
use storylink_core::event::{DomainEvent, EventMetadata};
use storylink_narrative::domain::edit::StoryEdit;
use storylink_narrative::domain::position::Position;
use storylink_narrative::domain::story::DialogueMedia;

use super::identity::ClientId;

/// Where a change came from. Only local changes are ever published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ChangeOrigin {
    /// The local user (or local API caller) made the change.
    Local,
    /// The change applies a message received from another participant.
    Remote {
        /// The sender.
        client_id: ClientId,
    },
}

impl ChangeOrigin {
    /// Returns `true` for locally-initiated changes.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }
}

/// Why the position moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationCause {
    /// One line forward.
    Next,
    /// One line back.
    Previous,
    /// Direct jump (debugging or local sync).
    Jump,
    /// Applying another participant's position.
    RemoteSync,
}

/// Emitted when the current position changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionChanged {
    /// Position before the change.
    pub from: Position,
    /// Position after the change.
    pub to: Position,
    /// What moved it.
    pub cause: NavigationCause,
    /// Whether the new position is in a different scene.
    pub crossed_scene: bool,
    /// Background of the scene now shown.
    pub background: String,
    /// Flat position after the change.
    pub flat_position: usize,
}

/// Emitted when the whole story is replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryReplaced {
    /// Hash of the new content.
    pub content_hash: String,
    /// Position after re-clamping against the new story.
    pub position: Position,
}

/// Emitted when an authoring edit is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryEdited {
    /// The edit.
    pub edit: StoryEdit,
    /// Hash of the edited content.
    pub content_hash: String,
    /// Position after re-clamping against the edited story.
    pub position: Position,
}

/// Emitted when a line's media is replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaUpdated {
    /// Scene containing the line.
    pub scene_index: usize,
    /// The line.
    pub line_index: usize,
    /// The new media; `None` when cleared.
    pub media: Option<DialogueMedia>,
}

/// Emitted when the session is reset to the first line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReset {
    /// Position before the reset.
    pub from: Position,
}

/// Event type identifier for [`PositionChanged`].
pub const POSITION_CHANGED_EVENT_TYPE: &str = "navigation.position_changed";

/// Event type identifier for [`StoryReplaced`].
pub const STORY_REPLACED_EVENT_TYPE: &str = "navigation.story_replaced";

/// Event type identifier for [`StoryEdited`].
pub const STORY_EDITED_EVENT_TYPE: &str = "navigation.story_edited";

/// Event type identifier for [`MediaUpdated`].
pub const MEDIA_UPDATED_EVENT_TYPE: &str = "navigation.media_updated";

/// Event type identifier for [`SessionReset`].
pub const SESSION_RESET_EVENT_TYPE: &str = "navigation.session_reset";

/// Event payload variants for the Session & Navigation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NavigationEventKind {
    /// The position moved.
    PositionChanged(PositionChanged),
    /// The story was replaced wholesale.
    StoryReplaced(StoryReplaced),
    /// The story was edited.
    StoryEdited(StoryEdited),
    /// A line's media was replaced.
    MediaUpdated(MediaUpdated),
    /// The session was reset.
    SessionReset(SessionReset),
}

impl NavigationEventKind {
    /// The event type identifier for this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PositionChanged(_) => POSITION_CHANGED_EVENT_TYPE,
            Self::StoryReplaced(_) => STORY_REPLACED_EVENT_TYPE,
            Self::StoryEdited(_) => STORY_EDITED_EVENT_TYPE,
            Self::MediaUpdated(_) => MEDIA_UPDATED_EVENT_TYPE,
            Self::SessionReset(_) => SESSION_RESET_EVENT_TYPE,
        }
    }
}

/// Domain event envelope for the Session & Navigation context.
#[derive(Debug, Clone)]
pub struct NavigationEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Who caused the change.
    pub origin: ChangeOrigin,
    /// Event-specific payload.
    pub kind: NavigationEventKind,
}

impl NavigationEvent {
    /// Returns `true` if the change was made locally and should be published.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.origin.is_local()
    }
}

impl DomainEvent for NavigationEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("NavigationEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
