//! Commands for the Session & Navigation context.

use storylink_core::command::Command;
use storylink_narrative::domain::edit::StoryEdit;
use storylink_narrative::domain::story::{DialogueMedia, Story};
use uuid::Uuid;

use super::events::{ChangeOrigin, NavigationCause};

/// Command to advance one line.
#[derive(Debug, Clone)]
pub struct NextLine {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
}

impl Command for NextLine {
    fn command_type(&self) -> &'static str {
        "navigation.next_line"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to go back one line.
#[derive(Debug, Clone)]
pub struct PreviousLine {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
}

impl Command for PreviousLine {
    fn command_type(&self) -> &'static str {
        "navigation.previous_line"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Where a jump should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpTarget {
    /// A scene/line pair, each clamped.
    SceneLine {
        /// Target scene.
        scene_index: usize,
        /// Target line.
        line_index: usize,
    },
    /// A flat position, clamped into the story.
    Flat(i64),
}

/// Command to jump directly to a position, bypassing the cooldown.
#[derive(Debug, Clone)]
pub struct JumpToLine {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Where to land.
    pub target: JumpTarget,
    /// Recorded cause of the move.
    pub cause: NavigationCause,
    /// Who asked for the jump.
    pub origin: ChangeOrigin,
}

impl Command for JumpToLine {
    fn command_type(&self) -> &'static str {
        "navigation.jump_to_line"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to return to the first line.
#[derive(Debug, Clone)]
pub struct ResetSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Who asked for the reset.
    pub origin: ChangeOrigin,
}

impl Command for ResetSession {
    fn command_type(&self) -> &'static str {
        "navigation.reset_session"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to replace the whole story.
#[derive(Debug, Clone)]
pub struct ReplaceStory {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The new story; validated before it is applied.
    pub story: Story,
    /// Who supplied the story.
    pub origin: ChangeOrigin,
}

impl Command for ReplaceStory {
    fn command_type(&self) -> &'static str {
        "navigation.replace_story"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to apply an authoring edit.
#[derive(Debug, Clone)]
pub struct EditStory {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The edit.
    pub edit: StoryEdit,
}

impl Command for EditStory {
    fn command_type(&self) -> &'static str {
        "navigation.edit_story"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to replace one line's media.
#[derive(Debug, Clone)]
pub struct UpdateMedia {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Scene containing the line.
    pub scene_index: usize,
    /// The line.
    pub line_index: usize,
    /// The new media; `None` clears it.
    pub media: Option<DialogueMedia>,
    /// Who supplied the media.
    pub origin: ChangeOrigin,
}

impl Command for UpdateMedia {
    fn command_type(&self) -> &'static str {
        "navigation.update_media"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
