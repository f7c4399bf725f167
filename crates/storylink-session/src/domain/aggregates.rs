//! Aggregate roots for the Session & Navigation context.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use storylink_core::aggregate::AggregateRoot;
use storylink_core::clock::Clock;
use storylink_core::error::DomainError;
use storylink_core::event::EventMetadata;
use storylink_narrative::application::content::content_hash;
use storylink_narrative::domain::edit::StoryEdit;
use storylink_narrative::domain::position::{self, Position, Step};
use storylink_narrative::domain::story::{DialogueLine, DialogueMedia, Story};
use storylink_narrative::domain::validation::{self, ValidationError};
use tracing::debug;
use uuid::Uuid;

use super::commands::JumpTarget;
use super::events::{
    ChangeOrigin, MediaUpdated, NavigationCause, NavigationEvent, NavigationEventKind,
    PositionChanged, SessionReset, StoryEdited, StoryReplaced,
};

/// Whether navigation is currently accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum NavigationPhase {
    /// Ready to navigate.
    Idle,
    /// A scene crossing is cooling down; next/previous are dropped.
    Transitioning {
        /// When navigation is accepted again.
        until: DateTime<Utc>,
    },
}

/// What a navigation command did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NavigationOutcome {
    /// The position moved.
    Moved {
        /// Position before.
        from: Position,
        /// Position after.
        to: Position,
        /// Whether the move entered a different scene.
        crossed_scene: bool,
    },
    /// Nothing moved: already at a boundary, or already at the target.
    Unchanged {
        /// The current position.
        at: Position,
    },
    /// Dropped because a scene transition is cooling down.
    Suppressed {
        /// The current position.
        at: Position,
    },
}

impl NavigationOutcome {
    /// Returns `true` if the position moved.
    #[must_use]
    pub fn moved(&self) -> bool {
        matches!(self, Self::Moved { .. })
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

/// The aggregate root owning one participant's story and position.
///
/// All mutation of the story/position pair goes through this type; remote
/// influence arrives as commands tagged with a remote [`ChangeOrigin`].
#[derive(Debug)]
pub struct NavigationController {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Current version (event count).
    pub(crate) version: i64,
    story: Story,
    /// Hash of `story`, refreshed on every story mutation.
    story_hash: String,
    position: Position,
    cooldown: Duration,
    transition_until: Option<DateTime<Utc>>,
    /// Uncommitted events pending publication.
    uncommitted_events: Vec<NavigationEvent>,
}

impl NavigationController {
    /// Creates a controller positioned on the first line of `story`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if `story` is not a valid story.
    pub fn new(id: Uuid, story: Story, cooldown: Duration) -> Result<Self, ValidationError> {
        let story = validation::validate(story)?;
        let story_hash = content_hash(&story);
        Ok(Self {
            id,
            version: 0,
            story,
            story_hash,
            position: Position::START,
            cooldown,
            transition_until: None,
            uncommitted_events: Vec::new(),
        })
    }

    /// The story currently held.
    #[must_use]
    pub fn story(&self) -> &Story {
        &self.story
    }

    /// Content hash of the story currently held.
    #[must_use]
    pub fn content_hash(&self) -> &str {
        &self.story_hash
    }

    /// The current position.
    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    /// The current flat position.
    #[must_use]
    pub fn flat_position(&self) -> usize {
        position::to_flat_position(
            &self.story,
            self.position.scene_index,
            self.position.line_index,
        )
    }

    /// The line currently shown.
    #[must_use]
    pub fn current_line(&self) -> Option<&DialogueLine> {
        self.story.line(self.position)
    }

    /// Background of the current scene.
    #[must_use]
    pub fn background(&self) -> &str {
        self.story
            .scene(self.position.scene_index)
            .map_or("", |scene| scene.background.as_str())
    }

    /// Title of the current scene.
    #[must_use]
    pub fn scene_title(&self) -> &str {
        self.story
            .scene(self.position.scene_index)
            .map_or("", |scene| scene.title.as_str())
    }

    /// Fraction of the story shown so far.
    #[must_use]
    pub fn progress(&self) -> f64 {
        position::progress_fraction(&self.story, self.position)
    }

    /// Whether a previous line exists.
    #[must_use]
    pub fn can_go_back(&self) -> bool {
        !position::step_backward(&self.story, self.position).at_boundary()
    }

    /// Whether a next line exists.
    #[must_use]
    pub fn can_go_forward(&self) -> bool {
        !position::step_forward(&self.story, self.position).at_boundary()
    }

    /// The navigation phase at `now`.
    #[must_use]
    pub fn phase(&self, now: DateTime<Utc>) -> NavigationPhase {
        match self.transition_until {
            Some(until) if now < until => NavigationPhase::Transitioning { until },
            _ => NavigationPhase::Idle,
        }
    }

    /// Returns `true` while a scene transition is cooling down.
    #[must_use]
    pub fn is_transitioning(&self, now: DateTime<Utc>) -> bool {
        matches!(self.phase(now), NavigationPhase::Transitioning { .. })
    }

    /// Advances one line. Crossing into a new scene starts the cooldown.
    pub fn next(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> NavigationOutcome {
        self.step(Direction::Forward, correlation_id, clock)
    }

    /// Goes back one line. Crossing into a new scene starts the cooldown.
    pub fn previous(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> NavigationOutcome {
        self.step(Direction::Backward, correlation_id, clock)
    }

    fn step(
        &mut self,
        direction: Direction,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> NavigationOutcome {
        let now = clock.now();
        if self.is_transitioning(now) {
            debug!(?direction, "Navigation dropped during scene transition");
            return NavigationOutcome::Suppressed { at: self.position };
        }

        let step: Step = match direction {
            Direction::Forward => position::step_forward(&self.story, self.position),
            Direction::Backward => position::step_backward(&self.story, self.position),
        };
        if step.at_boundary() {
            return NavigationOutcome::Unchanged { at: self.position };
        }

        let crossed_scene = step.crossed_scene_boundary();
        if crossed_scene {
            self.transition_until = Some(now + self.cooldown);
        }
        let cause = match direction {
            Direction::Forward => NavigationCause::Next,
            Direction::Backward => NavigationCause::Previous,
        };
        let to = step.position;
        let from = self.move_to(to, cause, ChangeOrigin::Local, correlation_id, clock);
        NavigationOutcome::Moved {
            from,
            to,
            crossed_scene,
        }
    }

    /// Jumps directly to `target`, clamped into the story. Always accepted,
    /// even while transitioning.
    pub fn jump_to(
        &mut self,
        target: JumpTarget,
        cause: NavigationCause,
        origin: ChangeOrigin,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> NavigationOutcome {
        let to = match target {
            JumpTarget::SceneLine {
                scene_index,
                line_index,
            } => position::clamp_position(&self.story, scene_index, line_index),
            JumpTarget::Flat(flat) => position::from_flat_position(&self.story, flat),
        };
        if to == self.position {
            return NavigationOutcome::Unchanged { at: to };
        }

        let crossed_scene = to.scene_index != self.position.scene_index;
        let from = self.move_to(to, cause, origin, correlation_id, clock);
        NavigationOutcome::Moved {
            from,
            to,
            crossed_scene,
        }
    }

    /// Returns to the first line and clears any cooldown. Returns the
    /// position held before the reset.
    pub fn reset(
        &mut self,
        origin: ChangeOrigin,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Position {
        let from = self.position;
        self.position = Position::START;
        self.transition_until = None;
        self.record(
            origin,
            correlation_id,
            clock,
            NavigationEventKind::SessionReset(SessionReset { from }),
        );
        from
    }

    /// Replaces the whole story, then re-clamps the position against it.
    /// Returns `Ok(false)` when `story` is identical to the one held.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if `story` is invalid; the previous story and
    /// position are kept.
    pub fn replace_story(
        &mut self,
        story: Story,
        origin: ChangeOrigin,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<bool, ValidationError> {
        let story = validation::validate(story)?;
        let hash = content_hash(&story);
        if hash == self.story_hash {
            debug!(content_hash = %hash, "Story unchanged, nothing to replace");
            return Ok(false);
        }

        self.story = story;
        self.story_hash.clone_from(&hash);
        self.position = self.clamped(self.position);
        self.record(
            origin,
            correlation_id,
            clock,
            NavigationEventKind::StoryReplaced(StoryReplaced {
                content_hash: hash,
                position: self.position,
            }),
        );
        Ok(true)
    }

    /// Applies an authoring edit, then re-clamps the position.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::OutOfRange` if the edit addresses a missing scene
    /// or line, or `DomainError::Validation` if it would break the story.
    pub fn edit_story(
        &mut self,
        edit: StoryEdit,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.story.apply_edit(&edit)?;
        self.story_hash = content_hash(&self.story);
        self.position = self.clamped(self.position);
        self.record(
            ChangeOrigin::Local,
            correlation_id,
            clock,
            NavigationEventKind::StoryEdited(StoryEdited {
                edit,
                content_hash: self.story_hash.clone(),
                position: self.position,
            }),
        );
        Ok(())
    }

    /// Replaces one line's media. The line must exist; media is never
    /// clamped onto a different line.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::OutOfRange` if the line does not exist.
    pub fn update_media(
        &mut self,
        scene_index: usize,
        line_index: usize,
        media: Option<DialogueMedia>,
        origin: ChangeOrigin,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.story.apply_edit(&StoryEdit::SetMedia {
            scene_index,
            line_index,
            media: media.clone(),
        })?;
        self.story_hash = content_hash(&self.story);
        self.record(
            origin,
            correlation_id,
            clock,
            NavigationEventKind::MediaUpdated(MediaUpdated {
                scene_index,
                line_index,
                media,
            }),
        );
        Ok(())
    }

    fn clamped(&self, at: Position) -> Position {
        position::clamp_position(&self.story, at.scene_index, at.line_index)
    }

    fn move_to(
        &mut self,
        to: Position,
        cause: NavigationCause,
        origin: ChangeOrigin,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Position {
        let from = self.position;
        self.position = to;
        let event = PositionChanged {
            from,
            to,
            cause,
            crossed_scene: from.scene_index != to.scene_index,
            background: self.background().to_owned(),
            flat_position: self.flat_position(),
        };
        self.record(
            origin,
            correlation_id,
            clock,
            NavigationEventKind::PositionChanged(event),
        );
        from
    }

    /// Returns the next sequence number for a new event.
    fn next_sequence_number(&self) -> i64 {
        self.version + 1
    }

    fn record(
        &mut self,
        origin: ChangeOrigin,
        correlation_id: Uuid,
        clock: &dyn Clock,
        kind: NavigationEventKind,
    ) {
        let event = NavigationEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                aggregate_id: self.id,
                sequence_number: self.next_sequence_number(),
                correlation_id,
                occurred_at: clock.now(),
            },
            origin,
            kind,
        };
        self.version += 1;
        self.uncommitted_events.push(event);
    }
}

impl AggregateRoot for NavigationController {
    type Event = NavigationEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn take_uncommitted_events(&mut self) -> Vec<Self::Event> {
        std::mem::take(&mut self.uncommitted_events)
    }
}
