//! Command handlers for the Session & Navigation context.
//!
//! Each handler applies one command to the navigation aggregate and drains
//! the events it recorded, so the caller can publish them.

use storylink_core::aggregate::AggregateRoot;
use storylink_core::clock::Clock;
use storylink_core::command::Command;
use storylink_core::error::DomainError;
use storylink_core::event::DomainEvent;
use storylink_narrative::domain::position::Position;
use storylink_narrative::domain::validation::ValidationError;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{NavigationController, NavigationOutcome};
use crate::domain::commands::{
    EditStory, JumpTarget, JumpToLine, NextLine, PreviousLine, ReplaceStory, ResetSession,
    UpdateMedia,
};
use crate::domain::events::{ChangeOrigin, NavigationCause, NavigationEvent};

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct NavigationCommandResult<T> {
    /// The aggregate ID affected by the command.
    pub aggregate_id: Uuid,
    /// What the command did.
    pub outcome: T,
    /// The events recorded while handling the command, oldest first.
    pub events: Vec<NavigationEvent>,
}

fn finish<T>(
    command: &dyn Command,
    controller: &mut NavigationController,
    outcome: T,
) -> NavigationCommandResult<T> {
    let events = controller.take_uncommitted_events();
    debug!(
        command_type = command.command_type(),
        events = events.len(),
        version = controller.version(),
        "Command handled"
    );
    for event in &events {
        debug!(
            event_type = event.event_type(),
            sequence_number = event.metadata().sequence_number,
            payload = %event.to_payload(),
            "Event recorded"
        );
    }
    NavigationCommandResult {
        aggregate_id: controller.aggregate_id(),
        outcome,
        events,
    }
}

/// Handles the `NextLine` command.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub fn handle_next_line(
    command: &NextLine,
    controller: &mut NavigationController,
    clock: &dyn Clock,
) -> NavigationCommandResult<NavigationOutcome> {
    let outcome = controller.next(command.correlation_id, clock);
    finish(command, controller, outcome)
}

/// Handles the `PreviousLine` command.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub fn handle_previous_line(
    command: &PreviousLine,
    controller: &mut NavigationController,
    clock: &dyn Clock,
) -> NavigationCommandResult<NavigationOutcome> {
    let outcome = controller.previous(command.correlation_id, clock);
    finish(command, controller, outcome)
}

/// Handles the `JumpToLine` command. Jumps bypass the transition cooldown.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, target = ?command.target))]
pub fn handle_jump_to_line(
    command: &JumpToLine,
    controller: &mut NavigationController,
    clock: &dyn Clock,
) -> NavigationCommandResult<NavigationOutcome> {
    let outcome = controller.jump_to(
        command.target,
        command.cause,
        command.origin.clone(),
        command.correlation_id,
        clock,
    );
    finish(command, controller, outcome)
}

/// Handles the `ResetSession` command. The outcome is the position held
/// before the reset.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub fn handle_reset_session(
    command: &ResetSession,
    controller: &mut NavigationController,
    clock: &dyn Clock,
) -> NavigationCommandResult<Position> {
    let from = controller.reset(command.origin.clone(), command.correlation_id, clock);
    finish(command, controller, from)
}

/// Handles the `ReplaceStory` command. The outcome is `false` when the story
/// was already held and nothing changed.
///
/// # Errors
///
/// Returns `ValidationError` if the new story is invalid; nothing changes.
#[instrument(
    skip_all,
    fields(correlation_id = %command.correlation_id, scenes = command.story.scenes.len())
)]
pub fn handle_replace_story(
    command: &ReplaceStory,
    controller: &mut NavigationController,
    clock: &dyn Clock,
) -> Result<NavigationCommandResult<bool>, ValidationError> {
    let replaced = controller.replace_story(
        command.story.clone(),
        command.origin.clone(),
        command.correlation_id,
        clock,
    )?;
    Ok(finish(command, controller, replaced))
}

/// Handles the `EditStory` command.
///
/// # Errors
///
/// Returns `DomainError::OutOfRange` or `DomainError::Validation` if the edit
/// cannot be applied; nothing changes.
#[instrument(
    skip_all,
    fields(correlation_id = %command.correlation_id, kind = command.edit.kind())
)]
pub fn handle_edit_story(
    command: &EditStory,
    controller: &mut NavigationController,
    clock: &dyn Clock,
) -> Result<NavigationCommandResult<()>, DomainError> {
    controller.edit_story(command.edit.clone(), command.correlation_id, clock)?;
    Ok(finish(command, controller, ()))
}

/// Handles the `UpdateMedia` command.
///
/// # Errors
///
/// Returns `DomainError::OutOfRange` if the addressed line does not exist.
#[instrument(
    skip_all,
    fields(
        correlation_id = %command.correlation_id,
        scene_index = command.scene_index,
        line_index = command.line_index
    )
)]
pub fn handle_update_media(
    command: &UpdateMedia,
    controller: &mut NavigationController,
    clock: &dyn Clock,
) -> Result<NavigationCommandResult<()>, DomainError> {
    controller.update_media(
        command.scene_index,
        command.line_index,
        command.media.clone(),
        command.origin.clone(),
        command.correlation_id,
        clock,
    )?;
    Ok(finish(command, controller, ()))
}

/// Builds a jump command that applies another participant's position.
#[must_use]
pub fn remote_jump(
    target: JumpTarget,
    origin: ChangeOrigin,
    correlation_id: Uuid,
) -> JumpToLine {
    JumpToLine {
        correlation_id,
        target,
        cause: NavigationCause::RemoteSync,
        origin,
    }
}
