//! Query handlers for the Session & Navigation context.
//!
//! This module builds read-only view DTOs from the navigation aggregate and
//! the presence tracker.

use chrono::{DateTime, Utc};
use serde::Serialize;
use storylink_narrative::domain::personalize::personalize;
use storylink_narrative::domain::position::total_line_count;

use crate::domain::aggregates::NavigationController;
use crate::domain::presence::{PresenceRecord, PresenceTracker};

/// Read-only view of where a participant is in the story.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationView {
    /// Current scene.
    pub scene_index: usize,
    /// Current line within the scene.
    pub line_index: usize,
    /// Current flat position.
    pub flat_position: usize,
    /// Number of lines in the story.
    pub total_lines: usize,
    /// Fraction of the story shown so far.
    pub progress: f64,
    /// Title of the current scene.
    pub scene_title: String,
    /// Background of the current scene.
    pub background: String,
    /// Personalized speaker of the current line.
    pub speaker: String,
    /// Personalized text of the current line.
    pub text: String,
    /// Whether a previous line exists.
    pub can_go_back: bool,
    /// Whether a next line exists.
    pub can_go_forward: bool,
    /// Whether a scene transition is cooling down.
    pub transitioning: bool,
}

/// Builds the navigation view, personalizing the current line for
/// `player_name`.
#[must_use]
pub fn get_navigation_view(
    controller: &NavigationController,
    player_name: &str,
    now: DateTime<Utc>,
) -> NavigationView {
    let position = controller.position();
    let (speaker, text) = controller.current_line().map_or_else(
        || (String::new(), String::new()),
        |line| {
            (
                personalize(&line.speaker, player_name),
                personalize(&line.text, player_name),
            )
        },
    );
    NavigationView {
        scene_index: position.scene_index,
        line_index: position.line_index,
        flat_position: controller.flat_position(),
        total_lines: total_line_count(controller.story()),
        progress: controller.progress(),
        scene_title: controller.scene_title().to_owned(),
        background: controller.background().to_owned(),
        speaker,
        text,
        can_go_back: controller.can_go_back(),
        can_go_forward: controller.can_go_forward(),
        transitioning: controller.is_transitioning(now),
    }
}

/// Returns the live participant set, ordered by client id.
#[must_use]
pub fn get_devices(tracker: &PresenceTracker) -> Vec<PresenceRecord> {
    tracker.list()
}
