//! Position resolution over a story.
//!
//! A position is never stored redundantly: it is a `(scene_index, line_index)`
//! pair, with the flat position (count of lines before it across all scenes)
//! derived on demand. Every function here is total: out-of-range input is
//! clamped, never rejected, because stale peers routinely reference a story
//! that is shorter or longer than the local one.

use serde::{Deserialize, Serialize};

use super::story::Story;

/// A scene/line pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Zero-based scene index.
    pub scene_index: usize,
    /// Zero-based line index within the scene.
    pub line_index: usize,
}

impl Position {
    /// The first line of the first scene.
    pub const START: Self = Self {
        scene_index: 0,
        line_index: 0,
    };

    /// Creates a position.
    #[must_use]
    pub const fn new(scene_index: usize, line_index: usize) -> Self {
        Self {
            scene_index,
            line_index,
        }
    }
}

/// What a single step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Moved to another line of the same scene.
    WithinScene,
    /// Moved into a different scene.
    CrossedScene,
    /// Already at the first (backward) or last (forward) line; nothing moved.
    AtBoundary,
}

/// Result of stepping forward or backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// The position after the step (unchanged at a boundary).
    pub position: Position,
    /// What the step did.
    pub kind: StepKind,
}

impl Step {
    /// Returns `true` if the step entered a different scene.
    #[must_use]
    pub fn crossed_scene_boundary(&self) -> bool {
        self.kind == StepKind::CrossedScene
    }

    /// Returns `true` if the step could not move.
    #[must_use]
    pub fn at_boundary(&self) -> bool {
        self.kind == StepKind::AtBoundary
    }
}

/// Sum of all scenes' dialogue-line counts.
#[must_use]
pub fn total_line_count(story: &Story) -> usize {
    story.scenes.iter().map(|scene| scene.dialogue.len()).sum()
}

/// Number of lines in every scene before `scene_index`, plus `line_index`.
///
/// The addition saturates at `usize::MAX`; out-of-range inputs are not
/// clamped here, use [`clamp_position`] first when that matters.
#[must_use]
pub fn to_flat_position(story: &Story, scene_index: usize, line_index: usize) -> usize {
    story
        .scenes
        .iter()
        .take(scene_index)
        .map(|scene| scene.dialogue.len())
        .sum::<usize>()
        .saturating_add(line_index)
}

/// Inverse of [`to_flat_position`]. `flat` is clamped into
/// `[0, total_line_count - 1]` before resolving.
#[must_use]
pub fn from_flat_position(story: &Story, flat: i64) -> Position {
    let total = total_line_count(story);
    if total == 0 {
        return Position::START;
    }

    let mut remaining = usize::try_from(flat.max(0))
        .unwrap_or(usize::MAX)
        .min(total - 1);
    for (scene_index, scene) in story.scenes.iter().enumerate() {
        if remaining < scene.dialogue.len() {
            return Position::new(scene_index, remaining);
        }
        remaining -= scene.dialogue.len();
    }

    last_position(story)
}

/// Clamps a scene/line pair into the story's bounds: the scene index to the
/// last scene, then the line index to that scene's last line.
#[must_use]
pub fn clamp_position(story: &Story, scene_index: usize, line_index: usize) -> Position {
    let Some(last_scene) = story.scenes.len().checked_sub(1) else {
        return Position::START;
    };
    let scene_index = scene_index.min(last_scene);
    let last_line = story.scenes[scene_index].dialogue.len().saturating_sub(1);
    Position::new(scene_index, line_index.min(last_line))
}

/// The last line of the last scene.
#[must_use]
pub fn last_position(story: &Story) -> Position {
    clamp_position(story, usize::MAX, usize::MAX)
}

/// Advances one line. At the last line of a scene, moves to line 0 of the next
/// non-empty scene. At the very end, returns the same position and
/// [`StepKind::AtBoundary`]; repeated calls never move past it.
#[must_use]
pub fn step_forward(story: &Story, position: Position) -> Step {
    let current = clamp_position(story, position.scene_index, position.line_index);
    let Some(scene) = story.scene(current.scene_index) else {
        return Step {
            position: current,
            kind: StepKind::AtBoundary,
        };
    };

    if current.line_index + 1 < scene.dialogue.len() {
        return Step {
            position: Position::new(current.scene_index, current.line_index + 1),
            kind: StepKind::WithinScene,
        };
    }

    let next_scene = story
        .scenes
        .iter()
        .enumerate()
        .skip(current.scene_index + 1)
        .find(|(_, scene)| !scene.dialogue.is_empty())
        .map(|(index, _)| index);

    match next_scene {
        Some(scene_index) => Step {
            position: Position::new(scene_index, 0),
            kind: StepKind::CrossedScene,
        },
        None => Step {
            position: current,
            kind: StepKind::AtBoundary,
        },
    }
}

/// Moves back one line. At line 0 of a scene, moves to the last line of the
/// previous non-empty scene. At the very start, returns the same position and
/// [`StepKind::AtBoundary`].
#[must_use]
pub fn step_backward(story: &Story, position: Position) -> Step {
    let current = clamp_position(story, position.scene_index, position.line_index);

    if current.line_index > 0 {
        return Step {
            position: Position::new(current.scene_index, current.line_index - 1),
            kind: StepKind::WithinScene,
        };
    }

    let previous_scene = story
        .scenes
        .iter()
        .enumerate()
        .take(current.scene_index)
        .rev()
        .find(|(_, scene)| !scene.dialogue.is_empty());

    match previous_scene {
        Some((scene_index, scene)) => Step {
            position: Position::new(scene_index, scene.dialogue.len() - 1),
            kind: StepKind::CrossedScene,
        },
        None => Step {
            position: current,
            kind: StepKind::AtBoundary,
        },
    }
}

/// Fraction of the story shown once `position` is on screen, in `(0, 1]`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn progress_fraction(story: &Story, position: Position) -> f64 {
    let total = total_line_count(story);
    if total == 0 {
        return 0.0;
    }
    let flat = to_flat_position(story, position.scene_index, position.line_index).min(total - 1);
    (flat + 1) as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::story::{DialogueLine, Scene};

    fn story_with(counts: &[usize]) -> Story {
        Story::new(
            counts
                .iter()
                .enumerate()
                .map(|(s, &n)| {
                    Scene::new(
                        format!("Scene {s}"),
                        format!("bg-{s}"),
                        (0..n)
                            .map(|l| DialogueLine::new("Narrator", format!("{s}.{l}")))
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn test_two_scene_story_flat_positions() {
        let story = story_with(&[3, 2]);

        assert_eq!(total_line_count(&story), 5);
        assert_eq!(to_flat_position(&story, 1, 1), 4);
        assert_eq!(from_flat_position(&story, 4), Position::new(1, 1));
        assert_eq!(from_flat_position(&story, 3), Position::new(1, 0));
        assert_eq!(from_flat_position(&story, 2), Position::new(0, 2));
    }

    #[test]
    fn test_to_flat_position_saturates_on_huge_line_index() {
        let story = story_with(&[3, 2]);

        assert_eq!(to_flat_position(&story, 1, usize::MAX), usize::MAX);
        assert_eq!(to_flat_position(&story, usize::MAX, 0), 5);
    }

    #[test]
    fn test_from_flat_position_clamps_out_of_range() {
        let story = story_with(&[3, 2]);

        assert_eq!(from_flat_position(&story, 99), Position::new(1, 1));
        assert_eq!(from_flat_position(&story, -7), Position::START);
    }

    #[test]
    fn test_flat_round_trip_holds_for_every_line() {
        for counts in [&[1][..], &[3, 2], &[1, 4, 1, 2], &[5]] {
            let story = story_with(counts);
            for flat in 0..total_line_count(&story) {
                let position = from_flat_position(&story, i64::try_from(flat).unwrap());
                assert_eq!(
                    to_flat_position(&story, position.scene_index, position.line_index),
                    flat
                );
            }
        }
    }

    #[test]
    fn test_step_forward_walks_whole_story_then_stays_at_end() {
        let story = story_with(&[3, 2]);
        let mut position = Position::START;
        let mut crossings = 0;

        for _ in 0..total_line_count(&story) - 1 {
            let step = step_forward(&story, position);
            assert!(!step.at_boundary());
            if step.crossed_scene_boundary() {
                crossings += 1;
            }
            position = step.position;
        }

        assert_eq!(position, Position::new(1, 1));
        assert_eq!(crossings, 1);

        for _ in 0..3 {
            let step = step_forward(&story, position);
            assert_eq!(step.kind, StepKind::AtBoundary);
            assert_eq!(step.position, position);
        }
    }

    #[test]
    fn test_step_backward_crosses_to_last_line_of_previous_scene() {
        let story = story_with(&[3, 2]);

        let step = step_backward(&story, Position::new(1, 0));

        assert_eq!(step.position, Position::new(0, 2));
        assert!(step.crossed_scene_boundary());
    }

    #[test]
    fn test_step_backward_at_start_is_idempotent() {
        let story = story_with(&[3, 2]);

        let first = step_backward(&story, Position::START);
        let second = step_backward(&story, first.position);

        assert!(first.at_boundary());
        assert_eq!(second.position, Position::START);
        assert!(second.at_boundary());
    }

    #[test]
    fn test_steps_clamp_stale_positions_first() {
        let story = story_with(&[3, 2]);

        let step = step_forward(&story, Position::new(7, 9));

        assert_eq!(step.position, Position::new(1, 1));
        assert!(step.at_boundary());
    }

    #[test]
    fn test_clamp_position_limits_scene_then_line() {
        let story = story_with(&[3, 2]);

        assert_eq!(clamp_position(&story, 0, 10), Position::new(0, 2));
        assert_eq!(clamp_position(&story, 5, 0), Position::new(1, 0));
        assert_eq!(last_position(&story), Position::new(1, 1));
        assert_eq!(clamp_position(&Story::default(), 3, 3), Position::START);
    }

    #[test]
    fn test_progress_fraction_reaches_one_on_last_line() {
        let story = story_with(&[3, 2]);

        assert!((progress_fraction(&story, Position::START) - 0.2).abs() < f64::EPSILON);
        assert!((progress_fraction(&story, Position::new(1, 1)) - 1.0).abs() < f64::EPSILON);
    }
}
