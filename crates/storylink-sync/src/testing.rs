//! Recording collaborators and story fixtures for unit tests.

use std::sync::Mutex;

use storylink_narrative::domain::story::{DialogueLine, Scene, Story};

use crate::ports::{ConnectionStatus, Playback, Renderer};

/// Everything a [`RecordingRenderer`] was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RenderCall {
    Render { text: String, background: String },
    SceneTitle(String),
    Nav(bool, bool),
    Status(ConnectionStatus),
    Error(String),
    IdentityPrompt,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingRenderer {
    calls: Mutex<Vec<RenderCall>>,
}

impl RecordingRenderer {
    pub(crate) fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn rendered_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RenderCall::Render { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn errors(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RenderCall::Error(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: RenderCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Renderer for RecordingRenderer {
    fn render(
        &self,
        _line: &DialogueLine,
        _speaker: &str,
        text: &str,
        _progress: f64,
        background: &str,
    ) {
        self.push(RenderCall::Render {
            text: text.to_owned(),
            background: background.to_owned(),
        });
    }

    fn show_transient_scene_title(&self, title: &str) {
        self.push(RenderCall::SceneTitle(title.to_owned()));
    }

    fn set_nav_enabled(&self, can_go_back: bool, can_go_forward: bool) {
        self.push(RenderCall::Nav(can_go_back, can_go_forward));
    }

    fn set_connection_status(&self, status: ConnectionStatus) {
        self.push(RenderCall::Status(status));
    }

    fn show_error(&self, message: &str) {
        self.push(RenderCall::Error(message.to_owned()));
    }

    fn show_identity_prompt(&self) {
        self.push(RenderCall::IdentityPrompt);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PlaybackCall {
    Pause,
    Resume,
    Volume(f64),
}

#[derive(Debug, Default)]
pub(crate) struct RecordingPlayback {
    calls: Mutex<Vec<PlaybackCall>>,
}

impl RecordingPlayback {
    pub(crate) fn calls(&self) -> Vec<PlaybackCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Playback for RecordingPlayback {
    fn pause_all(&self) {
        self.calls.lock().unwrap().push(PlaybackCall::Pause);
    }

    fn resume_all(&self) {
        self.calls.lock().unwrap().push(PlaybackCall::Resume);
    }

    fn set_volume(&self, fraction: f64) {
        self.calls.lock().unwrap().push(PlaybackCall::Volume(fraction));
    }
}

/// A story whose scenes have the given line counts. Line text is
/// `"{scene}.{line}"`; scene titles are `"Scene {n}"`, backgrounds `"bg-{n}"`.
pub(crate) fn story(counts: &[usize]) -> Story {
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
