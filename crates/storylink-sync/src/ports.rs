//! Rendering and playback collaborators.
//!
//! The participant never touches a display or an audio device directly. It
//! drives these ports, and whoever embeds it supplies the implementations.
//! The `Logging*` implementations are used when running headless.

use serde::Serialize;
use storylink_narrative::domain::story::DialogueLine;
use tracing::{debug, info, warn};

/// State of the participant's connection to the sync channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Subscribing.
    Connecting,
    /// Subscribed and publishing.
    Connected,
    /// The connection failed or was lost; a reconnect is scheduled.
    Offline,
    /// A controller disconnected this participant. Publishing is suppressed
    /// until a manual reconnect.
    Evicted,
}

/// Draws the narrative. Implementations must treat `speaker` and `text` as
/// untrusted: they are authored content with the player name substituted in,
/// never escaped.
pub trait Renderer: Send + Sync {
    /// Shows a dialogue line.
    fn render(
        &self,
        line: &DialogueLine,
        speaker: &str,
        text: &str,
        progress: f64,
        background: &str,
    );

    /// Briefly shows a scene title after a scene change.
    fn show_transient_scene_title(&self, title: &str);

    /// Enables or disables the back/forward controls.
    fn set_nav_enabled(&self, can_go_back: bool, can_go_forward: bool);

    /// Reflects the connection state.
    fn set_connection_status(&self, _status: ConnectionStatus) {}

    /// Surfaces a non-fatal error, e.g. a rejected story.
    fn show_error(&self, _message: &str) {}

    /// Asks the player for their name again, after a controller reset.
    fn show_identity_prompt(&self) {}
}

/// Controls audio/video playback.
pub trait Playback: Send + Sync {
    /// Pauses everything that is playing.
    fn pause_all(&self);

    /// Resumes everything that was paused.
    fn resume_all(&self);

    /// Sets the master volume, `0.0..=1.0`.
    fn set_volume(&self, fraction: f64);
}

/// A renderer that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingRenderer;

impl Renderer for LoggingRenderer {
    fn render(
        &self,
        line: &DialogueLine,
        speaker: &str,
        text: &str,
        progress: f64,
        background: &str,
    ) {
        debug!(
            speaker,
            text,
            progress,
            background,
            has_media = line.media.is_some(),
            "Render line"
        );
    }

    fn show_transient_scene_title(&self, title: &str) {
        info!(title, "Scene entered");
    }

    fn set_nav_enabled(&self, can_go_back: bool, can_go_forward: bool) {
        debug!(can_go_back, can_go_forward, "Navigation controls updated");
    }

    fn set_connection_status(&self, status: ConnectionStatus) {
        info!(?status, "Connection status changed");
    }

    fn show_error(&self, message: &str) {
        warn!(message, "Participant error");
    }

    fn show_identity_prompt(&self) {
        info!("Identity prompt requested");
    }
}

/// A playback device that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingPlayback;

impl Playback for LoggingPlayback {
    fn pause_all(&self) {
        info!("Playback paused");
    }

    fn resume_all(&self) {
        info!("Playback resumed");
    }

    fn set_volume(&self, fraction: f64) {
        info!(volume = fraction, "Volume set");
    }
}
