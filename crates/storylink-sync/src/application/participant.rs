//! One viewer or controller instance.
//!
//! A `Participant` owns the story and position, the presence set and the
//! reconciler, and is the only thing that mutates them. Every local operation
//! applies to the navigation controller first and publishes afterwards, so a
//! broken connection never blocks the narrative.

use std::sync::Arc;

use serde::Serialize;
use storylink_core::channel::{ChannelMessage, Subscription, SyncChannel};
use storylink_core::clock::Clock;
use storylink_core::error::DomainError;
use storylink_narrative::application::content::export_story_json;
use storylink_narrative::domain::edit::StoryEdit;
use storylink_narrative::domain::personalize::personalize;
use storylink_narrative::domain::position::Position;
use storylink_narrative::domain::story::{DialogueMedia, Story};
use storylink_narrative::domain::validation::ValidationError;
use storylink_session::application::command_handlers::{
    handle_edit_story, handle_jump_to_line, handle_next_line, handle_previous_line,
    handle_replace_story, handle_reset_session, handle_update_media,
};
use storylink_session::application::query_handlers::{
    NavigationView, get_devices, get_navigation_view,
};
use storylink_session::domain::aggregates::{NavigationController, NavigationOutcome};
use storylink_session::domain::commands::{
    EditStory, JumpTarget, JumpToLine, NextLine, PreviousLine, ReplaceStory, ResetSession,
    UpdateMedia,
};
use storylink_session::domain::events::{ChangeOrigin, NavigationCause, NavigationEvent};
use storylink_session::domain::identity::{ClientId, ParticipantRole, PlayerIdentity};
use storylink_session::domain::presence::{PresenceRecord, PresenceTracker};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::domain::messages::CommandKind;
use crate::domain::reconciliation::{InboundOutcome, Reconciler};
use crate::domain::topics::Topics;
use crate::ports::{ConnectionStatus, Playback, Renderer};

/// Collaborators a participant is wired to.
pub struct ParticipantDeps {
    /// The pub/sub transport.
    pub channel: Arc<dyn SyncChannel>,
    /// Time source for cooldowns, timestamps and presence.
    pub clock: Arc<dyn Clock>,
    /// Display.
    pub renderer: Arc<dyn Renderer>,
    /// Audio/video.
    pub playback: Arc<dyn Playback>,
}

/// Point-in-time view of a participant, safe to hand to other tasks.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantSnapshot {
    /// Session client id.
    pub client_id: ClientId,
    /// Player name used for personalization.
    pub player_name: String,
    /// Viewer or controller.
    pub role: ParticipantRole,
    /// Connection state.
    pub status: ConnectionStatus,
    /// Local playback volume.
    pub volume: f64,
    /// Hash of the story currently held.
    pub content_hash: String,
    /// Where the participant is in the story.
    pub navigation: NavigationView,
    /// Other live participants.
    pub devices: Vec<PresenceRecord>,
}

/// A viewer or controller.
pub struct Participant {
    identity: PlayerIdentity,
    role: ParticipantRole,
    config: SyncConfig,
    navigation: NavigationController,
    presence: PresenceTracker,
    reconciler: Reconciler,
    channel: Arc<dyn SyncChannel>,
    clock: Arc<dyn Clock>,
    renderer: Arc<dyn Renderer>,
    playback: Arc<dyn Playback>,
    status: ConnectionStatus,
    volume: f64,
}

impl Participant {
    /// Creates a participant holding `story` at its first line.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if `story` is invalid.
    pub fn new(
        identity: PlayerIdentity,
        role: ParticipantRole,
        story: Story,
        config: SyncConfig,
        deps: ParticipantDeps,
    ) -> Result<Self, ValidationError> {
        let navigation = NavigationController::new(Uuid::new_v4(), story, config.cooldown_delta())?;
        let initial_seq = u64::try_from(deps.clock.now_millis()).unwrap_or_default();
        let reconciler = Reconciler::new(
            role,
            identity.clone(),
            Topics::new(&config.topic_prefix),
            config.sequence_guard,
            initial_seq,
        );
        Ok(Self {
            identity,
            role,
            config,
            navigation,
            presence: PresenceTracker::new(),
            reconciler,
            channel: deps.channel,
            clock: deps.clock,
            renderer: deps.renderer,
            playback: deps.playback,
            status: ConnectionStatus::Connecting,
            volume: 1.0,
        })
    }

    /// Player identity.
    #[must_use]
    pub fn identity(&self) -> &PlayerIdentity {
        &self.identity
    }

    /// Viewer or controller.
    #[must_use]
    pub fn role(&self) -> ParticipantRole {
        self.role
    }

    /// Runtime settings.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Connection state.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// The navigation controller.
    #[must_use]
    pub fn navigation(&self) -> &NavigationController {
        &self.navigation
    }

    /// Other live participants.
    #[must_use]
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Subscribes to every topic and, for a controller, announces itself.
    /// Leaves the evicted state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Transport` if subscribing or announcing fails;
    /// the status is then `Offline`.
    #[instrument(skip_all, fields(client_id = %self.identity.client_id, role = %self.role))]
    pub async fn connect(&mut self) -> Result<Box<dyn Subscription>, DomainError> {
        self.set_status(ConnectionStatus::Connecting);
        let filters = self.reconciler.topics().subscription_filters();
        let subscription = match self.channel.subscribe(&filters).await {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!(error = %err, "Subscribe failed");
                self.set_status(ConnectionStatus::Offline);
                return Err(err);
            }
        };
        self.set_status(ConnectionStatus::Connected);

        if self.role.is_controller() {
            let announce = self.reconciler.announce_message(self.clock.now_millis());
            self.publish_all(vec![announce]).await?;
        }
        info!(topics = filters.len(), "Connected");
        Ok(subscription)
    }

    /// Records that the subscription ended.
    pub fn connection_lost(&mut self) {
        if self.status != ConnectionStatus::Evicted {
            warn!(client_id = %self.identity.client_id, "Connection lost");
            self.set_status(ConnectionStatus::Offline);
        }
    }

    /// Shows the current line as if the scene had just been entered.
    pub fn render_current(&self) {
        self.present(true);
    }

    /// Advances one line.
    #[instrument(skip_all, fields(client_id = %self.identity.client_id))]
    pub async fn next(&mut self) -> NavigationOutcome {
        let command = NextLine {
            correlation_id: Uuid::new_v4(),
        };
        let result = handle_next_line(&command, &mut self.navigation, self.clock.as_ref());
        self.after_navigation(result.outcome);
        self.publish_events(&result.events).await;
        result.outcome
    }

    /// Goes back one line.
    #[instrument(skip_all, fields(client_id = %self.identity.client_id))]
    pub async fn previous(&mut self) -> NavigationOutcome {
        let command = PreviousLine {
            correlation_id: Uuid::new_v4(),
        };
        let result = handle_previous_line(&command, &mut self.navigation, self.clock.as_ref());
        self.after_navigation(result.outcome);
        self.publish_events(&result.events).await;
        result.outcome
    }

    /// Jumps to `target`, clamped. Ignores the cooldown.
    #[instrument(skip_all, fields(client_id = %self.identity.client_id, jump_target = ?target))]
    pub async fn jump(&mut self, target: JumpTarget) -> NavigationOutcome {
        let command = JumpToLine {
            correlation_id: Uuid::new_v4(),
            target,
            cause: NavigationCause::Jump,
            origin: ChangeOrigin::Local,
        };
        let result = handle_jump_to_line(&command, &mut self.navigation, self.clock.as_ref());
        self.after_navigation(result.outcome);
        self.publish_events(&result.events).await;
        result.outcome
    }

    /// Returns to the first line. A controller resets every viewer too.
    #[instrument(skip_all, fields(client_id = %self.identity.client_id))]
    pub async fn reset(&mut self) -> Position {
        let command = ResetSession {
            correlation_id: Uuid::new_v4(),
            origin: ChangeOrigin::Local,
        };
        let result = handle_reset_session(&command, &mut self.navigation, self.clock.as_ref());
        self.present(result.outcome.scene_index != 0);
        self.publish_events(&result.events).await;
        result.outcome
    }

    /// Re-publishes the current position so everyone converges on it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Transport` if publishing fails, or
    /// `DomainError::Unavailable` while evicted.
    #[instrument(skip_all, fields(client_id = %self.identity.client_id))]
    pub async fn broadcast_position(&mut self) -> Result<(), DomainError> {
        let message = self
            .reconciler
            .broadcast_position_message(&self.navigation, self.clock.now_millis());
        self.publish_all(vec![message]).await
    }

    /// Replaces the story. Returns `false` if it was already held. A
    /// controller broadcasts the new story.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the story is invalid; nothing
    /// changes.
    #[instrument(
        skip_all,
        fields(client_id = %self.identity.client_id, scenes = story.scenes.len())
    )]
    pub async fn import_story(&mut self, story: Story) -> Result<bool, DomainError> {
        let command = ReplaceStory {
            correlation_id: Uuid::new_v4(),
            story,
            origin: ChangeOrigin::Local,
        };
        let result = handle_replace_story(&command, &mut self.navigation, self.clock.as_ref())?;
        if result.outcome {
            self.present(false);
            self.publish_events(&result.events).await;
        }
        Ok(result.outcome)
    }

    /// Applies an authoring edit. A controller broadcasts the edited story.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::OutOfRange` or `DomainError::Validation` if the
    /// edit cannot be applied; nothing changes.
    #[instrument(skip_all, fields(client_id = %self.identity.client_id, kind = edit.kind()))]
    pub async fn edit_story(&mut self, edit: StoryEdit) -> Result<(), DomainError> {
        let command = EditStory {
            correlation_id: Uuid::new_v4(),
            edit,
        };
        let result = handle_edit_story(&command, &mut self.navigation, self.clock.as_ref())?;
        self.present(false);
        self.publish_events(&result.events).await;
        Ok(())
    }

    /// Replaces one line's media. A controller broadcasts the change.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::OutOfRange` if the line does not exist.
    #[instrument(
        skip_all,
        fields(
            client_id = %self.identity.client_id,
            scene_index = scene_index,
            line_index = line_index
        )
    )]
    pub async fn update_media(
        &mut self,
        scene_index: usize,
        line_index: usize,
        media: Option<DialogueMedia>,
    ) -> Result<(), DomainError> {
        let command = UpdateMedia {
            correlation_id: Uuid::new_v4(),
            scene_index,
            line_index,
            media,
            origin: ChangeOrigin::Local,
        };
        let result = handle_update_media(&command, &mut self.navigation, self.clock.as_ref())?;
        if self.navigation.position() == Position::new(scene_index, line_index) {
            self.present(false);
        }
        self.publish_events(&result.events).await;
        Ok(())
    }

    /// Pauses local playback; a controller pauses every viewer as well.
    ///
    /// # Errors
    ///
    /// Returns the publish error if a controller cannot reach viewers.
    pub async fn pause_all(&mut self) -> Result<(), DomainError> {
        self.playback.pause_all();
        self.send_command(CommandKind::Pause).await
    }

    /// Resumes local playback; a controller resumes every viewer as well.
    ///
    /// # Errors
    ///
    /// Returns the publish error if a controller cannot reach viewers.
    pub async fn resume_all(&mut self) -> Result<(), DomainError> {
        self.playback.resume_all();
        self.send_command(CommandKind::Resume).await
    }

    async fn send_command(&mut self, kind: CommandKind) -> Result<(), DomainError> {
        if !self.role.is_controller() {
            return Ok(());
        }
        let message = self
            .reconciler
            .command_message(&kind, self.clock.now_millis());
        self.publish_all(vec![message]).await
    }

    /// Sets the local volume, clamped into `0.0..=1.0`. Returns the value
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `fraction` is not a number.
    pub fn set_volume(&mut self, fraction: f64) -> Result<f64, DomainError> {
        if fraction.is_nan() {
            return Err(DomainError::Validation("volume must be a number".into()));
        }
        self.volume = fraction.clamp(0.0, 1.0);
        self.playback.set_volume(self.volume);
        Ok(self.volume)
    }

    /// Tells the participant `target` to disconnect and forgets it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` unless called on a controller with
    /// another participant's id, or the publish error.
    #[instrument(skip_all, fields(client_id = %self.identity.client_id, target_device = %target))]
    pub async fn disconnect_device(&mut self, target: ClientId) -> Result<(), DomainError> {
        if !self.role.is_controller() {
            return Err(DomainError::Validation(
                "only a controller can disconnect devices".into(),
            ));
        }
        if target == self.identity.client_id {
            return Err(DomainError::Validation(
                "a controller cannot disconnect itself".into(),
            ));
        }
        let kind = CommandKind::Disconnect {
            target: target.clone(),
        };
        let message = self
            .reconciler
            .command_message(&kind, self.clock.now_millis());
        self.publish_all(vec![message]).await?;
        self.presence.remove(&target);
        info!("Device disconnected");
        Ok(())
    }

    /// Applies one inbound message and drives the renderer and playback
    /// accordingly.
    pub fn handle_inbound(&mut self, message: &ChannelMessage) -> InboundOutcome {
        let outcome = self.reconciler.handle_inbound(
            message,
            &mut self.navigation,
            &mut self.presence,
            self.clock.as_ref(),
        );
        match &outcome {
            InboundOutcome::PositionApplied(NavigationOutcome::Moved { crossed_scene, .. }) => {
                self.present(*crossed_scene);
            }
            InboundOutcome::PlaybackPaused => self.playback.pause_all(),
            InboundOutcome::PlaybackResumed => self.playback.resume_all(),
            InboundOutcome::SessionReset => {
                self.present(true);
                self.renderer.show_identity_prompt();
            }
            InboundOutcome::StoryReplaced => self.present(false),
            InboundOutcome::MediaApplied {
                scene_index,
                line_index,
            } => {
                if self.navigation.position() == Position::new(*scene_index, *line_index) {
                    self.present(false);
                }
            }
            InboundOutcome::StoryRejected(err) => {
                self.renderer
                    .show_error(&format!("Story update rejected: {err}"));
            }
            InboundOutcome::Evicted { by } => {
                warn!(client_id = %self.identity.client_id, by = %by, "Evicted by controller");
                self.set_status(ConnectionStatus::Evicted);
            }
            InboundOutcome::PositionApplied(_)
            | InboundOutcome::Discarded(_)
            | InboundOutcome::PresenceUpdated { .. } => {}
        }
        outcome
    }

    /// Publishes a heartbeat (viewer) or announce (controller).
    ///
    /// # Errors
    ///
    /// Returns the publish error.
    pub async fn publish_heartbeat(&mut self) -> Result<(), DomainError> {
        let message = self
            .reconciler
            .heartbeat_message(&self.navigation, self.clock.now_millis());
        self.publish_all(vec![message]).await
    }

    /// Drops participants silent for longer than the presence timeout.
    pub fn sweep_presence(&mut self) -> Vec<ClientId> {
        let expired = self
            .presence
            .expire(self.clock.now(), self.config.presence_timeout_delta());
        for client_id in &expired {
            info!(client_id = %client_id, "Participant timed out");
        }
        expired
    }

    /// The story as pretty-printed JSON.
    #[must_use]
    pub fn export_story(&self) -> String {
        export_story_json(self.navigation.story())
    }

    /// A point-in-time view of this participant.
    #[must_use]
    pub fn snapshot(&self) -> ParticipantSnapshot {
        ParticipantSnapshot {
            client_id: self.identity.client_id.clone(),
            player_name: self.identity.name.clone(),
            role: self.role,
            status: self.status,
            volume: self.volume,
            content_hash: self.navigation.content_hash().to_owned(),
            navigation: get_navigation_view(
                &self.navigation,
                &self.identity.name,
                self.clock.now(),
            ),
            devices: get_devices(&self.presence),
        }
    }

    fn after_navigation(&self, outcome: NavigationOutcome) {
        match outcome {
            NavigationOutcome::Moved { crossed_scene, .. } => self.present(crossed_scene),
            NavigationOutcome::Suppressed { at } => {
                debug!(position = ?at, "Navigation ignored during scene transition");
            }
            NavigationOutcome::Unchanged { .. } => {}
        }
    }

    fn present(&self, entered_scene: bool) {
        if entered_scene {
            self.renderer
                .show_transient_scene_title(self.navigation.scene_title());
        }
        if let Some(line) = self.navigation.current_line() {
            let name = &self.identity.name;
            self.renderer.render(
                line,
                &personalize(&line.speaker, name),
                &personalize(&line.text, name),
                self.navigation.progress(),
                self.navigation.background(),
            );
        }
        self.renderer.set_nav_enabled(
            self.navigation.can_go_back(),
            self.navigation.can_go_forward(),
        );
    }

    async fn publish_events(&mut self, events: &[NavigationEvent]) {
        let now = self.clock.now_millis();
        let messages: Vec<ChannelMessage> = events
            .iter()
            .flat_map(|event| self.reconciler.outbound(event, &self.navigation, now))
            .collect();
        if messages.is_empty() {
            return;
        }
        if let Err(err) = self.publish_all(messages).await {
            debug!(error = %err, "Local change kept without publishing");
        }
    }

    async fn publish_all(&mut self, messages: Vec<ChannelMessage>) -> Result<(), DomainError> {
        if self.status == ConnectionStatus::Evicted {
            debug!(
                count = messages.len(),
                "Publishing suppressed while evicted"
            );
            return Err(DomainError::Unavailable(
                "disconnected by a controller".into(),
            ));
        }
        for message in messages {
            let topic = message.topic.clone();
            if let Err(err) = self.channel.publish(message).await {
                warn!(topic = %topic, error = %err, "Publish failed");
                self.set_status(ConnectionStatus::Offline);
                self.renderer.show_error("Connection lost; continuing offline");
                return Err(err);
            }
            debug!(topic = %topic, "Published");
        }
        Ok(())
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status != status {
            info!(
                client_id = %self.identity.client_id,
                from = ?self.status,
                to = ?status,
                "Connection status changed"
            );
            self.status = status;
            self.renderer.set_connection_status(status);
        }
    }
}
