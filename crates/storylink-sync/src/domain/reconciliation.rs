//! The reconciliation protocol.
//!
//! Inbound messages go through a fixed decision sequence: decode, drop
//! self-echoes, drop stale sequence numbers (when the guard is on), apply the
//! role rules, then apply the message to the local navigation controller or
//! presence tracker. Remote changes are recorded with a remote origin and are
//! never re-published. Outbound messages are built only from locally-originated
//! navigation events.
//!
//! There is no merge and no clock: whatever is applied last wins.

use std::collections::HashMap;

use storylink_core::channel::ChannelMessage;
use storylink_core::clock::Clock;
use storylink_narrative::application::content::import_story_value;
use storylink_narrative::domain::position::Position;
use storylink_narrative::domain::story::{DialogueMedia, Story};
use storylink_narrative::domain::validation::ValidationError;
use storylink_session::application::command_handlers::{
    handle_jump_to_line, handle_replace_story, handle_reset_session, handle_update_media,
    remote_jump,
};
use storylink_session::domain::aggregates::{NavigationController, NavigationOutcome};
use storylink_session::domain::commands::{ReplaceStory, ResetSession, UpdateMedia};
use storylink_session::domain::events::{
    ChangeOrigin, NavigationCause, NavigationEvent, NavigationEventKind,
};
use storylink_session::domain::identity::{ClientId, ParticipantRole, PlayerIdentity};
use storylink_session::domain::presence::{PresenceTracker, PresenceUpdate};
use tracing::{debug, warn};
use uuid::Uuid;

use super::messages::{
    ANNOUNCE_TYPE, AnnouncePayload, CONTROLLER_CAPABILITIES, CommandKind, CommandPayload,
    DecodeError, HEARTBEAT_TYPE, HeartbeatPayload, MEDIA_UPDATE_ACTION, MediaPayload,
    StoryStatePayload, SyncAction, SyncMessage, encode,
};
use super::topics::{TopicKind, Topics};

/// Why an inbound message was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// The payload could not be decoded.
    Malformed(DecodeError),
    /// We sent it.
    SelfEcho,
    /// Its sequence number is not newer than the sender's last one.
    Stale {
        /// The message's sequence number.
        seq: u64,
        /// The last sequence number seen from the sender.
        last_seen: u64,
    },
    /// Our role does not act on this kind of message.
    IgnoredByRole,
    /// A disconnect aimed at someone else.
    NotForUs,
    /// A story update carrying the story we already hold.
    DuplicateStory,
    /// A media update addressing a line our story does not have.
    OutOfRange {
        /// Addressed scene.
        scene_index: usize,
        /// Addressed line.
        line_index: usize,
    },
}

/// What handling an inbound message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Nothing was applied.
    Discarded(DiscardReason),
    /// A position was applied (possibly a no-op if already there).
    PositionApplied(NavigationOutcome),
    /// Playback should pause.
    PlaybackPaused,
    /// Playback should resume.
    PlaybackResumed,
    /// Position went back to the first line; identity should be re-prompted.
    SessionReset,
    /// The story was replaced and the position re-clamped.
    StoryReplaced,
    /// A story update failed validation; nothing changed.
    StoryRejected(ValidationError),
    /// A line's media was replaced.
    MediaApplied {
        /// Scene containing the line.
        scene_index: usize,
        /// The line.
        line_index: usize,
    },
    /// A controller disconnected us.
    Evicted {
        /// The controller.
        by: ClientId,
    },
    /// Another participant's presence was refreshed.
    PresenceUpdated {
        /// The participant.
        client_id: ClientId,
        /// Whether it was previously unknown.
        new: bool,
    },
}

/// Applies inbound messages and builds outbound ones for one participant.
#[derive(Debug)]
pub struct Reconciler {
    role: ParticipantRole,
    identity: PlayerIdentity,
    topics: Topics,
    sequence_guard: bool,
    next_seq: u64,
    last_seen: HashMap<ClientId, u64>,
}

impl Reconciler {
    /// Creates a reconciler. Outbound sequence numbers start after
    /// `initial_seq`; seeding it from the clock keeps them increasing across
    /// restarts.
    #[must_use]
    pub fn new(
        role: ParticipantRole,
        identity: PlayerIdentity,
        topics: Topics,
        sequence_guard: bool,
        initial_seq: u64,
    ) -> Self {
        Self {
            role,
            identity,
            topics,
            sequence_guard,
            next_seq: initial_seq,
            last_seen: HashMap::new(),
        }
    }

    /// The topic set in use.
    #[must_use]
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Handles one inbound message.
    pub fn handle_inbound(
        &mut self,
        message: &ChannelMessage,
        navigation: &mut NavigationController,
        presence: &mut PresenceTracker,
        clock: &dyn Clock,
    ) -> InboundOutcome {
        let decoded = match SyncMessage::decode(&self.topics, message) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(topic = %message.topic, error = %err, "Discarding malformed message");
                return InboundOutcome::Discarded(DiscardReason::Malformed(err));
            }
        };

        let header = decoded.header();
        if header.origin == self.identity.client_id {
            debug!(kind = decoded.kind_name(), "Discarding self-echo");
            return InboundOutcome::Discarded(DiscardReason::SelfEcho);
        }

        if let Some(reason) = self.check_sequence(&header.origin, header.seq) {
            debug!(
                kind = decoded.kind_name(),
                origin = %header.origin,
                ?reason,
                "Discarding stale message"
            );
            return InboundOutcome::Discarded(reason);
        }

        if !self.admits(&decoded) {
            debug!(
                kind = decoded.kind_name(),
                origin = %header.origin,
                role = %self.role,
                "Message ignored by role"
            );
            return InboundOutcome::Discarded(DiscardReason::IgnoredByRole);
        }

        let origin = ChangeOrigin::Remote {
            client_id: header.origin.clone(),
        };
        let correlation_id = Uuid::new_v4();

        match decoded {
            SyncMessage::Position(sync) => {
                let command = remote_jump(sync.target.to_jump_target(), origin, correlation_id);
                let result = handle_jump_to_line(&command, navigation, clock);
                debug!(
                    origin = %sync.header.origin,
                    action = sync.action.as_str(),
                    outcome = ?result.outcome,
                    "Applied remote position"
                );
                InboundOutcome::PositionApplied(result.outcome)
            }
            SyncMessage::Command(command) => {
                self.apply_command(command.kind, origin, correlation_id, navigation, clock)
            }
            SyncMessage::Media(update) => {
                let command = UpdateMedia {
                    correlation_id,
                    scene_index: update.scene_index,
                    line_index: update.line_index,
                    media: update.media,
                    origin,
                };
                match handle_update_media(&command, navigation, clock) {
                    Ok(_) => InboundOutcome::MediaApplied {
                        scene_index: update.scene_index,
                        line_index: update.line_index,
                    },
                    Err(err) => {
                        warn!(error = %err, "Discarding media update outside local story");
                        InboundOutcome::Discarded(DiscardReason::OutOfRange {
                            scene_index: update.scene_index,
                            line_index: update.line_index,
                        })
                    }
                }
            }
            SyncMessage::Announce(announce) => {
                let client_id = announce.header.origin;
                let new = presence.upsert(
                    client_id.clone(),
                    PresenceUpdate {
                        display_name: None,
                        role: ParticipantRole::Controller,
                        position: None,
                        capabilities: announce.capabilities,
                    },
                    clock.now(),
                );
                if new {
                    debug!(client_id = %client_id, "Controller online");
                }
                InboundOutcome::PresenceUpdated { client_id, new }
            }
            SyncMessage::Heartbeat(heartbeat) => {
                let client_id = heartbeat.header.origin;
                let new = presence.upsert(
                    client_id.clone(),
                    PresenceUpdate {
                        display_name: heartbeat.player_name,
                        role: ParticipantRole::Viewer,
                        position: heartbeat.position,
                        capabilities: Vec::new(),
                    },
                    clock.now(),
                );
                InboundOutcome::PresenceUpdated { client_id, new }
            }
        }
    }

    fn apply_command(
        &self,
        kind: CommandKind,
        origin: ChangeOrigin,
        correlation_id: Uuid,
        navigation: &mut NavigationController,
        clock: &dyn Clock,
    ) -> InboundOutcome {
        match kind {
            CommandKind::Pause => InboundOutcome::PlaybackPaused,
            CommandKind::Resume => InboundOutcome::PlaybackResumed,
            CommandKind::Reset => {
                let command = ResetSession {
                    correlation_id,
                    origin,
                };
                handle_reset_session(&command, navigation, clock);
                InboundOutcome::SessionReset
            }
            CommandKind::Disconnect { target } => {
                if target == self.identity.client_id {
                    let ChangeOrigin::Remote { client_id: by } = origin else {
                        return InboundOutcome::Discarded(DiscardReason::SelfEcho);
                    };
                    warn!(by = %by, "Disconnected by controller");
                    InboundOutcome::Evicted { by }
                } else {
                    debug!(target_device = %target, "Disconnect aimed at another participant");
                    InboundOutcome::Discarded(DiscardReason::NotForUs)
                }
            }
            CommandKind::StoryUpdate(value) => {
                let story = match import_story_value(value) {
                    Ok(story) => story,
                    Err(err) => {
                        warn!(error = %err, "Rejecting story update");
                        return InboundOutcome::StoryRejected(err);
                    }
                };
                let command = ReplaceStory {
                    correlation_id,
                    story,
                    origin,
                };
                match handle_replace_story(&command, navigation, clock) {
                    Ok(result) if result.outcome => InboundOutcome::StoryReplaced,
                    Ok(_) => InboundOutcome::Discarded(DiscardReason::DuplicateStory),
                    Err(err) => {
                        warn!(error = %err, "Rejecting story update");
                        InboundOutcome::StoryRejected(err)
                    }
                }
            }
        }
    }

    fn check_sequence(&mut self, origin: &ClientId, seq: Option<u64>) -> Option<DiscardReason> {
        if !self.sequence_guard {
            return None;
        }
        let seq = seq?;
        match self.last_seen.get(origin) {
            Some(&last_seen) if seq <= last_seen => Some(DiscardReason::Stale { seq, last_seen }),
            _ => {
                self.last_seen.insert(origin.clone(), seq);
                None
            }
        }
    }

    /// Role rules. Viewers act on everything. Controllers act only on other
    /// controllers' positions and content, and on presence.
    fn admits(&self, message: &SyncMessage) -> bool {
        match self.role {
            ParticipantRole::Viewer => true,
            ParticipantRole::Controller => match message {
                SyncMessage::Position(sync) => sync.action.is_controller_action(),
                SyncMessage::Command(command) => {
                    matches!(command.kind, CommandKind::StoryUpdate(_))
                }
                SyncMessage::Media(_) | SyncMessage::Announce(_) | SyncMessage::Heartbeat(_) => {
                    true
                }
            },
        }
    }

    /// Messages announcing a locally-originated event. Remote events produce
    /// nothing.
    pub fn outbound(
        &mut self,
        event: &NavigationEvent,
        navigation: &NavigationController,
        now_millis: i64,
    ) -> Vec<ChannelMessage> {
        if !event.is_local() {
            return Vec::new();
        }
        let controller = self.role.is_controller();

        match &event.kind {
            NavigationEventKind::PositionChanged(changed) => {
                let action = match (controller, changed.cause) {
                    (false, _) => SyncAction::DialogueStep,
                    (true, NavigationCause::Next) => SyncAction::OrchestratorNext,
                    (true, NavigationCause::Previous) => SyncAction::OrchestratorPrevious,
                    (true, NavigationCause::Jump | NavigationCause::RemoteSync) => {
                        SyncAction::OrchestratorSync
                    }
                };
                vec![self.state_message(
                    action,
                    changed.to,
                    changed.flat_position,
                    &changed.background,
                    now_millis,
                )]
            }
            NavigationEventKind::SessionReset(_) => {
                let background = navigation
                    .story()
                    .scene(0)
                    .map_or_else(String::new, |scene| scene.background.clone());
                if controller {
                    vec![
                        self.command_message(&CommandKind::Reset, now_millis),
                        self.state_message(
                            SyncAction::OrchestratorSync,
                            Position::START,
                            0,
                            &background,
                            now_millis,
                        ),
                    ]
                } else {
                    vec![self.state_message(
                        SyncAction::DialogueStep,
                        Position::START,
                        0,
                        &background,
                        now_millis,
                    )]
                }
            }
            NavigationEventKind::StoryReplaced(_) | NavigationEventKind::StoryEdited(_) => {
                if controller {
                    vec![self.story_update_message(navigation.story(), now_millis)]
                } else {
                    Vec::new()
                }
            }
            NavigationEventKind::MediaUpdated(updated) => {
                if controller {
                    vec![
                        self.media_message(
                            updated.scene_index,
                            updated.line_index,
                            updated.media.clone(),
                            now_millis,
                        ),
                        self.story_update_message(navigation.story(), now_millis),
                    ]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// The retained message re-broadcasting the current position.
    pub fn broadcast_position_message(
        &mut self,
        navigation: &NavigationController,
        now_millis: i64,
    ) -> ChannelMessage {
        let action = if self.role.is_controller() {
            SyncAction::OrchestratorSync
        } else {
            SyncAction::DialogueStep
        };
        self.state_message(
            action,
            navigation.position(),
            navigation.flat_position(),
            navigation.background(),
            now_millis,
        )
    }

    fn state_message(
        &mut self,
        action: SyncAction,
        position: Position,
        flat_position: usize,
        background: &str,
        now_millis: i64,
    ) -> ChannelMessage {
        let controller = self.role.is_controller();
        let payload = StoryStatePayload {
            position: i64::try_from(flat_position).ok(),
            scene_id: i64::try_from(position.scene_index).ok(),
            dialogue_index: i64::try_from(position.line_index).ok(),
            background: background.to_owned(),
            player: Some(self.identity.name.clone()),
            client_id: Some(self.identity.client_id.to_string()),
            orchestrator_id: controller.then(|| self.identity.client_id.to_string()),
            timestamp: now_millis,
            action: Some(action.as_str().to_owned()),
            seq: Some(self.take_seq()),
        };
        encode(self.topics.topic(TopicKind::StoryState), &payload, true)
    }

    /// A controller command. Only `story-update` is retained.
    pub fn command_message(&mut self, kind: &CommandKind, now_millis: i64) -> ChannelMessage {
        let (story_data, target_device) = match kind {
            CommandKind::StoryUpdate(value) => (Some(value.clone()), None),
            CommandKind::Disconnect { target } => (None, Some(target.to_string())),
            CommandKind::Pause | CommandKind::Resume | CommandKind::Reset => (None, None),
        };
        let payload = CommandPayload {
            command: kind.as_str().to_owned(),
            story_data,
            target_device,
            orchestrator_id: Some(self.identity.client_id.to_string()),
            client_id: None,
            timestamp: now_millis,
            seq: Some(self.take_seq()),
        };
        encode(
            self.topics.topic(TopicKind::Commands),
            &payload,
            kind.is_retained(),
        )
    }

    fn story_update_message(&mut self, story: &Story, now_millis: i64) -> ChannelMessage {
        // Story is plain data; conversion to a JSON value cannot fail.
        let value = serde_json::to_value(story).expect("story serialization is infallible");
        self.command_message(&CommandKind::StoryUpdate(value), now_millis)
    }

    fn media_message(
        &mut self,
        scene_index: usize,
        line_index: usize,
        media: Option<DialogueMedia>,
        now_millis: i64,
    ) -> ChannelMessage {
        let payload = MediaPayload {
            scene_id: i64::try_from(scene_index).ok(),
            dialogue_index: i64::try_from(line_index).ok(),
            media: media.unwrap_or_default(),
            action: Some(MEDIA_UPDATE_ACTION.to_owned()),
            orchestrator_id: Some(self.identity.client_id.to_string()),
            timestamp: now_millis,
            seq: Some(self.take_seq()),
        };
        encode(self.topics.topic(TopicKind::Media), &payload, false)
    }

    /// The retained controller announce.
    #[must_use]
    pub fn announce_message(&self, now_millis: i64) -> ChannelMessage {
        let payload = AnnouncePayload {
            kind: ANNOUNCE_TYPE.to_owned(),
            orchestrator_id: Some(self.identity.client_id.to_string()),
            timestamp: now_millis,
            capabilities: CONTROLLER_CAPABILITIES
                .iter()
                .map(|c| (*c).to_owned())
                .collect(),
        };
        encode(self.topics.topic(TopicKind::Announce), &payload, true)
    }

    /// The periodic liveness message: a heartbeat for viewers, an announce
    /// for controllers.
    #[must_use]
    pub fn heartbeat_message(
        &self,
        navigation: &NavigationController,
        now_millis: i64,
    ) -> ChannelMessage {
        if self.role.is_controller() {
            return self.announce_message(now_millis);
        }
        let position = navigation.position();
        let payload = HeartbeatPayload {
            client_id: Some(self.identity.client_id.to_string()),
            player_name: Some(self.identity.name.clone()),
            current_scene: Some(position.scene_index),
            current_dialogue: Some(position.line_index),
            timestamp: now_millis,
            kind: HEARTBEAT_TYPE.to_owned(),
        };
        encode(self.topics.topic(TopicKind::Heartbeat), &payload, false)
    }

    fn take_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}
