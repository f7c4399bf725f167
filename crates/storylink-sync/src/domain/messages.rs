//! The wire contract.
//!
//! Payloads travel as JSON text. Each topic has a payload struct mirroring
//! its JSON shape; inbound payloads are decoded once, at the boundary, into
//! the tagged [`SyncMessage`] union that the reconciliation rules match on.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use storylink_core::channel::ChannelMessage;
use storylink_core::error::DomainError;
use storylink_narrative::domain::position::Position;
use storylink_narrative::domain::story::DialogueMedia;
use storylink_session::domain::commands::JumpTarget;
use storylink_session::domain::identity::ClientId;
use thiserror::Error;

use super::topics::{TopicKind, Topics};

/// `type` of an announce payload.
pub const ANNOUNCE_TYPE: &str = "orchestrator_online";

/// `type` of a heartbeat payload.
pub const HEARTBEAT_TYPE: &str = "client_heartbeat";

/// `action` of a media payload.
pub const MEDIA_UPDATE_ACTION: &str = "media-update";

/// Capabilities every controller announces.
pub const CONTROLLER_CAPABILITIES: [&str; 3] =
    ["story_control", "media_management", "device_management"];

/// `story/state` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryStatePayload {
    /// Flat position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    /// Zero-based scene index, or a one-based scene number when sent alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<i64>,
    /// Zero-based line index within the scene.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialogue_index: Option<i64>,
    /// Background of the sender's current scene.
    #[serde(default)]
    pub background: String,
    /// Sender's player name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
    /// Sender's client id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Sender's client id, as sent by controllers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator_id: Option<String>,
    /// Send time in epoch milliseconds. Advisory only.
    #[serde(default)]
    pub timestamp: i64,
    /// Action tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Per-sender sequence number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

/// `orchestrator/commands` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandPayload {
    /// Command tag.
    pub command: String,
    /// Full story for `story-update`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_data: Option<serde_json::Value>,
    /// Target of `disconnect`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_device: Option<String>,
    /// Sender's client id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator_id: Option<String>,
    /// Sender's client id, when sent by a viewer-style client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Send time in epoch milliseconds.
    #[serde(default)]
    pub timestamp: i64,
    /// Per-sender sequence number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

/// `orchestrator/media` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPayload {
    /// Zero-based scene index.
    #[serde(default)]
    pub scene_id: Option<i64>,
    /// Zero-based line index.
    #[serde(default)]
    pub dialogue_index: Option<i64>,
    /// The line's complete media.
    #[serde(default)]
    pub media: DialogueMedia,
    /// Always `media-update`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Sender's client id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator_id: Option<String>,
    /// Send time in epoch milliseconds.
    #[serde(default)]
    pub timestamp: i64,
    /// Per-sender sequence number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

/// `orchestrator/announce` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncePayload {
    /// Always `orchestrator_online`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Sender's client id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator_id: Option<String>,
    /// Send time in epoch milliseconds.
    #[serde(default)]
    pub timestamp: i64,
    /// Declared capabilities.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// `clients/heartbeat` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatPayload {
    /// Sender's client id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Sender's player name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
    /// Sender's scene index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_scene: Option<usize>,
    /// Sender's line index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_dialogue: Option<usize>,
    /// Send time in epoch milliseconds.
    #[serde(default)]
    pub timestamp: i64,
    /// Always `client_heartbeat`.
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Serializes `payload` into a channel message.
///
/// # Panics
///
/// Panics if `payload` cannot be serialized. The payload types above contain
/// only strings, integers, booleans and JSON values, which always serialize.
#[must_use]
pub fn encode<T: Serialize>(topic: String, payload: &T, retain: bool) -> ChannelMessage {
    let payload = serde_json::to_string(payload).expect("wire payload serialization is infallible");
    if retain {
        ChannelMessage::retained(topic, payload)
    } else {
        ChannelMessage::transient(topic, payload)
    }
}

/// Why an inbound payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The topic is not one of ours.
    #[error("unknown topic '{0}'")]
    UnknownTopic(String),

    /// The payload is not the expected JSON shape.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// No client id, orchestrator id or player name identifies the sender.
    #[error("message has no origin")]
    MissingOrigin,

    /// The action or command tag is not one we know.
    #[error("unrecognized action '{0}'")]
    UnrecognizedAction(String),

    /// A position message carries no position field at all.
    #[error("message has no position")]
    MissingPosition,

    /// A required field is absent.
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    /// A field has an impossible value.
    #[error("invalid field '{0}'")]
    InvalidField(&'static str),
}

impl From<DecodeError> for DomainError {
    fn from(err: DecodeError) -> Self {
        DomainError::MalformedMessage(err.to_string())
    }
}

/// Fields common to every decoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    /// Who sent it.
    pub origin: ClientId,
    /// Advisory send time, epoch milliseconds.
    pub timestamp: i64,
    /// Per-sender sequence number, if the sender supplies one.
    pub seq: Option<u64>,
}

/// Position-sync action tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// A viewer moved.
    DialogueStep,
    /// A controller pushed its current position.
    OrchestratorSync,
    /// A controller stepped forward.
    OrchestratorNext,
    /// A controller stepped back.
    OrchestratorPrevious,
}

impl SyncAction {
    /// The wire tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DialogueStep => "dialogue-step",
            Self::OrchestratorSync => "orchestrator-sync",
            Self::OrchestratorNext => "orchestrator-next",
            Self::OrchestratorPrevious => "orchestrator-previous",
        }
    }

    /// Parses a wire tag.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "dialogue-step" => Some(Self::DialogueStep),
            "orchestrator-sync" => Some(Self::OrchestratorSync),
            "orchestrator-next" => Some(Self::OrchestratorNext),
            "orchestrator-previous" => Some(Self::OrchestratorPrevious),
            _ => None,
        }
    }

    /// Returns `true` for actions only controllers send.
    #[must_use]
    pub fn is_controller_action(self) -> bool {
        !matches!(self, Self::DialogueStep)
    }
}

/// Where a position message points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionTarget {
    /// A flat position.
    Flat(i64),
    /// A zero-based scene/line pair.
    SceneLine {
        /// Scene index.
        scene_index: usize,
        /// Line index.
        line_index: usize,
    },
    /// A one-based scene number from older viewers; lands on line 0.
    LegacyScene(i64),
}

impl PositionTarget {
    /// Converts to a navigation jump target. Clamping against the local story
    /// happens in the navigation controller.
    #[must_use]
    pub fn to_jump_target(self) -> JumpTarget {
        match self {
            Self::Flat(flat) => JumpTarget::Flat(flat),
            Self::SceneLine {
                scene_index,
                line_index,
            } => JumpTarget::SceneLine {
                scene_index,
                line_index,
            },
            Self::LegacyScene(number) => JumpTarget::SceneLine {
                scene_index: non_negative(number.saturating_sub(1)),
                line_index: 0,
            },
        }
    }
}

/// A decoded `story/state` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionSync {
    /// Common fields.
    pub header: MessageHeader,
    /// The action tag.
    pub action: SyncAction,
    /// Where to go.
    pub target: PositionTarget,
    /// Sender's background.
    pub background: String,
    /// Sender's player name.
    pub player: Option<String>,
}

/// Controller command variants.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    /// Pause all playback.
    Pause,
    /// Resume all playback.
    Resume,
    /// Return to the first line and re-prompt for identity.
    Reset,
    /// Replace the story. The content is validated when applied.
    StoryUpdate(serde_json::Value),
    /// Disconnect one participant.
    Disconnect {
        /// The participant to disconnect.
        target: ClientId,
    },
}

impl CommandKind {
    /// The wire tag.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Reset => "reset",
            Self::StoryUpdate(_) => "story-update",
            Self::Disconnect { .. } => "disconnect",
        }
    }

    /// Whether the command is kept by the channel for late joiners.
    #[must_use]
    pub fn is_retained(&self) -> bool {
        matches!(self, Self::StoryUpdate(_))
    }
}

/// A decoded `orchestrator/commands` message.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerCommand {
    /// Common fields.
    pub header: MessageHeader,
    /// The command.
    pub kind: CommandKind,
}

/// A decoded `orchestrator/media` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUpdate {
    /// Common fields.
    pub header: MessageHeader,
    /// Addressed scene.
    pub scene_index: usize,
    /// Addressed line.
    pub line_index: usize,
    /// New media; `None` when the payload's media is empty.
    pub media: Option<DialogueMedia>,
}

/// A decoded `orchestrator/announce` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerAnnounce {
    /// Common fields.
    pub header: MessageHeader,
    /// Declared capabilities.
    pub capabilities: Vec<String>,
}

/// A decoded `clients/heartbeat` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHeartbeat {
    /// Common fields.
    pub header: MessageHeader,
    /// Sender's player name.
    pub player_name: Option<String>,
    /// Sender's position, when it reports both indices.
    pub position: Option<Position>,
}

/// Every message the protocol understands.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncMessage {
    /// Position sync.
    Position(PositionSync),
    /// Controller command.
    Command(ControllerCommand),
    /// Media update.
    Media(MediaUpdate),
    /// Controller presence.
    Announce(ControllerAnnounce),
    /// Viewer presence.
    Heartbeat(ClientHeartbeat),
}

impl SyncMessage {
    /// Decodes a channel message.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if the topic is foreign, the payload is not the
    /// topic's JSON shape, the sender cannot be identified or the action is
    /// not recognized.
    pub fn decode(topics: &Topics, message: &ChannelMessage) -> Result<Self, DecodeError> {
        let kind = topics
            .kind_of(&message.topic)
            .ok_or_else(|| DecodeError::UnknownTopic(message.topic.clone()))?;

        match kind {
            TopicKind::StoryState => decode_position(parse(&message.payload)?).map(Self::Position),
            TopicKind::Commands => decode_command(parse(&message.payload)?).map(Self::Command),
            TopicKind::Media => decode_media(parse(&message.payload)?).map(Self::Media),
            TopicKind::Announce => {
                let payload: AnnouncePayload = parse(&message.payload)?;
                Ok(Self::Announce(ControllerAnnounce {
                    header: header(payload.orchestrator_id, payload.timestamp, None)?,
                    capabilities: payload.capabilities,
                }))
            }
            TopicKind::Heartbeat => {
                let payload: HeartbeatPayload = parse(&message.payload)?;
                let position = payload
                    .current_scene
                    .zip(payload.current_dialogue)
                    .map(|(scene, line)| Position::new(scene, line));
                Ok(Self::Heartbeat(ClientHeartbeat {
                    header: header(payload.client_id, payload.timestamp, None)?,
                    player_name: payload.player_name,
                    position,
                }))
            }
        }
    }

    /// Common fields of any message.
    #[must_use]
    pub fn header(&self) -> &MessageHeader {
        match self {
            Self::Position(m) => &m.header,
            Self::Command(m) => &m.header,
            Self::Media(m) => &m.header,
            Self::Announce(m) => &m.header,
            Self::Heartbeat(m) => &m.header,
        }
    }

    /// Short name of the message kind, for logging.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Position(m) => m.action.as_str(),
            Self::Command(m) => m.kind.as_str(),
            Self::Media(_) => MEDIA_UPDATE_ACTION,
            Self::Announce(_) => ANNOUNCE_TYPE,
            Self::Heartbeat(_) => HEARTBEAT_TYPE,
        }
    }
}

fn parse<T: DeserializeOwned>(payload: &str) -> Result<T, DecodeError> {
    serde_json::from_str(payload).map_err(|e| DecodeError::InvalidPayload(e.to_string()))
}

fn header(
    origin: Option<String>,
    timestamp: i64,
    seq: Option<u64>,
) -> Result<MessageHeader, DecodeError> {
    let origin = origin
        .filter(|id| !id.trim().is_empty())
        .ok_or(DecodeError::MissingOrigin)?;
    Ok(MessageHeader {
        origin: ClientId::new(origin),
        timestamp,
        seq,
    })
}

fn non_negative(value: i64) -> usize {
    usize::try_from(value.max(0)).unwrap_or(usize::MAX)
}

fn decode_position(payload: StoryStatePayload) -> Result<PositionSync, DecodeError> {
    let target = match (payload.position, payload.scene_id, payload.dialogue_index) {
        (Some(flat), _, _) => PositionTarget::Flat(flat),
        (None, Some(scene), Some(line)) => PositionTarget::SceneLine {
            scene_index: non_negative(scene),
            line_index: non_negative(line),
        },
        (None, Some(number), None) => PositionTarget::LegacyScene(number),
        (None, None, _) => return Err(DecodeError::MissingPosition),
    };
    let action = match payload.action.as_deref() {
        None => SyncAction::DialogueStep,
        Some(tag) => {
            SyncAction::parse(tag).ok_or_else(|| DecodeError::UnrecognizedAction(tag.to_owned()))?
        }
    };
    let origin = payload
        .client_id
        .or(payload.orchestrator_id)
        .or_else(|| payload.player.clone());

    Ok(PositionSync {
        header: header(origin, payload.timestamp, payload.seq)?,
        action,
        target,
        background: payload.background,
        player: payload.player,
    })
}

fn decode_command(payload: CommandPayload) -> Result<ControllerCommand, DecodeError> {
    let kind = match payload.command.as_str() {
        "pause" => CommandKind::Pause,
        "resume" => CommandKind::Resume,
        "reset" => CommandKind::Reset,
        "story-update" => CommandKind::StoryUpdate(
            payload
                .story_data
                .ok_or(DecodeError::MissingField("storyData"))?,
        ),
        "disconnect" => CommandKind::Disconnect {
            target: ClientId::new(
                payload
                    .target_device
                    .ok_or(DecodeError::MissingField("targetDevice"))?,
            ),
        },
        other => return Err(DecodeError::UnrecognizedAction(other.to_owned())),
    };
    let origin = payload.orchestrator_id.or(payload.client_id);

    Ok(ControllerCommand {
        header: header(origin, payload.timestamp, payload.seq)?,
        kind,
    })
}

fn decode_media(payload: MediaPayload) -> Result<MediaUpdate, DecodeError> {
    if let Some(tag) = payload.action.as_deref() {
        if tag != MEDIA_UPDATE_ACTION {
            return Err(DecodeError::UnrecognizedAction(tag.to_owned()));
        }
    }
    let scene_index = payload
        .scene_id
        .ok_or(DecodeError::MissingField("sceneId"))
        .and_then(|v| usize::try_from(v).map_err(|_| DecodeError::InvalidField("sceneId")))?;
    let line_index = payload
        .dialogue_index
        .ok_or(DecodeError::MissingField("dialogueIndex"))
        .and_then(|v| usize::try_from(v).map_err(|_| DecodeError::InvalidField("dialogueIndex")))?;

    Ok(MediaUpdate {
        header: header(payload.orchestrator_id, payload.timestamp, payload.seq)?,
        scene_index,
        line_index,
        media: Some(payload.media).filter(|media| !media.is_empty()),
    })
}
