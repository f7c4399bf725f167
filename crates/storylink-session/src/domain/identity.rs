//! Player identity, client ids and participant roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use storylink_core::error::DomainError;
use storylink_core::rng::DeterministicRng;

/// Name used when the player does not choose one.
pub const DEFAULT_PLAYER_NAME: &str = "Brave Veteran";

const CLIENT_ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Whether a participant renders the story or drives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    /// Renders the story; may broadcast its own navigation but defers to
    /// controllers.
    Viewer,
    /// Broadcasts authoritative position and content changes.
    Controller,
}

impl ParticipantRole {
    /// Prefix of every client id generated for this role.
    #[must_use]
    pub fn client_id_prefix(self) -> &'static str {
        match self {
            Self::Viewer => "viewer_",
            Self::Controller => "orchestrator_",
        }
    }

    /// Returns `true` for the controller role.
    #[must_use]
    pub fn is_controller(self) -> bool {
        self == Self::Controller
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Viewer => f.write_str("viewer"),
            Self::Controller => f.write_str("controller"),
        }
    }
}

impl FromStr for ParticipantRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(Self::Viewer),
            "controller" | "orchestrator" => Ok(Self::Controller),
            other => Err(DomainError::Validation(format!(
                "unknown participant role '{other}'"
            ))),
        }
    }
}

/// Opaque per-session participant identifier, used to tag message origins.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Wraps an existing identifier, e.g. one read off the wire.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh id: the role prefix followed by nine base-36
    /// characters.
    #[must_use]
    pub fn generate(role: ParticipantRole, rng: &mut dyn DeterministicRng) -> Self {
        let mut id = String::with_capacity(role.client_id_prefix().len() + CLIENT_ID_SUFFIX_LEN);
        id.push_str(role.client_id_prefix());
        for _ in 0..CLIENT_ID_SUFFIX_LEN {
            let index = rng.next_u32_range(0, 35).min(35) as usize;
            id.push(char::from(BASE36[index]));
        }
        Self(id)
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who the local participant is. Fixed for the life of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    /// Display name substituted into dialogue.
    pub name: String,
    /// Origin tag for every message this participant publishes.
    pub client_id: ClientId,
}

impl PlayerIdentity {
    /// Creates an identity. A blank name falls back to
    /// [`DEFAULT_PLAYER_NAME`].
    #[must_use]
    pub fn new(name: &str, client_id: ClientId) -> Self {
        let name = name.trim();
        Self {
            name: if name.is_empty() {
                DEFAULT_PLAYER_NAME.to_owned()
            } else {
                name.to_owned()
            },
            client_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storylink_test_support::{MockRng, SequenceRng};

    #[test]
    fn test_generate_uses_role_prefix_and_nine_base36_chars() {
        let mut rng = SequenceRng::new(vec![0, 9, 10, 35]);

        let viewer = ClientId::generate(ParticipantRole::Viewer, &mut rng);
        let controller = ClientId::generate(ParticipantRole::Controller, &mut MockRng);

        assert_eq!(viewer.as_str(), "viewer_09az09az0");
        assert_eq!(controller.as_str(), "orchestrator_000000000");
    }

    #[test]
    fn test_blank_player_name_falls_back_to_default() {
        let identity = PlayerIdentity::new("   ", ClientId::new("viewer_a"));

        assert_eq!(identity.name, DEFAULT_PLAYER_NAME);
        assert_eq!(
            PlayerIdentity::new(" Rex ", ClientId::new("viewer_a")).name,
            "Rex"
        );
    }

    #[test]
    fn test_role_parses_from_config_strings() {
        assert_eq!("viewer".parse(), Ok(ParticipantRole::Viewer));
        assert_eq!("Orchestrator".parse(), Ok(ParticipantRole::Controller));
        assert_eq!("controller".parse(), Ok(ParticipantRole::Controller));
        assert!("spectator".parse::<ParticipantRole>().is_err());
    }

    #[test]
    fn test_client_id_serializes_as_plain_string() {
        let id = ClientId::new("viewer_abc");

        assert_eq!(serde_json::to_value(&id).unwrap(), "viewer_abc");
    }
}
