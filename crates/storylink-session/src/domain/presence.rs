//! Liveness tracking of other participants.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use storylink_narrative::domain::position::Position;

use super::identity::{ClientId, ParticipantRole};

/// What a heartbeat or announce tells us about a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceUpdate {
    /// The participant's player name, if it sent one.
    pub display_name: Option<String>,
    /// The participant's role.
    pub role: ParticipantRole,
    /// Where the participant reports being in the story.
    pub position: Option<Position>,
    /// Declared capabilities (controllers only).
    pub capabilities: Vec<String>,
}

/// One known participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceRecord {
    /// The participant.
    pub client_id: ClientId,
    /// Its player name, if known.
    pub display_name: Option<String>,
    /// Its role.
    pub role: ParticipantRole,
    /// Its last reported position.
    pub position: Option<Position>,
    /// Its declared capabilities.
    pub capabilities: Vec<String>,
    /// When it was last heard from.
    pub last_seen: DateTime<Utc>,
}

/// The live set of other participants, keyed by client id.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    records: BTreeMap<ClientId, PresenceRecord>,
}

impl PresenceTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or refreshes a record. Returns `true` if the participant was
    /// not known before.
    pub fn upsert(
        &mut self,
        client_id: ClientId,
        update: PresenceUpdate,
        now: DateTime<Utc>,
    ) -> bool {
        let record = PresenceRecord {
            client_id: client_id.clone(),
            display_name: update.display_name,
            role: update.role,
            position: update.position,
            capabilities: update.capabilities,
            last_seen: now,
        };
        self.records.insert(client_id, record).is_none()
    }

    /// Removes every record last seen more than `timeout` before `now` and
    /// returns the removed ids.
    pub fn expire(&mut self, now: DateTime<Utc>, timeout: Duration) -> Vec<ClientId> {
        let expired: Vec<ClientId> = self
            .records
            .values()
            .filter(|record| now - record.last_seen > timeout)
            .map(|record| record.client_id.clone())
            .collect();
        for client_id in &expired {
            self.records.remove(client_id);
        }
        expired
    }

    /// Removes one participant, e.g. after it was disconnected.
    pub fn remove(&mut self, client_id: &ClientId) -> Option<PresenceRecord> {
        self.records.remove(client_id)
    }

    /// The live set, ordered by client id.
    #[must_use]
    pub fn list(&self) -> Vec<PresenceRecord> {
        self.records.values().cloned().collect()
    }

    /// Looks up one participant.
    #[must_use]
    pub fn get(&self, client_id: &ClientId) -> Option<&PresenceRecord> {
        self.records.get(client_id)
    }

    /// Number of live participants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when nobody else is online.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn viewer_update(position: Position) -> PresenceUpdate {
        PresenceUpdate {
            display_name: Some("Rex".into()),
            role: ParticipantRole::Viewer,
            position: Some(position),
            capabilities: vec![],
        }
    }

    #[test]
    fn test_heartbeat_then_sweep_after_timeout_removes_participant() {
        // Arrange
        let t0 = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let timeout = Duration::milliseconds(60_000);
        let mut tracker = PresenceTracker::new();
        tracker.upsert(ClientId::new("A"), viewer_update(Position::START), t0);

        // Act
        let expired = tracker.expire(t0 + timeout + Duration::milliseconds(1), timeout);

        // Assert
        assert_eq!(expired, vec![ClientId::new("A")]);
        assert!(tracker.list().is_empty());
    }

    #[test]
    fn test_record_exactly_at_timeout_survives() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let timeout = Duration::milliseconds(60_000);
        let mut tracker = PresenceTracker::new();
        tracker.upsert(ClientId::new("A"), viewer_update(Position::START), t0);

        let expired = tracker.expire(t0 + timeout, timeout);

        assert!(expired.is_empty());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_upsert_refreshes_existing_record() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let t1 = t0 + Duration::seconds(30);
        let mut tracker = PresenceTracker::new();

        let first = tracker.upsert(ClientId::new("A"), viewer_update(Position::START), t0);
        let second = tracker.upsert(ClientId::new("A"), viewer_update(Position::new(1, 2)), t1);

        assert!(first);
        assert!(!second);
        let record = tracker.get(&ClientId::new("A")).unwrap();
        assert_eq!(record.last_seen, t1);
        assert_eq!(record.position, Some(Position::new(1, 2)));
    }

    #[test]
    fn test_list_is_ordered_by_client_id() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let mut tracker = PresenceTracker::new();
        tracker.upsert(
            ClientId::new("viewer_b"),
            viewer_update(Position::START),
            t0,
        );
        tracker.upsert(
            ClientId::new("viewer_a"),
            viewer_update(Position::START),
            t0,
        );

        let ids: Vec<String> = tracker
            .list()
            .into_iter()
            .map(|r| r.client_id.to_string())
            .collect();

        assert_eq!(ids, vec!["viewer_a", "viewer_b"]);
    }
}
