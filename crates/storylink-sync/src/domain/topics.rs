//! Topic names.

/// Which kind of traffic a topic carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    /// `story/state`: position sync.
    StoryState,
    /// `orchestrator/commands`: controller commands.
    Commands,
    /// `orchestrator/media`: media updates.
    Media,
    /// `orchestrator/announce`: controller presence.
    Announce,
    /// `clients/heartbeat`: viewer presence.
    Heartbeat,
}

impl TopicKind {
    /// Subscription order. Content arrives before position when retained
    /// messages are replayed to a late joiner.
    pub const SUBSCRIPTION_ORDER: [Self; 5] = [
        Self::Commands,
        Self::Media,
        Self::Announce,
        Self::Heartbeat,
        Self::StoryState,
    ];

    fn suffix(self) -> &'static str {
        match self {
            Self::StoryState => "story/state",
            Self::Commands => "orchestrator/commands",
            Self::Media => "orchestrator/media",
            Self::Announce => "orchestrator/announce",
            Self::Heartbeat => "clients/heartbeat",
        }
    }
}

/// Full topic names under one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    prefix: String,
}

impl Topics {
    /// Creates the topic set for `prefix` (e.g. `nerfwar`).
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_owned(),
        }
    }

    /// Full name of the topic for `kind`.
    #[must_use]
    pub fn topic(&self, kind: TopicKind) -> String {
        format!("{}/{}", self.prefix, kind.suffix())
    }

    /// Filters to subscribe with, in [`TopicKind::SUBSCRIPTION_ORDER`].
    #[must_use]
    pub fn subscription_filters(&self) -> Vec<String> {
        TopicKind::SUBSCRIPTION_ORDER
            .iter()
            .map(|kind| self.topic(*kind))
            .collect()
    }

    /// Classifies a full topic name.
    #[must_use]
    pub fn kind_of(&self, topic: &str) -> Option<TopicKind> {
        let suffix = topic.strip_prefix(&self.prefix)?.strip_prefix('/')?;
        TopicKind::SUBSCRIPTION_ORDER
            .into_iter()
            .find(|kind| kind.suffix() == suffix)
    }
}
