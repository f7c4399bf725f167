//! Runs a participant on its own task.
//!
//! The task owns the participant outright. Everything that touches it (user
//! requests, inbound messages, heartbeat and sweep ticks, reconnect timers)
//! is serialized through one `tokio::select!` loop, so handlers run to
//! completion one at a time. Other tasks talk to it through a
//! [`ParticipantHandle`].

use std::sync::Arc;

use serde::Serialize;
use storylink_core::channel::{ChannelMessage, Subscription};
use storylink_core::error::DomainError;
use storylink_narrative::domain::edit::StoryEdit;
use storylink_narrative::domain::position::Position;
use storylink_narrative::domain::story::{DialogueMedia, Story};
use storylink_session::domain::aggregates::NavigationOutcome;
use storylink_session::domain::commands::JumpTarget;
use storylink_session::domain::identity::ClientId;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tracing::{debug, info, warn};

use super::participant::{Participant, ParticipantSnapshot};
use crate::config::Backoff;
use crate::ports::ConnectionStatus;

const REQUEST_BUFFER: usize = 32;

/// Something a user or the HTTP surface asks the participant to do.
#[derive(Debug, Clone)]
pub enum ParticipantRequest {
    /// Advance one line.
    Next,
    /// Go back one line.
    Previous,
    /// Jump to a line.
    Jump(JumpTarget),
    /// Return to the first line.
    Reset,
    /// Re-publish the current position.
    BroadcastPosition,
    /// Replace the story.
    ImportStory(Story),
    /// Apply an authoring edit.
    EditStory(StoryEdit),
    /// Replace one line's media.
    UpdateMedia {
        /// Scene containing the line.
        scene_index: usize,
        /// The line.
        line_index: usize,
        /// New media, or `None` to clear.
        media: Option<DialogueMedia>,
    },
    /// Pause playback everywhere this participant controls.
    PauseAll,
    /// Resume playback everywhere this participant controls.
    ResumeAll,
    /// Set local volume.
    SetVolume(f64),
    /// Disconnect another participant.
    DisconnectDevice(ClientId),
    /// Drop the connection and connect again now.
    Reconnect,
    /// Export the story as JSON.
    ExportStory,
}

/// What a request did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CommandOutcome {
    /// A navigation request ran.
    Navigated(NavigationOutcome),
    /// The session was reset.
    Reset {
        /// Position held before the reset.
        from: Position,
    },
    /// A story import ran; `replaced` is `false` when the story was already
    /// held.
    StoryImported {
        /// Whether anything changed.
        replaced: bool,
    },
    /// Volume applied.
    Volume {
        /// The clamped volume.
        volume: f64,
    },
    /// The exported story.
    Exported {
        /// Pretty-printed JSON.
        story: String,
    },
    /// The request succeeded with nothing further to report.
    Done,
}

struct Envelope {
    request: ParticipantRequest,
    reply: oneshot::Sender<Result<CommandOutcome, DomainError>>,
}

/// Cloneable handle to a running participant.
#[derive(Clone)]
pub struct ParticipantHandle {
    requests: mpsc::Sender<Envelope>,
    snapshots: watch::Receiver<Arc<ParticipantSnapshot>>,
}

impl ParticipantHandle {
    /// Sends a request and waits for its result.
    ///
    /// # Errors
    ///
    /// Returns the request's own error, or `DomainError::Unavailable` if the
    /// participant task has stopped.
    pub async fn send(&self, request: ParticipantRequest) -> Result<CommandOutcome, DomainError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Envelope { request, reply })
            .await
            .map_err(|_| stopped())?;
        response.await.map_err(|_| stopped())?
    }

    /// The latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ParticipantSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// A receiver notified on every snapshot change.
    #[must_use]
    pub fn subscribe_snapshots(&self) -> watch::Receiver<Arc<ParticipantSnapshot>> {
        self.snapshots.clone()
    }
}

fn stopped() -> DomainError {
    DomainError::Unavailable("participant has stopped".into())
}

/// Starts `participant` on a new task. It connects immediately and runs
/// until `shutdown` turns `true` (or its sender is dropped), or every handle
/// is dropped.
pub fn spawn(
    participant: Participant,
    shutdown: watch::Receiver<bool>,
) -> (ParticipantHandle, JoinHandle<()>) {
    let (requests_tx, requests_rx) = mpsc::channel(REQUEST_BUFFER);
    let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(participant.snapshot()));
    let task = tokio::spawn(run(participant, requests_rx, snapshot_tx, shutdown));
    (
        ParticipantHandle {
            requests: requests_tx,
            snapshots: snapshot_rx,
        },
        task,
    )
}

/// The subscription plus reconnect bookkeeping. At most one subscription is
/// ever held; reconnecting replaces it.
struct Connection {
    subscription: Option<Box<dyn Subscription>>,
    retry_at: Option<Instant>,
    backoff: Backoff,
}

impl Connection {
    async fn establish(&mut self, participant: &mut Participant) -> Result<(), DomainError> {
        self.subscription = None;
        self.retry_at = None;
        match participant.connect().await {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                self.backoff.reset();
                Ok(())
            }
            Err(err) => {
                self.settle(participant.status());
                Err(err)
            }
        }
    }

    fn schedule_retry(&mut self) {
        if self.retry_at.is_none() {
            let delay = self.backoff.next_delay();
            info!(delay_ms = delay.as_millis(), "Reconnect scheduled");
            self.retry_at = Some(Instant::now() + delay);
        }
    }

    /// Brings the subscription in line with the participant's status.
    fn settle(&mut self, status: ConnectionStatus) {
        match status {
            ConnectionStatus::Evicted => {
                if self.subscription.take().is_some() {
                    info!("Subscription dropped after eviction");
                }
                self.retry_at = None;
            }
            ConnectionStatus::Offline => {
                self.subscription = None;
                self.schedule_retry();
            }
            ConnectionStatus::Connecting | ConnectionStatus::Connected => {}
        }
    }
}

enum LoopEvent {
    Shutdown,
    Idle,
    Request(Envelope),
    Inbound(Option<ChannelMessage>),
    Retry,
    Heartbeat,
    Sweep,
}

async fn next_inbound(subscription: &mut Option<Box<dyn Subscription>>) -> Option<ChannelMessage> {
    match subscription {
        Some(subscription) => subscription.next_message().await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn run(
    mut participant: Participant,
    mut requests: mpsc::Receiver<Envelope>,
    snapshots: watch::Sender<Arc<ParticipantSnapshot>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let config = participant.config().clone();
    let mut connection = Connection {
        subscription: None,
        retry_at: Some(Instant::now()),
        backoff: config.backoff(),
    };
    let start = Instant::now();
    let mut heartbeat = interval_at(start + config.heartbeat_interval, config.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sweep = interval_at(
        start + config.presence_sweep_interval,
        config.presence_sweep_interval,
    );
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        client_id = %participant.identity().client_id,
        role = %participant.role(),
        "Participant started"
    );
    participant.render_current();

    loop {
        let event = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    LoopEvent::Shutdown
                } else {
                    LoopEvent::Idle
                }
            }
            request = requests.recv() => request.map_or(LoopEvent::Shutdown, LoopEvent::Request),
            message = next_inbound(&mut connection.subscription) => LoopEvent::Inbound(message),
            () = wait_until(connection.retry_at) => LoopEvent::Retry,
            _ = heartbeat.tick() => LoopEvent::Heartbeat,
            _ = sweep.tick() => LoopEvent::Sweep,
        };

        match event {
            LoopEvent::Shutdown => break,
            LoopEvent::Idle => continue,
            LoopEvent::Request(Envelope { request, reply }) => {
                let result = apply_request(&mut participant, &mut connection, request).await;
                connection.settle(participant.status());
                snapshots.send_replace(Arc::new(participant.snapshot()));
                if reply.send(result).is_err() {
                    debug!("Requester went away before the reply");
                }
                continue;
            }
            LoopEvent::Inbound(Some(message)) => {
                participant.handle_inbound(&message);
            }
            LoopEvent::Inbound(None) => {
                participant.connection_lost();
            }
            LoopEvent::Retry => {
                if let Err(err) = connection.establish(&mut participant).await {
                    warn!(error = %err, "Connect attempt failed");
                }
            }
            LoopEvent::Heartbeat => {
                if participant.status() == ConnectionStatus::Connected {
                    if let Err(err) = participant.publish_heartbeat().await {
                        debug!(error = %err, "Heartbeat not sent");
                    }
                }
            }
            LoopEvent::Sweep => {
                participant.sweep_presence();
            }
        }
        connection.settle(participant.status());
        snapshots.send_replace(Arc::new(participant.snapshot()));
    }

    info!(client_id = %participant.identity().client_id, "Participant stopped");
}

async fn apply_request(
    participant: &mut Participant,
    connection: &mut Connection,
    request: ParticipantRequest,
) -> Result<CommandOutcome, DomainError> {
    match request {
        ParticipantRequest::Next => Ok(CommandOutcome::Navigated(participant.next().await)),
        ParticipantRequest::Previous => Ok(CommandOutcome::Navigated(participant.previous().await)),
        ParticipantRequest::Jump(target) => {
            Ok(CommandOutcome::Navigated(participant.jump(target).await))
        }
        ParticipantRequest::Reset => Ok(CommandOutcome::Reset {
            from: participant.reset().await,
        }),
        ParticipantRequest::BroadcastPosition => participant
            .broadcast_position()
            .await
            .map(|()| CommandOutcome::Done),
        ParticipantRequest::ImportStory(story) => participant
            .import_story(story)
            .await
            .map(|replaced| CommandOutcome::StoryImported { replaced }),
        ParticipantRequest::EditStory(edit) => participant
            .edit_story(edit)
            .await
            .map(|()| CommandOutcome::Done),
        ParticipantRequest::UpdateMedia {
            scene_index,
            line_index,
            media,
        } => participant
            .update_media(scene_index, line_index, media)
            .await
            .map(|()| CommandOutcome::Done),
        ParticipantRequest::PauseAll => {
            participant.pause_all().await.map(|()| CommandOutcome::Done)
        }
        ParticipantRequest::ResumeAll => {
            participant.resume_all().await.map(|()| CommandOutcome::Done)
        }
        ParticipantRequest::SetVolume(fraction) => participant
            .set_volume(fraction)
            .map(|volume| CommandOutcome::Volume { volume }),
        ParticipantRequest::DisconnectDevice(target) => participant
            .disconnect_device(target)
            .await
            .map(|()| CommandOutcome::Done),
        ParticipantRequest::Reconnect => {
            info!("Manual reconnect requested");
            connection.backoff.reset();
            connection
                .establish(participant)
                .await
                .map(|()| CommandOutcome::Done)
        }
        ParticipantRequest::ExportStory => Ok(CommandOutcome::Exported {
            story: participant.export_story(),
        }),
    }
}
