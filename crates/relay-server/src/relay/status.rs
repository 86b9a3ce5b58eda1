use chrono::{DateTime, Utc};
use relay_media::{ActiveSourceSelector, QueueCounters, TrackStatusPublisher};
use relay_protocol::{SessionPhase, SessionStatus, SourceKind, TrackStatus};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

#[derive(Default)]
struct CurrentSession {
    id: Option<Uuid>,
    phase: SessionPhase,
    started_at: Option<DateTime<Utc>>,
    sessions_served: u64,
    selector: Option<Arc<ActiveSourceSelector>>,
    counters: Vec<(SourceKind, Arc<QueueCounters>)>,
}

/// Track status tagged with the session that published it
#[derive(Default)]
struct SessionTracks {
    session: Option<Uuid>,
    status: TrackStatus,
}

/// Publisher handed to one session's registry. Writes from a session that is
/// no longer current are ignored.
struct SessionTrackPublisher {
    session: Uuid,
    tracks: Arc<watch::Sender<SessionTracks>>,
}

impl TrackStatusPublisher for SessionTrackPublisher {
    fn publish(&self, status: TrackStatus) {
        self.tracks.send_if_modified(|tracks| {
            if tracks.session != Some(self.session) {
                return false;
            }
            tracks.status = status;
            true
        });
    }
}

/// Read side of the controller's state, shared with the HTTP handlers
#[derive(Clone)]
pub struct StatusBoard {
    current: Arc<RwLock<CurrentSession>>,
    tracks: Arc<watch::Sender<SessionTracks>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tracks, _rx) = watch::channel(SessionTracks::default());
        Self {
            current: Arc::new(RwLock::new(CurrentSession::default())),
            tracks: Arc::new(tracks),
        }
    }

    pub fn track_status(&self) -> TrackStatus {
        self.tracks.borrow().status.clone()
    }

    pub(crate) fn track_publisher(&self, session: Uuid) -> Arc<dyn TrackStatusPublisher> {
        Arc::new(SessionTrackPublisher {
            session,
            tracks: self.tracks.clone(),
        })
    }

    pub async fn session_status(&self) -> SessionStatus {
        let current = self.current.read().await;
        SessionStatus {
            session_id: current.id,
            phase: current.phase,
            active_kind: current.selector.as_ref().and_then(|s| s.active()),
            started_at: current.started_at,
            sessions_served: current.sessions_served,
            queues: current
                .counters
                .iter()
                .map(|(kind, counters)| counters.snapshot(*kind))
                .collect(),
        }
    }

    pub(crate) async fn begin_session(&self, id: Uuid) {
        let mut current = self.current.write().await;
        current.id = Some(id);
        current.phase = SessionPhase::Negotiating;
        current.started_at = Some(Utc::now());
        current.selector = None;
        current.counters.clear();

        self.tracks.send_replace(SessionTracks {
            session: Some(id),
            status: TrackStatus::default(),
        });
    }

    pub(crate) async fn attach(
        &self,
        id: Uuid,
        selector: Arc<ActiveSourceSelector>,
        counters: Vec<(SourceKind, Arc<QueueCounters>)>,
    ) {
        let mut current = self.current.write().await;
        if current.id == Some(id) {
            current.selector = Some(selector);
            current.counters = counters;
        }
    }

    /// Move session `id` forward to `phase`. Ignored for a session that is no
    /// longer current, or when it would move the phase backwards.
    pub(crate) async fn advance_phase(&self, id: Uuid, phase: SessionPhase) -> bool {
        let mut current = self.current.write().await;
        if current.id != Some(id) || phase <= current.phase {
            return false;
        }

        tracing::info!(session = %id, from = %current.phase, to = %phase, "Session phase changed");
        current.phase = phase;
        if phase == SessionPhase::Terminated {
            current.sessions_served += 1;
        }
        true
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_phase_only_moves_forward_for_current_session() {
        let board = StatusBoard::new();
        let first = Uuid::new_v4();
        board.begin_session(first).await;

        assert!(board.advance_phase(first, SessionPhase::Active).await);
        assert!(!board.advance_phase(first, SessionPhase::Negotiating).await);
        assert!(board.advance_phase(first, SessionPhase::Terminated).await);
        assert!(!board.advance_phase(first, SessionPhase::Closing).await);

        let second = Uuid::new_v4();
        board.begin_session(second).await;
        // late callback from the first session
        assert!(!board.advance_phase(first, SessionPhase::Closing).await);

        let status = board.session_status().await;
        assert_eq!(status.session_id, Some(second));
        assert_eq!(status.phase, SessionPhase::Negotiating);
        assert_eq!(status.sessions_served, 1);
    }

    #[tokio::test]
    async fn test_track_status_from_previous_session_is_ignored() {
        let board = StatusBoard::new();
        let first = Uuid::new_v4();
        board.begin_session(first).await;
        let stale = board.track_publisher(first);

        let second = Uuid::new_v4();
        board.begin_session(second).await;
        let current = board.track_publisher(second);

        stale.publish(TrackStatus {
            screen_in_use: true,
            camera_in_use: true,
            track_count: 2,
        });
        assert_eq!(board.track_status(), TrackStatus::default());

        current.publish(TrackStatus {
            screen_in_use: false,
            camera_in_use: true,
            track_count: 1,
        });
        assert!(board.track_status().camera_in_use);
        assert_eq!(board.track_status().track_count, 1);
    }
}
