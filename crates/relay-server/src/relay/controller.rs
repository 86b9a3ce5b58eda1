use super::session::RelaySession;
use super::status::StatusBoard;
use super::transport::build_api;
use crate::signaling::{OfferInbox, OfferRequest};
use crate::state::Config;
use relay_media::{LifecycleToken, SelectionPolicy};
use relay_protocol::SessionPhase;
use std::time::Duration;
use uuid::Uuid;
use webrtc::api::API;
use webrtc::ice_transport::ice_server::RTCIceServer;

/// Pause before retrying after a session could not be built
const REBUILD_BACKOFF: Duration = Duration::from_secs(1);

/// Everything a session needs from the configuration
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub ice_servers: Vec<RTCIceServer>,
    pub queue_capacity: usize,
    pub selection_policy: SelectionPolicy,
    pub negotiation_timeout: Duration,
}

impl RelaySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ice_servers: config.ice_servers(),
            queue_capacity: config.queue_capacity,
            selection_policy: config.selection_policy,
            negotiation_timeout: config.answer_timeout,
        }
    }
}

enum SessionEnd {
    /// The session is over; build the next one
    Rearm,
    /// Stop serving altogether
    Shutdown,
}

/// Runs relay sessions back to back, one at a time.
pub struct SessionController {
    api: API,
    settings: RelaySettings,
    inbox: OfferInbox,
    board: StatusBoard,
}

impl SessionController {
    pub fn new(settings: RelaySettings, inbox: OfferInbox, board: StatusBoard) -> anyhow::Result<Self> {
        Ok(Self {
            api: build_api()?,
            settings,
            inbox,
            board,
        })
    }

    /// Serve sessions until `shutdown` fires or every signaling bridge is gone
    pub async fn run(mut self, mut shutdown: LifecycleToken) {
        tracing::info!("Session controller started");

        while !shutdown.is_cancelled() {
            let id = Uuid::new_v4();
            self.board.begin_session(id).await;

            let session = match RelaySession::build(id, &self.api, &self.settings, &self.board).await {
                Ok(session) => session,
                Err(e) => {
                    tracing::error!(session = %id, "Failed to build relay session: {:?}", e);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(REBUILD_BACKOFF) => continue,
                    }
                }
            };

            let end = self.serve(&session, &mut shutdown).await;

            self.board.advance_phase(id, SessionPhase::Closing).await;
            session.teardown().await;
            self.board.advance_phase(id, SessionPhase::Terminated).await;

            if let SessionEnd::Shutdown = end {
                break;
            }
        }

        tracing::info!("Session controller stopped");
    }

    async fn serve(&mut self, session: &RelaySession, shutdown: &mut LifecycleToken) -> SessionEnd {
        let request = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return SessionEnd::Shutdown,
            request = self.inbox.recv() => match request {
                Some(request) => request,
                None => {
                    tracing::info!("Signaling closed, no further offers");
                    return SessionEnd::Shutdown;
                }
            },
        };

        if !self.answer(session, request).await {
            return SessionEnd::Rearm;
        }

        let mut ended = session.token();
        tokio::select! {
            _ = shutdown.cancelled() => SessionEnd::Shutdown,
            _ = ended.cancelled() => {
                tracing::info!(session = %session.id(), "Peer connection ended");
                SessionEnd::Rearm
            }
        }
    }

    /// Negotiate `request` on `session`. Returns `true` if the caller got an answer.
    async fn answer(&self, session: &RelaySession, request: OfferRequest) -> bool {
        let offer = request.offer.clone();
        let outcome = tokio::time::timeout(
            self.settings.negotiation_timeout,
            session.negotiate(offer),
        )
        .await;

        match outcome {
            Ok(Ok(answer)) => {
                if request.respond(Ok(answer)) {
                    tracing::info!(session = %session.id(), "Answer delivered");
                    true
                } else {
                    tracing::warn!(session = %session.id(), "Caller gave up before the answer was ready");
                    false
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(session = %session.id(), "Negotiation failed: {:?}", e);
                request.respond(Err(e.to_string()));
                false
            }
            Err(_) => {
                tracing::warn!(session = %session.id(), "Negotiation timed out");
                request.respond(Err(format!(
                    "negotiation did not finish within {:?}",
                    self.settings.negotiation_timeout
                )));
                false
            }
        }
    }
}
