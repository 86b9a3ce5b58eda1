use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Offers that may wait for the controller at once
const INBOX_CAPACITY: usize = 4;

#[derive(Error, Debug)]
pub enum SignalingError {
    #[error("no answer within {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Negotiation(String),

    #[error("session controller is not running")]
    Unavailable,
}

/// One pending offer, as seen by the session controller
pub struct OfferRequest {
    pub offer: RTCSessionDescription,
    reply: oneshot::Sender<Result<RTCSessionDescription, String>>,
}

impl OfferRequest {
    /// The caller stopped waiting (timed out or went away)
    pub fn is_abandoned(&self) -> bool {
        self.reply.is_closed()
    }

    /// Deliver the outcome. Returns `false` if the caller is gone.
    pub fn respond(self, result: Result<RTCSessionDescription, String>) -> bool {
        self.reply.send(result).is_ok()
    }
}

/// Caller side of the bridge
#[derive(Clone)]
pub struct SignalingBridge {
    tx: mpsc::Sender<OfferRequest>,
    timeout: Duration,
}

/// Controller side of the bridge
pub struct OfferInbox {
    rx: mpsc::Receiver<OfferRequest>,
}

pub fn signaling_channel(timeout: Duration) -> (SignalingBridge, OfferInbox) {
    let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
    (SignalingBridge { tx, timeout }, OfferInbox { rx })
}

impl SignalingBridge {
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Hand `offer` to the current or next session and wait for its answer.
    ///
    /// On timeout the request's reply channel is dropped; the controller sees
    /// the request as abandoned and never applies it to a session.
    pub async fn exchange(
        &self,
        offer: RTCSessionDescription,
    ) -> Result<RTCSessionDescription, SignalingError> {
        let (reply, answer_rx) = oneshot::channel();
        let request = OfferRequest { offer, reply };

        let exchange = async {
            self.tx
                .send(request)
                .await
                .map_err(|_| SignalingError::Unavailable)?;
            answer_rx
                .await
                .map_err(|_| SignalingError::Unavailable)?
                .map_err(SignalingError::Negotiation)
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "No answer before timeout");
                Err(SignalingError::Timeout(self.timeout))
            }
        }
    }
}

impl OfferInbox {
    /// Next offer whose caller is still waiting. `None` once every bridge is dropped.
    pub async fn recv(&mut self) -> Option<OfferRequest> {
        while let Some(request) = self.rx.recv().await {
            if request.is_abandoned() {
                tracing::debug!("Discarding offer abandoned by its caller");
                continue;
            }
            return Some(request);
        }
        None
    }
}
