//! Session controller tests against a real WebRTC stack
//!
//! Run with: cargo test -p relay-server --test lifecycle

use relay_media::{Lifecycle, SelectionPolicy};
use relay_protocol::SessionPhase;
use relay_server::relay::{build_api, RelaySettings, SessionController, StatusBoard};
use relay_server::signaling::{signaling_channel, SignalingBridge, SignalingError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use webrtc::api::media_engine::MIME_TYPE_VP8;
use webrtc::api::API;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocal;

struct Relay {
    bridge: SignalingBridge,
    board: StatusBoard,
    shutdown: Lifecycle,
    controller: JoinHandle<()>,
}

impl Relay {
    fn start() -> Self {
        let settings = RelaySettings {
            ice_servers: vec![],
            queue_capacity: 60,
            selection_policy: SelectionPolicy::default(),
            negotiation_timeout: Duration::from_secs(5),
        };
        let (bridge, inbox) = signaling_channel(Duration::from_secs(10));
        let board = StatusBoard::new();
        let controller = SessionController::new(settings, inbox, board.clone())
            .expect("Failed to build WebRTC API");

        let shutdown = Lifecycle::new();
        let controller = tokio::spawn(controller.run(shutdown.token()));

        Self {
            bridge,
            board,
            shutdown,
            controller,
        }
    }

    async fn wait_for_sessions_served(&self, count: u64, limit: Duration) {
        tokio::time::timeout(limit, async {
            while self.board.session_status().await.sessions_served < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("controller did not finish the session in time");
    }

    async fn wait_for_phase(&self, phase: SessionPhase, limit: Duration) {
        tokio::time::timeout(limit, async {
            while self.board.session_status().await.phase != phase {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("session did not reach the expected phase in time");
    }

    async fn stop(self) {
        self.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(10), self.controller)
            .await
            .expect("controller did not stop")
            .unwrap();
    }
}

fn description(kind: &str, sdp: &str) -> RTCSessionDescription {
    serde_json::from_value(serde_json::json!({"type": kind, "sdp": sdp})).unwrap()
}

/// A peer sending one VP8 camera track, with its complete offer
async fn offering_peer(api: &API) -> (Arc<RTCPeerConnection>, RTCSessionDescription) {
    let peer = Arc::new(
        api.new_peer_connection(RTCConfiguration::default())
            .await
            .unwrap(),
    );
    let camera = Arc::new(TrackLocalStaticRTP::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_VP8.to_owned(),
            ..Default::default()
        },
        "camera".to_owned(),
        "webcam".to_owned(),
    ));
    peer.add_track(camera as Arc<dyn TrackLocal + Send + Sync>)
        .await
        .unwrap();

    let offer = peer.create_offer(None).await.unwrap();
    let mut gather_complete = peer.gathering_complete_promise().await;
    peer.set_local_description(offer).await.unwrap();
    let _ = gather_complete.recv().await;
    let offer = peer.local_description().await.unwrap();

    (peer, offer)
}

#[tokio::test]
async fn test_failed_negotiation_rearms_the_controller() {
    let relay = Relay::start();

    let first = relay.bridge.exchange(description("offer", "not an sdp")).await;
    assert!(matches!(first, Err(SignalingError::Negotiation(_))));
    relay.wait_for_sessions_served(1, Duration::from_secs(5)).await;

    let second = relay.bridge.exchange(description("offer", "still not an sdp")).await;
    assert!(matches!(second, Err(SignalingError::Negotiation(_))));
    relay.wait_for_sessions_served(2, Duration::from_secs(5)).await;

    let status = relay.board.session_status().await;
    assert_eq!(status.queues.len(), 2);

    relay.stop().await;
}

#[tokio::test]
async fn test_offer_from_real_peer_is_answered() {
    let relay = Relay::start();

    let api = build_api().unwrap();
    let (offerer, offer) = offering_peer(&api).await;

    let answer = relay.bridge.exchange(offer).await.unwrap();
    assert_eq!(answer.sdp_type, RTCSdpType::Answer);
    assert!(answer.sdp.contains("m=video"));
    assert!(answer.sdp.contains("VP8"));

    offerer.set_remote_description(answer).await.unwrap();

    let status = relay.board.session_status().await;
    assert!(status.session_id.is_some());
    assert_eq!(status.sessions_served, 0);

    offerer.close().await.unwrap();
    relay.stop().await;
}

#[tokio::test]
async fn test_closed_peer_connection_rearms_the_controller() {
    let relay = Relay::start();
    let api = build_api().unwrap();

    let (first_peer, offer) = offering_peer(&api).await;
    let answer = relay.bridge.exchange(offer).await.unwrap();
    first_peer.set_remote_description(answer).await.unwrap();

    relay
        .wait_for_phase(SessionPhase::Active, Duration::from_secs(20))
        .await;
    let first_session = relay.board.session_status().await.session_id;
    assert!(first_session.is_some());

    // The relay only learns the peer is gone once ICE gives up on it
    first_peer.close().await.unwrap();
    relay
        .wait_for_sessions_served(1, Duration::from_secs(60))
        .await;

    let (second_peer, offer) = offering_peer(&api).await;
    let answer = relay.bridge.exchange(offer).await.unwrap();
    assert_eq!(answer.sdp_type, RTCSdpType::Answer);

    let status = relay.board.session_status().await;
    assert_ne!(status.session_id, first_session);
    assert_eq!(status.sessions_served, 1);

    second_peer.close().await.unwrap();
    relay.stop().await;
}
