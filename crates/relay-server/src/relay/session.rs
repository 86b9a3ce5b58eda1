use super::controller::RelaySettings;
use super::status::StatusBoard;
use super::transport::PeerKeyframes;
use anyhow::{anyhow, Result};
use relay_media::{
    packet_queue, ActiveSourceSelector, KeyframeRequester, Lifecycle, LifecycleToken,
    OutboundSink, QueueCounters, QueueProducer, Rebaser, SourceKind, TrackReader, TrackRegistry,
};
use relay_protocol::SessionPhase;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;
use webrtc::api::media_engine::MIME_TYPE_VP8;
use webrtc::api::API;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// How long teardown waits for each session task before aborting it
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Outbound track ids per kind: (track id, stream id)
fn outbound_ids(kind: SourceKind) -> (&'static str, &'static str) {
    match kind {
        SourceKind::Primary => ("video", "relay-video"),
        SourceKind::Secondary => ("screen", "relay-screen"),
    }
}

type TaskList = Arc<Mutex<Vec<JoinHandle<()>>>>;

/// One peer connection and every task relaying for it
pub struct RelaySession {
    id: Uuid,
    pc: Arc<RTCPeerConnection>,
    lifecycle: Arc<Lifecycle>,
    registry: Arc<TrackRegistry>,
    tasks: TaskList,
}

impl RelaySession {
    /// Create the peer connection, both outbound tracks and their rebasers,
    /// and register the track and connection-state handlers.
    pub async fn build(
        id: Uuid,
        api: &API,
        settings: &RelaySettings,
        board: &StatusBoard,
    ) -> Result<Self> {
        let config = RTCConfiguration {
            ice_servers: settings.ice_servers.clone(),
            ..Default::default()
        };
        let pc = Arc::new(api.new_peer_connection(config).await?);

        let selector = Arc::new(ActiveSourceSelector::new(settings.selection_policy));
        let registry = Arc::new(TrackRegistry::new(selector, board.track_publisher(id)));

        let session = Self {
            id,
            pc,
            lifecycle: Arc::new(Lifecycle::new()),
            registry,
            tasks: Arc::new(Mutex::new(Vec::new())),
        };

        if let Err(e) = session.wire(settings, board).await {
            session.teardown().await;
            return Err(e);
        }

        tracing::info!(session = %id, "Relay session ready for an offer");
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn registry(&self) -> &Arc<TrackRegistry> {
        &self.registry
    }

    pub fn token(&self) -> LifecycleToken {
        self.lifecycle.token()
    }

    async fn wire(&self, settings: &RelaySettings, board: &StatusBoard) -> Result<()> {
        let mut producers = Vec::with_capacity(SourceKind::ALL.len());
        let mut counters: Vec<(SourceKind, Arc<QueueCounters>)> = Vec::new();

        for kind in SourceKind::ALL {
            let (track_id, stream_id) = outbound_ids(kind);
            let track = Arc::new(TrackLocalStaticRTP::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_VP8.to_owned(),
                    ..Default::default()
                },
                track_id.to_owned(),
                stream_id.to_owned(),
            ));

            let sender = self
                .pc
                .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
                .await?;
            self.spawn(drain_rtcp(sender, self.token())).await;

            let (producer, consumer) = packet_queue(kind, settings.queue_capacity);
            counters.push((kind, Arc::clone(producer.counters())));
            producers.push(producer);

            let rebaser = Rebaser::new(consumer, track as Arc<dyn OutboundSink>);
            let token = self.token();
            self.spawn(async move {
                let timeline = rebaser.run(token).await;
                tracing::debug!(
                    kind = %kind,
                    timestamp = timeline.timestamp(),
                    next_sequence = timeline.next_sequence(),
                    "Outbound timeline closed"
                );
            })
            .await;
        }

        let selector = Arc::clone(self.registry.selector());
        let token = self.token();
        let rotation = Arc::clone(&selector);
        self.spawn(async move { rotation.run_rotation(token).await }).await;

        board.attach(self.id, selector, counters).await;

        self.on_track(producers);
        self.on_connection_state(board.clone());
        Ok(())
    }

    fn on_track(&self, producers: Vec<QueueProducer>) {
        let registry = Arc::clone(&self.registry);
        let tasks = Arc::clone(&self.tasks);
        let token = self.token();
        let keyframes: Arc<dyn KeyframeRequester> =
            Arc::new(PeerKeyframes(Arc::downgrade(&self.pc)));

        self.pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let registry = Arc::clone(&registry);
            let tasks = Arc::clone(&tasks);
            let token = token.clone();
            let keyframes = Arc::clone(&keyframes);
            let producers = producers.clone();

            Box::pin(async move {
                if token.is_cancelled() {
                    return;
                }

                let handle = if track.kind() == RTPCodecType::Video {
                    let stream_id = track.stream_id();
                    let track_id = track.id();
                    let state = registry
                        .register(track.kind(), track.ssrc(), &[stream_id.as_str(), track_id.as_str()])
                        .await;
                    let producer = producers[state.kind().index()].clone();
                    let reader = TrackReader::new(state, registry, producer, keyframes);
                    tokio::spawn(reader.run(track, token))
                } else {
                    tracing::info!(
                        ssrc = track.ssrc(),
                        kind = %track.kind(),
                        "Draining inbound track that is not relayed"
                    );
                    tokio::spawn(drain_track(track, token))
                };

                tasks.lock().await.push(handle);
            })
        }));
    }

    fn on_connection_state(&self, board: StatusBoard) {
        let id = self.id;
        let lifecycle = Arc::clone(&self.lifecycle);

        self.pc
            .on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
                let board = board.clone();
                let lifecycle = Arc::clone(&lifecycle);

                Box::pin(async move {
                    tracing::info!(session = %id, "Peer connection state: {}", state);
                    match state {
                        RTCPeerConnectionState::Connected => {
                            board.advance_phase(id, SessionPhase::Active).await;
                        }
                        RTCPeerConnectionState::Failed | RTCPeerConnectionState::Closed => {
                            board.advance_phase(id, SessionPhase::Closing).await;
                            lifecycle.cancel();
                        }
                        _ => {}
                    }
                })
            }));
    }

    async fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.tasks.lock().await.push(tokio::spawn(task));
    }

    /// Apply `offer` and return the answer once ICE gathering is complete, so
    /// the answer carries every local candidate.
    pub async fn negotiate(&self, offer: RTCSessionDescription) -> Result<RTCSessionDescription> {
        self.pc.set_remote_description(offer).await?;

        let answer = self.pc.create_answer(None).await?;
        let mut gather_complete = self.pc.gathering_complete_promise().await;
        self.pc.set_local_description(answer).await?;
        let _ = gather_complete.recv().await;

        self.pc
            .local_description()
            .await
            .ok_or_else(|| anyhow!("local description missing after ICE gathering"))
    }

    /// Cancel every task, close the connection and wait for the tasks to exit
    pub async fn teardown(&self) {
        self.lifecycle.cancel();

        if let Err(e) = self.pc.close().await {
            tracing::warn!(session = %self.id, "Error closing peer connection: {}", e);
        }

        let handles: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        let count = handles.len();
        for mut handle in handles {
            if tokio::time::timeout(TASK_JOIN_TIMEOUT, &mut handle).await.is_err() {
                tracing::warn!(session = %self.id, "Session task did not stop in time, aborting");
                handle.abort();
            }
        }

        tracing::info!(session = %self.id, tasks = count, "Relay session torn down");
    }
}

/// Read and discard RTCP for an outbound track so its interceptors keep running
async fn drain_rtcp(sender: Arc<RTCRtpSender>, mut token: LifecycleToken) {
    let mut buf = vec![0u8; 1500];
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            result = sender.read(&mut buf) => {
                if result.is_err() {
                    break;
                }
            }
        }
    }
}

async fn drain_track(track: Arc<TrackRemote>, mut token: LifecycleToken) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            result = track.read_rtp() => {
                if result.is_err() {
                    break;
                }
            }
        }
    }
}
