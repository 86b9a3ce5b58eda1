//! Inbound track reader
//!
//! One reader task per inbound track: read a packet, compute its delta, ask the
//! selector whether it is admitted, and offer it to the queue of its kind.
//! Reading never stops because a queue is full, so the transport is never
//! back-pressured by a slow outbound side.

use crate::error::{RelayError, Result};
use crate::lifecycle::LifecycleToken;
use crate::queue::QueueProducer;
use crate::registry::{TrackRegistry, TrackState};
use crate::selector::Admission;
use crate::sink::KeyframeRequester;
use async_trait::async_trait;
use std::sync::Arc;
use webrtc::rtp::packet::Packet;
use webrtc::track::track_remote::TrackRemote;

/// A readable stream of inbound RTP packets
#[async_trait]
pub trait RtpSource: Send + Sync {
    async fn next_packet(&self) -> Result<Packet>;
}

#[async_trait]
impl RtpSource for TrackRemote {
    async fn next_packet(&self) -> Result<Packet> {
        self.read_rtp()
            .await
            .map(|(packet, _attributes)| packet)
            .map_err(RelayError::Source)
    }
}

pub struct TrackReader {
    state: TrackState,
    registry: Arc<TrackRegistry>,
    producer: QueueProducer,
    keyframes: Arc<dyn KeyframeRequester>,
    packets_read: u64,
}

impl TrackReader {
    /// `producer` must be the queue of `state.kind()`
    pub fn new(
        state: TrackState,
        registry: Arc<TrackRegistry>,
        producer: QueueProducer,
        keyframes: Arc<dyn KeyframeRequester>,
    ) -> Self {
        debug_assert_eq!(state.kind(), producer.kind());
        Self {
            state,
            registry,
            producer,
            keyframes,
            packets_read: 0,
        }
    }

    pub fn state(&self) -> &TrackState {
        &self.state
    }

    /// Push one inbound packet through selection into the queue
    pub async fn ingest(&mut self, rtp: Packet) -> Admission {
        self.packets_read += 1;
        let packet = self.state.wrap(rtp);
        let admission = self.registry.selector().admit(&mut self.state);

        match admission {
            Admission::Drop => return admission,
            Admission::Resume => {
                tracing::info!(
                    source = %self.state.source(),
                    kind = %self.state.kind(),
                    "Source resumed streaming"
                );
                if self.state.is_video() {
                    match self.keyframes.request_keyframe(self.state.ssrc()).await {
                        Ok(()) => tracing::debug!(ssrc = self.state.ssrc(), "Requested key frame"),
                        Err(e) => tracing::warn!(ssrc = self.state.ssrc(), "Failed to send PLI: {}", e),
                    }
                }
            }
            Admission::Forward => {}
        }

        self.producer.enqueue(packet);
        admission
    }

    /// Read until the source fails or the session is cancelled, then retire
    /// the track from the registry.
    pub async fn run<S>(mut self, source: Arc<S>, mut token: LifecycleToken)
    where
        S: RtpSource + ?Sized,
    {
        tracing::info!(
            source = %self.state.source(),
            kind = %self.state.kind(),
            ssrc = self.state.ssrc(),
            "Starting track reader"
        );

        loop {
            let next = tokio::select! {
                _ = token.cancelled() => break,
                next = source.next_packet() => next,
            };

            match next {
                Ok(rtp) => {
                    self.ingest(rtp).await;
                }
                Err(e) => {
                    tracing::info!(
                        source = %self.state.source(),
                        packets = self.packets_read,
                        "Track reader ended: {}",
                        e
                    );
                    break;
                }
            }
        }

        self.registry.retire(self.state.source()).await;
    }
}
