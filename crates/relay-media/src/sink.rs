//! Transport-facing seams of the relay

use crate::error::{RelayError, Result};
use async_trait::async_trait;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use webrtc::rtp::packet::Packet;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocalWriter;

/// Where rebased packets go
#[async_trait]
pub trait OutboundSink: Send + Sync {
    async fn send(&self, packet: &Packet) -> Result<()>;
}

/// Asks the remote encoder for a self-contained frame
#[async_trait]
pub trait KeyframeRequester: Send + Sync {
    async fn request_keyframe(&self, media_ssrc: u32) -> Result<()>;
}

#[async_trait]
impl OutboundSink for TrackLocalStaticRTP {
    async fn send(&self, packet: &Packet) -> Result<()> {
        self.write_rtp(packet).await.map(|_| ()).map_err(RelayError::Sink)
    }
}

#[async_trait]
impl KeyframeRequester for RTCPeerConnection {
    async fn request_keyframe(&self, media_ssrc: u32) -> Result<()> {
        self.write_rtcp(&[Box::new(PictureLossIndication {
            sender_ssrc: 0,
            media_ssrc,
        })])
        .await
        .map(|_| ())
        .map_err(RelayError::Keyframe)
    }
}
