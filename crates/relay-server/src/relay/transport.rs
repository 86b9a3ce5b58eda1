//! WebRTC API construction and the peer-connection side of keyframe requests

use async_trait::async_trait;
use relay_media::{KeyframeRequester, RelayError};
use std::sync::Weak;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;

/// Shared API for every relay session: default codecs (VP8 among them) and
/// the default interceptors, which answer NACKs and send receiver reports.
pub fn build_api() -> anyhow::Result<API> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)?;

    Ok(APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .with_setting_engine(SettingEngine::default())
        .build())
}

/// PLI sender handed to track readers.
///
/// Holds the connection weakly: readers are spawned from the connection's own
/// track handler and must not keep it alive.
pub(crate) struct PeerKeyframes(pub(crate) Weak<RTCPeerConnection>);

#[async_trait]
impl KeyframeRequester for PeerKeyframes {
    async fn request_keyframe(&self, media_ssrc: u32) -> relay_media::error::Result<()> {
        match self.0.upgrade() {
            Some(pc) => pc.request_keyframe(media_ssrc).await,
            None => Err(RelayError::Keyframe(webrtc::Error::ErrConnectionClosed)),
        }
    }
}
