use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("outbound write failed: {0}")]
    Sink(#[source] webrtc::Error),

    #[error("key frame request failed: {0}")]
    Keyframe(#[source] webrtc::Error),

    #[error("inbound read failed: {0}")]
    Source(#[source] webrtc::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
