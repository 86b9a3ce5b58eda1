//! Track classification and the per-session live-track registry

use crate::packet::{MediaPacket, SourceId};
use crate::selector::ActiveSourceSelector;
use relay_protocol::{SourceKind, TrackStatus};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use webrtc::rtp::packet::Packet;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;

const SECONDARY_LABELS: [&str; 2] = ["screen", "display"];
const PRIMARY_LABELS: [&str; 4] = ["video", "camera", "webcam", "cam"];

/// How far behind the last packet a timestamp may be and still count as a
/// late packet: one second of the 90 kHz video clock. Anything further back
/// is a clock restart.
const MAX_REORDER_SPAN: u32 = 90_000;

/// Assign a role to a newly announced track.
///
/// Labels (stream id, track id) are authoritative. When none of them is
/// recognised the arrival ordinal decides: the first track is primary, every
/// later one secondary.
pub fn classify(labels: &[&str], ordinal: usize) -> SourceKind {
    let lowered: Vec<String> = labels.iter().map(|l| l.to_ascii_lowercase()).collect();

    let matches_any = |needles: &[&str]| {
        lowered
            .iter()
            .any(|label| needles.iter().any(|needle| label.contains(needle)))
    };

    // Screen labels are checked first: "screen-video" is a screen share.
    if matches_any(&SECONDARY_LABELS) {
        SourceKind::Secondary
    } else if matches_any(&PRIMARY_LABELS) {
        SourceKind::Primary
    } else if ordinal == 0 {
        SourceKind::Primary
    } else {
        SourceKind::Secondary
    }
}

/// Per-reader view of one inbound track
#[derive(Debug, Clone)]
pub struct TrackState {
    kind: SourceKind,
    source: SourceId,
    ordinal: usize,
    media: RTPCodecType,
    ssrc: u32,
    last_raw_timestamp: Option<u32>,
    streaming: bool,
}

impl TrackState {
    pub fn new(
        kind: SourceKind,
        source: SourceId,
        ordinal: usize,
        media: RTPCodecType,
        ssrc: u32,
    ) -> Self {
        Self {
            kind,
            source,
            ordinal,
            media,
            ssrc,
            last_raw_timestamp: None,
            streaming: false,
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn is_video(&self) -> bool {
        self.media == RTPCodecType::Video
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub(crate) fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    /// Tag a freshly read packet with its timestamp delta.
    ///
    /// The first packet of a source has delta 0. A packet slightly older than
    /// the last one seen (reordering) also gets 0 and does not move the
    /// baseline, so the outbound timeline never runs backwards. A jump further
    /// back than `MAX_REORDER_SPAN` means the source restarted its clock: the
    /// baseline moves to the new timestamp, again with delta 0.
    pub fn wrap(&mut self, rtp: Packet) -> MediaPacket {
        let raw = rtp.header.timestamp;
        let delta = match self.last_raw_timestamp {
            None => {
                self.last_raw_timestamp = Some(raw);
                0
            }
            Some(previous) => {
                let delta = raw.wrapping_sub(previous);
                let behind = previous.wrapping_sub(raw);
                if (delta as i32) >= 0 {
                    self.last_raw_timestamp = Some(raw);
                    delta
                } else if behind <= MAX_REORDER_SPAN {
                    0
                } else {
                    tracing::debug!(
                        source = %self.source,
                        previous,
                        raw,
                        "Source clock jumped, re-baselining"
                    );
                    self.last_raw_timestamp = Some(raw);
                    0
                }
            }
        };

        MediaPacket {
            rtp,
            kind: self.kind,
            source: self.source,
            delta,
        }
    }
}

/// Where a registry publishes its [`TrackStatus`]
pub trait TrackStatusPublisher: Send + Sync {
    fn publish(&self, status: TrackStatus);
}

impl TrackStatusPublisher for watch::Sender<TrackStatus> {
    fn publish(&self, status: TrackStatus) {
        self.send_replace(status);
    }
}

#[derive(Debug, Clone)]
struct TrackEntry {
    source: SourceId,
    kind: SourceKind,
    live: bool,
}

#[derive(Debug, Default)]
struct RegistryInner {
    entries: Vec<TrackEntry>,
}

impl RegistryInner {
    fn latest_live(&self, kind: SourceKind) -> Option<SourceId> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.live && e.kind == kind)
            .map(|e| e.source)
    }

    fn status(&self) -> TrackStatus {
        TrackStatus {
            screen_in_use: self.latest_live(SourceKind::Secondary).is_some(),
            camera_in_use: self.latest_live(SourceKind::Primary).is_some(),
            track_count: self.entries.len(),
        }
    }
}

/// Live-track registry of one relay session.
///
/// Every registration and retirement updates the selector's in-use instance
/// for that kind and republishes [`TrackStatus`].
pub struct TrackRegistry {
    inner: RwLock<RegistryInner>,
    selector: Arc<ActiveSourceSelector>,
    status: Arc<dyn TrackStatusPublisher>,
}

impl TrackRegistry {
    pub fn new(selector: Arc<ActiveSourceSelector>, status: Arc<dyn TrackStatusPublisher>) -> Self {
        status.publish(TrackStatus::default());
        Self {
            inner: RwLock::new(RegistryInner::default()),
            selector,
            status,
        }
    }

    pub fn selector(&self) -> &Arc<ActiveSourceSelector> {
        &self.selector
    }

    /// Classify and register a newly announced track
    pub async fn register(&self, media: RTPCodecType, ssrc: u32, labels: &[&str]) -> TrackState {
        let mut inner = self.inner.write().await;

        let ordinal = inner.entries.len();
        let source = SourceId(ordinal as u64 + 1);
        let kind = classify(labels, ordinal);

        inner.entries.push(TrackEntry {
            source,
            kind,
            live: true,
        });
        self.selector.set_in_use(kind, Some(source));
        self.status.publish(inner.status());

        tracing::info!(
            source = %source,
            kind = %kind,
            ordinal,
            ssrc,
            labels = ?labels,
            "Track registered"
        );

        TrackState::new(kind, source, ordinal, media, ssrc)
    }

    /// Clear the liveness flag of `source`. Returns `false` if it was not live.
    pub async fn retire(&self, source: SourceId) -> bool {
        let mut inner = self.inner.write().await;

        let Some(entry) = inner
            .entries
            .iter_mut()
            .find(|e| e.source == source && e.live)
        else {
            return false;
        };
        entry.live = false;
        let kind = entry.kind;

        let replacement = inner.latest_live(kind);
        self.selector.set_in_use(kind, replacement);
        self.status.publish(inner.status());

        tracing::info!(
            source = %source,
            kind = %kind,
            replacement = ?replacement,
            "Track retired"
        );

        true
    }

    /// Most recently registered live instance of `kind`
    pub async fn in_use(&self, kind: SourceKind) -> Option<SourceId> {
        self.inner.read().await.latest_live(kind)
    }

    pub async fn live_kinds(&self) -> Vec<SourceKind> {
        let inner = self.inner.read().await;
        SourceKind::ALL
            .into_iter()
            .filter(|kind| inner.latest_live(*kind).is_some())
            .collect()
    }

    pub async fn status(&self) -> TrackStatus {
        self.inner.read().await.status()
    }
}
