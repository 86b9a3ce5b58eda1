use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Role of an inbound source. Each role owns one outbound track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Camera feed
    Primary,
    /// Screen share
    Secondary,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::Primary, SourceKind::Secondary];

    /// Position of this kind in [`SourceKind::ALL`]
    pub fn index(self) -> usize {
        match self {
            SourceKind::Primary => 0,
            SourceKind::Secondary => 1,
        }
    }

    /// The kind after this one in rotation order
    pub fn next(self) -> SourceKind {
        match self {
            SourceKind::Primary => SourceKind::Secondary,
            SourceKind::Secondary => SourceKind::Primary,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Primary => write!(f, "primary"),
            SourceKind::Secondary => write!(f, "secondary"),
        }
    }
}

/// Response body of `GET /track-status`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackStatus {
    pub screen_in_use: bool,
    pub camera_in_use: bool,
    pub track_count: usize,
}

/// Lifecycle phase of the current relay session, in the order they occur
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Negotiating,
    Active,
    Closing,
    Terminated,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Negotiating => "negotiating",
            SessionPhase::Active => "active",
            SessionPhase::Closing => "closing",
            SessionPhase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Packet counters of one output kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub kind: SourceKind,
    pub enqueued: u64,
    pub dropped: u64,
    pub emitted: u64,
    pub write_failures: u64,
}

/// Response body of `GET /session`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: Option<Uuid>,
    pub phase: SessionPhase,
    pub active_kind: Option<SourceKind>,
    pub started_at: Option<DateTime<Utc>>,
    pub sessions_served: u64,
    pub queues: Vec<QueueStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_status_uses_camel_case() {
        let status = TrackStatus {
            screen_in_use: true,
            camera_in_use: false,
            track_count: 2,
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"screenInUse": true, "cameraInUse": false, "trackCount": 2})
        );
    }

    #[test]
    fn test_source_kind_rotation_order() {
        assert_eq!(SourceKind::Primary.next(), SourceKind::Secondary);
        assert_eq!(SourceKind::Secondary.next(), SourceKind::Primary);
        for kind in SourceKind::ALL {
            assert_eq!(SourceKind::ALL[kind.index()], kind);
        }
    }
}
