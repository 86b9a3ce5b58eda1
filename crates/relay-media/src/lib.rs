//! Track relay engine
//!
//! This crate holds the transport-independent half of the relay:
//! - classification of inbound tracks into primary / secondary sources
//! - the active-source selector that decides which packets are admitted
//! - bounded per-kind packet queues
//! - the rebaser that rewrites RTP timestamps and sequence numbers into one
//!   continuous outbound timeline per kind
//!
//! The webrtc types only appear at the edges ([`OutboundSink`],
//! [`KeyframeRequester`], [`RtpSource`]) so every stage can be driven from tests.

pub mod error;
pub mod lifecycle;
pub mod packet;
pub mod queue;
pub mod reader;
pub mod rebaser;
pub mod registry;
pub mod selector;
pub mod sink;

pub use error::RelayError;
pub use lifecycle::{Lifecycle, LifecycleToken};
pub use packet::{MediaPacket, SourceId};
pub use queue::{packet_queue, QueueConsumer, QueueCounters, QueueProducer, DEFAULT_QUEUE_CAPACITY};
pub use reader::{RtpSource, TrackReader};
pub use rebaser::{OutputTimeline, Rebaser};
pub use registry::{classify, TrackRegistry, TrackState, TrackStatusPublisher};
pub use selector::{ActiveSourceSelector, Admission, SelectionPolicy, SelectorState};
pub use sink::{KeyframeRequester, OutboundSink};

pub use relay_protocol::SourceKind;
