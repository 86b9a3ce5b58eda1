//! Timestamp / sequence rebasing
//!
//! Packets arrive in a queue carrying per-source timestamp deltas. The rebaser
//! adds each delta to a running output timestamp and numbers packets with its
//! own counter, so switching sources never resets or rewinds the outbound
//! stream.

use crate::lifecycle::LifecycleToken;
use crate::packet::MediaPacket;
use crate::queue::QueueConsumer;
use crate::sink::OutboundSink;
use relay_protocol::SourceKind;
use std::sync::Arc;

/// Running timeline of one output kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputTimeline {
    timestamp: u32,
    next_sequence: u16,
}

impl OutputTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp of the last emitted packet (0 before the first one)
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn next_sequence(&self) -> u16 {
        self.next_sequence
    }

    /// Rewrite `packet` onto this timeline
    pub fn stamp(&mut self, packet: &mut MediaPacket) {
        self.timestamp = self.timestamp.wrapping_add(packet.delta);
        packet.rtp.header.timestamp = self.timestamp;
        packet.rtp.header.sequence_number = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
    }
}

pub struct Rebaser {
    kind: SourceKind,
    timeline: OutputTimeline,
    consumer: QueueConsumer,
    sink: Arc<dyn OutboundSink>,
}

impl Rebaser {
    pub fn new(consumer: QueueConsumer, sink: Arc<dyn OutboundSink>) -> Self {
        Self {
            kind: consumer.kind(),
            timeline: OutputTimeline::new(),
            consumer,
            sink,
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Drain the queue into the sink until the session is cancelled.
    /// Sink failures are logged and skipped. Returns the final timeline.
    pub async fn run(mut self, mut token: LifecycleToken) -> OutputTimeline {
        tracing::info!(kind = %self.kind, "Rebaser started");

        let counters = self.consumer.counters().clone();

        while let Some(mut packet) = self.consumer.dequeue(&mut token).await {
            self.timeline.stamp(&mut packet);

            match self.sink.send(&packet.rtp).await {
                Ok(()) => {
                    let emitted = counters.record_emitted();
                    if emitted % 1000 == 1 {
                        tracing::debug!(
                            kind = %self.kind,
                            emitted,
                            ts = packet.timestamp(),
                            seq = packet.sequence_number(),
                            "Relaying packets"
                        );
                    }
                }
                Err(e) => {
                    let failures = counters.record_write_failure();
                    if failures == 1 || failures % 100 == 0 {
                        tracing::warn!(
                            kind = %self.kind,
                            failures,
                            "Failed to write rebased packet: {}",
                            e
                        );
                    }
                }
            }
        }

        tracing::info!(
            kind = %self.kind,
            emitted = counters.emitted(),
            dropped = counters.dropped(),
            "Rebaser stopped"
        );

        self.timeline
    }
}
