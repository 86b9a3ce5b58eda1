//! Bounded per-kind packet queue
//!
//! Producers (track readers) never wait: when the queue is full the packet
//! being offered is dropped and counted. The consumer (the rebaser) waits for
//! the next packet or for the session to be cancelled.

use crate::lifecycle::LifecycleToken;
use crate::packet::MediaPacket;
use relay_protocol::{QueueStats, SourceKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub const DEFAULT_QUEUE_CAPACITY: usize = 60;

/// Packet counters of one output kind, shared by its queue and rebaser
#[derive(Debug, Default)]
pub struct QueueCounters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    emitted: AtomicU64,
    write_failures: AtomicU64,
}

impl QueueCounters {
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    pub(crate) fn record_emitted(&self) -> u64 {
        self.emitted.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_write_failure(&self) -> u64 {
        self.write_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self, kind: SourceKind) -> QueueStats {
        QueueStats {
            kind,
            enqueued: self.enqueued(),
            dropped: self.dropped(),
            emitted: self.emitted(),
            write_failures: self.write_failures(),
        }
    }
}

/// Create a queue for `kind` holding at most `capacity` packets
pub fn packet_queue(kind: SourceKind, capacity: usize) -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let counters = Arc::new(QueueCounters::default());

    (
        QueueProducer {
            kind,
            tx,
            counters: counters.clone(),
        },
        QueueConsumer { kind, rx, counters },
    )
}

#[derive(Debug, Clone)]
pub struct QueueProducer {
    kind: SourceKind,
    tx: mpsc::Sender<MediaPacket>,
    counters: Arc<QueueCounters>,
}

impl QueueProducer {
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn counters(&self) -> &Arc<QueueCounters> {
        &self.counters
    }

    /// Offer a packet without waiting. Returns `false` if it was dropped.
    pub fn enqueue(&self, packet: MediaPacket) -> bool {
        match self.tx.try_send(packet) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(packet)) => {
                let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped % 100 == 0 {
                    tracing::debug!(
                        kind = %self.kind,
                        source = %packet.source,
                        dropped,
                        "Packet queue full, dropping packet"
                    );
                }
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

#[derive(Debug)]
pub struct QueueConsumer {
    kind: SourceKind,
    rx: mpsc::Receiver<MediaPacket>,
    counters: Arc<QueueCounters>,
}

impl QueueConsumer {
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn counters(&self) -> &Arc<QueueCounters> {
        &self.counters
    }

    /// Next packet, or `None` once the session is cancelled or every producer is gone
    pub async fn dequeue(&mut self, token: &mut LifecycleToken) -> Option<MediaPacket> {
        tokio::select! {
            biased;
            _ = token.cancelled() => None,
            packet = self.rx.recv() => packet,
        }
    }

    pub fn try_dequeue(&mut self) -> Option<MediaPacket> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }
}
