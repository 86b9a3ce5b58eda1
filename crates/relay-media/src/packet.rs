use relay_protocol::SourceKind;
use std::fmt;
use webrtc::rtp::packet::Packet;

/// Instance id of an inbound track. A reconnect of the same kind gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src-{}", self.0)
    }
}

/// One RTP packet on its way through the relay.
///
/// `delta` is the distance, in RTP clock units, from the previous packet read
/// from the same source. The raw header timestamp and sequence number are left
/// untouched until the rebaser overwrites them.
#[derive(Debug, Clone)]
pub struct MediaPacket {
    pub rtp: Packet,
    pub kind: SourceKind,
    pub source: SourceId,
    pub delta: u32,
}

impl MediaPacket {
    pub fn timestamp(&self) -> u32 {
        self.rtp.header.timestamp
    }

    pub fn sequence_number(&self) -> u16 {
        self.rtp.header.sequence_number
    }
}
