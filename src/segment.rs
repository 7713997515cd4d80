//! Segment wire format.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                     Acknowledgment Number                     |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          Payload ...                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! There is no length field; the payload runs to the end of the datagram.

pub const HEADER_SIZE: usize = 8;

/// Largest datagram ever produced or accepted.
pub const FRAME_SIZE_MAX: usize = (1 << 15) - 8;

/// Largest payload a single segment may carry.
pub const MAX_PAYLOAD: usize = FRAME_SIZE_MAX - HEADER_SIZE;

const OFF_SEQ: usize = 0;
const OFF_ACK: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    /// Stream offset of the first payload byte.
    pub sequence_number: u32,
    /// Next stream offset the sender of this segment expects to receive.
    pub acknowledgment_number: u32,
    pub payload: Box<[u8]>,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("malformed segment: {len} bytes is shorter than the 8-byte header")]
pub struct DecodeError {
    pub len: usize,
}

impl Segment {
    pub fn new(sequence_number: u32, acknowledgment_number: u32, payload: &[u8]) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD);

        Self {
            sequence_number,
            acknowledgment_number,
            payload: payload.into(),
        }
    }

    /// A segment carrying no payload, only acknowledgment information.
    pub fn ack(sequence_number: u32, acknowledgment_number: u32) -> Self {
        Self {
            sequence_number,
            acknowledgment_number,
            payload: Box::default(),
        }
    }

    /// The stream offset one past the last payload byte.
    pub fn end_offset(&self) -> u32 {
        self.sequence_number.wrapping_add(self.payload.len() as u32)
    }

    pub fn encode(&self) -> Box<[u8]> {
        let mut buf = vec![0u8; HEADER_SIZE + self.payload.len()];

        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.sequence_number.to_be_bytes());
        buf[OFF_ACK..OFF_ACK + 4].copy_from_slice(&self.acknowledgment_number.to_be_bytes());
        buf[HEADER_SIZE..].copy_from_slice(&self.payload);

        buf.into_boxed_slice()
    }

    /// Parses a segment from one whole datagram. Anything at least [`HEADER_SIZE`] bytes long is
    /// accepted; no integrity check is made.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < HEADER_SIZE {
            return Err(DecodeError { len: bytes.len() });
        }

        let mut seq = [0u8; 4];
        let mut ack = [0u8; 4];
        seq.copy_from_slice(&bytes[OFF_SEQ..OFF_SEQ + 4]);
        ack.copy_from_slice(&bytes[OFF_ACK..OFF_ACK + 4]);

        Ok(Self {
            sequence_number: u32::from_be_bytes(seq),
            acknowledgment_number: u32::from_be_bytes(ack),
            payload: bytes[HEADER_SIZE..].into(),
        })
    }
}
