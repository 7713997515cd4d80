/*

A reliable, ordered byte stream carried over an unreliable datagram channel.

# Segments

Every datagram is a single segment: a 4-byte sequence number, a 4-byte acknowledgment number,
and zero or more payload bytes. Both numbers are byte offsets into an unbounded stream, one
stream per direction. The sequence number is the offset of the first payload byte; the
acknowledgment number is the offset of the next byte the sender of the segment is waiting for.

  seq  ack  payload
  [4]  [4]  [0, MAX_PAYLOAD]

A segment with no payload is a pure acknowledgment. There is no handshake; the first data
segment implicitly opens the stream.

# Sending

A call to send() splits its data into segments of at most payload_size_max bytes and transmits
all of them immediately. It then waits for cumulative acknowledgments:

  in_flight:  [0, 64) [64, 128) [128, 192)
  ack = 128:                     [128, 192)

If retransmit_timeout_ms elapses without any in-flight segment being acknowledged, every
in-flight segment is resent. When only one segment remains, tail_resend_count extra copies of it
are sent as well.

send() returns only once every segment has been acknowledged.

# Receiving

Incoming data segments are stored in an ordered map keyed by offset. After each read the map is
drained from the lowest offset for as long as segments are contiguous with the data delivered so
far:

  next_expected = 64
  pending:  64 128 256   => deliver 64, 128; wait for 192

Segments behind next_expected have already been delivered and are discarded, so duplicates are
harmless. Every iteration of recv() ends with a pure acknowledgment, and a burst of
final_ack_count acknowledgments is sent when the call returns to harden against the last one
being dropped.

Data which arrives while inside send() is reassembled and acknowledged right away, and kept for
the next recv() call along with anything received beyond what recv() asked for.

# Timing

Reads block for at most poll_timeout_ms. The retransmission timer is separate, so a short poll
timeout keeps the endpoint responsive without making retransmission more aggressive.

*/

pub mod endpoint;
pub mod segment;
pub mod sim;
mod socket;
pub mod transport;

pub use endpoint::{Config, Endpoint, Stats};
pub use socket::UdpTransport;

/// Errors which terminate a `send` or `recv` call.
///
/// Lost, late and failed datagrams are retried internally and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A datagram too short to hold a segment header was received.
    #[error(transparent)]
    MalformedSegment(#[from] segment::DecodeError),
}
