use std::collections::VecDeque;
use std::io;
use std::net;
use std::time;

use super::segment::{Segment, MAX_PAYLOAD};
use super::socket::UdpTransport;
use super::transport::Transport;
use super::Error;

mod reassembly;
mod send_window;

use reassembly::{Insert, Reassembly};
use send_window::SendWindow;

const POLL_TIMEOUT_DEFAULT_MS: u64 = 10;
const POLL_TIMEOUT_MIN_MS: u64 = 1;

const RETRANSMIT_TIMEOUT_DEFAULT_MS: u64 = 10;
const RETRANSMIT_TIMEOUT_MIN_MS: u64 = 1;

const TAIL_RESEND_COUNT_DEFAULT: u32 = 3;
const FINAL_ACK_COUNT_DEFAULT: u32 = 5;

/// Configuration for an [`Endpoint`] object.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to block waiting for a single datagram, in milliseconds.
    ///
    /// Minimum value: 1 \
    /// Default value: 10
    pub poll_timeout_ms: u64,

    /// Time without acknowledgment progress after which every in-flight segment is resent, in
    /// milliseconds.
    ///
    /// Minimum value: 1 \
    /// Default value: 10
    pub retransmit_timeout_ms: u64,

    /// Largest payload placed in a single outgoing segment.
    ///
    /// Maximum value: [`MAX_PAYLOAD`] \
    /// Default value: [`MAX_PAYLOAD`]
    pub payload_size_max: usize,

    /// Number of extra copies sent of the last outstanding segment each time it is resent.
    ///
    /// Default value: 3
    pub tail_resend_count: u32,

    /// Number of acknowledgments sent back-to-back when a receive call completes.
    ///
    /// Default value: 5
    pub final_ack_count: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_timeout_ms: POLL_TIMEOUT_DEFAULT_MS,
            retransmit_timeout_ms: RETRANSMIT_TIMEOUT_DEFAULT_MS,
            payload_size_max: MAX_PAYLOAD,
            tail_resend_count: TAIL_RESEND_COUNT_DEFAULT,
            final_ack_count: FINAL_ACK_COUNT_DEFAULT,
        }
    }
}

impl Config {
    fn validate(&self) {
        assert!(
            self.poll_timeout_ms >= POLL_TIMEOUT_MIN_MS,
            "invalid endpoint configuration: poll_timeout_ms < {}",
            POLL_TIMEOUT_MIN_MS
        );
        assert!(
            self.retransmit_timeout_ms >= RETRANSMIT_TIMEOUT_MIN_MS,
            "invalid endpoint configuration: retransmit_timeout_ms < {}",
            RETRANSMIT_TIMEOUT_MIN_MS
        );
        assert!(
            self.payload_size_max > 0,
            "invalid endpoint configuration: payload_size_max == 0"
        );
        assert!(
            self.payload_size_max <= MAX_PAYLOAD,
            "invalid endpoint configuration: payload_size_max > {}",
            MAX_PAYLOAD
        );
    }
}

/// Running counters for a single [`Endpoint`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Data segments transmitted for the first time.
    pub segments_sent: u64,
    /// Data segment transmissions beyond the first, including tail copies.
    pub segments_retransmitted: u64,
    /// Pure acknowledgments transmitted.
    pub acks_sent: u64,
    /// Segments received and decoded, of any kind.
    pub segments_received: u64,
    /// Received data segments which had already been delivered or were already pending.
    pub duplicates_discarded: u64,
}

/// One side of a reliable byte stream.
///
/// All calls block until they complete; there is no call-level timeout.
pub struct Endpoint<T = UdpTransport> {
    // Saved configuration
    config: Config,
    // Datagram channel to the remote peer
    transport: T,
    // Timestamps are computed relative to this instant
    time_ref: time::Instant,
    // Outbound stream state
    send_window: SendWindow,
    // Inbound stream state
    reassembly: Reassembly,
    // Reassembled bytes not yet returned by recv()
    read_buffer: VecDeque<u8>,
    stats: Stats,
}

impl Endpoint<UdpTransport> {
    /// Equivalent to calling [`Endpoint::bind_with_config`] with default configuration.
    pub fn bind<A, B>(bind_address: A, remote_address: B) -> io::Result<Self>
    where
        A: net::ToSocketAddrs,
        B: net::ToSocketAddrs,
    {
        Self::bind_with_config(bind_address, remote_address, Default::default())
    }

    /// Binds a UDP socket to `bind_address` and returns an endpoint exchanging segments with
    /// `remote_address`. Errors encountered during socket initialization are forwarded to the
    /// caller.
    pub fn bind_with_config<A, B>(
        bind_address: A,
        remote_address: B,
        config: Config,
    ) -> io::Result<Self>
    where
        A: net::ToSocketAddrs,
        B: net::ToSocketAddrs,
    {
        let transport = UdpTransport::bind(bind_address, remote_address)?;

        Ok(Self::with_config(transport, config))
    }

    /// Returns the local address of the internal UDP socket.
    pub fn local_addr(&self) -> net::SocketAddr {
        self.transport.local_addr()
    }

    /// Returns the remote address for this stream.
    pub fn peer_addr(&self) -> net::SocketAddr {
        self.transport.peer_addr()
    }
}

impl<T> Endpoint<T>
where
    T: Transport,
{
    /// Equivalent to calling [`Endpoint::with_config`] with default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, Default::default())
    }

    /// Creates an endpoint which exchanges segments over `transport`. Both stream directions
    /// begin at offset zero.
    ///
    /// # Panics
    ///
    /// Panics if `config` is invalid.
    pub fn with_config(transport: T, config: Config) -> Self {
        config.validate();

        Self {
            config,
            transport,
            time_ref: time::Instant::now(),
            send_window: SendWindow::new(0),
            reassembly: Reassembly::new(0),
            read_buffer: VecDeque::new(),
            stats: Stats::default(),
        }
    }

    /// Sends all of `data` to the remote peer, blocking until every byte has been acknowledged.
    /// Returns `data.len()`.
    ///
    /// An empty `data` returns immediately without transmitting anything.
    pub fn send(&mut self, data: &[u8]) -> Result<usize, Error> {
        if data.is_empty() {
            return Ok(0);
        }

        let ack = self.reassembly.next_expected_offset();

        for chunk in data.chunks(self.config.payload_size_max) {
            let frame = self.send_window.push(chunk, ack).encode();

            self.transmit(&frame);
            self.stats.segments_sent += 1;
        }

        log::trace!(
            "queued {} bytes, next send offset {}",
            data.len(),
            self.send_window.next_send_offset()
        );

        let mut progress_time_ms = self.time_now_ms();

        while self.send_window.has_unacked() {
            if let Some(segment) = self.poll_segment()? {
                let in_flight = self.send_window.in_flight_count();

                if self.handle_segment(segment) {
                    // The peer is sending as well, take the data and let it know
                    self.reassemble();
                    self.send_ack();
                }

                if self.send_window.in_flight_count() < in_flight {
                    progress_time_ms = self.time_now_ms();
                }

                if !self.send_window.has_unacked() {
                    break;
                }
            }

            let now_ms = self.time_now_ms();

            if now_ms - progress_time_ms >= self.config.retransmit_timeout_ms {
                self.retransmit();
                self.send_ack();

                progress_time_ms = now_ms;
            }
        }

        Ok(data.len())
    }

    /// Receives exactly `n` bytes from the remote peer, blocking until they are available.
    pub fn recv(&mut self, n: usize) -> Result<Vec<u8>, Error> {
        if n == 0 {
            return Ok(Vec::new());
        }

        while self.read_buffer.len() < n {
            if let Some(segment) = self.poll_segment()? {
                self.handle_segment(segment);
            }

            self.reassemble();
            self.send_ack();
        }

        let data = self.read_buffer.drain(..n).collect();

        // The last ACK is the one the sender is waiting on
        log::debug!(
            "sending {} final acks for offset {}",
            self.config.final_ack_count,
            self.reassembly.next_expected_offset()
        );

        for _ in 0..self.config.final_ack_count {
            self.send_ack();
        }

        Ok(data)
    }

    /// Keeps acknowledging incoming data for `duration`. Useful after a final `recv` so that a
    /// peer whose last acknowledgments were lost can complete its `send`.
    ///
    /// Any new data received is retained for subsequent `recv` calls.
    pub fn linger(&mut self, duration: time::Duration) -> Result<(), Error> {
        let begin = time::Instant::now();

        while begin.elapsed() < duration {
            if let Some(segment) = self.poll_segment()? {
                if self.handle_segment(segment) {
                    self.reassemble();
                    self.send_ack();
                }
            }
        }

        Ok(())
    }

    /// Number of bytes which have been reassembled but not yet returned by `recv`.
    pub fn available(&self) -> usize {
        self.read_buffer.len()
    }

    /// Stream offset of the next byte to be sent.
    pub fn next_send_offset(&self) -> u32 {
        self.send_window.next_send_offset()
    }

    /// Stream offset of the next byte expected from the peer.
    pub fn next_expected_offset(&self) -> u32 {
        self.reassembly.next_expected_offset()
    }

    /// Highest cumulative acknowledgment received from the peer.
    pub fn peer_received_offset(&self) -> u32 {
        self.send_window.peer_received_offset()
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the number of whole milliseconds elapsed since the endpoint was created.
    fn time_now_ms(&self) -> u64 {
        self.time_ref.elapsed().as_millis() as u64
    }

    fn transmit(&mut self, frame: &[u8]) {
        // Failed sends are recovered from exactly like lost datagrams
        if let Err(err) = self.transport.send_datagram(frame) {
            log::warn!("datagram send failed, will retry: {err}");
        }
    }

    fn send_ack(&mut self) {
        let segment = Segment::ack(
            self.send_window.next_send_offset(),
            self.reassembly.next_expected_offset(),
        );

        self.transmit(&segment.encode());
        self.stats.acks_sent += 1;
    }

    fn retransmit(&mut self) {
        let frames: Vec<Box<[u8]>> = self.send_window.in_flight().map(Segment::encode).collect();

        log::debug!(
            "resending {} segment(s), peer has received up to {}",
            frames.len(),
            self.send_window.peer_received_offset()
        );

        for frame in frames.iter() {
            self.transmit(frame);
        }

        self.stats.segments_retransmitted += frames.len() as u64;

        // Losing the last segment stalls the whole exchange, so bias toward getting it through
        if let Some(frame) = self.send_window.last_outstanding().map(Segment::encode) {
            for _ in 0..self.config.tail_resend_count {
                self.transmit(&frame);
            }

            self.stats.segments_retransmitted += u64::from(self.config.tail_resend_count);
        }
    }

    /// Waits up to the configured poll timeout for a single segment.
    fn poll_segment(&mut self) -> Result<Option<Segment>, Error> {
        let timeout = time::Duration::from_millis(self.config.poll_timeout_ms);

        match self.transport.receive_datagram(timeout) {
            Ok(Some(datagram)) => {
                let segment = Segment::decode(datagram)?;

                log::trace!(
                    "received seq {} ack {} len {}",
                    segment.sequence_number,
                    segment.acknowledgment_number,
                    segment.payload.len()
                );

                self.stats.segments_received += 1;

                Ok(Some(segment))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                // Treated as though nothing arrived
                log::warn!("datagram receive failed, will retry: {err}");
                std::thread::sleep(timeout);
                Ok(None)
            }
        }
    }

    /// Applies the segment's acknowledgment and stores its payload for reassembly. Returns true
    /// if the segment carried data.
    fn handle_segment(&mut self, segment: Segment) -> bool {
        let acked = self.send_window.acknowledge(segment.acknowledgment_number);

        if acked > 0 {
            log::trace!(
                "{} segment(s) acknowledged, {} in flight",
                acked,
                self.send_window.in_flight_count()
            );
        }

        let sequence_number = segment.sequence_number;

        match self.reassembly.insert(segment) {
            Insert::Pending => true,
            Insert::Duplicate => {
                log::debug!(
                    "discarding duplicate segment at {} (expected {})",
                    sequence_number,
                    self.reassembly.next_expected_offset()
                );
                self.stats.duplicates_discarded += 1;
                true
            }
            Insert::Empty => false,
        }
    }

    fn reassemble(&mut self) {
        let read_buffer = &mut self.read_buffer;

        let delivered = self
            .reassembly
            .drain(|data| read_buffer.extend(data.iter().copied()));

        if delivered > 0 {
            log::trace!(
                "reassembled {} bytes, {} segment(s) still pending",
                delivered,
                self.reassembly.pending_count()
            );
        }
    }
}
