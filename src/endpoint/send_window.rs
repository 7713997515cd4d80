use std::collections::VecDeque;

use crate::segment::Segment;

//  peer_received    next_send
//  v                v
// -########=========--------> stream offsets
//
// #: acknowledged by a previous call, no longer tracked
// =: in flight

pub struct SendWindow {
    next_send_offset: u32,
    peer_received_offset: u32,

    // Unacknowledged segments, ascending and contiguous up to next_send_offset
    in_flight: VecDeque<Segment>,
}

impl SendWindow {
    pub fn new(base_offset: u32) -> Self {
        Self {
            next_send_offset: base_offset,
            peer_received_offset: base_offset,
            in_flight: VecDeque::new(),
        }
    }

    pub fn next_send_offset(&self) -> u32 {
        self.next_send_offset
    }

    pub fn peer_received_offset(&self) -> u32 {
        self.peer_received_offset
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn has_unacked(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Assigns the next stream offset to `payload` and tracks the resulting segment as in flight.
    /// Returns a reference to the segment so that it may be transmitted.
    pub fn push(&mut self, payload: &[u8], ack: u32) -> &Segment {
        let segment = Segment::new(self.next_send_offset, ack, payload);

        let index = self.in_flight.len();

        self.next_send_offset = segment.end_offset();
        self.in_flight.push_back(segment);

        &self.in_flight[index]
    }

    /// Processes a cumulative acknowledgment, removing every segment which ends at or before
    /// `ack`. Returns the number of segments removed.
    pub fn acknowledge(&mut self, ack: u32) -> usize {
        // Acknowledging data which was never sent is nonsense
        if ack > self.next_send_offset {
            return 0;
        }

        if ack > self.peer_received_offset {
            self.peer_received_offset = ack;
        }

        let mut acked = 0;

        while let Some(front) = self.in_flight.front() {
            if front.end_offset() <= ack {
                self.in_flight.pop_front();
                acked += 1;
            } else {
                break;
            }
        }

        acked
    }

    /// Iterates over in-flight segments from oldest to newest.
    pub fn in_flight(&self) -> impl Iterator<Item = &Segment> {
        self.in_flight.iter()
    }

    /// The single remaining in-flight segment, if exactly one is outstanding.
    pub fn last_outstanding(&self) -> Option<&Segment> {
        if self.in_flight.len() == 1 {
            self.in_flight.front()
        } else {
            None
        }
    }
}
