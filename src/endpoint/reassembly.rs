use std::collections::BTreeMap;

use crate::segment::Segment;

/// Outcome of offering a segment to the reassembly buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum Insert {
    /// The segment was stored for later delivery.
    Pending,
    /// The segment was delivered previously, or is already pending.
    Duplicate,
    /// The segment carried no payload.
    Empty,
}

pub struct Reassembly {
    next_expected_offset: u32,

    // Received segments at or beyond next_expected_offset, keyed by offset
    pending: BTreeMap<u32, Box<[u8]>>,
}

impl Reassembly {
    pub fn new(base_offset: u32) -> Self {
        Self {
            next_expected_offset: base_offset,
            pending: BTreeMap::new(),
        }
    }

    pub fn next_expected_offset(&self) -> u32 {
        self.next_expected_offset
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn insert(&mut self, segment: Segment) -> Insert {
        if segment.payload.is_empty() {
            return Insert::Empty;
        }

        if segment.sequence_number < self.next_expected_offset
            || self.pending.contains_key(&segment.sequence_number)
        {
            return Insert::Duplicate;
        }

        self.pending.insert(segment.sequence_number, segment.payload);

        Insert::Pending
    }

    /// Delivers every pending segment which is contiguous with the data delivered so far, in
    /// offset order. Returns the number of bytes delivered.
    pub fn drain<F>(&mut self, mut cb: F) -> usize
    where
        F: FnMut(&[u8]),
    {
        let mut delivered = 0;

        while let Some(entry) = self.pending.first_entry() {
            let offset = *entry.key();

            if offset > self.next_expected_offset {
                // Gap, wait for the missing segment
                break;
            }

            let payload = entry.remove();

            if offset == self.next_expected_offset {
                cb(&payload);

                self.next_expected_offset = self
                    .next_expected_offset
                    .wrapping_add(payload.len() as u32);
                delivered += payload.len();
            } else {
                // Overlaps data which has already been delivered
                log::debug!(
                    "discarding overlapping segment at {} (expected {})",
                    offset,
                    self.next_expected_offset
                );
            }
        }

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(offset: u32, data: &[u8]) -> Segment {
        Segment::new(offset, 0, data)
    }

    fn drain_all(reassembly: &mut Reassembly) -> Vec<u8> {
        let mut out = Vec::new();
        reassembly.drain(|data| out.extend_from_slice(data));
        out
    }

    #[test]
    fn in_order() {
        let mut r = Reassembly::new(0);

        assert_eq!(r.insert(seg(0, b"abc")), Insert::Pending);
        assert_eq!(drain_all(&mut r), b"abc");

        assert_eq!(r.insert(seg(3, b"de")), Insert::Pending);
        assert_eq!(drain_all(&mut r), b"de");

        assert_eq!(r.next_expected_offset(), 5);
        assert_eq!(r.pending_count(), 0);
    }

    #[test]
    fn reverse_order_matches_in_order() {
        let mut forward = Reassembly::new(0);
        forward.insert(seg(0, b"hello "));
        forward.insert(seg(6, b"world"));

        let mut reverse = Reassembly::new(0);
        reverse.insert(seg(6, b"world"));

        // Gap at 0, nothing deliverable yet
        assert!(drain_all(&mut reverse).is_empty());
        assert_eq!(reverse.next_expected_offset(), 0);

        reverse.insert(seg(0, b"hello "));

        assert_eq!(drain_all(&mut forward), drain_all(&mut reverse));
        assert_eq!(reverse.next_expected_offset(), 11);
    }

    #[test]
    fn duplicate_of_consumed_segment() {
        let mut r = Reassembly::new(0);

        r.insert(seg(0, b"abc"));
        assert_eq!(drain_all(&mut r), b"abc");

        assert_eq!(r.insert(seg(0, b"abc")), Insert::Duplicate);
        assert!(drain_all(&mut r).is_empty());
        assert_eq!(r.next_expected_offset(), 3);
    }

    #[test]
    fn duplicate_of_pending_segment() {
        let mut r = Reassembly::new(0);

        assert_eq!(r.insert(seg(4, b"efgh")), Insert::Pending);
        assert_eq!(r.insert(seg(4, b"efgh")), Insert::Duplicate);
        assert_eq!(r.pending_count(), 1);

        r.insert(seg(0, b"abcd"));
        assert_eq!(drain_all(&mut r), b"abcdefgh");
    }

    #[test]
    fn overlapping_segment_discarded() {
        let mut r = Reassembly::new(0);

        r.insert(seg(0, b"abcd"));
        r.insert(seg(2, b"cdef"));

        // The segment at 2 is passed over once offset 4 is expected
        assert_eq!(drain_all(&mut r), b"abcd");
        assert_eq!(r.pending_count(), 0);
        assert_eq!(r.next_expected_offset(), 4);
    }

    #[test]
    fn empty_segment_ignored() {
        let mut r = Reassembly::new(0);

        assert_eq!(r.insert(Segment::ack(0, 0)), Insert::Empty);
        assert_eq!(r.insert(Segment::ack(10, 0)), Insert::Empty);
        assert_eq!(r.pending_count(), 0);

        // Data at an offset previously named by an ACK is still accepted
        assert_eq!(r.insert(seg(0, b"x")), Insert::Pending);
    }

    #[test]
    fn scattered_arrivals() {
        let mut r = Reassembly::new(0);

        for &offset in &[6u32, 2, 8, 0, 4] {
            let byte = b'a' + offset as u8;
            r.insert(seg(offset, &[byte, byte + 1]));
        }

        assert_eq!(drain_all(&mut r), b"abcdefghij");
    }
}
