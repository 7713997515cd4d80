use std::io;
use std::time;

/// An unreliable datagram channel to a single, fixed remote peer.
///
/// Datagrams may be dropped, duplicated or reordered, but are never split or merged.
pub trait Transport {
    /// Sends one datagram to the remote peer. Delivery is not guaranteed.
    fn send_datagram(&mut self, datagram: &[u8]) -> io::Result<usize>;

    /// Blocks for up to `timeout` for a single incoming datagram. Returns Ok(None) if nothing
    /// arrived in the alloted time.
    fn receive_datagram(&mut self, timeout: time::Duration) -> io::Result<Option<&[u8]>>;
}
