use std::io;
use std::net;
use std::time;

use super::segment::FRAME_SIZE_MAX;
use super::transport::Transport;

const SOCKET_POLLING_KEY: usize = 0;

/// A [`Transport`] backed by a UDP socket connected to a single remote address.
pub struct UdpTransport {
    // Non-blocking socket, connected to the peer
    socket: net::UdpSocket,
    // Cached from socket initialization
    local_addr: net::SocketAddr,
    peer_addr: net::SocketAddr,
    // Polling objects
    poller: polling::Poller,
    poller_events: polling::Events,
    // Always-allocated receive buffer
    recv_buffer: Box<[u8]>,
}

impl UdpTransport {
    /// Binds a UDP socket to `bind_address` and directs all traffic to `connect_address`.
    pub fn bind<A, B>(bind_address: A, connect_address: B) -> io::Result<Self>
    where
        A: net::ToSocketAddrs,
        B: net::ToSocketAddrs,
    {
        let socket = net::UdpSocket::bind(bind_address)?;

        Self::new(socket, connect_address)
    }

    /// Wraps an already-bound socket, directing all traffic to `connect_address`.
    pub fn new<B>(socket: net::UdpSocket, connect_address: B) -> io::Result<Self>
    where
        B: net::ToSocketAddrs,
    {
        socket.set_nonblocking(true)?;
        socket.connect(connect_address)?;

        let local_addr = socket.local_addr()?;
        let peer_addr = socket.peer_addr()?;

        let poller = polling::Poller::new()?;

        // The socket is removed from the poller in Drop, before it is closed
        unsafe {
            poller.add(&socket, polling::Event::readable(SOCKET_POLLING_KEY))?;
        }

        log::debug!("bound {local_addr} -> {peer_addr}");

        Ok(Self {
            socket,
            local_addr,
            peer_addr,
            poller,
            poller_events: polling::Events::new(),
            recv_buffer: vec![0; FRAME_SIZE_MAX].into_boxed_slice(),
        })
    }

    fn try_recv(&mut self) -> io::Result<Option<usize>> {
        match self.socket.recv(&mut self.recv_buffer) {
            Ok(len) => Ok(Some(len)),
            Err(err) => match err.kind() {
                // The only acceptable error is WouldBlock, indicating no datagram
                io::ErrorKind::WouldBlock => Ok(None),
                _ => Err(err),
            },
        }
    }

    /// If a datagram can be read from the socket, returns it. Returns Ok(None) otherwise.
    pub fn try_read_datagram(&mut self) -> io::Result<Option<&[u8]>> {
        let len = self.try_recv()?;

        Ok(len.map(|len| &self.recv_buffer[..len]))
    }

    /// Blocks for a duration of up to `timeout` for an incoming datagram and returns it. Returns
    /// Ok(None) if no datagram could be read in the alloted time, or if polling awoke spuriously.
    pub fn wait_for_datagram(&mut self, timeout: time::Duration) -> io::Result<Option<&[u8]>> {
        // A datagram may already be queued from a previous readiness event
        let mut len = self.try_recv()?;

        if len.is_none() {
            // Wait for a readable event (must be done prior to each wait() call)
            self.poller
                .modify(&self.socket, polling::Event::readable(SOCKET_POLLING_KEY))?;

            self.poller_events.clear();

            let n = self.poller.wait(&mut self.poller_events, Some(timeout))?;

            if n > 0 {
                // The socket is readable - read in confidence
                len = self.try_recv()?;
            }
        }

        Ok(len.map(|len| &self.recv_buffer[..len]))
    }

    pub fn local_addr(&self) -> net::SocketAddr {
        self.local_addr
    }

    pub fn peer_addr(&self) -> net::SocketAddr {
        self.peer_addr
    }
}

impl Transport for UdpTransport {
    fn send_datagram(&mut self, datagram: &[u8]) -> io::Result<usize> {
        self.socket.send(datagram)
    }

    fn receive_datagram(&mut self, timeout: time::Duration) -> io::Result<Option<&[u8]>> {
        self.wait_for_datagram(timeout)
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        let _ = self.poller.delete(&self.socket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_pair() -> (UdpTransport, UdpTransport) {
        let socket_a = net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let socket_b = net::UdpSocket::bind("127.0.0.1:0").unwrap();

        let addr_a = socket_a.local_addr().unwrap();
        let addr_b = socket_b.local_addr().unwrap();

        (
            UdpTransport::new(socket_a, addr_b).unwrap(),
            UdpTransport::new(socket_b, addr_a).unwrap(),
        )
    }

    #[test]
    fn addresses() {
        let (a, b) = loopback_pair();

        assert_eq!(a.peer_addr(), b.local_addr());
        assert_eq!(b.peer_addr(), a.local_addr());
    }

    #[test]
    fn wait_times_out() {
        let (mut a, _b) = loopback_pair();

        let timeout = time::Duration::from_millis(20);
        let begin = time::Instant::now();

        assert_eq!(a.wait_for_datagram(timeout).unwrap(), None);
        assert!(begin.elapsed() >= time::Duration::from_millis(10));
    }

    #[test]
    fn datagram_boundaries_preserved() {
        let (mut a, mut b) = loopback_pair();

        a.send_datagram(b"first").unwrap();
        a.send_datagram(b"second").unwrap();

        let timeout = time::Duration::from_millis(500);

        assert_eq!(
            b.wait_for_datagram(timeout).unwrap(),
            Some(&b"first"[..])
        );
        assert_eq!(
            b.wait_for_datagram(timeout).unwrap(),
            Some(&b"second"[..])
        );
        assert_eq!(b.try_read_datagram().unwrap(), None);
    }
}
