//! In-process simulated datagram channel.
//!
//! [`pair`] returns two connected [`SimTransport`]s. Each direction applies its own fault model
//! to outgoing datagrams:
//!
//! | Fault       | Description                                                       |
//! |-------------|-------------------------------------------------------------------|
//! | Loss        | Drop a datagram with probability `loss_rate`.                     |
//! | Duplication | Deliver a datagram twice with probability `duplicate_rate`.       |
//! | Reordering  | Hold a datagram back with probability `reorder_rate`, releasing   |
//! |             | it after the next datagram sent in the same direction.            |
//!
//! Faults are driven by a seeded RNG so that a given sequence of sends is reproducible.

use std::io;
use std::sync::mpsc;
use std::time;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::segment::FRAME_SIZE_MAX;
use super::transport::Transport;

/// Fault model for one direction of a simulated channel.
///
/// All rates are probabilities in the range `[0.0, 1.0]`.
#[derive(Clone, Debug)]
pub struct Config {
    pub loss_rate: f64,
    pub duplicate_rate: f64,
    pub reorder_rate: f64,
    /// Seed for the fault RNG.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        // Transparent pass-through
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            reorder_rate: 0.0,
            seed: 0,
        }
    }
}

impl Config {
    fn validate(&self) {
        for (name, rate) in [
            ("loss_rate", self.loss_rate),
            ("duplicate_rate", self.duplicate_rate),
            ("reorder_rate", self.reorder_rate),
        ] {
            assert!(
                (0.0..=1.0).contains(&rate),
                "invalid simulator configuration: {} not in [0, 1]",
                name
            );
        }
    }
}

type Filter = Box<dyn FnMut(&[u8]) -> bool + Send>;

/// One end of a simulated unreliable channel.
pub struct SimTransport {
    config: Config,
    rng: StdRng,
    tx: mpsc::Sender<Box<[u8]>>,
    rx: mpsc::Receiver<Box<[u8]>>,
    // Datagram being held back to be delivered out of order
    held: Option<Box<[u8]>>,
    // Deterministic drop predicate, applied before the fault model
    filter: Option<Filter>,
    recv_buffer: Box<[u8]>,
    datagrams_sent: u64,
    datagrams_dropped: u64,
}

/// Equivalent to calling [`pair_asymmetric`] with the same fault model in both directions.
pub fn pair(config: Config) -> (SimTransport, SimTransport) {
    let mut b_to_a = config.clone();
    b_to_a.seed = config.seed.wrapping_add(1);

    pair_asymmetric(config, b_to_a)
}

/// Creates two connected transports. `a_to_b` governs datagrams sent by the first transport,
/// `b_to_a` those sent by the second.
pub fn pair_asymmetric(a_to_b: Config, b_to_a: Config) -> (SimTransport, SimTransport) {
    a_to_b.validate();
    b_to_a.validate();

    let (tx_ab, rx_ab) = mpsc::channel();
    let (tx_ba, rx_ba) = mpsc::channel();

    let a = SimTransport::new(a_to_b, tx_ab, rx_ba);
    let b = SimTransport::new(b_to_a, tx_ba, rx_ab);

    (a, b)
}

impl SimTransport {
    fn new(config: Config, tx: mpsc::Sender<Box<[u8]>>, rx: mpsc::Receiver<Box<[u8]>>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            tx,
            rx,
            held: None,
            filter: None,
            recv_buffer: vec![0; FRAME_SIZE_MAX].into_boxed_slice(),
            datagrams_sent: 0,
            datagrams_dropped: 0,
        }
    }

    /// Installs a predicate over outgoing datagrams. Datagrams for which it returns `false` are
    /// dropped.
    pub fn set_filter<F>(&mut self, filter: F)
    where
        F: FnMut(&[u8]) -> bool + Send + 'static,
    {
        self.filter = Some(Box::new(filter));
    }

    /// Number of datagrams handed to this transport for sending.
    pub fn datagrams_sent(&self) -> u64 {
        self.datagrams_sent
    }

    /// Number of outgoing datagrams dropped by the filter or the fault model.
    pub fn datagrams_dropped(&self) -> u64 {
        self.datagrams_dropped
    }

    fn deliver(&self, datagram: Box<[u8]>) {
        // A disconnected peer behaves like a black hole
        let _ = self.tx.send(datagram);
    }
}

impl Transport for SimTransport {
    fn send_datagram(&mut self, datagram: &[u8]) -> io::Result<usize> {
        self.datagrams_sent += 1;

        let len = datagram.len();

        let pass = match self.filter.as_mut() {
            Some(filter) => filter(datagram),
            None => true,
        };

        if !pass || self.rng.gen_bool(self.config.loss_rate) {
            self.datagrams_dropped += 1;
            return Ok(len);
        }

        let datagram: Box<[u8]> = datagram.into();

        if self.held.is_none() && self.rng.gen_bool(self.config.reorder_rate) {
            self.held = Some(datagram);
            return Ok(len);
        }

        if self.rng.gen_bool(self.config.duplicate_rate) {
            self.deliver(datagram.clone());
        }

        self.deliver(datagram);

        if let Some(held) = self.held.take() {
            self.deliver(held);
        }

        Ok(len)
    }

    fn receive_datagram(&mut self, timeout: time::Duration) -> io::Result<Option<&[u8]>> {
        match self.rx.recv_timeout(timeout) {
            Ok(datagram) => {
                let len = datagram.len().min(self.recv_buffer.len());
                self.recv_buffer[..len].copy_from_slice(&datagram[..len]);
                Ok(Some(&self.recv_buffer[..len]))
            }
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                // Nothing will ever arrive; still honor the wait
                std::thread::sleep(timeout);
                Ok(None)
            }
        }
    }
}
