#[allow(dead_code)]
mod common;

use arq_stream::sim;
use arq_stream::{Config, Endpoint};

fn config(payload_size_max: usize) -> Config {
    Config {
        payload_size_max,
        ..Default::default()
    }
}

fn lossy(seed: u64) -> sim::Config {
    sim::Config {
        loss_rate: 0.1,
        duplicate_rate: 0.05,
        reorder_rate: 0.1,
        seed,
    }
}

fn run(a_to_b: sim::Config, b_to_a: sim::Config, payload_size_max: usize, len: usize) {
    let _ = env_logger::try_init();

    let (a, b) = sim::pair_asymmetric(a_to_b, b_to_a);

    let sender = Endpoint::with_config(a, config(payload_size_max));
    let receiver = Endpoint::with_config(b, config(payload_size_max));

    let data = common::pattern(len);

    let (received, sender, receiver) = common::transfer(sender, receiver, data.clone());

    assert_eq!(received.len(), data.len());
    assert_eq!(common::digest(&received), common::digest(&data));

    assert_eq!(receiver.next_expected_offset() as usize, len);
    assert_eq!(sender.peer_received_offset() as usize, len);
}

#[test]
fn lossless() {
    run(Default::default(), Default::default(), 1024, 64 * 1024);
}

#[test]
fn lossy_data_direction() {
    run(lossy(1), Default::default(), 512, 32 * 1024);
}

#[test]
fn lossy_ack_direction() {
    run(Default::default(), lossy(2), 512, 32 * 1024);
}

#[test]
fn lossy_both_directions() {
    run(lossy(3), lossy(4), 512, 32 * 1024);
}

#[test]
fn heavy_duplication_and_reordering() {
    let faults = sim::Config {
        duplicate_rate: 0.5,
        reorder_rate: 0.5,
        ..Default::default()
    };

    run(faults.clone(), faults, 100, 10_000);
}

#[test]
fn single_segment_lossy() {
    run(lossy(5), lossy(6), 1024, 11);
}

#[test]
fn consecutive_messages() {
    let _ = env_logger::try_init();

    let (a, b) = sim::pair(lossy(7));

    let mut sender = Endpoint::with_config(a, config(256));
    let mut receiver = Endpoint::with_config(b, config(256));

    let messages: Vec<Vec<u8>> = (1..=5).map(|i| common::pattern(i * 300)).collect();
    let expected: Vec<u8> = messages.concat();
    let total = expected.len();

    let receiver_thread = std::thread::spawn(move || {
        // Read sizes unrelated to message or segment sizes
        let mut received = Vec::new();
        while received.len() < total {
            let n = (total - received.len()).min(777);
            received.extend(receiver.recv(n).unwrap());
        }
        receiver.linger(common::LINGER_TIME).unwrap();
        received
    });

    for message in messages.iter() {
        assert_eq!(sender.send(message).unwrap(), message.len());
    }

    assert_eq!(sender.next_send_offset() as usize, total);

    let received = receiver_thread.join().unwrap();
    assert_eq!(received, expected);
}
