use std::thread;
use std::time;

use arq_stream::transport::Transport;
use arq_stream::Endpoint;

pub static LINGER_TIME: time::Duration = time::Duration::from_millis(500);

/// Deterministic test data which does not repeat on segment boundaries.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

pub fn digest(data: &[u8]) -> [u8; 16] {
    md5::compute(data).0
}

/// Sends `data` from `sender` to `receiver`, each on its own thread. Returns the received bytes
/// along with both endpoints.
pub fn transfer<A, B>(
    mut sender: Endpoint<A>,
    mut receiver: Endpoint<B>,
    data: Vec<u8>,
) -> (Vec<u8>, Endpoint<A>, Endpoint<B>)
where
    A: Transport + Send + 'static,
    B: Transport + Send + 'static,
{
    let len = data.len();

    let receiver_thread = thread::spawn(move || {
        let received = receiver.recv(len).expect("receive failed");
        receiver.linger(LINGER_TIME).expect("linger failed");
        (received, receiver)
    });

    let sender_thread = thread::spawn(move || {
        let sent = sender.send(&data).expect("send failed");
        assert_eq!(sent, data.len());
        sender
    });

    let sender = sender_thread.join().unwrap();
    let (received, receiver) = receiver_thread.join().unwrap();

    (received, sender, receiver)
}
