use std::io::Write;

static LINGER_TIME: std::time::Duration = std::time::Duration::from_millis(1000);

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);

    let (local, remote) = match (args.next(), args.next()) {
        (Some(local), Some(remote)) => (local, remote),
        _ => {
            eprintln!("usage: arq-recv <local-addr> <remote-addr> > output");
            std::process::exit(2);
        }
    };

    let mut endpoint = arq_stream::Endpoint::bind(local.as_str(), remote.as_str())
        .expect("failed to create arq-stream endpoint");

    let len_bytes = endpoint.recv(8).expect("failed to receive length");

    let mut len = [0u8; 8];
    len.copy_from_slice(&len_bytes);
    let len = u64::from_be_bytes(len) as usize;

    let data = endpoint.recv(len).expect("failed to receive data");

    std::io::stdout()
        .write_all(&data)
        .expect("failed to write stdout");

    log::info!(
        "received {} bytes from {} ({:?})",
        data.len(),
        endpoint.peer_addr(),
        endpoint.stats()
    );

    // Let the sender see its final acknowledgments
    endpoint.linger(LINGER_TIME).expect("failed while lingering");
}
