use std::io::Read;

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);

    let (local, remote) = match (args.next(), args.next()) {
        (Some(local), Some(remote)) => (local, remote),
        _ => {
            eprintln!("usage: arq-send <local-addr> <remote-addr> < input");
            std::process::exit(2);
        }
    };

    let mut data = Vec::new();
    std::io::stdin()
        .read_to_end(&mut data)
        .expect("failed to read stdin");

    let mut endpoint = arq_stream::Endpoint::bind(local.as_str(), remote.as_str())
        .expect("failed to create arq-stream endpoint");

    // Length prefix, so the receiver knows how much to ask for
    endpoint
        .send(&(data.len() as u64).to_be_bytes())
        .expect("failed to send length");

    endpoint.send(&data).expect("failed to send data");

    log::info!(
        "sent {} bytes to {} ({:?})",
        data.len(),
        endpoint.peer_addr(),
        endpoint.stats()
    );
}
