use std::{
    io::Read,
    net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener},
    thread,
    time::Duration,
};

use mesh_net::tcp::{ConnectOutcome, RecvOutcome, TcpTransport};

const RECV_BUFFER_SIZE: usize = 65535;
const RECV_COMPACT_THRESHOLD: usize = 60000;
const MAX_MSG_SIZE: u32 = 65535;
const HEADER_SIZE: usize = 12;

fn spawn_frame_collector(read_delay: Duration) -> (SocketAddr, thread::JoinHandle<Vec<Vec<u8>>>) {
    let listener =
        TcpListener::bind(SocketAddr::from((IpAddr::V4(Ipv4Addr::LOCALHOST), 0))).expect("failed to bind test listener");
    let addr = listener.local_addr().expect("failed to fetch listener addr");

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("failed to accept connection");
        if !read_delay.is_zero() {
            thread::sleep(read_delay);
        }

        let mut frames = Vec::new();
        loop {
            let mut header = [0_u8; HEADER_SIZE];
            match stream.read_exact(&mut header) {
                Ok(()) => {
                    let payload_size = u32::from_le_bytes(header[..4].try_into().unwrap()) as usize;
                    let mut payload = vec![0_u8; payload_size];
                    if stream.read_exact(&mut payload).is_err() {
                        break;
                    }
                    frames.push(payload);
                }
                Err(_) => break,
            }
        }

        frames
    });

    (addr, handle)
}

fn connect(addr: SocketAddr) -> TcpTransport {
    let mut transport = TcpTransport::connect(addr, RECV_BUFFER_SIZE, RECV_COMPACT_THRESHOLD, MAX_MSG_SIZE).unwrap();
    loop {
        match transport.poll_connect() {
            ConnectOutcome::Connected => return transport,
            ConnectOutcome::Pending => thread::sleep(Duration::from_micros(50)),
            ConnectOutcome::Failed(err) => panic!("connect failed: {err}"),
        }
    }
}

fn pump(transport: &mut TcpTransport, for_how_long: Duration) {
    let deadline = std::time::Instant::now() + for_how_long;
    while std::time::Instant::now() < deadline {
        matches!(transport.recv(), RecvOutcome::Empty);
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn queued_message_flushes_after_backpressure_released() {
    let (slow_addr, slow_handle) = spawn_frame_collector(Duration::from_millis(700));

    let mut slow = connect(slow_addr);
    slow.set_socket_buf_size(1024);

    // Fill the socket while the receiver is paused, forcing the backlog path.
    let big = vec![7_u8; 512 * 1024];
    slow.send(1, 0, &big);

    let marker = b"marker-after-backpressure".to_vec();
    slow.send(1, 0, &marker);

    // The slow side starts reading after the delay. If backlog ordering is
    // correct, both frames eventually flush and the marker is observed intact.
    pump(&mut slow, Duration::from_secs(5));
    drop(slow);

    let slow_frames = slow_handle.join().expect("slow collector thread panicked");
    assert_eq!(slow_frames.len(), 2);
    assert_eq!(slow_frames[0], big);
    assert_eq!(slow_frames[1], marker);
}
