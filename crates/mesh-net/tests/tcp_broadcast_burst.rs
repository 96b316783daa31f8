use std::{
    net::{Ipv4Addr, SocketAddr},
    thread,
    time::Duration,
};

use mesh_net::tcp::{ConnectOutcome, RecvOutcome, TcpListener, TcpTransport};

const NUM_RECEIVERS: usize = 4;
const BURST_SIZE: usize = 20;
const PAYLOAD_SIZE: usize = 256 * 1024; // 256 KiB per message
const RECV_BUFFER_SIZE: usize = 320 * 1024;
const RECV_COMPACT_THRESHOLD: usize = 300 * 1024;
const MAX_MSG_SIZE: u32 = (PAYLOAD_SIZE + 4) as u32;

/// Spawns a receiver thread that connects to `addr` and collects frames
/// until the sender disconnects.
fn spawn_receiver(addr: SocketAddr) -> thread::JoinHandle<Vec<Vec<u8>>> {
    thread::spawn(move || {
        let mut transport = TcpTransport::connect(addr, RECV_BUFFER_SIZE, RECV_COMPACT_THRESHOLD, MAX_MSG_SIZE)
            .expect("receiver: failed to connect");
        // 32 KiB socket buf constrains the receiver (well below the 320 KiB
        // recv buffer) while staying >= loopback MSS (~32 KiB) so TCP window
        // updates still fire.
        transport.set_socket_buf_size(32 * 1024);
        loop {
            match transport.poll_connect() {
                ConnectOutcome::Connected => break,
                ConnectOutcome::Pending => thread::sleep(Duration::from_micros(50)),
                ConnectOutcome::Failed(err) => panic!("receiver: connect failed: {err}"),
            }
        }

        let mut frames: Vec<Vec<u8>> = Vec::new();
        let deadline = std::time::Instant::now() + Duration::from_secs(30);
        loop {
            match transport.recv() {
                RecvOutcome::Frame { payload, .. } => frames.push(payload),
                RecvOutcome::Empty => {
                    if std::time::Instant::now() > deadline {
                        break;
                    }
                    thread::sleep(Duration::from_millis(1));
                }
                RecvOutcome::Disconnected => break,
                RecvOutcome::FrameError(err) => panic!("receiver: framing error: {err}"),
            }
        }

        frames
    })
}

/// Broadcasts a burst of large messages to multiple independently-connected
/// receivers. Each connection is driven by its own [`TcpTransport`], mirroring
/// the one-transport-per-peer ownership model; the burst loop plays the role
/// a link registry would when fanning a message out to many peers.
#[test]
fn broadcast_burst_to_multiple_receivers() {
    let mut listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))).expect("failed to bind");
    let addr = listener.local_addr().unwrap();

    let handles: Vec<_> = (0..NUM_RECEIVERS).map(|_| spawn_receiver(addr)).collect();

    let mut senders = Vec::with_capacity(NUM_RECEIVERS);
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while senders.len() < NUM_RECEIVERS && std::time::Instant::now() < deadline {
        if let Some(mut transport) = listener.accept(RECV_BUFFER_SIZE, RECV_COMPACT_THRESHOLD, MAX_MSG_SIZE).unwrap() {
            // Small send buffer forces backpressure after the first partial
            // write of each 256 KiB frame.
            transport.set_socket_buf_size(4096);
            senders.push(transport);
        }
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(senders.len(), NUM_RECEIVERS, "not all receivers connected");

    for seq in 0..BURST_SIZE {
        let mut payload = Vec::with_capacity(PAYLOAD_SIZE);
        payload.extend_from_slice(&(seq as u32).to_le_bytes());
        payload.resize(PAYLOAD_SIZE, (seq & 0xFF) as u8);

        for transport in &mut senders {
            transport.send(1, 0, &payload);
        }
        // Pump between writes so each backlog gets a chance to flush.
        for _ in 0..50 {
            for transport in &mut senders {
                matches!(transport.recv(), RecvOutcome::Empty);
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    // Pump until all backlogs are drained.
    let flush_deadline = std::time::Instant::now() + Duration::from_secs(5);
    while std::time::Instant::now() < flush_deadline {
        for transport in &mut senders {
            matches!(transport.recv(), RecvOutcome::Empty);
        }
        thread::sleep(Duration::from_millis(1));
    }

    drop(senders);

    for (i, handle) in handles.into_iter().enumerate() {
        let frames = handle.join().unwrap_or_else(|_| panic!("receiver {i} panicked"));

        assert_eq!(frames.len(), BURST_SIZE, "receiver {i}: expected {BURST_SIZE} frames, got {}", frames.len());

        for (seq, frame) in frames.iter().enumerate() {
            assert_eq!(frame.len(), PAYLOAD_SIZE, "receiver {i} frame {seq}: wrong payload size");

            let got_seq = u32::from_le_bytes(frame[..4].try_into().unwrap()) as usize;
            assert_eq!(got_seq, seq, "receiver {i}: frame out of order");

            let expected_fill = (seq & 0xFF) as u8;
            assert!(frame[4..].iter().all(|&b| b == expected_fill), "receiver {i} frame {seq}: payload corrupted");
        }
    }
}
