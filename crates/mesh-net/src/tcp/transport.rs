use std::{
    collections::VecDeque,
    io::{self, IoSlice, Read, Write},
    net::SocketAddr,
};

use mesh_util::safe_assert;
use mio::{Events, Interest, Poll, event::Event};
use tracing::{debug, warn};

use crate::{
    frame::{self, FrameError, Header, HEADER_SIZE},
    recv_buffer::RecvBuffer,
    tcp::{transport::stream::set_socket_buf_size, TRANSPORT_TOKEN},
};

mod stream {
    pub(super) fn set_socket_buf_size(stream: &mio::net::TcpStream, size: usize) {
        use std::os::fd::AsRawFd;
        let fd = stream.as_raw_fd();
        let size = size as libc::c_int;
        unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_SNDBUF,
                &size as *const _ as *const libc::c_void,
                core::mem::size_of::<libc::c_int>() as libc::socklen_t,
            );
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_RCVBUF,
                &size as *const _ as *const libc::c_void,
                core::mem::size_of::<libc::c_int>() as libc::socklen_t,
            );
        }
    }
}

/// Response type for all calls that perform IO: `Alive` means the connection
/// is still usable, `Disconnected` means the peer is gone and the caller must
/// rebuild state around a fresh transport.
#[derive(Debug, PartialEq, Eq)]
pub enum ConnState {
    Alive,
    Disconnected,
}

pub enum ConnectOutcome {
    Pending,
    Connected,
    Failed(io::Error),
}

#[derive(Debug)]
pub enum RecvOutcome {
    /// Nothing new has fully arrived yet; the transport is still alive.
    Empty,
    Frame { msg_type: u32, tag_offset: u32, payload: Vec<u8> },
    Disconnected,
    /// Peer sent a header whose payload would not fit the configured bound.
    FrameError(FrameError),
}

#[derive(Clone, Copy)]
enum RxState {
    ReadingHeader { buf: [u8; HEADER_SIZE], have: usize },
    ReadingPayload { header: Header },
}

/// One mio-backed, non-blocking TCP connection, framed per [`crate::frame`].
///
/// The caller drives this: call [`Self::poll`] to learn which interest fired,
/// then [`Self::recv`] (repeatedly, until [`RecvOutcome::Empty`]) and, to
/// flush a backlog built up from a previous [`Self::send`] that blocked,
/// nothing further is needed — `recv`/`send` both drain the backlog as a
/// side effect of being called.
pub struct TcpTransport {
    stream: mio::net::TcpStream,
    poll: Poll,
    events: Events,
    peer_addr: SocketAddr,
    connecting: bool,

    rx_state: RxState,
    rx_buf: RecvBuffer,
    max_payload_size: u32,

    send_backlog: VecDeque<Vec<u8>>,
    writable_armed: bool,
}

impl TcpTransport {
    /// Begins a non-blocking outbound connection attempt. Call
    /// [`Self::poll_connect`] until it resolves.
    pub fn connect(addr: SocketAddr, recv_buffer_size: usize, compact_threshold: usize, max_payload_size: u32) -> io::Result<Self> {
        let stream = mio::net::TcpStream::connect(addr)?;
        Self::new(stream, addr, true, recv_buffer_size, compact_threshold, max_payload_size)
    }

    /// Wraps a stream handed back by [`super::TcpListener::accept`].
    pub fn from_accepted(
        stream: mio::net::TcpStream,
        peer_addr: SocketAddr,
        recv_buffer_size: usize,
        compact_threshold: usize,
        max_payload_size: u32,
    ) -> io::Result<Self> {
        Self::new(stream, peer_addr, false, recv_buffer_size, compact_threshold, max_payload_size)
    }

    fn new(
        mut stream: mio::net::TcpStream,
        peer_addr: SocketAddr,
        connecting: bool,
        recv_buffer_size: usize,
        compact_threshold: usize,
        max_payload_size: u32,
    ) -> io::Result<Self> {
        safe_assert!(
            max_payload_size as usize <= recv_buffer_size,
            "max_payload_size must fit within recv_buffer_size"
        );
        stream.set_nodelay(true)?;
        let poll = Poll::new()?;
        let interest = if connecting { Interest::WRITABLE } else { Interest::READABLE };
        poll.registry().register(&mut stream, TRANSPORT_TOKEN, interest)?;

        Ok(Self {
            stream,
            poll,
            events: Events::with_capacity(4),
            peer_addr,
            connecting,
            rx_state: RxState::ReadingHeader { buf: [0; HEADER_SIZE], have: 0 },
            rx_buf: RecvBuffer::new(recv_buffer_size, compact_threshold),
            max_payload_size,
            send_backlog: VecDeque::with_capacity(8),
            writable_armed: connecting,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn set_socket_buf_size(&self, size: usize) {
        set_socket_buf_size(&self.stream, size);
    }

    /// Polls the OS for readiness with a zero timeout; a no-op if nothing is
    /// ready yet. Must be called before [`Self::recv`]/during a pending
    /// [`Self::poll_connect`] to pick up new events.
    fn poll_events(&mut self) -> io::Result<()> {
        self.poll.poll(&mut self.events, Some(std::time::Duration::ZERO))
    }

    /// Advances a pending outbound connection. Returns `Connected` once the
    /// kernel reports the socket writable and `take_error` is clean.
    pub fn poll_connect(&mut self) -> ConnectOutcome {
        if !self.connecting {
            return ConnectOutcome::Connected;
        }
        if let Err(err) = self.poll_events() {
            return ConnectOutcome::Failed(err);
        }
        let became_writable = self.events.iter().any(|e| e.token() == TRANSPORT_TOKEN && e.is_writable());
        if !became_writable {
            return ConnectOutcome::Pending;
        }
        match self.stream.take_error() {
            Ok(Some(err)) => ConnectOutcome::Failed(err),
            Ok(None) => {
                self.connecting = false;
                if let Err(err) = self.poll.registry().reregister(&mut self.stream, TRANSPORT_TOKEN, Interest::READABLE) {
                    return ConnectOutcome::Failed(err);
                }
                self.writable_armed = false;
                ConnectOutcome::Connected
            }
            Err(err) => ConnectOutcome::Failed(err),
        }
    }

    /// Attempts to assemble and return a single complete frame. Call
    /// repeatedly until `Empty` to fully drain what the kernel currently has
    /// buffered.
    pub fn recv(&mut self) -> RecvOutcome {
        if let Err(err) = self.poll_events() {
            debug!(?err, "mesh-net: poll before recv");
            return RecvOutcome::Disconnected;
        }
        let writable = self.events.iter().any(|e| e.token() == TRANSPORT_TOKEN && e.is_writable());
        let readable = self.events.iter().any(|e| e.token() == TRANSPORT_TOKEN && e.is_readable());

        if writable && self.drain_backlog() == ConnState::Disconnected {
            return RecvOutcome::Disconnected;
        }
        if !readable {
            return RecvOutcome::Empty;
        }
        self.read_frame()
    }

    fn read_frame(&mut self) -> RecvOutcome {
        loop {
            match self.rx_state {
                RxState::ReadingHeader { mut buf, mut have } => {
                    while have < HEADER_SIZE {
                        match self.stream.read(&mut buf[have..]) {
                            Ok(0) => return RecvOutcome::Disconnected,
                            Ok(n) => {
                                have += n;
                                if have == HEADER_SIZE {
                                    let header = Header::decode(&buf);
                                    if let Err(err) = frame::validate(&header, self.max_payload_size) {
                                        return RecvOutcome::FrameError(err);
                                    }
                                    self.rx_state = RxState::ReadingPayload { header };
                                }
                            }
                            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                                self.rx_state = RxState::ReadingHeader { buf, have };
                                return RecvOutcome::Empty;
                            }
                            Err(err) => {
                                debug!(?err, "mesh-net: read header");
                                return RecvOutcome::Disconnected;
                            }
                        }
                    }
                }

                RxState::ReadingPayload { header } => {
                    let want = header.payload_size as usize;
                    while (self.rx_buf.len()) < want {
                        if self.rx_buf.spare_capacity_mut().is_empty() {
                            self.rx_buf.compact();
                        }
                        match self.stream.read(self.rx_buf.spare_capacity_mut()) {
                            Ok(0) => return RecvOutcome::Disconnected,
                            Ok(n) => self.rx_buf.advance_write(n),
                            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return RecvOutcome::Empty,
                            Err(err) => {
                                debug!(?err, "mesh-net: read payload");
                                return RecvOutcome::Disconnected;
                            }
                        }
                    }

                    let payload = self.rx_buf.unread()[..want].to_vec();
                    self.rx_buf.advance_read(want);
                    self.rx_state = RxState::ReadingHeader { buf: [0; HEADER_SIZE], have: 0 };
                    return RecvOutcome::Frame {
                        msg_type: header.msg_type,
                        tag_offset: header.tag_offset,
                        payload,
                    };
                }
            }
        }
    }

    /// Serialises `header` and `payload` and writes them, falling back to
    /// the backlog queue (flushed on later writable events) when the kernel
    /// would block. Always attempts to drain any pending backlog first so
    /// frames stay in order.
    pub fn send(&mut self, msg_type: u32, tag_offset: u32, payload: &[u8]) -> ConnState {
        safe_assert!(payload.len() <= u32::MAX as usize, "payload too large to frame");
        let header = Header { payload_size: payload.len() as u32, msg_type, tag_offset };
        let header_bytes = header.encode();

        if !self.send_backlog.is_empty() {
            self.enqueue_back(header_bytes.to_vec());
            return self.enqueue_back(payload.to_vec());
        }

        match self.stream.write_vectored(&[IoSlice::new(&header_bytes), IoSlice::new(payload)]) {
            Ok(0) => {
                warn!("mesh-net: stream failed to write, disconnecting");
                ConnState::Disconnected
            }
            Ok(n) if n == header_bytes.len() + payload.len() => ConnState::Alive,
            Ok(n) if n < HEADER_SIZE => {
                self.enqueue_front(payload.to_vec());
                self.enqueue_front(header_bytes[n..].to_vec())
            }
            Ok(n) => self.enqueue_front(payload[n - HEADER_SIZE..].to_vec()),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.enqueue_back(header_bytes.to_vec());
                self.enqueue_back(payload.to_vec())
            }
            Err(err) => {
                warn!(?err, "mesh-net: stream write failed");
                ConnState::Disconnected
            }
        }
    }

    /// Flushes whatever is backlogged; call after a writable event, or it
    /// happens implicitly inside [`Self::send`]/[`Self::recv`]'s poll.
    pub fn drain_backlog(&mut self) -> ConnState {
        while let Some(front) = self.send_backlog.front_mut() {
            match self.stream.write(front) {
                Ok(0) => return ConnState::Disconnected,
                Ok(n) if n == front.len() => {
                    self.send_backlog.pop_front();
                }
                Ok(n) => {
                    front.drain(..n);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    debug!(?err, "mesh-net: write from backlog");
                    return ConnState::Disconnected;
                }
            }
        }

        if self.send_backlog.is_empty() && self.writable_armed {
            if let Err(err) = self.poll.registry().reregister(&mut self.stream, TRANSPORT_TOKEN, Interest::READABLE) {
                debug!(?err, "mesh-net: reregister drop writable");
                return ConnState::Disconnected;
            }
            self.writable_armed = false;
        }
        ConnState::Alive
    }

    fn enqueue_front(&mut self, data: Vec<u8>) -> ConnState {
        self.send_backlog.push_front(data);
        self.arm_writable()
    }

    fn enqueue_back(&mut self, data: Vec<u8>) -> ConnState {
        self.send_backlog.push_back(data);
        self.arm_writable()
    }

    fn arm_writable(&mut self) -> ConnState {
        if !self.writable_armed {
            if let Err(err) =
                self.poll.registry().reregister(&mut self.stream, TRANSPORT_TOKEN, Interest::READABLE | Interest::WRITABLE)
            {
                debug!(?err, "mesh-net: poll reregister");
                return ConnState::Disconnected;
            }
            self.writable_armed = true;
        }
        ConnState::Alive
    }

    /// Drops this connection. The caller owns reconnection policy; this only
    /// tears down the socket and clears framing state.
    pub fn close(&mut self) {
        let _ = self.poll.registry().deregister(&mut self.stream);
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }

    /// Clears framing/backlog state for a fresh connect cycle, without
    /// touching the (already-closed) socket. Called by the reconnect driver
    /// right before it builds a new [`TcpTransport`] to replace this one.
    pub fn reset(&mut self) {
        self.rx_buf.clear();
        self.rx_state = RxState::ReadingHeader { buf: [0; HEADER_SIZE], have: 0 };
        self.send_backlog.clear();
    }
}
