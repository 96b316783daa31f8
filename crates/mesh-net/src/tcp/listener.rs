use std::{io, net::SocketAddr};

use mio::{Events, Interest, Poll};

use crate::tcp::{TcpTransport, TRANSPORT_TOKEN};

/// A single non-blocking listening socket. One accepted connection is
/// handed back per [`Self::accept`] call; the caller wraps it in a
/// [`TcpTransport`] via [`TcpTransport::from_accepted`].
pub struct TcpListener {
    listener: mio::net::TcpListener,
    poll: Poll,
    events: Events,
}

impl TcpListener {
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let mut listener = mio::net::TcpListener::bind(addr)?;
        let poll = Poll::new()?;
        poll.registry().register(&mut listener, TRANSPORT_TOKEN, Interest::READABLE)?;
        Ok(Self { listener, poll, events: Events::with_capacity(4) })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts at most one pending connection. Returns `Ok(None)` when
    /// nothing is waiting.
    pub fn accept(
        &mut self,
        recv_buffer_size: usize,
        compact_threshold: usize,
        max_payload_size: u32,
    ) -> io::Result<Option<TcpTransport>> {
        self.poll.poll(&mut self.events, Some(std::time::Duration::ZERO))?;
        if !self.events.iter().any(|e| e.token() == TRANSPORT_TOKEN && e.is_readable()) {
            return Ok(None);
        }
        match self.listener.accept() {
            Ok((stream, peer_addr)) => {
                TcpTransport::from_accepted(stream, peer_addr, recv_buffer_size, compact_threshold, max_payload_size)
                    .map(Some)
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err),
        }
    }
}
