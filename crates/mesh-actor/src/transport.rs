//! [`mesh_net::tcp::TcpTransport`] wired up as a [`collaborators::Transport`]
//! / [`collaborators::Connector`] pair, so a real socket actor talks to an
//! actual non-blocking TCP connection instead of
//! [`collaborators::mock::MockTransport`].

use mesh_net::tcp::{ConnectOutcome, RecvOutcome, TcpTransport};

use crate::{
    collaborators::{Connector, Transport, TransportConnect, TransportRecv},
    config::SocketConfig,
    error::SocketActorError,
};

pub struct TcpConnector {
    pub recv_buffer_size: usize,
    pub compact_threshold: usize,
    pub max_payload_size: u32,
}

impl TcpConnector {
    pub fn from_config(cfg: &SocketConfig) -> Self {
        Self {
            recv_buffer_size: cfg.recv_cache_size,
            compact_threshold: cfg.recv_max_size,
            max_payload_size: cfg.max_msg_size() as u32,
        }
    }
}

impl Connector for TcpConnector {
    type Transport = TcpTransportAdapter;

    fn connect(&self, endpoint: &str) -> Result<Self::Transport, SocketActorError> {
        let addr = mesh_net::endpoint::parse_tcp_endpoint(endpoint)?;
        let transport = TcpTransport::connect(addr, self.recv_buffer_size, self.compact_threshold, self.max_payload_size)
            .map_err(|err| SocketActorError::NetErr(err.to_string()))?;
        Ok(TcpTransportAdapter(transport))
    }
}

pub struct TcpTransportAdapter(TcpTransport);

impl TcpTransportAdapter {
    pub fn from_accepted(transport: TcpTransport) -> Self {
        Self(transport)
    }
}

impl Transport for TcpTransportAdapter {
    fn poll_connect(&mut self) -> TransportConnect {
        match self.0.poll_connect() {
            ConnectOutcome::Pending => TransportConnect::Pending,
            ConnectOutcome::Connected => TransportConnect::Connected,
            ConnectOutcome::Failed(err) => TransportConnect::Failed(err),
        }
    }

    fn recv(&mut self) -> TransportRecv {
        match self.0.recv() {
            RecvOutcome::Empty => TransportRecv::Empty,
            RecvOutcome::Frame { msg_type, tag_offset, payload } => TransportRecv::Frame { msg_type, tag_offset, payload },
            RecvOutcome::Disconnected => TransportRecv::Disconnected,
            RecvOutcome::FrameError(err) => TransportRecv::FrameError(err),
        }
    }

    fn send(&mut self, msg_type: u32, tag_offset: u32, payload: &[u8]) {
        self.0.send(msg_type, tag_offset, payload);
    }

    fn close(&mut self) {
        self.0.close();
    }
}
