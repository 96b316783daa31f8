mod listener;
mod transport;

pub use listener::TcpListener;
pub use transport::{ConnState, ConnectOutcome, RecvOutcome, TcpTransport};

pub(crate) const TRANSPORT_TOKEN: mio::Token = mio::Token(0);
