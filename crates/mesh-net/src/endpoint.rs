//! `tcp://host:port` endpoint parsing.

use std::net::{SocketAddr, ToSocketAddrs};

use thiserror::Error;

const TCP_SCHEME: &str = "tcp://";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("unsupported protocol in endpoint {0:?}, only tcp:// is supported")]
    UnsupportedProtocol(String),
    #[error("malformed endpoint {0:?}")]
    Malformed(String),
}

pub fn parse_tcp_endpoint(endpoint: &str) -> Result<SocketAddr, EndpointError> {
    let Some(host_port) = endpoint.strip_prefix(TCP_SCHEME) else {
        return Err(EndpointError::UnsupportedProtocol(endpoint.to_owned()));
    };
    host_port
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| EndpointError::Malformed(endpoint.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_tcp_endpoint() {
        let addr = parse_tcp_endpoint("tcp://127.0.0.1:9000").unwrap();
        assert_eq!(addr.port(), 9000);
    }

    #[test]
    fn rejects_other_protocols() {
        assert_eq!(
            parse_tcp_endpoint("udp://127.0.0.1:9000"),
            Err(EndpointError::UnsupportedProtocol("udp://127.0.0.1:9000".to_owned()))
        );
    }

    #[test]
    fn rejects_malformed_host_port() {
        assert!(matches!(parse_tcp_endpoint("tcp://not-a-real-host-or-port"), Err(EndpointError::Malformed(_))));
    }
}
