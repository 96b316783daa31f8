//! Error taxonomy, per `spec.md` §7.

use thiserror::Error;

use mesh_net::{endpoint::EndpointError, frame::FrameError};

/// Reasons a link/monitor survivor or local linker is told the connection
/// died. `code()` is what travels on the wire inside an `EXIT`/`FWD_EXIT` tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    Normal,
    /// Transport read/write failure or heartbeat timeout.
    NetErr,
    /// A malformed frame or an oversized payload.
    FrameErr,
    /// The socket actor caught an unexpected internal failure.
    Except,
}

impl ExitReason {
    pub fn code(self) -> crate::tag::ExitCode {
        match self {
            ExitReason::Normal => 0,
            ExitReason::NetErr => 1,
            ExitReason::FrameErr => 2,
            ExitReason::Except => 3,
        }
    }
}

#[derive(Debug, Error)]
pub enum SocketActorError {
    /// Transport read/write failure or heartbeat timeout. Recoverable via
    /// reconnect until `reconn_try` is exhausted, at which point it becomes
    /// fatal to the connection (not to the actor, if an outbound actor still
    /// has reconnect attempts left per `spec.md` §4.4).
    #[error("network error: {0}")]
    NetErr(String),

    /// Header malformed, or `payload_size > MAX_MSG_SIZE`. Fatal; closes the
    /// connection.
    #[error("frame error: {0}")]
    FrameErr(#[from] FrameError),

    /// Endpoint parse failure. Fatal at `connect()`, raised to the caller
    /// before any socket is created.
    #[error("endpoint error: {0}")]
    UnsupportedProtocol(#[from] EndpointError),

    /// Missing remote-spawn function. Surfaced via `SPAWN_RET` with
    /// `is_err_ret = true`; not fatal to the socket actor.
    #[error("remote spawn function not found")]
    SpawnFuncNotFound,

    /// Router-mode spawn relay found no joint socket for the target ctxid.
    /// Surfaced the same way as [`Self::SpawnFuncNotFound`].
    #[error("no socket route to relay spawn request")]
    SpawnNoSocket,

    /// Cooperative cancellation: `close()` was called while a `tick()` was
    /// mid-connect or mid-recv. Treated as a normal `OFF` transition, not
    /// reported as a failure to any collaborator.
    #[error("operation aborted")]
    OperationAborted,

    /// Any uncaught internal failure inside the recv loop. Logged and
    /// converted to a fatal close with [`ExitReason::Except`].
    #[error("internal exception: {0}")]
    Exception(String),
}

impl SocketActorError {
    /// Maps a taxonomy entry onto the exit reason synthesized for surviving
    /// link-registry entries and reported to local linkers, per `spec.md`
    /// §7 "Propagation".
    pub fn exit_reason(&self) -> ExitReason {
        match self {
            SocketActorError::NetErr(_) => ExitReason::NetErr,
            SocketActorError::FrameErr(_) => ExitReason::FrameErr,
            SocketActorError::Exception(_) => ExitReason::Except,
            SocketActorError::UnsupportedProtocol(_)
            | SocketActorError::SpawnFuncNotFound
            | SocketActorError::SpawnNoSocket
            | SocketActorError::OperationAborted => ExitReason::NetErr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neterr_maps_to_neterr_exit_reason() {
        assert_eq!(SocketActorError::NetErr("boom".into()).exit_reason(), ExitReason::NetErr);
    }

    #[test]
    fn exception_maps_to_except_exit_reason() {
        assert_eq!(SocketActorError::Exception("boom".into()).exit_reason(), ExitReason::Except);
    }
}
