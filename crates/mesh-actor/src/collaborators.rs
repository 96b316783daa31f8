//! The three collaborator traits this crate consumes, per `spec.md` §6.4.
//!
//! `gce::socket_actor` is templated on a `Context` type and reaches its
//! sibling services (`network_service`) through it; this crate inverts that
//! into three separate traits so the lifecycle driver in `crate::actor` can
//! be exercised against the `mock` implementations below without a real
//! `mio`-backed `TcpTransport`/node runtime.

use std::io;

use crate::{
    id::{Aid, CtxId, CtxIdPair, SvcId},
    pack::{Pack, Recver},
};

/// The non-blocking analogue of `spec.md`'s stream transport
/// (`init`/`connect(yield)`/`recv(buf,len,yield)`/`send`/`close`/`reset`/`wait_end`).
/// [`mesh_net::tcp::TcpTransport`] is the concrete implementation; a
/// non-blocking `close()` is synchronous, so there is no separate
/// `wait_end`.
pub trait Transport {
    /// Advances a pending outbound connection attempt.
    fn poll_connect(&mut self) -> TransportConnect;
    /// Attempts to assemble and return a single complete frame. Called
    /// repeatedly by the lifecycle driver until [`TransportRecv::Empty`].
    fn recv(&mut self) -> TransportRecv;
    /// Serialises and writes (or backlogs) one frame.
    fn send(&mut self, msg_type: u32, tag_offset: u32, payload: &[u8]);
    /// Tears down the underlying connection.
    fn close(&mut self);
}

#[derive(Debug)]
pub enum TransportConnect {
    Pending,
    Connected,
    Failed(io::Error),
}

#[derive(Debug)]
pub enum TransportRecv {
    Empty,
    Frame { msg_type: u32, tag_offset: u32, payload: Vec<u8> },
    Disconnected,
    FrameError(mesh_net::frame::FrameError),
}

/// Builds a [`Transport`] for a given endpoint string. Kept separate from
/// `Transport` itself because each reconnect attempt needs a fresh instance
/// (a `mio::net::TcpStream` cannot reconnect in place).
pub trait Connector {
    type Transport: Transport;

    fn connect(&self, endpoint: &str) -> Result<Self::Transport, crate::error::SocketActorError>;
}

/// Outcome of a remote-spawn request handed to a local actor service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    Spawned(Aid),
    FuncNotFound,
}

/// `network_service` from `spec.md` §6.4. `alloc_pack` is omitted: this
/// workspace's [`crate::pack::Pack`] is a plain owned struct with no
/// per-service arena pool (see `DESIGN.md`'s Open Question log), so callers
/// just construct one.
pub trait NetworkService {
    fn register_socket(&mut self, pair: CtxIdPair, skt: Aid);
    fn deregister_socket(&mut self, pair: CtxIdPair, skt: Aid);

    /// Delivers `pack` to `target`, which may be a local actor or another
    /// socket actor (a relay hop).
    fn send(&mut self, target: Aid, pack: Pack);

    /// Synthesizes an `ALREADY_EXITED` reply to `requester` about `recver`,
    /// used when a router has no joint socket for the addressee.
    fn send_already_exited(&mut self, requester: Aid, recver: Recver);

    /// Resolves the socket actor on this router that faces a client
    /// connected under `ctxid`, if any.
    fn select_joint_socket(&mut self, ctxid: CtxId) -> Option<Aid>;

    /// Resolves a named service to its local actor.
    fn find_service(&mut self, name: &str) -> Option<Aid>;

    fn stopped(&self) -> bool;

    fn add_actor(&mut self, aid: Aid);
    fn remove_actor(&mut self, aid: Aid);
    fn free_actor(&mut self, aid: Aid);

    fn spawn_stackful(&mut self, func: &str, stack_size: u32) -> SpawnOutcome;
    fn spawn_stackless(&mut self, func: &str) -> SpawnOutcome;
    /// `SCRIPTED` spawn: `func` is passed through as a script path. No
    /// scripting service is bundled in this workspace; a conforming
    /// [`NetworkService`] impl wires this to one of its own.
    fn spawn_scripted(&mut self, script_path: &str) -> SpawnOutcome;

    /// Delivers a local exit notification to every actor linked/monitoring
    /// `from` (step 6 of `free_self`, `spec.md` §4.8). The default
    /// [`NetworkService`] impls used by `mesh-actor` consumers typically
    /// forward this to the base actor's own `send_exit`; kept here because
    /// the socket actor has no other way to reach the local mailbox layer.
    fn send_exit(&mut self, from: Aid, code: crate::tag::ExitCode, reason: &str);

    /// One-shot `NEW_CONN` reply to whoever asked this socket actor to
    /// `connect()` (`spec.md` §4.8's outbound branch), reporting whether the
    /// very first connection attempt (or the initial phase's final retry)
    /// succeeded. Never called more than once per socket actor; see
    /// `crate::actor`'s `NewConnGuard`.
    fn report_new_conn(&mut self, originator: Aid, ok: bool, detail: &str);
}

/// `context` from `spec.md` §6.4: owns services, exposes ctxid->socket
/// registration at node scope.
pub trait Context {
    fn register_socket(&mut self, pair: CtxIdPair, skt: Aid);
    fn deregister_socket(&mut self, pair: CtxIdPair, skt: Aid);
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use std::collections::HashMap;

    use super::*;

    /// Minimal in-memory [`NetworkService`]/[`Context`] used by this crate's
    /// own unit/integration tests. Records everything it's told so tests can
    /// assert on delivered packs, registered sockets, and synthesized exits
    /// without a real node runtime.
    #[derive(Debug, Default)]
    pub struct MockNode {
        pub sent: Vec<(Aid, Pack)>,
        pub already_exited: Vec<(Aid, Recver)>,
        pub exits: Vec<(Aid, crate::tag::ExitCode, String)>,
        pub registered_sockets: HashMap<CtxIdPair, Aid>,
        pub ctx_registered_sockets: HashMap<CtxIdPair, Aid>,
        pub joint_sockets: HashMap<CtxId, Aid>,
        pub services: HashMap<String, Aid>,
        pub spawn_stackful_funcs: HashMap<String, Aid>,
        pub spawn_stackless_funcs: HashMap<String, Aid>,
        pub stopped: bool,
        pub live_actors: Vec<Aid>,
        pub new_conn_reports: Vec<(Aid, bool, String)>,
    }

    impl MockNode {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl NetworkService for MockNode {
        fn register_socket(&mut self, pair: CtxIdPair, skt: Aid) {
            self.registered_sockets.insert(pair, skt);
        }

        fn deregister_socket(&mut self, pair: CtxIdPair, skt: Aid) {
            if self.registered_sockets.get(&pair) == Some(&skt) {
                self.registered_sockets.remove(&pair);
            }
        }

        fn send(&mut self, target: Aid, pack: Pack) {
            self.sent.push((target, pack));
        }

        fn send_already_exited(&mut self, requester: Aid, recver: Recver) {
            self.already_exited.push((requester, recver));
        }

        fn select_joint_socket(&mut self, ctxid: CtxId) -> Option<Aid> {
            self.joint_sockets.get(&ctxid).copied()
        }

        fn find_service(&mut self, name: &str) -> Option<Aid> {
            self.services.get(name).copied()
        }

        fn stopped(&self) -> bool {
            self.stopped
        }

        fn add_actor(&mut self, aid: Aid) {
            self.live_actors.push(aid);
        }

        fn remove_actor(&mut self, aid: Aid) {
            self.live_actors.retain(|&a| a != aid);
        }

        fn free_actor(&mut self, _aid: Aid) {}

        fn spawn_stackful(&mut self, func: &str, _stack_size: u32) -> SpawnOutcome {
            match self.spawn_stackful_funcs.get(func) {
                Some(&aid) => SpawnOutcome::Spawned(aid),
                None => SpawnOutcome::FuncNotFound,
            }
        }

        fn spawn_stackless(&mut self, func: &str) -> SpawnOutcome {
            match self.spawn_stackless_funcs.get(func) {
                Some(&aid) => SpawnOutcome::Spawned(aid),
                None => SpawnOutcome::FuncNotFound,
            }
        }

        fn spawn_scripted(&mut self, _script_path: &str) -> SpawnOutcome {
            SpawnOutcome::FuncNotFound
        }

        fn send_exit(&mut self, from: Aid, code: crate::tag::ExitCode, reason: &str) {
            self.exits.push((from, code, reason.to_owned()));
        }

        fn report_new_conn(&mut self, originator: Aid, ok: bool, detail: &str) {
            self.new_conn_reports.push((originator, ok, detail.to_owned()));
        }
    }

    impl Context for MockNode {
        fn register_socket(&mut self, pair: CtxIdPair, skt: Aid) {
            self.ctx_registered_sockets.insert(pair, skt);
        }

        fn deregister_socket(&mut self, pair: CtxIdPair, skt: Aid) {
            if self.ctx_registered_sockets.get(&pair) == Some(&skt) {
                self.ctx_registered_sockets.remove(&pair);
            }
        }
    }

    /// A [`Transport`] the test drives by hand: queue frames for `recv` to
    /// hand back, and record everything passed to `send`.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        pub inbox: std::collections::VecDeque<TransportRecv>,
        pub outbox: Vec<(u32, u32, Vec<u8>)>,
        pub connect_outcome: Option<TransportConnect>,
        pub closed: bool,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_frame(&mut self, msg_type: u32, tag_offset: u32, payload: Vec<u8>) {
            self.inbox.push_back(TransportRecv::Frame { msg_type, tag_offset, payload });
        }
    }

    impl Transport for MockTransport {
        fn poll_connect(&mut self) -> TransportConnect {
            self.connect_outcome.take().unwrap_or(TransportConnect::Connected)
        }

        fn recv(&mut self) -> TransportRecv {
            self.inbox.pop_front().unwrap_or(TransportRecv::Empty)
        }

        fn send(&mut self, msg_type: u32, tag_offset: u32, payload: &[u8]) {
            self.outbox.push((msg_type, tag_offset, payload.to_vec()));
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    /// A [`Connector`] that hands out pre-built [`MockTransport`]s, or fails
    /// every attempt if configured to.
    #[derive(Debug, Default)]
    pub struct MockConnector {
        pub fail: bool,
    }

    impl Connector for MockConnector {
        type Transport = MockTransport;

        fn connect(&self, _endpoint: &str) -> Result<Self::Transport, crate::error::SocketActorError> {
            if self.fail {
                return Err(crate::error::SocketActorError::NetErr("mock connect failed".into()));
            }
            Ok(MockTransport::new())
        }
    }
}
