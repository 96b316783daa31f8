//! Lifecycle driver (C8), per `spec.md` §4.8.
//!
//! `gce::socket_actor` runs as a stackful coroutine suspended at
//! `transport.connect`/`recv`/`send`/`timer.wait`. This workspace's
//! transport layer ([`mesh_net::tcp::TcpTransport`]) is non-blocking
//! `mio`-polling instead, so the driver is realized as [`SocketActor::tick`],
//! called repeatedly by the owning runtime; a "suspension point" is just a
//! `tick()` that finds nothing ready and returns without advancing state.
//!
//! A [`SocketActor`] owns one connection (outbound, built by [`Self::connect`]
//! against a [`Connector`], or accepted, built by [`Self::accept`] around an
//! already-live [`Transport`]) and is itself generic only over the
//! [`Transport`] type; [`NetworkService`]/[`Context`] are passed into every
//! call that needs them, matching the rest of this crate's collaborator
//! pattern (`crate::dispatch`, `crate::ctx_glue`).

use std::collections::VecDeque;

use indexmap::IndexMap;

use crate::{
    collaborators::{Connector, Context, NetworkService, Transport, TransportConnect, TransportRecv},
    config::SocketConfig,
    ctx_glue,
    dispatch::{self, DispatchOutcome},
    envelope::{msg_type, Envelope},
    error::{ExitReason, SocketActorError},
    heartbeat::{Heartbeat, OnTimeout, PollOutcome},
    id::{Aid, CtxId, CtxIdPair, Role, Sid, SvcId},
    pack::{self, Pack, Recver},
    reconnect::{ReconnectAction, ReconnectConfig, ReconnectDriver},
    registry::LinkRegistry,
    spawn::{self, RemoteFuncs},
    tag::{self, RoutingTag},
    wire,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Ready,
    On,
    Off,
}

/// Realizes `gce::socket_actor::connect(yield, init)`'s scope-guard one-shot
/// `NEW_CONN` reply as a `Drop` guard, per `SPEC_FULL.md` §4.8. `Drop::drop`
/// takes no arguments, so it cannot itself call into a borrowed
/// [`NetworkService`]; the actual report is always delivered by
/// [`NewConnGuard::fire`], called from every known exit path of the
/// initial-connect phase ([`SocketActor::on_connected`]'s first success,
/// [`ReconnectAction::ReportInitialFailure`], and a `close`/fatal close while
/// still pending). `fire` consumes `self` and disarms before returning, so
/// `Drop` only ever does anything when none of those paths ran — a
/// diagnostic backstop for a bug, not a delivery mechanism.
struct NewConnGuard {
    originator: Aid,
    armed: bool,
}

impl NewConnGuard {
    fn new(originator: Aid) -> Self {
        Self { originator, armed: true }
    }

    fn fire(mut self, svc: &mut impl NetworkService, ok: bool, detail: &str) {
        svc.report_new_conn(self.originator, ok, detail);
        self.armed = false;
    }
}

impl Drop for NewConnGuard {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(originator = ?self.originator, "NEW_CONN reply never delivered");
        }
    }
}

/// The per-connection component described end to end by `spec.md`: owns a
/// [`LinkRegistry`], [`Heartbeat`], and (for the outbound branch) a
/// [`ReconnectDriver`], and bridges wire frames to [`Pack`]s for a
/// [`NetworkService`] collaborator.
pub struct SocketActor<T: Transport> {
    self_aid: Aid,
    self_ctxid: CtxId,
    is_router: bool,
    state: State,
    /// Whether `transport` currently holds a live connection. `false` while
    /// disconnected and either reconnecting or (for the inbound branch)
    /// already on the way to a fatal close.
    conn: bool,
    /// The ctxid pair registered at `start()`, before any `LOGIN`/`LOGIN_RET`
    /// has been processed: `(target_ctxid, COMM|ROUTER)` for the outbound
    /// branch, `CtxIdPair::PROVISIONAL_JOINT` for the inbound branch.
    initial_pair: CtxIdPair,
    curr_ctxid_pair: CtxIdPair,
    transport: Option<T>,
    connector: Option<Box<dyn Connector<Transport = T>>>,
    endpoint: Option<String>,
    reconnect: Option<ReconnectDriver>,
    heartbeat: Heartbeat,
    registry: LinkRegistry,
    remote_funcs: RemoteFuncs,
    /// Outbound frames submitted while `conn = false`, flushed in order on
    /// the next successful (re)connect, before any newer frame (`spec.md`
    /// §5 ordering guarantees).
    conn_cache: VecDeque<(u32, u32, Vec<u8>)>,
    /// `sid -> recver` for in-flight `SPAWN` requests sent out on this
    /// socket, so the bare `{err, id, aid}` `SPAWN_RET` reply (which carries
    /// no addressing of its own — see `crate::dispatch`'s module docs on why
    /// it writes straight back rather than through `svc.send`) can still be
    /// routed to the original spawner, or the joint socket it was relayed
    /// through in router mode, once it lands back on this wire.
    pending_spawns: IndexMap<Sid, Recver>,
    pending_new_conn: Option<NewConnGuard>,
}

impl<T: Transport> SocketActor<T> {
    /// Outbound branch of `spec.md` §4.8. Validates the endpoint eagerly
    /// (fatal at `make_socket`, before any socket exists) and registers
    /// `(target_ctxid, role_toward_peer)` as the provisional pair used until
    /// `LOGIN_RET` reconciles it.
    #[allow(clippy::too_many_arguments)]
    pub fn connect(
        self_aid: Aid,
        self_ctxid: CtxId,
        originator: Aid,
        endpoint: &str,
        target_ctxid: CtxId,
        role_toward_peer: Role,
        is_router: bool,
        cfg: &SocketConfig,
        connector: Box<dyn Connector<Transport = T>>,
        remote_funcs: RemoteFuncs,
    ) -> Result<Self, SocketActorError> {
        mesh_net::endpoint::parse_tcp_endpoint(endpoint)?;
        Ok(Self {
            self_aid,
            self_ctxid,
            is_router,
            state: State::Ready,
            conn: false,
            initial_pair: CtxIdPair { ctxid: target_ctxid, role: role_toward_peer },
            curr_ctxid_pair: CtxIdPair { ctxid: CtxId::NIL, role: Role::Comm },
            transport: None,
            connector: Some(connector),
            endpoint: Some(endpoint.to_owned()),
            reconnect: Some(ReconnectDriver::new(ReconnectConfig {
                init_reconn_period: cfg.init_reconn_period,
                init_reconn_try: cfg.init_reconn_try,
                reconn_period: cfg.reconn_period,
                reconn_try: cfg.reconn_try,
            })),
            heartbeat: Heartbeat::new(cfg.heartbeat_period, cfg.heartbeat_count, OnTimeout::Reconnect),
            registry: LinkRegistry::new(),
            remote_funcs,
            conn_cache: VecDeque::new(),
            pending_spawns: IndexMap::new(),
            pending_new_conn: Some(NewConnGuard::new(originator)),
        })
    }

    /// Inbound branch of `spec.md` §4.8: `transport` is already an accepted,
    /// live connection. No reconnect driver — a lost connection here is
    /// unconditionally fatal.
    pub fn accept(self_aid: Aid, self_ctxid: CtxId, transport: T, is_router: bool, cfg: &SocketConfig, remote_funcs: RemoteFuncs) -> Self {
        Self {
            self_aid,
            self_ctxid,
            is_router,
            state: State::Ready,
            conn: true,
            initial_pair: CtxIdPair::PROVISIONAL_JOINT,
            curr_ctxid_pair: CtxIdPair { ctxid: CtxId::NIL, role: Role::Comm },
            transport: Some(transport),
            connector: None,
            endpoint: None,
            reconnect: None,
            heartbeat: Heartbeat::new(cfg.heartbeat_period, cfg.heartbeat_count, OnTimeout::Close),
            registry: LinkRegistry::new(),
            remote_funcs,
            conn_cache: VecDeque::new(),
            pending_spawns: IndexMap::new(),
            pending_new_conn: None,
        }
    }

    pub fn aid(&self) -> Aid {
        self.self_aid
    }

    pub fn is_on(&self) -> bool {
        matches!(self.state, State::On)
    }

    pub fn is_off(&self) -> bool {
        matches!(self.state, State::Off)
    }

    pub fn curr_ctxid_pair(&self) -> CtxIdPair {
        self.curr_ctxid_pair
    }

    pub fn conn_cache_len(&self) -> usize {
        self.conn_cache.len()
    }

    /// Whether `transport` currently holds a live connection (as opposed to
    /// disconnected-and-reconnecting or not yet connected for the first
    /// time).
    pub fn is_connected(&self) -> bool {
        self.conn
    }

    /// Advances the driver by one step. Cheap and non-blocking: every branch
    /// either makes one state transition's worth of progress or returns
    /// immediately with nothing to do, per `spec.md` §4.8/§5's "suspension
    /// point" model.
    pub fn tick(&mut self, svc: &mut impl NetworkService, ctx: &mut impl Context) {
        if matches!(self.state, State::Off) {
            return;
        }
        if matches!(self.state, State::Ready) {
            self.start(svc, ctx);
        }
        if !matches!(self.state, State::On) {
            return;
        }
        if self.conn {
            self.pump(svc, ctx);
        } else {
            self.drive_reconnect(svc, ctx);
        }
    }

    /// A local actor handing this socket a [`Pack`] to send remote. Tracks
    /// `SPAWN` correlation, runs C6's outbound leg, and writes (or
    /// `conn_cache`s) the result.
    pub fn send(&mut self, pack: Pack) {
        if !matches!(self.state, State::On) {
            return;
        }
        if let RoutingTag::Spawn { id, .. } = &pack.tag {
            self.pending_spawns.insert(*id, pack.recver);
        }
        let env = dispatch::handle_outbound(pack, &mut self.registry);
        self.write_frame(env);
    }

    /// `spec.md` §4.8 `close()`: a normal, caller-initiated shutdown.
    pub fn close(&mut self, svc: &mut impl NetworkService, ctx: &mut impl Context) {
        self.shutdown(svc, ctx, ExitReason::Normal, "closed");
    }

    fn start(&mut self, svc: &mut impl NetworkService, ctx: &mut impl Context) {
        self.curr_ctxid_pair = ctx_glue::sync_ctxid(svc, ctx, self.self_aid, self.initial_pair, self.curr_ctxid_pair);
        svc.add_actor(self.self_aid);
        self.state = State::On;
        if self.conn {
            self.heartbeat.start();
        }
    }

    fn pump(&mut self, svc: &mut impl NetworkService, ctx: &mut impl Context) {
        match self.heartbeat.poll() {
            PollOutcome::Idle => {}
            PollOutcome::Tick => {
                if let Some(t) = &mut self.transport {
                    t.send(msg_type::HB, 0, &[]);
                }
            }
            PollOutcome::TimedOut(_on_timeout) => {
                self.fail_connection(svc, ctx, "heartbeat timeout");
                return;
            }
        }

        loop {
            if !matches!(self.state, State::On) || !self.conn || self.transport.is_none() {
                return;
            }
            let outcome = self.transport.as_mut().expect("checked above").recv();
            match outcome {
                TransportRecv::Empty => return,
                TransportRecv::Disconnected => {
                    self.fail_connection(svc, ctx, "peer disconnected");
                    return;
                }
                TransportRecv::FrameError(err) => {
                    self.fatal_close(svc, ctx, SocketActorError::FrameErr(err));
                    return;
                }
                TransportRecv::Frame { msg_type, tag_offset, payload } => {
                    self.heartbeat.beat();
                    self.handle_frame(svc, ctx, msg_type, tag_offset, payload);
                }
            }
        }
    }

    fn drive_reconnect(&mut self, svc: &mut impl NetworkService, ctx: &mut impl Context) {
        if self.transport.is_some() {
            let outcome = self.transport.as_mut().expect("checked above").poll_connect();
            match outcome {
                TransportConnect::Pending => {}
                TransportConnect::Connected => self.on_connected(svc),
                TransportConnect::Failed(err) => self.fail_connection(svc, ctx, &err.to_string()),
            }
            return;
        }

        let Some(driver) = &mut self.reconnect else { return };
        match driver.poll() {
            ReconnectAction::Wait => {}
            ReconnectAction::Attempt => self.begin_connect_attempt(svc, ctx),
            ReconnectAction::ReportInitialFailure => {
                if let Some(guard) = self.pending_new_conn.take() {
                    guard.fire(svc, false, "initial connect attempts exhausted");
                }
            }
        }
    }

    fn begin_connect_attempt(&mut self, svc: &mut impl NetworkService, ctx: &mut impl Context) {
        let endpoint = self.endpoint.clone().expect("outbound actors always carry an endpoint");
        let outcome = self.connector.as_ref().expect("outbound actors always carry a connector").connect(&endpoint);
        let mut t = match outcome {
            Ok(t) => t,
            Err(err) => {
                self.fail_connection(svc, ctx, &err.to_string());
                return;
            }
        };
        // A non-blocking connect can complete synchronously (loopback
        // connections commonly do); check right away instead of waiting an
        // extra `tick()` to notice.
        match t.poll_connect() {
            TransportConnect::Pending => self.transport = Some(t),
            TransportConnect::Connected => {
                self.transport = Some(t);
                self.on_connected(svc);
            }
            TransportConnect::Failed(err) => self.fail_connection(svc, ctx, &err.to_string()),
        }
    }

    /// Writes `LOGIN` then drains `conn_cache` in order, satisfying the
    /// "`LOGIN`, then buffered frames in submission order" invariant on
    /// every (re)connect, first or otherwise.
    fn on_connected(&mut self, svc: &mut impl NetworkService) {
        self.conn = true;
        if let Some(driver) = &mut self.reconnect {
            driver.on_success();
        }
        if let Some(guard) = self.pending_new_conn.take() {
            guard.fire(svc, true, "connected");
        }

        let login = wire::encode_login(self.self_ctxid);
        let len = login.len() as u32;
        if let Some(t) = &mut self.transport {
            t.send(msg_type::LOGIN, len, &login);
        }

        self.heartbeat.start();

        while let Some((mt, to, payload)) = self.conn_cache.pop_front() {
            if let Some(t) = &mut self.transport {
                t.send(mt, to, &payload);
            }
        }
    }

    /// A live connection was lost, or a reconnect attempt itself failed.
    /// Feeds the reconnect driver (absent for inbound actors, where this is
    /// unconditionally fatal) and closes for good once its budget is spent.
    fn fail_connection(&mut self, svc: &mut impl NetworkService, ctx: &mut impl Context, detail: &str) {
        if let Some(t) = &mut self.transport {
            t.close();
        }
        self.transport = None;
        self.conn = false;

        let give_up = match &mut self.reconnect {
            None => true,
            Some(driver) => {
                driver.on_failure();
                driver.steady_state_exhausted()
            }
        };
        if give_up {
            self.fatal_close(svc, ctx, SocketActorError::NetErr(detail.to_owned()));
        }
    }

    fn fatal_close(&mut self, svc: &mut impl NetworkService, ctx: &mut impl Context, err: SocketActorError) {
        let reason = err.exit_reason();
        let msg = err.to_string();
        self.shutdown(svc, ctx, reason, &msg);
    }

    /// `free_self`, `spec.md` §4.8 steps 1-7 (steps 1/2, awaiting subsidiary
    /// tasks and releasing the transport, already happened in whichever
    /// caller led here: `fail_connection`'s `t.close()`, or directly here
    /// for a plain `close()`).
    fn shutdown(&mut self, svc: &mut impl NetworkService, ctx: &mut impl Context, reason: ExitReason, msg: &str) {
        if matches!(self.state, State::Off) {
            return;
        }
        self.heartbeat.stop();
        if let Some(t) = &mut self.transport {
            t.close();
        }
        self.transport = None;
        if let Some(driver) = &mut self.reconnect {
            driver.abort_wait();
        }
        if let Some(guard) = self.pending_new_conn.take() {
            guard.fire(svc, false, msg);
        }

        svc.deregister_socket(self.curr_ctxid_pair, self.self_aid);
        ctx.deregister_socket(self.curr_ctxid_pair, self.self_aid);
        svc.remove_actor(self.self_aid);

        let code = reason.code();
        for exit in self.registry.on_neterr(self.self_aid, code) {
            let mut payload = wire::encode_exit(code, msg);
            let tag_offset = payload.len() as u32;
            exit.tag.encode(&mut payload);
            let env = Envelope { msg_type: msg_type::EXIT, tag_offset, payload };
            let pack = Pack {
                tag: exit.tag,
                recver: Recver::aid(exit.recver, CtxId::NIL),
                svc: SvcId::NIL,
                skt: self.self_aid,
                is_err_ret: false,
                msg: env,
            };
            svc.send(exit.target, pack);
        }
        svc.send_exit(self.self_aid, code, msg);
        svc.free_actor(self.self_aid);

        self.conn = false;
        self.state = State::Off;
    }

    fn write_frame(&mut self, env: Envelope) {
        if self.conn {
            if let Some(t) = &mut self.transport {
                t.send(env.msg_type, env.tag_offset, &env.payload);
                return;
            }
        }
        self.conn_cache.push_back((env.msg_type, env.tag_offset, env.payload));
    }

    fn handle_frame(&mut self, svc: &mut impl NetworkService, ctx: &mut impl Context, mt: u32, tag_offset: u32, payload: Vec<u8>) {
        match mt {
            msg_type::LOGIN => self.handle_login(svc, ctx, &payload),
            msg_type::LOGIN_RET => self.handle_login_ret(svc, ctx, &payload),
            msg_type::HB => {}
            msg_type::SPAWN_RET => self.handle_spawn_ret_frame(svc, mt, tag_offset, payload),
            _ => self.handle_tagged_frame(svc, mt, tag_offset, payload),
        }
    }

    /// Inbound branch's "on LOGIN reply with LOGIN_RET(our_ctxid_pair) and
    /// reconcile ctxid". Replies with our own role as we describe ourselves
    /// to the peer (`ROUTER`/`COMM`, never `JOINT` — that role only ever
    /// describes our own bookkeeping about an accepted client, never
    /// transmitted), and locally registers the peer under `JOINT`/`COMM`
    /// depending on whether we're acting as a relay for it.
    fn handle_login(&mut self, svc: &mut impl NetworkService, ctx: &mut impl Context, payload: &[u8]) {
        let Ok(peer_ctxid) = wire::decode_login(payload) else {
            tracing::warn!("malformed LOGIN payload, dropping");
            return;
        };

        let reply_role = if self.is_router { Role::Router } else { Role::Comm };
        let reply = wire::encode_login_ret(CtxIdPair { ctxid: self.self_ctxid, role: reply_role });
        let len = reply.len() as u32;
        if let Some(t) = &mut self.transport {
            t.send(msg_type::LOGIN_RET, len, &reply);
        }

        let local_role = if self.is_router { Role::Joint } else { Role::Comm };
        let new_pair = CtxIdPair { ctxid: peer_ctxid, role: local_role };
        self.curr_ctxid_pair = ctx_glue::sync_ctxid(svc, ctx, self.self_aid, new_pair, self.curr_ctxid_pair);
    }

    /// Outbound branch's "on LOGIN_RET reconcile ctxid": the peer's reply
    /// already names its own ctxid and self-declared role, so it's adopted
    /// as-is.
    fn handle_login_ret(&mut self, svc: &mut impl NetworkService, ctx: &mut impl Context, payload: &[u8]) {
        let Ok(peer_pair) = wire::decode_login_ret(payload) else {
            tracing::warn!("malformed LOGIN_RET payload, dropping");
            return;
        };
        self.curr_ctxid_pair = ctx_glue::sync_ctxid(svc, ctx, self.self_aid, peer_pair, self.curr_ctxid_pair);
    }

    /// `SPAWN_RET`'s wire payload is the bare `{err, id, aid}` tuple with no
    /// tag and no address header (`crate::dispatch::spawn_ret_envelope`
    /// writes it straight back on whichever connection the request arrived
    /// on). Recovers the addressee from `pending_spawns`, falling back to
    /// self when the correlation is gone, "to avoid losing timeout
    /// correlation" (`spec.md` §4.6).
    fn handle_spawn_ret_frame(&mut self, svc: &mut impl NetworkService, mt: u32, tag_offset: u32, payload: Vec<u8>) {
        let Ok((err, id, aid)) = wire::decode_spawn_ret(&payload) else {
            tracing::warn!("malformed SPAWN_RET payload, dropping");
            return;
        };
        let recver = self.pending_spawns.shift_remove(&id).unwrap_or_else(|| Recver::aid(self.self_aid, self.self_ctxid));
        let msg = Envelope { msg_type: mt, tag_offset, payload };
        let pack = Pack {
            tag: RoutingTag::SpawnRet { err, id, aid },
            recver,
            svc: SvcId::NIL,
            skt: self.self_aid,
            is_err_ret: err != spawn::err::OK,
            msg,
        };
        let outcome = dispatch::handle_inbound(self.self_aid, self.is_router, pack, &mut self.registry, &self.remote_funcs, svc);
        if let DispatchOutcome::WriteWire(env) = outcome {
            self.write_frame(env);
        }
    }

    /// Every other tag (`LINK`/`EXIT`/`REQUEST`/`RESPONSE`/`SPAWN`/`PLAIN`).
    /// `spec.md` §6.1 says the payload is opaque to the socket actor except
    /// for the tag at its tail; `Pack::recver`/`Pack::svc` still have to come
    /// from somewhere, and there is no other collaborator to delegate that
    /// to in this workspace, so a small self-delimiting address header
    /// (`crate::pack::encode_address`/`decode_address`) occupies the front
    /// of the application payload, written by whichever caller first built
    /// this pack (see `Pack::addressed`) and carried through unchanged by
    /// every relay hop.
    fn handle_tagged_frame(&mut self, svc: &mut impl NetworkService, mt: u32, tag_offset: u32, payload: Vec<u8>) {
        let off = tag_offset as usize;
        if off > payload.len() {
            tracing::warn!("tag_offset past payload end, dropping frame");
            return;
        }

        let (recver, svc_id) = {
            let mut reader = tag::Reader::new(&payload[..off]);
            match pack::decode_address(&mut reader) {
                Ok(v) => v,
                Err(_) => {
                    tracing::warn!("malformed address header, dropping frame");
                    return;
                }
            }
        };
        let routing_tag = match RoutingTag::decode(&payload[off..]) {
            Ok(t) => t,
            Err(_) => {
                tracing::warn!("malformed routing tag, dropping frame");
                return;
            }
        };

        let msg = Envelope { msg_type: mt, tag_offset, payload };
        let pack = Pack { tag: routing_tag, recver, svc: svc_id, skt: self.self_aid, is_err_ret: false, msg };
        let outcome = dispatch::handle_inbound(self.self_aid, self.is_router, pack, &mut self.registry, &self.remote_funcs, svc);
        if let DispatchOutcome::WriteWire(env) = outcome {
            self.write_frame(env);
        }
    }
}
