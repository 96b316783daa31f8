//! Remote-spawn coordinator (C7), per `spec.md` §4.7.
//!
//! The per-socket `remote_func_list` ("Global-ish state", `spec.md` §9) is
//! populated once, before `connect`/`start`, and treated as immutable after:
//! [`RemoteFuncs`] only grows via [`RemoteFuncs::register`] during that setup
//! window, then is read-only for the life of the socket actor.
//!
//! This workspace's `tick()`-based collaborators resolve
//! [`crate::collaborators::NetworkService::spawn_stackful`] /
//! `spawn_stackless` / `spawn_scripted` synchronously, so unlike
//! `gce::socket_actor` (which posts the actor creation onto the target
//! service's strand and replies from a completion callback), the `SPAWN_RET`
//! reply is computed in the same call that processes the `SPAWN` request.

use indexmap::IndexSet;

use crate::{
    collaborators::{NetworkService, SpawnOutcome},
    id::Aid,
    tag::{FuncName, SpawnErr, SpawnKind},
};

pub mod err {
    use crate::tag::SpawnErr;

    pub const OK: SpawnErr = 0;
    pub const FUNC_NOT_FOUND: SpawnErr = 1;
    pub const NO_SOCKET: SpawnErr = 2;
}

/// Function names this socket actor will accept remote-spawn requests for,
/// keyed by the same symbolic-atom convention as `CtxId`.
#[derive(Debug, Default, Clone)]
pub struct RemoteFuncs {
    names: IndexSet<FuncName>,
}

impl RemoteFuncs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: FuncName) {
        self.names.insert(name);
    }

    pub fn contains(&self, name: &FuncName) -> bool {
        self.names.contains(name)
    }
}

/// Result of processing one inbound `SPAWN` tag locally (non-router branch).
/// `is_err_ret` mirrors `spec.md`'s `Pack::is_err_ret` flag on the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnResult {
    pub err: SpawnErr,
    pub aid: Aid,
}

impl SpawnResult {
    pub fn is_err_ret(&self) -> bool {
        self.err != err::OK
    }
}

/// Looks up `func` in `remote_funcs` (skipped for `SCRIPTED`, which has no
/// pre-registration step) and, if present, asks the collaborating
/// [`NetworkService`] to create the actor. Missing function or missing
/// service-side support both report [`err::FUNC_NOT_FOUND`].
pub fn handle_spawn_request(
    kind: SpawnKind,
    func: FuncName,
    stack_size: u32,
    remote_funcs: &RemoteFuncs,
    svc: &mut impl NetworkService,
) -> SpawnResult {
    if kind != SpawnKind::Scripted && !remote_funcs.contains(&func) {
        return SpawnResult { err: err::FUNC_NOT_FOUND, aid: Aid::NIL };
    }

    let outcome = match kind {
        SpawnKind::Stackful => svc.spawn_stackful(func.as_str(), stack_size),
        SpawnKind::Stackless => svc.spawn_stackless(func.as_str()),
        SpawnKind::Scripted => svc.spawn_scripted(func.as_str()),
    };

    match outcome {
        SpawnOutcome::Spawned(aid) => SpawnResult { err: err::OK, aid },
        SpawnOutcome::FuncNotFound => SpawnResult { err: err::FUNC_NOT_FOUND, aid: Aid::NIL },
    }
}
