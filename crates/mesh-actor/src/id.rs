//! Identity types shared across the socket actor: opaque actor handles,
//! symbolic node names, and the session id used to correlate
//! request/response pairs.

use std::sync::atomic::{AtomicU64, Ordering};

use mesh_util::ArrayStr;

/// Opaque, globally-unique actor handle. `AID_NIL` denotes "none" — e.g. a
/// `SPAWN_RET` reply with no actor because the spawn failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Aid(pub u64);

impl Aid {
    pub const NIL: Self = Self(0);

    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }
}

/// Symbolic node name. A short inline string, never heap-allocated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CtxId(pub ArrayStr<32>);

impl CtxId {
    pub const NIL: Self = Self(ArrayStr::new());

    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }

    pub fn new(name: &str) -> Self {
        Self(ArrayStr::from_str_truncate(name))
    }
}

/// A named service: the node it lives on plus a name unique within that node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SvcId {
    pub ctxid: CtxId,
    pub name: ArrayStr<32>,
}

impl SvcId {
    pub const NIL: Self = Self { ctxid: CtxId::NIL, name: ArrayStr::new() };

    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }
}

/// The role a node plays toward a peer across one socket actor connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
pub enum Role {
    /// Direct peer: the connection is between two endpoints with no relay.
    Comm,
    /// The peer is a relay; messages to third parties are forwarded through it.
    Router,
    /// Our role toward a client that connected to us acting as a relay.
    Joint,
}

/// `(CTXID, role)`. Identifies a peer node together with how we relate to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CtxIdPair {
    pub ctxid: CtxId,
    pub role: Role,
}

impl CtxIdPair {
    /// The provisional pair assigned to an accepted connection before LOGIN
    /// arrives. Never the target of an application-level lookup; `sync_ctxid`
    /// only ever transitions away from it.
    pub const PROVISIONAL_JOINT: Self = Self { ctxid: CtxId::NIL, role: Role::Joint };
}

/// Monotonic, non-zero token correlating a request with its response.
/// `0` is reserved to mean "no correlation".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sid(pub u64);

impl Sid {
    pub const NIL: Self = Self(0);
}

/// Issues session ids starting at 1, one per socket actor.
#[derive(Debug, Default)]
pub struct SidGenerator(AtomicU64);

impl SidGenerator {
    pub fn next(&self) -> Sid {
        Sid(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}
