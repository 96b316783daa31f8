//! Registry glue (C9), per `spec.md` §4.9.
//!
//! `sync_ctxid` is the sole mutator of the context-level ctxid->socket
//! mapping. The provisional pair assigned at accept time,
//! [`crate::id::CtxIdPair::PROVISIONAL_JOINT`], becomes concrete after
//! `LOGIN`; this function is how that transition (and any later
//! re-registration) is realized.

use crate::{
    collaborators::{Context, NetworkService},
    id::{Aid, CtxIdPair},
};

/// If `new_pair != curr_pair`, deregisters `curr_pair` from both the
/// network service and the context, then registers `new_pair` on both.
/// Idempotent when `new_pair == curr_pair`: the check is a short-circuit
/// inside this function, not a precondition the caller must uphold.
/// Returns `new_pair`, matching `gce::socket_actor::sync_ctxid`'s return
/// convention so the caller can simply assign it as the new "current" pair.
pub fn sync_ctxid(
    svc: &mut impl NetworkService,
    ctx: &mut impl Context,
    self_aid: Aid,
    new_pair: CtxIdPair,
    curr_pair: CtxIdPair,
) -> CtxIdPair {
    if new_pair != curr_pair {
        svc.deregister_socket(curr_pair, self_aid);
        svc.register_socket(new_pair, self_aid);
        ctx.deregister_socket(curr_pair, self_aid);
        ctx.register_socket(new_pair, self_aid);
    }
    new_pair
}
