//! `Pack`: the unit internal to the node runtime, produced by parsing an
//! inbound frame and consumed by the runtime or re-encoded outbound.

use crate::{
    envelope::Envelope,
    id::{Aid, CtxId, SvcId},
    tag::{self, Reader, RoutingTag, TagError},
};

/// A pack's recipient: either a specific actor, or a named service to be
/// resolved to an actor locally before delivery.
///
/// `Aid` carries the target's home `ctxid` alongside the handle itself:
/// router-mode dispatch resolves a joint socket by `recver.ctxid` (`spec.md`
/// §4.6), and this workspace's [`crate::id::Aid`] is a bare opaque handle
/// with no embedded node identity, unlike `gce::aid_t`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recver {
    Aid { aid: Aid, ctxid: CtxId },
    Svc(SvcId),
}

impl Recver {
    pub fn aid(aid: Aid, ctxid: CtxId) -> Self {
        Recver::Aid { aid, ctxid }
    }

    pub fn as_aid(&self) -> Option<Aid> {
        match self {
            Recver::Aid { aid, .. } => Some(*aid),
            Recver::Svc(_) => None,
        }
    }

    /// The node a router should look up `select_joint_socket` under.
    pub fn ctxid(&self) -> CtxId {
        match self {
            Recver::Aid { ctxid, .. } => *ctxid,
            Recver::Svc(svc) => svc.ctxid,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pack {
    pub tag: RoutingTag,
    pub recver: Recver,
    pub svc: SvcId,
    /// The socket actor responsible for this pack's connection, set by the
    /// dispatcher so a reply can be written back on the right socket.
    pub skt: Aid,
    pub is_err_ret: bool,
    pub msg: Envelope,
}

impl Pack {
    pub fn new(recver: Recver, msg: Envelope) -> Self {
        Self { tag: RoutingTag::Plain, recver, svc: SvcId::NIL, skt: Aid::NIL, is_err_ret: false, msg }
    }

    /// Builds a pack ready for [`crate::dispatch::handle_outbound`], with
    /// `recver`/`svc` embedded as an address header at the front of the
    /// envelope's application payload (`spec.md`'s payload is opaque to the
    /// socket actor except for the tag it appends; see [`encode_address`]).
    /// `app_payload` is genuine application content, untouched by this crate.
    pub fn addressed(recver: Recver, svc: SvcId, tag: RoutingTag, msg_type: u32, app_payload: &[u8]) -> Self {
        let mut payload = Vec::new();
        encode_address(&mut payload, &recver, svc);
        payload.extend_from_slice(app_payload);
        let tag_offset = payload.len() as u32;
        let msg = Envelope { msg_type, tag_offset, payload };
        Self { tag, recver, svc, skt: Aid::NIL, is_err_ret: false, msg }
    }
}

/// Writes `recver`/`svc` as a small self-delimiting header: `recver`'s `Aid`
/// (`AID_NIL` when addressing is by service name alone), its `ctxid`, then
/// `svc`'s `ctxid` and `name`. Mirrored by [`decode_address`] on the
/// receiving socket actor, which otherwise has no other way to learn a
/// wire-carried pack's addressee (`Recver::Svc` is never constructed
/// anywhere in this crate — every caller builds `Recver::Aid`, so the wire
/// form only needs to carry that variant's fields).
pub fn encode_address(out: &mut Vec<u8>, recver: &Recver, svc: SvcId) {
    let (aid, ctxid) = match *recver {
        Recver::Aid { aid, ctxid } => (aid, ctxid),
        Recver::Svc(svc) => (Aid::NIL, svc.ctxid),
    };
    tag::write_aid(out, aid);
    tag::write_str(out, ctxid.0.as_str());
    tag::write_str(out, svc.ctxid.0.as_str());
    tag::write_str(out, svc.name.as_str());
}

/// Inverse of [`encode_address`]. `reader` must be positioned at the start
/// of a frame's application payload.
pub fn decode_address(reader: &mut Reader<'_>) -> Result<(Recver, SvcId), TagError> {
    let aid = reader.aid()?;
    let ctxid = CtxId(reader.str_field::<32>()?);
    let svc_ctxid = CtxId(reader.str_field::<32>()?);
    let svc_name = reader.str_field::<32>()?;
    let svc = SvcId { ctxid: svc_ctxid, name: svc_name };
    Ok((Recver::Aid { aid, ctxid }, svc))
}
