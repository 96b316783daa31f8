//! Routing-tag dispatch (C6), per `spec.md` §4.6.
//!
//! Two directions, grounded on `gce::socket_actor::handle_net_msg` (inbound,
//! wire -> local) and `handle_recv` (outbound, local -> wire):
//!
//! - [`handle_inbound`] processes a [`Pack`] just parsed off this socket's
//!   wire. Almost every branch ends in a call on the collaborating
//!   [`NetworkService`] (local delivery, or a relay hop to another socket
//!   actor's `Aid`) — [`DispatchOutcome::Handled`]. The sole exception is a
//!   remote-spawn reply: `gce::socket_actor::send_spawn_ret` writes straight
//!   back onto the same connection the `SPAWN` request arrived on, never
//!   through `svc_.send()`, so those cases return
//!   [`DispatchOutcome::WriteWire`] instead.
//! - [`handle_outbound`] processes a [`Pack`] a local actor is sending to a
//!   remote target. Every branch ends in a wire write; `FWD_LINK`/`FWD_EXIT`
//!   (an internal, same-node relay signal between two socket actors — see
//!   `spec.md`'s routing tag list) are translated back to plain
//!   `LINK`/`EXIT` before the frame leaves this node, exactly as
//!   `handle_recv` does.
//!
//! `FwdLink`/`FwdExit` never appear as the tag of a [`Pack`] handed to
//! [`handle_inbound`]: they are produced by [`handle_inbound`]'s own router
//! branches and consumed by [`handle_outbound`] on whichever socket actor
//! receives the relayed pack, never re-serialized onto a wire verbatim.

use crate::{
    collaborators::NetworkService,
    envelope::{msg_type, Envelope},
    id::Aid,
    pack::{Pack, Recver},
    registry::LinkRegistry,
    spawn::{self, RemoteFuncs},
    tag::{LinkKind, RoutingTag},
    wire,
};

/// What the lifecycle driver must do after a dispatch call returns.
pub enum DispatchOutcome {
    /// Every side effect (local delivery, relay, or synthesized
    /// `ALREADY_EXITED`) has already happened against the collaborators.
    Handled,
    /// Write this envelope back onto the socket's own transport.
    WriteWire(Envelope),
}

fn spawn_ret_envelope(err: crate::tag::SpawnErr, id: crate::id::Sid, aid: Aid) -> Envelope {
    let payload = wire::encode_spawn_ret(err, id, aid);
    let len = payload.len() as u32;
    Envelope { msg_type: msg_type::SPAWN_RET, tag_offset: len, payload }
}

/// Re-encodes `pack.tag` into `pack.msg`'s tail, leaving the application
/// payload (everything before the original `tag_offset`) untouched.
fn retag(mut msg: Envelope, tag: &RoutingTag) -> Envelope {
    let app_len = msg.tag_offset as usize;
    msg.payload.truncate(app_len);
    tag.encode(&mut msg.payload);
    msg
}

/// `gce::socket_actor::handle_net_msg`.
pub fn handle_inbound(
    self_aid: Aid,
    is_router: bool,
    mut pack: Pack,
    registry: &mut LinkRegistry,
    remote_funcs: &RemoteFuncs,
    svc: &mut impl NetworkService,
) -> DispatchOutcome {
    match pack.tag.clone() {
        RoutingTag::Link { kind, src } => {
            if is_router {
                match svc.select_joint_socket(pack.recver.ctxid()) {
                    None => svc.send_already_exited(src, pack.recver),
                    Some(skt) => {
                        if kind == LinkKind::Linked {
                            registry.add_router(pack.recver.as_aid().unwrap_or(Aid::NIL), src, skt);
                        }
                        pack.tag = RoutingTag::FwdLink { kind, src, via: self_aid };
                        pack.skt = skt;
                        svc.send(skt, pack);
                    }
                }
            } else {
                let recver_aid = pack.recver.as_aid().unwrap_or(Aid::NIL);
                if kind == LinkKind::Linked {
                    registry.add_straight(src, recver_aid);
                }
                pack.skt = self_aid;
                svc.send(recver_aid, pack);
            }
            DispatchOutcome::Handled
        }

        RoutingTag::Exit { code, src } => {
            let recver_aid = pack.recver.as_aid().unwrap_or(Aid::NIL);
            if is_router {
                if let Some(skt) = registry.remove_router(recver_aid, src) {
                    pack.tag = RoutingTag::FwdExit { code, src, via: self_aid };
                    pack.skt = skt;
                    svc.send(skt, pack);
                }
            } else {
                registry.remove_straight(src, recver_aid);
                svc.send(recver_aid, pack);
            }
            DispatchOutcome::Handled
        }

        RoutingTag::Spawn { kind, func, stack_size, id, src: _src, ctxid } => {
            if is_router {
                match svc.select_joint_socket(ctxid) {
                    None => DispatchOutcome::WriteWire(spawn_ret_envelope(spawn::err::NO_SOCKET, id, Aid::NIL)),
                    Some(skt) => {
                        pack.skt = skt;
                        svc.send(skt, pack);
                        DispatchOutcome::Handled
                    }
                }
            } else {
                let result = spawn::handle_spawn_request(kind, func, stack_size, remote_funcs, svc);
                DispatchOutcome::WriteWire(spawn_ret_envelope(result.err, id, result.aid))
            }
        }

        RoutingTag::SpawnRet { .. } => {
            if is_router {
                if let Some(skt) = svc.select_joint_socket(pack.recver.ctxid()) {
                    pack.skt = skt;
                    svc.send(skt, pack);
                }
            } else {
                let spawner = pack.recver.as_aid().unwrap_or(self_aid);
                svc.send(spawner, pack);
            }
            DispatchOutcome::Handled
        }

        // PLAIN, REQUEST, RESPONSE: ordinary application traffic, routed by
        // `recver`/`svc` alone. FWD_LINK/FWD_EXIT never arrive here (see
        // module docs) but fall through to the same forward-or-drop logic
        // if they somehow did.
        _ => {
            let is_svc = !pack.svc.is_nil();
            if is_router {
                let ctxid = if is_svc { pack.svc.ctxid } else { pack.recver.ctxid() };
                let skt = svc.select_joint_socket(ctxid);
                if let (RoutingTag::Request { src, .. }, None, false) = (&pack.tag, skt, is_svc) {
                    svc.send_already_exited(*src, pack.recver);
                }
                if let Some(skt) = skt {
                    pack.skt = skt;
                    svc.send(skt, pack);
                }
            } else {
                if is_svc {
                    if let Some(resolved) = svc.find_service(pack.svc.name.as_str()) {
                        pack.recver = Recver::aid(resolved, pack.svc.ctxid);
                    }
                }
                if let Some(aid) = pack.recver.as_aid() {
                    svc.send(aid, pack);
                }
            }
            DispatchOutcome::Handled
        }
    }
}

/// `gce::socket_actor::handle_recv`.
pub fn handle_outbound(mut pack: Pack, registry: &mut LinkRegistry) -> Envelope {
    let recver_aid = pack.recver.as_aid().unwrap_or(Aid::NIL);
    let mut retagged = None;

    match &pack.tag {
        RoutingTag::Link { src, .. } => registry.add_straight(recver_aid, *src),
        RoutingTag::Exit { src, .. } => registry.remove_straight(recver_aid, *src),
        RoutingTag::FwdLink { kind, src, via } => {
            registry.add_router(*src, recver_aid, *via);
            retagged = Some(RoutingTag::Link { kind: *kind, src: *src });
        }
        RoutingTag::FwdExit { code, src, via } => {
            registry.remove_router(*src, recver_aid);
            retagged = Some(RoutingTag::Exit { code: *code, src: *src });
        }
        _ => {}
    }

    if let Some(new_tag) = retagged {
        pack.tag = new_tag;
    }
    retag(pack.msg, &pack.tag)
}
