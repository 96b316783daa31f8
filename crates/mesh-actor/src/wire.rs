//! Payload encodings for the control message types reserved by `spec.md`
//! §6.1 (`LOGIN`, `LOGIN_RET`, `SPAWN_RET`, `EXIT`; `HB` carries no payload).
//! Shares the little-endian integer and length-prefixed string primitives
//! already used by [`crate::tag::RoutingTag`]'s wire format.

use crate::{
    id::{Aid, CtxId, CtxIdPair, Role, Sid},
    tag::{write_aid, write_sid, write_str, write_u16, Reader, SpawnErr, TagError},
};

fn role_byte(role: Role) -> u8 {
    match role {
        Role::Comm => 0,
        Role::Router => 1,
        Role::Joint => 2,
    }
}

fn role_from_byte(b: u8) -> Role {
    match b {
        1 => Role::Router,
        2 => Role::Joint,
        _ => Role::Comm,
    }
}

pub fn encode_login(ctxid: CtxId) -> Vec<u8> {
    let mut out = Vec::new();
    write_str(&mut out, ctxid.0.as_str());
    out
}

pub fn decode_login(bytes: &[u8]) -> Result<CtxId, TagError> {
    let mut r = Reader::new(bytes);
    Ok(CtxId(r.str_field::<32>()?))
}

pub fn encode_login_ret(pair: CtxIdPair) -> Vec<u8> {
    let mut out = Vec::new();
    write_str(&mut out, pair.ctxid.0.as_str());
    out.push(role_byte(pair.role));
    out
}

pub fn decode_login_ret(bytes: &[u8]) -> Result<CtxIdPair, TagError> {
    let mut r = Reader::new(bytes);
    let ctxid = CtxId(r.str_field::<32>()?);
    let role = role_from_byte(r.u8()?);
    Ok(CtxIdPair { ctxid, role })
}

pub fn encode_spawn_ret(err: SpawnErr, id: Sid, aid: Aid) -> Vec<u8> {
    let mut out = Vec::new();
    write_u16(&mut out, err);
    write_sid(&mut out, id);
    write_aid(&mut out, aid);
    out
}

pub fn decode_spawn_ret(bytes: &[u8]) -> Result<(SpawnErr, Sid, Aid), TagError> {
    let mut r = Reader::new(bytes);
    Ok((r.u16()?, r.sid()?, r.aid()?))
}

pub fn encode_exit(code: crate::tag::ExitCode, reason: &str) -> Vec<u8> {
    let mut out = Vec::new();
    write_u16(&mut out, code);
    write_str(&mut out, reason);
    out
}

pub fn decode_exit(bytes: &[u8]) -> Result<(crate::tag::ExitCode, String), TagError> {
    let mut r = Reader::new(bytes);
    let code = r.u16()?;
    let reason = r.str_field::<128>()?.as_str().to_owned();
    Ok((code, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_round_trips() {
        let ctxid = CtxId::new("node-a");
        assert_eq!(decode_login(&encode_login(ctxid)).unwrap(), ctxid);
    }

    #[test]
    fn login_ret_round_trips_every_role() {
        for role in [Role::Comm, Role::Router, Role::Joint] {
            let pair = CtxIdPair { ctxid: CtxId::new("node-b"), role };
            assert_eq!(decode_login_ret(&encode_login_ret(pair)).unwrap(), pair);
        }
    }

    #[test]
    fn spawn_ret_round_trips() {
        let (err, id, aid) = decode_spawn_ret(&encode_spawn_ret(7, Sid(9), Aid(42))).unwrap();
        assert_eq!((err, id, aid), (7, Sid(9), Aid(42)));
    }

    #[test]
    fn exit_round_trips() {
        let (code, reason) = decode_exit(&encode_exit(1, "peer lost")).unwrap();
        assert_eq!((code, reason.as_str()), (1, "peer lost"));
    }
}
