//! The routing tag: a closed sum type over every relationship a socket actor
//! message can carry, per `spec.md` §3 and the design note in §9
//! ("tagged variants over inheritance" — implement as a tagged union, not a
//! virtual hierarchy, so dispatch in `crate::dispatch` is a single match).

use mesh_util::ArrayStr;
use thiserror::Error;

use crate::id::{Aid, CtxId, Sid};

pub type ExitCode = u16;
pub type SpawnErr = u16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkKind {
    Linked,
    Monitor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpawnKind {
    Stackful,
    Stackless,
    Scripted,
}

/// A remote-spawn function name. Capacity matches `CtxId`'s inline name
/// budget; both are symbolic identifiers of the same ilk.
pub type FuncName = ArrayStr<32>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoutingTag {
    /// No tag: the envelope is plain application traffic.
    Plain,
    Link { kind: LinkKind, src: Aid },
    Exit { code: ExitCode, src: Aid },
    /// A `Link` translated by a router hop: `via` is the router's own AID,
    /// so the far side can route a later `FwdExit` back through it.
    FwdLink { kind: LinkKind, src: Aid, via: Aid },
    FwdExit { code: ExitCode, src: Aid, via: Aid },
    Request { sid: Sid, src: Aid },
    Response { sid: Sid, src: Aid },
    Spawn { kind: SpawnKind, func: FuncName, stack_size: u32, id: Sid, src: Aid, ctxid: CtxId },
    SpawnRet { err: SpawnErr, id: Sid, aid: Aid },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("routing tag buffer too short: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
    #[error("unknown routing tag discriminant {0}")]
    UnknownDiscriminant(u8),
}

const PLAIN: u8 = 0;
const LINK: u8 = 1;
const EXIT: u8 = 2;
const FWD_LINK: u8 = 3;
const FWD_EXIT: u8 = 4;
const REQUEST: u8 = 5;
const RESPONSE: u8 = 6;
const SPAWN: u8 = 7;
const SPAWN_RET: u8 = 8;

pub(crate) fn write_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}
pub(crate) fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}
pub(crate) fn write_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}
pub(crate) fn write_aid(out: &mut Vec<u8>, aid: Aid) {
    write_u64(out, aid.0);
}
pub(crate) fn write_sid(out: &mut Vec<u8>, sid: Sid) {
    write_u64(out, sid.0);
}
fn write_link_kind(out: &mut Vec<u8>, kind: LinkKind) {
    out.push(match kind {
        LinkKind::Linked => 0,
        LinkKind::Monitor => 1,
    });
}
pub(crate) fn write_str(out: &mut Vec<u8>, s: &str) {
    out.push(s.len() as u8);
    out.extend_from_slice(s.as_bytes());
}

pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn need(&self, n: usize) -> Result<(), TagError> {
        if self.bytes.len() - self.pos < n {
            return Err(TagError::Truncated { need: n, have: self.bytes.len() - self.pos });
        }
        Ok(())
    }

    pub(crate) fn u8(&mut self) -> Result<u8, TagError> {
        self.need(1)?;
        let v = self.bytes[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub(crate) fn u16(&mut self) -> Result<u16, TagError> {
        self.need(2)?;
        let v = u16::from_le_bytes(self.bytes[self.pos..self.pos + 2].try_into().unwrap());
        self.pos += 2;
        Ok(v)
    }

    fn u32(&mut self) -> Result<u32, TagError> {
        self.need(4)?;
        let v = u32::from_le_bytes(self.bytes[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    pub(crate) fn u64(&mut self) -> Result<u64, TagError> {
        self.need(8)?;
        let v = u64::from_le_bytes(self.bytes[self.pos..self.pos + 8].try_into().unwrap());
        self.pos += 8;
        Ok(v)
    }

    pub(crate) fn aid(&mut self) -> Result<Aid, TagError> {
        Ok(Aid(self.u64()?))
    }

    pub(crate) fn sid(&mut self) -> Result<Sid, TagError> {
        Ok(Sid(self.u64()?))
    }

    fn link_kind(&mut self) -> Result<LinkKind, TagError> {
        Ok(match self.u8()? {
            0 => LinkKind::Linked,
            _ => LinkKind::Monitor,
        })
    }

    pub(crate) fn str_field<const N: usize>(&mut self) -> Result<ArrayStr<N>, TagError> {
        let len = self.u8()? as usize;
        self.need(len)?;
        let s = std::str::from_utf8(&self.bytes[self.pos..self.pos + len]).unwrap_or("");
        self.pos += len;
        Ok(ArrayStr::from_str_truncate(s))
    }
}

impl RoutingTag {
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            RoutingTag::Plain => out.push(PLAIN),
            RoutingTag::Link { kind, src } => {
                out.push(LINK);
                write_link_kind(out, *kind);
                write_aid(out, *src);
            }
            RoutingTag::Exit { code, src } => {
                out.push(EXIT);
                write_u16(out, *code);
                write_aid(out, *src);
            }
            RoutingTag::FwdLink { kind, src, via } => {
                out.push(FWD_LINK);
                write_link_kind(out, *kind);
                write_aid(out, *src);
                write_aid(out, *via);
            }
            RoutingTag::FwdExit { code, src, via } => {
                out.push(FWD_EXIT);
                write_u16(out, *code);
                write_aid(out, *src);
                write_aid(out, *via);
            }
            RoutingTag::Request { sid, src } => {
                out.push(REQUEST);
                write_sid(out, *sid);
                write_aid(out, *src);
            }
            RoutingTag::Response { sid, src } => {
                out.push(RESPONSE);
                write_sid(out, *sid);
                write_aid(out, *src);
            }
            RoutingTag::Spawn { kind, func, stack_size, id, src, ctxid } => {
                out.push(SPAWN);
                out.push(match kind {
                    SpawnKind::Stackful => 0,
                    SpawnKind::Stackless => 1,
                    SpawnKind::Scripted => 2,
                });
                write_str(out, func.as_str());
                write_u32(out, *stack_size);
                write_sid(out, *id);
                write_aid(out, *src);
                write_str(out, ctxid.0.as_str());
            }
            RoutingTag::SpawnRet { err, id, aid } => {
                out.push(SPAWN_RET);
                write_u16(out, *err);
                write_sid(out, *id);
                write_aid(out, *aid);
            }
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TagError> {
        let mut r = Reader::new(bytes);
        let disc = r.u8()?;
        let tag = match disc {
            PLAIN => RoutingTag::Plain,
            LINK => RoutingTag::Link { kind: r.link_kind()?, src: r.aid()? },
            EXIT => RoutingTag::Exit { code: r.u16()?, src: r.aid()? },
            FWD_LINK => RoutingTag::FwdLink { kind: r.link_kind()?, src: r.aid()?, via: r.aid()? },
            FWD_EXIT => RoutingTag::FwdExit { code: r.u16()?, src: r.aid()?, via: r.aid()? },
            REQUEST => RoutingTag::Request { sid: r.sid()?, src: r.aid()? },
            RESPONSE => RoutingTag::Response { sid: r.sid()?, src: r.aid()? },
            SPAWN => {
                let kind = match r.u8()? {
                    0 => SpawnKind::Stackful,
                    1 => SpawnKind::Stackless,
                    _ => SpawnKind::Scripted,
                };
                let func = r.str_field::<32>()?;
                let stack_size = r.u32()?;
                let id = r.sid()?;
                let src = r.aid()?;
                let ctxid = CtxId(r.str_field::<32>()?);
                RoutingTag::Spawn { kind, func, stack_size, id, src, ctxid }
            }
            SPAWN_RET => RoutingTag::SpawnRet { err: r.u16()?, id: r.sid()?, aid: r.aid()? },
            other => return Err(TagError::UnknownDiscriminant(other)),
        };
        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(tag: RoutingTag) {
        let mut buf = Vec::new();
        tag.encode(&mut buf);
        assert_eq!(RoutingTag::decode(&buf).unwrap(), tag);
    }

    #[test]
    fn round_trips_every_variant() {
        round_trip(RoutingTag::Plain);
        round_trip(RoutingTag::Link { kind: LinkKind::Linked, src: Aid(7) });
        round_trip(RoutingTag::Exit { code: 42, src: Aid(7) });
        round_trip(RoutingTag::FwdLink { kind: LinkKind::Monitor, src: Aid(1), via: Aid(2) });
        round_trip(RoutingTag::FwdExit { code: 1, src: Aid(1), via: Aid(2) });
        round_trip(RoutingTag::Request { sid: Sid(9), src: Aid(3) });
        round_trip(RoutingTag::Response { sid: Sid(9), src: Aid(3) });
        round_trip(RoutingTag::Spawn {
            kind: SpawnKind::Stackful,
            func: FuncName::from_str_truncate("worker"),
            stack_size: 65536,
            id: Sid(5),
            src: Aid(4),
            ctxid: CtxId::new("node-a"),
        });
        round_trip(RoutingTag::SpawnRet { err: 0, id: Sid(5), aid: Aid(8) });
    }

    #[test]
    fn decode_rejects_truncated_buffer() {
        assert_eq!(RoutingTag::decode(&[LINK]), Err(TagError::Truncated { need: 1, have: 0 }));
    }

    #[test]
    fn decode_rejects_unknown_discriminant() {
        assert_eq!(RoutingTag::decode(&[200]), Err(TagError::UnknownDiscriminant(200)));
    }
}
