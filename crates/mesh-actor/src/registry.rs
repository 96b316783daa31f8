//! Link registry (C5): the two tables tracking remote link/monitor
//! relationships, per `spec.md` §4.5. `indexmap` keeps iteration order
//! stable (insertion order), which makes the `on_neterr` exit-synthesis
//! sweep deterministic and easy to assert on in tests.

use indexmap::{IndexMap, IndexSet};

use crate::{
    id::Aid,
    tag::{ExitCode, LinkKind, RoutingTag},
};

/// A synthesized exit notification produced by [`LinkRegistry::on_neterr`].
/// `target` is the socket the pack must be written to (locally delivered
/// for a straight link, or `via` for a router link); `recver` is the pack's
/// addressee once it arrives there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntheticExit {
    pub target: Aid,
    pub recver: Aid,
    pub tag: RoutingTag,
}

#[derive(Debug, Default)]
pub struct LinkRegistry {
    /// Non-router mode: remote endpoint linked *from* -> local AIDs linked to it.
    straight_links: IndexMap<Aid, IndexSet<Aid>>,
    /// Router mode: `router_links[src][des] = via_skt`, per `add_router`.
    router_links: IndexMap<Aid, IndexMap<Aid, Aid>>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// No-op if `des` is nil.
    pub fn add_straight(&mut self, src: Aid, des: Aid) {
        if des.is_nil() {
            return;
        }
        self.straight_links.entry(src).or_default().insert(des);
    }

    pub fn remove_straight(&mut self, src: Aid, des: Aid) {
        if let Some(set) = self.straight_links.get_mut(&src) {
            set.shift_remove(&des);
            if set.is_empty() {
                self.straight_links.shift_remove(&src);
            }
        }
    }

    pub fn add_router(&mut self, src: Aid, des: Aid, via_skt: Aid) {
        self.router_links.entry(src).or_default().insert(des, via_skt);
    }

    /// Removes the entry and returns the `via_skt` it held, for reporting
    /// back to the originating peer.
    pub fn remove_router(&mut self, src: Aid, des: Aid) -> Option<Aid> {
        let inner = self.router_links.get_mut(&src)?;
        let via_skt = inner.shift_remove(&des);
        if inner.is_empty() {
            self.router_links.shift_remove(&src);
        }
        via_skt
    }

    pub fn router_via(&self, src: Aid, des: Aid) -> Option<Aid> {
        self.router_links.get(&src)?.get(&des).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.straight_links.is_empty() && self.router_links.is_empty()
    }

    /// On connection loss: synthesizes `EXIT(NET_ERR, src)` delivered
    /// directly to every straight-link survivor, and `FWD_EXIT(NET_ERR, des, self_aid)`
    /// delivered to `via_skt` with `recver = src` for every router-link
    /// survivor (`spec.md` §8 quantified invariants 3–4), then clears both
    /// tables. Idempotent: calling this on already-empty tables yields no
    /// exits, matching `free_self`'s unconditional call during shutdown
    /// (`spec.md` §4.8 step 5).
    pub fn on_neterr(&mut self, self_aid: Aid, net_err: ExitCode) -> Vec<SyntheticExit> {
        let mut exits = Vec::new();

        for (src, targets) in &self.straight_links {
            for &des in targets {
                exits.push(SyntheticExit {
                    target: des,
                    recver: des,
                    tag: RoutingTag::Exit { code: net_err, src: *src },
                });
            }
        }

        for (src, targets) in &self.router_links {
            for (&des, &via) in targets {
                exits.push(SyntheticExit {
                    target: via,
                    recver: *src,
                    tag: RoutingTag::FwdExit { code: net_err, src: des, via: self_aid },
                });
            }
        }

        self.straight_links.clear();
        self.router_links.clear();
        exits
    }
}

pub const LINKED: LinkKind = LinkKind::Linked;

#[cfg(test)]
mod tests {
    use super::*;

    const NET_ERR: ExitCode = 1;
    const SELF_AID: Aid = Aid(255);

    #[test]
    fn add_straight_ignores_nil_target() {
        let mut reg = LinkRegistry::new();
        reg.add_straight(Aid(1), Aid::NIL);
        assert!(reg.is_empty());
    }

    #[test]
    fn straight_link_produces_one_exit_on_neterr() {
        let mut reg = LinkRegistry::new();
        reg.add_straight(Aid(1), Aid(2));
        let exits = reg.on_neterr(SELF_AID, NET_ERR);
        assert_eq!(
            exits,
            vec![SyntheticExit { target: Aid(2), recver: Aid(2), tag: RoutingTag::Exit { code: NET_ERR, src: Aid(1) } }]
        );
        assert!(reg.is_empty());
    }

    #[test]
    fn removed_straight_link_produces_no_exit() {
        let mut reg = LinkRegistry::new();
        reg.add_straight(Aid(1), Aid(2));
        reg.remove_straight(Aid(1), Aid(2));
        assert!(reg.on_neterr(SELF_AID, NET_ERR).is_empty());
    }

    #[test]
    fn router_link_produces_fwd_exit_to_via_with_recver_as_src() {
        let mut reg = LinkRegistry::new();
        reg.add_router(Aid(1), Aid(2), Aid(99));
        let exits = reg.on_neterr(SELF_AID, NET_ERR);
        assert_eq!(
            exits,
            vec![SyntheticExit {
                target: Aid(99),
                recver: Aid(1),
                tag: RoutingTag::FwdExit { code: NET_ERR, src: Aid(2), via: SELF_AID },
            }]
        );
    }

    #[test]
    fn remove_router_returns_via_skt() {
        let mut reg = LinkRegistry::new();
        reg.add_router(Aid(1), Aid(2), Aid(99));
        assert_eq!(reg.remove_router(Aid(1), Aid(2)), Some(Aid(99)));
        assert_eq!(reg.remove_router(Aid(1), Aid(2)), None);
    }

    #[test]
    fn on_neterr_on_empty_tables_is_idempotent() {
        let mut reg = LinkRegistry::new();
        assert!(reg.on_neterr(SELF_AID, NET_ERR).is_empty());
        assert!(reg.on_neterr(SELF_AID, NET_ERR).is_empty());
    }
}
