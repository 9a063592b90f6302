use std::net::Ipv4Addr;

use rustc_hash::FxHashMap;

use sdn_common::{Dpid, PortNo};
use sdn_wire::MacAddr;

/// What to do with an address-resolution broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Flood,
    Drop,
}

/// Remembers the port each `(switch, sender, target)` broadcast first arrived on. A copy of the
/// same broadcast arriving on any other port has looped around the network and is dropped.
///
/// Entries never expire. They are only removed by [`LoopGuard::forget_port`] and
/// [`LoopGuard::forget_switch`], so on a stable topology the table grows with every new
/// sender and target.
#[derive(Debug, Default)]
pub struct LoopGuard {
    seen: FxHashMap<(Dpid, MacAddr, Ipv4Addr), PortNo>,
}

impl LoopGuard {
    pub fn observe(&mut self, dpid: Dpid, src: MacAddr, target: Ipv4Addr, in_port: PortNo) -> Verdict {
        match *self.seen.entry((dpid, src, target)).or_insert(in_port) {
            port if port == in_port => Verdict::Flood,
            _ => Verdict::Drop,
        }
    }

    /// Forgets every broadcast recorded on a port, so it may be re-learned after the port
    /// changes role.
    pub fn forget_port(&mut self, dpid: Dpid, port_no: PortNo) {
        self.seen.retain(|(d, _, _), port| !(*d == dpid && *port == port_no));
    }

    pub fn forget_switch(&mut self, dpid: Dpid) {
        self.seen.retain(|(d, _, _), _| *d != dpid);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: MacAddr = MacAddr(0x02, 0, 0, 0, 0, 0x0a);
    const TARGET: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

    #[test]
    fn first_port_wins() {
        let mut guard = LoopGuard::default();

        assert_eq!(guard.observe(1, A, TARGET, 3), Verdict::Flood);
        assert_eq!(guard.observe(1, A, TARGET, 5), Verdict::Drop);
        assert_eq!(guard.observe(1, A, TARGET, 3), Verdict::Flood);
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn keyed_per_switch_and_target() {
        let mut guard = LoopGuard::default();

        assert_eq!(guard.observe(1, A, TARGET, 3), Verdict::Flood);
        assert_eq!(guard.observe(2, A, TARGET, 5), Verdict::Flood);
        assert_eq!(guard.observe(1, A, Ipv4Addr::new(10, 0, 0, 3), 5), Verdict::Flood);
    }

    #[test]
    fn forget_port_relearns() {
        let mut guard = LoopGuard::default();
        guard.observe(1, A, TARGET, 3);
        guard.observe(2, A, TARGET, 3);

        guard.forget_port(1, 3);
        assert_eq!(guard.observe(1, A, TARGET, 5), Verdict::Flood);
        assert_eq!(guard.observe(2, A, TARGET, 5), Verdict::Drop);

        guard.forget_switch(2);
        assert_eq!(guard.observe(2, A, TARGET, 5), Verdict::Flood);
    }

    #[test]
    fn entries_persist_until_invalidated() {
        let mut guard = LoopGuard::default();
        for n in 1..=50 {
            guard.observe(1, A, Ipv4Addr::new(10, 0, 1, n), 3);
        }
        assert_eq!(guard.len(), 50);

        guard.forget_switch(1);
        assert!(guard.is_empty());
    }
}
