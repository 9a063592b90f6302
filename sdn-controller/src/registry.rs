use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use sdn_common::{Dpid, PortNo};

/// Switches currently connected to the controller, with their active ports.
#[derive(Debug, Default)]
pub struct SwitchRegistry {
    switches: FxHashMap<Dpid, BTreeSet<PortNo>>,
}

impl SwitchRegistry {
    /// Registers a switch with its ports, replacing any previous entry.
    pub fn insert(&mut self, dpid: Dpid, ports: impl IntoIterator<Item = PortNo>) {
        self.switches.insert(dpid, ports.into_iter().collect());
    }

    /// Returns true if the switch was registered.
    pub fn remove(&mut self, dpid: Dpid) -> bool {
        self.switches.remove(&dpid).is_some()
    }

    /// Adds a port to a registered switch. Ports of unknown switches are ignored.
    pub fn add_port(&mut self, dpid: Dpid, port_no: PortNo) {
        if let Some(ports) = self.switches.get_mut(&dpid) {
            ports.insert(port_no);
        }
    }

    pub fn remove_port(&mut self, dpid: Dpid, port_no: PortNo) {
        if let Some(ports) = self.switches.get_mut(&dpid) {
            ports.remove(&port_no);
        }
    }

    pub fn contains(&self, dpid: Dpid) -> bool {
        self.switches.contains_key(&dpid)
    }

    /// Returns true if `port_no` is an active port of a registered switch.
    pub fn is_managed(&self, dpid: Dpid, port_no: PortNo) -> bool {
        self.switches.get(&dpid).is_some_and(|ports| ports.contains(&port_no))
    }

    pub fn len(&self) -> usize {
        self.switches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }
}
