use std::{collections::BTreeMap, net::Ipv4Addr, sync::Arc};

use sdn_common::{Dpid, PortNo};
use sdn_fabric::{EventReceiver, PortRef};
use sdn_wire::MacAddr;

use crate::SimFabric;

const DEFAULT_EVENT_BUFFER: usize = 1024;
const DEFAULT_DELIVERY_BUDGET: usize = 10_000;

/// A simulated switch.
#[derive(Debug, Clone, Default)]
pub struct SimSwitch {
    /// Allocated ports, numbered from 1 in allocation order.
    pub ports: Vec<PortNo>,
    /// Round trip between the controller and the switch, in milliseconds.
    pub control_delay: f64,
}

impl SimSwitch {
    fn allocate_port(&mut self) -> PortNo {
        let port_no = self.ports.len() as PortNo + 1;
        self.ports.push(port_no);
        port_no
    }
}

/// A host attached to a switch port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimHost {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    pub port: PortRef,
}

/// A bidirectional switch-to-switch link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimLink {
    pub a: PortRef,
    pub b: PortRef,
    /// One-way propagation delay, in milliseconds.
    pub delay: f64,
}

impl SimLink {
    /// Returns the port at the other end of the link, if `port` is one of its ends.
    pub fn peer(&self, port: PortRef) -> Option<PortRef> {
        if port == self.a {
            Some(self.b)
        } else if port == self.b {
            Some(self.a)
        } else {
            None
        }
    }

    pub fn connects(&self, x: Dpid, y: Dpid) -> bool {
        (self.a.dpid, self.b.dpid) == (x, y) || (self.a.dpid, self.b.dpid) == (y, x)
    }
}

/// Returns the MAC address the simulation assigns to the host with address `ip`.
pub fn host_mac(ip: Ipv4Addr) -> MacAddr {
    let [a, b, c, d] = ip.octets();
    MacAddr::new(0x02, a, b, c, d, 0x01)
}

/// Describes a simulated network. Ports are allocated in the order hosts and links are added,
/// starting at 1 on every switch.
///
/// # Example
///
/// ```
/// use std::net::Ipv4Addr;
/// use sdn_sim::SimNetwork;
///
/// let (fabric, events) = SimNetwork::new()
///     .switch(1)
///     .switch(2)
///     .host(1, Ipv4Addr::new(10, 0, 0, 1))
///     .host(2, Ipv4Addr::new(10, 0, 0, 2))
///     .link(1, 2, 5.0)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct SimNetwork {
    pub(crate) switches: BTreeMap<Dpid, SimSwitch>,
    pub(crate) hosts: Vec<SimHost>,
    pub(crate) links: Vec<SimLink>,
    event_buffer: usize,
    pub(crate) delivery_budget: usize,
}

impl Default for SimNetwork {
    fn default() -> Self {
        Self {
            switches: BTreeMap::new(),
            hosts: Vec::new(),
            links: Vec::new(),
            event_buffer: DEFAULT_EVENT_BUFFER,
            delivery_budget: DEFAULT_DELIVERY_BUDGET,
        }
    }
}

impl SimNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a switch without ports.
    pub fn switch(mut self, dpid: Dpid) -> Self {
        self.switches.entry(dpid).or_default();
        self
    }

    /// Sets the controller round trip of a switch, in milliseconds.
    pub fn control_delay(mut self, dpid: Dpid, delay_ms: f64) -> Self {
        self.switches.entry(dpid).or_default().control_delay = delay_ms;
        self
    }

    /// Attaches a host with address `ip` to the next free port of switch `dpid`.
    pub fn host(mut self, dpid: Dpid, ip: Ipv4Addr) -> Self {
        let port_no = self.switches.entry(dpid).or_default().allocate_port();
        self.hosts.push(SimHost { mac: host_mac(ip), ip, port: PortRef::new(dpid, port_no) });
        self
    }

    /// Links the next free ports of switches `a` and `b`.
    pub fn link(mut self, a: Dpid, b: Dpid, delay_ms: f64) -> Self {
        let a = PortRef::new(a, self.switches.entry(a).or_default().allocate_port());
        let b = PortRef::new(b, self.switches.entry(b).or_default().allocate_port());
        self.links.push(SimLink { a, b, delay: delay_ms });
        self
    }

    /// Sets the capacity of the event channel.
    pub fn event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size;
        self
    }

    /// Sets the number of packet copies flooding may put on links before the simulation stops
    /// delivering them.
    pub fn delivery_budget(mut self, budget: usize) -> Self {
        self.delivery_budget = budget;
        self
    }

    /// Returns the datapath ids of all switches, in ascending order.
    pub fn dpids(&self) -> Vec<Dpid> {
        self.switches.keys().copied().collect()
    }

    pub fn hosts(&self) -> &[SimHost] {
        &self.hosts
    }

    pub fn links(&self) -> &[SimLink] {
        &self.links
    }

    /// Builds the fabric, returning it with the receiving end of its event channel.
    pub fn build(self) -> (Arc<SimFabric>, EventReceiver) {
        let (tx, rx) = tokio::sync::mpsc::channel(self.event_buffer);
        (Arc::new(SimFabric::new(self, tx)), rx)
    }
}
