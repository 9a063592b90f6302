use std::{fmt, net::Ipv4Addr};

use sdn_common::{Dpid, PortNo};
use sdn_wire::MacAddr;

/// A port on a specific switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortRef {
    pub dpid: Dpid,
    pub port_no: PortNo,
}

impl PortRef {
    pub const fn new(dpid: Dpid, port_no: PortNo) -> Self {
        Self { dpid, port_no }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}:{}", self.dpid, self.port_no)
    }
}

/// A connected switch and its data ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchDesc {
    pub dpid: Dpid,
    pub ports: Vec<PortNo>,
}

/// A host seen by the discovery service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDesc {
    pub mac: MacAddr,
    /// All IPv4 addresses learned for the host, in the order they were learned.
    pub ipv4: Vec<Ipv4Addr>,
    /// The switch port the host is attached to.
    pub port: PortRef,
}

/// A unidirectional link between two switch ports. The discovery service reports each physical
/// link once per direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkDesc {
    pub src: PortRef,
    pub dst: PortRef,
}

/// Everything the discovery service knows at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologySnapshot {
    pub switches: Vec<SwitchDesc>,
    pub hosts: Vec<HostDesc>,
    pub links: Vec<LinkDesc>,
}
