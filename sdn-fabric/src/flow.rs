use std::net::Ipv4Addr;

use bytes::Bytes;
use sdn_common::{constants::port, Dpid, PortNo};
use sdn_wire::MacAddr;

/// Where an output action sends a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutPort {
    Port(PortNo),
    /// All ports except the ingress port.
    Flood,
    Controller,
}

impl OutPort {
    /// Returns the OpenFlow port number for this output.
    pub const fn port_no(&self) -> PortNo {
        match self {
            Self::Port(port_no) => *port_no,
            Self::Flood => port::FLOOD,
            Self::Controller => port::CONTROLLER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Output(OutPort),
}

/// Match fields of a flow rule. Unset fields are wildcards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowMatch {
    pub in_port: Option<PortNo>,
    pub eth_type: Option<u16>,
    pub eth_dst: Option<MacAddr>,
    pub ipv4_src: Option<Ipv4Addr>,
    pub ipv4_dst: Option<Ipv4Addr>,
}

impl FlowMatch {
    /// Matches every packet.
    pub fn any() -> Self {
        Self::default()
    }

    pub const fn in_port(mut self, in_port: PortNo) -> Self {
        self.in_port = Some(in_port);
        self
    }

    pub const fn eth_type(mut self, eth_type: u16) -> Self {
        self.eth_type = Some(eth_type);
        self
    }

    pub const fn eth_dst(mut self, eth_dst: MacAddr) -> Self {
        self.eth_dst = Some(eth_dst);
        self
    }

    pub const fn ipv4(mut self, src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        self.ipv4_src = Some(src);
        self.ipv4_dst = Some(dst);
        self
    }
}

/// A flow rule to install on a switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRule {
    pub dpid: Dpid,
    pub priority: u16,
    pub flow_match: FlowMatch,
    pub actions: Vec<Action>,
    /// Seconds without a matching packet after which the rule expires. 0 disables.
    pub idle_timeout: u16,
    /// Seconds after which the rule expires regardless of traffic. 0 disables.
    pub hard_timeout: u16,
}

impl FlowRule {
    /// A permanent rule with the given match and actions.
    pub fn new(dpid: Dpid, priority: u16, flow_match: FlowMatch, actions: Vec<Action>) -> Self {
        Self { dpid, priority, flow_match, actions, idle_timeout: 0, hard_timeout: 0 }
    }

    pub fn with_timeouts(mut self, idle_timeout: u16, hard_timeout: u16) -> Self {
        self.idle_timeout = idle_timeout;
        self.hard_timeout = hard_timeout;
        self
    }

    /// Returns the port of the first output action, if any.
    pub fn out_port(&self) -> Option<OutPort> {
        self.actions.iter().map(|Action::Output(port)| *port).next()
    }
}

/// A flow table modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowMod {
    Add(FlowRule),
    /// Deletes every rule on `dpid` matched by `flow_match`.
    Delete { dpid: Dpid, flow_match: FlowMatch },
}

impl FlowMod {
    pub const fn dpid(&self) -> Dpid {
        match self {
            Self::Add(rule) => rule.dpid,
            Self::Delete { dpid, .. } => *dpid,
        }
    }
}

/// A packet to inject into a switch's data plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut {
    pub dpid: Dpid,
    /// Buffer holding the packet on the switch. If `None`, `data` carries the frame.
    pub buffer_id: Option<u32>,
    pub in_port: PortNo,
    /// An empty action list drops the packet.
    pub actions: Vec<Action>,
    pub data: Option<Bytes>,
}

impl PacketOut {
    /// Returns true if this packet-out discards the packet.
    pub fn is_drop(&self) -> bool {
        self.actions.is_empty()
    }
}
