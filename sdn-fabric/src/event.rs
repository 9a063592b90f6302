use bytes::Bytes;
use sdn_common::{Dpid, PortNo};

/// Why a port status message was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortReason {
    Add,
    Modify,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortStatus {
    pub dpid: Dpid,
    pub port_no: PortNo,
    pub reason: PortReason,
}

/// A packet the switch could not match and punted to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    pub dpid: Dpid,
    pub in_port: PortNo,
    /// Buffer holding the packet on the switch, if it was buffered.
    pub buffer_id: Option<u32>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoReply {
    pub dpid: Dpid,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchState {
    /// The switch connected and reported its ports.
    Up { ports: Vec<PortNo> },
    Down,
}

/// Events delivered by the fabric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FabricEvent {
    Switch { dpid: Dpid, state: SwitchState },
    PortStatus(PortStatus),
    PacketIn(PacketIn),
    EchoReply(EchoReply),
}

impl FabricEvent {
    /// Hands the event to the matching callback of `handler`.
    pub fn dispatch<H: EventHandler + ?Sized>(self, handler: &H) {
        match self {
            Self::Switch { dpid, state } => handler.on_switch_state(dpid, state),
            Self::PortStatus(status) => handler.on_port_changed(status),
            Self::PacketIn(packet) => handler.on_ingress_packet(packet),
            Self::EchoReply(reply) => handler.on_echo_reply(reply),
        }
    }
}

/// Callbacks invoked for every event the fabric delivers. Callbacks run to completion on the
/// dispatching task and must not block.
pub trait EventHandler: Send + Sync + 'static {
    fn on_switch_state(&self, dpid: Dpid, state: SwitchState);

    fn on_ingress_packet(&self, packet: PacketIn);

    fn on_port_changed(&self, status: PortStatus);

    fn on_echo_reply(&self, reply: EchoReply);
}

/// A recurring background job. `on_tick` may yield; other events are dispatched while it is
/// suspended.
#[async_trait::async_trait]
pub trait TickHandler: Send + Sync + 'static {
    async fn on_tick(&self);
}
