#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

use bytes::Bytes;
use sdn_common::Dpid;
use tokio::sync::mpsc;

mod event;
mod flow;
mod topology;

pub use event::*;
pub use flow::*;
pub use topology::*;

/// The stream of events a fabric delivers to the controller.
pub type EventReceiver = mpsc::Receiver<FabricEvent>;

/// The switch fabric the controller manages.
///
/// A fabric wraps the control channels to all connected switches together with the discovery
/// service that tracks switches, hosts and links. Events (switch state, port status, packet-ins,
/// echo replies) flow from the fabric to the controller over an [`EventReceiver`] handed out
/// when the fabric is created; everything the controller sends back goes through this trait.
///
/// All send operations are fire-and-forget: there is no acknowledgement, and an instruction
/// dropped by the switch is indistinguishable from one that was applied.
#[async_trait::async_trait]
pub trait Fabric: Send + Sync + 'static {
    /// Returns the switches currently known to the discovery service.
    async fn switches(&self) -> Vec<SwitchDesc>;

    /// Returns the hosts currently known to the discovery service.
    async fn hosts(&self) -> Vec<HostDesc>;

    /// Returns the switch-to-switch links currently known to the discovery service.
    async fn links(&self) -> Vec<LinkDesc>;

    /// Takes a full snapshot of the discovered topology.
    async fn snapshot(&self) -> TopologySnapshot {
        let switches = self.switches().await;
        let hosts = self.hosts().await;
        let links = self.links().await;

        TopologySnapshot { switches, hosts, links }
    }

    /// Adds or deletes flow rules on a switch.
    fn send_flow_mod(&self, flow_mod: FlowMod);

    /// Injects a packet into the data plane of a switch.
    fn send_packet_out(&self, packet_out: PacketOut);

    /// Sends an echo request carrying `data` to the given switch. The reply is delivered as a
    /// [`FabricEvent::EchoReply`] with the same payload.
    fn send_echo_request(&self, dpid: Dpid, data: Bytes);
}
