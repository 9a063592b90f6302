use std::{net::Ipv4Addr, sync::Arc};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use sdn_common::{constants::ethertype, Dpid, PortNo};
use sdn_fabric::{Action, Fabric, FlowMatch, FlowMod, FlowRule, OutPort, PacketIn, PacketOut, PortRef};
use sdn_wire::{
    frame::{EthernetFrame, Payload},
    MacAddr,
};

use crate::{
    path::{PathError, PathResolver},
    ControllerOptions, ControllerStats,
};

mod guard;
pub use guard::{LoopGuard, Verdict};

/// Forwards the packets switches punt to the controller.
///
/// Address-resolution broadcasts are flooded through the [`LoopGuard`], IPv4 unicast is routed
/// along the path the [`PathResolver`] picks, and everything else falls back to per-switch MAC
/// learning.
pub struct ForwardingController<F> {
    fabric: Arc<F>,
    resolver: PathResolver,
    options: Arc<ControllerOptions>,
    stats: Arc<ControllerStats>,
    /// Per-switch learning tables `mac -> ingress port`. Like the loop guard, entries are only
    /// dropped when their port or switch is invalidated.
    mac_tables: Mutex<FxHashMap<Dpid, FxHashMap<MacAddr, PortNo>>>,
    loop_guard: Mutex<LoopGuard>,
}

impl<F: Fabric> ForwardingController<F> {
    pub fn new(
        fabric: Arc<F>,
        resolver: PathResolver,
        options: Arc<ControllerOptions>,
        stats: Arc<ControllerStats>,
    ) -> Self {
        Self {
            fabric,
            resolver,
            options,
            stats,
            mac_tables: Mutex::new(FxHashMap::default()),
            loop_guard: Mutex::new(LoopGuard::default()),
        }
    }

    /// Handles a packet-in whose frame was already parsed. Discovery frames are expected to be
    /// consumed before they get here; they and IPv6 frames are ignored.
    pub fn handle_packet_in(&self, packet: &PacketIn, frame: &EthernetFrame) {
        match frame.payload {
            Payload::Lldp | Payload::Ipv6 => {}
            Payload::Arp { target_ip, .. } if frame.is_arp_broadcast() => {
                self.handle_broadcast(packet, frame.src, target_ip)
            }
            Payload::Ipv4 { src, dst } => self.handle_unicast(packet, src, dst),
            _ => self.learn_and_forward(packet, frame),
        }
    }

    fn handle_broadcast(&self, packet: &PacketIn, src: MacAddr, target_ip: Ipv4Addr) {
        let verdict = self.loop_guard.lock().observe(packet.dpid, src, target_ip, packet.in_port);

        match verdict {
            Verdict::Flood => {
                debug!(dpid = packet.dpid, in_port = packet.in_port, %src, %target_ip, "Flooding broadcast");
                self.learn(packet.dpid, src, packet.in_port);
                self.stats.increment_broadcasts_flooded();
                self.flood(packet);
            }
            Verdict::Drop => {
                debug!(dpid = packet.dpid, in_port = packet.in_port, %src, %target_ip, "Dropping looped broadcast");
                self.stats.increment_broadcasts_dropped();
                self.drop_packet(packet);
            }
        }
    }

    fn handle_unicast(&self, packet: &PacketIn, src: Ipv4Addr, dst: Ipv4Addr) {
        let path = match self.resolver.resolve_path(src, dst, self.options.weight) {
            Ok(path) => path,
            Err(PathError::Topology(e)) => {
                warn!(dpid = packet.dpid, %src, %dst, "Aborting flow install: {e}");
                self.drop_packet(packet);
                return;
            }
            Err(e) => {
                info!(dpid = packet.dpid, "Dropping packet: {e}");
                self.stats.increment_paths_not_found();
                self.drop_packet(packet);
                return;
            }
        };

        let Some(last) = path.hops.last().copied() else {
            debug!(%src, %dst, "Path has no switches");
            self.drop_packet(packet);
            return;
        };

        info!(weight = %self.options.weight, cost = path.cost, "Path {path}");

        for hop in &path.hops {
            let forward = FlowMatch::any().in_port(hop.in_port).eth_type(ethertype::IPV4).ipv4(src, dst);
            let reverse = FlowMatch::any().in_port(hop.out_port).eth_type(ethertype::IPV4).ipv4(dst, src);

            self.install(hop.dpid, forward, hop.out_port);
            self.install(hop.dpid, reverse, hop.in_port);
        }

        // The buffer only exists on the switch that punted the packet.
        let buffer_id = packet.buffer_id.filter(|_| last.dpid == packet.dpid);

        self.fabric.send_packet_out(PacketOut {
            dpid: last.dpid,
            buffer_id,
            in_port: last.in_port,
            actions: vec![Action::Output(OutPort::Port(last.out_port))],
            data: buffer_id.is_none().then(|| packet.data.clone()),
        });
    }

    fn learn_and_forward(&self, packet: &PacketIn, frame: &EthernetFrame) {
        let out_port = {
            let mut tables = self.mac_tables.lock();
            let table = tables.entry(packet.dpid).or_default();
            table.insert(frame.src, packet.in_port);
            table.get(&frame.dst).copied()
        };

        let Some(out_port) = out_port else {
            debug!(dpid = packet.dpid, dst = %frame.dst, "Unknown destination, flooding");
            self.flood(packet);
            return;
        };

        debug!(dpid = packet.dpid, dst = %frame.dst, out_port, "Learned destination");

        let flow_match = FlowMatch::any().in_port(packet.in_port).eth_dst(frame.dst);
        self.fabric.send_flow_mod(FlowMod::Add(FlowRule::new(
            packet.dpid,
            self.options.priority,
            flow_match,
            vec![Action::Output(OutPort::Port(out_port))],
        )));
        self.stats.increment_flows_installed(1);

        self.packet_out(packet, vec![Action::Output(OutPort::Port(out_port))]);
    }

    fn learn(&self, dpid: Dpid, mac: MacAddr, port_no: PortNo) {
        self.mac_tables.lock().entry(dpid).or_default().insert(mac, port_no);
    }

    fn install(&self, dpid: Dpid, flow_match: FlowMatch, out_port: PortNo) {
        let rule = FlowRule::new(
            dpid,
            self.options.priority,
            flow_match,
            vec![Action::Output(OutPort::Port(out_port))],
        )
        .with_timeouts(self.options.idle_timeout, self.options.hard_timeout);

        self.fabric.send_flow_mod(FlowMod::Add(rule));
        self.stats.increment_flows_installed(1);
    }

    fn flood(&self, packet: &PacketIn) {
        self.packet_out(packet, vec![Action::Output(OutPort::Flood)]);
    }

    /// Sends the packet back out of the switch that punted it.
    fn packet_out(&self, packet: &PacketIn, actions: Vec<Action>) {
        self.fabric.send_packet_out(PacketOut {
            dpid: packet.dpid,
            buffer_id: packet.buffer_id,
            in_port: packet.in_port,
            actions,
            data: packet.buffer_id.is_none().then(|| packet.data.clone()),
        });
    }

    /// Frees the switch buffer holding the packet, if any. Unbuffered packets need no action.
    fn drop_packet(&self, packet: &PacketIn) {
        if packet.buffer_id.is_some() {
            self.packet_out(packet, Vec::new());
        }
    }

    /// Installs the match-all rule that punts unmatched packets to the controller.
    pub fn install_table_miss(&self, dpid: Dpid) {
        let rule = FlowRule::new(
            dpid,
            self.options.table_miss_priority,
            FlowMatch::any(),
            vec![Action::Output(OutPort::Controller)],
        );

        self.fabric.send_flow_mod(FlowMod::Add(rule));
        self.stats.increment_flows_installed(1);
    }

    /// Deletes every flow rule matching traffic entering `port`, and forgets what was learned
    /// on it.
    pub fn invalidate_port(&self, port: PortRef) {
        debug!(%port, "Invalidating flows");

        self.fabric.send_flow_mod(FlowMod::Delete {
            dpid: port.dpid,
            flow_match: FlowMatch::any().in_port(port.port_no),
        });
        self.stats.increment_flows_deleted();

        self.loop_guard.lock().forget_port(port.dpid, port.port_no);
        if let Some(table) = self.mac_tables.lock().get_mut(&port.dpid) {
            table.retain(|_, port_no| *port_no != port.port_no);
        }
    }

    /// Drops all state kept for a switch.
    pub fn forget_switch(&self, dpid: Dpid) {
        self.loop_guard.lock().forget_switch(dpid);
        self.mac_tables.lock().remove(&dpid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use sdn_sim::SimNetwork;
    use sdn_wire::frame;

    use crate::topology::TopologyStore;

    const A: MacAddr = MacAddr(0x02, 0, 0, 0, 0, 0x0a);
    const B: MacAddr = MacAddr(0x02, 0, 0, 0, 0, 0x0b);

    fn packet_in(dpid: Dpid, in_port: PortNo, buffer_id: Option<u32>, data: Bytes) -> PacketIn {
        PacketIn { dpid, in_port, buffer_id, data }
    }

    fn controller(
        network: SimNetwork,
    ) -> (ForwardingController<sdn_sim::SimFabric>, Arc<sdn_sim::SimFabric>, Arc<TopologyStore>) {
        let (fabric, _events) = network.build();
        let topology = Arc::new(TopologyStore::new());
        let forwarding = ForwardingController::new(
            Arc::clone(&fabric),
            PathResolver::new(Arc::clone(&topology)),
            Arc::new(ControllerOptions::default()),
            Arc::new(ControllerStats::default()),
        );

        (forwarding, fabric, topology)
    }

    fn handle(forwarding: &ForwardingController<sdn_sim::SimFabric>, packet: PacketIn) {
        let frame = EthernetFrame::parse(&packet.data).unwrap();
        forwarding.handle_packet_in(&packet, &frame);
    }

    #[test]
    fn looped_broadcast_is_dropped() {
        let (forwarding, fabric, _) = controller(SimNetwork::new());
        let arp = frame::arp_request(A, Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2));

        handle(&forwarding, packet_in(1, 3, Some(7), arp.clone()));
        handle(&forwarding, packet_in(1, 5, Some(8), arp.clone()));
        handle(&forwarding, packet_in(1, 5, None, arp.clone()));
        handle(&forwarding, packet_in(1, 3, None, arp.clone()));

        let outs = fabric.packet_outs();
        assert_eq!(outs.len(), 3);

        assert_eq!(outs[0].in_port, 3);
        assert_eq!(outs[0].buffer_id, Some(7));
        assert_eq!(outs[0].data, None);
        assert_eq!(outs[0].actions, vec![Action::Output(OutPort::Flood)]);

        // Buffered drop frees the buffer, unbuffered drop sends nothing.
        assert!(outs[1].is_drop());
        assert_eq!(outs[1].buffer_id, Some(8));

        assert_eq!(outs[2].in_port, 3);
        assert_eq!(outs[2].data, Some(arp));
        assert_eq!(outs[2].actions, vec![Action::Output(OutPort::Flood)]);

        assert_eq!(forwarding.stats.broadcasts_flooded(), 2);
        assert_eq!(forwarding.stats.broadcasts_dropped(), 2);
    }

    #[test]
    fn learning_fallback() {
        let (forwarding, fabric, _) = controller(SimNetwork::new());
        let ip_a = Ipv4Addr::new(10, 0, 0, 1);
        let ip_b = Ipv4Addr::new(10, 0, 0, 2);

        // Unicast reply to a destination not learned yet is flooded.
        handle(&forwarding, packet_in(1, 2, None, frame::arp_reply(B, ip_b, A, ip_a)));
        assert!(fabric.flow_mods().is_empty());
        assert_eq!(fabric.packet_outs()[0].actions, vec![Action::Output(OutPort::Flood)]);

        // B was learned on port 2 while flooding.
        handle(&forwarding, packet_in(1, 1, None, frame::arp_reply(A, ip_a, B, ip_b)));
        assert_eq!(
            fabric.flow_mods(),
            vec![FlowMod::Add(FlowRule::new(
                1,
                1,
                FlowMatch::any().in_port(1).eth_dst(B),
                vec![Action::Output(OutPort::Port(2))]
            ))]
        );
        assert_eq!(fabric.packet_outs()[1].actions, vec![Action::Output(OutPort::Port(2))]);

        forwarding.invalidate_port(PortRef::new(1, 2));
        handle(&forwarding, packet_in(1, 1, None, frame::arp_reply(A, ip_a, B, ip_b)));
        assert_eq!(fabric.packet_outs()[2].actions, vec![Action::Output(OutPort::Flood)]);
    }

    #[test]
    fn unicast_without_path_is_dropped() {
        let (forwarding, fabric, _) = controller(SimNetwork::new());
        let data =
            frame::ipv4(A, B, Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2), b"ping");

        handle(&forwarding, packet_in(1, 1, Some(3), data));

        assert!(fabric.flow_mods().is_empty());
        assert!(fabric.packet_outs()[0].is_drop());
        assert_eq!(forwarding.stats.paths_not_found(), 1);
    }

    #[test]
    fn unicast_installs_both_directions() {
        let network = SimNetwork::new()
            .switch(1)
            .switch(2)
            .host(1, Ipv4Addr::new(10, 0, 0, 1))
            .host(2, Ipv4Addr::new(10, 0, 0, 2))
            .link(1, 2, 1.0);
        let (forwarding, fabric, topology) = controller(network);

        let snapshot = futures::executor::block_on(fabric.snapshot());
        topology.rebuild(&snapshot, &crate::DelayEstimator::default());

        let (src, dst) = (Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2));
        let data = frame::ipv4(A, B, src, dst, b"ping");
        handle(&forwarding, packet_in(1, 1, Some(9), data.clone()));

        // s1: host on port 1, link on port 2. s2: host on port 1, link on port 2.
        let mods = fabric.flow_mods();
        assert_eq!(mods.len(), 4);
        for (dpid, offset) in [(1, 0), (2, 2)] {
            let (in_port, out_port) = if dpid == 1 { (1, 2) } else { (2, 1) };
            let FlowMod::Add(forward) = &mods[offset] else { panic!("expected add") };
            let FlowMod::Add(reverse) = &mods[offset + 1] else { panic!("expected add") };

            assert_eq!(forward.dpid, dpid);
            assert_eq!(forward.flow_match, FlowMatch::any().in_port(in_port).eth_type(0x0800).ipv4(src, dst));
            assert_eq!(forward.out_port(), Some(OutPort::Port(out_port)));
            assert_eq!((forward.idle_timeout, forward.hard_timeout), (10, 30));

            assert_eq!(reverse.flow_match, FlowMatch::any().in_port(out_port).eth_type(0x0800).ipv4(dst, src));
            assert_eq!(reverse.out_port(), Some(OutPort::Port(in_port)));
        }

        // Final hop is on another switch, so the frame travels with the packet-out.
        let outs = fabric.packet_outs();
        assert_eq!(outs.len(), 1);
        assert_eq!(outs[0].dpid, 2);
        assert_eq!(outs[0].buffer_id, None);
        assert_eq!(outs[0].data, Some(data));
        assert_eq!(outs[0].actions, vec![Action::Output(OutPort::Port(1))]);
    }

    #[test]
    fn ipv6_is_ignored() {
        let (forwarding, fabric, _) = controller(SimNetwork::new());
        let packet = packet_in(1, 1, Some(1), Bytes::new());
        let frame = EthernetFrame { src: A, dst: B, payload: Payload::Ipv6 };

        forwarding.handle_packet_in(&packet, &frame);
        assert!(fabric.packet_outs().is_empty());
        assert!(fabric.flow_mods().is_empty());
    }
}
