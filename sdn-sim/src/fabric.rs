use std::{
    collections::BTreeSet,
    net::Ipv4Addr,
    sync::atomic::{AtomicU32, AtomicUsize, Ordering},
    time::Duration,
};

use bytes::Bytes;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace, warn};

use sdn_common::{unix_micros, Dpid, PortNo};
use sdn_fabric::{
    Action, EchoReply, Fabric, FabricEvent, FlowMod, HostDesc, LinkDesc, OutPort, PacketIn,
    PacketOut, PortReason, PortRef, PortStatus, SwitchDesc, SwitchState,
};
use sdn_wire::{lldp::DiscoveryFrame, MacAddr};

use crate::{SimHost, SimLink, SimNetwork};

/// A frame that left the network through a host-facing port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub host: Ipv4Addr,
    pub data: Bytes,
}

/// Counters kept by the simulated fabric.
#[derive(Debug, Default)]
pub struct SimStats {
    echo_requests: AtomicUsize,
    discovery_frames: AtomicUsize,
    link_copies: AtomicUsize,
    copies_dropped: AtomicUsize,
    events_dropped: AtomicUsize,
}

impl SimStats {
    /// Echo requests received from the controller.
    pub fn echo_requests(&self) -> usize {
        self.echo_requests.load(Ordering::Relaxed)
    }

    /// Discovery frames emitted towards the controller.
    pub fn discovery_frames(&self) -> usize {
        self.discovery_frames.load(Ordering::Relaxed)
    }

    /// Packet copies carried across links.
    pub fn link_copies(&self) -> usize {
        self.link_copies.load(Ordering::Relaxed)
    }

    /// Packet copies dropped because the delivery budget ran out.
    pub fn copies_dropped(&self) -> usize {
        self.copies_dropped.load(Ordering::Relaxed)
    }

    /// Events dropped because the event channel was full or closed.
    pub fn events_dropped(&self) -> usize {
        self.events_dropped.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct State {
    network: SimNetwork,
    /// Switches taken down with [`SimFabric::disconnect`].
    down: BTreeSet<Dpid>,
}

impl State {
    fn is_up(&self, dpid: Dpid) -> bool {
        self.network.switches.contains_key(&dpid) && !self.down.contains(&dpid)
    }

    fn link_at(&self, port: PortRef) -> Option<&SimLink> {
        self.network.links.iter().find(|link| link.peer(port).is_some())
    }

    fn host_at(&self, port: PortRef) -> Option<&SimHost> {
        self.network.hosts.iter().find(|host| host.port == port)
    }

    fn control_delay(&self, dpid: Dpid) -> f64 {
        self.network.switches.get(&dpid).map_or(0.0, |switch| switch.control_delay)
    }
}

/// An in-memory switch fabric.
///
/// The discovery service view (`switches`, `hosts`, `links`) is the configured network minus
/// disconnected switches. Every call to [`Fabric::links`] also emits one timestamped discovery
/// frame per link direction, backdated so the controller measures the configured link delay
/// plus half of each switch's control round trip. Echo requests are answered after the
/// switch's control round trip.
///
/// Flow mods and packet-outs are recorded. Packet-outs are also carried through the network:
/// a copy sent out a linked port arrives at the peer switch as a packet-in, and a copy sent out
/// a host-facing port is recorded as a [`Delivery`].
#[derive(Debug)]
pub struct SimFabric {
    state: Mutex<State>,
    events: Mutex<Option<mpsc::Sender<FabricEvent>>>,
    flow_mods: Mutex<Vec<FlowMod>>,
    packet_outs: Mutex<Vec<PacketOut>>,
    deliveries: Mutex<Vec<Delivery>>,
    /// Frames held by switches, keyed by `(dpid, buffer_id)`.
    buffers: Mutex<FxHashMap<(Dpid, u32), Bytes>>,
    next_buffer_id: AtomicU32,
    budget: AtomicUsize,
    stats: SimStats,
}

impl SimFabric {
    pub(crate) fn new(network: SimNetwork, events: mpsc::Sender<FabricEvent>) -> Self {
        let budget = AtomicUsize::new(network.delivery_budget);

        Self {
            state: Mutex::new(State { network, down: BTreeSet::new() }),
            events: Mutex::new(Some(events)),
            flow_mods: Mutex::default(),
            packet_outs: Mutex::default(),
            deliveries: Mutex::default(),
            buffers: Mutex::default(),
            next_buffer_id: AtomicU32::new(1),
            budget,
            stats: SimStats::default(),
        }
    }

    fn emit(&self, event: FabricEvent) {
        let events = self.events.lock();
        let Some(tx) = events.as_ref() else {
            self.stats.events_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event");
                self.stats.events_dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Closed(_)) => {
                trace!("Event channel closed, dropping event");
                self.stats.events_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Announces every switch to the controller, in datapath id order.
    pub fn connect_all(&self) {
        let switches: Vec<_> = {
            let mut state = self.state.lock();
            state.down.clear();
            state.network.switches.iter().map(|(dpid, switch)| (*dpid, switch.ports.clone())).collect()
        };

        for (dpid, ports) in switches {
            self.emit(FabricEvent::Switch { dpid, state: SwitchState::Up { ports } });
        }
    }

    /// Reconnects a switch taken down with [`SimFabric::disconnect`].
    pub fn connect(&self, dpid: Dpid) {
        let ports = {
            let mut state = self.state.lock();
            state.down.remove(&dpid);
            state.network.switches.get(&dpid).map(|switch| switch.ports.clone())
        };

        if let Some(ports) = ports {
            self.emit(FabricEvent::Switch { dpid, state: SwitchState::Up { ports } });
        }
    }

    /// Takes a switch down. It disappears from the discovery view together with its hosts and
    /// links.
    pub fn disconnect(&self, dpid: Dpid) {
        self.state.lock().down.insert(dpid);
        self.emit(FabricEvent::Switch { dpid, state: SwitchState::Down });
    }

    /// Reports a port status change.
    pub fn port_status(&self, dpid: Dpid, port_no: PortNo, reason: PortReason) {
        self.emit(FabricEvent::PortStatus(PortStatus { dpid, port_no, reason }));
    }

    /// Removes every link between switches `a` and `b`.
    pub fn remove_link(&self, a: Dpid, b: Dpid) {
        self.state.lock().network.links.retain(|link| !link.connects(a, b));
    }

    /// Changes the delay of every link between switches `a` and `b`.
    pub fn set_link_delay(&self, a: Dpid, b: Dpid, delay_ms: f64) {
        for link in self.state.lock().network.links.iter_mut().filter(|link| link.connects(a, b)) {
            link.delay = delay_ms;
        }
    }

    /// Returns the host with address `ip`.
    pub fn host(&self, ip: Ipv4Addr) -> Option<SimHost> {
        self.state.lock().network.hosts.iter().find(|host| host.ip == ip).copied()
    }

    /// Puts `data` on the wire from the host with address `src`. The attached switch buffers
    /// the frame and punts it to the controller. Returns false if there is no such host.
    pub fn send_from_host(&self, src: Ipv4Addr, data: Bytes) -> bool {
        let Some(host) = self.host(src) else {
            return false;
        };

        let buffer_id = self.next_buffer_id.fetch_add(1, Ordering::Relaxed);
        self.buffers.lock().insert((host.port.dpid, buffer_id), data.clone());

        self.emit(FabricEvent::PacketIn(PacketIn {
            dpid: host.port.dpid,
            in_port: host.port.port_no,
            buffer_id: Some(buffer_id),
            data,
        }));

        true
    }

    /// Delivers a packet-in as is.
    pub fn inject(&self, packet: PacketIn) {
        self.emit(FabricEvent::PacketIn(packet));
    }

    /// Closes the event channel.
    pub fn close(&self) {
        self.events.lock().take();
    }

    pub fn flow_mods(&self) -> Vec<FlowMod> {
        self.flow_mods.lock().clone()
    }

    pub fn packet_outs(&self) -> Vec<PacketOut> {
        self.packet_outs.lock().clone()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    /// Clears recorded flow mods, packet-outs and deliveries.
    pub fn clear_records(&self) {
        self.flow_mods.lock().clear();
        self.packet_outs.lock().clear();
        self.deliveries.lock().clear();
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Carries a copy of `data` out of `port`.
    fn transmit(&self, port: PortRef, data: &Bytes) {
        enum Next {
            Switch(PortRef),
            Host(Ipv4Addr),
        }

        let next = {
            let state = self.state.lock();
            if let Some(host) = state.host_at(port) {
                Some(Next::Host(host.ip))
            } else {
                state
                    .link_at(port)
                    .and_then(|link| link.peer(port))
                    .filter(|peer| state.is_up(peer.dpid))
                    .map(Next::Switch)
            }
        };

        match next {
            Some(Next::Host(host)) => {
                trace!(%port, %host, "Delivering to host");
                self.deliveries.lock().push(Delivery { host, data: data.clone() });
            }
            Some(Next::Switch(peer)) => {
                let has_budget = self
                    .budget
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |budget| budget.checked_sub(1))
                    .is_ok();

                if !has_budget {
                    self.stats.copies_dropped.fetch_add(1, Ordering::Relaxed);
                    return;
                }

                self.stats.link_copies.fetch_add(1, Ordering::Relaxed);
                self.emit(FabricEvent::PacketIn(PacketIn {
                    dpid: peer.dpid,
                    in_port: peer.port_no,
                    buffer_id: None,
                    data: data.clone(),
                }));
            }
            None => {}
        }
    }
}

#[async_trait::async_trait]
impl Fabric for SimFabric {
    async fn switches(&self) -> Vec<SwitchDesc> {
        let state = self.state.lock();
        state
            .network
            .switches
            .iter()
            .filter(|(dpid, _)| !state.down.contains(*dpid))
            .map(|(dpid, switch)| SwitchDesc { dpid: *dpid, ports: switch.ports.clone() })
            .collect()
    }

    async fn hosts(&self) -> Vec<HostDesc> {
        let state = self.state.lock();
        state
            .network
            .hosts
            .iter()
            .filter(|host| state.is_up(host.port.dpid))
            .map(|host| HostDesc { mac: host.mac, ipv4: vec![host.ip], port: host.port })
            .collect()
    }

    async fn links(&self) -> Vec<LinkDesc> {
        let now = unix_micros();
        let mut links = Vec::new();
        let mut frames = Vec::new();

        {
            let state = self.state.lock();
            for link in state.network.links.iter().filter(|l| state.is_up(l.a.dpid) && state.is_up(l.b.dpid)) {
                for (src, dst) in [(link.a, link.b), (link.b, link.a)] {
                    links.push(LinkDesc { src, dst });

                    let one_way = link.delay + (state.control_delay(src.dpid) + state.control_delay(dst.dpid)) / 2.0;
                    let sent_at = now.saturating_sub((one_way * 1_000.0) as u64);
                    let frame = DiscoveryFrame::new(src.dpid, src.port_no).with_timestamp(sent_at);
                    let mac = MacAddr::new(0x02, 0xff, 0, 0, src.dpid as u8, src.port_no as u8);

                    frames.push(PacketIn { dpid: dst.dpid, in_port: dst.port_no, buffer_id: None, data: frame.encode(mac) });
                }
            }
        }

        for frame in frames {
            self.stats.discovery_frames.fetch_add(1, Ordering::Relaxed);
            self.emit(FabricEvent::PacketIn(frame));
        }

        links
    }

    fn send_flow_mod(&self, flow_mod: FlowMod) {
        trace!(dpid = flow_mod.dpid(), ?flow_mod, "Flow mod");
        self.flow_mods.lock().push(flow_mod);
    }

    fn send_packet_out(&self, packet_out: PacketOut) {
        let data = match packet_out.buffer_id {
            Some(buffer_id) => self.buffers.lock().remove(&(packet_out.dpid, buffer_id)),
            None => packet_out.data.clone(),
        };

        let ports = {
            let state = self.state.lock();
            state.network.switches.get(&packet_out.dpid).map(|switch| switch.ports.clone()).unwrap_or_default()
        };

        self.packet_outs.lock().push(packet_out.clone());

        let Some(data) = data else {
            debug!(dpid = packet_out.dpid, buffer_id = ?packet_out.buffer_id, "Packet-out without data");
            return;
        };

        for Action::Output(out) in &packet_out.actions {
            match out {
                OutPort::Port(port_no) => self.transmit(PortRef::new(packet_out.dpid, *port_no), &data),
                OutPort::Flood => {
                    for port_no in ports.iter().filter(|port_no| **port_no != packet_out.in_port) {
                        self.transmit(PortRef::new(packet_out.dpid, *port_no), &data);
                    }
                }
                OutPort::Controller => {}
            }
        }
    }

    fn send_echo_request(&self, dpid: Dpid, data: Bytes) {
        self.stats.echo_requests.fetch_add(1, Ordering::Relaxed);

        let (up, delay) = {
            let state = self.state.lock();
            (state.is_up(dpid), state.control_delay(dpid))
        };
        if !up {
            return;
        }

        let reply = FabricEvent::EchoReply(EchoReply { dpid, data });
        let tx = self.events.lock().clone();

        match (tx, tokio::runtime::Handle::try_current()) {
            (Some(tx), Ok(runtime)) if delay > 0.0 => {
                runtime.spawn(async move {
                    tokio::time::sleep(Duration::from_secs_f64(delay / 1_000.0)).await;
                    let _ = tx.send(reply).await;
                });
            }
            _ => self.emit(reply),
        }
    }
}
