use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, trace};

use sdn_common::{elapsed_millis, unix_micros, Dpid};
use sdn_fabric::{
    EchoReply, EventHandler, EventReceiver, Fabric, PacketIn, PortReason, PortRef, PortStatus,
    SwitchState,
};
use sdn_wire::{
    echo::EchoProbe,
    frame::{EthernetFrame, Payload},
    lldp::DiscoveryFrame,
};

use crate::{
    discovery::DiscoveryScheduler, forwarding::ForwardingController, registry::SwitchRegistry,
    ControllerOptions, ControllerStats, DelayEstimator, PathResolver, TopologyStore,
};

mod driver;
mod handle;

use driver::ControllerDriver;
pub use handle::ControllerHandle;

/// The controller: reacts to fabric events, feeds timing samples into the delay estimator and
/// hands everything else to the [`ForwardingController`].
pub struct Controller<F> {
    fabric: Arc<F>,
    options: Arc<ControllerOptions>,
    stats: Arc<ControllerStats>,
    topology: Arc<TopologyStore>,
    delays: Arc<Mutex<DelayEstimator>>,
    registry: Mutex<SwitchRegistry>,
    forwarding: Arc<ForwardingController<F>>,
}

impl<F: Fabric> Controller<F> {
    pub fn new(fabric: Arc<F>, options: ControllerOptions) -> Self {
        let options = Arc::new(options);
        let stats = Arc::new(ControllerStats::default());
        let topology = Arc::new(TopologyStore::new());

        let forwarding = Arc::new(ForwardingController::new(
            Arc::clone(&fabric),
            PathResolver::new(Arc::clone(&topology)),
            Arc::clone(&options),
            Arc::clone(&stats),
        ));

        Self {
            fabric,
            options,
            stats,
            topology,
            delays: Arc::new(Mutex::new(DelayEstimator::default())),
            registry: Mutex::new(SwitchRegistry::default()),
            forwarding,
        }
    }

    /// Starts a controller for `fabric`, consuming its events. Must be called from within a
    /// tokio runtime.
    ///
    /// Two tasks are spawned: the driver dispatching fabric events, and the discovery
    /// scheduler. Both stop when the returned handle is dropped. The scheduler also stops once
    /// the event channel closes.
    pub fn spawn(fabric: Arc<F>, events: EventReceiver, options: ControllerOptions) -> ControllerHandle {
        Arc::new(Self::new(fabric, options)).start(events)
    }

    fn start(self: Arc<Self>, events: EventReceiver) -> ControllerHandle {
        let scheduler = Arc::new(self.scheduler());
        let discovery_task = tokio::spawn(scheduler.run());
        let discovery = discovery_task.abort_handle();

        let handle = ControllerHandle {
            options: Arc::clone(&self.options),
            stats: Arc::clone(&self.stats),
            topology: Arc::clone(&self.topology),
            delays: Arc::clone(&self.delays),
            driver_task: tokio::spawn(async move {
                ControllerDriver { events, handler: self }.await;
                discovery.abort();
            }),
            discovery_task,
        };

        info!(weight = %handle.options.weight, "Controller started");

        handle
    }

    /// Creates the discovery scheduler sharing this controller's state.
    pub fn scheduler(&self) -> DiscoveryScheduler<F> {
        DiscoveryScheduler::new(
            Arc::clone(&self.fabric),
            Arc::clone(&self.topology),
            Arc::clone(&self.delays),
            Arc::clone(&self.forwarding),
            Arc::clone(&self.options),
            Arc::clone(&self.stats),
        )
    }

    pub fn stats(&self) -> &ControllerStats {
        &self.stats
    }

    pub fn topology(&self) -> &Arc<TopologyStore> {
        &self.topology
    }

    /// Returns the current delay estimate between two switches, in milliseconds.
    pub fn link_delay(&self, a: Dpid, b: Dpid) -> f64 {
        self.delays.lock().link_delay(a, b)
    }

    /// Records the one-way delay carried by a discovery frame. Frames that cannot be decoded,
    /// carry no timestamp, or were sent from a port that is not managed are discarded.
    fn on_discovery_frame(&self, packet: &PacketIn) {
        let now = unix_micros();

        let frame = match DiscoveryFrame::decode(&packet.data) {
            Ok(frame) => frame,
            Err(e) => {
                trace!(dpid = packet.dpid, "Discarding discovery frame: {e}");
                self.stats.increment_discovery_frames_discarded();
                return;
            }
        };

        let Some(sent_at) = frame.timestamp else {
            trace!(dpid = packet.dpid, src = frame.dpid, "Discarding discovery frame without timestamp");
            self.stats.increment_discovery_frames_discarded();
            return;
        };

        if !self.registry.lock().is_managed(frame.dpid, frame.port_no) {
            trace!(src = frame.dpid, port = frame.port_no, "Discarding discovery frame from unmanaged port");
            self.stats.increment_discovery_frames_discarded();
            return;
        }

        let delay = elapsed_millis(sent_at, now);
        trace!(src = frame.dpid, dst = packet.dpid, delay, "Discovery sample");

        self.delays.lock().record_lldp(frame.dpid, packet.dpid, delay);
        self.stats.increment_lldp_samples();
    }
}

impl<F: Fabric> EventHandler for Controller<F> {
    fn on_switch_state(&self, dpid: Dpid, state: SwitchState) {
        match state {
            SwitchState::Up { ports } => {
                info!(dpid, ports = ports.len(), "Switch connected");
                self.registry.lock().insert(dpid, ports);
                self.forwarding.install_table_miss(dpid);
            }
            SwitchState::Down => {
                if self.registry.lock().remove(dpid) {
                    info!(dpid, "Switch disconnected");
                }
                self.forwarding.forget_switch(dpid);
                self.delays.lock().forget_switch(dpid);
            }
        }
    }

    fn on_ingress_packet(&self, packet: PacketIn) {
        self.stats.increment_packet_ins();

        let frame = match EthernetFrame::parse(&packet.data) {
            Ok(frame) => frame,
            Err(e) => {
                trace!(dpid = packet.dpid, in_port = packet.in_port, "Discarding frame: {e}");
                return;
            }
        };

        if matches!(frame.payload, Payload::Lldp) {
            self.on_discovery_frame(&packet);
            return;
        }

        self.forwarding.handle_packet_in(&packet, &frame);
    }

    fn on_port_changed(&self, status: PortStatus) {
        debug!(dpid = status.dpid, port = status.port_no, reason = ?status.reason, "Port changed");

        {
            let mut registry = self.registry.lock();
            match status.reason {
                PortReason::Add => registry.add_port(status.dpid, status.port_no),
                PortReason::Delete => registry.remove_port(status.dpid, status.port_no),
                PortReason::Modify => {}
            }
        }

        self.forwarding.invalidate_port(PortRef::new(status.dpid, status.port_no));
    }

    fn on_echo_reply(&self, reply: EchoReply) {
        let now = unix_micros();

        let probe = match EchoProbe::decode(&reply.data) {
            Ok(probe) => probe,
            Err(e) => {
                trace!(dpid = reply.dpid, "Discarding echo reply: {e}");
                self.stats.increment_echo_replies_discarded();
                return;
            }
        };

        if !self.registry.lock().contains(reply.dpid) {
            trace!(dpid = reply.dpid, "Discarding echo reply from unknown switch");
            self.stats.increment_echo_replies_discarded();
            return;
        }

        let delay = elapsed_millis(probe.sent_at(), now);
        trace!(dpid = reply.dpid, delay, "Echo sample");

        self.delays.lock().record_echo(reply.dpid, delay);
        self.stats.increment_echo_samples();
    }
}
