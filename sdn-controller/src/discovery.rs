use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use sdn_common::{unix_micros, Dpid};
use sdn_fabric::{Fabric, TickHandler};
use sdn_wire::echo::EchoProbe;

use crate::{
    forwarding::ForwardingController, ControllerOptions, ControllerStats, DelayEstimator,
    TopologyStore, Weight,
};

/// Periodically refreshes the topology and the link delays.
///
/// Every cycle takes a snapshot of the fabric, rebuilds the topology if it changed, sends a
/// timestamped echo probe to every switch and finally writes the current delay estimates into
/// the graph.
pub struct DiscoveryScheduler<F> {
    fabric: Arc<F>,
    topology: Arc<TopologyStore>,
    delays: Arc<Mutex<DelayEstimator>>,
    forwarding: Arc<ForwardingController<F>>,
    options: Arc<ControllerOptions>,
    stats: Arc<ControllerStats>,
}

impl<F: Fabric> DiscoveryScheduler<F> {
    pub fn new(
        fabric: Arc<F>,
        topology: Arc<TopologyStore>,
        delays: Arc<Mutex<DelayEstimator>>,
        forwarding: Arc<ForwardingController<F>>,
        options: Arc<ControllerOptions>,
        stats: Arc<ControllerStats>,
    ) -> Self {
        Self { fabric, topology, delays, forwarding, options, stats }
    }

    /// Runs a discovery cycle every `discovery_interval`, forever. The first cycle starts
    /// immediately.
    pub async fn run(self: Arc<Self>) {
        let mut interval = time::interval(self.options.discovery_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.on_tick().await;
        }
    }

    fn probe(&self, dpid: Dpid) {
        self.fabric.send_echo_request(dpid, EchoProbe::new(unix_micros()).encode());
    }
}

#[async_trait::async_trait]
impl<F: Fabric> TickHandler for DiscoveryScheduler<F> {
    async fn on_tick(&self) {
        let snapshot = self.fabric.snapshot().await;

        let report = {
            let delays = self.delays.lock();
            self.topology.rebuild(&snapshot, &delays)
        };

        let rebuilt = match report {
            Some(report) => {
                self.stats.increment_topology_rebuilds();
                for port in report.changed_ports {
                    self.forwarding.invalidate_port(port);
                }
                true
            }
            None => false,
        };

        for (i, switch) in snapshot.switches.iter().enumerate() {
            if i > 0 {
                time::sleep(self.options.echo_stagger).await;
            }
            self.probe(switch.dpid);
        }

        let graph = {
            let delays = self.delays.lock();
            self.topology.apply_delays(&delays)
        };

        if rebuilt && self.options.weight == Weight::Delay {
            info!("Link delays:\n{graph}");
        } else {
            debug!("Link delays:\n{graph}");
        }
    }
}
