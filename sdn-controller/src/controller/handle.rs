use std::{net::Ipv4Addr, sync::Arc};

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use sdn_common::Dpid;

use crate::{
    ControllerOptions, ControllerStats, DelayEstimator, Path, PathError, PathResolver,
    TopologyGraph, TopologyStore, Weight,
};

/// A handle to a running controller. Dropping it stops the controller.
pub struct ControllerHandle {
    pub(crate) options: Arc<ControllerOptions>,
    pub(crate) stats: Arc<ControllerStats>,
    pub(crate) topology: Arc<TopologyStore>,
    pub(crate) delays: Arc<Mutex<DelayEstimator>>,
    pub(crate) driver_task: JoinHandle<()>,
    pub(crate) discovery_task: JoinHandle<()>,
}

impl ControllerHandle {
    /// Returns the controller statistics.
    pub fn stats(&self) -> &ControllerStats {
        &self.stats
    }

    /// Returns the current topology graph.
    pub fn topology(&self) -> Arc<TopologyGraph> {
        self.topology.graph()
    }

    /// Resolves the path between two hosts with the configured weight.
    pub fn resolve(&self, src: Ipv4Addr, dst: Ipv4Addr) -> Result<Path, PathError> {
        self.resolve_with(src, dst, self.options.weight)
    }

    pub fn resolve_with(&self, src: Ipv4Addr, dst: Ipv4Addr, weight: Weight) -> Result<Path, PathError> {
        PathResolver::new(Arc::clone(&self.topology)).resolve_path(src, dst, weight)
    }

    /// Returns the current delay estimate between two switches, in milliseconds.
    pub fn link_delay(&self, a: Dpid, b: Dpid) -> f64 {
        self.delays.lock().link_delay(a, b)
    }

    /// Returns true while the controller is processing events.
    pub fn is_running(&self) -> bool {
        !self.driver_task.is_finished()
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        self.driver_task.abort();
        self.discovery_task.abort();
    }
}
