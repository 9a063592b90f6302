#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

use std::time::Duration;

mod controller;
mod delay;
mod discovery;
pub mod forwarding;
mod path;
mod registry;
mod stats;
mod topology;

pub use controller::{Controller, ControllerHandle};
pub use delay::{combined_delay, DelayEstimator};
pub use discovery::DiscoveryScheduler;
pub use path::{port_path, shortest_path, Hop, Path, PathError, PathResolver, Weight};
pub use registry::SwitchRegistry;
pub use stats::ControllerStats;
pub use topology::{
    Edge, NodeId, PortRole, RebuildReport, TopologyError, TopologyGraph, TopologyStore,
};

/// Controller options.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// The edge attribute unicast paths minimize.
    weight: Weight,
    /// Time between two discovery cycles.
    discovery_interval: Duration,
    /// Pause between the echo probes of consecutive switches.
    echo_stagger: Duration,
    /// Idle timeout of unicast path rules, in seconds.
    idle_timeout: u16,
    /// Hard timeout of unicast path rules, in seconds.
    hard_timeout: u16,
    /// Priority of the forwarding rules.
    priority: u16,
    /// Priority of the match-all rule sending unmatched packets to the controller.
    table_miss_priority: u16,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            weight: Weight::Delay,
            discovery_interval: Duration::from_secs(2),
            echo_stagger: Duration::from_millis(50),
            idle_timeout: 10,
            hard_timeout: 30,
            priority: 1,
            table_miss_priority: 0,
        }
    }
}

impl ControllerOptions {
    /// Sets the weight unicast paths are computed with.
    pub fn weight(mut self, weight: Weight) -> Self {
        self.weight = weight;
        self
    }

    /// Sets the time between discovery cycles.
    pub fn discovery_interval(mut self, interval: Duration) -> Self {
        self.discovery_interval = interval;
        self
    }

    /// Sets the pause between echo probes to consecutive switches.
    pub fn echo_stagger(mut self, stagger: Duration) -> Self {
        self.echo_stagger = stagger;
        self
    }

    /// Sets the idle and hard timeouts, in seconds, of the rules installed along unicast
    /// paths. 0 disables a timeout.
    pub fn flow_timeouts(mut self, idle_timeout: u16, hard_timeout: u16) -> Self {
        self.idle_timeout = idle_timeout;
        self.hard_timeout = hard_timeout;
        self
    }

    /// Sets the priority of forwarding rules.
    pub fn priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the priority of the table-miss rule.
    pub fn table_miss_priority(mut self, priority: u16) -> Self {
        self.table_miss_priority = priority;
        self
    }
}
