use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    net::Ipv4Addr,
    sync::Arc,
};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::info;

use sdn_common::{Dpid, PortNo};
use sdn_fabric::{PortRef, TopologySnapshot};

use crate::delay::DelayEstimator;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("no discovered edge from s{dpid} to {neighbor}")]
    MissingEdge { dpid: Dpid, neighbor: NodeId },
    #[error("{0} is not a switch")]
    NotASwitch(NodeId),
}

/// A vertex of the topology graph. Hosts are identified by their first known IPv4 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    Switch(Dpid),
    Host(Ipv4Addr),
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switch(dpid) => write!(f, "s{dpid}"),
            Self::Host(ip) => write!(f, "{ip}"),
        }
    }
}

/// Attributes of an undirected edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// Always 1.
    pub hop: u32,
    /// Link delay in milliseconds. Always 0 for host edges.
    pub delay: f64,
    /// Set for host-to-switch edges, which delay updates never touch.
    pub is_host: bool,
}

impl Edge {
    const fn link(delay: f64) -> Self {
        Self { hop: 1, delay, is_host: false }
    }

    const fn host() -> Self {
        Self { hop: 1, delay: 0.0, is_host: true }
    }
}

/// The role a switch port plays in the current topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRole {
    /// The port is one end of a switch-to-switch link.
    Link,
    /// The port faces hosts (or nothing).
    HostFacing,
}

/// An immutable view of the network: switches, hosts, the links between them and the port
/// indexes needed to turn a node path into a port path.
#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    adjacency: BTreeMap<NodeId, BTreeMap<NodeId, Edge>>,
    /// `(switch, neighbor) -> egress port`, for switch and host neighbors.
    out_ports: FxHashMap<(Dpid, NodeId), PortNo>,
    /// `(switch, port) -> neighboring switch`.
    port_links: FxHashMap<(Dpid, PortNo), Dpid>,
    /// All known ports of every switch.
    ports: BTreeMap<Dpid, BTreeSet<PortNo>>,
}

impl TopologyGraph {
    /// Builds a graph from a discovery snapshot. Every link starts with zero delay.
    pub fn from_snapshot(snapshot: &TopologySnapshot) -> Self {
        let mut graph = Self::default();

        for switch in &snapshot.switches {
            graph.adjacency.entry(NodeId::Switch(switch.dpid)).or_default();
            graph.ports.entry(switch.dpid).or_default().extend(switch.ports.iter().copied());
        }

        for host in &snapshot.hosts {
            let Some(&ip) = host.ipv4.first() else {
                continue;
            };

            let node = NodeId::Host(ip);
            graph.insert_edge(node, NodeId::Switch(host.port.dpid), Edge::host());
            graph.out_ports.insert((host.port.dpid, node), host.port.port_no);
        }

        for link in &snapshot.links {
            let (src, dst) = (link.src, link.dst);
            graph.insert_edge(NodeId::Switch(src.dpid), NodeId::Switch(dst.dpid), Edge::link(0.0));
            graph.port_links.insert((src.dpid, src.port_no), dst.dpid);
            graph.port_links.insert((dst.dpid, dst.port_no), src.dpid);
            graph.out_ports.insert((src.dpid, NodeId::Switch(dst.dpid)), src.port_no);
            graph.out_ports.insert((dst.dpid, NodeId::Switch(src.dpid)), dst.port_no);
        }

        graph
    }

    fn insert_edge(&mut self, a: NodeId, b: NodeId, edge: Edge) {
        self.adjacency.entry(a).or_default().insert(b, edge);
        self.adjacency.entry(b).or_default().insert(a, edge);
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.adjacency.contains_key(node)
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Returns the neighbors of `node` in ascending node order.
    pub fn neighbors(&self, node: &NodeId) -> impl Iterator<Item = (&NodeId, &Edge)> + '_ {
        self.adjacency.get(node).into_iter().flat_map(|edges| edges.iter())
    }

    pub fn edge(&self, a: &NodeId, b: &NodeId) -> Option<&Edge> {
        self.adjacency.get(a).and_then(|edges| edges.get(b))
    }

    /// Returns every undirected edge once, as `(a, b, edge)` with `a < b`.
    pub fn edges(&self) -> impl Iterator<Item = (&NodeId, &NodeId, &Edge)> + '_ {
        self.adjacency
            .iter()
            .flat_map(|(a, edges)| edges.iter().map(move |(b, edge)| (a, b, edge)))
            .filter(|(a, b, _)| a < b)
    }

    /// Resolves the port on switch `dpid` that leads to `neighbor`.
    pub fn lookup_out_port(&self, dpid: Dpid, neighbor: &NodeId) -> Result<PortNo, TopologyError> {
        self.out_ports
            .get(&(dpid, *neighbor))
            .copied()
            .ok_or(TopologyError::MissingEdge { dpid, neighbor: *neighbor })
    }

    /// Returns the switch on the other end of the link attached to `port`, if any.
    pub fn port_neighbor(&self, port: PortRef) -> Option<Dpid> {
        self.port_links.get(&(port.dpid, port.port_no)).copied()
    }

    pub fn port_role(&self, port: PortRef) -> Option<PortRole> {
        if !self.ports.get(&port.dpid)?.contains(&port.port_no) {
            return None;
        }

        if self.port_links.contains_key(&(port.dpid, port.port_no)) {
            Some(PortRole::Link)
        } else {
            Some(PortRole::HostFacing)
        }
    }

    /// Returns the ports of `dpid` that are not link endpoints.
    pub fn host_facing_ports(&self, dpid: Dpid) -> impl Iterator<Item = PortNo> + '_ {
        self.ports
            .get(&dpid)
            .into_iter()
            .flatten()
            .copied()
            .filter(move |port_no| !self.port_links.contains_key(&(dpid, *port_no)))
    }

    /// Returns the ports present in both graphs whose role differs between them.
    pub fn role_changes(&self, next: &Self) -> Vec<PortRef> {
        next.ports
            .iter()
            .flat_map(|(dpid, ports)| ports.iter().map(move |port_no| PortRef::new(*dpid, *port_no)))
            .filter(|port| match (self.port_role(*port), next.port_role(*port)) {
                (Some(before), Some(after)) => before != after,
                _ => false,
            })
            .collect()
    }

    /// Returns a copy of the graph where every switch-to-switch edge `(a, b)` carries
    /// `delay(a, b)`. Both directions are written from the same value.
    pub fn with_delays(&self, delay: impl Fn(Dpid, Dpid) -> f64) -> Self {
        let mut graph = self.clone();

        for (a, edges) in graph.adjacency.iter_mut() {
            for (b, edge) in edges.iter_mut() {
                if edge.is_host {
                    continue;
                }

                if let (NodeId::Switch(a), NodeId::Switch(b)) = (a, b) {
                    // Always evaluate in ascending order so (a, b) and (b, a) agree.
                    edge.delay = delay(*a.min(b), *a.max(b));
                }
            }
        }

        graph
    }
}

impl fmt::Display for TopologyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:^10}  ->  {:^10}      {:^10}", "node", "node", "delay")?;
        for (a, b, edge) in self.edges() {
            let delay = format!("{:.2}ms", edge.delay);
            writeln!(f, "{:^10}      {:^10}      {:^10}", a.to_string(), b.to_string(), delay)?;
        }
        Ok(())
    }
}

/// Report of a topology rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
    /// Ports that switched between link-endpoint and host-facing roles.
    pub changed_ports: Vec<PortRef>,
}

/// The authoritative topology used for path computation.
///
/// The current graph is only ever replaced as a whole, so readers holding an
/// `Arc<TopologyGraph>` never observe a half-updated graph. Only the discovery task writes.
#[derive(Debug, Default)]
pub struct TopologyStore {
    graph: RwLock<Arc<TopologyGraph>>,
    /// The snapshot the current graph was built from.
    last_snapshot: Mutex<Option<TopologySnapshot>>,
}

impl TopologyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current graph.
    pub fn graph(&self) -> Arc<TopologyGraph> {
        self.graph.read().clone()
    }

    /// Rebuilds the graph from `snapshot`, with link delays taken from `delays`. Returns
    /// `None` without touching anything if the snapshot equals the one the current graph was
    /// built from.
    pub fn rebuild(
        &self,
        snapshot: &TopologySnapshot,
        delays: &DelayEstimator,
    ) -> Option<RebuildReport> {
        let mut last = self.last_snapshot.lock();
        if last.as_ref() == Some(snapshot) {
            return None;
        }

        let current = self.graph();
        let next =
            TopologyGraph::from_snapshot(snapshot).with_delays(|a, b| delays.link_delay(a, b));

        let report = RebuildReport { changed_ports: current.role_changes(&next) };

        info!(
            switches = snapshot.switches.len(),
            hosts = snapshot.hosts.len(),
            links = snapshot.links.len(),
            changed_ports = report.changed_ports.len(),
            "Topology changed, rebuilt graph"
        );

        *self.graph.write() = Arc::new(next);
        *last = Some(snapshot.clone());

        Some(report)
    }

    /// Writes fresh link delays from `delays` into a new graph and swaps it in.
    pub fn apply_delays(&self, delays: &DelayEstimator) -> Arc<TopologyGraph> {
        let next = Arc::new(self.graph().with_delays(|a, b| delays.link_delay(a, b)));
        *self.graph.write() = Arc::clone(&next);
        next
    }

    /// See [`TopologyGraph::lookup_out_port`].
    pub fn lookup_out_port(&self, dpid: Dpid, neighbor: &NodeId) -> Result<PortNo, TopologyError> {
        self.graph.read().lookup_out_port(dpid, neighbor)
    }
}
