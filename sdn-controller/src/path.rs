use std::{
    cmp::Ordering,
    collections::{BTreeMap, BinaryHeap},
    fmt,
    net::Ipv4Addr,
    str::FromStr,
    sync::Arc,
};

use thiserror::Error;
use tracing::debug;

use sdn_common::{Dpid, PortNo};

use crate::topology::{Edge, NodeId, TopologyError, TopologyGraph, TopologyStore};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("host {0} not found")]
    HostNotFound(Ipv4Addr),
    #[error("no path from {src} to {dst}")]
    NoPath { src: Ipv4Addr, dst: Ipv4Addr },
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),
}

/// The edge attribute paths are optimized for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Weight {
    /// Fewest hops.
    Hop,
    /// Lowest total link delay.
    #[default]
    Delay,
}

impl Weight {
    #[inline]
    fn cost(&self, edge: &Edge) -> f64 {
        match self {
            Self::Hop => f64::from(edge.hop),
            Self::Delay => edge.delay,
        }
    }
}

impl FromStr for Weight {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hop" => Ok(Self::Hop),
            "delay" => Ok(Self::Delay),
            other => Err(format!("unknown weight: {other}")),
        }
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hop => f.write_str("hop"),
            Self::Delay => f.write_str("delay"),
        }
    }
}

/// One switch on a port-level path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hop {
    pub in_port: PortNo,
    pub dpid: Dpid,
    pub out_port: PortNo,
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:s{}:{}", self.in_port, self.dpid, self.out_port)
    }
}

/// A resolved path between two hosts.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    /// Every node from `src` to `dst`, both included.
    pub nodes: Vec<NodeId>,
    /// The switches between the two hosts, with their ingress and egress ports.
    pub hops: Vec<Hop>,
    /// Total weight of the path.
    pub cost: f64,
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.src)?;
        for hop in &self.hops {
            write!(f, " -> {hop}")?;
        }
        write!(f, " -> {}", self.dst)
    }
}

/// Min-heap entry. Ties on cost are broken by node order so results are deterministic for a
/// given graph.
#[derive(Debug, PartialEq)]
struct Candidate {
    cost: f64,
    node: NodeId,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.total_cmp(&self.cost).then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Finds a minimum-weight path from `src` to `dst` with Dijkstra's algorithm. Hosts other than
/// the endpoints never forward traffic and are not expanded.
pub fn shortest_path(
    graph: &TopologyGraph,
    src: NodeId,
    dst: NodeId,
    weight: Weight,
) -> Option<(Vec<NodeId>, f64)> {
    if !graph.contains(&src) || !graph.contains(&dst) {
        return None;
    }

    let mut costs: BTreeMap<NodeId, f64> = BTreeMap::new();
    let mut parents: BTreeMap<NodeId, NodeId> = BTreeMap::new();
    let mut queue = BinaryHeap::new();

    costs.insert(src, 0.0);
    queue.push(Candidate { cost: 0.0, node: src });

    while let Some(Candidate { cost, node }) = queue.pop() {
        if node == dst {
            let mut nodes = vec![dst];
            let mut current = dst;
            while let Some(parent) = parents.get(&current) {
                nodes.push(*parent);
                current = *parent;
            }
            nodes.reverse();
            return Some((nodes, cost));
        }

        // Stale entry, a cheaper one was already expanded.
        if costs.get(&node).is_some_and(|best| cost > *best) {
            continue;
        }

        if matches!(node, NodeId::Host(_)) && node != src {
            continue;
        }

        for (next, edge) in graph.neighbors(&node) {
            let next_cost = cost + weight.cost(edge);
            if costs.get(next).map_or(true, |best| next_cost < *best) {
                costs.insert(*next, next_cost);
                parents.insert(*next, node);
                queue.push(Candidate { cost: next_cost, node: *next });
            }
        }
    }

    None
}

/// Turns a node path into the port-level path through its interior switches.
pub fn port_path(graph: &TopologyGraph, nodes: &[NodeId]) -> Result<Vec<Hop>, TopologyError> {
    nodes
        .windows(3)
        .map(|window| {
            let [prev, node, next] = [window[0], window[1], window[2]];
            let NodeId::Switch(dpid) = node else {
                return Err(TopologyError::NotASwitch(node));
            };

            Ok(Hop {
                in_port: graph.lookup_out_port(dpid, &prev)?,
                dpid,
                out_port: graph.lookup_out_port(dpid, &next)?,
            })
        })
        .collect()
}

/// Resolves host-to-host paths over the current topology.
#[derive(Debug, Clone)]
pub struct PathResolver {
    topology: Arc<TopologyStore>,
}

impl PathResolver {
    pub fn new(topology: Arc<TopologyStore>) -> Self {
        Self { topology }
    }

    /// Returns the node path from `src` to `dst` minimizing `weight`.
    pub fn resolve(&self, src: Ipv4Addr, dst: Ipv4Addr, weight: Weight) -> Result<Vec<NodeId>, PathError> {
        self.resolve_path(src, dst, weight).map(|path| path.nodes)
    }

    /// Resolves the path from `src` to `dst` down to the ingress and egress port of every
    /// switch on it. The whole computation runs on one topology snapshot.
    pub fn resolve_path(&self, src: Ipv4Addr, dst: Ipv4Addr, weight: Weight) -> Result<Path, PathError> {
        let graph = self.topology.graph();

        for host in [src, dst] {
            if !graph.contains(&NodeId::Host(host)) {
                debug!(%host, "Host not found in topology");
                return Err(PathError::HostNotFound(host));
            }
        }

        let Some((nodes, cost)) = shortest_path(&graph, NodeId::Host(src), NodeId::Host(dst), weight) else {
            debug!(%src, %dst, "No path between hosts");
            return Err(PathError::NoPath { src, dst });
        };

        let hops = port_path(&graph, &nodes)?;

        Ok(Path { src, dst, nodes, hops, cost })
    }
}
