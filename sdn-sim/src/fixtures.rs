//! Fixture topologies.
//!
//! Every host gets address `10.0.0.x`. Ports are allocated in the order the layouts list
//! hosts and links, so port numbers are stable across runs.

use std::net::Ipv4Addr;

use crate::SimNetwork;

/// Delay of fixture links that do not specify one, in milliseconds.
pub const DEFAULT_LINK_DELAY: f64 = 1.0;

/// Address of host `n` in the fixtures.
pub const fn host_ip(n: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, n)
}

/// Four switches in a ring, each with one host on port 1.
///
/// `delays[i]` is the delay between switch `i + 1` and the next switch around the ring, so
/// `delays[3]` closes the ring between switch 4 and switch 1. Host `10.0.0.n` hangs off
/// switch `n`.
pub fn ring(delays: [f64; 4]) -> SimNetwork {
    let network = (1..=4).fold(SimNetwork::new(), |network, n| network.host(n.into(), host_ip(n)));

    delays
        .iter()
        .zip(1u64..)
        .fold(network, |network, (delay, dpid)| network.link(dpid, dpid % 4 + 1, *delay))
}

/// The four-node ARPANET: UCLA (s1), UTAH (s2), UCSB (s3) and Stanford (s4), fully meshed,
/// one host per site.
pub fn arpanet() -> SimNetwork {
    let network = (1..=4).fold(SimNetwork::new(), |network, n| network.host(n.into(), host_ip(n)));

    [(1, 2), (1, 3), (1, 4), (2, 3), (2, 4), (3, 4)]
        .into_iter()
        .fold(network, |network, (a, b)| network.link(a, b, DEFAULT_LINK_DELAY))
}

/// Datapath ids of the fat-tree layers.
pub mod tree {
    use sdn_common::Dpid;

    /// Core switches.
    pub const CORE: [Dpid; 4] = [1, 2, 3, 4];

    /// Distribution switches, two per pod.
    pub const DISTRIBUTION: [[Dpid; 2]; 4] = [[11, 12], [21, 22], [31, 32], [41, 42]];

    /// Access switches, two per pod.
    pub const ACCESS: [[Dpid; 2]; 4] = [[111, 112], [121, 122], [131, 132], [141, 142]];
}

/// A four-pod fat tree: 4 core, 8 distribution and 8 access switches with two hosts per
/// access switch.
///
/// Core switches 1 and 2 connect to the first distribution switch of every pod, 3 and 4 to the
/// second. Inside a pod both distribution switches connect to both access switches. Host
/// `10.0.0.{pod}{n}` is the n-th host of the pod, `n` in `1..=4`.
pub fn fat_tree() -> SimNetwork {
    use tree::{ACCESS, CORE, DISTRIBUTION};

    let mut network = SimNetwork::new();

    for (i, core) in CORE.iter().enumerate() {
        for pod in DISTRIBUTION {
            network = network.link(*core, pod[i / 2], DEFAULT_LINK_DELAY);
        }
    }

    for (distribution, access) in DISTRIBUTION.iter().zip(ACCESS) {
        for d in distribution {
            for a in access {
                network = network.link(*d, a, DEFAULT_LINK_DELAY);
            }
        }
    }

    for (pod, access) in (1u8..).zip(ACCESS) {
        for (i, dpid) in access.iter().enumerate() {
            for n in 1..=2 {
                network = network.host(*dpid, host_ip(pod * 10 + i as u8 * 2 + n));
            }
        }
    }

    network
}
