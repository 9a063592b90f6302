use std::sync::Arc;

use sdn_controller::{Controller, NodeId, PathError, Weight};
use sdn_fabric::{FlowMatch, FlowMod};
use sdn_sim::{
    fixtures::{self, host_ip},
    SimNetwork,
};

use crate::{options, wait_until};

fn switches(nodes: &[NodeId]) -> Vec<u64> {
    nodes
        .iter()
        .filter_map(|node| match node {
            NodeId::Switch(dpid) => Some(*dpid),
            NodeId::Host(_) => None,
        })
        .collect()
}

#[tokio::test]
async fn ring_prefers_low_delay_route() {
    let _ = tracing_subscriber::fmt::try_init();

    let (fabric, events) = fixtures::ring([5.0, 5.0, 5.0, 20.0]).build();
    fabric.connect_all();
    let controller = Controller::spawn(Arc::clone(&fabric), events, options());

    let converged = wait_until(|| {
        let graph = controller.topology();
        let delay = |a, b| {
            graph.edge(&NodeId::Switch(a), &NodeId::Switch(b)).map_or(0.0, |edge| edge.delay)
        };
        delay(1, 2) > 0.0 && delay(2, 3) > 0.0 && delay(3, 4) > 0.0 && delay(4, 1) > 10.0
    })
    .await;
    assert!(converged, "link delays never converged");

    let path = controller.resolve(host_ip(1), host_ip(4)).unwrap();
    assert_eq!(switches(&path.nodes), vec![1, 2, 3, 4]);
    assert!(path.cost < 20.0, "cost {}", path.cost);

    let path = controller.resolve_with(host_ip(1), host_ip(4), Weight::Hop).unwrap();
    assert_eq!(switches(&path.nodes), vec![1, 4]);
}

#[tokio::test]
async fn echo_round_trip_is_subtracted() {
    let _ = tracing_subscriber::fmt::try_init();

    let (fabric, events) = SimNetwork::new()
        .host(1, host_ip(1))
        .host(2, host_ip(2))
        .link(1, 2, 5.0)
        .control_delay(1, 30.0)
        .control_delay(2, 30.0)
        .build();
    fabric.connect_all();
    let controller = Controller::spawn(Arc::clone(&fabric), events, options());

    // Until echo replies arrive, the estimate includes the control channel.
    let converged = wait_until(|| {
        controller.stats().echo_samples() >= 2
            && controller.stats().lldp_samples() >= 2
            && controller.link_delay(1, 2) < 10.0
    })
    .await;
    assert!(converged, "delay estimate {}", controller.link_delay(1, 2));
    assert!(controller.link_delay(1, 2) >= 0.0);
}

#[tokio::test]
async fn unchanged_topology_is_built_once() {
    let _ = tracing_subscriber::fmt::try_init();

    let (fabric, events) = fixtures::arpanet().build();
    fabric.connect_all();
    let controller = Controller::spawn(Arc::clone(&fabric), events, options());

    // At least three discovery cycles.
    assert!(wait_until(|| fabric.stats().echo_requests() >= 12).await);
    assert_eq!(controller.stats().topology_rebuilds(), 1);

    let path = controller.resolve_with(host_ip(1), host_ip(4), Weight::Hop).unwrap();
    assert_eq!(switches(&path.nodes), vec![1, 4]);

    fabric.remove_link(1, 4);
    assert!(wait_until(|| controller.stats().topology_rebuilds() == 2).await);

    let path = controller.resolve_with(host_ip(1), host_ip(4), Weight::Hop).unwrap();
    assert_eq!(switches(&path.nodes).len(), 3);
}

#[tokio::test]
async fn removed_link_invalidates_both_endpoints() {
    let _ = tracing_subscriber::fmt::try_init();

    let (fabric, events) = fixtures::arpanet().build();
    fabric.connect_all();
    let controller = Controller::spawn(Arc::clone(&fabric), events, options());

    assert!(wait_until(|| controller.stats().topology_rebuilds() == 1).await);
    fabric.clear_records();

    // s1:4 and s4:2 were the two ends of the s1-s4 link.
    fabric.remove_link(1, 4);

    let deleted = |dpid, port_no| FlowMod::Delete { dpid, flow_match: FlowMatch::any().in_port(port_no) };
    let invalidated = wait_until(|| {
        let flow_mods = fabric.flow_mods();
        flow_mods.contains(&deleted(1, 4)) && flow_mods.contains(&deleted(4, 2))
    })
    .await;
    assert!(invalidated, "flow mods {:?}", fabric.flow_mods());

    let deletes = fabric.flow_mods().into_iter().filter(|m| matches!(m, FlowMod::Delete { .. })).count();
    assert_eq!(deletes, 2);
    assert_eq!(controller.stats().flows_deleted(), 2);
}

#[tokio::test]
async fn disconnected_hosts_have_no_path() {
    let _ = tracing_subscriber::fmt::try_init();

    let (fabric, events) = fixtures::ring([5.0, 5.0, 5.0, 5.0]).build();
    fabric.remove_link(1, 2);
    fabric.remove_link(3, 4);
    fabric.connect_all();
    let controller = Controller::spawn(Arc::clone(&fabric), events, options());

    assert!(wait_until(|| controller.topology().node_count() == 8).await);

    assert_eq!(
        controller.resolve(host_ip(1), host_ip(2)).unwrap_err(),
        PathError::NoPath { src: host_ip(1), dst: host_ip(2) }
    );
    assert!(controller.resolve(host_ip(1), host_ip(4)).is_ok());
    assert!(controller.resolve(host_ip(2), host_ip(3)).is_ok());
}

#[tokio::test]
async fn switch_down_leaves_topology() {
    let _ = tracing_subscriber::fmt::try_init();

    let (fabric, events) = fixtures::arpanet().build();
    fabric.connect_all();
    let controller = Controller::spawn(Arc::clone(&fabric), events, options());

    assert!(wait_until(|| controller.topology().contains(&NodeId::Switch(4))).await);

    fabric.disconnect(4);
    assert!(wait_until(|| !controller.topology().contains(&NodeId::Switch(4))).await);
    assert_eq!(
        controller.resolve(host_ip(1), host_ip(4)).unwrap_err(),
        PathError::HostNotFound(host_ip(4))
    );
    assert_eq!(controller.link_delay(1, 4), 0.0);
}

#[tokio::test]
async fn controller_stops_when_events_close() {
    let _ = tracing_subscriber::fmt::try_init();

    let (fabric, events) = fixtures::ring([1.0; 4]).build();
    let controller = Controller::spawn(Arc::clone(&fabric), events, options());
    assert!(controller.is_running());

    fabric.close();
    assert!(wait_until(|| !controller.is_running()).await);
}
