use std::{net::Ipv4Addr, sync::Arc, time::Duration};

use bytes::Bytes;
use sdn_controller::{Controller, NodeId};
use sdn_fabric::{Action, FlowMod, OutPort, PacketIn};
use sdn_sim::{
    fixtures::{self, host_ip},
    host_mac,
};
use sdn_wire::frame;

use crate::{options, wait_until};

#[tokio::test]
async fn broadcast_storm_is_contained() {
    let _ = tracing_subscriber::fmt::try_init();

    let (fabric, events) = fixtures::arpanet().build();
    fabric.connect_all();
    let controller = Controller::spawn(Arc::clone(&fabric), events, options());

    let arp = frame::arp_request(host_mac(host_ip(1)), host_ip(1), host_ip(2));
    assert!(fabric.send_from_host(host_ip(1), arp.clone()));

    // s1 floods to s2, s3 and s4, which each flood to their host and the two other switches.
    // Those six copies arrive on a second port and are dropped.
    assert!(
        wait_until(|| {
            controller.stats().broadcasts_flooded() == 4 && controller.stats().broadcasts_dropped() == 6
        })
        .await
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(controller.stats().broadcasts_flooded(), 4);
    assert_eq!(controller.stats().broadcasts_dropped(), 6);
    assert_eq!(fabric.stats().copies_dropped(), 0);

    let mut reached: Vec<_> = fabric.deliveries().into_iter().map(|delivery| delivery.host).collect();
    reached.sort();
    assert_eq!(reached, vec![host_ip(2), host_ip(3), host_ip(4)]);
}

#[tokio::test]
async fn looped_broadcast_on_second_port_is_dropped() {
    let _ = tracing_subscriber::fmt::try_init();

    let (fabric, events) = fixtures::arpanet().build();
    let controller = Controller::spawn(Arc::clone(&fabric), events, options());

    let src = host_mac(Ipv4Addr::new(10, 0, 0, 10));
    let arp = frame::arp_request(src, Ipv4Addr::new(10, 0, 0, 10), Ipv4Addr::new(10, 0, 0, 2));
    let packet = |in_port| PacketIn { dpid: 1, in_port, buffer_id: Some(in_port), data: arp.clone() };

    fabric.inject(packet(3));
    fabric.inject(packet(5));
    fabric.inject(packet(3));

    assert!(wait_until(|| fabric.packet_outs().len() == 3).await);

    let outs = fabric.packet_outs();
    assert_eq!(outs[0].in_port, 3);
    assert_eq!(outs[0].actions, vec![Action::Output(OutPort::Flood)]);
    assert_eq!(outs[1].in_port, 5);
    assert!(outs[1].is_drop());
    assert_eq!(outs[2].in_port, 3);
    assert_eq!(outs[2].actions, vec![Action::Output(OutPort::Flood)]);

    assert_eq!(controller.stats().broadcasts_flooded(), 2);
    assert_eq!(controller.stats().broadcasts_dropped(), 1);
}

#[tokio::test]
async fn unicast_installs_path_in_both_directions() {
    let _ = tracing_subscriber::fmt::try_init();

    let (fabric, events) = fixtures::ring([5.0, 5.0, 5.0, 20.0]).build();
    fabric.connect_all();
    let controller = Controller::spawn(Arc::clone(&fabric), events, options());

    assert!(
        wait_until(|| {
            let graph = controller.topology();
            graph
                .edge(&NodeId::Switch(4), &NodeId::Switch(1))
                .is_some_and(|edge| edge.delay > 10.0)
        })
        .await
    );
    fabric.clear_records();

    let data = frame::ipv4(host_mac(host_ip(1)), host_mac(host_ip(4)), host_ip(1), host_ip(4), b"ping");
    assert!(fabric.send_from_host(host_ip(1), data.clone()));

    assert!(wait_until(|| !fabric.deliveries().is_empty()).await);
    assert_eq!(fabric.deliveries()[0].host, host_ip(4));
    assert_eq!(fabric.deliveries()[0].data, data);

    let rules: Vec<_> = fabric
        .flow_mods()
        .into_iter()
        .filter_map(|flow_mod| match flow_mod {
            FlowMod::Add(rule) => Some(rule),
            FlowMod::Delete { .. } => None,
        })
        .collect();

    // One forward and one reverse rule on each switch of s1 -> s2 -> s3 -> s4.
    assert_eq!(rules.len(), 8);
    for (pair, dpid) in rules.chunks(2).zip([1, 2, 3, 4]) {
        let (forward, reverse) = (&pair[0], &pair[1]);
        assert_eq!((forward.dpid, reverse.dpid), (dpid, dpid));

        assert_eq!(forward.flow_match.ipv4_src, Some(host_ip(1)));
        assert_eq!(reverse.flow_match.ipv4_src, Some(host_ip(4)));
        assert_eq!(forward.flow_match.in_port.map(OutPort::Port), reverse.out_port());
        assert_eq!(reverse.flow_match.in_port.map(OutPort::Port), forward.out_port());
        assert_eq!((forward.idle_timeout, forward.hard_timeout), (10, 30));
    }

    // The frame leaves s4 towards the host, carrying its data since the buffer lives on s1.
    let out = fabric.packet_outs().pop().unwrap();
    assert_eq!(out.dpid, 4);
    assert_eq!(out.buffer_id, None);
    assert_eq!(out.actions, vec![Action::Output(OutPort::Port(1))]);
}

#[tokio::test]
async fn unicast_to_unknown_host_is_dropped() {
    let _ = tracing_subscriber::fmt::try_init();

    let (fabric, events) = fixtures::ring([1.0; 4]).build();
    fabric.connect_all();
    let controller = Controller::spawn(Arc::clone(&fabric), events, options());

    assert!(wait_until(|| controller.stats().topology_rebuilds() == 1).await);
    fabric.clear_records();

    let unknown = Ipv4Addr::new(10, 0, 0, 99);
    let data = frame::ipv4(host_mac(host_ip(1)), host_mac(unknown), host_ip(1), unknown, b"ping");
    assert!(fabric.send_from_host(host_ip(1), data));

    assert!(wait_until(|| controller.stats().paths_not_found() == 1).await);

    let outs = fabric.packet_outs();
    assert_eq!(outs.len(), 1);
    assert!(outs[0].is_drop());
    assert!(fabric.flow_mods().is_empty());
    assert!(fabric.deliveries().is_empty());
}

#[tokio::test]
async fn discovery_frames_are_not_forwarded() {
    let _ = tracing_subscriber::fmt::try_init();

    let (fabric, events) = fixtures::ring([1.0; 4]).build();
    fabric.connect_all();
    let controller = Controller::spawn(Arc::clone(&fabric), events, options());

    assert!(wait_until(|| controller.stats().lldp_samples() >= 16).await);

    let table_miss_only = fabric.flow_mods().iter().all(|flow_mod| match flow_mod {
        FlowMod::Add(rule) => rule.priority == 0,
        FlowMod::Delete { .. } => false,
    });
    assert!(table_miss_only);
    assert!(fabric.packet_outs().is_empty());

    // Garbage is discarded without a reply.
    fabric.inject(PacketIn { dpid: 1, in_port: 1, buffer_id: None, data: Bytes::from_static(b"\x01\x02") });
    let packet_ins = controller.stats().packet_ins();
    assert!(wait_until(|| controller.stats().packet_ins() > packet_ins).await);
    assert!(fabric.packet_outs().is_empty());
}
