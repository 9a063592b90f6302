//! Classification of the ethernet frames punted to the controller, plus builders for the frames
//! hosts put on the wire.

use std::net::Ipv4Addr;

use bytes::{BufMut, Bytes, BytesMut};
use pnet::packet::{
    arp::{ArpOperations, ArpPacket},
    ethernet::{EtherTypes, EthernetPacket},
    ipv4::Ipv4Packet,
    Packet,
};
use sdn_common::constants::ethertype;
use thiserror::Error;

use crate::{mac_octets, MacAddr};

const ARP_HTYPE_ETHERNET: u16 = 1;
const IPV4_HEADER_LEN: usize = 20;
const IP_PROTO_UDP: u8 = 17;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("frame truncated")]
    Truncated,
    #[error("malformed {0} header")]
    Malformed(&'static str),
}

/// The network-layer content of a frame, as far as forwarding decisions are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Arp { is_request: bool, sender_ip: Ipv4Addr, target_ip: Ipv4Addr },
    Ipv4 { src: Ipv4Addr, dst: Ipv4Addr },
    Lldp,
    Ipv6,
    Other(u16),
}

/// A parsed ethernet frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetFrame {
    pub src: MacAddr,
    pub dst: MacAddr,
    pub payload: Payload,
}

impl EthernetFrame {
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        let eth = EthernetPacket::new(data).ok_or(Error::Truncated)?;

        let payload = match eth.get_ethertype() {
            EtherTypes::Arp => {
                let arp = ArpPacket::new(eth.payload()).ok_or(Error::Malformed("ARP"))?;
                Payload::Arp {
                    is_request: arp.get_operation() == ArpOperations::Request,
                    sender_ip: arp.get_sender_proto_addr(),
                    target_ip: arp.get_target_proto_addr(),
                }
            }
            EtherTypes::Ipv4 => {
                let ip = Ipv4Packet::new(eth.payload()).ok_or(Error::Malformed("IPv4"))?;
                Payload::Ipv4 { src: ip.get_source(), dst: ip.get_destination() }
            }
            EtherTypes::Lldp => Payload::Lldp,
            EtherTypes::Ipv6 => Payload::Ipv6,
            other => Payload::Other(other.0),
        };

        Ok(Self { src: eth.get_source(), dst: eth.get_destination(), payload })
    }

    /// Returns true if this is an ARP request sent to the broadcast address.
    pub fn is_arp_broadcast(&self) -> bool {
        self.dst.is_broadcast() && matches!(self.payload, Payload::Arp { .. })
    }
}

fn put_ethernet_header(buf: &mut BytesMut, dst: MacAddr, src: MacAddr, ethertype: u16) {
    buf.put_slice(&mac_octets(dst));
    buf.put_slice(&mac_octets(src));
    buf.put_u16(ethertype);
}

fn arp(
    operation: u16,
    src: MacAddr,
    dst: MacAddr,
    sender_ip: Ipv4Addr,
    target_mac: MacAddr,
    target_ip: Ipv4Addr,
) -> Bytes {
    let mut buf = BytesMut::with_capacity(42);
    put_ethernet_header(&mut buf, dst, src, ethertype::ARP);

    buf.put_u16(ARP_HTYPE_ETHERNET);
    buf.put_u16(ethertype::IPV4);
    buf.put_u8(6);
    buf.put_u8(4);
    buf.put_u16(operation);
    buf.put_slice(&mac_octets(src));
    buf.put_slice(&sender_ip.octets());
    buf.put_slice(&mac_octets(target_mac));
    buf.put_slice(&target_ip.octets());

    buf.freeze()
}

/// Builds a broadcast ARP request asking for `target_ip`.
pub fn arp_request(src: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Bytes {
    arp(
        ArpOperations::Request.0,
        src,
        MacAddr::broadcast(),
        sender_ip,
        MacAddr::zero(),
        target_ip,
    )
}

/// Builds a unicast ARP reply from `src`/`sender_ip` to `dst`/`target_ip`.
pub fn arp_reply(src: MacAddr, sender_ip: Ipv4Addr, dst: MacAddr, target_ip: Ipv4Addr) -> Bytes {
    arp(ArpOperations::Reply.0, src, dst, sender_ip, dst, target_ip)
}

/// Builds an IPv4/UDP-protocol frame carrying `payload`.
pub fn ipv4(
    src: MacAddr,
    dst: MacAddr,
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    payload: &[u8],
) -> Bytes {
    let mut header = BytesMut::with_capacity(IPV4_HEADER_LEN);
    header.put_u8(0x45);
    header.put_u8(0);
    header.put_u16((IPV4_HEADER_LEN + payload.len()) as u16);
    header.put_u16(0);
    // Don't fragment.
    header.put_u16(0x4000);
    header.put_u8(64);
    header.put_u8(IP_PROTO_UDP);
    header.put_u16(0);
    header.put_slice(&src_ip.octets());
    header.put_slice(&dst_ip.octets());

    let checksum = pnet::util::checksum(&header, 5);
    header[10..12].copy_from_slice(&checksum.to_be_bytes());

    let mut buf = BytesMut::with_capacity(14 + IPV4_HEADER_LEN + payload.len());
    put_ethernet_header(&mut buf, dst, src, ethertype::IPV4);
    buf.put_slice(&header);
    buf.put_slice(payload);

    buf.freeze()
}
