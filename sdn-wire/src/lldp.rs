//! Neighbor-discovery (LLDP) frames.
//!
//! Frames follow the layout emitted by the fabric's discovery service: a locally assigned
//! chassis ID of the form `dpid:<16 hex digits>`, a port-component port ID holding the 32-bit
//! port number, a TTL and, optionally, an organizationally specific TLV carrying the UNIX
//! timestamp (microseconds) at which the frame was sent. The timestamp is what allows the
//! controller to measure the one-way link delay.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use pnet::packet::{
    ethernet::{EtherTypes, EthernetPacket},
    Packet,
};
use sdn_common::{constants::ethertype, Dpid, PortNo};
use thiserror::Error;

use crate::{mac_octets, MacAddr};

/// Nearest-bridge multicast address all discovery frames are sent to.
pub const LLDP_MAC_NEAREST_BRIDGE: [u8; 6] = [0x01, 0x80, 0xc2, 0x00, 0x00, 0x0e];

const TLV_END: u8 = 0;
const TLV_CHASSIS_ID: u8 = 1;
const TLV_PORT_ID: u8 = 2;
const TLV_TTL: u8 = 3;
const TLV_ORGANIZATIONALLY_SPECIFIC: u8 = 127;

const CHASSIS_ID_SUB_LOCALLY_ASSIGNED: u8 = 7;
const PORT_ID_SUB_PORT_COMPONENT: u8 = 2;
const CHASSIS_ID_PREFIX: &str = "dpid:";

const TIMESTAMP_OUI: [u8; 3] = [0x00, 0x26, 0xe1];
const TIMESTAMP_SUBTYPE: u8 = 0x01;

const DEFAULT_TTL: u16 = 120;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("frame truncated")]
    Truncated,
    #[error("not an LLDP frame (ethertype {0:#06x})")]
    NotLldp(u16),
    #[error("missing chassis ID TLV")]
    MissingChassisId,
    #[error("missing port ID TLV")]
    MissingPortId,
    #[error("chassis ID is not a datapath ID")]
    InvalidChassisId,
    #[error("port ID is not a port number")]
    InvalidPortId,
}

/// A decoded neighbor-discovery frame: the switch port that sent it and, when present, the time
/// it was sent at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryFrame {
    pub dpid: Dpid,
    pub port_no: PortNo,
    /// UNIX timestamp in microseconds at which the frame left the controller.
    pub timestamp: Option<u64>,
}

impl DiscoveryFrame {
    pub const fn new(dpid: Dpid, port_no: PortNo) -> Self {
        Self { dpid, port_no, timestamp: None }
    }

    pub const fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Encodes the frame as an ethernet frame sourced from `src`.
    pub fn encode(&self, src: MacAddr) -> Bytes {
        let chassis_id = format!("{CHASSIS_ID_PREFIX}{:016x}", self.dpid);
        let mut buf = BytesMut::with_capacity(64);

        buf.put_slice(&LLDP_MAC_NEAREST_BRIDGE);
        buf.put_slice(&mac_octets(src));
        buf.put_u16(ethertype::LLDP);

        put_tlv_header(&mut buf, TLV_CHASSIS_ID, 1 + chassis_id.len());
        buf.put_u8(CHASSIS_ID_SUB_LOCALLY_ASSIGNED);
        buf.put_slice(chassis_id.as_bytes());

        put_tlv_header(&mut buf, TLV_PORT_ID, 5);
        buf.put_u8(PORT_ID_SUB_PORT_COMPONENT);
        buf.put_u32(self.port_no);

        put_tlv_header(&mut buf, TLV_TTL, 2);
        buf.put_u16(DEFAULT_TTL);

        if let Some(timestamp) = self.timestamp {
            put_tlv_header(&mut buf, TLV_ORGANIZATIONALLY_SPECIFIC, 12);
            buf.put_slice(&TIMESTAMP_OUI);
            buf.put_u8(TIMESTAMP_SUBTYPE);
            buf.put_u64(timestamp);
        }

        put_tlv_header(&mut buf, TLV_END, 0);

        buf.freeze()
    }

    /// Decodes a raw ethernet frame. Unknown TLVs are skipped.
    pub fn decode(frame: &[u8]) -> Result<Self, Error> {
        let eth = EthernetPacket::new(frame).ok_or(Error::Truncated)?;
        if eth.get_ethertype() != EtherTypes::Lldp {
            return Err(Error::NotLldp(eth.get_ethertype().0));
        }

        let mut dpid = None;
        let mut port_no = None;
        let mut timestamp = None;

        let mut tlvs = eth.payload();
        loop {
            if tlvs.remaining() < 2 {
                return Err(Error::Truncated);
            }

            let header = tlvs.get_u16();
            let (kind, len) = ((header >> 9) as u8, (header & 0x01ff) as usize);
            if tlvs.remaining() < len {
                return Err(Error::Truncated);
            }

            let (value, rest) = tlvs.split_at(len);
            tlvs = rest;

            match kind {
                TLV_END => break,
                TLV_CHASSIS_ID => dpid = Some(parse_chassis_id(value)?),
                TLV_PORT_ID => port_no = Some(parse_port_id(value)?),
                TLV_ORGANIZATIONALLY_SPECIFIC => {
                    if let Some(ts) = parse_timestamp(value) {
                        timestamp = Some(ts);
                    }
                }
                _ => {}
            }
        }

        Ok(Self {
            dpid: dpid.ok_or(Error::MissingChassisId)?,
            port_no: port_no.ok_or(Error::MissingPortId)?,
            timestamp,
        })
    }
}

#[inline]
fn put_tlv_header(buf: &mut BytesMut, kind: u8, len: usize) {
    buf.put_u16((u16::from(kind) << 9) | (len as u16 & 0x01ff));
}

fn parse_chassis_id(value: &[u8]) -> Result<Dpid, Error> {
    let Some((&CHASSIS_ID_SUB_LOCALLY_ASSIGNED, id)) = value.split_first() else {
        return Err(Error::InvalidChassisId);
    };

    std::str::from_utf8(id)
        .ok()
        .and_then(|id| id.strip_prefix(CHASSIS_ID_PREFIX))
        .and_then(|hex| Dpid::from_str_radix(hex, 16).ok())
        .ok_or(Error::InvalidChassisId)
}

fn parse_port_id(mut value: &[u8]) -> Result<PortNo, Error> {
    if value.len() != 5 || value.get_u8() != PORT_ID_SUB_PORT_COMPONENT {
        return Err(Error::InvalidPortId);
    }

    Ok(value.get_u32())
}

fn parse_timestamp(mut value: &[u8]) -> Option<u64> {
    if value.len() != 12 || value[..3] != TIMESTAMP_OUI || value[3] != TIMESTAMP_SUBTYPE {
        return None;
    }

    value.advance(4);
    Some(value.get_u64())
}
