#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod echo;
pub mod frame;
pub mod lldp;

pub use pnet::util::MacAddr;

/// Returns the six octets of a MAC address in transmission order.
#[inline]
pub fn mac_octets(mac: MacAddr) -> [u8; 6] {
    [mac.0, mac.1, mac.2, mac.3, mac.4, mac.5]
}
