#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub use sdn_common::{constants, Dpid, PortNo};
pub use sdn_controller::*;
pub use sdn_fabric::*;
pub use sdn_wire::{echo, frame, lldp, MacAddr};
