#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! An in-memory switch fabric for exercising the controller without switches, plus the
//! fixture topologies it is usually run on.

mod fabric;
pub mod fixtures;
mod network;

pub use fabric::{Delivery, SimFabric, SimStats};
pub use network::{host_mac, SimHost, SimLink, SimNetwork, SimSwitch};
