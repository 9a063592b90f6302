use std::sync::atomic::{AtomicUsize, Ordering};

/// Statistics for a controller.
/// These are shared between the driver task, the discovery task and the handle.
#[derive(Debug, Default)]
pub struct ControllerStats {
    /// Total packet-in events received
    packet_ins: AtomicUsize,
    /// Address-resolution broadcasts flooded
    broadcasts_flooded: AtomicUsize,
    /// Address-resolution broadcasts dropped by the loop guard
    broadcasts_dropped: AtomicUsize,
    /// Flow rules sent to switches
    flows_installed: AtomicUsize,
    /// Flow deletions sent to switches
    flows_deleted: AtomicUsize,
    /// Unicast packets dropped for lack of a path
    paths_not_found: AtomicUsize,
    /// Topology graph rebuilds
    topology_rebuilds: AtomicUsize,
    /// Discovery frames discarded
    discovery_frames_discarded: AtomicUsize,
    /// Echo replies discarded
    echo_replies_discarded: AtomicUsize,
    /// One-way discovery samples recorded
    lldp_samples: AtomicUsize,
    /// Echo round-trip samples recorded
    echo_samples: AtomicUsize,
}

impl ControllerStats {
    #[inline]
    pub(crate) fn increment_packet_ins(&self) {
        self.packet_ins.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_broadcasts_flooded(&self) {
        self.broadcasts_flooded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_broadcasts_dropped(&self) {
        self.broadcasts_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_flows_installed(&self, count: usize) {
        self.flows_installed.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_flows_deleted(&self) {
        self.flows_deleted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_paths_not_found(&self) {
        self.paths_not_found.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_topology_rebuilds(&self) {
        self.topology_rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_discovery_frames_discarded(&self) {
        self.discovery_frames_discarded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_echo_replies_discarded(&self) {
        self.echo_replies_discarded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_lldp_samples(&self) {
        self.lldp_samples.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_echo_samples(&self) {
        self.echo_samples.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn packet_ins(&self) -> usize {
        self.packet_ins.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn broadcasts_flooded(&self) -> usize {
        self.broadcasts_flooded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn broadcasts_dropped(&self) -> usize {
        self.broadcasts_dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn flows_installed(&self) -> usize {
        self.flows_installed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn flows_deleted(&self) -> usize {
        self.flows_deleted.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn paths_not_found(&self) -> usize {
        self.paths_not_found.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn topology_rebuilds(&self) -> usize {
        self.topology_rebuilds.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn discovery_frames_discarded(&self) -> usize {
        self.discovery_frames_discarded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn echo_replies_discarded(&self) -> usize {
        self.echo_replies_discarded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn lldp_samples(&self) -> usize {
        self.lldp_samples.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn echo_samples(&self) -> usize {
        self.echo_samples.load(Ordering::Relaxed)
    }
}
