use std::time::SystemTime;

/// Datapath identifier of a switch.
pub type Dpid = u64;

/// Switch port number.
pub type PortNo = u32;

/// Returns the current UNIX timestamp in microseconds.
#[inline]
pub fn unix_micros() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}

/// Returns the number of milliseconds elapsed between the `earlier` UNIX timestamp (in
/// microseconds) and `now`. Negative if `earlier` lies in the future.
#[inline]
pub fn elapsed_millis(earlier: u64, now: u64) -> f64 {
    (now as f64 - earlier as f64) / 1_000.0
}

#[allow(non_upper_case_globals)]
pub mod constants {
    /// Well-known ethertypes.
    pub mod ethertype {
        pub const IPV4: u16 = 0x0800;
        pub const ARP: u16 = 0x0806;
        pub const IPV6: u16 = 0x86dd;
        pub const LLDP: u16 = 0x88cc;
    }

    /// OpenFlow 1.3 reserved port numbers.
    pub mod port {
        use crate::PortNo;

        pub const MAX: PortNo = 0xffff_ff00;
        pub const FLOOD: PortNo = 0xffff_fffb;
        pub const CONTROLLER: PortNo = 0xffff_fffd;
        pub const ANY: PortNo = 0xffff_ffff;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_signed() {
        assert_eq!(elapsed_millis(1_000, 6_000), 5.0);
        assert_eq!(elapsed_millis(6_000, 1_000), -5.0);
    }
}
