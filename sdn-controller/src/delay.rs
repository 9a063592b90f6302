use rustc_hash::FxHashMap;

use sdn_common::Dpid;

/// Combines the timing samples of a link into its delay, in milliseconds.
///
/// A discovery frame from `a` to `b` travels controller -> `a` -> link -> `b` -> controller, so
/// each one-way sample includes both switches' control-channel latency. Subtracting the echo
/// round trips of both switches leaves twice the link delay. Negative results are clock-skew
/// artifacts and clamp to zero.
#[inline]
pub fn combined_delay(lldp_ab: f64, lldp_ba: f64, echo_a: f64, echo_b: f64) -> f64 {
    ((lldp_ab + lldp_ba - echo_a - echo_b) / 2.0).max(0.0)
}

/// Latest timing samples per directed switch pair and per switch. Missing samples count as
/// zero.
#[derive(Debug, Default)]
pub struct DelayEstimator {
    /// One-way discovery delay `(src, dst) -> ms`.
    lldp: FxHashMap<(Dpid, Dpid), f64>,
    /// Echo round trip `dpid -> ms`.
    echo: FxHashMap<Dpid, f64>,
}

impl DelayEstimator {
    /// Records the one-way delay of a discovery frame sent by `src` and received by `dst`.
    pub fn record_lldp(&mut self, src: Dpid, dst: Dpid, delay_ms: f64) {
        self.lldp.insert((src, dst), delay_ms);
    }

    /// Records the echo round trip of `dpid`.
    pub fn record_echo(&mut self, dpid: Dpid, delay_ms: f64) {
        self.echo.insert(dpid, delay_ms);
    }

    pub fn lldp_delay(&self, src: Dpid, dst: Dpid) -> f64 {
        self.lldp.get(&(src, dst)).copied().unwrap_or_default()
    }

    pub fn echo_delay(&self, dpid: Dpid) -> f64 {
        self.echo.get(&dpid).copied().unwrap_or_default()
    }

    /// Returns the estimated delay of the link between `a` and `b`. Symmetric in its arguments.
    pub fn link_delay(&self, a: Dpid, b: Dpid) -> f64 {
        combined_delay(
            self.lldp_delay(a, b),
            self.lldp_delay(b, a),
            self.echo_delay(a),
            self.echo_delay(b),
        )
    }

    /// Drops every sample involving `dpid`.
    pub fn forget_switch(&mut self, dpid: Dpid) {
        self.echo.remove(&dpid);
        self.lldp.retain(|(src, dst), _| *src != dpid && *dst != dpid);
    }
}
