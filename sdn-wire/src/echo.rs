//! Payload of the timed echo probes sent to every switch.
//!
//! The controller stamps each echo request with its send time; the switch returns the payload
//! unchanged in the echo reply, so the round trip can be computed without keeping any
//! per-request state.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid echo payload length: {0}")]
    InvalidLength(usize),
}

/// A decoded echo probe payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoProbe {
    /// UNIX timestamp in microseconds at which the request was sent.
    sent_at: u64,
}

impl EchoProbe {
    /// Size of an encoded probe in bytes.
    pub const LEN: usize = 8;

    pub const fn new(sent_at: u64) -> Self {
        Self { sent_at }
    }

    pub const fn sent_at(&self) -> u64 {
        self.sent_at
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::LEN);
        buf.put_u64(self.sent_at);
        buf.freeze()
    }

    /// Decodes a probe from an echo reply payload. Anything other than exactly one timestamp is
    /// rejected, which filters out replies to probes sent by other controller instances.
    pub fn decode(mut payload: &[u8]) -> Result<Self, Error> {
        if payload.len() != Self::LEN {
            return Err(Error::InvalidLength(payload.len()));
        }

        Ok(Self { sent_at: payload.get_u64() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_probe_roundtrip() {
        let probe = EchoProbe::new(1_700_000_000_123_456);
        let encoded = probe.encode();
        assert_eq!(encoded.len(), EchoProbe::LEN);
        assert_eq!(EchoProbe::decode(&encoded), Ok(probe));
    }

    #[test]
    fn echo_probe_rejects_foreign_payloads() {
        assert_eq!(EchoProbe::decode(b""), Err(Error::InvalidLength(0)));
        assert_eq!(
            EchoProbe::decode(b"1700000000.123456789012"),
            Err(Error::InvalidLength(23))
        );
    }
}
