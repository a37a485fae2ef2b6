use super::super::frame::{Tsap, TsapPair};
use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

/// Connection lifecycle exposed to API consumers.
///
/// `Closed -> CotpConnecting -> CotpConnected -> NegotiatingPdu -> Open`.
/// Any transport or protocol fault moves to `Faulted`; only `close()` leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Closed,
    /// TCP connect and COTP connection request in progress
    CotpConnecting,
    /// COTP connection confirm received
    CotpConnected,
    /// SetupCommunication job sent
    NegotiatingPdu,
    /// Ready for read/write/clock/status requests
    Open,
    /// Byte stream no longer trusted; requests fail until reopened
    Faulted,
}

impl ConnectionState {
    #[inline]
    pub fn is_open(self) -> bool {
        self == ConnectionState::Open
    }
}

/// Session configuration for the S7 connection handshake and runtime behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote PLC address (host:port)
    pub socket_addr: SocketAddr,
    /// Local and remote TSAP sent in the COTP connection request
    pub tsap: TsapPair,
    /// Requested S7 PDU size; the PLC may grant less
    pub preferred_pdu_size: u16,
    /// Requested max AmQ (parallel jobs) caller & callee
    pub amq_caller: u16,
    pub amq_callee: u16,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Wait for one response frame
    pub read_timeout: Duration,
    /// Wait for one request frame to be flushed
    pub write_timeout: Duration,
    /// Requests queued behind the one on the wire
    pub send_queue_capacity: usize,
    /// TCP_NODELAY option. Defaults to true for low-latency small PDUs
    pub tcp_nodelay: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            socket_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 102)),
            tsap: TsapPair {
                local: Tsap(0x01, 0x00),
                remote: Tsap(0x03, 0x01),
            },
            preferred_pdu_size: 960,
            amq_caller: 1,
            amq_callee: 1,
            connect_timeout: Duration::from_millis(10_000),
            read_timeout: Duration::from_millis(5_000),
            write_timeout: Duration::from_millis(5_000),
            send_queue_capacity: 256,
            tcp_nodelay: true,
        }
    }
}

/// Monotonic PDU reference generator with wrap-around in [1..=65535]
#[derive(Debug, Default)]
pub struct PduReference(u16);

impl PduReference {
    /// Counter for a fresh connection; the first reference handed out is 1.
    pub fn new() -> Self {
        Self(0)
    }

    pub fn next(&mut self) -> u16 {
        self.0 = match self.0.wrapping_add(1) {
            0 => 1,
            v => v,
        };
        self.0
    }

    /// Last reference handed out, 0 before the first request
    #[inline]
    pub fn current(&self) -> u16 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdu_reference_skips_zero_on_wrap() {
        let mut r = PduReference::new();
        assert_eq!(r.next(), 1);
        assert_eq!(r.next(), 2);
        let mut r = PduReference(u16::MAX - 1);
        assert_eq!(r.next(), u16::MAX);
        assert_eq!(r.next(), 1);
        assert_eq!(r.current(), 1);
    }

    #[test]
    fn defaults() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.socket_addr.port(), 102);
        assert_eq!(cfg.preferred_pdu_size, 960);
        assert_eq!((cfg.amq_caller, cfg.amq_callee), (1, 1));
        assert_eq!(u16::from(cfg.tsap.remote), 0x0301);
        assert_eq!(ConnectionState::default(), ConnectionState::Closed);
    }
}
