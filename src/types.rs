use crate::protocol::{
    error::{Error, Result},
    frame::{default_tsap_pair, CpuType, Tsap, TsapPair},
    session::SessionConfig,
};
use serde::{Deserialize, Serialize};
use std::{
    net::{IpAddr, SocketAddr},
    time::Duration,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum TsapConfig {
    /// Derive the pair from the CPU family
    RackSlot { rack: u8, slot: u8 },
    /// Explicit local/remote TSAP
    Tsap { local: u16, remote: u16 },
}

/// Connection parameters of one PLC
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S7ClientConfig {
    /// CPU type
    pub cpu: CpuType,
    /// Remote IP address
    pub host: String,
    /// Remote port (default 102)
    #[serde(default = "S7ClientConfig::default_port")]
    pub port: u16,
    /// TSAP configuration
    pub tsap: TsapConfig,
    /// Requested S7 PDU size in bytes (default 960)
    #[serde(default = "S7ClientConfig::default_pdu_size")]
    pub preferred_pdu_size: u16,
    #[serde(default = "S7ClientConfig::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "S7ClientConfig::default_io_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "S7ClientConfig::default_io_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl S7ClientConfig {
    fn default_port() -> u16 {
        102
    }

    fn default_pdu_size() -> u16 {
        960
    }

    fn default_connect_timeout_ms() -> u64 {
        10_000
    }

    fn default_io_timeout_ms() -> u64 {
        5_000
    }

    /// Config with defaults for everything but the target.
    pub fn new(cpu: CpuType, host: impl Into<String>, tsap: TsapConfig) -> Self {
        Self {
            cpu,
            host: host.into(),
            port: Self::default_port(),
            tsap,
            preferred_pdu_size: Self::default_pdu_size(),
            connect_timeout_ms: Self::default_connect_timeout_ms(),
            read_timeout_ms: Self::default_io_timeout_ms(),
            write_timeout_ms: Self::default_io_timeout_ms(),
        }
    }

    /// TSAP pair for the COTP connection request.
    pub fn tsap_pair(&self) -> Result<TsapPair> {
        match self.tsap {
            TsapConfig::RackSlot { rack, slot } => default_tsap_pair(self.cpu, rack, slot),
            TsapConfig::Tsap { local, remote } => Ok(TsapPair {
                local: Tsap::from(local),
                remote: Tsap::from(remote),
            }),
        }
    }

    /// Map onto session options, resolving TSAPs and the socket address.
    pub fn to_session_config(&self) -> Result<SessionConfig> {
        let ip = self
            .host
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| Error::InvalidConfiguration("host"))?;
        if self.preferred_pdu_size == 0 {
            return Err(Error::InvalidConfiguration("preferredPduSize"));
        }
        Ok(SessionConfig {
            socket_addr: SocketAddr::new(ip, self.port),
            tsap: self.tsap_pair()?,
            preferred_pdu_size: self.preferred_pdu_size,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            ..SessionConfig::default()
        })
    }
}
