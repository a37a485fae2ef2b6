use crate::{
    protocol::{
        error::Result,
        frame::{CpuStatus, S7Area},
        item::DataItem,
        session::{ConnectionState, Session, SessionConfig},
        value::S7Value,
    },
    types::S7ClientConfig,
};
use chrono::NaiveDateTime;
use std::sync::Arc;
use tokio::{net::TcpStream, sync::watch, time::timeout};
use tracing::debug;

/// Client for one S7 PLC over one ISO-on-TCP connection.
///
/// Cloning is cheap; clones share the connection and its request queue.
#[derive(Debug, Clone)]
pub struct S7Client {
    session: Arc<Session>,
}

impl S7Client {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            session: Arc::new(Session::new(config)),
        }
    }

    pub fn from_config(config: &S7ClientConfig) -> Result<Self> {
        Ok(Self::new(config.to_session_config()?))
    }

    /// Connect and negotiate. Fails with `InvalidState` unless closed.
    pub async fn open(&self) -> Result<()> {
        self.session.open().await
    }

    pub async fn close(&self) {
        self.session.close().await
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.session.subscribe_state()
    }

    /// Whether requests can be submitted
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state().is_open()
    }

    /// Probe TCP reachability of the PLC with a throwaway connection.
    /// The protocol session is left untouched.
    pub async fn is_available(&self) -> bool {
        let config = self.session.config();
        let reachable = matches!(
            timeout(config.connect_timeout, TcpStream::connect(config.socket_addr)).await,
            Ok(Ok(_))
        );
        debug!(addr = %config.socket_addr, reachable, "availability probe");
        reachable
    }

    pub fn negotiated_pdu_size(&self) -> Option<u16> {
        self.session.negotiated_pdu_size()
    }

    /// Read `len` bytes starting at `start` of `area` (`db_number` for data blocks).
    pub async fn read_bytes(
        &self,
        area: S7Area,
        db_number: u16,
        start: u32,
        len: usize,
    ) -> Result<Vec<u8>> {
        self.session.read_bytes(area, db_number, start, len).await
    }

    pub async fn read_items(&self, items: &[DataItem]) -> Result<Vec<Result<S7Value>>> {
        self.session.read_items(items).await
    }

    pub async fn write_bytes(
        &self,
        area: S7Area,
        db_number: u16,
        start: u32,
        data: &[u8],
    ) -> Result<()> {
        self.session.write_bytes(area, db_number, start, data).await
    }

    /// Write every item; failing items are reported together as `WriteFailed`.
    pub async fn write_items(&self, items: &[DataItem]) -> Result<()> {
        self.session.write_items(items).await
    }

    pub async fn read_clock(&self) -> Result<NaiveDateTime> {
        self.session.read_clock().await
    }

    pub async fn write_clock(&self, value: &NaiveDateTime) -> Result<()> {
        self.session.write_clock(value).await
    }

    /// Raw CPU operating mode code
    pub async fn read_status(&self) -> Result<u8> {
        self.session.read_status().await
    }

    pub async fn cpu_status(&self) -> Result<CpuStatus> {
        self.session.cpu_status().await
    }
}
