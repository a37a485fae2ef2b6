//! Siemens S7 client over ISO-on-TCP (RFC 1006 TPKT + COTP).
//!
//! ```no_run
//! use s7_client::{CpuType, DataItem, S7Client, S7ClientConfig, TsapConfig};
//!
//! # async fn run() -> s7_client::Result<()> {
//! let config = S7ClientConfig::new(
//!     CpuType::S71500,
//!     "192.168.0.10",
//!     TsapConfig::RackSlot { rack: 0, slot: 1 },
//! );
//! let client = S7Client::from_config(&config)?;
//! client.open().await?;
//! let items: Vec<DataItem> = vec!["DB1.DBW2".parse()?, "M10.3".parse()?];
//! for value in client.read_items(&items).await? {
//!     println!("{:?}", value?);
//! }
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod protocol;
pub mod types;
pub mod wire;

pub use client::S7Client;
pub use protocol::{
    error::{Error, ErrorCode, ItemFailure, Result},
    frame::{CpuStatus, CpuType, S7Area, S7ReturnCode, Tsap, TsapPair},
    item::{DataItem, VarType},
    session::{ConnectionState, SessionConfig},
    value::S7Value,
};
pub use types::{S7ClientConfig, TsapConfig};
