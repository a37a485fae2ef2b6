mod builder;
pub mod comm;
pub mod cotp;
pub mod cotp_param;
mod pdu;
mod response;
pub mod tpkt;
pub mod tsap;
pub mod types;
pub mod var;

pub use crate::wire::{WireDecode, WireEncode};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// A fully decoded wire packet including TPKT, COTP and an optional application body.
#[derive(Debug, Clone)]
pub struct S7Message {
    pub tpkt: Tpkt,
    pub cotp: Cotp,
    /// Complete S7 PDU carried by a (reassembled) Data TPDU, None for other TPDUs
    pub app: Option<S7Pdu>,
}

/// CPU family, used to derive default TSAPs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i16)]
pub enum CpuType {
    S7200 = 0,
    S7200Smart = 1,
    S7300 = 2,
    S7400 = 3,
    S71200 = 4,
    S71500 = 5,
    Logo0BA8 = 6,
}

pub use builder::{
    build_cotp_cr_message, build_cotp_data_message, build_message_from_cotp, build_read_clock,
    build_read_szl, build_read_var, build_setup_comm, build_write_clock, build_write_var,
    padded_len, DATA_ITEM_HEADER_LEN, MAX_ITEMS_PER_REQUEST, READ_REQUEST_OVERHEAD,
    READ_RESPONSE_OVERHEAD, WRITE_REQUEST_OVERHEAD, WRITE_RESPONSE_OVERHEAD,
};
pub use comm::S7Header;
pub use cotp::Cotp;
pub use cotp_param::{CotpConnParams, CotpDataParams, CotpDrParams};
pub use pdu::S7Pdu;
pub use response::{
    parse_read_var_response, parse_setup_ack, parse_user_data_ack, parse_user_data_response,
    parse_write_var_response, ReadItemResult, SetupAck, UserDataResponse,
};
pub use tpkt::{Tpkt, TPKT_HEADER_LEN, TPKT_MAX_FRAME_LEN};
pub use tsap::{default_tsap_pair, validate_rack_slot, Tsap, TsapPair};
pub use types::{
    CotpType, CpuFunctionGroup, CpuFunctionType, CpuStatus, S7Area, S7DataVariableType,
    S7Function, S7PduType, S7ReturnCode, S7TransportSize, SUBFUNCTION_READ_CLOCK,
    SUBFUNCTION_READ_SZL, SUBFUNCTION_WRITE_CLOCK,
};
pub use var::{S7VarSpec, S7WriteItem, MAX_BYTE_ADDRESS, VAR_SPEC_WIRE_LEN};
