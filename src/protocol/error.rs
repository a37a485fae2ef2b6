use super::frame::S7ReturnCode;
use super::item::VarType;
use std::{fmt, result::Result as StdResult};
use thiserror::Error as ThisError;

/// Unified S7 result type
pub type Result<T> = StdResult<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connect timeout")]
    ErrConnectTimeout,

    #[error("request timeout")]
    ErrRequestTimeout,

    #[error("invalid frame")]
    ErrInvalidFrame,

    /// TPKT declared a length above the framer's accepted maximum
    #[error("frame length {length} exceeds maximum {max}")]
    FrameTooLarge { length: usize, max: usize },

    #[error("unexpected PDU or function")]
    ErrUnexpectedPdu,

    #[error("invalid address: {0}")]
    ErrInvalidAddress(String),

    #[error("invalid parameter: {0}")]
    ErrInvalidParam(&'static str),

    #[error("can not use closed connection")]
    ErrUseClosedConnection,

    #[error("connection is not closed (state: {0:?})")]
    InvalidState(super::session::ConnectionState),

    /// The PLC answered the COTP connection request with a disconnect request
    #[error("connection refused by peer (reason 0x{reason:02X})")]
    ConnectionRefused { reason: u8 },

    #[error("invalid configuration for: {0}")]
    InvalidConfiguration(&'static str),

    /// Decode error for malformed bytes that are not protocol violations
    #[error("decode error: {context}")]
    Decode { context: &'static str },

    /// Value can not be represented in the requested wire format
    #[error("encode error: {context}")]
    Encode { context: &'static str },

    /// A decoded field or a value to encode lies outside its legal range
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: String },

    /// The value variant does not match the item's var type or element count
    #[error("value does not match {var_type:?} x {count}")]
    TypeMismatch { var_type: VarType, count: u16 },

    /// Protocol contract violated (e.g., reserved/invalid field values)
    #[error("protocol violation: {context}")]
    ProtocolViolation { context: &'static str },

    #[error("pdu reference mismatch: expected {expected}, got {actual}")]
    PduRefMismatch { expected: u16, actual: u16 },

    /// Input does not have enough bytes to complete the operation
    #[error("insufficient data: needed {needed} bytes, available {available} bytes")]
    InsufficientData { needed: usize, available: usize },

    /// S7 Ack/AckData header-level error class and code.
    #[allow(clippy::enum_variant_names)]
    #[error("S7 error: {code}")]
    S7Error { code: ErrorCode },

    /// Non-zero error code carried in a UserData parameter block
    #[error("user data error: {code}")]
    UserDataError { code: ErrorCode },

    /// Item-level return code other than success
    #[error("item failed: {code:?}")]
    ItemFailed { code: S7ReturnCode },

    /// Every failing item of a batched write
    #[error("write failed for {} item(s): {}", failures.len(), ItemFailure::join(failures))]
    WriteFailed { failures: Vec<ItemFailure> },

    #[error("too many items in one request: {count} (max {max})")]
    TooManyItems { count: usize, max: usize },

    /// Item can not fit into a single PDU of the negotiated size
    #[error("item {index} needs {len} bytes, exceeding the negotiated PDU budget")]
    ItemTooLarge { index: usize, len: usize },

    /// TSAP-specific: Rack value is out of allowed range (0..=15)
    #[error("Rack value {0} is out of range (0..=15)")]
    InvalidRack(u8),

    /// TSAP-specific: Slot value is out of allowed range (0..=15)
    #[error("Slot value {0} is out of range (0..=15)")]
    InvalidSlot(u8),
}

impl Error {
    /// Whether the error leaves the byte stream in an untrusted position and
    /// therefore invalidates the connection.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::ErrConnectTimeout
                | Error::ErrRequestTimeout
                | Error::ErrInvalidFrame
                | Error::FrameTooLarge { .. }
                | Error::ErrUnexpectedPdu
                | Error::ConnectionRefused { .. }
                | Error::ProtocolViolation { .. }
                | Error::PduRefMismatch { .. }
                | Error::UserDataError { .. }
        )
    }
}

/// One failing item of a batched write, indexed by input position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemFailure {
    pub index: usize,
    pub code: S7ReturnCode,
}

impl ItemFailure {
    fn join(failures: &[ItemFailure]) -> String {
        failures
            .iter()
            .map(|f| format!("#{}={:?}", f.index, f.code))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Header error (class << 8 | code) reported in Ack/AckData headers and
/// UserData parameter blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success,
    /// Hardware fault
    HardwareFault,
    /// Object access not allowed
    AccessDenied,
    /// Address out of range
    AddressOutOfRange,
    /// Data type not supported
    DataTypeNotSupported,
    /// Object does not exist
    ObjectDoesNotExist,
    /// Service can not be executed in the current block state
    ServiceNotAllowedInCurrentState,
    /// Service unknown to the remote module
    UnknownServiceOnRemoteModule,
    /// Context is not supported (step7 says: function not implemented)
    ContextNotSupported,
    /// PDU size error in the request
    InvalidPduSize,
    /// Address error in the parameter block
    ParameterAddressError,
    /// Unknown function or sub function for the PLC state
    FunctionNotAvailable,
    /// Any other class/code pair
    Unknown(u16),
}

impl From<u16> for ErrorCode {
    fn from(value: u16) -> Self {
        match value {
            0x0000 => ErrorCode::Success,
            0x0001 => ErrorCode::HardwareFault,
            0x0003 => ErrorCode::AccessDenied,
            0x0005 => ErrorCode::AddressOutOfRange,
            0x0006 => ErrorCode::DataTypeNotSupported,
            0x000A => ErrorCode::ObjectDoesNotExist,
            0x8001 => ErrorCode::ServiceNotAllowedInCurrentState,
            0x8100 => ErrorCode::UnknownServiceOnRemoteModule,
            0x8104 => ErrorCode::ContextNotSupported,
            0x8500 => ErrorCode::InvalidPduSize,
            0xD401 => ErrorCode::ParameterAddressError,
            0xD602 => ErrorCode::FunctionNotAvailable,
            other => ErrorCode::Unknown(other),
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(value: ErrorCode) -> Self {
        match value {
            ErrorCode::Success => 0x0000,
            ErrorCode::HardwareFault => 0x0001,
            ErrorCode::AccessDenied => 0x0003,
            ErrorCode::AddressOutOfRange => 0x0005,
            ErrorCode::DataTypeNotSupported => 0x0006,
            ErrorCode::ObjectDoesNotExist => 0x000A,
            ErrorCode::ServiceNotAllowedInCurrentState => 0x8001,
            ErrorCode::UnknownServiceOnRemoteModule => 0x8100,
            ErrorCode::ContextNotSupported => 0x8104,
            ErrorCode::InvalidPduSize => 0x8500,
            ErrorCode::ParameterAddressError => 0xD401,
            ErrorCode::FunctionNotAvailable => 0xD602,
            ErrorCode::Unknown(v) => v,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw: u16 = (*self).into();
        write!(f, "{:?} (class 0x{:02X}, code 0x{:02X})", self, raw >> 8, raw & 0xFF)
    }
}
