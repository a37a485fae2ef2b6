/// COTP TPDU type values (subset)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CotpType {
    /// Connection Request
    Cr = 0xE0,
    /// Connection Confirm
    Cc = 0xD0,
    /// Disconnection Request
    Dr = 0x80,
    /// Data
    D = 0xF0,
}

impl TryFrom<u8> for CotpType {
    type Error = ();

    fn try_from(v: u8) -> std::result::Result<Self, Self::Error> {
        match v {
            0xE0 => Ok(CotpType::Cr),
            0xD0 => Ok(CotpType::Cc),
            0x80 => Ok(CotpType::Dr),
            0xF0 => Ok(CotpType::D),
            _ => Err(()),
        }
    }
}

/// S7 PDU kinds (ROSCTR)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S7PduType {
    Job = 0x01,
    Ack = 0x02,
    AckData = 0x03,
    UserData = 0x07,
}

impl TryFrom<u8> for S7PduType {
    type Error = ();
    fn try_from(v: u8) -> std::result::Result<Self, Self::Error> {
        match v {
            0x01 => Ok(S7PduType::Job),
            0x02 => Ok(S7PduType::Ack),
            0x03 => Ok(S7PduType::AckData),
            0x07 => Ok(S7PduType::UserData),
            _ => Err(()),
        }
    }
}

/// S7 job function codes used by this client
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S7Function {
    /// Read Variable
    ReadVar = 0x04,
    /// Write Variable
    WriteVar = 0x05,
    /// Setup Communication
    SetupCommunication = 0xF0,
}

impl TryFrom<u8> for S7Function {
    type Error = ();

    fn try_from(v: u8) -> std::result::Result<Self, Self::Error> {
        match v {
            0x04 => Ok(S7Function::ReadVar),
            0x05 => Ok(S7Function::WriteVar),
            0xF0 => Ok(S7Function::SetupCommunication),
            _ => Err(()),
        }
    }
}

/// Variable specification type (0x12) and the S7ANY syntax id (0x10)
pub const VAR_SPEC_TYPE: u8 = 0x12;
pub const VAR_SPEC_LEN: u8 = 0x0A;
pub const SYNTAX_ID_S7ANY: u8 = 0x10;

/// PLC memory areas addressable by a `DataItem`
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum S7Area {
    /// Process inputs (I / E)
    Input = 0x81,
    /// Process outputs (Q / A)
    Output = 0x82,
    /// Merkers (M)
    Memory = 0x83,
    /// Data blocks (DB)
    DataBlock = 0x84,
    /// Counters (C / Z)
    Counter = 0x1C,
    /// Timers (T)
    Timer = 0x1D,
}

impl TryFrom<u8> for S7Area {
    type Error = ();
    fn try_from(v: u8) -> std::result::Result<Self, Self::Error> {
        match v {
            0x81 => Ok(S7Area::Input),
            0x82 => Ok(S7Area::Output),
            0x83 => Ok(S7Area::Memory),
            0x84 => Ok(S7Area::DataBlock),
            0x1C => Ok(S7Area::Counter),
            0x1D => Ok(S7Area::Timer),
            _ => Err(()),
        }
    }
}

/// Transport size codes used in variable specifications
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S7TransportSize {
    Bit = 0x01,
    Byte = 0x02,
    Counter = 0x1C,
    Timer = 0x1D,
}

impl TryFrom<u8> for S7TransportSize {
    type Error = ();
    fn try_from(v: u8) -> std::result::Result<Self, Self::Error> {
        match v {
            0x01 => Ok(S7TransportSize::Bit),
            0x02 => Ok(S7TransportSize::Byte),
            0x1C => Ok(S7TransportSize::Counter),
            0x1D => Ok(S7TransportSize::Timer),
            _ => Err(()),
        }
    }
}

/// Return code present in AckData data items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S7ReturnCode {
    Reserved,
    Success,
    HardwareFault,
    AccessDenied,
    AddressOutOfRange,
    DataTypeNotSupported,
    DataTypeInconsistent,
    ObjectDoesNotExist,
    ObjectNotAvailable,
    Unknown(u8),
}

impl From<u8> for S7ReturnCode {
    fn from(v: u8) -> Self {
        match v {
            0x00 => S7ReturnCode::Reserved,
            0xFF => S7ReturnCode::Success,
            0x01 => S7ReturnCode::HardwareFault,
            0x03 => S7ReturnCode::AccessDenied,
            0x05 => S7ReturnCode::AddressOutOfRange,
            0x06 => S7ReturnCode::DataTypeNotSupported,
            0x07 => S7ReturnCode::DataTypeInconsistent,
            0x0A => S7ReturnCode::ObjectDoesNotExist,
            0x0B => S7ReturnCode::ObjectNotAvailable,
            other => S7ReturnCode::Unknown(other),
        }
    }
}

impl From<S7ReturnCode> for u8 {
    fn from(value: S7ReturnCode) -> Self {
        match value {
            S7ReturnCode::Reserved => 0x00,
            S7ReturnCode::Success => 0xFF,
            S7ReturnCode::HardwareFault => 0x01,
            S7ReturnCode::AccessDenied => 0x03,
            S7ReturnCode::AddressOutOfRange => 0x05,
            S7ReturnCode::DataTypeNotSupported => 0x06,
            S7ReturnCode::DataTypeInconsistent => 0x07,
            S7ReturnCode::ObjectDoesNotExist => 0x0A,
            S7ReturnCode::ObjectNotAvailable => 0x0B,
            S7ReturnCode::Unknown(v) => v,
        }
    }
}

/// Data item transport tag used in the data block of WriteVar requests,
/// ReadVar responses and UserData payloads
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S7DataVariableType {
    /// No data
    Null = 0x00,
    /// Bit access, length field semantics: bits (always 1)
    Bit = 0x03,
    /// Byte/Word/DWord access, length field semantics: bits
    ByteWordDWord = 0x04,
    /// Integer access, length field semantics: bits
    Integer = 0x05,
    /// Real access, length field semantics: bytes
    Real = 0x07,
    /// Octet string, length field semantics: bytes
    OctetString = 0x09,
}

impl TryFrom<u8> for S7DataVariableType {
    type Error = ();
    fn try_from(v: u8) -> std::result::Result<Self, Self::Error> {
        Ok(match v {
            0x00 => S7DataVariableType::Null,
            0x03 => S7DataVariableType::Bit,
            0x04 => S7DataVariableType::ByteWordDWord,
            0x05 => S7DataVariableType::Integer,
            0x07 => S7DataVariableType::Real,
            0x09 => S7DataVariableType::OctetString,
            _ => Err(())?,
        })
    }
}

impl S7DataVariableType {
    /// Convert the on-wire length field into a byte count.
    #[inline]
    pub fn data_len_in_bytes(self, len_field: u16) -> usize {
        match self {
            S7DataVariableType::Null
            | S7DataVariableType::Bit
            | S7DataVariableType::ByteWordDWord
            | S7DataVariableType::Integer => (len_field as usize).div_ceil(8),
            S7DataVariableType::Real | S7DataVariableType::OctetString => len_field as usize,
        }
    }

    /// Length field value for `data_len_bytes` of payload.
    #[inline]
    pub fn len_field(self, data_len_bytes: usize) -> u16 {
        match self {
            S7DataVariableType::Bit => 1,
            S7DataVariableType::ByteWordDWord | S7DataVariableType::Integer => {
                (data_len_bytes * 8) as u16
            }
            _ => data_len_bytes as u16,
        }
    }
}

/// UserData function groups used by the clock and status services
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuFunctionGroup {
    /// CPU functions (SZL)
    CpuFunctions = 0x04,
    /// Time functions (clock)
    TimeFunctions = 0x07,
}

impl TryFrom<u8> for CpuFunctionGroup {
    type Error = ();
    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0x04 => Ok(CpuFunctionGroup::CpuFunctions),
            0x07 => Ok(CpuFunctionGroup::TimeFunctions),
            _ => Err(()),
        }
    }
}

/// UserData function type nibble
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuFunctionType {
    /// Type 0x04: Request
    Request = 0x04,
    /// Type 0x08: Response
    Response = 0x08,
}

impl TryFrom<u8> for CpuFunctionType {
    type Error = ();
    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0x04 => Ok(CpuFunctionType::Request),
            0x08 => Ok(CpuFunctionType::Response),
            _ => Err(()),
        }
    }
}

/// UserData sub functions
pub const SUBFUNCTION_READ_SZL: u8 = 0x01;
pub const SUBFUNCTION_READ_CLOCK: u8 = 0x01;
pub const SUBFUNCTION_WRITE_CLOCK: u8 = 0x02;

/// CPU operating state as reported in SZL 0x0424
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuStatus {
    Stop,
    Run,
    Unknown(u8),
}

impl From<u8> for CpuStatus {
    fn from(code: u8) -> Self {
        match code {
            0x04 => CpuStatus::Stop,
            0x08 => CpuStatus::Run,
            other => CpuStatus::Unknown(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_len_semantics() {
        assert_eq!(S7DataVariableType::Bit.data_len_in_bytes(1), 1);
        assert_eq!(S7DataVariableType::ByteWordDWord.data_len_in_bytes(16), 2);
        assert_eq!(S7DataVariableType::ByteWordDWord.data_len_in_bytes(12), 2);
        assert_eq!(S7DataVariableType::OctetString.data_len_in_bytes(10), 10);
        assert_eq!(S7DataVariableType::Bit.len_field(1), 1);
        assert_eq!(S7DataVariableType::ByteWordDWord.len_field(2), 16);
        assert_eq!(S7DataVariableType::OctetString.len_field(4), 4);
    }

    #[test]
    fn return_code_keeps_unknown_values() {
        assert_eq!(S7ReturnCode::from(0xFF), S7ReturnCode::Success);
        assert_eq!(S7ReturnCode::from(0x42), S7ReturnCode::Unknown(0x42));
        assert_eq!(u8::from(S7ReturnCode::Unknown(0x42)), 0x42);
    }

    #[test]
    fn cpu_status_codes() {
        assert_eq!(CpuStatus::from(0x08), CpuStatus::Run);
        assert_eq!(CpuStatus::from(0x04), CpuStatus::Stop);
        assert_eq!(CpuStatus::from(0x00), CpuStatus::Unknown(0));
    }
}
