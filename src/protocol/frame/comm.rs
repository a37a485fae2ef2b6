use super::{
    super::error::{Error, ErrorCode, Result},
    types::S7PduType,
};
use bytes::BufMut;

pub const S7_PROTOCOL_ID: u8 = 0x32;

/// S7 Header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S7Header {
    pub protocol_id: u8,
    pub pdu_type: S7PduType,
    pub reserved: u16,
    pub pdu_ref: u16,
    pub param_len: u16,
    pub payload_len: u16,
    /// Error class and code, only present on Ack/AckData
    pub error_code: Option<ErrorCode>,
}

impl S7Header {
    pub fn new(pdu_type: S7PduType) -> Self {
        Self {
            protocol_id: S7_PROTOCOL_ID,
            pdu_type,
            reserved: 0,
            pdu_ref: 0,
            param_len: 0,
            payload_len: 0,
            error_code: None,
        }
    }

    /// Header length on the wire: 10 bytes, 12 for Ack/AckData.
    #[inline]
    pub fn wire_len(&self) -> usize {
        if has_error_field(self.pdu_type) {
            12
        } else {
            10
        }
    }

    /// Parse an S7 header from bytes. Ack/AckData carry two more bytes of
    /// error class and code which are stored in `error_code`.
    pub fn parse(input: &[u8]) -> Result<(S7Header, &[u8])> {
        if input.len() < 10 {
            return Err(Error::InsufficientData {
                needed: 10,
                available: input.len(),
            });
        }
        if input[0] != S7_PROTOCOL_ID {
            return Err(Error::ErrInvalidFrame);
        }
        let pdu_type = S7PduType::try_from(input[1]).map_err(|_| Error::ErrInvalidFrame)?;
        let mut rest = &input[10..];
        let error_code = if has_error_field(pdu_type) {
            if rest.len() < 2 {
                return Err(Error::InsufficientData {
                    needed: 12,
                    available: input.len(),
                });
            }
            let code = ErrorCode::from(u16::from_be_bytes([rest[0], rest[1]]));
            rest = &rest[2..];
            Some(code)
        } else {
            None
        };
        Ok((
            S7Header {
                protocol_id: input[0],
                pdu_type,
                reserved: u16::from_be_bytes([input[2], input[3]]),
                pdu_ref: u16::from_be_bytes([input[4], input[5]]),
                param_len: u16::from_be_bytes([input[6], input[7]]),
                payload_len: u16::from_be_bytes([input[8], input[9]]),
                error_code,
            },
            rest,
        ))
    }

    pub fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.protocol_id);
        dst.put_u8(self.pdu_type as u8);
        dst.put_u16(self.reserved);
        dst.put_u16(self.pdu_ref);
        dst.put_u16(self.param_len);
        dst.put_u16(self.payload_len);
        if has_error_field(self.pdu_type) {
            dst.put_u16(self.error_code.unwrap_or(ErrorCode::Success).into());
        }
    }
}

#[inline]
fn has_error_field(pdu_type: S7PduType) -> bool {
    matches!(pdu_type, S7PduType::Ack | S7PduType::AckData)
}
