use super::{
    super::error::{Error, Result},
    WireEncode,
};
use bytes::BufMut;

/// TPDU size parameter code for 1024 bytes (2^10)
pub const TPDU_SIZE_1024: u8 = 0x0A;

const PARAM_TPDU_SIZE: u8 = 0xC0;
const PARAM_SRC_TSAP: u8 = 0xC1;
const PARAM_DST_TSAP: u8 = 0xC2;

/// Parameters shared by COTP Connection Request and Connection Confirm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CotpConnParams {
    pub dst_ref: u16,
    pub src_ref: u16,
    /// Class 0, no extended formats, no explicit flow control
    pub class_option: u8,
    /// TPDU Size code (2^n bytes)
    pub tpdu_size: u8,
    /// Calling TSAP
    pub src_tsap: u16,
    /// Called TSAP
    pub dst_tsap: u16,
}

impl Default for CotpConnParams {
    fn default() -> Self {
        Self {
            dst_ref: 0x0000,
            src_ref: 0x0001,
            class_option: 0x00,
            tpdu_size: TPDU_SIZE_1024,
            src_tsap: 0x0100,
            dst_tsap: 0x0102,
        }
    }
}

impl CotpConnParams {
    /// Decoded TPDU size in bytes
    pub fn tpdu_size_bytes(&self) -> Option<usize> {
        tpdu_size_bytes_from_code(self.tpdu_size)
    }

    /// Parse the body following LI and TPDU code.
    ///
    /// Some PLCs omit TSAPs in their confirm; missing values fall back to the
    /// default and the TPDU size to 1024 bytes.
    pub fn parse_body(body: &[u8]) -> Result<Self> {
        if body.len() < 5 {
            return Err(Error::InsufficientData {
                needed: 5,
                available: body.len(),
            });
        }
        let mut params = CotpConnParams {
            dst_ref: u16::from_be_bytes([body[0], body[1]]),
            src_ref: u16::from_be_bytes([body[2], body[3]]),
            class_option: body[4],
            ..Default::default()
        };

        let data = &body[5..];
        let mut pos = 0;
        while pos + 2 <= data.len() {
            let code = data[pos];
            let len = data[pos + 1] as usize;
            pos += 2;
            if pos + len > data.len() {
                return Err(Error::ErrInvalidFrame);
            }
            let value = &data[pos..pos + len];
            match (code, len) {
                (PARAM_TPDU_SIZE, 1) => params.tpdu_size = value[0],
                (PARAM_SRC_TSAP, 2) => params.src_tsap = u16::from_be_bytes([value[0], value[1]]),
                (PARAM_DST_TSAP, 2) => params.dst_tsap = u16::from_be_bytes([value[0], value[1]]),
                // skip unknown parameter
                _ => {}
            }
            pos += len;
        }
        Ok(params)
    }
}

impl WireEncode for CotpConnParams {
    type Error = Error;
    type Context = ();

    fn encoded_len(&self, _ctx: &Self::Context) -> usize {
        2 + 2 + 1 + tlv_len(1) + tlv_len(2) + tlv_len(2)
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B, _ctx: &Self::Context) -> Result<()> {
        dst.put_u16(self.dst_ref);
        dst.put_u16(self.src_ref);
        dst.put_u8(self.class_option);
        write_tlv(dst, PARAM_TPDU_SIZE, &[self.tpdu_size]);
        write_tlv(dst, PARAM_SRC_TSAP, &self.src_tsap.to_be_bytes());
        write_tlv(dst, PARAM_DST_TSAP, &self.dst_tsap.to_be_bytes());
        Ok(())
    }
}

/// COTP Disconnect Request parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CotpDrParams {
    pub dst_ref: u16,
    pub src_ref: u16,
    pub reason: u8,
}

impl CotpDrParams {
    pub fn parse_body(body: &[u8]) -> Result<Self> {
        if body.len() < 5 {
            return Err(Error::InsufficientData {
                needed: 5,
                available: body.len(),
            });
        }
        Ok(Self {
            dst_ref: u16::from_be_bytes([body[0], body[1]]),
            src_ref: u16::from_be_bytes([body[2], body[3]]),
            reason: body[4],
        })
    }
}

impl WireEncode for CotpDrParams {
    type Error = Error;
    type Context = ();

    fn encoded_len(&self, _ctx: &Self::Context) -> usize {
        5
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B, _ctx: &Self::Context) -> Result<()> {
        dst.put_u16(self.dst_ref);
        dst.put_u16(self.src_ref);
        dst.put_u8(self.reason);
        Ok(())
    }
}

/// COTP Data TPDU parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CotpDataParams {
    /// Last data unit of the TSDU
    pub eot: bool,
    pub tpdu_nr: u8,
}

impl Default for CotpDataParams {
    fn default() -> Self {
        Self {
            eot: true,
            tpdu_nr: 0,
        }
    }
}

impl CotpDataParams {
    pub fn parse_body(body: &[u8]) -> Result<Self> {
        let eot_nr = *body.first().ok_or(Error::ErrInvalidFrame)?;
        Ok(CotpDataParams {
            eot: (eot_nr & 0x80) != 0,
            tpdu_nr: eot_nr & 0x7F,
        })
    }
}

impl WireEncode for CotpDataParams {
    type Error = Error;
    type Context = ();

    fn encoded_len(&self, _ctx: &Self::Context) -> usize {
        1
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B, _ctx: &Self::Context) -> Result<()> {
        let eot = if self.eot { 0x80 } else { 0x00 };
        dst.put_u8(eot | (self.tpdu_nr & 0x7F));
        Ok(())
    }
}

/// Fixed overhead of a COTP Data TPDU header (bytes): LI(1) + Type(1) + DataParams(1)
pub const COTP_D_FIXED_HEADER_LEN: usize = 3;

/// Map TPDU size code (2^n) to actual byte size. Returns None if it would overflow usize.
pub fn tpdu_size_bytes_from_code(code: u8) -> Option<usize> {
    1usize.checked_shl(code as u32)
}

/// Return TLV on-wire length for value length `len`
#[inline]
fn tlv_len(len: usize) -> usize {
    2 + len
}

#[inline]
fn write_tlv<B: BufMut>(dst: &mut B, code: u8, bytes: &[u8]) {
    dst.put_u8(code);
    dst.put_u8(bytes.len() as u8);
    dst.put_slice(bytes);
}
