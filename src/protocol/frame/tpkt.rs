use super::{
    super::error::{Error, Result},
    WireDecode, WireEncode,
};
use bytes::{BufMut, Bytes};

pub const TPKT_VERSION: u8 = 0x03;
pub const TPKT_HEADER_LEN: usize = 4;

/// Upper bound accepted for one TPKT frame. A 1024 byte TPDU plus headers
/// stays well below it; anything larger means the stream is out of sync.
pub const TPKT_MAX_FRAME_LEN: usize = 4096;

/// TPKT (RFC1006) header: 4 bytes
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Tpkt {
    /// Always 0x03 for RFC1006
    pub version: u8,
    /// Reserved, always 0x00
    pub reserved: u8,
    /// Total length including this 4-byte header
    pub length: u16,
}

impl Tpkt {
    /// Header for a frame carrying `payload_len` bytes of COTP + user data.
    pub fn with_payload_len(payload_len: usize) -> Result<Self> {
        let total = TPKT_HEADER_LEN + payload_len;
        if total > TPKT_MAX_FRAME_LEN {
            return Err(Error::FrameTooLarge {
                length: total,
                max: TPKT_MAX_FRAME_LEN,
            });
        }
        Ok(Self {
            version: TPKT_VERSION,
            reserved: 0x00,
            length: total as u16,
        })
    }

    /// Validate a raw header and return the declared total frame length.
    pub fn peek_len(hdr: &[u8]) -> Result<usize> {
        if hdr.len() < TPKT_HEADER_LEN {
            return Err(Error::InsufficientData {
                needed: TPKT_HEADER_LEN,
                available: hdr.len(),
            });
        }
        if hdr[0] != TPKT_VERSION || hdr[1] != 0x00 {
            return Err(Error::ErrInvalidFrame);
        }
        let length = u16::from_be_bytes([hdr[2], hdr[3]]) as usize;
        // LI + type is the smallest COTP TPDU
        if length < TPKT_HEADER_LEN + 2 {
            return Err(Error::ErrInvalidFrame);
        }
        if length > TPKT_MAX_FRAME_LEN {
            return Err(Error::FrameTooLarge {
                length,
                max: TPKT_MAX_FRAME_LEN,
            });
        }
        Ok(length)
    }
}

impl WireEncode for Tpkt {
    type Error = Error;
    type Context = ();

    fn encoded_len(&self, _ctx: &Self::Context) -> usize {
        TPKT_HEADER_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B, _ctx: &Self::Context) -> Result<()> {
        dst.put_u8(self.version);
        dst.put_u8(self.reserved);
        dst.put_u16(self.length);
        Ok(())
    }
}

impl WireDecode for Tpkt {
    type Error = Error;
    type Context = ();

    /// Parses the header and returns the bytes following the whole frame.
    fn parse<'a>(
        input: &'a [u8],
        _parent: &Bytes,
        _ctx: &Self::Context,
    ) -> Result<(&'a [u8], Self)> {
        let length = Tpkt::peek_len(input)?;
        if length > input.len() {
            return Err(Error::InsufficientData {
                needed: length,
                available: input.len(),
            });
        }
        Ok((
            &input[length..],
            Tpkt {
                version: input[0],
                reserved: input[1],
                length: length as u16,
            },
        ))
    }
}
