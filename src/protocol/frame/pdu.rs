use super::{
    super::error::{Error, ErrorCode, Result},
    comm::S7Header,
    types::S7PduType,
    WireDecode, WireEncode,
};
use bytes::{BufMut, Bytes};

/// Unified S7 PDU container (header + parameter + payload) with zero-copy slices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S7Pdu {
    pub header: S7Header,
    pub param: Bytes,
    pub payload: Bytes,
}

impl S7Pdu {
    /// Build an outbound PDU; header lengths follow the supplied blocks.
    /// The PDU reference is stamped later by the session.
    pub fn new(pdu_type: S7PduType, param: Bytes, payload: Bytes) -> Self {
        let mut header = S7Header::new(pdu_type);
        header.param_len = param.len() as u16;
        header.payload_len = payload.len() as u16;
        S7Pdu {
            header,
            param,
            payload,
        }
    }

    /// Fail on a non-success error class/code in Ack/AckData headers.
    pub fn validate_response(&self) -> Result<()> {
        match self.header.error_code {
            Some(code) if code != ErrorCode::Success => Err(Error::S7Error { code }),
            _ => Ok(()),
        }
    }

    /// First parameter byte, the function code for Job/AckData PDUs.
    #[inline]
    pub fn function(&self) -> Option<u8> {
        self.param.first().copied()
    }
}

impl WireEncode for S7Pdu {
    type Error = Error;
    type Context = ();

    fn encoded_len(&self, _ctx: &Self::Context) -> usize {
        self.header.wire_len() + self.param.len() + self.payload.len()
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B, _ctx: &Self::Context) -> Result<()> {
        self.header.encode_to(dst);
        dst.put_slice(&self.param);
        dst.put_slice(&self.payload);
        Ok(())
    }
}

impl WireDecode for S7Pdu {
    type Error = Error;
    type Context = ();

    fn parse<'a>(
        input: &'a [u8],
        parent: &Bytes,
        _ctx: &Self::Context,
    ) -> Result<(&'a [u8], Self)> {
        let (hdr, rest) = S7Header::parse(input)?;
        let need = (hdr.param_len as usize) + (hdr.payload_len as usize);
        if rest.len() < need {
            return Err(Error::InsufficientData {
                needed: need,
                available: rest.len(),
            });
        }
        let (param_bytes, tail) = rest.split_at(hdr.param_len as usize);
        let (payload_bytes, remain) = tail.split_at(hdr.payload_len as usize);
        Ok((
            remain,
            S7Pdu {
                header: hdr,
                param: Bytes::slice_ref(parent, param_bytes),
                payload: Bytes::slice_ref(parent, payload_bytes),
            },
        ))
    }
}
