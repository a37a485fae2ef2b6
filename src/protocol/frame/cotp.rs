use super::{
    super::error::{Error, Result},
    cotp_param::{CotpConnParams, CotpDataParams, CotpDrParams},
    types::CotpType,
    WireDecode, WireEncode,
};
use bytes::{BufMut, Bytes};

/// COTP TPDUs used by ISO-on-TCP + S7
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cotp {
    /// Connection Request
    Cr(CotpConnParams),
    /// Connection Confirm
    Cc(CotpConnParams),
    /// Disconnect Request
    Dr(CotpDrParams),
    /// Data TPDU
    D(CotpDataParams),
}

impl Cotp {
    #[inline]
    pub fn tpdu_type(&self) -> CotpType {
        match self {
            Cotp::Cr(_) => CotpType::Cr,
            Cotp::Cc(_) => CotpType::Cc,
            Cotp::Dr(_) => CotpType::Dr,
            Cotp::D(_) => CotpType::D,
        }
    }

    /// Length of the parameter body after LI and type
    fn body_len(&self) -> usize {
        match self {
            Cotp::Cr(p) | Cotp::Cc(p) => p.encoded_len(&()),
            Cotp::Dr(p) => p.encoded_len(&()),
            Cotp::D(p) => p.encoded_len(&()),
        }
    }
}

impl WireEncode for Cotp {
    type Error = Error;
    type Context = ();

    /// LI byte + type byte + body
    fn encoded_len(&self, _ctx: &Self::Context) -> usize {
        2 + self.body_len()
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B, ctx: &Self::Context) -> Result<()> {
        // LI excludes itself
        dst.put_u8((1 + self.body_len()) as u8);
        dst.put_u8(self.tpdu_type() as u8);
        match self {
            Cotp::Cr(p) | Cotp::Cc(p) => p.encode_to(dst, ctx),
            Cotp::Dr(p) => p.encode_to(dst, ctx),
            Cotp::D(p) => p.encode_to(dst, ctx),
        }
    }
}

impl WireDecode for Cotp {
    type Error = Error;
    type Context = ();

    /// Parse one COTP header. The rest slice is the user data that follows
    /// the header (only meaningful for Data TPDUs).
    fn parse<'a>(
        input: &'a [u8],
        _parent: &Bytes,
        _ctx: &Self::Context,
    ) -> Result<(&'a [u8], Self)> {
        if input.len() < 2 {
            return Err(Error::InsufficientData {
                needed: 2,
                available: input.len(),
            });
        }
        let li = input[0] as usize;
        let total = 1 + li;
        if li < 1 || total > input.len() {
            return Err(Error::ProtocolViolation {
                context: "invalid COTP LI",
            });
        }
        let body = &input[2..total];
        let rest = &input[total..];
        let tpdu_type = CotpType::try_from(input[1]).map_err(|_| Error::ProtocolViolation {
            context: "unknown COTP PDU type",
        })?;
        let cotp = match tpdu_type {
            CotpType::Cr => Cotp::Cr(CotpConnParams::parse_body(body)?),
            CotpType::Cc => Cotp::Cc(CotpConnParams::parse_body(body)?),
            CotpType::Dr => Cotp::Dr(CotpDrParams::parse_body(body)?),
            CotpType::D => Cotp::D(CotpDataParams::parse_body(body)?),
        };
        Ok((rest, cotp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_request_bytes() {
        let cr = Cotp::Cr(CotpConnParams {
            src_tsap: 0x0100,
            dst_tsap: 0x0102,
            ..Default::default()
        });
        let raw = cr.to_bytes(&()).unwrap();
        assert_eq!(raw[0], 0x11);
        assert_eq!(raw[1], 0xE0);
        assert_eq!(raw.len(), 18);
        let (rest, parsed) = Cotp::parse(&raw, &raw, &()).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, cr);
    }

    #[test]
    fn data_tpdu_leaves_user_data() {
        let raw = Bytes::from_static(&[0x02, 0xF0, 0x80, 0x32, 0x01]);
        let (rest, parsed) = Cotp::parse(&raw, &raw, &()).unwrap();
        assert_eq!(parsed, Cotp::D(CotpDataParams::default()));
        assert_eq!(rest, &[0x32, 0x01]);
    }

    #[test]
    fn disconnect_request_reason() {
        let raw = Bytes::from_static(&[0x06, 0x80, 0x00, 0x01, 0x00, 0x00, 0x81]);
        let (_, parsed) = Cotp::parse(&raw, &raw, &()).unwrap();
        assert!(matches!(parsed, Cotp::Dr(p) if p.reason == 0x81));
    }

    #[test]
    fn unknown_type_is_violation() {
        let raw = Bytes::from_static(&[0x02, 0x70, 0x00]);
        assert!(matches!(
            Cotp::parse(&raw, &raw, &()),
            Err(Error::ProtocolViolation { .. })
        ));
    }
}
