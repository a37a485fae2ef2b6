use super::{
    error::{Error, Result},
    frame::{
        Cotp, S7Message, S7Pdu, Tpkt, WireDecode, WireEncode, TPKT_HEADER_LEN,
        TPKT_MAX_FRAME_LEN,
    },
};
use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Upper bound of one S7 PDU joined from Data TPDUs
const MAX_REASSEMBLED_LEN: usize = TPKT_MAX_FRAME_LEN;

/// Unified codec that handles RFC1006 (TPKT) + COTP + S7.
///
/// Data TPDUs without the EOT flag are buffered and joined with their
/// successors; one message is yielded per complete S7 PDU.
#[derive(Debug, Default)]
pub struct Codec {
    /// User data of Data TPDUs seen so far without EOT
    partial: BytesMut,
}

impl Codec {
    fn decode_frame(&mut self, frame: Bytes) -> Result<Option<S7Message>> {
        let (_, tpkt) = Tpkt::parse(&frame, &frame, &())?;
        let cotp_raw = frame.slice(TPKT_HEADER_LEN..);
        let (user, cotp) = Cotp::parse(&cotp_raw, &cotp_raw, &())?;
        let user = cotp_raw.slice_ref(user);

        let params = match cotp {
            Cotp::D(params) => params,
            _ => return Ok(Some(S7Message { tpkt, cotp, app: None })),
        };

        let total = self.partial.len() + user.len();
        if total > MAX_REASSEMBLED_LEN {
            self.partial.clear();
            return Err(Error::FrameTooLarge {
                length: total,
                max: MAX_REASSEMBLED_LEN,
            });
        }

        if !params.eot {
            self.partial.put_slice(&user);
            return Ok(None);
        }

        let body = if self.partial.is_empty() {
            user
        } else {
            self.partial.put_slice(&user);
            self.partial.split().freeze()
        };
        let (_, pdu) = S7Pdu::parse(&body, &body, &()).map_err(|_| Error::ErrInvalidFrame)?;
        Ok(Some(S7Message {
            tpkt,
            cotp,
            app: Some(pdu),
        }))
    }
}

impl Decoder for Codec {
    type Item = S7Message;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            if src.len() < TPKT_HEADER_LEN {
                return Ok(None);
            }
            let length = Tpkt::peek_len(&src[..TPKT_HEADER_LEN])?;
            if src.len() < length {
                src.reserve(length - src.len());
                return Ok(None);
            }
            let frame = src.split_to(length).freeze();
            if let Some(msg) = self.decode_frame(frame)? {
                return Ok(Some(msg));
            }
        }
    }
}

impl Encoder<S7Message> for Codec {
    type Error = Error;

    fn encode(&mut self, item: S7Message, dst: &mut BytesMut) -> Result<()> {
        let cotp_len = item.cotp.encoded_len(&());
        let s7_len = match (&item.cotp, &item.app) {
            (Cotp::D(_), Some(pdu)) => pdu.encoded_len(&()),
            _ => 0,
        };
        let tpkt = Tpkt::with_payload_len(cotp_len + s7_len)?;
        dst.reserve(tpkt.length as usize);
        tpkt.encode_to(dst, &())?;
        item.cotp.encode_to(dst, &())?;
        if let (Cotp::D(_), Some(pdu)) = (&item.cotp, &item.app) {
            pdu.encode_to(dst, &())?;
        }
        Ok(())
    }
}
