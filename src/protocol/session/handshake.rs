use super::super::{
    codec::Codec,
    error::{Error, Result},
    frame::{
        build_cotp_cr_message, build_cotp_data_message, build_setup_comm, parse_setup_ack, Cotp,
        CotpConnParams, S7Message, S7Pdu, SetupAck, DATA_ITEM_HEADER_LEN, VAR_SPEC_WIRE_LEN,
        WRITE_REQUEST_OVERHEAD,
    },
};
use super::state::{PduReference, SessionConfig};
use futures::{SinkExt, StreamExt};
use std::io;
use tokio::{net::TcpStream, time::timeout};
use tokio_util::codec::Framed;
use tracing::{debug, info};

/// Smallest PDU that still leaves room for one byte of write data
const MIN_PDU_SIZE: u16 =
    (WRITE_REQUEST_OVERHEAD + VAR_SPEC_WIRE_LEN + DATA_ITEM_HEADER_LEN + 1) as u16;

/// Next decoded message, bounded by the read timeout.
pub(super) async fn recv_message(
    framed: &mut Framed<TcpStream, Codec>,
    config: &SessionConfig,
) -> Result<S7Message> {
    timeout(config.read_timeout, framed.next())
        .await
        .map_err(|_| Error::ErrRequestTimeout)?
        .ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            ))
        })?
}

/// Send `msg`, bounded by the write timeout.
pub(super) async fn send_message(
    framed: &mut Framed<TcpStream, Codec>,
    config: &SessionConfig,
    msg: S7Message,
) -> Result<()> {
    timeout(config.write_timeout, framed.send(msg))
        .await
        .map_err(|_| Error::ErrRequestTimeout)?
}

/// Stamp the next PDU reference, send, and wait for the response echoing it.
pub(super) async fn exchange(
    framed: &mut Framed<TcpStream, Codec>,
    config: &SessionConfig,
    pdu_ref: &mut PduReference,
    mut pdu: S7Pdu,
) -> Result<S7Pdu> {
    let expected = pdu_ref.next();
    pdu.header.pdu_ref = expected;
    send_message(framed, config, build_cotp_data_message(pdu)).await?;

    loop {
        let S7Message { cotp, app, .. } = recv_message(framed, config).await?;
        match (cotp, app) {
            (_, Some(pdu)) if pdu.header.pdu_ref == expected => return Ok(pdu),
            (_, Some(pdu)) => {
                return Err(Error::PduRefMismatch {
                    expected,
                    actual: pdu.header.pdu_ref,
                })
            }
            (Cotp::Dr(params), None) => {
                return Err(Error::ConnectionRefused {
                    reason: params.reason,
                })
            }
            // empty Data TPDUs carry no S7 PDU
            (Cotp::D(_), None) => continue,
            (_, None) => return Err(Error::ErrUnexpectedPdu),
        }
    }
}

/// Perform COTP CR/CC handshake on an already connected framed transport.
///
/// Returns the TPDU size code confirmed in CC.
pub(super) async fn iso_connect(
    framed: &mut Framed<TcpStream, Codec>,
    config: &SessionConfig,
) -> Result<u8> {
    let cr = CotpConnParams {
        src_tsap: config.tsap.local.into(),
        dst_tsap: config.tsap.remote.into(),
        ..Default::default()
    };
    debug!(
        src_tsap = format_args!("0x{:04X}", cr.src_tsap),
        dst_tsap = format_args!("0x{:04X}", cr.dst_tsap),
        "sending COTP connection request"
    );
    send_message(framed, config, build_cotp_cr_message(cr)).await?;

    let S7Message { cotp, .. } = recv_message(framed, config).await?;
    match cotp {
        Cotp::Cc(params) => {
            debug!(
                tpdu_size = params.tpdu_size_bytes().unwrap_or_default(),
                "COTP connection confirmed"
            );
            Ok(params.tpdu_size)
        }
        Cotp::Dr(params) => Err(Error::ConnectionRefused {
            reason: params.reason,
        }),
        _ => Err(Error::ErrUnexpectedPdu),
    }
}

/// Send S7 SetupCommunication and return the granted values, with the PDU
/// size reduced to what was requested when the PLC offers more.
pub(super) async fn negotiation(
    framed: &mut Framed<TcpStream, Codec>,
    config: &SessionConfig,
    pdu_ref: &mut PduReference,
) -> Result<SetupAck> {
    let setup = build_setup_comm(
        config.amq_caller,
        config.amq_callee,
        config.preferred_pdu_size,
    );
    let pdu = exchange(framed, config, pdu_ref, setup).await?;
    let mut ack = parse_setup_ack(&pdu).map_err(|e| match e {
        Error::Decode { .. } | Error::InsufficientData { .. } => Error::ProtocolViolation {
            context: "malformed setup communication ack",
        },
        other => other,
    })?;

    let granted = ack.pdu_len;
    ack.pdu_len = granted.min(config.preferred_pdu_size);
    if ack.pdu_len < MIN_PDU_SIZE {
        return Err(Error::ProtocolViolation {
            context: "negotiated PDU size too small",
        });
    }
    info!(
        requested = config.preferred_pdu_size,
        granted,
        pdu_size = ack.pdu_len,
        amq_caller = ack.amq_caller,
        amq_callee = ack.amq_callee,
        "S7 communication negotiated"
    );
    Ok(ack)
}
