use super::{
    super::error::{Error, ErrorCode, Result},
    types::{CpuFunctionGroup, CpuFunctionType, S7DataVariableType, S7Function, S7PduType, S7ReturnCode},
    S7Pdu,
};
use bytes::Bytes;
use nom::{
    bytes::complete::take,
    number::complete::{be_u16, u8 as nom_u8},
};
use std::result::Result as StdResult;

/// Parameters granted by the PLC in the SetupCommunication acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupAck {
    pub amq_caller: u16,
    pub amq_callee: u16,
    pub pdu_len: u16,
}

/// Data of one read item or the item's failure return code
pub type ReadItemResult = StdResult<Bytes, S7ReturnCode>;

/// Decoded single-item UserData response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDataResponse {
    pub return_code: S7ReturnCode,
    pub transport_size: u8,
    pub data: Bytes,
}

/// A response whose structure does not add up leaves the stream untrusted.
#[inline]
fn decode_err(_: nom::Err<nom::error::Error<&[u8]>>) -> Error {
    Error::ProtocolViolation {
        context: "truncated response body",
    }
}

/// AckData for `function` with a clean header error field
fn expect_ack_data(pdu: &S7Pdu, function: S7Function) -> Result<()> {
    if pdu.header.pdu_type != S7PduType::AckData {
        return Err(Error::ErrUnexpectedPdu);
    }
    pdu.validate_response()?;
    if pdu.function() != Some(function as u8) {
        return Err(Error::ErrUnexpectedPdu);
    }
    Ok(())
}

/// Item count byte following the function code
fn response_item_count(pdu: &S7Pdu, expected: usize) -> Result<usize> {
    let count = *pdu.param.get(1).ok_or(Error::ProtocolViolation {
        context: "missing item count",
    })? as usize;
    if count != expected {
        return Err(Error::ProtocolViolation {
            context: "response item count differs from request",
        });
    }
    Ok(count)
}

pub fn parse_setup_ack(pdu: &S7Pdu) -> Result<SetupAck> {
    expect_ack_data(pdu, S7Function::SetupCommunication)?;
    // function, reserved
    let (i, _) = take::<_, _, nom::error::Error<&[u8]>>(2usize)(pdu.param.as_ref())
        .map_err(decode_err)?;
    let (i, amq_caller) = be_u16::<_, nom::error::Error<&[u8]>>(i).map_err(decode_err)?;
    let (i, amq_callee) = be_u16::<_, nom::error::Error<&[u8]>>(i).map_err(decode_err)?;
    let (_, pdu_len) = be_u16::<_, nom::error::Error<&[u8]>>(i).map_err(decode_err)?;
    Ok(SetupAck {
        amq_caller,
        amq_callee,
        pdu_len,
    })
}

/// Per-item results of a ReadVar acknowledgement, in request order.
pub fn parse_read_var_response(pdu: &S7Pdu, expected: usize) -> Result<Vec<ReadItemResult>> {
    expect_ack_data(pdu, S7Function::ReadVar)?;
    let count = response_item_count(pdu, expected)?;

    let mut out = Vec::with_capacity(count);
    let mut input = pdu.payload.as_ref();
    for idx in 0..count {
        let (i, rc) = nom_u8::<_, nom::error::Error<&[u8]>>(input).map_err(decode_err)?;
        let (i, ts) = nom_u8::<_, nom::error::Error<&[u8]>>(i).map_err(decode_err)?;
        let (i, len) = be_u16::<_, nom::error::Error<&[u8]>>(i).map_err(decode_err)?;
        let return_code = S7ReturnCode::from(rc);
        let data_len = match S7DataVariableType::try_from(ts) {
            Ok(tag) => tag.data_len_in_bytes(len),
            Err(()) if return_code != S7ReturnCode::Success => 0,
            Err(()) => {
                return Err(Error::ProtocolViolation {
                    context: "unknown data item transport size",
                })
            }
        };
        let (mut i, data) =
            take::<_, _, nom::error::Error<&[u8]>>(data_len)(i).map_err(decode_err)?;
        if idx + 1 < count && data_len % 2 == 1 && !i.is_empty() {
            i = &i[1..];
        }
        input = i;
        out.push(if return_code == S7ReturnCode::Success {
            Ok(pdu.payload.slice_ref(data))
        } else {
            Err(return_code)
        });
    }
    Ok(out)
}

/// Per-item return codes of a WriteVar acknowledgement, in request order.
pub fn parse_write_var_response(pdu: &S7Pdu, expected: usize) -> Result<Vec<S7ReturnCode>> {
    expect_ack_data(pdu, S7Function::WriteVar)?;
    let count = response_item_count(pdu, expected)?;
    let (_, codes) =
        take::<_, _, nom::error::Error<&[u8]>>(count)(pdu.payload.as_ref()).map_err(decode_err)?;
    Ok(codes.iter().map(|&c| S7ReturnCode::from(c)).collect())
}

/// Check the parameter block of a CPU function response for `group`/`subfunction`.
///
/// A non-zero error code in the parameter block fails with `UserDataError`.
pub fn parse_user_data_ack(pdu: &S7Pdu, group: CpuFunctionGroup, subfunction: u8) -> Result<()> {
    if pdu.header.pdu_type != S7PduType::UserData {
        return Err(Error::ErrUnexpectedPdu);
    }
    // head (3), length, method, type|group, subfunction, sequence
    let (i, _head) = take::<_, _, nom::error::Error<&[u8]>>(3usize)(pdu.param.as_ref())
        .map_err(decode_err)?;
    let (i, item_len) = nom_u8::<_, nom::error::Error<&[u8]>>(i).map_err(decode_err)?;
    let (i, _method) = nom_u8::<_, nom::error::Error<&[u8]>>(i).map_err(decode_err)?;
    let (i, type_group) = nom_u8::<_, nom::error::Error<&[u8]>>(i).map_err(decode_err)?;
    let (i, sub) = nom_u8::<_, nom::error::Error<&[u8]>>(i).map_err(decode_err)?;
    let (i, _seq) = nom_u8::<_, nom::error::Error<&[u8]>>(i).map_err(decode_err)?;

    let typ = CpuFunctionType::try_from(type_group >> 4);
    let grp = CpuFunctionGroup::try_from(type_group & 0x0F);
    if typ != Ok(CpuFunctionType::Response) || grp != Ok(group) || sub != subfunction {
        return Err(Error::ErrUnexpectedPdu);
    }

    // Responses extend the item with data unit ref, last unit flag and error code
    if item_len >= 8 {
        let (i, _dur) = nom_u8::<_, nom::error::Error<&[u8]>>(i).map_err(decode_err)?;
        let (i, _last) = nom_u8::<_, nom::error::Error<&[u8]>>(i).map_err(decode_err)?;
        let (_, code) = be_u16::<_, nom::error::Error<&[u8]>>(i).map_err(decode_err)?;
        if code != 0 {
            return Err(Error::UserDataError {
                code: ErrorCode::from(code),
            });
        }
    }
    Ok(())
}

/// Validate a CPU function response and return its data item, which must
/// carry a success return code.
pub fn parse_user_data_response(
    pdu: &S7Pdu,
    group: CpuFunctionGroup,
    subfunction: u8,
) -> Result<UserDataResponse> {
    parse_user_data_ack(pdu, group, subfunction)?;

    let (i, rc) = nom_u8::<_, nom::error::Error<&[u8]>>(pdu.payload.as_ref()).map_err(decode_err)?;
    let (i, transport_size) = nom_u8::<_, nom::error::Error<&[u8]>>(i).map_err(decode_err)?;
    let (i, len) = be_u16::<_, nom::error::Error<&[u8]>>(i).map_err(decode_err)?;
    let return_code = S7ReturnCode::from(rc);
    if return_code != S7ReturnCode::Success {
        return Err(Error::ItemFailed { code: return_code });
    }
    let (_, data) = take::<_, _, nom::error::Error<&[u8]>>(len as usize)(i).map_err(decode_err)?;
    Ok(UserDataResponse {
        return_code,
        transport_size,
        data: pdu.payload.slice_ref(data),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ack_data(param: &'static [u8], payload: &'static [u8]) -> S7Pdu {
        S7Pdu::new(
            S7PduType::AckData,
            Bytes::from_static(param),
            Bytes::from_static(payload),
        )
    }

    #[test]
    fn setup_ack_grants_pdu() {
        let pdu = ack_data(&[0xF0, 0x00, 0x00, 0x01, 0x00, 0x01, 0x01, 0xE0], &[]);
        let ack = parse_setup_ack(&pdu).unwrap();
        assert_eq!(ack.pdu_len, 480);
        assert_eq!(ack.amq_caller, 1);
    }

    #[test]
    fn read_response_mixes_data_and_failures() {
        let pdu = ack_data(
            &[0x04, 0x03],
            &[
                0xFF, 0x04, 0x00, 0x08, 0xAB, 0x00, // one byte + fill
                0x0A, 0x00, 0x00, 0x00, // object does not exist
                0xFF, 0x03, 0x00, 0x01, 0x01,
            ],
        );
        let items = parse_read_var_response(&pdu, 3).unwrap();
        assert_eq!(items[0].as_ref().unwrap().as_ref(), &[0xAB]);
        assert_eq!(items[1], Err(S7ReturnCode::ObjectDoesNotExist));
        assert_eq!(items[2].as_ref().unwrap().as_ref(), &[0x01]);
    }

    #[test]
    fn read_response_count_mismatch() {
        let pdu = ack_data(&[0x04, 0x01], &[0xFF, 0x04, 0x00, 0x08, 0xAB]);
        assert!(matches!(
            parse_read_var_response(&pdu, 2),
            Err(Error::ProtocolViolation { .. })
        ));
    }

    #[test]
    fn malformed_read_response_is_a_violation() {
        // 16 bits declared, one byte present
        let pdu = ack_data(&[0x04, 0x01], &[0xFF, 0x04, 0x00, 0x10, 0xAB]);
        assert!(matches!(
            parse_read_var_response(&pdu, 1),
            Err(Error::ProtocolViolation { .. })
        ));
        let pdu = ack_data(&[0x04, 0x01], &[0xFF, 0x42, 0x00, 0x08, 0xAB]);
        assert!(matches!(
            parse_read_var_response(&pdu, 1),
            Err(Error::ProtocolViolation { .. })
        ));
        let pdu = ack_data(&[0x05, 0x02], &[0xFF]);
        assert!(matches!(
            parse_write_var_response(&pdu, 2),
            Err(Error::ProtocolViolation { .. })
        ));
    }

    #[test]
    fn write_response_codes() {
        let pdu = ack_data(&[0x05, 0x02], &[0xFF, 0x05]);
        assert_eq!(
            parse_write_var_response(&pdu, 2).unwrap(),
            vec![S7ReturnCode::Success, S7ReturnCode::AddressOutOfRange]
        );
    }

    #[test]
    fn wrong_function_is_unexpected() {
        let pdu = ack_data(&[0x05, 0x01], &[0xFF]);
        assert!(matches!(
            parse_read_var_response(&pdu, 1),
            Err(Error::ErrUnexpectedPdu)
        ));
    }

    #[test]
    fn user_data_error_code() {
        let pdu = S7Pdu::new(
            S7PduType::UserData,
            Bytes::from_static(&[
                0x00, 0x01, 0x12, 0x08, 0x12, 0x87, 0x01, 0x00, 0x00, 0x00, 0xD6, 0x02,
            ]),
            Bytes::from_static(&[0x0A, 0x00, 0x00, 0x00]),
        );
        assert!(matches!(
            parse_user_data_response(&pdu, CpuFunctionGroup::TimeFunctions, 0x01),
            Err(Error::UserDataError {
                code: ErrorCode::FunctionNotAvailable
            })
        ));
    }

    #[test]
    fn user_data_payload() {
        let pdu = S7Pdu::new(
            S7PduType::UserData,
            Bytes::from_static(&[
                0x00, 0x01, 0x12, 0x08, 0x12, 0x84, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00,
            ]),
            Bytes::from_static(&[0xFF, 0x09, 0x00, 0x02, 0x04, 0x24]),
        );
        let resp = parse_user_data_response(&pdu, CpuFunctionGroup::CpuFunctions, 0x01).unwrap();
        assert_eq!(resp.data.as_ref(), &[0x04, 0x24]);
        assert!(matches!(
            parse_user_data_response(&pdu, CpuFunctionGroup::TimeFunctions, 0x01),
            Err(Error::ErrUnexpectedPdu)
        ));
    }
}
