use super::{
    super::error::{Error, Result},
    cotp::Cotp,
    cotp_param::{CotpConnParams, CotpDataParams},
    tpkt::TPKT_VERSION,
    types::{
        CpuFunctionGroup, CpuFunctionType, S7DataVariableType, S7Function, S7PduType,
        S7ReturnCode, SUBFUNCTION_READ_CLOCK, SUBFUNCTION_READ_SZL, SUBFUNCTION_WRITE_CLOCK,
    },
    var::{S7VarSpec, S7WriteItem, VAR_SPEC_WIRE_LEN},
    S7Message, S7Pdu, Tpkt, WireEncode,
};
use bytes::{BufMut, Bytes, BytesMut};

/// Most items a single ReadVar/WriteVar job may carry
pub const MAX_ITEMS_PER_REQUEST: usize = 20;

/// Job header (10) + function + item count
pub const READ_REQUEST_OVERHEAD: usize = 12;
/// AckData header (12) + function + item count
pub const READ_RESPONSE_OVERHEAD: usize = 14;
/// Job header (10) + function + item count
pub const WRITE_REQUEST_OVERHEAD: usize = 12;
/// AckData header (12) + function + item count
pub const WRITE_RESPONSE_OVERHEAD: usize = 14;
/// Return code / tag, transport size, u16 length
pub const DATA_ITEM_HEADER_LEN: usize = 4;

const USERDATA_PARAM_HEAD: [u8; 3] = [0x00, 0x01, 0x12];
const USERDATA_METHOD_REQUEST: u8 = 0x11;

/// Data item length rounded up to an even number of bytes
#[inline]
pub fn padded_len(len: usize) -> usize {
    len + (len & 1)
}

/// Wrap a COTP TPDU into a message; the codec fills in the TPKT length.
pub fn build_message_from_cotp(cotp: Cotp) -> S7Message {
    S7Message {
        tpkt: Tpkt {
            version: TPKT_VERSION,
            reserved: 0x00,
            length: 0,
        },
        cotp,
        app: None,
    }
}

pub fn build_cotp_cr_message(params: CotpConnParams) -> S7Message {
    build_message_from_cotp(Cotp::Cr(params))
}

/// Single, final Data TPDU carrying a complete S7 PDU
pub fn build_cotp_data_message(pdu: S7Pdu) -> S7Message {
    let mut msg = build_message_from_cotp(Cotp::D(CotpDataParams::default()));
    msg.app = Some(pdu);
    msg
}

/// SetupCommunication job: F0 00 amq_caller amq_callee pdu_len
pub fn build_setup_comm(amq_caller: u16, amq_callee: u16, pdu_len: u16) -> S7Pdu {
    let mut param = BytesMut::with_capacity(8);
    param.put_u8(S7Function::SetupCommunication as u8);
    param.put_u8(0x00);
    param.put_u16(amq_caller);
    param.put_u16(amq_callee);
    param.put_u16(pdu_len);
    S7Pdu::new(S7PduType::Job, param.freeze(), Bytes::new())
}

#[inline]
fn check_item_count(count: usize) -> Result<()> {
    if count == 0 {
        return Err(Error::ErrInvalidParam("empty item list"));
    }
    if count > MAX_ITEMS_PER_REQUEST {
        return Err(Error::TooManyItems {
            count,
            max: MAX_ITEMS_PER_REQUEST,
        });
    }
    Ok(())
}

fn encode_var_param(function: S7Function, specs: &[&S7VarSpec]) -> Result<Bytes> {
    let mut param = BytesMut::with_capacity(2 + specs.len() * VAR_SPEC_WIRE_LEN);
    param.put_u8(function as u8);
    param.put_u8(specs.len() as u8);
    for spec in specs {
        spec.encode_to(&mut param, &())?;
    }
    Ok(param.freeze())
}

/// ReadVar job for up to 20 variable specifications.
pub fn build_read_var(specs: &[S7VarSpec]) -> Result<S7Pdu> {
    check_item_count(specs.len())?;
    let refs: Vec<&S7VarSpec> = specs.iter().collect();
    let param = encode_var_param(S7Function::ReadVar, &refs)?;
    Ok(S7Pdu::new(S7PduType::Job, param, Bytes::new()))
}

/// WriteVar job. Each data item is `00 tag len(2) data`; odd-length items are
/// followed by one fill byte unless they are last.
pub fn build_write_var(items: &[S7WriteItem]) -> Result<S7Pdu> {
    check_item_count(items.len())?;
    let refs: Vec<&S7VarSpec> = items.iter().map(|it| &it.spec).collect();
    let param = encode_var_param(S7Function::WriteVar, &refs)?;

    let data_len: usize = items
        .iter()
        .map(|it| padded_len(it.data_item_len()))
        .sum();
    let mut payload = BytesMut::with_capacity(data_len);
    let last = items.len() - 1;
    for (idx, item) in items.iter().enumerate() {
        let tag = item.data_type();
        payload.put_u8(S7ReturnCode::Reserved.into());
        payload.put_u8(tag as u8);
        payload.put_u16(tag.len_field(item.data.len()));
        payload.put_slice(&item.data);
        if idx != last && item.data.len() % 2 == 1 {
            payload.put_u8(0x00);
        }
    }
    Ok(S7Pdu::new(S7PduType::Job, param, payload.freeze()))
}

/// UserData request with one CPU function parameter item and one data item.
fn build_cpu_function_request(group: CpuFunctionGroup, subfunction: u8, data: Bytes) -> S7Pdu {
    let mut param = BytesMut::with_capacity(8);
    param.put_slice(&USERDATA_PARAM_HEAD);
    // method, type|group, subfunction, sequence
    param.put_u8(0x04);
    param.put_u8(USERDATA_METHOD_REQUEST);
    param.put_u8(((CpuFunctionType::Request as u8) << 4) | (group as u8));
    param.put_u8(subfunction);
    param.put_u8(0x00);
    S7Pdu::new(S7PduType::UserData, param.freeze(), data)
}

fn user_data_item(return_code: S7ReturnCode, tag: S7DataVariableType, data: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(DATA_ITEM_HEADER_LEN + data.len());
    buf.put_u8(return_code.into());
    buf.put_u8(tag as u8);
    buf.put_u16(data.len() as u16);
    buf.put_slice(data);
    buf.freeze()
}

/// Read clock: time functions group, sub function 0x01, no data.
pub fn build_read_clock() -> S7Pdu {
    build_cpu_function_request(
        CpuFunctionGroup::TimeFunctions,
        SUBFUNCTION_READ_CLOCK,
        user_data_item(S7ReturnCode::ObjectDoesNotExist, S7DataVariableType::Null, &[]),
    )
}

/// Set clock. `timestamp` is reserved byte, century byte and the 8-byte BCD date and time.
pub fn build_write_clock(timestamp: &[u8; 10]) -> S7Pdu {
    build_cpu_function_request(
        CpuFunctionGroup::TimeFunctions,
        SUBFUNCTION_WRITE_CLOCK,
        user_data_item(
            S7ReturnCode::Success,
            S7DataVariableType::OctetString,
            timestamp,
        ),
    )
}

/// Read SZL partial list `id` at `index`.
pub fn build_read_szl(id: u16, index: u16) -> S7Pdu {
    let mut req = [0u8; 4];
    req[..2].copy_from_slice(&id.to_be_bytes());
    req[2..].copy_from_slice(&index.to_be_bytes());
    build_cpu_function_request(
        CpuFunctionGroup::CpuFunctions,
        SUBFUNCTION_READ_SZL,
        user_data_item(S7ReturnCode::Success, S7DataVariableType::OctetString, &req),
    )
}
