use super::{
    super::{
        error::{Error, Result},
        item::VarType,
    },
    S7Value,
};
use bytes::BufMut;
use nom::number::complete::{be_f32, be_f64, be_i16, be_i32, be_u16, be_u32, u8 as nom_u8};

#[inline]
fn short(needed: usize, available: usize) -> Error {
    Error::InsufficientData { needed, available }
}

/// Decode one big-endian numeric element of `var_type` from the front of `input`.
pub(crate) fn decode_number(var_type: VarType, input: &[u8]) -> Result<S7Value> {
    let needed = var_type.element_size().unwrap_or(1);
    let err = |_| short(needed, input.len());
    Ok(match var_type {
        VarType::Byte => S7Value::Byte(nom_u8::<_, nom::error::Error<&[u8]>>(input).map_err(err)?.1),
        VarType::Word => S7Value::Word(be_u16::<_, nom::error::Error<&[u8]>>(input).map_err(err)?.1),
        VarType::Int => S7Value::Int(be_i16::<_, nom::error::Error<&[u8]>>(input).map_err(err)?.1),
        VarType::DWord => S7Value::DWord(be_u32::<_, nom::error::Error<&[u8]>>(input).map_err(err)?.1),
        VarType::DInt => S7Value::DInt(be_i32::<_, nom::error::Error<&[u8]>>(input).map_err(err)?.1),
        VarType::Real => S7Value::Real(be_f32::<_, nom::error::Error<&[u8]>>(input).map_err(err)?.1),
        VarType::LReal => S7Value::LReal(be_f64::<_, nom::error::Error<&[u8]>>(input).map_err(err)?.1),
        other => return Err(Error::TypeMismatch { var_type: other, count: 1 }),
    })
}

/// Append one numeric element. Fails when `value` is not the variant for `var_type`.
pub(crate) fn encode_number<B: BufMut>(var_type: VarType, value: &S7Value, dst: &mut B) -> Result<()> {
    match (var_type, value) {
        (VarType::Byte, S7Value::Byte(v)) => dst.put_u8(*v),
        (VarType::Word, S7Value::Word(v)) => dst.put_u16(*v),
        (VarType::Int, S7Value::Int(v)) => dst.put_i16(*v),
        (VarType::DWord, S7Value::DWord(v)) => dst.put_u32(*v),
        (VarType::DInt, S7Value::DInt(v)) => dst.put_i32(*v),
        (VarType::Real, S7Value::Real(v)) => dst.put_f32(*v),
        (VarType::LReal, S7Value::LReal(v)) => dst.put_f64(*v),
        _ => return Err(Error::TypeMismatch { var_type, count: 1 }),
    }
    Ok(())
}
