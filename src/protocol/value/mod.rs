//! Conversions between raw PLC byte layouts and typed values.
//!
//! Array elements are packed back to back without padding; the fill bytes of the
//! WriteVar data block are a framing concern handled by the request builder.

pub mod bit;
pub mod datetime;
pub mod dtl;
mod number;
pub mod string;
pub mod timer;
pub mod timespan;

use super::{
    error::{Error, Result},
    item::{byte_length, DataItem, VarType},
};
use crate::wire::{WireDecode, WireEncode};
use bytes::{BufMut, Bytes};
use chrono::{Duration, NaiveDateTime};

pub use string::{S7_STRING_MAX_CAPACITY, S7_WSTRING_MAX_CAPACITY};

/// Typed value read from or written to the PLC
#[derive(Debug, Clone, PartialEq)]
pub enum S7Value {
    /// Single bit
    Bit(bool),
    /// Bit array, bit 0 of the first byte first
    Bits(Vec<bool>),
    Byte(u8),
    /// Byte array
    Bytes(Vec<u8>),
    Word(u16),
    Int(i16),
    DWord(u32),
    DInt(i32),
    Real(f32),
    LReal(f64),
    /// S5TIME
    Timer(Duration),
    /// Counter value 0..=999
    Counter(u16),
    /// DATE_AND_TIME (8-byte BCD)
    DateTime(NaiveDateTime),
    /// DTL (12 bytes)
    DateTimeLong(NaiveDateTime),
    /// TIME
    TimeSpan(Duration),
    /// Fixed-length character field
    String(String),
    S7String(String),
    S7WString(String),
    /// Elements of a fixed-width array
    Array(Vec<S7Value>),
}

impl From<bool> for S7Value {
    fn from(v: bool) -> Self {
        S7Value::Bit(v)
    }
}

impl From<i16> for S7Value {
    fn from(v: i16) -> Self {
        S7Value::Int(v)
    }
}

impl From<i32> for S7Value {
    fn from(v: i32) -> Self {
        S7Value::DInt(v)
    }
}

impl From<f32> for S7Value {
    fn from(v: f32) -> Self {
        S7Value::Real(v)
    }
}

impl From<f64> for S7Value {
    fn from(v: f64) -> Self {
        S7Value::LReal(v)
    }
}

/// Wire layout of a value: its type and element count (capacity for strings)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueLayout {
    pub var_type: VarType,
    pub count: u16,
}

impl ValueLayout {
    pub fn new(var_type: VarType, count: u16) -> Self {
        Self { var_type, count }
    }

    #[inline]
    fn mismatch(&self) -> Error {
        Error::TypeMismatch {
            var_type: self.var_type,
            count: self.count,
        }
    }
}

impl From<&DataItem> for ValueLayout {
    fn from(item: &DataItem) -> Self {
        Self::new(item.var_type, item.count)
    }
}

/// Encode one fixed-width element.
fn encode_element<B: BufMut>(var_type: VarType, value: &S7Value, dst: &mut B) -> Result<()> {
    match (var_type, value) {
        (VarType::Timer, S7Value::Timer(d)) => dst.put_u16(timer::encode_s5time(d)?),
        (VarType::Counter, S7Value::Counter(c)) => dst.put_u16(timer::encode_counter(*c)?),
        (VarType::DateTime, S7Value::DateTime(dt)) => {
            dst.put_slice(&datetime::encode_date_time(dt)?)
        }
        (VarType::DateTimeLong, S7Value::DateTimeLong(dt)) => dst.put_slice(&dtl::encode_dtl(dt)?),
        (VarType::TimeSpan, S7Value::TimeSpan(d)) => {
            dst.put_slice(&timespan::encode_time_span(d)?)
        }
        _ => number::encode_number(var_type, value, dst)?,
    }
    Ok(())
}

/// Decode one fixed-width element from the front of `input`.
fn decode_element(var_type: VarType, input: &[u8]) -> Result<S7Value> {
    let word = || -> Result<u16> {
        input
            .get(..2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or(Error::InsufficientData {
                needed: 2,
                available: input.len(),
            })
    };
    Ok(match var_type {
        VarType::Timer => S7Value::Timer(timer::decode_s5time(word()?)?),
        VarType::Counter => S7Value::Counter(timer::decode_counter(word()?)?),
        VarType::DateTime => S7Value::DateTime(datetime::decode_date_time(input)?),
        VarType::DateTimeLong => S7Value::DateTimeLong(dtl::decode_dtl(input)?),
        VarType::TimeSpan => S7Value::TimeSpan(timespan::decode_time_span(input)?),
        other => number::decode_number(other, input)?,
    })
}

impl WireEncode for S7Value {
    type Error = Error;
    type Context = ValueLayout;

    fn encoded_len(&self, ctx: &Self::Context) -> usize {
        byte_length(ctx.var_type, ctx.count)
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B, ctx: &Self::Context) -> Result<()> {
        let count = ctx.count as usize;
        if count == 0 {
            return Err(ctx.mismatch());
        }
        match (ctx.var_type, self) {
            (VarType::Bit, S7Value::Bit(v)) if count == 1 => dst.put_u8(*v as u8),
            (VarType::Bit, S7Value::Bits(bits)) if bits.len() == count => {
                dst.put_slice(&bit::pack_bits(bits))
            }
            (VarType::Byte, S7Value::Bytes(bytes)) if bytes.len() == count => dst.put_slice(bytes),
            (VarType::String, S7Value::String(s)) => dst.put_slice(&string::encode_chars(s, count)?),
            (VarType::S7String, S7Value::S7String(s)) => {
                dst.put_slice(&string::encode_s7_string(Some(s), count)?)
            }
            (VarType::S7WString, S7Value::S7WString(s)) => {
                dst.put_slice(&string::encode_s7_wstring(Some(s), count)?)
            }
            (var_type, S7Value::Array(items))
                if items.len() == count && var_type.element_size().is_some() =>
            {
                for item in items {
                    encode_element(var_type, item, dst)?;
                }
            }
            (var_type, scalar) if count == 1 && var_type.element_size().is_some() => {
                encode_element(var_type, scalar, dst).map_err(|e| match e {
                    Error::TypeMismatch { .. } => ctx.mismatch(),
                    other => other,
                })?
            }
            _ => return Err(ctx.mismatch()),
        }
        Ok(())
    }
}

impl WireDecode for S7Value {
    type Error = Error;
    type Context = ValueLayout;

    /// Decode `byte_length(var_type, count)` bytes; a single bit is bit 0 of its byte.
    fn parse<'a>(input: &'a [u8], _parent: &Bytes, ctx: &Self::Context) -> Result<(&'a [u8], Self)> {
        let len = byte_length(ctx.var_type, ctx.count);
        if input.len() < len {
            return Err(Error::InsufficientData {
                needed: len,
                available: input.len(),
            });
        }
        let (data, rest) = input.split_at(len);
        let count = ctx.count as usize;
        let value = match ctx.var_type {
            _ if count == 0 => return Err(ctx.mismatch()),
            VarType::Bit if count == 1 => S7Value::Bit(bit::get_bit(data[0], 0)),
            VarType::Bit => S7Value::Bits(bit::unpack_bits(data, count)),
            VarType::Byte if count > 1 => S7Value::Bytes(data.to_vec()),
            VarType::String => S7Value::String(string::decode_chars(data)),
            VarType::S7String => S7Value::S7String(string::decode_s7_string(data)?),
            VarType::S7WString => S7Value::S7WString(string::decode_s7_wstring(data)?),
            var_type if count == 1 => decode_element(var_type, data)?,
            var_type => {
                let size = var_type.element_size().ok_or_else(|| ctx.mismatch())?;
                S7Value::Array(
                    data.chunks_exact(size)
                        .map(|chunk| decode_element(var_type, chunk))
                        .collect::<Result<Vec<_>>>()?,
                )
            }
        };
        Ok((rest, value))
    }
}

impl S7Value {
    /// Encode for the given layout into a new buffer.
    pub fn encode(&self, var_type: VarType, count: u16) -> Result<Bytes> {
        self.to_bytes(&ValueLayout::new(var_type, count))
    }

    /// Decode a value of the given layout from the front of `data`.
    pub fn decode(var_type: VarType, count: u16, data: &[u8]) -> Result<S7Value> {
        let parent = Bytes::new();
        Self::parse(data, &parent, &ValueLayout::new(var_type, count)).map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn roundtrip(value: S7Value, var_type: VarType, count: u16) {
        let raw = value.encode(var_type, count).unwrap();
        assert_eq!(raw.len(), byte_length(var_type, count));
        assert_eq!(S7Value::decode(var_type, count, &raw).unwrap(), value);
    }

    #[test]
    fn scalars_and_arrays_roundtrip() {
        roundtrip(S7Value::Bit(true), VarType::Bit, 1);
        roundtrip(S7Value::Bits(vec![true, false, true, true, false, false, false, false, true]), VarType::Bit, 9);
        roundtrip(S7Value::Byte(0xA5), VarType::Byte, 1);
        roundtrip(S7Value::Bytes(vec![1, 2, 3]), VarType::Byte, 3);
        roundtrip(S7Value::Int(i16::MIN), VarType::Int, 1);
        roundtrip(
            S7Value::Array(vec![S7Value::Real(1.0), S7Value::Real(-2.5)]),
            VarType::Real,
            2,
        );
        roundtrip(S7Value::Counter(123), VarType::Counter, 1);
        roundtrip(S7Value::Timer(Duration::seconds(5)), VarType::Timer, 1);
        roundtrip(S7Value::TimeSpan(Duration::milliseconds(-1500)), VarType::TimeSpan, 1);
        roundtrip(S7Value::S7String("abc".into()), VarType::S7String, 10);
        roundtrip(S7Value::S7WString("äöü".into()), VarType::S7WString, 3);
        roundtrip(S7Value::String("AB".into()), VarType::String, 4);
        let dt = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_milli_opt(23, 0, 1, 5)
            .unwrap();
        roundtrip(S7Value::DateTime(dt), VarType::DateTime, 1);
        roundtrip(S7Value::DateTimeLong(dt), VarType::DateTimeLong, 1);
    }

    #[test]
    fn single_bit_reads_bit_zero() {
        assert_eq!(S7Value::decode(VarType::Bit, 1, &[0x01]).unwrap(), S7Value::Bit(true));
        assert_eq!(S7Value::decode(VarType::Bit, 1, &[0xFE]).unwrap(), S7Value::Bit(false));
    }

    #[test]
    fn layout_mismatch_is_reported() {
        assert!(matches!(
            S7Value::Int(1).encode(VarType::Word, 1),
            Err(Error::TypeMismatch { var_type: VarType::Word, count: 1 })
        ));
        assert!(matches!(
            S7Value::Array(vec![S7Value::Int(1)]).encode(VarType::Int, 2),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            S7Value::Bits(vec![true; 3]).encode(VarType::Bit, 4),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            S7Value::decode(VarType::DInt, 2, &[0; 4]),
            Err(Error::InsufficientData { needed: 8, available: 4 })
        ));
    }

    #[test]
    fn out_of_range_is_not_clamped() {
        assert!(matches!(
            S7Value::Counter(1000).encode(VarType::Counter, 1),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(
            S7Value::TimeSpan(Duration::days(30)).encode(VarType::TimeSpan, 1),
            Err(Error::OutOfRange { .. })
        ));
    }
}
