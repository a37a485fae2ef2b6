use super::{
    super::error::{Error, Result},
    datetime::{bcd_to_byte, byte_to_bcd, out_of_range},
};
use chrono::Duration;

/// S5TIME time bases in milliseconds, indexed by the base code in bits 12..13
const TIME_BASES_MS: [i64; 4] = [10, 100, 1_000, 10_000];

#[inline]
fn decode_bcd3(raw: u16, field: &'static str) -> Result<u16> {
    let hundreds = (raw >> 8) & 0x0F;
    if hundreds > 9 {
        return Err(out_of_range(field, format!("0x{raw:04X}")));
    }
    Ok(hundreds * 100 + bcd_to_byte((raw & 0xFF) as u8, field)? as u16)
}

#[inline]
fn encode_bcd3(value: u16) -> u16 {
    ((value / 100) << 8) | byte_to_bcd((value % 100) as u8) as u16
}

/// S5TIME: time base in bits 12..13, three BCD digits of units below.
pub fn decode_s5time(raw: u16) -> Result<Duration> {
    let base = TIME_BASES_MS[((raw >> 12) & 0x03) as usize];
    let units = decode_bcd3(raw, "s5time")? as i64;
    Ok(Duration::milliseconds(units * base))
}

/// Encode with the finest time base that represents `value` exactly.
/// Values that no base represents exactly, negatives and values above
/// 2h 46m 30s fail.
pub fn encode_s5time(value: &Duration) -> Result<u16> {
    let millis = value.num_milliseconds();
    if *value != Duration::milliseconds(millis) || millis < 0 {
        return Err(out_of_range("s5time", value));
    }
    TIME_BASES_MS
        .iter()
        .enumerate()
        .find(|&(_, &base)| millis % base == 0 && millis / base <= 999)
        .map(|(code, &base)| ((code as u16) << 12) | encode_bcd3((millis / base) as u16))
        .ok_or_else(|| out_of_range("s5time", value))
}

/// Counter value, three BCD digits (0..=999)
pub fn decode_counter(raw: u16) -> Result<u16> {
    decode_bcd3(raw & 0x0FFF, "counter")
}

pub fn encode_counter(value: u16) -> Result<u16> {
    if value > 999 {
        return Err(Error::OutOfRange {
            field: "counter",
            value: value.to_string(),
        });
    }
    Ok(encode_bcd3(value))
}
