use super::{
    super::error::{Error, Result},
    datetime::out_of_range,
};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// Encoded length of DTL
pub const DTL_LEN: usize = 12;

/// Earliest instant DTL can carry
pub fn dtl_min() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1970, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Latest instant DTL can carry
pub fn dtl_max() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(2262, 4, 11).and_then(|d| d.and_hms_nano_opt(23, 47, 16, 854_775_807))
}

fn in_range(value: &NaiveDateTime) -> bool {
    match (dtl_min(), dtl_max()) {
        (Some(min), Some(max)) => (min..=max).contains(value),
        _ => false,
    }
}

/// year(u16) month day weekday(1 = Sunday) hour minute second nanoseconds(u32)
pub fn encode_dtl(value: &NaiveDateTime) -> Result<[u8; DTL_LEN]> {
    if !in_range(value) {
        return Err(out_of_range("date time long", value));
    }
    if value.nanosecond() >= 1_000_000_000 {
        return Err(Error::Encode {
            context: "leap second in date time long",
        });
    }
    let mut out = [0u8; DTL_LEN];
    out[..2].copy_from_slice(&(value.year() as u16).to_be_bytes());
    out[2] = value.month() as u8;
    out[3] = value.day() as u8;
    out[4] = value.weekday().number_from_sunday() as u8;
    out[5] = value.hour() as u8;
    out[6] = value.minute() as u8;
    out[7] = value.second() as u8;
    out[8..].copy_from_slice(&value.nanosecond().to_be_bytes());
    Ok(out)
}

pub fn decode_dtl(bytes: &[u8]) -> Result<NaiveDateTime> {
    if bytes.len() < DTL_LEN {
        return Err(Error::InsufficientData {
            needed: DTL_LEN,
            available: bytes.len(),
        });
    }
    let year = u16::from_be_bytes([bytes[0], bytes[1]]);
    let nanos = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let fields = [
        ("year", year as u32, 1970..=2262),
        ("month", bytes[2] as u32, 1..=12),
        ("day", bytes[3] as u32, 1..=31),
        ("day of week", bytes[4] as u32, 1..=7),
        ("hour", bytes[5] as u32, 0..=23),
        ("minute", bytes[6] as u32, 0..=59),
        ("second", bytes[7] as u32, 0..=59),
        ("nanosecond", nanos, 0..=999_999_999),
    ];
    for (field, value, range) in fields {
        if !range.contains(&value) {
            return Err(out_of_range(field, value));
        }
    }
    let value = NaiveDate::from_ymd_opt(year as i32, bytes[2] as u32, bytes[3] as u32)
        .and_then(|d| d.and_hms_nano_opt(bytes[5] as u32, bytes[6] as u32, bytes[7] as u32, nanos))
        .ok_or_else(|| out_of_range("date", format!("{year:04}-{:02}-{:02}", bytes[2], bytes[3])))?;
    if !in_range(&value) {
        return Err(out_of_range("date time long", value));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let value = NaiveDate::from_ymd_opt(2014, 8, 20)
            .unwrap()
            .and_hms_nano_opt(11, 59, 43, 912_000_000)
            .unwrap();
        let raw = encode_dtl(&value).unwrap();
        assert_eq!(
            raw,
            [0x07, 0xDE, 0x08, 0x14, 0x04, 0x0B, 0x3B, 0x2B, 0x36, 0x5C, 0x04, 0x00]
        );
        assert_eq!(decode_dtl(&raw).unwrap(), value);
    }

    #[test]
    fn bounds_inclusive() {
        let min = dtl_min().unwrap();
        let max = dtl_max().unwrap();
        assert_eq!(decode_dtl(&encode_dtl(&min).unwrap()).unwrap(), min);
        assert_eq!(decode_dtl(&encode_dtl(&max).unwrap()).unwrap(), max);
        assert!(encode_dtl(&(min - chrono::Duration::nanoseconds(1))).is_err());
        assert!(encode_dtl(&(max + chrono::Duration::nanoseconds(1))).is_err());
    }

    #[test]
    fn invalid_fields() {
        let mut raw = [0x07, 0xDE, 0x08, 0x14, 0x04, 0x0B, 0x3B, 0x2B, 0, 0, 0, 0];
        raw[4] = 8;
        assert!(decode_dtl(&raw).is_err());
        raw[4] = 4;
        raw[5] = 24;
        assert!(decode_dtl(&raw).is_err());
        raw[5] = 11;
        raw[8] = 0x3C;
        assert!(decode_dtl(&raw).is_err());
    }
}
