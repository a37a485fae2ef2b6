use super::super::error::{Error, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// Encoded length of DATE_AND_TIME
pub const DATE_TIME_LEN: usize = 8;

/// Years representable by the two BCD year digits (90..99 => 19xx, 00..89 => 20xx)
const MIN_YEAR: i32 = 1990;
const MAX_YEAR: i32 = 2089;

#[inline]
pub(crate) fn byte_to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// Decode one BCD byte, rejecting nibbles above 9.
#[inline]
pub(crate) fn bcd_to_byte(bcd: u8, field: &'static str) -> Result<u8> {
    let (hi, lo) = (bcd >> 4, bcd & 0x0F);
    if hi > 9 || lo > 9 {
        return Err(out_of_range(field, format!("0x{bcd:02X}")));
    }
    Ok(hi * 10 + lo)
}

#[inline]
pub(crate) fn out_of_range(field: &'static str, value: impl ToString) -> Error {
    Error::OutOfRange {
        field,
        value: value.to_string(),
    }
}

#[inline]
fn check(field: &'static str, value: u8, range: std::ops::RangeInclusive<u8>) -> Result<u8> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(out_of_range(field, value))
    }
}

/// Encode as 8-byte BCD DATE_AND_TIME: yy MM dd hh mm ss, two ms digits, last
/// ms digit in the high nibble and day of week (1 = Sunday) in the low nibble.
///
/// Accepts 1990-01-01 00:00:00.000 through 2089-12-31 23:59:59.999 at millisecond
/// precision.
pub fn encode_date_time(value: &NaiveDateTime) -> Result<[u8; DATE_TIME_LEN]> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&value.year()) {
        return Err(out_of_range("date and time", value));
    }
    let nanos = value.nanosecond();
    if nanos % 1_000_000 != 0 || nanos >= 1_000_000_000 {
        return Err(Error::Encode {
            context: "date and time below millisecond precision",
        });
    }
    let millis = nanos / 1_000_000;
    Ok([
        byte_to_bcd((value.year() % 100) as u8),
        byte_to_bcd(value.month() as u8),
        byte_to_bcd(value.day() as u8),
        byte_to_bcd(value.hour() as u8),
        byte_to_bcd(value.minute() as u8),
        byte_to_bcd(value.second() as u8),
        byte_to_bcd((millis / 10) as u8),
        (((millis % 10) as u8) << 4) | value.weekday().number_from_sunday() as u8,
    ])
}

/// Decode 8-byte BCD DATE_AND_TIME, validating every field.
pub fn decode_date_time(bytes: &[u8]) -> Result<NaiveDateTime> {
    if bytes.len() < DATE_TIME_LEN {
        return Err(Error::InsufficientData {
            needed: DATE_TIME_LEN,
            available: bytes.len(),
        });
    }
    let yy = bcd_to_byte(bytes[0], "year")? as i32;
    let year = if yy < 90 { 2000 + yy } else { 1900 + yy };
    let month = check("month", bcd_to_byte(bytes[1], "month")?, 1..=12)?;
    let day = check("day", bcd_to_byte(bytes[2], "day")?, 1..=31)?;
    let hour = check("hour", bcd_to_byte(bytes[3], "hour")?, 0..=23)?;
    let minute = check("minute", bcd_to_byte(bytes[4], "minute")?, 0..=59)?;
    let second = check("second", bcd_to_byte(bytes[5], "second")?, 0..=59)?;
    let ms_high = bcd_to_byte(bytes[6], "millisecond")? as u32;
    let ms_low = check("millisecond", bytes[7] >> 4, 0..=9)? as u32;
    check("day of week", bytes[7] & 0x0F, 1..=7)?;

    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .and_then(|d| {
            d.and_hms_milli_opt(
                hour as u32,
                minute as u32,
                second as u32,
                ms_high * 10 + ms_low,
            )
        })
        .ok_or_else(|| out_of_range("date", format!("{year:04}-{month:02}-{day:02}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_milli_opt(h, mi, s, ms)
            .unwrap()
    }

    #[test]
    fn known_timestamp() {
        let value = dt(2014, 8, 20, 11, 59, 43, 912);
        let raw = encode_date_time(&value).unwrap();
        assert_eq!(raw, [0x14, 0x08, 0x20, 0x11, 0x59, 0x43, 0x91, 0x24]);
        assert_eq!(decode_date_time(&raw).unwrap(), value);
    }

    #[test]
    fn range_bounds() {
        let min = dt(1990, 1, 1, 0, 0, 0, 0);
        let max = dt(2089, 12, 31, 23, 59, 59, 999);
        assert_eq!(decode_date_time(&encode_date_time(&min).unwrap()).unwrap(), min);
        assert_eq!(decode_date_time(&encode_date_time(&max).unwrap()).unwrap(), max);
        assert!(encode_date_time(&dt(1989, 12, 31, 23, 59, 59, 999)).is_err());
        assert!(encode_date_time(&dt(2090, 1, 1, 0, 0, 0, 0)).is_err());
    }

    #[test]
    fn sub_millisecond_rejected() {
        let value = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_micro_opt(0, 0, 0, 1)
            .unwrap();
        assert!(matches!(
            encode_date_time(&value),
            Err(Error::Encode { .. })
        ));
    }

    #[test]
    fn invalid_fields_rejected() {
        // month 13
        assert!(decode_date_time(&[0x14, 0x13, 0x20, 0x11, 0x59, 0x43, 0x91, 0x24]).is_err());
        // day of week 0
        assert!(decode_date_time(&[0x14, 0x08, 0x20, 0x11, 0x59, 0x43, 0x91, 0x20]).is_err());
        // non-BCD nibble
        assert!(decode_date_time(&[0x1A, 0x08, 0x20, 0x11, 0x59, 0x43, 0x91, 0x24]).is_err());
        // February 30th
        assert!(decode_date_time(&[0x14, 0x02, 0x30, 0x11, 0x59, 0x43, 0x91, 0x24]).is_err());
        assert!(matches!(
            decode_date_time(&[0x14, 0x08]),
            Err(Error::InsufficientData { .. })
        ));
    }
}
