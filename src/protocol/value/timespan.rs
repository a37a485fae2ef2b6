use super::{
    super::error::{Error, Result},
    datetime::out_of_range,
};
use chrono::Duration;

/// Encoded length of TIME
pub const TIME_SPAN_LEN: usize = 4;

/// Shortest TIME value, -24d 20h 31m 23.648s
pub fn time_span_min() -> Duration {
    Duration::milliseconds(i32::MIN as i64)
}

/// Longest TIME value, 24d 20h 31m 23.647s
pub fn time_span_max() -> Duration {
    Duration::milliseconds(i32::MAX as i64)
}

/// TIME as signed big-endian milliseconds. Fails below millisecond precision
/// and outside `time_span_min()..=time_span_max()`.
pub fn encode_time_span(value: &Duration) -> Result<[u8; TIME_SPAN_LEN]> {
    let millis = value.num_milliseconds();
    if *value != Duration::milliseconds(millis) {
        return Err(Error::Encode {
            context: "time span below millisecond precision",
        });
    }
    let millis = i32::try_from(millis).map_err(|_| out_of_range("time span", value))?;
    Ok(millis.to_be_bytes())
}

pub fn decode_time_span(bytes: &[u8]) -> Result<Duration> {
    let raw: [u8; TIME_SPAN_LEN] = bytes
        .get(..TIME_SPAN_LEN)
        .and_then(|b| b.try_into().ok())
        .ok_or(Error::InsufficientData {
            needed: TIME_SPAN_LEN,
            available: bytes.len(),
        })?;
    Ok(Duration::milliseconds(i32::from_be_bytes(raw) as i64))
}
