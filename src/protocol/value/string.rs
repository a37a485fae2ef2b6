use super::{
    super::error::{Error, Result},
    datetime::out_of_range,
};

/// Largest reserved capacity of a STRING
pub const S7_STRING_MAX_CAPACITY: usize = 254;
/// Largest reserved capacity of a WSTRING
pub const S7_WSTRING_MAX_CAPACITY: usize = 16382;

fn latin1_bytes_to_string(input: &[u8]) -> String {
    input.iter().map(|&b| b as char).collect()
}

fn string_to_latin1(value: &str) -> Result<Vec<u8>> {
    value
        .chars()
        .map(|c| {
            u8::try_from(c as u32).map_err(|_| Error::Encode {
                context: "character outside Latin-1",
            })
        })
        .collect()
}

fn truncated(needed: usize, available: usize) -> Error {
    Error::InsufficientData { needed, available }
}

/// STRING: capacity byte, length byte, Latin-1 characters.
pub fn decode_s7_string(bytes: &[u8]) -> Result<String> {
    if bytes.len() < 2 {
        return Err(truncated(2, bytes.len()));
    }
    let (capacity, len) = (bytes[0] as usize, bytes[1] as usize);
    if len > capacity {
        return Err(Error::Decode {
            context: "string length exceeds its capacity",
        });
    }
    let data = bytes
        .get(2..2 + len)
        .ok_or_else(|| truncated(2 + len, bytes.len()))?;
    Ok(latin1_bytes_to_string(data))
}

/// Encode `value` into a STRING of `capacity` characters, zero filled.
///
/// A missing value encodes as the empty string, but only into a non-zero capacity.
pub fn encode_s7_string(value: Option<&str>, capacity: usize) -> Result<Vec<u8>> {
    if capacity > S7_STRING_MAX_CAPACITY {
        return Err(out_of_range("string capacity", capacity));
    }
    let value = match value {
        Some(v) => v,
        None if capacity == 0 => {
            return Err(Error::Encode {
                context: "null string without reserved capacity",
            })
        }
        None => "",
    };
    let data = string_to_latin1(value)?;
    if data.len() > capacity {
        return Err(out_of_range("string length", data.len()));
    }
    let mut out = Vec::with_capacity(2 + capacity);
    out.push(capacity as u8);
    out.push(data.len() as u8);
    out.extend_from_slice(&data);
    out.resize(2 + capacity, 0);
    Ok(out)
}

/// WSTRING: capacity u16, length u16, UTF-16BE code units.
pub fn decode_s7_wstring(bytes: &[u8]) -> Result<String> {
    if bytes.len() < 4 {
        return Err(truncated(4, bytes.len()));
    }
    let capacity = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    let len = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
    if len > capacity {
        return Err(Error::Decode {
            context: "wide string length exceeds its capacity",
        });
    }
    let data = bytes
        .get(4..4 + len * 2)
        .ok_or_else(|| truncated(4 + len * 2, bytes.len()))?;
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| Error::Decode {
        context: "invalid UTF-16 in wide string",
    })
}

/// Encode `value` into a WSTRING of `capacity` code units, zero filled.
pub fn encode_s7_wstring(value: Option<&str>, capacity: usize) -> Result<Vec<u8>> {
    if capacity > S7_WSTRING_MAX_CAPACITY {
        return Err(out_of_range("wide string capacity", capacity));
    }
    let value = match value {
        Some(v) => v,
        None if capacity == 0 => {
            return Err(Error::Encode {
                context: "null wide string without reserved capacity",
            })
        }
        None => "",
    };
    let units: Vec<u16> = value.encode_utf16().collect();
    if units.len() > capacity {
        return Err(out_of_range("wide string length", units.len()));
    }
    let mut out = Vec::with_capacity(4 + capacity * 2);
    out.extend_from_slice(&(capacity as u16).to_be_bytes());
    out.extend_from_slice(&(units.len() as u16).to_be_bytes());
    for unit in units {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out.resize(4 + capacity * 2, 0);
    Ok(out)
}

/// Fixed-length character field, trailing NULs dropped.
pub fn decode_chars(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    latin1_bytes_to_string(&bytes[..end])
}

/// Fixed-length character field of `len` bytes, zero filled.
pub fn encode_chars(value: &str, len: usize) -> Result<Vec<u8>> {
    let mut data = string_to_latin1(value)?;
    if data.len() > len {
        return Err(out_of_range("character field length", data.len()));
    }
    data.resize(len, 0);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s7_string_decode_rules() {
        assert_eq!(decode_s7_string(&[4, 2, b'h', b'i', 0, 0]).unwrap(), "hi");
        // length above capacity
        assert!(decode_s7_string(&[2, 3, b'a', b'b', b'c']).is_err());
        // length above available data
        assert!(matches!(
            decode_s7_string(&[10, 5, b'a', b'b']),
            Err(Error::InsufficientData { .. })
        ));
        // empty string ignores trailing garbage
        assert_eq!(decode_s7_string(&[10, 0, 0xDE, 0xAD, 0xBE]).unwrap(), "");
        assert_eq!(decode_s7_string(&[0, 0]).unwrap(), "");
    }

    #[test]
    fn s7_string_encode_rules() {
        assert!(encode_s7_string(None, 0).is_err());
        assert_eq!(encode_s7_string(None, 3).unwrap(), vec![3, 0, 0, 0, 0]);
        assert_eq!(encode_s7_string(Some(""), 0).unwrap(), vec![0, 0]);
        assert!(encode_s7_string(Some("abc"), 2).is_err());
        assert!(encode_s7_string(Some("a"), 255).is_err());
        assert_eq!(
            encode_s7_string(Some("Größe"), 6).unwrap(),
            vec![6, 5, b'G', b'r', 0xF6, 0xDF, b'e', 0]
        );
        assert!(encode_s7_string(Some("€"), 4).is_err());
        let encoded = encode_s7_string(Some("Größe"), 254).unwrap();
        assert_eq!(decode_s7_string(&encoded).unwrap(), "Größe");
    }

    #[test]
    fn s7_wstring_rules() {
        let encoded = encode_s7_wstring(Some("Ω€"), 4).unwrap();
        assert_eq!(
            encoded,
            vec![0, 4, 0, 2, 0x03, 0xA9, 0x20, 0xAC, 0, 0, 0, 0]
        );
        assert_eq!(decode_s7_wstring(&encoded).unwrap(), "Ω€");
        assert!(encode_s7_wstring(None, 0).is_err());
        assert!(encode_s7_wstring(Some(""), 0).is_ok());
        assert!(encode_s7_wstring(Some("abc"), 2).is_err());
        assert!(encode_s7_wstring(Some(""), S7_WSTRING_MAX_CAPACITY + 1).is_err());
        assert!(decode_s7_wstring(&[0, 1, 0, 2, 0, 0x41, 0, 0x42]).is_err());
        assert!(decode_s7_wstring(&[0, 4, 0, 2, 0, 0x41]).is_err());
        assert_eq!(decode_s7_wstring(&[0, 4, 0, 0, 0xFF]).unwrap(), "");
    }

    #[test]
    fn fixed_chars() {
        assert_eq!(encode_chars("AB", 4).unwrap(), vec![b'A', b'B', 0, 0]);
        assert_eq!(decode_chars(&[b'A', b'B', 0, 0]), "AB");
        assert!(encode_chars("ABCDE", 4).is_err());
    }
}
