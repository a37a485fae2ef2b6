//! Bit access within a byte and bit-array packing (bit 0 of byte 0 first).

#[inline]
pub fn get_bit(byte: u8, index: u8) -> bool {
    byte & (1 << (index & 0x07)) != 0
}

#[inline]
pub fn set_bit(byte: u8, index: u8) -> u8 {
    byte | (1 << (index & 0x07))
}

#[inline]
pub fn clear_bit(byte: u8, index: u8) -> u8 {
    byte & !(1 << (index & 0x07))
}

#[inline]
pub fn write_bit(byte: u8, index: u8, value: bool) -> u8 {
    if value {
        set_bit(byte, index)
    } else {
        clear_bit(byte, index)
    }
}

pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            out[i / 8] = set_bit(out[i / 8], (i % 8) as u8);
        }
    }
    out
}

/// First `count` bits of `bytes`; missing bytes read as zero.
pub fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| {
            bytes
                .get(i / 8)
                .is_some_and(|&b| get_bit(b, (i % 8) as u8))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_clear_restores_every_byte() {
        for byte in 0..=255u8 {
            for index in 0..8u8 {
                assert!(get_bit(set_bit(byte, index), index));
                assert!(!get_bit(clear_bit(byte, index), index));
                assert_eq!(clear_bit(set_bit(byte, index), index), clear_bit(byte, index));
                if !get_bit(byte, index) {
                    assert_eq!(clear_bit(set_bit(byte, index), index), byte);
                }
                assert_eq!(write_bit(byte, index, get_bit(byte, index)), byte);
            }
        }
    }

    #[test]
    fn packs_lsb_first() {
        let bits = [true, false, false, false, false, false, false, true, true];
        let packed = pack_bits(&bits);
        assert_eq!(packed, vec![0x81, 0x01]);
        assert_eq!(unpack_bits(&packed, bits.len()), bits);
    }
}
