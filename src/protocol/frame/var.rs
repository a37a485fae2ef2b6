use super::{
    super::error::{Error, Result},
    types::{S7Area, S7DataVariableType, S7TransportSize, SYNTAX_ID_S7ANY, VAR_SPEC_LEN, VAR_SPEC_TYPE},
    WireEncode,
};
use bytes::{BufMut, Bytes};
use nom::number::complete::{be_u16, be_u24, u8 as nom_u8};

/// Largest byte offset expressible in the 24-bit bit address field
pub const MAX_BYTE_ADDRESS: u32 = 0x1F_FFFF;

/// On-wire length of one variable specification
pub const VAR_SPEC_WIRE_LEN: usize = 12;

/// S7ANY variable specification carried in ReadVar/WriteVar parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct S7VarSpec {
    pub transport_size: S7TransportSize,
    /// number of elements of `transport_size`
    pub count: u16,
    /// DB number if area is DB, else 0
    pub db_number: u16,
    pub area: S7Area,
    /// byte offset, or element index for timers and counters
    pub byte_address: u32,
    /// bit index [0..7] for bit-level access
    pub bit_index: u8,
}

impl S7VarSpec {
    /// Value of the 24-bit address field.
    #[inline]
    pub fn address_field(&self) -> u32 {
        match self.transport_size {
            S7TransportSize::Timer | S7TransportSize::Counter => self.byte_address,
            _ => (self.byte_address << 3) | (self.bit_index as u32 & 0x07),
        }
    }

    pub fn parse(input: &[u8]) -> Result<(&[u8], S7VarSpec)> {
        let (i, spec_type) =
            nom_u8::<_, nom::error::Error<&[u8]>>(input).map_err(|_| Error::ErrInvalidFrame)?;
        let (i, spec_len) =
            nom_u8::<_, nom::error::Error<&[u8]>>(i).map_err(|_| Error::ErrInvalidFrame)?;
        let (i, syntax) =
            nom_u8::<_, nom::error::Error<&[u8]>>(i).map_err(|_| Error::ErrInvalidFrame)?;
        if spec_type != VAR_SPEC_TYPE || spec_len != VAR_SPEC_LEN || syntax != SYNTAX_ID_S7ANY {
            return Err(Error::ProtocolViolation {
                context: "unsupported variable specification",
            });
        }
        let (i, ts) =
            nom_u8::<_, nom::error::Error<&[u8]>>(i).map_err(|_| Error::ErrInvalidFrame)?;
        let transport_size = S7TransportSize::try_from(ts).map_err(|_| Error::ErrInvalidFrame)?;
        let (i, count) =
            be_u16::<_, nom::error::Error<&[u8]>>(i).map_err(|_| Error::ErrInvalidFrame)?;
        let (i, db_number) =
            be_u16::<_, nom::error::Error<&[u8]>>(i).map_err(|_| Error::ErrInvalidFrame)?;
        let (i, area) =
            nom_u8::<_, nom::error::Error<&[u8]>>(i).map_err(|_| Error::ErrInvalidFrame)?;
        let area = S7Area::try_from(area).map_err(|_| Error::ErrInvalidFrame)?;
        let (i, address) =
            be_u24::<_, nom::error::Error<&[u8]>>(i).map_err(|_| Error::ErrInvalidFrame)?;
        let (byte_address, bit_index) = match transport_size {
            S7TransportSize::Timer | S7TransportSize::Counter => (address, 0),
            _ => (address >> 3, (address & 0x07) as u8),
        };
        Ok((
            i,
            S7VarSpec {
                transport_size,
                count,
                db_number,
                area,
                byte_address,
                bit_index,
            },
        ))
    }
}

impl WireEncode for S7VarSpec {
    type Error = Error;
    type Context = ();

    fn encoded_len(&self, _ctx: &Self::Context) -> usize {
        VAR_SPEC_WIRE_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B, _ctx: &Self::Context) -> Result<()> {
        if self.byte_address > MAX_BYTE_ADDRESS {
            return Err(Error::OutOfRange {
                field: "byte address",
                value: self.byte_address.to_string(),
            });
        }
        dst.put_u8(VAR_SPEC_TYPE);
        dst.put_u8(VAR_SPEC_LEN);
        dst.put_u8(SYNTAX_ID_S7ANY);
        dst.put_u8(self.transport_size as u8);
        dst.put_u16(self.count);
        dst.put_u16(self.db_number);
        dst.put_u8(self.area as u8);
        let address = self.address_field();
        dst.put_u8((address >> 16) as u8);
        dst.put_u8((address >> 8) as u8);
        dst.put_u8(address as u8);
        Ok(())
    }
}

/// One entry of a WriteVar request: target and encoded data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S7WriteItem {
    pub spec: S7VarSpec,
    pub data: Bytes,
}

impl S7WriteItem {
    /// Tag used in the data item header
    #[inline]
    pub fn data_type(&self) -> S7DataVariableType {
        match self.spec.transport_size {
            S7TransportSize::Bit => S7DataVariableType::Bit,
            S7TransportSize::Byte => S7DataVariableType::ByteWordDWord,
            S7TransportSize::Timer | S7TransportSize::Counter => S7DataVariableType::OctetString,
        }
    }

    /// Data item length on the wire without the trailing fill byte
    #[inline]
    pub fn data_item_len(&self) -> usize {
        4 + self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_spec_uses_bit_address() {
        let spec = S7VarSpec {
            transport_size: S7TransportSize::Byte,
            count: 4,
            db_number: 1,
            area: S7Area::DataBlock,
            byte_address: 0x1F_FFFF,
            bit_index: 0,
        };
        let raw = spec.to_bytes(&()).unwrap();
        assert_eq!(
            raw.as_ref(),
            &[0x12, 0x0A, 0x10, 0x02, 0x00, 0x04, 0x00, 0x01, 0x84, 0xFF, 0xFF, 0xF8]
        );
        let (rest, parsed) = S7VarSpec::parse(&raw).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, spec);
    }

    #[test]
    fn timer_spec_uses_element_index() {
        let spec = S7VarSpec {
            transport_size: S7TransportSize::Timer,
            count: 2,
            db_number: 0,
            area: S7Area::Timer,
            byte_address: 5,
            bit_index: 0,
        };
        assert_eq!(spec.address_field(), 5);
        let raw = spec.to_bytes(&()).unwrap();
        assert_eq!(&raw[8..], &[0x1D, 0x00, 0x00, 0x05]);
    }

    #[test]
    fn address_beyond_24_bits_rejected() {
        let spec = S7VarSpec {
            transport_size: S7TransportSize::Bit,
            count: 1,
            db_number: 0,
            area: S7Area::Memory,
            byte_address: MAX_BYTE_ADDRESS + 1,
            bit_index: 3,
        };
        assert!(matches!(
            spec.to_bytes(&()),
            Err(Error::OutOfRange { .. })
        ));
    }
}
