use super::{
    error::{Error, Result},
    frame::{S7Area, S7TransportSize, S7VarSpec, MAX_BYTE_ADDRESS},
    value::{S7Value, S7_STRING_MAX_CAPACITY, S7_WSTRING_MAX_CAPACITY},
};
use std::str::FromStr;

/// Semantic type of a `DataItem`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarType {
    Bit,
    Byte,
    Word,
    Int,
    DWord,
    DInt,
    Real,
    LReal,
    /// 8-byte BCD DATE_AND_TIME
    DateTime,
    /// 12-byte DTL
    DateTimeLong,
    /// TIME, signed milliseconds
    TimeSpan,
    /// Fixed-length Latin-1 characters, `count` bytes
    String,
    /// STRING with capacity `count`
    S7String,
    /// WSTRING with capacity `count`
    S7WString,
    /// S5TIME
    Timer,
    /// BCD counter value
    Counter,
}

impl VarType {
    /// Wire size of a single element, `None` for packed bits and sized strings.
    #[inline]
    pub fn element_size(self) -> Option<usize> {
        match self {
            VarType::Byte => Some(1),
            VarType::Word | VarType::Int | VarType::Timer | VarType::Counter => Some(2),
            VarType::DWord | VarType::DInt | VarType::Real | VarType::TimeSpan => Some(4),
            VarType::LReal | VarType::DateTime => Some(8),
            VarType::DateTimeLong => Some(12),
            VarType::Bit | VarType::String | VarType::S7String | VarType::S7WString => None,
        }
    }

    #[inline]
    pub fn is_string(self) -> bool {
        matches!(self, VarType::String | VarType::S7String | VarType::S7WString)
    }
}

/// Bytes occupied by `count` elements of `var_type`.
///
/// For the string types `count` is the reserved capacity in characters.
pub fn byte_length(var_type: VarType, count: u16) -> usize {
    let count = count as usize;
    match var_type {
        VarType::Bit if count <= 1 => 1,
        VarType::Bit => count.div_ceil(8),
        VarType::String => count,
        VarType::S7String => count + 2,
        VarType::S7WString => count * 2 + 4,
        other => other.element_size().unwrap_or(1) * count,
    }
}

/// One addressable PLC value to read or write.
#[derive(Debug, Clone, PartialEq)]
pub struct DataItem {
    pub area: S7Area,
    /// Only meaningful for `S7Area::DataBlock`
    pub db_number: u16,
    /// Byte offset, or timer/counter number
    pub start_byte: u32,
    /// 0..=7, only meaningful for single bits
    pub bit_address: u8,
    pub var_type: VarType,
    /// Element count, or capacity for string types
    pub count: u16,
    /// Value to write; ignored on read
    pub value: Option<S7Value>,
}

impl DataItem {
    pub fn new(area: S7Area, db_number: u16, start_byte: u32, var_type: VarType, count: u16) -> Self {
        Self {
            area,
            db_number,
            start_byte,
            bit_address: 0,
            var_type,
            count,
            value: None,
        }
    }

    pub fn bit(area: S7Area, db_number: u16, start_byte: u32, bit_address: u8) -> Self {
        Self {
            bit_address,
            ..Self::new(area, db_number, start_byte, VarType::Bit, 1)
        }
    }

    pub fn with_value(mut self, value: S7Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Same as `byte_length(self.var_type, self.count)`
    #[inline]
    pub fn byte_length(&self) -> usize {
        byte_length(self.var_type, self.count)
    }

    #[inline]
    fn is_single_bit(&self) -> bool {
        self.var_type == VarType::Bit && self.count == 1
    }

    /// Check addressing constraints before the item is put on the wire.
    pub fn validate(&self) -> Result<()> {
        let invalid = |why: &str| Err(Error::ErrInvalidAddress(format!("{why}: {self:?}")));
        if self.count == 0 {
            return invalid("count must be at least 1");
        }
        if self.start_byte > MAX_BYTE_ADDRESS {
            return invalid("start byte beyond 24-bit address range");
        }
        if self.var_type == VarType::Bit {
            if self.bit_address > 7 {
                return invalid("bit address must be 0..=7");
            }
            if self.count > 1 && self.bit_address != 0 {
                return invalid("bit arrays must start at bit 0");
            }
        }
        if self.area == S7Area::DataBlock && self.db_number == 0 {
            return invalid("data block number must be at least 1");
        }
        match (self.area, self.var_type) {
            (S7Area::Timer, VarType::Timer) | (S7Area::Counter, VarType::Counter) => {}
            (S7Area::Timer, _) | (S7Area::Counter, _) => {
                return invalid("timer and counter areas only hold their own type")
            }
            _ => {}
        }
        match self.var_type {
            VarType::S7String if self.count as usize > S7_STRING_MAX_CAPACITY => {
                invalid("string capacity above 254")
            }
            VarType::S7WString if self.count as usize > S7_WSTRING_MAX_CAPACITY => {
                invalid("wide string capacity above 16382")
            }
            _ => Ok(()),
        }
    }

    /// Validate for a write: additionally a value must be present and bit arrays
    /// must cover whole bytes.
    pub fn validate_write(&self) -> Result<()> {
        self.validate()?;
        if self.value.is_none() {
            return Err(Error::ErrInvalidParam("write item without value"));
        }
        if self.var_type == VarType::Bit && self.count > 1 && self.count % 8 != 0 {
            return Err(Error::ErrInvalidAddress(format!(
                "bit array writes must cover whole bytes: {self:?}"
            )));
        }
        Ok(())
    }

    /// Variable specification addressing this item.
    pub fn var_spec(&self) -> Result<S7VarSpec> {
        self.validate()?;
        let db_number = if self.area == S7Area::DataBlock {
            self.db_number
        } else {
            0
        };
        let (transport_size, count, bit_index) = match self.area {
            S7Area::Timer => (S7TransportSize::Timer, self.count, 0),
            S7Area::Counter => (S7TransportSize::Counter, self.count, 0),
            _ if self.is_single_bit() => (S7TransportSize::Bit, 1, self.bit_address),
            _ => {
                let len = self.byte_length();
                let count = u16::try_from(len).map_err(|_| Error::OutOfRange {
                    field: "item length",
                    value: len.to_string(),
                })?;
                (S7TransportSize::Byte, count, 0)
            }
        };
        Ok(S7VarSpec {
            transport_size,
            count,
            db_number,
            area: self.area,
            byte_address: self.start_byte,
            bit_index,
        })
    }
}

/// Parses Siemens notation (German mnemonics accepted):
/// `DB1.DBX0.0`, `DB1.DBB0`, `DB1.DBW2`, `DB1.DBD4`, `I0.0`/`E0.0`, `IB1`, `QW4`/`AW4`,
/// `AD2`, `M10.3`, `MW20`, `T5`, `C3`/`Z3`.
impl FromStr for DataItem {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        let s = input.trim().to_ascii_uppercase();
        let bad = || Error::ErrInvalidAddress(input.to_string());
        if s.is_empty() {
            return Err(bad());
        }

        if let Some(rest) = s.strip_prefix("DB") {
            let (db, tail) = rest.split_once('.').ok_or_else(bad)?;
            let db_number = db.parse::<u16>().map_err(|_| bad())?;
            let tail = tail.strip_prefix("DB").ok_or_else(bad)?;
            let item = parse_sized(S7Area::DataBlock, db_number, tail).ok_or_else(bad)?;
            item.validate()?;
            return Ok(item);
        }

        let mut chars = s.chars();
        let area = match chars.next() {
            Some('I' | 'E') => S7Area::Input,
            Some('Q' | 'A') => S7Area::Output,
            Some('M') => S7Area::Memory,
            Some('T') => S7Area::Timer,
            Some('C' | 'Z') => S7Area::Counter,
            _ => return Err(bad()),
        };
        let tail = chars.as_str();
        let item = match area {
            S7Area::Timer | S7Area::Counter => {
                let number = tail.parse::<u32>().map_err(|_| bad())?;
                let var_type = if area == S7Area::Timer {
                    VarType::Timer
                } else {
                    VarType::Counter
                };
                DataItem::new(area, 0, number, var_type, 1)
            }
            _ => parse_sized(area, 0, tail).ok_or_else(bad)?,
        };
        item.validate()?;
        Ok(item)
    }
}

/// `X<byte>.<bit>`, `<byte>.<bit>`, `B<byte>`, `W<byte>` or `D<byte>`
fn parse_sized(area: S7Area, db_number: u16, tail: &str) -> Option<DataItem> {
    let (var_type, rest) = match tail.chars().next()? {
        'X' => (VarType::Bit, &tail[1..]),
        'B' => (VarType::Byte, &tail[1..]),
        'W' => (VarType::Word, &tail[1..]),
        'D' => (VarType::DWord, &tail[1..]),
        c if c.is_ascii_digit() => (VarType::Bit, tail),
        _ => return None,
    };
    if var_type == VarType::Bit {
        let (byte, bit) = rest.split_once('.')?;
        return Some(DataItem::bit(
            area,
            db_number,
            byte.parse().ok()?,
            bit.parse().ok()?,
        ));
    }
    let start = rest.parse::<u32>().ok()?;
    Some(DataItem::new(area, db_number, start, var_type, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_length_of_scalars_and_arrays() {
        for (vt, size) in [
            (VarType::Byte, 1),
            (VarType::Int, 2),
            (VarType::Word, 2),
            (VarType::DInt, 4),
            (VarType::Real, 4),
            (VarType::TimeSpan, 4),
            (VarType::LReal, 8),
            (VarType::DateTime, 8),
            (VarType::DateTimeLong, 12),
        ] {
            assert_eq!(byte_length(vt, 1), size);
            assert_eq!(byte_length(vt, 7), size * 7);
        }
        assert_eq!(byte_length(VarType::Bit, 1), 1);
        assert_eq!(byte_length(VarType::Bit, 9), 2);
        assert_eq!(byte_length(VarType::S7String, 20), 22);
        assert_eq!(byte_length(VarType::S7WString, 10), 24);
        assert_eq!(byte_length(VarType::String, 5), 5);
    }

    #[test]
    fn parses_data_block_addresses() {
        let item: DataItem = "DB1.DBX0.0".parse().unwrap();
        assert_eq!(item, DataItem::bit(S7Area::DataBlock, 1, 0, 0));
        let item: DataItem = "db1.dbw2".parse().unwrap();
        assert_eq!(item.var_type, VarType::Word);
        assert_eq!(item.start_byte, 2);
        let item: DataItem = "DB10.DBD4".parse().unwrap();
        assert_eq!((item.db_number, item.var_type), (10, VarType::DWord));
        assert!("DB1.DBX0.8".parse::<DataItem>().is_err());
        assert!("DB0.DBB0".parse::<DataItem>().is_err());
        assert!("DB1.DBQ0".parse::<DataItem>().is_err());
    }

    #[test]
    fn parses_short_areas() {
        assert_eq!(
            "E0.3".parse::<DataItem>().unwrap(),
            DataItem::bit(S7Area::Input, 0, 0, 3)
        );
        let item: DataItem = "AD2".parse().unwrap();
        assert_eq!((item.area, item.var_type), (S7Area::Output, VarType::DWord));
        let item: DataItem = "MW20".parse().unwrap();
        assert_eq!((item.area, item.start_byte), (S7Area::Memory, 20));
        let item: DataItem = "Z3".parse().unwrap();
        assert_eq!((item.area, item.var_type), (S7Area::Counter, VarType::Counter));
        let item: DataItem = "T5".parse().unwrap();
        assert_eq!((item.area, item.start_byte), (S7Area::Timer, 5));
    }

    #[test]
    fn var_spec_derivation() {
        let spec = DataItem::bit(S7Area::DataBlock, 1, 3, 5).var_spec().unwrap();
        assert_eq!(spec.transport_size, S7TransportSize::Bit);
        assert_eq!(spec.address_field(), 29);

        let spec = DataItem::new(S7Area::Memory, 9, 10, VarType::Real, 3)
            .var_spec()
            .unwrap();
        assert_eq!((spec.transport_size, spec.count, spec.db_number), (S7TransportSize::Byte, 12, 0));

        let spec = DataItem::new(S7Area::Counter, 0, 4, VarType::Counter, 2)
            .var_spec()
            .unwrap();
        assert_eq!((spec.transport_size, spec.count), (S7TransportSize::Counter, 2));

        let spec = DataItem::new(S7Area::DataBlock, 1, 0, VarType::Bit, 16)
            .var_spec()
            .unwrap();
        assert_eq!((spec.transport_size, spec.count), (S7TransportSize::Byte, 2));
    }

    #[test]
    fn invalid_items() {
        let mut item = DataItem::bit(S7Area::Memory, 0, 0, 8);
        assert!(item.validate().is_err());
        item.bit_address = 1;
        item.count = 8;
        assert!(item.validate().is_err());
        assert!(DataItem::new(S7Area::Timer, 0, 0, VarType::Word, 1)
            .validate()
            .is_err());
        assert!(DataItem::new(S7Area::DataBlock, 1, 0, VarType::S7String, 255)
            .validate()
            .is_err());
        let bits = DataItem::new(S7Area::DataBlock, 1, 0, VarType::Bit, 4)
            .with_value(S7Value::Bits(vec![true; 4]));
        assert!(bits.validate().is_ok());
        assert!(bits.validate_write().is_err());
    }
}
