use super::{
    super::error::{Error, Result},
    CpuType,
};
use std::{result::Result as StdResult, str::FromStr};

/// Transport service access point as (high byte, low byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tsap(pub u8, pub u8);

impl From<Tsap> for u16 {
    #[inline]
    fn from(tsap: Tsap) -> Self {
        ((tsap.0 as u16) << 8) | (tsap.1 as u16)
    }
}

impl From<u16> for Tsap {
    #[inline]
    fn from(v: u16) -> Self {
        Tsap((v >> 8) as u8, v as u8)
    }
}

impl FromStr for Tsap {
    type Err = Error;

    /// Accepts "HH:LL" hex bytes ("03:01"), "0xHHLL" ("0x0301") or a decimal u16 ("769").
    fn from_str(value: &str) -> StdResult<Self, Self::Err> {
        let s = value.trim();
        let invalid = || Error::InvalidConfiguration("tsap");
        if let Some((h, l)) = s.split_once(':') {
            let byte = |v: &str| {
                let v = v.trim();
                let v = v
                    .strip_prefix("0x")
                    .or_else(|| v.strip_prefix("0X"))
                    .unwrap_or(v);
                u8::from_str_radix(v, 16).map_err(|_| invalid())
            };
            return Ok(Tsap(byte(h)?, byte(l)?));
        }
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return u16::from_str_radix(hex, 16)
                .map(Tsap::from)
                .map_err(|_| invalid());
        }
        s.parse::<u16>().map(Tsap::from).map_err(|_| invalid())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsapPair {
    pub local: Tsap,
    pub remote: Tsap,
}

impl FromStr for TsapPair {
    type Err = Error;

    /// "local/remote", each side in any form `Tsap` accepts.
    fn from_str(value: &str) -> StdResult<Self, Self::Err> {
        let (l, r) = value
            .split_once('/')
            .ok_or(Error::InvalidConfiguration("tsap pair"))?;
        Ok(TsapPair {
            local: l.parse()?,
            remote: r.parse()?,
        })
    }
}

#[inline]
pub fn validate_rack_slot(rack: u8, slot: u8) -> Result<()> {
    if rack > 0x0F {
        return Err(Error::InvalidRack(rack));
    }
    if slot > 0x0F {
        return Err(Error::InvalidSlot(slot));
    }
    Ok(())
}

/// TSAP pair a CPU family expects for PG-style communication at rack/slot.
pub fn default_tsap_pair(cpu: CpuType, rack: u8, slot: u8) -> Result<TsapPair> {
    validate_rack_slot(rack, slot)?;

    let pair = match cpu {
        CpuType::S7200 => TsapPair {
            local: Tsap(0x10, 0x00),
            remote: Tsap(0x10, 0x01),
        },
        CpuType::Logo0BA8 => TsapPair {
            local: Tsap(0x01, 0x00),
            remote: Tsap(0x01, 0x02),
        },
        CpuType::S7200Smart
        | CpuType::S7300
        | CpuType::S7400
        | CpuType::S71200
        | CpuType::S71500 => TsapPair {
            local: Tsap(0x01, 0x00),
            remote: Tsap(0x03, (rack << 5) | slot),
        },
    };

    Ok(pair)
}
