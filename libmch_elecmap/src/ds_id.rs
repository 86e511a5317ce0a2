// Identifiers of a dual sampa, seen from both sides of the map:
//
// electronics: (solar, group, elink index) packed in 16 bits -> AddressCode
// detector:    (detection element, dual sampa) packed in 32 bits -> ChannelCode
//
// The bit layouts are consumed as-is by the readout decoders, so they must never change.
use std::fmt;
use std::str::FromStr;

use super::constants::*;
use super::error::{CodecError, DsIdError};

/// Packed electronics address of a dual sampa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AddressCode(u16);

impl AddressCode {
    pub fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

/// Packed (detection element, dual sampa) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelCode(u32);

impl ChannelCode {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

fn check_range(field: &'static str, value: u32, max: u32) -> Result<(), CodecError> {
    if value > max {
        Err(CodecError::OutOfRange { field, value, max })
    } else {
        Ok(())
    }
}

/// Pack an electronics address into its 16-bit code.
///
/// Fails if any of the fields would be truncated by its bit width.
pub fn encode_address(
    solar_id: u32,
    group_id: u32,
    elink_index: u32,
) -> Result<AddressCode, CodecError> {
    check_range("solar_id", solar_id, MAX_SOLAR_ID)?;
    check_range("group_id", group_id, MAX_GROUP_ID)?;
    check_range("elink_index", elink_index, MAX_ELINK_INDEX)?;
    Ok(AddressCode(
        (solar_id as u16)
            | ((group_id as u16) << GROUP_ID_SHIFT)
            | ((elink_index as u16) << ELINK_INDEX_SHIFT),
    ))
}

/// Unpack an electronics address. Every 16-bit value is a valid code.
pub fn decode_address(code: AddressCode) -> DsElecId {
    DsElecId {
        solar_id: code.0 & SOLAR_ID_MASK,
        group_id: ((code.0 & GROUP_ID_MASK) >> GROUP_ID_SHIFT) as u8,
        elink_index: ((code.0 & ELINK_INDEX_MASK) >> ELINK_INDEX_SHIFT) as u8,
    }
}

/// Pack a (detection element, dual sampa) pair into its 32-bit code.
pub fn encode_channel(de_id: u32, ds_id: u32) -> Result<ChannelCode, CodecError> {
    check_range("de_id", de_id, MAX_DE_ID)?;
    check_range("ds_id", ds_id, MAX_DS_ID)?;
    Ok(ChannelCode((de_id << DE_ID_SHIFT) | ds_id))
}

/// Unpack a channel code. Every 32-bit value is a valid code.
pub fn decode_channel(code: ChannelCode) -> DsDetId {
    DsDetId {
        de_id: (code.0 >> DE_ID_SHIFT) as u16,
        ds_id: (code.0 & DS_ID_MASK) as u16,
    }
}

/// DsElecId locates a dual sampa in the readout electronics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DsElecId {
    solar_id: u16,
    group_id: u8,
    elink_index: u8,
}

impl DsElecId {
    pub fn new(solar_id: u32, group_id: u32, elink_index: u32) -> Result<Self, CodecError> {
        Ok(decode_address(encode_address(
            solar_id,
            group_id,
            elink_index,
        )?))
    }

    pub fn solar_id(&self) -> u16 {
        self.solar_id
    }

    pub fn group_id(&self) -> u8 {
        self.group_id
    }

    pub fn elink_index(&self) -> u8 {
        self.elink_index
    }

    /// Elink number within the SOLAR board, counting 5 elinks per group
    pub fn elink_id(&self) -> u8 {
        self.group_id * DUAL_SAMPAS_PER_GROUP as u8 + self.elink_index
    }

    pub fn code(&self) -> AddressCode {
        AddressCode(
            self.solar_id
                | ((self.group_id as u16) << GROUP_ID_SHIFT)
                | ((self.elink_index as u16) << ELINK_INDEX_SHIFT),
        )
    }
}

impl fmt::Display for DsElecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "S{}-J{}-DS{}",
            self.solar_id, self.group_id, self.elink_index
        )
    }
}

/// Parse the `S<solar>-J<group>-DS<index>` form. Anything after the third component is ignored.
impl FromStr for DsElecId {
    type Err = DsIdError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('-');
        let solar = prefixed_number(s, parts.next(), "S")?;
        let group = prefixed_number(s, parts.next(), "J")?;
        let index = prefixed_number(s, parts.next(), "DS")?;
        Ok(Self::new(solar, group, index)?)
    }
}

fn prefixed_number(whole: &str, part: Option<&str>, prefix: &str) -> Result<u32, DsIdError> {
    let part = part.ok_or(DsIdError::BadString(whole.to_string(), "too few components"))?;
    let digits = part
        .strip_prefix(prefix)
        .ok_or(DsIdError::BadString(whole.to_string(), "unexpected prefix"))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DsIdError::BadString(whole.to_string(), "expected a number"));
    }
    digits
        .parse()
        .map_err(|_| DsIdError::BadString(whole.to_string(), "number too large"))
}

/// Group of an elink id, if the elink id exists on a SOLAR board
pub fn group_from_elink_id(elink_id: u8) -> Option<u8> {
    if elink_id < ELINKS_PER_SOLAR {
        Some(elink_id / DUAL_SAMPAS_PER_GROUP as u8)
    } else {
        None
    }
}

/// Index within its group of an elink id, if the elink id exists on a SOLAR board
pub fn index_from_elink_id(elink_id: u8) -> Option<u8> {
    if elink_id < ELINKS_PER_SOLAR {
        Some(elink_id % DUAL_SAMPAS_PER_GROUP as u8)
    } else {
        None
    }
}

/// DsDetId locates a dual sampa on the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DsDetId {
    de_id: u16,
    ds_id: u16,
}

impl DsDetId {
    pub fn new(de_id: u32, ds_id: u32) -> Result<Self, CodecError> {
        Ok(decode_channel(encode_channel(de_id, ds_id)?))
    }

    pub fn de_id(&self) -> u16 {
        self.de_id
    }

    pub fn ds_id(&self) -> u16 {
        self.ds_id
    }

    pub fn code(&self) -> ChannelCode {
        ChannelCode(((self.de_id as u32) << DE_ID_SHIFT) | self.ds_id as u32)
    }
}

impl fmt::Display for DsDetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DE{}-DS{}", self.de_id, self.ds_id)
    }
}
