use std::convert::TryFrom;
use std::rc::Rc;

use gimli::{DebugInfo, DebugInfoOffset, DebugTypes, DebugTypesOffset, Format, UnitType};

use crate::abbrev::Abbreviations;
use crate::file::{DEBUG_INFO, DEBUG_TYPES};
use crate::reader::Endian;
use crate::{Error, Result};

/// The kind of a unit, from the DWARF 5 unit type or the section it is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Compile,
    Partial,
    Type,
    Skeleton,
    SplitCompile,
    SplitType,
}

impl UnitKind {
    /// Returns true for units with a type signature.
    pub fn is_type(self) -> bool {
        self == UnitKind::Type || self == UnitKind::SplitType
    }
}

/// The encoding parameters that are needed to decode attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Encoding {
    pub version: u16,
    pub address_size: u8,
    pub offset_size: u8,
}

/// The header of a unit in `.debug_info` or `.debug_types`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitHeader {
    pub(crate) offset: u64,
    pub(crate) unit_length: u64,
    pub(crate) header_size: u64,
    pub(crate) version: u16,
    pub(crate) abbrev_offset: u64,
    pub(crate) address_size: u8,
    pub(crate) offset_size: u8,
    pub(crate) extension_size: u8,
    pub(crate) signature: Option<u64>,
    pub(crate) type_offset: Option<u64>,
    pub(crate) dwo_id: Option<u64>,
    pub(crate) kind: UnitKind,
    pub(crate) is_info: bool,
}

impl UnitHeader {
    /// Parse the header of the unit at `offset` with gimli.
    ///
    /// `split` selects the split unit kinds for versions before 5, which
    /// have no unit type field.
    pub(crate) fn parse(
        data: &[u8],
        endian: Endian,
        offset: u64,
        is_info: bool,
        split: bool,
    ) -> Result<UnitHeader> {
        let section = if is_info { DEBUG_INFO } else { DEBUG_TYPES };
        let malformed = |message: String| Error::malformed(section, offset, message);
        let index = usize::try_from(offset)
            .map_err(|_| malformed("offset does not fit in memory".to_string()))?;
        let header = if is_info {
            DebugInfo::new(data, endian).header_from_offset(DebugInfoOffset(index))
        } else {
            DebugTypes::new(data, endian).header_from_offset(DebugTypesOffset(index))
        }
        .map_err(|e| malformed(format!("{}", e)))?;

        let version = header.version();
        if !is_info && version != 4 {
            return Err(malformed(format!("unsupported type unit version {}", version)));
        }
        let address_size = header.address_size();
        match address_size {
            1 | 2 | 4 | 8 => {}
            _ => {
                return Err(malformed(format!("unsupported address size {}", address_size)));
            }
        }
        let (offset_size, extension_size) = match header.format() {
            Format::Dwarf32 => (4, 0),
            Format::Dwarf64 => (8, 4),
        };

        // Before version 5 the kind of a split unit comes from the object.
        let split = split && version < 5;
        let mut signature = None;
        let mut type_offset = None;
        let mut dwo_id = None;
        let kind = match header.type_() {
            UnitType::Compilation if split => UnitKind::SplitCompile,
            UnitType::Compilation => UnitKind::Compile,
            UnitType::Partial => UnitKind::Partial,
            UnitType::Type {
                type_signature,
                type_offset: die_offset,
            } => {
                signature = Some(type_signature.0);
                type_offset = Some(die_offset.0 as u64);
                if split {
                    UnitKind::SplitType
                } else {
                    UnitKind::Type
                }
            }
            UnitType::SplitType {
                type_signature,
                type_offset: die_offset,
            } => {
                signature = Some(type_signature.0);
                type_offset = Some(die_offset.0 as u64);
                UnitKind::SplitType
            }
            UnitType::Skeleton(id) => {
                dwo_id = Some(id.0);
                UnitKind::Skeleton
            }
            UnitType::SplitCompilation(id) => {
                dwo_id = Some(id.0);
                UnitKind::SplitCompile
            }
        };

        Ok(UnitHeader {
            offset,
            unit_length: header.unit_length() as u64,
            header_size: header.size_of_header() as u64,
            version,
            abbrev_offset: header.debug_abbrev_offset().0 as u64,
            address_size,
            offset_size,
            extension_size,
            signature,
            type_offset,
            dwo_id,
            kind,
            is_info,
        })
    }

    /// The section offset of the unit header.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The value of the initial length field.
    #[inline]
    pub fn unit_length(&self) -> u64 {
        self.unit_length
    }

    /// The size of the header, including the initial length field.
    #[inline]
    pub fn header_size(&self) -> u64 {
        self.header_size
    }

    #[inline]
    pub fn version(&self) -> u16 {
        self.version
    }

    #[inline]
    pub fn abbrev_offset(&self) -> u64 {
        self.abbrev_offset
    }

    #[inline]
    pub fn address_size(&self) -> u8 {
        self.address_size
    }

    /// 4 for 32-bit DWARF, 8 for 64-bit DWARF.
    #[inline]
    pub fn offset_size(&self) -> u8 {
        self.offset_size
    }

    /// 4 when the 64-bit initial length escape is used, 0 otherwise.
    #[inline]
    pub fn extension_size(&self) -> u8 {
        self.extension_size
    }

    /// The type signature of a type unit.
    #[inline]
    pub fn signature(&self) -> Option<u64> {
        self.signature
    }

    /// The unit-relative offset of the type DIE of a type unit.
    #[inline]
    pub fn type_offset(&self) -> Option<u64> {
        self.type_offset
    }

    /// The DWARF 5 split unit id of a skeleton or split compilation unit.
    #[inline]
    pub fn dwo_id(&self) -> Option<u64> {
        self.dwo_id
    }

    #[inline]
    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    /// Returns true if the unit is in `.debug_info`, false for `.debug_types`.
    #[inline]
    pub fn is_info(&self) -> bool {
        self.is_info
    }

    /// The section offset following the unit.
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.extension_size) + u64::from(self.offset_size)
            + self.unit_length
    }

    /// The section offset of the root DIE.
    #[inline]
    pub fn first_die_offset(&self) -> u64 {
        self.offset + self.header_size
    }

    /// Returns true if the section offset is within the DIEs of this unit.
    #[inline]
    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.first_die_offset() && offset < self.end()
    }

    #[inline]
    pub(crate) fn format(&self) -> Format {
        if self.offset_size == 8 {
            Format::Dwarf64
        } else {
            Format::Dwarf32
        }
    }

    #[inline]
    pub fn encoding(&self) -> Encoding {
        Encoding {
            version: self.version,
            address_size: self.address_size,
            offset_size: self.offset_size,
        }
    }
}

/// Per-unit state needed to decode attribute values.
///
/// The bases are read from the root DIE. For split units without their
/// own bases, the skeleton unit in the tied session provides them.
#[derive(Debug)]
pub(crate) struct UnitContext {
    pub header: UnitHeader,
    pub abbrevs: Rc<Abbreviations>,
    pub dwo_id: Option<u64>,
    pub str_offsets_base: u64,
    pub addr_base: Option<u64>,
    pub rnglists_base: Option<u64>,
    pub loclists_base: Option<u64>,
    pub low_pc: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(data: &[u8], is_info: bool) -> Result<UnitHeader> {
        UnitHeader::parse(data, Endian::Little, 0, is_info, false)
    }

    #[test]
    fn version4() {
        let data = [7, 0, 0, 0, 4, 0, 0x10, 0, 0, 0, 8];
        let unit = header(&data, true).unwrap();
        assert_eq!(unit.version(), 4);
        assert_eq!(unit.abbrev_offset(), 0x10);
        assert_eq!(unit.address_size(), 8);
        assert_eq!(unit.offset_size(), 4);
        assert_eq!(unit.extension_size(), 0);
        assert_eq!(unit.header_size(), 11);
        assert_eq!(unit.end(), 11);
        assert_eq!(unit.kind(), UnitKind::Compile);
        assert_eq!(header(&data, true).unwrap(), unit);
    }

    #[test]
    fn version5_type_unit() {
        let mut data = vec![0, 0, 0, 0, 5, 0, 2, 4, 0, 0, 0, 0];
        data.extend_from_slice(&0x1122_3344_5566_7788u64.to_le_bytes());
        data.extend_from_slice(&[0x18, 0, 0, 0]);
        data.extend_from_slice(&[1, 0]);
        let len = data.len() as u8 - 4;
        data[0] = len;
        let unit = header(&data, true).unwrap();
        assert_eq!(unit.kind(), UnitKind::Type);
        assert_eq!(unit.address_size(), 4);
        assert_eq!(unit.signature(), Some(0x1122_3344_5566_7788));
        assert_eq!(unit.type_offset(), Some(0x18));
        assert_eq!(unit.header_size(), 24);
    }

    #[test]
    fn version64() {
        let mut data = vec![0xff, 0xff, 0xff, 0xff, 12, 0, 0, 0, 0, 0, 0, 0, 3, 0];
        data.extend_from_slice(&[0; 8]);
        data.push(4);
        data.push(0);
        let unit = header(&data, true).unwrap();
        assert_eq!(unit.offset_size(), 8);
        assert_eq!(unit.extension_size(), 4);
        assert_eq!(unit.header_size(), 23);
        assert_eq!(unit.end(), 24);
    }

    #[test]
    fn malformed() {
        // Length past the end of the section.
        let data = [0x20, 0, 0, 0, 4, 0, 0, 0, 0, 0, 8];
        assert!(header(&data, true).is_err());
        // Version 6.
        let data = [7, 0, 0, 0, 6, 0, 0, 0, 0, 0, 8];
        match header(&data, true) {
            Err(Error::Malformed {
                section, offset, ..
            }) => {
                assert_eq!(section, DEBUG_INFO);
                assert_eq!(offset, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
        // Address size 3.
        let data = [7, 0, 0, 0, 4, 0, 0, 0, 0, 0, 3];
        assert!(header(&data, true).is_err());
    }
}
