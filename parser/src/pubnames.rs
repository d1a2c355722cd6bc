use std::borrow::Cow;

use crate::file::{DEBUG_PUBNAMES, DEBUG_PUBTYPES};
use crate::reader::Cursor;
use crate::session::Session;
use crate::{Error, Result};

/// The header of one set of global names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalHeader {
    /// The section offset of the header.
    pub pub_header_offset: u64,
    pub offset_size: u8,
    pub unit_length: u64,
    pub version: u16,
    /// The `.debug_info` offset of the unit described by the set.
    pub info_offset: u64,
    /// The size of the unit described by the set.
    pub info_length: u64,
}

/// A name from `.debug_pubnames` or `.debug_pubtypes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global<'input> {
    pub name: Cow<'input, str>,
    /// The `.debug_info` offset of the entry.
    pub die_offset: u64,
    /// The `.debug_info` offset of the unit containing the entry.
    pub cu_offset: u64,
    pub header: GlobalHeader,
}

impl<'input> Session<'input> {
    /// The names in `.debug_pubnames`, or `None` if the section does not exist.
    pub fn pubnames(&self) -> Result<Option<Vec<Global<'input>>>> {
        self.globals(DEBUG_PUBNAMES)
    }

    /// The names in `.debug_pubtypes`, or `None` if the section does not exist.
    pub fn pubtypes(&self) -> Result<Option<Vec<Global<'input>>>> {
        self.globals(DEBUG_PUBTYPES)
    }

    fn globals(&self, section: &'static str) -> Result<Option<Vec<Global<'input>>>> {
        let data = match self.sections().section(section) {
            Some(data) => data,
            None => return Ok(None),
        };
        let mut r = Cursor::new(section, data, self.endian(), 0)?;
        let mut globals = Vec::new();
        while !r.is_empty() {
            let pub_header_offset = r.offset();
            let length = r.initial_length()?;
            let end = match pub_header_offset
                .checked_add(length.field_size())
                .and_then(|x| x.checked_add(length.length))
            {
                Some(end) if end <= data.len() as u64 => end,
                _ => {
                    return Err(Error::malformed(
                        section,
                        pub_header_offset,
                        format!("set length 0x{:x} exceeds the section", length.length),
                    ));
                }
            };
            let version = r.u16()?;
            if version != 2 {
                return Err(Error::malformed(
                    section,
                    pub_header_offset,
                    format!("unsupported version {}", version),
                ));
            }
            let header = GlobalHeader {
                pub_header_offset,
                offset_size: length.offset_size,
                unit_length: length.length,
                version,
                info_offset: r.offset_sized(length.offset_size)?,
                info_length: r.offset_sized(length.offset_size)?,
            };
            while r.offset() < end {
                let offset = r.offset_sized(length.offset_size)?;
                if offset == 0 {
                    break;
                }
                let name = r.cstr()?;
                globals.push(Global {
                    name: String::from_utf8_lossy(name),
                    die_offset: header.info_offset + offset,
                    cu_offset: header.info_offset,
                    header,
                });
            }
            if r.offset() > end {
                return Err(Error::malformed(
                    section,
                    pub_header_offset,
                    "names exceed the set length",
                ));
            }
            // Skip any padding after the terminator.
            let padding = end - r.offset();
            r.skip(padding)?;
        }
        Ok(Some(globals))
    }
}
