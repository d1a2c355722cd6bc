use std::convert::TryFrom;
use std::fmt;

use gimli::{Endianity as _, Reader as _};

use crate::{Error, Result};

pub(crate) type Endian = gimli::RunTimeEndian;
type Slice<'input> = gimli::EndianSlice<'input, Endian>;

/// The decoded initial length field of a unit or table header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InitialLength {
    pub length: u64,
    pub offset_size: u8,
    pub extension_size: u8,
}

impl InitialLength {
    /// The number of bytes used by the length field itself.
    #[inline]
    pub fn field_size(self) -> u64 {
        u64::from(self.extension_size) + u64::from(self.offset_size)
    }
}

/// A read position within a named section.
///
/// Every read error is reported with the section name and the offset
/// at which the read started.
#[derive(Clone, Copy)]
pub(crate) struct Cursor<'input> {
    section: &'static str,
    start: Slice<'input>,
    reader: Slice<'input>,
}

impl<'input> fmt::Debug for Cursor<'input> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Cursor({} 0x{:x})", self.section, self.offset())
    }
}

impl<'input> Cursor<'input> {
    pub fn new(
        section: &'static str,
        data: &'input [u8],
        endian: Endian,
        offset: u64,
    ) -> Result<Self> {
        let index = match usize::try_from(offset) {
            Ok(index) if index <= data.len() => index,
            _ => {
                return Err(Error::malformed(
                    section,
                    offset,
                    "offset is beyond the end of the section",
                ))
            }
        };
        Ok(Cursor {
            section,
            start: Slice::new(data, endian),
            reader: Slice::new(&data[index..], endian),
        })
    }

    #[inline]
    pub fn section(&self) -> &'static str {
        self.section
    }

    #[inline]
    pub fn endian(&self) -> Endian {
        self.start.endian()
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.reader.offset_from(self.start) as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.reader.is_empty()
    }

    /// An error for data found at the current position.
    pub fn error<M>(&self, message: M) -> Error
    where
        M: Into<std::borrow::Cow<'static, str>>,
    {
        Error::malformed(self.section, self.offset(), message)
    }

    fn read<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Slice<'input>) -> gimli::Result<T>,
    {
        let offset = self.offset();
        let section = self.section;
        f(&mut self.reader).map_err(|e| Error::malformed(section, offset, format!("{}", e)))
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.read(|r| r.read_u8())
    }

    pub fn u16(&mut self) -> Result<u16> {
        self.read(|r| r.read_u16())
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.read(|r| r.read_u32())
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.read(|r| r.read_u64())
    }

    pub fn uleb128(&mut self) -> Result<u64> {
        self.read(|r| r.read_uleb128())
    }

    pub fn sleb128(&mut self) -> Result<i64> {
        self.read(|r| r.read_sleb128())
    }

    /// Read an unsigned value of 1, 2, 3, 4 or 8 bytes.
    pub fn uint(&mut self, size: u8) -> Result<u64> {
        match size {
            1 => self.u8().map(u64::from),
            2 => self.u16().map(u64::from),
            3 => {
                let bytes = self.bytes(3)?;
                let (b0, b1, b2) = (
                    u64::from(bytes[0]),
                    u64::from(bytes[1]),
                    u64::from(bytes[2]),
                );
                if self.endian().is_big_endian() {
                    Ok(b0 << 16 | b1 << 8 | b2)
                } else {
                    Ok(b2 << 16 | b1 << 8 | b0)
                }
            }
            4 => self.u32().map(u64::from),
            8 => self.u64(),
            _ => Err(self.error(format!("unsupported value size {}", size))),
        }
    }

    /// Read a section offset of the given size (4 or 8).
    pub fn offset_sized(&mut self, offset_size: u8) -> Result<u64> {
        match offset_size {
            4 | 8 => self.uint(offset_size),
            _ => Err(self.error(format!("unsupported offset size {}", offset_size))),
        }
    }

    pub fn address(&mut self, address_size: u8) -> Result<u64> {
        self.read(|r| r.read_address(address_size))
    }

    /// Read an initial length field, which selects 32-bit or 64-bit DWARF.
    pub fn initial_length(&mut self) -> Result<InitialLength> {
        let value = self.u32()?;
        if value == 0xffff_ffff {
            Ok(InitialLength {
                length: self.u64()?,
                offset_size: 8,
                extension_size: 4,
            })
        } else if value >= 0xffff_fff0 {
            Err(Error::malformed(
                self.section,
                self.offset() - 4,
                format!("reserved initial length value 0x{:x}", value),
            ))
        } else {
            Ok(InitialLength {
                length: u64::from(value),
                offset_size: 4,
                extension_size: 0,
            })
        }
    }

    pub fn bytes(&mut self, len: u64) -> Result<&'input [u8]> {
        let len = match usize::try_from(len) {
            Ok(len) => len,
            Err(_) => return Err(self.error("length does not fit in memory")),
        };
        self.read(|r| r.split(len)).map(|s| s.slice())
    }

    /// Read a null terminated string, not including the terminator.
    pub fn cstr(&mut self) -> Result<&'input [u8]> {
        self.read(|r| r.read_null_terminated_slice())
            .map(|s| s.slice())
    }

    pub fn skip(&mut self, len: u64) -> Result<()> {
        self.bytes(len).map(|_| ())
    }
}
