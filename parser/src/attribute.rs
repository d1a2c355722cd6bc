use std::borrow::Cow;
use std::convert::TryFrom;
use std::fmt;

use gimli::constants::*;
use gimli::{DwAt, DwForm};

use crate::abbrev::AttributeSpecification;
use crate::die::Die;
use crate::file::{DEBUG_LINE_STR, DEBUG_STR};
use crate::form::{self, FormClass};
use crate::reader::{Cursor, Endian};
use crate::session::Session;
use crate::unit::Encoding;
use crate::{Error, Result};

/// An attribute of a debugging information entry.
///
/// This refers to the encoded value in the section. The typed accessors
/// decode the value, and fail with `Error::WrongForm` if the form does not
/// belong to the requested class.
#[derive(Clone, Copy)]
pub struct Attribute<'input> {
    die: Die,
    name: DwAt,
    form: DwForm,
    direct_form: DwForm,
    encoding: Encoding,
    implicit_const: Option<i64>,
    value: Cursor<'input>,
    size: u64,
}

impl<'input> fmt::Debug for Attribute<'input> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("die", &self.die.offset())
            .field("name", &self.name)
            .field("form", &self.form)
            .field("offset", &self.offset())
            .field("size", &self.size)
            .finish()
    }
}

/// Decode the attribute described by `spec` at the cursor position, and
/// advance the cursor past it.
pub(crate) fn read_attribute<'input>(
    r: &mut Cursor<'input>,
    die: Die,
    spec: &AttributeSpecification,
    encoding: Encoding,
) -> Result<Attribute<'input>> {
    let direct_form = spec.form();
    let mut form = direct_form;
    while form == DW_FORM_indirect {
        let value = r.uleb128()?;
        if value > u64::from(u16::max_value()) {
            return Err(r.error(format!("invalid indirect form 0x{:x}", value)));
        }
        form = DwForm(value as u16);
    }
    if form == DW_FORM_implicit_const && direct_form != form {
        return Err(r.error("indirect DW_FORM_implicit_const"));
    }
    let value = *r;
    skip_form(r, form, encoding)?;
    Ok(Attribute {
        die,
        name: spec.name(),
        form,
        direct_form,
        encoding,
        implicit_const: spec.implicit_const_value(),
        value,
        size: r.offset() - value.offset(),
    })
}

/// Advance the cursor past a value of the given form.
pub(crate) fn skip_form(r: &mut Cursor, form: DwForm, encoding: Encoding) -> Result<()> {
    let size = match form {
        DW_FORM_addr => u64::from(encoding.address_size),
        DW_FORM_ref_addr => {
            if encoding.version == 2 {
                u64::from(encoding.address_size)
            } else {
                u64::from(encoding.offset_size)
            }
        }
        DW_FORM_strp | DW_FORM_line_strp | DW_FORM_sec_offset | DW_FORM_strp_sup
        | DW_FORM_GNU_strp_alt | DW_FORM_GNU_ref_alt => u64::from(encoding.offset_size),
        DW_FORM_flag_present | DW_FORM_implicit_const => 0,
        DW_FORM_data1 | DW_FORM_ref1 | DW_FORM_flag | DW_FORM_strx1 | DW_FORM_addrx1 => 1,
        DW_FORM_data2 | DW_FORM_ref2 | DW_FORM_strx2 | DW_FORM_addrx2 => 2,
        DW_FORM_strx3 | DW_FORM_addrx3 => 3,
        DW_FORM_data4 | DW_FORM_ref4 | DW_FORM_ref_sup4 | DW_FORM_strx4 | DW_FORM_addrx4 => 4,
        DW_FORM_data8 | DW_FORM_ref8 | DW_FORM_ref_sig8 | DW_FORM_ref_sup8 => 8,
        DW_FORM_data16 => 16,
        DW_FORM_udata | DW_FORM_ref_udata | DW_FORM_strx | DW_FORM_addrx
        | DW_FORM_GNU_str_index | DW_FORM_GNU_addr_index | DW_FORM_loclistx
        | DW_FORM_rnglistx => {
            r.uleb128()?;
            0
        }
        DW_FORM_sdata => {
            r.sleb128()?;
            0
        }
        DW_FORM_string => {
            r.cstr()?;
            0
        }
        DW_FORM_block1 => u64::from(r.u8()?),
        DW_FORM_block2 => u64::from(r.u16()?),
        DW_FORM_block4 => u64::from(r.u32()?),
        DW_FORM_block | DW_FORM_exprloc => r.uleb128()?,
        DW_FORM_indirect => {
            let value = r.uleb128()?;
            if value > u64::from(u16::max_value()) {
                return Err(r.error(format!("invalid indirect form 0x{:x}", value)));
            }
            return skip_form(r, DwForm(value as u16), encoding);
        }
        _ => return Err(r.error(format!("unknown form {}", form))),
    };
    r.skip(size)
}

/// A DWARF expression, located in a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expression<'input> {
    /// The section offset of the first byte of the expression.
    pub offset: u64,
    pub bytes: &'input [u8],
}

impl<'input> Attribute<'input> {
    /// The entry that the attribute belongs to.
    #[inline]
    pub fn die(&self) -> Die {
        self.die
    }

    #[inline]
    pub fn name(&self) -> DwAt {
        self.name
    }

    /// The form of the value, after resolving `DW_FORM_indirect`.
    #[inline]
    pub fn form(&self) -> DwForm {
        self.form
    }

    /// The form given in the abbreviation, which may be `DW_FORM_indirect`.
    #[inline]
    pub fn direct_form(&self) -> DwForm {
        self.direct_form
    }

    #[inline]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// The section offset of the encoded value.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.value.offset()
    }

    /// The encoded bytes of the value.
    pub fn value_bytes(&self) -> &'input [u8] {
        let mut r = self.value;
        r.bytes(self.size).unwrap_or(&[])
    }

    pub fn form_class(&self) -> FormClass {
        form::form_class(
            self.encoding.version,
            self.name,
            self.encoding.offset_size,
            self.form,
        )
    }

    fn wrong_form(&self, expected: FormClass) -> Error {
        Error::WrongForm {
            expected,
            form: self.form,
        }
    }

    pub fn unsigned_constant(&self) -> Result<u64> {
        let mut r = self.value;
        match self.form {
            DW_FORM_data1 => r.uint(1),
            DW_FORM_data2 => r.uint(2),
            DW_FORM_data4 => r.uint(4),
            DW_FORM_data8 => r.uint(8),
            DW_FORM_udata => r.uleb128(),
            DW_FORM_data16 => Err(r.error("16 byte constant does not fit in 64 bits")),
            DW_FORM_sdata | DW_FORM_implicit_const => {
                let value = self.signed_constant()?;
                if value < 0 {
                    Err(format!("negative constant {} for {}", value, self.name).into())
                } else {
                    Ok(value as u64)
                }
            }
            _ => Err(self.wrong_form(FormClass::Constant)),
        }
    }

    /// Decode a constant, sign extending fixed size data forms.
    pub fn signed_constant(&self) -> Result<i64> {
        let mut r = self.value;
        match self.form {
            DW_FORM_data1 => Ok(i64::from(r.u8()? as i8)),
            DW_FORM_data2 => Ok(i64::from(r.u16()? as i16)),
            DW_FORM_data4 => Ok(i64::from(r.u32()? as i32)),
            DW_FORM_data8 => Ok(r.u64()? as i64),
            DW_FORM_sdata => r.sleb128(),
            DW_FORM_udata => {
                let value = r.uleb128()?;
                i64::try_from(value)
                    .map_err(|_| self.value.error(format!("constant 0x{:x} is too large", value)))
            }
            DW_FORM_data16 => Err(r.error("16 byte constant does not fit in 64 bits")),
            DW_FORM_implicit_const => match self.implicit_const {
                Some(value) => Ok(value),
                None => Err(r.error("missing implicit constant")),
            },
            _ => Err(self.wrong_form(FormClass::Constant)),
        }
    }

    pub fn flag(&self) -> Result<bool> {
        let mut r = self.value;
        match self.form {
            DW_FORM_flag => Ok(r.u8()? != 0),
            DW_FORM_flag_present => Ok(true),
            _ => Err(self.wrong_form(FormClass::Flag)),
        }
    }

    pub fn block(&self) -> Result<Expression<'input>> {
        let mut r = self.value;
        let len = match self.form {
            DW_FORM_block1 => u64::from(r.u8()?),
            DW_FORM_block2 => u64::from(r.u16()?),
            DW_FORM_block4 => u64::from(r.u32()?),
            DW_FORM_block => r.uleb128()?,
            _ => return Err(self.wrong_form(FormClass::Block)),
        };
        let offset = r.offset();
        Ok(Expression {
            offset,
            bytes: r.bytes(len)?,
        })
    }

    pub fn exprloc(&self) -> Result<Expression<'input>> {
        let mut r = self.value;
        match self.form {
            DW_FORM_exprloc => {
                let len = r.uleb128()?;
                let offset = r.offset();
                Ok(Expression {
                    offset,
                    bytes: r.bytes(len)?,
                })
            }
            _ => Err(self.wrong_form(FormClass::Exprloc)),
        }
    }

    /// The type signature of a `DW_FORM_ref_sig8` reference.
    pub fn signature(&self) -> Result<u64> {
        let mut r = self.value;
        match self.form {
            DW_FORM_ref_sig8 => r.u64(),
            _ => Err(self.wrong_form(FormClass::Reference)),
        }
    }

    /// A reference relative to the start of the unit header.
    pub fn cu_relative_reference(&self) -> Result<u64> {
        let mut r = self.value;
        match self.form {
            DW_FORM_ref1 => r.uint(1),
            DW_FORM_ref2 => r.uint(2),
            DW_FORM_ref4 => r.uint(4),
            DW_FORM_ref8 => r.uint(8),
            DW_FORM_ref_udata => r.uleb128(),
            _ => Err(self.wrong_form(FormClass::Reference)),
        }
    }

    /// A reference or section offset, as an offset from the start of its
    /// section.
    ///
    /// Unit relative references are converted by adding the offset of the
    /// unit header. `DW_FORM_ref_sup*` and `DW_FORM_GNU_ref_alt` are
    /// offsets in a supplementary object file.
    pub fn global_reference(&self) -> Result<u64> {
        let mut r = self.value;
        match self.form {
            DW_FORM_ref1 | DW_FORM_ref2 | DW_FORM_ref4 | DW_FORM_ref8 | DW_FORM_ref_udata => {
                let offset = self.cu_relative_reference()?;
                Ok(self.die.unit_offset() + offset)
            }
            DW_FORM_ref_addr => {
                if self.encoding.version == 2 {
                    r.address(self.encoding.address_size)
                } else {
                    r.offset_sized(self.encoding.offset_size)
                }
            }
            DW_FORM_ref_sup4 => r.uint(4),
            DW_FORM_ref_sup8 => r.uint(8),
            DW_FORM_GNU_ref_alt | DW_FORM_sec_offset => r.offset_sized(self.encoding.offset_size),
            DW_FORM_data4 | DW_FORM_data8 if self.form_class().is_section_pointer() => {
                r.offset_sized(self.encoding.offset_size)
            }
            _ => Err(self.wrong_form(FormClass::Reference)),
        }
    }

    /// A section offset, from `DW_FORM_sec_offset` or a section pointer
    /// encoded as `DW_FORM_data4` or `DW_FORM_data8`.
    pub fn section_offset(&self) -> Result<u64> {
        let mut r = self.value;
        match self.form {
            DW_FORM_sec_offset => r.offset_sized(self.encoding.offset_size),
            DW_FORM_data4 | DW_FORM_data8 if self.form_class().is_section_pointer() => {
                r.offset_sized(self.encoding.offset_size)
            }
            _ => {
                let expected = form::form_class(
                    self.encoding.version,
                    self.name,
                    self.encoding.offset_size,
                    DW_FORM_sec_offset,
                );
                Err(self.wrong_form(expected))
            }
        }
    }

    /// The index of a string in `.debug_str_offsets`.
    pub fn string_index(&self) -> Result<u64> {
        let mut r = self.value;
        match self.form {
            DW_FORM_strx | DW_FORM_GNU_str_index => r.uleb128(),
            DW_FORM_strx1 => r.uint(1),
            DW_FORM_strx2 => r.uint(2),
            DW_FORM_strx3 => r.uint(3),
            DW_FORM_strx4 => r.uint(4),
            _ => Err(self.wrong_form(FormClass::String)),
        }
    }

    /// The index of an address in `.debug_addr`.
    pub fn address_index(&self) -> Result<u64> {
        let mut r = self.value;
        match self.form {
            DW_FORM_addrx | DW_FORM_GNU_addr_index => r.uleb128(),
            DW_FORM_addrx1 => r.uint(1),
            DW_FORM_addrx2 => r.uint(2),
            DW_FORM_addrx3 => r.uint(3),
            DW_FORM_addrx4 => r.uint(4),
            _ => Err(self.wrong_form(FormClass::Address)),
        }
    }

    /// The index of a list in the offset table of the unit's
    /// `.debug_loclists` or `.debug_rnglists` contribution.
    pub fn list_index(&self) -> Result<u64> {
        let mut r = self.value;
        match self.form {
            DW_FORM_loclistx | DW_FORM_rnglistx => r.uleb128(),
            _ => match self.name {
                DW_AT_ranges | DW_AT_start_scope => Err(self.wrong_form(FormClass::RangeList)),
                _ => Err(self.wrong_form(FormClass::LocList)),
            },
        }
    }

    /// The address of a `DW_FORM_addr` value.
    pub(crate) fn direct_address(&self) -> Result<u64> {
        let mut r = self.value;
        match self.form {
            DW_FORM_addr => r.address(self.encoding.address_size),
            _ => Err(self.wrong_form(FormClass::Address)),
        }
    }

    /// Decode a `DW_AT_discr_list` block.
    pub fn discriminants(&self) -> Result<DiscriminantList<'input>> {
        let block = self.block()?;
        Ok(DiscriminantList {
            offset: block.offset,
            bytes: block.bytes,
            endian: self.value.endian(),
        })
    }
}

/// One entry of a discriminant list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discriminant<T> {
    Label(T),
    Range { low: T, high: T },
}

/// The encoded entries of a `DW_AT_discr_list` attribute.
///
/// The values are LEB128 encoded, and whether they are signed depends on
/// the type of the variant's discriminant, so the caller must choose
/// between `unsigned` and `signed`.
#[derive(Debug, Clone, Copy)]
pub struct DiscriminantList<'input> {
    offset: u64,
    bytes: &'input [u8],
    endian: Endian,
}

impl<'input> DiscriminantList<'input> {
    pub fn unsigned(&self) -> Result<Vec<Discriminant<u64>>> {
        self.read(Cursor::uleb128)
    }

    pub fn signed(&self) -> Result<Vec<Discriminant<i64>>> {
        self.read(Cursor::sleb128)
    }

    fn read<T, F>(&self, value: F) -> Result<Vec<Discriminant<T>>>
    where
        F: Fn(&mut Cursor<'input>) -> Result<T>,
    {
        // Offsets in errors are relative to the start of the block.
        let mut r = Cursor::new("DW_AT_discr_list", self.bytes, self.endian, 0)?;
        let mut list = Vec::new();
        while !r.is_empty() {
            let descriptor = gimli::DwDsc(r.u8()?);
            match descriptor {
                DW_DSC_label => list.push(Discriminant::Label(value(&mut r)?)),
                DW_DSC_range => {
                    let low = value(&mut r)?;
                    let high = value(&mut r)?;
                    list.push(Discriminant::Range { low, high });
                }
                _ => {
                    return Err(Error::malformed(
                        "DW_AT_discr_list",
                        self.offset + r.offset() - 1,
                        format!("invalid discriminant descriptor {}", descriptor),
                    ));
                }
            }
        }
        Ok(list)
    }
}

impl<'input> Session<'input> {
    /// Find an attribute of an entry.
    pub fn attribute(&self, die: Die, at: DwAt) -> Result<Option<Attribute<'input>>> {
        let entry = self.entry(die)?;
        Ok(entry.attributes.into_iter().find(|attr| attr.name == at))
    }

    pub fn has_attribute(&self, die: Die, at: DwAt) -> Result<bool> {
        Ok(self.attribute(die, at)?.is_some())
    }

    /// All attributes of an entry, in abbreviation order.
    pub fn attributes(&self, die: Die) -> Result<Vec<Attribute<'input>>> {
        Ok(self.entry(die)?.attributes)
    }

    /// Decode a string attribute, replacing invalid UTF-8.
    pub fn string(&self, attr: &Attribute<'input>) -> Result<Cow<'input, str>> {
        self.string_bytes(attr).map(String::from_utf8_lossy)
    }

    /// Decode a string attribute, without the null terminator.
    pub fn string_bytes(&self, attr: &Attribute<'input>) -> Result<&'input [u8]> {
        let mut r = attr.value;
        match attr.form {
            DW_FORM_string => r.cstr(),
            DW_FORM_strp => {
                let offset = r.offset_sized(attr.encoding.offset_size)?;
                self.string_at(DEBUG_STR, offset)
            }
            DW_FORM_line_strp => {
                let offset = r.offset_sized(attr.encoding.offset_size)?;
                self.string_at(DEBUG_LINE_STR, offset)
            }
            DW_FORM_strp_sup | DW_FORM_GNU_strp_alt => Err(Error::Unresolvable {
                section: ".debug_sup",
            }),
            _ if form::is_string_index(attr.form) => {
                self.indexed_string(attr.die, attr.string_index()?)
            }
            _ => Err(attr.wrong_form(FormClass::String)),
        }
    }

    /// Decode an address attribute, resolving indexed addresses.
    pub fn address(&self, attr: &Attribute<'input>, tied: Option<&Session<'input>>) -> Result<u64> {
        if form::is_address_index(attr.form) {
            let index = attr.address_index()?;
            self.resolve_indexed_address(tied, attr.die, index)
        } else {
            attr.direct_address()
        }
    }
}
