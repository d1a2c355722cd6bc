use std::borrow::Cow;
use std::rc::Rc;

use gimli::constants;
use gimli::{DwAt, DwLang, DwOrd, DwTag};

use crate::abbrev::Abbreviations;
use crate::attribute::{read_attribute, Attribute};
use crate::form::FormClass;
use crate::reader::{Cursor, Endian};
use crate::session::Session;
use crate::unit::{UnitContext, UnitHeader};
use crate::{Error, Result};

/// A debugging information entry.
///
/// This is only a position: the section offset of the entry, the section
/// it is in, and the offset of the header of the unit that contains it.
/// Everything else is decoded on demand by the `Session` that returned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Die {
    offset: u64,
    is_info: bool,
    unit: u64,
}

impl Die {
    /// The section offset of the entry.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns true if the entry is in `.debug_info`, false for `.debug_types`.
    #[inline]
    pub fn is_info(&self) -> bool {
        self.is_info
    }

    /// The section offset of the header of the unit containing the entry.
    #[inline]
    pub fn unit_offset(&self) -> u64 {
        self.unit
    }

    /// The offset of the entry relative to the start of its unit.
    #[inline]
    pub fn unit_relative_offset(&self) -> u64 {
        self.offset - self.unit
    }
}

/// The decoded abbreviation and attributes of an entry.
#[derive(Debug)]
pub(crate) struct Entry<'input> {
    pub die: Die,
    pub code: u64,
    pub tag: DwTag,
    pub has_children: bool,
    pub attributes: Vec<Attribute<'input>>,
    /// The section offset following the attributes.
    pub end: u64,
}

/// A cursor over the entries of one unit.
fn unit_cursor<'input>(
    data: &'input [u8],
    endian: Endian,
    header: &UnitHeader,
    offset: u64,
) -> Result<Cursor<'input>> {
    let section = if header.is_info {
        crate::file::DEBUG_INFO
    } else {
        crate::file::DEBUG_TYPES
    };
    // The header parser checked that the unit fits in the section.
    let data = &data[..header.end() as usize];
    Cursor::new(section, data, endian, offset)
}

/// Decode the entry at an offset.
///
/// Returns `None` for a null entry or for the end of the unit.
pub(crate) fn read_entry<'input>(
    data: &'input [u8],
    endian: Endian,
    header: &UnitHeader,
    abbrevs: &Abbreviations,
    offset: u64,
) -> Result<Option<Entry<'input>>> {
    if offset >= header.end() {
        return Ok(None);
    }
    let mut r = unit_cursor(data, endian, header, offset)?;
    let code = r.uleb128()?;
    if code == 0 {
        return Ok(None);
    }
    let abbrev = match abbrevs.get(code) {
        Some(abbrev) => abbrev,
        None => {
            return Err(Error::malformed(
                r.section(),
                offset,
                format!("unknown abbreviation code {}", code),
            ));
        }
    };
    let die = Die {
        offset,
        is_info: header.is_info,
        unit: header.offset,
    };
    let encoding = header.encoding();
    let mut attributes = Vec::with_capacity(abbrev.attributes().len());
    for spec in abbrev.attributes() {
        attributes.push(read_attribute(&mut r, die, spec, encoding)?);
    }
    Ok(Some(Entry {
        die,
        code,
        tag: abbrev.tag(),
        has_children: abbrev.has_children(),
        attributes,
        end: r.offset(),
    }))
}

/// The abbreviation code at an offset, without decoding the attributes.
fn peek_entry(
    data: &[u8],
    endian: Endian,
    context: &UnitContext,
    offset: u64,
) -> Result<Option<Die>> {
    let header = &context.header;
    if offset >= header.end() {
        return Ok(None);
    }
    let mut r = unit_cursor(data, endian, header, offset)?;
    let code = r.uleb128()?;
    if code == 0 {
        return Ok(None);
    }
    if context.abbrevs.get(code).is_none() {
        return Err(Error::malformed(
            r.section(),
            offset,
            format!("unknown abbreviation code {}", code),
        ));
    }
    Ok(Some(Die {
        offset,
        is_info: header.is_info,
        unit: header.offset,
    }))
}

impl<'input> Session<'input> {
    pub(crate) fn entry(&self, die: Die) -> Result<Entry<'input>> {
        let context = self.die_context(die)?;
        self.context_entry(&context, die.offset)?
            .ok_or(Error::InvalidOffset {
                section: self.info_section(die.is_info).0,
                offset: die.offset,
            })
    }

    fn context_entry(&self, context: &UnitContext, offset: u64) -> Result<Option<Entry<'input>>> {
        let (_, data) = self.info_section(context.header.is_info);
        read_entry(data, self.endian(), &context.header, &context.abbrevs, offset)
    }

    /// Return the entry at a section offset.
    ///
    /// Fails with `Error::InvalidOffset` if the offset is within a unit
    /// header, is not within any unit, or is a null entry.
    pub fn die_at(&self, offset: u64, is_info: bool) -> Result<Die> {
        let (section, data) = self.info_section(is_info);
        let invalid = Error::InvalidOffset { section, offset };
        let header = match self.unit_containing(offset, is_info)? {
            Some(header) => header,
            None => return Err(invalid),
        };
        if !header.contains(offset) {
            return Err(invalid);
        }
        let context = self.context(header.offset, is_info)?;
        match peek_entry(data, self.endian(), &context, offset)? {
            Some(die) => Ok(die),
            None => Err(invalid),
        }
    }

    /// The root entry of a unit.
    pub fn unit_root(&self, header: &UnitHeader) -> Result<Option<Die>> {
        let context = self.context(header.offset, header.is_info)?;
        let (_, data) = self.info_section(header.is_info);
        peek_entry(data, self.endian(), &context, header.first_die_offset())
    }

    pub fn tag(&self, die: Die) -> Result<DwTag> {
        Ok(self.entry(die)?.tag)
    }

    pub fn abbreviation_code(&self, die: Die) -> Result<u64> {
        Ok(self.entry(die)?.code)
    }

    /// The section offset of the unit header for the entry.
    pub fn unit_offset(&self, die: Die) -> Result<u64> {
        Ok(self.die_context(die)?.header.offset)
    }

    /// The DWARF version of the unit containing the entry.
    pub fn version(&self, die: Die) -> Result<u16> {
        Ok(self.die_context(die)?.header.version)
    }

    pub fn has_children(&self, die: Die) -> Result<bool> {
        Ok(self.entry(die)?.has_children)
    }

    pub fn first_child(&self, die: Die) -> Result<Option<Die>> {
        let context = self.die_context(die)?;
        let entry = self.context_entry(&context, die.offset)?.ok_or(Error::InvalidOffset {
            section: self.info_section(die.is_info).0,
            offset: die.offset,
        })?;
        if !entry.has_children {
            return Ok(None);
        }
        let (_, data) = self.info_section(die.is_info);
        peek_entry(data, self.endian(), &context, entry.end)
    }

    pub fn next_sibling(&self, die: Die) -> Result<Option<Die>> {
        let context = self.die_context(die)?;
        let entry = self.context_entry(&context, die.offset)?.ok_or(Error::InvalidOffset {
            section: self.info_section(die.is_info).0,
            offset: die.offset,
        })?;
        let (_, data) = self.info_section(die.is_info);

        // A sibling may not point into the entry's own subtree.
        let mut subtree_end = entry.end;
        if entry.has_children {
            subtree_end = self.skip_children(&context, subtree_end)?;
        }

        if let Some(attr) = entry
            .attributes
            .iter()
            .find(|attr| attr.name() == constants::DW_AT_sibling)
        {
            match attr.global_reference() {
                Ok(offset) if offset >= subtree_end && offset < context.header.end() => {
                    return peek_entry(data, self.endian(), &context, offset);
                }
                Ok(offset) => {
                    debug!(
                        "DIE 0x{:x}: ignoring invalid sibling 0x{:x}",
                        die.offset, offset
                    );
                }
                Err(e) => {
                    debug!("DIE 0x{:x}: ignoring sibling: {}", die.offset, e);
                }
            }
        }

        peek_entry(data, self.endian(), &context, subtree_end)
    }

    /// Return the offset following the null entry that ends a list of children.
    fn skip_children(&self, context: &UnitContext, mut offset: u64) -> Result<u64> {
        let (_, data) = self.info_section(context.header.is_info);
        let end = context.header.end();
        let mut depth = 1;
        while offset < end {
            match self.context_entry(context, offset)? {
                Some(entry) => {
                    offset = entry.end;
                    if entry.has_children {
                        depth += 1;
                    }
                }
                None => {
                    // A null entry is a single zero byte.
                    let mut r = unit_cursor(data, self.endian(), &context.header, offset)?;
                    r.u8()?;
                    offset = r.offset();
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
            }
        }
        Ok(offset)
    }

    /// Iterate over the children of an entry.
    ///
    /// Every call starts again from the first child.
    pub fn children<'session>(&'session self, die: Die) -> Children<'session, 'input> {
        Children {
            session: self,
            parent: die,
            state: ChildState::First,
        }
    }

    /// The section offsets of the children of the entry at an offset.
    pub fn offset_list(&self, offset: u64, is_info: bool) -> Result<Vec<u64>> {
        let die = self.die_at(offset, is_info)?;
        self.children(die).map(|child| child.map(|d| d.offset)).collect()
    }

    /// Iterate over all entries of a unit in pre-order.
    pub fn unit_dies<'session>(&'session self, header: &UnitHeader) -> Result<UnitDies<'session, 'input>> {
        let context = self.context(header.offset, header.is_info)?;
        let offset = header.first_die_offset();
        Ok(UnitDies {
            session: self,
            context,
            offset,
            depth: 0,
            next_depth: 0,
            done: false,
        })
    }

    /// All entries in the section, in section order.
    ///
    /// This does not use or move the unit cursor.
    pub fn all_dies(&self, is_info: bool) -> Result<Vec<Die>> {
        let units = self.units(is_info)?;
        let mut dies = Vec::new();
        for header in units.iter() {
            for die in self.unit_dies(header)? {
                dies.push(die?);
            }
        }
        Ok(dies)
    }

    /// The top level entries of the unit most recently returned by `next_unit`.
    pub fn current_dies(&self, is_info: bool) -> Result<Vec<Die>> {
        let header = match self.current_unit(is_info)? {
            Some(header) => header,
            None => {
                return Err(Error::NoUnitContext {
                    offset: self.next_unit_offset(is_info),
                })
            }
        };
        let mut dies = Vec::new();
        let mut next = self.unit_root(&header)?;
        while let Some(die) = next {
            dies.push(die);
            next = self.next_sibling(die)?;
        }
        Ok(dies)
    }

    /// Return the name of an entry, from its `DW_AT_name` attribute.
    pub fn name(&self, die: Die) -> Result<Option<Cow<'input, str>>> {
        self.text(die, constants::DW_AT_name)
    }

    /// Return a string attribute of an entry.
    pub fn text(&self, die: Die, at: DwAt) -> Result<Option<Cow<'input, str>>> {
        match self.attribute(die, at)? {
            Some(attr) => self.string(&attr).map(Some),
            None => Ok(None),
        }
    }

    pub fn byte_size(&self, die: Die) -> Result<Option<u64>> {
        self.constant(die, constants::DW_AT_byte_size)
    }

    pub fn bit_size(&self, die: Die) -> Result<Option<u64>> {
        self.constant(die, constants::DW_AT_bit_size)
    }

    fn constant(&self, die: Die, at: DwAt) -> Result<Option<u64>> {
        match self.attribute(die, at)? {
            Some(attr) => attr.unsigned_constant().map(Some),
            None => Ok(None),
        }
    }

    pub fn low_pc(&self, die: Die, tied: Option<&Session<'input>>) -> Result<Option<u64>> {
        match self.attribute(die, constants::DW_AT_low_pc)? {
            Some(attr) => self.address(&attr, tied).map(Some),
            None => Ok(None),
        }
    }

    /// Return the `DW_AT_high_pc` value, which is either an address or
    /// an offset from the low PC.
    pub fn high_pc(&self, die: Die, tied: Option<&Session<'input>>) -> Result<Option<HighPc>> {
        let attr = match self.attribute(die, constants::DW_AT_high_pc)? {
            Some(attr) => attr,
            None => return Ok(None),
        };
        match attr.form_class() {
            FormClass::Address => Ok(Some(HighPc {
                is_offset: false,
                value: self.address(&attr, tied)?,
            })),
            FormClass::Constant => Ok(Some(HighPc {
                is_offset: true,
                value: attr.unsigned_constant()?,
            })),
            _ => Err(Error::WrongForm {
                expected: FormClass::Address,
                form: attr.form(),
            }),
        }
    }

    /// The source language of a unit's root entry.
    pub fn language(&self, die: Die) -> Result<Option<DwLang>> {
        match self.constant(die, constants::DW_AT_language)? {
            Some(value) if value <= u64::from(u16::max_value()) => {
                Ok(Some(DwLang(value as u16)))
            }
            Some(value) => Err(format!("invalid language 0x{:x}", value).into()),
            None => Ok(None),
        }
    }

    /// The array ordering of an array type entry.
    pub fn ordering(&self, die: Die) -> Result<Option<DwOrd>> {
        match self.constant(die, constants::DW_AT_ordering)? {
            Some(value) if value <= u64::from(u8::max_value()) => Ok(Some(DwOrd(value as u8))),
            Some(value) => Err(format!("invalid ordering 0x{:x}", value).into()),
            None => Ok(None),
        }
    }
}

/// The value of a `DW_AT_high_pc` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighPc {
    /// True if the value is an offset from `DW_AT_low_pc`.
    pub is_offset: bool,
    pub value: u64,
}

impl HighPc {
    /// The end address, given the low PC.
    pub fn end(&self, low_pc: u64) -> u64 {
        if self.is_offset {
            low_pc.wrapping_add(self.value)
        } else {
            self.value
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ChildState {
    First,
    Next(Die),
    Done,
}

/// An iterator over the children of an entry.
#[derive(Debug)]
pub struct Children<'session, 'input> {
    session: &'session Session<'input>,
    parent: Die,
    state: ChildState,
}

impl<'session, 'input> Iterator for Children<'session, 'input> {
    type Item = Result<Die>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = match self.state {
            ChildState::First => self.session.first_child(self.parent),
            ChildState::Next(die) => self.session.next_sibling(die),
            ChildState::Done => return None,
        };
        match next {
            Ok(Some(die)) => {
                self.state = ChildState::Next(die);
                Some(Ok(die))
            }
            Ok(None) => {
                self.state = ChildState::Done;
                None
            }
            Err(e) => {
                self.state = ChildState::Done;
                Some(Err(e))
            }
        }
    }
}

/// A pre-order iterator over the entries of one unit.
#[derive(Debug)]
pub struct UnitDies<'session, 'input> {
    session: &'session Session<'input>,
    context: Rc<UnitContext>,
    offset: u64,
    depth: isize,
    next_depth: isize,
    done: bool,
}

impl<'session, 'input> UnitDies<'session, 'input> {
    /// The depth of the entry most recently returned, where the root is 0.
    pub fn depth(&self) -> isize {
        self.depth
    }
}

impl<'session, 'input> Iterator for UnitDies<'session, 'input> {
    type Item = Result<Die>;

    fn next(&mut self) -> Option<Self::Item> {
        let (_, data) = self.session.info_section(self.context.header.is_info);
        let endian = self.session.endian();
        while !self.done && self.offset < self.context.header.end() {
            let entry = match self.session.context_entry(&self.context, self.offset) {
                Ok(entry) => entry,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            match entry {
                Some(entry) => {
                    self.offset = entry.end;
                    self.depth = self.next_depth;
                    if entry.has_children {
                        self.next_depth += 1;
                    }
                    return Some(Ok(entry.die));
                }
                None => {
                    let skip = unit_cursor(data, endian, &self.context.header, self.offset)
                        .and_then(|mut r| r.u8().map(|_| r.offset()));
                    match skip {
                        Ok(offset) => self.offset = offset,
                        Err(e) => {
                            self.done = true;
                            return Some(Err(e));
                        }
                    }
                    self.next_depth -= 1;
                    if self.next_depth <= 0 {
                        // Trailing padding after the root's children.
                        self.done = true;
                    }
                }
            }
        }
        self.done = true;
        None
    }
}
