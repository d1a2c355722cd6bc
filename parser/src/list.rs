use std::rc::Rc;

use gimli::constants;

use crate::attribute::{Attribute, Expression};
use crate::die::Die;
use crate::file::{DEBUG_LOC, DEBUG_LOCLISTS, DEBUG_RANGES, DEBUG_RNGLISTS};
use crate::form::FormClass;
use crate::range::{Range, RangeList};
use crate::reader::Cursor;
use crate::session::{list_header_size, AddressResolver, Session};
use crate::unit::UnitKind;
use crate::{Error, Result};

/// Which list section to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListSection {
    /// `.debug_loclists`, or `.debug_loc` before DWARF 5.
    Location,
    /// `.debug_rnglists`, or `.debug_ranges` before DWARF 5.
    Range,
}

impl ListSection {
    /// The name of the DWARF 5 section.
    pub fn section_name(self) -> &'static str {
        match self {
            ListSection::Location => DEBUG_LOCLISTS,
            ListSection::Range => DEBUG_RNGLISTS,
        }
    }

    /// The name of the section used before DWARF 5.
    pub fn legacy_section_name(self) -> &'static str {
        match self {
            ListSection::Location => DEBUG_LOC,
            ListSection::Range => DEBUG_RANGES,
        }
    }

    fn what(self) -> &'static str {
        match self {
            ListSection::Location => "location list",
            ListSection::Range => "range list",
        }
    }
}

/// The header of one contribution to `.debug_loclists` or `.debug_rnglists`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListContext {
    /// The position of this context in the section.
    pub index: usize,
    pub header_offset: u64,
    pub offset_size: u8,
    pub extension_size: u8,
    pub version: u16,
    pub address_size: u8,
    pub segment_selector_size: u8,
    pub offset_entry_count: u32,
    /// The section offset of the offset table. List offsets in the table
    /// are relative to this.
    pub offset_array_offset: u64,
    pub first_entry_offset: u64,
    pub past_last_entry_offset: u64,
}

impl ListContext {
    fn parse(r: &mut Cursor, index: usize) -> Result<ListContext> {
        let header_offset = r.offset();
        let length = r.initial_length()?;
        let version = r.u16()?;
        if version != 5 {
            return Err(r.error(format!("unsupported list version {}", version)));
        }
        let address_size = r.u8()?;
        match address_size {
            1 | 2 | 4 | 8 => {}
            _ => return Err(r.error(format!("unsupported address size {}", address_size))),
        }
        let segment_selector_size = r.u8()?;
        let offset_entry_count = r.u32()?;
        let offset_array_offset = r.offset();
        let first_entry_offset =
            offset_array_offset + u64::from(offset_entry_count) * u64::from(length.offset_size);
        let past_last_entry_offset = match header_offset
            .checked_add(length.field_size())
            .and_then(|x| x.checked_add(length.length))
        {
            Some(offset) => offset,
            None => {
                return Err(Error::malformed(
                    r.section(),
                    header_offset,
                    format!("context length 0x{:x} is too large", length.length),
                ));
            }
        };
        if first_entry_offset > past_last_entry_offset {
            return Err(Error::malformed(
                r.section(),
                header_offset,
                "list offset table exceeds the context length",
            ));
        }
        r.skip(past_last_entry_offset - offset_array_offset)?;
        Ok(ListContext {
            index,
            header_offset,
            offset_size: length.offset_size,
            extension_size: length.extension_size,
            version,
            address_size,
            segment_selector_size,
            offset_entry_count,
            offset_array_offset,
            first_entry_offset,
            past_last_entry_offset,
        })
    }
}

/// The kind of a list entry.
///
/// Entries from `.debug_loc` and `.debug_ranges` use `EndOfList`,
/// `BaseAddress` and `OffsetPair`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListEntryKind {
    EndOfList,
    BaseAddressx,
    StartxEndx,
    StartxLength,
    OffsetPair,
    DefaultLocation,
    BaseAddress,
    StartEnd,
    StartLength,
    /// `DW_LLE_GNU_view_pair`.
    ViewPair,
}

impl ListEntryKind {
    fn from_code(kind: ListSection, code: u8) -> Option<ListEntryKind> {
        let entry_kind = match kind {
            ListSection::Location => match gimli::DwLle(code) {
                constants::DW_LLE_end_of_list => ListEntryKind::EndOfList,
                constants::DW_LLE_base_addressx => ListEntryKind::BaseAddressx,
                constants::DW_LLE_startx_endx => ListEntryKind::StartxEndx,
                constants::DW_LLE_startx_length => ListEntryKind::StartxLength,
                constants::DW_LLE_offset_pair => ListEntryKind::OffsetPair,
                constants::DW_LLE_default_location => ListEntryKind::DefaultLocation,
                constants::DW_LLE_base_address => ListEntryKind::BaseAddress,
                constants::DW_LLE_start_end => ListEntryKind::StartEnd,
                constants::DW_LLE_start_length => ListEntryKind::StartLength,
                constants::DW_LLE_GNU_view_pair => ListEntryKind::ViewPair,
                _ => return None,
            },
            ListSection::Range => match gimli::DwRle(code) {
                constants::DW_RLE_end_of_list => ListEntryKind::EndOfList,
                constants::DW_RLE_base_addressx => ListEntryKind::BaseAddressx,
                constants::DW_RLE_startx_endx => ListEntryKind::StartxEndx,
                constants::DW_RLE_startx_length => ListEntryKind::StartxLength,
                constants::DW_RLE_offset_pair => ListEntryKind::OffsetPair,
                constants::DW_RLE_base_address => ListEntryKind::BaseAddress,
                constants::DW_RLE_start_end => ListEntryKind::StartEnd,
                constants::DW_RLE_start_length => ListEntryKind::StartLength,
                _ => return None,
            },
        };
        Some(entry_kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            ListEntryKind::EndOfList => "end_of_list",
            ListEntryKind::BaseAddressx => "base_addressx",
            ListEntryKind::StartxEndx => "startx_endx",
            ListEntryKind::StartxLength => "startx_length",
            ListEntryKind::OffsetPair => "offset_pair",
            ListEntryKind::DefaultLocation => "default_location",
            ListEntryKind::BaseAddress => "base_address",
            ListEntryKind::StartEnd => "start_end",
            ListEntryKind::StartLength => "start_length",
            ListEntryKind::ViewPair => "view_pair",
        }
    }
}

/// The address range of a list entry, if it could be determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPc {
    /// The entry has no address range.
    None,
    Range(Range),
    /// The range needs data that is not available, such as `.debug_addr`
    /// in a tied object.
    Unavailable(Error),
}

/// One record of a location or range list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry<'input> {
    /// The section offset of the record.
    pub offset: u64,
    /// The size of the record in bytes.
    pub length: u64,
    pub kind: ListEntryKind,
    /// The raw operands, in record order. Unused operands are zero.
    pub operands: (u64, u64),
    /// The location expression of a location list entry.
    pub expression: Option<Expression<'input>>,
    pub pc: ResolvedPc,
}

impl<'input> ListEntry<'input> {
    /// The address range, if it is known.
    pub fn pc_range(&self) -> Option<Range> {
        match self.pc {
            ResolvedPc::Range(range) => Some(range),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListFormat {
    /// `.debug_loclists` and `.debug_rnglists`.
    Dwarf5,
    /// `.debug_loc` and `.debug_ranges`.
    Legacy,
}

/// An iterator over list records.
#[derive(Debug, Clone)]
pub struct ListEntries<'input> {
    kind: ListSection,
    format: ListFormat,
    r: Cursor<'input>,
    end: u64,
    address_size: u8,
    stop_at_end: bool,
    done: bool,
    initial_base: std::result::Result<u64, Error>,
    base: std::result::Result<u64, Error>,
    resolver: Option<AddressResolver<'input>>,
    unresolved: Error,
}

impl<'input> ListEntries<'input> {
    fn resolve(&self, index: u64) -> std::result::Result<u64, Error> {
        match &self.resolver {
            Some(resolver) => resolver.resolve(index),
            None => Err(self.unresolved.clone()),
        }
    }

    fn range(
        begin: std::result::Result<u64, Error>,
        end: impl FnOnce(u64) -> std::result::Result<u64, Error>,
    ) -> ResolvedPc {
        match begin.and_then(|begin| end(begin).map(|end| Range { begin, end })) {
            Ok(range) => ResolvedPc::Range(range),
            Err(e) => ResolvedPc::Unavailable(e),
        }
    }

    fn read_dwarf5(&mut self) -> Result<ListEntry<'input>> {
        let offset = self.r.offset();
        let code = self.r.u8()?;
        let kind = match ListEntryKind::from_code(self.kind, code) {
            Some(kind) => kind,
            None => {
                return Err(Error::malformed(
                    self.r.section(),
                    offset,
                    format!("unknown {} entry kind 0x{:x}", self.kind.what(), code),
                ));
            }
        };
        let address_size = self.address_size;
        let mut operands = (0, 0);
        let pc = match kind {
            ListEntryKind::EndOfList | ListEntryKind::DefaultLocation => ResolvedPc::None,
            ListEntryKind::BaseAddressx => {
                operands.0 = self.r.uleb128()?;
                self.base = self.resolve(operands.0);
                ResolvedPc::None
            }
            ListEntryKind::StartxEndx => {
                operands = (self.r.uleb128()?, self.r.uleb128()?);
                let end = self.resolve(operands.1);
                Self::range(self.resolve(operands.0), |_| end)
            }
            ListEntryKind::StartxLength => {
                operands = (self.r.uleb128()?, self.r.uleb128()?);
                let length = operands.1;
                Self::range(self.resolve(operands.0), |begin| {
                    Ok(begin.wrapping_add(length))
                })
            }
            ListEntryKind::OffsetPair => {
                operands = (self.r.uleb128()?, self.r.uleb128()?);
                let (low, high) = operands;
                let base = self.base.clone();
                Self::range(base.clone().map(|base| base.wrapping_add(low)), |_| {
                    base.map(|base| base.wrapping_add(high))
                })
            }
            ListEntryKind::BaseAddress => {
                operands.0 = self.r.address(address_size)?;
                self.base = Ok(operands.0);
                ResolvedPc::None
            }
            ListEntryKind::StartEnd => {
                operands = (self.r.address(address_size)?, self.r.address(address_size)?);
                ResolvedPc::Range(Range {
                    begin: operands.0,
                    end: operands.1,
                })
            }
            ListEntryKind::StartLength => {
                operands = (self.r.address(address_size)?, self.r.uleb128()?);
                ResolvedPc::Range(Range {
                    begin: operands.0,
                    end: operands.0.wrapping_add(operands.1),
                })
            }
            ListEntryKind::ViewPair => {
                operands = (self.r.uleb128()?, self.r.uleb128()?);
                ResolvedPc::None
            }
        };
        let has_expression = self.kind == ListSection::Location
            && kind != ListEntryKind::EndOfList
            && kind != ListEntryKind::BaseAddressx
            && kind != ListEntryKind::BaseAddress
            && kind != ListEntryKind::ViewPair;
        let expression = if has_expression {
            let len = self.r.uleb128()?;
            let offset = self.r.offset();
            Some(Expression {
                offset,
                bytes: self.r.bytes(len)?,
            })
        } else {
            None
        };
        Ok(ListEntry {
            offset,
            length: self.r.offset() - offset,
            kind,
            operands,
            expression,
            pc,
        })
    }

    fn read_legacy(&mut self) -> Result<ListEntry<'input>> {
        let offset = self.r.offset();
        let address_size = self.address_size;
        let begin = self.r.address(address_size)?;
        let end = self.r.address(address_size)?;
        let max = if address_size == 8 {
            u64::max_value()
        } else {
            (1 << (u64::from(address_size) * 8)) - 1
        };
        let (kind, pc) = if begin == 0 && end == 0 {
            (ListEntryKind::EndOfList, ResolvedPc::None)
        } else if begin == max {
            self.base = Ok(end);
            (ListEntryKind::BaseAddress, ResolvedPc::None)
        } else {
            let base = self.base.clone();
            let pc = Self::range(base.clone().map(|base| base.wrapping_add(begin)), |_| {
                base.map(|base| base.wrapping_add(end))
            });
            (ListEntryKind::OffsetPair, pc)
        };
        let expression = if self.kind == ListSection::Location && kind == ListEntryKind::OffsetPair
        {
            let len = self.r.u16()?;
            let offset = self.r.offset();
            Some(Expression {
                offset,
                bytes: self.r.bytes(u64::from(len))?,
            })
        } else {
            None
        };
        Ok(ListEntry {
            offset,
            length: self.r.offset() - offset,
            kind,
            operands: (begin, end),
            expression,
            pc,
        })
    }
}

impl<'input> Iterator for ListEntries<'input> {
    type Item = Result<ListEntry<'input>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.r.offset() >= self.end {
            self.done = true;
            return None;
        }
        let entry = match self.format {
            ListFormat::Dwarf5 => self.read_dwarf5(),
            ListFormat::Legacy => self.read_legacy(),
        };
        match entry {
            Ok(entry) => {
                if entry.kind == ListEntryKind::EndOfList {
                    if self.stop_at_end {
                        self.done = true;
                        return None;
                    }
                    self.base = self.initial_base.clone();
                }
                Some(Ok(entry))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<'input> Session<'input> {
    /// Read the context headers of a list section.
    ///
    /// Returns the number of contexts. The headers are read once per session.
    pub fn load_lists(&self, kind: ListSection) -> Result<usize> {
        Ok(self.list_contexts(kind)?.len())
    }

    fn list_contexts(&self, kind: ListSection) -> Result<Rc<Vec<ListContext>>> {
        let cache = self.list_cache(kind);
        if let Some(contexts) = &*cache.borrow() {
            return Ok(contexts.clone());
        }
        let section = kind.section_name();
        let data = self.data(section);
        let mut r = Cursor::new(section, data, self.endian(), 0)?;
        let mut contexts = Vec::new();
        while !r.is_empty() {
            let offset = r.offset();
            match ListContext::parse(&mut r, contexts.len()) {
                Ok(context) => contexts.push(context),
                Err(e) => {
                    warn!("{}: ignoring contexts from 0x{:x}: {}", section, offset, e);
                    break;
                }
            }
        }
        let contexts = Rc::new(contexts);
        *cache.borrow_mut() = Some(contexts.clone());
        Ok(contexts)
    }

    /// The context header at an index.
    pub fn list_context(&self, kind: ListSection, index: usize) -> Result<Option<ListContext>> {
        Ok(self.list_contexts(kind)?.get(index).cloned())
    }

    /// An entry in the offset table of a context.
    ///
    /// Returns the raw table value and the section offset of the list.
    pub fn offset_table_entry(
        &self,
        kind: ListSection,
        context: &ListContext,
        index: u64,
    ) -> Result<Option<(u64, u64)>> {
        if index >= u64::from(context.offset_entry_count) {
            return Ok(None);
        }
        let section = kind.section_name();
        let offset = context.offset_array_offset + index * u64::from(context.offset_size);
        let mut r = Cursor::new(section, self.data(section), self.endian(), offset)?;
        let value = r.offset_sized(context.offset_size)?;
        match context.offset_array_offset.checked_add(value) {
            Some(list) => Ok(Some((value, list))),
            None => Err(Error::malformed(
                section,
                offset,
                format!("list offset 0x{:x} is too large", value),
            )),
        }
    }

    fn context_entries(
        &self,
        kind: ListSection,
        context: &ListContext,
        offset: u64,
        stop_at_end: bool,
    ) -> Result<ListEntries<'input>> {
        let section = kind.section_name();
        let data = self.data(section);
        let end = context.past_last_entry_offset;
        if end > data.len() as u64 {
            return Err(Error::malformed(
                section,
                context.header_offset,
                "list context exceeds the section",
            ));
        }
        let r = Cursor::new(section, &data[..end as usize], self.endian(), offset)?;
        Ok(ListEntries {
            kind,
            format: ListFormat::Dwarf5,
            r,
            end,
            address_size: context.address_size,
            stop_at_end,
            done: false,
            initial_base: Ok(0),
            base: Ok(0),
            resolver: None,
            unresolved: Error::NoUnitContext {
                offset: context.header_offset,
            },
        })
    }

    /// The entries of the first list in a context.
    ///
    /// The end of list entry terminates the iteration and is not returned.
    /// No unit is known, so the base address is zero and address indices
    /// are not resolved.
    pub fn list_entries(&self, kind: ListSection, context: &ListContext) -> Result<ListEntries<'input>> {
        self.context_entries(kind, context, context.first_entry_offset, true)
    }

    /// Every record in a context, including end of list entries.
    pub fn list_records(&self, kind: ListSection, context: &ListContext) -> Result<ListEntries<'input>> {
        self.context_entries(kind, context, context.first_entry_offset, false)
    }

    /// The record at a section offset within a context.
    pub fn entry_at(
        &self,
        kind: ListSection,
        context: &ListContext,
        offset: u64,
    ) -> Result<ListEntry<'input>> {
        if offset < context.first_entry_offset || offset >= context.past_last_entry_offset {
            return Err(Error::malformed(
                kind.section_name(),
                offset,
                format!("offset is outside of the context at 0x{:x}", context.header_offset),
            ));
        }
        match self.context_entries(kind, context, offset, false)?.next() {
            Some(entry) => entry,
            None => Err(Error::malformed(kind.section_name(), offset, "no list entry")),
        }
    }

    /// The list referenced by an attribute.
    ///
    /// Handles `DW_FORM_loclistx` and `DW_FORM_rnglistx` indices, DWARF 5
    /// section offsets, and offsets into `.debug_loc` and `.debug_ranges`.
    /// Returns `None` if the attribute does not refer to a list.
    pub fn list_for_attribute(
        &self,
        attr: &Attribute<'input>,
        tied: Option<&Session<'input>>,
    ) -> Result<Option<ListEntries<'input>>> {
        let (kind, legacy) = match attr.form_class() {
            FormClass::LocList => (ListSection::Location, false),
            FormClass::RangeList => (ListSection::Range, false),
            FormClass::LocListPtr => (ListSection::Location, true),
            FormClass::RangeListPtr => (ListSection::Range, true),
            _ => return Ok(None),
        };
        match attr.name() {
            constants::DW_AT_loclists_base
            | constants::DW_AT_rnglists_base
            | constants::DW_AT_GNU_ranges_base => return Ok(None),
            _ => {}
        }

        let die = attr.die();
        let context = self.die_context(die)?;
        let header = &context.header;
        let split = self.sections().is_split()
            || header.kind() == UnitKind::SplitCompile
            || header.kind() == UnitKind::SplitType;
        if legacy && split && kind == ListSection::Location {
            return Err("split DWARF 4 location lists are not supported".into());
        }

        let (section, offset) = if legacy {
            (kind.legacy_section_name(), attr.section_offset()?)
        } else if attr.form() == constants::DW_FORM_loclistx
            || attr.form() == constants::DW_FORM_rnglistx
        {
            let base = match kind {
                ListSection::Location => context.loclists_base,
                ListSection::Range => context.rnglists_base,
            }
            .unwrap_or_else(|| list_header_size(header.offset_size()));
            let index = attr.list_index()?;
            let contexts = self.list_contexts(kind)?;
            let count = contexts
                .iter()
                .find(|c| c.offset_array_offset == base)
                .map(|c| u64::from(c.offset_entry_count))
                .unwrap_or(0);
            if index >= count {
                return Err(Error::IndexOutOfRange {
                    what: kind.what(),
                    index,
                    count,
                });
            }
            let section = kind.section_name();
            let offset_size = header.offset_size();
            let entry = index
                .checked_mul(u64::from(offset_size))
                .and_then(|x| x.checked_add(base))
                .ok_or_else(|| {
                    Error::malformed(section, base, format!("list index {} is too large", index))
                })?;
            let mut r = Cursor::new(section, self.data(section), self.endian(), entry)?;
            let value = r.offset_sized(offset_size)?;
            let offset = base.checked_add(value).ok_or_else(|| {
                Error::malformed(section, entry, format!("list offset 0x{:x} is too large", value))
            })?;
            (section, offset)
        } else {
            (kind.section_name(), attr.section_offset()?)
        };

        // Split units get their base address from the skeleton.
        let mut initial_base = context.low_pc;
        if split {
            if let (Some(tied), Some(dwo_id)) = (tied, context.dwo_id) {
                if let Some(skeleton) = tied.skeleton(dwo_id)? {
                    initial_base = skeleton.low_pc;
                }
            }
        }

        let data = self.data(section);
        let r = Cursor::new(section, data, self.endian(), offset)?;
        Ok(Some(ListEntries {
            kind,
            format: if legacy {
                ListFormat::Legacy
            } else {
                ListFormat::Dwarf5
            },
            r,
            end: data.len() as u64,
            address_size: header.address_size(),
            stop_at_end: true,
            done: false,
            initial_base: Ok(initial_base),
            base: Ok(initial_base),
            resolver: Some(self.address_resolver(die, tied)?),
            unresolved: Error::Unresolvable {
                section: crate::file::DEBUG_ADDR,
            },
        }))
    }

    /// The address ranges of an entry, from `DW_AT_low_pc` and
    /// `DW_AT_high_pc`, or from `DW_AT_ranges`.
    pub fn die_ranges(&self, die: Die, tied: Option<&Session<'input>>) -> Result<RangeList> {
        let mut ranges = RangeList::default();
        if let Some(attr) = self.attribute(die, constants::DW_AT_ranges)? {
            if let Some(entries) = self.list_for_attribute(&attr, tied)? {
                for entry in entries {
                    if let ResolvedPc::Range(range) = entry?.pc {
                        ranges.push(range);
                    }
                }
            }
        } else if let Some(low_pc) = self.low_pc(die, tied)? {
            if let Some(high_pc) = self.high_pc(die, tied)? {
                ranges.push(Range {
                    begin: low_pc,
                    end: high_pc.end(low_pc),
                });
            }
        }
        ranges.sort();
        Ok(ranges)
    }
}
