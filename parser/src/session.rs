use std::cell::{Cell, RefCell};
use std::rc::Rc;

use fnv::FnvHashMap as HashMap;
use gimli::{
    constants, DebugAddr, DebugAddrBase, DebugAddrIndex, DebugStr, DebugStrOffsets,
    DebugStrOffsetsBase, DebugStrOffsetsIndex, EndianSlice,
};

use crate::abbrev::{parse_abbreviations, Abbreviations};
use crate::die::{read_entry, Die};
use crate::file::*;
use crate::list::{ListContext, ListSection};
use crate::reader::{Cursor, Endian};
use crate::unit::{UnitContext, UnitHeader, UnitKind};
use crate::{Error, Result};

/// Per-section state of the unit cursor.
#[derive(Debug, Default)]
struct UnitCursor {
    /// The offset of the next unit header to read.
    next: Cell<u64>,
    /// The offset of the unit most recently returned.
    current: Cell<Option<u64>>,
}

/// A navigation session over the DWARF sections of one object.
///
/// The session owns the unit cursor and caches of decoded unit headers,
/// abbreviation tables and list contexts. It borrows the section data,
/// and all decoded values borrow from the sections rather than from the
/// session.
///
/// Split DWARF needs two objects. Operations that may need data from the
/// other object take a `tied: Option<&Session>` argument.
#[derive(Debug)]
pub struct Session<'input> {
    sections: &'input Sections<'input>,
    info_cursor: UnitCursor,
    types_cursor: UnitCursor,
    info_units: RefCell<Option<Rc<Vec<UnitHeader>>>>,
    types_units: RefCell<Option<Rc<Vec<UnitHeader>>>>,
    abbrevs: RefCell<HashMap<u64, Rc<Abbreviations>>>,
    contexts: RefCell<HashMap<(bool, u64), Rc<UnitContext>>>,
    pub(crate) loclists: RefCell<Option<Rc<Vec<ListContext>>>>,
    pub(crate) rnglists: RefCell<Option<Rc<Vec<ListContext>>>>,
}

impl<'input> Session<'input> {
    pub fn new(sections: &'input Sections<'input>) -> Self {
        Session {
            sections,
            info_cursor: UnitCursor::default(),
            types_cursor: UnitCursor::default(),
            info_units: RefCell::new(None),
            types_units: RefCell::new(None),
            abbrevs: RefCell::new(HashMap::default()),
            contexts: RefCell::new(HashMap::default()),
            loclists: RefCell::new(None),
            rnglists: RefCell::new(None),
        }
    }

    #[inline]
    pub fn sections(&self) -> &'input Sections<'input> {
        self.sections
    }

    #[inline]
    pub(crate) fn endian(&self) -> Endian {
        self.sections.endian()
    }

    /// The data of a section, or an empty slice if it does not exist.
    pub(crate) fn data(&self, name: &str) -> &'input [u8] {
        self.sections.section(name).unwrap_or(&[])
    }

    pub(crate) fn info_section(&self, is_info: bool) -> (&'static str, &'input [u8]) {
        let name = if is_info { DEBUG_INFO } else { DEBUG_TYPES };
        (name, self.data(name))
    }

    fn cursor(&self, is_info: bool) -> &UnitCursor {
        if is_info {
            &self.info_cursor
        } else {
            &self.types_cursor
        }
    }

    fn parse_unit(&self, offset: u64, is_info: bool) -> Result<UnitHeader> {
        let (_, data) = self.info_section(is_info);
        UnitHeader::parse(
            data,
            self.endian(),
            offset,
            is_info,
            self.sections.is_split(),
        )
    }

    /// Return the header of the next unit, and advance the cursor.
    ///
    /// After the last unit this returns `None` and the cursor restarts at
    /// the beginning of the section. On error the cursor is not moved.
    pub fn next_unit(&self, is_info: bool) -> Result<Option<UnitHeader>> {
        let cursor = self.cursor(is_info);
        let (_, data) = self.info_section(is_info);
        let offset = cursor.next.get();
        if offset >= data.len() as u64 {
            cursor.next.set(0);
            cursor.current.set(None);
            return Ok(None);
        }
        let header = self.parse_unit(offset, is_info)?;
        cursor.next.set(header.end());
        cursor.current.set(Some(offset));
        Ok(Some(header))
    }

    /// The offset at which `next_unit` will read.
    pub fn next_unit_offset(&self, is_info: bool) -> u64 {
        self.cursor(is_info).next.get()
    }

    /// The header of the unit most recently returned by `next_unit`.
    pub fn current_unit(&self, is_info: bool) -> Result<Option<UnitHeader>> {
        match self.cursor(is_info).current.get() {
            Some(offset) => self.parse_unit(offset, is_info).map(Some),
            None => Ok(None),
        }
    }

    /// All unit headers in the section.
    ///
    /// This does not use or move the unit cursor.
    pub fn units(&self, is_info: bool) -> Result<Rc<Vec<UnitHeader>>> {
        let cache = if is_info {
            &self.info_units
        } else {
            &self.types_units
        };
        if let Some(units) = &*cache.borrow() {
            return Ok(units.clone());
        }
        let (_, data) = self.info_section(is_info);
        let mut units = Vec::new();
        let mut offset = 0;
        while offset < data.len() as u64 {
            let header = self.parse_unit(offset, is_info)?;
            offset = header.end();
            units.push(header);
        }
        let units = Rc::new(units);
        *cache.borrow_mut() = Some(units.clone());
        Ok(units)
    }

    /// The header of the unit whose extent includes the section offset.
    pub fn unit_containing(&self, offset: u64, is_info: bool) -> Result<Option<UnitHeader>> {
        let units = self.units(is_info)?;
        let index = match units.binary_search_by(|x| x.offset.cmp(&offset)) {
            Ok(index) => index,
            Err(0) => return Ok(None),
            Err(index) => index - 1,
        };
        let unit = &units[index];
        if offset < unit.end() {
            Ok(Some(unit.clone()))
        } else {
            Ok(None)
        }
    }

    /// The header of the unit that starts at the section offset.
    pub fn unit_at(&self, offset: u64, is_info: bool) -> Result<UnitHeader> {
        Ok(self.context(offset, is_info)?.header.clone())
    }

    pub(crate) fn abbreviations(&self, offset: u64) -> Result<Rc<Abbreviations>> {
        if let Some(abbrevs) = self.abbrevs.borrow().get(&offset) {
            return Ok(abbrevs.clone());
        }
        let abbrevs = Rc::new(parse_abbreviations(
            self.data(DEBUG_ABBREV),
            self.endian(),
            offset,
        )?);
        self.abbrevs.borrow_mut().insert(offset, abbrevs.clone());
        Ok(abbrevs)
    }

    /// The decoding context of the unit that starts at the section offset.
    pub(crate) fn context(&self, offset: u64, is_info: bool) -> Result<Rc<UnitContext>> {
        if let Some(context) = self.contexts.borrow().get(&(is_info, offset)) {
            return Ok(context.clone());
        }
        let (_, data) = self.info_section(is_info);
        if offset >= data.len() as u64 {
            return Err(Error::NoUnitContext { offset });
        }
        let header = self.parse_unit(offset, is_info)?;
        let abbrevs = self.abbreviations(header.abbrev_offset)?;
        let context = Rc::new(self.read_context(header, abbrevs)?);
        self.contexts
            .borrow_mut()
            .insert((is_info, offset), context.clone());
        Ok(context)
    }

    pub(crate) fn die_context(&self, die: Die) -> Result<Rc<UnitContext>> {
        self.context(die.unit_offset(), die.is_info())
    }

    /// Read the attribute bases from the root DIE of a unit.
    fn read_context(&self, header: UnitHeader, abbrevs: Rc<Abbreviations>) -> Result<UnitContext> {
        let split = self.sections.is_split()
            || header.kind == UnitKind::SplitCompile
            || header.kind == UnitKind::SplitType;
        let dwarf5_split = split && header.version >= 5;
        let mut context = UnitContext {
            dwo_id: header.dwo_id,
            str_offsets_base: if dwarf5_split {
                // The size of the string offsets table header.
                u64::from(header.offset_size) * 2
            } else {
                0
            },
            addr_base: None,
            rnglists_base: None,
            loclists_base: None,
            low_pc: 0,
            header,
            abbrevs,
        };
        if dwarf5_split {
            let base = list_header_size(context.header.offset_size);
            context.rnglists_base = Some(base);
            context.loclists_base = Some(base);
        }

        let (_, data) = self.info_section(context.header.is_info);
        let offset = context.header.first_die_offset();
        let entry = match read_entry(data, self.endian(), &context.header, &context.abbrevs, offset)? {
            Some(entry) => entry,
            None => return Ok(context),
        };
        let mut low_pc_index = None;
        for attr in &entry.attributes {
            match attr.name() {
                constants::DW_AT_str_offsets_base => {
                    context.str_offsets_base = attr.section_offset()?;
                }
                constants::DW_AT_addr_base | constants::DW_AT_GNU_addr_base => {
                    context.addr_base = Some(attr.section_offset()?);
                }
                constants::DW_AT_rnglists_base | constants::DW_AT_GNU_ranges_base => {
                    context.rnglists_base = Some(attr.section_offset()?);
                }
                constants::DW_AT_loclists_base => {
                    context.loclists_base = Some(attr.section_offset()?);
                }
                constants::DW_AT_GNU_dwo_id => {
                    context.dwo_id = Some(attr.unsigned_constant()?);
                }
                constants::DW_AT_low_pc => {
                    if attr.form() == constants::DW_FORM_addr {
                        context.low_pc = attr.direct_address()?;
                    } else if let Ok(index) = attr.address_index() {
                        low_pc_index = Some(index);
                    }
                }
                _ => {}
            }
        }
        if let Some(index) = low_pc_index {
            // Split units are given their base address by the skeleton.
            if let Some(base) = context.addr_base {
                match AddressTable::new(self, base, context.header.address_size)
                    .and_then(|table| table.get(index))
                {
                    Ok(address) => context.low_pc = address,
                    Err(e) => debug!("unit 0x{:x}: no base address: {}", context.header.offset, e),
                }
            }
        }
        Ok(context)
    }

    /// Find the skeleton unit for a split unit.
    pub(crate) fn skeleton(&self, dwo_id: u64) -> Result<Option<Rc<UnitContext>>> {
        for header in self.units(true)?.iter() {
            if header.kind != UnitKind::Skeleton && header.version >= 5 {
                continue;
            }
            let context = self.context(header.offset, true)?;
            if context.dwo_id == Some(dwo_id) {
                return Ok(Some(context));
            }
        }
        Ok(None)
    }

    /// Create a resolver for the address indices of the unit containing a DIE.
    ///
    /// For split units, the address table and base come from the skeleton
    /// unit in the tied session.
    pub fn address_resolver(
        &self,
        die: Die,
        tied: Option<&Session<'input>>,
    ) -> Result<AddressResolver<'input>> {
        let context = self.die_context(die)?;
        let split = self.sections.is_split()
            || context.header.kind == UnitKind::SplitCompile
            || context.header.kind == UnitKind::SplitType;
        let address_size = context.header.address_size;
        if !split && self.sections.section(DEBUG_ADDR).is_some() {
            return Ok(AddressResolver {
                table: AddressTable::new(self, context.addr_base.unwrap_or(0), address_size),
            });
        }
        if let (Some(tied), Some(dwo_id)) = (tied, context.dwo_id) {
            if tied.sections.section(DEBUG_ADDR).is_some() {
                if let Some(skeleton) = tied.skeleton(dwo_id)? {
                    return Ok(AddressResolver {
                        table: AddressTable::new(
                            tied,
                            skeleton.addr_base.unwrap_or(0),
                            address_size,
                        ),
                    });
                }
            }
        }
        Ok(AddressResolver {
            table: Err(Error::Unresolvable {
                section: DEBUG_ADDR,
            }),
        })
    }

    /// Return the address at an index in the `.debug_addr` table of a unit.
    pub fn resolve_indexed_address(
        &self,
        tied: Option<&Session<'input>>,
        die: Die,
        index: u64,
    ) -> Result<u64> {
        self.address_resolver(die, tied)?.resolve(index)
    }

    /// Return the string at an index in the `.debug_str_offsets` table of a unit.
    pub fn indexed_string(&self, die: Die, index: u64) -> Result<&'input [u8]> {
        let context = self.die_context(die)?;
        let data = match self.sections.section(DEBUG_STR_OFFSETS) {
            Some(data) => data,
            None => {
                return Err(Error::Unresolvable {
                    section: DEBUG_STR_OFFSETS,
                })
            }
        };
        let offset_size = u64::from(context.header.offset_size);
        let base = context.str_offsets_base;
        let count = (data.len() as u64).saturating_sub(base) / offset_size;
        if index >= count {
            return Err(Error::IndexOutOfRange {
                what: "string offset",
                index,
                count,
            });
        }
        // Both fit in the section length.
        let entry = base + index * offset_size;
        let offset = DebugStrOffsets::from(EndianSlice::new(data, self.endian()))
            .get_str_offset(
                context.header.format(),
                DebugStrOffsetsBase(base as usize),
                DebugStrOffsetsIndex(index as usize),
            )
            .map_err(|e| Error::malformed(DEBUG_STR_OFFSETS, entry, format!("{}", e)))?;
        DebugStr::new(self.data(DEBUG_STR), self.endian())
            .get_str(offset)
            .map(|s| s.slice())
            .map_err(|e| Error::malformed(DEBUG_STR, offset.0 as u64, format!("{}", e)))
    }

    /// Return the null terminated string at an offset in a string section.
    pub(crate) fn string_at(&self, section: &'static str, offset: u64) -> Result<&'input [u8]> {
        Cursor::new(section, self.data(section), self.endian(), offset)?.cstr()
    }

    /// The contexts of a list section, loaded on first use.
    pub(crate) fn list_cache(&self, kind: ListSection) -> &RefCell<Option<Rc<Vec<ListContext>>>> {
        match kind {
            ListSection::Location => &self.loclists,
            ListSection::Range => &self.rnglists,
        }
    }
}

/// The size of a `.debug_loclists` or `.debug_rnglists` header.
pub(crate) fn list_header_size(offset_size: u8) -> u64 {
    if offset_size == 8 {
        20
    } else {
        12
    }
}

/// The `.debug_addr` contribution of one unit.
#[derive(Debug, Clone)]
struct AddressTable<'input> {
    debug_addr: DebugAddr<EndianSlice<'input, Endian>>,
    len: u64,
    base: u64,
    address_size: u8,
}

impl<'input> AddressTable<'input> {
    fn new(session: &Session<'input>, base: u64, address_size: u8) -> Result<Self> {
        match session.sections.section(DEBUG_ADDR) {
            Some(data) => Ok(AddressTable {
                debug_addr: DebugAddr::from(EndianSlice::new(data, session.endian())),
                len: data.len() as u64,
                base,
                address_size,
            }),
            None => Err(Error::Unresolvable {
                section: DEBUG_ADDR,
            }),
        }
    }

    fn get(&self, index: u64) -> Result<u64> {
        let size = u64::from(self.address_size);
        let count = self.len.saturating_sub(self.base) / size;
        if index >= count {
            return Err(Error::IndexOutOfRange {
                what: "address",
                index,
                count,
            });
        }
        self.debug_addr
            .get_address(
                self.address_size,
                DebugAddrBase(self.base as usize),
                DebugAddrIndex(index as usize),
            )
            .map_err(|e| Error::malformed(DEBUG_ADDR, self.base + index * size, format!("{}", e)))
    }
}

/// Resolves address indices for one unit.
///
/// The resolver does not borrow the sessions, so it can be kept while
/// walking lists.
#[derive(Debug, Clone)]
pub struct AddressResolver<'input> {
    table: Result<AddressTable<'input>>,
}

impl<'input> AddressResolver<'input> {
    /// Return the address at an index.
    pub fn resolve(&self, index: u64) -> Result<u64> {
        match &self.table {
            Ok(table) => table.get(index),
            Err(e) => Err(e.clone()),
        }
    }

    /// Returns true if the address table is available.
    pub fn is_available(&self) -> bool {
        self.table.is_ok()
    }
}
