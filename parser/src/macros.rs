use std::borrow::Cow;

use fnv::FnvHashMap as HashMap;
use gimli::constants::*;
use gimli::{DwForm, DwMacro};

use crate::attribute::skip_form;
use crate::die::Die;
use crate::file::{DEBUG_MACRO, DEBUG_STR};
use crate::reader::Cursor;
use crate::session::Session;
use crate::unit::Encoding;
use crate::{Error, Result};

/// The header of a `.debug_macro` unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroUnitHeader {
    pub version: u16,
    /// The section offset of the header.
    pub offset: u64,
    /// The size of the unit, including the header and the final null opcode.
    pub total_length: u64,
    pub header_length: u64,
    pub flags: u8,
    /// The `.debug_line` offset, if the flags include it.
    pub line_offset: Option<u64>,
    pub offset_size_64: bool,
    pub has_operands_table: bool,
    pub operands_table_count: u8,
}

const FLAG_OFFSET_SIZE: u8 = 1;
const FLAG_LINE_OFFSET: u8 = 2;
const FLAG_OPERANDS_TABLE: u8 = 4;

/// One operation of a macro unit.
#[derive(Debug, Clone)]
pub struct MacroOperation<'input> {
    /// The position of the operation in the unit.
    pub index: usize,
    /// The section offset of the opcode.
    pub offset: u64,
    pub opcode: DwMacro,
    /// The forms of the operands.
    pub forms: Vec<DwForm>,
    operands: Cursor<'input>,
}

impl<'input> MacroOperation<'input> {
    fn is_def_undef(&self) -> bool {
        match self.opcode {
            DW_MACRO_define | DW_MACRO_undef | DW_MACRO_define_strp | DW_MACRO_undef_strp
            | DW_MACRO_define_sup | DW_MACRO_undef_sup | DW_MACRO_define_strx
            | DW_MACRO_undef_strx => true,
            _ => false,
        }
    }
}

/// A decoded `DW_MACRO_define*` or `DW_MACRO_undef*` operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDefUndef<'input> {
    pub line: u64,
    pub index: usize,
    pub offset: u64,
    pub forms_count: usize,
    /// The macro text. This is `None` for strings in a supplementary object file.
    pub string: Option<Cow<'input, str>>,
}

/// A decoded `DW_MACRO_start_file` or `DW_MACRO_end_file` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroFile {
    Start { line: u64, file_index: u64 },
    End,
}

/// A macro unit and its operations.
#[derive(Debug, Clone)]
pub struct MacroUnit<'input> {
    header: MacroUnitHeader,
    die: Die,
    operations: Vec<MacroOperation<'input>>,
}

fn standard_forms(opcode: DwMacro, offset_form: DwForm) -> Option<Vec<DwForm>> {
    let forms = match opcode {
        DW_MACRO_define | DW_MACRO_undef => vec![DW_FORM_udata, DW_FORM_string],
        DW_MACRO_start_file => vec![DW_FORM_udata, DW_FORM_udata],
        DW_MACRO_end_file => Vec::new(),
        DW_MACRO_define_strp | DW_MACRO_undef_strp => vec![DW_FORM_udata, DW_FORM_strp],
        DW_MACRO_import | DW_MACRO_import_sup => vec![offset_form],
        DW_MACRO_define_sup | DW_MACRO_undef_sup => vec![DW_FORM_udata, DW_FORM_strp_sup],
        DW_MACRO_define_strx | DW_MACRO_undef_strx => vec![DW_FORM_udata, DW_FORM_strx],
        _ => return None,
    };
    Some(forms)
}

impl<'input> MacroUnit<'input> {
    fn parse(data: &'input [u8], session: &Session<'input>, die: Die, offset: u64) -> Result<Self> {
        let context = session.die_context(die)?;
        let mut r = Cursor::new(DEBUG_MACRO, data, session.endian(), offset)?;
        let version = r.u16()?;
        if version != 4 && version != 5 {
            return Err(Error::malformed(
                DEBUG_MACRO,
                offset,
                format!("unsupported macro version {}", version),
            ));
        }
        let flags = r.u8()?;
        let offset_size_64 = flags & FLAG_OFFSET_SIZE != 0;
        let offset_size = if offset_size_64 { 8 } else { 4 };
        let line_offset = if flags & FLAG_LINE_OFFSET != 0 {
            Some(r.offset_sized(offset_size)?)
        } else {
            None
        };

        let mut table = HashMap::default();
        let has_operands_table = flags & FLAG_OPERANDS_TABLE != 0;
        let mut operands_table_count = 0;
        if has_operands_table {
            operands_table_count = r.u8()?;
            for _ in 0..operands_table_count {
                let opcode = DwMacro(r.u8()?);
                let count = r.uleb128()?;
                let mut forms = Vec::new();
                for _ in 0..count {
                    forms.push(DwForm(u16::from(r.u8()?)));
                }
                table.insert(opcode, forms);
            }
        }
        let header_length = r.offset() - offset;

        let encoding = Encoding {
            version: context.header.version(),
            address_size: context.header.address_size(),
            offset_size,
        };
        let offset_form = DW_FORM_sec_offset;
        let mut operations = Vec::new();
        loop {
            let op_offset = r.offset();
            let opcode = DwMacro(r.u8()?);
            let forms = if opcode.0 == 0 {
                Vec::new()
            } else if let Some(forms) = table.get(&opcode) {
                if standard_forms(opcode, offset_form).is_none() {
                    debug!(
                        "{} 0x{:x}: skipping vendor macro opcode {}",
                        DEBUG_MACRO, op_offset, opcode
                    );
                }
                forms.clone()
            } else if let Some(forms) = standard_forms(opcode, offset_form) {
                forms
            } else {
                return Err(Error::malformed(
                    DEBUG_MACRO,
                    op_offset,
                    format!("unknown macro opcode 0x{:x}", opcode.0),
                ));
            };
            let operands = r;
            for form in &forms {
                skip_form(&mut r, *form, encoding)?;
            }
            operations.push(MacroOperation {
                index: operations.len(),
                offset: op_offset,
                opcode,
                forms,
                operands,
            });
            if opcode.0 == 0 {
                break;
            }
        }

        Ok(MacroUnit {
            header: MacroUnitHeader {
                version,
                offset,
                total_length: r.offset() - offset,
                header_length,
                flags,
                line_offset,
                offset_size_64,
                has_operands_table,
                operands_table_count,
            },
            die,
            operations,
        })
    }

    pub fn header(&self) -> &MacroUnitHeader {
        &self.header
    }

    /// The unit entry that the macro unit was opened for.
    pub fn die(&self) -> Die {
        self.die
    }

    /// The number of operations, including the final null opcode.
    pub fn opcode_count(&self) -> usize {
        self.operations.len()
    }

    pub fn operations(&self) -> &[MacroOperation<'input>] {
        &self.operations
    }

    pub fn operation(&self, index: usize) -> Result<&MacroOperation<'input>> {
        self.operations
            .get(index)
            .ok_or_else(|| Error::IndexOutOfRange {
                what: "macro operation",
                index: index as u64,
                count: self.operations.len() as u64,
            })
    }

    fn offset_size(&self) -> u8 {
        if self.header.offset_size_64 {
            8
        } else {
            4
        }
    }

    /// Decode a define or undef operation.
    ///
    /// Returns `None` if the operation is of another kind.
    pub fn def_undef(
        &self,
        session: &Session<'input>,
        index: usize,
    ) -> Result<Option<MacroDefUndef<'input>>> {
        let op = self.operation(index)?;
        if !op.is_def_undef() {
            return Ok(None);
        }
        let mut r = op.operands;
        let line = r.uleb128()?;
        let string = match op.opcode {
            DW_MACRO_define | DW_MACRO_undef => Some(r.cstr()?),
            DW_MACRO_define_strp | DW_MACRO_undef_strp => {
                let offset = r.offset_sized(self.offset_size())?;
                Some(session.string_at(DEBUG_STR, offset)?)
            }
            DW_MACRO_define_strx | DW_MACRO_undef_strx => {
                let index = r.uleb128()?;
                Some(session.indexed_string(self.die, index)?)
            }
            _ => None,
        };
        Ok(Some(MacroDefUndef {
            line,
            index,
            offset: op.offset,
            forms_count: op.forms.len(),
            string: string.map(String::from_utf8_lossy),
        }))
    }

    /// Decode a start file or end file operation.
    ///
    /// Returns `None` if the operation is of another kind.
    pub fn start_end_file(&self, index: usize) -> Result<Option<MacroFile>> {
        let op = self.operation(index)?;
        let mut r = op.operands;
        match op.opcode {
            DW_MACRO_start_file => {
                let line = r.uleb128()?;
                let file_index = r.uleb128()?;
                Ok(Some(MacroFile::Start { line, file_index }))
            }
            DW_MACRO_end_file => Ok(Some(MacroFile::End)),
            _ => Ok(None),
        }
    }

    /// The `.debug_macro` offset of an import operation.
    ///
    /// Returns `None` if the operation is of another kind. The offset of a
    /// `DW_MACRO_import_sup` operation is in a supplementary object file.
    pub fn import_offset(&self, index: usize) -> Result<Option<u64>> {
        let op = self.operation(index)?;
        let mut r = op.operands;
        match op.opcode {
            DW_MACRO_import | DW_MACRO_import_sup => Ok(Some(r.offset_sized(self.offset_size())?)),
            _ => Ok(None),
        }
    }
}

impl<'input> Session<'input> {
    /// Open the macro unit referenced by a unit entry.
    ///
    /// Returns `None` if the entry has no `DW_AT_macros` or `DW_AT_GNU_macros`
    /// attribute, or there is no `.debug_macro` section.
    pub fn macro_unit(&self, die: Die) -> Result<Option<MacroUnit<'input>>> {
        let attr = match self.attribute(die, DW_AT_macros)? {
            Some(attr) => attr,
            None => match self.attribute(die, DW_AT_GNU_macros)? {
                Some(attr) => attr,
                None => return Ok(None),
            },
        };
        let offset = attr.section_offset()?;
        self.macro_unit_at(die, offset)
    }

    /// Open the macro unit at a `.debug_macro` offset, such as the target
    /// of an import operation.
    ///
    /// The entry provides the unit used to decode string operands.
    pub fn macro_unit_at(&self, die: Die, offset: u64) -> Result<Option<MacroUnit<'input>>> {
        match self.sections().section(DEBUG_MACRO) {
            Some(data) => MacroUnit::parse(data, self, die, offset).map(Some),
            None => Ok(None),
        }
    }
}
