use std::fmt;

use gimli::constants::*;
use gimli::{DwAt, DwForm};

/// The class of an attribute value, derived from its form.
///
/// DWARF 5 section 7.5.5 defines the classes. Section pointer classes
/// (`*Ptr`) describe offsets into other sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormClass {
    Address,
    /// An offset into `.debug_addr`.
    AddrPtr,
    Block,
    Constant,
    Exprloc,
    Flag,
    /// An offset into `.debug_line`.
    LinePtr,
    /// A DWARF 5 location list (`loclistx` or an offset into `.debug_loclists`).
    LocList,
    /// A DWARF 2-4 offset into `.debug_loc`, or the `DW_AT_loclists_base` offset.
    LocListPtr,
    /// An offset into `.debug_macinfo`.
    MacPtr,
    /// An offset into `.debug_macro`.
    MacroPtr,
    /// A DWARF 5 range list (`rnglistx` or an offset into `.debug_rnglists`).
    RangeList,
    /// A DWARF 2-4 offset into `.debug_ranges`, or the `DW_AT_rnglists_base` offset.
    RangeListPtr,
    Reference,
    /// An offset into `.debug_str_offsets`.
    StrOffsetsPtr,
    String,
    Unknown,
}

impl FormClass {
    /// Returns true for classes whose values are offsets into another section.
    pub fn is_section_pointer(self) -> bool {
        match self {
            FormClass::AddrPtr
            | FormClass::LinePtr
            | FormClass::LocList
            | FormClass::LocListPtr
            | FormClass::MacPtr
            | FormClass::MacroPtr
            | FormClass::RangeList
            | FormClass::RangeListPtr
            | FormClass::StrOffsetsPtr => true,
            _ => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FormClass::Address => "address",
            FormClass::AddrPtr => "addrptr",
            FormClass::Block => "block",
            FormClass::Constant => "constant",
            FormClass::Exprloc => "exprloc",
            FormClass::Flag => "flag",
            FormClass::LinePtr => "lineptr",
            FormClass::LocList => "loclist",
            FormClass::LocListPtr => "loclistptr",
            FormClass::MacPtr => "macptr",
            FormClass::MacroPtr => "macroptr",
            FormClass::RangeList => "rnglist",
            FormClass::RangeListPtr => "rangelistptr",
            FormClass::Reference => "reference",
            FormClass::StrOffsetsPtr => "stroffsetsptr",
            FormClass::String => "string",
            FormClass::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FormClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Determine the class of a form.
///
/// `DW_FORM_data4` and `DW_FORM_data8` were also used as section offsets
/// before DWARF 4. For those versions, when the data size matches the
/// offset size, the attribute number decides between a constant and a
/// section pointer.
///
/// `DW_FORM_indirect` has no class of its own and returns `Unknown`;
/// callers should pass the effective form.
pub fn form_class(version: u16, name: DwAt, offset_size: u8, form: DwForm) -> FormClass {
    match form {
        DW_FORM_addr | DW_FORM_addrx | DW_FORM_addrx1 | DW_FORM_addrx2 | DW_FORM_addrx3
        | DW_FORM_addrx4 | DW_FORM_GNU_addr_index => FormClass::Address,

        DW_FORM_data4 if version <= 3 && offset_size == 4 => {
            pointer_class(version, name).unwrap_or(FormClass::Constant)
        }
        DW_FORM_data8 if version <= 3 && offset_size == 8 => {
            pointer_class(version, name).unwrap_or(FormClass::Constant)
        }
        DW_FORM_data1 | DW_FORM_data2 | DW_FORM_data4 | DW_FORM_data8 | DW_FORM_data16
        | DW_FORM_udata | DW_FORM_sdata | DW_FORM_implicit_const => FormClass::Constant,

        DW_FORM_sec_offset => pointer_class(version, name).unwrap_or(FormClass::Unknown),

        DW_FORM_string | DW_FORM_strp | DW_FORM_line_strp | DW_FORM_strp_sup | DW_FORM_strx
        | DW_FORM_strx1 | DW_FORM_strx2 | DW_FORM_strx3 | DW_FORM_strx4
        | DW_FORM_GNU_str_index | DW_FORM_GNU_strp_alt => FormClass::String,

        DW_FORM_ref_addr | DW_FORM_ref1 | DW_FORM_ref2 | DW_FORM_ref4 | DW_FORM_ref8
        | DW_FORM_ref_udata | DW_FORM_ref_sig8 | DW_FORM_ref_sup4 | DW_FORM_ref_sup8
        | DW_FORM_GNU_ref_alt => FormClass::Reference,

        DW_FORM_exprloc => FormClass::Exprloc,
        DW_FORM_flag | DW_FORM_flag_present => FormClass::Flag,
        DW_FORM_block | DW_FORM_block1 | DW_FORM_block2 | DW_FORM_block4 => FormClass::Block,
        DW_FORM_loclistx => FormClass::LocList,
        DW_FORM_rnglistx => FormClass::RangeList,
        _ => FormClass::Unknown,
    }
}

/// The section pointer class that an attribute takes when encoded as an offset.
fn pointer_class(version: u16, name: DwAt) -> Option<FormClass> {
    let class = match name {
        DW_AT_stmt_list => FormClass::LinePtr,
        DW_AT_macro_info => FormClass::MacPtr,
        DW_AT_macros | DW_AT_GNU_macros => FormClass::MacroPtr,
        DW_AT_str_offsets_base => FormClass::StrOffsetsPtr,
        DW_AT_addr_base | DW_AT_GNU_addr_base => FormClass::AddrPtr,
        DW_AT_rnglists_base | DW_AT_GNU_ranges_base => FormClass::RangeListPtr,
        DW_AT_loclists_base => FormClass::LocListPtr,
        DW_AT_ranges | DW_AT_start_scope => {
            if version >= 5 {
                FormClass::RangeList
            } else {
                FormClass::RangeListPtr
            }
        }
        DW_AT_location
        | DW_AT_string_length
        | DW_AT_return_addr
        | DW_AT_data_member_location
        | DW_AT_frame_base
        | DW_AT_segment
        | DW_AT_static_link
        | DW_AT_use_location
        | DW_AT_vtable_elem_location
        | DW_AT_GNU_locviews => {
            if version >= 5 {
                FormClass::LocList
            } else {
                FormClass::LocListPtr
            }
        }
        _ => return None,
    };
    Some(class)
}

/// Returns true if the form's value is an index into `.debug_str_offsets`.
pub(crate) fn is_string_index(form: DwForm) -> bool {
    match form {
        DW_FORM_strx | DW_FORM_strx1 | DW_FORM_strx2 | DW_FORM_strx3 | DW_FORM_strx4
        | DW_FORM_GNU_str_index => true,
        _ => false,
    }
}

/// Returns true if the form's value is an index into `.debug_addr`.
pub fn is_address_index(form: DwForm) -> bool {
    match form {
        DW_FORM_addrx | DW_FORM_addrx1 | DW_FORM_addrx2 | DW_FORM_addrx3 | DW_FORM_addrx4
        | DW_FORM_GNU_addr_index => true,
        _ => false,
    }
}
