use std::io::Write;

use parser::{UnitHeader, UnitKind};

use crate::print::{die, macros, PrintState};
use crate::Result;

fn kind_name(kind: UnitKind) -> &'static str {
    match kind {
        UnitKind::Compile => "compile",
        UnitKind::Partial => "partial",
        UnitKind::Type => "type",
        UnitKind::Skeleton => "skeleton",
        UnitKind::SplitCompile => "split compile",
        UnitKind::SplitType => "split type",
    }
}

/// Print the units of `.debug_info`, or of `.debug_types`.
pub(crate) fn print_units(state: &mut PrintState, is_info: bool) -> Result<()> {
    let session = state.session();
    while let Some(unit) = session.next_unit(is_info)? {
        let root = session.unit_root(&unit)?;
        let name = match root {
            Some(root) => session.name(root).unwrap_or_else(|e| {
                debug!("unit 0x{:x}: no name: {}", unit.offset(), e);
                None
            }),
            None => None,
        };
        if !state.options().filter_unit(name.as_ref().map(|name| &**name)) {
            continue;
        }
        print_unit(state, &unit)?;
    }
    Ok(())
}

fn print_unit(state: &mut PrintState, unit: &UnitHeader) -> Result<()> {
    let session = state.session();
    let options = state.options();
    let root = session.unit_root(unit)?;
    state.expanded(
        |state| {
            state.line(|w| {
                let section = if unit.is_info() {
                    "unit"
                } else {
                    "type unit"
                };
                write!(w, "{} 0x{:x}", section, unit.offset())?;
                Ok(())
            })
        },
        |state| {
            if options.category_unit {
                print_header(state, unit)?;
            }
            if let Some(root) = root {
                if options.category_die {
                    if options.filter_tag.is_some() {
                        for die in session.unit_dies(unit)? {
                            let die = die?;
                            if options.filter_tag(session.tag(die)?) {
                                die::print_entry(state, die)?;
                            }
                        }
                    } else {
                        die::print_tree(state, root)?;
                    }
                }
                if options.category_macro {
                    macros::print_macros(state, root)?;
                }
            }
            Ok(())
        },
    )
}

fn print_header(state: &mut PrintState, unit: &UnitHeader) -> Result<()> {
    state.field("kind", |w| {
        write!(w, "{}", kind_name(unit.kind()))?;
        Ok(())
    })?;
    state.field_u64("version", u64::from(unit.version()))?;
    state.field_u64("address size", u64::from(unit.address_size()))?;
    state.field_u64("offset size", u64::from(unit.offset_size()))?;
    state.field_hex("abbrev offset", unit.abbrev_offset())?;
    state.field_hex("length", unit.unit_length())?;
    if let Some(dwo_id) = unit.dwo_id() {
        state.field_hex("dwo id", dwo_id)?;
    }
    if let Some(signature) = unit.signature() {
        state.field("signature", |w| {
            write!(w, "0x{:016x}", signature)?;
            Ok(())
        })?;
    }
    if let Some(type_offset) = unit.type_offset() {
        state.field_hex("type offset", type_offset)?;
    }
    Ok(())
}
