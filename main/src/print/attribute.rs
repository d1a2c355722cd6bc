use std::io::Write;

use parser::constants::*;
use parser::{Attribute, FormClass, Session};

use crate::print::{self, PrintState};
use crate::Result;

pub(crate) fn print_attribute<'input>(
    state: &mut PrintState<'_, 'input>,
    attr: &Attribute<'input>,
) -> Result<()> {
    let session = state.session();
    let tied = state.tied();
    let label = attr.name().to_string();
    state.field(&label, |w| {
        if let Err(e) = write_value(w, session, tied, attr) {
            debug!(
                "0x{:x}: {} value at 0x{:x}: {}",
                attr.die().offset(),
                attr.name(),
                attr.offset(),
                e
            );
            w.clear();
            write!(w, "<{}>", e)?;
        }
        Ok(())
    })?;
    if attr.name() == DW_AT_ranges {
        print_ranges(state, attr)?;
    }
    Ok(())
}

fn write_value<'input>(
    w: &mut Vec<u8>,
    session: &Session<'input>,
    tied: Option<&Session<'input>>,
    attr: &Attribute<'input>,
) -> Result<()> {
    match attr.form_class() {
        FormClass::Address => write!(w, "0x{:x}", session.address(attr, tied)?)?,
        FormClass::String => write!(w, "{}", session.string(attr)?)?,
        FormClass::Constant => write_constant(w, attr)?,
        FormClass::Flag => write!(w, "{}", attr.flag()?)?,
        FormClass::Reference => {
            if attr.form() == DW_FORM_ref_sig8 {
                write!(w, "signature 0x{:016x}", attr.signature()?)?;
            } else {
                write!(w, "<0x{:x}>", attr.global_reference()?)?;
            }
        }
        FormClass::Block => print::write_bytes(w, attr.block()?.bytes)?,
        FormClass::Exprloc => print::write_bytes(w, attr.exprloc()?.bytes)?,
        FormClass::LocList | FormClass::RangeList
            if attr.form() == DW_FORM_loclistx || attr.form() == DW_FORM_rnglistx =>
        {
            write!(w, "index {}", attr.list_index()?)?
        }
        class if class.is_section_pointer() => write!(w, "0x{:x}", attr.section_offset()?)?,
        _ => {
            write!(w, "{} ", attr.form())?;
            print::write_bytes(w, attr.value_bytes())?;
        }
    }
    Ok(())
}

fn write_constant(w: &mut Vec<u8>, attr: &Attribute) -> Result<()> {
    match attr.form() {
        DW_FORM_data16 => return print::write_bytes(w, attr.value_bytes()),
        DW_FORM_sdata | DW_FORM_implicit_const => {
            write!(w, "{}", attr.signed_constant()?)?;
            return Ok(());
        }
        _ => {}
    }
    let value = attr.unsigned_constant()?;
    let name = match attr.name() {
        DW_AT_language => DwLang(value as u16).static_string(),
        DW_AT_encoding => DwAte(value as u8).static_string(),
        DW_AT_accessibility => DwAccess(value as u8).static_string(),
        DW_AT_inline => DwInl(value as u8).static_string(),
        DW_AT_ordering => DwOrd(value as u8).static_string(),
        DW_AT_high_pc => {
            write!(w, "0x{:x}", value)?;
            return Ok(());
        }
        _ => None,
    };
    match name {
        Some(name) => write!(w, "{}", name)?,
        None => write!(w, "{}", value)?,
    }
    Ok(())
}

/// Print the resolved address ranges of a `DW_AT_ranges` attribute.
fn print_ranges<'input>(
    state: &mut PrintState<'_, 'input>,
    attr: &Attribute<'input>,
) -> Result<()> {
    let session = state.session();
    let tied = state.tied();
    let ranges = match session.die_ranges(attr.die(), tied) {
        Ok(ranges) => ranges,
        Err(e) => {
            debug!("0x{:x}: ignoring ranges: {}", attr.die().offset(), e);
            return Ok(());
        }
    };
    state.field_expanded("ranges", |state| {
        for range in ranges.list() {
            state.line(|w| {
                write!(w, "[0x{:x}, 0x{:x})", range.begin, range.end)?;
                Ok(())
            })?;
        }
        Ok(())
    })
}
