use std::io::Write;

use parser::{ListContext, ListEntry, ListSection, ResolvedPc};

use crate::print::{self, PrintState};
use crate::Result;

/// Print every context of `.debug_loclists` or `.debug_rnglists`.
pub(crate) fn print_lists(state: &mut PrintState, kind: ListSection) -> Result<()> {
    let session = state.session();
    let count = session.load_lists(kind)?;
    for index in 0..count {
        if let Some(context) = session.list_context(kind, index)? {
            print_context(state, kind, &context)?;
        }
    }
    Ok(())
}

fn print_context(state: &mut PrintState, kind: ListSection, context: &ListContext) -> Result<()> {
    let session = state.session();
    state.expanded(
        |state| {
            state.line(|w| {
                write!(
                    w,
                    "{} 0x{:x}",
                    kind.section_name(),
                    context.header_offset
                )?;
                Ok(())
            })
        },
        |state| {
            state.field_u64("version", u64::from(context.version))?;
            state.field_u64("address size", u64::from(context.address_size))?;
            state.field_u64("offset entries", u64::from(context.offset_entry_count))?;
            for index in 0..u64::from(context.offset_entry_count) {
                if let Some((value, offset)) = session.offset_table_entry(kind, context, index)? {
                    state.line(|w| {
                        write!(w, "offset[{}]: 0x{:x} (0x{:x})", index, value, offset)?;
                        Ok(())
                    })?;
                }
            }
            for entry in session.list_records(kind, context)? {
                let entry = entry?;
                state.line(|w| write_entry(w, &entry))?;
            }
            Ok(())
        },
    )
}

fn write_entry(w: &mut Vec<u8>, entry: &ListEntry) -> Result<()> {
    write!(w, "0x{:x}: {}", entry.offset, entry.kind.name())?;
    match &entry.pc {
        ResolvedPc::None => {}
        ResolvedPc::Range(range) => write!(w, " [0x{:x}, 0x{:x})", range.begin, range.end)?,
        ResolvedPc::Unavailable(_) => write!(
            w,
            " <unresolved 0x{:x}, 0x{:x}>",
            entry.operands.0, entry.operands.1
        )?,
    }
    if let Some(expression) = entry.expression {
        write!(w, " ")?;
        print::write_bytes(w, expression.bytes)?;
    }
    Ok(())
}
