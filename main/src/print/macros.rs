use std::io::Write;

use parser::constants::*;
use parser::{Die, MacroFile, MacroUnit};

use crate::print::PrintState;
use crate::Result;

/// Print the macro unit of a unit's root entry, if it has one.
pub(crate) fn print_macros(state: &mut PrintState, root: Die) -> Result<()> {
    let session = state.session();
    let unit = match session.macro_unit(root) {
        Ok(Some(unit)) => unit,
        Ok(None) => return Ok(()),
        Err(e) => {
            warn!("0x{:x}: invalid macro unit: {}", root.offset(), e);
            return Ok(());
        }
    };
    print_macro_unit(state, &unit)
}

fn print_macro_unit<'input>(
    state: &mut PrintState<'_, 'input>,
    unit: &MacroUnit<'input>,
) -> Result<()> {
    let header = unit.header();
    state.expanded(
        |state| {
            state.line(|w| {
                write!(
                    w,
                    "macros 0x{:x} (version {})",
                    header.offset, header.version
                )?;
                Ok(())
            })
        },
        |state| {
            let session = state.session();
            for op in unit.operations() {
                if op.opcode.0 == 0 {
                    break;
                }
                let index = op.index;
                state.line(|w| {
                    write!(w, "0x{:x}: ", op.offset)?;
                    if let Some(def) = unit.def_undef(session, index)? {
                        let kind = match op.opcode {
                            DW_MACRO_define | DW_MACRO_define_strp | DW_MACRO_define_sup
                            | DW_MACRO_define_strx => "define",
                            _ => "undef",
                        };
                        write!(w, "{} line {}: ", kind, def.line)?;
                        match def.string {
                            Some(string) => write!(w, "{}", string)?,
                            None => write!(w, "<supplementary string>")?,
                        }
                    } else if let Some(file) = unit.start_end_file(index)? {
                        match file {
                            MacroFile::Start { line, file_index } => {
                                write!(w, "start_file line {}: file {}", line, file_index)?
                            }
                            MacroFile::End => write!(w, "end_file")?,
                        }
                    } else if let Some(offset) = unit.import_offset(index)? {
                        write!(w, "import 0x{:x}", offset)?;
                    } else {
                        write!(w, "{} ({} operands)", op.opcode, op.forms.len())?;
                    }
                    Ok(())
                })?;
            }
            Ok(())
        },
    )
}
