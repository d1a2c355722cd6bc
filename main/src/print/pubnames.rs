use std::io::Write;

use parser::Global;

use crate::print::PrintState;
use crate::Result;

pub(crate) fn print_pubnames(state: &mut PrintState) -> Result<()> {
    let session = state.session();
    if let Some(globals) = session.pubnames()? {
        print_globals(state, ".debug_pubnames", &globals)?;
    }
    if let Some(globals) = session.pubtypes()? {
        print_globals(state, ".debug_pubtypes", &globals)?;
    }
    Ok(())
}

fn print_globals(state: &mut PrintState, section: &str, globals: &[Global]) -> Result<()> {
    state.field_expanded(section, |state| {
        for global in globals {
            state.line(|w| {
                write!(
                    w,
                    "0x{:x}: {} (unit 0x{:x})",
                    global.die_offset, global.name, global.cu_offset
                )?;
                Ok(())
            })?;
        }
        Ok(())
    })
}
