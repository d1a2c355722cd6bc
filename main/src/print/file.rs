use parser::{ListSection, Session};

use crate::print::{list, pubnames, unit, PrintState, Printer};
use crate::{Options, Result};

/// Print the DWARF sections of a session.
///
/// `tied` is the session of the companion object for split DWARF. It is
/// used to resolve address indices and base addresses.
pub fn print<'input>(
    session: &Session<'input>,
    tied: Option<&Session<'input>>,
    printer: &mut dyn Printer,
    options: &Options,
) -> Result<()> {
    let mut state = PrintState::new(printer, session, tied, options);
    if options.category_unit || options.category_die || options.category_macro {
        unit::print_units(&mut state, true)?;
        unit::print_units(&mut state, false)?;
    }
    if options.category_loclists {
        list::print_lists(&mut state, ListSection::Location)?;
    }
    if options.category_rnglists {
        list::print_lists(&mut state, ListSection::Range)?;
    }
    if options.category_pubnames {
        pubnames::print_pubnames(&mut state)?;
    }
    Ok(())
}
