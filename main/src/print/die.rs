use std::io::Write;

use parser::Die;

use crate::print::attribute;
use crate::print::PrintState;
use crate::Result;

/// Print an entry, its attributes, and its children.
pub(crate) fn print_tree(state: &mut PrintState, die: Die) -> Result<()> {
    print_die(state, die, true)
}

/// Print an entry and its attributes, without its children.
pub(crate) fn print_entry(state: &mut PrintState, die: Die) -> Result<()> {
    print_die(state, die, false)
}

fn print_die(state: &mut PrintState, die: Die, children: bool) -> Result<()> {
    let session = state.session();
    let tag = session.tag(die)?;
    state.expanded(
        |state| {
            state.line(|w| {
                write!(w, "0x{:x}: {}", die.offset(), tag)?;
                Ok(())
            })
        },
        |state| {
            if state.options().category_attribute {
                for attr in session.attributes(die)? {
                    attribute::print_attribute(state, &attr)?;
                }
            }
            if children {
                for child in session.children(die) {
                    print_die(state, child?, true)?;
                }
            }
            Ok(())
        },
    )
}
