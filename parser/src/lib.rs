//! Lazy navigation of DWARF debugging information.
//!
//! A [`Session`] borrows the DWARF sections of one object file and walks
//! compilation units, debugging information entries and their attributes
//! directly from the section bytes. Nothing is materialized up front:
//! a [`Die`] is just a section offset plus the offset of its unit.

// Enable some rust 2018 idioms.
#![warn(bare_trait_objects)]
#![warn(unused_extern_crates)]
// Calm down clippy.
#![allow(clippy::type_complexity)]

#[macro_use]
extern crate log;

mod abbrev;
mod attribute;
mod die;
mod file;
mod form;
mod list;
mod macros;
mod pubnames;
mod range;
mod reader;
mod session;
mod unit;

pub use crate::attribute::*;
pub use crate::die::*;
pub use crate::file::*;
pub use crate::form::*;
pub use crate::list::*;
pub use crate::macros::*;
pub use crate::pubnames::*;
pub use crate::range::*;
pub use crate::session::*;
pub use crate::unit::*;

/// DWARF constants (`DW_TAG_*`, `DW_AT_*`, `DW_FORM_*`, ...).
pub use gimli::constants;
pub use gimli::RunTimeEndian;

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::io;
use std::result;

/// An error while navigating DWARF data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The section contents could not be decoded.
    Malformed {
        section: &'static str,
        offset: u64,
        message: Cow<'static, str>,
    },
    /// The offset does not refer to a debugging information entry.
    InvalidOffset { section: &'static str, offset: u64 },
    /// An attribute was decoded through an accessor for a different form class.
    WrongForm {
        expected: FormClass,
        form: gimli::DwForm,
    },
    /// An index was beyond the end of a table.
    IndexOutOfRange {
        what: &'static str,
        index: u64,
        count: u64,
    },
    /// The value lives in a section of another object that is not available.
    Unresolvable { section: &'static str },
    /// No compilation unit starts at the given offset.
    NoUnitContext { offset: u64 },
    Other(Cow<'static, str>),
}

impl Error {
    pub(crate) fn malformed<M>(section: &'static str, offset: u64, message: M) -> Error
    where
        M: Into<Cow<'static, str>>,
    {
        Error::Malformed {
            section,
            offset,
            message: message.into(),
        }
    }

    /// Returns true if the error was caused by missing cross-object data,
    /// and may succeed once the companion object is available.
    pub fn is_unresolvable(&self) -> bool {
        match self {
            Error::Unresolvable { .. } => true,
            _ => false,
        }
    }
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Malformed {
                section,
                offset,
                message,
            } => write!(f, "{} at offset 0x{:x}: {}", section, offset, message),
            Error::InvalidOffset { section, offset } => write!(
                f,
                "{} offset 0x{:x} is not the offset of a debugging information entry",
                section, offset
            ),
            Error::WrongForm { expected, form } => {
                write!(f, "expected form class {}, found {}", expected, form)
            }
            Error::IndexOutOfRange { what, index, count } => {
                write!(f, "{} index {} out of range (count {})", what, index, count)
            }
            Error::Unresolvable { section } => {
                write!(f, "{} is not available; a tied object may be required", section)
            }
            Error::NoUnitContext { offset } => {
                write!(f, "no compilation unit at offset 0x{:x}", offset)
            }
            Error::Other(s) => write!(f, "{}", s),
        }
    }
}

impl From<&'static str> for Error {
    fn from(s: &'static str) -> Error {
        Error::Other(Cow::Borrowed(s))
    }
}

impl From<String> for Error {
    fn from(s: String) -> Error {
        Error::Other(Cow::Owned(s))
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Other(Cow::Owned(format!("IO error: {}", e)))
    }
}

impl From<gimli::Error> for Error {
    fn from(e: gimli::Error) -> Error {
        Error::Other(Cow::Owned(format!("DWARF error: {}", e)))
    }
}

impl From<object::Error> for Error {
    fn from(e: object::Error) -> Error {
        Error::Other(Cow::Owned(format!("object error: {}", e)))
    }
}

pub type Result<T> = result::Result<T, Error>;
