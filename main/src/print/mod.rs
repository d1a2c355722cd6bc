use std::io::Write;

use parser::Session;

use crate::{Options, Result};

mod text;
pub use self::text::TextPrinter;

pub(crate) mod attribute;
pub(crate) mod die;
pub(crate) mod file;
pub(crate) mod list;
pub(crate) mod macros;
pub(crate) mod pubnames;
pub(crate) mod unit;

pub trait Printer {
    fn write_buf(&mut self, buf: &[u8]) -> Result<()>;

    fn line_break(&mut self) -> Result<()>;

    fn line(&mut self, label: &str, buf: &[u8]) -> Result<()>;

    /// Calls `body` to write an indented body to a temporary buffer.
    fn indent_body(
        &mut self,
        buf: &mut Vec<u8>,
        body: &mut dyn FnMut(&mut dyn Printer) -> Result<()>,
    ) -> Result<()>;

    /// Calls `header` to write the header, followed by a body previously
    /// written by `indent_body`.
    fn indent_header(
        &mut self,
        body: &[u8],
        header: &mut dyn FnMut(&mut dyn Printer) -> Result<()>,
    ) -> Result<()>;
}

pub(crate) struct PrintState<'a, 'input> {
    printer: &'a mut dyn Printer,

    // The remaining fields contain information that is commonly needed in print methods.
    session: &'a Session<'input>,
    tied: Option<&'a Session<'input>>,
    options: &'a Options,
}

impl<'a, 'input> PrintState<'a, 'input> {
    pub fn new(
        printer: &'a mut dyn Printer,
        session: &'a Session<'input>,
        tied: Option<&'a Session<'input>>,
        options: &'a Options,
    ) -> Self {
        PrintState {
            printer,
            session,
            tied,
            options,
        }
    }

    #[inline]
    pub fn session(&self) -> &'a Session<'input> {
        self.session
    }

    #[inline]
    pub fn tied(&self) -> Option<&'a Session<'input>> {
        self.tied
    }

    #[inline]
    pub fn options(&self) -> &'a Options {
        self.options
    }

    // Output the header with an indented body.
    // If optional is true, then only output if the body is not empty.
    fn indent_impl<FHeader, FBody>(
        &mut self,
        optional: bool,
        mut header: FHeader,
        mut body: FBody,
    ) -> Result<()>
    where
        FHeader: FnMut(&mut PrintState<'_, 'input>) -> Result<()>,
        FBody: FnMut(&mut PrintState<'_, 'input>) -> Result<()>,
    {
        let session = self.session;
        let tied = self.tied;
        let options = self.options;
        let mut body_buf = Vec::new();
        self.printer.indent_body(&mut body_buf, &mut |printer| {
            let mut state = PrintState::new(printer, session, tied, options);
            body(&mut state)
        })?;
        if !body_buf.is_empty() {
            self.printer.indent_header(&*body_buf, &mut |printer| {
                let mut state = PrintState::new(printer, session, tied, options);
                header(&mut state)
            })?;
        } else if !optional {
            header(self)?;
        }
        Ok(())
    }

    pub fn expanded<FHeader, FBody>(&mut self, header: FHeader, body: FBody) -> Result<()>
    where
        FHeader: FnMut(&mut PrintState<'_, 'input>) -> Result<()>,
        FBody: FnMut(&mut PrintState<'_, 'input>) -> Result<()>,
    {
        self.indent_impl(false, header, body)
    }

    pub fn field_expanded<FBody>(&mut self, label: &str, body: FBody) -> Result<()>
    where
        FBody: FnMut(&mut PrintState<'_, 'input>) -> Result<()>,
    {
        self.indent_impl(true, |state| state.label(label), body)
    }

    pub fn line_break(&mut self) -> Result<()> {
        self.printer.line_break()
    }

    pub fn label(&mut self, label: &str) -> Result<()> {
        self.printer.line(label, &[])
    }

    fn line_impl<F>(&mut self, label: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Vec<u8>) -> Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf)?;
        if !buf.is_empty() {
            self.printer.line(label, &*buf)?;
        }
        Ok(())
    }

    pub fn line<F>(&mut self, f: F) -> Result<()>
    where
        F: FnMut(&mut Vec<u8>) -> Result<()>,
    {
        self.line_impl("", f)
    }

    pub fn field<F>(&mut self, label: &str, f: F) -> Result<()>
    where
        F: FnMut(&mut Vec<u8>) -> Result<()>,
    {
        self.line_impl(label, f)
    }

    pub fn field_u64(&mut self, label: &str, arg: u64) -> Result<()> {
        self.field(label, |w| {
            write!(w, "{}", arg)?;
            Ok(())
        })
    }

    pub fn field_hex(&mut self, label: &str, arg: u64) -> Result<()> {
        self.field(label, |w| {
            write!(w, "0x{:x}", arg)?;
            Ok(())
        })
    }
}

/// Write bytes as space separated hex.
pub(crate) fn write_bytes(w: &mut dyn Write, bytes: &[u8]) -> Result<()> {
    write!(w, "[")?;
    for (i, byte) in bytes.iter().enumerate() {
        if i != 0 {
            write!(w, " ")?;
        }
        write!(w, "{:02x}", byte)?;
    }
    write!(w, "]")?;
    Ok(())
}
