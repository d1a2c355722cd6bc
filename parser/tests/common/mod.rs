#![allow(dead_code)]

use dietree_parser::{RunTimeEndian, Sections};

/// Little endian DWARF byte writer.
#[derive(Debug, Default, Clone)]
pub struct Writer {
    pub data: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Writer::default()
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.data.push(value);
        self
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn uleb(&mut self, mut value: u64) -> &mut Self {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.data.push(byte);
                return self;
            }
            self.data.push(byte | 0x80);
        }
    }

    pub fn sleb(&mut self, mut value: i64) -> &mut Self {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
            if done {
                self.data.push(byte);
                return self;
            }
            self.data.push(byte | 0x80);
        }
    }

    pub fn cstr(&mut self, value: &str) -> &mut Self {
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        self
    }

    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.data.extend_from_slice(value);
        self
    }

    /// Start a 32-bit DWARF length field, to be completed by `end_length`.
    pub fn start_length(&mut self) -> usize {
        let offset = self.data.len();
        self.u32(0);
        offset
    }

    pub fn end_length(&mut self, offset: usize) {
        let length = (self.data.len() - offset - 4) as u32;
        self.data[offset..offset + 4].copy_from_slice(&length.to_le_bytes());
    }

    /// Append a DWARF 2-4 unit header with abbreviations at offset 0.
    /// Returns the offset of the length field.
    pub fn unit_header(&mut self, version: u16, address_size: u8) -> usize {
        let start = self.start_length();
        self.u16(version).u32(0).u8(address_size);
        start
    }

    /// Append a DWARF 5 unit header with abbreviations at offset 0.
    pub fn unit_header_v5(&mut self, unit_type: u8, address_size: u8) -> usize {
        let start = self.start_length();
        self.u16(5).u8(unit_type).u8(address_size).u32(0);
        start
    }
}

pub const DW_UT_COMPILE: u8 = 1;

pub fn sections(list: &[(&str, Vec<u8>)]) -> Sections<'static> {
    let mut sections = Sections::new(RunTimeEndian::Little);
    for (name, data) in list {
        sections.insert(name, data.clone());
    }
    sections
}

/// Offsets of the entries in the `a.c` fixture.
pub const A_C_ROOT: u64 = 11;
pub const A_C_MAIN: u64 = 16;
pub const A_C_NULL: u64 = 34;

/// A DWARF 4 unit for `a.c` containing a single function.
///
/// The root has a `DW_FORM_strp` name, and `main` has an address for
/// `DW_AT_low_pc` and an offset for `DW_AT_high_pc`.
pub fn a_c() -> Sections<'static> {
    let mut abbrev = Writer::new();
    // compile_unit, children: name strp
    abbrev.uleb(1).uleb(0x11).u8(1);
    abbrev.uleb(0x03).uleb(0x0e).uleb(0).uleb(0);
    // subprogram, no children: name string, low_pc addr, high_pc data4
    abbrev.uleb(2).uleb(0x2e).u8(0);
    abbrev.uleb(0x03).uleb(0x08);
    abbrev.uleb(0x11).uleb(0x01);
    abbrev.uleb(0x12).uleb(0x06);
    abbrev.uleb(0).uleb(0);
    abbrev.uleb(0);

    let mut strings = Writer::new();
    strings.cstr("xx").cstr("a.c");

    let mut info = Writer::new();
    let unit = info.unit_header(4, 8);
    assert_eq!(info.len(), A_C_ROOT);
    info.uleb(1).u32(3);
    assert_eq!(info.len(), A_C_MAIN);
    info.uleb(2).cstr("main").u64(0x1000).u32(0x20);
    assert_eq!(info.len(), A_C_NULL);
    info.u8(0);
    info.end_length(unit);

    sections(&[
        (".debug_abbrev", abbrev.data),
        (".debug_info", info.data),
        (".debug_str", strings.data),
    ])
}
