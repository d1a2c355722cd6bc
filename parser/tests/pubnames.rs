mod common;

use common::*;
use dietree_parser::{Error, Session};

fn set(w: &mut Writer, version: u16, info_offset: u32, names: &[(u32, &str)]) {
    let start = w.start_length();
    w.u16(version).u32(info_offset).u32(35);
    for &(offset, name) in names {
        w.u32(offset).cstr(name);
    }
    w.u32(0);
    w.end_length(start);
}

#[test]
fn pubnames() {
    let mut sections = a_c();
    let mut w = Writer::new();
    set(&mut w, 2, 0, &[(A_C_MAIN as u32, "main")]);
    assert_eq!(w.len(), 27);
    set(&mut w, 2, 0x100, &[(0x20, "x"), (0x28, "y")]);
    sections.insert(".debug_pubnames", w.data);

    let session = Session::new(&sections);
    assert_eq!(session.pubtypes().unwrap(), None);
    let globals = session.pubnames().unwrap().unwrap();
    assert_eq!(globals.len(), 3);

    let main = &globals[0];
    assert_eq!(main.name, "main");
    assert_eq!(main.die_offset, A_C_MAIN);
    assert_eq!(main.cu_offset, 0);
    assert_eq!(main.header.pub_header_offset, 0);
    assert_eq!(main.header.offset_size, 4);
    assert_eq!(main.header.unit_length, 23);
    assert_eq!(main.header.version, 2);
    assert_eq!(main.header.info_length, 35);
    let die = session.die_at(main.die_offset, true).unwrap();
    assert_eq!(session.name(die).unwrap().unwrap(), "main");

    assert_eq!(globals[1].name, "x");
    assert_eq!(globals[1].die_offset, 0x120);
    assert_eq!(globals[2].die_offset, 0x128);
    assert_eq!(globals[2].cu_offset, 0x100);
    assert_eq!(globals[2].header.pub_header_offset, 27);
}

#[test]
fn pubtypes_version() {
    let mut sections = a_c();
    let mut w = Writer::new();
    set(&mut w, 3, 0, &[(A_C_MAIN as u32, "main")]);
    sections.insert(".debug_pubtypes", w.data);

    let session = Session::new(&sections);
    match session.pubtypes() {
        Err(Error::Malformed {
            section, offset, ..
        }) => {
            assert_eq!(section, ".debug_pubtypes");
            assert_eq!(offset, 0);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(session.pubnames().unwrap(), None);
}

#[test]
fn oversized_set_length() {
    let mut sections = a_c();
    let mut w = Writer::new();
    w.u32(0xffff_ffff).u64(u64::max_value());
    w.u16(2).u64(0).u64(35);
    sections.insert(".debug_pubnames", w.data);

    let session = Session::new(&sections);
    match session.pubnames() {
        Err(Error::Malformed {
            section, offset, ..
        }) => {
            assert_eq!(section, ".debug_pubnames");
            assert_eq!(offset, 0);
        }
        other => panic!("unexpected {:?}", other),
    }
}
