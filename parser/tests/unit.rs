mod common;

use common::*;
use dietree_parser::constants::*;
use dietree_parser::{Error, Session, UnitKind};

fn abbrev() -> Vec<u8> {
    let mut abbrev = Writer::new();
    abbrev.uleb(1).uleb(0x11).u8(0).uleb(0).uleb(0);
    abbrev.uleb(0);
    abbrev.data
}

/// Two DWARF 4 units, each with a single root entry.
fn two_units() -> Vec<u8> {
    let mut info = Writer::new();
    for _ in 0..2 {
        let unit = info.unit_header(4, 8);
        info.uleb(1);
        info.end_length(unit);
    }
    info.data
}

#[test]
fn next_unit_wraps() {
    let sections = sections(&[(".debug_abbrev", abbrev()), (".debug_info", two_units())]);
    let session = Session::new(&sections);
    assert_eq!(session.current_unit(true).unwrap(), None);

    let first = session.next_unit(true).unwrap().unwrap();
    assert_eq!(first.offset(), 0);
    assert_eq!(first.end(), 12);
    assert_eq!(first.header_size(), 11);
    assert_eq!(first.kind(), UnitKind::Compile);
    assert_eq!(session.next_unit_offset(true), 12);
    assert_eq!(session.current_unit(true).unwrap(), Some(first));

    let second = session.next_unit(true).unwrap().unwrap();
    assert_eq!(second.offset(), 12);
    assert_eq!(second.first_die_offset(), 23);

    assert_eq!(session.next_unit(true).unwrap(), None);
    assert_eq!(session.next_unit_offset(true), 0);
    assert_eq!(session.current_unit(true).unwrap(), None);
    assert_eq!(session.next_unit(true).unwrap().unwrap().offset(), 0);

    // The type unit cursor is independent.
    assert_eq!(session.next_unit(false).unwrap(), None);
}

#[test]
fn malformed_header_keeps_cursor() {
    let mut info = Writer::new();
    let unit = info.unit_header(4, 8);
    info.uleb(1);
    info.end_length(unit);
    let unit = info.unit_header(9, 8);
    info.uleb(1);
    info.end_length(unit);
    let sections = sections(&[(".debug_abbrev", abbrev()), (".debug_info", info.data)]);
    let session = Session::new(&sections);

    session.next_unit(true).unwrap().unwrap();
    for _ in 0..2 {
        match session.next_unit(true) {
            Err(Error::Malformed {
                section, offset, ..
            }) => {
                assert_eq!(section, ".debug_info");
                assert_eq!(offset, 12);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(session.next_unit_offset(true), 12);
    }
    assert!(session.units(true).is_err());
}

#[test]
fn unit_lookup() {
    let sections = sections(&[(".debug_abbrev", abbrev()), (".debug_info", two_units())]);
    let session = Session::new(&sections);
    let units = session.units(true).unwrap();
    assert_eq!(
        units.iter().map(|unit| unit.offset()).collect::<Vec<_>>(),
        vec![0, 12]
    );
    // Listing the units does not move the cursor.
    assert_eq!(session.next_unit_offset(true), 0);

    assert_eq!(session.unit_containing(0, true).unwrap().unwrap().offset(), 0);
    assert_eq!(session.unit_containing(11, true).unwrap().unwrap().offset(), 0);
    assert_eq!(session.unit_containing(12, true).unwrap().unwrap().offset(), 12);
    assert_eq!(session.unit_containing(24, true).unwrap(), None);
    assert_eq!(session.unit_at(12, true).unwrap().offset(), 12);
    match session.unit_at(24, true) {
        Err(Error::NoUnitContext { offset }) => assert_eq!(offset, 24),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn type_unit() {
    let mut types = Writer::new();
    let unit = types.start_length();
    types.u16(4).u32(0).u8(8).u64(0x0123_4567_89ab_cdef).u32(23);
    assert_eq!(types.len(), 23);
    types.uleb(2).cstr("T");
    types.end_length(unit);

    let mut abbrev = Writer::new();
    abbrev.uleb(2).uleb(0x13).u8(0).uleb(0x03).uleb(0x08).uleb(0).uleb(0);
    abbrev.uleb(0);

    let sections = sections(&[(".debug_abbrev", abbrev.data), (".debug_types", types.data)]);
    let session = Session::new(&sections);
    let unit = session.next_unit(false).unwrap().unwrap();
    assert_eq!(unit.kind(), UnitKind::Type);
    assert!(unit.kind().is_type());
    assert!(!unit.is_info());
    assert_eq!(unit.signature(), Some(0x0123_4567_89ab_cdef));
    assert_eq!(unit.type_offset(), Some(23));
    assert_eq!(unit.first_die_offset(), 23);

    let die = session.die_at(unit.type_offset().unwrap(), false).unwrap();
    assert!(!die.is_info());
    assert_eq!(session.tag(die).unwrap(), DW_TAG_structure_type);
    assert_eq!(session.name(die).unwrap().unwrap(), "T");
    assert_eq!(session.next_unit(true).unwrap(), None);
}

#[test]
fn type_unit_version() {
    let mut types = Writer::new();
    let unit = types.unit_header_v5(2, 8);
    types.u64(1).u32(24);
    types.uleb(1);
    types.end_length(unit);
    let sections = sections(&[(".debug_abbrev", abbrev()), (".debug_types", types.data)]);
    let session = Session::new(&sections);
    match session.next_unit(false) {
        Err(Error::Malformed { section, .. }) => assert_eq!(section, ".debug_types"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn dwarf64_unit() {
    let mut info = Writer::new();
    info.u32(0xffff_ffff).u64(0);
    info.u16(4).u64(0).u8(8);
    assert_eq!(info.len(), 23);
    info.uleb(1);
    let length = info.len() - 12;
    info.data[4..12].copy_from_slice(&length.to_le_bytes());

    let sections = sections(&[(".debug_abbrev", abbrev()), (".debug_info", info.data)]);
    let session = Session::new(&sections);
    let unit = session.next_unit(true).unwrap().unwrap();
    assert_eq!(unit.offset_size(), 8);
    assert_eq!(unit.extension_size(), 4);
    assert_eq!(unit.unit_length(), 12);
    assert_eq!(unit.end(), 24);
    assert_eq!(unit.first_die_offset(), 23);
    let root = session.unit_root(&unit).unwrap().unwrap();
    assert_eq!(root.offset(), 23);
    assert_eq!(session.tag(root).unwrap(), DW_TAG_compile_unit);
}

#[test]
fn dwarf5_skeleton() {
    let mut info = Writer::new();
    let unit = info.unit_header_v5(4, 8);
    info.u64(0xd00d);
    assert_eq!(info.len(), 20);
    info.uleb(1);
    info.end_length(unit);
    let sections = sections(&[(".debug_abbrev", abbrev()), (".debug_info", info.data)]);
    let session = Session::new(&sections);
    let unit = session.next_unit(true).unwrap().unwrap();
    assert_eq!(unit.kind(), UnitKind::Skeleton);
    assert_eq!(unit.version(), 5);
    assert_eq!(unit.dwo_id(), Some(0xd00d));
    assert_eq!(unit.first_die_offset(), 20);
    assert!(session.die_at(20, true).is_ok());
}
