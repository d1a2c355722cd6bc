mod common;

use common::*;
use dietree_parser::constants::*;
use dietree_parser::{
    Error, ListEntryKind, ListSection, Range, ResolvedPc, Session,
};

/// A `.debug_loclists` context with two lists.
///
/// ```text
/// 0  header, 2 offsets
/// 20 start_end 0x1000..0x1010
/// 39 start_end 0x1010..0x1020
/// 58 end_of_list
/// 59 start_length 0x3000, 0x10
/// 71 end_of_list
/// ```
fn loclists() -> Vec<u8> {
    let mut w = Writer::new();
    let start = w.start_length();
    w.u16(5).u8(8).u8(0).u32(2);
    w.u32(20 - 12).u32(59 - 12);
    assert_eq!(w.len(), 20);
    w.u8(0x07).u64(0x1000).u64(0x1010).uleb(1).u8(0x50);
    w.u8(0x07).u64(0x1010).u64(0x1020).uleb(1).u8(0x51);
    w.u8(0x00);
    assert_eq!(w.len(), 59);
    w.u8(0x08).u64(0x3000).uleb(0x10).uleb(1).u8(0x52);
    w.u8(0x00);
    w.end_length(start);
    w.data
}

#[test]
fn context_lists() {
    let sections = sections(&[(".debug_loclists", loclists())]);
    let session = Session::new(&sections);
    let kind = ListSection::Location;
    assert_eq!(session.load_lists(kind).unwrap(), 1);
    assert_eq!(session.load_lists(ListSection::Range).unwrap(), 0);
    assert_eq!(session.list_context(kind, 1).unwrap(), None);

    let context = session.list_context(kind, 0).unwrap().unwrap();
    assert_eq!(context.header_offset, 0);
    assert_eq!(context.offset_size, 4);
    assert_eq!(context.version, 5);
    assert_eq!(context.address_size, 8);
    assert_eq!(context.offset_entry_count, 2);
    assert_eq!(context.offset_array_offset, 12);
    assert_eq!(context.first_entry_offset, 20);
    assert_eq!(context.past_last_entry_offset, 72);

    assert_eq!(
        session.offset_table_entry(kind, &context, 1).unwrap(),
        Some((47, 59))
    );
    assert_eq!(session.offset_table_entry(kind, &context, 2).unwrap(), None);

    let entries = session
        .list_entries(kind, &context)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(
        entries.iter().map(|e| e.offset).collect::<Vec<_>>(),
        vec![20, 39]
    );
    assert_eq!(entries[0].kind, ListEntryKind::StartEnd);
    assert_eq!(entries[0].length, 19);
    assert_eq!(entries[0].operands, (0x1000, 0x1010));
    assert_eq!(
        entries[1].pc_range(),
        Some(Range {
            begin: 0x1010,
            end: 0x1020
        })
    );
    let expression = entries[1].expression.unwrap();
    assert_eq!(expression.offset, 57);
    assert_eq!(expression.bytes, &[0x51]);

    let end = session.entry_at(kind, &context, 58).unwrap();
    assert_eq!(end.kind, ListEntryKind::EndOfList);
    assert_eq!(end.pc, ResolvedPc::None);

    let records = session
        .list_records(kind, &context)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(records.len(), 5);
    assert_eq!(records[3].kind, ListEntryKind::StartLength);
    assert_eq!(records[4].offset, 71);

    let entry = session.entry_at(kind, &context, 59).unwrap();
    assert_eq!(entry.kind.name(), "start_length");
    assert_eq!(
        entry.pc_range(),
        Some(Range {
            begin: 0x3000,
            end: 0x3010
        })
    );
    match session.entry_at(kind, &context, 5) {
        Err(Error::Malformed { offset, .. }) => assert_eq!(offset, 5),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn bad_context_is_skipped() {
    let mut data = loclists();
    let start = data.len();
    let mut w = Writer::new();
    let length = w.start_length();
    w.u16(4).u8(8).u8(0).u32(0);
    w.end_length(length);
    data.extend_from_slice(&w.data);
    assert_eq!(start, 72);

    let sections = sections(&[(".debug_loclists", data)]);
    let session = Session::new(&sections);
    assert_eq!(session.load_lists(ListSection::Location).unwrap(), 1);
}

fn ranges_unit(with_addr: bool) -> dietree_parser::Sections<'static> {
    ranges_unit_at(with_addr, 0, 12)
}

/// A DWARF 5 unit whose `DW_AT_ranges` is a `DW_FORM_rnglistx` index.
fn ranges_unit_at(with_addr: bool, index: u64, base: u32) -> dietree_parser::Sections<'static> {
    let mut abbrev = Writer::new();
    abbrev.uleb(1).uleb(0x11).u8(0);
    abbrev.uleb(0x11).uleb(0x01); // low_pc addr
    abbrev.uleb(0x55).uleb(0x23); // ranges rnglistx
    abbrev.uleb(0x74).uleb(0x17); // rnglists_base sec_offset
    abbrev.uleb(0x73).uleb(0x17); // addr_base sec_offset
    abbrev.uleb(0).uleb(0);
    abbrev.uleb(0);

    let mut info = Writer::new();
    let unit = info.unit_header_v5(DW_UT_COMPILE, 8);
    info.uleb(1).u64(0x4000).uleb(index).u32(base).u32(8);
    info.end_length(unit);

    let mut rnglists = Writer::new();
    let start = rnglists.start_length();
    rnglists.u16(5).u8(8).u8(0).u32(1);
    rnglists.u32(4);
    rnglists.u8(0x04).uleb(0x10).uleb(0x20);
    rnglists.u8(0x03).uleb(0).uleb(0x8);
    rnglists.u8(0x07).u64(0x6000).uleb(4);
    rnglists.u8(0x00);
    rnglists.end_length(start);

    let mut addr = Writer::new();
    let start = addr.start_length();
    addr.u16(5).u8(8).u8(0);
    addr.u64(0x5000);
    addr.end_length(start);

    let mut list = vec![
        (".debug_abbrev", abbrev.data),
        (".debug_info", info.data),
        (".debug_rnglists", rnglists.data),
    ];
    if with_addr {
        list.push((".debug_addr", addr.data));
    }
    sections(&list)
}

#[test]
fn rnglistx() {
    let sections = ranges_unit(true);
    let session = Session::new(&sections);
    let root = session.die_at(12, true).unwrap();
    let attr = session.attribute(root, DW_AT_ranges).unwrap().unwrap();
    let entries = session
        .list_for_attribute(&attr, None)
        .unwrap()
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].offset, 16);
    assert_eq!(entries[0].kind, ListEntryKind::OffsetPair);
    assert_eq!(entries[1].kind, ListEntryKind::StartxLength);
    assert_eq!(entries[1].operands, (0, 8));

    let ranges = session.die_ranges(root, None).unwrap();
    assert_eq!(
        ranges.list(),
        &[
            Range {
                begin: 0x4010,
                end: 0x4020
            },
            Range {
                begin: 0x5000,
                end: 0x5008
            },
            Range {
                begin: 0x6000,
                end: 0x6004
            },
        ]
    );
    assert_eq!(ranges.size(), 0x10 + 0x8 + 0x4);

    // Base attributes are not lists themselves.
    let base = session.attribute(root, DW_AT_rnglists_base).unwrap().unwrap();
    assert!(session.list_for_attribute(&base, None).unwrap().is_none());
}

#[test]
fn missing_address_table() {
    let sections = ranges_unit(false);
    let session = Session::new(&sections);
    let root = session.die_at(12, true).unwrap();
    let attr = session.attribute(root, DW_AT_ranges).unwrap().unwrap();
    let entries = session
        .list_for_attribute(&attr, None)
        .unwrap()
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    match &entries[1].pc {
        ResolvedPc::Unavailable(e) => assert!(e.is_unresolvable()),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(session.die_ranges(root, None).unwrap().list().len(), 2);
}

#[test]
fn legacy_ranges() {
    let mut abbrev = Writer::new();
    abbrev.uleb(1).uleb(0x11).u8(0);
    abbrev.uleb(0x11).uleb(0x01); // low_pc addr
    abbrev.uleb(0x55).uleb(0x17); // ranges sec_offset
    abbrev.uleb(0).uleb(0);
    abbrev.uleb(0);

    let mut info = Writer::new();
    let unit = info.unit_header(4, 8);
    info.uleb(1).u64(0x1000).u32(0);
    info.end_length(unit);

    let mut ranges = Writer::new();
    ranges.u64(0x10).u64(0x20);
    ranges.u64(u64::max_value()).u64(0x8000);
    ranges.u64(0).u64(4);
    ranges.u64(0).u64(0);

    let sections = sections(&[
        (".debug_abbrev", abbrev.data),
        (".debug_info", info.data),
        (".debug_ranges", ranges.data),
    ]);
    let session = Session::new(&sections);
    let root = session.die_at(11, true).unwrap();
    let attr = session.attribute(root, DW_AT_ranges).unwrap().unwrap();
    let kinds = session
        .list_for_attribute(&attr, None)
        .unwrap()
        .unwrap()
        .map(|entry| entry.unwrap().kind)
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![
            ListEntryKind::OffsetPair,
            ListEntryKind::BaseAddress,
            ListEntryKind::OffsetPair,
        ]
    );
    assert_eq!(
        session.die_ranges(root, None).unwrap().list(),
        &[
            Range {
                begin: 0x1010,
                end: 0x1020
            },
            Range {
                begin: 0x8000,
                end: 0x8004
            },
        ]
    );
}

#[test]
fn rnglistx_out_of_range() {
    let index = u64::max_value() / 2;
    let sections = ranges_unit_at(true, index, 12);
    let session = Session::new(&sections);
    let root = session.die_at(12, true).unwrap();
    let attr = session.attribute(root, DW_AT_ranges).unwrap().unwrap();
    match session.list_for_attribute(&attr, None) {
        Err(Error::IndexOutOfRange {
            index: i, count, ..
        }) => {
            assert_eq!(i, index);
            assert_eq!(count, 1);
        }
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }

    // No context has its offset table at the base.
    let sections = ranges_unit_at(true, 0, 8);
    let session = Session::new(&sections);
    let root = session.die_at(12, true).unwrap();
    let attr = session.attribute(root, DW_AT_ranges).unwrap().unwrap();
    match session.list_for_attribute(&attr, None) {
        Err(Error::IndexOutOfRange { count, .. }) => assert_eq!(count, 0),
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

#[test]
fn oversized_context_length() {
    let mut w = Writer::new();
    w.u32(0xffff_ffff).u64(u64::max_value());
    w.u16(5).u8(8).u8(0).u32(0);
    let sections = sections(&[(".debug_loclists", w.data.clone()), (".debug_rnglists", w.data)]);
    let session = Session::new(&sections);
    assert_eq!(session.load_lists(ListSection::Location).unwrap(), 0);
    assert_eq!(session.load_lists(ListSection::Range).unwrap(), 0);
}
