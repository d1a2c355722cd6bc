use parser::RunTimeEndian;

const ABBREV: &[u8] = &[
    // compile_unit, children: name strp
    1, 0x11, 1, 0x03, 0x0e, 0, 0,
    // subprogram, no children: name string, low_pc addr, high_pc data4
    2, 0x2e, 0, 0x03, 0x08, 0x11, 0x01, 0x12, 0x06, 0, 0,
    0,
];

const STR: &[u8] = b"xx\0a.c\0";

const INFO: &[u8] = &[
    // DWARF 4 header, 8 byte addresses
    31, 0, 0, 0, 4, 0, 0, 0, 0, 0, 8,
    // 0xb: compile_unit
    1, 3, 0, 0, 0,
    // 0x10: subprogram
    2, b'm', b'a', b'i', b'n', 0,
    0x00, 0x10, 0, 0, 0, 0, 0, 0,
    0x20, 0, 0, 0,
    0,
];

const PUBNAMES: &[u8] = &[
    // version 2, unit at 0 of length 35
    23, 0, 0, 0, 2, 0, 0, 0, 0, 0, 35, 0, 0, 0,
    0x10, 0, 0, 0, b'm', b'a', b'i', b'n', 0,
    0, 0, 0, 0,
];

fn sections(pubnames: bool) -> dietree::Sections<'static> {
    let mut sections = dietree::Sections::new(RunTimeEndian::Little);
    sections.insert(".debug_abbrev", ABBREV);
    sections.insert(".debug_info", INFO);
    sections.insert(".debug_str", STR);
    if pubnames {
        sections.insert(".debug_pubnames", PUBNAMES);
    }
    sections
}

fn print(sections: &dietree::Sections, options: &dietree::Options, expect: &str) {
    let session = dietree::Session::new(sections);
    let mut output = Vec::new();
    {
        let mut printer = dietree::TextPrinter::new(&mut output);
        dietree::print(&session, None, &mut printer, options).unwrap();
    }
    let output = String::from_utf8(output).unwrap();
    if !equal(&output, expect) {
        println!("\nOutput:");
        println!("{output}");
        println!("Expected:");
        println!("{expect}");
        assert_eq!(output, expect);
    }
}

fn equal(mut output: &str, expect: &str) -> bool {
    let mut expects = expect.split("[..]");
    if let Some(e) = expects.next() {
        if !output.starts_with(e) {
            return false;
        }
        output = &output[e.len()..];
    }
    for e in expects {
        loop {
            if output.starts_with(e) {
                output = &output[e.len()..];
                break;
            }
            if output.is_empty() {
                return false;
            }
            output = &output[1..];
        }
    }
    output.is_empty()
}

#[test]
fn all_categories() {
    print(
        &sections(true),
        &dietree::Options::all(),
        "\
unit 0x0
\tkind: compile
\tversion: 4
\taddress size: 8
\toffset size: 4
\tabbrev offset: 0x0
\tlength: 0x1f
\t0xb: DW_TAG_compile_unit
\t\tDW_AT_name: a.c
\t\t0x10: DW_TAG_subprogram
\t\t\tDW_AT_name: main
\t\t\tDW_AT_low_pc: 0x1000
\t\t\tDW_AT_high_pc: 0x20
.debug_pubnames:
\t0x10: main (unit 0x0)
",
    );
}

#[test]
fn entries_only() {
    let options = dietree::Options {
        category_die: true,
        ..Default::default()
    };
    print(
        &sections(true),
        &options,
        "\
unit 0x0
\t0xb: DW_TAG_compile_unit
\t\t0x10: DW_TAG_subprogram
",
    );
}

#[test]
fn tag_filter() {
    let mut options = dietree::Options::all();
    options.tag("subprogram");
    print(
        &sections(false),
        &options,
        "\
unit 0x0
\tkind: compile
[..]
\tlength: 0x1f
\t0x10: DW_TAG_subprogram
\t\tDW_AT_name: main
\t\tDW_AT_low_pc: 0x1000
\t\tDW_AT_high_pc: 0x20
",
    );
}

#[test]
fn unit_filter() {
    let mut options = dietree::Options {
        category_unit: true,
        category_die: true,
        ..Default::default()
    };
    options.unit("b.c");
    print(&sections(false), &options, "");
    options.unit("a.c");
    print(
        &sections(false),
        &options,
        "\
unit 0x0
\tkind: compile
[..]
\t0xb: DW_TAG_compile_unit
\t\t0x10: DW_TAG_subprogram
",
    );
}
