// Enable some rust 2018 idioms.
#![warn(bare_trait_objects)]
#![warn(unused_extern_crates)]

#[cfg(feature = "system_alloc")]
use std::alloc::System;

#[cfg(feature = "system_alloc")]
#[global_allocator]
static A: System = System;

#[macro_use]
extern crate log;

use std::io::{BufWriter, Write};

use clap::{Arg, ArgAction};

const OPT_FILE: &str = "file";
const OPT_TIE: &str = "tie";
const OPT_GROUP: &str = "group";

// Print categories
const OPT_CATEGORY: &str = "category";
const OPT_CATEGORY_UNIT: &str = "unit";
const OPT_CATEGORY_DIE: &str = "die";
const OPT_CATEGORY_ATTRIBUTE: &str = "attribute";
const OPT_CATEGORY_LOCLISTS: &str = "loclists";
const OPT_CATEGORY_RNGLISTS: &str = "rnglists";
const OPT_CATEGORY_MACRO: &str = "macro";
const OPT_CATEGORY_PUBNAMES: &str = "pubnames";

// Filters
const OPT_FILTER: &str = "filter";
const OPT_FILTER_UNIT: &str = "unit";
const OPT_FILTER_TAG: &str = "tag";

fn main() {
    env_logger::init();

    let mut cmd = clap::Command::new("dietree")
        .version(clap::crate_version!())
        .about("Print the DWARF debugging information entries of an object file")
        .arg(
            Arg::new(OPT_FILE)
                .help("Path of file to print")
                .value_name("FILE")
                .index(1)
                .required(true),
        )
        .arg(
            Arg::new(OPT_TIE)
                .short('t')
                .long(OPT_TIE)
                .help("Path of the companion file for split DWARF")
                .value_name("FILE"),
        )
        .arg(
            Arg::new(OPT_GROUP)
                .short('g')
                .long(OPT_GROUP)
                .help("Section group to load (1 = base, 2 = .dwo, 3 and above = COMDAT)")
                .value_name("GROUP")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(OPT_CATEGORY)
                .short('c')
                .long(OPT_CATEGORY)
                .help("Categories of entries to print (defaults to all)")
                .action(ArgAction::Append)
                .value_delimiter(',')
                .value_name("CATEGORY")
                .value_parser([
                    OPT_CATEGORY_UNIT,
                    OPT_CATEGORY_DIE,
                    OPT_CATEGORY_ATTRIBUTE,
                    OPT_CATEGORY_LOCLISTS,
                    OPT_CATEGORY_RNGLISTS,
                    OPT_CATEGORY_MACRO,
                    OPT_CATEGORY_PUBNAMES,
                ]),
        )
        .arg(
            Arg::new(OPT_FILTER)
                .short('f')
                .long(OPT_FILTER)
                .help("Print only entries that match the given filters")
                .action(ArgAction::Append)
                .value_delimiter(',')
                .value_name("FILTER"),
        )
        .after_help(concat!(
            "FILTERS:\n",
            "    unit=<string>                   Match units with the given name\n",
            "    tag=<string>                    Match entries with the given tag\n"
        ));
    let matches = cmd.get_matches_mut();

    let mut options = dietree::Options::default();

    options.group = matches.get_one::<u64>(OPT_GROUP).copied();

    if let Some(values) = matches.get_many::<String>(OPT_CATEGORY) {
        for value in values {
            match value.as_str() {
                OPT_CATEGORY_UNIT => options.category_unit = true,
                OPT_CATEGORY_DIE => options.category_die = true,
                OPT_CATEGORY_ATTRIBUTE => {
                    options.category_die = true;
                    options.category_attribute = true;
                }
                OPT_CATEGORY_LOCLISTS => options.category_loclists = true,
                OPT_CATEGORY_RNGLISTS => options.category_rnglists = true,
                OPT_CATEGORY_MACRO => options.category_macro = true,
                OPT_CATEGORY_PUBNAMES => options.category_pubnames = true,
                _ => cmd
                    .error(
                        clap::error::ErrorKind::InvalidValue,
                        format!("invalid {} value: {}", OPT_CATEGORY, value),
                    )
                    .exit(),
            }
        }
    } else {
        let group = options.group;
        options = dietree::Options::all();
        options.group = group;
    }

    if let Some(values) = matches.get_many::<String>(OPT_FILTER) {
        for value in values {
            if let Some(index) = value.bytes().position(|c| c == b'=') {
                let key = &value[..index];
                let value = &value[index + 1..];
                match key {
                    OPT_FILTER_UNIT => options.filter_unit = Some(value.into()),
                    OPT_FILTER_TAG => options.filter_tag = Some(value.into()),
                    _ => cmd
                        .error(
                            clap::error::ErrorKind::InvalidValue,
                            format!("invalid {} key: {}", OPT_FILTER, key),
                        )
                        .exit(),
                }
            } else {
                cmd.error(
                    clap::error::ErrorKind::InvalidValue,
                    format!("missing {} value for key: {}", OPT_FILTER, value),
                )
                .exit();
            }
        }
    }

    let path = match matches.get_one::<String>(OPT_FILE) {
        Some(path) => path,
        None => cmd
            .error(clap::error::ErrorKind::MissingRequiredArgument, "missing FILE")
            .exit(),
    };
    let tie = matches.get_one::<String>(OPT_TIE);

    let file_options = parser::Options {
        group: options.group,
    };
    if let Err(e) = dietree::File::parse(path, &file_options, |file| {
        let session = file.session();
        match tie {
            Some(tie) => {
                let tie_options = parser::Options::default();
                dietree::File::parse(tie, &tie_options, |tied| {
                    let tied = tied.session();
                    print_file(&session, Some(&tied), &options)
                })
                .map_err(|e| dietree::Error::from(format!("{}: {}", tie, e)))
            }
            None => print_file(&session, None, &options),
        }
    }) {
        error!("{}: {}", path, e);
    }
}

fn print_file<'input>(
    session: &dietree::Session<'input>,
    tied: Option<&dietree::Session<'input>>,
    options: &dietree::Options,
) -> dietree::Result<()> {
    let stdout = std::io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    {
        let mut printer = dietree::TextPrinter::new(&mut writer);
        dietree::print(session, tied, &mut printer, options)?;
    }
    writer.flush()?;
    Ok(())
}
