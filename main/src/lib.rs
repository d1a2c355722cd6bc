// Enable some rust 2018 idioms.
#![warn(bare_trait_objects)]
#![warn(unused_extern_crates)]
// Calm down clippy.
#![allow(clippy::single_match)]
#![allow(clippy::type_complexity)]

#[macro_use]
extern crate log;

use parser::constants::DwTag;

pub use parser::{Error, File, Result, Sections, Session};

mod print;
pub use self::print::file::print;
pub use self::print::{Printer, TextPrinter};

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub category_unit: bool,
    pub category_die: bool,
    pub category_attribute: bool,
    pub category_loclists: bool,
    pub category_rnglists: bool,
    pub category_macro: bool,
    pub category_pubnames: bool,

    pub filter_unit: Option<String>,
    pub filter_tag: Option<String>,

    /// The section group to load from the file.
    pub group: Option<u64>,
}

impl Options {
    /// Options that print every category.
    pub fn all() -> Self {
        Options {
            category_unit: true,
            category_die: true,
            category_attribute: true,
            category_loclists: true,
            category_rnglists: true,
            category_macro: true,
            category_pubnames: true,
            ..Default::default()
        }
    }

    pub fn unit(&mut self, unit: &str) -> &mut Self {
        self.filter_unit = Some(unit.into());
        self
    }

    pub fn tag(&mut self, tag: &str) -> &mut Self {
        self.filter_tag = Some(tag.into());
        self
    }

    fn filter_unit(&self, name: Option<&str>) -> bool {
        self.filter_unit.is_none() || self.filter_unit.as_ref().map(String::as_ref) == name
    }

    /// Match a tag by its full name, or without the `DW_TAG_` prefix.
    fn filter_tag(&self, tag: DwTag) -> bool {
        let filter = match &self.filter_tag {
            Some(filter) => filter,
            None => return true,
        };
        match tag.static_string() {
            Some(name) => {
                name == filter || name.strip_prefix("DW_TAG_") == Some(filter.as_str())
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parser::constants::*;

    #[test]
    fn tag_filter() {
        let mut options = Options::default();
        assert!(options.filter_tag(DW_TAG_member));
        options.tag("subprogram");
        assert!(options.filter_tag(DW_TAG_subprogram));
        assert!(!options.filter_tag(DW_TAG_member));
        options.tag("DW_TAG_member");
        assert!(options.filter_tag(DW_TAG_member));
        assert!(!options.filter_tag(DwTag(0x7777)));
    }

    #[test]
    fn unit_filter() {
        let mut options = Options::default();
        assert!(options.filter_unit(None));
        options.unit("a.c");
        assert!(options.filter_unit(Some("a.c")));
        assert!(!options.filter_unit(Some("b.c")));
        assert!(!options.filter_unit(None));
    }
}
