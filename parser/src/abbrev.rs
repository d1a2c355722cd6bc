use std::convert::TryFrom;

use gimli::{DebugAbbrev, DebugAbbrevOffset};

pub(crate) use gimli::{Abbreviations, AttributeSpecification};

use crate::file::DEBUG_ABBREV;
use crate::reader::Endian;
use crate::{Error, Result};

/// Parse the abbreviation table at an offset in `.debug_abbrev`.
pub(crate) fn parse_abbreviations(data: &[u8], endian: Endian, offset: u64) -> Result<Abbreviations> {
    let index = usize::try_from(offset)
        .map_err(|_| Error::malformed(DEBUG_ABBREV, offset, "offset does not fit in memory"))?;
    DebugAbbrev::new(data, endian)
        .abbreviations(DebugAbbrevOffset(index))
        .map_err(|e| Error::malformed(DEBUG_ABBREV, offset, format!("{}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gimli::constants::*;

    #[test]
    fn parse_table() {
        let data = [
            // code 1: compile_unit, children, name strp
            1, 0x11, 1, 0x03, 0x0e, 0, 0,
            // code 2: member, no children, implicit_const -3
            2, 0x0d, 0, 0x38, 0x21, 0x7d, 0, 0,
            0,
        ];
        let abbrevs = parse_abbreviations(&data, Endian::Little, 0).unwrap();
        let abbrev = abbrevs.get(1).unwrap();
        assert_eq!(abbrev.tag(), DW_TAG_compile_unit);
        assert!(abbrev.has_children());
        assert_eq!(abbrev.attributes()[0].name(), DW_AT_name);
        assert_eq!(abbrev.attributes()[0].form(), DW_FORM_strp);
        let abbrev = abbrevs.get(2).unwrap();
        assert!(!abbrev.has_children());
        assert_eq!(abbrev.attributes()[0].implicit_const_value(), Some(-3));
        assert!(abbrevs.get(3).is_none());
    }

    #[test]
    fn duplicate_code() {
        let data = [0, 1, 0x11, 0, 0, 0, 1, 0x2e, 0, 0, 0, 0];
        match parse_abbreviations(&data, Endian::Little, 1) {
            Err(Error::Malformed {
                section, offset, ..
            }) => {
                assert_eq!(section, DEBUG_ABBREV);
                assert_eq!(offset, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse_abbreviations(&data, Endian::Little, 20).is_err());
    }
}
