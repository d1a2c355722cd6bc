use std::borrow::Cow;
use std::fs;

use fnv::FnvHashMap as HashMap;
use gimli::RunTimeEndian as Endian;
use object::{self, Object, ObjectComdat, ObjectSection};

use crate::session::Session;
use crate::Result;

pub const DEBUG_ABBREV: &str = ".debug_abbrev";
pub const DEBUG_ADDR: &str = ".debug_addr";
pub const DEBUG_INFO: &str = ".debug_info";
pub const DEBUG_LINE: &str = ".debug_line";
pub const DEBUG_LINE_STR: &str = ".debug_line_str";
pub const DEBUG_LOC: &str = ".debug_loc";
pub const DEBUG_LOCLISTS: &str = ".debug_loclists";
pub const DEBUG_MACRO: &str = ".debug_macro";
pub const DEBUG_PUBNAMES: &str = ".debug_pubnames";
pub const DEBUG_PUBTYPES: &str = ".debug_pubtypes";
pub const DEBUG_RANGES: &str = ".debug_ranges";
pub const DEBUG_RNGLISTS: &str = ".debug_rnglists";
pub const DEBUG_STR: &str = ".debug_str";
pub const DEBUG_STR_OFFSETS: &str = ".debug_str_offsets";
pub const DEBUG_TYPES: &str = ".debug_types";

/// The group of ordinary DWARF sections.
pub const GROUP_BASE: u64 = 1;
/// The group of split DWARF (`.dwo`) sections.
pub const GROUP_DWO: u64 = 2;
/// The first group number used for COMDAT section groups.
pub const GROUP_COMDAT: u64 = 3;

/// A DWARF section found in the object file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionGroupEntry {
    /// The section name, as it appears in the object file.
    pub name: String,
    pub group: u64,
    /// The index of the section in the object file.
    pub section_index: usize,
}

/// The section groups of an object file, and the group that was loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupInfo {
    pub section_count: usize,
    pub group_count: usize,
    pub selected_group: u64,
    pub sections: Vec<SectionGroupEntry>,
}

/// The DWARF sections of one section group.
///
/// Section names are normalized to their ELF spelling without the `.dwo`
/// suffix, so `.debug_info.dwo`, `__debug_info` and `.zdebug_info` are
/// all stored as `.debug_info`.
#[derive(Debug)]
pub struct Sections<'input> {
    endian: Endian,
    data: HashMap<String, Cow<'input, [u8]>>,
    groups: GroupInfo,
}

impl<'input> Sections<'input> {
    /// Create an empty set of sections.
    pub fn new(endian: Endian) -> Self {
        Sections {
            endian,
            data: HashMap::default(),
            groups: GroupInfo {
                selected_group: GROUP_BASE,
                ..Default::default()
            },
        }
    }

    /// Add or replace a section.
    pub fn insert<D>(&mut self, name: &str, data: D)
    where
        D: Into<Cow<'input, [u8]>>,
    {
        self.data.insert(name.to_string(), data.into());
    }

    /// Set the group number reported by `group_info`.
    pub fn set_selected_group(&mut self, group: u64) {
        self.groups.selected_group = group;
    }

    #[inline]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// The contents of a section, if it exists.
    pub fn section(&self, name: &str) -> Option<&[u8]> {
        self.data.get(name).map(|data| &**data)
    }

    pub fn group_info(&self) -> &GroupInfo {
        &self.groups
    }

    /// Returns true if the loaded sections are split DWARF sections.
    pub fn is_split(&self) -> bool {
        self.groups.selected_group == GROUP_DWO
    }

    /// Load the DWARF sections of one group of an object file.
    ///
    /// If no group is given, the base group is used when it contains any
    /// DWARF sections, and the `.dwo` group otherwise.
    pub fn from_object<O>(object: &O, group: Option<u64>) -> Result<Self>
    where
        O: Object<'input>,
    {
        let endian = if object.is_little_endian() {
            Endian::Little
        } else {
            Endian::Big
        };

        let mut comdat_groups = HashMap::default();
        for (index, comdat) in object.comdats().enumerate() {
            for section in comdat.sections() {
                comdat_groups.insert(section.0, GROUP_COMDAT + index as u64);
            }
        }

        let mut section_count = 0;
        let mut entries = Vec::new();
        for section in object.sections() {
            section_count += 1;
            let name = match section.name() {
                Ok(name) => name,
                Err(_) => continue,
            };
            let (_, is_dwo) = match canonical_name(name) {
                Some(canonical) => canonical,
                None => continue,
            };
            let index = section.index().0;
            let group = match comdat_groups.get(&index) {
                Some(group) => *group,
                None if is_dwo => GROUP_DWO,
                None => GROUP_BASE,
            };
            entries.push(SectionGroupEntry {
                name: name.to_string(),
                group,
                section_index: index,
            });
        }

        let mut seen = Vec::new();
        for entry in &entries {
            if !seen.contains(&entry.group) {
                seen.push(entry.group);
            }
        }
        let group_count = seen.len();

        let selected_group = match group {
            Some(group) => group,
            None if seen.contains(&GROUP_BASE) || !seen.contains(&GROUP_DWO) => GROUP_BASE,
            None => GROUP_DWO,
        };
        if !entries.is_empty() && !seen.contains(&selected_group) {
            warn!("no DWARF sections in group {}", selected_group);
        }

        let mut data = HashMap::default();
        for section in object.sections() {
            let index = section.index().0;
            if !entries
                .iter()
                .any(|e| e.section_index == index && e.group == selected_group)
            {
                continue;
            }
            let name = match section.name().ok().and_then(canonical_name) {
                Some((name, _)) => name,
                None => continue,
            };
            data.insert(name, section.uncompressed_data()?);
        }

        Ok(Sections {
            endian,
            data,
            groups: GroupInfo {
                section_count,
                group_count,
                selected_group,
                sections: entries,
            },
        })
    }
}

/// Map an object file section name to the ELF name of the DWARF section.
///
/// Returns `None` for sections that are not DWARF sections. The flag is set
/// for split DWARF section names.
fn canonical_name(name: &str) -> Option<(String, bool)> {
    let base = if let Some(rest) = name.strip_prefix(".zdebug_") {
        rest
    } else if let Some(rest) = name.strip_prefix(".debug_") {
        rest
    } else if let Some(rest) = name.strip_prefix("__debug_") {
        // Mach-O section names are limited to 16 bytes.
        if rest == "str_offs" {
            "str_offsets"
        } else {
            rest
        }
    } else {
        return None;
    };
    let (base, is_dwo) = match base.strip_suffix(".dwo") {
        Some(base) => (base, true),
        None => (base, false),
    };
    if base.is_empty() {
        return None;
    }
    Some((format!(".debug_{}", base), is_dwo))
}

/// Options for loading an object file.
#[derive(Debug, Default, Clone)]
pub struct Options {
    /// The section group to load. See [`GROUP_BASE`], [`GROUP_DWO`], and
    /// [`GROUP_COMDAT`].
    pub group: Option<u64>,
}

/// An object file whose DWARF sections have been loaded.
#[derive(Debug)]
pub struct File<'input> {
    path: &'input str,
    sections: Sections<'input>,
}

impl<'input> File<'input> {
    pub fn parse<Cb, T>(path: &str, options: &Options, cb: Cb) -> Result<T>
    where
        Cb: FnOnce(&File) -> Result<T>,
    {
        let handle = match fs::File::open(path) {
            Ok(handle) => handle,
            Err(e) => {
                return Err(format!("open failed: {}", e).into());
            }
        };

        let map = match unsafe { memmap2::Mmap::map(&handle) } {
            Ok(map) => map,
            Err(e) => {
                return Err(format!("memmap failed: {}", e).into());
            }
        };

        let object = object::File::parse(&*map)?;
        let sections = Sections::from_object(&object, options.group)?;
        debug!(
            "{}: loaded group {} ({} groups)",
            path,
            sections.group_info().selected_group,
            sections.group_info().group_count
        );
        let file = File { path, sections };
        cb(&file)
    }

    pub fn path(&self) -> &'input str {
        self.path
    }

    pub fn sections(&self) -> &Sections<'input> {
        &self.sections
    }

    /// Start a new navigation session over the sections of this file.
    pub fn session(&self) -> Session {
        Session::new(&self.sections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_names() {
        assert_eq!(
            canonical_name(".debug_info"),
            Some((".debug_info".to_string(), false))
        );
        assert_eq!(
            canonical_name(".debug_info.dwo"),
            Some((".debug_info".to_string(), true))
        );
        assert_eq!(
            canonical_name(".zdebug_str"),
            Some((".debug_str".to_string(), false))
        );
        assert_eq!(
            canonical_name("__debug_str_offs"),
            Some((".debug_str_offsets".to_string(), false))
        );
        assert_eq!(canonical_name(".text"), None);
        assert_eq!(canonical_name(".debug_"), None);
    }

    #[test]
    fn insert_and_lookup() {
        let mut sections = Sections::new(Endian::Little);
        assert_eq!(sections.section(DEBUG_INFO), None);
        sections.insert(DEBUG_INFO, &[1u8, 2, 3][..]);
        assert_eq!(sections.section(DEBUG_INFO), Some(&[1u8, 2, 3][..]));
        assert!(!sections.is_split());
        sections.set_selected_group(GROUP_DWO);
        assert!(sections.is_split());
    }
}
