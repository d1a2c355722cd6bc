use std::mem;

/// An address range.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Range {
    /// The beginning of the address range (inclusive).
    pub begin: u64,

    /// The end of the address range (exclusive).
    pub end: u64,
}

impl Range {
    /// The size of the address range.
    #[inline]
    pub fn size(&self) -> u64 {
        self.end.wrapping_sub(self.begin)
    }

    /// Return true if the range contains the value.
    #[inline]
    pub fn contains(&self, addr: u64) -> bool {
        self.begin <= addr && addr < self.end
    }
}

/// A list of address ranges.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RangeList {
    ranges: Vec<Range>,
}

impl RangeList {
    /// The ranges in the list.
    #[inline]
    pub fn list(&self) -> &[Range] {
        &self.ranges
    }

    /// The total size of the ranges in the list.
    pub fn size(&self) -> u64 {
        self.ranges.iter().map(Range::size).sum()
    }

    /// Append a range, combining with the previous range if they overlap
    /// or are adjacent.
    pub fn push(&mut self, range: Range) {
        if range.end <= range.begin {
            debug!("ignoring empty range: {:?}", range);
            return;
        }
        if let Some(prev) = self.ranges.last_mut() {
            if range.begin >= prev.begin && range.begin <= prev.end {
                if prev.end < range.end {
                    prev.end = range.end;
                }
                return;
            }
        }
        self.ranges.push(range);
    }

    /// Sort the ranges by beginning address, and combine ranges where possible.
    pub fn sort(&mut self) {
        self.ranges.sort_by(|a, b| a.begin.cmp(&b.begin));
        let ranges = mem::replace(&mut self.ranges, Vec::new());
        for range in ranges {
            self.push(range);
        }
    }
}
