use serde::Serialize;

/// Where one output line of the preprocessed text came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineOrigin {
    /// Source line number (1-indexed) in the file named by `file`.
    pub line: usize,
    /// Source column (1-indexed) where the emitted content begins. Column 1
    /// except for directive payloads, which start mid-line.
    pub column: usize,
    /// Cumulative count of source lines elided before this output line
    /// (removed directive lines, skipped false branches). For lines of the
    /// same file with no include boundary in between,
    /// `output_line + line_offset` recovers the true source line; splicing
    /// an include adjusts it (possibly below zero) so the arithmetic keeps
    /// holding for the lines that follow.
    pub line_offset: isize,
    /// Include chain for lines spliced from included files, outermost
    /// first. Absent for top-level lines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<Vec<String>>,
}

/// Maps output line numbers (1-based, contiguous) of one preprocessing pass
/// back to their source lines. Built once per pass and immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LineMap {
    entries: Vec<LineOrigin>,
}

impl LineMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The origin of an output line (1-based).
    #[must_use]
    pub fn get(&self, output_line: usize) -> Option<&LineOrigin> {
        if output_line == 0 {
            return None;
        }
        self.entries.get(output_line - 1)
    }

    pub(crate) fn push(&mut self, origin: LineOrigin) {
        self.entries.push(origin);
    }

    pub(crate) fn extend(&mut self, other: LineMap) {
        self.entries.extend(other.entries);
    }

    pub(crate) fn retain_lines(&mut self, keep: impl Fn(usize) -> bool) {
        let mut output_line = 0;
        self.entries.retain(|_| {
            output_line += 1;
            keep(output_line)
        });
    }

    /// A view of `count` lines starting at `start_line` (1-based), re-keyed
    /// from 1. This is how a block hands its own lines to the inline phase.
    #[must_use]
    pub fn slice(&self, start_line: usize, count: usize) -> LineMap {
        if start_line == 0 {
            return LineMap::new();
        }
        let start = start_line - 1;
        let end = (start + count).min(self.entries.len());
        LineMap {
            entries: self.entries.get(start..end).map(<[LineOrigin]>::to_vec).unwrap_or_default(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &LineOrigin> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(line: usize) -> LineOrigin {
        LineOrigin {
            line,
            column: 1,
            line_offset: 0,
            file: None,
        }
    }

    #[test]
    fn test_get_is_one_based() {
        let mut map = LineMap::new();
        map.push(origin(1));
        map.push(origin(2));
        assert!(map.get(0).is_none());
        assert_eq!(map.get(1).map(|o| o.line), Some(1));
        assert_eq!(map.get(2).map(|o| o.line), Some(2));
        assert!(map.get(3).is_none());
    }

    #[test]
    fn test_slice_rekeys_from_one() {
        let mut map = LineMap::new();
        for line in 1..=5 {
            map.push(origin(line));
        }
        let block = map.slice(3, 2);
        assert_eq!(block.len(), 2);
        assert_eq!(block.get(1).map(|o| o.line), Some(3));
        assert_eq!(block.get(2).map(|o| o.line), Some(4));
    }

    #[test]
    fn test_slice_clamps_to_map() {
        let mut map = LineMap::new();
        map.push(origin(1));
        assert_eq!(map.slice(1, 10).len(), 1);
        assert!(map.slice(5, 2).is_empty());
    }
}
