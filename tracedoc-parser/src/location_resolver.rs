//! Turning rewritten-text offsets back into source positions.
//!
//! The resolver is built once per text (a whole document, or one block's
//! worth of lines for the inline phase) by walking the [`LineMap`] and
//! assigning one table entry per character. Resolution is then a pair of
//! table lookups, optionally routed through a [`SourceMap`] first when the
//! text was rewritten again by the inline preprocessor.

use crate::{
    model::{Location, Position},
    preprocessor::LineMap,
    source_map::SourceMap,
};

/// A pure offset-to-position resolver over one piece of rewritten text.
#[derive(Debug, Clone)]
pub struct LocationResolver {
    table: Vec<Position>,
}

impl LocationResolver {
    /// Build the per-offset source table for `text`, whose lines are
    /// described by `line_map`. Offsets are character offsets.
    ///
    /// Lines beyond the map fall back to identity positions; that only
    /// happens when a caller hands a map that does not cover its text.
    #[must_use]
    pub fn new(text: &str, line_map: &LineMap) -> Self {
        let mut table = Vec::with_capacity(text.chars().count());
        for (idx, line) in text.split_inclusive('\n').enumerate() {
            let origin = line_map.get(idx + 1);
            for (column_offset, _) in line.chars().enumerate() {
                table.push(match origin {
                    Some(origin) => Position {
                        line: origin.line,
                        column: origin.column + column_offset,
                        file: origin.file.clone(),
                    },
                    None => Position::new(idx + 1, column_offset + 1),
                });
            }
        }
        Self { table }
    }

    /// Resolve `[start, end_exclusive)` to a source location, mapping both
    /// ends through `source_map` when one is present. The resulting `end`
    /// names the last consumed character, so a single-character range
    /// resolves to `start == end`.
    #[must_use]
    pub fn resolve(
        &self,
        start: usize,
        end_exclusive: usize,
        source_map: Option<&SourceMap>,
    ) -> Location {
        if end_exclusive <= start {
            let offset = match source_map {
                Some(map) => map.source_start(start),
                None => start,
            };
            return Location::at(self.position_at(offset));
        }
        let (start_offset, end_offset) = match source_map {
            Some(map) => (map.source_start(start), map.source_end(end_exclusive - 1)),
            None => (start, end_exclusive - 1),
        };
        Location::new(self.position_at(start_offset), self.position_at(end_offset))
    }

    /// The source position of one character offset, clamped to the table.
    #[must_use]
    pub fn position_at(&self, offset: usize) -> Position {
        if let Some(position) = self.table.get(offset) {
            return position.clone();
        }
        match self.table.last() {
            Some(last) => {
                let mut position = last.clone();
                position.column += offset - (self.table.len() - 1);
                position
            }
            None => Position::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttributeCatalog;
    use crate::preprocessor::LinePreprocessor;
    use pretty_assertions::assert_eq;

    fn resolver_for(input: &str) -> (LocationResolver, String) {
        let mut catalog = AttributeCatalog::new();
        let result = LinePreprocessor::new().process(input, &mut catalog).unwrap();
        (LocationResolver::new(&result.text, &result.locations), result.text)
    }

    #[test]
    fn test_identity_resolution() {
        let (resolver, _) = resolver_for("hello\nworld\n");
        let location = resolver.resolve(0, 5, None);
        assert_eq!(location.start, Position::new(1, 1));
        assert_eq!(location.end, Position::new(1, 5));

        let location = resolver.resolve(6, 11, None);
        assert_eq!(location.start, Position::new(2, 1));
        assert_eq!(location.end, Position::new(2, 5));
    }

    #[test]
    fn test_single_character_range() {
        let (resolver, _) = resolver_for("abc");
        let location = resolver.resolve(1, 2, None);
        assert_eq!(location.start, location.end);
        assert_eq!(location.start, Position::new(1, 2));
    }

    #[test]
    fn test_degenerate_range_collapses() {
        let (resolver, _) = resolver_for("abc");
        let location = resolver.resolve(2, 2, None);
        assert_eq!(location.start, location.end);
        assert_eq!(location.start, Position::new(1, 3));
    }

    #[test]
    fn test_resolution_through_elided_lines() {
        // The conditional enclosure lines vanish; offsets into the
        // remaining text must land on the original line numbers.
        let (resolver, text) = resolver_for("ifndef::foo[]\nkept\nendif::[]\nafter\n");
        assert_eq!(text, "kept\nafter\n");
        let location = resolver.resolve(5, 10, None);
        assert_eq!(location.start, Position::new(4, 1));
        assert_eq!(location.end, Position::new(4, 5));
    }

    #[test]
    fn test_payload_column_offset() {
        let (resolver, text) = resolver_for("ifndef::foo[foo is not set]\n");
        assert_eq!(text, "foo is not set\n");
        let location = resolver.resolve(0, 3, None);
        assert_eq!(location.start, Position::new(1, 13));
        assert_eq!(location.end, Position::new(1, 15));
    }

    #[test]
    fn test_empty_table() {
        let resolver = LocationResolver::new("", &LineMap::new());
        let location = resolver.resolve(0, 0, None);
        assert_eq!(location.start, Position::default());
    }

    #[test]
    fn test_offsets_beyond_table_clamp() {
        let (resolver, _) = resolver_for("ab");
        let position = resolver.position_at(5);
        assert_eq!(position, Position::new(1, 6));
    }
}
