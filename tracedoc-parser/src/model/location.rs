use serde::Serialize;

/// A `Position` is a human-readable place in the user's original source.
///
/// `line` and `column` are 1-indexed; columns are counted in Unicode scalar
/// values, not bytes. When the position sits inside included content, `file`
/// holds the include chain leading to it, outermost first. An absent `file`
/// means the top-level source.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize)]
pub struct Position {
    /// The line number of the position (1-indexed).
    pub line: usize,
    /// The column number of the position (1-indexed).
    pub column: usize,
    /// Include chain for positions inside included files, outermost first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<Vec<String>>,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            line: 1,
            column: 1,
            file: None,
        }
    }
}

impl Position {
    #[must_use]
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            line,
            column,
            file: None,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line: {}, column: {}", self.line, self.column)
    }
}

/// A `Location` is the source extent of a node.
///
/// `end` points at the last consumed character (inclusive), so a
/// single-character node has `start == end`.
#[derive(Debug, Default, Clone, Hash, Eq, PartialEq, Serialize)]
pub struct Location {
    /// The start position of the location.
    pub start: Position,
    /// The end position of the location.
    pub end: Position,
}

impl Location {
    #[must_use]
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Collapse to a single position, for zero-width nodes.
    #[must_use]
    pub fn at(position: Position) -> Self {
        Self {
            start: position.clone(),
            end: position,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "location.start({}), location.end({})",
            self.start, self.end
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_display() {
        let position = Position::new(3, 7);
        assert_eq!(format!("{position}"), "line: 3, column: 7");
    }

    #[test]
    fn test_location_display() {
        let location = Location::new(Position::new(1, 2), Position::new(3, 4));
        assert_eq!(
            format!("{location}"),
            "location.start(line: 1, column: 2), location.end(line: 3, column: 4)"
        );
    }

    #[test]
    fn test_serialize_omits_absent_file() {
        let location = Location::new(Position::new(1, 1), Position::new(1, 5));
        let json = serde_json::to_value(&location).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "start": {"line": 1, "column": 1},
                "end": {"line": 1, "column": 5},
            })
        );
    }

    #[test]
    fn test_serialize_includes_file_chain() {
        let mut position = Position::new(2, 1);
        position.file = Some(vec!["chapter.adoc".to_string()]);
        let json = serde_json::to_value(&position).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"line": 2, "column": 1, "file": ["chapter.adoc"]})
        );
    }
}
