use crate::model::AttributeCatalog;

/// A parsed attribute entry line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct EntryLine {
    pub(crate) name: String,
    pub(crate) value: Option<String>,
    pub(crate) unset: bool,
}

peg::parser! {
    grammar attribute_parser() for str {
        pub(crate) rule entry() -> EntryLine
            = ":" "!" name:name() ":" ![_] {
                EntryLine { name, value: None, unset: true }
            }
            / ":" name:name() "!" ":" ![_] {
                EntryLine { name, value: None, unset: true }
            }
            / ":" name:name() ":" value:value()? ![_] {
                EntryLine { name, value, unset: false }
            }

        rule name() -> String
            = n:$(['a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_']+) {
                n.to_string()
            }

        rule value() -> String
            = [' ' | '\t']+ v:$([_]*) {
                v.trim_end().to_string()
            }
    }
}

/// Parse a single line as an attribute entry. Returns `None` when the line
/// is not one; the caller passes it through untouched.
pub(crate) fn parse_line(line: &str) -> Option<EntryLine> {
    attribute_parser::entry(line).ok()
}

/// Apply a parsed entry to the catalog. Values may reference earlier
/// attributes; references resolve at definition time.
pub(crate) fn apply(catalog: &mut AttributeCatalog, entry: &EntryLine) {
    if entry.unset {
        catalog.unset(entry.name.clone());
    } else {
        let value = entry.value.as_deref().unwrap_or_default();
        let value = catalog.substitute(value);
        catalog.set(entry.name.clone(), value);
    }
}
