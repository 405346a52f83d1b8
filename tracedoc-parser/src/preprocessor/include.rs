use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};

use crate::{error::Error, model::AttributeCatalog};

/// How deep include expansion may nest. Distinct from the cycle check: a
/// chain of distinct files this long is almost certainly a generator bug,
/// and bounding it keeps recursion depth finite on pathological input.
pub(crate) const MAX_INCLUDE_DEPTH: usize = 64;

/// BOM patterns for encoding detection.
const BOM_PATTERNS: &[(&[u8], &Encoding, usize)] = &[
    (&[0xEF, 0xBB, 0xBF], UTF_8, 3),
    (&[0xFF, 0xFE], UTF_16LE, 2),
    (&[0xFE, 0xFF], UTF_16BE, 2),
];

/// A parsed `include::target[attrs]` line.
///
/// The target may be an absolute path or a path relative to the including
/// document. `lines=` selects which lines of the expanded content survive;
/// the remaining attributes parse but are not applied yet.
#[derive(Debug)]
pub(crate) struct IncludeDirective {
    pub(crate) target: String,
    level_offset: Option<String>,
    lines: Vec<LinesRange>,
    tags: Vec<String>,
    indent: Option<usize>,
    pub(crate) encoding: Option<String>,
    opts: Vec<String>,
}

/// A line selection inside an include directive: a single line or a range,
/// where an end of `-1` means "through the last line".
#[derive(Debug)]
enum LinesRange {
    Single(usize),
    Range(usize, isize),
}

impl FromStr for LinesRange {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((start, end)) = s.split_once("..") {
            let start = start.trim().parse().map_err(|_| ())?;
            let end = end.trim().parse().map_err(|_| ())?;
            Ok(LinesRange::Range(start, end))
        } else {
            Ok(LinesRange::Single(s.trim().parse().map_err(|_| ())?))
        }
    }
}

impl LinesRange {
    fn parse_list(value: &str) -> Option<Vec<Self>> {
        let separator = if value.contains(';') { ';' } else { ',' };
        value
            .split(separator)
            .map(|part| LinesRange::from_str(part).ok())
            .collect()
    }

    fn selects(&self, line: usize) -> bool {
        match self {
            LinesRange::Single(n) => line == *n,
            LinesRange::Range(start, end) => {
                line >= *start
                    && (*end == -1 || isize::try_from(line).map_or(false, |l| l <= *end))
            }
        }
    }
}

peg::parser! {
    grammar include_parser() for str {
        pub(crate) rule include() -> (String, Vec<(String, String)>)
            = "include::" target:target() "[" attrs:attributes()? "]" {
                (target, attrs.unwrap_or_default())
            }

        rule target() -> String
            = t:$((!['[' | ' ' | '\t'] [_])+) {
                t.to_string()
            }

        rule attributes() -> Vec<(String, String)>
            = attribute_pair() ++ ","

        rule attribute_pair() -> (String, String)
            = k:attribute_key() "=" v:attribute_value() {
                (k, v)
            }

        rule attribute_key() -> String
            = k:$("leveloffset" / "lines" / "tags" / "tag" / "indent" / "encoding" / "opts") {
                k.to_string()
            }

        rule attribute_value() -> String
            = "\"" v:$((!['"'] [_])*) "\"" { v.to_string() }
            / v:$((![','] ![']'] [_])*) { v.to_string() }
    }
}

impl IncludeDirective {
    /// Parse an include directive line. Attribute references in the target
    /// resolve against the catalog. Returns `None` for malformed directives;
    /// the caller elides the line and moves on.
    pub(crate) fn parse(line: &str, catalog: &AttributeCatalog) -> Option<Self> {
        let (raw_target, attrs) = match include_parser::include(line) {
            Ok(parsed) => parsed,
            Err(error) => {
                tracing::warn!(?error, line, "malformed include directive");
                return None;
            }
        };
        let target = catalog.substitute(raw_target.trim());

        let mut directive = Self {
            target,
            level_offset: None,
            lines: Vec::new(),
            tags: Vec::new(),
            indent: None,
            encoding: None,
            opts: Vec::new(),
        };
        for (key, value) in attrs {
            match key.as_str() {
                "leveloffset" => directive.level_offset = Some(value),
                "lines" => match LinesRange::parse_list(&value) {
                    Some(ranges) => directive.lines.extend(ranges),
                    None => {
                        tracing::warn!(?value, "invalid lines attribute in include directive");
                        return None;
                    }
                },
                "tag" => directive.tags.push(value),
                "tags" => directive.tags.extend(value.split(';').map(str::to_string)),
                "indent" => match value.parse() {
                    Ok(indent) => directive.indent = Some(indent),
                    Err(_) => {
                        tracing::warn!(?value, "invalid indent attribute in include directive");
                        return None;
                    }
                },
                "encoding" => directive.encoding = Some(value),
                "opts" => directive.opts.extend(value.split(',').map(str::to_string)),
                _ => {}
            }
        }
        directive.warn_unsupported();
        Some(directive)
    }

    fn warn_unsupported(&self) {
        if let Some(level_offset) = &self.level_offset {
            tracing::warn!(%level_offset, "include leveloffset is not supported yet");
        }
        if !self.tags.is_empty() {
            tracing::warn!(tags = ?self.tags, "include tags are not supported yet");
        }
        if let Some(indent) = self.indent {
            tracing::warn!(indent, "include indent is not supported yet");
        }
        if !self.opts.is_empty() {
            tracing::warn!(opts = ?self.opts, "include opts are not supported yet");
        }
    }

    /// Resolve the target against the including file's directory, falling
    /// back to the catalog's `docdir` for string input.
    pub(crate) fn resolve(&self, base_dir: Option<&Path>, catalog: &AttributeCatalog) -> PathBuf {
        let target = PathBuf::from(&self.target);
        if target.is_absolute() {
            return target;
        }
        let base = base_dir.map_or_else(
            || PathBuf::from(catalog.value("docdir").unwrap_or(".")),
            Path::to_path_buf,
        );
        base.join(target)
    }

    pub(crate) fn has_line_filter(&self) -> bool {
        !self.lines.is_empty()
    }

    /// Whether an expanded line (1-based) survives the `lines=` selection.
    pub(crate) fn selects_line(&self, line: usize) -> bool {
        self.lines.is_empty() || self.lines.iter().any(|range| range.selects(line))
    }
}

/// Read a file and decode it from its BOM (UTF-8, UTF-16 LE/BE) or an
/// explicit `encoding=` label, falling back to plain UTF-8.
pub(crate) fn read_and_decode(path: &Path, encoding: Option<&str>) -> Result<String, Error> {
    let bytes = std::fs::read(path)?;

    if let Some(label) = encoding {
        return match Encoding::for_label(label.as_bytes()) {
            Some(encoding) => {
                let (cow, _, had_errors) = encoding.decode(&bytes);
                if had_errors {
                    tracing::error!(path = ?path.display(), label, "decoding encountered errors");
                }
                Ok(cow.into_owned())
            }
            None => Err(Error::UnknownEncoding(label.to_string())),
        };
    }

    for (bom, encoding, skip) in BOM_PATTERNS {
        if bytes.starts_with(bom) {
            if let Some(content) = bytes.get(*skip..) {
                let (cow, _, had_errors) = encoding.decode(content);
                if had_errors {
                    tracing::error!(path = ?path.display(), "decoding encountered errors");
                }
                return Ok(cow.into_owned());
            }
        }
    }

    let (cow, _, had_errors) = UTF_8.decode(&bytes);
    if had_errors {
        return Err(Error::UnrecognizedEncodingInFile(path.to_path_buf()));
    }
    Ok(cow.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_include() {
        let directive =
            IncludeDirective::parse("include::chapter.adoc[]", &AttributeCatalog::new()).unwrap();
        assert_eq!(directive.target, "chapter.adoc");
        assert!(!directive.has_line_filter());
    }

    #[test]
    fn test_target_resolves_attribute_references() {
        let mut catalog = AttributeCatalog::new();
        catalog.set("partialsdir", "partials");
        let directive =
            IncludeDirective::parse("include::{partialsdir}/intro.adoc[]", &catalog).unwrap();
        assert_eq!(directive.target, "partials/intro.adoc");
    }

    #[test]
    fn test_lines_attribute_single_and_ranges() {
        let directive = IncludeDirective::parse(
            "include::notes.adoc[lines=1;3..4]",
            &AttributeCatalog::new(),
        )
        .unwrap();
        assert!(directive.selects_line(1));
        assert!(!directive.selects_line(2));
        assert!(directive.selects_line(3));
        assert!(directive.selects_line(4));
        assert!(!directive.selects_line(5));
    }

    #[test]
    fn test_lines_attribute_open_range() {
        let directive = IncludeDirective::parse(
            "include::notes.adoc[lines=\"2..-1\"]",
            &AttributeCatalog::new(),
        )
        .unwrap();
        assert!(!directive.selects_line(1));
        assert!(directive.selects_line(2));
        assert!(directive.selects_line(100));
    }

    #[test]
    fn test_malformed_directive_rejected() {
        assert!(IncludeDirective::parse("include::[]", &AttributeCatalog::new()).is_none());
        assert!(
            IncludeDirective::parse("include::a.adoc[lines=x]", &AttributeCatalog::new()).is_none()
        );
    }

    #[test]
    fn test_resolve_prefers_base_dir() {
        let directive =
            IncludeDirective::parse("include::chapter.adoc[]", &AttributeCatalog::new()).unwrap();
        let resolved = directive.resolve(Some(Path::new("/docs/book")), &AttributeCatalog::new());
        assert_eq!(resolved, PathBuf::from("/docs/book/chapter.adoc"));
    }

    #[test]
    fn test_resolve_falls_back_to_docdir() {
        let mut catalog = AttributeCatalog::new();
        catalog.set("docdir", "/srv/docs");
        let directive = IncludeDirective::parse("include::chapter.adoc[]", &catalog).unwrap();
        assert_eq!(
            directive.resolve(None, &catalog),
            PathBuf::from("/srv/docs/chapter.adoc")
        );
    }
}
