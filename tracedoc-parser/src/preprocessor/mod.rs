//! Line-level preprocessing: conditional directives, file inclusion and
//! attribute entries, performed in a single left-to-right scan over the
//! source lines.
//!
//! The scan produces the text the block grammar will actually see, plus a
//! [`LineMap`] recording, for every emitted line, which source line (of
//! which file) it came from and how many source lines were elided before
//! it. Everything downstream that reports a position leans on that map.

use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

use crate::{error::Error, model::AttributeCatalog};

mod attribute;
mod conditional;
mod include;
mod line_map;

pub use conditional::{Operation, evaluate_if};
pub use line_map::{LineMap, LineOrigin};

use include::{IncludeDirective, MAX_INCLUDE_DEPTH};

/// The outcome of one preprocessing pass: the rewritten text and the map
/// tying its lines back to the author's files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preprocessed {
    pub text: String,
    pub locations: LineMap,
}

/// An open `ifdef`/`ifndef`/`ifeval` enclosure. While any enclosure on the
/// stack is unsatisfied, lines are swallowed instead of emitted.
#[derive(Debug)]
struct OpenConditional {
    names: Vec<String>,
    satisfied: bool,
}

#[derive(Debug, Default)]
pub struct LinePreprocessor;

impl LinePreprocessor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Preprocess in-memory source. Includes resolve relative to the
    /// catalog's `docdir` attribute.
    ///
    /// # Errors
    /// Only structural failures abort: an include cycle, the include depth
    /// ceiling, or an include file that cannot be decoded.
    #[tracing::instrument(skip(self, input, catalog))]
    pub fn process(
        &self,
        input: &str,
        catalog: &mut AttributeCatalog,
    ) -> Result<Preprocessed, Error> {
        let mut active = Vec::new();
        self.process_nested(input, catalog, None, &[], &mut active)
    }

    /// Preprocess a file on disk. Includes resolve relative to the file.
    ///
    /// # Errors
    /// As [`LinePreprocessor::process`], plus an unreadable top-level file.
    #[tracing::instrument(skip(self, catalog, path))]
    pub fn process_file<P: AsRef<Path>>(
        &self,
        path: P,
        catalog: &mut AttributeCatalog,
    ) -> Result<Preprocessed, Error> {
        let path = path.as_ref();
        let input = include::read_and_decode(path, None)?;
        let mut active = match std::fs::canonicalize(path) {
            Ok(resolved) => vec![resolved],
            Err(_) => Vec::new(),
        };
        self.process_nested(&input, catalog, path.parent(), &[], &mut active)
    }

    #[allow(clippy::too_many_lines)]
    fn process_nested(
        &self,
        input: &str,
        catalog: &mut AttributeCatalog,
        base_dir: Option<&Path>,
        file_stack: &[String],
        active: &mut Vec<PathBuf>,
    ) -> Result<Preprocessed, Error> {
        let input = normalize(input);
        let mut text = String::with_capacity(input.len());
        let mut locations = LineMap::new();
        let mut line_offset: isize = 0;
        let mut enclosures: Vec<OpenConditional> = Vec::new();
        let mut fence: Option<String> = None;
        let mut at_boundary = true;

        let file = if file_stack.is_empty() {
            None
        } else {
            Some(file_stack.to_vec())
        };

        for (idx, raw) in input.split_inclusive('\n').enumerate() {
            let src_line = idx + 1;
            let (content, has_newline) = match raw.strip_suffix('\n') {
                Some(stripped) => (stripped, true),
                None => (raw, false),
            };

            // Inside a false branch every line is swallowed, but nested
            // enclosures still have to be tracked to find the matching endif.
            if enclosures.iter().any(|enclosure| !enclosure.satisfied) {
                if content.starts_with("endif::") {
                    if conditional::parse_endif(content).is_some() && enclosures.pop().is_none() {
                        tracing::warn!(line = content, "endif without matching conditional");
                    }
                } else if is_conditional_directive(content) {
                    if let Some(cond) = conditional::parse_line(content) {
                        if cond.is_enclosure() {
                            enclosures.push(OpenConditional {
                                names: cond.names().to_vec(),
                                satisfied: true,
                            });
                        }
                    }
                }
                line_offset += 1;
                continue;
            }

            // Escaped directives pass through minus the backslash.
            if let Some(rest) = content.strip_prefix('\\') {
                if is_conditional_directive(rest) || rest.starts_with("include::") {
                    push_line(
                        &mut text,
                        &mut locations,
                        rest,
                        has_newline,
                        LineOrigin {
                            line: src_line,
                            column: 2,
                            line_offset,
                            file: file.clone(),
                        },
                    );
                    at_boundary = false;
                    continue;
                }
            }

            // Attribute entries always pass through; the catalog updates
            // only outside verbatim content and at a paragraph boundary.
            if content.starts_with(':') {
                if let Some(entry) = attribute::parse_line(content) {
                    if fence.is_none() && at_boundary {
                        attribute::apply(catalog, &entry);
                    }
                    push_line(
                        &mut text,
                        &mut locations,
                        content,
                        has_newline,
                        LineOrigin {
                            line: src_line,
                            column: 1,
                            line_offset,
                            file: file.clone(),
                        },
                    );
                    continue;
                }
            }

            if is_directive_shape(content) {
                if is_conditional_directive(content) {
                    if let Some(cond) = conditional::parse_line(content) {
                        if cond.is_enclosure() {
                            enclosures.push(OpenConditional {
                                names: cond.names().to_vec(),
                                satisfied: cond.is_true(catalog),
                            });
                            line_offset += 1;
                        } else if cond.is_true(catalog) {
                            let payload = cond.payload().unwrap_or_default();
                            let column =
                                content.chars().count() - payload.chars().count();
                            push_line(
                                &mut text,
                                &mut locations,
                                payload,
                                has_newline,
                                LineOrigin {
                                    line: src_line,
                                    column,
                                    line_offset,
                                    file: file.clone(),
                                },
                            );
                            at_boundary = false;
                        } else {
                            line_offset += 1;
                        }
                        continue;
                    }
                    // Unparseable conditional: fall through as a plain line.
                } else if content.starts_with("endif::") {
                    if let Some(endif) = conditional::parse_endif(content) {
                        match enclosures.pop() {
                            Some(open) => {
                                if !endif.matches(&open.names) {
                                    tracing::warn!(
                                        line = content,
                                        "endif attribute does not match its opening directive"
                                    );
                                }
                            }
                            None => {
                                tracing::warn!(
                                    line = content,
                                    "endif without matching conditional"
                                );
                            }
                        }
                        line_offset += 1;
                        continue;
                    }
                } else if content.starts_with("include::") {
                    match self.expand_include(content, catalog, base_dir, file_stack, active)? {
                        Some(included) if !included.locations.is_empty() => {
                            let produced = included.locations.len();
                            if !text.is_empty() && !text.ends_with('\n') {
                                text.push('\n');
                            }
                            at_boundary =
                                included.text == "\n" || included.text.ends_with("\n\n");
                            text.push_str(&included.text);
                            locations.extend(included.locations);
                            // Keep `output_line + line_offset` correct for
                            // the parent lines that follow the splice.
                            line_offset += 1 - isize::try_from(produced).unwrap_or(isize::MAX);
                        }
                        Some(_) | None => {
                            line_offset += 1;
                        }
                    }
                    continue;
                }
            }

            if let Some(delimiter) = verbatim_delimiter(content) {
                match &fence {
                    Some(open) if *open == delimiter => fence = None,
                    Some(_) => {}
                    None => fence = Some(delimiter),
                }
                push_line(
                    &mut text,
                    &mut locations,
                    content,
                    has_newline,
                    LineOrigin {
                        line: src_line,
                        column: 1,
                        line_offset,
                        file: file.clone(),
                    },
                );
                at_boundary = false;
                continue;
            }

            push_line(
                &mut text,
                &mut locations,
                content,
                has_newline,
                LineOrigin {
                    line: src_line,
                    column: 1,
                    line_offset,
                    file: file.clone(),
                },
            );
            at_boundary = content.is_empty();
        }

        if !enclosures.is_empty() {
            tracing::warn!("unterminated conditional enclosure at end of input");
        }

        Ok(Preprocessed { text, locations })
    }

    /// Expand one include directive into preprocessed lines. `None` means
    /// the line is elided and processing continues; errors are reserved for
    /// cycles, the depth ceiling and undecodable files.
    fn expand_include(
        &self,
        line: &str,
        catalog: &mut AttributeCatalog,
        base_dir: Option<&Path>,
        file_stack: &[String],
        active: &mut Vec<PathBuf>,
    ) -> Result<Option<Preprocessed>, Error> {
        let Some(directive) = IncludeDirective::parse(line, catalog) else {
            return Ok(None);
        };
        let path = directive.resolve(base_dir, catalog);
        let resolved = match std::fs::canonicalize(&path) {
            Ok(resolved) => resolved,
            Err(error) => {
                tracing::warn!(
                    path = ?path.display(),
                    ?error,
                    "cannot resolve include target; eliding line"
                );
                return Ok(None);
            }
        };
        if active.contains(&resolved) {
            return Err(Error::IncludeCycle(path));
        }
        if active.len() >= MAX_INCLUDE_DEPTH {
            return Err(Error::IncludeDepthExceeded(MAX_INCLUDE_DEPTH, path));
        }

        let content = include::read_and_decode(&path, directive.encoding.as_deref())?;
        let mut child_stack = file_stack.to_vec();
        child_stack.push(directive.target.clone());

        active.push(resolved);
        let result = self.process_nested(&content, catalog, path.parent(), &child_stack, active);
        active.pop();

        let mut included = result?;
        if directive.has_line_filter() {
            filter_lines(&mut included, &directive);
        }
        Ok(Some(included))
    }
}

fn push_line(
    text: &mut String,
    locations: &mut LineMap,
    content: &str,
    has_newline: bool,
    origin: LineOrigin,
) {
    // A previously spliced include may have ended without a newline; the
    // next emitted line needs a separator, never a phantom line of its own.
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(content);
    if has_newline {
        text.push('\n');
    }
    locations.push(origin);
}

fn normalize(input: &str) -> Cow<'_, str> {
    if input.contains('\r') {
        Cow::Owned(input.replace("\r\n", "\n"))
    } else {
        Cow::Borrowed(input)
    }
}

fn is_directive_shape(line: &str) -> bool {
    line.ends_with(']') && !line.starts_with('[') && line.contains("::")
}

fn is_conditional_directive(line: &str) -> bool {
    line.starts_with("ifdef::") || line.starts_with("ifndef::") || line.starts_with("ifeval::")
}

/// A verbatim block delimiter: `----`, `....`, `++++` (4+ repeats) or a
/// markdown-style code fence. Tracked only so attribute-entry lines inside
/// verbatim content stay out of the catalog.
fn verbatim_delimiter(line: &str) -> Option<String> {
    let trimmed = line.trim_end();
    if trimmed.starts_with("```") {
        return Some("```".to_string());
    }
    let mut chars = trimmed.chars();
    let first = chars.next()?;
    if first != '-' && first != '.' && first != '+' {
        return None;
    }
    let run = 1 + chars.take_while(|c| *c == first).count();
    if run >= 4 && trimmed.chars().count() == run {
        Some(trimmed.to_string())
    } else {
        None
    }
}

fn filter_lines(included: &mut Preprocessed, directive: &IncludeDirective) {
    let mut text = String::with_capacity(included.text.len());
    for (idx, raw) in included.text.split_inclusive('\n').enumerate() {
        if directive.selects_line(idx + 1) {
            text.push_str(raw);
        }
    }
    included
        .locations
        .retain_lines(|line| directive.selects_line(line));
    included.text = text;
}
