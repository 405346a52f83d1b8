//! Inline-level preprocessing of one block's text: attribute-reference
//! interpolation and passthrough extraction, performed ahead of the inline
//! grammar.
//!
//! Interpolation changes character counts mid-line, so every rewrite also
//! maintains a [`SourceMap`] with one entry per output character.
//! Passthrough extraction is length-preserving by construction: the matched
//! span is replaced by a sentinel plus fillers of the same total length,
//! and the original contents are recorded for restoration during model
//! building.

use crate::{
    model::{AttributeCatalog, Form},
    source_map::{MappedChar, Passthrough, SourceMap, SourceSpan, SpanTag},
};

/// First character of a passthrough placeholder.
pub const PASS_SENTINEL: char = '\u{10}';
/// Padding for the rest of a placeholder span.
pub const PASS_FILLER: char = '\u{0}';

/// Which of the two rewrites run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Both attribute interpolation and passthrough extraction.
    #[default]
    Default,
    /// Interpolation only; `+`/`pass:` sequences stay untouched.
    Attributes,
    /// Extraction only; `{name}` references stay untouched.
    Passthroughs,
}

impl Mode {
    fn interpolates(self) -> bool {
        matches!(self, Mode::Default | Mode::Attributes)
    }

    fn extracts(self) -> bool {
        matches!(self, Mode::Default | Mode::Passthroughs)
    }
}

/// The outcome of one inline rewrite. `source_map` is omitted only when
/// nothing changed and no map was supplied to chain from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedText {
    pub text: String,
    pub source_map: Option<SourceMap>,
}

#[derive(Debug)]
pub struct InlinePreprocessor<'a> {
    catalog: &'a AttributeCatalog,
}

impl<'a> InlinePreprocessor<'a> {
    #[must_use]
    pub fn new(catalog: &'a AttributeCatalog) -> Self {
        Self { catalog }
    }

    /// Rewrite `input` under `mode`, threading `supplied` (the map from an
    /// earlier phase) into the result. Offsets in the map are character
    /// offsets.
    #[must_use]
    #[tracing::instrument(skip(self, input, supplied))]
    pub fn process(
        &self,
        input: &str,
        mode: Mode,
        supplied: Option<SourceMap>,
    ) -> ProcessedText {
        if !input.contains('{') && !input.contains('+') && !input.contains("pass:") {
            return ProcessedText {
                text: input.to_string(),
                source_map: supplied,
            };
        }

        let chars: Vec<char> = input.chars().collect();
        if let Some(map) = &supplied {
            if map.len() != chars.len() {
                tracing::warn!(
                    map_len = map.len(),
                    text_len = chars.len(),
                    "supplied source map does not cover the text; offsets may drift"
                );
            }
        }
        let entry_at = |offset: usize| -> MappedChar {
            supplied
                .as_ref()
                .and_then(|map| map.entry(offset).cloned())
                .unwrap_or_else(|| MappedChar::point(offset))
        };

        let mut out = String::with_capacity(input.len());
        let mut out_map = SourceMap::with_capacity(
            chars.len(),
            supplied
                .as_ref()
                .map(|map| map.passthroughs().to_vec())
                .unwrap_or_default(),
        );
        let mut changed = false;

        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];

            if c == '\\' {
                let mut run = 0;
                while chars.get(i + run) == Some(&'\\') {
                    run += 1;
                }
                let after = i + run;

                if mode.interpolates() {
                    if let Some((name, end)) = parse_attribute_ref(&chars, after) {
                        // A run of N backslashes yields floor(N/2) literal
                        // ones; an odd run leaves the reference literal.
                        for k in 0..run / 2 {
                            out.push('\\');
                            out_map.push(entry_at(i + 2 * k));
                        }
                        changed = true;
                        if run % 2 == 1 {
                            emit_verbatim(&mut out, &mut out_map, &chars, after, end, &entry_at);
                        } else if let Some(value) = self.catalog.value(&name) {
                            substitute(&mut out, &mut out_map, value, &name, after, end, &entry_at);
                        } else {
                            emit_verbatim(&mut out, &mut out_map, &chars, after, end, &entry_at);
                        }
                        i = end;
                        continue;
                    }
                }

                // Backslashes outside an attribute context are plain text;
                // an odd run additionally neutralizes a passthrough opener
                // right after it.
                emit_verbatim(&mut out, &mut out_map, &chars, i, after, &entry_at);
                i = after;
                if mode.extracts()
                    && run % 2 == 1
                    && match_passthrough(&chars, i).is_some()
                {
                    emit_verbatim(&mut out, &mut out_map, &chars, i, i + 1, &entry_at);
                    i += 1;
                }
                continue;
            }

            if c == '{' && mode.interpolates() {
                if let Some((name, end)) = parse_attribute_ref(&chars, i) {
                    if let Some(value) = self.catalog.value(&name) {
                        substitute(&mut out, &mut out_map, value, &name, i, end, &entry_at);
                        changed = true;
                    } else {
                        // Unresolved: the whole reference stays literal and
                        // is not rescanned.
                        emit_verbatim(&mut out, &mut out_map, &chars, i, end, &entry_at);
                    }
                    i = end;
                    continue;
                }
            }

            if mode.extracts() {
                if let Some(found) = match_passthrough(&chars, i) {
                    let contents: String = chars[found.contents.clone()].iter().collect();
                    let index = out_map.record_passthrough(Passthrough {
                        contents,
                        form: found.form,
                    });
                    for (k, offset) in (i..found.end).enumerate() {
                        out.push(if k == 0 { PASS_SENTINEL } else { PASS_FILLER });
                        let mut entry = entry_at(offset);
                        entry.pass = Some(index);
                        out_map.push(entry);
                    }
                    changed = true;
                    i = found.end;
                    continue;
                }
            }

            out.push(c);
            out_map.push(entry_at(i));
            i += 1;
        }

        if changed {
            debug_assert_eq!(out.chars().count(), out_map.len());
            ProcessedText {
                text: out,
                source_map: Some(out_map),
            }
        } else {
            ProcessedText {
                text: input.to_string(),
                source_map: supplied,
            }
        }
    }
}

fn emit_verbatim(
    out: &mut String,
    out_map: &mut SourceMap,
    chars: &[char],
    from: usize,
    to: usize,
    entry_at: &impl Fn(usize) -> MappedChar,
) {
    for offset in from..to {
        out.push(chars[offset]);
        out_map.push(entry_at(offset));
    }
}

/// Emit a substituted attribute value, retagging the whole consumed span
/// (braces included) as one source range so any offset into the value
/// resolves inside the original reference.
fn substitute(
    out: &mut String,
    out_map: &mut SourceMap,
    value: &str,
    name: &str,
    from: usize,
    to: usize,
    entry_at: &impl Fn(usize) -> MappedChar,
) {
    let low = entry_at(from).span.low();
    let high = entry_at(to - 1).span.high();
    for c in value.chars() {
        out.push(c);
        out_map.push(MappedChar {
            span: SourceSpan::Range {
                low,
                high,
                tag: SpanTag::Attribute(name.to_string()),
            },
            pass: None,
        });
    }
}

/// `{name}` at `start`: first char lowercase/digit/underscore, then also
/// hyphens, closed by `}`. Returns the name and the exclusive end offset.
fn parse_attribute_ref(chars: &[char], start: usize) -> Option<(String, usize)> {
    if chars.get(start) != Some(&'{') {
        return None;
    }
    let first = *chars.get(start + 1)?;
    if !(first.is_ascii_lowercase() || first.is_ascii_digit() || first == '_') {
        return None;
    }
    let mut end = start + 2;
    while let Some(c) = chars.get(end) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-' {
            end += 1;
        } else {
            break;
        }
    }
    if chars.get(end) == Some(&'}') {
        let name = chars[start + 1..end].iter().collect();
        Some((name, end + 1))
    } else {
        None
    }
}

struct PassthroughMatch {
    contents: std::ops::Range<usize>,
    form: Form,
    end: usize,
}

fn match_passthrough(chars: &[char], start: usize) -> Option<PassthroughMatch> {
    match chars.get(start)? {
        '+' => {
            if chars.get(start + 1) == Some(&'+') {
                match_unconstrained(chars, start)
            } else {
                match_constrained(chars, start)
            }
        }
        'p' => match_macro(chars, start),
        _ => None,
    }
}

/// `++text++`: contents end with a character that is neither `+` nor a
/// backslash. Confined to one line.
fn match_unconstrained(chars: &[char], start: usize) -> Option<PassthroughMatch> {
    let mut k = start + 3;
    while k + 1 < chars.len() {
        let c = chars[k - 1];
        if c == '\n' {
            return None;
        }
        if chars[k] == '+' && chars[k + 1] == '+' && c != '+' && c != '\\' {
            return Some(PassthroughMatch {
                contents: start + 2..k,
                form: Form::Unconstrained,
                end: k + 2,
            });
        }
        k += 1;
    }
    None
}

/// `+text+`: not adjacent to alphanumerics, contents neither space-padded
/// nor ending in a backslash. Confined to one line.
fn match_constrained(chars: &[char], start: usize) -> Option<PassthroughMatch> {
    if start > 0 && chars[start - 1].is_alphanumeric() {
        return None;
    }
    let first = *chars.get(start + 1)?;
    if first.is_whitespace() || first == '\\' {
        return None;
    }
    let mut k = start + 2;
    while k < chars.len() {
        let last = chars[k - 1];
        if last == '\n' {
            return None;
        }
        if chars[k] == '+'
            && !last.is_whitespace()
            && last != '\\'
            && chars.get(k + 1).is_none_or(|next| !next.is_alphanumeric())
        {
            return Some(PassthroughMatch {
                contents: start + 1..k,
                form: Form::Constrained,
                end: k + 1,
            });
        }
        k += 1;
    }
    None
}

/// `pass:[text]`: contents end with a character other than a backslash.
fn match_macro(chars: &[char], start: usize) -> Option<PassthroughMatch> {
    const OPENER: [char; 6] = ['p', 'a', 's', 's', ':', '['];
    for (k, expected) in OPENER.iter().enumerate() {
        if chars.get(start + k) != Some(expected) {
            return None;
        }
    }
    let mut k = start + 7;
    while k < chars.len() {
        let last = chars[k - 1];
        if last == '\n' {
            return None;
        }
        if chars[k] == ']' && last != '\\' {
            return Some(PassthroughMatch {
                contents: start + 6..k,
                form: Form::Macro,
                end: k + 1,
            });
        }
        k += 1;
    }
    None
}
