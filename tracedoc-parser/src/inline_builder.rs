//! Turning the inline grammar's raw match sequence into the final model:
//! coalescing adjacent text, restoring passthrough contents, and resolving
//! every local range into a source location.

use crate::{
    location_resolver::LocationResolver,
    model::{Form, InlineNode},
    source_map::SourceMap,
};

/// A local offset range reported by the grammar, in the coordinates of the
/// block's rewritten text. `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRange {
    pub start: usize,
    pub end: usize,
    /// Where the contained text begins, for container nodes: the offset
    /// just past the opening delimiter.
    pub inlines_start: Option<usize>,
}

/// One element of the raw match sequence for a block's inlines.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInline {
    Text(RawText),
    Node(RawNode),
}

/// A plain text fragment. An escaped fragment consumed a leading backslash
/// that is not part of the value; its location starts past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawText {
    pub value: String,
    pub escaped: bool,
}

/// A structured match: a span, mark or macro with a local range and,
/// for containers, a nested raw sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNode {
    pub name: String,
    pub variant: Option<String>,
    pub form: Option<Form>,
    pub range: RawRange,
    pub inlines: Vec<RawInline>,
}

impl RawInline {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        RawInline::Text(RawText {
            value: value.into(),
            escaped: false,
        })
    }

    #[must_use]
    pub fn escaped_text(value: impl Into<String>) -> Self {
        RawInline::Text(RawText {
            value: value.into(),
            escaped: true,
        })
    }
}

struct TextRun {
    start: usize,
    end: usize,
    value: String,
}

/// Builds the final inline nodes for one block.
#[derive(Debug)]
pub struct InlineModelBuilder<'a> {
    resolver: &'a LocationResolver,
    source_map: Option<&'a SourceMap>,
}

impl<'a> InlineModelBuilder<'a> {
    #[must_use]
    pub fn new(resolver: &'a LocationResolver, source_map: Option<&'a SourceMap>) -> Self {
        Self {
            resolver,
            source_map,
        }
    }

    /// Consume the grammar's raw sequence and produce the final nodes.
    #[must_use]
    pub fn build(&self, nodes: Vec<RawInline>) -> Vec<InlineNode> {
        self.build_from(nodes, 0)
    }

    fn build_from(&self, nodes: Vec<RawInline>, start_offset: usize) -> Vec<InlineNode> {
        let mut out = Vec::new();
        let mut offset = start_offset;
        let mut run: Option<TextRun> = None;

        for raw in nodes {
            match raw {
                RawInline::Text(text) => {
                    let consumed = text.value.chars().count() + usize::from(text.escaped);
                    let restored = if text.escaped {
                        text.value
                    } else {
                        self.restore_passthroughs(&text.value, offset)
                    };
                    match &mut run {
                        Some(open) => {
                            open.value.push_str(&restored);
                            open.end += consumed;
                        }
                        None => {
                            let start = if text.escaped { offset + 1 } else { offset };
                            run = Some(TextRun {
                                start,
                                end: offset + consumed,
                                value: restored,
                            });
                        }
                    }
                    offset += consumed;
                }
                RawInline::Node(node) => {
                    if let Some(open) = run.take() {
                        out.push(self.flush(open));
                    }
                    let location =
                        self.resolver
                            .resolve(node.range.start, node.range.end, self.source_map);
                    let inlines = if node.inlines.is_empty() {
                        Vec::new()
                    } else {
                        let base = node.range.inlines_start.unwrap_or(node.range.start);
                        self.build_from(node.inlines, base)
                    };
                    offset = node.range.end;
                    out.push(InlineNode::container(
                        node.name,
                        node.variant,
                        node.form,
                        inlines,
                        location,
                    ));
                }
            }
        }

        if let Some(open) = run.take() {
            out.push(self.flush(open));
        }
        out
    }

    fn flush(&self, run: TextRun) -> InlineNode {
        let location = self.resolver.resolve(run.start, run.end, self.source_map);
        InlineNode::text(run.value, location)
    }

    /// Swap placeholder spans for the contents recorded during extraction.
    /// The restored contents are inserted verbatim, never re-scanned.
    fn restore_passthroughs(&self, value: &str, fragment_start: usize) -> String {
        let Some(map) = self.source_map else {
            return value.to_string();
        };
        if map.passthrough_count() == 0 {
            return value.to_string();
        }
        let mut out = String::with_capacity(value.len());
        let mut current = None;
        for (j, c) in value.chars().enumerate() {
            match map.pass_at(fragment_start + j) {
                Some(index) => {
                    if current != Some(index) {
                        if let Some(pass) = map.passthrough(index) {
                            out.push_str(&pass.contents);
                        }
                        current = Some(index);
                    }
                }
                None => {
                    out.push(c);
                    current = None;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        inline_preprocessor::{InlinePreprocessor, Mode},
        model::{AttributeCatalog, Position},
        preprocessor::LinePreprocessor,
    };
    use pretty_assertions::assert_eq;

    fn resolver_for(input: &str) -> LocationResolver {
        let mut catalog = AttributeCatalog::new();
        let result = LinePreprocessor::new().process(input, &mut catalog).unwrap();
        LocationResolver::new(&result.text, &result.locations)
    }

    fn span(range: std::ops::Range<usize>, inlines_start: usize, inner: &str) -> RawInline {
        RawInline::Node(RawNode {
            name: "span".to_string(),
            variant: Some("strong".to_string()),
            form: Some(Form::Constrained),
            range: RawRange {
                start: range.start,
                end: range.end,
                inlines_start: Some(inlines_start),
            },
            inlines: vec![RawInline::text(inner)],
        })
    }

    #[test]
    fn test_adjacent_text_fragments_coalesce() {
        let resolver = resolver_for("foobar");
        let builder = InlineModelBuilder::new(&resolver, None);
        let nodes = builder.build(vec![RawInline::text("foo"), RawInline::text("bar")]);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].value.as_deref(), Some("foobar"));
        assert_eq!(nodes[0].location.start, Position::new(1, 1));
        assert_eq!(nodes[0].location.end, Position::new(1, 6));
    }

    #[test]
    fn test_escaped_fragment_skips_backslash() {
        let resolver = resolver_for("\\*disclaimer");
        let builder = InlineModelBuilder::new(&resolver, None);
        let nodes = builder.build(vec![
            RawInline::escaped_text("*"),
            RawInline::text("disclaimer"),
        ]);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].value.as_deref(), Some("*disclaimer"));
        assert_eq!(nodes[0].location.start, Position::new(1, 2));
        assert_eq!(nodes[0].location.end, Position::new(1, 12));
    }

    #[test]
    fn test_container_node_with_nested_text() {
        let resolver = resolver_for("*strong*");
        let builder = InlineModelBuilder::new(&resolver, None);
        let nodes = builder.build(vec![span(0..8, 1, "strong")]);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "span");
        assert_eq!(nodes[0].location.start, Position::new(1, 1));
        assert_eq!(nodes[0].location.end, Position::new(1, 8));
        assert_eq!(nodes[0].inlines.len(), 1);
        assert_eq!(nodes[0].inlines[0].value.as_deref(), Some("strong"));
        assert_eq!(nodes[0].inlines[0].location.start, Position::new(1, 2));
        assert_eq!(nodes[0].inlines[0].location.end, Position::new(1, 7));
    }

    #[test]
    fn test_text_after_node_starts_at_node_end() {
        let resolver = resolver_for("*strong* after");
        let builder = InlineModelBuilder::new(&resolver, None);
        let nodes = builder.build(vec![span(0..8, 1, "strong"), RawInline::text(" after")]);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].location.start, Position::new(1, 9));
        assert_eq!(nodes[1].location.end, Position::new(1, 14));
    }

    #[test]
    fn test_passthrough_placeholder_restored_verbatim() {
        let source = "+*bold*+ x";
        let resolver = resolver_for(source);
        let catalog = AttributeCatalog::new();
        let processed = InlinePreprocessor::new(&catalog).process(source, Mode::Default, None);
        let map = processed.source_map.unwrap();

        let builder = InlineModelBuilder::new(&resolver, Some(&map));
        let nodes = builder.build(vec![RawInline::text(processed.text)]);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].value.as_deref(), Some("*bold* x"));
        assert_eq!(nodes[0].location.start, Position::new(1, 1));
        assert_eq!(nodes[0].location.end, Position::new(1, 10));
    }

    #[test]
    fn test_substituted_attribute_span_resolves_to_reference() {
        let source = "hi {name}!";
        let resolver = resolver_for(source);
        let mut catalog = AttributeCatalog::new();
        catalog.set("name", "Dan");
        let processed = InlinePreprocessor::new(&catalog).process(source, Mode::Default, None);
        assert_eq!(processed.text, "hi Dan!");
        let map = processed.source_map.unwrap();

        let builder = InlineModelBuilder::new(&resolver, Some(&map));
        let nodes = builder.build(vec![RawInline::text(processed.text)]);
        assert_eq!(nodes[0].value.as_deref(), Some("hi Dan!"));
        assert_eq!(nodes[0].location.start, Position::new(1, 1));
        assert_eq!(nodes[0].location.end, Position::new(1, 10));

        // The "Dan" span alone resolves to the `{name}` extent.
        let dan = resolver.resolve(3, 6, Some(&map));
        assert_eq!(dan.start, Position::new(1, 4));
        assert_eq!(dan.end, Position::new(1, 9));
    }

    #[test]
    fn test_empty_sequence() {
        let resolver = resolver_for("");
        let builder = InlineModelBuilder::new(&resolver, None);
        assert!(builder.build(Vec::new()).is_empty());
    }
}
