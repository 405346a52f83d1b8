//! Location-preserving preprocessing core for `AsciiDoc` documents.
//!
//! The grammar engines that match blocks and inline markup operate on
//! *rewritten* text: conditional directives and includes splice lines away
//! before block matching, and attribute interpolation plus passthrough
//! extraction reshape each block's text before inline matching. This crate
//! owns everything that keeps the offsets those engines report meaningful:
//!
//! - [`LinePreprocessor`] rewrites the document line by line and produces a
//!   [`LineMap`] from output lines back to source lines and files.
//! - [`InlinePreprocessor`] rewrites one block's text and maintains a
//!   [`SourceMap`] with one entry per output character.
//! - [`LocationResolver`] composes both maps to turn any rewritten-text
//!   range into a [`Location`] in the author's files.
//! - [`BlockContext`] is the stack machine (sections, delimited containers,
//!   lists) the block grammar consults while matching.
//! - [`InlineModelBuilder`] assembles the grammar's raw inline matches into
//!   the final location-annotated nodes, restoring passthrough contents.
//!
//! ```
//! use tracedoc_parser::{
//!     AttributeCatalog, InlineModelBuilder, InlinePreprocessor, LinePreprocessor,
//!     LocationResolver, Mode, RawInline,
//! };
//!
//! let mut catalog = AttributeCatalog::new();
//! let doc = LinePreprocessor::new()
//!     .process(":name: Dan\n\nhi {name}!\n", &mut catalog)
//!     .unwrap();
//!
//! // The block grammar would isolate the paragraph; here it is line 3.
//! let block = doc.locations.slice(3, 1);
//! let processed = InlinePreprocessor::new(&catalog).process("hi {name}!", Mode::Default, None);
//! assert_eq!(processed.text, "hi Dan!");
//!
//! let resolver = LocationResolver::new("hi {name}!", &block);
//! let map = processed.source_map.unwrap();
//! let nodes =
//!     InlineModelBuilder::new(&resolver, Some(&map)).build(vec![RawInline::text(processed.text)]);
//! assert_eq!(nodes[0].location.start.line, 3);
//! ```

mod block_context;
mod error;
mod inline_builder;
mod inline_preprocessor;
mod location_resolver;
mod model;
mod preprocessor;
mod source_map;

pub use block_context::BlockContext;
pub use error::Error;
pub use inline_builder::{InlineModelBuilder, RawInline, RawNode, RawRange, RawText};
pub use inline_preprocessor::{
    InlinePreprocessor, Mode, PASS_FILLER, PASS_SENTINEL, ProcessedText,
};
pub use location_resolver::LocationResolver;
pub use model::{
    AttributeCatalog, AttributeEntry, AttributeOrigin, Form, InlineNode, Location, NodeType,
    Position,
};
pub use preprocessor::{LineMap, LineOrigin, LinePreprocessor, Operation, Preprocessed, evaluate_if};
pub use source_map::{MappedChar, Passthrough, SourceMap, SourceSpan, SpanTag};
