//! The data model shared by every stage of the pipeline: positions and
//! locations in the user's original source, the attribute catalog, and the
//! resolved inline nodes of the final tree.

mod attributes;
mod inlines;
mod location;

pub use attributes::{AttributeCatalog, AttributeEntry, AttributeOrigin};
pub use inlines::{Form, InlineNode, NodeType};
pub use location::{Location, Position};
