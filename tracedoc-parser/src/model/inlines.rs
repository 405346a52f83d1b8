use serde::Serialize;

use super::Location;

/// The `type` discriminator carried by every ASG node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Block,
    Inline,
    String,
}

/// The form of a span or passthrough: which delimiter flavor produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Form {
    Constrained,
    Unconstrained,
    Macro,
}

/// A resolved inline node of the final tree.
///
/// String nodes (`type: "string"`) carry `value`; container nodes
/// (`type: "inline"`) carry `inlines`. Serializes to the ASG JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineNode {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<Form>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inlines: Vec<InlineNode>,
    pub location: Location,
}

impl InlineNode {
    /// A plain text node.
    #[must_use]
    pub fn text(value: impl Into<String>, location: Location) -> Self {
        Self {
            name: "text".to_string(),
            node_type: NodeType::String,
            variant: None,
            form: None,
            value: Some(value.into()),
            inlines: Vec::new(),
            location,
        }
    }

    /// A container node (span, mark, reference) holding nested inlines.
    #[must_use]
    pub fn container(
        name: impl Into<String>,
        variant: Option<String>,
        form: Option<Form>,
        inlines: Vec<InlineNode>,
        location: Location,
    ) -> Self {
        Self {
            name: name.into(),
            node_type: NodeType::Inline,
            variant,
            form,
            value: None,
            inlines,
            location,
        }
    }
}
