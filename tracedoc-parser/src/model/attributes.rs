use rustc_hash::FxHashMap;
use serde::Serialize;

/// Where an attribute's current value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeOrigin {
    /// Supplied by the caller before parsing (CLI, API). Wins over the document.
    External,
    /// Set by an attribute entry line in the document or an included file.
    Document,
}

/// One catalog slot.
///
/// A `None` value means the attribute exists but is unset (`:name!:`);
/// conditional evaluation treats it the same as an absent attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeEntry {
    pub value: Option<String>,
    pub origin: AttributeOrigin,
    pub locked: bool,
}

/// The document attribute catalog: a plain name → value lookup consulted
/// (read-only) by both preprocessors and by conditional evaluation, and
/// updated by attribute entry lines during line preprocessing.
#[derive(Debug, Clone, Default)]
pub struct AttributeCatalog {
    entries: FxHashMap<String, AttributeEntry>,
}

impl AttributeCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Seed an attribute from outside the document. External attributes are
    /// locked: attribute entry lines cannot override or unset them.
    pub fn set_external(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(
            name.into(),
            AttributeEntry {
                value: Some(value.into()),
                origin: AttributeOrigin::External,
                locked: true,
            },
        );
    }

    /// Set an attribute from a document attribute entry. Returns false when
    /// the existing entry is locked and the update was discarded.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        self.put(name.into(), Some(value.into()))
    }

    /// Unset an attribute (`:name!:`). The slot is kept with a null value so
    /// a later `ifndef` still sees the name as unset, matching set-ness being
    /// defined by the value, not the slot.
    pub fn unset(&mut self, name: impl Into<String>) -> bool {
        self.put(name.into(), None)
    }

    fn put(&mut self, name: String, value: Option<String>) -> bool {
        if let Some(existing) = self.entries.get(&name) {
            if existing.locked {
                tracing::warn!(%name, "ignoring attribute entry for locked attribute");
                return false;
            }
        }
        self.entries.insert(
            name,
            AttributeEntry {
                value,
                origin: AttributeOrigin::Document,
                locked: false,
            },
        );
        true
    }

    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&AttributeEntry> {
        self.entries.get(name)
    }

    /// The attribute's value, if the attribute is set.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&str> {
        self.entries
            .get(name)
            .and_then(|entry| entry.value.as_deref())
    }

    /// Whether the name is present with a non-null value.
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.value(name).is_some()
    }

    /// Resolve `{name}` references in `text` against the catalog.
    ///
    /// Unresolved references stay literal, braces included.
    #[must_use]
    pub fn substitute(&self, text: &str) -> String {
        if !text.contains('{') {
            return text.to_string();
        }
        let mut result = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(open) = rest.find('{') {
            let (head, tail) = rest.split_at(open);
            result.push_str(head);
            if let Some(close) = tail.find('}') {
                let name = &tail[1..close];
                if let Some(value) = self.value(name) {
                    result.push_str(value);
                } else {
                    result.push_str(&tail[..=close]);
                }
                rest = &tail[close + 1..];
            } else {
                result.push_str(tail);
                return result;
            }
        }
        result.push_str(rest);
        result
    }
}
