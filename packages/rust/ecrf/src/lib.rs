//! Content tree (ECRF) model, markup parsers, and markup file handling.
//!
//! This crate provides:
//! - [`Plugin`]: the recursive content tree node
//! - [`ContentParser`] with [`JsonContentParser`] and [`XmlContentParser`]
//! - [`markup`]: detection and loading of `index.json` / `index.ecml`
//! - [`writer`]: serialization of a tree back to ECML

mod json;
pub mod markup;
mod xml;
pub mod writer;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use contentflow_shared::{MarkupType, Result};

pub use json::JsonContentParser;
pub use markup::{MarkupDocument, detect_markup_type, load_markup, load_markup_text};
pub use writer::to_ecml;
pub use xml::XmlContentParser;

// ---------------------------------------------------------------------------
// Plugin tree
// ---------------------------------------------------------------------------

/// A node of the content tree.
///
/// The default value (empty kind, no attributes, children or data) is the
/// "empty tree" returned when no markup could be determined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    /// Type tag, e.g. `theme`, `stage`, `media`.
    pub kind: String,
    /// Attributes in document order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, String>,
    /// Text or CDATA content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Child nodes in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Plugin>,
}

impl Plugin {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: Plugin) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// True for the default "empty tree".
    pub fn is_empty(&self) -> bool {
        self.kind.is_empty()
            && self.attributes.is_empty()
            && self.data.is_none()
            && self.children.is_empty()
    }

    /// Direct children with the given kind.
    pub fn children_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Plugin> + 'a {
        self.children.iter().filter(move |c| c.kind == kind)
    }

    /// Total number of nodes in the tree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Plugin::count).sum::<usize>()
    }

    /// All nodes of the given kind, depth-first in document order.
    pub fn descendants<'a>(&'a self, kind: &str) -> Vec<&'a Plugin> {
        let mut found = Vec::new();
        self.collect_descendants(kind, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, kind: &str, found: &mut Vec<&'a Plugin>) {
        for child in &self.children {
            if child.kind == kind {
                found.push(child);
            }
            child.collect_descendants(kind, found);
        }
    }

    /// Apply `f` to every node of the given kind, depth-first, stopping at the first error.
    pub fn try_visit_mut<E>(
        &mut self,
        kind: &str,
        f: &mut impl FnMut(&mut Plugin) -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        for child in &mut self.children {
            if child.kind == kind {
                f(child)?;
            }
            child.try_visit_mut(kind, f)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// A parser from one markup dialect into the common [`Plugin`] tree.
pub trait ContentParser {
    /// The dialect this parser reads.
    fn markup_type(&self) -> MarkupType;

    /// Parse a complete document. Malformed input fails with a
    /// `MarkupParse` error naming the dialect.
    fn parse_content(&self, text: &str) -> Result<Plugin>;
}

/// Parse `text` with the parser selected by `markup_type`.
///
/// `None` yields the empty default tree without looking at `text`.
pub fn parse(text: &str, markup_type: Option<MarkupType>) -> Result<Plugin> {
    match markup_type {
        Some(MarkupType::Json) => JsonContentParser.parse_content(text),
        Some(MarkupType::Xml) => XmlContentParser.parse_content(text),
        None => {
            tracing::debug!("markup type undetermined, using empty tree");
            Ok(Plugin::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/ecml/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    /// Structural summary ignoring attribute order and data whitespace.
    fn shape(plugin: &Plugin) -> String {
        let mut attrs: Vec<_> = plugin.attributes.iter().collect();
        attrs.sort();
        let children: Vec<String> = plugin.children.iter().map(shape).collect();
        format!(
            "{}{:?}[{}]({})",
            plugin.kind,
            attrs,
            plugin.data.as_deref().map(str::trim).unwrap_or(""),
            children.join(",")
        )
    }

    #[test]
    fn json_and_xml_fixtures_produce_the_same_tree() {
        let from_json = parse(&load_fixture("story.json"), Some(MarkupType::Json)).expect("json");
        let from_xml = parse(&load_fixture("story.ecml"), Some(MarkupType::Xml)).expect("xml");

        assert_eq!(from_json.kind, "theme");
        assert_eq!(from_xml.kind, "theme");
        assert_eq!(shape(&from_json), shape(&from_xml));
    }

    #[test]
    fn undetermined_markup_yields_empty_tree() {
        let tree = parse("whatever", None).expect("parse");
        assert!(tree.is_empty());
        assert_eq!(tree, Plugin::default());
    }

    #[test]
    fn descendants_and_count() {
        let tree = parse(&load_fixture("story.ecml"), Some(MarkupType::Xml)).expect("xml");
        let media = tree.descendants("media");
        assert_eq!(media.len(), 3);
        assert_eq!(media[0].attribute("id"), Some("bg"));
        assert!(tree.count() > media.len());
        assert_eq!(tree.children_of_kind("stage").count(), 2);
    }

    #[test]
    fn try_visit_mut_rewrites_matching_nodes() {
        let mut tree = Plugin::new("theme")
            .with_child(Plugin::new("manifest").with_child(Plugin::new("media").with_attribute("src", "a.png")))
            .with_child(Plugin::new("media").with_attribute("src", "b.png"));

        tree.try_visit_mut("media", &mut |node| {
            let src = node.attribute("src").unwrap_or_default().to_uppercase();
            node.set_attribute("src", src);
            Ok::<(), ()>(())
        })
        .unwrap();

        let srcs: Vec<_> = tree
            .descendants("media")
            .iter()
            .filter_map(|m| m.attribute("src"))
            .collect();
        assert_eq!(srcs, vec!["A.PNG", "B.PNG"]);
    }
}
