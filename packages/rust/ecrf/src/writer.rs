//! Serialization of a [`Plugin`] tree to ECML.

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use contentflow_shared::{ContentFlowError, Result};

use crate::Plugin;

/// Render `tree` as an indented ECML document with an XML declaration.
///
/// Node data is written as CDATA unless it contains a CDATA terminator, in
/// which case it is written as escaped text.
pub fn to_ecml(tree: &Plugin) -> Result<String> {
    if tree.is_empty() {
        return Err(ContentFlowError::Packaging(
            "cannot write an empty content tree".into(),
        ));
    }

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(write_error)?;
    write_node(&mut writer, tree)?;

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| ContentFlowError::Packaging(format!("ECML output is not UTF-8: {e}")))
}

fn write_node(writer: &mut Writer<Cursor<Vec<u8>>>, node: &Plugin) -> Result<()> {
    if node.kind.is_empty() {
        return Err(ContentFlowError::Packaging(
            "content tree contains a node without a kind".into(),
        ));
    }

    let mut start = BytesStart::new(node.kind.as_str());
    for (name, value) in &node.attributes {
        start.push_attribute((name.as_str(), value.as_str()));
    }

    if node.data.is_none() && node.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(write_error);
    }

    writer.write_event(Event::Start(start)).map_err(write_error)?;

    if let Some(data) = &node.data {
        let event = if data.contains("]]>") {
            Event::Text(BytesText::new(data))
        } else {
            Event::CData(BytesCData::new(data.as_str()))
        };
        writer.write_event(event).map_err(write_error)?;
    }

    for child in &node.children {
        write_node(writer, child)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(node.kind.as_str())))
        .map_err(write_error)
}

fn write_error(e: impl std::fmt::Display) -> ContentFlowError {
    ContentFlowError::Packaging(format!("failed to write ECML: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContentParser, XmlContentParser};

    #[test]
    fn writes_declaration_attributes_and_cdata() {
        let tree = Plugin::new("theme")
            .with_attribute("id", "theme")
            .with_child(Plugin::new("events").with_data("a < b"));

        let xml = to_ecml(&tree).expect("write");
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<theme id=\"theme\">"));
        assert!(xml.contains("<![CDATA[a < b]]>"));
        assert!(xml.trim_end().ends_with("</theme>"));
    }

    #[test]
    fn written_document_parses_back_to_the_same_tree() {
        let tree = Plugin::new("theme")
            .with_attribute("ver", "0.3")
            .with_attribute("note", "\"quoted\" & <tagged>")
            .with_child(
                Plugin::new("manifest")
                    .with_child(Plugin::new("media").with_attribute("src", "assets/a.png")),
            )
            .with_child(Plugin::new("text").with_data("end ]]> marker"));

        let xml = to_ecml(&tree).expect("write");
        let parsed = XmlContentParser.parse_content(&xml).expect("parse");
        assert_eq!(parsed, tree);
    }

    #[test]
    fn empty_tree_is_rejected() {
        let err = to_ecml(&Plugin::default()).unwrap_err();
        assert_eq!(err.code(), "PACKAGING");
    }
}
