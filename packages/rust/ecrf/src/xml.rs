//! XML-dialect (ECML) parser built on `quick-xml`.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, instrument};

use contentflow_shared::{ContentFlowError, MarkupType, Result};

use crate::{ContentParser, Plugin};

/// Parser for `index.ecml` documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlContentParser;

impl ContentParser for XmlContentParser {
    fn markup_type(&self) -> MarkupType {
        MarkupType::Xml
    }

    #[instrument(skip_all, fields(len = text.len()))]
    fn parse_content(&self, text: &str) -> Result<Plugin> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Plugin> = Vec::new();
        let mut root: Option<Plugin> = None;

        loop {
            let event_start = reader.buffer_position();

            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    stack.push(start_node(&e, event_start)?);
                }
                Ok(Event::Empty(e)) => {
                    let node = start_node(&e, event_start)?;
                    attach(node, &mut stack, &mut root, event_start)?;
                }
                Ok(Event::End(_)) => {
                    let node = stack.pop().ok_or_else(|| {
                        syntax_error("unexpected closing tag", Some(event_start))
                    })?;
                    attach(node, &mut stack, &mut root, event_start)?;
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().map_err(|err| {
                        syntax_error(format!("invalid text content: {err}"), Some(event_start))
                    })?;
                    append_data(&mut stack, &text, event_start)?;
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    append_data(&mut stack, &text, event_start)?;
                }
                Ok(Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_)) => {}
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(syntax_error(e.to_string(), Some(reader.error_position())));
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(ContentFlowError::parse(
                MarkupType::Xml,
                format!("unexpected end of document, expected closing tag </{}>", open.kind),
                None,
            ));
        }

        let root = root.ok_or_else(|| {
            ContentFlowError::parse(MarkupType::Xml, "empty document: no root element", None)
        })?;

        debug!(root = %root.kind, nodes = root.count(), "parsed XML markup");
        Ok(root)
    }
}

fn start_node(e: &BytesStart<'_>, position: u64) -> Result<Plugin> {
    let mut node = Plugin::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());

    for attr in e.attributes() {
        let attr = attr.map_err(|err| {
            syntax_error(format!("invalid attribute: {err}"), Some(position))
        })?;
        let name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|err| {
            syntax_error(format!("invalid attribute value: {err}"), Some(position))
        })?;
        node.attributes.insert(name, value.into_owned());
    }

    Ok(node)
}

/// Attach a completed node to its parent, or make it the root.
fn attach(
    node: Plugin,
    stack: &mut [Plugin],
    root: &mut Option<Plugin>,
    position: u64,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_some() => {
            return Err(syntax_error(
                format!("multiple root elements (second root `{}`)", node.kind),
                Some(position),
            ));
        }
        None => *root = Some(node),
    }
    Ok(())
}

fn append_data(stack: &mut [Plugin], text: &str, position: u64) -> Result<()> {
    if text.trim().is_empty() {
        return Ok(());
    }
    match stack.last_mut() {
        Some(node) => {
            node.data.get_or_insert_with(String::new).push_str(text);
            Ok(())
        }
        None => Err(syntax_error("text outside of the root element", Some(position))),
    }
}

fn syntax_error(msg: impl Into<String>, position: Option<u64>) -> ContentFlowError {
    ContentFlowError::parse(
        MarkupType::Xml,
        msg,
        position.map(|p| format!("byte {p}")),
    )
}
