//! JSON-dialect parser.
//!
//! The JSON dialect is the object form of ECML: a single root member whose
//! value is an object. Inside a node object, scalar members are attributes,
//! object members are child nodes, array members are repeated child nodes,
//! and `__text` / `__cdata` carry character data.

use serde_json::{Map, Value};
use tracing::{debug, instrument};

use contentflow_shared::{ContentFlowError, MarkupType, Result};

use crate::{ContentParser, Plugin};

/// Members holding character data rather than attributes.
const TEXT_KEYS: [&str; 2] = ["__text", "__cdata"];

/// Parser for `index.json` documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonContentParser;

impl ContentParser for JsonContentParser {
    fn markup_type(&self) -> MarkupType {
        MarkupType::Json
    }

    #[instrument(skip_all, fields(len = text.len()))]
    fn parse_content(&self, text: &str) -> Result<Plugin> {
        let document: Value = serde_json::from_str(text).map_err(|e| {
            ContentFlowError::parse(
                MarkupType::Json,
                e.to_string(),
                Some(format!("line {}, column {}", e.line(), e.column())),
            )
        })?;

        let Value::Object(members) = document else {
            return Err(structure_error("document must be a JSON object"));
        };

        let mut iter = members.into_iter();
        let (root_kind, root_value) = match (iter.next(), iter.next()) {
            (Some(root), None) => root,
            (None, _) => return Err(structure_error("document has no root element")),
            (Some(_), Some(_)) => {
                return Err(structure_error("document has more than one root element"));
            }
        };

        let Value::Object(body) = root_value else {
            return Err(structure_error(format!(
                "root element `{root_kind}` must be an object"
            )));
        };

        let root = build_node(root_kind, body)?;
        debug!(root = %root.kind, nodes = root.count(), "parsed JSON markup");
        Ok(root)
    }
}

fn build_node(kind: String, members: Map<String, Value>) -> Result<Plugin> {
    let mut node = Plugin::new(kind);

    for (name, value) in members {
        if TEXT_KEYS.contains(&name.as_str()) {
            node.data = scalar_to_string(&value);
            continue;
        }

        match value {
            Value::Null => {}
            Value::Object(child) => node.children.push(build_node(name, child)?),
            Value::Array(items) => {
                for item in items {
                    node.children.push(build_array_item(&name, item)?);
                }
            }
            scalar => {
                if let Some(text) = scalar_to_string(&scalar) {
                    node.attributes.insert(name, text);
                }
            }
        }
    }

    Ok(node)
}

fn build_array_item(kind: &str, item: Value) -> Result<Plugin> {
    match item {
        Value::Object(members) => build_node(kind.to_string(), members),
        Value::Array(_) => Err(structure_error(format!(
            "nested arrays are not allowed under `{kind}`"
        ))),
        scalar => {
            let mut node = Plugin::new(kind);
            node.data = scalar_to_string(&scalar);
            Ok(node)
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn structure_error(msg: impl Into<String>) -> ContentFlowError {
    ContentFlowError::parse(MarkupType::Json, msg, None)
}
