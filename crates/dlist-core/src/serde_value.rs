use serde::{Deserialize, Serialize};

use crate::document::{Attrs, Document, NodeId, NodeKind, Tag, TreeError};

const DEFAULT_SCHEMA: &str = "manos-dlist";
const DEFAULT_VERSION: u32 = 1;

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_version() -> u32 {
    DEFAULT_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeValue {
    Element {
        tag: Tag,
        #[serde(default, skip_serializing_if = "Attrs::is_empty")]
        attrs: Attrs,
        #[serde(default)]
        children: Vec<NodeValue>,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentValue {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub children: Vec<NodeValue>,
}

impl DocumentValue {
    pub fn from_document(document: &Document) -> Self {
        Self {
            schema: default_schema(),
            version: default_version(),
            children: document
                .children(document.root())
                .iter()
                .filter_map(|&child| node_value(document, child))
                .collect(),
        }
    }

    pub fn into_document(self) -> Result<Document, TreeError> {
        let mut document = Document::new();
        let root = document.root();
        for child in self.children {
            build_node(&mut document, root, child)?;
        }
        Ok(document)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

fn node_value(document: &Document, node: NodeId) -> Option<NodeValue> {
    match document.kind(node)? {
        NodeKind::Text(text) => Some(NodeValue::Text { text: text.clone() }),
        NodeKind::Element { tag, attrs } => Some(NodeValue::Element {
            tag: tag.clone(),
            attrs: attrs.clone(),
            children: document
                .children(node)
                .iter()
                .filter_map(|&child| node_value(document, child))
                .collect(),
        }),
        NodeKind::Root => None,
    }
}

fn build_node(document: &mut Document, parent: NodeId, value: NodeValue) -> Result<(), TreeError> {
    match value {
        NodeValue::Text { text } => {
            let node = document.create_text(text);
            document.append_child(parent, node)
        }
        NodeValue::Element {
            tag,
            attrs,
            children,
        } => {
            let node = document.create_element(tag, attrs);
            document.append_child(parent, node)?;
            for child in children {
                build_node(document, node, child)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup;

    #[test]
    fn round_trip_preserves_structure() {
        let source = r#"<dl class="terms"><dt>a</dt><dd>b<img src="x.png"></dd></dl><p>c</p>"#;
        let (document, _) = markup::parse(source).expect("parse");
        let value = DocumentValue::from_document(&document);
        let json = serde_json::to_string(&value).expect("serialize");
        let parsed: DocumentValue = serde_json::from_str(&json).expect("deserialize");
        let roundtrip = parsed.into_document().expect("build");

        assert_eq!(markup::to_markup(&roundtrip, None), source);
    }

    #[test]
    fn missing_header_fields_fall_back_to_defaults() {
        let value = DocumentValue::from_json_str(
            r#"{"children":[{"node":"element","tag":"dt","children":[{"node":"text","text":"x"}]}]}"#,
        )
        .expect("deserialize");
        assert_eq!(value.schema, "manos-dlist");
        assert_eq!(value.version, 1);
        let document = value.into_document().expect("build");
        assert_eq!(document.text_content(document.root()), "x");
    }
}
