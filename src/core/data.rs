use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// A single attribute value attached to an extraction.
///
/// Attribute sets vary by example, so values are kept loosely typed.
/// Numbers keep whatever JSON gave them: signed, unsigned or float.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(Number),
    Text(String),
    NumberList(Vec<Number>),
    TextList(Vec<String>),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Number(value.into())
    }
}

impl From<Vec<i64>> for AttributeValue {
    fn from(value: Vec<i64>) -> Self {
        AttributeValue::NumberList(value.into_iter().map(Number::from).collect())
    }
}

/// Attribute name to value, in the order the service produced them.
pub type Attributes = IndexMap<String, AttributeValue>;

/// Character offsets (not bytes) of an extraction inside its source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharInterval {
    pub start_pos: usize,
    pub end_pos: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub extraction_class: String,
    pub extraction_text: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_interval: Option<CharInterval>,
}

impl ExtractionRecord {
    pub fn new(extraction_class: impl Into<String>, extraction_text: impl Into<String>) -> Self {
        Self {
            extraction_class: extraction_class.into(),
            extraction_text: extraction_text.into(),
            attributes: Attributes::new(),
            char_interval: None,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_char_interval(mut self, interval: CharInterval) -> Self {
        self.char_interval = Some(interval);
        self
    }

    /// Same class, text and attributes. Location is ignored.
    pub fn same_content(&self, other: &ExtractionRecord) -> bool {
        self.extraction_class == other.extraction_class
            && self.extraction_text == other.extraction_text
            && self.attributes == other.attributes
    }
}

/// A sample input paired with the extractions the model should produce for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionExample {
    pub text: String,
    pub extractions: Vec<ExtractionRecord>,
}

/// A source document together with every extraction found in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedDocument {
    pub document_id: String,
    pub text: String,
    pub extractions: Vec<ExtractionRecord>,
}

impl AnnotatedDocument {
    pub fn new(document_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            text: text.into(),
            extractions: Vec::new(),
        }
    }

    pub fn with_extractions(mut self, extractions: Vec<ExtractionRecord>) -> Self {
        self.extractions = extractions;
        self
    }
}
