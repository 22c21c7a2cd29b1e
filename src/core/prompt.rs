use serde_json::{json, Value};

use crate::core::data::{AttributeValue, Attributes, ExtractionExample, ExtractionRecord};
use crate::error::{NotesError, Result};

/// Instruction used for reading notes: keep source order, use exact text,
/// no paraphrasing or overlapping entities, no invented attributes.
pub const NOTES_PROMPT_DESCRIPTION: &str = "按出现顺序提取JSON数据。
提取时使用确切文本。不要意译或重叠实体。
不要添加没有的属性。";

const NOTES_EXAMPLE_TEXT: &str = "心理：
回归P62。P74
投射，童年  p59
";

pub struct PromptBuilder {
    description: String,
    examples: Vec<ExtractionExample>,
}

impl PromptBuilder {
    pub fn new(description: impl Into<String>, examples: Vec<ExtractionExample>) -> Self {
        Self {
            description: description.into(),
            examples,
        }
    }

    /// Builder preloaded with the reading-notes instruction and example.
    pub fn notes() -> Self {
        Self::new(NOTES_PROMPT_DESCRIPTION, Self::notes_examples())
    }

    pub fn notes_examples() -> Vec<ExtractionExample> {
        let entry = |term: &str, pages: Vec<i64>| {
            ExtractionRecord::new("类别", "心理")
                .with_attribute("term", term)
                .with_attribute("pages", pages)
        };

        vec![ExtractionExample {
            text: NOTES_EXAMPLE_TEXT.to_string(),
            extractions: vec![
                entry("回归", vec![62, 74]),
                entry("投射", vec![59]),
                entry("童年", vec![59]),
            ],
        }]
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn examples(&self) -> &[ExtractionExample] {
        &self.examples
    }

    pub fn build_chunk_prompt(&self, chunk: &str) -> String {
        let mut prompt = String::new();

        prompt.push_str(self.description.trim());
        prompt.push_str("\n\n");

        if !self.examples.is_empty() {
            prompt.push_str("Examples\n");
            for example in &self.examples {
                prompt.push_str("Q: ");
                prompt.push_str(example.text.trim_end());
                prompt.push_str("\nA: ");
                prompt.push_str(&render_extractions(&example.extractions));
                prompt.push_str("\n\n");
            }
        }

        prompt.push_str("Q: ");
        prompt.push_str(chunk);
        prompt.push_str("\nA: ");

        prompt
    }

    pub fn system_prompt() -> &'static str {
        r#"You extract structured data from text.
Respond with a JSON object of the form {"extractions": [...]} where each element has
"extraction_class", "extraction_text" and "attributes" fields, following the examples exactly.
Return only JSON, with no markdown formatting or explanation."#
    }
}

fn render_extractions(extractions: &[ExtractionRecord]) -> String {
    let items: Vec<Value> = extractions
        .iter()
        .map(|e| {
            json!({
                "extraction_class": e.extraction_class,
                "extraction_text": e.extraction_text,
                "attributes": e.attributes,
            })
        })
        .collect();

    json!({ "extractions": items }).to_string()
}

/// Strip a surrounding markdown code fence, if any.
fn strip_code_fence(content: &str) -> &str {
    let content = content.trim();
    if !(content.starts_with("```") && content.ends_with("```")) || content.len() < 6 {
        return content;
    }

    let inner = &content[3..content.len() - 3];
    // Drop the language tag on the opening line.
    match inner.find('\n') {
        Some(pos) if inner[..pos].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            inner[pos + 1..].trim()
        }
        _ => inner.trim(),
    }
}

/// Parse a model response into extraction records.
///
/// Accepts `{"extractions": [...]}` or a bare array, optionally wrapped in a
/// code fence.
pub fn parse_response(raw: &str) -> Result<Vec<ExtractionRecord>> {
    let content = strip_code_fence(raw);
    let value: Value = serde_json::from_str(content)
        .map_err(|e| NotesError::DataShape(format!("response is not valid JSON: {}", e)))?;

    let items = match &value {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("extractions") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(NotesError::DataShape(
                    "'extractions' field is not an array".to_string(),
                ))
            }
            None => return Err(NotesError::missing_field("extractions", 0)),
        },
        _ => {
            return Err(NotesError::DataShape(
                "response is neither an object nor an array".to_string(),
            ))
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_record(item, index))
        .collect()
}

fn parse_record(item: &Value, index: usize) -> Result<ExtractionRecord> {
    let obj = item
        .as_object()
        .ok_or_else(|| NotesError::DataShape(format!("extraction {} is not an object", index)))?;

    let string_field = |field: &str| -> Result<String> {
        match obj.get(field) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(NotesError::DataShape(format!(
                "extraction {} field '{}' must be a string, got {}",
                index, field, other
            ))),
            None => Err(NotesError::missing_field(field, index)),
        }
    };

    let extraction_class = string_field("extraction_class")?;
    let extraction_text = string_field("extraction_text")?;

    let mut attributes = Attributes::new();
    match obj.get("attributes") {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (name, raw_value) in map {
                let value: AttributeValue =
                    serde_json::from_value(raw_value.clone()).map_err(|_| {
                        NotesError::DataShape(format!(
                            "extraction {} attribute '{}' has unsupported value {}",
                            index, name, raw_value
                        ))
                    })?;
                attributes.insert(name.clone(), value);
            }
        }
        Some(other) => {
            return Err(NotesError::DataShape(format!(
                "extraction {} attributes must be an object, got {}",
                index, other
            )))
        }
    }

    Ok(ExtractionRecord {
        extraction_class,
        extraction_text,
        attributes,
        char_interval: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_prompt_contains_examples_and_chunk() {
        let builder = PromptBuilder::notes();
        let prompt = builder.build_chunk_prompt("科学：\n牛一，p61");

        assert!(prompt.starts_with("按出现顺序提取JSON数据。"));
        assert!(prompt.contains(r#""term":"回归""#));
        assert!(prompt.contains(r#""pages":[62,74]"#));
        assert!(prompt.ends_with("Q: 科学：\n牛一，p61\nA: "));
    }

    #[test]
    fn test_parse_wrapped_object() {
        let raw = r#"```json
{"extractions": [
  {"extraction_class": "类别", "extraction_text": "心理", "attributes": {"term": "回归", "pages": [62, 74]}}
]}
```"#;

        let records = parse_response(raw).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].extraction_text, "心理");
        assert_eq!(
            records[0].attributes["pages"],
            AttributeValue::from(vec![62_i64, 74])
        );
    }

    #[test]
    fn test_parse_fractional_page_numbers() {
        let raw = r#"[{"extraction_class": "c", "extraction_text": "t", "attributes": {"pages": [62.5, 74]}}]"#;

        let records = parse_response(raw).unwrap();
        let pages = serde_json::to_string(&records[0].attributes["pages"]).unwrap();
        assert_eq!(pages, "[62.5,74]");
    }

    #[test]
    fn test_parse_bare_array_without_attributes() {
        let raw = r#"[{"extraction_class": "类别", "extraction_text": "科学"}]"#;
        let records = parse_response(raw).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].attributes.is_empty());
    }

    #[test]
    fn test_parse_empty_extractions() {
        assert!(parse_response(r#"{"extractions": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let raw = r#"{"extractions": [{"extraction_class": "类别", "attributes": {}}]}"#;
        let err = parse_response(raw).unwrap_err();
        assert!(matches!(err, NotesError::DataShape(_)));
        assert!(err.to_string().contains("extraction_text"));
    }

    #[test]
    fn test_unsupported_attribute_is_an_error() {
        let raw = r#"[{"extraction_class": "c", "extraction_text": "t", "attributes": {"x": {"y": 1}}}]"#;
        assert!(matches!(parse_response(raw), Err(NotesError::DataShape(_))));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(parse_response("not json"), Err(NotesError::DataShape(_))));
    }
}
