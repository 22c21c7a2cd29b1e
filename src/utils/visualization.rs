use crate::core::data::{AnnotatedDocument, AttributeValue, ExtractionRecord};

const PALETTE: [&str; 6] = ["#ffe08a", "#b5e3ff", "#c8f7c5", "#ffc8dd", "#e0c3fc", "#ffd6a5"];

/// Render a self-contained HTML page that highlights every located extraction.
///
/// Spans that overlap an earlier span are listed in the legend but not marked.
pub fn render_visualization(document: &AnnotatedDocument) -> String {
    let mut classes: Vec<&str> = Vec::new();
    for record in &document.extractions {
        if !classes.contains(&record.extraction_class.as_str()) {
            classes.push(record.extraction_class.as_str());
        }
    }
    let color_of = |class: &str| {
        let i = classes.iter().position(|c| *c == class).unwrap_or(0);
        PALETTE[i % PALETTE.len()]
    };

    let mut spans: Vec<(usize, usize, &ExtractionRecord)> = document
        .extractions
        .iter()
        .filter_map(|r| r.char_interval.map(|ci| (ci.start_pos, ci.end_pos, r)))
        .filter(|(start, end, _)| start < end)
        .collect();
    spans.sort_by_key(|(start, _, _)| *start);

    let chars: Vec<char> = document.text.chars().collect();
    let mut body = String::new();
    let mut cursor = 0;
    for (start, end, record) in spans {
        if start < cursor || end > chars.len() {
            continue;
        }
        push_escaped(&mut body, &chars[cursor..start]);
        body.push_str(&format!(
            "<mark style=\"background:{}\" title=\"{}\">",
            color_of(record.extraction_class.as_str()),
            html_escape::encode_double_quoted_attribute(&record.extraction_class)
        ));
        push_escaped(&mut body, &chars[start..end]);
        body.push_str("</mark>");
        cursor = end;
    }
    push_escaped(&mut body, &chars[cursor..]);

    let mut rows = String::new();
    for record in &document.extractions {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            html_escape::encode_text(&record.extraction_class),
            html_escape::encode_text(&record.extraction_text),
            html_escape::encode_text(&format_attributes(record)),
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; margin: 2em; }}
pre {{ white-space: pre-wrap; line-height: 1.6; }}
table {{ border-collapse: collapse; }}
td, th {{ border: 1px solid #ccc; padding: 4px 8px; }}
</style>
</head>
<body>
<h1>{title}</h1>
<pre>{body}</pre>
<table>
<tr><th>Class</th><th>Text</th><th>Attributes</th></tr>
{rows}</table>
</body>
</html>
"#,
        title = html_escape::encode_text(&document.document_id),
        body = body,
        rows = rows,
    )
}

fn push_escaped(out: &mut String, chars: &[char]) {
    let text: String = chars.iter().collect();
    out.push_str(&html_escape::encode_text(&text));
}

fn format_attributes(record: &ExtractionRecord) -> String {
    record
        .attributes
        .iter()
        .map(|(name, value)| {
            let rendered = match value {
                AttributeValue::Text(s) => s.clone(),
                other => serde_json::to_string(other).unwrap_or_default(),
            };
            format!("{}: {}", name, rendered)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::CharInterval;

    #[test]
    fn test_highlights_located_spans() {
        let doc = AnnotatedDocument::new("notes.txt", "心理：<回归>").with_extractions(vec![
            ExtractionRecord::new("类别", "心理")
                .with_attribute("term", "回归")
                .with_attribute("pages", vec![62_i64, 74])
                .with_char_interval(CharInterval { start_pos: 0, end_pos: 2 }),
            ExtractionRecord::new("类别", "心理")
                .with_char_interval(CharInterval { start_pos: 1, end_pos: 2 }),
        ]);

        let html = render_visualization(&doc);

        assert_eq!(html.matches("<mark").count(), 1);
        assert!(html.contains(">心理</mark>：&lt;回归&gt;"));
        assert!(html.contains("term: 回归, pages: [62,74]"));
    }

    #[test]
    fn test_unlocated_records_only_in_legend() {
        let doc = AnnotatedDocument::new("n", "abc")
            .with_extractions(vec![ExtractionRecord::new("c", "zzz")]);

        let html = render_visualization(&doc);
        assert!(!html.contains("<mark"));
        assert!(html.contains("<td>zzz</td>"));
    }
}
