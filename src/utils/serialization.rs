use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::core::data::AnnotatedDocument;
use crate::core::AggregatedResult;
use crate::error::{NotesError, Result};

/// Write the grouped result as pretty UTF-8 JSON, replacing any existing file.
///
/// The parent directory must already exist.
pub fn write_json(result: &AggregatedResult, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    fs::write(path, json).map_err(|e| NotesError::file_access(path, e))
}

/// Save documents as JSON Lines into `output_dir/output_name`.
pub fn save_annotated_documents(
    documents: &[AnnotatedDocument],
    output_dir: &Path,
    output_name: &str,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir).map_err(|e| NotesError::file_access(output_dir, e))?;

    let path = output_dir.join(output_name);
    let file = fs::File::create(&path).map_err(|e| NotesError::file_access(&path, e))?;
    let mut writer = std::io::BufWriter::new(file);

    for document in documents {
        let line = serde_json::to_string(document)?;
        writeln!(writer, "{}", line).map_err(|e| NotesError::file_access(&path, e))?;
    }
    writer.flush().map_err(|e| NotesError::file_access(&path, e))?;

    Ok(path)
}

pub fn load_annotated_documents(path: &Path) -> Result<Vec<AnnotatedDocument>> {
    let file = fs::File::open(path).map_err(|e| NotesError::file_access(path, e))?;

    let mut documents = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| NotesError::file_access(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        documents.push(serde_json::from_str(&line)?);
    }

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregate;
    use crate::core::data::ExtractionRecord;

    fn notes_result() -> AggregatedResult {
        let records = vec![
            ExtractionRecord::new("类别", "心理")
                .with_attribute("term", "回归")
                .with_attribute("pages", vec![62_i64, 74]),
            ExtractionRecord::new("类别", "心理")
                .with_attribute("term", "投射")
                .with_attribute("pages", vec![59_i64]),
        ];
        aggregate(&records)
    }

    #[test]
    fn test_write_json_keeps_unicode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extraction_results.json");

        write_json(&notes_result(), &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"心理\""));
        let parsed: AggregatedResult = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, notes_result());
    }

    #[test]
    fn test_write_json_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        fs::write(&path, "stale content that is longer than the new one").unwrap();

        write_json(&AggregatedResult::new(), &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_write_json_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.json");

        let err = write_json(&notes_result(), &path).unwrap_err();
        assert!(matches!(err, NotesError::FileAccess { .. }));
    }

    #[test]
    fn test_annotated_documents_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let docs = vec![
            AnnotatedDocument::new("a", "心理").with_extractions(vec![ExtractionRecord::new("类别", "心理")]),
            AnnotatedDocument::new("b", "科学"),
        ];

        let path = save_annotated_documents(&docs, &dir.path().join("public"), "extraction_results.jsonl").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert_eq!(load_annotated_documents(&path).unwrap(), docs);
    }
}
