use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{NotesError, Result};

#[async_trait]
pub trait DocumentHandler: Send + Sync {
    async fn extract_text(&self, source: &Path) -> Result<String>;
}

pub struct PdfHandler;

#[async_trait]
impl DocumentHandler for PdfHandler {
    async fn extract_text(&self, source: &Path) -> Result<String> {
        let bytes = tokio::fs::read(source)
            .await
            .map_err(|e| NotesError::file_access(source, e))?;

        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| {
            NotesError::file_access(
                source,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
            )
        })
    }
}

pub struct TextHandler;

impl TextHandler {
    /// Decode raw bytes, honouring a byte order mark and defaulting to UTF-8.
    pub fn decode(bytes: &[u8], source: &Path) -> String {
        let (encoding, bom_len) = encoding_rs::Encoding::for_bom(bytes)
            .unwrap_or((encoding_rs::UTF_8, 0));

        let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        if had_errors {
            tracing::warn!("Encoding errors detected in file: {}", source.display());
        }

        text.into_owned()
    }
}

#[async_trait]
impl DocumentHandler for TextHandler {
    async fn extract_text(&self, source: &Path) -> Result<String> {
        let bytes = tokio::fs::read(source)
            .await
            .map_err(|e| NotesError::file_access(source, e))?;

        Ok(Self::decode(&bytes, source))
    }
}

/// Picks a handler by file extension; anything unknown is read as text.
pub struct DocumentProcessor {
    handlers: HashMap<String, Box<dyn DocumentHandler>>,
    fallback: Box<dyn DocumentHandler>,
}

impl Default for DocumentProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor {
    pub fn new() -> Self {
        let mut handlers: HashMap<String, Box<dyn DocumentHandler>> = HashMap::new();
        handlers.insert("pdf".to_string(), Box::new(PdfHandler));

        Self {
            handlers,
            fallback: Box::new(TextHandler),
        }
    }

    pub async fn process(&self, source: &Path) -> Result<String> {
        let handler = source
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| self.handlers.get(&ext.to_ascii_lowercase()))
            .unwrap_or(&self.fallback);

        handler.extract_text(source).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_utf8_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "心理：\n回归P62。P74\n").unwrap();

        let text = DocumentProcessor::new().process(&path).await.unwrap();
        assert_eq!(text, "心理：\n回归P62。P74\n");
    }

    #[tokio::test]
    async fn test_strips_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("科学".as_bytes());
        std::fs::write(&path, bytes).unwrap();

        let text = DocumentProcessor::new().process(&path).await.unwrap();
        assert_eq!(text, "科学");
    }

    #[test]
    fn test_decodes_utf16_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "心理".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(TextHandler::decode(&bytes, Path::new("x.txt")), "心理");
    }

    #[tokio::test]
    async fn test_missing_file_is_file_access_error() {
        let err = DocumentProcessor::new()
            .process(Path::new("/nonexistent/notes.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotesError::FileAccess { .. }));
    }
}
