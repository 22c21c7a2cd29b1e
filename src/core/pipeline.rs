use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Configuration;
use crate::core::aggregator::{aggregate, AggregatedResult};
use crate::core::extractor::NoteExtractor;
use crate::core::llm_client::{GeminiClient, LanguageModel};
use crate::core::prompt::PromptBuilder;
use crate::error::{NotesError, Result};
use crate::handlers::DocumentProcessor;
use crate::utils::{render_visualization, save_annotated_documents, write_json};

pub const ANNOTATED_FILE_NAME: &str = "extraction_results.jsonl";
pub const VISUALIZATION_FILE_NAME: &str = "visualization.html";

/// Summary of one notes conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub id: String,
    pub document_source: String,
    pub output_path: PathBuf,
    pub record_count: usize,
    pub category_count: usize,
    pub extraction_timestamp: DateTime<Utc>,
    pub processing_time_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization_path: Option<PathBuf>,
}

/// Read a notes file, extract, group by category and write JSON.
pub struct NotesPipeline<M> {
    config: Configuration,
    extractor: NoteExtractor<M>,
    processor: DocumentProcessor,
}

impl NotesPipeline<GeminiClient> {
    /// Pipeline backed by the Gemini API as configured.
    pub fn from_config(config: Configuration) -> Result<Self> {
        config.validate()?;

        let api_key = config.resolve_api_key();
        if api_key.is_none() {
            return Err(NotesError::Config(
                "No API key: set model.api_key, --api-key or GEMINI_API_KEY".to_string(),
            ));
        }

        let client = GeminiClient::new(&config.model, api_key, &config.network)?;
        Ok(Self::with_model(config, client))
    }
}

impl<M: LanguageModel> NotesPipeline<M> {
    pub fn with_model(config: Configuration, model: M) -> Self {
        let prompt = PromptBuilder::new(config.prompt_description.clone(), config.examples.clone());
        let extractor = NoteExtractor::new(model, prompt, config.extraction.clone());

        Self {
            config,
            extractor,
            processor: DocumentProcessor::new(),
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub async fn run(&self) -> Result<PipelineReport> {
        let (result, report) = self.run_with_result().await?;
        for (category, entries) in result.iter() {
            debug!("{}: {} entries", category, entries.len());
        }
        info!(
            "Wrote {} categories to {}",
            result.len(),
            report.output_path.display()
        );
        Ok(report)
    }

    pub async fn run_with_result(&self) -> Result<(AggregatedResult, PipelineReport)> {
        let start_time = Instant::now();
        let input_path = &self.config.input_path;

        info!(
            "Reading notes from {} for model {}",
            input_path.display(),
            self.extractor.model().model_id()
        );
        let text = self.processor.process(input_path).await?;

        let document_id = input_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();

        let document = self.extractor.extract(&document_id, &text).await?;
        let result = aggregate(&document.extractions);

        write_json(&result, &self.config.output_path)?;

        let mut annotated_path = None;
        let mut visualization_path = None;
        if let Some(dir) = &self.config.output.annotated_dir {
            let path = save_annotated_documents(std::slice::from_ref(&document), dir, ANNOTATED_FILE_NAME)?;
            annotated_path = Some(path);

            if self.config.output.visualize {
                let path = dir.join(VISUALIZATION_FILE_NAME);
                std::fs::write(&path, render_visualization(&document))
                    .map_err(|e| NotesError::file_access(&path, e))?;
                visualization_path = Some(path);
            }
        }

        let report = PipelineReport {
            id: Uuid::new_v4().to_string(),
            document_source: input_path.display().to_string(),
            output_path: self.config.output_path.clone(),
            record_count: document.extractions.len(),
            category_count: result.len(),
            extraction_timestamp: Utc::now(),
            processing_time_seconds: start_time.elapsed().as_secs_f64(),
            annotated_path,
            visualization_path,
        };

        Ok((result, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm_client::{LlmResponse, UsageMetadata};
    use crate::utils::load_annotated_documents;
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;

    struct FixedModel(&'static str);

    #[async_trait]
    impl LanguageModel for FixedModel {
        async fn generate(&self, _prompt: &str, _system: Option<&str>) -> Result<LlmResponse> {
            Ok(LlmResponse {
                content: self.0.to_string(),
                usage: UsageMetadata::default(),
                model: "fixed".to_string(),
                finish_reason: Some("STOP".to_string()),
                response_time: Duration::ZERO,
            })
        }

        fn model_id(&self) -> &str {
            "fixed"
        }
    }

    const RESPONSE: &str = r#"{"extractions": [
        {"extraction_class": "类别", "extraction_text": "心理", "attributes": {"term": "回归", "pages": [62, 74]}},
        {"extraction_class": "类别", "extraction_text": "心理", "attributes": {"term": "投射", "pages": [59]}}
    ]}"#;

    fn config_in(dir: &Path) -> Configuration {
        let mut config = Configuration::example();
        config.input_path = dir.join("notes.txt");
        config.output_path = dir.join("extraction_results.json");
        config.output.annotated_dir = None;
        config.extraction.passes = 1;
        config
    }

    #[tokio::test]
    async fn test_notes_to_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "心理：\n回归P62。P74\n投射  p59\n").unwrap();

        let pipeline = NotesPipeline::with_model(config_in(dir.path()), FixedModel(RESPONSE));
        let report = pipeline.run().await.unwrap();

        assert_eq!(report.record_count, 2);
        assert_eq!(report.category_count, 1);
        assert!(report.annotated_path.is_none());

        let written = std::fs::read_to_string(dir.path().join("extraction_results.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!({"心理": [{"term": "回归", "pages": [62, 74]}, {"term": "投射", "pages": [59]}]})
        );
    }

    #[tokio::test]
    async fn test_writes_annotated_document_and_visualization() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "心理：\n回归P62。P74\n").unwrap();

        let mut config = config_in(dir.path());
        config.output.annotated_dir = Some(dir.path().join("public"));
        config.output.visualize = true;

        let pipeline = NotesPipeline::with_model(config, FixedModel(RESPONSE));
        let report = pipeline.run().await.unwrap();

        let annotated = load_annotated_documents(report.annotated_path.as_ref().unwrap()).unwrap();
        assert_eq!(annotated.len(), 1);
        assert_eq!(annotated[0].document_id, "notes.txt");
        assert!(report.visualization_path.unwrap().exists());
        let written: AggregatedResult =
            serde_json::from_str(&std::fs::read_to_string(&report.output_path).unwrap()).unwrap();
        assert_eq!(written.total_entries(), 2);
    }

    #[tokio::test]
    async fn test_empty_notes_write_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let pipeline = NotesPipeline::with_model(config_in(dir.path()), FixedModel(RESPONSE));
        let report = pipeline.run().await.unwrap();

        assert_eq!(report.record_count, 0);
        assert_eq!(std::fs::read_to_string(&report.output_path).unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_missing_input_fails_before_output() {
        let dir = tempfile::tempdir().unwrap();

        let pipeline = NotesPipeline::with_model(config_in(dir.path()), FixedModel(RESPONSE));
        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, NotesError::FileAccess { .. }));
        assert!(!dir.path().join("extraction_results.json").exists());
    }
}
