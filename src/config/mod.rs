use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::data::ExtractionExample;
use crate::core::prompt::{PromptBuilder, NOTES_PROMPT_DESCRIPTION};
use crate::error::{NotesError, Result};

/// Environment variables checked for the model credential, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "LANGEXTRACT_API_KEY"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub name: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    #[serde(default = "default_prompt_description")]
    pub prompt_description: String,
    #[serde(default = "PromptBuilder::notes_examples")]
    pub examples: Vec<ExtractionExample>,
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub extraction: ExtractionSettings,
    #[serde(default)]
    pub network: NetworkSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crawler: Option<CrawlerSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            base_url: default_base_url(),
            api_key: None,
            temperature: default_temperature(),
            timeout: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSettings {
    /// Full sweeps over the document; later passes add records the earlier ones missed
    #[serde(default = "default_passes")]
    pub passes: usize,
    /// Requests in flight at once
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Largest chunk sent in one request, in characters
    #[serde(default = "default_max_char_buffer")]
    pub max_char_buffer: usize,
    #[serde(default)]
    pub show_progress: bool,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            passes: default_passes(),
            max_workers: default_max_workers(),
            max_char_buffer: default_max_char_buffer(),
            show_progress: false,
        }
    }
}

/// HTTP settings applied to the client that talks to the extraction service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Proxy for all outgoing requests, e.g. `http://127.0.0.1:7890`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Also write the annotated document as JSONL into this directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated_dir: Option<PathBuf>,
    /// Render `visualization.html` next to the annotated document
    #[serde(default)]
    pub visualize: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerSettings {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_prompt_description() -> String { NOTES_PROMPT_DESCRIPTION.to_string() }
fn default_model_id() -> String { "gemini-2.5-flash".to_string() }
fn default_base_url() -> String { "https://generativelanguage.googleapis.com".to_string() }
fn default_temperature() -> f32 { 0.3 }
fn default_timeout() -> u64 { 120 }
fn default_passes() -> usize { 3 }
fn default_max_workers() -> usize { 20 }
fn default_max_char_buffer() -> usize { 1000 }

impl Configuration {
    /// Load configuration from a YAML or JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| NotesError::file_access(path, e))?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)
                .map_err(|e| NotesError::Config(format!("{}: {}", path.display(), e)))?
        };

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.model_id.trim().is_empty() {
            return Err(NotesError::Config("No model id defined".to_string()));
        }
        if self.extraction.passes == 0 {
            return Err(NotesError::Config("passes must be at least 1".to_string()));
        }
        if self.extraction.max_workers == 0 {
            return Err(NotesError::Config("max_workers must be at least 1".to_string()));
        }
        if self.extraction.max_char_buffer == 0 {
            return Err(NotesError::Config("max_char_buffer must be at least 1".to_string()));
        }
        if self.examples.is_empty() {
            return Err(NotesError::Config("At least one example is required".to_string()));
        }
        for (i, example) in self.examples.iter().enumerate() {
            if example.extractions.is_empty() {
                return Err(NotesError::Config(format!("Example {} has no extractions", i)));
            }
        }
        if let Some(crawler) = &self.crawler {
            if crawler.program.trim().is_empty() {
                return Err(NotesError::Config("crawler.program is empty".to_string()));
            }
        }

        Ok(())
    }

    /// The configured API key, falling back to the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.model.api_key.clone().or_else(|| {
            API_KEY_ENV_VARS
                .iter()
                .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        })
    }

    /// Create an example configuration
    pub fn example() -> Self {
        Configuration {
            name: "Reading notes".to_string(),
            input_path: PathBuf::from("public/notes.txt"),
            output_path: PathBuf::from("public/extraction_results.json"),
            prompt_description: default_prompt_description(),
            examples: PromptBuilder::notes_examples(),
            model: ModelSettings::default(),
            extraction: ExtractionSettings::default(),
            network: NetworkSettings::default(),
            output: OutputSettings {
                annotated_dir: Some(PathBuf::from("public")),
                visualize: true,
            },
            crawler: None,
        }
    }
}
