pub mod aggregator;
pub mod chunking;
pub mod data;
pub mod extractor;
pub mod llm_client;
pub mod pipeline;
pub mod prompt;

pub use aggregator::{aggregate, AggregatedResult};
pub use data::{AnnotatedDocument, AttributeValue, Attributes, ExtractionExample, ExtractionRecord};
pub use extractor::NoteExtractor;
pub use llm_client::{GeminiClient, LanguageModel};
pub use pipeline::{NotesPipeline, PipelineReport};
pub use prompt::PromptBuilder;
