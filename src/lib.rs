pub mod config;
pub mod core;
pub mod crawler;
pub mod error;
pub mod handlers;
pub mod utils;

pub use crate::config::Configuration;
pub use crate::core::{aggregate, AggregatedResult, ExtractionRecord, NoteExtractor, NotesPipeline};
pub use crate::crawler::{CommandCrawler, Crawler};
pub use crate::error::{NotesError, Result};
pub use crate::handlers::DocumentProcessor;
