use futures::stream::{self, StreamExt, TryStreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;
use tracing::{debug, info};

use crate::config::ExtractionSettings;
use crate::core::chunking::{chunk_text, find_char_span, TextChunk};
use crate::core::data::{AnnotatedDocument, CharInterval, ExtractionRecord};
use crate::core::llm_client::LanguageModel;
use crate::core::prompt::{parse_response, PromptBuilder};
use crate::error::{NotesError, Result};

/// Runs a document through a language model chunk by chunk.
pub struct NoteExtractor<M> {
    model: M,
    prompt: PromptBuilder,
    settings: ExtractionSettings,
}

impl<M: LanguageModel> NoteExtractor<M> {
    pub fn new(model: M, prompt: PromptBuilder, settings: ExtractionSettings) -> Self {
        Self {
            model,
            prompt,
            settings,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Extract every record from `text`.
    ///
    /// The first pass is kept whole. Later passes only add the copies of a
    /// record beyond those earlier passes already produced. Any failed
    /// request fails the whole document.
    pub async fn extract(&self, document_id: &str, text: &str) -> Result<AnnotatedDocument> {
        if self.settings.passes == 0 || self.settings.max_workers == 0 {
            return Err(NotesError::Config(
                "passes and max_workers must be at least 1".to_string(),
            ));
        }

        let start_time = Instant::now();
        let chunks = chunk_text(text, self.settings.max_char_buffer)?;

        info!(
            "Extracting from {} ({} chars, {} chunks, {} passes, model {})",
            document_id,
            text.chars().count(),
            chunks.len(),
            self.settings.passes,
            self.model.model_id()
        );

        let progress = self.progress_bar((chunks.len() * self.settings.passes) as u64);

        let mut kept: Vec<(usize, ExtractionRecord)> = Vec::new();
        for pass in 1..=self.settings.passes {
            let found = self.run_pass(&chunks, &progress).await?;
            let before = kept.len();

            if pass == 1 {
                kept.extend(found);
            } else {
                // Each earlier record absorbs at most one identical record of this pass.
                let mut absorbed = vec![false; before];
                for (chunk_index, record) in found {
                    let twin = (0..before)
                        .find(|&i| !absorbed[i] && kept[i].1.same_content(&record));
                    match twin {
                        Some(i) => absorbed[i] = true,
                        None => kept.push((chunk_index, record)),
                    }
                }
            }

            debug!("Pass {} kept {} new records", pass, kept.len() - before);
        }
        progress.finish_and_clear();

        // Stable: within a chunk, earlier passes stay first.
        kept.sort_by_key(|(chunk_index, _)| *chunk_index);
        let extractions: Vec<ExtractionRecord> = kept.into_iter().map(|(_, r)| r).collect();

        info!(
            "Extraction completed: {} records in {:.2}s",
            extractions.len(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(AnnotatedDocument::new(document_id, text).with_extractions(extractions))
    }

    async fn run_pass(
        &self,
        chunks: &[TextChunk],
        progress: &ProgressBar,
    ) -> Result<Vec<(usize, ExtractionRecord)>> {
        let per_chunk: Vec<Vec<(usize, ExtractionRecord)>> = stream::iter(chunks)
            .map(|chunk| self.extract_chunk(chunk))
            .buffered(self.settings.max_workers)
            .inspect(|_| progress.inc(1))
            .try_collect()
            .await?;

        Ok(per_chunk.into_iter().flatten().collect())
    }

    async fn extract_chunk(&self, chunk: &TextChunk) -> Result<Vec<(usize, ExtractionRecord)>> {
        let prompt = self.prompt.build_chunk_prompt(&chunk.text);
        let response = self
            .model
            .generate(&prompt, Some(PromptBuilder::system_prompt()))
            .await?;

        debug!(
            "Chunk {} answered in {:?} ({} tokens)",
            chunk.index, response.response_time, response.usage.total_token_count
        );

        let records = parse_response(&response.content)?;

        Ok(records
            .into_iter()
            .map(|record| {
                let located = match find_char_span(&chunk.text, &record.extraction_text) {
                    Some((start, end)) => record.with_char_interval(CharInterval {
                        start_pos: chunk.char_offset + start,
                        end_pos: chunk.char_offset + end,
                    }),
                    None => record,
                };
                (chunk.index, located)
            })
            .collect())
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.settings.show_progress {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} chunks")
        {
            bar.set_style(style);
        }
        bar
    }
}
