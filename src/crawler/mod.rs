use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::config::CrawlerSettings;
use crate::error::{NotesError, Result};

/// An external collaborator that fetches data and writes it under `address`.
#[async_trait]
pub trait Crawler: Send + Sync {
    async fn crawl(&self, address: &str) -> Result<()>;
}

/// Runs an external program as `program [args...] <address>`.
pub struct CommandCrawler {
    program: String,
    args: Vec<String>,
}

impl CommandCrawler {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_settings(settings: &CrawlerSettings) -> Self {
        Self::new(settings.program.clone(), settings.args.clone())
    }
}

#[async_trait]
impl Crawler for CommandCrawler {
    async fn crawl(&self, address: &str) -> Result<()> {
        info!("Running crawler {} for {}", self.program, address);

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(address)
            .status()
            .await
            .map_err(|e| NotesError::Crawler(format!("failed to start '{}': {}", self.program, e)))?;

        if !status.success() {
            return Err(NotesError::Crawler(format!(
                "'{}' exited with {}",
                self.program, status
            )));
        }

        Ok(())
    }
}
