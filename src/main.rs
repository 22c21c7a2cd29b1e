use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tracing::{error, warn};

use notes_extractor::{
    config::{Configuration, CrawlerSettings, ModelSettings, NetworkSettings},
    core::{GeminiClient, NotesPipeline},
    crawler::{CommandCrawler, Crawler},
    utils::{load_annotated_documents, render_visualization},
};

#[derive(Parser)]
#[command(
    name = "notes_extractor",
    about = "Convert reading notes into category-grouped JSON using an LLM",
    long_about = None,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract notes into a category -> entries JSON file
    Convert {
        /// Configuration file path (defaults to the built-in notes setup)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Notes file to read
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// JSON file to write
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// API key for the extraction service
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Model to use (overrides config)
        #[arg(long)]
        model: Option<String>,

        /// Number of extraction passes
        #[arg(long)]
        passes: Option<usize>,

        /// Maximum concurrent requests
        #[arg(long)]
        max_workers: Option<usize>,

        /// Maximum characters per request
        #[arg(long)]
        max_char_buffer: Option<usize>,

        /// HTTP proxy for the extraction service
        #[arg(long)]
        proxy: Option<String>,

        /// Also write the annotated document (JSONL) and visualization here
        #[arg(long)]
        annotated_dir: Option<PathBuf>,

        /// Show a progress bar
        #[arg(long)]
        progress: bool,
    },

    /// Run the external crawler against an address
    Crawl {
        /// Address handed to the crawler
        address: String,

        /// Configuration file with a crawler section
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Crawler program (overrides config)
        #[arg(long)]
        program: Option<String>,

        /// Extra arguments placed before the address
        #[arg(long = "arg")]
        args: Vec<String>,
    },

    /// Render an HTML visualization from an annotated JSONL file
    Visualize {
        /// Annotated documents (JSONL)
        #[arg(short, long)]
        input: PathBuf,

        /// HTML file to write
        #[arg(short, long, default_value = "visualization.html")]
        output: PathBuf,
    },

    /// Check that the extraction service is reachable
    CheckServer {
        /// Service base URL
        #[arg(long)]
        base_url: Option<String>,

        /// API key for the extraction service
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// HTTP proxy
        #[arg(long)]
        proxy: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Generate example configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long)]
        output: PathBuf,

        /// Configuration format (yaml or json)
        #[arg(short, long, default_value = "yaml")]
        format: ConfigFormat,
    },
}

#[derive(clap::ValueEnum, Clone)]
enum ConfigFormat {
    Yaml,
    Json,
}

struct ConvertOverrides {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    api_key: Option<String>,
    model: Option<String>,
    passes: Option<usize>,
    max_workers: Option<usize>,
    max_char_buffer: Option<usize>,
    proxy: Option<String>,
    annotated_dir: Option<PathBuf>,
    progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Convert {
            config,
            input,
            output,
            api_key,
            model,
            passes,
            max_workers,
            max_char_buffer,
            proxy,
            annotated_dir,
            progress,
        } => {
            let overrides = ConvertOverrides {
                input,
                output,
                api_key,
                model,
                passes,
                max_workers,
                max_char_buffer,
                proxy,
                annotated_dir,
                progress,
            };
            convert_command(config, overrides).await
        }
        Commands::Crawl { address, config, program, args } => {
            crawl_command(address, config, program, args).await
        }
        Commands::Visualize { input, output } => visualize_command(input, output).await,
        Commands::CheckServer { base_url, api_key, proxy } => {
            check_server_command(base_url, api_key, proxy).await
        }
        Commands::Validate { config } => validate_command(config).await,
        Commands::GenerateConfig { output, format } => {
            generate_config_command(output, format).await
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Configuration> {
    match path {
        Some(path) => Configuration::from_file(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display())),
        None => Ok(Configuration::example()),
    }
}

async fn convert_command(config_path: Option<PathBuf>, overrides: ConvertOverrides) -> Result<()> {
    println!("{}", "Starting notes extraction...".bright_blue().bold());

    let mut config = load_config(config_path.as_ref())?;

    // Override settings if provided
    if let Some(input) = overrides.input {
        config.input_path = input;
    }
    if let Some(output) = overrides.output {
        config.output_path = output;
    }
    if let Some(key) = overrides.api_key {
        config.model.api_key = Some(key);
    }
    if let Some(model) = overrides.model {
        config.model.model_id = model;
    }
    if let Some(passes) = overrides.passes {
        config.extraction.passes = passes;
    }
    if let Some(workers) = overrides.max_workers {
        config.extraction.max_workers = workers;
    }
    if let Some(buffer) = overrides.max_char_buffer {
        config.extraction.max_char_buffer = buffer;
    }
    if let Some(proxy) = overrides.proxy {
        config.network.proxy = Some(proxy);
    }
    if let Some(dir) = overrides.annotated_dir {
        config.output.annotated_dir = Some(dir);
        config.output.visualize = true;
    }
    config.extraction.show_progress |= overrides.progress;

    println!(" Configuration: {}", config.name.bright_green());
    println!(" Input: {}", config.input_path.display());
    println!(" Model: {}", config.model.model_id);
    println!(
        " Passes: {}, workers: {}, buffer: {} chars",
        config.extraction.passes, config.extraction.max_workers, config.extraction.max_char_buffer
    );

    let pipeline = NotesPipeline::from_config(config).context("Failed to set up extraction")?;
    let report = match pipeline.run().await {
        Ok(report) => report,
        Err(e) => {
            error!(" Extraction failed: {}", e);
            return Err(e.into());
        }
    };

    println!("\n{}", " Extraction Summary".bright_green().bold());
    println!(" Records extracted: {}", report.record_count.to_string().bright_cyan());
    println!(" Categories: {}", report.category_count.to_string().bright_cyan());
    println!(" Processing time: {:.2}s", report.processing_time_seconds);
    println!(" Output written to: {}", report.output_path.display().to_string().bright_green());
    if let Some(path) = &report.annotated_path {
        println!(" Annotated document: {}", path.display().to_string().bright_green());
    }
    if let Some(path) = &report.visualization_path {
        println!(" Visualization: {}", path.display().to_string().bright_green());
    }

    Ok(())
}

async fn crawl_command(
    address: String,
    config_path: Option<PathBuf>,
    program: Option<String>,
    args: Vec<String>,
) -> Result<()> {
    println!("{}", " Running crawler...".bright_blue().bold());

    let configured = match &config_path {
        Some(path) => Configuration::from_file(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display()))?
            .crawler,
        None => None,
    };

    let settings = match (program, configured) {
        (Some(program), _) => CrawlerSettings { program, args },
        (None, Some(mut settings)) => {
            settings.args.extend(args);
            settings
        }
        (None, None) => anyhow::bail!("No crawler configured: pass --program or a config with a crawler section"),
    };

    let crawler = CommandCrawler::from_settings(&settings);
    crawler.crawl(&address).await?;

    println!(" Crawler finished for {}", address.bright_green());
    Ok(())
}

async fn visualize_command(input: PathBuf, output: PathBuf) -> Result<()> {
    println!("{}", " Rendering visualization...".bright_blue().bold());

    let documents = load_annotated_documents(&input)?;
    let document = documents
        .first()
        .with_context(|| format!("No annotated documents in {}", input.display()))?;
    if documents.len() > 1 {
        warn!(" {} documents found, rendering the first", documents.len());
    }

    tokio::fs::write(&output, render_visualization(document))
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(" Visualization written to: {}", output.display().to_string().bright_green());
    Ok(())
}

async fn check_server_command(
    base_url: Option<String>,
    api_key: Option<String>,
    proxy: Option<String>,
) -> Result<()> {
    println!("{}", " Checking extraction service...".bright_blue().bold());

    let mut settings = ModelSettings::default();
    if let Some(url) = base_url {
        settings.base_url = url;
    }
    settings.timeout = 30;
    let network = NetworkSettings {
        proxy,
        ..NetworkSettings::default()
    };

    let client = GeminiClient::new(&settings, api_key, &network)?;

    if !client.check_health().await? {
        println!(" Service is not responding at {}", settings.base_url.bright_red());
        return Ok(());
    }

    println!(" Service is reachable at {}", settings.base_url.bright_green());
    match client.list_models().await {
        Ok(models) => {
            println!(" Available models:");
            for model in models {
                println!("  • {}", model.bright_cyan());
            }
        }
        Err(e) => warn!(" Failed to list models: {}", e),
    }

    Ok(())
}

async fn validate_command(config_path: PathBuf) -> Result<()> {
    println!("{}", " Validating configuration...".bright_blue().bold());

    let config = match Configuration::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!(" Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match config.validate() {
        Ok(()) => {
            println!(" Configuration is valid!");
            println!(" Name: {}", config.name.bright_green());
            println!(" Input: {}", config.input_path.display());
            println!(" Output: {}", config.output_path.display());
            println!(" Examples: {}", config.examples.len());
            println!(" Model: {}", config.model.model_id);
            Ok(())
        }
        Err(e) => {
            error!(" Configuration validation failed: {}", e);
            Err(e.into())
        }
    }
}

async fn generate_config_command(output_path: PathBuf, format: ConfigFormat) -> Result<()> {
    println!("{}", " Generating example configuration...".bright_blue().bold());

    let config = Configuration::example();

    let content = match format {
        ConfigFormat::Yaml => serde_yaml::to_string(&config)?,
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
    };

    tokio::fs::write(&output_path, content).await?;

    println!(" Example configuration generated at: {}", output_path.display().to_string().bright_green());
    println!(" Edit the file to customize for your use case");

    Ok(())
}
