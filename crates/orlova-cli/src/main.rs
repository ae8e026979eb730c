//! Orlova CLI - search, rank and fetch local LLM and image-generation models.
//!
//! Logs go to stderr; results go to stdout, as plain lines or as JSON with
//! `--json`.

mod commands;

use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use orlova_core::registry::SortKey;
use orlova_core::{DestinationKind, TaskPreference};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "orlova")]
#[command(about = "Find, rank and download models for a local LLM setup")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search the quantized chat-model catalog
    Search(SearchArgs),

    /// Search, then rank the results for this machine
    Rank {
        #[command(flatten)]
        search: SearchArgs,

        /// Memory available for the model, in GB
        #[arg(long)]
        ram: Option<f64>,

        /// Intended use: code, chat or general
        #[arg(long, default_value = "code")]
        task: TaskPreference,

        /// Number of results to keep
        #[arg(long, default_value = "10")]
        top_k: usize,
    },

    /// Search image-generation assets
    Diffusion {
        query: Option<String>,

        /// checkpoint, lora, vae, controlnet or upscaler
        #[arg(long = "type")]
        model_type: Option<DestinationKind>,

        #[arg(long)]
        author: Option<String>,

        #[arg(long)]
        limit: Option<u32>,
    },

    /// Download an asset file into the ComfyUI model directory
    Download {
        /// Repository id, e.g. `stabilityai/sdxl-vae`
        repo: String,

        /// File path inside the repository
        filename: String,

        #[arg(long = "type", default_value = "checkpoint")]
        model_type: DestinationKind,
    },

    /// Pull a quantized model through the local Ollama daemon
    Pull {
        repo: String,

        /// Quantization label, e.g. `Q4_K_M`
        quant: String,

        /// Expected size in bytes, used for the free-space check
        #[arg(long)]
        size: Option<u64>,
    },

    /// Show mounted disks and the model store's free space
    Disk,

    /// Check whether a model of the given size fits in the model store
    Space {
        /// Size in bytes
        size: u64,
    },
}

#[derive(ClapArgs, Debug)]
struct SearchArgs {
    query: Option<String>,

    #[arg(long)]
    author: Option<String>,

    /// Registry tag filter, repeatable
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Lowest acceptable quantization, e.g. `Q4` or `Q5_K_M`
    #[arg(long)]
    min_quant: Option<String>,

    #[arg(long)]
    limit: Option<u32>,

    #[arg(long)]
    offset: Option<u32>,

    /// downloads, likes or lastModified
    #[arg(long)]
    sort: Option<SortKey>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let mut builder = orlova_core::OrlovaApi::builder();
    if let Some(path) = &args.config {
        builder = builder.config_path(path);
    }
    let api = builder.build()?;
    debug!("Config loaded");

    let out = commands::Output { json: args.json };
    let done = match args.command {
        Command::Search(search) => commands::search(&api, &out, search.into_query()).await,
        Command::Rank {
            search,
            ram,
            task,
            top_k,
        } => {
            let preferences = orlova_core::RankPreferences {
                available_ram_gb: ram,
                task,
                top_k,
            };
            commands::rank(&api, &out, search.into_query(), preferences).await
        }
        Command::Diffusion {
            query,
            model_type,
            author,
            limit,
        } => {
            let query = orlova_core::DiffusionQuery {
                query,
                model_type,
                author,
                limit,
                ..Default::default()
            };
            commands::diffusion(&api, &out, query).await
        }
        Command::Download {
            repo,
            filename,
            model_type,
        } => return commands::download(&api, &out, repo, filename, model_type).await,
        Command::Pull { repo, quant, size } => {
            return commands::pull(&api, &out, &repo, &quant, size).await
        }
        Command::Disk => commands::disk(&api, &out),
        Command::Space { size } => commands::space(&api, &out, size),
    };
    done.map(|()| ExitCode::SUCCESS)
}

impl SearchArgs {
    fn into_query(self) -> orlova_core::SearchQuery {
        orlova_core::SearchQuery {
            query: self.query,
            author: self.author,
            tags: self.tags,
            min_quant: self.min_quant,
            limit: self.limit,
            offset: self.offset,
            sort: self.sort,
        }
    }
}
