use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use jobsift_analysis::{FailoverProvider, LlmProvider, OpenAiProvider};
use jobsift_core::AppConfig;
use tracing_subscriber::EnvFilter;

mod extract;
mod ingest;
mod worker;


#[derive(Debug, Parser)]
#[command(name = "jobsift")]
#[command(about = "JobSift enrichment pipeline CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database utilities.
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Batch-upsert discovery candidates from a JSON file.
    Ingest {
        /// JSON array of candidate postings, as emitted by a discovery scraper.
        #[arg(long)]
        file: PathBuf,
    },
    /// One extraction pass over `new` postings, using pre-fetched detail payloads.
    Extract {
        /// JSON array of `{source, external_id, full_text}` detail records.
        #[arg(long)]
        file: PathBuf,
        /// Maximum postings to claim in this pass.
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Long-running stage workers.
    Worker {
        #[command(subcommand)]
        command: WorkerCommands,
    },
    /// Per-status posting counts.
    Status,
    /// Archive one posting by its external identity.
    Archive {
        #[arg(long)]
        source: String,
        #[arg(long)]
        external_id: String,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    Ping,
    Migrate,
}

#[derive(Debug, Subcommand)]
enum WorkerCommands {
    /// Embed extracted postings and advance them to `vectorized`.
    Vectorize {
        #[arg(long, default_value_t = 16)]
        batch: i64,
        #[arg(long, default_value_t = 60)]
        idle_secs: u64,
        /// Run a single pass and exit instead of polling.
        #[arg(long)]
        once: bool,
    },
    /// Run the two-stage analysis over vectorized and structured postings.
    Analyze {
        #[arg(long, default_value_t = 10)]
        batch: i64,
        #[arg(long, default_value_t = 30)]
        idle_secs: u64,
        /// Run a single pass and exit instead of polling.
        #[arg(long)]
        once: bool,
        /// Role context for the judgment stage, e.g. "backend developer, 5 years".
        #[arg(long)]
        role: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = jobsift_core::load_app_config_from_env()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = jobsift_db::PoolConfig::from_app_config(&config);
    let pool = jobsift_db::connect_pool(&config.database_url, pool_config).await?;

    match cli.command {
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            jobsift_db::ping(&pool).await?;
            println!("database is reachable");
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let applied = jobsift_db::run_migrations(&pool).await?;
            println!("applied {applied} migrations");
        }
        Commands::Ingest { file } => ingest::run_ingest(&pool, &file).await?,
        Commands::Extract { file, limit } => {
            let source = extract::FileDetailSource::load(&file)?;
            extract::run_extract_pass(&pool, &source, limit, config.worker_lease_secs).await?;
        }
        Commands::Worker {
            command:
                WorkerCommands::Vectorize {
                    batch,
                    idle_secs,
                    once,
                },
        } => {
            worker::vectorize::run(&pool, &config, batch, idle_secs, once).await?;
        }
        Commands::Worker {
            command:
                WorkerCommands::Analyze {
                    batch,
                    idle_secs,
                    once,
                    role,
                },
        } => {
            let provider = build_provider(&config)?;
            worker::analyze::run(&pool, &config, provider, batch, idle_secs, once, role).await?;
        }
        Commands::Status => {
            let counts = jobsift_db::status_counts(&pool).await?;
            if counts.is_empty() {
                println!("no postings yet");
            } else {
                let mut total = 0i64;
                for row in &counts {
                    println!("{:>12}  {}", row.status, row.count);
                    total += row.count;
                }
                println!("{:>12}  {total}", "total");
            }
        }
        Commands::Archive {
            source,
            external_id,
        } => {
            let posting = jobsift_db::get_posting_by_identity(&pool, &source, &external_id).await?;
            jobsift_db::mark_archived(&pool, posting.id).await?;
            println!("archived posting {} ({source}/{external_id})", posting.id);
        }
    }

    Ok(())
}

/// Builds the provider chain for the analyze worker.
///
/// With only the primary configured this is a bare [`OpenAiProvider`]; when
/// fallback credentials are present the primary is wrapped in a
/// [`FailoverProvider`] with the fallback next in line. Fallback model names
/// default to the primary's.
fn build_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let api_key = config
        .llm_api_key
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("LLM_API_KEY is not set; cannot run the analyze worker"))?;

    let primary: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::with_base_url(
        "openai",
        api_key,
        &config.llm_extract_model,
        &config.llm_judge_model,
        config.llm_request_timeout_secs,
        &config.llm_base_url,
    )?);

    let Some(fallback_key) = config.llm_fallback_api_key.as_deref() else {
        return Ok(primary);
    };

    let fallback: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::with_base_url(
        "fallback",
        fallback_key,
        config
            .llm_fallback_extract_model
            .as_deref()
            .unwrap_or(&config.llm_extract_model),
        config
            .llm_fallback_judge_model
            .as_deref()
            .unwrap_or(&config.llm_judge_model),
        config.llm_request_timeout_secs,
        config
            .llm_fallback_base_url
            .as_deref()
            .unwrap_or(&config.llm_base_url),
    )?);

    Ok(Arc::new(FailoverProvider::new(
        primary,
        vec![fallback],
        config.llm_provider_cooldown_secs,
    )))
}
