//! daybook - CLI entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use daybook::config::Settings;
use daybook::git::{configured_author, GitSource};
use daybook::llm::{check_claude_installed, ClaudeCliGenerator, OpenAiGenerator, Provider, TextGenerator};
use daybook::store::{DailySummaryRecord, SqliteStore};
use daybook::{
    parse_since, DayBoundary, GenerateRequest, PipelineConfig, StoredSummaryPolicy, SummaryPipeline,
    UsageRecorder, UsageStats,
};

/// Environment variable holding a tracing filter directive.
const LOG_ENV_VAR: &str = "DAYBOOK_LOG";

/// Summarize your git commits day by day.
#[derive(Parser, Debug)]
#[command(name = "daybook")]
#[command(about = "Summarize your git commits day by day, optionally enhanced by an LLM")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// SQLite database path
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Text-generation provider (claude or openai)
    #[arg(long, global = true)]
    provider: Option<Provider>,

    /// Generation model
    #[arg(long, global = true)]
    model: Option<String>,

    /// Model to try once more when the primary model fails
    #[arg(long, global = true)]
    fallback_model: Option<String>,

    #[arg(long, global = true)]
    max_tokens: Option<u32>,

    /// Sampling temperature, 0.0 to 2.0
    #[arg(long, global = true)]
    temperature: Option<f32>,

    /// Provider timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Day boundary: utc, local, or an offset like +02:00
    #[arg(long, global = true)]
    timezone: Option<DayBoundary>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate daily summaries, reusing cached enhancements
    Generate(GenerateArgs),
    /// Discard cached enhancements and regenerate them
    Refresh(RangeArgs),
    /// Show today's provider usage
    Stats {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct RangeArgs {
    /// Author name or email (defaults to git user.name)
    #[arg(long)]
    author: Option<String>,

    /// First day to include: YYYY-MM-DD, today, yesterday, or Nd / Nw
    #[arg(long, default_value = "7d")]
    since: String,

    /// Repository to read commits from
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    range: RangeArgs,

    /// Skip the provider and print basic summaries only
    #[arg(long)]
    no_enhance: bool,

    /// Regenerate every day's enhancement even when cached
    #[arg(long)]
    force: bool,

    /// Return stored enhanced summaries without re-reading commits
    #[arg(long)]
    trust_stored: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = apply_overrides(Settings::from_env(), &cli)?;

    match cli.command {
        Command::Generate(args) => {
            let policy = if args.trust_stored {
                StoredSummaryPolicy::Trust
            } else {
                StoredSummaryPolicy::Revalidate
            };
            let use_enhancement = !args.no_enhance;
            let (pipeline, author, since) =
                prepare(&settings, &args.range, policy, use_enhancement).await?;

            let request = GenerateRequest {
                author: author.clone(),
                since,
                force_refresh: args.force,
                use_enhancement,
            };
            let records = pipeline
                .generate(&request)
                .await
                .context("Failed to generate summaries")?;
            print_records(&records, &author, args.range.json)?;
        }
        Command::Refresh(args) => {
            let (pipeline, author, since) =
                prepare(&settings, &args, StoredSummaryPolicy::Revalidate, true).await?;
            let records = pipeline
                .refresh(&author, since)
                .await
                .context("Failed to refresh summaries")?;
            print_records(&records, &author, args.json)?;
        }
        Command::Stats { json } => {
            let store = open_store(&settings.db_path).await?;
            let stats = UsageRecorder::new(Arc::new(store))
                .today_stats(settings.boundary)
                .await
                .context("Failed to read usage statistics")?;
            print_stats(&stats, json)?;
        }
    }

    Ok(())
}

/// Install a stderr subscriber. `DAYBOOK_LOG` takes precedence over `--verbose`.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn apply_overrides(mut settings: Settings, cli: &Cli) -> Result<Settings> {
    if let Some(db) = &cli.db {
        settings.db_path = db.clone();
    }
    if let Some(provider) = cli.provider {
        settings.provider = provider;
    }
    if let Some(model) = &cli.model {
        settings.model = model.clone();
    }
    if let Some(fallback) = &cli.fallback_model {
        settings.fallback_model = Some(fallback.clone());
    }
    if let Some(max_tokens) = cli.max_tokens {
        settings.max_tokens = max_tokens;
    }
    if let Some(temperature) = cli.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            bail!("--temperature must be between 0.0 and 2.0, got {}", temperature);
        }
        settings.temperature = temperature;
    }
    if let Some(secs) = cli.timeout {
        settings.timeout = std::time::Duration::from_secs(secs);
    }
    if let Some(boundary) = cli.timezone {
        settings.boundary = boundary;
    }
    Ok(settings)
}

async fn open_store(path: &Path) -> Result<SqliteStore> {
    SqliteStore::connect(path)
        .await
        .with_context(|| format!("Failed to open database at {}", path.display()))
}

/// Resolve the repository, author and start date, and wire up the pipeline.
async fn prepare(
    settings: &Settings,
    args: &RangeArgs,
    policy: StoredSummaryPolicy,
    use_enhancement: bool,
) -> Result<(SummaryPipeline, String, chrono::NaiveDate)> {
    let repository = std::fs::canonicalize(&args.repo)
        .with_context(|| format!("Repository path {} does not exist", args.repo.display()))?;

    let author = match &args.author {
        Some(author) => author.clone(),
        None => configured_author(&repository)
            .context("No --author given and git user.name is not set for this repository")?,
    };

    let since = parse_since(&args.since, settings.boundary.today())?;

    let store = open_store(&settings.db_path).await?;
    let generator = build_generator(settings, use_enhancement).await;

    let pipeline = SummaryPipeline::new(
        Arc::new(GitSource),
        generator,
        Arc::new(store),
        PipelineConfig {
            repository,
            boundary: settings.boundary,
            enhancement: settings.enhancement(),
            stored_policy: policy,
        },
    );

    Ok((pipeline, author, since))
}

/// Pick the configured provider. A missing provider is not fatal: days
/// fall back to basic summaries.
async fn build_generator(settings: &Settings, use_enhancement: bool) -> Arc<dyn TextGenerator> {
    match settings.provider {
        Provider::Claude => {
            if use_enhancement {
                if let Err(e) = check_claude_installed().await {
                    warn!("{}. Summaries will not be enhanced.", e);
                }
            }
            Arc::new(ClaudeCliGenerator::new())
        }
        Provider::OpenAi => {
            if use_enhancement && settings.api_key.is_none() {
                warn!("No API key set (DAYBOOK_API_KEY or OPENAI_API_KEY); requests may be rejected");
            }
            Arc::new(OpenAiGenerator::new(
                settings.api_base.clone(),
                settings.api_key.clone(),
            ))
        }
    }
}

fn print_records(records: &[DailySummaryRecord], author: &str, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(records).context("Failed to serialize summaries")?
        );
        return Ok(());
    }

    if records.is_empty() {
        println!("No commits found for {}.", author);
        return Ok(());
    }

    let blocks: Vec<String> = records
        .iter()
        .map(|record| {
            if record.has_enhancement() {
                format!("{}\n{}", record.date, record.display_text())
            } else {
                record.basic_text.clone()
            }
        })
        .collect();
    println!("{}", blocks.join("\n\n"));
    Ok(())
}

fn print_stats(stats: &UsageStats, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(stats).context("Failed to serialize stats")?
        );
        return Ok(());
    }

    println!("Requests:        {}", stats.requests);
    println!("Tokens:          {}", stats.tokens);
    println!("Errors:          {}", stats.errors);
    println!("Avg latency:     {:.0} ms", stats.average_latency_ms);
    println!("Success rate:    {:.1}%", stats.success_rate);
    Ok(())
}
