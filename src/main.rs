use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use comfy_table::presets::ASCII_MARKDOWN;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use blog_outline::config::{DEFAULT_TARGET_KEYWORD, PipelineConfig, VerdictPolicy};
use blog_outline::context::{ContextKeys, TableNames};
use blog_outline::keywords::{
    self, AdsConfig, AdsKeywordPlanner, KeywordFilter, KeywordRequest,
};
use blog_outline::llm::{DEFAULT_MODEL, LlmBackend, LlmConfig, create_provider};
use blog_outline::pipeline::{OutlinePipeline, StepOutcome};
use blog_outline::review::CliReviewGate;
use blog_outline::store::{LibSqlBackend, SessionStore};

#[derive(Parser, Debug)]
#[command(
    name = "blog-outline",
    version,
    about = "Draft blog-article outlines from company, product and persona data"
)]
struct Cli {
    /// Session database
    #[arg(
        long,
        env = "BLOG_OUTLINE_DB_PATH",
        default_value = "./data/blog-outline.db",
        global = true
    )]
    db_path: PathBuf,

    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a session and review drafts interactively until one is accepted
    Run {
        #[command(flatten)]
        session: SessionArgs,
        #[command(flatten)]
        review: ReviewArgs,
        #[command(flatten)]
        llm: LlmArgs,
    },
    /// Start a session, print the first draft, and exit awaiting a verdict
    Start {
        #[command(flatten)]
        session: SessionArgs,
        #[command(flatten)]
        review: ReviewArgs,
        #[command(flatten)]
        llm: LlmArgs,
    },
    /// Continue a saved session, optionally with a verdict on its current draft
    Resume {
        id: Uuid,
        /// Reviewer answer, e.g. `yes`, `no`, or comments for the redraft
        verdict: Option<String>,
        /// Keep reviewing interactively after this step
        #[arg(long)]
        interactive: bool,
        #[command(flatten)]
        review: ReviewArgs,
        #[command(flatten)]
        llm: LlmArgs,
    },
    /// Print a saved session
    Show {
        id: Uuid,
        /// Include the full conversation history
        #[arg(long)]
        history: bool,
    },
    /// List recent sessions
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Fetch keyword ideas with monthly search volume
    Keywords {
        /// Seed keywords
        keywords: Vec<String>,
        /// Landing page used as a seed
        #[arg(long)]
        page_url: Option<String>,
        /// Keep ideas with strictly more monthly searches than this
        #[arg(long, default_value_t = 100)]
        min_volume: i64,
        /// Keep ideas with unspecified competition
        #[arg(long)]
        include_unspecified: bool,
        /// Also write the markdown table to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct SessionArgs {
    #[arg(long, default_value = "c15000000001")]
    site_id: String,
    #[arg(long, default_value_t = 1)]
    company_id: i64,
    #[arg(long, default_value_t = 1)]
    product_id: i64,
    #[arg(long, default_value_t = 1)]
    persona_id: i64,
    /// Keyword the outline should rank for
    #[arg(long, default_value = DEFAULT_TARGET_KEYWORD)]
    keyword: String,
    /// Directory holding the CSV tables
    #[arg(long, env = "BLOG_OUTLINE_DATA_DIR", default_value = "db")]
    data_dir: PathBuf,
    /// Add a keyword volume table to the context (needs ads credentials)
    #[arg(long)]
    keyword_research: bool,
    /// Landing page used as an extra keyword seed
    #[arg(long, requires = "keyword_research")]
    page_url: Option<String>,
}

#[derive(Args, Debug)]
struct ReviewArgs {
    /// How answers are read: exact, lenient or strict
    #[arg(long, env = "BLOG_OUTLINE_VERDICT_POLICY", default_value = "exact")]
    verdict_policy: VerdictPolicy,
    /// Give up after this many rejected drafts
    #[arg(long, env = "BLOG_OUTLINE_MAX_DRAFTS")]
    max_drafts: Option<u32>,
}

#[derive(Args, Debug)]
struct LlmArgs {
    #[arg(long, env = "BLOG_OUTLINE_MODEL", default_value = DEFAULT_MODEL)]
    model: String,
    /// OpenAI-compatible endpoint
    #[arg(long, env = "OPENAI_BASE_URL")]
    base_url: Option<String>,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

/// Log to stderr, and to a file when `log_dir` is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "blog-outline.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter()),
        )
        .with(file_layer)
        .init();
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_dir.as_deref());

    match cli.command {
        Commands::Run {
            session,
            review,
            llm,
        } => {
            let pipeline = build_pipeline(&cli.db_path, session, review, &llm, true).await?;
            banner(&pipeline, &llm);
            let first = pipeline.start().await?;
            let gate = CliReviewGate::stdin();
            let outcome = pipeline.run_with_gate(first, &gate).await?;
            report(&pipeline, &outcome).await?;
        }
        Commands::Start {
            session,
            review,
            llm,
        } => {
            let pipeline = build_pipeline(&cli.db_path, session, review, &llm, true).await?;
            banner(&pipeline, &llm);
            let outcome = pipeline.start().await?;
            println!("{}", outcome.draft());
            report(&pipeline, &outcome).await?;
        }
        Commands::Resume {
            id,
            verdict,
            interactive,
            review,
            llm,
        } => {
            // Accepting a draft makes no LLM call, so the key is optional here.
            let pipeline =
                build_pipeline(&cli.db_path, SessionArgs::detached(), review, &llm, false)
                    .await?;
            let mut outcome = match verdict {
                Some(verdict) => pipeline.resume(id, &verdict).await?,
                None => pipeline.continue_session(id).await?,
            };
            if interactive {
                let gate = CliReviewGate::stdin();
                outcome = pipeline.run_with_gate(outcome, &gate).await?;
            } else {
                println!("{}", outcome.draft());
            }
            report(&pipeline, &outcome).await?;
        }
        Commands::Show { id, history } => {
            let store = open_store(&cli.db_path).await?;
            let session = store
                .get_session(id)
                .await?
                .with_context(|| format!("Session {id} not found"))?;
            let cost = store.get_session_cost(id).await?;

            eprintln!("Session:  {}", session.id);
            eprintln!("Keyword:  {}", session.target_keyword);
            eprintln!(
                "Keys:     site={} company={} product={} persona={}",
                session.keys.site_id,
                session.keys.company_id,
                session.keys.product_id,
                session.keys.persona_id
            );
            eprintln!("Phase:    {}", session.phase);
            eprintln!("Verdict:  {}", session.verdict);
            eprintln!("Drafts:   {}", session.revision_count);
            eprintln!(
                "LLM:      {} calls, {} in / {} out tokens, ${}",
                cost.call_count,
                cost.total_input_tokens,
                cost.total_output_tokens,
                cost.total_cost.round_dp(6)
            );
            if history {
                for (i, message) in session.history.iter().enumerate() {
                    println!("--- [{i}] {} ---\n{}\n", message.role, message.content);
                }
            } else if let Some(draft) = session.draft {
                println!("\n{draft}");
            }
        }
        Commands::List { limit } => {
            let store = open_store(&cli.db_path).await?;
            let sessions = store.list_sessions(limit).await?;
            if sessions.is_empty() {
                eprintln!("No sessions yet.");
                return Ok(());
            }
            let mut table = Table::new();
            table.load_preset(ASCII_MARKDOWN);
            table.set_header(vec!["ID", "Keyword", "Phase", "Drafts", "Updated"]);
            for s in sessions {
                table.add_row(vec![
                    s.id.to_string(),
                    s.target_keyword,
                    s.phase.to_string(),
                    s.revision_count.to_string(),
                    s.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                ]);
            }
            println!("{table}");
        }
        Commands::Keywords {
            keywords: seeds,
            page_url,
            min_volume,
            include_unspecified,
            output,
        } => {
            let planner = ads_planner()?;
            let request = KeywordRequest {
                keywords: seeds,
                page_url,
            };
            let filter = KeywordFilter {
                min_volume,
                include_unspecified,
            };
            let report = keywords::research(&planner, &request, &filter).await?;
            if report.is_empty() {
                eprintln!("No matching records found.");
                return Ok(());
            }
            println!("{}", report.to_markdown());
            if let Some(path) = output {
                report.write_markdown(&path)?;
                eprintln!("Wrote {}", path.display());
            }
        }
    }

    Ok(())
}

impl SessionArgs {
    /// Resumed sessions carry their own keys; only the defaults are needed.
    fn detached() -> Self {
        Self {
            site_id: String::new(),
            company_id: 0,
            product_id: 0,
            persona_id: 0,
            keyword: DEFAULT_TARGET_KEYWORD.to_string(),
            data_dir: PathBuf::from("db"),
            keyword_research: false,
            page_url: None,
        }
    }
}

async fn open_store(path: &Path) -> anyhow::Result<Arc<dyn SessionStore>> {
    let store = LibSqlBackend::new_local(path)
        .await
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    Ok(Arc::new(store))
}

fn ads_planner() -> anyhow::Result<AdsKeywordPlanner> {
    let Some(config) = AdsConfig::from_env()? else {
        bail!("GOOGLE_ADS_DEVELOPER_TOKEN not set; keyword research needs ads API credentials");
    };
    Ok(AdsKeywordPlanner::new(config)?)
}

async fn build_pipeline(
    db_path: &Path,
    session: SessionArgs,
    review: ReviewArgs,
    llm: &LlmArgs,
    require_llm: bool,
) -> anyhow::Result<OutlinePipeline> {
    if require_llm && llm.api_key.is_none() {
        bail!("OPENAI_API_KEY not set\n  export OPENAI_API_KEY=sk-...");
    }

    let config = PipelineConfig {
        keys: ContextKeys {
            site_id: session.site_id,
            company_id: session.company_id,
            product_id: session.product_id,
            persona_id: session.persona_id,
        },
        target_keyword: session.keyword,
        data_dir: session.data_dir,
        tables: TableNames::default(),
        verdict_policy: review.verdict_policy,
        max_drafts: review.max_drafts,
        keyword_research: session.keyword_research,
        page_url: session.page_url,
        keyword_filter: KeywordFilter::default(),
    };
    config.validate()?;

    let store = open_store(db_path).await?;

    let research = config.keyword_research;
    let mut pipeline = match llm.api_key {
        Some(ref api_key) => {
            let provider = create_provider(&LlmConfig {
                backend: LlmBackend::OpenAi,
                api_key: secrecy::SecretString::from(api_key.clone()),
                model: llm.model.clone(),
                base_url: llm.base_url.clone(),
            })?;
            OutlinePipeline::new(config, store, provider)
        }
        None => OutlinePipeline::without_llm(config, store),
    };
    if research {
        pipeline = pipeline.with_keyword_source(Arc::new(ads_planner()?));
    }
    Ok(pipeline)
}

fn banner(pipeline: &OutlinePipeline, llm: &LlmArgs) {
    let config = pipeline.config();
    eprintln!("📝 blog-outline v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model:   {}", llm.model);
    eprintln!("   Keyword: {}", config.target_keyword);
    eprintln!(
        "   Site:    {} (company {}, product {}, persona {})",
        config.keys.site_id,
        config.keys.company_id,
        config.keys.product_id,
        config.keys.persona_id
    );
    eprintln!("   Data:    {}", config.data_dir.display());
    eprintln!("   Verdict: {}\n", config.verdict_policy);
}

async fn report(pipeline: &OutlinePipeline, outcome: &StepOutcome) -> anyhow::Result<()> {
    let id = outcome.session_id();
    match outcome {
        StepOutcome::AwaitingFeedback { revision, .. } => {
            eprintln!("\nSession {id} is waiting for review of draft {revision}.");
            eprintln!("  blog-outline resume {id} yes");
            eprintln!("  blog-outline resume {id} no");
        }
        StepOutcome::Accepted { revision, .. } => {
            eprintln!("\nOutline accepted after {revision} draft(s). Session {id}");
        }
        StepOutcome::Exhausted { revision, .. } => {
            eprintln!("\nGave up after {revision} rejected draft(s). Session {id}");
        }
    }
    let cost = pipeline.cost(id).await?;
    tracing::info!(
        session_id = %id,
        calls = cost.call_count,
        cost = %cost.total_cost.round_dp(6),
        "LLM usage"
    );
    Ok(())
}
