//! cognilayer - cognitive state and memory graph for one agent
//!
//! Usage:
//!   cognilayer status                          → parameters, katharsis, graph summary
//!   cognilayer memory [--top N]                → DNA and consolidated nodes by beauty
//!   cognilayer turn "text" [--reply "text"]    → run one exchange through the pipeline
//!   cognilayer think                           → reflect over the active window
//!   cognilayer chain [N] [--seed "text"]       → causal chain of N deductions
//!   cognilayer evolve [N]                      → cross-reference N pairs of archive eras
//!   cognilayer attach FILE [--learn]           → hold a file in context
//!   cognilayer detach ID                       → drop a file from context
//!   cognilayer dump-config                     → print the effective config as TOML

use anyhow::Context;
use clap::{Parser, Subcommand};
use cognilayer_core::{NodeId, SessionKey};
use cognilayer_llm::{
    AnthropicProvider, CancellationToken, Generator, LlmProvider, OllamaProvider, ProviderGenerator,
    ScriptedGenerator,
};
use cognilayer_mind::config::{GenerationConfig, ProviderKind};
use cognilayer_mind::{AgentSession, ChainSeed, MindConfig, Release, Signal, TurnInput, Workspace};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "cognilayer",
    about = "Cognitive state and memory graph engine",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace directory (or set COGNILAYER_WORKSPACE)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Config file (default: <workspace>/cognilayer.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Session name used in logs
    #[arg(short, long, global = true, default_value = "default")]
    session: String,

    /// Write logs to a file (in addition to stderr)
    #[arg(long, global = true)]
    log_file: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show parameters, disposition and graph summary
    Status,
    /// List DNA and the most beautiful consolidated nodes
    Memory {
        #[arg(short, long, default_value_t = 10)]
        top: usize,
    },
    /// Process one exchange
    Turn {
        text: String,
        /// The agent's reply, appended after the user turn
        #[arg(short, long)]
        reply: Option<String>,
        /// Sentiment in [-1, 1]
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        sentiment: f64,
        /// Factuality in [0, 1]
        #[arg(long, default_value_t = 0.5)]
        factuality: f64,
        /// Distance from held ideas in [0, 1]
        #[arg(long, default_value_t = 0.5)]
        distance: f64,
    },
    /// Reflect over the active window and queue latent questions
    Think,
    /// Run a causal chain
    Chain {
        /// Number of deductions (default from config)
        steps: Option<u32>,
        /// Seed text (default: the newest reply in the window)
        #[arg(long, conflicts_with = "node")]
        seed: Option<String>,
        /// Seed node id
        #[arg(long)]
        node: Option<u64>,
    },
    /// Cross-reference archive eras
    Evolve {
        /// Number of era pairs (default from config)
        epochs: Option<u32>,
    },
    /// Hold a file in the active context
    Attach {
        path: PathBuf,
        /// Source id (default: the path)
        #[arg(long)]
        id: Option<String>,
        /// Also learn it into memory
        #[arg(long, default_value_t = false)]
        learn: bool,
    },
    /// Drop a source from the active context
    Detach { id: String },
    /// Print the effective config as TOML
    DumpConfig,
}

impl Commands {
    fn needs_generator(&self) -> bool {
        matches!(self, Self::Turn { .. } | Self::Think | Self::Chain { .. } | Self::Evolve { .. })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file.as_deref().map(Path::new))?;

    let workspace = resolve_workspace(cli.workspace.clone());
    std::fs::create_dir_all(&workspace)
        .with_context(|| format!("cannot create workspace {}", workspace.display()))?;
    let workspace = Workspace::new(workspace);

    let config = match &cli.config {
        Some(path) => MindConfig::load(&expand_tilde(path)),
        None => workspace.load_config(),
    };

    if let Commands::DumpConfig = cli.command {
        print!("{}", config.to_toml());
        return Ok(());
    }

    let generator = match build_generator(&config.generation) {
        Ok(generator) => generator,
        Err(e) if !cli.command.needs_generator() => {
            warn!("Generator unavailable: {e:#}");
            Arc::new(ScriptedGenerator::unavailable(e.to_string()))
        }
        Err(e) => return Err(e),
    };

    let mut session = workspace.open(SessionKey::new(cli.session.clone()), config, generator);
    info!("Workspace: {}", workspace.root().display());

    let dirty = run(cli.command, &mut session).await?;
    if dirty {
        workspace.save(&session).context("failed to save workspace")?;
    }
    Ok(())
}

/// Execute a command. Returns whether the session changed.
async fn run(command: Commands, session: &mut AgentSession) -> anyhow::Result<bool> {
    match command {
        Commands::Status => {
            println!("{}", serde_json::to_string_pretty(&session.status())?);
            Ok(false)
        }
        Commands::Memory { top } => {
            println!("{}", serde_json::to_string_pretty(&session.memory(top))?);
            Ok(false)
        }
        Commands::Turn { text, reply, sentiment, factuality, distance } => {
            let mut input = TurnInput::new(text).with_signal(Signal { sentiment, factuality, idea_distance: distance });
            if let Some(reply) = reply {
                input = input.with_reply(reply);
            }
            let report = session.process_turn(input).await?;
            if let Some(feedback) = report.feedback {
                println!("feedback: {:?}", feedback);
            }
            println!("decision: {:?}", report.decision);
            if let Release::Released { friction_before, friction_after, .. } = report.release {
                println!("katharsis: friction {:.2} -> {:.2} (discretion suppressed)", friction_before, friction_after);
            }
            for c in &report.condensations {
                if c.is_condensed() {
                    println!("condensed: {:?}", c);
                }
            }
            if !report.evicted.is_empty() {
                println!("evicted: {} node(s)", report.evicted.len());
            }
            if report.anchored {
                println!("grounding anchor engaged");
            }
            if let Some(q) = report.proactive_question {
                println!("question: {}", q);
            }
            println!("disposition: {}", session.params().disposition());
            Ok(true)
        }
        Commands::Think => {
            let reflection = session.think().await?;
            println!("{}", reflection.summary);
            for q in &reflection.latent_questions {
                println!("? {}", q);
            }
            Ok(true)
        }
        Commands::Chain { steps, seed, node } => {
            let seed = match (seed, node) {
                (Some(text), _) => Some(ChainSeed::Text(text)),
                (None, Some(id)) => Some(ChainSeed::Node(NodeId::new(id))),
                (None, None) => None,
            };
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let outcome = session.chain(seed, steps, &cancel).await?;
            for (i, link) in outcome.links.iter().enumerate() {
                println!("{:>2}. [{}] {}", i + 1, link.id(), link.content());
            }
            println!("chain {:?}", outcome.state);
            if let Some(e) = &outcome.failure {
                println!("stopped: {}", e);
            }
            Ok(true)
        }
        Commands::Evolve { epochs } => {
            let outcome = session.evolve(epochs).await?;
            if !outcome.had_enough_eras() {
                println!("archive holds {} era(s); evolve needs two", outcome.eras);
                return Ok(false);
            }
            for id in &outcome.syntheses {
                println!("[{}] {}", id, session.graph().get(*id)?.content());
            }
            if let Some(e) = &outcome.failure {
                println!("stopped: {}", e);
            }
            Ok(true)
        }
        Commands::Attach { path, id, learn } => {
            let text = std::fs::read_to_string(&path).with_context(|| format!("cannot read {}", path.display()))?;
            let id = id.unwrap_or_else(|| path.display().to_string());
            match session.attach(&id, text, learn) {
                Some(node) => println!("attached {} and learned it as node {}", id, node),
                None => println!("attached {}", id),
            }
            Ok(true)
        }
        Commands::Detach { id } => match session.detach(&id) {
            Some(_) => {
                println!("detached {}", id);
                Ok(true)
            }
            None => {
                println!("{} is not attached", id);
                Ok(false)
            }
        },
        Commands::DumpConfig => Ok(false),
    }
}

fn build_generator(config: &GenerationConfig) -> anyhow::Result<Arc<dyn Generator>> {
    let provider: Arc<dyn LlmProvider> = match config.provider {
        ProviderKind::Ollama => Arc::new(match &config.base_url {
            Some(url) => OllamaProvider::new(url.clone()),
            None => OllamaProvider::default(),
        }),
        ProviderKind::Anthropic => {
            let api_key = std::env::var(&config.api_key_env)
                .map_err(|_| anyhow::anyhow!("{} not set", config.api_key_env))?;
            let provider = AnthropicProvider::new(api_key);
            Arc::new(match &config.base_url {
                Some(url) => provider.with_base_url(url.clone()),
                None => provider,
            })
        }
    };
    let mut generator = ProviderGenerator::new(provider, config.model.clone())
        .with_timeout(Duration::from_secs(config.timeout_secs))
        .with_max_tokens(config.max_tokens);
    if let Some(t) = config.temperature {
        generator = generator.with_temperature(t);
    }
    Ok(Arc::new(generator))
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn,cognilayer=info".into())
    };
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let Some(path) = log_file else {
        tracing_subscriber::registry().with(filter()).with(stderr).init();
        return Ok(None);
    };
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let name = path.file_name().context("log file path has no file name")?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
    tracing_subscriber::registry()
        .with(filter())
        .with(stderr)
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}

fn resolve_workspace(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var("COGNILAYER_WORKSPACE").ok().map(PathBuf::from))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".cognilayer")
        })
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}
