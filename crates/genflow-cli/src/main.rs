//! Genflow CLI - multi-provider document generation pipeline
//!
//! Usage:
//!   genflow init                Write a default genflow.toml
//!   genflow run <topic>         Run the full pipeline on a topic
//!   genflow resume <session>    Resume an interrupted session
//!   genflow sessions            List sessions in the output directory
//!   genflow status              Show providers and routing coverage

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use genflow_core::{DocumentType, GenflowConfig, PipelineConfig, PipelineState, Session};
use genflow_export::FileExporter;
use genflow_gateway::{HttpProvider, ProviderRegistry};
use genflow_resilience::HealthRegistry;
use genflow_router::{RoutingTable, TaskRouter};
use genflow_pipeline::{PipelineOrchestrator, PipelinePlan};
use genflow_templates::TemplateStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "genflow")]
#[command(author, version, about = "Multi-provider document generation pipeline")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file
    #[arg(long, default_value = "genflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Run the full pipeline on a topic
    Run {
        /// Document topic
        topic: String,

        /// Document type (bizplan, rd)
        #[arg(long, default_value = "bizplan")]
        doc_type: String,

        /// Template family
        #[arg(long, default_value = "default")]
        template_family: String,

        /// Output language code
        #[arg(long, default_value = "en")]
        language: String,

        /// Routing table file (TOML); built-in routing when omitted
        #[arg(long, value_name = "FILE")]
        routing: Option<PathBuf>,
    },

    /// Resume an interrupted session
    Resume {
        /// Session identifier (directory name under the output dir)
        session_id: String,

        /// Routing table file (TOML); built-in routing when omitted
        #[arg(long, value_name = "FILE")]
        routing: Option<PathBuf>,
    },

    /// List sessions in the output directory
    Sessions,

    /// Show configured providers and routing coverage
    Status {
        /// Routing table file (TOML); built-in routing when omitted
        #[arg(long, value_name = "FILE")]
        routing: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init => cmd_init(&cli.config),
        Commands::Run {
            topic,
            doc_type,
            template_family,
            language,
            routing,
        } => cmd_run(&cli.config, topic, doc_type, template_family, language, routing).await,
        Commands::Resume { session_id, routing } => {
            cmd_resume(&cli.config, session_id, routing).await
        }
        Commands::Sessions => cmd_sessions(&cli.config),
        Commands::Status { routing } => cmd_status(&cli.config, routing),
    }
}

fn cmd_init(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    GenflowConfig::write_default(path).context("Failed to write default configuration")?;
    println!("Wrote {}", path.display());
    println!("Add [[providers]] entries before running a pipeline.");
    Ok(())
}

async fn cmd_run(
    config_path: &Path,
    topic: String,
    doc_type: String,
    template_family: String,
    language: String,
    routing: Option<PathBuf>,
) -> Result<()> {
    let config = GenflowConfig::load_or_default(config_path)?;
    let doc_type: DocumentType = doc_type
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let pipeline_config = PipelineConfig::new(&topic)
        .with_doc_type(doc_type)
        .with_template_family(template_family)
        .with_language(language);

    let plan = PipelinePlan::default_document_plan();
    let table = load_routing(routing.as_deref())?;
    // Routing gaps are configuration errors; surface them before any
    // provider is called.
    plan.validate_routing(&table, &[doc_type])?;

    // The exporter writes under a per-session directory, so the
    // session is created before the orchestrator.
    let session = Session::new(pipeline_config);
    let session_dir = config.output_dir.join(&session.session_id);

    println!("Session: {}", session.session_id);
    println!("Topic:   {}", topic);
    println!();

    let orchestrator = build_orchestrator(&config, plan, table, &session_dir)?;
    install_ctrl_c(&orchestrator);
    let session = orchestrator.run(session).await;

    report(&session);
    println!("Results in {}", session_dir.display());

    if session.state == PipelineState::Failed {
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_resume(
    config_path: &Path,
    session_id: String,
    routing: Option<PathBuf>,
) -> Result<()> {
    let config = GenflowConfig::load_or_default(config_path)?;
    let session_dir = config.output_dir.join(&session_id);
    let snapshot_path = session_dir.join("pipeline_state.json");

    let content = std::fs::read_to_string(&snapshot_path)
        .with_context(|| format!("No session snapshot at {}", snapshot_path.display()))?;
    let session: Session =
        serde_json::from_str(&content).context("Failed to parse session snapshot")?;

    info!(
        session_id = %session.session_id,
        state = %session.state,
        phase = session.phase,
        "Loaded session snapshot"
    );

    let plan = PipelinePlan::default_document_plan();
    let table = load_routing(routing.as_deref())?;
    plan.validate_routing(&table, &[session.config.doc_type])?;

    let orchestrator = build_orchestrator(&config, plan, table, &session_dir)?;
    install_ctrl_c(&orchestrator);
    let session = orchestrator.resume(session).await;

    report(&session);
    if session.state == PipelineState::Failed {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_sessions(config_path: &Path) -> Result<()> {
    let config = GenflowConfig::load_or_default(config_path)?;

    if !config.output_dir.exists() {
        println!("No sessions (output directory {} does not exist)", config.output_dir.display());
        return Ok(());
    }

    let mut rows: Vec<(String, String, u32)> = Vec::new();
    for entry in std::fs::read_dir(&config.output_dir)? {
        let entry = entry?;
        let snapshot = entry.path().join("pipeline_state.json");
        if !snapshot.is_file() {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(&snapshot) else {
            continue;
        };
        match serde_json::from_str::<Session>(&content) {
            Ok(session) => rows.push((
                session.session_id,
                session.state.to_string(),
                session.phase,
            )),
            Err(error) => warn!(
                path = %snapshot.display(),
                %error,
                "Skipping unreadable session snapshot"
            ),
        }
    }

    if rows.is_empty() {
        println!("No sessions found in {}", config.output_dir.display());
        return Ok(());
    }

    rows.sort();
    println!("Sessions in {}:", config.output_dir.display());
    for (id, state, phase) in rows {
        println!("  {}  state={}  phase={}", id, state, phase);
    }
    Ok(())
}

fn cmd_status(config_path: &Path, routing: Option<PathBuf>) -> Result<()> {
    let config = GenflowConfig::load_or_default(config_path)?;
    let table = load_routing(routing.as_deref())?;
    let plan = PipelinePlan::default_document_plan();

    println!("Genflow status");
    println!("==============");

    if config.providers.is_empty() {
        println!("\nProviders: none configured in {}", config_path.display());
    } else {
        println!("\nProviders ({}):", config.providers.len());
        for provider in &config.providers {
            let auth = match &provider.api_key_env {
                Some(env_var) if std::env::var(env_var).is_ok() => "key set",
                Some(_) => "key missing",
                None => "no auth",
            };
            println!("  {}  {}  [{}]", provider.name, provider.endpoint, auth);
        }
    }

    println!("\nRouting entries: {}", table.len());
    for doc_type in [DocumentType::Bizplan, DocumentType::Rd] {
        let coverage = match plan.validate_routing(&table, &[doc_type]) {
            Ok(()) => "complete".to_string(),
            Err(error) => format!("incomplete ({})", error),
        };
        println!("  {}: {}", doc_type, coverage);
    }

    Ok(())
}

/// Wire registry, health, router, templates, and exporter into an
/// orchestrator writing under `session_dir`
fn build_orchestrator(
    config: &GenflowConfig,
    plan: PipelinePlan,
    table: RoutingTable,
    session_dir: &Path,
) -> Result<PipelineOrchestrator> {
    let mut registry = ProviderRegistry::new();
    for provider in &config.providers {
        let mut http = HttpProvider::new(&provider.name, &provider.endpoint);
        if let Some(env_var) = &provider.api_key_env {
            http = http.with_api_key_env(env_var);
        }
        registry.register(Arc::new(http));
    }
    if registry.is_empty() {
        warn!("No providers configured; every task will fail");
    }

    let health = HealthRegistry::from_config(&config.circuit);
    let router = TaskRouter::new(
        table,
        Arc::new(registry),
        health,
        config.max_retries,
        Duration::from_secs(config.timeout_seconds),
    );

    let exporter = FileExporter::new(session_dir)?;

    Ok(PipelineOrchestrator::new(
        plan,
        Arc::new(router),
        Arc::new(TemplateStore::with_default_templates()),
        Arc::new(exporter),
    ))
}

fn load_routing(path: Option<&Path>) -> Result<RoutingTable> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read routing table {}", path.display()))?;
            Ok(RoutingTable::from_toml(&content)?)
        }
        None => Ok(RoutingTable::default_document_plan()),
    }
}

/// First Ctrl-C stops the pipeline between tasks; a second one kills
/// the process the usual way.
fn install_ctrl_c(orchestrator: &PipelineOrchestrator) {
    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current task");
            cancel.cancel();
        }
    });
}

fn report(session: &Session) {
    println!();
    println!("Pipeline finished: {}", session.state);
    for result in &session.results {
        let ok = result.tasks.iter().filter(|t| t.success).count();
        println!(
            "  {}  [{}]  {}/{} tasks succeeded",
            result.phase_name,
            result.status,
            ok,
            result.tasks.len()
        );
        for task in result.tasks.iter().filter(|t| !t.success) {
            println!(
                "    {} ({}): {}",
                task.task,
                task.provider,
                task.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}
