//! certflow command line.
//!
//! Runs deploy nodes against the configured stores and seeds the SQLite
//! stores with access records and certificates.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use certflow_access::{AccessConfig, AccessRecord, AccessUsage, SqliteAccess};
use certflow_workflow::{
    Certificate, CertflowConfig, DeployNode, DeployOutcome, DeployerRegistry, MultiProgress,
    NodeServices, RunContext, RunLog, SqliteOutputStore, StoreConfig, TracingProgress,
    WorkflowNode,
};

#[derive(Parser)]
#[command(name = "certflow")]
#[command(about = "Deploy issued certificates from certflow workflows")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to certflow.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a deploy node described by a JSON file
    Deploy {
        /// Path to the node JSON
        node: PathBuf,

        /// Workflow the node belongs to
        #[arg(short, long)]
        workflow: String,

        /// Print the run log as JSON when done
        #[arg(long)]
        log_json: bool,
    },

    /// List the available deployer provider types
    Providers,

    /// Store an access record in the SQLite access database
    AddAccess {
        /// Record id
        #[arg(long)]
        id: String,

        /// Display name
        #[arg(long)]
        name: String,

        /// Provider type the config is meant for
        #[arg(long = "type")]
        config_type: String,

        /// Provider config as JSON
        #[arg(long)]
        settings: String,

        /// apply, deploy or all
        #[arg(long, default_value = "all")]
        usage: String,
    },

    /// Store an issued certificate in the SQLite output database
    ImportCertificate {
        /// Node that issued the certificate
        #[arg(long)]
        node: String,

        /// Workflow that issued the certificate
        #[arg(long)]
        workflow: String,

        /// Certificate PEM file
        #[arg(long)]
        cert: PathBuf,

        /// Private key PEM file
        #[arg(long)]
        key: PathBuf,

        /// Issuer certificate PEM file
        #[arg(long)]
        issuer: Option<PathBuf>,

        /// Domains covered, `;`-separated
        #[arg(long)]
        san: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = run(cli).await;
    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => CertflowConfig::from_file(path)?,
        None => CertflowConfig::load()?,
    };

    match cli.command {
        Commands::Deploy {
            node,
            workflow,
            log_json,
        } => deploy(&config, &node, workflow, log_json).await,
        Commands::Providers => {
            for provider in DeployerRegistry::with_builtin(&config.deployer).provider_types() {
                println!("{provider}");
            }
            Ok(())
        }
        Commands::AddAccess {
            id,
            name,
            config_type,
            settings,
            usage,
        } => {
            let AccessConfig::Sqlite { db_path } = &config.access else {
                bail!("add-access needs the sqlite access backend");
            };
            serde_json::from_str::<serde_json::Value>(&settings)
                .context("access config is not valid JSON")?;
            let usage: AccessUsage = usage.parse().map_err(anyhow::Error::msg)?;

            let record = AccessRecord::new(name, config_type, settings)
                .with_id(id)
                .with_usage(usage);
            let repository = SqliteAccess::open(db_path).await?;
            repository.insert(&record).await?;
            repository.close().await;
            info!(id = %record.id, "access record stored");
            Ok(())
        }
        Commands::ImportCertificate {
            node,
            workflow,
            cert,
            key,
            issuer,
            san,
        } => {
            let StoreConfig::Sqlite { db_path } = &config.store else {
                bail!("import-certificate needs the sqlite store backend");
            };
            let mut certificate = Certificate::new(san, read_pem(&cert).await?, read_pem(&key).await?);
            if let Some(issuer) = issuer {
                certificate = certificate.with_issuer(read_pem(&issuer).await?);
            }
            certificate.workflow_id = workflow;
            certificate.workflow_node_id = node;

            let store = SqliteOutputStore::open(db_path).await?;
            store.insert_certificate(&certificate).await?;
            store.close().await;
            info!(id = %certificate.id, node = %certificate.workflow_node_id, "certificate imported");
            println!("{}", certificate.id);
            Ok(())
        }
    }
}

async fn deploy(
    config: &CertflowConfig,
    node_path: &Path,
    workflow: String,
    log_json: bool,
) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(node_path)
        .await
        .with_context(|| format!("failed to read {}", node_path.display()))?;
    let node: WorkflowNode = serde_json::from_str(&raw).context("invalid node JSON")?;

    let log = RunLog::new();
    let progress = MultiProgress::new()
        .with(Arc::new(TracingProgress))
        .with(Arc::new(log.clone()));
    let services = NodeServices::from_config(config)
        .await?
        .with_progress(Arc::new(progress));

    let ctx = RunContext::new(workflow);
    let cancel = ctx.cancellation_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let result = DeployNode::new(node, services).execute(&ctx).await;

    if log_json {
        println!("{}", serde_json::to_string_pretty(&log.items())?);
    }

    match result? {
        DeployOutcome::Deployed(output) => {
            info!(output_id = ?output.id, "deploy finished");
        }
        DeployOutcome::Skipped => info!("nothing to deploy"),
    }
    Ok(())
}

async fn read_pem(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}
