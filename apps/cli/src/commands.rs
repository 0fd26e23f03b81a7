//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use contentflow_core::{
    AuditHistoryService, PipelineController, PipelineParams, PipelineResponse, ProgressReporter,
    run_audit_record,
};
use contentflow_shared::{
    AppConfig, AuditQuery, ContentNode, PipelineConfig, expand_home, init_config, load_config,
};
use contentflow_storage::Storage;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

/// Crates whose events the default filter shows.
const LOG_TARGETS: [&str; 7] = [
    "contentflow",
    "contentflow_core",
    "contentflow_ecrf",
    "contentflow_package",
    "contentflow_processors",
    "contentflow_shared",
    "contentflow_storage",
];

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ContentFlow: upload and publish packaged learning content.
#[derive(Parser)]
#[command(
    name = "contentflow",
    version,
    about = "Validate, extract, process, and publish packaged learning content.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run a workflow operation (upload or publish) for one content item.
    Run {
        /// Operation name: upload/UPLOAD or publish/PUBLISH.
        operation: String,

        /// Content identifier.
        #[arg(long)]
        content_id: String,

        /// Working directory (defaults to <work_dir>/<content-id>).
        #[arg(long)]
        base_path: Option<PathBuf>,

        /// Uploaded package archive (upload only).
        #[arg(long)]
        file: Option<PathBuf>,

        /// JSON file holding the content node; updated in place after the run.
        #[arg(long)]
        node: Option<PathBuf>,
    },

    /// Audit history.
    Audit {
        #[command(subcommand)]
        action: AuditAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Audit subcommands.
#[derive(Subcommand)]
pub(crate) enum AuditAction {
    /// List records in a time range (RFC 3339 timestamps).
    List {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        #[arg(long)]
        graph_id: Option<String>,

        #[arg(long)]
        object_type: Option<String>,

        #[arg(long)]
        object_id: Option<String>,
    },
    /// Show the record for an object at a timestamp.
    Show {
        #[arg(long)]
        object_id: String,

        #[arg(long)]
        timestamp: String,
    },
    /// Delete records older than a timestamp.
    Purge {
        #[arg(long)]
        before: String,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            operation,
            content_id,
            base_path,
            file,
            node,
        } => cmd_run(&operation, &content_id, base_path, file, node.as_deref()).await,
        Command::Audit { action } => match action {
            AuditAction::List {
                from,
                to,
                graph_id,
                object_type,
                object_id,
            } => {
                let mut query = AuditQuery::between(parse_timestamp(&from)?, parse_timestamp(&to)?);
                query.graph_id = graph_id;
                query.object_type = object_type;
                query.object_id = object_id;
                cmd_audit_list(&query).await
            }
            AuditAction::Show {
                object_id,
                timestamp,
            } => cmd_audit_show(&object_id, &parse_timestamp(&timestamp)?).await,
            AuditAction::Purge { before } => cmd_audit_purge(&parse_timestamp(&before)?).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn cmd_run(
    operation: &str,
    content_id: &str,
    base_path: Option<PathBuf>,
    file: Option<PathBuf>,
    node_path: Option<&Path>,
) -> Result<()> {
    let config = load_config()?;

    let base_path = match base_path {
        Some(p) => p,
        None => {
            let dir = expand_home(&config.defaults.work_dir).join(content_id);
            std::fs::create_dir_all(&dir)
                .wrap_err_with(|| format!("cannot create working directory {}", dir.display()))?;
            dir
        }
    };

    let mut node = match node_path {
        Some(path) => read_node(path)?,
        None => ContentNode::new(content_id),
    };

    info!(operation, content_id, base = %base_path.display(), "running pipeline");

    let controller =
        PipelineController::with_config(&base_path, content_id, &PipelineConfig::from(&config))?
            .with_progress(CliProgress::new());

    let params = PipelineParams {
        file,
        node: Some(&mut node),
    };
    let response = controller.run(operation, params).await?;

    if let Some(path) = node_path {
        write_node(path, &node)?;
    }

    if config.storage.enabled && !response.is_empty() {
        record_audit(&config, operation, content_id, &node, &response).await;
    }

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Audit failures never fail the run.
async fn record_audit(
    config: &AppConfig,
    operation: &str,
    content_id: &str,
    node: &ContentNode,
    response: &PipelineResponse,
) {
    let record = run_audit_record(
        operation,
        content_id,
        node,
        response,
        Some(config.defaults.graph_id.as_str()),
    );
    let result = match open_audit(config).await {
        Ok(service) => service.save(&record).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        warn!(error = %e, "failed to record audit entry");
    }
}

fn read_node(path: &Path) -> Result<ContentNode> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("cannot read node file {}", path.display()))?;
    serde_json::from_str(&text).wrap_err_with(|| format!("invalid node JSON in {}", path.display()))
}

fn write_node(path: &Path, node: &ContentNode) -> Result<()> {
    let json = serde_json::to_string_pretty(node)?;
    std::fs::write(path, json)
        .wrap_err_with(|| format!("cannot write node file {}", path.display()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _response: &PipelineResponse) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

// ---------------------------------------------------------------------------
// audit
// ---------------------------------------------------------------------------

async fn open_audit(config: &AppConfig) -> contentflow_shared::Result<AuditHistoryService> {
    let path = expand_home(&config.storage.audit_db);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| contentflow_shared::ContentFlowError::io(parent, e))?;
    }
    Ok(AuditHistoryService::new(Storage::open(&path).await?))
}

async fn cmd_audit_list(query: &AuditQuery) -> Result<()> {
    let config = load_config()?;
    let service = open_audit(&config).await?;
    let records = service.history(query).await;
    info!(count = records.len(), "audit records found");
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

async fn cmd_audit_show(object_id: &str, timestamp: &DateTime<Utc>) -> Result<()> {
    let config = load_config()?;
    let service = open_audit(&config).await?;
    match service.record(object_id, timestamp).await {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => return Err(eyre!("no audit record for '{object_id}' at {timestamp}")),
    }
    Ok(())
}

async fn cmd_audit_purge(before: &DateTime<Utc>) -> Result<()> {
    let config = load_config()?;
    let service = open_audit(&config).await?;
    let deleted = service.purge_before(before).await?;
    println!("Deleted {deleted} audit record(s) older than {before}");
    Ok(())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| eyre!("invalid timestamp '{value}': {e} (expected RFC 3339)"))
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_command() {
        let cli = Cli::try_parse_from([
            "contentflow",
            "-v",
            "run",
            "UPLOAD",
            "--content-id",
            "do_1",
            "--file",
            "pkg.zip",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Run {
                operation,
                content_id,
                base_path,
                file,
                node,
            } => {
                assert_eq!(operation, "UPLOAD");
                assert_eq!(content_id, "do_1");
                assert!(base_path.is_none());
                assert_eq!(file, Some(PathBuf::from("pkg.zip")));
                assert!(node.is_none());
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn parses_audit_list_filters() {
        let cli = Cli::try_parse_from([
            "contentflow",
            "audit",
            "list",
            "--from",
            "2024-01-01T00:00:00Z",
            "--to",
            "2024-02-01T00:00:00Z",
            "--object-id",
            "do_1",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Audit {
                action: AuditAction::List { object_id: Some(_), graph_id: None, .. }
            }
        ));
    }

    #[test]
    fn timestamps_must_be_rfc3339() {
        let ts = parse_timestamp("2024-05-01T10:00:00+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T08:00:00+00:00");
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn node_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.json");
        std::fs::write(
            &path,
            r#"{"identifier": "do_1", "metadata": {"name": "Counting Fun"}}"#,
        )
        .unwrap();

        let mut node = read_node(&path).unwrap();
        assert_eq!(node.metadata_str("name"), Some("Counting Fun"));

        node.set_metadata("downloadUrl", "/work/counting-fun_1_do_1.zip");
        write_node(&path, &node).unwrap();
        assert_eq!(read_node(&path).unwrap(), node);
    }

    #[test]
    fn invalid_node_json_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.json");
        std::fs::write(&path, "not json").unwrap();
        let err = read_node(&path).unwrap_err();
        assert!(err.to_string().contains("invalid node JSON"));
    }
}
