// crates/lake-cli/src/main.rs
// ============================================================================
// Module: Lake CLI Entry Point
// Description: Command dispatcher for the indexer and warehouse queries.
// Purpose: Run refresh views and inspect versioned dimensions from a shell.
// Dependencies: clap, lake-config, lake-indexer, lake-store-sqlite, tokio.
// ============================================================================

//! ## Overview
//! The `lake` CLI runs the refresh views against a local warehouse until
//! interrupted, validates configuration, and answers current, as-of, and
//! history queries over the topology and validator dimensions. Query results are printed as
//! one JSON object per line.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use lake_config::LakeConfig;
use lake_core::Value;
use lake_core::surrogate_key;
use lake_indexer::Indexer;
use lake_indexer::IndexerConfig;
use lake_indexer::IndexerSources;
use lake_indexer::NoopViewMetrics;
use lake_indexer::UsageViewConfig;
use lake_indexer::ValidatorsViewConfig;
use lake_indexer::serviceability::JsonFileServiceabilitySource;
use lake_indexer::serviceability::TOPOLOGY_SCHEMAS;
use lake_indexer::serviceability::schema_by_name as topology_schema;
use lake_indexer::usage::CounterSource;
use lake_indexer::usage::JsonFileCounterSource;
use lake_indexer::usage::UsageSettings;
use lake_indexer::validators::ClusterSource;
use lake_indexer::validators::JsonFileClusterSource;
use lake_indexer::validators::VALIDATOR_SCHEMAS;
use lake_indexer::validators::schema_by_name as validator_schema;
use lake_store_sqlite::DimensionDataset;
use lake_store_sqlite::DimensionRow;
use lake_store_sqlite::Warehouse;
use lake_store_sqlite::WarehouseError;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::watch;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "lake", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the refresh views until interrupted.
    Run(ConfigArgs),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Query versioned dimensions.
    Query {
        /// Selected query subcommand.
        #[command(subcommand)]
        command: QueryCommand,
    },
    /// Dataset catalog utilities.
    Datasets {
        /// Selected datasets subcommand.
        #[command(subcommand)]
        command: DatasetsCommand,
    },
}

/// Shared config path argument.
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Optional config file path (defaults to lake.toml or `LAKE_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a Lake configuration file.
    Validate(ConfigArgs),
}

/// Dataset catalog subcommands.
#[derive(Subcommand, Debug)]
enum DatasetsCommand {
    /// List datasets recorded in the warehouse catalog.
    List(ConfigArgs),
}

/// Query subcommands.
#[derive(Subcommand, Debug)]
enum QueryCommand {
    /// Print the current version of entities (all live entities without --key).
    Current(QueryArgs),
    /// Print the version of entities effective at a point in time.
    AsOf(AsOfArgs),
    /// Print every stored version of entities, tombstones included.
    History(QueryArgs),
}

/// Arguments shared by query subcommands.
#[derive(Args, Debug)]
struct QueryArgs {
    /// Config and warehouse selection.
    #[command(flatten)]
    config: ConfigArgs,
    /// Dimension dataset name (for example `dz_devices`).
    #[arg(long, value_name = "NAME")]
    dataset: String,
    /// Entity public key; repeatable.
    #[arg(long = "key", value_name = "PK")]
    keys: Vec<String>,
}

/// Arguments for the `query as-of` command.
#[derive(Args, Debug)]
struct AsOfArgs {
    /// Dataset and keys.
    #[command(flatten)]
    query: QueryArgs,
    /// Point in time (RFC 3339).
    #[arg(long, value_name = "RFC3339")]
    as_of: String,
}

/// Query selection resolved from CLI arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryMode {
    /// Latest live versions.
    Current,
    /// Versions effective at a point in time.
    AsOf(OffsetDateTime),
    /// Every stored version.
    History,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Run(args) => command_run(&args).await,
        Commands::Config {
            command,
        } => command_config(command),
        Commands::Query {
            command,
        } => command_query(command),
        Commands::Datasets {
            command,
        } => command_datasets(command),
    }
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

/// Executes the `run` command.
async fn command_run(args: &ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    init_tracing(&config.logging.filter)?;

    let warehouse_config = config.warehouse.clone();
    let warehouse = tokio::task::spawn_blocking(move || Warehouse::open(warehouse_config))
        .await
        .map_err(|err| CliError::new(format!("warehouse open join failed: {err}")))?
        .map_err(|err| CliError::new(format!("failed to open warehouse: {err}")))?;

    let sources = IndexerSources {
        serviceability: Arc::new(JsonFileServiceabilitySource::new(
            config.serviceability.source_path.clone(),
        )),
        counters: config.usage.as_ref().map(|usage| {
            Arc::new(JsonFileCounterSource::new(usage.source_path.clone()))
                as Arc<dyn CounterSource>
        }),
        cluster: config.validators.as_ref().map(|validators| {
            Arc::new(JsonFileClusterSource::new(validators.source_path.clone()))
                as Arc<dyn ClusterSource>
        }),
    };
    let indexer = Indexer::new(
        &warehouse,
        sources,
        indexer_config(&config)?,
        Arc::new(NoopViewMetrics),
    )
    .map_err(|err| CliError::new(format!("failed to build indexer: {err}")))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = indexer.start(&shutdown_rx);
    info!(
        warehouse = %warehouse.config().path.display(),
        views = handles.len(),
        "indexer started"
    );

    let signal = tokio::signal::ctrl_c().await;
    if let Err(err) = &signal {
        warn!(error = %err, "failed to listen for interrupt; shutting down");
    }
    info!("shutdown requested");
    shutdown_tx.send_replace(true);
    for handle in handles {
        if let Err(err) = handle.await {
            warn!(error = %err, "view task ended abnormally");
        }
    }
    warehouse.close().map_err(|err| CliError::new(format!("failed to close warehouse: {err}")))?;
    info!("indexer stopped");
    Ok(ExitCode::SUCCESS)
}

/// Builds indexer settings from the loaded configuration.
fn indexer_config(config: &LakeConfig) -> CliResult<IndexerConfig> {
    let usage = match &config.usage {
        Some(usage) => Some(UsageViewConfig {
            interval: usage.refresh_interval(),
            settings: UsageSettings {
                query_window: time::Duration::try_from(usage.query_window()).map_err(|err| {
                    CliError::new(format!("usage.query_window_secs out of range: {err}"))
                })?,
                prerequisite_timeout: usage.prerequisite_timeout(),
            },
        }),
        None => None,
    };
    let validators = config.validators.as_ref().map(|validators| ValidatorsViewConfig {
        interval: validators.refresh_interval(),
        block_production_interval: validators.block_production_interval(),
    });
    Ok(IndexerConfig {
        serviceability_interval: config.serviceability.refresh_interval(),
        usage,
        validators,
    })
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter.
fn init_tracing(configured: &str) -> CliResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(configured)
            .map_err(|err| CliError::new(format!("invalid logging.filter: {err}")))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| CliError::new(format!("failed to install tracing subscriber: {err}")))
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(args) => {
            let config = load_config(args.config.as_deref())?;
            let mut views = 1;
            if config.usage.is_some() {
                views += 1;
            }
            if config.validators.is_some() {
                views += 2;
            }
            write_stdout_line(&format!(
                "config ok: warehouse {} with {views} view(s)",
                config.warehouse.path.display()
            ))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: Dataset Commands
// ============================================================================

/// Dispatches datasets subcommands.
fn command_datasets(command: DatasetsCommand) -> CliResult<ExitCode> {
    match command {
        DatasetsCommand::List(args) => {
            let warehouse = open_warehouse(args.config.as_deref())?;
            let entries = warehouse
                .list_datasets()
                .map_err(|err| CliError::new(format!("failed to list datasets: {err}")))?;
            for entry in entries {
                write_stdout_line(&format!(
                    "{}\t{}\t{}",
                    entry.kind.as_str(),
                    entry.name,
                    entry.created_at
                ))?;
            }
            close_warehouse(&warehouse)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: Query Commands
// ============================================================================

/// Dispatches query subcommands.
fn command_query(command: QueryCommand) -> CliResult<ExitCode> {
    let (args, mode) = match command {
        QueryCommand::Current(args) => (args, QueryMode::Current),
        QueryCommand::AsOf(args) => {
            let as_of = parse_as_of(&args.as_of)?;
            (args.query, QueryMode::AsOf(as_of))
        }
        QueryCommand::History(args) => (args, QueryMode::History),
    };
    let warehouse = open_warehouse(args.config.config.as_deref())?;
    let rows = query_rows(&warehouse, &args.dataset, &args.keys, mode)?;
    for row in &rows {
        let line = serde_json::to_string(row)
            .map_err(|err| CliError::new(format!("failed to encode row: {err}")))?;
        write_stdout_line(&line)?;
    }
    close_warehouse(&warehouse)?;
    Ok(ExitCode::SUCCESS)
}

/// Runs a dimension query.
///
/// Current queries without keys return every live entity; as-of and history
/// queries require at least one key.
fn query_rows(
    warehouse: &Warehouse,
    dataset: &str,
    keys: &[String],
    mode: QueryMode,
) -> CliResult<Vec<DimensionRow>> {
    let schema = topology_schema(dataset).or_else(|| validator_schema(dataset));
    let schema = schema.ok_or_else(|| {
        let known: Vec<&str> = TOPOLOGY_SCHEMAS
            .iter()
            .chain(VALIDATOR_SCHEMAS.iter())
            .map(|schema| schema.name())
            .collect();
        CliError::new(format!("unknown dataset {dataset}; expected one of {}", known.join(", ")))
    })?;
    let dimension = DimensionDataset::new(schema)
        .map_err(|err| CliError::new(format!("invalid dataset {dataset}: {err}")))?;
    let entity_ids: Vec<_> =
        keys.iter().map(|key| surrogate_key(&[Value::from(key.as_str())])).collect();
    if entity_ids.is_empty() && mode != QueryMode::Current {
        return Err(CliError::new("at least one --key is required".to_string()));
    }
    let query_error = |err: WarehouseError| CliError::new(format!("query failed: {err}"));

    match mode {
        QueryMode::Current => {
            let filter = if entity_ids.is_empty() { None } else { Some(entity_ids.as_slice()) };
            dimension.get_current_rows(warehouse, filter).map_err(query_error)
        }
        QueryMode::AsOf(as_of) => {
            let mut rows = Vec::with_capacity(entity_ids.len());
            for entity_id in &entity_ids {
                if let Some(row) =
                    dimension.get_as_of_row(warehouse, entity_id, as_of).map_err(query_error)?
                {
                    rows.push(row);
                }
            }
            Ok(rows)
        }
        QueryMode::History => {
            let mut rows = Vec::new();
            for entity_id in &entity_ids {
                rows.extend(dimension.get_history(warehouse, entity_id).map_err(query_error)?);
            }
            Ok(rows)
        }
    }
}

/// Parses an RFC 3339 `--as-of` value.
fn parse_as_of(value: &str) -> CliResult<OffsetDateTime> {
    OffsetDateTime::parse(value.trim(), &Rfc3339)
        .map_err(|err| CliError::new(format!("invalid --as-of {value}: {err}")))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads and validates configuration.
fn load_config(path: Option<&Path>) -> CliResult<LakeConfig> {
    LakeConfig::load(path).map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

/// Loads configuration and opens its warehouse.
fn open_warehouse(path: Option<&Path>) -> CliResult<Warehouse> {
    let config = load_config(path)?;
    Warehouse::open(config.warehouse)
        .map_err(|err| CliError::new(format!("failed to open warehouse: {err}")))
}

/// Closes a warehouse opened by a one-shot command.
fn close_warehouse(warehouse: &Warehouse) -> CliResult<()> {
    warehouse.close().map_err(|err| CliError::new(format!("failed to close warehouse: {err}")))
}

/// Renders top-level help.
fn show_help() -> CliResult<()> {
    let help = Cli::command().render_help().to_string();
    write_stdout_line(help.trim_end())
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
        .map_err(|err| CliError::new(format!("failed to write to stdout: {err}")))
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
