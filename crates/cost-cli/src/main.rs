use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use cost_aiven::AivenClient;
use cost_billing::{InvoiceReconciler, ReconcilerSettings};
use cost_config::secrets::{resolve_secrets_for_job, ResolvedSecrets};
use cost_config::{CostConfig, Job, LoadedConfig, UnusedKeyPolicy, UnusedKeyReport};
use cost_currency::{CurrencySync, RatesClient};
use cost_warehouse::{DeletePredicate, PgWarehouse, TableSchema, Warehouse};
use tracing::{error, info, warn};

mod logging;

const EXIT_CONFIG: u8 = 1;
const EXIT_LOGGER: u8 = 2;
const EXIT_RUN: u8 = 3;

/// Statuses that can still change on the provider side.
const NON_FINAL_STATUSES: &[&str] = &["estimate", "mailed"];

#[derive(Parser)]
#[command(name = "aiven-cost")]
#[command(about = "Aiven invoice reconciliation and currency ingestion", long_about = None)]
struct Cli {
    /// YAML config layers, merged in order over the built-in defaults
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    /// Treat unknown config keys as an error instead of a warning
    #[arg(long, global = true, default_value_t = false)]
    strict_config: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile provider invoices into the cost table
    Invoices,

    /// Bring the currency table up to today
    Currency {
        /// Delete stored rates from this date (YYYY-MM-DD) and fetch them again
        #[arg(long)]
        refetch_from: Option<NaiveDate>,
    },

    /// Settlement ledger maintenance
    Ledger {
        #[command(subcommand)]
        cmd: LedgerCmd,
    },

    /// Compute the merged config hash + print canonical JSON
    ConfigHash,
}

#[derive(Subcommand)]
enum LedgerCmd {
    /// Delete estimate/mailed rows so the next run does not duplicate them
    PruneUnpaid {
        /// Acknowledge that rows are deleted from the cost table.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

impl Commands {
    fn job(&self) -> Option<Job> {
        match self {
            Commands::Invoices => Some(Job::Invoices),
            Commands::Currency { .. } => Some(Job::Currency),
            Commands::Ledger { .. } => Some(Job::Ledger),
            Commands::ConfigHash => None,
        }
    }
}

enum Failure {
    Config(anyhow::Error),
    Logger(anyhow::Error),
    Run(anyhow::Error),
}

/// Everything a job needs, resolved before the logger exists.
struct Prepared {
    loaded: LoadedConfig,
    cfg: CostConfig,
    secrets: ResolvedSecrets,
    unused: UnusedKeyReport,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Dev convenience; absent in production.
    let _ = dotenvy::from_filename(".env.local");
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure::Config(e)) => {
            eprintln!("configuration error: {e:#}");
            ExitCode::from(EXIT_CONFIG)
        }
        Err(Failure::Logger(e)) => {
            eprintln!("unable to create logger: {e:#}");
            ExitCode::from(EXIT_LOGGER)
        }
        Err(Failure::Run(e)) => {
            error!(error = %format!("{e:#}"), "run failed");
            ExitCode::from(EXIT_RUN)
        }
    }
}

async fn run(cli: Cli) -> Result<(), Failure> {
    let paths: Vec<&str> = cli.config_paths.iter().map(|s| s.as_str()).collect();

    let Some(job) = cli.cmd.job() else {
        let loaded = load_config(&paths).map_err(Failure::Config)?;
        println!("config_hash={}", loaded.config_hash);
        println!("{}", loaded.canonical_json);
        return Ok(());
    };

    if let Commands::Ledger {
        cmd: LedgerCmd::PruneUnpaid { yes: false },
    } = &cli.cmd
    {
        return Err(Failure::Config(anyhow::anyhow!(
            "REFUSING PRUNE: this deletes {} rows from the cost table. \
             Re-run with: `aiven-cost ledger prune-unpaid --yes`",
            NON_FINAL_STATUSES.join("/")
        )));
    }

    let prepared = prepare(&paths, job, cli.strict_config).map_err(Failure::Config)?;

    logging::init_tracing(&prepared.cfg.log.format, &prepared.cfg.log.level)
        .map_err(Failure::Logger)?;

    info!(
        job = job.as_str(),
        config_hash = %prepared.loaded.config_hash,
        "config loaded"
    );
    for key in &prepared.unused.unused_leaf_pointers {
        warn!(key = %key, "unused config key");
    }

    let outcome = match cli.cmd {
        Commands::Invoices => run_invoices(&prepared).await,
        Commands::Currency { refetch_from } => run_currency(&prepared, refetch_from).await,
        Commands::Ledger {
            cmd: LedgerCmd::PruneUnpaid { .. },
        } => prune_unpaid(&prepared).await,
        Commands::ConfigHash => Ok(()),
    };
    outcome.map_err(Failure::Run)
}

fn load_config(paths: &[&str]) -> Result<LoadedConfig> {
    cost_config::load_effective(paths, |var| std::env::var(var).ok())
}

fn prepare(paths: &[&str], job: Job, strict: bool) -> Result<Prepared> {
    let loaded = load_config(paths)?;
    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let unused = cost_config::report_unused_keys(&loaded.config_json, policy)?;
    let cfg = CostConfig::from_json(&loaded.config_json)?;
    if job == Job::Invoices {
        cfg.billing_group_id()?;
    }
    let secrets = resolve_secrets_for_job(&loaded.config_json, job)?;
    Ok(Prepared {
        loaded,
        cfg,
        secrets,
        unused,
    })
}

async fn connect_warehouse(p: &Prepared) -> Result<PgWarehouse> {
    let url = p.secrets.require_database_url(&p.cfg.warehouse.url_env)?;
    PgWarehouse::connect(url).await
}

async fn run_invoices(p: &Prepared) -> Result<()> {
    let settings = ReconcilerSettings::from_config(&p.cfg)?;
    let token = p.secrets.require_aiven_api_token(&p.cfg.aiven.token_env)?;
    let api = AivenClient::new(&p.cfg.aiven.api_host, token.to_string())
        .context("failed to create aiven client")?;
    let warehouse = connect_warehouse(p).await?;

    let summary = InvoiceReconciler::new(&api, &warehouse, settings)
        .run()
        .await
        .context("invoice reconciliation failed")?;
    println!(
        "run_id={} invoices_pending={} invoices_written={} records_written={} tag_lookup_failures={}",
        summary.run_id,
        summary.invoices_pending,
        summary.invoices_written,
        summary.records_written,
        summary.tag_lookup_failures
    );
    Ok(())
}

async fn run_currency(p: &Prepared, refetch_from: Option<NaiveDate>) -> Result<()> {
    let api = RatesClient::new(
        &p.cfg.currency.api_base_url,
        p.secrets.currency_api_token.clone(),
    )
    .context("failed to create rates client")?;
    let warehouse = connect_warehouse(p).await?;

    let today = Utc::now().date_naive();
    let summary = CurrencySync::from_config(&api, &warehouse, &p.cfg)
        .run(today, refetch_from)
        .await?;
    println!(
        "rows_deleted={} rows_written={} windows={}",
        summary.rows_deleted, summary.rows_written, summary.windows
    );
    Ok(())
}

async fn prune_unpaid(p: &Prepared) -> Result<()> {
    let table = p.cfg.warehouse.cost_items_table.as_str();
    let warehouse = connect_warehouse(p).await?;
    warehouse
        .create_table_if_not_exists(TableSchema::CostItems, table)
        .await?;

    let statuses: Vec<String> = NON_FINAL_STATUSES.iter().map(|s| s.to_string()).collect();
    let deleted = warehouse
        .delete_where(table, &DeletePredicate::StatusIn(statuses))
        .await?;
    info!(table, rows_deleted = deleted, "non-final ledger rows pruned");
    println!("rows_deleted={deleted}");
    Ok(())
}
