//! ynab-reconcile - reconcile budget accounts against statement balances

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use ynab_reconcile::config::Config;
use ynab_reconcile::logging::init_tracing;
use ynab_reconcile::utils::{resolve_targets, Mode, TracingProgress};
use ynab_reconcile::{
    Outcome, ReconcileResult, Reconciler, RunReport, SqliteSnapshotProvider, YnabClient,
};

/// Find which uncleared transactions bring an account to its statement
/// balance, and optionally reconcile them
#[derive(Parser, Debug)]
#[command(name = "ynab-reconcile")]
#[command(version, about, long_about = None)]
struct Cli {
    /// `single` uses --account-name-regex/--target, `batch` uses --account-target-pairs
    #[arg(long, value_enum, default_value_t = ModeArg::Single)]
    mode: ModeArg,

    /// Regex to match account name (must match exactly one account)
    #[arg(long)]
    account_name_regex: Option<String>,

    /// Target balance to match towards for reconciliation
    #[arg(long, allow_hyphen_values = true)]
    target: Option<String>,

    /// Batch mode only: `ACCOUNT_NAME_REGEX=TARGET` pairs, e.g. `Checking=500.30`
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    account_target_pairs: Vec<String>,

    /// Actually reconcile; without it the matching transactions are only printed
    #[arg(long)]
    reconcile: bool,

    /// Path to the SQLite export of the budget
    #[arg(long, alias = "sqlite-export-for-ynab-db")]
    db: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Single,
    Batch,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Single => Mode::Single,
            ModeArg::Batch => Mode::Batch,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env();

    init_tracing(cli.log_level.as_deref().unwrap_or(&config.log_level));

    match run(cli, config).await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX)),
        Err(e) => {
            eprintln!("\u{274c} {}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli, config: Config) -> ReconcileResult<i32> {
    let targets = resolve_targets(
        cli.mode.into(),
        cli.account_name_regex.as_deref(),
        cli.target.as_deref(),
        &cli.account_target_pairs,
    )?;

    let service = if cli.reconcile {
        Some(YnabClient::with_base_url(
            config.require_token()?,
            config.api_url.as_str(),
        ))
    } else {
        None
    };

    let db_path = cli.db.unwrap_or(config.db_path);
    let provider = SqliteSnapshotProvider::connect(&db_path).await?;

    let mut reconciler =
        Reconciler::new(provider).with_progress(Box::new(TracingProgress::new()));
    if let Some(service) = service {
        reconciler = reconciler.with_service(service);
    }

    let report = reconciler.run(&targets, cli.reconcile).await?;
    print_report(&report);

    Ok(report.exit_code())
}

fn print_report(report: &RunReport) {
    let rendered = report.render();
    if !rendered.is_empty() {
        println!("{}", rendered);
    }

    for account_report in &report.accounts {
        if let Outcome::Failed { error, .. } = &account_report.outcome {
            eprintln!(
                "\u{274c} Reconciliation failed for {}: {}",
                account_report.account.label(),
                error
            );
        }
    }
}
