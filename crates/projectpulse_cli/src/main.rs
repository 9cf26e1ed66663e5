//! ProjectPulse command-line driver.
//!
//! # Responsibility
//! - Open the local store, run syncs from an export file and print analytics.
//! - Print every result as JSON on stdout.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use projectpulse_core::repo::{ProjectRepository, SyncStateRepository};
use projectpulse_core::sync::{handle_webhook, parse_webhook, SyncSchedule};
use projectpulse_core::{
    default_log_level, init_logging, now_epoch_ms, open_db, AppConfig, ExternalSource,
    JsonExportSource, PortfolioService, SqliteStore, SyncReconciler, SyncStateHandle, UserRole,
};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "ProjectPulse: portfolio analytics and external-source reconciliation",
    long_about = None
)]
struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, default_value = "projectpulse.db")]
    db: PathBuf,

    /// TOML config file. Defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "projectpulse.toml")]
    config: PathBuf,

    /// Directory for rotated log files. File logging is off when omitted.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one sync from an external export file.
    Sync {
        #[arg(long, value_name = "FILE")]
        export: PathBuf,
    },
    /// Handle a change notification; a valid one triggers a full sync.
    Webhook {
        #[arg(long, value_name = "FILE")]
        export: PathBuf,
        /// Notification body, or `-` for stdin.
        #[arg(long, value_name = "FILE")]
        payload: PathBuf,
    },
    /// Check that an export file can be read as a source.
    Check {
        #[arg(long, value_name = "FILE")]
        export: PathBuf,
    },
    /// Outcome of the last finished sync against this store.
    Status,
    /// Sync on the configured interval.
    Watch {
        #[arg(long, value_name = "FILE")]
        export: PathBuf,
        /// Stop after this many runs.
        #[arg(long, default_value_t = 1)]
        iterations: u32,
    },
    /// Register a team member for email resolution during sync.
    AddUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// coordinator|member|authority
        #[arg(long, default_value = "member")]
        role: String,
    },
    /// List local projects.
    Projects,
    /// Score a project and record the assessment.
    Assess { project_id: Uuid },
    /// Workload plan for a project's team.
    Optimize { project_id: Uuid },
    /// Portfolio risk prediction.
    Risks,
    /// Dashboard metrics and cards.
    Metrics,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Sync { .. } => "sync",
            Self::Webhook { .. } => "webhook",
            Self::Check { .. } => "check",
            Self::Status => "status",
            Self::Watch { .. } => "watch",
            Self::AddUser { .. } => "add_user",
            Self::Projects => "projects",
            Self::Assess { .. } => "assess",
            Self::Optimize { .. } => "optimize",
            Self::Risks => "risks",
            Self::Metrics => "metrics",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, &absolute(log_dir)?, true).context("logging init failed")?;
    }
    let config = AppConfig::load(&cli.config)?;
    let conn = open_db(&cli.db).with_context(|| format!("cannot open `{}`", cli.db.display()))?;
    let store = SqliteStore::try_new(&conn)?;
    info!(
        "event=cli_command module=cli status=start command={}",
        cli.command.name()
    );

    match cli.command {
        Commands::Sync { export } => {
            let reconciler = reconciler(&export, store, &config)?;
            print_json(&reconciler.sync_from_source()?)
        }
        Commands::Webhook { export, payload } => {
            let notification = parse_webhook(&read_payload(&payload)?)?;
            let reconciler = reconciler(&export, store, &config)?;
            print_json(&handle_webhook(&reconciler, &notification)?)
        }
        Commands::Check { export } => print_json(&check(&export)),
        Commands::Status => print_json(&store.load_sync_state()?),
        Commands::Watch { export, iterations } => {
            let reconciler = reconciler(&export, store, &config)?;
            watch(&reconciler, config.sync.interval(), iterations)
        }
        Commands::AddUser { name, email, role } => {
            let Some(role) = UserRole::parse(role.trim()) else {
                bail!("unknown role `{role}`; expected coordinator|member|authority");
            };
            let service = PortfolioService::new(store, &config);
            let id = service.register_user(&name, &email, role, now_epoch_ms())?;
            print_json(&serde_json::json!({ "user_id": id }))
        }
        Commands::Projects => print_json(&store.list_projects()?),
        Commands::Assess { project_id } => {
            let service = PortfolioService::new(store, &config);
            print_json(&service.assess_project(project_id, now_epoch_ms())?)
        }
        Commands::Optimize { project_id } => {
            let service = PortfolioService::new(store, &config);
            print_json(&service.optimize_project(project_id)?)
        }
        Commands::Risks => {
            let service = PortfolioService::new(store, &config);
            print_json(&service.predict_risks(now_epoch_ms())?)
        }
        Commands::Metrics => {
            let service = PortfolioService::new(store, &config);
            let metrics = service.metrics(now_epoch_ms())?;
            print_json(&serde_json::json!({
                "metrics": metrics,
                "cards": metrics.cards(),
            }))
        }
    }
}

fn reconciler<'conn>(
    export: &Path,
    store: SqliteStore<'conn>,
    config: &AppConfig,
) -> Result<SyncReconciler<JsonExportSource, SqliteStore<'conn>>> {
    let source = JsonExportSource::from_path(export)?;
    let state = SyncStateHandle::from_snapshot(store.load_sync_state()?.unwrap_or_default());
    Ok(SyncReconciler::new(source, store, state)
        .with_sync_config(config.sync.clone())
        .with_field_mapping(config.fields.clone()))
}

#[derive(Debug, Serialize)]
struct ConnectionCheck {
    source: String,
    connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn check(export: &Path) -> ConnectionCheck {
    let result = JsonExportSource::from_path(export).and_then(|source| {
        source.check_connection()?;
        Ok(source.source_id().to_string())
    });
    match result {
        Ok(source) => ConnectionCheck {
            source,
            connected: true,
            error: None,
        },
        Err(err) => ConnectionCheck {
            source: err.source_id.clone(),
            connected: false,
            error: Some(err.to_string()),
        },
    }
}

fn watch(
    reconciler: &SyncReconciler<JsonExportSource, SqliteStore<'_>>,
    interval: Duration,
    iterations: u32,
) -> Result<()> {
    let mut schedule = SyncSchedule::new(interval);
    let mut completed = 0;
    while completed < iterations {
        let now = now_epoch_ms();
        match schedule.run_if_due(reconciler, now) {
            Some(report) => {
                print_json(&report?)?;
                completed += 1;
            }
            None => {
                let wait_ms = schedule
                    .next_due_at_ms()
                    .map_or(0, |due| due.saturating_sub(now).max(0));
                std::thread::sleep(Duration::from_millis(wait_ms.unsigned_abs()));
            }
        }
    }
    Ok(())
}

fn read_payload(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut body = String::new();
        std::io::stdin().read_to_string(&mut body)?;
        return Ok(body);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("cannot read payload `{}`", path.display()))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
