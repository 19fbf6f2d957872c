use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use driftwood_core::seed::{SeedOrchestrator, SeedStatus, list_environments};
use driftwood_core::{
    ChangeDescriptor, DriftError, MigrationScript, MigrationWriter, Migrator, ModelDef,
    SchemaDiffer, Settings, SqlDialect,
};
use tracing_subscriber::EnvFilter;

mod source_scan;
use source_scan::{DbKind, scan_models};

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "driftwood")]
#[command(about = "Driftwood CLI - schema drift detection, migrations and environment seeds", long_about = None)]
struct Cli {
    /// Database URL (overrides DATABASE_URL)
    #[arg(short, long, global = true)]
    database: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a migration file pair, optionally from the model diff
    Generate {
        /// Name of the migration (e.g. add_article_cover)
        #[arg(short, long)]
        name: String,
        /// Diff registered models against the live schema
        #[arg(long)]
        auto: bool,
        /// Where to look for `#[derive(Model)]` structs
        #[arg(long, default_value = "src")]
        models_dir: PathBuf,
    },
    /// Apply or inspect schema migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Manage per-environment seed data
    Seed {
        #[arg(value_enum)]
        action: SeedAction,
        #[command(flatten)]
        options: SeedOptions,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Revert the current migration
    Down,
    /// Print the current version
    Version,
    /// Set the version and clear the dirty flag without running SQL
    Force { version: u64 },
    /// Migrate up or down to a version
    Goto { version: u64 },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SeedAction {
    Run,
    Rollback,
    Status,
    List,
    DetailedStatus,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
struct SeedOptions {
    /// Target environment (defaults to APP_ENV, then the run mode)
    #[arg(long)]
    env: Option<String>,
    /// Execute every seed file without tracking
    #[arg(long)]
    manual: bool,
    /// Record applied versions in seed_migrations
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    tracked: bool,
    /// Print status reports as JSON
    #[arg(long)]
    json: bool,
}

macro_rules! with_backend {
    ($url:expr, $db:ident => $body:expr) => {
        match DbKind::from_url($url) {
            #[cfg(feature = "sqlite")]
            DbKind::Sqlite => {
                type $db = sqlx::Sqlite;
                $body
            }
            #[cfg(feature = "mysql")]
            DbKind::Mysql => {
                type $db = sqlx::MySql;
                $body
            }
            #[cfg(feature = "postgres")]
            DbKind::Postgres => {
                type $db = sqlx::Postgres;
                $body
            }
            #[allow(unreachable_patterns)]
            kind => Err(format!(
                "this driftwood build has no support for {:?} databases",
                kind
            )
            .into()),
        }
    };
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();
    match run_cli(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("[ERROR] {}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run_cli(cli: Cli) -> CliResult<()> {
    let settings = Settings::from_env().with_database_url(cli.database);
    match cli.command {
        Commands::Generate {
            name,
            auto,
            models_dir,
        } => run_generate(&settings, &name, auto, &models_dir).await,
        Commands::Migrate { action } => {
            with_backend!(&settings.database_url, DB => run_migrate::<DB>(&settings, action).await)
        }
        Commands::Seed { action, options } => {
            validate_seed_options(action, &options)?;
            if action == SeedAction::List {
                return run_seed_list(&settings, &options);
            }
            with_backend!(&settings.database_url, DB => run_seed::<DB>(&settings, action, &options).await)
        }
    }
}

async fn connect<DB: SqlDialect>(db_url: &str) -> Result<sqlx::Pool<DB>, DriftError> {
    println!(">> Connecting to {} database...", DB::BACKEND);
    DB::connect(db_url).await.map_err(DriftError::Connection)
}

async fn run_generate(
    settings: &Settings,
    name: &str,
    auto: bool,
    models_dir: &Path,
) -> CliResult<()> {
    let script = if auto {
        println!(">> Scanning {} for models...", models_dir.display());
        let models = scan_models(models_dir, settings)?;
        if models.is_empty() {
            println!(
                "[WARN] No models with #[derive(Model)] found under {}.",
                models_dir.display()
            );
        }
        let changes = with_backend!(&settings.database_url, DB => diff_models::<DB>(settings, &models).await)?;
        MigrationScript::from_changes(name, &changes)
    } else {
        MigrationScript::template(name)
    };

    let written = MigrationWriter::new(&settings.migrations_dir).write(name, &script)?;
    println!("[OK] Created migration files:");
    println!("  {}", written.up_path.display());
    println!("  {}", written.down_path.display());
    if auto {
        println!();
        println!("Generated SQL:");
        print!("{}", script.up);
    }
    Ok(())
}

async fn diff_models<DB: SqlDialect>(
    settings: &Settings,
    models: &[ModelDef],
) -> CliResult<Vec<ChangeDescriptor>> {
    let pool = connect::<DB>(&settings.database_url).await?;
    let changes = SchemaDiffer::new(pool).diff_models(models).await?;
    Ok(changes)
}

async fn run_migrate<DB: SqlDialect>(settings: &Settings, action: MigrateAction) -> CliResult<()> {
    let pool = connect::<DB>(&settings.database_url).await?;
    let migrator = Migrator::from_dir(pool, &settings.migrations_dir)?;
    match action {
        MigrateAction::Up => {
            let applied = migrator.up().await?;
            if !applied.is_empty() {
                println!("[OK] Applied {} migration(s).", applied.len());
            }
        }
        MigrateAction::Down => {
            if let Some(version) = migrator.down().await? {
                println!("[OK] Rolled back migration {}.", version);
            }
        }
        MigrateAction::Version => match migrator.version().await? {
            Some((version, true)) => println!("{} (dirty)", version),
            Some((version, false)) => println!("{}", version),
            None => println!("[INFO] No migrations applied."),
        },
        MigrateAction::Force { version } => {
            migrator.force(version).await?;
            println!("[OK] Forced version {}.", version);
        }
        MigrateAction::Goto { version } => match migrator.goto(version).await? {
            Some(current) => println!("[OK] Now at version {}.", current),
            None => println!("[OK] All migrations reverted."),
        },
    }
    Ok(())
}

fn validate_seed_options(action: SeedAction, options: &SeedOptions) -> Result<(), String> {
    match action {
        SeedAction::Run if !options.tracked && !options.manual => Err(
            "untracked seeding requires --manual (use `seed run --manual`)".to_owned(),
        ),
        SeedAction::Rollback if !options.tracked || options.manual => {
            Err("rollback only works on tracked seeds".to_owned())
        }
        _ => Ok(()),
    }
}

fn run_seed_list(settings: &Settings, options: &SeedOptions) -> CliResult<()> {
    let environments = list_environments(&settings.seeds_dir)?;
    let current = settings.resolve_environment(options.env.as_deref());
    if options.json {
        let report = serde_json::json!({
            "environments": environments,
            "current": current,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if environments.is_empty() {
        println!(
            "[INFO] No seed environments found under {}",
            settings.seeds_dir.display()
        );
    } else {
        println!("Available seed environments:");
        for env in &environments {
            let marker = if *env == current { " (current)" } else { "" };
            println!("  - {}{}", env, marker);
        }
    }
    println!("Current environment: {}", current);
    Ok(())
}

async fn run_seed<DB: SqlDialect>(
    settings: &Settings,
    action: SeedAction,
    options: &SeedOptions,
) -> CliResult<()> {
    let environment = settings.resolve_environment(options.env.as_deref());
    let pool = connect::<DB>(&settings.database_url).await?;
    let mut seeds = SeedOrchestrator::from_settings(pool, settings);

    match action {
        SeedAction::Run if options.manual => {
            let report = seeds.run_manual(&environment).await?;
            println!(
                "[OK] Executed {} seed file(s) for environment: {}",
                report.files.len(),
                report.environment
            );
        }
        SeedAction::Run => {
            seeds.run_tracked(&environment).await?;
        }
        SeedAction::Rollback => {
            seeds.rollback(&environment).await?;
        }
        SeedAction::Status => {
            let status = seeds.status(&environment).await?;
            print_status(&status, false, options.json)?;
        }
        SeedAction::DetailedStatus => {
            let status = seeds.status(&environment).await?;
            print_status(&status, true, options.json)?;
        }
        SeedAction::List => return run_seed_list(settings, options),
    }
    Ok(())
}

fn print_status(status: &SeedStatus, detailed: bool, json: bool) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(status)?);
        return Ok(());
    }

    let latest = status.latest_applied.as_deref().unwrap_or("none");
    println!("Seed status for environment: {}", status.environment);
    if detailed {
        println!("  Total available: {}", status.total_available);
    }
    println!("  Applied: {}", status.total_applied);
    println!("  Pending: {}", status.total_pending);
    println!("  Latest applied version: {}", latest);
    if detailed {
        println!("  Applied versions: {}", join_or_none(&status.applied));
        println!("  Pending versions: {}", join_or_none(&status.pending));
    }
    Ok(())
}

fn join_or_none(versions: &[String]) -> String {
    if versions.is_empty() {
        "none".to_owned()
    } else {
        versions.join(", ")
    }
}
