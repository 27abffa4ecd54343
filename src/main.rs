use std::path::PathBuf;

use clap::{Parser, Subcommand};

use article_migrate::config::Config;
use article_migrate::db::Database;
use article_migrate::migrations::{self, Migrator};
use article_migrate::models::{MigrationRecord, MigrationStatus};
use article_migrate::Result;

#[derive(Debug, Parser)]
#[command(
    name = "article-migrate",
    version,
    about = "Applies the articles schema migration to a SQLite database"
)]
struct Cli {
    /// Config file [default: <config dir>/article-migrate/config.toml]
    #[arg(long, global = true, env = "ARTICLE_MIGRATE_CONFIG")]
    config: Option<PathBuf>,

    /// Database file, overriding `db_path` from the config
    #[arg(long, global = true, env = "ARTICLE_MIGRATE_DATABASE")]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply all pending migrations
    Migrate,
    /// Revert the most recently applied migrations
    Rollback {
        /// Number of migrations to revert
        #[arg(long, default_value_t = 1)]
        steps: usize,
    },
    /// Show which migrations are applied
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the SQL each migration runs
    Schema,
    /// Show the columns and foreign keys of a table
    Describe { table: String },
}

#[tokio::main]
async fn main() {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let migrator = Migrator::new(migrations::all())?;
    let Cli {
        config,
        database,
        command,
    } = cli;
    let open = || open_database(config.clone(), database.clone(), migrator.clone());

    match command {
        // Printing SQL needs no database
        Command::Schema => print_schema(&migrator),
        Command::Migrate => {
            let applied = open().await?.migrate().await?;
            if applied.is_empty() {
                println!("Schema is up to date");
            }
            print_records("Applied", &applied);
        }
        Command::Rollback { steps } => {
            let reverted = open().await?.rollback(steps).await?;
            if reverted.is_empty() {
                println!("Nothing to roll back");
            }
            print_records("Reverted", &reverted);
        }
        Command::Status { json } => {
            let status = open().await?.status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
        Command::Describe { table } => {
            let db = open().await?;
            let columns = db.columns(&table).await?;
            if columns.is_empty() {
                return Err(anyhow::anyhow!("table `{}` does not exist", table).into());
            }
            println!("{:<12} {:<10} {:<8} {}", "Column", "Type", "Null", "Default");
            for column in &columns {
                println!(
                    "{:<12} {:<10} {:<8} {}{}",
                    column.name,
                    column.sql_type,
                    if column.nullable { "yes" } else { "no" },
                    column.default.as_deref().unwrap_or("-"),
                    if column.primary_key { "  (primary key)" } else { "" },
                );
            }
            for fk in db.foreign_keys(&table).await? {
                println!("foreign key {} -> {}.{}", fk.column, fk.table, fk.to);
            }
        }
    }

    Ok(())
}

/// `--database` wins over the config file, which is then neither read nor created.
async fn open_database(
    config_path: Option<PathBuf>,
    database: Option<String>,
    migrator: Migrator,
) -> Result<Database> {
    let (db_path, busy_timeout) = match database {
        Some(db_path) => (db_path, Config::default_busy_timeout()),
        None => {
            let config = Config::load(config_path.as_deref())?;
            let busy_timeout = config.busy_timeout();
            (config.db_path, busy_timeout)
        }
    };
    Database::open(&db_path, busy_timeout, migrator).await
}

fn print_schema(migrator: &Migrator) {
    for migration in migrator.migrations() {
        println!("-- {}", migration.id());
        for statement in migration.up_statements() {
            println!("{};", statement);
        }
        println!();
    }
}

fn print_records(verb: &str, records: &[MigrationRecord]) {
    for record in records {
        println!("{} {}_{}", verb, record.version, record.name);
    }
}

fn print_status(status: &[MigrationStatus]) {
    println!(
        "{:<9} {:<15} {:<24} {}",
        "Status", "Migration ID", "Migration Name", "Applied At"
    );
    println!("{}", "-".repeat(72));
    for entry in status {
        println!(
            "{:<9} {:<15} {:<24} {}",
            entry.state.label(),
            entry.version,
            entry.name,
            entry
                .applied_at
                .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
        );
    }
}
