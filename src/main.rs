use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};

mod config;
mod db;
mod evaluate;
mod import;
mod models;
mod payload;
mod report;
mod session;
mod slip;
mod store;
mod sync;

use config::Settings;
use models::AggregationPolicy;
use session::EditCommand;
use slip::Slip;
use store::LocalStore;
use sync::{SyncHandle, SyncStatus};

#[derive(Parser)]
#[command(name = "result-slip")]
#[command(about = "Track module assessments against your target grades", long_about = None)]
struct Cli {
    /// How assessment scores are combined into a module score
    #[arg(long, value_enum, global = true, default_value_t = AggregationPolicy::Weighted)]
    policy: AggregationPolicy,
    /// Directory for locally saved data
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every module with its score and status
    List,
    #[command(flatten)]
    Edit(EditCommand),
    /// Import assessments from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Edit interactively; remote writes are debounced
    Session,
    /// Create or upgrade the remote schema
    InitDb,
    /// Load demo modules
    Seed {
        /// Seed the local store instead of Postgres
        #[arg(long)]
        local: bool,
    },
    /// Replace the remote copy with the local slip
    Push,
    /// Replace the local slip with the remote copy
    Pull,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env(cli.data_dir);
    let store = LocalStore::open_default(settings.data_dir.clone())?;

    match cli.command {
        Commands::List => {
            let slip = store.load_or_default();
            print!("{}", report::render_slip(&slip, cli.policy));
        }
        Commands::Edit(command) => {
            let mut slip = store.load_or_default();
            let message = session::apply(&mut slip, command)?;
            store.save(slip.modules())?;
            println!("{message}");
            sync_once(&settings, &slip).await;
        }
        Commands::Import { csv } => {
            let mut slip = store.load_or_default();
            let summary = import::import_csv(&mut slip, &csv)?;
            store.save(slip.modules())?;
            println!(
                "Imported {} assessments into {} new modules from {}.",
                summary.assessments_added,
                summary.modules_created,
                csv.display()
            );
            sync_once(&settings, &slip).await;
        }
        Commands::Report { out } => {
            let slip = store.load_or_default();
            let report = report::build_report(&slip, cli.policy, Utc::now());
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Session => {
            let slip = store.load_or_default();
            let sync = start_sync(&settings).await;
            session::run(&store, slip, cli.policy, sync).await?;
        }
        Commands::InitDb => {
            let pool = db::connect(settings.require_database_url()?).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed { local } => {
            if local {
                let modules = db::sample_modules()?;
                store.save(&modules)?;
                println!("Seeded {} modules into {}.", modules.len(), store.path().display());
            } else {
                let pool = db::connect(settings.require_database_url()?).await?;
                let seeded = db::seed(&pool).await?;
                println!("Seeded {seeded} modules.");
            }
        }
        Commands::Push => {
            let pool = db::connect(settings.require_database_url()?).await?;
            let slip = store.load_or_default();
            db::save_modules(&pool, slip.modules()).await?;
            println!("Pushed {} modules.", slip.len());
        }
        Commands::Pull => {
            let pool = db::connect(settings.require_database_url()?).await?;
            let modules = db::fetch_modules(&pool).await?;
            store.save(&modules)?;
            println!("Pulled {} modules into {}.", modules.len(), store.path().display());
        }
    }

    Ok(())
}

// An unreachable remote disables syncing without failing the command.
async fn start_sync(settings: &Settings) -> Option<SyncHandle> {
    let url = settings.database_url.as_deref()?;
    match db::connect(url).await {
        Ok(pool) => Some(SyncHandle::spawn(db::PgStore::new(pool), settings.sync_delay)),
        Err(err) => {
            eprintln!("Remote sync unavailable: {err:#}. Changes are saved locally.");
            None
        }
    }
}

async fn sync_once(settings: &Settings, slip: &Slip) {
    let Some(sync) = start_sync(settings).await else {
        return;
    };
    sync.schedule(slip.modules().to_vec());
    match sync.shutdown().await {
        Ok(SyncStatus::Failed(reason)) => {
            eprintln!("Remote sync failed: {reason}. Local data is saved; run `push` to retry.")
        }
        Ok(_) => {}
        Err(err) => eprintln!("Remote sync failed: {err:#}"),
    }
}
