use std::error::Error;

use clap::{Parser, Subcommand};
use log::info;

use potable::config::{Environment, Settings};
use potable::db::edc::EdcArchive;
use potable::plan::{self, RefreshMode};
use potable::storage::{self, Transfer};

#[derive(Parser, Debug)]
#[command(version, about = "Build and distribute the EDC drinking water database", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Consolidate the yearly EDC datasets into the local database
    Refresh {
        /// Type of refresh to perform: all, last or custom
        #[arg(long, default_value = "all")]
        mode: String,
        /// Comma-separated list of years to process (custom mode)
        #[arg(long)]
        years: Option<String>,
        /// Drop the EDC tables before inserting the data
        #[arg(long, default_value_t = false)]
        drop_tables: bool,
        /// Only process years whose data changed on www.data.gouv.fr
        #[arg(long, default_value_t = false)]
        check_update: bool,
    },
    /// Upload the local database to object storage
    Upload {
        /// Environment to upload to
        #[arg(long, default_value = "dev")]
        env: String,
    },
    /// Download the database from object storage
    Download {
        /// Environment to download from
        #[arg(long, default_value = "prod")]
        env: String,
        /// Use the bucket's public HTTPS link instead of the S3 API
        #[arg(long, default_value_t = false)]
        https: bool,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = Settings::from_env();
    settings.ensure_dirs()?;

    match cli.command {
        Command::Refresh {
            mode,
            years,
            drop_tables,
            check_update,
        } => {
            let mode: RefreshMode = mode.parse()?;
            let years: Option<Vec<String>> =
                years.map(|s| s.split(',').map(|y| y.trim().to_string()).collect());
            let archive = EdcArchive::new(&settings);
            let plan = plan::plan(&archive, mode, years.as_deref(), drop_tables, check_update)?;
            archive.refresh(&plan)?;
        }
        Command::Upload { env } => {
            let env: Environment = env.parse()?;
            info!("running on env {}", env);
            storage::upload_database(&settings, env)?;
        }
        Command::Download { env, https } => {
            let env: Environment = env.parse()?;
            info!("running on env {}", env);
            let transfer = if https {
                Transfer::Https
            } else {
                Transfer::ObjectStorage
            };
            storage::download_database(&settings, env, transfer)?;
        }
    }

    Ok(())
}
