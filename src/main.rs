use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use ec_auth::Authority;
use ec_catalog::Catalog;
use ec_config::{master_secret, CoordinatorConfig};
use ec_server::AppState;
use ec_store::ArtifactStore;

#[derive(Debug, Clone, Parser)]
#[command(name = "exam-coordinatord", about = "Coordinator for distributed grading of scanned paper exams")]
struct Cli {
    /// Optional JSON config file. When given, it is used verbatim instead
    /// of the other flags; combine a saved config with one-off overrides by
    /// editing the file rather than mixing the two on one command line.
    #[clap(long = "config-file")]
    config_file: Option<PathBuf>,

    #[command(flatten)]
    config: CoordinatorConfig,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config_file {
        Some(path) => match CoordinatorConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{e}");
                std::process::exit(1);
            }
        },
        None => cli.config,
    };

    if let Err(e) = run(config).await {
        log::error!("{e}");
        std::process::exit(1);
    }
}

async fn run(config: CoordinatorConfig) -> ec_types::CoordResult<()> {
    let db = ec_catalog::db::open_db(&config.catalog_db_path);

    let secret_path = config
        .catalog_db_path
        .with_file_name("master_secret.hex");
    let master_secret = master_secret::resolve(config.master_secret_hex.as_deref(), &secret_path)
        .map_err(|e| {
            log::error!("{e}");
            ec_types::CoordError::ServerError
        })?;

    let authority = Arc::new(
        Authority::new(db.clone(), master_secret)?.with_iterations(config.pbkdf2_iterations),
    );

    if let Ok(user_list) = ec_server::user_list::load_user_list(&config.user_list_path) {
        for (username, entry) in &user_list {
            authority.create_or_update_user(username, &entry.password, entry.is_admin)?;
            authority.enable_user(username, true)?;
        }
        log::info!("seeded {} users from {}", user_list.len(), config.user_list_path.display());
    } else {
        log::warn!(
            "no user list found at {}; starting with no users",
            config.user_list_path.display()
        );
    }

    let catalog = Arc::new(Catalog::new(db, authority.clone()));
    let artifacts = Arc::new(ArtifactStore::new(&config.artifact_store_root)?);

    let state = AppState::new(
        authority,
        catalog,
        artifacts,
        "exam-coordinator".to_string(),
        config.user_list_path.clone(),
    );

    ec_server::run(&config, state).await
}
