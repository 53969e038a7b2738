use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use propsignal::config::Config;
use propsignal::error::Result;
use propsignal::scanner::AlertScanner;
use propsignal::store::{LogNotifier, SqliteStore};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}", cfg.db_path)).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    let store = Arc::new(SqliteStore::new(pool));
    let scanner = AlertScanner::new(
        store.clone(),
        store.clone(),
        store,
        Arc::new(LogNotifier),
    );

    info!(
        "Alert scanner starting: one pass every {}s",
        cfg.scan_interval_secs
    );
    scanner.run(cfg.scan_interval_secs).await;

    Ok(())
}
