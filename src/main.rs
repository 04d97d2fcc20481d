// region:    --- Imports
use auction_ledger::config::Config;
use auction_ledger::database::DatabaseManager;
use auction_ledger::handlers;
use auction_ledger::ledger::AuctionLedger;
use auction_ledger::store::{LedgerStore, MemoryLedgerStore, PostgresLedgerStore};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn LedgerStore> = match config.database_url.as_deref() {
        Some(database_url) => {
            let db_manager =
                Arc::new(DatabaseManager::connect(database_url, config.max_connections).await?);

            if let Err(e) = db_manager.initialize_database(config.reset_database).await {
                error!("{:<12} --> database initialization failed: {:?}", "Main", e);
                return Err(e.into());
            }
            info!("{:<12} --> database initialized", "Main");
            Arc::new(PostgresLedgerStore::new(db_manager))
        }
        None => {
            warn!(
                "{:<12} --> DATABASE_URL not set, using the in-memory store",
                "Main"
            );
            Arc::new(MemoryLedgerStore::new())
        }
    };

    let ledger = Arc::new(AuctionLedger::new(store));
    let routes_all = handlers::router(ledger);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
