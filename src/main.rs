use paper_exchange::api::routes::{AppState, app_router};
use paper_exchange::config::Config;
use paper_exchange::ledger::Ledger;
use paper_exchange::oracle::{HttpPriceOracle, PriceOracle, StaticOracle};
use paper_exchange::persistence;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let oracle: Arc<dyn PriceOracle> = match &config.oracle_url {
        Some(url) => Arc::new(HttpPriceOracle::new(url.clone())),
        None => {
            warn!("ORACLE_URL not set, using the empty static price table");
            Arc::new(StaticOracle::new())
        }
    };

    let db = match &config.database_url {
        Some(url) => match persistence::create_pool_and_migrate(url).await {
            Ok(pool) => Some(pool),
            Err(err) => {
                error!(%err, "failed to connect to the database");
                return ExitCode::FAILURE;
            }
        },
        None => {
            warn!("DATABASE_URL not set, running without persistence");
            None
        }
    };

    let ledger = Arc::new(Ledger::new(
        oracle,
        db,
        config.starting_balance,
        config.oracle_timeout,
    ));
    if let Err(err) = ledger.hydrate().await {
        error!(%err, "failed to hydrate ledger from store");
        return ExitCode::FAILURE;
    }

    let state = AppState {
        ledger,
        jwt_secret: config.jwt_secret.clone(),
    };
    let app = app_router(state);
    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, addr = %config.bind_addr, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    info!(addr = %config.bind_addr, "paper exchange listening");
    if let Err(err) = axum::serve(listener, app).await {
        error!(%err, "server error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
