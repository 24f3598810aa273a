mod labour;
mod orders;
mod problem;
mod router;
mod sequencer;
mod telemetry;
#[cfg(test)]
mod test_support;
mod wages;

use std::net::SocketAddr;

use tailor_storage::Database;
use tailor_util::{load_env_file, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url).await?;
    database.run_migrations().await?;
    info!(stage = "app", database = %config.database_url, "database ready");

    let state = router::AppState::new(metrics, database, config.shop_timezone);

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
