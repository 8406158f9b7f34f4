use application::config::InteractionConfig;
use infra::config::AppConfigImpl;
use log::{error, info};
use tally::{init_logging, Adapters, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = AppConfigImpl::load()?;
    init_logging(&cfg.log())?;

    let db = match AppState::init_db(&cfg).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e.into());
        }
    };

    let app_state = AppState::new(cfg, Adapters::postgres(db)).await;
    info!(
        "Interaction service ready, play throttle window {}s",
        app_state.app_cfg.play_throttle_window().num_seconds()
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    app_state.shutdown().await;
    Ok(())
}
