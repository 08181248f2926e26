use tracing::info;

use linkedin_module::HttpLinkedInClient;
use sequencer_module::config::OutreachConfig;
use sequencer_module::{start_scheduler, OutreachScheduler, SqliteOutreachStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().init();

    let config = OutreachConfig::from_env();
    let store = SqliteOutreachStore::new(config.db_path.clone())?;
    let provider = HttpLinkedInClient::from_env()?;
    let scheduler = OutreachScheduler::new(store, provider, config);

    let mut control = start_scheduler(scheduler);
    info!("outreach worker running; press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    control.stop_and_join();
    Ok(())
}
