use std::sync::Arc;

use scan_station::{print_banner, setup_environment, Console, ConsoleFeedback, StationState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Environment (.env, config, logging)
    let (config, _log_guard) = setup_environment()?;

    print_banner();

    tracing::info!("Scan station starting...");

    // 2. State restore + background workers
    let (state, tasks) = StationState::initialize(&config, Arc::new(ConsoleFeedback)).await?;

    // 3. Input loop until /quit, EOF or a signal
    let console = Console::new(state);
    if let Err(e) = console.run().await {
        tracing::error!("Console error: {}", e);
        tasks.shutdown().await;
        return Err(e.into());
    }

    // 4. Stop the workers before the store drops
    tasks.shutdown().await;

    tracing::info!("Scan station stopped");
    Ok(())
}
