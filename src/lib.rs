pub mod config;
pub mod monitor;

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use monitor::{HttpPredictionClient, MonitorEngine, VitalSnapshot};

/// Drive the engine from stdin change events and stream every published
/// view to stdout as JSON lines.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    // All engine work runs cooperatively on one thread.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve_stdin())
}

async fn serve_stdin() -> Result<(), Box<dyn std::error::Error>> {
    let prediction_config = config::PredictionConfig::from_env();
    tracing::info!(url = %prediction_config.predict_url, "Using scoring service");

    let client = HttpPredictionClient::new(&prediction_config)?;
    let engine = MonitorEngine::new(Arc::new(client), VitalSnapshot::baseline());

    let mut views = engine.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            let view = views.borrow_and_update().clone();
            match serde_json::to_string(&*view) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::error!(error = %e, "Cannot serialize view"),
            }
            if views.changed().await.is_err() {
                break;
            }
        }
    });

    // Initial request, as the dashboard does on mount.
    engine.on_vitals_changed(VitalSnapshot::baseline())?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match monitor::parse_change(&line).and_then(|(kind, value)| engine.update_vital(kind, value)) {
            Ok(task) => tracing::debug!(generation = task.generation(), "Change accepted"),
            Err(e) => tracing::warn!(input = %line, error = %e, "Ignoring change event"),
        }
    }

    // The printer ends once in-flight predictions finish and the last
    // engine handle is gone.
    tracing::info!("Input closed, waiting for in-flight predictions");
    drop(engine);
    printer.await?;
    Ok(())
}
