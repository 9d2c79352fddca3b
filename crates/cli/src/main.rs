mod cli;
mod signals;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use faasr_monitor::{InitializationError, MonitorConfig, WorkflowMonitorHandle};
use faasr_store::{HttpObjectStoreBackend, ObjectStoreBackend};
use faasr_types::{FunctionStatus, WorkflowPayload};

use crate::cli::Cli;
use crate::signals::spawn_signal_handler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let text = std::fs::read_to_string(&cli.workflow_file)
        .with_context(|| format!("failed to read workflow payload file {:?}", cli.workflow_file))?;
    let payload = WorkflowPayload::from_json(&text).map_err(InitializationError::from)?;
    let data_store = payload.default_data_store_config().map_err(InitializationError::from)?;

    let backend: Arc<dyn ObjectStoreBackend> =
        Arc::new(HttpObjectStoreBackend::new(reqwest::Client::new(), data_store));

    let config = MonitorConfig {
        check_interval: Duration::from_secs(cli.check_interval),
        timeout: Duration::from_secs(cli.timeout),
        stream_logs: !cli.no_stream_logs,
        ..MonitorConfig::default()
    };

    let monitor = WorkflowMonitorHandle::start(&payload, backend, config).await?;
    spawn_signal_handler(monitor.clone(), Duration::from_secs(10));

    monitor.wait_until_complete().await;

    let statuses = monitor.get_function_statuses().await;
    let mut names: Vec<_> = statuses.keys().cloned().collect();
    names.sort();
    for name in &names {
        println!("{name}: {:?}", statuses[name]);
    }

    let success = statuses
        .values()
        .all(|s| matches!(s, FunctionStatus::Completed | FunctionStatus::NotInvoked));

    std::process::exit(if success { 0 } else { 1 });
}
