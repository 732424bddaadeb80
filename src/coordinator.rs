//! The Coordinator: wires every collaborator together and drives the crawl
//! to completion (§4.9, C9).

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::error;

use crate::autoscaler::{Autoscaler, AutoscalerConfig};
use crate::credentials::Credentials;
use crate::error::S3Error;
use crate::frontier::Frontier;
use crate::listing::{ApiVersion, Lister, ListingClient};
use crate::metrics::Metrics;
use crate::resolver::EndpointResolver;
use crate::worker::Worker;
use crate::writer::{OutputFormat, OutputWriter};

const SHUTDOWN_POLL: Duration = Duration::from_secs(1);

pub struct CoordinatorConfig {
    pub bucket: String,
    pub api_version: ApiVersion,
    pub delimiter: Option<String>,
    pub encoding_type_url: bool,
    pub fetch_owner: bool,
    pub output_format: OutputFormat,
    pub autoscaler: AutoscalerConfig,
}

/// Constructs C3–C8, seeds the frontier with the bucket root, and spawns
/// the Autoscaler, the Output Writer, and an initial worker pool — then
/// blocks until the crawl drains and returns the final [`Metrics`].
pub async fn run<W>(
    credentials: Arc<Credentials>,
    config: CoordinatorConfig,
    sink: W,
) -> Result<Arc<Metrics>, S3Error>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let metrics = Arc::new(Metrics::new());
    let frontier = Arc::new(Frontier::new(metrics.clone()));
    let writer = Arc::new(OutputWriter::new());
    metrics.set_target_workers(1);

    let resolver = EndpointResolver::new(credentials.host(), credentials.port()).await?;
    let client: Arc<dyn Lister> = Arc::new(ListingClient::new(credentials, resolver));

    let (writer_shutdown_tx, writer_shutdown_rx) = oneshot::channel();
    let writer_task = {
        let writer = writer.clone();
        tokio::spawn(async move { writer.run(sink, writer_shutdown_rx).await })
    };

    let (autoscaler_shutdown_tx, autoscaler_shutdown_rx) = oneshot::channel();
    let autoscaler_task = {
        let autoscaler = Autoscaler::new(metrics.clone(), config.autoscaler);
        tokio::spawn(async move { autoscaler.run(autoscaler_shutdown_rx).await })
    };

    let mut next_worker_id = 0usize;
    let mut worker_tasks: Vec<JoinHandle<()>> = Vec::new();

    loop {
        spawn_workers_to_target(
            &metrics,
            &mut next_worker_id,
            &mut worker_tasks,
            &client,
            &frontier,
            &writer,
            &config,
        );
        worker_tasks.retain(|handle| !handle.is_finished());

        if frontier.is_empty() && metrics.active_workers() == 0 {
            break;
        }
        time::sleep(SHUTDOWN_POLL).await;
    }

    if !frontier.is_empty() {
        error!(queue_len = frontier.len(), "crawl ended with a non-empty frontier");
    }

    for handle in worker_tasks {
        let _ = handle.await;
    }
    let _ = autoscaler_shutdown_tx.send(());
    let _ = autoscaler_task.await;
    let _ = writer_shutdown_tx.send(());
    let _ = writer_task.await;

    Ok(metrics)
}

#[allow(clippy::too_many_arguments)]
fn spawn_workers_to_target(
    metrics: &Arc<Metrics>,
    next_worker_id: &mut usize,
    worker_tasks: &mut Vec<JoinHandle<()>>,
    client: &Arc<dyn Lister>,
    frontier: &Arc<Frontier>,
    writer: &Arc<OutputWriter>,
    config: &CoordinatorConfig,
) {
    while worker_tasks.len() < metrics.target_workers() {
        let worker = Worker::new(
            *next_worker_id,
            config.bucket.clone(),
            config.api_version,
            config.delimiter.clone(),
            config.encoding_type_url,
            config.fetch_owner,
            config.output_format,
            client.clone(),
            frontier.clone(),
            writer.clone(),
            metrics.clone(),
        );
        *next_worker_id += 1;
        worker_tasks.push(tokio::spawn(worker.run()));
    }
}
