//! `EventPump`: one cancellable task per enabled event source, long-polling a queue and
//! fanning messages to the bound function's invocation endpoint. Mirrors the original
//! `sqs.Manager` (`StartEventSource`/`StartAllEventSources`), generalized from a direct SQS
//! client call to an HTTP call against this process's own invocation endpoint.

use std::sync::Arc;

use dashmap::DashMap;
use faas_common::EventSource;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::queue_client::QueueClient;
use crate::{ExecutorError, Result};

pub struct EventPump {
    catalog: Arc<dyn Catalog>,
    queue_client: Arc<dyn QueueClient>,
    http_client: reqwest::Client,
    /// Base URL of this process's own invocation API, e.g. `http://localhost:9050`.
    invoke_base_url: String,
    handles: DashMap<Uuid, CancellationToken>,
}

impl EventPump {
    pub fn new(catalog: Arc<dyn Catalog>, queue_client: Arc<dyn QueueClient>, invoke_base_url: String) -> Self {
        Self {
            catalog,
            queue_client,
            http_client: reqwest::Client::new(),
            invoke_base_url,
            handles: DashMap::new(),
        }
    }

    #[instrument(skip(self, event_source))]
    pub async fn start_event_source(&self, event_source: EventSource) -> Result<()> {
        let queue_name = event_source.queue_name()?.to_string();
        info!(queue = %queue_name, "Starting consumption from queue");

        let urls = self.queue_client.list_queue_urls(&queue_name).await?;
        if urls.len() != 1 {
            return Err(ExecutorError::AmbiguousQueue {
                prefix: queue_name,
                found: urls.len(),
            });
        }
        let queue_url = urls.into_iter().next().unwrap();

        let token = CancellationToken::new();
        self.handles.insert(event_source.id, token.clone());

        let queue_client = self.queue_client.clone();
        let http_client = self.http_client.clone();
        let invoke_url = format!(
            "{}/2015-03-31/functions/{}/invocations",
            self.invoke_base_url.trim_end_matches('/'),
            event_source.function_name
        );
        let batch_size = event_source.batch_size;

        tokio::spawn(async move {
            loop {
                if token.is_cancelled() {
                    return;
                }
                let messages = match queue_client.receive_messages(&queue_url, batch_size, 1).await {
                    Ok(messages) => messages,
                    Err(e) => {
                        error!(queue = %queue_url, error = %e, "error receiving messages");
                        continue;
                    }
                };

                for message in messages {
                    info!(queue = %queue_url, "Received message");
                    let envelope = match serde_json::to_vec(&message) {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            error!(error = %e, "unable to marshal queue message envelope, skipping");
                            continue;
                        }
                    };
                    let invoke_result = http_client
                        .post(&invoke_url)
                        .header("X-Amz-Invocation-Type", "Event")
                        .body(envelope)
                        .send()
                        .await;

                    match invoke_result {
                        Ok(resp) if resp.status().is_success() => {
                            if let Err(e) = queue_client.delete_message(&queue_url, &message.receipt_handle).await {
                                error!(error = %e, "unable to delete message after successful invocation");
                            }
                        }
                        Ok(resp) => {
                            warn!(status = %resp.status(), "invocation returned non-success status, leaving message for redelivery");
                        }
                        Err(e) => {
                            error!(error = %e, "unable to invoke function, leaving message for redelivery");
                        }
                    }
                }
            }
        });

        Ok(())
    }

    /// Starts every enabled event source known to the catalog. Failures on individual
    /// sources are logged and skipped.
    #[instrument(skip(self))]
    pub async fn start_all(&self) -> Result<()> {
        let sources = self.catalog.get_all_event_sources().await?;
        for source in sources.into_iter().filter(|s| s.enabled) {
            let id = source.id;
            if let Err(e) = self.start_event_source(source).await {
                error!(event_source = %id, error = %e, "unable to start event source");
            }
        }
        Ok(())
    }

    /// Cancels every running pump. Observed at the next poll-cycle boundary.
    pub fn cancel_all(&self) {
        for entry in self.handles.iter() {
            entry.value().cancel();
        }
    }
}
