//! `QueueClient`: the abstraction `EventPump` polls through, implemented against an
//! SQS-compatible local queue service (the project's `--sqs-endpoint` flag). Mirrors the
//! calls the original pump makes directly against `sqs.Client`: `ListQueues`,
//! `ReceiveMessage`, `DeleteMessage`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use aws_sdk_sqs::Client;
use serde::Serialize;

use crate::{ExecutorError, Result};

/// The provider-shaped message envelope the event pump marshals to bytes before invoking the
/// bound function, mirroring the original pump's `json.Marshal(message)` on the full SQS
/// message rather than just its body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueueMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[async_trait]
pub trait QueueClient: Send + Sync {
    async fn list_queue_urls(&self, name_prefix: &str) -> Result<Vec<String>>;
    async fn receive_messages(&self, queue_url: &str, max_messages: i32, wait_seconds: i32) -> Result<Vec<QueueMessage>>;
    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<()>;
}

pub struct SqsQueueClient {
    client: Client,
}

impl SqsQueueClient {
    pub async fn connect(endpoint: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new("us-west-2"))
            .endpoint_url(endpoint)
            .load()
            .await;
        Self {
            client: Client::new(&config),
        }
    }
}

#[async_trait]
impl QueueClient for SqsQueueClient {
    async fn list_queue_urls(&self, name_prefix: &str) -> Result<Vec<String>> {
        let output = self
            .client
            .list_queues()
            .queue_name_prefix(name_prefix)
            .send()
            .await
            .map_err(|e| ExecutorError::Internal(format!("list_queues failed for {name_prefix}: {e}")))?;
        Ok(output.queue_urls().to_vec())
    }

    async fn receive_messages(&self, queue_url: &str, max_messages: i32, wait_seconds: i32) -> Result<Vec<QueueMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_seconds)
            .send()
            .await
            .map_err(|e| ExecutorError::Internal(format!("receive_message failed for {queue_url}: {e}")))?;

        Ok(output
            .messages()
            .iter()
            .filter_map(|m| {
                Some(QueueMessage {
                    message_id: m.message_id()?.to_string(),
                    receipt_handle: m.receipt_handle()?.to_string(),
                    body: m.body()?.to_string(),
                    attributes: m
                        .attributes()
                        .map(|attrs| attrs.iter().map(|(k, v)| (k.as_str().to_string(), v.clone())).collect())
                        .unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| ExecutorError::Internal(format!("delete_message failed for {queue_url}: {e}")))?;
        Ok(())
    }
}
