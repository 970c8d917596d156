use crate::models::AttachmentRef;
use crate::services::{Delivery, DeliveryError, MediaError, ObjectStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

/// Errors that fail a photo batch as a whole
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("Attachment fetch failed: {0}")]
    Fetch(#[from] DeliveryError),

    #[error("Object store write failed: {0}")]
    Store(#[from] MediaError),
}

/// Outcome of submitting one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Singleton attachment, materialized immediately.
    Finalized(Vec<String>),
    /// Appended to an in-flight batch; the batch resolves through the
    /// event channel once the quiet period elapses.
    Buffered { pending: usize },
}

/// A finalized (or failed) batch, delivered to the intake flow.
#[derive(Debug)]
pub struct BatchEvent {
    pub owner_id: String,
    pub result: Result<Vec<String>, AggregatorError>,
}

type BatchKey = (String, String);

struct PendingBatch {
    attachments: Vec<AttachmentRef>,
    /// Bumped on every submission; only the sleeper holding the latest
    /// sequence may finalize, which is what restarts the quiet period.
    seq: u64,
}

/// Buffers photo attachments per (owner, batch id) and coalesces an album
/// sent as a burst into one ordered batch of stored object names.
///
/// Every submission restarts a quiet-period timer; when the timer fires
/// with no later arrivals, the batch is materialized: each attachment is
/// fetched from the transport and persisted as a distinct object, in
/// arrival order. Finalization is exactly-once per batch: the in-flight
/// entry is removed under the map lock before any I/O starts, so a racing
/// timer or manual flush observes an empty slot and no-ops. A failed fetch
/// or store discards the whole batch, so the consumer never sees a partial
/// photo set.
pub struct PhotoAggregator {
    delivery: Arc<dyn Delivery>,
    media: Arc<dyn ObjectStore>,
    bucket: String,
    quiet_period: Duration,
    batches: Arc<Mutex<HashMap<BatchKey, PendingBatch>>>,
    events: mpsc::Sender<BatchEvent>,
}

impl PhotoAggregator {
    /// Create an aggregator and the receiving end of its batch events.
    pub fn new(
        delivery: Arc<dyn Delivery>,
        media: Arc<dyn ObjectStore>,
        bucket: String,
        quiet_period: Duration,
    ) -> (Arc<Self>, mpsc::Receiver<BatchEvent>) {
        let (tx, rx) = mpsc::channel(64);
        let aggregator = Arc::new(Self {
            delivery,
            media,
            bucket,
            quiet_period,
            batches: Arc::new(Mutex::new(HashMap::new())),
            events: tx,
        });
        (aggregator, rx)
    }

    /// Submit one attachment.
    ///
    /// Without a batch id the attachment is a singleton: materialized right
    /// away and returned to the caller. With a batch id it joins the
    /// in-flight batch for (owner, id) and the quiet-period timer restarts.
    pub async fn submit(
        self: &Arc<Self>,
        owner_id: &str,
        batch_id: Option<&str>,
        attachment: AttachmentRef,
    ) -> Result<SubmitOutcome, AggregatorError> {
        let Some(batch_id) = batch_id else {
            let names = self.materialize(&[attachment]).await?;
            return Ok(SubmitOutcome::Finalized(names));
        };

        let key: BatchKey = (owner_id.to_string(), batch_id.to_string());
        let seq;
        let pending;
        {
            let mut batches = self.batches.lock().await;
            let entry = batches.entry(key.clone()).or_insert_with(|| PendingBatch {
                attachments: Vec::new(),
                seq: 0,
            });
            entry.attachments.push(attachment);
            entry.seq += 1;
            seq = entry.seq;
            pending = entry.attachments.len();
        }

        let aggregator = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(aggregator.quiet_period).await;
            aggregator.finalize_if_current(key, seq).await;
        });

        tracing::debug!(
            "Buffered attachment {} of batch {} for user {}",
            pending,
            batch_id,
            owner_id
        );

        Ok(SubmitOutcome::Buffered { pending })
    }

    /// Force-finalize an in-flight batch without waiting out the quiet
    /// period. A no-op when the batch is unknown or already finalized.
    pub async fn flush(self: &Arc<Self>, owner_id: &str, batch_id: &str) {
        let key: BatchKey = (owner_id.to_string(), batch_id.to_string());
        let taken = self.batches.lock().await.remove(&key);
        if let Some(batch) = taken {
            self.emit(key.0, batch.attachments).await;
        }
    }

    async fn finalize_if_current(self: &Arc<Self>, key: BatchKey, seq: u64) {
        let taken = {
            let mut batches = self.batches.lock().await;
            match batches.get(&key) {
                // A later submission restarted the timer; that sleeper owns
                // the batch now.
                Some(entry) if entry.seq != seq => None,
                Some(_) => batches.remove(&key),
                None => None,
            }
        };

        if let Some(batch) = taken {
            self.emit(key.0, batch.attachments).await;
        }
    }

    async fn emit(self: &Arc<Self>, owner_id: String, attachments: Vec<AttachmentRef>) {
        let count = attachments.len();
        let result = self.materialize(&attachments).await;
        match &result {
            Ok(names) => tracing::info!(
                "Finalized photo batch for user {}: {} objects",
                owner_id,
                names.len()
            ),
            Err(e) => tracing::warn!(
                "Photo batch of {} for user {} failed: {}",
                count,
                owner_id,
                e
            ),
        }
        if self
            .events
            .send(BatchEvent { owner_id, result })
            .await
            .is_err()
        {
            tracing::error!("Batch event receiver dropped");
        }
    }

    /// Fetch and persist every attachment in arrival order. Fails atomically:
    /// the first error aborts the batch and nothing is handed downstream.
    async fn materialize(&self, attachments: &[AttachmentRef]) -> Result<Vec<String>, AggregatorError> {
        let mut names = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            let bytes = self.delivery.fetch_attachment(attachment).await?;
            let name = object_name(attachment);
            self.media.put(&self.bucket, &name, bytes).await?;
            names.push(name);
        }
        Ok(names)
    }
}

fn object_name(attachment: &AttachmentRef) -> String {
    format!("{}.jpg", attachment.file_id)
}
