//! Bounded-concurrency upload coordinator for shipment documents.
//!
//! A shipment edit can attach up to six PDF documents at once. The
//! coordinator runs those transfers against the object store with a hard
//! concurrency ceiling, emits progress events on a channel the caller
//! subscribes to, and reports the outcome of every task as a value: a
//! failed slot never aborts its siblings, and the returned report always
//! accounts for every submitted task.

use crate::config::AppConfig;
use crate::services::storage::StorageService;
use crate::utils::validation::{is_pdf, sanitize_filename, validate_file_size};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use utoipa::ToSchema;
use uuid::Uuid;

/// The fixed set of document slots on a shipment form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSlot {
    DeliveryReceipt,
    CarrierInvoice,
    CustomerInvoice,
    PaymentReceipt,
    HandlingDocument,
    PorterageDocument,
}

impl DocumentSlot {
    pub const ALL: [DocumentSlot; 6] = [
        DocumentSlot::DeliveryReceipt,
        DocumentSlot::CarrierInvoice,
        DocumentSlot::CustomerInvoice,
        DocumentSlot::PaymentReceipt,
        DocumentSlot::HandlingDocument,
        DocumentSlot::PorterageDocument,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            DocumentSlot::DeliveryReceipt => "delivery_receipt",
            DocumentSlot::CarrierInvoice => "carrier_invoice",
            DocumentSlot::CustomerInvoice => "customer_invoice",
            DocumentSlot::PaymentReceipt => "payment_receipt",
            DocumentSlot::HandlingDocument => "handling_document",
            DocumentSlot::PorterageDocument => "porterage_document",
        }
    }

    /// Human-readable label used in user-facing failure messages.
    pub fn label(&self) -> &'static str {
        match self {
            DocumentSlot::DeliveryReceipt => "Teslim Evrakı",
            DocumentSlot::CarrierInvoice => "Nakliyeci Faturası",
            DocumentSlot::CustomerInvoice => "Müşteri Faturası",
            DocumentSlot::PaymentReceipt => "Ödeme Dekontu",
            DocumentSlot::HandlingDocument => "Elleçleme Belgesi",
            DocumentSlot::PorterageDocument => "Hammaliye Belgesi",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.key() == key)
    }
}

/// One pending upload, built from a filled document slot on a submitted form.
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub slot: DocumentSlot,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
    pub reference_no: Option<String>,
}

/// Ephemeral progress snapshot for one in-flight task. Best-effort display
/// data only; carries no correctness obligation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProgressEvent {
    pub slot: DocumentSlot,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    pub percent: u8,
    pub throughput_bps: f64,
    pub eta_secs: Option<f64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum UploadErrorKind {
    /// Only PDFs are accepted; rejected before any transfer started.
    RejectedType,
    /// Filename failed sanitisation; rejected before any transfer started.
    RejectedName,
    /// Payload exceeds the configured size cap; rejected before any transfer.
    TooLarge,
    /// The transfer did not finish within the per-task deadline. The
    /// underlying future is dropped, so the transfer is actually cancelled.
    Timeout,
    /// The storage backend reported an error.
    Storage(String),
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadFailure {
    pub slot: DocumentSlot,
    pub label: &'static str,
    pub kind: UploadErrorKind,
}

impl UploadFailure {
    fn new(slot: DocumentSlot, kind: UploadErrorKind) -> Self {
        Self {
            slot,
            label: slot.label(),
            kind,
        }
    }

    /// One-line message suitable for a user notification.
    pub fn message(&self) -> String {
        match &self.kind {
            UploadErrorKind::RejectedType => {
                format!("{}: yalnızca PDF yüklenebilir", self.label)
            }
            UploadErrorKind::RejectedName => format!("{}: geçersiz dosya adı", self.label),
            UploadErrorKind::TooLarge => format!("{}: dosya çok büyük", self.label),
            UploadErrorKind::Timeout => format!("{} yükleme zaman aşımına uğradı", self.label),
            UploadErrorKind::Storage(e) => format!("{} yüklenemedi: {}", self.label, e),
        }
    }
}

/// A successfully stored document, as persisted on the shipment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UploadedDocument {
    pub id: Uuid,
    pub slot: DocumentSlot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_no: Option<String>,
    pub file_name: String,
    pub file_url: String,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: String,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct UploadReport {
    pub uploaded: Vec<UploadedDocument>,
    pub failed: Vec<UploadFailure>,
}

impl UploadReport {
    /// uploaded + failed always equals the number of submitted tasks.
    pub fn total(&self) -> usize {
        self.uploaded.len() + self.failed.len()
    }
}

pub struct UploadCoordinator {
    storage: Arc<dyn StorageService>,
    concurrency: usize,
    task_timeout: Duration,
    max_file_size: usize,
}

impl UploadCoordinator {
    pub fn new(storage: Arc<dyn StorageService>, config: &AppConfig) -> Self {
        Self {
            storage,
            concurrency: config.upload_concurrency.max(1),
            task_timeout: Duration::from_secs(config.upload_timeout_secs),
            max_file_size: config.max_file_size,
        }
    }

    /// Runs every task to completion and returns the settled report.
    ///
    /// Tasks that fail pre-flight checks never occupy a concurrency slot.
    /// The rest start in submission order with at most `concurrency` in
    /// flight; completion order is whatever the transfers dictate. Progress
    /// events, when a sender is supplied, report cumulative bytes per slot
    /// with non-decreasing values.
    pub async fn run(
        &self,
        record_type: &str,
        record_id: &str,
        uploaded_by: &str,
        tasks: Vec<UploadTask>,
        progress: Option<mpsc::UnboundedSender<ProgressEvent>>,
    ) -> UploadReport {
        let mut report = UploadReport::default();
        let mut runnable = Vec::new();

        for task in tasks {
            match self.preflight(&task) {
                Ok(()) => runnable.push(task),
                Err(failure) => {
                    tracing::warn!(
                        slot = failure.slot.key(),
                        "⛔ Document rejected before upload: {}",
                        failure.message()
                    );
                    report.failed.push(failure);
                }
            }
        }

        let outcomes: Vec<Result<UploadedDocument, UploadFailure>> =
            futures::stream::iter(runnable.into_iter().map(|task| {
                self.run_one(record_type, record_id, uploaded_by, task, progress.clone())
            }))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Ok(doc) => report.uploaded.push(doc),
                Err(failure) => report.failed.push(failure),
            }
        }

        report
    }

    fn preflight(&self, task: &UploadTask) -> Result<(), UploadFailure> {
        if !is_pdf(task.content_type.as_deref(), &task.data) {
            return Err(UploadFailure::new(task.slot, UploadErrorKind::RejectedType));
        }
        if validate_file_size(task.data.len(), self.max_file_size).is_err() {
            return Err(UploadFailure::new(task.slot, UploadErrorKind::TooLarge));
        }
        if sanitize_filename(&task.file_name).is_err() {
            return Err(UploadFailure::new(task.slot, UploadErrorKind::RejectedName));
        }
        Ok(())
    }

    async fn run_one(
        &self,
        record_type: &str,
        record_id: &str,
        uploaded_by: &str,
        task: UploadTask,
        progress: Option<mpsc::UnboundedSender<ProgressEvent>>,
    ) -> Result<UploadedDocument, UploadFailure> {
        let slot = task.slot;
        // Preflight already vetted the name; sanitising twice is harmless.
        let file_name = sanitize_filename(&task.file_name)
            .map_err(|_| UploadFailure::new(slot, UploadErrorKind::RejectedName))?;

        let key = format!(
            "{}/{}/{}/{}_{}",
            record_type,
            record_id,
            slot.key(),
            Utc::now().timestamp_millis(),
            file_name
        );

        let start = Instant::now();
        let on_progress = move |transferred: u64, total: u64| {
            if let Some(tx) = &progress {
                let elapsed = start.elapsed().as_secs_f64().max(0.001);
                let throughput_bps = transferred as f64 / elapsed;
                let remaining = total.saturating_sub(transferred);
                let eta_secs = if throughput_bps > 0.0 {
                    Some(remaining as f64 / throughput_bps)
                } else {
                    None
                };
                // Clamp so a backend over-reporting bytes cannot push the
                // percentage past 100.
                let percent = if total == 0 {
                    100
                } else {
                    (transferred.saturating_mul(100) / total).min(100) as u8
                };
                let _ = tx.send(ProgressEvent {
                    slot,
                    bytes_transferred: transferred,
                    total_bytes: total,
                    percent,
                    throughput_bps,
                    eta_secs,
                });
            }
        };

        let upload = self.storage.put_object(
            &key,
            task.data,
            mime::APPLICATION_PDF.as_ref(),
            Some(&on_progress),
        );

        match tokio::time::timeout(self.task_timeout, upload).await {
            // Dropping the future stops our side of the transfer, so a
            // timed-out slot cannot complete behind our back. Any multipart
            // session left open on the backend is aborted explicitly.
            Err(_) => {
                tracing::warn!(
                    slot = slot.key(),
                    "⏱️ Upload timed out after {:?}",
                    self.task_timeout
                );
                if let Err(e) = self.storage.abort_pending_upload(&key).await {
                    tracing::warn!(key = %key, "Failed to clean up timed-out upload: {:#}", e);
                }
                Err(UploadFailure::new(slot, UploadErrorKind::Timeout))
            }
            Ok(Err(e)) => {
                tracing::error!(slot = slot.key(), "❌ Upload failed: {:#}", e);
                Err(UploadFailure::new(
                    slot,
                    UploadErrorKind::Storage(e.to_string()),
                ))
            }
            Ok(Ok(file_url)) => {
                tracing::info!(slot = slot.key(), key = %key, "✅ Document stored");
                Ok(UploadedDocument {
                    id: Uuid::new_v4(),
                    slot,
                    reference_no: task.reference_no,
                    file_name,
                    file_url,
                    uploaded_at: Utc::now(),
                    uploaded_by: uploaded_by.to_string(),
                })
            }
        }
    }
}
