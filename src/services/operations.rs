//! Domain rules for shipment operations: voyage numbers, profit arithmetic,
//! the document-driven status machine, and the single-shot document merge.

use crate::entities::operations;
use crate::services::upload::{DocumentSlot, UploadedDocument};
use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const CURRENCIES: [&str; 3] = ["TRY", "USD", "EUR"];
pub const TRANSPORT_TYPES: [&str; 2] = ["FTL", "LTL"];

/// Lifecycle of a shipment. Advanced by document uploads, never reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    InTransit,
    TransportCompleted,
    AwaitingCarrierPayment,
    CarrierPaid,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::InTransit => "in_transit",
            OperationStatus::TransportCompleted => "transport_completed",
            OperationStatus::AwaitingCarrierPayment => "awaiting_carrier_payment",
            OperationStatus::CarrierPaid => "carrier_paid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in_transit" => Some(OperationStatus::InTransit),
            "transport_completed" => Some(OperationStatus::TransportCompleted),
            "awaiting_carrier_payment" => Some(OperationStatus::AwaitingCarrierPayment),
            "carrier_paid" => Some(OperationStatus::CarrierPaid),
            _ => None,
        }
    }

    /// The status a freshly uploaded document pushes the shipment towards,
    /// if any. Only three of the six slots drive the lifecycle.
    pub fn implied_by(slot: DocumentSlot) -> Option<Self> {
        match slot {
            DocumentSlot::DeliveryReceipt => Some(OperationStatus::TransportCompleted),
            DocumentSlot::CarrierInvoice => Some(OperationStatus::AwaitingCarrierPayment),
            DocumentSlot::PaymentReceipt => Some(OperationStatus::CarrierPaid),
            _ => None,
        }
    }
}

/// Applies the uploads in `slots` to `current`, moving only forward.
pub fn advance_status(current: OperationStatus, slots: &[DocumentSlot]) -> OperationStatus {
    slots
        .iter()
        .filter_map(|slot| OperationStatus::implied_by(*slot))
        .fold(current, std::cmp::Ord::max)
}

/// profit = sale - cost; percentage relative to cost, 0 when cost is 0.
pub fn compute_profit(freight_sale_amount: f64, vehicle_cost: f64) -> (f64, f64) {
    let profit = freight_sale_amount - vehicle_cost;
    let profit_percent = if vehicle_cost > 0.0 {
        (profit / vehicle_cost) * 100.0
    } else {
        0.0
    };
    (profit, profit_percent)
}

/// Voyage numbers look like `SF20260828-K3T9QX`: date of creation plus a
/// random six-character suffix.
pub fn generate_voyage_no() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    format!("SF{}-{}", chrono::Utc::now().format("%Y%m%d"), suffix)
}

/// Decodes the embedded document list of an operation row.
pub fn documents_of(operation: &operations::Model) -> Result<Vec<UploadedDocument>> {
    serde_json::from_value(operation.documents.clone())
        .context("operation has a malformed documents column")
}

/// The explicit merge step: appends freshly uploaded documents to the
/// existing list and computes the resulting status. The caller persists the
/// outcome in a single update after all uploads have settled.
pub struct DocumentMerge {
    pub documents: serde_json::Value,
    pub status: OperationStatus,
    pub is_active: bool,
}

pub fn merge_documents(
    operation: &operations::Model,
    new_documents: &[UploadedDocument],
) -> Result<DocumentMerge> {
    let mut documents = documents_of(operation)?;
    documents.extend(new_documents.iter().cloned());

    let current =
        OperationStatus::from_str(&operation.status).unwrap_or(OperationStatus::InTransit);
    let slots: Vec<DocumentSlot> = new_documents.iter().map(|d| d.slot).collect();
    let status = advance_status(current, &slots);

    Ok(DocumentMerge {
        documents: serde_json::to_value(&documents)?,
        status,
        // A paid shipment drops off the active list.
        is_active: operation.is_active && status != OperationStatus::CarrierPaid,
    })
}
