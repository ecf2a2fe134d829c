use crate::api::error::AppError;
use crate::entities::{operations, prelude::*, vehicles};
use crate::services::operations::{
    CURRENCIES, OperationStatus, TRANSPORT_TYPES, compute_profit, documents_of,
    generate_voyage_no, merge_documents,
};
use crate::services::upload::{
    DocumentSlot, ProgressEvent, UploadFailure, UploadTask, UploadedDocument,
};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Deserialize)]
pub struct OperationListQuery {
    /// "active" (default), "archive" or "all"
    pub state: Option<String>,
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct CreateOperationRequest {
    pub carrier_id: String,
    pub vehicle_id: Option<String>,
    /// "FTL" or "LTL", defaults to "FTL"
    pub transport_type: Option<String>,
    pub trailer_plate: Option<String>,

    pub loading_date: Option<DateTime<Utc>>,
    pub unloading_date: Option<DateTime<Utc>>,
    pub order_date: Option<DateTime<Utc>>,

    #[validate(length(min = 1, max = 200))]
    pub origin: String,
    #[validate(length(min = 1, max = 200))]
    pub destination: String,
    #[serde(default)]
    pub loading_address: String,
    #[serde(default)]
    pub delivery_address: String,

    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub shipper: String,
    #[serde(default)]
    pub consignee: String,
    #[serde(default)]
    pub supplier: String,

    #[serde(default)]
    pub order_no: String,
    #[serde(default)]
    pub waybill_no: String,
    #[serde(default)]
    pub invoice_no: String,

    #[serde(default)]
    pub quantity: i32,
    #[serde(default)]
    pub weight_kg: f64,
    #[serde(default)]
    pub volumetric_weight: f64,
    #[serde(default)]
    pub cargo_description: String,
    #[serde(default)]
    pub goods_value: f64,

    #[serde(default)]
    pub total_amount: f64,
    /// "TRY", "USD" or "EUR", defaults to "TRY"
    pub currency: Option<String>,
    #[serde(default)]
    pub payment_term_days: i32,
    #[serde(default)]
    pub vehicle_cost: f64,
    #[serde(default)]
    pub freight_sale_amount: f64,

    #[serde(default)]
    pub driver_name: String,
    #[serde(default)]
    pub driver_phone: String,
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct UpdateOperationRequest {
    pub carrier_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub transport_type: Option<String>,
    pub trailer_plate: Option<String>,

    pub loading_date: Option<DateTime<Utc>>,
    pub unloading_date: Option<DateTime<Utc>>,
    pub order_date: Option<DateTime<Utc>>,

    #[validate(length(min = 1, max = 200))]
    pub origin: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub destination: Option<String>,
    pub loading_address: Option<String>,
    pub delivery_address: Option<String>,

    pub customer_name: Option<String>,
    pub shipper: Option<String>,
    pub consignee: Option<String>,
    pub supplier: Option<String>,

    pub order_no: Option<String>,
    pub waybill_no: Option<String>,
    pub invoice_no: Option<String>,

    pub quantity: Option<i32>,
    pub weight_kg: Option<f64>,
    pub volumetric_weight: Option<f64>,
    pub cargo_description: Option<String>,
    pub goods_value: Option<f64>,

    pub total_amount: Option<f64>,
    pub currency: Option<String>,
    pub payment_term_days: Option<i32>,
    pub vehicle_cost: Option<f64>,
    pub freight_sale_amount: Option<f64>,

    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,

    pub is_active: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct FailedUpload {
    pub slot: DocumentSlot,
    pub label: &'static str,
    pub message: String,
}

impl From<UploadFailure> for FailedUpload {
    fn from(f: UploadFailure) -> Self {
        let message = f.message();
        Self {
            slot: f.slot,
            label: f.label,
            message,
        }
    }
}

/// Outcome of a document batch. Always 200: per-slot failures are data,
/// not transport errors.
#[derive(Serialize, ToSchema)]
pub struct DocumentUploadResponse {
    pub uploaded: Vec<UploadedDocument>,
    pub failed: Vec<FailedUpload>,
    pub status: OperationStatus,
    pub is_active: bool,
}

fn check_currency(currency: &str) -> Result<(), AppError> {
    if CURRENCIES.contains(&currency) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Unknown currency: {}",
            currency
        )))
    }
}

fn check_transport_type(transport_type: &str) -> Result<(), AppError> {
    if TRANSPORT_TYPES.contains(&transport_type) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Unknown transport type: {}",
            transport_type
        )))
    }
}

/// Resolves the requested vehicle against the carrier's fleet.
async fn resolve_vehicle(
    db: &sea_orm::DatabaseConnection,
    carrier_id: &str,
    vehicle_id: Option<&str>,
) -> Result<Option<vehicles::Model>, AppError> {
    match vehicle_id {
        Some(vehicle_id) => {
            let vehicle = Vehicles::find_by_id(vehicle_id)
                .filter(vehicles::Column::CarrierId.eq(carrier_id))
                .one(db)
                .await?
                .ok_or_else(|| {
                    AppError::BadRequest("Vehicle does not belong to this carrier".to_string())
                })?;
            Ok(Some(vehicle))
        }
        None => Ok(None),
    }
}

#[utoipa::path(
    get,
    path = "/operations",
    params(
        ("state" = Option<String>, Query, description = "active (default), archive or all")
    ),
    responses(
        (status = 200, description = "Shipment list", body = [crate::entities::operations::Model])
    ),
    security(("jwt" = [])),
    tag = "operations"
)]
pub async fn list_operations(
    State(state): State<crate::AppState>,
    Query(query): Query<OperationListQuery>,
) -> Result<Json<Vec<operations::Model>>, AppError> {
    let mut find = Operations::find().order_by_desc(operations::Column::CreatedAt);

    match query.state.as_deref().unwrap_or("active") {
        "active" => find = find.filter(operations::Column::IsActive.eq(true)),
        "archive" => find = find.filter(operations::Column::IsActive.eq(false)),
        "all" => {}
        other => {
            return Err(AppError::BadRequest(format!(
                "Unknown state filter: {}",
                other
            )));
        }
    }

    let operations = find.all(&state.db).await?;
    Ok(Json(operations))
}

#[utoipa::path(
    post,
    path = "/operations",
    request_body = CreateOperationRequest,
    responses(
        (status = 200, description = "Shipment created", body = crate::entities::operations::Model),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Carrier not found")
    ),
    security(("jwt" = [])),
    tag = "operations"
)]
pub async fn create_operation(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateOperationRequest>,
) -> Result<Json<operations::Model>, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let transport_type = req.transport_type.unwrap_or_else(|| "FTL".to_string());
    check_transport_type(&transport_type)?;
    let currency = req.currency.unwrap_or_else(|| "TRY".to_string());
    check_currency(&currency)?;

    let carrier = Carriers::find_by_id(&req.carrier_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Carrier not found".to_string()))?;

    let vehicle = resolve_vehicle(&state.db, &carrier.id, req.vehicle_id.as_deref()).await?;

    let (profit, profit_percent) = compute_profit(req.freight_sale_amount, req.vehicle_cost);

    let now = Utc::now();
    let operation = operations::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        voyage_no: Set(generate_voyage_no()),
        transport_type: Set(transport_type),
        carrier_id: Set(carrier.id.clone()),
        carrier_name: Set(carrier.company_name.clone()),
        vehicle_id: Set(vehicle.as_ref().map(|v| v.id.clone())),
        vehicle_plate: Set(vehicle.as_ref().map(|v| v.plate.clone())),
        vehicle_type: Set(vehicle.as_ref().map(|v| v.vehicle_type.clone())),
        trailer_plate: Set(req.trailer_plate),
        loading_date: Set(req.loading_date.unwrap_or(now)),
        unloading_date: Set(req.unloading_date.unwrap_or(now)),
        order_date: Set(req.order_date.unwrap_or(now)),
        origin: Set(req.origin),
        destination: Set(req.destination),
        loading_address: Set(req.loading_address),
        delivery_address: Set(req.delivery_address),
        customer_name: Set(req.customer_name),
        shipper: Set(req.shipper),
        consignee: Set(req.consignee),
        supplier: Set(req.supplier),
        order_no: Set(req.order_no),
        waybill_no: Set(req.waybill_no),
        invoice_no: Set(req.invoice_no),
        quantity: Set(req.quantity),
        weight_kg: Set(req.weight_kg),
        volumetric_weight: Set(req.volumetric_weight),
        cargo_description: Set(req.cargo_description),
        goods_value: Set(req.goods_value),
        total_amount: Set(req.total_amount),
        currency: Set(currency),
        payment_term_days: Set(req.payment_term_days),
        vehicle_cost: Set(req.vehicle_cost),
        freight_sale_amount: Set(req.freight_sale_amount),
        profit: Set(profit),
        profit_percent: Set(profit_percent),
        driver_name: Set(req.driver_name),
        driver_phone: Set(req.driver_phone),
        status: Set(OperationStatus::InTransit.as_str().to_string()),
        documents: Set(serde_json::json!([])),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        created_by: Set(claims.sub.clone()),
    };
    let operation = operation.insert(&state.db).await?;

    tracing::info!(
        voyage_no = %operation.voyage_no,
        carrier = %operation.carrier_name,
        "🚛 Shipment created"
    );

    Ok(Json(operation))
}

#[utoipa::path(
    get,
    path = "/operations/{id}",
    responses(
        (status = 200, description = "Shipment detail", body = crate::entities::operations::Model),
        (status = 404, description = "Shipment not found")
    ),
    security(("jwt" = [])),
    tag = "operations"
)]
pub async fn get_operation(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<Json<operations::Model>, AppError> {
    let operation = Operations::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Shipment not found".to_string()))?;

    Ok(Json(operation))
}

#[utoipa::path(
    put,
    path = "/operations/{id}",
    request_body = UpdateOperationRequest,
    responses(
        (status = 200, description = "Shipment updated", body = crate::entities::operations::Model),
        (status = 404, description = "Shipment not found")
    ),
    security(("jwt" = [])),
    tag = "operations"
)]
pub async fn update_operation(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateOperationRequest>,
) -> Result<Json<operations::Model>, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    if let Some(transport_type) = &req.transport_type {
        check_transport_type(transport_type)?;
    }
    if let Some(currency) = &req.currency {
        check_currency(currency)?;
    }

    let operation = Operations::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Shipment not found".to_string()))?;

    // Profit is recomputed from the resulting amounts, never accepted
    // from the client.
    let sale = req
        .freight_sale_amount
        .unwrap_or(operation.freight_sale_amount);
    let cost = req.vehicle_cost.unwrap_or(operation.vehicle_cost);
    let (profit, profit_percent) = compute_profit(sale, cost);

    let carrier_id = req
        .carrier_id
        .clone()
        .unwrap_or_else(|| operation.carrier_id.clone());

    let mut active: operations::ActiveModel = operation.into();

    if let Some(new_carrier_id) = req.carrier_id {
        let carrier = Carriers::find_by_id(&new_carrier_id)
            .one(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Carrier not found".to_string()))?;
        active.carrier_id = Set(carrier.id);
        active.carrier_name = Set(carrier.company_name);
        // Vehicle linkage from the previous carrier no longer applies.
        active.vehicle_id = Set(None);
        active.vehicle_plate = Set(None);
        active.vehicle_type = Set(None);
    }
    if let Some(vehicle_id) = req.vehicle_id {
        let vehicle = resolve_vehicle(&state.db, &carrier_id, Some(&vehicle_id)).await?;
        active.vehicle_id = Set(vehicle.as_ref().map(|v| v.id.clone()));
        active.vehicle_plate = Set(vehicle.as_ref().map(|v| v.plate.clone()));
        active.vehicle_type = Set(vehicle.as_ref().map(|v| v.vehicle_type.clone()));
    }
    if let Some(v) = req.transport_type {
        active.transport_type = Set(v);
    }
    if let Some(v) = req.trailer_plate {
        active.trailer_plate = Set(Some(v));
    }
    if let Some(v) = req.loading_date {
        active.loading_date = Set(v);
    }
    if let Some(v) = req.unloading_date {
        active.unloading_date = Set(v);
    }
    if let Some(v) = req.order_date {
        active.order_date = Set(v);
    }
    if let Some(v) = req.origin {
        active.origin = Set(v);
    }
    if let Some(v) = req.destination {
        active.destination = Set(v);
    }
    if let Some(v) = req.loading_address {
        active.loading_address = Set(v);
    }
    if let Some(v) = req.delivery_address {
        active.delivery_address = Set(v);
    }
    if let Some(v) = req.customer_name {
        active.customer_name = Set(v);
    }
    if let Some(v) = req.shipper {
        active.shipper = Set(v);
    }
    if let Some(v) = req.consignee {
        active.consignee = Set(v);
    }
    if let Some(v) = req.supplier {
        active.supplier = Set(v);
    }
    if let Some(v) = req.order_no {
        active.order_no = Set(v);
    }
    if let Some(v) = req.waybill_no {
        active.waybill_no = Set(v);
    }
    if let Some(v) = req.invoice_no {
        active.invoice_no = Set(v);
    }
    if let Some(v) = req.quantity {
        active.quantity = Set(v);
    }
    if let Some(v) = req.weight_kg {
        active.weight_kg = Set(v);
    }
    if let Some(v) = req.volumetric_weight {
        active.volumetric_weight = Set(v);
    }
    if let Some(v) = req.cargo_description {
        active.cargo_description = Set(v);
    }
    if let Some(v) = req.goods_value {
        active.goods_value = Set(v);
    }
    if let Some(v) = req.total_amount {
        active.total_amount = Set(v);
    }
    if let Some(v) = req.currency {
        active.currency = Set(v);
    }
    if let Some(v) = req.payment_term_days {
        active.payment_term_days = Set(v);
    }
    if let Some(v) = req.vehicle_cost {
        active.vehicle_cost = Set(v);
    }
    if let Some(v) = req.freight_sale_amount {
        active.freight_sale_amount = Set(v);
    }
    if let Some(v) = req.driver_name {
        active.driver_name = Set(v);
    }
    if let Some(v) = req.driver_phone {
        active.driver_phone = Set(v);
    }
    if let Some(v) = req.is_active {
        active.is_active = Set(v);
    }
    active.profit = Set(profit);
    active.profit_percent = Set(profit_percent);
    active.updated_at = Set(Utc::now());

    let operation = active.update(&state.db).await?;
    Ok(Json(operation))
}

#[utoipa::path(
    delete,
    path = "/operations/{id}",
    responses(
        (status = 200, description = "Shipment deleted"),
        (status = 404, description = "Shipment not found")
    ),
    security(("jwt" = [])),
    tag = "operations"
)]
pub async fn delete_operation(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let operation = Operations::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Shipment not found".to_string()))?;

    // Stored documents are removed best-effort; the row deletion is what
    // must not fail silently.
    if let Ok(documents) = documents_of(&operation) {
        for doc in &documents {
            if let Some((_, key)) = doc.file_url.split_once('/') {
                if let Err(e) = state.storage.delete_object(key).await {
                    tracing::warn!(key = %key, "Failed to delete stored document: {:#}", e);
                }
            }
        }
    }

    operation.delete(&state.db).await?;

    Ok(Json(serde_json::json!({ "deleted": id })))
}

#[utoipa::path(
    post,
    path = "/operations/{id}/documents",
    request_body(content = Object, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Per-slot upload outcome", body = DocumentUploadResponse),
        (status = 400, description = "Malformed form or duplicate slot"),
        (status = 404, description = "Shipment not found")
    ),
    security(("jwt" = [])),
    tag = "operations"
)]
pub async fn upload_documents(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<DocumentUploadResponse>, AppError> {
    let operation = Operations::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Shipment not found".to_string()))?;

    let mut tasks: Vec<UploadTask> = Vec::new();
    let mut reference_nos: HashMap<DocumentSlot, String> = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if let Some(slot_key) = name.strip_suffix("_reference_no") {
            if let Some(slot) = DocumentSlot::from_key(slot_key) {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Unreadable form field: {}", e)))?;
                if !value.trim().is_empty() {
                    reference_nos.insert(slot, value.trim().to_string());
                }
            }
            continue;
        }

        let Some(slot) = DocumentSlot::from_key(&name) else {
            tracing::debug!(field = %name, "Ignoring unknown form field");
            continue;
        };

        // One file per slot; a duplicate means a broken client.
        if tasks.iter().any(|t| t.slot == slot) {
            return Err(AppError::BadRequest(format!(
                "Duplicate document slot: {}",
                slot.key()
            )));
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}.pdf", slot.key()));
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::PayloadTooLarge(format!("Failed to read upload: {}", e)))?;

        tasks.push(UploadTask {
            slot,
            file_name,
            content_type,
            data,
            reference_no: None,
        });
    }

    if tasks.is_empty() {
        return Err(AppError::BadRequest(
            "No document fields in request".to_string(),
        ));
    }

    for task in &mut tasks {
        task.reference_no = reference_nos.remove(&task.slot);
    }

    // Progress events are drained into the log; the HTTP response carries
    // only the settled outcome.
    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let drain = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            tracing::debug!(
                slot = event.slot.key(),
                percent = event.percent,
                bytes = event.bytes_transferred,
                "📈 Upload progress"
            );
        }
    });

    let report = state
        .uploader
        .run("operations", &operation.id, &claims.sub, tasks, Some(tx))
        .await;
    let _ = drain.await;

    let mut status =
        OperationStatus::from_str(&operation.status).unwrap_or(OperationStatus::InTransit);
    let mut is_active = operation.is_active;

    // All settled results land on the row in one update.
    if !report.uploaded.is_empty() {
        let merge = merge_documents(&operation, &report.uploaded)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        status = merge.status;
        is_active = merge.is_active;

        let mut active: operations::ActiveModel = operation.into();
        active.documents = Set(merge.documents);
        active.status = Set(merge.status.as_str().to_string());
        active.is_active = Set(merge.is_active);
        active.updated_at = Set(Utc::now());
        active.update(&state.db).await?;
    }

    tracing::info!(
        operation_id = %id,
        uploaded = report.uploaded.len(),
        failed = report.failed.len(),
        "📂 Document batch settled"
    );

    Ok(Json(DocumentUploadResponse {
        uploaded: report.uploaded,
        failed: report.failed.into_iter().map(Into::into).collect(),
        status,
        is_active,
    }))
}

#[utoipa::path(
    delete,
    path = "/operations/{id}/documents/{document_id}",
    responses(
        (status = 200, description = "Document removed"),
        (status = 404, description = "Shipment or document not found")
    ),
    security(("jwt" = [])),
    tag = "operations"
)]
pub async fn delete_document(
    State(state): State<crate::AppState>,
    Path((id, document_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let document_id = Uuid::parse_str(&document_id)
        .map_err(|_| AppError::BadRequest("Invalid document id".to_string()))?;

    let operation = Operations::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Shipment not found".to_string()))?;

    let mut documents =
        documents_of(&operation).map_err(|e| AppError::Internal(e.to_string()))?;
    let Some(position) = documents.iter().position(|d| d.id == document_id) else {
        return Err(AppError::NotFound("Document not found".to_string()));
    };
    let removed = documents.remove(position);

    let mut active: operations::ActiveModel = operation.into();
    active.documents = Set(serde_json::to_value(&documents)
        .map_err(|e| AppError::Internal(e.to_string()))?);
    active.updated_at = Set(Utc::now());
    active.update(&state.db).await?;

    // file_url is "{bucket}/{key}"; the object removal is best-effort.
    if let Some((_, key)) = removed.file_url.split_once('/') {
        if let Err(e) = state.storage.delete_object(key).await {
            tracing::warn!(key = %key, "Failed to delete stored document: {:#}", e);
        }
    }

    Ok(Json(serde_json::json!({ "deleted": document_id })))
}
