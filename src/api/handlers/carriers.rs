use crate::api::error::AppError;
use crate::entities::{carriers, prelude::*, vehicles};
use crate::utils::auth::Claims;
use crate::utils::validation::{validate_iban, validate_phone};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Serialize, ToSchema)]
pub struct CarrierResponse {
    #[serde(flatten)]
    pub carrier: carriers::Model,
    pub vehicles: Vec<vehicles::Model>,
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct VehicleRequest {
    #[validate(length(min = 1, max = 20))]
    pub plate: String,
    #[validate(length(min = 1, max = 50))]
    pub vehicle_type: String,
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct CreateCarrierRequest {
    #[validate(length(min = 1, max = 200))]
    pub company_name: String,
    pub company_type: Option<String>,
    pub tax_office: Option<String>,
    pub tax_number: Option<String>,
    #[validate(length(min = 1))]
    pub address: String,
    pub province: Option<String>,
    pub district: Option<String>,
    pub contact_person: Option<String>,
    pub phone: String,
    pub iban: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[serde(default)]
    pub vehicles: Vec<VehicleRequest>,
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct UpdateCarrierRequest {
    #[validate(length(min = 1, max = 200))]
    pub company_name: Option<String>,
    pub company_type: Option<String>,
    pub tax_office: Option<String>,
    pub tax_number: Option<String>,
    pub address: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub iban: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct CarrierListQuery {
    pub active: Option<bool>,
}

fn check_contact_fields(phone: Option<&str>, iban: Option<&str>) -> Result<(), AppError> {
    if let Some(phone) = phone {
        if !validate_phone(phone) {
            return Err(AppError::BadRequest(format!(
                "Invalid phone number: {}",
                phone
            )));
        }
    }
    if let Some(iban) = iban {
        if !validate_iban(iban) {
            return Err(AppError::BadRequest(format!("Invalid IBAN: {}", iban)));
        }
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/carriers",
    responses(
        (status = 200, description = "Carrier list with vehicles", body = [CarrierResponse])
    ),
    security(("jwt" = [])),
    tag = "carriers"
)]
pub async fn list_carriers(
    State(state): State<crate::AppState>,
    Query(query): Query<CarrierListQuery>,
) -> Result<Json<Vec<CarrierResponse>>, AppError> {
    let mut find = Carriers::find().order_by_desc(carriers::Column::CreatedAt);
    if let Some(active) = query.active {
        find = find.filter(carriers::Column::IsActive.eq(active));
    }

    let rows = find.find_with_related(Vehicles).all(&state.db).await?;

    Ok(Json(
        rows.into_iter()
            .map(|(carrier, vehicles)| CarrierResponse { carrier, vehicles })
            .collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/carriers",
    request_body = CreateCarrierRequest,
    responses(
        (status = 200, description = "Carrier created", body = CarrierResponse),
        (status = 400, description = "Invalid input")
    ),
    security(("jwt" = [])),
    tag = "carriers"
)]
pub async fn create_carrier(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCarrierRequest>,
) -> Result<Json<CarrierResponse>, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    check_contact_fields(Some(&req.phone), Some(&req.iban))?;

    let now = Utc::now();
    let carrier = carriers::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        company_name: Set(req.company_name),
        company_type: Set(req.company_type),
        tax_office: Set(req.tax_office),
        tax_number: Set(req.tax_number),
        address: Set(req.address),
        province: Set(req.province),
        district: Set(req.district),
        contact_person: Set(req.contact_person),
        phone: Set(req.phone),
        iban: Set(req.iban),
        email: Set(req.email),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        created_by: Set(claims.sub.clone()),
    };
    let carrier = carrier.insert(&state.db).await?;

    let mut saved_vehicles = Vec::new();
    for v in req.vehicles {
        v.validate().map_err(|e| AppError::BadRequest(e.to_string()))?;
        let vehicle = vehicles::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            carrier_id: Set(carrier.id.clone()),
            plate: Set(v.plate),
            vehicle_type: Set(v.vehicle_type),
        };
        saved_vehicles.push(vehicle.insert(&state.db).await?);
    }

    tracing::info!("🚚 Carrier registered: {}", carrier.company_name);

    Ok(Json(CarrierResponse {
        carrier,
        vehicles: saved_vehicles,
    }))
}

#[utoipa::path(
    get,
    path = "/carriers/{id}",
    responses(
        (status = 200, description = "Carrier detail", body = CarrierResponse),
        (status = 404, description = "Carrier not found")
    ),
    security(("jwt" = [])),
    tag = "carriers"
)]
pub async fn get_carrier(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<Json<CarrierResponse>, AppError> {
    let carrier = Carriers::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Carrier not found".to_string()))?;

    let vehicles = carrier.find_related(Vehicles).all(&state.db).await?;

    Ok(Json(CarrierResponse { carrier, vehicles }))
}

#[utoipa::path(
    put,
    path = "/carriers/{id}",
    request_body = UpdateCarrierRequest,
    responses(
        (status = 200, description = "Carrier updated", body = CarrierResponse),
        (status = 404, description = "Carrier not found")
    ),
    security(("jwt" = [])),
    tag = "carriers"
)]
pub async fn update_carrier(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateCarrierRequest>,
) -> Result<Json<CarrierResponse>, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    check_contact_fields(req.phone.as_deref(), req.iban.as_deref())?;

    let carrier = Carriers::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Carrier not found".to_string()))?;

    let mut active: carriers::ActiveModel = carrier.into();

    if let Some(v) = req.company_name {
        active.company_name = Set(v);
    }
    if let Some(v) = req.company_type {
        active.company_type = Set(Some(v));
    }
    if let Some(v) = req.tax_office {
        active.tax_office = Set(Some(v));
    }
    if let Some(v) = req.tax_number {
        active.tax_number = Set(Some(v));
    }
    if let Some(v) = req.address {
        active.address = Set(v);
    }
    if let Some(v) = req.province {
        active.province = Set(Some(v));
    }
    if let Some(v) = req.district {
        active.district = Set(Some(v));
    }
    if let Some(v) = req.contact_person {
        active.contact_person = Set(Some(v));
    }
    if let Some(v) = req.phone {
        active.phone = Set(v);
    }
    if let Some(v) = req.iban {
        active.iban = Set(v);
    }
    if let Some(v) = req.email {
        active.email = Set(Some(v));
    }
    if let Some(v) = req.is_active {
        active.is_active = Set(v);
    }
    active.updated_at = Set(Utc::now());

    let carrier = active.update(&state.db).await?;
    let vehicles = carrier.find_related(Vehicles).all(&state.db).await?;

    Ok(Json(CarrierResponse { carrier, vehicles }))
}

#[utoipa::path(
    delete,
    path = "/carriers/{id}",
    responses(
        (status = 200, description = "Carrier deleted"),
        (status = 404, description = "Carrier not found")
    ),
    security(("jwt" = [])),
    tag = "carriers"
)]
pub async fn delete_carrier(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let carrier = Carriers::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Carrier not found".to_string()))?;

    carrier.delete(&state.db).await?;

    Ok(Json(serde_json::json!({ "deleted": id })))
}

#[utoipa::path(
    post,
    path = "/carriers/{id}/vehicles",
    request_body = VehicleRequest,
    responses(
        (status = 200, description = "Vehicle added", body = crate::entities::vehicles::Model),
        (status = 404, description = "Carrier not found")
    ),
    security(("jwt" = [])),
    tag = "carriers"
)]
pub async fn add_vehicle(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
    Json(req): Json<VehicleRequest>,
) -> Result<Json<vehicles::Model>, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let carrier = Carriers::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Carrier not found".to_string()))?;

    let vehicle = vehicles::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        carrier_id: Set(carrier.id),
        plate: Set(req.plate),
        vehicle_type: Set(req.vehicle_type),
    };
    let vehicle = vehicle.insert(&state.db).await?;

    Ok(Json(vehicle))
}

#[utoipa::path(
    delete,
    path = "/carriers/{id}/vehicles/{vehicle_id}",
    responses(
        (status = 200, description = "Vehicle removed"),
        (status = 404, description = "Vehicle not found")
    ),
    security(("jwt" = [])),
    tag = "carriers"
)]
pub async fn remove_vehicle(
    State(state): State<crate::AppState>,
    Path((id, vehicle_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let vehicle = Vehicles::find_by_id(&vehicle_id)
        .filter(vehicles::Column::CarrierId.eq(&id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))?;

    vehicle.delete(&state.db).await?;

    Ok(Json(serde_json::json!({ "deleted": vehicle_id })))
}
