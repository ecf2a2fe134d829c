use crate::api::error::AppError;
use crate::entities::{customers, prelude::*};
use crate::utils::auth::Claims;
use crate::utils::validation::{validate_iban, validate_phone};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, ModelTrait, QueryOrder, Set};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Deserialize, ToSchema, Validate)]
pub struct CustomerRequest {
    #[validate(length(min = 1, max = 200))]
    pub company_title: String,
    pub tax_office: String,
    pub tax_number: String,
    #[validate(length(min = 1))]
    pub address: String,
    pub province: String,
    pub district: String,
    pub contact_person: String,
    pub phone: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub iban: String,
}

impl CustomerRequest {
    fn check(&self) -> Result<(), AppError> {
        self.validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        if !validate_phone(&self.phone) {
            return Err(AppError::BadRequest(format!(
                "Invalid phone number: {}",
                self.phone
            )));
        }
        if !validate_iban(&self.iban) {
            return Err(AppError::BadRequest(format!("Invalid IBAN: {}", self.iban)));
        }
        Ok(())
    }
}

#[utoipa::path(
    get,
    path = "/customers",
    responses(
        (status = 200, description = "Customer list", body = [crate::entities::customers::Model])
    ),
    security(("jwt" = [])),
    tag = "customers"
)]
pub async fn list_customers(
    State(state): State<crate::AppState>,
) -> Result<Json<Vec<customers::Model>>, AppError> {
    let customers = Customers::find()
        .order_by_desc(customers::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(customers))
}

#[utoipa::path(
    post,
    path = "/customers",
    request_body = CustomerRequest,
    responses(
        (status = 200, description = "Customer created", body = crate::entities::customers::Model),
        (status = 400, description = "Invalid input")
    ),
    security(("jwt" = [])),
    tag = "customers"
)]
pub async fn create_customer(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CustomerRequest>,
) -> Result<Json<customers::Model>, AppError> {
    req.check()?;

    let now = Utc::now();
    let customer = customers::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        company_title: Set(req.company_title),
        tax_office: Set(req.tax_office),
        tax_number: Set(req.tax_number),
        address: Set(req.address),
        province: Set(req.province),
        district: Set(req.district),
        contact_person: Set(req.contact_person),
        phone: Set(req.phone),
        email: Set(req.email),
        iban: Set(req.iban),
        created_at: Set(now),
        updated_at: Set(now),
        created_by: Set(claims.sub.clone()),
    };
    let customer = customer.insert(&state.db).await?;

    Ok(Json(customer))
}

#[utoipa::path(
    get,
    path = "/customers/{id}",
    responses(
        (status = 200, description = "Customer detail", body = crate::entities::customers::Model),
        (status = 404, description = "Customer not found")
    ),
    security(("jwt" = [])),
    tag = "customers"
)]
pub async fn get_customer(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<Json<customers::Model>, AppError> {
    let customer = Customers::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))?;

    Ok(Json(customer))
}

#[utoipa::path(
    put,
    path = "/customers/{id}",
    request_body = CustomerRequest,
    responses(
        (status = 200, description = "Customer updated", body = crate::entities::customers::Model),
        (status = 404, description = "Customer not found")
    ),
    security(("jwt" = [])),
    tag = "customers"
)]
pub async fn update_customer(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
    Json(req): Json<CustomerRequest>,
) -> Result<Json<customers::Model>, AppError> {
    req.check()?;

    let customer = Customers::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))?;

    let mut active: customers::ActiveModel = customer.into();
    active.company_title = Set(req.company_title);
    active.tax_office = Set(req.tax_office);
    active.tax_number = Set(req.tax_number);
    active.address = Set(req.address);
    active.province = Set(req.province);
    active.district = Set(req.district);
    active.contact_person = Set(req.contact_person);
    active.phone = Set(req.phone);
    active.email = Set(req.email);
    active.iban = Set(req.iban);
    active.updated_at = Set(Utc::now());

    let customer = active.update(&state.db).await?;

    Ok(Json(customer))
}

#[utoipa::path(
    delete,
    path = "/customers/{id}",
    responses(
        (status = 200, description = "Customer deleted"),
        (status = 404, description = "Customer not found")
    ),
    security(("jwt" = [])),
    tag = "customers"
)]
pub async fn delete_customer(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let customer = Customers::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))?;

    customer.delete(&state.db).await?;

    Ok(Json(serde_json::json!({ "deleted": id })))
}
