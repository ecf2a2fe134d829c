use crate::api::error::AppError;
use crate::entities::{prelude::*, users};
use crate::utils::auth::Claims;
use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, ModelTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<users::Model> for UserResponse {
    fn from(u: users::Model) -> Self {
        Self {
            id: u.id,
            email: u.email,
            display_name: u.display_name,
            phone: u.phone,
            role: u.role,
            created_at: u.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
    pub phone: Option<String>,
    /// "admin" or "personnel"
    pub role: String,
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
}

fn require_admin(claims: &Claims) -> Result<(), AppError> {
    if claims.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin role required".to_string()))
    }
}

fn validate_role(role: &str) -> Result<(), AppError> {
    if role == "admin" || role == "personnel" {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("Unknown role: {}", role)))
    }
}

#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Current user profile", body = UserResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "users"
)]
pub async fn get_profile(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserResponse>, AppError> {
    let user = Users::find_by_id(&claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user.into()))
}

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All personnel accounts", body = [UserResponse]),
        (status = 403, description = "Admin role required")
    ),
    security(("jwt" = [])),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    require_admin(&claims)?;

    let users = Users::find()
        .order_by_desc(users::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(users.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "Account created", body = UserResponse),
        (status = 403, description = "Admin role required")
    ),
    security(("jwt" = [])),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    require_admin(&claims)?;
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    validate_role(&req.role)?;

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?
        .to_string();

    let now = Utc::now();
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        email: Set(req.email),
        display_name: Set(req.display_name),
        phone: Set(req.phone),
        role: Set(req.role),
        password_hash: Set(password_hash),
        created_at: Set(now),
        updated_at: Set(now),
        created_by: Set(Some(claims.sub.clone())),
    };
    let user = user.insert(&state.db).await?;

    Ok(Json(user.into()))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Account updated", body = UserResponse),
        (status = 404, description = "User not found")
    ),
    security(("jwt" = [])),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    // Users may edit themselves; only admins may edit others or change roles
    if claims.sub != id {
        require_admin(&claims)?;
    }
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let user = Users::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let mut active: users::ActiveModel = user.into();

    if let Some(display_name) = req.display_name {
        active.display_name = Set(display_name);
    }
    if let Some(phone) = req.phone {
        active.phone = Set(Some(phone));
    }
    if let Some(role) = req.role {
        require_admin(&claims)?;
        validate_role(&role)?;
        active.role = Set(role);
    }
    if let Some(password) = req.password {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?
            .to_string();
        active.password_hash = Set(password_hash);
    }
    active.updated_at = Set(Utc::now());

    let user = active.update(&state.db).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    responses(
        (status = 200, description = "Account deleted"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "User not found")
    ),
    security(("jwt" = [])),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&claims)?;

    if claims.sub == id {
        return Err(AppError::BadRequest(
            "Cannot delete your own account".to_string(),
        ));
    }

    let user = Users::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    user.delete(&state.db).await?;

    Ok(Json(serde_json::json!({ "deleted": id })))
}
