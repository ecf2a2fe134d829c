pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::storage::StorageService;
use crate::services::upload::UploadCoordinator;
use axum::{
    Router,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::health::health_check,
        api::handlers::users::get_profile,
        api::handlers::users::list_users,
        api::handlers::users::create_user,
        api::handlers::users::update_user,
        api::handlers::users::delete_user,
        api::handlers::carriers::list_carriers,
        api::handlers::carriers::create_carrier,
        api::handlers::carriers::get_carrier,
        api::handlers::carriers::update_carrier,
        api::handlers::carriers::delete_carrier,
        api::handlers::carriers::add_vehicle,
        api::handlers::carriers::remove_vehicle,
        api::handlers::customers::list_customers,
        api::handlers::customers::create_customer,
        api::handlers::customers::get_customer,
        api::handlers::customers::update_customer,
        api::handlers::customers::delete_customer,
        api::handlers::operations::list_operations,
        api::handlers::operations::create_operation,
        api::handlers::operations::get_operation,
        api::handlers::operations::update_operation,
        api::handlers::operations::delete_operation,
        api::handlers::operations::upload_documents,
        api::handlers::operations::delete_document,
        api::handlers::dashboard::dashboard_stats,
    ),
    components(
        schemas(
            api::handlers::auth::RegisterRequest,
            api::handlers::auth::LoginRequest,
            api::handlers::auth::AuthResponse,
            api::handlers::health::HealthResponse,
            api::handlers::users::UserResponse,
            api::handlers::users::CreateUserRequest,
            api::handlers::users::UpdateUserRequest,
            api::handlers::carriers::CarrierResponse,
            api::handlers::carriers::VehicleRequest,
            api::handlers::carriers::CreateCarrierRequest,
            api::handlers::carriers::UpdateCarrierRequest,
            api::handlers::customers::CustomerRequest,
            api::handlers::operations::CreateOperationRequest,
            api::handlers::operations::UpdateOperationRequest,
            api::handlers::operations::DocumentUploadResponse,
            api::handlers::operations::FailedUpload,
            api::handlers::dashboard::DashboardStats,
            api::handlers::dashboard::PaymentReminder,
            entities::users::Model,
            entities::carriers::Model,
            entities::vehicles::Model,
            entities::customers::Model,
            entities::operations::Model,
            services::upload::DocumentSlot,
            services::upload::UploadedDocument,
            services::operations::OperationStatus,
        )
    ),
    tags(
        (name = "auth", description = "Authentication endpoints"),
        (name = "users", description = "Personnel account management"),
        (name = "carriers", description = "Carrier and fleet management"),
        (name = "customers", description = "Customer records"),
        (name = "operations", description = "Shipment operations and documents"),
        (name = "dashboard", description = "Counters and payment reminders"),
        (name = "system", description = "Health and diagnostics")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn StorageService>,
    pub uploader: Arc<UploadCoordinator>,
    pub config: AppConfig,
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origin = if config.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse::<HeaderValue>().ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_app(state: AppState) -> Router {
    // Multipart framing adds overhead on top of the raw document bytes.
    let document_body_limit = state.config.max_file_size * 6 + 10 * 1024 * 1024;

    let auth = |state: &AppState| {
        from_fn_with_state(state.clone(), api::middleware::auth::auth_middleware)
    };

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/register", post(api::handlers::auth::register))
        .route("/login", post(api::handlers::auth::login))
        .route(
            "/users/me",
            get(api::handlers::users::get_profile).layer(auth(&state)),
        )
        .route(
            "/users",
            get(api::handlers::users::list_users)
                .post(api::handlers::users::create_user)
                .layer(auth(&state)),
        )
        .route(
            "/users/:id",
            axum::routing::put(api::handlers::users::update_user)
                .delete(api::handlers::users::delete_user)
                .layer(auth(&state)),
        )
        .route(
            "/carriers",
            get(api::handlers::carriers::list_carriers)
                .post(api::handlers::carriers::create_carrier)
                .layer(auth(&state)),
        )
        .route(
            "/carriers/:id",
            get(api::handlers::carriers::get_carrier)
                .put(api::handlers::carriers::update_carrier)
                .delete(api::handlers::carriers::delete_carrier)
                .layer(auth(&state)),
        )
        .route(
            "/carriers/:id/vehicles",
            post(api::handlers::carriers::add_vehicle).layer(auth(&state)),
        )
        .route(
            "/carriers/:id/vehicles/:vehicle_id",
            axum::routing::delete(api::handlers::carriers::remove_vehicle).layer(auth(&state)),
        )
        .route(
            "/customers",
            get(api::handlers::customers::list_customers)
                .post(api::handlers::customers::create_customer)
                .layer(auth(&state)),
        )
        .route(
            "/customers/:id",
            get(api::handlers::customers::get_customer)
                .put(api::handlers::customers::update_customer)
                .delete(api::handlers::customers::delete_customer)
                .layer(auth(&state)),
        )
        .route(
            "/operations",
            get(api::handlers::operations::list_operations)
                .post(api::handlers::operations::create_operation)
                .layer(auth(&state)),
        )
        .route(
            "/operations/:id",
            get(api::handlers::operations::get_operation)
                .put(api::handlers::operations::update_operation)
                .delete(api::handlers::operations::delete_operation)
                .layer(auth(&state)),
        )
        .route(
            "/operations/:id/documents",
            post(api::handlers::operations::upload_documents)
                .layer(axum::extract::DefaultBodyLimit::max(document_body_limit))
                .layer(auth(&state)),
        )
        .route(
            "/operations/:id/documents/:document_id",
            axum::routing::delete(api::handlers::operations::delete_document).layer(auth(&state)),
        )
        .route(
            "/dashboard/stats",
            get(api::handlers::dashboard::dashboard_stats).layer(auth(&state)),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config))
        .with_state(state)
}
