use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use bytes::Bytes;
use freight_ops_backend::config::AppConfig;
use freight_ops_backend::entities::prelude::*;
use freight_ops_backend::infrastructure::database;
use freight_ops_backend::services::storage::{ProgressFn, StorageService};
use freight_ops_backend::services::upload::UploadCoordinator;
use freight_ops_backend::{AppState, create_app};
use http_body_util::BodyExt;
use sea_orm::{Database, EntityTrait};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

struct MockStorageService {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockStorageService {
    fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        _content_type: &str,
        progress: Option<&ProgressFn>,
    ) -> anyhow::Result<String> {
        let total = data.len() as u64;
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
        if let Some(report) = progress {
            report(total, total);
        }
        Ok(format!("test-bucket/{}", key))
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn object_exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn abort_pending_upload(&self, _key: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

async fn setup_state() -> (AppState, Arc<MockStorageService>) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();

    let storage = Arc::new(MockStorageService::new());
    let config = AppConfig {
        jwt_secret: "test-secret".to_string(),
        ..AppConfig::default()
    };
    let uploader = Arc::new(UploadCoordinator::new(storage.clone(), &config));

    (
        AppState {
            db,
            storage: storage.clone(),
            uploader,
            config,
        },
        storage,
    )
}

async fn json_body(response: axum::http::Response<Body>) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn put_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn register_and_login(app: &axum::Router) -> String {
    let response = app
        .clone()
        .oneshot(post_json(
            "/register",
            None,
            json!({
                "email": "ops@example.com",
                "password": "password123",
                "display_name": "Operasyon"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    // First registered account gets the admin role.
    assert_eq!(json["role"], "admin");

    let response = app
        .clone()
        .oneshot(post_json(
            "/login",
            None,
            json!({ "email": "ops@example.com", "password": "password123" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    json["token"].as_str().unwrap().to_string()
}

async fn create_carrier(app: &axum::Router, token: &str) -> Value {
    let response = app
        .clone()
        .oneshot(post_json(
            "/carriers",
            Some(token),
            json!({
                "company_name": "Anadolu Nakliyat",
                "address": "Sanayi Mah. 12. Cad. No:3",
                "province": "Ankara",
                "phone": "5321234567",
                "iban": "TR120001002345678901234567",
                "vehicles": [
                    { "plate": "06 ABC 123", "vehicle_type": "Tir" }
                ]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

async fn create_operation(app: &axum::Router, token: &str, carrier: &Value) -> Value {
    let response = app
        .clone()
        .oneshot(post_json(
            "/operations",
            Some(token),
            json!({
                "carrier_id": carrier["id"],
                "vehicle_id": carrier["vehicles"][0]["id"],
                "origin": "İstanbul",
                "destination": "Ankara",
                "customer_name": "Yıldız Gıda",
                "total_amount": 45000.0,
                "currency": "TRY",
                "payment_term_days": 0,
                "vehicle_cost": 30000.0,
                "freight_sale_amount": 45000.0
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

#[tokio::test]
async fn test_full_api_flow() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("freight_ops_backend=debug,tower_http=debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();

    let (state, _storage) = setup_state().await;
    let app = create_app(state);

    // Requests without a token bounce off the auth middleware.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/operations")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = register_and_login(&app).await;

    let carrier = create_carrier(&app, &token).await;
    assert_eq!(carrier["company_name"], "Anadolu Nakliyat");
    assert_eq!(carrier["vehicles"].as_array().unwrap().len(), 1);

    // Invalid IBAN is rejected up front.
    let response = app
        .clone()
        .oneshot(post_json(
            "/customers",
            Some(&token),
            json!({
                "company_title": "Yıldız Gıda",
                "tax_office": "Kadıköy",
                "tax_number": "1234567890",
                "address": "Liman Cad. 5",
                "province": "İstanbul",
                "district": "Kadıköy",
                "contact_person": "Ali Yıldız",
                "phone": "5419876543",
                "email": "muhasebe@yildizgida.example",
                "iban": "DE89370400440532013000"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(post_json(
            "/customers",
            Some(&token),
            json!({
                "company_title": "Yıldız Gıda",
                "tax_office": "Kadıköy",
                "tax_number": "1234567890",
                "address": "Liman Cad. 5",
                "province": "İstanbul",
                "district": "Kadıköy",
                "contact_person": "Ali Yıldız",
                "phone": "5419876543",
                "email": "muhasebe@yildizgida.example",
                "iban": "TR330006100519786457841326"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let operation = create_operation(&app, &token, &carrier).await;
    assert_eq!(operation["status"], "in_transit");
    assert_eq!(operation["vehicle_plate"], "06 ABC 123");
    assert_eq!(operation["profit"], 15000.0);
    assert_eq!(operation["profit_percent"], 50.0);
    let voyage_no = operation["voyage_no"].as_str().unwrap();
    assert!(voyage_no.starts_with("SF"));

    // Profit is recomputed on update, never taken from the client.
    let operation_id = operation["id"].as_str().unwrap();
    let response = app
        .clone()
        .oneshot(put_json(
            &format!("/operations/{}", operation_id),
            &token,
            json!({ "vehicle_cost": 40000.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = json_body(response).await;
    assert_eq!(updated["profit"], 5000.0);
    assert_eq!(updated["profit_percent"], 12.5);

    // Dashboard sees one active shipment with an imminent payment.
    let response = app
        .clone()
        .oneshot(get("/dashboard/stats", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stats = json_body(response).await;
    assert_eq!(stats["total_carriers"], 1);
    assert_eq!(stats["total_customers"], 1);
    assert_eq!(stats["active_operations"], 1);
    let reminders = stats["upcoming_payments"].as_array().unwrap();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0]["voyage_no"], voyage_no);
    assert_eq!(reminders[0]["amount"], 45000.0);
}

#[tokio::test]
async fn test_document_upload_advances_status() {
    let (state, storage) = setup_state().await;
    let db = state.db.clone();
    let app = create_app(state);

    let token = register_and_login(&app).await;
    let carrier = create_carrier(&app, &token).await;
    let operation = create_operation(&app, &token, &carrier).await;
    let operation_id = operation["id"].as_str().unwrap();

    // One valid PDF and one renamed image in the same batch.
    let boundary = "---------------------------123456789012345678901234567";
    let pdf_bytes = "%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF";
    let multipart_body = format!(
        "--{boundary}\r\n\
        Content-Disposition: form-data; name=\"delivery_receipt\"; filename=\"teslim.pdf\"\r\n\
        Content-Type: application/pdf\r\n\r\n\
        {pdf_bytes}\r\n\
        --{boundary}\r\n\
        Content-Disposition: form-data; name=\"delivery_receipt_reference_no\"\r\n\r\n\
        TSL-2026-0007\r\n\
        --{boundary}\r\n\
        Content-Disposition: form-data; name=\"carrier_invoice\"; filename=\"fatura.pdf\"\r\n\
        Content-Type: image/png\r\n\r\n\
        \u{89}PNG fake image bytes\r\n\
        --{boundary}--\r\n",
    );

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(&format!("/operations/{}/documents", operation_id))
                .header("Authorization", format!("Bearer {}", token))
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .body(Body::from(multipart_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = json_body(response).await;

    let uploaded = outcome["uploaded"].as_array().unwrap();
    let failed = outcome["failed"].as_array().unwrap();
    assert_eq!(uploaded.len(), 1);
    assert_eq!(failed.len(), 1);
    assert_eq!(uploaded[0]["slot"], "delivery_receipt");
    assert_eq!(uploaded[0]["reference_no"], "TSL-2026-0007");
    assert_eq!(failed[0]["slot"], "carrier_invoice");
    assert_eq!(failed[0]["label"], "Nakliyeci Faturası");
    // Delivery receipt moves the shipment forward, the failed slot does not.
    assert_eq!(outcome["status"], "transport_completed");
    assert_eq!(outcome["is_active"], true);

    // The merge landed on the row in one update.
    let row = Operations::find_by_id(operation_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, "transport_completed");
    let documents = row.documents.as_array().unwrap();
    assert_eq!(documents.len(), 1);

    // Only the valid PDF reached storage.
    assert_eq!(storage.objects.lock().unwrap().len(), 1);

    // Removing the document clears the row and the stored object.
    let document_id = documents[0]["id"].as_str().unwrap();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(&format!(
                    "/operations/{}/documents/{}",
                    operation_id, document_id
                ))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let row = Operations::find_by_id(operation_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(row.documents.as_array().unwrap().is_empty());
    assert!(storage.objects.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_payment_receipt_archives_the_shipment() {
    let (state, _storage) = setup_state().await;
    let app = create_app(state);

    let token = register_and_login(&app).await;
    let carrier = create_carrier(&app, &token).await;
    let operation = create_operation(&app, &token, &carrier).await;
    let operation_id = operation["id"].as_str().unwrap();

    let boundary = "---------------------------987654321098765432109876543";
    let pdf_bytes = "%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF";
    let multipart_body = format!(
        "--{boundary}\r\n\
        Content-Disposition: form-data; name=\"payment_receipt\"; filename=\"dekont.pdf\"\r\n\
        Content-Type: application/pdf\r\n\r\n\
        {pdf_bytes}\r\n\
        --{boundary}--\r\n",
    );

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(&format!("/operations/{}/documents", operation_id))
                .header("Authorization", format!("Bearer {}", token))
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .body(Body::from(multipart_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = json_body(response).await;
    assert_eq!(outcome["status"], "carrier_paid");
    assert_eq!(outcome["is_active"], false);

    // The paid shipment is gone from the active list but in the archive.
    let response = app
        .clone()
        .oneshot(get("/operations", &token))
        .await
        .unwrap();
    let active = json_body(response).await;
    assert!(active.as_array().unwrap().is_empty());

    let response = app
        .clone()
        .oneshot(get("/operations?state=archive", &token))
        .await
        .unwrap();
    let archive = json_body(response).await;
    assert_eq!(archive.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_batch_where_every_slot_fails_is_still_ok() {
    let (state, storage) = setup_state().await;
    let db = state.db.clone();
    let app = create_app(state);

    let token = register_and_login(&app).await;
    let carrier = create_carrier(&app, &token).await;
    let operation = create_operation(&app, &token, &carrier).await;
    let operation_id = operation["id"].as_str().unwrap();

    // Neither slot holds a PDF; the whole batch fails per slot.
    let boundary = "---------------------------555666777888999000111222333";
    let multipart_body = format!(
        "--{boundary}\r\n\
        Content-Disposition: form-data; name=\"delivery_receipt\"; filename=\"teslim.png\"\r\n\
        Content-Type: image/png\r\n\r\n\
        \u{89}PNG fake image bytes\r\n\
        --{boundary}\r\n\
        Content-Disposition: form-data; name=\"carrier_invoice\"; filename=\"fatura.docx\"\r\n\
        Content-Type: application/msword\r\n\r\n\
        not a pdf either\r\n\
        --{boundary}--\r\n",
    );

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(&format!("/operations/{}/documents", operation_id))
                .header("Authorization", format!("Bearer {}", token))
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .body(Body::from(multipart_body))
                .unwrap(),
        )
        .await
        .unwrap();
    // Per-slot failures are data, not a transport error.
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = json_body(response).await;

    assert!(outcome["uploaded"].as_array().unwrap().is_empty());
    let failed = outcome["failed"].as_array().unwrap();
    assert_eq!(failed.len(), 2);
    assert!(
        failed
            .iter()
            .all(|f| f["message"].as_str().unwrap().contains("yalnızca PDF"))
    );
    assert_eq!(outcome["status"], "in_transit");
    assert_eq!(outcome["is_active"], true);

    // With zero successes the shipment row is left untouched.
    let row = Operations::find_by_id(operation_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, "in_transit");
    assert!(row.documents.as_array().unwrap().is_empty());
    assert!(row.is_active);
    assert!(storage.objects.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_slot_is_a_bad_request() {
    let (state, storage) = setup_state().await;
    let app = create_app(state);

    let token = register_and_login(&app).await;
    let carrier = create_carrier(&app, &token).await;
    let operation = create_operation(&app, &token, &carrier).await;
    let operation_id = operation["id"].as_str().unwrap();

    let boundary = "---------------------------111222333444555666777888999";
    let pdf_bytes = "%PDF-1.4\nx\n%%EOF";
    let multipart_body = format!(
        "--{boundary}\r\n\
        Content-Disposition: form-data; name=\"delivery_receipt\"; filename=\"a.pdf\"\r\n\
        Content-Type: application/pdf\r\n\r\n\
        {pdf_bytes}\r\n\
        --{boundary}\r\n\
        Content-Disposition: form-data; name=\"delivery_receipt\"; filename=\"b.pdf\"\r\n\
        Content-Type: application/pdf\r\n\r\n\
        {pdf_bytes}\r\n\
        --{boundary}--\r\n",
    );

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(&format!("/operations/{}/documents", operation_id))
                .header("Authorization", format!("Bearer {}", token))
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .body(Body::from(multipart_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(storage.objects.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_personnel_cannot_manage_accounts() {
    let (state, _storage) = setup_state().await;
    let app = create_app(state);

    let admin_token = register_and_login(&app).await;

    // Second registration lands as personnel.
    let response = app
        .clone()
        .oneshot(post_json(
            "/register",
            None,
            json!({
                "email": "saha@example.com",
                "password": "password123",
                "display_name": "Saha"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let personnel = json_body(response).await;
    assert_eq!(personnel["role"], "personnel");
    let personnel_token = personnel["token"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(get("/users", personnel_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(get("/users", &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let users = json_body(response).await;
    assert_eq!(users.as_array().unwrap().len(), 2);
    // Password hashes never leave the server.
    assert!(users[0].get("password_hash").is_none());
}
