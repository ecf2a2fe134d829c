use crate::entities::{prelude::*, users};
use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set};
use std::env;
use tracing::info;

/// Creates the first admin account when the users table is empty and the
/// ADMIN_EMAIL / ADMIN_PASSWORD env vars are present.
pub async fn seed_initial_admin(db: &DatabaseConnection) -> anyhow::Result<()> {
    let user_count = Users::find().count(db).await?;
    if user_count > 0 {
        return Ok(());
    }

    let (Ok(email), Ok(password)) = (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD")) else {
        info!("ℹ️  No users yet and ADMIN_EMAIL/ADMIN_PASSWORD unset; skipping admin seed");
        return Ok(());
    };

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {}", e))?
        .to_string();

    let now = Utc::now();
    let admin = users::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        email: Set(email.clone()),
        display_name: Set("Administrator".to_string()),
        phone: Set(None),
        role: Set("admin".to_string()),
        password_hash: Set(password_hash),
        created_at: Set(now),
        updated_at: Set(now),
        created_by: Set(None),
    };
    admin.insert(db).await?;

    info!("👤 Seeded initial admin account: {}", email);
    Ok(())
}
