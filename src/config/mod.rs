use std::env;

/// Runtime configuration for the backend
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Maximum accepted document size in bytes (default: 32 MB)
    pub max_file_size: usize,

    /// How many document uploads may be in flight at once (default: 3)
    pub upload_concurrency: usize,

    /// Per-document upload deadline in seconds (default: 120)
    pub upload_timeout_secs: u64,

    /// Part size for chunked storage uploads in bytes (default: 7 MB)
    pub chunk_size: usize,

    /// JWT Secret Key (Required in production)
    pub jwt_secret: String,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_file_size: 32 * 1024 * 1024, // 32 MB
            upload_concurrency: 3,
            upload_timeout_secs: 120,
            chunk_size: 7 * 1024 * 1024, // 7 MB
            jwt_secret: "secret".to_string(),
            // More secure default: localhost only instead of wildcard
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            upload_concurrency: env::var("UPLOAD_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&v| v > 0)
                .unwrap_or(default.upload_concurrency),

            upload_timeout_secs: env::var("UPLOAD_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.upload_timeout_secs),

            chunk_size: env::var("CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.chunk_size),

            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string()), // Fallback for dev convenience, strictly enforced in production method

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for production (strict security)
    pub fn production() -> Self {
        let mut config = Self::from_env();
        config.jwt_secret = env::var("JWT_SECRET").expect("CRITICAL: JWT_SECRET must be set");
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.max_file_size, 32 * 1024 * 1024);
        assert_eq!(config.upload_concurrency, 3);
        assert_eq!(config.upload_timeout_secs, 120);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        unsafe { env::set_var("UPLOAD_CONCURRENCY", "0") };
        let config = AppConfig::from_env();
        unsafe { env::remove_var("UPLOAD_CONCURRENCY") };
        assert_eq!(config.upload_concurrency, 3);
    }

    #[test]
    fn test_from_env_cors_fallback() {
        unsafe { env::remove_var("ALLOWED_ORIGINS") };
        let config = AppConfig::from_env();
        let default_config = AppConfig::default();
        assert_eq!(config.allowed_origins, default_config.allowed_origins);
        assert!(!config.allowed_origins.contains(&"*".to_string()));
    }
}
