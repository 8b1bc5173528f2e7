use dotenvy::dotenv;
use std::env;
use std::time::Duration;

const MIB: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Bucket holding message attachments. Avatar/gallery images live in a
    /// different bucket owned by the profile service.
    pub attachment_bucket: String,
    /// Optional non-AWS endpoint (minio in dev/test).
    pub s3_endpoint: Option<String>,
    pub max_image_bytes: usize,
    pub max_file_bytes: usize,
    pub signed_url_ttl: Duration,
    /// Upper bound on any single object-storage call (upload or presign).
    pub storage_timeout: Duration,
    /// How long a typing signal stays live without a refresh.
    pub typing_ttl: Duration,
    pub default_page_size: i64,
    pub max_page_size: i64,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| crate::error::AppError::Config("DATABASE_URL missing".into()))?;
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| crate::error::AppError::Config("JWT_SECRET missing".into()))?;
        let attachment_bucket =
            env::var("ATTACHMENT_BUCKET").unwrap_or_else(|_| "talentlink-attachments".into());
        let s3_endpoint = env::var("S3_ENDPOINT").ok().filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url,
            redis_url,
            port: env_parse("PORT", 3000),
            jwt_secret,
            attachment_bucket,
            s3_endpoint,
            max_image_bytes: env_parse("MAX_IMAGE_BYTES", 5 * MIB),
            max_file_bytes: env_parse("MAX_FILE_BYTES", 25 * MIB),
            signed_url_ttl: Duration::from_secs(env_parse("SIGNED_URL_TTL_SECONDS", 3600)),
            storage_timeout: Duration::from_secs(env_parse("STORAGE_TIMEOUT_SECONDS", 10)),
            typing_ttl: Duration::from_millis(env_parse("TYPING_TTL_MS", 5000)),
            default_page_size: env_parse("PAGE_SIZE", 20),
            max_page_size: 100,
        })
    }

    /// Defaults for tests and local tooling; no external services implied.
    pub fn test_defaults() -> Self {
        Self {
            database_url: "postgres://localhost/test".into(),
            redis_url: "redis://127.0.0.1:6379/0".into(),
            port: 3000,
            jwt_secret: "test-secret".into(),
            attachment_bucket: "test-attachments".into(),
            s3_endpoint: None,
            max_image_bytes: 5 * MIB,
            max_file_bytes: 25 * MIB,
            signed_url_ttl: Duration::from_secs(3600),
            storage_timeout: Duration::from_secs(2),
            typing_ttl: Duration::from_millis(5000),
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_consistent() {
        let cfg = Config::test_defaults();
        assert!(cfg.max_image_bytes < cfg.max_file_bytes);
        assert!(cfg.default_page_size <= cfg.max_page_size);
    }
}
