use std::env;
use std::path::PathBuf;

/// Largest upload accepted by the service (10 MB)
pub const FILE_SIZE_LIMIT: usize = 10 * 1024 * 1024;

/// Service configuration for image uploads
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Prefix of every canonical URL, e.g. "http://localhost:3000"
    pub domain: String,

    /// Maximum file size in bytes (default: 10 MB)
    pub max_file_size: usize,

    /// Directory holding received and cropped files until they reach storage
    pub temp_dir: PathBuf,

    /// Idle lifetime of a client session in seconds (default: 24 hours)
    pub session_ttl_secs: u64,

    /// Interval between idle-session sweeps in seconds (default: 10 minutes)
    pub sweep_interval_secs: u64,

    /// How long a finished upload may wait on a pending short URL (default: 0, no wait)
    pub shorten_grace_ms: u64,

    /// Object storage credentials. Without them every upload fails fast.
    pub storage: Option<StorageConfig>,

    /// URL shortener credentials. Without them the canonical URL is always returned.
    pub shortener: Option<ShortenerConfig>,

    /// Short URL association store credentials. Without them lookups always fail.
    pub association_store: Option<AssociationStoreConfig>,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    /// Custom S3-compatible endpoint (MinIO etc.)
    pub endpoint: Option<String>,
    /// Base URL objects are publicly served from
    pub public_url: String,
    /// Key prefix for uploaded images (default: "images")
    pub key_prefix: String,
}

#[derive(Debug, Clone)]
pub struct ShortenerConfig {
    pub login: String,
    pub api_key: String,
    pub endpoint: String,
}

#[derive(Debug, Clone)]
pub struct AssociationStoreConfig {
    pub app_id: String,
    pub api_key: String,
    pub endpoint: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            domain: "http://localhost:3000".to_string(),
            max_file_size: FILE_SIZE_LIMIT,
            temp_dir: env::temp_dir(),
            session_ttl_secs: 24 * 60 * 60,
            sweep_interval_secs: 10 * 60,
            shorten_grace_ms: 0,
            storage: None,
            shortener: None,
            association_store: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            domain: env::var("DOMAIN")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(default.domain),

            max_file_size: parse_var("FILE_SIZE_LIMIT").unwrap_or(default.max_file_size),

            temp_dir: env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.temp_dir),

            session_ttl_secs: parse_var("SESSION_TTL_SECS").unwrap_or(default.session_ttl_secs),

            sweep_interval_secs: parse_var("SESSION_SWEEP_INTERVAL_SECS")
                .unwrap_or(default.sweep_interval_secs),

            shorten_grace_ms: parse_var("SHORTEN_GRACE_MS").unwrap_or(default.shorten_grace_ms),

            storage: StorageConfig::from_env(),
            shortener: ShortenerConfig::from_env(),
            association_store: AssociationStoreConfig::from_env(),
        }
    }

    /// Create config for local development (no collaborators, short session lifetime)
    pub fn development() -> Self {
        Self {
            domain: "http://localhost:3000".to_string(),
            max_file_size: FILE_SIZE_LIMIT,
            temp_dir: env::temp_dir(),
            session_ttl_secs: 60 * 60,
            sweep_interval_secs: 60,
            shorten_grace_ms: 0,
            storage: None,
            shortener: None,
            association_store: None,
        }
    }

    /// Canonical URL of an uploaded image
    pub fn canonical_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.domain, file_name)
    }
}

impl StorageConfig {
    fn from_env() -> Option<Self> {
        let access_key = non_empty_var("S3_KEY")?;
        let secret_key = non_empty_var("S3_SECRET")?;
        let bucket = non_empty_var("S3_BUCKET")?;

        Some(Self {
            public_url: non_empty_var("S3_PUBLIC_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://{}.s3.amazonaws.com", bucket)),
            access_key,
            secret_key,
            bucket,
            region: non_empty_var("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            endpoint: non_empty_var("S3_ENDPOINT"),
            key_prefix: non_empty_var("S3_KEY_PREFIX")
                .map(|v| v.trim_matches('/').to_string())
                .unwrap_or_else(|| "images".to_string()),
        })
    }

    /// Object key an image is stored under
    pub fn object_key(&self, file_name: &str) -> String {
        if self.key_prefix.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", self.key_prefix, file_name)
        }
    }

    /// Public URL an image is served from
    pub fn public_object_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.public_url, self.object_key(file_name))
    }
}

impl ShortenerConfig {
    fn from_env() -> Option<Self> {
        Some(Self {
            login: non_empty_var("BITLY_LOGIN")?,
            api_key: non_empty_var("BITLY_API_KEY")?,
            endpoint: non_empty_var("BITLY_ENDPOINT")
                .unwrap_or_else(|| "http://api.bitly.com".to_string()),
        })
    }
}

impl AssociationStoreConfig {
    fn from_env() -> Option<Self> {
        Some(Self {
            app_id: non_empty_var("PARSE_APP_ID")?,
            api_key: non_empty_var("PARSE_API_KEY")?,
            endpoint: non_empty_var("PARSE_ENDPOINT")
                .unwrap_or_else(|| "https://api.parse.com".to_string()),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.shorten_grace_ms, 0);
        assert!(config.storage.is_none());
        assert!(config.shortener.is_none());
        assert!(config.association_store.is_none());
    }

    #[test]
    fn test_development_config_has_no_collaborators() {
        let config = AppConfig::development();
        assert!(config.session_ttl_secs < AppConfig::default().session_ttl_secs);
        assert!(config.storage.is_none());
        assert!(config.shortener.is_none());
    }

    #[test]
    fn test_canonical_url() {
        let config = AppConfig {
            domain: "http://img.example".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(
            config.canonical_url("1700000000000000.png"),
            "http://img.example/1700000000000000.png"
        );
    }

    #[test]
    fn test_object_key_and_public_url() {
        let storage = StorageConfig {
            access_key: "key".to_string(),
            secret_key: "secret".to_string(),
            bucket: "pics".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            public_url: "http://pics.s3.amazonaws.com".to_string(),
            key_prefix: "images".to_string(),
        };
        assert_eq!(storage.object_key("a.jpg"), "images/a.jpg");
        assert_eq!(
            storage.public_object_url("a.jpg"),
            "http://pics.s3.amazonaws.com/images/a.jpg"
        );
    }

    #[test]
    fn test_storage_requires_all_credentials() {
        unsafe {
            env::set_var("S3_KEY", "key");
            env::remove_var("S3_SECRET");
            env::set_var("S3_BUCKET", "bucket");
        }
        assert!(StorageConfig::from_env().is_none());
        unsafe {
            env::remove_var("S3_KEY");
            env::remove_var("S3_BUCKET");
        }
    }
}
