use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub storage: StorageConfig,
    /// Enables dangerous operations like purge. Must never be true in production.
    pub test_mode: bool,
    /// Server-side upload limit in bytes. Larger file parts are dropped during intake.
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for attachments; each record type gets a subdirectory.
    pub uploads_dir: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            data_dir: "./data".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: "./uploads".to_string(),
        }
    }
}

impl StorageConfig {
    /// Directory holding painting images.
    pub fn paintings_dir(&self) -> PathBuf {
        PathBuf::from(&self.uploads_dir).join("paintings")
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let uploads_dir = std::env::var("UPLOADS_DIR").unwrap_or_else(|_| "./uploads".to_string());

        let test_mode = std::env::var("TEST_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2 * 1024 * 1024); // 2MB

        let config = Config {
            node: NodeConfig {
                bind_address,
                data_dir,
            },
            storage: StorageConfig { uploads_dir },
            test_mode,
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.uploads_dir.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "UPLOADS_DIR cannot be empty".to_string(),
            ));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.test_mode {
            tracing::warn!("TEST_MODE is enabled. Never run this in production.");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paintings_dir_is_under_uploads_root() {
        let storage = StorageConfig {
            uploads_dir: "/srv/uploads".to_string(),
        };
        assert_eq!(
            storage.paintings_dir(),
            PathBuf::from("/srv/uploads/paintings")
        );
    }

    #[test]
    fn test_validate_rejects_zero_upload_limit() {
        let config = Config {
            node: NodeConfig::default(),
            storage: StorageConfig::default(),
            test_mode: false,
            max_upload_size: 0,
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
