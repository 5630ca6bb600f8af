//! Service configuration.
//!
//! Everything is read once at startup and then passed around as an
//! immutable `Arc<Config>`; nothing consults the environment after that.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ServiceError, ServiceResult};
use crate::pipeline::Preset;

mod loader;

pub use loader::load_config;

/// Top-level service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Maximum accepted upload size in MiB
    #[serde(default = "default_max_mb")]
    pub max_mb: u64,

    /// Preset used when the client does not send one
    #[serde(default)]
    pub default_preset: Preset,

    /// Whether OCR runs when the client does not say otherwise
    #[serde(default)]
    pub ocr_default: bool,

    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_tools")]
    pub tools: ToolsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// External tool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_ghostscript")]
    pub ghostscript: String,

    #[serde(default = "default_ocrmypdf")]
    pub ocrmypdf: String,

    #[serde(default = "default_qpdf")]
    pub qpdf: String,

    /// Tesseract language string handed to ocrmypdf `-l`
    #[serde(default = "default_ocr_languages")]
    pub ocr_languages: String,

    /// Hard limit for a single tool invocation
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Parent directory for per-request workspaces. Defaults to the system temp dir.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

impl Config {
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_mb * 1024 * 1024
    }

    /// Check values serde cannot express as types.
    pub fn validate(&self) -> ServiceResult<()> {
        if self.max_mb == 0 {
            return Err(ServiceError::Config {
                message: "max_mb must be greater than zero".to_string(),
            });
        }
        if self.tools.timeout_secs == 0 {
            return Err(ServiceError::Config {
                message: "tools.timeout_secs must be greater than zero".to_string(),
            });
        }
        if self.tools.ocr_languages.trim().is_empty() {
            return Err(ServiceError::Config {
                message: "tools.ocr_languages must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_mb: default_max_mb(),
            default_preset: Preset::default(),
            ocr_default: false,
            server: default_server(),
            tools: default_tools(),
        }
    }
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ==================== Default Value Functions ====================

fn default_max_mb() -> u64 {
    30
}

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_tools() -> ToolsConfig {
    ToolsConfig {
        ghostscript: default_ghostscript(),
        ocrmypdf: default_ocrmypdf(),
        qpdf: default_qpdf(),
        ocr_languages: default_ocr_languages(),
        timeout_secs: default_timeout_secs(),
        work_dir: None,
    }
}

fn default_ghostscript() -> String {
    "gs".to_string()
}

fn default_ocrmypdf() -> String {
    "ocrmypdf".to_string()
}

fn default_qpdf() -> String {
    "qpdf".to_string()
}

fn default_ocr_languages() -> String {
    "ita+eng".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_mb, 30);
        assert_eq!(config.max_upload_bytes(), 30 * 1024 * 1024);
        assert_eq!(config.default_preset, Preset::Ebook);
        assert!(!config.ocr_default);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.tools.timeout(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = Config::default();
        config.max_mb = 0;
        assert!(matches!(
            config.validate(),
            Err(ServiceError::Config { .. })
        ));

        let mut config = Config::default();
        config.tools.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tools.ocr_languages = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
