//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$EML2PDF_CONFIG` (environment variable)
//! 2. `~/.config/eml2pdf/config.toml` (Linux/macOS)
//!    `%APPDATA%\eml2pdf\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Command-line flags are applied on top of the loaded values.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::body::images::DEFAULT_LOAD_BLACKLIST;
use crate::export::pdf::WKHTMLTOPDF;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// External renderer settings.
    pub render: RenderConfig,
    /// Remote image handling.
    pub images: ImagesConfig,
    /// Output defaults.
    pub output: OutputConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// External renderer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Renderer executable, looked up on `PATH` unless it contains a separator.
    pub command: String,
    /// Extra regular expressions for harmless renderer output.
    pub extra_benign_patterns: Vec<String>,
}

/// Remote image handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// Substrings of image URLs that are never loaded.
    pub load_blacklist: Vec<String>,
    /// Check that remote images can be fetched before rendering.
    pub check_remote: bool,
}

/// Output defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output directory when `-d` is not given.
    pub default_output_dir: Option<PathBuf>,
    /// Prefix attachment names with the current date.
    pub add_prefix_date: bool,
    /// Skip attachments that have no filename.
    pub ignore_floating_attachments: bool,
    /// Print the header block above the body.
    pub headers: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            command: WKHTMLTOPDF.to_string(),
            extra_benign_patterns: Vec::new(),
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            load_blacklist: DEFAULT_LOAD_BLACKLIST.iter().map(|s| s.to_string()).collect(),
            check_remote: true,
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("EML2PDF_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("eml2pdf").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eml2pdf")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("eml2pdf.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.render.command, "wkhtmltopdf");
        assert_eq!(cfg.images.load_blacklist, ["emltrk.com", "trk.email", "shim.gif"]);
        assert!(cfg.images.check_remote);
        assert!(!cfg.output.headers);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.render.command, cfg.render.command);
        assert_eq!(parsed.images.load_blacklist, cfg.images.load_blacklist);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[render]
command = "/opt/wk/bin/wkhtmltopdf"
extra_benign_patterns = ["Warning: Received createRequest signal"]

[output]
headers = true
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.render.command, "/opt/wk/bin/wkhtmltopdf");
        assert_eq!(cfg.render.extra_benign_patterns.len(), 1);
        assert!(cfg.output.headers);
        // Other fields use defaults
        assert_eq!(cfg.general.log_level, "warn");
        assert!(cfg.images.check_remote);
    }

    #[test]
    fn test_log_file_in_cache_dir() {
        let mut cfg = Config::default();
        cfg.general.cache_dir = Some(PathBuf::from("/tmp/eml2pdf-cache"));
        assert_eq!(log_file_path(&cfg), PathBuf::from("/tmp/eml2pdf-cache/eml2pdf.log"));
    }
}
