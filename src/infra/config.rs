//! Configuration loading from TOML files
//!
//! Config file is selected via the --config command line argument,
//! defaulting to config/dev.toml. A missing or unparseable file falls back
//! to built-in defaults with a warning.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Where exported tickets are delivered. Chosen once at startup, never
/// re-checked per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// Write PNG files into the export directory
    Filesystem,
    /// Hand encoded files to the hosting shell's download prompt
    Download,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout; expiry surfaces as a timeout error, not a hang
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { base_url: default_base_url(), timeout_ms: default_timeout_ms() }
    }
}

fn default_base_url() -> String {
    "http://98.70.27.226:8080".to_string()
}

fn default_timeout_ms() -> u64 {
    15_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketConfig {
    /// Background image path (PNG or JPEG); flat fill when unset
    #[serde(default)]
    pub background: Option<String>,
    /// Logical canvas width; the export is rendered at `scale` times this
    #[serde(default = "default_ticket_width")]
    pub width: u32,
    #[serde(default = "default_ticket_height")]
    pub height: u32,
    #[serde(default = "default_ticket_scale")]
    pub scale: u32,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            background: None,
            width: default_ticket_width(),
            height: default_ticket_height(),
            scale: default_ticket_scale(),
        }
    }
}

fn default_ticket_width() -> u32 {
    500
}

fn default_ticket_height() -> u32 {
    350
}

fn default_ticket_scale() -> u32 {
    2
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_export_mode")]
    pub mode: ExportMode,
    #[serde(default = "default_export_dir")]
    pub dir: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { mode: default_export_mode(), dir: default_export_dir() }
    }
}

fn default_export_mode() -> ExportMode {
    ExportMode::Filesystem
}

fn default_export_dir() -> String {
    "tickets".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub ticket: TicketConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    api_base_url: String,
    api_timeout_ms: u64,
    ticket_background: Option<String>,
    ticket_width: u32,
    ticket_height: u32,
    ticket_scale: u32,
    export_mode: ExportMode,
    export_dir: String,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_base_url(),
            api_timeout_ms: default_timeout_ms(),
            ticket_background: None,
            ticket_width: default_ticket_width(),
            ticket_height: default_ticket_height(),
            ticket_scale: default_ticket_scale(),
            export_mode: default_export_mode(),
            export_dir: default_export_dir(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self {
            api_base_url: toml_config.api.base_url,
            api_timeout_ms: toml_config.api.timeout_ms,
            ticket_background: toml_config.ticket.background,
            ticket_width: toml_config.ticket.width,
            ticket_height: toml_config.ticket.height,
            ticket_scale: toml_config.ticket.scale,
            export_mode: toml_config.export.mode,
            export_dir: toml_config.export.dir,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration - tries the TOML file, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    // Getters for all config fields
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn api_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.api_timeout_ms)
    }

    pub fn ticket_background(&self) -> Option<&str> {
        self.ticket_background.as_deref()
    }

    pub fn ticket_width(&self) -> u32 {
        self.ticket_width
    }

    pub fn ticket_height(&self) -> u32 {
        self.ticket_height
    }

    pub fn ticket_scale(&self) -> u32 {
        self.ticket_scale
    }

    pub fn export_mode(&self) -> ExportMode {
        self.export_mode
    }

    pub fn export_dir(&self) -> &str {
        &self.export_dir
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }
}
