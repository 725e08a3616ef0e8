use anyhow::{Context, Result};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// The only program a browser is allowed to launch.
    pub allowed_tool: String,
    pub public_dir: PathBuf,
    pub extension_dirs: Vec<PathBuf>,
    pub channel_capacity: usize,
    pub log_level: String,
    /// One JSON object per log line instead of human-readable text.
    pub log_json: bool,
}

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_TOOL: &str = "edp";
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Expands `~` and `$VAR` references.
fn expand_path(path_str: &str) -> Result<PathBuf, anyhow::Error> {
    shellexpand::full(path_str)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| anyhow::anyhow!("Failed to expand path '{}': {}", path_str, e))
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("EDP_WEB_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match var("EDP_WEB_PORT") {
            Some(s) => s.trim().parse::<u16>().context("Invalid EDP_WEB_PORT")?,
            None => DEFAULT_PORT,
        };

        let allowed_tool = var("EDP_WEB_TOOL")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| DEFAULT_TOOL.to_string());
        if allowed_tool.split_whitespace().count() != 1 {
            anyhow::bail!("EDP_WEB_TOOL must be a single token, got '{}'", allowed_tool);
        }

        let public_dir = match var("EDP_WEB_PUBLIC_DIR") {
            Some(s) => expand_path(s.trim())?,
            None => PathBuf::from("public"),
        };

        let extension_dirs = var("EDP_WEB_EXTENSIONS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(expand_path)
            .collect::<Result<Vec<PathBuf>>>()?;

        let channel_capacity = match var("EDP_WEB_CHANNEL_CAPACITY") {
            Some(s) => s
                .trim()
                .parse::<usize>()
                .context("Invalid EDP_WEB_CHANNEL_CAPACITY")?,
            None => DEFAULT_CHANNEL_CAPACITY,
        };
        if channel_capacity == 0 {
            anyhow::bail!("EDP_WEB_CHANNEL_CAPACITY must be greater than zero");
        }

        let log_level = var("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let log_json = match var("LOG_FORMAT").map(|s| s.trim().to_lowercase()).as_deref() {
            None | Some("text") => false,
            Some("json") => true,
            Some(other) => anyhow::bail!("LOG_FORMAT must be `text` or `json`, got '{}'", other),
        };

        Ok(Config {
            host,
            port,
            allowed_tool,
            public_dir,
            extension_dirs,
            channel_capacity,
            log_level,
            log_json,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
