//! Configuration loading for ocrtsv.
//! Reads ocrtsv.toml from the current directory or the path in the OCRTSV_CONFIG env var.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ner: NerConfig,
    #[serde(default)]
    pub ned: NedConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NerConfig {
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NedConfig {
    pub endpoint: Option<String>,
    pub threshold: Option<f64>,
    pub priority: Option<u32>,
    /// Directory for per-document candidate caches.
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,
    pub normalization_file: Option<PathBuf>,
}

fn default_scale_factor() -> f64 { 1.0 }

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            scale_factor: default_scale_factor(),
            normalization_file: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpConfig {
    #[serde(default)]
    pub noproxy: bool,
}

impl Config {
    /// Load from `$OCRTSV_CONFIG` or `./ocrtsv.toml`. A missing file yields the defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("OCRTSV_CONFIG").unwrap_or_else(|_| "ocrtsv.toml".to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Candidate cache for a document, `<cache_dir>/<stem>.json`.
    pub fn ned_cache_path(&self, tsv_file: &Path) -> Option<PathBuf> {
        let dir = self.ned.cache_dir.as_ref()?;
        let stem = tsv_file.file_stem()?;
        Some(dir.join(format!("{}.json", stem.to_string_lossy())))
    }
}

#[cfg(test)]
mod tests;
