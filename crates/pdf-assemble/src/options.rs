use crate::constants::*;
use crate::types::*;
use pdf_normalize::NormalizeOptions;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Settings for an assembly session
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AssemblyOptions {
    /// Quiet period before the preview is recompiled
    pub debounce_ms: u64,
    /// Thumbnail render scale (1.0 = 72 dpi)
    pub thumbnail_scale: f32,
    pub hover_timeout_ms: u64,
    /// File name for the merged download
    pub output_file_name: String,
    pub normalize: NormalizeOptions,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            thumbnail_scale: DEFAULT_THUMBNAIL_SCALE,
            hover_timeout_ms: DEFAULT_HOVER_TIMEOUT_MS,
            output_file_name: DEFAULT_OUTPUT_NAME.to_string(),
            normalize: NormalizeOptions::default(),
        }
    }
}

impl AssemblyOptions {
    /// Load options from JSON file
    #[cfg(feature = "serde")]
    pub async fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let options = serde_json::from_slice(&bytes)
            .map_err(|e| AssembleError::Config(format!("Failed to parse config: {}", e)))?;
        Ok(options)
    }

    /// Save options to JSON file
    #[cfg(feature = "serde")]
    pub async fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AssembleError::Config(format!("Failed to serialize config: {}", e)))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn hover_timeout(&self) -> Duration {
        Duration::from_millis(self.hover_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.thumbnail_scale > 0.0 && self.thumbnail_scale <= 4.0) {
            return Err(AssembleError::Config(format!(
                "Thumbnail scale must be in (0, 4], got {}",
                self.thumbnail_scale
            )));
        }

        let name = self.output_file_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(AssembleError::Config(format!(
                "Output file name must be a plain file name, got {:?}",
                self.output_file_name
            )));
        }
        if !name.to_lowercase().ends_with(".pdf") {
            return Err(AssembleError::Config(
                "Output file name must end in .pdf".to_string(),
            ));
        }

        self.normalize
            .validate()
            .map_err(|e| AssembleError::Config(e.to_string()))
    }
}
