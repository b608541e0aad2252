use crate::types::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum accepted upload size (100 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// A4 in points
pub const A4_WIDTH_PT: f32 = 595.0;
pub const A4_HEIGHT_PT: f32 = 842.0;

/// Page geometry and font metrics for text rendered from office documents.
///
/// All values are in PDF points.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TextLayout {
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub margin_pt: f32,
    pub font_size_pt: f32,
    pub line_height_pt: f32,
    /// Lines longer than this are cut, not wrapped
    pub max_line_chars: usize,
}

impl TextLayout {
    /// Layout used for Word documents
    pub fn document() -> Self {
        Self {
            page_width_pt: A4_WIDTH_PT,
            page_height_pt: A4_HEIGHT_PT,
            margin_pt: 50.0,
            font_size_pt: 12.0,
            line_height_pt: 16.0,
            max_line_chars: 90,
        }
    }

    /// Layout used for spreadsheet rows
    pub fn spreadsheet() -> Self {
        Self {
            font_size_pt: 10.0,
            line_height_pt: 14.0,
            max_line_chars: 80,
            ..Self::document()
        }
    }

    /// Y coordinate of the first baseline on a fresh page
    pub fn top(&self) -> f32 {
        self.page_height_pt - self.margin_pt
    }

    fn validate(&self, what: &str) -> Result<()> {
        if self.page_width_pt <= 0.0 || self.page_height_pt <= 0.0 {
            return Err(NormalizeError::Config(format!(
                "{what}: page dimensions must be positive"
            )));
        }
        if self.margin_pt < 0.0 || self.margin_pt * 2.0 >= self.page_height_pt {
            return Err(NormalizeError::Config(format!(
                "{what}: margin leaves no room for text"
            )));
        }
        if self.font_size_pt <= 0.0 || self.line_height_pt <= 0.0 {
            return Err(NormalizeError::Config(format!(
                "{what}: font size and line height must be positive"
            )));
        }
        if self.max_line_chars == 0 {
            return Err(NormalizeError::Config(format!(
                "{what}: max_line_chars must be at least 1"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NormalizeOptions {
    pub max_upload_bytes: usize,
    pub document: TextLayout,
    pub spreadsheet: TextLayout,
    pub sheet_heading_size_pt: f32,
    /// Vertical space consumed by a sheet heading
    pub sheet_heading_gap_pt: f32,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            document: TextLayout::document(),
            spreadsheet: TextLayout::spreadsheet(),
            sheet_heading_size_pt: 14.0,
            sheet_heading_gap_pt: 30.0,
        }
    }
}

impl NormalizeOptions {
    /// Load options from JSON file
    #[cfg(feature = "serde")]
    pub async fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let options = serde_json::from_slice(&bytes)
            .map_err(|e| NormalizeError::Config(format!("Failed to parse config: {}", e)))?;
        Ok(options)
    }

    /// Save options to JSON file
    #[cfg(feature = "serde")]
    pub async fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| NormalizeError::Config(format!("Failed to serialize config: {}", e)))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_upload_bytes == 0 {
            return Err(NormalizeError::Config(
                "max_upload_bytes must be greater than zero".to_string(),
            ));
        }
        self.document.validate("document layout")?;
        self.spreadsheet.validate("spreadsheet layout")?;
        if self.sheet_heading_size_pt <= 0.0 || self.sheet_heading_gap_pt < 0.0 {
            return Err(NormalizeError::Config(
                "sheet heading size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
