//! Annotation data and the store that owns it.
//!
//! Positions and sizes are in PDF points measured from the top-left corner of
//! the page, never multiplied by the display zoom.

use crate::constants::*;
use crate::types::*;
use std::fmt;

// =============================================================================
// Color
// =============================================================================

/// sRGB color, written as `#rrggbb` in JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb`, `rrggbb` or the short `#rgb` form.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            6 => Some(Self {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
            }),
            3 => {
                let mut digits = hex.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
                Some(Self {
                    r: digits.next()??,
                    g: digits.next()??,
                    b: digits.next()??,
                })
            }
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Components in `0.0..=1.0` for PDF color operators
    pub fn as_unit(self) -> (f32, f32, f32) {
        (
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        )
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Color::from_hex(&value).ok_or_else(|| format!("invalid color: {value}"))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

// =============================================================================
// Annotation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TextStyle {
    pub font_size: f32,
    /// UI font family, mapped to a standard PDF font when flattening
    pub font_family: String,
    pub color: Color,
    pub bold: bool,
    pub italic: bool,
    pub align: TextAlign,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            color: Color::BLACK,
            bold: false,
            italic: false,
            align: TextAlign::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ShapeKind {
    Check,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "lowercase"))]
pub enum AnnotationKind {
    Text {
        text: String,
        width: f32,
        height: f32,
        #[cfg_attr(feature = "serde", serde(default))]
        style: TextStyle,
    },
    Signature {
        /// PNG as a `data:image/png;base64,` URI
        image_data: String,
        width: f32,
        height: f32,
    },
    /// Square mark of side `size`
    Shape { shape: ShapeKind, size: f32 },
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Annotation {
    pub id: AnnotationId,
    /// Zero-based page of the document being annotated
    pub page_index: usize,
    pub x: f32,
    pub y: f32,
    /// Clockwise degrees about the box center
    #[cfg_attr(feature = "serde", serde(default))]
    pub rotation: f32,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub kind: AnnotationKind,
}

impl Annotation {
    pub fn width(&self) -> f32 {
        match &self.kind {
            AnnotationKind::Text { width, .. } | AnnotationKind::Signature { width, .. } => *width,
            AnnotationKind::Shape { size, .. } => *size,
        }
    }

    pub fn height(&self) -> f32 {
        match &self.kind {
            AnnotationKind::Text { height, .. } | AnnotationKind::Signature { height, .. } => {
                *height
            }
            AnnotationKind::Shape { size, .. } => *size,
        }
    }

    /// Set the box size. Shapes stay square and take the larger side.
    pub fn set_size(&mut self, new_width: f32, new_height: f32) {
        match &mut self.kind {
            AnnotationKind::Text { width, height, .. }
            | AnnotationKind::Signature { width, height, .. } => {
                *width = new_width;
                *height = new_height;
            }
            AnnotationKind::Shape { size, .. } => *size = new_width.max(new_height),
        }
    }

    /// Box center in unscaled page coordinates
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width() / 2.0, self.y + self.height() / 2.0)
    }
}

// =============================================================================
// Store
// =============================================================================

/// Owns the annotations of the document being viewed.
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    annotations: Vec<Annotation>,
    next_id: u64,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt annotations loaded from elsewhere; new ids continue after the
    /// highest one seen.
    pub fn from_annotations(annotations: Vec<Annotation>) -> Self {
        let next_id = annotations
            .iter()
            .map(|a| a.id.0 + 1)
            .max()
            .unwrap_or(0);
        Self {
            annotations,
            next_id,
        }
    }

    pub fn add(&mut self, page_index: usize, x: f32, y: f32, kind: AnnotationKind) -> AnnotationId {
        let id = AnnotationId(self.next_id);
        self.next_id += 1;
        self.annotations.push(Annotation {
            id,
            page_index,
            x,
            y,
            rotation: 0.0,
            kind,
        });
        id
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    pub fn update(&mut self, id: AnnotationId, f: impl FnOnce(&mut Annotation)) -> Result<()> {
        let annotation = self
            .annotations
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AssembleError::AnnotationNotFound(id))?;
        f(annotation);
        Ok(())
    }

    pub fn remove(&mut self, id: AnnotationId) -> Result<Annotation> {
        let index = self
            .annotations
            .iter()
            .position(|a| a.id == id)
            .ok_or(AssembleError::AnnotationNotFound(id))?;
        Ok(self.annotations.remove(index))
    }

    pub fn for_page(&self, page_index: usize) -> impl Iterator<Item = &Annotation> {
        self.annotations
            .iter()
            .filter(move |a| a.page_index == page_index)
    }

    /// Drop every annotation on one page and return how many went.
    pub fn clear_page(&mut self, page_index: usize) -> usize {
        let before = self.annotations.len();
        self.annotations.retain(|a| a.page_index != page_index);
        before - self.annotations.len()
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
    }

    pub fn all(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }
}
