//! The published preview and the temporary file that backs it.

use crate::RuntimeError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// One compiled preview: its bytes plus a temporary PDF file for inline
/// display. The file lives exactly as long as the resource.
#[derive(Debug)]
pub struct PreviewResource {
    revision: u64,
    bytes: Arc<[u8]>,
    file: NamedTempFile,
}

impl PreviewResource {
    pub fn create(revision: u64, bytes: impl Into<Arc<[u8]>>) -> crate::Result<Self> {
        let bytes = bytes.into();
        let mut file = tempfile::Builder::new()
            .prefix("preview-")
            .suffix(".pdf")
            .tempfile()?;
        file.write_all(&bytes)?;
        file.flush()?;
        Ok(Self {
            revision,
            bytes,
            file,
        })
    }

    /// [`create`](Self::create) on the blocking pool
    pub async fn create_async(revision: u64, bytes: Vec<u8>) -> crate::Result<Self> {
        tokio::task::spawn_blocking(move || Self::create(revision, bytes)).await?
    }

    /// Collection revision this preview was compiled from
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn shared_bytes(&self) -> Arc<[u8]> {
        self.bytes.clone()
    }

    /// Path of the backing file, valid until the resource is released
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the backing file now.
    pub fn release(self) -> crate::Result<()> {
        log::debug!("Releasing preview for revision {}", self.revision);
        self.file.close()?;
        Ok(())
    }
}

/// Holds at most one live [`PreviewResource`].
#[derive(Debug, Default)]
pub struct PreviewSlot {
    current: Option<PreviewResource>,
    published: usize,
}

impl PreviewSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current preview. The old one is released before the new
    /// one is stored.
    pub fn publish(&mut self, resource: PreviewResource) {
        self.release_current();
        log::info!("Published preview for revision {}", resource.revision);
        self.current = Some(resource);
        self.published += 1;
    }

    pub fn current(&self) -> Option<&PreviewResource> {
        self.current.as_ref()
    }

    pub fn revision(&self) -> Option<u64> {
        self.current.as_ref().map(PreviewResource::revision)
    }

    /// Number of previews published so far
    pub fn published_count(&self) -> usize {
        self.published
    }

    /// Release the current preview, leaving the slot empty.
    pub fn clear(&mut self) {
        self.release_current();
    }

    /// Write the current preview to `path`, byte for byte.
    pub async fn download(&self, path: impl AsRef<Path>) -> crate::Result<PathBuf> {
        let current = self.current.as_ref().ok_or(RuntimeError::NoPreview)?;
        let path = path.as_ref().to_path_buf();
        pdf_assemble::io::save_pdf(current.bytes(), &path).await?;
        log::info!(
            "Saved revision {} to {}",
            current.revision,
            path.display()
        );
        Ok(path)
    }

    fn release_current(&mut self) {
        if let Some(old) = self.current.take() {
            if let Err(e) = old.release() {
                log::warn!("Failed to remove old preview file: {}", e);
            }
        }
    }
}
