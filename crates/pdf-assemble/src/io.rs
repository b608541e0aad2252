//! File helpers for the async entry points.

use crate::annotation::{Annotation, flatten_annotations};
use crate::compile::{CompileInput, CompiledPdf, compile_async};
use crate::types::*;
use std::path::Path;
use std::sync::Arc;

/// Read a file into shared bytes.
pub async fn read_bytes(path: impl AsRef<Path>) -> Result<Arc<[u8]>> {
    let bytes = tokio::fs::read(path).await?;
    Ok(bytes.into())
}

/// Write PDF bytes, creating parent directories as needed.
pub async fn save_pdf(bytes: &[u8], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

/// Compile a snapshot and write the result to `path`.
pub async fn compile_to_file(input: CompileInput, path: impl AsRef<Path>) -> Result<CompiledPdf> {
    let compiled = compile_async(input).await?;
    save_pdf(&compiled.bytes, path).await?;
    Ok(compiled)
}

/// Flatten on the blocking pool.
pub async fn flatten_async(pdf: Vec<u8>, annotations: Vec<Annotation>) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || flatten_annotations(&pdf, &annotations)).await?
}

/// Load annotations from a JSON array
#[cfg(feature = "serde")]
pub async fn load_annotations(path: impl AsRef<Path>) -> Result<Vec<Annotation>> {
    let bytes = tokio::fs::read(path).await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AssembleError::Config(format!("Failed to parse annotations: {}", e)))
}

/// Save annotations as a JSON array
#[cfg(feature = "serde")]
pub async fn save_annotations(annotations: &[Annotation], path: impl AsRef<Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(annotations)
        .map_err(|e| AssembleError::Config(format!("Failed to serialize annotations: {}", e)))?;
    tokio::fs::write(path, json).await?;
    Ok(())
}
