//! Black-box collaborators of the pipeline: document rasterization and id generation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

use crate::platform::FileBlob;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Converter exited unsuccessfully: {0}")]
    Failed(String),

    #[error("Converter produced no image")]
    NoOutput,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns an uploaded document into a preview image.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert_to_image(&self, document: &FileBlob) -> Result<FileBlob, ConversionError>;
}

/// Renders the first page with poppler's `pdftoppm`.
pub struct PdftoppmConverter {
    binary: PathBuf,
    resolution_dpi: u32,
}

impl PdftoppmConverter {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            resolution_dpi: 150,
        }
    }
}

#[async_trait]
impl DocumentConverter for PdftoppmConverter {
    async fn convert_to_image(&self, document: &FileBlob) -> Result<FileBlob, ConversionError> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("input.pdf");
        tokio::fs::write(&input, &document.data).await?;
        let prefix = workdir.path().join("page");

        let output = Command::new(&self.binary)
            .arg("-png")
            .arg("-singlefile")
            .args(["-f", "1", "-l", "1"])
            .arg("-r")
            .arg(self.resolution_dpi.to_string())
            .arg(&input)
            .arg(&prefix)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ConversionError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let data = match tokio::fs::read(prefix.with_extension("png")).await {
            Ok(data) if !data.is_empty() => data,
            Ok(_) => return Err(ConversionError::NoOutput),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConversionError::NoOutput)
            }
            Err(e) => return Err(e.into()),
        };
        debug!("Rendered {} to {} byte PNG", document.name, data.len());

        let stem = Path::new(&document.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("resume");
        Ok(FileBlob::new(
            format!("{stem}.png"),
            Some("image/png".to_string()),
            data,
        ))
    }
}

/// Source of record identifiers.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> Uuid;
}

pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}
