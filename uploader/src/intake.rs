//! File intake: the first stage of an upload.
//!
//! Accepts a roster file by name and content, decides how it will be parsed
//! from its extension, and fingerprints the bytes with MD5 so log lines about
//! the same upload can be correlated.

use displaydoc::Display;
use log::debug;
use md5::Context;
use std::error::Error as StdError;
use std::path::Path;

/// How an upload file is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
}

impl FileFormat {
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".csv") {
            Some(FileFormat::Csv)
        } else if lower.ends_with(".xlsx") {
            Some(FileFormat::Xlsx)
        } else {
            None
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            FileFormat::Csv => "text/csv",
            FileFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }
}

#[derive(Debug, Display)]
pub enum IntakeError {
    /// The file must end with .csv or .xlsx (got "{0}")
    UnsupportedFormat(String),
    /// The file "{0}" is empty
    Empty(String),
    /// Could not read "{0}": {1}
    Io(String, std::io::Error),
}

impl StdError for IntakeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            IntakeError::Io(_, e) => Some(e),
            _ => None,
        }
    }
}

/// A roster file held in memory for the rest of the workflow.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub format: FileFormat,
    pub bytes: Vec<u8>,
    /// Hex MD5 of `bytes`.
    pub digest: String,
}

impl FileUpload {
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, IntakeError> {
        let file_name = file_name.into();
        let format = FileFormat::from_file_name(&file_name)
            .ok_or_else(|| IntakeError::UnsupportedFormat(file_name.clone()))?;
        if bytes.is_empty() {
            return Err(IntakeError::Empty(file_name));
        }

        let mut hasher = Context::new();
        hasher.consume(&bytes);
        let digest = format!("{:x}", hasher.finalize());
        debug!(
            "accepted {} ({} bytes, md5 {})",
            file_name,
            bytes.len(),
            digest
        );

        Ok(FileUpload {
            file_name,
            format,
            bytes,
            digest,
        })
    }

    pub async fn read(path: &Path) -> Result<Self, IntakeError> {
        let display = path.display().to_string();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| display.clone());
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| IntakeError::Io(display, e))?;
        Self::from_bytes(file_name, bytes)
    }
}
