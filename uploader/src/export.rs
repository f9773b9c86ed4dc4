//! CSV artifacts produced on the client: generated credentials and the
//! empty upload template.
//!
//! Both go through [`encode_csv`]: every field double-quoted, embedded quotes
//! doubled, CRLF after every record. The encoding is a pure function of its
//! input, so exporting the same credentials twice gives the same bytes.

use crate::parser::Field;
use common::model::credential::Credential;
use displaydoc::Display;
use log::info;
use std::error::Error as StdError;
use std::path::{Path, PathBuf};

pub const CREDENTIALS_HEADER: [&str; 4] = ["Student Name", "Username", "Password", "Email"];

pub const TEMPLATE_FILE_NAME: &str = "student_upload_template.csv";

/// Shown with the credentials, before the user can leave the screen.
pub const ONE_TIME_WARNING: &str = "These passwords are shown only once. \
Download the credentials file now: they cannot be retrieved again.";

#[derive(Debug, Display)]
pub enum ExportError {
    /// Could not encode CSV: {0}
    Csv(csv::Error),
    /// Could not write "{0}": {1}
    Io(String, std::io::Error),
}

impl StdError for ExportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ExportError::Csv(e) => Some(e),
            ExportError::Io(_, e) => Some(e),
        }
    }
}

impl From<csv::Error> for ExportError {
    fn from(error: csv::Error) -> Self {
        ExportError::Csv(error)
    }
}

/// Encodes a header and rows as fully quoted, CRLF-terminated CSV.
pub fn encode_csv<R, S>(header: &[&str], rows: impl IntoIterator<Item = R>) -> Result<Vec<u8>, ExportError>
where
    R: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::Csv(csv::Error::from(e.into_error())))
}

/// Turns a batch name into something safe to use as a file name.
pub fn file_stem(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            stem.push(ch);
        } else if !stem.ends_with('_') {
            stem.push('_');
        }
    }
    stem.trim_matches('_').to_string()
}

/// Credentials generated for one batch, ready to be shown and exported.
#[derive(Debug, Clone)]
pub struct CredentialSheet {
    batch_name: String,
    credentials: Vec<Credential>,
}

impl CredentialSheet {
    pub fn new(batch_name: impl Into<String>, credentials: Vec<Credential>) -> Self {
        CredentialSheet {
            batch_name: batch_name.into(),
            credentials,
        }
    }

    pub fn batch_name(&self) -> &str {
        &self.batch_name
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn warning(&self) -> &'static str {
        ONE_TIME_WARNING
    }

    pub fn file_name(&self) -> String {
        let stem = file_stem(&self.batch_name);
        if stem.is_empty() {
            "batch_credentials.csv".to_string()
        } else {
            format!("{}_credentials.csv", stem)
        }
    }

    pub fn to_csv(&self) -> Result<Vec<u8>, ExportError> {
        encode_csv(
            &CREDENTIALS_HEADER,
            self.credentials.iter().map(|c| {
                [
                    c.student_name.as_str(),
                    c.username.as_str(),
                    c.password.as_str(),
                    c.email.as_str(),
                ]
            }),
        )
    }

    /// Hex MD5 of the encoded CSV.
    pub fn fingerprint(&self) -> Result<String, ExportError> {
        Ok(format!("{:x}", md5::compute(self.to_csv()?)))
    }

    /// Writes the CSV into `dir` and returns its path.
    pub async fn write_to(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let bytes = self.to_csv()?;
        let path = dir.join(self.file_name());
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ExportError::Io(path.display().to_string(), e))?;
        info!(
            "exported {} credentials to {} (md5 {:x})",
            self.credentials.len(),
            path.display(),
            md5::compute(&bytes)
        );
        Ok(path)
    }
}

/// An empty upload file with one row per selected (campus, course) pair and
/// the student columns left blank.
pub fn upload_template(campuses: &[String], courses: &[String]) -> Result<Vec<u8>, ExportError> {
    let header: Vec<&str> = Field::ALL.iter().map(|f| f.label()).collect();
    let rows = campuses.iter().flat_map(|campus| {
        courses
            .iter()
            .map(move |course| [campus.as_str(), course.as_str(), "", "", "", ""])
    });
    encode_csv(&header, rows)
}

pub async fn write_upload_template(
    dir: &Path,
    campuses: &[String],
    courses: &[String],
) -> Result<PathBuf, ExportError> {
    let bytes = upload_template(campuses, courses)?;
    let path = dir.join(TEMPLATE_FILE_NAME);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| ExportError::Io(path.display().to_string(), e))?;
    info!("wrote upload template to {}", path.display());
    Ok(path)
}
