//! One upload, from file to exported credentials.
//!
//! Stages run strictly in order: a file is taken in and parsed, the backend
//! validates it, the batch is committed, and the generated credentials are
//! kept until they have been exported once, then dropped. Every request-issuing step borrows the workflow
//! mutably, so there is never more than one request in flight per workflow.
//! A step that fails leaves the workflow in the state it was in before.

use crate::api::{ApiError, BatchApi};
use crate::committer::{self, BatchDraft, CommitError, CommitKind, ErrorDigest, FormError};
use crate::export::{CredentialSheet, ExportError};
use crate::intake::{FileUpload, IntakeError};
use crate::parser::{self, ParseError};
use crate::validator::{self, Rules, ValidationReport};
use common::model::batch::Batch;
use common::model::id::Id;
use common::model::upload_row::UploadRow;
use displaydoc::Display;
use log::{info, warn};
use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Waiting for a file.
    Empty,
    /// File parsed and checked locally.
    Parsed,
    /// Backend validation merged.
    Validated,
    /// Batch created; credentials may still be waiting for export.
    Committed,
    Closed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Empty => "waiting for a file",
            Stage::Parsed => "parsed",
            Stage::Validated => "validated",
            Stage::Committed => "committed",
            Stage::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Display)]
pub enum WorkflowError {
    /// Cannot {action} once the upload is {stage}
    OutOfOrder { action: &'static str, stage: Stage },
    /// {0}
    Intake(IntakeError),
    /// {0}
    Parse(ParseError),
    /// {0}
    Form(FormError),
    /// {0}
    Api(ApiError),
    /// {0}
    Commit(CommitError),
    /// {0}
    Export(ExportError),
    /// The generated credentials have not been exported yet
    CredentialsPending,
    /// There are no credentials waiting to be exported
    NoCredentials,
}

impl StdError for WorkflowError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            WorkflowError::Intake(e) => Some(e),
            WorkflowError::Parse(e) => Some(e),
            WorkflowError::Form(e) => Some(e),
            WorkflowError::Api(e) => Some(e),
            WorkflowError::Commit(e) => Some(e),
            WorkflowError::Export(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub rules: Rules,
    pub error_preview_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            rules: Rules::default(),
            error_preview_limit: committer::DEFAULT_ERROR_PREVIEW_LIMIT,
        }
    }
}

/// What a successful commit reported, minus the credentials.
#[derive(Debug, Clone)]
pub struct CommitReport {
    pub kind: CommitKind,
    pub message: String,
    pub created: usize,
    pub failures: ErrorDigest,
    pub batch: Option<Batch>,
}

#[derive(Debug)]
enum Credentials {
    None,
    Pending(CredentialSheet),
    Delivered,
}

pub struct UploadWorkflow<'a, A> {
    id: Uuid,
    api: &'a A,
    settings: Settings,
    stage: Stage,
    upload: Option<FileUpload>,
    parsed: Vec<UploadRow>,
    preview: ValidationReport,
    report: Option<CommitReport>,
    credentials: Credentials,
}

impl<'a, A: BatchApi> UploadWorkflow<'a, A> {
    pub fn new(api: &'a A, settings: Settings) -> Self {
        UploadWorkflow {
            id: Uuid::new_v4(),
            api,
            settings,
            stage: Stage::Empty,
            upload: None,
            parsed: Vec::new(),
            preview: ValidationReport::default(),
            report: None,
            credentials: Credentials::None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn preview(&self) -> &ValidationReport {
        &self.preview
    }

    pub fn report(&self) -> Option<&CommitReport> {
        self.report.as_ref()
    }

    fn out_of_order(&self, action: &'static str) -> WorkflowError {
        WorkflowError::OutOfOrder {
            action,
            stage: self.stage,
        }
    }

    /// Takes in a file, replacing any earlier one, and shows the local
    /// preview. No request is made.
    pub fn intake(&mut self, upload: FileUpload) -> Result<&ValidationReport, WorkflowError> {
        if matches!(self.stage, Stage::Committed | Stage::Closed) {
            return Err(self.out_of_order("take in a file"));
        }
        let rows = parser::parse_upload(&upload, self.settings.rules.require_mobile)
            .map_err(WorkflowError::Parse)?;
        let rows = validator::precheck(rows, &self.settings.rules);

        info!(
            "[{}] {} (md5 {}): {} rows, {} flagged locally",
            self.id,
            upload.file_name,
            upload.digest,
            rows.len(),
            rows.iter().filter(|r| !r.is_valid()).count()
        );
        self.preview = ValidationReport::new(rows.clone());
        self.parsed = rows;
        self.upload = Some(upload);
        self.stage = Stage::Parsed;
        Ok(&self.preview)
    }

    /// Sends the file to the backend for validation. The backend's rows
    /// replace the local preview.
    pub async fn validate(&mut self, campus_id: &Id) -> Result<&ValidationReport, WorkflowError> {
        if !matches!(self.stage, Stage::Parsed | Stage::Validated) {
            return Err(self.out_of_order("validate"));
        }
        let upload = self
            .upload
            .as_ref()
            .ok_or_else(|| self.out_of_order("validate"))?;

        let server_rows = self
            .api
            .validate_upload(upload, campus_id)
            .await
            .map_err(|e| {
                warn!("[{}] validation request failed: {}", self.id, e);
                WorkflowError::Api(e)
            })?;

        self.preview = ValidationReport::authoritative(&self.parsed, server_rows);
        self.stage = Stage::Validated;
        info!("[{}] {}", self.id, self.preview.summary());
        Ok(&self.preview)
    }

    /// Creates the batch from every row the backend left without errors.
    pub async fn commit(&mut self, draft: &BatchDraft) -> Result<&CommitReport, WorkflowError> {
        if self.stage != Stage::Validated {
            return Err(self.out_of_order("create the batch"));
        }
        let request = draft
            .request(self.preview.committable())
            .map_err(WorkflowError::Form)?;

        let outcome = committer::commit(self.api, &request, self.settings.error_preview_limit)
            .await
            .map_err(|e| {
                warn!("[{}] batch creation failed: {}", self.id, e);
                WorkflowError::Commit(e)
            })?;

        let created = outcome.credentials.len();
        self.credentials = if outcome.credentials.is_empty() {
            Credentials::Delivered
        } else {
            Credentials::Pending(CredentialSheet::new(request.name.clone(), outcome.credentials))
        };
        self.stage = Stage::Committed;
        Ok(self.report.insert(CommitReport {
            kind: outcome.kind,
            message: outcome.message,
            created,
            failures: outcome.failures,
            batch: outcome.batch,
        }))
    }

    /// Credentials still waiting to be exported. Looking at them does not
    /// count as exporting them.
    pub fn credentials(&self) -> Option<&CredentialSheet> {
        match &self.credentials {
            Credentials::Pending(sheet) => Some(sheet),
            _ => None,
        }
    }

    /// Writes the pending credentials into `dir`. If the write fails they
    /// stay pending and the workflow still refuses to close.
    pub async fn export_credentials(&mut self, dir: &Path) -> Result<PathBuf, WorkflowError> {
        let Credentials::Pending(sheet) = &self.credentials else {
            return Err(WorkflowError::NoCredentials);
        };
        let path = sheet.write_to(dir).await.map_err(|e| {
            warn!("[{}] credential export failed: {}", self.id, e);
            WorkflowError::Export(e)
        })?;
        self.mark_exported();
        Ok(path)
    }

    /// Records that the caller exported the credentials some other way.
    /// After this they are dropped and cannot be read again.
    pub fn mark_exported(&mut self) {
        if let Credentials::Pending(sheet) = &self.credentials {
            info!("[{}] {} credentials exported", self.id, sheet.len());
            self.credentials = Credentials::Delivered;
        }
    }

    pub fn can_close(&self) -> bool {
        !matches!(self.credentials, Credentials::Pending(_))
    }

    /// Ends the workflow. Refused while credentials are still waiting.
    pub fn close(&mut self) -> Result<(), WorkflowError> {
        if !self.can_close() {
            return Err(WorkflowError::CredentialsPending);
        }
        self.stage = Stage::Closed;
        Ok(())
    }
}
