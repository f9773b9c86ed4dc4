//! Batch committer: creates the batch with the rows validation left clean.
//!
//! Whatever status the backend answers with, the reply goes through
//! [`interpret`]. Full success, partial success (207, or any answer that
//! carries both created accounts and failures) and rejection are all decided
//! there, in one place.

use crate::api::{ApiError, ApiReply, BatchApi};
use common::model::batch::Batch;
use common::model::credential::Credential;
use common::model::failure::RowFailure;
use common::model::id::Id;
use common::model::upload_row::UploadRow;
use common::requests::CreateBatchRequest;
use common::responses::CreatedStudents;
use displaydoc::Display;
use log::{info, warn};
use reqwest::StatusCode;
use std::error::Error as StdError;
use std::fmt;

/// How many backend failures are listed before the rest is summarized.
pub const DEFAULT_ERROR_PREVIEW_LIMIT: usize = 5;

/// Batch metadata entered in the form.
#[derive(Debug, Clone, Default)]
pub struct BatchDraft {
    pub name: String,
    pub campus_ids: Vec<Id>,
    pub course_ids: Vec<Id>,
}

/// A form problem that blocks the step before any request is made.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum FormError {
    /// Batch name is required
    MissingName,
    /// Select at least one campus
    NoCampus,
    /// Select at least one course
    NoCourse,
    /// There are no valid students to add
    NoStudents,
}

impl StdError for FormError {}

impl BatchDraft {
    pub fn check(&self) -> Result<(), FormError> {
        if self.name.trim().is_empty() {
            return Err(FormError::MissingName);
        }
        if self.campus_ids.is_empty() {
            return Err(FormError::NoCampus);
        }
        if self.course_ids.is_empty() {
            return Err(FormError::NoCourse);
        }
        Ok(())
    }

    pub fn request(&self, students: Vec<UploadRow>) -> Result<CreateBatchRequest, FormError> {
        self.check()?;
        if students.is_empty() {
            return Err(FormError::NoStudents);
        }
        Ok(CreateBatchRequest {
            name: self.name.trim().to_string(),
            campus_ids: self.campus_ids.clone(),
            course_ids: self.course_ids.clone(),
            students,
        })
    }
}

/// Backend failures, truncated for display.
///
/// Only the first `limit` entries are rendered; the complete list stays
/// available through [`ErrorDigest::all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDigest {
    all: Vec<RowFailure>,
    limit: usize,
}

impl ErrorDigest {
    pub fn new(all: Vec<RowFailure>, limit: usize) -> Self {
        ErrorDigest { all, limit }
    }

    pub fn all(&self) -> &[RowFailure] {
        &self.all
    }

    pub fn shown(&self) -> &[RowFailure] {
        &self.all[..self.all.len().min(self.limit)]
    }

    pub fn hidden_count(&self) -> usize {
        self.all.len().saturating_sub(self.limit)
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

impl fmt::Display for ErrorDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines: Vec<String> = self.shown().iter().map(|e| e.to_string()).collect();
        if self.hidden_count() > 0 {
            lines.push(format!("...and {} more", self.hidden_count()));
        }
        f.write_str(&lines.join("\n"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    /// Every submitted row became an account.
    Complete,
    /// Some rows were refused; the rest were created.
    Partial,
}

/// A successful commit. Carries the one and only copy of the credentials.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub kind: CommitKind,
    pub message: String,
    pub credentials: Vec<Credential>,
    pub failures: ErrorDigest,
    pub batch: Option<Batch>,
}

#[derive(Debug, Display)]
pub enum CommitError {
    /// {message}
    Rejected {
        message: String,
        failures: ErrorDigest,
    },
    /// {0}
    Api(ApiError),
}

impl StdError for CommitError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            CommitError::Api(e) => Some(e),
            CommitError::Rejected { .. } => None,
        }
    }
}

/// Submits the batch and interprets the answer.
pub async fn commit<A: BatchApi>(
    api: &A,
    request: &CreateBatchRequest,
    error_preview_limit: usize,
) -> Result<CommitOutcome, CommitError> {
    let reply = api.create_batch(request).await.map_err(CommitError::Api)?;
    let outcome = interpret(reply, error_preview_limit)?;
    match outcome.kind {
        CommitKind::Complete => info!(
            "batch \"{}\" created with {} new accounts",
            request.name,
            outcome.credentials.len()
        ),
        CommitKind::Partial => warn!(
            "batch \"{}\" partially created: {} new accounts, {} rows refused",
            request.name,
            outcome.credentials.len(),
            outcome.failures.len()
        ),
    }
    Ok(outcome)
}

/// The single decision point for every batch creation reply.
pub fn interpret(
    reply: ApiReply<CreatedStudents>,
    error_preview_limit: usize,
) -> Result<CommitOutcome, CommitError> {
    let ApiReply {
        status,
        success,
        message,
        data,
        errors,
    } = reply;
    let data = data.unwrap_or_default();
    let created = data.created_students;

    let mut failures = data.errors;
    failures.extend(errors);
    let failures = ErrorDigest::new(failures, error_preview_limit);

    // `success: false` with nothing created is a refusal, even under a 2xx.
    let accepted =
        !created.is_empty() || (status.is_success() && success && failures.is_empty());
    if !accepted {
        let message = message
            .unwrap_or_else(|| format!("Batch creation failed (HTTP {})", status.as_u16()));
        return Err(CommitError::Rejected { message, failures });
    }

    let kind = if failures.is_empty() && status != StatusCode::MULTI_STATUS {
        CommitKind::Complete
    } else {
        CommitKind::Partial
    };
    let message = message.unwrap_or_else(|| match kind {
        CommitKind::Complete => format!("Batch created with {} students", created.len()),
        CommitKind::Partial if failures.is_empty() => {
            format!("Created {} students", created.len())
        }
        CommitKind::Partial => format!(
            "Created {} students; {} rows failed",
            created.len(),
            failures.len()
        ),
    });

    Ok(CommitOutcome {
        kind,
        message,
        credentials: created,
        failures,
        batch: data.batch,
    })
}
