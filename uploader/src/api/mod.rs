//! HTTP boundary with the batch-management backend.
//!
//! This is the only module that sees raw responses. Whatever nesting the
//! backend used (`data`, `data.data`, or a bare body) is narrowed here into
//! typed values, and failures into [`ApiError`], before anything reaches the
//! pipeline.
//!
//! The pipeline depends on the [`BatchApi`] trait rather than on
//! [`ApiClient`] directly, so a workflow can run against an in-memory fake.

use crate::intake::FileUpload;
use crate::session::Session;
use common::model::batch::{Batch, Campus, Course};
use common::model::failure::RowFailure;
use common::model::id::Id;
use common::model::upload_row::UploadRow;
use common::requests::{CreateBatchRequest, UpdateBatchRequest};
use common::responses::{CreatedStudents, Envelope};
use displaydoc::Display;
use log::{debug, warn};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT},
    multipart::{Form, Part},
    Client as HttpClient, Response, StatusCode, Url,
};
use serde::de::DeserializeOwned;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

const UPLOADER_USER_AGENT: &str = concat!("uploader/", env!("CARGO_PKG_VERSION"));

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const VALIDATE_UPLOAD_PATH: &str = "batch-management/validate-student-upload";
const CREATE_BATCH_PATH: &str = "batch-management/create-with-students";
const CAMPUSES_PATH: &str = "batch-management/campuses";
const COURSES_PATH: &str = "batch-management/courses";
const BATCHES_PATH: &str = "batch-management/";

/// An API error.
#[derive(Debug, Display)]
pub enum ApiError {
    /// {0}
    Structured(StructuredApiError),

    /// HTTP {0}: {1}
    Unstructured(StatusCode, String),

    /// Could not reach the server: {0}
    Transport(reqwest::Error),

    /// Unexpected response from {0}: {1}
    Decode(String, String),

    /// Invalid request: {0}
    Request(String),
}

/// Error body the backend sent along with a non-success status.
#[derive(Debug, Clone)]
pub struct StructuredApiError {
    pub status: StatusCode,
    pub message: String,
    pub errors: Vec<RowFailure>,
}

/// Raw outcome of batch creation, before the committer interprets it.
///
/// Creation is the one call where a non-success status still carries a
/// payload worth reading (per-row failures), so the status is handed back
/// instead of being turned into an error here.
#[derive(Debug, Clone)]
pub struct ApiReply<T> {
    pub status: StatusCode,
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
    pub errors: Vec<RowFailure>,
}

/// Operations the upload pipeline needs from the backend.
#[allow(async_fn_in_trait)]
pub trait BatchApi {
    async fn list_campuses(&self) -> Result<Vec<Campus>, ApiError>;

    async fn list_courses(&self, campus_ids: &[Id]) -> Result<Vec<Course>, ApiError>;

    async fn list_batches(&self) -> Result<Vec<Batch>, ApiError>;

    /// Uploads the roster for authoritative validation. The answer has the
    /// same rows, annotated with `errors`.
    async fn validate_upload(
        &self,
        upload: &FileUpload,
        campus_id: &Id,
    ) -> Result<Vec<UploadRow>, ApiError>;

    async fn create_batch(
        &self,
        request: &CreateBatchRequest,
    ) -> Result<ApiReply<CreatedStudents>, ApiError>;

    /// Returns the updated batch when the backend echoes it.
    async fn update_batch(
        &self,
        id: &Id,
        request: &UpdateBatchRequest,
    ) -> Result<Option<Batch>, ApiError>;

    async fn delete_batch(&self, id: &Id) -> Result<(), ApiError>;
}

/// The batch-management API client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// Base endpoint of the server.
    endpoint: Url,

    /// An initialized HTTP client.
    client: HttpClient,
}

impl ApiClient {
    pub fn new(session: &Session) -> Result<Self, ApiError> {
        Ok(Self {
            endpoint: session.base_url.clone(),
            client: build_http_client(session.token.as_deref())?,
        })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.endpoint
            .join(path)
            .map_err(|e| ApiError::Request(format!("{}: {}", path, e)))
    }

    /// Reads a success body into `T`, or turns the response into an error.
    async fn read_data<T: DeserializeOwned>(res: Response, what: &str) -> Result<T, ApiError> {
        if !res.status().is_success() {
            return Err(ApiError::try_from_response(res).await?);
        }
        let text = res.text().await?;
        narrow(&text).ok_or_else(|| {
            ApiError::Decode(what.to_string(), format!("no {} payload in body", what))
        })
    }
}

impl BatchApi for ApiClient {
    async fn list_campuses(&self) -> Result<Vec<Campus>, ApiError> {
        let res = self.client.get(self.url(CAMPUSES_PATH)?).send().await?;
        Self::read_data(res, "campuses").await
    }

    async fn list_courses(&self, campus_ids: &[Id]) -> Result<Vec<Course>, ApiError> {
        let mut endpoint = self.url(COURSES_PATH)?;
        let joined: Vec<&str> = campus_ids.iter().map(Id::as_str).collect();
        endpoint
            .query_pairs_mut()
            .append_pair("campus_ids", &joined.join(","));

        let res = self.client.get(endpoint).send().await?;
        Self::read_data(res, "courses").await
    }

    async fn list_batches(&self) -> Result<Vec<Batch>, ApiError> {
        let res = self.client.get(self.url(BATCHES_PATH)?).send().await?;
        Self::read_data(res, "batches").await
    }

    async fn validate_upload(
        &self,
        upload: &FileUpload,
        campus_id: &Id,
    ) -> Result<Vec<UploadRow>, ApiError> {
        let file = Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(upload.format.mime_type())?;
        let form = Form::new()
            .text("campus_id", campus_id.to_string())
            .part("file", file);

        debug!(
            "validating {} (md5 {}) for campus {}",
            upload.file_name, upload.digest, campus_id
        );
        let res = self
            .client
            .post(self.url(VALIDATE_UPLOAD_PATH)?)
            .multipart(form)
            .send()
            .await?;
        Self::read_data(res, "validated rows").await
    }

    async fn create_batch(
        &self,
        request: &CreateBatchRequest,
    ) -> Result<ApiReply<CreatedStudents>, ApiError> {
        debug!(
            "creating batch \"{}\" with {} students",
            request.name,
            request.students.len()
        );
        let res = self
            .client
            .post(self.url(CREATE_BATCH_PATH)?)
            .json(request)
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;
        match serde_json::from_str::<Envelope<CreatedStudents>>(&text) {
            Ok(envelope) => {
                let success = envelope.success;
                let (message, data, errors) = envelope.into_parts();
                Ok(ApiReply {
                    status,
                    success,
                    message,
                    data,
                    errors,
                })
            }
            Err(e) if status.is_success() => {
                Err(ApiError::Decode("batch creation".to_string(), e.to_string()))
            }
            Err(_) => {
                warn!("batch creation failed with HTTP {}", status);
                Err(ApiError::Unstructured(status, text))
            }
        }
    }

    async fn update_batch(
        &self,
        id: &Id,
        request: &UpdateBatchRequest,
    ) -> Result<Option<Batch>, ApiError> {
        let endpoint = self.url(&format!("{}{}", BATCHES_PATH, id))?;
        let res = self.client.put(endpoint).json(request).send().await?;
        if !res.status().is_success() {
            return Err(ApiError::try_from_response(res).await?);
        }
        let text = res.text().await?;
        Ok(narrow(&text))
    }

    async fn delete_batch(&self, id: &Id) -> Result<(), ApiError> {
        let endpoint = self.url(&format!("{}{}", BATCHES_PATH, id))?;
        let res = self.client.delete(endpoint).send().await?;
        if res.status().is_success() {
            Ok(())
        } else {
            Err(ApiError::try_from_response(res).await?)
        }
    }
}

/// Pulls a `T` out of a body, wherever the backend put it.
fn narrow<T: DeserializeOwned>(text: &str) -> Option<T> {
    if let Ok(envelope) = serde_json::from_str::<Envelope<T>>(text) {
        if let Some(data) = envelope.into_data() {
            return Some(data);
        }
    }
    serde_json::from_str::<T>(text).ok()
}

impl StdError for ApiError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ApiError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        ApiError::Transport(error)
    }
}

impl ApiError {
    async fn try_from_response(response: Response) -> Result<Self, ApiError> {
        let status = response.status();
        let text = response.text().await?;
        match serde_json::from_str::<Envelope<serde_json::Value>>(&text) {
            Ok(envelope) if envelope.message.is_some() || envelope.errors.is_some() => {
                let (message, _, errors) = envelope.into_parts();
                Ok(Self::Structured(StructuredApiError {
                    status,
                    message: message.unwrap_or_else(|| status.to_string()),
                    errors,
                }))
            }
            _ => Ok(Self::Unstructured(status, text)),
        }
    }

    /// Whether the request never got an answer.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }

    /// HTTP status of the answer, if there was one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Structured(e) => Some(e.status),
            ApiError::Unstructured(status, _) => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for StructuredApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            0 => write!(f, "{}", self.message),
            1 => write!(f, "{}: {}", self.message, self.errors[0]),
            n => write!(f, "{} ({} errors)", self.message, n),
        }
    }
}

fn build_http_client(token: Option<&str>) -> Result<HttpClient, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(UPLOADER_USER_AGENT));

    if let Some(token) = token {
        let auth_header = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ApiError::Request("token is not a valid header value".to_string()))?;
        headers.insert(AUTHORIZATION, auth_header);
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(ApiError::Transport)
}
