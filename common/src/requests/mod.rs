use crate::model::id::Id;
use crate::model::upload_row::UploadRow;
use serde::{Deserialize, Serialize};

/// Body of `POST /batch-management/create-with-students`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBatchRequest {
    pub name: String,
    pub campus_ids: Vec<Id>,
    pub course_ids: Vec<Id>,
    pub students: Vec<UploadRow>,
}

/// Body of `PUT /batch-management/{id}`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBatchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campus_ids: Option<Vec<Id>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_ids: Option<Vec<Id>>,
}

impl UpdateBatchRequest {
    pub fn rename(name: impl Into<String>) -> Self {
        UpdateBatchRequest {
            name: Some(name.into()),
            ..UpdateBatchRequest::default()
        }
    }
}
