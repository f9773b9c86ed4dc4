//! Response shapes of the batch-management backend.
//!
//! Every endpoint answers with the same loose envelope
//! (`{success, message, data, errors}`), and some endpoints wrap the payload
//! once more (`data.data`). These types exist only to be decoded and narrowed
//! at the HTTP boundary; pipeline code receives the inner payload.

use crate::model::batch::Batch;
use crate::model::credential::Credential;
use crate::model::failure::RowFailure;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Absent means the status code alone decides.
    #[serde(default = "success_by_default")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "none")]
    pub data: Option<Payload<T>>,
    #[serde(default)]
    pub errors: Option<Vec<RowFailure>>,
}

fn success_by_default() -> bool {
    true
}

fn none<T>() -> Option<T> {
    None
}

impl<T> Envelope<T> {
    /// The payload, whichever of the two nestings the backend used.
    pub fn into_data(self) -> Option<T> {
        self.data.map(Payload::into_inner)
    }

    /// Splits the envelope into its parts, with the payload unwrapped.
    pub fn into_parts(self) -> (Option<String>, Option<T>, Vec<RowFailure>) {
        (
            self.message,
            self.data.map(Payload::into_inner),
            self.errors.unwrap_or_default(),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload<T> {
    Nested { data: T },
    Bare(T),
}

impl<T> Payload<T> {
    pub fn into_inner(self) -> T {
        match self {
            Payload::Nested { data } => data,
            Payload::Bare(data) => data,
        }
    }
}

/// `data` of a batch creation response. On a partial success (207) both
/// lists are populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatedStudents {
    #[serde(default)]
    pub created_students: Vec<Credential>,
    #[serde(default)]
    pub errors: Vec<RowFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<Batch>,
}
