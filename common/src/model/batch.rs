use crate::model::id::Id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named grouping of campuses and courses plus a roster of students.
///
/// Batches are owned by the backend. The client only keeps a fetched copy
/// for display, and never mutates it except by replacing it with a newer
/// server response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    #[serde(alias = "_id")]
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub campus_ids: BTreeSet<Id>,
    #[serde(default)]
    pub course_ids: BTreeSet<Id>,
    /// Derived on the backend from the roster size.
    #[serde(default)]
    pub student_count: u32,
}

/// Reference data for the batch form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campus {
    #[serde(alias = "_id")]
    pub id: Id,
    pub name: String,
}

/// Reference data for the batch form. Courses are listed per campus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    #[serde(alias = "_id")]
    pub id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campus_id: Option<Id>,
}
