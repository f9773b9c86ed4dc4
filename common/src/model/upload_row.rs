use serde::{Deserialize, Deserializer, Serialize};

/// One prospective student, as read from an upload file.
///
/// Rows are created by the parser, annotated with `errors` by client checks
/// and then by the backend validation endpoint, and finally submitted as the
/// `students` of a batch. A row with an empty `errors` list is committable.
///
/// The same shape travels both ways: the validation endpoint returns the rows
/// it was sent with its own `errors` filled in, so the backend response can
/// replace the client-side copy wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRow {
    /// 1-based line in the source file (the header is line 1).
    /// Only used for display; absent on rows the backend made up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub campus_name: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub course_name: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub student_name: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub roll_number: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub email: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub mobile_number: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "nullable_list")]
    pub errors: Vec<String>,
}

impl UploadRow {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Copy of the row as it should be submitted: no annotations.
    pub fn for_submission(&self) -> UploadRow {
        UploadRow {
            errors: Vec::new(),
            ..self.clone()
        }
    }
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
