use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// One row the backend refused while creating a batch.
///
/// Depending on the endpoint version the backend sends either a bare message
/// string or an object naming the row; both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub message: String,
}

impl RowFailure {
    pub fn message(message: impl Into<String>) -> Self {
        RowFailure {
            row: None,
            roll_number: None,
            email: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for RowFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject = self.email.as_deref().or(self.roll_number.as_deref());
        match (self.row, subject) {
            (Some(row), Some(who)) => write!(f, "Row {} ({}): {}", row, who, self.message),
            (Some(row), None) => write!(f, "Row {}: {}", row, self.message),
            (None, Some(who)) => write!(f, "{}: {}", who, self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

impl<'de> Deserialize<'de> for RowFailure {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawFailure {
            Text(String),
            Detailed {
                #[serde(default)]
                row: Option<usize>,
                #[serde(default)]
                roll_number: Option<String>,
                #[serde(default)]
                email: Option<String>,
                #[serde(alias = "error", alias = "reason")]
                message: String,
            },
        }

        Ok(match RawFailure::deserialize(deserializer)? {
            RawFailure::Text(message) => RowFailure::message(message),
            RawFailure::Detailed {
                row,
                roll_number,
                email,
                message,
            } => RowFailure {
                row,
                roll_number,
                email,
                message,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::RowFailure;

    #[test]
    fn accepts_plain_and_detailed_failures() {
        let failures: Vec<RowFailure> = serde_json::from_str(
            r#"["Service busy", {"row": 4, "email": "bo@example.com", "error": "Email already exists"}]"#,
        )
        .unwrap();
        assert_eq!(failures[0].to_string(), "Service busy");
        assert_eq!(
            failures[1].to_string(),
            "Row 4 (bo@example.com): Email already exists"
        );
    }
}
