use serde::{Deserialize, Serialize};
use std::fmt;

/// Login generated by the backend for a newly created student account.
///
/// Returned exactly once, in the response to batch creation. The plaintext
/// password is never available again, so this value lives only as long as
/// the workflow that received it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub student_name: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
}

// Keeps passwords out of logs and panic messages.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("student_name", &self.student_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}
