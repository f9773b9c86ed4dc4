use reqwest::Url;

/// Connection context handed to the API client.
///
/// The dashboard kept its token in browser storage and read it wherever it
/// was needed; here it is passed in explicitly so each workflow can be built
/// against any backend, including a mock one in tests.
#[derive(Debug, Clone)]
pub struct Session {
    /// Base endpoint. Always ends with `/` so relative paths join under it.
    pub base_url: Url,
    pub token: Option<String>,
}

impl Session {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, url::ParseError> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        Ok(Session {
            base_url: Url::parse(&normalized)?,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }
}
