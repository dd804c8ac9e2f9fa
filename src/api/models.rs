use std::time::Duration;

use serde::Deserialize;

/// Response from the advanced search endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub response: SearchDocs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchDocs {
    #[serde(default)]
    pub docs: Vec<SearchDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchDoc {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub title: Option<TextField>,
}

/// The archive returns some fields either as a string or a list of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextField {
    One(String),
    Many(Vec<String>),
}

impl TextField {
    pub fn first(&self) -> Option<&str> {
        match self {
            TextField::One(s) => Some(s.as_str()),
            TextField::Many(v) => v.first().map(String::as_str),
        }
    }
}

/// Response from the /metadata/{identifier} endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataResponse {
    #[serde(default)]
    pub files: Vec<ManifestFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestFile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: Option<SizeField>,
}

/// File sizes arrive as decimal strings, occasionally as numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SizeField {
    Number(u64),
    Text(String),
}

impl SizeField {
    pub fn bytes(&self) -> Option<u64> {
        match self {
            SizeField::Number(n) => Some(*n),
            SizeField::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Configuration for the archive client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    /// Page size for searches; also the upper bound on returned results.
    pub search_rows: usize,
    /// Whole-request timeout for search and metadata calls. Downloads only
    /// use `connect_timeout` and `read_timeout`.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Longest silence tolerated between two reads of a response body.
    pub read_timeout: Duration,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://archive.org".to_string(),
            search_rows: 50,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(15),
            read_timeout: Duration::from_secs(60),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
