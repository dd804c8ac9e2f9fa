use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::models::{ApiConfig, ManifestFile, MetadataResponse, SearchResponse};
use crate::domain::{installer_extension, FileCandidate, SearchResult};

/// Collections the search is restricted to.
const SOFTWARE_SCOPE: &str = "collection:(software OR opensource_software)";
const UNTITLED: &str = "(no title)";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server returned error: {0}")]
    Status(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Clone)]
pub struct ApiClient {
    config: ApiConfig,
    http: Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Self {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });
        Self { config, http }
    }

    /// Base URL extended with percent-encoded path segments
    fn endpoint<I>(&self, segments: I) -> Result<Url>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", self.config.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.config.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .http
            .get(url.clone())
            .timeout(self.config.request_timeout)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::Status(e.to_string()))?;

        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("{} from {}", e, url.path())))
    }

    /// Keyword search over software collections, in server relevance order.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ApiError::InvalidInput("Search query is empty".to_string()));
        }

        let mut url = self.endpoint(["advancedsearch.php"])?;
        url.query_pairs_mut()
            .append_pair("q", &format!("{} AND ({})", SOFTWARE_SCOPE, query))
            .append_pair("fl[]", "identifier")
            .append_pair("fl[]", "title")
            .append_pair("rows", &self.config.search_rows.to_string())
            .append_pair("page", "1")
            .append_pair("output", "json");

        debug!(%url, "Searching archive");
        let response: SearchResponse = self.get_json(url).await?;

        let results: Vec<SearchResult> = response
            .response
            .docs
            .into_iter()
            .filter_map(|doc| {
                let identifier = doc.identifier.filter(|id| !id.trim().is_empty())?;
                let title = doc
                    .title
                    .as_ref()
                    .and_then(|t| t.first())
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .unwrap_or(UNTITLED)
                    .to_string();
                Some(SearchResult { title, identifier })
            })
            .take(self.config.search_rows)
            .collect();

        info!(query, count = results.len(), "Search completed");
        Ok(results)
    }

    /// Installer-like files of an item, in manifest order.
    pub async fn list_files(&self, identifier: &str) -> Result<Vec<FileCandidate>> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(ApiError::InvalidInput("Item identifier is empty".to_string()));
        }

        let url = self.endpoint(["metadata", identifier])?;
        debug!(%url, "Fetching item metadata");
        let metadata: MetadataResponse = self.get_json(url).await?;

        let candidates = self.candidates_from_manifest(identifier, &metadata.files)?;
        info!(
            identifier,
            files = metadata.files.len(),
            candidates = candidates.len(),
            "Manifest filtered"
        );
        Ok(candidates)
    }

    /// Keeps manifest entries with an installer extension. Same-named entries
    /// are all kept.
    pub fn candidates_from_manifest(
        &self,
        identifier: &str,
        files: &[ManifestFile],
    ) -> Result<Vec<FileCandidate>> {
        files
            .iter()
            .filter_map(|file| {
                installer_extension(&file.name).map(|extension| (file, extension))
            })
            .map(|(file, extension)| {
                Ok(FileCandidate {
                    name: file.name.clone(),
                    extension,
                    size: file.size.as_ref().and_then(|s| s.bytes()),
                    download_url: self.download_url(identifier, &file.name)?,
                })
            })
            .collect()
    }

    /// `{base}/download/{identifier}/{name}`; subdirectories in `name` stay
    /// path separators.
    pub fn download_url(&self, identifier: &str, name: &str) -> Result<String> {
        let segments = ["download", identifier]
            .into_iter()
            .chain(name.split('/').filter(|s| !s.is_empty()));
        Ok(self.endpoint(segments)?.to_string())
    }

    pub fn item_page_url(&self, identifier: &str) -> Result<String> {
        Ok(self.endpoint(["details", identifier])?.to_string())
    }

    /// Download file with progress stream
    /// Returns (total_size, stream)
    pub async fn download_file_stream(
        &self,
        download_url: &str,
    ) -> Result<(Option<u64>, BoxStream<'static, Result<bytes::Bytes>>)> {
        let response = self
            .http
            .get(download_url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::Status(format!("Download request failed: {}", e)))?;

        let total_size = response.content_length();
        let stream = response.bytes_stream().map_err(ApiError::Request).boxed();

        Ok((total_size, stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::SizeField;
    use mockito::Matcher;

    fn client_for(base_url: &str) -> ApiClient {
        ApiClient::new(ApiConfig {
            base_url: base_url.to_string(),
            search_rows: 3,
            ..ApiConfig::default()
        })
    }

    fn manifest(names: &[&str]) -> Vec<ManifestFile> {
        names
            .iter()
            .map(|name| ManifestFile {
                name: name.to_string(),
                size: Some(SizeField::Text("1024".to_string())),
            })
            .collect()
    }

    #[test]
    fn test_filter_keeps_installers_case_insensitively() {
        let client = client_for("https://archive.org");
        let files = manifest(&["Setup.EXE", "readme.txt", "data.ISO", "install.zip"]);
        let names: Vec<String> = client
            .candidates_from_manifest("item", &files)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Setup.EXE", "data.ISO", "install.zip"]);
    }

    #[test]
    fn test_filter_is_idempotent_and_keeps_duplicates() {
        let client = client_for("https://archive.org");
        let files = manifest(&["a/setup.exe", "b/setup.exe", "notes.nfo", "c.rar"]);
        let first = client.candidates_from_manifest("item", &files).unwrap();
        let second = client.candidates_from_manifest("item", &files).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].size, Some(1024));
        assert_ne!(first[0].download_url, first[1].download_url);
    }

    #[test]
    fn test_download_url_is_deterministic_and_encoded() {
        let client = client_for("https://archive.org");
        let a = client.download_url("win 3.11", "disk 1/SETUP.EXE").unwrap();
        let b = client.download_url("win 3.11", "disk 1/SETUP.EXE").unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a,
            "https://archive.org/download/win%203.11/disk%201/SETUP.EXE"
        );
    }

    #[test]
    fn test_item_page_url() {
        let client = client_for("https://archive.org/");
        assert_eq!(
            client.item_page_url("winzip81").unwrap(),
            "https://archive.org/details/winzip81"
        );
    }

    #[tokio::test]
    async fn test_empty_query_makes_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let err = client.search("   ").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_preserves_order_and_caps_results() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/advancedsearch.php")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded(
                    "q".into(),
                    "collection:(software OR opensource_software) AND (winzip)".into(),
                ),
                Matcher::UrlEncoded("rows".into(), "3".into()),
                Matcher::UrlEncoded("page".into(), "1".into()),
                Matcher::UrlEncoded("output".into(), "json".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"response":{"numFound":5,"docs":[
                    {"identifier":"zeta","title":"Zeta"},
                    {"identifier":"alpha","title":["Alpha","Alt"]},
                    {"title":"No identifier"},
                    {"identifier":"untitled"},
                    {"identifier":"extra","title":"Extra"}
                ]}}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server.url());
        let results = client.search("  winzip ").await.unwrap();
        mock.assert_async().await;

        assert_eq!(
            results,
            vec![
                SearchResult { title: "Zeta".into(), identifier: "zeta".into() },
                SearchResult { title: "Alpha".into(), identifier: "alpha".into() },
                SearchResult { title: UNTITLED.into(), identifier: "untitled".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_search_server_error_is_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/advancedsearch.php")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let err = client_for(&server.url()).search("dos").await.unwrap_err();
        assert!(matches!(err, ApiError::Status(_)));
    }

    #[tokio::test]
    async fn test_search_malformed_body_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/advancedsearch.php")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let err = client_for(&server.url()).search("dos").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_list_files_filters_manifest() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/metadata/office97")
            .with_status(200)
            .with_body(
                r#"{"metadata":{"identifier":"office97"},"files":[
                    {"name":"Setup.EXE","size":"2048"},
                    {"name":"readme.txt","size":"10"},
                    {"name":"data.ISO","size":650000000},
                    {"name":"install.zip"},
                    {"size":"1"}
                ]}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server.url());
        let files = client.list_files("office97").await.unwrap();

        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Setup.EXE", "data.ISO", "install.zip"]);
        assert_eq!(files[0].extension, "exe");
        assert_eq!(files[0].size, Some(2048));
        assert_eq!(files[1].size, Some(650_000_000));
        assert_eq!(files[2].size, None);
        assert_eq!(
            files[0].download_url,
            format!("{}/download/office97/Setup.EXE", server.url())
        );
    }

    #[tokio::test]
    async fn test_list_files_without_matches_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/metadata/missing")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let files = client_for(&server.url()).list_files("missing").await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_list_files_rejects_unexpected_shape() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/metadata/odd")
            .with_status(200)
            .with_body(r#"{"files":"nope"}"#)
            .create_async()
            .await;

        let err = client_for(&server.url()).list_files("odd").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }
}
