//! Google Drive API connector implementation
//!
//! Implements the `DocumentService` trait for Google Drive API v3.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::storage::{DocumentService, ExportResponse, RemoteDocument};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::GoogleDriveError;
use crate::types::{ApiErrorResponse, DriveFile, FilesListResponse};

/// Google Drive API base URL
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Maximum results per page (Google Drive API limit)
const MAX_PAGE_SIZE: u32 = 1000;

/// Fields to request for file resources
const FILE_FIELDS: &str = "id,name,mimeType,trashed";

const METADATA_TIMEOUT: Duration = Duration::from_secs(30);

/// Google Drive API connector
///
/// # Features
///
/// - Paginated file listing, trashed files excluded
/// - Metadata lookup by id with `404` mapped to `NotFound`
/// - Streamed exports (no retry: the body is consumed by the caller)
/// - Exponential backoff for rate limiting and transient errors
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveConnector;
/// use bridge_traits::storage::DocumentService;
///
/// let connector = GoogleDriveConnector::new(authorized_http_client);
/// let files = connector.list_files().await?;
/// ```
pub struct GoogleDriveConnector {
    /// Authenticated HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    base_url: String,

    retry_policy: RetryPolicy,
}

impl GoogleDriveConnector {
    /// Create a new Google Drive connector
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client that attaches a `drive.readonly` bearer token
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            base_url: DRIVE_API_BASE.to_string(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Point the connector at another API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.base_url)
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.base_url, urlencoding::encode(file_id))
    }

    /// Execute a metadata request with retry logic
    ///
    /// Rate limiting (429) and server errors (5xx) are retried with
    /// exponential backoff, as are transport failures that carry no status.
    /// Any other non-200 status is returned as `ApiError` immediately.
    #[instrument(skip(self), fields(url = %url))]
    async fn get_json(&self, url: String) -> std::result::Result<HttpResponse, GoogleDriveError> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let request = HttpRequest::get(url.clone())
                .header("Accept", "application/json")
                .timeout(METADATA_TIMEOUT);

            match self.http_client.execute(request).await {
                Ok(response) if response.status == 200 => {
                    debug!(status = response.status, "API request succeeded");
                    return Ok(response);
                }
                Ok(response) if response.status == 429 || response.is_server_error() => {
                    let status = response.status;
                    if attempt >= max_attempts {
                        warn!(status, attempts = attempt, "API request failed after retries");
                        return Err(if status == 429 {
                            GoogleDriveError::RateLimitExceeded { attempts: attempt }
                        } else {
                            GoogleDriveError::ApiError {
                                status_code: status,
                                message: ApiErrorResponse::message_from(&response.body),
                            }
                        });
                    }

                    let delay = self.retry_policy.delay_for(attempt);
                    warn!(
                        status,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "API request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Ok(response) => {
                    // Client error - don't retry
                    warn!(status = response.status, "API request failed");
                    return Err(GoogleDriveError::ApiError {
                        status_code: response.status,
                        message: ApiErrorResponse::message_from(&response.body),
                    });
                }
                Err(e) if e.status().is_some() => {
                    // The transport already retried this status
                    return Err(e.into());
                }
                Err(e) => {
                    if attempt >= max_attempts {
                        warn!(error = %e, attempts = attempt, "API request failed after retries");
                        return Err(e.into());
                    }

                    let delay = self.retry_policy.delay_for(attempt);
                    warn!(
                        error = %e,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "API request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(
        response: &HttpResponse,
        what: &str,
    ) -> std::result::Result<T, GoogleDriveError> {
        serde_json::from_slice(&response.body)
            .map_err(|e| GoogleDriveError::ParseError(format!("Failed to parse {}: {}", what, e)))
    }
}

#[async_trait]
impl DocumentService for GoogleDriveConnector {
    #[instrument(skip(self))]
    async fn list_files(&self) -> Result<Vec<RemoteDocument>> {
        info!("Listing files from Google Drive");

        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let mut url = format!(
                "{}?q={}&pageSize={}&fields={}",
                self.files_url(),
                urlencoding::encode("trashed=false"),
                MAX_PAGE_SIZE,
                urlencoding::encode(&format!("nextPageToken,incompleteSearch,files({})", FILE_FIELDS)),
            );

            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
            }

            let response = self.get_json(url).await?;
            let page: FilesListResponse = Self::parse(&response, "files list response")?;
            pages += 1;

            if page.incomplete_search {
                warn!("Google Drive reported an incomplete search");
            }

            documents.extend(
                page.files
                    .into_iter()
                    .filter(|file| !file.trashed)
                    .map(RemoteDocument::from),
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        info!(count = documents.len(), pages, "Listed files from Google Drive");
        Ok(documents)
    }

    #[instrument(skip(self), fields(file_id = %file_id))]
    async fn get_file(&self, file_id: &str) -> Result<RemoteDocument> {
        debug!("Getting file metadata");

        let url = format!(
            "{}?fields={}",
            self.file_url(file_id),
            urlencoding::encode(FILE_FIELDS)
        );

        let response = match self.get_json(url).await {
            Ok(response) => response,
            Err(GoogleDriveError::ApiError {
                status_code: 404, ..
            }) => {
                return Err(GoogleDriveError::FileNotFound {
                    file_id: file_id.to_string(),
                }
                .into())
            }
            Err(e) => return Err(e.into()),
        };

        let file: DriveFile = Self::parse(&response, "file metadata")?;
        Ok(file.into())
    }

    #[instrument(skip(self), fields(file_id = %file_id, mime_type = %mime_type))]
    async fn export_file(&self, file_id: &str, mime_type: &str) -> Result<ExportResponse> {
        debug!("Requesting export");

        let url = format!(
            "{}/export?mimeType={}",
            self.file_url(file_id),
            urlencoding::encode(mime_type)
        );

        let response = self.http_client.execute_stream(HttpRequest::get(url)).await?;

        if response.status != 200 {
            warn!(status = response.status, "Export request was not accepted");
        }

        Ok(ExportResponse {
            status: response.status,
            body: response.body,
        })
    }
}
