//! Google Drive API client.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::auth::Authenticator;
use crate::error::{DriveError, Result};
use crate::models::{ApiErrorResponse, FileListResponse, FileMetadata};
use crate::remote::{RemoteEntry, RemoteLister};

/// Base URL for Google Drive API v3.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Fields requested for every file resource.
const FILE_FIELDS: &str = "id, name, size, mimeType, exportLinks";

/// Largest page size files.list accepts.
const PAGE_SIZE: &str = "1000";

/// Client for reading folders and files from Google Drive.
pub struct DriveClient {
    auth: Authenticator,
    http: Client,
    api_base: String,
}

impl DriveClient {
    /// Create a new DriveClient against the public Drive API.
    pub fn new(auth: Authenticator) -> Self {
        Self::with_api_base(auth, DRIVE_API_BASE)
    }

    /// Create a DriveClient against a different API root (e.g. a mock server).
    pub fn with_api_base(auth: Authenticator, api_base: impl Into<String>) -> Self {
        Self {
            auth,
            http: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// List all non-trashed children of a folder, following pagination.
    pub async fn list_files(&self, parent_id: &str) -> Result<Vec<FileMetadata>> {
        let query = format!("'{}' in parents and trashed = false", parent_id);
        let fields = format!("nextPageToken, files({})", FILE_FIELDS);
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.auth.get_access_token().await?;
            let mut request = self
                .http
                .get(format!("{}/files", self.api_base))
                .bearer_auth(&token)
                .query(&[
                    ("q", query.as_str()),
                    ("includeItemsFromAllDrives", "true"),
                    ("supportsAllDrives", "true"),
                    ("pageSize", PAGE_SIZE),
                    ("fields", fields.as_str()),
                ]);

            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = check_status(request.send().await?).await?;
            let list_response: FileListResponse = response.json().await?;
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_files)
    }

    /// Get file metadata by ID.
    pub async fn get_file(&self, file_id: &str) -> Result<FileMetadata> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .get(format!("{}/files/{}", self.api_base, file_id))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true"), ("fields", FILE_FIELDS)])
            .send()
            .await?;

        let metadata: FileMetadata = check_status(response).await?.json().await?;
        Ok(metadata)
    }

    /// Stream an authenticated GET of `url` into `destination`.
    ///
    /// Bytes land in a `.part` sibling first and are renamed into place once
    /// the body is complete.
    pub async fn download(&self, url: &str, destination: &Path) -> Result<u64> {
        let token = self.auth.get_access_token().await?;
        let response = check_status(self.http.get(url).bearer_auth(&token).send().await?).await?;

        let part = part_path(destination);
        match stream_to_file(response, &part).await {
            Ok(written) => {
                tokio::fs::rename(&part, destination).await?;
                debug!("Wrote {} bytes to {}", written, destination.display());
                Ok(written)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl RemoteLister for DriveClient {
    async fn folder_name(&self, folder_id: &str) -> Result<String> {
        Ok(self.get_file(folder_id).await?.name)
    }

    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteEntry>> {
        let files = self.list_files(folder_id).await?;
        Ok(files
            .into_iter()
            .map(|metadata| RemoteEntry::from_metadata(metadata, &self.api_base))
            .collect())
    }

    async fn fetch_to(&self, link: &str, destination: &Path) -> Result<u64> {
        self.download(link, destination).await
    }
}

/// Turn a non-success response into `DriveError::ApiError`, decoding the
/// Google error envelope when present.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return Err(DriveError::ApiError {
            status: api_error.error.code,
            message: api_error.error.message,
        });
    }
    Err(DriveError::ApiError {
        status: status.as_u16(),
        message: error_body,
    })
}

async fn stream_to_file(response: Response, path: &Path) -> Result<u64> {
    let mut file = File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

/// `report.pdf` -> `report.pdf.part`
fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}
