use std::fs;
use std::io::{ErrorKind, Write};

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use tempfile::Builder;
use tracing::debug;

use crate::error::SyncError;

/// Keyed storage for whole JSON documents.
pub trait BlobStore {
    /// Returns `None` when nothing is stored under `key`.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, SyncError>;
    /// Replaces whatever is stored under `key`.
    fn write(&self, key: &str, content: &[u8]) -> Result<(), SyncError>;
}

/// Blobs as files below a root directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: Utf8PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> Utf8PathBuf {
        self.root.join(key.trim_start_matches('/'))
    }
}

impl BlobStore for LocalBlobStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, SyncError> {
        let path = self.path_for(key);
        match fs::read(path.as_std_path()) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path, "no blob on disk");
                Ok(None)
            }
            Err(err) => Err(SyncError::Filesystem(format!("read {path}: {err}"))),
        }
    }

    fn write(&self, key: &str, content: &[u8]) -> Result<(), SyncError> {
        let path = self.path_for(key);
        let parent = path
            .parent()
            .ok_or_else(|| SyncError::Filesystem(format!("invalid blob path {path}")))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix("pkgmeta-blob")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

/// Blobs in a bucket of an HTTP object store, addressed as
/// `{endpoint}/{bucket}/{key}`.
#[derive(Clone)]
pub struct HttpObjectStore {
    client: Client,
    endpoint: String,
    bucket: String,
    token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, bucket: &str, token: Option<String>) -> Result<Self, SyncError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("pkgmeta/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SyncError::InvalidConfig(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| SyncError::ObjectStoreHttp(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            token: token.filter(|token| !token.trim().is_empty()),
        })
    }

    pub fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint,
            self.bucket,
            key.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn handle_status(response: Response) -> Result<Response, SyncError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "object store request failed".to_string());
        Err(SyncError::ObjectStoreStatus { status, message })
    }
}

impl BlobStore for HttpObjectStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, SyncError> {
        let url = self.object_url(key);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .map_err(|err| SyncError::ObjectStoreHttp(err.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(%url, "no object in bucket");
            return Ok(None);
        }
        let response = Self::handle_status(response)?;
        let bytes = response
            .bytes()
            .map_err(|err| SyncError::ObjectStoreHttp(err.to_string()))?;
        Ok(Some(bytes.to_vec()))
    }

    fn write(&self, key: &str, content: &[u8]) -> Result<(), SyncError> {
        let url = self.object_url(key);
        let response = self
            .authorize(self.client.put(&url))
            .header(CONTENT_TYPE, "application/json")
            .body(content.to_vec())
            .send()
            .map_err(|err| SyncError::ObjectStoreHttp(err.to_string()))?;
        Self::handle_status(response)?;
        Ok(())
    }
}
