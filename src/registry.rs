use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::{MetadataRecord, PackageName, string_list};
use crate::error::SyncError;

pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Lookup of one package in the package registry.
pub trait RegistryClient {
    /// `Ok(None)` means the registry has no published release for the
    /// package. Errors are transport or decoding failures.
    fn fetch_package(&self, name: &PackageName) -> Result<Option<MetadataRecord>, SyncError>;
}

#[derive(Clone)]
pub struct NpmRegistryClient {
    client: Client,
    base_url: String,
}

impl NpmRegistryClient {
    pub fn new() -> Result<Self, SyncError> {
        Self::with_base_url(DEFAULT_REGISTRY_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, SyncError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("pkgmeta/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SyncError::InvalidConfig(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| SyncError::RegistryHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Scoped names keep their `@scope` but the separating slash is encoded.
    pub fn package_url(&self, name: &PackageName) -> String {
        format!("{}/{}", self.base_url, name.as_str().replace('/', "%2f"))
    }

    fn handle_status(response: Response) -> Result<Response, SyncError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "registry request failed".to_string());
        Err(SyncError::RegistryStatus { status, message })
    }
}

impl RegistryClient for NpmRegistryClient {
    fn fetch_package(&self, name: &PackageName) -> Result<Option<MetadataRecord>, SyncError> {
        let url = self.package_url(name);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| SyncError::RegistryHttp(err.to_string()))?;
        info!(%url, status = response.status().as_u16(), "registry responded");
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::handle_status(response)?;
        let document: Value = response
            .json()
            .map_err(|err| SyncError::RegistryHttp(err.to_string()))?;
        Ok(extract_record(&document))
    }
}

/// Builds a record from a registry package document using the release that
/// `dist-tags.latest` points at. Returns `None` when there is no such tag.
pub fn extract_record(document: &Value) -> Option<MetadataRecord> {
    let latest = document
        .get("dist-tags")
        .and_then(|tags| tags.get("latest"))
        .and_then(|tag| tag.as_str())
        .filter(|tag| !tag.is_empty())?;
    debug!(latest, "found latest version");

    let release = document
        .get("versions")
        .and_then(|versions| versions.get(latest))
        .unwrap_or(&Value::Null);
    let text = |value: Option<&Value>| {
        value
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_string()
    };
    let list = |field: &str| release.get(field).map(string_list).unwrap_or_default();

    Some(MetadataRecord {
        name: text(document.get("name")),
        description: text(document.get("description")),
        version: latest.to_string(),
        keywords: list("keywords"),
        dependencies: list("dependencies"),
        dev_dependencies: list("devDependencies"),
        peer_dependencies: list("peerDependencies"),
        homepage: text(document.get("homepage")),
        repositoryurl: text(document.get("repository").and_then(|repo| repo.get("url"))),
        readme: text(document.get("readme")),
    })
}
