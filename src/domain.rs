use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::SyncError;

/// Working store contents: package name to the stored JSON entry, exactly as
/// it was loaded. `null` marks a package that was looked up and is still
/// unresolved.
pub type PackageMap = BTreeMap<String, Value>;

/// Host name that, when found in the org position of a repository url, means
/// the url carried no organization segment.
const HOSTING_PLATFORM: &str = "github";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageName(String);

impl PackageName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PackageName {
    type Err = SyncError;

    /// Names are taken verbatim; only the empty string is rejected.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() {
            return Err(SyncError::InvalidPackageName(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }
}

/// A record built from a registry lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataRecord {
    pub name: String,
    pub description: String,
    pub version: String,
    pub keywords: Vec<String>,
    pub dependencies: Vec<String>,
    #[serde(rename = "devDependencies")]
    pub dev_dependencies: Vec<String>,
    #[serde(rename = "peerDependencies")]
    pub peer_dependencies: Vec<String>,
    pub homepage: String,
    pub repositoryurl: String,
    pub readme: String,
}

impl MetadataRecord {
    /// A record is complete once it carries at least one keyword.
    pub fn is_complete(&self) -> bool {
        !self.keywords.is_empty()
    }

    pub fn needs_topic_fallback(&self) -> bool {
        self.keywords.is_empty() && !self.repositoryurl.is_empty()
    }

    pub fn into_entry(self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "version": self.version,
            "keywords": self.keywords,
            "dependencies": self.dependencies,
            "devDependencies": self.dev_dependencies,
            "peerDependencies": self.peer_dependencies,
            "homepage": self.homepage,
            "repositoryurl": self.repositoryurl,
            "readme": self.readme,
        })
    }
}

/// Whether a stored entry holds a record at all. `null`, non-objects and
/// empty objects count as absent.
pub fn entry_has_record(entry: &Value) -> bool {
    entry.as_object().is_some_and(|record| !record.is_empty())
}

/// A stored entry is complete when its `keywords` is a non-empty array.
pub fn entry_is_complete(entry: &Value) -> bool {
    entry
        .get("keywords")
        .and_then(|keywords| keywords.as_array())
        .is_some_and(|keywords| !keywords.is_empty())
}

/// Organization and repository name extracted from a repository url.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryCoordinates {
    pub org: String,
    pub repo: String,
}

impl RepositoryCoordinates {
    /// Takes the last two `/`-separated segments of `url`. An org segment that
    /// names the hosting platform itself (`https://github.com/widget`) is
    /// dropped, leaving `org` empty.
    pub fn from_url(url: &str) -> Self {
        let trimmed = url.trim().trim_end_matches('/');
        let mut chunks = trimmed.rsplitn(3, '/');
        let repo = chunks.next().unwrap_or_default();
        let repo = repo.strip_suffix(".git").unwrap_or(repo);
        let org = match chunks.next() {
            Some(org) if !org.to_ascii_lowercase().contains(HOSTING_PLATFORM) => org,
            _ => "",
        };
        Self {
            org: org.to_string(),
            repo: repo.to_string(),
        }
    }

    pub fn is_resolvable(&self) -> bool {
        !self.org.is_empty() && !self.repo.is_empty()
    }
}

impl fmt::Display for RepositoryCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org, self.repo)
    }
}

/// Strings from a JSON array (non-strings dropped) or the keys of a JSON
/// object, which is how the registry reports dependency maps.
pub fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(|item| item.to_string())
            .collect(),
        Value::Object(map) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}
