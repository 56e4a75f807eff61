use serde_json::Value;
use tracing::{info, warn};

use crate::blob::BlobStore;
use crate::domain::PackageMap;
use crate::error::SyncError;

/// Package metadata persisted as one JSON blob. Loaded from `source_key` and
/// saved to `destination_key`; the two may differ so a run can migrate the
/// store to a new location.
#[derive(Debug, Clone)]
pub struct MetadataStore<B: BlobStore> {
    blobs: B,
    source_key: String,
    destination_key: String,
}

impl<B: BlobStore> MetadataStore<B> {
    pub fn new(blobs: B, source_key: impl Into<String>, destination_key: impl Into<String>) -> Self {
        Self {
            blobs,
            source_key: source_key.into(),
            destination_key: destination_key.into(),
        }
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    pub fn destination_key(&self) -> &str {
        &self.destination_key
    }

    pub fn load(&self) -> Result<PackageMap, SyncError> {
        self.load_key(&self.source_key)
    }

    /// Reads what a previous run saved, for reporting.
    pub fn load_saved(&self) -> Result<PackageMap, SyncError> {
        self.load_key(&self.destination_key)
    }

    pub fn save(&self, packages: &PackageMap) -> Result<(), SyncError> {
        let content =
            serde_json::to_vec(packages).map_err(|err| SyncError::StoreEncode(err.to_string()))?;
        self.blobs.write(&self.destination_key, &content)?;
        info!(
            key = %self.destination_key,
            packages = packages.len(),
            "saved metadata store"
        );
        Ok(())
    }

    fn load_key(&self, key: &str) -> Result<PackageMap, SyncError> {
        let Some(content) = self.blobs.read(key)? else {
            info!(key, "metadata store absent, starting empty");
            return Ok(PackageMap::new());
        };
        let packages = decode(key, &content)?;
        info!(key, packages = packages.len(), "loaded metadata store");
        Ok(packages)
    }
}

/// Decodes newline-delimited records keyed by their `name`, falling back to a
/// single JSON object keyed by package name. Entries are kept as loaded.
pub fn decode(key: &str, content: &[u8]) -> Result<PackageMap, SyncError> {
    let text = std::str::from_utf8(content).map_err(|err| SyncError::StoreDecode {
        key: key.to_string(),
        message: err.to_string(),
    })?;
    if text.trim().is_empty() {
        return Ok(PackageMap::new());
    }
    match decode_lines(text) {
        Ok((packages, skipped)) if !packages.is_empty() => {
            if skipped > 0 {
                warn!(key, skipped, "skipped records without a name");
            }
            Ok(packages)
        }
        // Nothing named on any line: a one-line JSON object reads the same way.
        Ok((packages, skipped)) => match decode_object(key, text) {
            Ok(object) => Ok(object),
            Err(_) => {
                warn!(key, skipped, "skipped records without a name");
                Ok(packages)
            }
        },
        Err(reason) => {
            warn!(key, %reason, "not newline-delimited records, reading as a JSON object");
            decode_object(key, text)
        }
    }
}

fn decode_object(key: &str, text: &str) -> Result<PackageMap, SyncError> {
    serde_json::from_str::<PackageMap>(text).map_err(|err| SyncError::StoreDecode {
        key: key.to_string(),
        message: err.to_string(),
    })
}

fn decode_lines(text: &str) -> Result<(PackageMap, usize), String> {
    let mut packages = PackageMap::new();
    let mut skipped = 0;
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value =
            serde_json::from_str(line).map_err(|err| format!("line {}: {err}", index + 1))?;
        if !value.is_object() {
            return Err(format!("line {}: not a JSON object", index + 1));
        }
        let name = value
            .get("name")
            .and_then(|name| name.as_str())
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string());
        match name {
            Some(name) => {
                packages.insert(name, value);
            }
            None => skipped += 1,
        }
    }
    Ok((packages, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_blob_is_empty_store() {
        assert!(decode("k", b"  \n").unwrap().is_empty());
    }

    #[test]
    fn single_line_object_falls_back_to_mapping() {
        let content = br#"{"left-pad": {"name": "left-pad", "keywords": ["pad"]}, "gone": null}"#;
        let packages = decode("k", content).unwrap();
        assert_eq!(packages.len(), 2);
        assert!(packages["gone"].is_null());
        assert_eq!(packages["left-pad"]["keywords"][0], "pad");
    }

    #[test]
    fn unnamed_lines_only_is_empty_store() {
        let content = b"{\"keywords\": []}\n{\"version\": \"1.0.0\"}\n";
        assert!(decode("k", content).unwrap().is_empty());
    }
}
