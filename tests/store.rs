use std::cell::RefCell;
use std::collections::HashMap;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::{Value, json};

use pkgmeta_sync::blob::{BlobStore, LocalBlobStore};
use pkgmeta_sync::domain::{MetadataRecord, PackageMap, entry_is_complete};
use pkgmeta_sync::error::SyncError;
use pkgmeta_sync::store::{MetadataStore, decode};

#[derive(Default)]
struct MemoryBlobs {
    blobs: RefCell<HashMap<String, Vec<u8>>>,
}

impl BlobStore for MemoryBlobs {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, SyncError> {
        Ok(self.blobs.borrow().get(key).cloned())
    }

    fn write(&self, key: &str, content: &[u8]) -> Result<(), SyncError> {
        self.blobs
            .borrow_mut()
            .insert(key.to_string(), content.to_vec());
        Ok(())
    }
}

fn record(name: &str, keywords: &[&str]) -> MetadataRecord {
    MetadataRecord {
        name: name.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        ..MetadataRecord::default()
    }
}

#[test]
fn absent_blob_loads_empty() {
    let store = MetadataStore::new(MemoryBlobs::default(), "old.json", "new.json");
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn decodes_newline_delimited_records() {
    let content = concat!(
        r#"{"name": "left-pad", "keywords": ["string", "padding"], "version": "1.3.0"}"#,
        "\n\n",
        r#"{"name": "widget", "keywords": [], "repositoryurl": "https://github.com/acme/widget"}"#,
        "\n",
    );
    let packages = decode("old.json", content.as_bytes()).unwrap();

    assert_eq!(packages.len(), 2);
    assert_eq!(packages["left-pad"]["version"], "1.3.0");
    assert!(entry_is_complete(&packages["left-pad"]));
    assert!(!entry_is_complete(&packages["widget"]));
}

#[test]
fn records_without_name_are_skipped() {
    let content = "{\"name\":\"left-pad\",\"keywords\":[\"pad\"]}\n{\"keywords\":[]}\n";
    let packages = decode("old.json", content.as_bytes()).unwrap();

    assert_eq!(packages.keys().collect::<Vec<_>>(), vec!["left-pad"]);
    assert_eq!(packages["left-pad"]["keywords"], json!(["pad"]));
}

#[test]
fn invalid_utf8_is_fatal() {
    let mut content = br#"{"name": "left-pad", "keywords": ["pa"#.to_vec();
    content.push(0xff);
    content.extend_from_slice(b"d\"]}\n");

    let err = decode("old.json", &content).unwrap_err();
    assert_matches!(err, SyncError::StoreDecode { key, .. } if key == "old.json");
}

#[test]
fn unknown_fields_and_nulls_survive_load_and_save() {
    let blobs = MemoryBlobs::default();
    blobs
        .write(
            "old.json",
            br#"{"name":"left-pad","keywords":["pad"],"license":"MIT","homepage":null}"#,
        )
        .unwrap();
    let store = MetadataStore::new(blobs, "old.json", "new.json");

    let packages = store.load().unwrap();
    store.save(&packages).unwrap();

    let saved = store.blobs().read("new.json").unwrap().unwrap();
    let saved: Value = serde_json::from_slice(&saved).unwrap();
    assert_eq!(
        saved["left-pad"],
        json!({"name": "left-pad", "keywords": ["pad"], "license": "MIT", "homepage": null})
    );
    assert!(saved["left-pad"].as_object().unwrap().contains_key("homepage"));
}

#[test]
fn falls_back_to_pretty_printed_object() {
    let mut expected = PackageMap::new();
    expected.insert("left-pad".to_string(), record("left-pad", &["pad"]).into_entry());
    expected.insert("vanished".to_string(), Value::Null);
    let content = serde_json::to_vec_pretty(&expected).unwrap();

    assert_eq!(decode("old.json", &content).unwrap(), expected);
}

#[test]
fn undecodable_blob_is_fatal() {
    let err = decode("old.json", b"[1, 2, 3]").unwrap_err();
    assert_matches!(err, SyncError::StoreDecode { key, .. } if key == "old.json");
}

#[test]
fn save_writes_destination_key_only() {
    let blobs = MemoryBlobs::default();
    blobs
        .write("old.json", br#"{"name": "left-pad", "keywords": []}"#)
        .unwrap();
    let store = MetadataStore::new(blobs, "old.json", "new.json");

    let mut packages = store.load().unwrap();
    packages.insert("left-pad".to_string(), record("left-pad", &["pad"]).into_entry());
    store.save(&packages).unwrap();

    let saved = store.blobs().read("new.json").unwrap().unwrap();
    let saved: Value = serde_json::from_slice(&saved).unwrap();
    assert_eq!(saved["left-pad"]["keywords"][0], "pad");

    let source = store.blobs().read("old.json").unwrap().unwrap();
    assert_eq!(source, br#"{"name": "left-pad", "keywords": []}"#.to_vec());
    assert_eq!(store.load_saved().unwrap(), packages);
}

#[test]
fn local_blobs_round_trip_through_nested_dirs() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let blobs = LocalBlobStore::new(root);

    assert!(blobs.read("training-utils/details.json").unwrap().is_none());
    blobs.write("training-utils/details.json", b"{}").unwrap();
    blobs.write("training-utils/details.json", b"{\"a\": null}").unwrap();

    assert_eq!(
        blobs.read("training-utils/details.json").unwrap().unwrap(),
        b"{\"a\": null}".to_vec()
    );
    assert!(blobs.path_for("training-utils/details.json").as_std_path().is_file());
}
