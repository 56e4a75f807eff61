use std::collections::BTreeSet;
use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::{Value, json};

use pkgmeta_sync::app::App;
use pkgmeta_sync::blob::LocalBlobStore;
use pkgmeta_sync::domain::{MetadataRecord, PackageMap, PackageName, RepositoryCoordinates};
use pkgmeta_sync::error::SyncError;
use pkgmeta_sync::reconcile::Reconciler;
use pkgmeta_sync::registry::{RegistryClient, extract_record};
use pkgmeta_sync::store::MetadataStore;
use pkgmeta_sync::topics::TopicClient;

const SOURCE_KEY: &str = "training-utils/node-package-details-with-url.json";
const DESTINATION_KEY: &str = "training-utils/node-package-details.json";

/// Serves registry documents from the test fixtures.
#[derive(Default)]
struct FixtureRegistry {
    calls: Mutex<usize>,
}

impl RegistryClient for FixtureRegistry {
    fn fetch_package(&self, name: &PackageName) -> Result<Option<MetadataRecord>, SyncError> {
        *self.calls.lock().unwrap() += 1;
        let path = format!("tests/fixtures/registry_{name}.json");
        let Ok(raw) = fs::read_to_string(path) else {
            return Ok(None);
        };
        let document = serde_json::from_str(&raw)
            .map_err(|err| SyncError::RegistryHttp(err.to_string()))?;
        Ok(extract_record(&document))
    }
}

struct NoTopics;

impl TopicClient for NoTopics {
    fn fetch_topics(&self, _coords: &RepositoryCoordinates) -> Result<Vec<String>, SyncError> {
        Ok(Vec::new())
    }
}

fn local_app(root: Utf8PathBuf) -> App<LocalBlobStore, FixtureRegistry, NoTopics> {
    let store = MetadataStore::new(LocalBlobStore::new(root), SOURCE_KEY, DESTINATION_KEY);
    App::new(
        store,
        Reconciler::new(FixtureRegistry::default(), NoTopics, Some(50)),
    )
}

fn temp_root(temp: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap()
}

fn names(values: &[&str]) -> BTreeSet<PackageName> {
    values.iter().map(|value| value.parse().unwrap()).collect()
}

#[test]
fn sync_from_empty_store() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp);
    let app = local_app(root.clone());

    let report = app.sync(&names(&["left-pad"])).unwrap();

    assert_eq!(report.stats.updated, 1);
    assert_eq!(report.stats.still_missing, 0);
    assert_eq!(report.destination_key, DESTINATION_KEY);

    let saved = fs::read_to_string(root.join(DESTINATION_KEY).as_std_path()).unwrap();
    let saved: PackageMap = serde_json::from_str(&saved).unwrap();
    assert_eq!(saved["left-pad"]["keywords"], json!(["string", "padding"]));
    assert!(!root.join(SOURCE_KEY).as_std_path().exists());
}

#[test]
fn sync_reads_source_and_writes_destination() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp);
    let source = root.join(SOURCE_KEY);
    fs::create_dir_all(source.parent().unwrap().as_std_path()).unwrap();
    let lines = concat!(
        r#"{"name": "express", "keywords": ["web", "framework"], "license": "MIT"}"#,
        "\n",
        r#"{"name": "left-pad", "keywords": []}"#,
        "\n",
    );
    fs::write(source.as_std_path(), lines).unwrap();
    let app = local_app(root.clone());

    let report = app
        .sync(&names(&["express", "left-pad", "vanished"]))
        .unwrap();

    assert_eq!(report.stats.existing, 2);
    assert_eq!(report.stats.already_complete, 1);
    assert_eq!(report.stats.missing, 2);
    assert_eq!(report.stats.new_packages, 1);
    assert_eq!(report.stats.updated, 1);
    assert_eq!(report.stats.still_missing, 1);
    assert_eq!(*app.reconciler().registry().calls.lock().unwrap(), 2);

    assert_eq!(fs::read_to_string(source.as_std_path()).unwrap(), lines);
    let saved = app.store().load_saved().unwrap();
    assert_eq!(saved.len(), 3);
    assert_eq!(saved["vanished"], Value::Null);
    assert_eq!(
        saved["express"],
        json!({"name": "express", "keywords": ["web", "framework"], "license": "MIT"})
    );

    let status = app.status().unwrap();
    assert_eq!(status.total, 3);
    assert_eq!(status.complete, 2);
    assert_eq!(status.incomplete, 0);
    assert_eq!(status.unresolved, 1);
}

#[test]
fn corrupt_store_aborts_without_saving() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp);
    let source = root.join(SOURCE_KEY);
    fs::create_dir_all(source.parent().unwrap().as_std_path()).unwrap();
    fs::write(source.as_std_path(), "not json at all").unwrap();
    let app = local_app(root.clone());

    let err = app.sync(&names(&["left-pad"])).unwrap_err();

    assert_matches!(err, SyncError::StoreDecode { .. });
    assert_eq!(*app.reconciler().registry().calls.lock().unwrap(), 0);
    assert!(!root.join(DESTINATION_KEY).as_std_path().exists());
}
