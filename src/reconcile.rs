use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::domain::{
    MetadataRecord, PackageMap, PackageName, RepositoryCoordinates, entry_has_record,
    entry_is_complete,
};
use crate::registry::RegistryClient;
use crate::topics::TopicClient;

/// Missing or incomplete packages fetched per run unless configured otherwise.
pub const DEFAULT_LIMIT: usize = 50;

/// Counters for one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Entries in the store before the run.
    pub existing: usize,
    /// Distinct packages named by the manifest.
    pub unique_packages: usize,
    /// Packages skipped because their record already has keywords.
    pub already_complete: usize,
    /// Packages whose record was absent, null or without keywords.
    pub missing: usize,
    /// Missing packages that had no record at all.
    pub new_packages: usize,
    /// Packages for which the registry produced a record.
    pub updated: usize,
    /// Packages left as null after the run.
    pub still_missing: usize,
    pub registry_fetched: usize,
    pub registry_errors: usize,
    pub topics_fetched: usize,
    pub topics_errors: usize,
}

impl SyncStats {
    pub fn log_report(&self) {
        info!("npm metadata update statistics");
        info!("    1. Existing number of packages : {}", self.existing);
        info!("    2. Unique packages in manifest : {}", self.unique_packages);
        info!("    3. Packages with metadata : {}", self.already_complete);
        info!("    4. Total missing packages : {}", self.missing);
        info!("    5. New packages : {}", self.new_packages);
        info!("    6. Packages updated : {}", self.updated);
        info!("    7. Packages missing after update : {}", self.still_missing);
        info!("    8. Data fetched from registry : {}", self.registry_fetched);
        info!("    9. Registry fetch errors : {}", self.registry_errors);
        info!("   10. Data fetched from GitHub : {}", self.topics_fetched);
        info!("   11. GitHub fetch errors : {}", self.topics_errors);
    }
}

/// Walks the manifest packages against the working store and fills in the
/// ones without keywords, registry first, GitHub topics second.
pub struct Reconciler<R: RegistryClient, T: TopicClient> {
    registry: R,
    topics: T,
    limit: Option<usize>,
}

impl<R: RegistryClient, T: TopicClient> Reconciler<R, T> {
    /// `limit` caps how many missing packages one run fetches; `None` fetches
    /// all of them.
    pub fn new(registry: R, topics: T, limit: Option<usize>) -> Self {
        Self {
            registry,
            topics,
            limit,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn topics(&self) -> &T {
        &self.topics
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Updates `store` in place; entries that are not fetched keep their stored
    /// JSON untouched. Fetch failures are counted, never returned.
    pub fn reconcile(&self, packages: &BTreeSet<PackageName>, store: &mut PackageMap) -> SyncStats {
        let mut stats = SyncStats {
            existing: store.len(),
            unique_packages: packages.len(),
            ..SyncStats::default()
        };
        info!(existing = stats.existing, "existing package count");
        info!(unique = stats.unique_packages, "manifest package count");

        let mut remaining = self.limit;
        for name in packages {
            if remaining == Some(0) {
                info!("update limit reached, leaving the rest for the next run");
                break;
            }

            let (known, complete) = match store.get(name.as_str()) {
                Some(entry) => (entry_has_record(entry), entry_is_complete(entry)),
                None => (false, false),
            };
            if complete {
                stats.already_complete += 1;
                continue;
            }

            info!(package = %name, "keywords missing or empty, fetching metadata");
            stats.missing += 1;
            if !known {
                stats.new_packages += 1;
            }

            match self.fetch(name, &mut stats) {
                Some(record) => {
                    info!(package = %name, keywords = ?record.keywords, "package updated");
                    stats.updated += 1;
                    store.insert(name.to_string(), record.into_entry());
                }
                None => {
                    stats.still_missing += 1;
                    store.insert(name.to_string(), Value::Null);
                }
            }

            if let Some(remaining) = remaining.as_mut() {
                *remaining -= 1;
            }
        }

        stats
    }

    fn fetch(&self, name: &PackageName, stats: &mut SyncStats) -> Option<MetadataRecord> {
        let mut record = match self.registry.fetch_package(name) {
            Ok(Some(record)) => {
                stats.registry_fetched += 1;
                record
            }
            Ok(None) => {
                info!(package = %name, "registry has no latest release");
                return None;
            }
            Err(err) => {
                stats.registry_errors += 1;
                error!(package = %name, error = %err, "registry fetch failed");
                return None;
            }
        };

        if record.needs_topic_fallback() {
            let coords = RepositoryCoordinates::from_url(&record.repositoryurl);
            info!(package = %name, repository = %coords, "trying GitHub topics for keywords");
            record.keywords = match self.topics.fetch_topics(&coords) {
                Ok(topics) => {
                    stats.topics_fetched += 1;
                    info!(package = %name, ?topics, "GitHub topics found");
                    topics
                }
                Err(err) => {
                    stats.topics_errors += 1;
                    warn!(package = %name, error = %err, "GitHub topics fetch failed");
                    Vec::new()
                }
            };
        }

        Some(record)
    }
}
