use std::collections::BTreeSet;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::blob::BlobStore;
use crate::domain::{PackageName, entry_has_record, entry_is_complete};
use crate::error::SyncError;
use crate::reconcile::{Reconciler, SyncStats};
use crate::registry::RegistryClient;
use crate::store::MetadataStore;
use crate::topics::TopicClient;

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub started_at: String,
    pub finished_at: String,
    pub source_key: String,
    pub destination_key: String,
    pub stats: SyncStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub key: String,
    pub total: usize,
    pub complete: usize,
    pub incomplete: usize,
    pub unresolved: usize,
}

pub struct App<B: BlobStore, R: RegistryClient, T: TopicClient> {
    store: MetadataStore<B>,
    reconciler: Reconciler<R, T>,
}

impl<B: BlobStore, R: RegistryClient, T: TopicClient> App<B, R, T> {
    pub fn new(store: MetadataStore<B>, reconciler: Reconciler<R, T>) -> Self {
        Self { store, reconciler }
    }

    pub fn store(&self) -> &MetadataStore<B> {
        &self.store
    }

    pub fn reconciler(&self) -> &Reconciler<R, T> {
        &self.reconciler
    }

    /// One full run: load the store, reconcile `packages` against it, save it
    /// to the destination key and log the statistics. Only storage failures
    /// abort the run, and nothing is saved when they do.
    pub fn sync(&self, packages: &BTreeSet<PackageName>) -> Result<SyncReport, SyncError> {
        let started_at = Utc::now().to_rfc3339();
        let mut working = self.store.load()?;
        let stats = self.reconciler.reconcile(packages, &mut working);
        self.store.save(&working)?;
        stats.log_report();

        Ok(SyncReport {
            started_at,
            finished_at: Utc::now().to_rfc3339(),
            source_key: self.store.source_key().to_string(),
            destination_key: self.store.destination_key().to_string(),
            stats,
        })
    }

    /// Summarizes the store a previous run saved.
    pub fn status(&self) -> Result<StoreStatus, SyncError> {
        let packages = self.store.load_saved()?;
        let mut status = StoreStatus {
            key: self.store.destination_key().to_string(),
            total: packages.len(),
            ..StoreStatus::default()
        };
        for entry in packages.values() {
            if entry_is_complete(entry) {
                status.complete += 1;
            } else if entry_has_record(entry) {
                status.incomplete += 1;
            } else {
                status.unresolved += 1;
            }
        }
        info!(
            key = %status.key,
            total = status.total,
            complete = status.complete,
            incomplete = status.incomplete,
            unresolved = status.unresolved,
            "metadata store status"
        );
        Ok(status)
    }
}
