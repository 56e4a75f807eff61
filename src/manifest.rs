use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::PackageName;
use crate::error::SyncError;

/// Manifest document listing the package stacks to enrich.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Manifest {
    #[serde(default)]
    pub package_dict: PackageDict,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PackageDict {
    #[serde(default)]
    pub user_input_stack: Vec<Vec<String>>,
    #[serde(default)]
    pub bigquery_data: Vec<Vec<String>>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let content =
            fs::read_to_string(path).map_err(|_| SyncError::ManifestRead(path.to_path_buf()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, SyncError> {
        serde_json::from_str(content).map_err(|err| SyncError::ManifestParse(err.to_string()))
    }

    /// Flattens both stack groups into one set of distinct package names,
    /// dropping empty entries.
    pub fn unique_packages(&self) -> BTreeSet<PackageName> {
        let stacks = self
            .package_dict
            .user_input_stack
            .iter()
            .chain(&self.package_dict.bigquery_data);
        let stack_count = self.package_dict.user_input_stack.len()
            + self.package_dict.bigquery_data.len();

        let packages = stacks
            .flatten()
            .filter_map(|name| name.parse::<PackageName>().ok())
            .collect::<BTreeSet<_>>();

        info!(
            stacks = stack_count,
            unique = packages.len(),
            "normalized manifest packages"
        );
        packages
    }
}
