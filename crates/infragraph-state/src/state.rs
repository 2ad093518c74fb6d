//! Scanned state records and the store boundary

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("cannot read state snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid state snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("state serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure reported by an external connector.
    #[error("state connector error: {0}")]
    Connector(String),
}

/// Where and when a provider call was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMetadata {
    pub account: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// The persisted output of one provider API call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    pub metadata: StateMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    pub result: Value,
}

impl StateRecord {
    pub fn new(account: impl Into<String>, region: impl Into<String>, result: Value) -> Self {
        StateRecord {
            metadata: StateMetadata {
                account: account.into(),
                region: region.into(),
                partition: None,
                timestamp: Utc::now(),
            },
            parameters: None,
            result,
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.metadata.partition = Some(partition.into());
        self
    }
}

/// Read/write access to scanned state, owned by a connector.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// State of one call in exactly one account/region. Empty when nothing
    /// was scanned there.
    async fn resolve_state_for_service_function(
        &self,
        account: &str,
        region: &str,
        service: &str,
        function: &str,
    ) -> Result<Vec<StateRecord>, StateError>;

    /// State of one call across every account and region.
    async fn global_state_for_service_function(
        &self,
        service: &str,
        function: &str,
    ) -> Result<Vec<StateRecord>, StateError>;

    /// Write path used by the scanning layer.
    async fn on_service_scan_complete(
        &self,
        account: &str,
        region: &str,
        service: &str,
        function: &str,
        state: Vec<StateRecord>,
    ) -> Result<(), StateError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct StateAddress {
    account: String,
    region: String,
    service: String,
    function: String,
}

/// In-memory store. Records for the same address accumulate, so paginated
/// calls can report each page separately.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    records: DashMap<StateAddress, Vec<StateRecord>>,
}

/// One entry of a JSON state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub account: String,
    pub region: String,
    #[serde(default)]
    pub partition: Option<String>,
    pub service: String,
    pub function: String,
    pub records: Vec<SnapshotRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    #[serde(default)]
    pub parameters: Option<Value>,
    pub result: Value,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, account: &str, region: &str, service: &str, function: &str, record: StateRecord) {
        self.records
            .entry(StateAddress {
                account: account.to_string(),
                region: region.to_string(),
                service: service.to_string(),
                function: function.to_string(),
            })
            .or_default()
            .push(record);
    }

    pub fn from_entries(entries: Vec<SnapshotEntry>) -> Self {
        let store = Self::new();
        for entry in entries {
            for record in entry.records {
                let state = StateRecord {
                    metadata: StateMetadata {
                        account: entry.account.clone(),
                        region: entry.region.clone(),
                        partition: entry.partition.clone(),
                        timestamp: record.timestamp.unwrap_or_else(Utc::now),
                    },
                    parameters: record.parameters,
                    result: record.result,
                };
                store.insert(&entry.account, &entry.region, &entry.service, &entry.function, state);
            }
        }
        store
    }

    /// Load a snapshot file: a JSON array of [`SnapshotEntry`].
    pub fn from_snapshot(path: &Path) -> Result<Self, StateError> {
        let content = std::fs::read_to_string(path).map_err(|source| StateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: Vec<SnapshotEntry> =
            serde_json::from_str(&content).map_err(|source| StateError::Snapshot {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!("Loaded {} snapshot entries from {}", entries.len(), path.display());
        Ok(Self::from_entries(entries))
    }

    /// Every `(account, region)` pair that has any state.
    pub fn scopes(&self) -> Vec<(String, String)> {
        let mut scopes: Vec<(String, String)> = self
            .records
            .iter()
            .map(|e| (e.key().account.clone(), e.key().region.clone()))
            .collect();
        scopes.sort();
        scopes.dedup();
        scopes
    }

    pub fn len(&self) -> usize {
        self.records.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn resolve_state_for_service_function(
        &self,
        account: &str,
        region: &str,
        service: &str,
        function: &str,
    ) -> Result<Vec<StateRecord>, StateError> {
        let address = StateAddress {
            account: account.to_string(),
            region: region.to_string(),
            service: service.to_string(),
            function: function.to_string(),
        };
        Ok(self
            .records
            .get(&address)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }

    async fn global_state_for_service_function(
        &self,
        service: &str,
        function: &str,
    ) -> Result<Vec<StateRecord>, StateError> {
        let mut matching: Vec<(StateAddress, Vec<StateRecord>)> = self
            .records
            .iter()
            .filter(|e| e.key().service == service && e.key().function == function)
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        // DashMap iteration order is arbitrary.
        matching.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(matching.into_iter().flat_map(|(_, records)| records).collect())
    }

    async fn on_service_scan_complete(
        &self,
        account: &str,
        region: &str,
        service: &str,
        function: &str,
        state: Vec<StateRecord>,
    ) -> Result<(), StateError> {
        tracing::debug!(
            "Scan complete: {}/{} {}|{} ({} records)",
            account,
            region,
            service,
            function,
            state.len()
        );
        for record in state {
            self.insert(account, region, service, function, record);
        }
        Ok(())
    }
}
