// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Persistence boundary.
//!
//! The intake pipeline only needs three operations from storage: look up an
//! endpoint by its public id, write a submission, and bump the endpoint's
//! submission counter. [`MemoryStore`] implements them in process memory and
//! is seeded from a JSON file of endpoint policies.

use crate::models::{EndpointError, EndpointPolicy, SubmissionRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    InvalidEndpoint(#[from] EndpointError),

    #[error("Duplicate endpoint public id: {0}")]
    DuplicateEndpoint(String),

    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Read access to endpoint policies plus the submission counter.
#[async_trait]
pub trait EndpointDirectory: Send + Sync {
    /// `Ok(None)` when no endpoint has this public id.
    async fn lookup_by_public_id(&self, public_id: &str)
        -> Result<Option<EndpointPolicy>, StoreError>;

    /// Atomically add one to the endpoint's submission counter.
    async fn increment_submission_count(&self, endpoint_id: &str) -> Result<(), StoreError>;
}

/// Durable submission writes.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Write one fully built record. Either the whole record is stored or nothing is.
    async fn insert(&self, record: &SubmissionRecord) -> Result<(), StoreError>;
}

/// In-memory endpoint directory and submission store.
#[derive(Default)]
pub struct MemoryStore {
    endpoints: RwLock<HashMap<String, EndpointPolicy>>,
    counters: RwLock<HashMap<String, AtomicU64>>,
    submissions: RwLock<Vec<SubmissionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a set of endpoints, validating each one.
    pub fn with_endpoints(
        endpoints: impl IntoIterator<Item = EndpointPolicy>,
    ) -> Result<Self, StoreError> {
        let mut by_public_id = HashMap::new();
        let mut counters = HashMap::new();

        for endpoint in endpoints {
            endpoint.validate()?;
            if by_public_id.contains_key(&endpoint.public_id) {
                return Err(StoreError::DuplicateEndpoint(endpoint.public_id));
            }
            counters.insert(endpoint.id.clone(), AtomicU64::new(0));
            by_public_id.insert(endpoint.public_id.clone(), endpoint);
        }

        Ok(Self {
            endpoints: RwLock::new(by_public_id),
            counters: RwLock::new(counters),
            submissions: RwLock::new(Vec::new()),
        })
    }

    /// Load endpoint policies from a JSON array on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let shown = path.display().to_string();

        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: shown.clone(),
            source,
        })?;
        let endpoints: Vec<EndpointPolicy> =
            serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                path: shown.clone(),
                source,
            })?;

        let count = endpoints.len();
        let store = Self::with_endpoints(endpoints)?;
        info!(path = %shown, endpoints = count, "Loaded endpoint policies");
        Ok(store)
    }

    /// Register or replace one endpoint.
    pub async fn upsert_endpoint(&self, endpoint: EndpointPolicy) -> Result<(), StoreError> {
        endpoint.validate()?;
        self.counters
            .write()
            .await
            .entry(endpoint.id.clone())
            .or_insert_with(|| AtomicU64::new(0));
        self.endpoints
            .write()
            .await
            .insert(endpoint.public_id.clone(), endpoint);
        Ok(())
    }

    /// Current counter value for an endpoint's internal id.
    pub async fn submission_count(&self, endpoint_id: &str) -> u64 {
        self.counters
            .read()
            .await
            .get(endpoint_id)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Stored submissions for an endpoint's internal id, oldest first.
    pub async fn submissions_for(&self, endpoint_id: &str) -> Vec<SubmissionRecord> {
        self.submissions
            .read()
            .await
            .iter()
            .filter(|s| s.endpoint_id == endpoint_id)
            .cloned()
            .collect()
    }

    pub async fn get_submission(&self, id: Uuid) -> Option<SubmissionRecord> {
        self.submissions
            .read()
            .await
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    pub async fn total_submissions(&self) -> usize {
        self.submissions.read().await.len()
    }
}

#[async_trait]
impl EndpointDirectory for MemoryStore {
    async fn lookup_by_public_id(
        &self,
        public_id: &str,
    ) -> Result<Option<EndpointPolicy>, StoreError> {
        Ok(self.endpoints.read().await.get(public_id).cloned())
    }

    async fn increment_submission_count(&self, endpoint_id: &str) -> Result<(), StoreError> {
        let counters = self.counters.read().await;
        let counter = counters
            .get(endpoint_id)
            .ok_or_else(|| StoreError::UnknownEndpoint(endpoint_id.to_string()))?;
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn insert(&self, record: &SubmissionRecord) -> Result<(), StoreError> {
        self.submissions.write().await.push(record.clone());
        Ok(())
    }
}
