//! Endpoint persistence.
//!
//! [`JsonEndpointStore`] keeps the whole list in one pretty-printed JSON
//! file, rewritten atomically (temp file + rename) on every mutation.
//! [`MemoryEndpointStore`] backs tests and ephemeral sessions.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::errors::EndpointError;
use super::Endpoint;

/// Durable storage for endpoint profiles.
#[async_trait]
pub trait EndpointStore: Send + Sync {
    /// All saved endpoints, in stored order.
    async fn get_saved_endpoints(&self) -> Result<Vec<Endpoint>, EndpointError>;

    /// Upsert by id. New ids are appended; existing ids keep their position.
    async fn save_endpoint(&self, endpoint: Endpoint) -> Result<(), EndpointError>;

    /// Remove by id. Removing an unknown id is not an error.
    async fn delete_endpoint(&self, id: &str) -> Result<(), EndpointError>;
}

fn upsert(list: &mut Vec<Endpoint>, endpoint: Endpoint) {
    match list.iter_mut().find(|e| e.id == endpoint.id) {
        Some(existing) => *existing = endpoint,
        None => list.push(endpoint),
    }
}

// ─── JSON file ───────────────────────────────────────────────────────────────

/// Endpoints persisted as `endpoints.json`.
pub struct JsonEndpointStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl JsonEndpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store under the application data directory.
    pub fn in_data_dir() -> Self {
        Self::new(crate::data_dir().join("endpoints.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Vec<Endpoint>, EndpointError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Atomic write.
    fn write(&self, endpoints: &[Endpoint]) -> Result<(), EndpointError> {
        let content = serde_json::to_string_pretty(endpoints)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)?;
        std::fs::rename(&tmp_path, &self.path)?;
        tracing::debug!(path = %self.path.display(), count = endpoints.len(), "saved endpoints");
        Ok(())
    }
}

#[async_trait]
impl EndpointStore for JsonEndpointStore {
    async fn get_saved_endpoints(&self) -> Result<Vec<Endpoint>, EndpointError> {
        let _guard = self.lock.lock().await;
        self.read()
    }

    async fn save_endpoint(&self, endpoint: Endpoint) -> Result<(), EndpointError> {
        let _guard = self.lock.lock().await;
        let mut endpoints = self.read()?;
        upsert(&mut endpoints, endpoint);
        self.write(&endpoints)
    }

    async fn delete_endpoint(&self, id: &str) -> Result<(), EndpointError> {
        let _guard = self.lock.lock().await;
        let mut endpoints = self.read()?;
        endpoints.retain(|e| e.id != id);
        self.write(&endpoints)
    }
}

// ─── In-memory ───────────────────────────────────────────────────────────────

/// Non-durable store.
#[derive(Default)]
pub struct MemoryEndpointStore {
    endpoints: Mutex<Vec<Endpoint>>,
}

impl MemoryEndpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoints(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints: Mutex::new(endpoints),
        }
    }
}

#[async_trait]
impl EndpointStore for MemoryEndpointStore {
    async fn get_saved_endpoints(&self) -> Result<Vec<Endpoint>, EndpointError> {
        Ok(self.endpoints.lock().await.clone())
    }

    async fn save_endpoint(&self, endpoint: Endpoint) -> Result<(), EndpointError> {
        upsert(&mut *self.endpoints.lock().await, endpoint);
        Ok(())
    }

    async fn delete_endpoint(&self, id: &str) -> Result<(), EndpointError> {
        self.endpoints.lock().await.retain(|e| e.id != id);
        Ok(())
    }
}
