//! In-memory view of the saved endpoints plus the current selection.
//!
//! Every mutation goes to the store first and is followed by a full reload,
//! so the registry is only ever observed in a post-mutation snapshot. The
//! selection is an id, resolved against the loaded list on every read; a
//! deleted endpoint can never stay selected.

use std::sync::Arc;

use uuid::Uuid;

use super::errors::EndpointError;
use super::store::EndpointStore;
use super::Endpoint;

pub struct EndpointRegistry {
    store: Arc<dyn EndpointStore>,
    endpoints: Vec<Endpoint>,
    selected_id: Option<String>,
}

impl EndpointRegistry {
    /// Empty registry over `store`. Call [`load`](Self::load) to populate.
    pub fn new(store: Arc<dyn EndpointStore>) -> Self {
        Self {
            store,
            endpoints: Vec::new(),
            selected_id: None,
        }
    }

    /// Registry loaded from `store`, with the first entry auto-selected.
    pub async fn open(store: Arc<dyn EndpointStore>) -> Result<Self, EndpointError> {
        let mut registry = Self::new(store);
        registry.load().await?;
        Ok(registry)
    }

    /// Reload from the store. Auto-selects the first entry only when nothing
    /// is currently selected, so a deliberate selection survives reloads.
    pub async fn load(&mut self) -> Result<(), EndpointError> {
        self.endpoints = self.store.get_saved_endpoints().await?;
        if self.selected().is_none() {
            self.selected_id = self.endpoints.first().map(|e| e.id.clone());
        }
        tracing::debug!(
            count = self.endpoints.len(),
            selected = self.selected_id.as_deref().unwrap_or("none"),
            "loaded endpoints"
        );
        Ok(())
    }

    pub fn list(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn get(&self, id: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.id == id)
    }

    /// The selected endpoint, looked up by id.
    pub fn selected(&self) -> Option<&Endpoint> {
        self.selected_id.as_deref().and_then(|id| self.get(id))
    }

    /// Change the selection in memory. Never persisted.
    pub fn select(&mut self, id: Option<&str>) -> Result<(), EndpointError> {
        match id {
            Some(id) if self.get(id).is_none() => Err(EndpointError::NotFound { id: id.to_string() }),
            Some(id) => {
                self.selected_id = Some(id.to_string());
                Ok(())
            }
            None => {
                self.selected_id = None;
                Ok(())
            }
        }
    }

    /// Upsert by id, generating an id for new endpoints. The normalized
    /// form is validated; a rejected endpoint writes nothing.
    /// Returns the stored form.
    pub async fn save(&mut self, endpoint: Endpoint) -> Result<Endpoint, EndpointError> {
        let mut endpoint = endpoint.normalized();
        endpoint.validate()?;
        if endpoint.id.trim().is_empty() {
            endpoint.id = Uuid::new_v4().to_string();
        }

        self.store.save_endpoint(endpoint.clone()).await?;
        tracing::info!(id = %endpoint.id, name = %endpoint.name, "endpoint saved");
        self.load().await?;
        Ok(endpoint)
    }

    /// Remove by id. Deleting the selected endpoint reselects the first
    /// remaining one, or nothing when the list is empty.
    pub async fn delete(&mut self, id: &str) -> Result<(), EndpointError> {
        self.store.delete_endpoint(id).await?;
        tracing::info!(id = %id, "endpoint deleted");

        if self.selected_id.as_deref() == Some(id) {
            self.selected_id = None;
        }
        self.load().await
    }

    /// Save a copy under a fresh id, named `"<name> (copy)"`.
    pub async fn duplicate(&mut self, endpoint: &Endpoint) -> Result<Endpoint, EndpointError> {
        let copy = Endpoint {
            id: Uuid::new_v4().to_string(),
            name: format!("{} (copy)", endpoint.name),
            ..endpoint.clone()
        };
        self.save(copy).await
    }
}
