//! Per-service metadata cache.
//!
//! Metadata is loaded once per service id and shared as `Arc`s. Entries are
//! only replaced by an explicit [`MetadataCache::reload`].

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

use super::loader::MetadataLoader;
use super::model::ServiceMetadata;
use crate::error::ConfigurationError;

pub struct MetadataCache {
    loader: MetadataLoader,
    entries: RwLock<HashMap<String, Arc<ServiceMetadata>>>,
}

impl MetadataCache {
    pub fn new(loader: MetadataLoader) -> Self {
        Self {
            loader,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached metadata for `service_id`, loading it on first use.
    pub fn get_or_load(&self, service_id: &str) -> Result<Arc<ServiceMetadata>, ConfigurationError> {
        if let Some(hit) = self.get(service_id) {
            return Ok(hit);
        }

        let loaded = Arc::new(self.loader.load(service_id)?);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have loaded it meanwhile; keep the first copy.
        let entry = entries
            .entry(service_id.to_string())
            .or_insert_with(|| loaded.clone());
        Ok(entry.clone())
    }

    /// Cached metadata without loading
    pub fn get(&self, service_id: &str) -> Option<Arc<ServiceMetadata>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(service_id)
            .cloned()
    }

    /// Load `service_id` again and replace the cached copy.
    ///
    /// On failure the previous entry stays in place.
    pub fn reload(&self, service_id: &str) -> Result<Arc<ServiceMetadata>, ConfigurationError> {
        let loaded = Arc::new(self.loader.load(service_id)?);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(service_id.to_string(), loaded.clone());
        info!(service = service_id, "Reloaded service metadata");
        Ok(loaded)
    }

    /// Drop the cached entry. Returns whether one existed.
    pub fn evict(&self, service_id: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(service_id)
            .is_some()
    }

    pub fn loaded_services(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}
