//! In-memory catalog of service nodes, keyed by fully qualified service name.
//!
//! The catalog is filled from configuration at startup. An embedding
//! application reaches the live catalog through `Cmd::catalog` and may
//! register or replace nodes while serving. Reads on the request path are
//! lock-free via `arc-swap`.

use std::{collections::HashMap, sync::Arc};

use arc_swap::ArcSwap;
use thiserror::Error;

/// Errors from the service catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The requested service has no entry in the catalog.
    #[error("unknown service: {0}")]
    UnknownService(String),
}

/// Shared, lock-free map of service name → node addresses.
///
/// Clones share the same underlying map.
#[derive(Clone, Debug)]
pub struct ServiceCatalog {
    inner: Arc<ArcSwap<HashMap<String, Vec<String>>>>,
}

impl ServiceCatalog {
    /// Create a new, empty [`ServiceCatalog`].
    pub fn new() -> Self {
        Self::from_map(HashMap::new())
    }

    pub fn from_map(services: HashMap<String, Vec<String>>) -> Self {
        Self {
            inner: Arc::new(ArcSwap::new(Arc::new(services))),
        }
    }

    /// Return the number of services currently registered.
    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.load().is_empty()
    }

    /// Look up the nodes of a service.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownService`] if `name` is not present.
    pub fn nodes(&self, name: &str) -> Result<Vec<String>, CatalogError> {
        self.inner
            .load()
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownService(name.to_owned()))
    }

    /// Add or replace the nodes of one service.
    pub fn register(&self, name: &str, nodes: Vec<String>) {
        self.inner.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(name.to_owned(), nodes.clone());
            next
        });
    }

    /// Atomically replace the entire catalog.
    pub fn replace_all(&self, services: HashMap<String, Vec<String>>) {
        self.inner.store(Arc::new(services));
    }
}

impl Default for ServiceCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initially_empty() {
        let catalog = ServiceCatalog::new();
        assert!(catalog.is_empty());
        assert!(catalog.nodes("go.micro.greeter").is_err());
    }

    #[test]
    fn register_is_visible_to_clones() {
        let catalog = ServiceCatalog::new();
        let shared = catalog.clone();
        catalog.register("go.micro.greeter", vec!["127.0.0.1:9000".into()]);
        assert_eq!(shared.len(), 1);
        assert_eq!(
            shared.nodes("go.micro.greeter").unwrap(),
            vec!["127.0.0.1:9000".to_string()]
        );
    }

    #[test]
    fn replace_all_is_atomic() {
        let catalog = ServiceCatalog::new();
        catalog.register("a", vec!["127.0.0.1:1".into()]);

        let mut next = HashMap::new();
        next.insert("b".to_string(), vec!["127.0.0.1:2".to_string()]);
        catalog.replace_all(next);

        // Only b should be present after the replace.
        assert!(catalog.nodes("a").is_err());
        assert!(catalog.nodes("b").is_ok());
    }
}
