//! # In-Memory Repository
//!
//! A [`Repository`] over an ordered map, for development and tests. Access
//! goes through a [`ConnectionGate`] so the backend exhibits the same
//! bounded-pool behavior as the SQL one. An optional simulated latency is
//! spent while the slot is held.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use waypoint_core::{Page, PageRequest};

use crate::entity::Entity;
use crate::error::StoreError;
use crate::gate::{ConnectionGate, GateLease};
use crate::repository::Repository;

pub struct MemoryRepository<E: Entity> {
    records: Arc<RwLock<BTreeMap<E::Key, E>>>,
    gate: ConnectionGate,
    latency: Option<Duration>,
}

impl<E: Entity> Clone for MemoryRepository<E> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            gate: self.gate.clone(),
            latency: self.latency,
        }
    }
}

impl<E: Entity> std::fmt::Debug for MemoryRepository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRepository")
            .field("kind", &E::KIND)
            .field("records", &self.records.read().len())
            .field("gate", &self.gate)
            .finish()
    }
}

impl<E: Entity> MemoryRepository<E> {
    pub fn new(gate: ConnectionGate) -> Self {
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
            gate,
            latency: None,
        }
    }

    /// Hold every connection slot for `latency` before touching the map.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn gate(&self) -> &ConnectionGate {
        &self.gate
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    async fn checkout(&self) -> Result<GateLease, StoreError> {
        let lease = self.gate.acquire().await?;
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(lease)
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for MemoryRepository<E> {
    async fn find_by_id(&self, key: &E::Key) -> Result<E, StoreError> {
        let _lease = self.checkout().await?;
        self.records
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(E::KIND, key))
    }

    async fn list(&self, filter: &E::Filter, page: PageRequest) -> Result<Page<E>, StoreError> {
        let _lease = self.checkout().await?;
        let records = self.records.read();
        let mut matching: Vec<&E> = records.values().filter(|e| e.matches(filter)).collect();
        matching.sort_by(|a, b| a.list_order(b));
        let items: Vec<E> = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.probe_limit() as usize)
            .cloned()
            .collect();
        Ok(Page::from_probe(items, page))
    }

    async fn create(&self, entity: E) -> Result<E, StoreError> {
        let _lease = self.checkout().await?;
        let key = entity.key();
        let mut records = self.records.write();
        if records.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "{} '{key}' already exists",
                E::KIND
            )));
        }
        if let Some(reason) = records.values().find_map(|r| entity.conflicts_with(r)) {
            return Err(StoreError::Conflict(reason));
        }
        records.insert(key, entity.clone());
        Ok(entity)
    }

    async fn update(&self, key: &E::Key, patch: E::Patch) -> Result<E, StoreError> {
        let _lease = self.checkout().await?;
        let mut records = self.records.write();
        let mut updated = records
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(E::KIND, key))?;
        updated.apply_patch(patch);

        let collision = records
            .iter()
            .filter(|(k, _)| *k != key)
            .find_map(|(_, r)| updated.conflicts_with(r));
        if let Some(reason) = collision {
            return Err(StoreError::Conflict(reason));
        }
        records.insert(key.clone(), updated.clone());
        Ok(updated)
    }

    async fn delete(&self, key: &E::Key) -> Result<(), StoreError> {
        let _lease = self.checkout().await?;
        self.records
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(E::KIND, key))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.gate.is_closed() {
            return Err(StoreError::Unavailable("connection pool closed".to_string()));
        }
        Ok(())
    }
}
