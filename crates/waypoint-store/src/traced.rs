//! Repository decorator that opens one span per call.
//!
//! Spans are named `{kind}.{operation}` (for example `player.find_by_id`)
//! and open under whatever span is current, so service-level spans become
//! their parents.

use std::future::Future;

use async_trait::async_trait;
use waypoint_core::{Page, PageRequest};
use waypoint_telemetry::OperationSpan;

use crate::entity::Entity;
use crate::error::StoreError;
use crate::repository::Repository;

#[derive(Debug, Clone)]
pub struct TracedRepository<R> {
    inner: R,
}

impl<R> TracedRepository<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

async fn traced<T, F>(kind: &'static str, op: &'static str, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    let mut span = OperationSpan::start(format!("{kind}.{op}"));
    let result = span.watch(call).await;
    span.finish_with(&result);
    result
}

#[async_trait]
impl<E, R> Repository<E> for TracedRepository<R>
where
    E: Entity,
    R: Repository<E>,
{
    async fn find_by_id(&self, key: &E::Key) -> Result<E, StoreError> {
        traced(E::KIND, "find_by_id", self.inner.find_by_id(key)).await
    }

    async fn list(&self, filter: &E::Filter, page: PageRequest) -> Result<Page<E>, StoreError> {
        traced(E::KIND, "list", self.inner.list(filter, page)).await
    }

    async fn create(&self, entity: E) -> Result<E, StoreError> {
        traced(E::KIND, "create", self.inner.create(entity)).await
    }

    async fn update(&self, key: &E::Key, patch: E::Patch) -> Result<E, StoreError> {
        traced(E::KIND, "update", self.inner.update(key, patch)).await
    }

    async fn delete(&self, key: &E::Key) -> Result<(), StoreError> {
        traced(E::KIND, "delete", self.inner.delete(key)).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}
