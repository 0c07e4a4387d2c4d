//! # Repository Port
//!
//! The storage-agnostic capability set business services depend on. Every
//! implementation borrows a connection for the duration of one call and
//! returns it on every exit path; writes are atomic per record.

use std::sync::Arc;

use async_trait::async_trait;
use waypoint_core::{Page, PageRequest};

use crate::entity::Entity;
use crate::error::StoreError;

#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// Fetch one record, or [`StoreError::NotFound`].
    async fn find_by_id(&self, key: &E::Key) -> Result<E, StoreError>;

    /// One page of the records matching `filter`, in a stable order.
    async fn list(&self, filter: &E::Filter, page: PageRequest) -> Result<Page<E>, StoreError>;

    /// Insert a record, or [`StoreError::Conflict`] if its key or a unique
    /// field is taken. Returns the record as stored.
    async fn create(&self, entity: E) -> Result<E, StoreError>;

    /// Apply a partial update, or [`StoreError::NotFound`].
    async fn update(&self, key: &E::Key, patch: E::Patch) -> Result<E, StoreError>;

    /// Remove a record, or [`StoreError::NotFound`].
    async fn delete(&self, key: &E::Key) -> Result<(), StoreError>;

    /// Check that the backing store answers.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
impl<E, R> Repository<E> for Arc<R>
where
    E: Entity,
    R: Repository<E> + ?Sized,
{
    async fn find_by_id(&self, key: &E::Key) -> Result<E, StoreError> {
        (**self).find_by_id(key).await
    }

    async fn list(&self, filter: &E::Filter, page: PageRequest) -> Result<Page<E>, StoreError> {
        (**self).list(filter, page).await
    }

    async fn create(&self, entity: E) -> Result<E, StoreError> {
        (**self).create(entity).await
    }

    async fn update(&self, key: &E::Key, patch: E::Patch) -> Result<E, StoreError> {
        (**self).update(key, patch).await
    }

    async fn delete(&self, key: &E::Key) -> Result<(), StoreError> {
        (**self).delete(key).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        (**self).ping().await
    }
}
