//! Collection proxies.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use secretbus_core::SecretValue;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::attributes::{Attributes, Schema};
use crate::bus::{interfaces, BusError, ObjectPath, Value};
use crate::error::{Result, SecretError};
use crate::item::Item;
use crate::service::{token, SecretObject, Service, ServiceInner};

pub(crate) struct CollectionInner {
    service: Arc<ServiceInner>,
    path: ObjectPath,
}

impl CollectionInner {
    pub(crate) fn new(service: Arc<ServiceInner>, path: ObjectPath) -> Self {
        Self { service, path }
    }
}

impl Drop for CollectionInner {
    fn drop(&mut self) {
        self.service.collection_cache.remove_if_dead(&self.path);
    }
}

/// Handle to a collection on the service.
///
/// Properties are read from the service on every access.
#[derive(Clone)]
pub struct Collection {
    inner: Arc<CollectionInner>,
}

impl Collection {
    pub(crate) fn from_inner(inner: Arc<CollectionInner>) -> Self {
        Self { inner }
    }

    /// Proxy for the collection at `path`. Fails if it does not exist.
    pub async fn new(
        service: &Service,
        path: impl Into<ObjectPath>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Self> {
        let inner = service
            .inner
            .collection(path.into(), &token(cancel))
            .await?;
        Ok(Self::from_inner(inner))
    }

    pub fn service(&self) -> Service {
        Service::from_inner(self.inner.service.clone())
    }

    pub fn ptr_eq(&self, other: &Collection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    async fn property(&self, name: &str, cancel: Option<&CancellationToken>) -> Result<Value> {
        self.inner
            .service
            .get_property(&self.inner.path, interfaces::COLLECTION, name, &token(cancel))
            .await
    }

    pub async fn label(&self, cancel: Option<&CancellationToken>) -> Result<String> {
        Ok(self.property("Label", cancel).await?.into_string()?)
    }

    pub async fn set_label(&self, label: &str, cancel: Option<&CancellationToken>) -> Result<()> {
        self.inner
            .service
            .set_property(
                &self.inner.path,
                interfaces::COLLECTION,
                "Label",
                Value::Str(label.to_string()),
                &token(cancel),
            )
            .await
    }

    pub async fn locked(&self, cancel: Option<&CancellationToken>) -> Result<bool> {
        Ok(self.property("Locked", cancel).await?.into_bool()?)
    }

    pub async fn created(&self, cancel: Option<&CancellationToken>) -> Result<DateTime<Utc>> {
        timestamp(self.property("Created", cancel).await?)
    }

    pub async fn modified(&self, cancel: Option<&CancellationToken>) -> Result<DateTime<Utc>> {
        timestamp(self.property("Modified", cancel).await?)
    }

    /// Items currently in the collection.
    pub async fn items(&self, cancel: Option<&CancellationToken>) -> Result<Vec<Item>> {
        let cancel = token(cancel);
        let paths = self.property("Items", Some(&cancel)).await?.into_paths()?;

        let mut items = Vec::with_capacity(paths.len());
        for path in paths {
            items.push(Item::from_inner(self.inner.service.item(path, &cancel).await?));
        }
        Ok(items)
    }

    /// Delete the collection and everything in it.
    ///
    /// `false` if the user declined the confirmation.
    pub async fn delete(&self, cancel: Option<&CancellationToken>) -> Result<bool> {
        let deleted = self
            .inner
            .service
            .delete_object(&self.inner.path, interfaces::COLLECTION, &token(cancel))
            .await?;
        if deleted {
            info!(path = %self.inner.path, "deleted collection");
        }
        Ok(deleted)
    }

    /// Store a secret in this collection, replacing any item with the same
    /// attributes.
    ///
    /// `None` if the user declined the confirmation.
    pub async fn create_item(
        &self,
        schema: &Schema,
        attributes: &Attributes,
        label: &str,
        secret: &SecretValue,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<Item>> {
        schema.validate(attributes)?;
        let cancel = token(cancel);

        let created = self
            .inner
            .service
            .create_item(&self.inner.path, label, attributes, secret, true, &cancel)
            .await?;
        match created {
            Some(path) => Ok(Some(Item::from_inner(
                self.inner.service.item(path, &cancel).await?,
            ))),
            None => Ok(None),
        }
    }
}

impl SecretObject for Collection {
    fn object_path(&self) -> &ObjectPath {
        &self.inner.path
    }
}

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Collection {}

impl Hash for Collection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.path.hash(state);
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Collection").field(&self.inner.path).finish()
    }
}

/// Seconds since the epoch, as sent by the service.
pub(crate) fn timestamp(value: Value) -> Result<DateTime<Utc>> {
    let secs = value.into_u64()?;
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| SecretError::from(BusError::Malformed(format!("timestamp {secs} out of range"))))
}
