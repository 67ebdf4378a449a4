//! Item proxies.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use secretbus_core::SecretValue;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::attributes::{Attributes, Schema};
use crate::bus::{interfaces, take_args, ObjectPath, Value};
use crate::collection::timestamp;
use crate::error::Result;
use crate::secret_codec::{self, WireSecret};
use crate::service::{token, SecretObject, Service, ServiceInner};

pub(crate) struct ItemInner {
    service: Arc<ServiceInner>,
    path: ObjectPath,
}

impl ItemInner {
    pub(crate) fn new(service: Arc<ServiceInner>, path: ObjectPath) -> Self {
        Self { service, path }
    }
}

impl Drop for ItemInner {
    fn drop(&mut self) {
        self.service.item_cache.remove_if_dead(&self.path);
    }
}

/// Handle to a stored secret and its metadata.
#[derive(Clone)]
pub struct Item {
    inner: Arc<ItemInner>,
}

impl Item {
    pub(crate) fn from_inner(inner: Arc<ItemInner>) -> Self {
        Self { inner }
    }

    /// Proxy for the item at `path`. Fails if it does not exist.
    pub async fn new(
        service: &Service,
        path: impl Into<ObjectPath>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Self> {
        let inner = service.inner.item(path.into(), &token(cancel)).await?;
        Ok(Self::from_inner(inner))
    }

    pub fn service(&self) -> Service {
        Service::from_inner(self.inner.service.clone())
    }

    pub fn ptr_eq(&self, other: &Item) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    async fn property(&self, name: &str, cancel: Option<&CancellationToken>) -> Result<Value> {
        self.inner
            .service
            .get_property(&self.inner.path, interfaces::ITEM, name, &token(cancel))
            .await
    }

    /// Attributes as strings.
    pub async fn attributes(&self, cancel: Option<&CancellationToken>) -> Result<Attributes> {
        let raw = self.property("Attributes", cancel).await?;
        Ok(Attributes::from_wire(raw, None)?)
    }

    /// Attributes typed according to `schema`.
    pub async fn schema_attributes(
        &self,
        schema: &Schema,
        cancel: Option<&CancellationToken>,
    ) -> Result<Attributes> {
        let raw = self.property("Attributes", cancel).await?;
        Ok(Attributes::from_wire(raw, Some(schema))?)
    }

    pub async fn set_attributes(
        &self,
        schema: &Schema,
        attributes: &Attributes,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        schema.validate(attributes)?;
        self.inner
            .service
            .set_property(
                &self.inner.path,
                interfaces::ITEM,
                "Attributes",
                attributes.to_wire(),
                &token(cancel),
            )
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
                interfaces::ITEM,
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

    /// Read the secret. A locked item answers with the service's
    /// `IsLocked` fault.
    pub async fn get_secret(&self, cancel: Option<&CancellationToken>) -> Result<SecretValue> {
        let cancel = token(cancel);
        let service = &self.inner.service;
        let session = service.session(&cancel).await?;

        let reply = service
            .call(
                &self.inner.path,
                interfaces::ITEM,
                "GetSecret",
                vec![Value::Path(session.path().clone())],
                &cancel,
            )
            .await?;
        let [wire] = take_args::<1>(reply)?;

        secret_codec::decode(WireSecret::from_value(wire)?, &session)
    }

    /// Replace the secret.
    pub async fn set_secret(
        &self,
        secret: &SecretValue,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let cancel = token(cancel);
        let service = &self.inner.service;
        let session = service.session(&cancel).await?;
        let wire = secret_codec::encode(secret.get(), secret.content_type(), &session)?;

        debug!(path = %self.inner.path, len = secret.len(), "setting secret");
        service
            .call(
                &self.inner.path,
                interfaces::ITEM,
                "SetSecret",
                vec![wire.into_value()],
                &cancel,
            )
            .await?;
        Ok(())
    }

    /// Delete the item. `false` if the user declined the confirmation.
    pub async fn delete(&self, cancel: Option<&CancellationToken>) -> Result<bool> {
        self.inner
            .service
            .delete_object(&self.inner.path, interfaces::ITEM, &token(cancel))
            .await
    }
}

impl SecretObject for Item {
    fn object_path(&self) -> &ObjectPath {
        &self.inner.path
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Item {}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.path.hash(state);
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Item").field(&self.inner.path).finish()
    }
}
