//! Blocking forms of the proxy operations.
//!
//! Each `*_sync` method drives the async operation of the same name to
//! completion on the process event loop (see [`crate::bridge::block_on`]).
//! They must not be called from inside an async context.

use std::collections::HashMap;
use std::sync::Arc;

use secretbus_core::{Config, SecretValue};

use crate::attributes::{Attributes, Schema};
use crate::bridge::block_on;
use crate::bus::{Bus, ObjectPath};
use crate::collection::Collection;
use crate::error::Result;
use crate::item::Item;
use crate::query::{Partition, SearchPaths, SearchResults};
use crate::service::{SecretObject, Service, ServiceFlags};

impl Service {
    pub fn get_sync(bus: Arc<dyn Bus>, flags: ServiceFlags) -> Result<Self> {
        block_on(Self::get(bus, flags, None))?
    }

    pub fn get_with_config_sync(bus: Arc<dyn Bus>, config: Config, flags: ServiceFlags) -> Result<Self> {
        block_on(Self::get_with_config(bus, config, flags, None))?
    }

    pub fn new_sync(bus: Arc<dyn Bus>, config: Config, flags: ServiceFlags) -> Result<Self> {
        block_on(Self::new(bus, config, flags, None))?
    }

    pub fn ensure_sync(&self, flags: ServiceFlags) -> Result<()> {
        block_on(self.ensure(flags, None))?
    }

    pub fn ensure_session_sync(&self) -> Result<ObjectPath> {
        block_on(self.ensure_session(None))?
    }

    pub fn load_collections_sync(&self) -> Result<()> {
        block_on(self.load_collections(None))?
    }

    pub fn collections_sync(&self) -> Result<Vec<Collection>> {
        block_on(self.collections(None))?
    }

    pub fn get_secret_for_path_sync(&self, path: &ObjectPath) -> Result<Option<SecretValue>> {
        block_on(self.get_secret_for_path(path, None))?
    }

    pub fn get_secrets_for_paths_sync(
        &self,
        paths: &[ObjectPath],
    ) -> Result<HashMap<ObjectPath, SecretValue>> {
        block_on(self.get_secrets_for_paths(paths, None))?
    }

    pub fn get_secrets_sync(&self, items: &[Item]) -> Result<HashMap<Item, SecretValue>> {
        block_on(self.get_secrets(items, None))?
    }

    pub fn lock_paths_sync(&self, paths: &[ObjectPath]) -> Result<Vec<ObjectPath>> {
        block_on(self.lock_paths(paths, None))?
    }

    pub fn unlock_paths_sync(&self, paths: &[ObjectPath]) -> Result<Vec<ObjectPath>> {
        block_on(self.unlock_paths(paths, None))?
    }

    pub fn lock_sync<T: SecretObject + Clone>(&self, objects: &[T]) -> Result<Vec<T>> {
        block_on(self.lock(objects, None))?
    }

    pub fn unlock_sync<T: SecretObject + Clone>(&self, objects: &[T]) -> Result<Vec<T>> {
        block_on(self.unlock(objects, None))?
    }

    pub fn delete_path_sync(&self, path: &ObjectPath) -> Result<bool> {
        block_on(self.delete_path(path, None))?
    }

    pub fn search_paths_sync(&self, attributes: &Attributes, partition: Partition) -> Result<SearchPaths> {
        block_on(self.search_paths(attributes, partition, None))?
    }

    pub fn search_all_paths_sync(&self, partition: Partition) -> Result<SearchPaths> {
        block_on(self.search_all_paths(partition, None))?
    }

    pub fn search_sync(&self, attributes: &Attributes, partition: Partition) -> Result<SearchResults> {
        block_on(self.search(attributes, partition, None))?
    }

    pub fn lookup_sync(&self, schema: &Schema, attributes: &Attributes) -> Result<Option<SecretValue>> {
        block_on(self.lookup(schema, attributes, None))?
    }

    pub fn remove_sync(&self, schema: &Schema, attributes: &Attributes) -> Result<bool> {
        block_on(self.remove(schema, attributes, None))?
    }

    pub fn store_sync(
        &self,
        schema: &Schema,
        attributes: &Attributes,
        collection: Option<&ObjectPath>,
        label: &str,
        secret: &SecretValue,
    ) -> Result<Option<ObjectPath>> {
        block_on(self.store(schema, attributes, collection, label, secret, None))?
    }
}

impl Collection {
    pub fn new_sync(service: &Service, path: impl Into<ObjectPath>) -> Result<Self> {
        block_on(Self::new(service, path, None))?
    }

    pub fn label_sync(&self) -> Result<String> {
        block_on(self.label(None))?
    }

    pub fn locked_sync(&self) -> Result<bool> {
        block_on(self.locked(None))?
    }

    pub fn items_sync(&self) -> Result<Vec<Item>> {
        block_on(self.items(None))?
    }

    pub fn delete_sync(&self) -> Result<bool> {
        block_on(self.delete(None))?
    }
}

impl Item {
    pub fn new_sync(service: &Service, path: impl Into<ObjectPath>) -> Result<Self> {
        block_on(Self::new(service, path, None))?
    }

    pub fn attributes_sync(&self) -> Result<Attributes> {
        block_on(self.attributes(None))?
    }

    pub fn label_sync(&self) -> Result<String> {
        block_on(self.label(None))?
    }

    pub fn locked_sync(&self) -> Result<bool> {
        block_on(self.locked(None))?
    }

    pub fn get_secret_sync(&self) -> Result<SecretValue> {
        block_on(self.get_secret(None))?
    }

    pub fn set_secret_sync(&self, secret: &SecretValue) -> Result<()> {
        block_on(self.set_secret(secret, None))?
    }

    pub fn delete_sync(&self) -> Result<bool> {
        block_on(self.delete(None))?
    }
}
