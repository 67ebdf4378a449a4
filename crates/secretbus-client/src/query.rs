//! Attribute search and the convenience operations built on it.

use secretbus_core::SecretValue;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::attributes::{Attributes, Schema};
use crate::bus::{interfaces, take_args, ObjectPath};
use crate::error::{Result, SecretError};
use crate::item::Item;
use crate::service::{token, Service};

/// Which lock-state partitions a search should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub unlocked: bool,
    pub locked: bool,
}

impl Partition {
    pub const BOTH: Partition = Partition {
        unlocked: true,
        locked: true,
    };
    pub const UNLOCKED: Partition = Partition {
        unlocked: true,
        locked: false,
    };
    pub const LOCKED: Partition = Partition {
        unlocked: false,
        locked: true,
    };
    /// Only checks that the search succeeds.
    pub const NONE: Partition = Partition {
        unlocked: false,
        locked: false,
    };
}

/// Search results as object paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPaths {
    pub unlocked: Vec<ObjectPath>,
    pub locked: Vec<ObjectPath>,
}

impl SearchPaths {
    /// First match, unlocked ones first.
    pub fn first(&self) -> Option<&ObjectPath> {
        self.unlocked.first().or_else(|| self.locked.first())
    }

    pub fn is_empty(&self) -> bool {
        self.unlocked.is_empty() && self.locked.is_empty()
    }
}

/// Search results as item proxies.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub unlocked: Vec<Item>,
    pub locked: Vec<Item>,
}

impl Service {
    /// Find items whose attributes match `attributes`.
    ///
    /// Always one round trip, whatever `partition` asks for. Partitions that
    /// were not requested come back empty. An empty attribute set is refused;
    /// use [`Service::search_all_paths`] to match everything.
    pub async fn search_paths(
        &self,
        attributes: &Attributes,
        partition: Partition,
        cancel: Option<&CancellationToken>,
    ) -> Result<SearchPaths> {
        if attributes.is_empty() {
            return Err(SecretError::Usage(
                "search needs at least one attribute".to_string(),
            ));
        }
        self.search_items(attributes, partition, &token(cancel)).await
    }

    /// Every item on the service.
    pub async fn search_all_paths(
        &self,
        partition: Partition,
        cancel: Option<&CancellationToken>,
    ) -> Result<SearchPaths> {
        self.search_items(&Attributes::new(), partition, &token(cancel))
            .await
    }

    async fn search_items(
        &self,
        attributes: &Attributes,
        partition: Partition,
        cancel: &CancellationToken,
    ) -> Result<SearchPaths> {
        let reply = self
            .inner
            .call(
                &self.inner.path,
                interfaces::SERVICE,
                "SearchItems",
                vec![attributes.to_wire()],
                cancel,
            )
            .await?;
        let [unlocked, locked] = take_args::<2>(reply)?;

        let mut found = SearchPaths {
            unlocked: unlocked.into_paths()?,
            locked: locked.into_paths()?,
        };
        debug!(
            unlocked = found.unlocked.len(),
            locked = found.locked.len(),
            "searched items"
        );

        if !partition.unlocked {
            found.unlocked.clear();
        }
        if !partition.locked {
            found.locked.clear();
        }
        Ok(found)
    }

    /// Like [`Service::search_paths`], resolving the matches to items.
    pub async fn search(
        &self,
        attributes: &Attributes,
        partition: Partition,
        cancel: Option<&CancellationToken>,
    ) -> Result<SearchResults> {
        let cancel = token(cancel);
        let paths = self.search_paths(attributes, partition, Some(&cancel)).await?;

        let mut results = SearchResults::default();
        for path in paths.unlocked {
            results
                .unlocked
                .push(Item::from_inner(self.inner.item(path, &cancel).await?));
        }
        for path in paths.locked {
            results
                .locked
                .push(Item::from_inner(self.inner.item(path, &cancel).await?));
        }
        Ok(results)
    }

    /// Secret of the first item matching `attributes`.
    ///
    /// Unlocked matches are preferred. If there are only locked ones, the
    /// first is unlocked (possibly with a prompt) and read. `None` when
    /// nothing matches or the user declined to unlock.
    pub async fn lookup(
        &self,
        schema: &Schema,
        attributes: &Attributes,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<SecretValue>> {
        schema.validate(attributes)?;
        let cancel = token(cancel);
        let found = self
            .search_paths(attributes, Partition::BOTH, Some(&cancel))
            .await?;

        let path = if let Some(path) = found.unlocked.first() {
            path.clone()
        } else if let Some(path) = found.locked.first() {
            let unlocked = self
                .unlock_paths(std::slice::from_ref(path), Some(&cancel))
                .await?;
            if !unlocked.contains(path) {
                debug!(%path, "lookup match stayed locked");
                return Ok(None);
            }
            path.clone()
        } else {
            debug!(schema = schema.name(), "lookup found nothing");
            return Ok(None);
        };

        self.get_secret_for_path(&path, Some(&cancel)).await
    }

    /// Delete the first item matching `attributes`, unlocked ones first.
    ///
    /// `false` when nothing matches or the user declined the confirmation.
    pub async fn remove(
        &self,
        schema: &Schema,
        attributes: &Attributes,
        cancel: Option<&CancellationToken>,
    ) -> Result<bool> {
        schema.validate(attributes)?;
        let cancel = token(cancel);
        let found = self
            .search_paths(attributes, Partition::BOTH, Some(&cancel))
            .await?;

        match found.first() {
            Some(path) => self.delete_path(path, Some(&cancel)).await,
            None => {
                debug!(schema = schema.name(), "remove found nothing");
                Ok(false)
            }
        }
    }

    /// Store a secret, replacing any item with the same attributes.
    ///
    /// `collection` defaults to the configured default alias. Returns the
    /// item path, or `None` if the user declined the confirmation.
    pub async fn store(
        &self,
        schema: &Schema,
        attributes: &Attributes,
        collection: Option<&ObjectPath>,
        label: &str,
        secret: &SecretValue,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<ObjectPath>> {
        schema.validate(attributes)?;
        let default_collection;
        let collection = match collection {
            Some(path) => path,
            None => {
                default_collection = ObjectPath::new(self.inner.config.default_collection_path());
                &default_collection
            }
        };

        self.inner
            .create_item(collection, label, attributes, secret, true, &token(cancel))
            .await
    }
}
