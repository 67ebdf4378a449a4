//! The secret service proxy.
//!
//! A [`Service`] is the entry point to everything else. [`Service::get`]
//! returns the shared instance for a bus and service name; [`Service::new`]
//! builds a private one. Each instance owns its transport session and its
//! own collection and item caches.

use std::collections::HashMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use secretbus_core::{Config, SecretValue};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::attributes::Attributes;
use crate::bridge::cancellable;
use crate::bus::{interfaces, take_args, Bus, ObjectPath, Value};
use crate::cache::ProxyCache;
use crate::collection::{Collection, CollectionInner};
use crate::error::{Result, SecretError};
use crate::item::{Item, ItemInner};
use crate::prompt::{self, PromptOutcome};
use crate::secret_codec::{self, WireSecret};
use crate::session::{self, Algorithm, Session};

/// Capabilities a [`Service`] has acquired.
///
/// Flags only accumulate over the life of an instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ServiceFlags(u8);

impl ServiceFlags {
    pub const NONE: ServiceFlags = ServiceFlags(0);
    /// A transport session has been negotiated.
    pub const OPEN_SESSION: ServiceFlags = ServiceFlags(1 << 0);
    /// The collection list has been read.
    pub const LOAD_COLLECTIONS: ServiceFlags = ServiceFlags(1 << 1);

    pub fn contains(self, other: ServiceFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ServiceFlags {
    type Output = ServiceFlags;

    fn bitor(self, rhs: ServiceFlags) -> ServiceFlags {
        ServiceFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ServiceFlags {
    fn bitor_assign(&mut self, rhs: ServiceFlags) {
        self.0 |= rhs.0;
    }
}

/// Something on the service that can be locked and unlocked.
pub trait SecretObject {
    fn object_path(&self) -> &ObjectPath;
}

/// (bus address, service bus name)
type RegistryKey = (String, String);

static REGISTRY: Lazy<ProxyCache<RegistryKey, ServiceInner>> = Lazy::new(ProxyCache::new);

pub(crate) struct ServiceInner {
    pub(crate) bus: Arc<dyn Bus>,
    pub(crate) destination: String,
    pub(crate) path: ObjectPath,
    pub(crate) config: Config,
    algorithms: Vec<Algorithm>,
    registry_key: Option<RegistryKey>,
    session: OnceCell<Arc<Session>>,
    collections: Mutex<Option<Vec<ObjectPath>>>,
    pub(crate) collection_cache: ProxyCache<ObjectPath, CollectionInner>,
    pub(crate) item_cache: ProxyCache<ObjectPath, ItemInner>,
}

impl ServiceInner {
    async fn connect(
        bus: Arc<dyn Bus>,
        config: Config,
        registry_key: Option<RegistryKey>,
        cancel: &CancellationToken,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        let algorithms = Algorithm::parse_list(&config.session.algorithms)?;

        let destination = cancellable(cancel, bus.resolve_name(&config.service.bus_name)).await??;
        debug!(
            bus_name = %config.service.bus_name,
            owner = %destination,
            shared = registry_key.is_some(),
            "connected to secret service"
        );

        Ok(Arc::new(Self {
            path: ObjectPath::new(config.service.object_path.clone()),
            bus,
            destination,
            config,
            algorithms,
            registry_key,
            session: OnceCell::new(),
            collections: Mutex::new(None),
            collection_cache: ProxyCache::new(),
            item_cache: ProxyCache::new(),
        }))
    }

    /// Call a method on the service, honouring `cancel`.
    pub(crate) async fn call(
        &self,
        path: &ObjectPath,
        interface: &str,
        method: &str,
        args: Vec<Value>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>> {
        let reply = cancellable(
            cancel,
            self.bus.call(&self.destination, path, interface, method, args),
        )
        .await??;
        Ok(reply)
    }

    pub(crate) async fn get_property(
        &self,
        path: &ObjectPath,
        interface: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let reply = self
            .call(
                path,
                interfaces::PROPERTIES,
                "Get",
                vec![Value::Str(interface.to_string()), Value::Str(name.to_string())],
                cancel,
            )
            .await?;
        let [value] = take_args::<1>(reply)?;
        Ok(value.into_inner())
    }

    pub(crate) async fn get_all_properties(
        &self,
        path: &ObjectPath,
        interface: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<(String, Value)>> {
        let reply = self
            .call(
                path,
                interfaces::PROPERTIES,
                "GetAll",
                vec![Value::Str(interface.to_string())],
                cancel,
            )
            .await?;
        let [props] = take_args::<1>(reply)?;
        Ok(props.into_property_dict()?)
    }

    pub(crate) async fn set_property(
        &self,
        path: &ObjectPath,
        interface: &str,
        name: &str,
        value: Value,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.call(
            path,
            interfaces::PROPERTIES,
            "Set",
            vec![
                Value::Str(interface.to_string()),
                Value::Str(name.to_string()),
                Value::variant(value),
            ],
            cancel,
        )
        .await?;
        Ok(())
    }

    pub(crate) async fn session(&self, cancel: &CancellationToken) -> Result<Arc<Session>> {
        let this = self;
        let session = self
            .session
            .get_or_try_init(move || async move {
                session::negotiate(
                    this.bus.as_ref(),
                    &this.destination,
                    &this.path,
                    &this.algorithms,
                    cancel,
                )
                .await
                .map(Arc::new)
            })
            .await?;
        Ok(session.clone())
    }

    /// Run the prompt at `path` (if any) with the configured window id.
    pub(crate) async fn prompt(
        &self,
        path: ObjectPath,
        cancel: &CancellationToken,
    ) -> Result<Option<PromptOutcome>> {
        prompt::run_optional(
            &self.bus,
            &self.destination,
            path,
            &self.config.prompt.window_id,
            cancel,
        )
        .await
    }

    /// Delete the object at `path` through `interface`. `false` if the user
    /// dismissed the confirmation.
    pub(crate) async fn delete_object(
        &self,
        path: &ObjectPath,
        interface: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        debug!(%path, "deleting object");
        let reply = self.call(path, interface, "Delete", vec![], cancel).await?;
        let [prompt_path] = take_args::<1>(reply)?;

        match self.prompt(prompt_path.into_path()?, cancel).await? {
            None | Some(PromptOutcome::Value(_)) => Ok(true),
            Some(PromptOutcome::Dismissed) => Ok(false),
        }
    }

    /// Create or replace an item. `None` if the user dismissed the
    /// confirmation.
    pub(crate) async fn create_item(
        &self,
        collection: &ObjectPath,
        label: &str,
        attributes: &Attributes,
        secret: &SecretValue,
        replace: bool,
        cancel: &CancellationToken,
    ) -> Result<Option<ObjectPath>> {
        let session = self.session(cancel).await?;
        let wire = secret_codec::encode(secret.get(), secret.content_type(), &session)?;

        let properties = Value::Dict(vec![
            (
                Value::Str(format!("{}.Label", interfaces::ITEM)),
                Value::variant(Value::Str(label.to_string())),
            ),
            (
                Value::Str(format!("{}.Attributes", interfaces::ITEM)),
                Value::variant(attributes.to_wire()),
            ),
        ]);

        debug!(%collection, label, replace, "creating item");
        let reply = self
            .call(
                collection,
                interfaces::COLLECTION,
                "CreateItem",
                vec![properties, wire.into_value(), Value::Bool(replace)],
                cancel,
            )
            .await?;
        let [item, prompt_path] = take_args::<2>(reply)?;

        let item = item.into_path()?;
        if !item.is_none() {
            return Ok(Some(item));
        }
        match self.prompt(prompt_path.into_path()?, cancel).await? {
            Some(PromptOutcome::Value(value)) => Ok(Some(value.into_path()?)),
            Some(PromptOutcome::Dismissed) => Ok(None),
            None => Err(SecretError::Transport(
                "CreateItem returned neither an item nor a prompt".to_string(),
            )),
        }
    }

    pub(crate) async fn collection(
        self: &Arc<Self>,
        path: ObjectPath,
        cancel: &CancellationToken,
    ) -> Result<Arc<CollectionInner>> {
        let this = self;
        self.collection_cache
            .get_or_create(path.clone(), move || async move {
                // Reading the properties proves the object exists.
                this.get_all_properties(&path, interfaces::COLLECTION, cancel)
                    .await?;
                debug!(%path, "created collection proxy");
                Ok(Arc::new(CollectionInner::new(this.clone(), path)))
            })
            .await
    }

    pub(crate) async fn item(
        self: &Arc<Self>,
        path: ObjectPath,
        cancel: &CancellationToken,
    ) -> Result<Arc<ItemInner>> {
        let this = self;
        self.item_cache
            .get_or_create(path.clone(), move || async move {
                this.get_all_properties(&path, interfaces::ITEM, cancel)
                    .await?;
                debug!(%path, "created item proxy");
                Ok(Arc::new(ItemInner::new(this.clone(), path)))
            })
            .await
    }

    async fn xlock(
        &self,
        method: &str,
        paths: &[ObjectPath],
        cancel: &CancellationToken,
    ) -> Result<Vec<ObjectPath>> {
        let reply = self
            .call(
                &self.path,
                interfaces::SERVICE,
                method,
                vec![Value::path_array(paths)],
                cancel,
            )
            .await?;
        let [done, prompt_path] = take_args::<2>(reply)?;
        let mut done = done.into_paths()?;

        match self.prompt(prompt_path.into_path()?, cancel).await? {
            Some(PromptOutcome::Value(value)) => done.extend(value.into_paths()?),
            Some(PromptOutcome::Dismissed) => {
                debug!(method, "confirmation dismissed; prompted objects unchanged")
            }
            None => {}
        }
        debug!(method, count = done.len(), "objects changed lock state");
        Ok(done)
    }
}

impl Drop for ServiceInner {
    fn drop(&mut self) {
        if let Some(key) = &self.registry_key {
            REGISTRY.remove_if_dead(key);
        }
    }
}

pub(crate) fn token(cancel: Option<&CancellationToken>) -> CancellationToken {
    cancel.cloned().unwrap_or_default()
}

/// Handle to a secret service.
#[derive(Clone)]
pub struct Service {
    pub(crate) inner: Arc<ServiceInner>,
}

impl Service {
    pub(crate) fn from_inner(inner: Arc<ServiceInner>) -> Self {
        Self { inner }
    }

    /// Shared service for `bus`, configured from the default config file.
    ///
    /// Every live handle for the same bus and service name is the same
    /// instance. Once all handles are dropped the next call builds a new one.
    pub async fn get(
        bus: Arc<dyn Bus>,
        flags: ServiceFlags,
        cancel: Option<&CancellationToken>,
    ) -> Result<Self> {
        Self::get_with_config(bus, Config::load_or_default(), flags, cancel).await
    }

    /// Shared service for `bus` with an explicit configuration.
    ///
    /// The configuration only applies if this call creates the instance.
    pub async fn get_with_config(
        bus: Arc<dyn Bus>,
        config: Config,
        flags: ServiceFlags,
        cancel: Option<&CancellationToken>,
    ) -> Result<Self> {
        let cancel = token(cancel);
        let key = (bus.address().to_string(), config.service.bus_name.clone());

        let connect_cancel = &cancel;
        let inner = REGISTRY
            .get_or_create(key.clone(), move || {
                ServiceInner::connect(bus, config, Some(key), connect_cancel)
            })
            .await?;

        let service = Self::from_inner(inner);
        service.ensure(flags, Some(&cancel)).await?;
        Ok(service)
    }

    /// A private service instance, never shared with [`Service::get`].
    pub async fn new(
        bus: Arc<dyn Bus>,
        config: Config,
        flags: ServiceFlags,
        cancel: Option<&CancellationToken>,
    ) -> Result<Self> {
        let cancel = token(cancel);
        let inner = ServiceInner::connect(bus, config, None, &cancel).await?;

        let service = Self::from_inner(inner);
        service.ensure(flags, Some(&cancel)).await?;
        Ok(service)
    }

    /// Whether two handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Service) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Resolved owner of the service's bus name.
    pub fn bus_name(&self) -> &str {
        &self.inner.destination
    }

    pub fn object_path(&self) -> &ObjectPath {
        &self.inner.path
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Capabilities acquired so far.
    pub fn flags(&self) -> ServiceFlags {
        let mut flags = ServiceFlags::NONE;
        if self.inner.session.initialized() {
            flags |= ServiceFlags::OPEN_SESSION;
        }
        if self.inner.collections.lock().is_some() {
            flags |= ServiceFlags::LOAD_COLLECTIONS;
        }
        flags
    }

    /// Acquire the capabilities in `flags` that are not held yet.
    pub async fn ensure(&self, flags: ServiceFlags, cancel: Option<&CancellationToken>) -> Result<()> {
        let have = self.flags();
        if flags.contains(ServiceFlags::OPEN_SESSION) && !have.contains(ServiceFlags::OPEN_SESSION) {
            self.ensure_session(cancel).await?;
        }
        if flags.contains(ServiceFlags::LOAD_COLLECTIONS)
            && !have.contains(ServiceFlags::LOAD_COLLECTIONS)
        {
            self.load_collections(cancel).await?;
        }
        Ok(())
    }

    /// Negotiate the transport session if needed and return its path.
    ///
    /// Concurrent callers share one negotiation.
    pub async fn ensure_session(&self, cancel: Option<&CancellationToken>) -> Result<ObjectPath> {
        let session = self.inner.session(&token(cancel)).await?;
        Ok(session.path().clone())
    }

    /// Path of the negotiated session, if any.
    pub fn session_path(&self) -> Option<ObjectPath> {
        self.inner.session.get().map(|s| s.path().clone())
    }

    /// Algorithm of the negotiated session, if any.
    pub fn session_algorithm(&self) -> Option<Algorithm> {
        self.inner.session.get().map(|s| s.algorithm())
    }

    /// Read the service's collection list.
    pub async fn load_collections(&self, cancel: Option<&CancellationToken>) -> Result<()> {
        let cancel = token(cancel);
        let paths = self
            .inner
            .get_property(&self.inner.path, interfaces::SERVICE, "Collections", &cancel)
            .await?
            .into_paths()?;

        // Construct the proxies so that unknown objects surface here.
        for path in &paths {
            self.inner.collection(path.clone(), &cancel).await?;
        }

        debug!(count = paths.len(), "loaded collections");
        *self.inner.collections.lock() = Some(paths);
        Ok(())
    }

    /// The service's collections, loading the list on first use.
    pub async fn collections(&self, cancel: Option<&CancellationToken>) -> Result<Vec<Collection>> {
        let cancel = token(cancel);
        let loaded = self.inner.collections.lock().clone();
        let paths = match loaded {
            Some(paths) => paths,
            None => {
                self.load_collections(Some(&cancel)).await?;
                self.inner.collections.lock().clone().unwrap_or_default()
            }
        };

        let mut collections = Vec::with_capacity(paths.len());
        for path in paths {
            collections.push(Collection::from_inner(self.inner.collection(path, &cancel).await?));
        }
        Ok(collections)
    }

    /// Secret of the item at `path`. `None` if the item is locked or gone.
    pub async fn get_secret_for_path(
        &self,
        path: &ObjectPath,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<SecretValue>> {
        let mut secrets = self
            .get_secrets_for_paths(std::slice::from_ref(path), cancel)
            .await?;
        Ok(secrets.remove(path))
    }

    /// Secrets of several items in one round trip.
    ///
    /// Locked or missing items are left out of the result.
    pub async fn get_secrets_for_paths(
        &self,
        paths: &[ObjectPath],
        cancel: Option<&CancellationToken>,
    ) -> Result<HashMap<ObjectPath, SecretValue>> {
        let cancel = token(cancel);
        let session = self.inner.session(&cancel).await?;

        let reply = self
            .inner
            .call(
                &self.inner.path,
                interfaces::SERVICE,
                "GetSecrets",
                vec![Value::path_array(paths), Value::Path(session.path().clone())],
                &cancel,
            )
            .await?;
        let [secrets] = take_args::<1>(reply)?;

        let mut decoded = HashMap::new();
        for (path, wire) in secrets.into_dict()? {
            let path = path.into_path()?;
            let wire = WireSecret::from_value(wire)?;
            decoded.insert(path, secret_codec::decode(wire, &session)?);
        }
        debug!(requested = paths.len(), returned = decoded.len(), "retrieved secrets");
        Ok(decoded)
    }

    /// Secrets of several items, keyed by item.
    pub async fn get_secrets(
        &self,
        items: &[Item],
        cancel: Option<&CancellationToken>,
    ) -> Result<HashMap<Item, SecretValue>> {
        let paths: Vec<ObjectPath> = items.iter().map(|i| i.object_path().clone()).collect();
        let mut by_path = self.get_secrets_for_paths(&paths, cancel).await?;

        Ok(items
            .iter()
            .filter_map(|item| {
                by_path
                    .remove(item.object_path())
                    .map(|secret| (item.clone(), secret))
            })
            .collect())
    }

    /// Lock objects by path. Returns the paths that ended up locked.
    pub async fn lock_paths(
        &self,
        paths: &[ObjectPath],
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<ObjectPath>> {
        self.inner.xlock("Lock", paths, &token(cancel)).await
    }

    /// Unlock objects by path. Returns the paths that ended up unlocked.
    pub async fn unlock_paths(
        &self,
        paths: &[ObjectPath],
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<ObjectPath>> {
        self.inner.xlock("Unlock", paths, &token(cancel)).await
    }

    /// Lock collections or items. Returns those that ended up locked.
    pub async fn lock<T>(&self, objects: &[T], cancel: Option<&CancellationToken>) -> Result<Vec<T>>
    where
        T: SecretObject + Clone,
    {
        let paths: Vec<ObjectPath> = objects.iter().map(|o| o.object_path().clone()).collect();
        let done = self.lock_paths(&paths, cancel).await?;
        Ok(select_objects(objects, &done))
    }

    /// Unlock collections or items. Returns those that ended up unlocked.
    pub async fn unlock<T>(&self, objects: &[T], cancel: Option<&CancellationToken>) -> Result<Vec<T>>
    where
        T: SecretObject + Clone,
    {
        let paths: Vec<ObjectPath> = objects.iter().map(|o| o.object_path().clone()).collect();
        let done = self.unlock_paths(&paths, cancel).await?;
        Ok(select_objects(objects, &done))
    }

    /// Delete the item at `path`.
    ///
    /// Returns `false` if the service asked for confirmation and the user
    /// declined.
    pub async fn delete_path(
        &self,
        path: &ObjectPath,
        cancel: Option<&CancellationToken>,
    ) -> Result<bool> {
        let deleted = self
            .inner
            .delete_object(path, interfaces::ITEM, &token(cancel))
            .await?;
        if deleted {
            info!(%path, "deleted item");
        }
        Ok(deleted)
    }
}

fn select_objects<T: SecretObject + Clone>(objects: &[T], paths: &[ObjectPath]) -> Vec<T> {
    objects
        .iter()
        .filter(|o| paths.contains(o.object_path()))
        .cloned()
        .collect()
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("bus_name", &self.inner.destination)
            .field("path", &self.inner.path)
            .field("flags", &self.flags())
            .finish()
    }
}
