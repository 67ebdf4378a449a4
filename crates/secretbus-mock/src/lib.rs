//! # secretbus-mock
//!
//! An in-process secret service that implements [`Bus`] directly, for
//! exercising `secretbus-client` without a message bus.
//!
//! The service starts with the standard fixture (see the `fixture` module
//! source) and records every method call, so tests can assert on round trips.
//! Prompts complete, get dismissed, or hang, depending on
//! [`PromptBehavior`].

mod fixture;
mod state;

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use secretbus_client::bus::{
    faults, interfaces, take_args, Bus, BusError, ObjectPath, Subscription, SubscriptionId, Value,
};
use secretbus_client::crypto::DhKeypair;
use secretbus_client::secret_codec::{self, WireSecret};
use secretbus_client::session::{Algorithm, Session};
use tokio::sync::mpsc;
use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::state::{now, MockItem, MockPrompt, PromptAction, State, Subscriber, Target};

/// Object path of the service.
pub const SERVICE_PATH: &str = "/org/freedesktop/secrets";
/// Prefix of collection paths.
pub const COLLECTION_PREFIX: &str = "/org/freedesktop/secrets/collection/";
/// Prefix of alias paths.
pub const ALIAS_PREFIX: &str = "/org/freedesktop/secrets/aliases/";

const SESSION_PREFIX: &str = "/org/freedesktop/secrets/sessions/";
const PROMPT_PREFIX: &str = "/org/freedesktop/secrets/prompts/";
const UNIQUE_NAME: &str = ":1.42";

const UNKNOWN_METHOD: &str = "org.freedesktop.DBus.Error.UnknownMethod";
const NAME_HAS_NO_OWNER: &str = "org.freedesktop.DBus.Error.NameHasNoOwner";
const FAILED: &str = "org.freedesktop.DBus.Error.Failed";

static NEXT_ADDRESS: AtomicU64 = AtomicU64::new(1);

/// How the mock answers `Prompt` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptBehavior {
    /// Perform the operation and report completion.
    Complete,
    /// Report that the user dismissed the prompt.
    Dismiss,
    /// Never answer; only `Dismiss` ends the prompt.
    Ignore,
}

/// Path of a fixture collection.
pub fn collection_path(collection: &str) -> ObjectPath {
    ObjectPath::new(format!("{COLLECTION_PREFIX}{collection}"))
}

/// Path of a fixture item.
pub fn item_path(collection: &str, item: &str) -> ObjectPath {
    ObjectPath::new(format!("{COLLECTION_PREFIX}{collection}/{item}"))
}

/// The mock service.
pub struct MockService {
    address: String,
    bus_name: String,
    algorithms: Vec<Algorithm>,
    state: Mutex<State>,
}

impl MockService {
    /// A service with the standard fixture that accepts every algorithm.
    pub fn new() -> Self {
        Self::with_algorithms(Algorithm::preferred())
    }

    /// A service that only accepts unencrypted sessions.
    pub fn plain_only() -> Self {
        Self::with_algorithms(vec![Algorithm::Plain])
    }

    /// A service with the standard fixture accepting only `algorithms`.
    pub fn with_algorithms(algorithms: Vec<Algorithm>) -> Self {
        let (collections, aliases) = fixture::standard();
        Self {
            address: format!("mock:{}", NEXT_ADDRESS.fetch_add(1, Ordering::Relaxed)),
            bus_name: secretbus_core::config::DEFAULT_BUS_NAME.to_string(),
            algorithms,
            state: Mutex::new(State::new(collections, aliases)),
        }
    }

    pub fn set_prompt_behavior(&self, behavior: PromptBehavior) {
        self.state.lock().prompt_behavior = behavior;
    }

    /// Make every later call fail as if the bus went away.
    pub fn disconnect(&self) {
        self.state.lock().connected = false;
    }

    /// How many times `method` was called, on any object.
    pub fn call_count(&self, method: &str) -> usize {
        self.state.lock().calls.get(method).copied().unwrap_or(0)
    }

    /// Prompts that received `Dismiss`.
    pub fn dismissed_prompts(&self) -> Vec<ObjectPath> {
        self.state.lock().dismissed.clone()
    }

    /// Live signal subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// Whether an object exists at `path`.
    pub fn exists(&self, path: &ObjectPath) -> bool {
        !matches!(self.state.lock().target(path), Target::Unknown)
    }

    /// Lock state of a collection or item.
    pub fn is_locked(&self, path: &ObjectPath) -> Option<bool> {
        self.state.lock().lock_info(path).map(|(locked, _)| locked)
    }

    /// Stored secret of an item.
    pub fn secret_of(&self, path: &ObjectPath) -> Option<Vec<u8>> {
        let state = self.state.lock();
        match state.target(path) {
            Target::Item(ci, ii) => Some(state.collections[ci].items[ii].secret.to_vec()),
            _ => None,
        }
    }

    fn dispatch(
        &self,
        state: &mut State,
        path: &ObjectPath,
        interface: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, BusError> {
        let target = state.target(path);
        if target == Target::Unknown {
            return Err(BusError::fault(
                faults::UNKNOWN_OBJECT,
                format!("no such object: {path}"),
            ));
        }

        match (target, interface, method) {
            (_, interfaces::PROPERTIES, "Get") => {
                let [iface, name] = take_args::<2>(args)?;
                let (iface, name) = (iface.into_string()?, name.into_string()?);
                let value = properties(state, target, &iface)?
                    .into_iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, v)| v)
                    .ok_or_else(|| {
                        BusError::fault(faults::INVALID_ARGS, format!("no property {name}"))
                    })?;
                Ok(vec![Value::variant(value)])
            }
            (_, interfaces::PROPERTIES, "GetAll") => {
                let [iface] = take_args::<1>(args)?;
                let props = properties(state, target, &iface.into_string()?)?;
                Ok(vec![Value::Dict(
                    props
                        .into_iter()
                        .map(|(n, v)| (Value::Str(n.to_string()), Value::variant(v)))
                        .collect(),
                )])
            }
            (_, interfaces::PROPERTIES, "Set") => {
                let [iface, name, value] = take_args::<3>(args)?;
                set_property(state, target, &iface.into_string()?, &name.into_string()?, value)?;
                Ok(vec![])
            }

            (Target::Service, interfaces::SERVICE, "OpenSession") => {
                let [algorithm, input] = take_args::<2>(args)?;
                self.open_session(state, &algorithm.into_string()?, input)
            }
            (Target::Service, interfaces::SERVICE, "SearchItems") => {
                let [criteria] = take_args::<1>(args)?;
                Ok(search_items(state, &criteria.into_string_dict()?))
            }
            (Target::Service, interfaces::SERVICE, "GetSecrets") => {
                let [paths, session] = take_args::<2>(args)?;
                get_secrets(state, paths.into_paths()?, &session.into_path()?)
            }
            (Target::Service, interfaces::SERVICE, "Lock") => {
                let [paths] = take_args::<1>(args)?;
                Ok(set_locked(state, paths.into_paths()?, true))
            }
            (Target::Service, interfaces::SERVICE, "Unlock") => {
                let [paths] = take_args::<1>(args)?;
                Ok(set_locked(state, paths.into_paths()?, false))
            }

            (Target::Collection(ci), interfaces::COLLECTION, "Delete") => {
                let confirm = state.collections[ci].confirm;
                let path = state.collections[ci].path();
                Ok(vec![Value::Path(delete(state, path, confirm))])
            }
            (Target::Collection(ci), interfaces::COLLECTION, "CreateItem") => {
                let [props, secret, replace] = take_args::<3>(args)?;
                create_item(state, ci, props, secret, replace.into_bool()?)
            }

            (Target::Item(ci, ii), interfaces::ITEM, "GetSecret") => {
                let [session] = take_args::<1>(args)?;
                let session = lookup_session(state, &session.into_path()?)?;
                let collection = &state.collections[ci];
                if collection.locked {
                    return Err(BusError::fault(
                        faults::IS_LOCKED,
                        format!("secret is locked: {path}"),
                    ));
                }
                Ok(vec![encode(session, &collection.items[ii])?.into_value()])
            }
            (Target::Item(ci, ii), interfaces::ITEM, "SetSecret") => {
                let [secret] = take_args::<1>(args)?;
                if state.collections[ci].locked {
                    return Err(BusError::fault(
                        faults::IS_LOCKED,
                        format!("secret is locked: {path}"),
                    ));
                }
                let (bytes, content_type) = decode(state, secret)?;
                let item = &mut state.collections[ci].items[ii];
                item.secret = bytes;
                item.content_type = content_type;
                item.modified = now();
                Ok(vec![])
            }
            (Target::Item(ci, ii), interfaces::ITEM, "Delete") => {
                let confirm = state.collections[ci].items[ii].confirm;
                Ok(vec![Value::Path(delete(state, path.clone(), confirm))])
            }

            (Target::Prompt, interfaces::PROMPT, "Prompt") => {
                run_prompt(state, path);
                Ok(vec![])
            }
            (Target::Prompt, interfaces::PROMPT, "Dismiss") => {
                dismiss_prompt(state, path);
                Ok(vec![])
            }

            _ => Err(BusError::fault(
                UNKNOWN_METHOD,
                format!("no method {interface}.{method} on {path}"),
            )),
        }
    }

    fn open_session(
        &self,
        state: &mut State,
        algorithm: &str,
        input: Value,
    ) -> Result<Vec<Value>, BusError> {
        let algorithm = algorithm
            .parse::<Algorithm>()
            .ok()
            .filter(|a| self.algorithms.contains(a))
            .ok_or_else(|| {
                BusError::fault(
                    faults::NOT_SUPPORTED,
                    format!("algorithm {algorithm} is not supported"),
                )
            })?;

        let path = ObjectPath::new(format!("{SESSION_PREFIX}{}", state.next_id()));
        let (output, key) = match algorithm {
            Algorithm::Plain => (Value::Str(String::new()), None),
            Algorithm::DhAes => {
                let peer = input.into_bytes()?;
                let keypair = DhKeypair::generate();
                let key = keypair
                    .derive_key(&peer)
                    .map_err(|e| BusError::fault(faults::INVALID_ARGS, e.to_string()))?;
                (Value::Bytes(keypair.public_bytes().to_vec()), Some(key))
            }
        };

        let session = Session::new(path.clone(), algorithm, key)
            .map_err(|e| BusError::fault(FAILED, e.to_string()))?;
        debug!(%path, %algorithm, "mock opened session");
        state.sessions.insert(path.clone(), session);

        Ok(vec![Value::variant(output), Value::Path(path)])
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Bus for MockService {
    fn address(&self) -> &str {
        &self.address
    }

    async fn resolve_name(&self, name: &str) -> Result<String, BusError> {
        let state = self.state.lock();
        if !state.connected {
            return Err(BusError::Disconnected(self.address.clone()));
        }
        if name == self.bus_name {
            Ok(UNIQUE_NAME.to_string())
        } else {
            Err(BusError::fault(
                NAME_HAS_NO_OWNER,
                format!("name {name} has no owner"),
            ))
        }
    }

    async fn call(
        &self,
        destination: &str,
        path: &ObjectPath,
        interface: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, BusError> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(BusError::Disconnected(self.address.clone()));
        }
        if destination != UNIQUE_NAME && destination != self.bus_name {
            return Err(BusError::fault(
                NAME_HAS_NO_OWNER,
                format!("name {destination} has no owner"),
            ));
        }

        *state.calls.entry(method.to_string()).or_default() += 1;
        trace!(%path, interface, method, "mock call");
        self.dispatch(&mut state, path, interface, method, args)
    }

    fn subscribe(
        &self,
        _destination: &str,
        path: &ObjectPath,
        interface: &str,
        member: &str,
    ) -> Result<Subscription, BusError> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(BusError::Disconnected(self.address.clone()));
        }

        let (sender, signals) = mpsc::unbounded_channel();
        let id = state.next_id();
        state.subscribers.insert(
            id,
            Subscriber {
                path: path.clone(),
                interface: interface.to_string(),
                member: member.to_string(),
                sender,
            },
        );
        Ok(Subscription {
            id: SubscriptionId(id),
            signals,
        })
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.state.lock().subscribers.remove(&id.0);
    }
}

fn properties(
    state: &State,
    target: Target,
    interface: &str,
) -> Result<Vec<(&'static str, Value)>, BusError> {
    let props = match (target, interface) {
        (Target::Service, interfaces::SERVICE) => vec![(
            "Collections",
            Value::path_array(&state.collections.iter().map(|c| c.path()).collect::<Vec<_>>()),
        )],
        (Target::Collection(ci), interfaces::COLLECTION) => {
            let c = &state.collections[ci];
            let items: Vec<ObjectPath> = c.items.iter().map(|i| c.item_path(i)).collect();
            vec![
                ("Items", Value::path_array(&items)),
                ("Label", Value::Str(c.label.clone())),
                ("Locked", Value::Bool(c.locked)),
                ("Created", Value::U64(c.created)),
                ("Modified", Value::U64(c.modified)),
            ]
        }
        (Target::Item(ci, ii), interfaces::ITEM) => {
            let c = &state.collections[ci];
            let item = &c.items[ii];
            vec![
                ("Locked", Value::Bool(c.locked)),
                ("Attributes", string_dict(item.attributes.iter())),
                ("Label", Value::Str(item.label.clone())),
                ("Created", Value::U64(item.created)),
                ("Modified", Value::U64(item.modified)),
            ]
        }
        _ => {
            return Err(BusError::fault(
                faults::INVALID_ARGS,
                format!("unknown interface {interface}"),
            ))
        }
    };
    Ok(props)
}

fn set_property(
    state: &mut State,
    target: Target,
    interface: &str,
    name: &str,
    value: Value,
) -> Result<(), BusError> {
    match (target, interface, name) {
        (Target::Collection(ci), interfaces::COLLECTION, "Label") => {
            let c = &mut state.collections[ci];
            c.label = value.into_string()?;
            c.modified = now();
        }
        (Target::Item(ci, ii), interfaces::ITEM, "Label") => {
            let item = &mut state.collections[ci].items[ii];
            item.label = value.into_string()?;
            item.modified = now();
        }
        (Target::Item(ci, ii), interfaces::ITEM, "Attributes") => {
            let item = &mut state.collections[ci].items[ii];
            item.attributes = value.into_string_dict()?.into_iter().collect();
            item.modified = now();
        }
        _ => {
            return Err(BusError::fault(
                faults::INVALID_ARGS,
                format!("{interface}.{name} is not writable"),
            ))
        }
    }
    Ok(())
}

fn string_dict<'a>(entries: impl Iterator<Item = (&'a String, &'a String)>) -> Value {
    Value::Dict(
        entries
            .map(|(k, v)| (Value::Str(k.clone()), Value::Str(v.clone())))
            .collect(),
    )
}

fn search_items(state: &State, criteria: &[(String, String)]) -> Vec<Value> {
    let mut unlocked = Vec::new();
    let mut locked = Vec::new();
    for collection in &state.collections {
        let matches = collection
            .items
            .iter()
            .filter(|item| item.matches(criteria))
            .map(|item| collection.item_path(item));
        if collection.locked {
            locked.extend(matches);
        } else {
            unlocked.extend(matches);
        }
    }
    vec![Value::path_array(&unlocked), Value::path_array(&locked)]
}

fn lookup_session<'a>(state: &'a State, path: &ObjectPath) -> Result<&'a Session, BusError> {
    state
        .sessions
        .get(path)
        .ok_or_else(|| BusError::fault(faults::INVALID_ARGS, format!("session invalid: {path}")))
}

fn encode(session: &Session, item: &MockItem) -> Result<WireSecret, BusError> {
    secret_codec::encode(&item.secret, &item.content_type, session)
        .map_err(|e| BusError::fault(FAILED, e.to_string()))
}

fn decode(state: &State, secret: Value) -> Result<(Zeroizing<Vec<u8>>, String), BusError> {
    let wire = WireSecret::from_value(secret)?;
    let session = lookup_session(state, &wire.session)?;
    let value = secret_codec::decode(wire, session)
        .map_err(|e| BusError::fault(faults::INVALID_ARGS, e.to_string()))?;
    Ok((
        Zeroizing::new(value.get().to_vec()),
        value.content_type().to_string(),
    ))
}

fn get_secrets(
    state: &State,
    paths: Vec<ObjectPath>,
    session: &ObjectPath,
) -> Result<Vec<Value>, BusError> {
    let session = lookup_session(state, session)?;
    let mut secrets = Vec::new();
    for path in paths {
        if let Target::Item(ci, ii) = state.target(&path) {
            let collection = &state.collections[ci];
            if !collection.locked {
                let wire = encode(session, &collection.items[ii])?;
                secrets.push((Value::Path(path), wire.into_value()));
            }
        }
    }
    Ok(vec![Value::Dict(secrets)])
}

fn new_prompt(state: &mut State, action: PromptAction, result: Value) -> ObjectPath {
    let path = ObjectPath::new(format!("{PROMPT_PREFIX}p{}", state.next_id()));
    state.prompts.insert(
        path.clone(),
        MockPrompt {
            action,
            result,
            completed: false,
        },
    );
    path
}

fn set_locked(state: &mut State, paths: Vec<ObjectPath>, lock: bool) -> Vec<Value> {
    let mut done = Vec::new();
    let mut prompted = Vec::new();

    for path in paths {
        let Some((locked, confirm)) = state.lock_info(&path) else {
            continue;
        };
        if locked == lock {
            done.push(path);
        } else if !confirm {
            state.set_locked(&path, lock);
            done.push(path);
        } else {
            prompted.push(path);
        }
    }

    let prompt = if prompted.is_empty() {
        ObjectPath::none()
    } else {
        let result = Value::path_array(&prompted);
        new_prompt(
            state,
            PromptAction::SetLocked {
                paths: prompted,
                lock,
            },
            result,
        )
    };
    vec![Value::path_array(&done), Value::Path(prompt)]
}

fn delete(state: &mut State, path: ObjectPath, confirm: bool) -> ObjectPath {
    if confirm {
        new_prompt(
            state,
            PromptAction::Delete(path),
            Value::Str(String::new()),
        )
    } else {
        state.delete(&path);
        ObjectPath::none()
    }
}

fn create_item(
    state: &mut State,
    ci: usize,
    props: Value,
    secret: Value,
    replace: bool,
) -> Result<Vec<Value>, BusError> {
    if state.collections[ci].locked {
        return Err(BusError::fault(
            faults::IS_LOCKED,
            format!("collection is locked: {}", state.collections[ci].path()),
        ));
    }

    let mut label = String::new();
    let mut attributes = Vec::new();
    for (name, value) in props.into_property_dict()? {
        match name.strip_prefix(interfaces::ITEM) {
            Some(".Label") => label = value.into_string()?,
            Some(".Attributes") => attributes = value.into_string_dict()?,
            _ => {}
        }
    }
    let (bytes, content_type) = decode(state, secret)?;

    let existing = if replace {
        state.collections[ci]
            .items
            .iter()
            .find(|i| i.attributes.len() == attributes.len() && i.matches(&attributes))
            .map(|i| i.id.clone())
    } else {
        None
    };
    let id = existing.unwrap_or_else(|| format!("item_{}", state.next_id()));

    let attrs: Vec<(&str, &str)> = attributes
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let mut item = MockItem::new(&id, &label, &attrs, "");
    item.secret = bytes;
    item.content_type = content_type;
    let path = state.collections[ci].item_path(&item);

    if state.collections[ci].confirm {
        let action = PromptAction::Store {
            collection: state.collections[ci].id.clone(),
            item,
        };
        let prompt = new_prompt(state, action, Value::Path(path));
        return Ok(vec![Value::Path(ObjectPath::none()), Value::Path(prompt)]);
    }

    state.store_item(ci, item);
    debug!(%path, "mock stored item");
    Ok(vec![Value::Path(path), Value::Path(ObjectPath::none())])
}

fn run_prompt(state: &mut State, path: &ObjectPath) {
    let behavior = state.prompt_behavior;
    let Some(prompt) = state.prompts.get_mut(path) else {
        return;
    };
    if prompt.completed || behavior == PromptBehavior::Ignore {
        return;
    }
    prompt.completed = true;

    if behavior == PromptBehavior::Complete {
        let (action, result) = (prompt.action.clone(), prompt.result.clone());
        state.perform(&action);
        complete(state, path, false, result);
    } else {
        complete(state, path, true, Value::Str(String::new()));
    }
}

fn dismiss_prompt(state: &mut State, path: &ObjectPath) {
    state.dismissed.push(path.clone());
    let Some(prompt) = state.prompts.get_mut(path) else {
        return;
    };
    if prompt.completed {
        return;
    }
    prompt.completed = true;
    complete(state, path, true, Value::Str(String::new()));
}

fn complete(state: &State, path: &ObjectPath, dismissed: bool, result: Value) {
    debug!(%path, dismissed, "mock prompt completed");
    state.emit(
        path,
        interfaces::PROMPT,
        "Completed",
        vec![Value::Bool(dismissed), Value::variant(result)],
    );
}
