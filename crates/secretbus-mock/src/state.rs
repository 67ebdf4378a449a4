//! Object model of the mock service.

use std::collections::{BTreeMap, HashMap};

use secretbus_client::bus::{ObjectPath, Value};
use secretbus_client::session::Session;
use tokio::sync::mpsc;
use zeroize::Zeroizing;

use crate::{PromptBehavior, ALIAS_PREFIX, COLLECTION_PREFIX, SERVICE_PATH};

pub(crate) fn now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

#[derive(Clone)]
pub(crate) struct MockItem {
    pub id: String,
    pub label: String,
    pub attributes: BTreeMap<String, String>,
    pub secret: Zeroizing<Vec<u8>>,
    pub content_type: String,
    pub confirm: bool,
    pub created: u64,
    pub modified: u64,
}

impl MockItem {
    pub fn new(id: &str, label: &str, attributes: &[(&str, &str)], secret: &str) -> Self {
        let ts = now();
        Self {
            id: id.to_string(),
            label: label.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            secret: Zeroizing::new(secret.as_bytes().to_vec()),
            content_type: "text/plain".to_string(),
            confirm: false,
            created: ts,
            modified: ts,
        }
    }

    pub fn confirm(mut self) -> Self {
        self.confirm = true;
        self
    }

    pub fn matches(&self, criteria: &[(String, String)]) -> bool {
        criteria
            .iter()
            .all(|(k, v)| self.attributes.get(k) == Some(v))
    }
}

pub(crate) struct MockCollection {
    pub id: String,
    pub label: String,
    pub locked: bool,
    pub confirm: bool,
    pub items: Vec<MockItem>,
    pub created: u64,
    pub modified: u64,
}

impl MockCollection {
    pub fn new(id: &str, label: &str, locked: bool) -> Self {
        let ts = now();
        Self {
            id: id.to_string(),
            label: label.to_string(),
            locked,
            confirm: false,
            items: Vec::new(),
            created: ts,
            modified: ts,
        }
    }

    pub fn confirm(mut self) -> Self {
        self.confirm = true;
        self
    }

    pub fn with_item(mut self, item: MockItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn path(&self) -> ObjectPath {
        ObjectPath::new(format!("{COLLECTION_PREFIX}{}", self.id))
    }

    pub fn item_path(&self, item: &MockItem) -> ObjectPath {
        ObjectPath::new(format!("{COLLECTION_PREFIX}{}/{}", self.id, item.id))
    }
}

/// What a confirmed prompt does.
#[derive(Clone)]
pub(crate) enum PromptAction {
    Delete(ObjectPath),
    SetLocked { paths: Vec<ObjectPath>, lock: bool },
    Store { collection: String, item: MockItem },
}

pub(crate) struct MockPrompt {
    pub action: PromptAction,
    pub result: Value,
    pub completed: bool,
}

pub(crate) struct Subscriber {
    pub path: ObjectPath,
    pub interface: String,
    pub member: String,
    pub sender: mpsc::UnboundedSender<Vec<Value>>,
}

/// Resolved object behind a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    Service,
    Collection(usize),
    Item(usize, usize),
    Prompt,
    Unknown,
}

pub(crate) struct State {
    pub collections: Vec<MockCollection>,
    pub aliases: HashMap<String, String>,
    pub sessions: HashMap<ObjectPath, Session>,
    pub prompts: HashMap<ObjectPath, MockPrompt>,
    pub subscribers: HashMap<u64, Subscriber>,
    pub calls: HashMap<String, usize>,
    pub dismissed: Vec<ObjectPath>,
    pub prompt_behavior: PromptBehavior,
    pub connected: bool,
    next_id: u64,
}

impl State {
    pub fn new(collections: Vec<MockCollection>, aliases: HashMap<String, String>) -> Self {
        Self {
            collections,
            aliases,
            sessions: HashMap::new(),
            prompts: HashMap::new(),
            subscribers: HashMap::new(),
            calls: HashMap::new(),
            dismissed: Vec::new(),
            prompt_behavior: PromptBehavior::Complete,
            connected: true,
            next_id: 0,
        }
    }

    pub fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn target(&self, path: &ObjectPath) -> Target {
        let raw = path.as_str();
        if raw == SERVICE_PATH {
            return Target::Service;
        }
        if self.prompts.contains_key(path) {
            return Target::Prompt;
        }
        if let Some(alias) = raw.strip_prefix(ALIAS_PREFIX) {
            return self
                .aliases
                .get(alias)
                .and_then(|id| self.collection_index(id))
                .map(Target::Collection)
                .unwrap_or(Target::Unknown);
        }
        let Some(rest) = raw.strip_prefix(COLLECTION_PREFIX) else {
            return Target::Unknown;
        };
        match rest.split_once('/') {
            None => self
                .collection_index(rest)
                .map(Target::Collection)
                .unwrap_or(Target::Unknown),
            Some((collection, item)) => self
                .collection_index(collection)
                .and_then(|ci| {
                    self.collections[ci]
                        .items
                        .iter()
                        .position(|i| i.id == item)
                        .map(|ii| Target::Item(ci, ii))
                })
                .unwrap_or(Target::Unknown),
        }
    }

    fn collection_index(&self, id: &str) -> Option<usize> {
        self.collections.iter().position(|c| c.id == id)
    }

    /// Lock state and confirmation requirement of a lockable object.
    pub fn lock_info(&self, path: &ObjectPath) -> Option<(bool, bool)> {
        match self.target(path) {
            Target::Collection(ci) => {
                let c = &self.collections[ci];
                Some((c.locked, c.confirm))
            }
            Target::Item(ci, ii) => {
                let c = &self.collections[ci];
                Some((c.locked, c.items[ii].confirm))
            }
            _ => None,
        }
    }

    /// Items share the lock state of their collection.
    pub fn set_locked(&mut self, path: &ObjectPath, lock: bool) {
        let ci = match self.target(path) {
            Target::Collection(ci) | Target::Item(ci, _) => ci,
            _ => return,
        };
        let collection = &mut self.collections[ci];
        collection.locked = lock;
        collection.modified = now();
    }

    pub fn delete(&mut self, path: &ObjectPath) {
        match self.target(path) {
            Target::Collection(ci) => {
                let removed = self.collections.remove(ci);
                self.aliases.retain(|_, id| *id != removed.id);
            }
            Target::Item(ci, ii) => {
                let collection = &mut self.collections[ci];
                collection.items.remove(ii);
                collection.modified = now();
            }
            _ => {}
        }
    }

    /// Insert `item` into a collection, or overwrite the item with its id.
    pub fn store_item(&mut self, ci: usize, item: MockItem) {
        let collection = &mut self.collections[ci];
        match collection.items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => {
                existing.label = item.label;
                existing.secret = item.secret;
                existing.content_type = item.content_type;
                existing.modified = now();
            }
            None => collection.items.push(item),
        }
        collection.modified = now();
    }

    pub fn perform(&mut self, action: &PromptAction) {
        match action {
            PromptAction::Delete(path) => self.delete(path),
            PromptAction::SetLocked { paths, lock } => {
                for path in paths {
                    self.set_locked(path, *lock);
                }
            }
            PromptAction::Store { collection, item } => {
                if let Some(ci) = self.collection_index(collection) {
                    self.store_item(ci, item.clone());
                }
            }
        }
    }

    pub fn emit(&self, path: &ObjectPath, interface: &str, member: &str, body: Vec<Value>) {
        for subscriber in self.subscribers.values() {
            if &subscriber.path == path
                && subscriber.interface == interface
                && subscriber.member == member
            {
                let _ = subscriber.sender.send(body.clone());
            }
        }
    }
}
