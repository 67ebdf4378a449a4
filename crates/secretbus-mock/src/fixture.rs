//! The standard test objects.
//!
//! - `english`: unlocked, three items with secrets `111`, `222`, `3333`
//! - `spanish`: locked, the same secrets under Spanish number words
//! - `empty`: unlocked, no items
//! - `to_delete`: `item` deletes directly, `confirm` asks first
//! - `lock_one`: locks and unlocks directly
//! - `lock_prompt`: locks, unlocks and creates items through a prompt
//!
//! The `default` alias points at `english`.

use std::collections::HashMap;

use crate::state::{MockCollection, MockItem};

pub(crate) fn standard() -> (Vec<MockCollection>, HashMap<String, String>) {
    let collections = vec![
        MockCollection::new("english", "Collection One", false)
            .with_item(MockItem::new(
                "item_one",
                "Item One",
                &[("number", "1"), ("string", "one"), ("even", "false")],
                "111",
            ))
            .with_item(MockItem::new(
                "item_two",
                "Item",
                &[("number", "2"), ("string", "two"), ("even", "true")],
                "222",
            ))
            .with_item(MockItem::new(
                "item_three",
                "Item",
                &[("number", "3"), ("string", "three"), ("even", "false")],
                "3333",
            )),
        MockCollection::new("spanish", "Collection", true)
            .with_item(MockItem::new(
                "item_one",
                "Item",
                &[("number", "1"), ("string", "uno"), ("even", "false")],
                "111",
            ))
            .with_item(MockItem::new(
                "item_two",
                "Item",
                &[("number", "2"), ("string", "dos"), ("even", "true")],
                "222",
            ))
            .with_item(MockItem::new(
                "item_three",
                "Item",
                &[("number", "3"), ("string", "tres"), ("even", "false")],
                "3333",
            )),
        MockCollection::new("empty", "Collection", false),
        MockCollection::new("to_delete", "Collection", false)
            .with_item(MockItem::new("item", "Item", &[], ""))
            .with_item(MockItem::new("confirm", "Item", &[], "").confirm()),
        MockCollection::new("lock_one", "Collection", false),
        MockCollection::new("lock_prompt", "Collection", false).confirm(),
    ];

    let aliases = HashMap::from([("default".to_string(), "english".to_string())]);
    (collections, aliases)
}
