//! Searching, reading and storing secrets.

use secretbus_client::{
    Attributes, Collection, Item, Partition, SecretError, SecretObject, SecretValue, ServiceFlags,
};
use secretbus_integration_tests::{attrs_string, mock_schema, service};
use secretbus_mock::{collection_path, item_path};

#[tokio::test]
async fn test_search_splits_by_lock_state() {
    let (mock, service) = service(ServiceFlags::NONE).await;
    let even = Attributes::new().with("even", true);

    let found = service
        .search_paths(&even, Partition::BOTH, None)
        .await
        .unwrap();
    assert_eq!(found.unlocked, vec![item_path("english", "item_two")]);
    assert_eq!(found.locked, vec![item_path("spanish", "item_two")]);
    assert_eq!(mock.call_count("SearchItems"), 1);
}

#[tokio::test]
async fn test_search_partition_filters_without_extra_calls() {
    let (mock, service) = service(ServiceFlags::NONE).await;
    let odd = Attributes::new().with("even", false);

    let unlocked = service
        .search_paths(&odd, Partition::UNLOCKED, None)
        .await
        .unwrap();
    assert_eq!(unlocked.unlocked.len(), 2);
    assert!(unlocked.locked.is_empty());

    let locked = service
        .search_paths(&odd, Partition::LOCKED, None)
        .await
        .unwrap();
    assert!(locked.unlocked.is_empty());
    assert_eq!(locked.locked.len(), 2);

    let none = service
        .search_paths(&odd, Partition::NONE, None)
        .await
        .unwrap();
    assert!(none.is_empty());

    assert_eq!(mock.call_count("SearchItems"), 3);
}

#[tokio::test]
async fn test_search_without_attributes_is_refused() {
    let (mock, service) = service(ServiceFlags::NONE).await;

    let err = service
        .search_paths(&Attributes::new(), Partition::BOTH, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SecretError::Usage(_)));
    assert_eq!(mock.call_count("SearchItems"), 0);
}

#[tokio::test]
async fn test_search_all() {
    let (_mock, service) = service(ServiceFlags::NONE).await;

    let found = service.search_all_paths(Partition::BOTH, None).await.unwrap();
    assert_eq!(found.unlocked.len(), 5);
    assert_eq!(found.locked.len(), 3);
}

#[tokio::test]
async fn test_search_resolves_items() {
    let (_mock, service) = service(ServiceFlags::NONE).await;

    let results = service
        .search(&attrs_string("one"), Partition::BOTH, None)
        .await
        .unwrap();
    assert_eq!(results.unlocked.len(), 1);
    assert!(results.locked.is_empty());

    let item = &results.unlocked[0];
    assert_eq!(item.label(None).await.unwrap(), "Item One");
    assert!(!item.locked(None).await.unwrap());

    let typed = item.schema_attributes(&mock_schema(), None).await.unwrap();
    assert_eq!(typed, Attributes::new().with("number", 1).with("string", "one").with("even", false));
}

#[tokio::test]
async fn test_get_secret_for_path() {
    let (_mock, service) = service(ServiceFlags::OPEN_SESSION).await;

    let secret = service
        .get_secret_for_path(&item_path("english", "item_one"), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(secret.get(), b"111");
    assert_eq!(secret.len(), 3);
    assert_eq!(secret.content_type(), "text/plain");

    let locked = service
        .get_secret_for_path(&item_path("spanish", "item_one"), None)
        .await
        .unwrap();
    assert!(locked.is_none());
}

#[tokio::test]
async fn test_get_secrets_skips_locked() {
    let (mock, service) = service(ServiceFlags::NONE).await;
    let paths = [
        item_path("english", "item_one"),
        item_path("english", "item_two"),
        item_path("spanish", "item_one"),
    ];

    let secrets = service.get_secrets_for_paths(&paths, None).await.unwrap();
    assert_eq!(secrets.len(), 2);
    assert_eq!(secrets[&paths[0]].get(), b"111");
    assert_eq!(secrets[&paths[1]].get(), b"222");
    assert_eq!(mock.call_count("GetSecrets"), 1);
}

#[tokio::test]
async fn test_get_secrets_by_item() {
    let (_mock, service) = service(ServiceFlags::NONE).await;
    let mut items = Vec::new();
    for path in [
        item_path("english", "item_one"),
        item_path("english", "item_three"),
        item_path("spanish", "item_three"),
    ] {
        items.push(Item::new(&service, path, None).await.unwrap());
    }

    let secrets = service.get_secrets(&items, None).await.unwrap();
    assert_eq!(secrets.len(), 2);
    assert_eq!(secrets[&items[1]].get(), b"3333");
    assert!(!secrets.contains_key(&items[2]));
}

#[tokio::test]
async fn test_item_secret_round_trip() {
    let (_mock, service) = service(ServiceFlags::NONE).await;
    let item = Item::new(&service, item_path("english", "item_two"), None)
        .await
        .unwrap();

    assert_eq!(item.get_secret(None).await.unwrap().get(), b"222");

    item.set_secret(&SecretValue::text("new\0value"), None)
        .await
        .unwrap();
    let secret = item.get_secret(None).await.unwrap();
    assert_eq!(secret.get(), b"new\0value");
    assert_eq!(secret.len(), 9);
}

#[tokio::test]
async fn test_locked_item_secret_is_remote_error() {
    let (_mock, service) = service(ServiceFlags::NONE).await;
    let item = Item::new(&service, item_path("spanish", "item_one"), None)
        .await
        .unwrap();

    assert!(item.locked(None).await.unwrap());
    let err = item.get_secret(None).await.unwrap_err();
    assert_eq!(err.remote_name(), Some("org.freedesktop.Secret.Error.IsLocked"));
}

#[tokio::test]
async fn test_lookup() {
    let (_mock, service) = service(ServiceFlags::NONE).await;
    let schema = mock_schema();

    let secret = service
        .lookup(&schema, &attrs_string("one"), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(secret.get(), b"111");

    let missing = service
        .lookup(&schema, &attrs_string("nothing"), None)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_lookup_unlocks_locked_match() {
    let (mock, service) = service(ServiceFlags::NONE).await;

    let secret = service
        .lookup(&mock_schema(), &attrs_string("tres"), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(secret.get(), b"3333");
    assert_eq!(secret.len(), 4);
    assert_eq!(mock.is_locked(&collection_path("spanish")), Some(false));
}

#[tokio::test]
async fn test_lookup_validates_against_schema() {
    let (mock, service) = service(ServiceFlags::NONE).await;

    let wrong_type = Attributes::new().with("number", "one");
    let err = service
        .lookup(&mock_schema(), &wrong_type, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SecretError::Usage(_)));

    let undeclared = Attributes::new().with("colour", "blue");
    assert!(service.lookup(&mock_schema(), &undeclared, None).await.is_err());
    assert_eq!(mock.call_count("SearchItems"), 0);
}

#[tokio::test]
async fn test_remove() {
    let (mock, service) = service(ServiceFlags::NONE).await;
    let schema = mock_schema();

    assert!(service.remove(&schema, &attrs_string("one"), None).await.unwrap());
    assert!(!mock.exists(&item_path("english", "item_one")));

    assert!(!service.remove(&schema, &attrs_string("one"), None).await.unwrap());
    assert!(!service.remove(&schema, &attrs_string("nothing"), None).await.unwrap());
}

#[tokio::test]
async fn test_remove_falls_back_to_locked_match() {
    let (mock, service) = service(ServiceFlags::NONE).await;
    let path = item_path("spanish", "item_three");

    assert!(service
        .remove(&mock_schema(), &attrs_string("tres"), None)
        .await
        .unwrap());
    assert!(!mock.exists(&path));
    assert_eq!(mock.is_locked(&collection_path("spanish")), Some(true));
}

#[tokio::test]
async fn test_store_in_default_collection() {
    let (mock, service) = service(ServiceFlags::NONE).await;
    let schema = mock_schema();
    let attrs = Attributes::new().with("string", "stored").with("number", 9);

    let path = service
        .store(&schema, &attrs, None, "Stored", &SecretValue::text("s3cret"), None)
        .await
        .unwrap()
        .unwrap();
    assert!(path
        .as_str()
        .starts_with(&format!("{}/", collection_path("english"))));
    assert_eq!(mock.secret_of(&path), Some(b"s3cret".to_vec()));

    // Same attributes replace the existing item.
    let replaced = service
        .store(&schema, &attrs, None, "Stored", &SecretValue::text("other"), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(replaced, path);

    let secret = service.lookup(&schema, &attrs, None).await.unwrap().unwrap();
    assert_eq!(secret.get(), b"other");
}

#[tokio::test]
async fn test_store_in_locked_collection_fails() {
    let (_mock, service) = service(ServiceFlags::NONE).await;

    let err = service
        .store(
            &mock_schema(),
            &attrs_string("x"),
            Some(&collection_path("spanish")),
            "Nope",
            &SecretValue::text("x"),
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.remote_name(), Some("org.freedesktop.Secret.Error.IsLocked"));
}

#[tokio::test]
async fn test_collection_create_item() {
    let (_mock, service) = service(ServiceFlags::NONE).await;
    let collection = Collection::new(&service, collection_path("empty"), None)
        .await
        .unwrap();

    let item = collection
        .create_item(
            &mock_schema(),
            &Attributes::new().with("even", true),
            "Fresh",
            &SecretValue::new(vec![0u8, 1, 2], "application/octet-stream"),
            None,
        )
        .await
        .unwrap()
        .unwrap();
    assert!(item
        .object_path()
        .as_str()
        .starts_with(&format!("{}/", collection.object_path())));
    assert_eq!(item.label(None).await.unwrap(), "Fresh");

    let secret = item.get_secret(None).await.unwrap();
    assert_eq!(secret.get(), &[0, 1, 2]);
    assert_eq!(secret.content_type(), "application/octet-stream");

    let items = collection.items(None).await.unwrap();
    assert_eq!(items, vec![item]);
}

#[tokio::test]
async fn test_item_metadata_updates() {
    let (_mock, service) = service(ServiceFlags::NONE).await;
    let item = Item::new(&service, item_path("english", "item_three"), None)
        .await
        .unwrap();
    let schema = mock_schema();

    item.set_label("Third", None).await.unwrap();
    assert_eq!(item.label(None).await.unwrap(), "Third");

    let attrs = Attributes::new().with("number", 33).with("string", "thirty-three");
    item.set_attributes(&schema, &attrs, None).await.unwrap();
    assert_eq!(item.schema_attributes(&schema, None).await.unwrap(), attrs);

    assert!(item.modified(None).await.unwrap() >= item.created(None).await.unwrap());
}
