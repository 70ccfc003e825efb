use elif_store::{HasMany, HasManyThrough, Record, Related, Store, StoreConfig};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &StoreConfig) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .with_test_writer()
        .try_init();
}

fn ids(records: &[Record]) -> Vec<Value> {
    records.iter().map(|record| record.id().clone()).collect()
}

/// Owners, their items, and items shared through a pivot
fn store_with(config: StoreConfig) -> Store {
    init_tracing(&config);
    let store = Store::with_config(config);
    for entity in ["owners", "items", "pivots", "tags", "notes"] {
        store.register(entity).unwrap();
    }

    store
        .define_relation(
            "owners",
            "items",
            HasMany::new(store.registry(), "items", "owner_id", "id").unwrap(),
        )
        .unwrap();
    store
        .define_relation(
            "owners",
            "tags",
            HasManyThrough::new(
                store.registry(),
                "tags",
                "pivots",
                "owner_id",
                "id",
                "id",
                "related_id",
            )
            .unwrap(),
        )
        .unwrap();
    store
        .define_relation(
            "items",
            "notes",
            HasMany::new(store.registry(), "notes", "item_id", "id").unwrap(),
        )
        .unwrap();

    store
        .define_relation(
            "tags",
            "notes",
            HasMany::new(store.registry(), "notes", "tag_id", "id").unwrap(),
        )
        .unwrap();

    store
        .insert("owners", &json!([{"id": 1}, {"id": 2}]))
        .unwrap();
    store
        .insert(
            "items",
            &json!([
                {"id": 10, "owner_id": 1, "published": true},
                {"id": 11, "owner_id": 1, "published": false},
                {"id": 12, "owner_id": 2, "published": true}
            ]),
        )
        .unwrap();
    store
        .insert(
            "pivots",
            &json!([
                {"id": 100, "owner_id": 1, "related_id": 900},
                {"id": 101, "owner_id": 1, "related_id": 901}
            ]),
        )
        .unwrap();
    store
        .insert("tags", &json!([{"id": 900}, {"id": 901}]))
        .unwrap();
    store
        .insert("notes", &json!([{"id": 1000, "item_id": 10}, {"id": 1001, "item_id": 12}]))
        .unwrap();

    store
}

fn store() -> Store {
    store_with(StoreConfig::default())
}

#[test]
fn test_has_many_groups_items_per_owner() {
    let store = store();
    let mut query = store.query("owners").unwrap();
    query.with("items");
    let owners = query.get();

    assert_eq!(owners[0].relation("items").unwrap().ids(), vec![json!(10), json!(11)]);
    assert_eq!(owners[1].relation("items").unwrap().ids(), vec![json!(12)]);
}

#[test]
fn test_has_many_through_follows_pivots() {
    let store = store();
    let mut query = store.query("owners").unwrap();
    query.with("tags");
    let owners = query.get();

    assert_eq!(owners[0].relation("tags").unwrap().ids(), vec![json!(900), json!(901)]);
    assert!(owners[1].relation("tags").unwrap().is_empty());
}

#[test]
fn test_lazy_and_eager_loads_agree() {
    let store = store();

    let mut eager = store.query("owners").unwrap();
    eager.lazy(false).with("items").with("tags");
    let mut lazy = store.query("owners").unwrap();
    lazy.lazy(true).with("items").with("tags");

    let eager: Vec<Value> = eager.get().iter().map(Record::to_json).collect();
    let lazy: Vec<Value> = lazy.get().iter().map(Record::to_json).collect();
    assert_eq!(eager, lazy);
}

#[test]
fn test_lazy_handles_defer_until_first_access() {
    let store = store();
    let mut query = store.query("owners").unwrap();
    query.lazy(true).with("items");
    let owners = query.get();

    let items = owners[0].relation("items").unwrap();
    assert!(!items.is_resolved());
    assert_eq!(items.len(), 2);
    assert!(items.is_resolved());
}

#[test]
fn test_lazy_handle_is_idempotent_across_store_writes() {
    let store = store();
    let mut query = store.query("owners").unwrap();
    query.lazy(true).with("items");
    let owners = query.get();

    store
        .insert("items", &json!({"id": 13, "owner_id": 1}))
        .unwrap();

    let Some(Related::Lazy(handle)) = owners[0].relation("items") else {
        panic!("expected a lazy handle");
    };
    let first = ids(&handle.read());
    let second = ids(&handle.read());
    assert_eq!(first, vec![json!(10), json!(11)]);
    assert_eq!(first, second);
}

#[test]
fn test_lazy_write_persists_on_handle() {
    let store = store();
    let mut query = store.query("owners").unwrap();
    query.lazy(true).with("items");
    let mut owners = query.get();

    owners[0]
        .relation_mut("items")
        .unwrap()
        .with_mut(|items| items.retain(|item| item.get("published") == Some(&json!(true))));

    assert_eq!(owners[0].relation("items").unwrap().ids(), vec![json!(10)]);
    assert_eq!(store.count("items"), 3);
}

#[test]
fn test_store_config_default_lazy_flag() {
    let store = store_with(StoreConfig {
        lazy_relations: true,
        ..StoreConfig::default()
    });
    let mut query = store.query("owners").unwrap();
    query.with("items");
    let owners = query.get();

    assert!(matches!(owners[0].relation("items"), Some(Related::Lazy(_))));
}

#[test]
fn test_shared_related_record_keeps_separate_nested_relations() {
    for lazy in [false, true] {
        let store = store();
        store
            .insert("pivots", &json!({"id": 102, "owner_id": 2, "related_id": 900}))
            .unwrap();
        store
            .insert("notes", &json!({"id": 2000, "tag_id": 900}))
            .unwrap();

        let mut query = store.query("owners").unwrap();
        query.lazy(lazy).with("tags.notes");
        let mut owners = query.get();

        owners[0].relation_mut("tags").unwrap().with_mut(|tags| {
            tags[0]
                .relation_mut("notes")
                .unwrap()
                .with_mut(|notes| notes.clear());
        });

        let first = owners[0].relation("tags").unwrap().to_vec();
        let second = owners[1].relation("tags").unwrap().to_vec();
        assert!(first[0].relation("notes").unwrap().is_empty(), "lazy={}", lazy);
        assert_eq!(
            second[0].relation("notes").unwrap().ids(),
            vec![json!(2000)],
            "lazy={}",
            lazy
        );
    }
}

#[test]
fn test_nested_eager_loads() {
    let store = store();
    let mut query = store.query("owners").unwrap();
    query.with("items.notes");
    let owners = query.get();

    let items = owners[0].relation("items").unwrap().to_vec();
    assert_eq!(items[0].relation("notes").unwrap().ids(), vec![json!(1000)]);
    assert!(items[1].relation("notes").unwrap().is_empty());

    let items = owners[1].relation("items").unwrap().to_vec();
    assert_eq!(items[0].relation("notes").unwrap().ids(), vec![json!(1001)]);
}

#[test]
fn test_constrained_eager_load() {
    let store = store();
    let mut query = store.query("owners").unwrap();
    query.with_constraint("items", |items| {
        items.where_eq("published", true);
    });
    let owners = query.get();

    assert_eq!(owners[0].relation("items").unwrap().ids(), vec![json!(10)]);
    assert_eq!(owners[1].relation("items").unwrap().ids(), vec![json!(12)]);
}

#[test]
fn test_keys_match_by_exact_representation() {
    let store = store();
    store
        .insert("items", &json!([{"id": 20, "owner_id": "1"}, {"id": 21, "owner_id": 1.0}]))
        .unwrap();

    let mut query = store.query("owners").unwrap();
    query.with("items");
    let owners = query.get();

    assert_eq!(owners[0].relation("items").unwrap().ids(), vec![json!(10), json!(11)]);
}

#[test]
fn test_owner_without_local_key_gets_empty_group() {
    let store = store();
    let relation = HasMany::new(store.registry(), "items", "owner_id", "slug").unwrap();
    store.define_relation("owners", "by_slug", relation).unwrap();

    let mut query = store.query("owners").unwrap();
    query.with("by_slug");
    let owners = query.get();

    assert!(owners.iter().all(|owner| owner.relation("by_slug").unwrap().is_empty()));
}

#[test]
fn test_insert_backfills_foreign_keys_from_nesting() {
    let store = store();
    store
        .insert(
            "owners",
            &json!({
                "id": 3,
                "items": [
                    {"id": 30, "notes": [{"id": 3000}]},
                    {"id": 31, "owner_id": 2}
                ]
            }),
        )
        .unwrap();

    assert_eq!(store.find("items", &json!(30)).unwrap().get("owner_id"), Some(&json!(3)));
    assert_eq!(store.find("items", &json!(31)).unwrap().get("owner_id"), Some(&json!(2)));
    assert_eq!(store.find("notes", &json!(3000)).unwrap().get("item_id"), Some(&json!(30)));

    let mut query = store.query("owners").unwrap();
    query.where_eq("id", 3).with("items");
    let owner = query.first().unwrap();
    assert_eq!(owner.relation("items").unwrap().ids(), vec![json!(30)]);
}

#[test]
fn test_make_round_trips_through_to_json() {
    let store = store();
    let owner = store
        .make("owners", &json!({"id": 5, "items": [{"id": 50}], "tags": [{"id": 900}]}))
        .unwrap();

    assert_eq!(
        owner.to_json(),
        json!({"id": 5, "items": [{"id": 50}], "tags": [{"id": 900}]})
    );
}
