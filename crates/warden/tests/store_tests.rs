//! Store read/write behavior through the public API

mod common;

use common::{assert_denied, assert_eq, isolated_options};
use rstest::rstest;
use serde_json::{json, Value as JsonValue};
use warden::{
    AuditEvent, LookupMode, Operation, Permission, Store, StoreError, StoreOptions, StoreType,
    StoreValue, TypeKey, DEFAULT_POLICY_KEY,
};

fn base_store(options: &StoreOptions, policy: Permission) -> Store {
    Store::with_options(TypeKey::base(), options.clone()).with_default_policy(policy)
}

// ============================================================================
// Default policy
// ============================================================================

#[rstest]
#[case(Permission::ReadWrite)]
#[case(Permission::ReadOnly)]
#[case(Permission::WriteOnly)]
#[case(Permission::None)]
fn test_undeclared_fields_follow_default_policy(#[case] policy: Permission) {
    let (options, _) = isolated_options(LookupMode::PerField);
    let store = base_store(&options, policy);

    for field in ["name", "anything", "a-b"] {
        assert_eq!(store.allowed_to_read(field), policy.allows_read());
        assert_eq!(store.allowed_to_write(field), policy.allows_write());
        assert_eq!(store.permission_for(field), policy);
    }
}

#[test]
fn test_default_policy_key_is_never_accessible() {
    let (options, _) = isolated_options(LookupMode::PerField);
    let mut store = base_store(&options, Permission::ReadWrite);

    assert!(!store.allowed_to_read(DEFAULT_POLICY_KEY));
    assert!(!store.allowed_to_write(DEFAULT_POLICY_KEY));
    assert_denied(store.read(DEFAULT_POLICY_KEY), Operation::Read, DEFAULT_POLICY_KEY);
    assert_denied(
        store.write(DEFAULT_POLICY_KEY, "none"),
        Operation::Write,
        DEFAULT_POLICY_KEY,
    );
    assert_eq!(store.default_policy(), Permission::ReadWrite);
}

#[test]
fn test_default_policy_changes_apply_immediately() {
    let (options, _) = isolated_options(LookupMode::PerField);
    let mut store = base_store(&options, Permission::ReadWrite);
    store.write("k", 1).unwrap();

    store.set_default_policy(Permission::WriteOnly);

    assert_denied(store.read("k"), Operation::Read, "k");
    assert!(store.write("k", 2).is_ok());
}

// ============================================================================
// Type inheritance
// ============================================================================

#[test]
fn test_subtype_narrows_parent_permission() {
    let (options, _) = isolated_options(LookupMode::PerField);
    let a = StoreType::new("A")
        .restrict("x", Permission::ReadWrite)
        .register(&options.registry)
        .unwrap();
    let b = StoreType::new("B")
        .extends("A")
        .restrict("x", Permission::ReadOnly)
        .register(&options.registry)
        .unwrap();

    let mut store_a = Store::with_options(a, options.clone()).with_default_policy(Permission::None);
    let mut store_b = Store::with_options(b, options).with_default_policy(Permission::None);

    assert!(store_a.write("x", 1).is_ok());
    assert_eq!(store_a.read("x").unwrap(), Some(StoreValue::from(1)));

    assert_denied(store_b.write("x", 1), Operation::Write, "x");
    assert_eq!(store_b.read("x").unwrap(), None);
}

#[rstest]
#[case(LookupMode::PerField)]
#[case(LookupMode::NearestEntry)]
fn test_clear_falls_back_to_default_not_ancestor(#[case] lookup: LookupMode) {
    let (options, _) = isolated_options(lookup);
    StoreType::new("Parent")
        .restrict("name", Permission::ReadWrite)
        .register(&options.registry)
        .unwrap();
    let child = StoreType::new("Child")
        .extends("Parent")
        .clear("name")
        .register(&options.registry)
        .unwrap();

    let store = Store::with_options(child, options).with_default_policy(Permission::None);

    assert_eq!(store.permission_for("name"), Permission::None);
    assert!(!store.allowed_to_read("name"));
}

// ============================================================================
// Nested stores and providers
// ============================================================================

#[test]
fn test_credentials_behind_restricted_store() {
    let (options, audit) = isolated_options(LookupMode::PerField);
    let credentials = base_store(&options, Permission::None)
        .with_field("username", "root")
        .with_field("password", "hunter2")
        .into_shared();

    let admin = StoreType::new("AdminStore")
        .restrict("user", Permission::ReadOnly)
        .clear("name")
        .restrict("getCredentials", Permission::ReadWrite)
        .register(&options.registry)
        .unwrap();

    let singleton = credentials.clone();
    let store = Store::with_options(admin, options)
        .with_default_policy(Permission::None)
        .with_field("user", json!({"id": 1}))
        .with_field("name", "admin")
        .with_field(
            "getCredentials",
            StoreValue::lazy(move || StoreValue::Store(singleton.clone())),
        );

    let err = store.read("getCredentials:username").unwrap_err();
    assert_eq!(
        err,
        StoreError::PermissionDenied {
            operation: Operation::Read,
            field: "username".to_string(),
            path: "getCredentials:username".to_string(),
        }
    );

    assert_eq!(store.read("user:id").unwrap(), Some(StoreValue::from(1)));
    assert_denied(store.read("name"), Operation::Read, "name");
    assert!(audit.events().contains(&AuditEvent::ProviderInvoked {
        field: "getCredentials".to_string()
    }));
}

#[test]
fn test_read_ending_on_store_returns_handle() {
    let (options, _) = isolated_options(LookupMode::PerField);
    let child = base_store(&options, Permission::None).into_shared();
    let store = base_store(&options, Permission::ReadWrite).with_field("child", child.clone());

    match store.read("child").unwrap() {
        Some(StoreValue::Store(handle)) => assert!(handle.ptr_eq(&child)),
        other => panic!("Expected a store handle, got {:?}", other),
    }
}

#[test]
fn test_store_inside_json_delegates() {
    let (options, _) = isolated_options(LookupMode::PerField);
    let locked = base_store(&options, Permission::None).with_field("secret", 1);
    let store = base_store(&options, Permission::ReadWrite)
        .with_field("items", vec![StoreValue::from(locked)]);

    assert_denied(store.read("items:0:secret"), Operation::Read, "secret");
    assert_eq!(store.read("items:1").unwrap(), None);
}

#[test]
fn test_write_through_nested_store_uses_child_permissions() {
    let (options, _) = isolated_options(LookupMode::PerField);
    let child = base_store(&options, Permission::ReadOnly).into_shared();
    let mut store = base_store(&options, Permission::None).with_field("child", child.clone());

    assert_denied(store.write("child:k", 1), Operation::Write, "k");

    child.with_mut(|c| c.set_default_policy(Permission::ReadWrite));
    store.write("child:k", 1).unwrap();
    assert_eq!(child.read("k").unwrap(), Some(StoreValue::from(1)));
}

// ============================================================================
// Path writes
// ============================================================================

#[test]
fn test_write_materializes_intermediate_objects() {
    let (options, _) = isolated_options(LookupMode::PerField);
    let mut store = base_store(&options, Permission::ReadWrite);

    let written = store.write("a:b:c", 5).unwrap();

    assert_eq!(written, StoreValue::from(5));
    assert_eq!(JsonValue::Object(store.entries()), json!({"a": {"b": {"c": 5}}}));
}

#[test]
fn test_denied_write_has_no_side_effects() {
    let (options, audit) = isolated_options(LookupMode::PerField);
    let ty = StoreType::new("Guarded")
        .restrict("c", Permission::ReadOnly)
        .register(&options.registry)
        .unwrap();
    let mut store = Store::with_options(ty, options).with_field("a", json!({"keep": true}));

    assert_denied(store.write("a:b:c", 5), Operation::Write, "c");

    assert_eq!(JsonValue::Object(store.entries()), json!({"a": {"keep": true}}));
    assert_eq!(audit.denials(), 1);
}

#[test]
fn test_only_terminal_segment_is_checked() {
    let (options, _) = isolated_options(LookupMode::PerField);
    let ty = StoreType::new("Mixed")
        .restrict("locked", Permission::ReadOnly)
        .register(&options.registry)
        .unwrap();
    let mut store = Store::with_options(ty, options);

    store.write("locked:inner", 1).unwrap();
    assert_eq!(store.read("locked:inner").unwrap(), Some(StoreValue::from(1)));
    assert_denied(store.write("locked", 2), Operation::Write, "locked");
}

#[test]
fn test_sentinel_promotes_to_child_store() {
    let (options, audit) = isolated_options(LookupMode::PerField);
    let mut store = base_store(&options, Permission::ReadWrite);

    store
        .write("settings", json!({"store": {"theme": "dark"}, "plain": {"x": 1}}))
        .unwrap();

    let child = match store.read("settings:store").unwrap() {
        Some(StoreValue::Store(child)) => child,
        other => panic!("Expected a child store, got {:?}", other),
    };
    assert!(child.allowed_to_read("theme"));
    assert!(child.with(|c| c.type_key().is_base()));
    assert_eq!(
        store.read("settings:store:theme").unwrap(),
        Some(StoreValue::from("dark"))
    );
    assert!(matches!(
        store.read("settings:plain").unwrap(),
        Some(StoreValue::Object(_))
    ));
    assert!(audit.events().contains(&AuditEvent::StorePromoted {
        at: "settings:store".to_string()
    }));

    child.with_mut(|c| c.set_default_policy(Permission::None));
    assert_denied(store.read("settings:store:theme"), Operation::Read, "theme");
}

// ============================================================================
// Bulk access
// ============================================================================

#[test]
fn test_write_entries_then_entries_round_trip() {
    let (options, _) = isolated_options(LookupMode::PerField);
    let ty = StoreType::new("Account")
        .restrict("password", Permission::WriteOnly)
        .restrict("id", Permission::ReadOnly)
        .register(&options.registry)
        .unwrap();
    let mut store = Store::with_options(ty, options);

    let skipped = store.write_entries(json!({
        "id": 1,
        "email": "a@example.com",
        "password": "secret",
        "prefs": {"lang": "en"},
    }));

    assert_eq!(skipped, vec!["id".to_string()]);
    assert_eq!(
        JsonValue::Object(store.entries()),
        json!({"email": "a@example.com", "prefs": {"lang": "en"}})
    );
}

#[test]
fn test_write_entries_merges_into_child_store_by_its_rules() {
    let (options, _) = isolated_options(LookupMode::PerField);
    let frozen = StoreType::new("Frozen")
        .restrict("version", Permission::ReadOnly)
        .register(&options.registry)
        .unwrap();
    let child = Store::with_options(frozen, options.clone())
        .with_field("version", 1)
        .into_shared();
    let mut store = base_store(&options, Permission::ReadWrite).with_field("meta", child.clone());

    let skipped = store.write_entries(json!({"meta": {"version": 2, "owner": "me"}}));

    assert_eq!(skipped, vec!["meta:version".to_string()]);
    assert_eq!(
        JsonValue::Object(child.entries()),
        json!({"owner": "me", "version": 1})
    );
    assert!(matches!(store.read("meta").unwrap(), Some(StoreValue::Store(s)) if s.ptr_eq(&child)));
}

#[test]
fn test_write_entries_with_sentinel_creates_store() {
    let (options, _) = isolated_options(LookupMode::PerField);
    let mut store = base_store(&options, Permission::ReadWrite);

    store.write_entries(json!({"profile": {"store": {"name": "n"}}}));

    assert!(matches!(
        store.read("profile:store").unwrap(),
        Some(StoreValue::Store(_))
    ));
    assert_eq!(
        JsonValue::Object(store.entries()),
        json!({"profile": {"store": {"name": "n"}}})
    );
}

#[test]
fn test_entries_skip_providers_and_unreadable_nested_fields() {
    let (options, _) = isolated_options(LookupMode::PerField);
    let hidden = base_store(&options, Permission::WriteOnly).with_field("x", 1);
    let store = base_store(&options, Permission::ReadWrite)
        .with_field("lazy", StoreValue::lazy(|| StoreValue::from(1)))
        .with_field("hidden", hidden)
        .with_field("plain", 2);

    assert_eq!(
        JsonValue::Object(store.entries()),
        json!({"hidden": {}, "plain": 2})
    );
}

// ============================================================================
// Back-references and re-entrant access
// ============================================================================

#[test]
fn test_write_through_provider_returning_owner() {
    let (options, _) = isolated_options(LookupMode::PerField);
    let owner = base_store(&options, Permission::ReadWrite).into_shared();
    let handle = owner.clone();
    owner
        .write("me", StoreValue::lazy(move || StoreValue::Store(handle.clone())))
        .unwrap();

    owner.write("me:x", 1).unwrap();
    owner.write("me:me:y", 2).unwrap();

    assert_eq!(owner.read("x").unwrap(), Some(StoreValue::from(1)));
    assert_eq!(owner.read("me:me:y").unwrap(), Some(StoreValue::from(2)));
}

#[test]
fn test_back_reference_write_uses_owner_permissions() {
    let (options, _) = isolated_options(LookupMode::PerField);
    let ty = StoreType::new("Loop")
        .restrict("locked", Permission::ReadOnly)
        .register(&options.registry)
        .unwrap();
    let owner = Store::with_options(ty, options).into_shared();
    let handle = owner.clone();
    owner
        .write("me", StoreValue::lazy(move || StoreValue::Store(handle.clone())))
        .unwrap();

    assert_denied(owner.write("me:locked", 1), Operation::Write, "locked");
    assert_eq!(owner.read("locked").unwrap(), None);
}

#[test]
fn test_store_field_holding_its_own_store() {
    let (options, _) = isolated_options(LookupMode::PerField);
    let owner = base_store(&options, Permission::ReadWrite).into_shared();
    owner.write("self", owner.clone()).unwrap();

    owner.write("self:self:a", 1).unwrap();
    let skipped = owner.write_entries(json!({"self": {"b": 2}}));

    assert!(skipped.is_empty());
    assert_eq!(owner.read("a").unwrap(), Some(StoreValue::from(1)));
    assert_eq!(owner.read("self:b").unwrap(), Some(StoreValue::from(2)));
    assert_eq!(
        JsonValue::Object(owner.entries()),
        json!({"a": 1, "b": 2, "self": {}})
    );
}

#[test]
fn test_provider_reading_owner_during_write() {
    let (options, _) = isolated_options(LookupMode::PerField);
    let owner = base_store(&options, Permission::ReadWrite)
        .with_field("name", "n")
        .into_shared();
    let handle = owner.clone();
    owner
        .write(
            "peek",
            StoreValue::lazy(move || {
                let busy = matches!(handle.read("name"), Err(StoreError::Busy { .. }));
                StoreValue::from(json!({ "busy": busy }))
            }),
        )
        .unwrap();

    owner.write("peek:extra", 1).unwrap();

    assert_eq!(
        owner.read("peek").unwrap().unwrap(),
        json!({"busy": true, "extra": 1})
    );
}

#[test]
fn test_access_to_a_held_store_reports_busy() {
    let (options, _) = isolated_options(LookupMode::PerField);
    let shared = base_store(&options, Permission::ReadWrite).into_shared();
    let mut store = base_store(&options, Permission::ReadWrite).with_field("child", shared.clone());

    let guard = shared.borrow();
    assert_eq!(
        store.write("child:k", 1).unwrap_err(),
        StoreError::Busy {
            operation: Operation::Write,
            field: "child".to_string(),
            path: "child:k".to_string(),
        }
    );
    assert_eq!(shared.write("k", 1).unwrap_err().field(), "k");
    assert_eq!(shared.write_entries(json!({"k": 1})), vec!["k".to_string()]);
    drop(guard);

    store.write("child:k", 1).unwrap();
    assert_eq!(shared.read("k").unwrap(), Some(StoreValue::from(1)));
}

// ============================================================================
// Arrays
// ============================================================================

#[test]
fn test_huge_array_indices_do_not_allocate() {
    let (options, _) = isolated_options(LookupMode::PerField);
    let mut store = base_store(&options, Permission::ReadWrite);
    store.write("list", json!([1])).unwrap();

    store.write("list:18446744073709551615", 1).unwrap();
    store.write("list:4000000000", 2).unwrap();

    assert_eq!(
        store.read("list").unwrap().unwrap(),
        json!({"0": 1, "18446744073709551615": 1, "4000000000": 2})
    );
    assert_eq!(store.read("list:0").unwrap(), Some(StoreValue::from(1)));
}

#[test]
fn test_sentinel_cannot_plant_unwritable_fields() {
    let (options, _) = isolated_options(LookupMode::PerField);
    options
        .registry
        .declare(&TypeKey::base(), "role", Permission::ReadOnly)
        .unwrap();
    let mut store = base_store(&options, Permission::ReadWrite);

    assert_denied(store.write("role", "admin"), Operation::Write, "role");
    store
        .write("profile", json!({"store": {"role": "admin", "name": "n"}}))
        .unwrap();

    assert_eq!(store.read("profile:store:role").unwrap(), None);
    assert_eq!(
        store.read("profile:store:name").unwrap(),
        Some(StoreValue::from("n"))
    );
}
