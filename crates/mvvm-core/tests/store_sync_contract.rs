//! Contract Test: Store-Backed Synchronization
//!
//! This test verifies that a record model and a reactive store stay in
//! sync in both directions.
//!
//! Constraints verified:
//! - Each tracked path owns one namespaced store key
//! - Model-to-view pushes write every key and notify each key once
//! - Store changes flow back through the validation gate
//! - Untracked bindings replace the whole model and report the diff
//! - A post-update callback may push back into the store from inside a
//!   store hook
//!
//! If this test fails, the store protocol is broken.

mod common;

use common::*;
use mvvm_core::store::MemoryStore;
use mvvm_core::traits::{ReactiveStore, StoreBatch};
use mvvm_core::update::callback;
use mvvm_core::{BindingConfig, Communicator, SharedModel};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

const TRACKED: &[&str] = &["username", "age", "ranges[1].min_value"];

fn count_notifications(store: &MemoryStore, key: &str) -> Arc<AtomicUsize> {
    let counter = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&counter);
    store.on_change(
        key,
        Arc::new(move |_key, _value| {
            sink.fetch_add(1, Ordering::SeqCst);
        }),
    );
    counter
}

#[test]
fn connect_declares_namespaced_keys() {
    let fixture = Fixture::new();
    let communicator = fixture.binding.new_bind(user_model(), TRACKED, None).unwrap();

    assert!(communicator.connect("user").unwrap().is_none());

    assert_eq!(
        communicator.store_keys(),
        vec!["user_username", "user_age", "user_ranges[1]_min_value"]
    );
    for key in communicator.store_keys() {
        assert_eq!(fixture.store.get(&key), Some(Value::Null), "{key} declared");
        assert_eq!(fixture.store.subscription_count(&key), 1, "{key} watched");
    }
    assert_eq!(communicator.binding_key().as_deref(), Some("user"));
}

#[test]
fn update_in_view_writes_each_key_once() {
    let fixture = Fixture::new();
    let recorder = Recorder::new();
    let communicator = fixture
        .binding
        .new_bind(user_model(), TRACKED, Some(recorder.callback()))
        .unwrap();
    communicator.connect("user").unwrap();
    let username_hits = count_notifications(&fixture.store, "user_username");

    communicator.update_in_view(&user()).unwrap();

    assert_eq!(fixture.store.get("user_username"), Some(json!("test_name")));
    assert_eq!(fixture.store.get("user_age"), Some(json!(30)));
    assert_eq!(fixture.store.get("user_ranges[1]_min_value"), Some(json!(20)));
    assert_eq!(username_hits.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.store.notification_count(), 3);
    assert_eq!(recorder.count(), 0, "own pushes are not echoed into the model");
}

#[test]
fn store_change_is_validated_into_model() {
    let fixture = Fixture::new();
    let recorder = Recorder::new();
    let model = user_model();
    let communicator = fixture
        .binding
        .new_bind(model.clone(), TRACKED, Some(recorder.callback()))
        .unwrap();
    communicator.connect("user").unwrap();

    fixture.store.set("user_username", json!("aa"));
    assert_eq!(model.get("username").unwrap(), json!("aa"));
    assert_eq!(recorder.last().unwrap().updated, paths(&["username"]));

    fixture.store.set("user_username", json!(""));
    assert_eq!(model.get("username").unwrap(), json!("aa"));
    assert_eq!(recorder.last().unwrap().errored, paths(&["username"]));

    fixture.store.set("user_ranges[1]_min_value", json!(99));
    assert_eq!(model.get("ranges[1].min_value").unwrap(), json!(20));
    assert_eq!(recorder.last().unwrap().errored, paths(&["ranges[1]"]));

    assert_eq!(recorder.count(), 3);
}

#[test]
fn writes_to_one_path_apply_in_order() {
    let fixture = Fixture::new();
    let model = user_model();
    let communicator = fixture.binding.new_bind(model.clone(), TRACKED, None).unwrap();
    communicator.connect("user").unwrap();

    for age in [31, 32, 33] {
        fixture.store.set("user_age", json!(age));
    }
    assert_eq!(model.get("age").unwrap(), json!(33));
}

#[test]
fn untracked_record_replaces_whole_model() {
    let fixture = Fixture::new();
    let recorder = Recorder::new();
    let model = user_model();
    let communicator = fixture
        .binding
        .new_bind(model.clone(), &[], Some(recorder.callback()))
        .unwrap();
    communicator.connect("user").unwrap();
    assert_eq!(communicator.store_keys(), vec!["user"]);

    communicator.refresh_view().unwrap();
    assert_eq!(fixture.store.get("user"), Some(serde_json::to_value(user()).unwrap()));

    let mut next = user();
    next.username = "X".into();
    next.ranges.pop();
    fixture.store.set("user", serde_json::to_value(&next).unwrap());

    let result = recorder.last().unwrap();
    assert_eq!(result.updated, paths(&["ranges", "username"]));
    assert_eq!(model.get_as::<User>().unwrap(), next);
}

#[test]
fn invalid_whole_payload_blames_store_key() {
    let fixture = Fixture::new();
    let recorder = Recorder::new();
    let model = user_model();
    let communicator = fixture
        .binding
        .new_bind(model.clone(), &[], Some(recorder.callback()))
        .unwrap();
    communicator.connect("user").unwrap();

    let mut invalid = user();
    invalid.username.clear();
    invalid.age = 20;
    fixture.store.set("user", serde_json::to_value(&invalid).unwrap());

    let result = recorder.last().unwrap();
    assert_eq!(result.errored, paths(&["user"]));
    assert!(result.updated.is_empty());
    assert_eq!(model.get_as::<User>().unwrap(), user());
}

#[test]
fn diff_reports_only_tracked_paths() {
    // Scenario D
    let fixture = Fixture::new();
    let recorder = Recorder::new();
    let model = SharedModel::object(json!({"username": "a", "age": 30, "untouched": "Y"}));
    let communicator = fixture
        .binding
        .new_bind(model.clone(), &["username", "age"], Some(recorder.callback()))
        .unwrap();
    communicator.connect("obj").unwrap();

    let result = communicator
        .replace_model(json!({"username": "X", "age": 31, "untouched": "Y"}))
        .unwrap();

    assert_eq!(result.updated, paths(&["age", "username"]));
    assert_eq!(model.get("age").unwrap(), json!(31));
    assert_eq!(recorder.last(), Some(result));
}

#[test]
fn replace_model_on_record_with_tracked_paths() {
    let fixture = Fixture::new();
    let model = user_model();
    let communicator = fixture.binding.new_bind(model.clone(), TRACKED, None).unwrap();

    let mut next = user();
    next.username = "X".into();
    next.age = 31;
    next.email = "other@example.com".into();
    let result = communicator.replace_model(serde_json::to_value(&next).unwrap()).unwrap();

    assert_eq!(result.updated, paths(&["age", "username"]));
    assert_eq!(model.get_as::<User>().unwrap(), next);
}

#[test]
fn derived_paths_for_plain_objects() {
    let fixture = Fixture::new();
    let model = SharedModel::object(json!({
        "profile": {"name": "n", "_secret": "s"},
        "count": 1
    }));
    let communicator = fixture.binding.new_bind(model.clone(), &[], None).unwrap();
    communicator.connect("obj").unwrap();

    assert_eq!(communicator.store_keys(), vec!["obj_count", "obj_profile_name"]);

    fixture.store.set("obj_profile_name", json!("m"));
    assert_eq!(model.get("profile.name").unwrap(), json!("m"));
}

#[test]
fn explicit_batch_coalesces_push_and_view_edit() {
    let fixture = Fixture::new();
    let model = user_model();
    let communicator = fixture.binding.new_bind(model.clone(), TRACKED, None).unwrap();
    communicator.connect("user").unwrap();
    let hits = count_notifications(&fixture.store, "user_username");

    {
        let _batch = StoreBatch::open(&fixture.store);
        communicator.update_in_view(&user()).unwrap();
        fixture.store.set("user_username", json!("edited"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(model.get("username").unwrap(), json!("edited"));
}

#[test]
fn echo_is_applied_when_suppression_is_off() {
    let mut config = BindingConfig::default();
    config.suppress_view_echo = false;
    let fixture = Fixture::with_config(config);
    let recorder = Recorder::new();
    let communicator = fixture
        .binding
        .new_bind(user_model(), TRACKED, Some(recorder.callback()))
        .unwrap();
    communicator.connect("user").unwrap();

    communicator.update_in_view(&user()).unwrap();
    assert_eq!(recorder.count(), 3);
    assert!(recorder.results().iter().all(|r| r.errored.is_empty()));
}

#[test]
fn custom_separators_shape_keys() {
    let mut config = BindingConfig::default();
    config.key_separator = "::".into();
    config.path_separator_replacement = "/".into();
    let fixture = Fixture::with_config(config);
    let communicator = fixture
        .binding
        .new_bind(user_model(), &["ranges[1].min_value"], None)
        .unwrap();
    communicator.connect("user").unwrap();

    assert_eq!(communicator.store_keys(), vec!["user::ranges[1]/min_value"]);
}

#[test]
fn rejected_store_change_is_reverted_from_callback() {
    let fixture = Fixture::new();
    let model = user_model();
    let slot: Arc<OnceLock<Communicator>> = Arc::new(OnceLock::new());
    let refreshes = Arc::new(AtomicUsize::new(0));

    let handle = Arc::clone(&slot);
    let counter = Arc::clone(&refreshes);
    let revert = callback(move |result| {
        if result.errored.is_empty() {
            return;
        }
        if let Some(communicator) = handle.get() {
            communicator.refresh_view().unwrap();
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    let communicator = fixture.binding.new_bind(model.clone(), TRACKED, Some(revert)).unwrap();
    communicator.connect("user").unwrap();
    slot.set(communicator.clone()).unwrap();
    communicator.refresh_view().unwrap();

    fixture.store.set("user_age", json!(20));
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(model.get("age").unwrap(), json!(30));
    assert_eq!(fixture.store.get("user_age"), Some(json!(30)));
    assert!(!fixture.store.in_batch());

    // Hooks still work after the nested push
    fixture.store.set("user_age", json!(45));
    assert_eq!(model.get("age").unwrap(), json!(45));
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);

    communicator.disconnect();
}
