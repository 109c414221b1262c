//! Integration tests for message trees
//!
//! These tests cover the document-model behaviour collaborators rely on:
//! - Write lookups auto-create, read lookups never do
//! - Depth-first iteration order and levels
//! - Deep copies are independent

mod common;

use common::builders::{reading, sample_tree, MessageBuilder};
use dataflow_rt::{DataflowError, Message, Value, ValueKind};
use proptest::prelude::*;

#[test]
fn test_named_path_write_then_read() {
    let mut msg = Message::new();
    msg.child_mut("a").child_mut("b").set(5);

    assert_eq!(msg.child("a").unwrap().child("b").unwrap().get::<i64>().unwrap(), 5);
    assert!(msg.has_child("a"));
    assert!(msg.child("a").unwrap().has_child("b"));
}

#[test]
fn test_index_write_creates_missing_siblings() {
    let mut msg = Message::new();
    msg.child_at_mut(2).set("x");

    assert_eq!(msg.child_count(), 3);
    assert!(!msg.child_at(0).unwrap().has_value());
    assert!(!msg.child_at(1).unwrap().has_value());
    assert_eq!(msg.child_at(2).unwrap().get::<String>().unwrap(), "x");
}

#[test]
fn test_depth_first_visits_in_pre_order() {
    let msg = sample_tree();
    let visited: Vec<(String, usize)> = msg
        .iter()
        .map(|(level, node)| (node.name().to_string(), level))
        .collect();

    assert_eq!(
        visited,
        vec![
            ("R".to_string(), 0),
            ("A".to_string(), 1),
            ("A1".to_string(), 2),
            ("B".to_string(), 1),
        ]
    );
}

#[test]
fn test_fresh_iterator_restarts_traversal() {
    let msg = sample_tree();
    let mut first = msg.iter();
    first.next();
    first.next();

    assert_eq!(msg.iter().count(), 4);
    assert_eq!(first.count(), 2);
}

#[test]
fn test_copy_is_independent() {
    let original = MessageBuilder::new("root")
        .child(MessageBuilder::new("").value(1))
        .leaf("label", "outside")
        .build();

    let mut copy = original.clone();
    assert_eq!(copy, original);

    copy.child_at_mut(0).set(2);
    copy.child_mut("label").set("inside");

    assert_eq!(original.child_at(0).unwrap().get::<i64>().unwrap(), 1);
    assert_eq!(original.child("label").unwrap().get::<String>().unwrap(), "outside");
}

#[test]
fn test_presence_checks_for_collaborator_fields() {
    let msg = reading(21.5, 101_325.0, 40.0);
    for field in ["temperature", "pressure", "humidity"] {
        assert!(msg.has_child(field), "missing {}", field);
    }
    assert!(matches!(msg.child("query"), Err(DataflowError::NotFound(_))));
}

#[test]
fn test_scalar_signal_detected_by_type() {
    let next_screen = Message::with_value("", 3);
    let pure_signal = Message::new();

    assert!(next_screen.value().is::<i64>());
    assert_eq!(pure_signal.value().kind(), ValueKind::Empty);
}

#[test]
fn test_clear_then_reuse() {
    let mut msg = reading(1.0, 2.0, 3.0);
    msg.clear();
    assert_eq!(msg.child_count(), 0);
    assert_eq!(msg.name(), "root");

    msg.child_mut("update").child_at_mut(1).set(2.0);
    assert_eq!(msg.child("update").unwrap().child_count(), 2);
}

#[test]
fn test_display_lists_every_node() {
    let msg = sample_tree();
    let text = msg.to_string();
    assert_eq!(text.lines().count(), 4);
    assert!(text.lines().any(|line| line.trim_start() == "A1: null"));
}

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Empty),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        (-1e9f64..1e9).prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
    ]
}

proptest! {
    #[test]
    fn test_value_kinds_round_trip_through_messages(value in value_strategy()) {
        let mut msg = Message::new();
        msg.child_mut("v").set(value.clone());
        let copy = msg.clone();
        prop_assert_eq!(copy.child("v").unwrap().value(), &value);
    }

    #[test]
    fn test_nested_index_writes(path in prop::collection::vec(0usize..5, 1..6)) {
        let mut msg = Message::new();
        {
            let mut node = msg.root_mut();
            for &index in &path {
                node = node.child_at_mut(index);
            }
            node.set(7);
        }

        let mut node = msg.root();
        for &index in &path {
            prop_assert!(node.child_count() > index);
            node = node.child_at(index).unwrap();
        }
        prop_assert_eq!(node.get::<i64>().unwrap(), 7);
    }
}
