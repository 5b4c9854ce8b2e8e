//! Property tests for field-only filters evaluated in memory

use proptest::prelude::*;
use quarry::adapter::memory;
use quarry::filter::{self, FilterNode};
use quarry::scalar::Operator;
use quarry::{Adapter, AdapterId, Catalog, CompileOptions, Query, ScalarKind, SchemaDescriptor};
use serde_json::{Value, json};

const NAMES: [&str; 4] = ["Alice", "Bob", "Carol", "alice"];

fn catalog() -> Catalog {
    Catalog::builder()
        .entity(
            SchemaDescriptor::builder("user")
                .source("users")
                .field("name", ScalarKind::String)
                .field("age", ScalarKind::Integer)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap()
}

fn arb_name() -> impl Strategy<Value = &'static str> {
    prop::sample::select(NAMES.to_vec())
}

fn arb_condition() -> impl Strategy<Value = FilterNode> {
    prop_oneof![
        arb_name().prop_map(|name| FilterNode::field("name", Operator::Eq, json!(name))),
        arb_name().prop_map(|name| FilterNode::field("name", Operator::Neq, json!(name))),
        arb_name().prop_map(|name| FilterNode::field("name", Operator::Ilike, json!(format!("{}%", &name[..1])))),
        prop::collection::vec(arb_name(), 0..3).prop_map(|names| FilterNode::field("name", Operator::In, json!(names))),
        (0i64..60).prop_map(|age| FilterNode::field("age", Operator::Gte, json!(age))),
        (0i64..60).prop_map(|age| FilterNode::field("age", Operator::Lt, json!(age))),
        (0i64..60, 0i64..60).prop_map(|(a, b)| FilterNode::field("age", Operator::Between, json!([a.min(b), a.max(b)]))),
        any::<bool>().prop_map(|is_null| FilterNode::field("age", Operator::IsNull, json!(is_null))),
    ]
}

fn arb_filter() -> impl Strategy<Value = FilterNode> {
    arb_condition().prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..3).prop_map(FilterNode::And),
            prop::collection::vec(inner.clone(), 1..3).prop_map(FilterNode::Or),
            inner.prop_map(FilterNode::not),
        ]
    })
}

fn arb_record() -> impl Strategy<Value = Value> {
    (
        prop::option::of(arb_name()),
        prop::option::of(0i64..60),
    )
        .prop_map(|(name, age)| json!({"name": name, "age": age}))
}

fn scan(filter: &FilterNode, records: &[Value]) -> Vec<bool> {
    let catalog = catalog();
    let users = catalog.schema("user").unwrap();
    let query = filter::compile(
        Query::new(&users),
        Some(filter),
        users,
        Adapter::get(AdapterId::Memory),
        &CompileOptions::default(),
    )
    .unwrap();
    records.iter().map(|record| memory::matches(&query, record)).collect()
}

proptest! {
    #[test]
    fn test_conjunction_commutes(
        a in arb_filter(),
        b in arb_filter(),
        records in prop::collection::vec(arb_record(), 0..12),
    ) {
        let ab = FilterNode::and([a.clone(), b.clone()]);
        let ba = FilterNode::and([b, a]);
        prop_assert_eq!(scan(&ab, &records), scan(&ba, &records));
    }

    #[test]
    fn test_conjunction_is_intersection(
        a in arb_filter(),
        b in arb_filter(),
        records in prop::collection::vec(arb_record(), 0..12),
    ) {
        let both = scan(&FilterNode::and([a.clone(), b.clone()]), &records);
        let left = scan(&a, &records);
        let right = scan(&b, &records);
        let expected: Vec<bool> = left.iter().zip(&right).map(|(l, r)| *l && *r).collect();
        prop_assert_eq!(both, expected);
    }
}
