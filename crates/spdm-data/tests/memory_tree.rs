use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use spdm_data::{Entry, Error, Found, Kind, MemoryBackend, Node};

fn json_tree() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z ]{0,8}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z][a-z0-9_]{0,5}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

proptest! {
    #[test]
    fn node_serialize_inverts_deserialize(value in json_tree()) {
        let node = Node::deserialize(value.clone());
        prop_assert_eq!(node.serialize().unwrap(), value);
    }

    #[test]
    fn eager_read_matches_source(
        value in prop::collection::btree_map("[a-z][a-z0-9_]{0,5}", json_tree(), 1..4)
    ) {
        let source = Value::Object(value.clone().into_iter().collect());
        let entry = MemoryBackend::new(source.clone()).entry();
        for key in value.keys() {
            let read = entry.get_value(key.as_str(), None, false).unwrap().into_value().unwrap();
            prop_assert_eq!(&read, &source[key.as_str()]);
            let lazy = entry.get_value(key.as_str(), None, true).unwrap().into_value().unwrap();
            prop_assert_eq!(&lazy, &source[key.as_str()]);
        }
    }
}

fn sample() -> Entry {
    MemoryBackend::new(json!({
        "time_slice": [
            {"time": 0.0, "profiles": {"psi": [1.0, 2.0]}},
            {"time": 1.0, "profiles": {"psi": [3.0, 4.0]}},
            {"time": 2.0, "profiles": {"psi": [5.0, 6.0]}}
        ],
        "code": {"name": "efit"}
    }))
    .entry()
}

#[test]
fn test_wildcards_and_slices_expand_in_order() {
    let entry = sample();
    assert_eq!(
        entry.get_value("time_slice.*.time", None, false).unwrap().into_value().unwrap(),
        json!([0.0, 1.0, 2.0])
    );
    assert_eq!(
        entry.get_value("time_slice.::-2.time", None, false).unwrap().into_value().unwrap(),
        json!([2.0, 0.0])
    );
    assert_eq!(
        entry.get_value("time_slice.-1.profiles.psi.0", None, false).unwrap().into_value().unwrap(),
        json!(5.0)
    );
}

#[test]
fn test_find_cardinality() {
    let entry = sample();
    assert!(matches!(
        entry.find("time_slice.*.missing", true, None),
        Err(Error::AmbiguousOrNotFound { count: 0, .. })
    ));
    assert!(matches!(
        entry.find("time_slice.*.time", true, None),
        Err(Error::AmbiguousOrNotFound { count: 3, .. })
    ));
    match entry.find("time_slice.*.missing", true, Some(json!(-1))).unwrap() {
        Found::One(r) => assert_eq!(r.into_value().unwrap(), json!(-1)),
        Found::Many(_) => panic!("expected one match"),
    }
    match entry.find("time_slice.*.missing", false, None).unwrap() {
        Found::Many(v) => assert!(v.is_empty()),
        Found::One(_) => panic!("expected a list"),
    }
}

#[test]
fn test_writes_through_child_entries() {
    let backend = MemoryBackend::new(json!({}));
    let entry = backend.entry();
    let slice = entry.child("time_slice");
    slice.put("-", json!({"time": 0.0})).unwrap();
    slice.put("-", json!({"time": 1.0})).unwrap();
    slice.put("1.time", json!(1.5)).unwrap();
    assert_eq!(slice.count().unwrap(), 2);
    assert_eq!(slice.kind().unwrap(), Kind::Sequence);

    slice.remove("0").unwrap();
    assert_eq!(
        backend.snapshot().serialize().unwrap(),
        json!({"time_slice": [{"time": 1.5}]})
    );
    assert!(matches!(
        entry.put("time_slice.*.time", json!(0.0)),
        Err(Error::InvalidPath(_))
    ));
}

#[test]
fn test_read_only_backend() {
    let entry = MemoryBackend::new(json!({"a": 1})).read_only().entry();
    assert!(!entry.is_writable());
    assert!(matches!(entry.put("a", json!(2)), Err(Error::ReadOnly(_))));
    assert!(matches!(entry.remove("a"), Err(Error::ReadOnly(_))));
}
