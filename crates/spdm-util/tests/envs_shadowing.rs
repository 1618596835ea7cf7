use proptest::prelude::*;
use serde_json::{json, Map, Value};
use spdm_util::{format_template, merged, Envs};

#[test]
fn call_layer_shadows_module_layer_without_mutating_it() {
    let module = Envs::from_value(json!({"JOB_ID": "base", "device": "iter"}));
    let call = module.with_layer(json!({"JOB_ID": "run-7"}));

    assert_eq!(format_template("{device}/{JOB_ID}", &call), "iter/run-7");
    assert_eq!(format_template("{device}/{JOB_ID}", &module), "iter/base");
}

#[test]
fn merged_descriptor_overlay() {
    let base = json!({"$class": "file.XML", "path": "{dir}/a.xml", "opts": {"lazy": true}});
    let over = json!({"opts": {"lazy": false}});
    let out = merged(&base, &over);
    assert_eq!(out["opts"]["lazy"], json!(false));
    assert_eq!(out["$class"], json!("file.XML"));
}

proptest! {
    #[test]
    fn prop_innermost_layer_wins(
        outer in prop::collection::btree_map("[a-e]", 0i64..100, 0..5),
        inner in prop::collection::btree_map("[a-e]", 100i64..200, 0..5),
    ) {
        let to_map = |m: &std::collections::BTreeMap<String, i64>| -> Map<String, Value> {
            m.iter().map(|(k, v)| (k.clone(), json!(v))).collect()
        };
        let envs = Envs::from_map(to_map(&outer)).with_map(to_map(&inner));
        for key in ["a", "b", "c", "d", "e"] {
            let expected = inner.get(key).or_else(|| outer.get(key)).map(|v| json!(v));
            prop_assert_eq!(envs.get(key).cloned(), expected);
        }
    }
}
