use std::fs;
use std::str::FromStr;

use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use spdm_data::{
    create_dobject, dobject_registry, open_entry, Collection, Error, Kind, LocalFileCollection,
    Mode, Node,
};
use spdm_util::Envs;
use tempfile::TempDir;

const GFILE: &str = "  TEST    01/01/2020  #000900  1000ms    0   3   2
 2.0 4.0 1.7 0.5 0.0
 1.6 0.1 -1.0 0.0 2.5
 1.0e6 -1.0 0.0 1.6 0.0
 0.1 0.0 0.0 0.0 0.0
 3.0 3.1 3.2
 1.0e4 5.0e3 0.0
 0.1 0.2 0.3
 -1.0 -2.0 -3.0
 1.0 2.0 3.0 4.0 5.0 6.0
 1.0 1.5 3.0
 2 1
 1.0 -1.0 2.0 1.0
 0.5 0.0
";

fn predicate(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap()
}

#[test]
fn test_insert_then_find_json_documents() {
    let dir = TempDir::new().unwrap();
    let coll = LocalFileCollection::new(dir.path(), "shot_{shot}_{_id}.json").auto_increment(true);
    let shot = predicate(json!({"shot": 900}));

    for ip in [1.0e6, 1.2e6] {
        let doc = coll.open(&shot, Mode::from_str("x").unwrap()).unwrap();
        let entry = doc.entry().unwrap();
        entry.put("eq.ip", json!(ip)).unwrap();
        entry.put("eq.psi", json!([0.0, 1.0])).unwrap();
        doc.close().unwrap();
    }

    let mut names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["shot_900_0.json", "shot_900_1.json"]);
    assert_eq!(coll.count(&shot).unwrap(), 2);
    assert_eq!(coll.count(&predicate(json!({"shot": 901}))).unwrap(), 0);

    let second = coll
        .open(&predicate(json!({"shot": 900, "_id": 1})), Mode::READ)
        .unwrap();
    assert_eq!(
        second.entry().unwrap().get_value("eq.ip", None, true).unwrap().as_value(),
        Some(&json!(1.2e6))
    );
    assert!(matches!(
        second.entry().unwrap().put("eq.ip", json!(0.0)),
        Err(Error::ReadOnly(_))
    ));
}

#[test]
fn test_open_entry_through_template_uri() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("shot_900.json"), r#"{"eq": {"ip": 5.0}}"#).unwrap();
    fs::write(dir.path().join("shot_901.json"), r#"{"eq": {"ip": 6.0}}"#).unwrap();

    let uri = format!("local://{}/shot_{{shot}}.json#shot=901", dir.path().display());
    let entry = open_entry(&uri).unwrap();
    assert_eq!(
        entry.get_value("eq.ip", None, false).unwrap().into_value().unwrap(),
        json!(6.0)
    );

    let missing = format!("local://{}/shot_{{shot}}.json#shot=1", dir.path().display());
    assert!(matches!(open_entry(&missing), Err(Error::NotFound(_))));
}

#[test]
fn test_create_mode_refuses_existing_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("run_a.json"), "{}").unwrap();
    let coll = LocalFileCollection::new(dir.path(), "run_{name}.json");
    let err = coll.open(&predicate(json!({"name": "a"})), Mode::from_str("x").unwrap());
    assert!(matches!(err, Err(Error::InvalidValue(_))));
}

#[test]
fn test_geqdsk_document() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("g900.gfile");
    fs::write(&path, GFILE).unwrap();

    let entry = open_entry(&path.to_string_lossy()).unwrap();
    assert_eq!(entry.kind().unwrap(), Kind::Mapping);
    assert_eq!(
        entry.get_value("description", None, true).unwrap().as_value(),
        Some(&json!("TEST    01/01/2020  #000900  1000ms"))
    );
    assert_eq!(
        entry.get_value("psirz.1", None, false).unwrap().into_value().unwrap(),
        json!([4.0, 5.0, 6.0])
    );
    assert_eq!(
        entry.get_value("boundary.r", None, false).unwrap().into_value().unwrap(),
        json!([1.0, 2.0])
    );
    assert_eq!(
        entry.get_value("r", None, false).unwrap().into_value().unwrap(),
        json!([0.5, 1.5, 2.5])
    );
}

#[test]
fn test_class_names_resolve_without_case() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("equilibrium.txt");
    fs::write(&path, GFILE).unwrap();

    let envs = Envs::from_value(json!({"dir": dir.path().to_string_lossy()}));
    let node = create_dobject(
        &json!({"$class": "file.geqdsk", "path": "{dir}/equilibrium.txt"}),
        &envs,
        None,
        &dobject_registry(),
    )
    .unwrap();
    assert_eq!(node.get("qpsi").unwrap().serialize().unwrap(), json!([1.0, 1.5, 3.0]));
    assert_eq!(node.get("bcentr").unwrap().serialize().unwrap(), json!(2.5));

    let from_data = create_dobject(
        &json!({"path": "{dir}/equilibrium.txt"}),
        &envs,
        Some(Node::from(json!({"given": true}))),
        &dobject_registry(),
    )
    .unwrap();
    assert_eq!(from_data.serialize().unwrap(), json!({"given": true}));
}
