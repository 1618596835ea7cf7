use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use serde_json::json;
use spdm_data::xml::{load, load_overlay, load_with, LoadOptions};
use spdm_data::{open_entry, Error, Found, Kind, XmlBackend};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path.to_string_lossy().into_owned()
}

fn device(dir: &Path) -> String {
    write(
        dir,
        "coils.xml",
        r#"<pf_active>
             <coil id="0"><name>pf{coil}</name><r dtype="float">1.5</r></coil>
             <coil id="1"><name>pf{coil}</name><r dtype="float">2.5</r></coil>
           </pf_active>"#,
    );
    write(
        dir,
        "east.xml",
        r#"<device xmlns:xi="http://www.w3.org/2001/XInclude">
             <name>east</name>
             <wall><limiter dtype="float" dims="2,2">1.0,2.0,3.0,4.0</limiter></wall>
             <xi:include href="coils.xml"/>
           </device>"#,
    )
}

#[test]
fn test_include_is_grafted() {
    let dir = TempDir::new().unwrap();
    let tree = load(device(dir.path())).unwrap();
    let entry = XmlBackend::new(tree.into()).entry();

    assert_eq!(
        entry.keys().unwrap().iter().map(ToString::to_string).collect::<Vec<_>>(),
        vec!["name", "wall", "pf_active"]
    );
    assert_eq!(
        entry.get_value("pf_active.coil.1.name", None, false).unwrap().into_value().unwrap(),
        json!("pf1")
    );
    assert_eq!(
        entry.get_value("wall.limiter", None, false).unwrap().into_value().unwrap(),
        json!([[1.0, 2.0], [3.0, 4.0]])
    );
}

#[test]
fn test_includes_can_be_left_unresolved() {
    let dir = TempDir::new().unwrap();
    let opts = LoadOptions {
        resolve_includes: false,
        ..LoadOptions::default()
    };
    let tree = load_with(device(dir.path()), &opts).unwrap();
    let tags = tree.child_tags(tree.root());
    assert_eq!(tags, vec!["name", "wall", "xi:include"]);
}

#[test]
fn test_missing_include_fails() {
    let dir = TempDir::new().unwrap();
    let path = write(
        dir.path(),
        "broken.xml",
        r#"<d xmlns:xi="http://www.w3.org/2001/XInclude"><xi:include href="nope.xml"/></d>"#,
    );
    assert!(matches!(load(path), Err(Error::Io(_))));
}

#[test]
fn test_overlay_layers_files() {
    let dir = TempDir::new().unwrap();
    let base = device(dir.path());
    let patch = write(
        dir.path(),
        "patch.xml",
        r#"<device>
             <name>east-2024</name>
             <pf_active><coil id="1"><r dtype="float">2.75</r></coil></pf_active>
             <magnetics><probe>bp01</probe></magnetics>
           </device>"#,
    );
    let tree = load_overlay(&[base, patch]).unwrap();
    let entry = XmlBackend::new(tree.into()).entry();

    assert_eq!(
        entry.get_value("name", None, true).unwrap().as_value(),
        Some(&json!("east-2024"))
    );
    assert_eq!(
        entry.get_value("pf_active.coil.*.r", None, false).unwrap().into_value().unwrap(),
        json!([1.5, 2.75])
    );
    assert_eq!(
        entry.get_value("magnetics.probe", None, true).unwrap().as_value(),
        Some(&json!("bp01"))
    );
    assert!(matches!(
        load_overlay::<&str>(&[]),
        Err(Error::InvalidValue(_))
    ));
}

#[test]
fn test_open_entry_by_suffix() {
    let dir = TempDir::new().unwrap();
    let entry = open_entry(&device(dir.path())).unwrap();
    assert_eq!(entry.kind().unwrap(), Kind::Mapping);
    assert_eq!(entry.child("pf_active.coil").count().unwrap(), 2);
    assert!(matches!(
        entry.find("pf_active.coil.*.missing", true, None),
        Err(Error::AmbiguousOrNotFound { count: 0, .. })
    ));
    assert!(matches!(
        entry.find("pf_active.coil.*.name", false, None),
        Ok(Found::Many(v)) if v.len() == 2
    ));
    assert!(matches!(
        entry.put("name", json!("x")),
        Err(Error::ReadOnly(_))
    ));
}

#[test]
fn test_resolution_is_repeatable() {
    let dir = TempDir::new().unwrap();
    let entry = open_entry(&device(dir.path())).unwrap();
    let first = entry.get_value("", None, false).unwrap().into_value().unwrap();
    let second = entry.get_value("", None, false).unwrap().into_value().unwrap();
    assert_eq!(first, second);

    let lazy = entry.get_value("pf_active", None, true).unwrap().into_value().unwrap();
    assert_eq!(lazy, first["pf_active"]);
}
