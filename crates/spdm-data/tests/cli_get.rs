use std::fs;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use spdm_data::cli::{get, parse_args};
use tempfile::TempDir;

fn run(args: &[&str]) -> Value {
    let args = parse_args(args.iter().map(|s| s.to_string())).unwrap();
    serde_json::from_str(&get(&args).unwrap()).unwrap()
}

#[test]
fn test_get_eager_and_lazy() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scenario.json");
    fs::write(&path, r#"{"eq": {"ip": 1.5, "psi": [1, 2, 3]}, "code": "efit"}"#).unwrap();
    let file = path.to_string_lossy().into_owned();

    assert_eq!(run(&[&file, "eq.psi.-1"]), json!(3));
    assert_eq!(run(&[&file, "eq"]), json!({"ip": 1.5, "psi": [1, 2, 3]}));
    assert_eq!(
        run(&[&file, "eq", "--lazy"]),
        json!({"$entry": "memory", "path": "eq", "kind": "mapping", "keys": ["ip", "psi"]})
    );
    assert_eq!(run(&[&file, "code", "--lazy"]), json!("efit"));
}
