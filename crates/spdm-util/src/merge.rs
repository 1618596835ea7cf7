use serde_json::Value;

/// Merge `overlay` into `base`.
///
/// Objects merge key by key, recursively. Anything else in `overlay`
/// replaces the value in `base`; a `null` overlay leaves `base` untouched.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(dst), Value::Object(src)) => {
            for (k, v) in src {
                match dst.get_mut(&k) {
                    Some(slot) => deep_merge(slot, v),
                    None => {
                        dst.insert(k, v);
                    }
                }
            }
        }
        (slot, v) => *slot = v,
    }
}

/// [`deep_merge`] into a copy of `base`.
pub fn merged(base: &Value, overlay: &Value) -> Value {
    let mut out = base.clone();
    deep_merge(&mut out, overlay.clone());
    out
}
