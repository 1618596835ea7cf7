use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::layered::Envs;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_.]*)\}").expect("placeholder pattern is valid")
    })
}

/// Names of the `{name}` placeholders in `template`, in order of appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    placeholder_regex()
        .captures_iter(template)
        .map(|c| c[1].to_string())
        .collect()
}

/// Replace every `{name}` placeholder with `lookup(name)`. Placeholders the
/// lookup does not know are left untouched.
pub fn format_with<F>(template: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    placeholder_regex()
        .replace_all(template, |caps: &Captures| {
            lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Fill `{name}` placeholders from an environment.
///
/// Strings are inserted bare; other values use their JSON text.
///
/// ```
/// use serde_json::json;
/// use spdm_util::{format_template, Envs};
///
/// let envs = Envs::from_value(json!({"shot": 900, "run": "a"}));
/// assert_eq!(format_template("{shot}_{run}_{missing}", &envs), "900_a_{missing}");
/// ```
pub fn format_template(template: &str, envs: &Envs) -> String {
    format_with(template, |name| envs.get(name).map(value_to_text))
}

/// Apply [`format_template`] to every string inside `value`.
pub fn format_value(value: &Value, envs: &Envs) -> Value {
    match value {
        Value::String(s) => Value::String(format_template(s, envs)),
        Value::Array(items) => Value::Array(items.iter().map(|v| format_value(v, envs)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), format_value(v, envs)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders("a/{b}/{c.d}/{}"), vec!["b", "c.d"]);
        assert!(placeholders("plain").is_empty());
    }

    #[test]
    fn test_format_with_closure() {
        let out = format_with("{tag}_{x}", |name| (name == "tag").then(|| "3".to_string()));
        assert_eq!(out, "3_{x}");
    }

    #[test]
    fn test_format_value_recurses() {
        let envs = Envs::from_value(json!({"job": "J1", "n": 2}));
        let v = json!({"dir": "/tmp/{job}", "list": ["{n}", 5], "flag": true});
        assert_eq!(
            format_value(&v, &envs),
            json!({"dir": "/tmp/J1", "list": ["2", 5], "flag": true})
        );
    }
}
