//! Element → value decoding.

use std::collections::HashMap;

use serde_json::{Map, Value};
use spdm_util::format_with;
use tracing::warn;

use super::{Element, ElementId, XmlTree};
use crate::error::{Error, Result};

/// An element declaring a `dtype`, or one with neither child elements nor
/// attributes.
///
/// A `dtype` element is a leaf even when it has children (they are not
/// read) or no text (it decodes to null).
pub fn is_leaf(element: &Element) -> bool {
    element.attrs.contains_key("dtype") || (element.children.is_empty() && element.attrs.is_empty())
}

/// Decode the text of a leaf according to its `dtype` and `dims`.
///
/// Without `dtype` the text is returned as is. With one, the text is a
/// comma-separated token list; a single token without `dims` collapses to a
/// scalar, `dims` reshapes into nested arrays, anything else is a flat array.
pub fn decode_leaf(element: &Element, vars: &Map<String, Value>) -> Result<Value> {
    let Some(text) = element.text.as_deref() else {
        return Ok(Value::Null);
    };
    let Some(dtype) = element.attr("dtype") else {
        return Ok(Value::String(substitute(text, vars)));
    };

    let tokens: Vec<&str> = text
        .trim_matches(',')
        .split(',')
        .map(str::trim)
        .collect();
    let values = tokens
        .iter()
        .map(|t| parse_token(dtype, t, vars))
        .collect::<Result<Vec<_>>>()
        .map_err(|e| match e {
            Error::InvalidValue(msg) => Error::InvalidValue(format!("<{}>: {msg}", element.tag)),
            other => other,
        })?;

    match element.attr("dims") {
        Some(dims) => reshape(values, &parse_dims(dims)?),
        None if values.len() == 1 => Ok(values.into_iter().next().unwrap_or(Value::Null)),
        None => Ok(Value::Array(values)),
    }
}

fn parse_token(dtype: &str, token: &str, vars: &Map<String, Value>) -> Result<Value> {
    match dtype {
        "string" => Ok(Value::String(substitute(token, vars))),
        "int" => token
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| Error::InvalidValue(format!("`{token}` is not an int"))),
        "float" => token
            .replace(['d', 'D'], "e")
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::from)
            .ok_or_else(|| Error::InvalidValue(format!("`{token}` is not a float"))),
        other => Err(Error::UnsupportedType(other.to_string())),
    }
}

fn parse_dims(dims: &str) -> Result<Vec<usize>> {
    dims.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| {
            d.parse::<usize>()
                .map_err(|_| Error::InvalidValue(format!("bad dims `{dims}`")))
        })
        .collect()
}

fn reshape(values: Vec<Value>, dims: &[usize]) -> Result<Value> {
    let expected: usize = dims.iter().product();
    if expected != values.len() || dims.is_empty() {
        return Err(Error::InvalidValue(format!(
            "{} values do not fill dims {dims:?}",
            values.len()
        )));
    }
    Ok(nest(&mut values.into_iter(), dims))
}

fn nest(values: &mut impl Iterator<Item = Value>, dims: &[usize]) -> Value {
    match dims {
        [] => values.next().unwrap_or(Value::Null),
        [n] => Value::Array(values.take(*n).collect()),
        [n, rest @ ..] => Value::Array((0..*n).map(|_| nest(values, rest)).collect()),
    }
}

fn substitute(text: &str, vars: &Map<String, Value>) -> String {
    if vars.is_empty() {
        return text.to_string();
    }
    format_with(text, |name| {
        vars.get(name).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    })
}

/// Eagerly convert the subtree at `id`.
///
/// Leaves decode through [`decode_leaf`]. Other elements become a mapping
/// keyed by child tag; repeated tags collect into a list in document order,
/// attributes go under `@name` and text under `@text`.
pub fn to_value(tree: &XmlTree, id: ElementId, vars: &Map<String, Value>) -> Result<Value> {
    let element = tree.element(id);
    if is_leaf(element) {
        return decode_leaf(element, vars);
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for child in tree.children(id) {
        *counts.entry(tree.element(child).tag.as_str()).or_default() += 1;
    }

    let mut map = Map::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for child in tree.children(id) {
        let tag = tree.element(child).tag.as_str();
        let position = seen.entry(tag).or_default();
        if counts[tag] == 1 {
            map.insert(tag.to_string(), to_value(tree, child, vars)?);
            continue;
        }
        let mut child_vars = vars.clone();
        child_vars.insert(tag.to_string(), Value::from(*position));
        *position += 1;
        let value = to_value(tree, child, &child_vars)?;
        match map
            .entry(tag.to_string())
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(items) => items.push(value),
            slot => *slot = Value::Array(vec![slot.take(), value]),
        }
    }

    for (name, value) in &element.attrs {
        map.insert(format!("@{name}"), Value::String(value.clone()));
    }
    if let Some(text) = &element.text {
        if map.contains_key("@text") {
            warn!(tag = %element.tag, "attribute `text` shadowed by element text");
        }
        map.insert("@text".to_string(), Value::String(substitute(text, vars)));
    }
    Ok(Value::Object(map))
}
