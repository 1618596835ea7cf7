//! Path → element selection.

use serde_json::{Map, Value};
use spdm_path::{slice_indices, Segment};

use super::{ElementId, XmlTree};

/// Elements matched by a path, with the query environment it built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub elements: Vec<ElementId>,
    /// Integer segments recorded under the tag they indexed.
    pub vars: Map<String, Value>,
}

/// Select the elements addressed by `path` below `root`.
///
/// | segment        | step                                               |
/// |----------------|----------------------------------------------------|
/// | `tag`          | child elements named `tag`                         |
/// | `@name`        | keep candidates carrying attribute `name`          |
/// | `@name=value`  | keep candidates whose `name` equals `value`        |
/// | `N`            | per parent: `id="N"` or `id="*"`, else the N-th    |
/// | `-1`           | per parent: the last one                           |
/// | `a:b:c`        | candidates by position across all parents          |
/// | `*`            | every child element                                |
/// | `-`            | nothing                                            |
///
/// Slices count across parents so that the positions handed out for a
/// multi-match selection address the same elements again.
pub fn select(tree: &XmlTree, root: ElementId, path: &[Segment], vars: &Map<String, Value>) -> Selection {
    // (element, parent group) pairs; siblings share a group and stay adjacent
    let mut candidates: Vec<(ElementId, usize)> = vec![(root, 0)];
    let mut vars = vars.clone();
    let mut last_tag: Option<&str> = None;

    for segment in path {
        candidates = match segment {
            Segment::Key(key) => match key.strip_prefix('@') {
                Some(predicate) => filter_attribute(tree, candidates, predicate),
                None => {
                    last_tag = Some(key.as_str());
                    candidates
                        .iter()
                        .enumerate()
                        .flat_map(|(group, &(c, _))| {
                            tree.children_by_tag(c, key).map(move |e| (e, group))
                        })
                        .collect()
                }
            },
            Segment::Index(n) => {
                if let Some(tag) = last_tag {
                    vars.insert(tag.to_string(), Value::from(*n));
                }
                per_parent(&candidates, |siblings| by_index(tree, siblings, *n))
            }
            Segment::Last => per_parent(&candidates, |siblings| {
                siblings.last().copied().into_iter().collect()
            }),
            Segment::Slice { start, stop, step } => {
                slice_indices(*start, *stop, *step, candidates.len())
                    .into_iter()
                    .map(|i| candidates[i])
                    .collect()
            }
            Segment::Wildcard => candidates
                .iter()
                .enumerate()
                .flat_map(|(group, &(c, _))| tree.children(c).map(move |e| (e, group)))
                .collect(),
            Segment::Next => Vec::new(),
        };
        if candidates.is_empty() {
            break;
        }
    }

    Selection {
        elements: candidates.into_iter().map(|(e, _)| e).collect(),
        vars,
    }
}

fn per_parent<F>(candidates: &[(ElementId, usize)], mut pick: F) -> Vec<(ElementId, usize)>
where
    F: FnMut(&[(ElementId, usize)]) -> Vec<(ElementId, usize)>,
{
    candidates
        .chunk_by(|a, b| a.1 == b.1)
        .flat_map(|siblings| pick(siblings))
        .collect()
}

fn filter_attribute(
    tree: &XmlTree,
    candidates: Vec<(ElementId, usize)>,
    predicate: &str,
) -> Vec<(ElementId, usize)> {
    let (name, expected) = match predicate.split_once('=') {
        Some((name, value)) => (name, Some(value.trim_matches(|c| c == '\'' || c == '"'))),
        None => (predicate, None),
    };
    candidates
        .into_iter()
        .filter(|&(c, _)| match (tree.element(c).attr(name), expected) {
            (Some(actual), Some(expected)) => actual == expected,
            (Some(_), None) => true,
            (None, _) => false,
        })
        .collect()
}

fn by_index(tree: &XmlTree, siblings: &[(ElementId, usize)], n: usize) -> Vec<(ElementId, usize)> {
    let key = n.to_string();
    let by_id: Vec<(ElementId, usize)> = siblings
        .iter()
        .copied()
        .filter(|&(c, _)| matches!(tree.element(c).id(), Some(id) if id == key || id == "*"))
        .collect();
    if !by_id.is_empty() {
        return by_id;
    }
    siblings.get(n).copied().into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use spdm_path::parse_path;

    fn tree() -> XmlTree {
        XmlTree::parse(
            r#"<root>
                 <coil name="pf1"><r>1</r></coil>
                 <coil name="pf2" id="0"><r>2</r></coil>
                 <coil name="pf3"><r>3</r></coil>
                 <mode id="*"><n>1</n></mode>
               </root>"#,
        )
        .unwrap()
    }

    fn tags_of(tree: &XmlTree, sel: &Selection, attr: &str) -> Vec<String> {
        sel.elements
            .iter()
            .map(|&e| tree.element(e).attr(attr).unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_index_prefers_id() {
        let t = tree();
        let sel = select(&t, t.root(), &parse_path("coil.0"), &Map::new());
        assert_eq!(tags_of(&t, &sel, "name"), vec!["pf2"]);
        assert_eq!(sel.vars.get("coil"), Some(&Value::from(0)));

        let sel = select(&t, t.root(), &parse_path("coil.2"), &Map::new());
        assert_eq!(tags_of(&t, &sel, "name"), vec!["pf3"]);
    }

    #[test]
    fn test_star_id_matches_any_index() {
        let t = tree();
        let sel = select(&t, t.root(), &parse_path("mode.7"), &Map::new());
        assert_eq!(sel.elements.len(), 1);
        assert_eq!(sel.vars.get("mode"), Some(&Value::from(7)));
    }

    #[test]
    fn test_attribute_predicates() {
        let t = tree();
        let sel = select(&t, t.root(), &parse_path("coil.@name=pf3.r"), &Map::new());
        assert_eq!(sel.elements.len(), 1);
        assert_eq!(t.element(sel.elements[0]).text.as_deref(), Some("3"));

        let sel = select(&t, t.root(), &parse_path("coil.@id"), &Map::new());
        assert_eq!(tags_of(&t, &sel, "name"), vec!["pf2"]);
    }

    #[test]
    fn test_positional_steps() {
        let t = tree();
        let sel = select(&t, t.root(), &parse_path("coil.-1"), &Map::new());
        assert_eq!(tags_of(&t, &sel, "name"), vec!["pf3"]);
        let sel = select(&t, t.root(), &parse_path("coil.::2"), &Map::new());
        assert_eq!(tags_of(&t, &sel, "name"), vec!["pf1", "pf3"]);
        assert!(select(&t, t.root(), &parse_path("coil.-"), &Map::new())
            .elements
            .is_empty());
        assert!(select(&t, t.root(), &parse_path("coil.9"), &Map::new())
            .elements
            .is_empty());
    }

    #[test]
    fn test_index_counts_within_each_parent() {
        let t = XmlTree::parse("<r><a><b>1</b><b>2</b></a><a><b>3</b><b>4</b></a></r>").unwrap();
        let texts = |path: &str| -> Vec<String> {
            select(&t, t.root(), &parse_path(path), &Map::new())
                .elements
                .iter()
                .map(|&e| t.element(e).text.clone().unwrap_or_default())
                .collect()
        };
        assert_eq!(texts("a.b.1"), vec!["2", "4"]);
        assert_eq!(texts("a.b.-1"), vec!["2", "4"]);
        assert_eq!(texts("a.1.b.0"), vec!["3"]);
        assert_eq!(texts("a.b.2:3"), vec!["3"]);
    }
}
