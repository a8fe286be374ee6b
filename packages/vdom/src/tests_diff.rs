use crate::diff::diff;
use crate::flatten::{flatten, flatten_children};
use crate::node::{clean_props, EventHandler, Opaque, VNode};
use crate::patch::{to_wire, Action};
use serde_json::json;
use std::collections::BTreeMap;

/// Client-side view of a flattened tree
#[derive(Debug, Clone, PartialEq)]
enum Model {
    Text(String),
    Element {
        tag: String,
        props: BTreeMap<String, String>,
        children: Vec<Model>,
    },
}

fn model(node: &VNode) -> Model {
    match node {
        VNode::Text(text) => Model::Text(text.markup().into_owned()),
        VNode::Element(element) => Model::Element {
            tag: element.tag.clone().unwrap_or_default(),
            props: clean_props(&element.props)
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
            children: flatten_children(element).nodes.iter().map(model).collect(),
        },
    }
}

fn list_at<'a>(root: &'a mut Vec<Model>, path: &[usize]) -> &'a mut Vec<Model> {
    path.iter().fold(root, |list, index| match &mut list[*index] {
        Model::Element { children, .. } => children,
        Model::Text(_) => panic!("path runs through text"),
    })
}

fn apply(root: &mut Vec<Model>, action: &Action) {
    match action {
        Action::Set { path, key, .. } | Action::Unset { path, key } => {
            let (last, parent) = path.split_last().unwrap();
            let Model::Element { props, .. } = &mut list_at(root, parent)[*last] else {
                panic!("props on text");
            };
            match action {
                Action::Set { .. } => props.insert(key.clone(), value_of(action)),
                _ => props.remove(key),
            };
        }
        Action::Insert { path, node } => {
            let (last, parent) = path.split_last().unwrap();
            list_at(root, parent).insert(*last, model(node));
        }
        Action::Remove { path } => {
            let (last, parent) = path.split_last().unwrap();
            list_at(root, parent).remove(*last);
        }
        Action::Replace { path, node } => {
            let (last, parent) = path.split_last().unwrap();
            list_at(root, parent)[*last] = model(node);
        }
        Action::Move { path, from, to } => {
            let list = list_at(root, path);
            let node = list.remove(*from);
            list.insert(*to, node);
        }
        other => panic!("unexpected action {:?}", other),
    }
}

fn value_of(action: &Action) -> String {
    match action {
        Action::Set { value, .. } => value.clone(),
        _ => unreachable!(),
    }
}

/// Diff, replay the actions on the old view, and compare with the new view
fn check(old: &VNode, new: &VNode) -> Vec<Action> {
    let actions = diff(old, new);
    let mut view: Vec<Model> = flatten(old).nodes.iter().map(model).collect();
    for action in &actions {
        apply(&mut view, action);
    }
    let expected: Vec<Model> = flatten(new).nodes.iter().map(model).collect();
    assert_eq!(view, expected, "actions: {:?}", actions);
    actions
}

fn item(label: &str) -> VNode {
    VNode::element("li").with_child(label.to_string())
}

enum Slot {
    Kept(usize),
    Fresh(&'static str),
}

/// Old list of `len` items and a new list reusing them in the given order
fn keyed(len: usize, slots: &[Slot]) -> (VNode, VNode) {
    let items: Vec<VNode> = (0..len).map(|i| item(&format!("item {}", i))).collect();
    let old = VNode::element("ul").with_children(items.clone());

    let mut children = Vec::new();
    let mut mapping = Vec::new();
    for slot in slots {
        match slot {
            Slot::Kept(index) => {
                children.push(items[*index].clone());
                mapping.push(Some(*index));
            }
            Slot::Fresh(label) => {
                children.push(item(label));
                mapping.push(None);
            }
        }
    }
    let new = VNode::element("ul").with_children(children).with_mapping(mapping);
    (old, new)
}

fn longest_increasing(values: &[usize]) -> usize {
    let mut best = vec![1; values.len()];
    for i in 0..values.len() {
        for j in 0..i {
            if values[j] < values[i] {
                best[i] = best[i].max(best[j] + 1);
            }
        }
    }
    best.into_iter().max().unwrap_or(0)
}

fn move_count(actions: &[Action]) -> usize {
    actions.iter().filter(|action| action.is_move()).count()
}

#[test]
fn test_swap_is_one_move() {
    use Slot::Kept;
    let (old, new) = keyed(3, &[Kept(1), Kept(0), Kept(2)]);
    let actions = check(&old, &new);
    assert_eq!(actions.len(), 1);
    assert_eq!(move_count(&actions), 1);
}

#[test]
fn test_counter_text_replace() {
    let render = |count: usize| {
        VNode::element("div").with_children(vec![
            VNode::element("button")
                .with_prop("onclick", EventHandler::new(Opaque::new(count)))
                .with_child("+"),
            " count: ".into(),
            count.to_string().into(),
            " ".into(),
        ])
    };

    let old = render(0);
    let new = render(1).with_mapping(vec![Some(0), None, None, None]);

    let actions = check(&old, &new);
    let wire: serde_json::Value = serde_json::from_str(&to_wire(&actions).unwrap()).unwrap();
    assert_eq!(wire, json!([["replace", 0, 1, " count: 1 "]]));
}

#[test]
fn test_identical_roots_produce_nothing() {
    let root = VNode::element("div").with_child(item("a"));
    assert!(diff(&root, &root.clone()).is_empty());
}

#[test]
fn test_prop_changes() {
    let old = VNode::element("input")
        .with_prop("value", "a")
        .with_prop("disabled", true)
        .with_prop("title", "t");
    let new = VNode::element("input")
        .with_prop("value", "b")
        .with_prop("disabled", false)
        .with_prop("placeholder", "p");

    let actions = check(&old, &new);
    assert_eq!(
        actions,
        vec![
            Action::Unset {
                path: vec![0],
                key: "disabled".into(),
            },
            Action::Unset {
                path: vec![0],
                key: "title".into(),
            },
            Action::Set {
                path: vec![0],
                key: "placeholder".into(),
                value: "p".into(),
            },
            Action::Set {
                path: vec![0],
                key: "value".into(),
                value: "b".into(),
            },
        ]
    );
}

#[test]
fn test_tag_change_replaces() {
    let old = VNode::element("div").with_child(VNode::element("span").with_child("x"));
    let new = VNode::element("div")
        .with_child(VNode::element("em").with_child("x"))
        .with_mapping(vec![Some(0)]);

    let actions = check(&old, &new);
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].name(), "replace");
    assert_eq!(actions[0].path(), Some(&[0, 0][..]));
}

#[test]
fn test_removed_items_pair_with_inserts() {
    use Slot::{Fresh, Kept};
    let (old, new) = keyed(4, &[Kept(0), Fresh("x"), Kept(3)]);
    let actions = check(&old, &new);
    let names: Vec<&str> = actions.iter().map(Action::name).collect();
    assert_eq!(names, vec!["replace", "remove"]);
}

#[test]
fn test_trailing_inserts() {
    use Slot::{Fresh, Kept};
    let (old, new) = keyed(1, &[Kept(0), Fresh("a"), Fresh("b")]);
    let actions = check(&old, &new);
    let names: Vec<&str> = actions.iter().map(Action::name).collect();
    assert_eq!(names, vec!["insert", "insert"]);
}

#[test]
fn test_clearing_a_list() {
    let (old, new) = keyed(3, &[]);
    let actions = check(&old, &new);
    assert_eq!(actions.len(), 3);
    assert!(actions.iter().all(|action| action.name() == "remove"));
}

#[test]
fn test_moves_are_minimal() {
    use Slot::{Fresh, Kept};
    let cases: Vec<(usize, Vec<Slot>)> = vec![
        (3, vec![Kept(2), Kept(0), Kept(1)]),
        (6, vec![Kept(5), Kept(4), Kept(3), Kept(2), Kept(1), Kept(0)]),
        (6, vec![Kept(1), Kept(2), Kept(3), Kept(4), Kept(5), Kept(0)]),
        (5, vec![Fresh("a"), Kept(3), Fresh("b"), Kept(0), Kept(4)]),
        (5, vec![Kept(4), Fresh("a"), Kept(2), Kept(1)]),
        (7, vec![Kept(6), Kept(0), Fresh("a"), Kept(5), Kept(1), Kept(4), Kept(2)]),
        (4, vec![Fresh("a"), Fresh("b"), Kept(3), Kept(2)]),
    ];

    for (len, slots) in cases {
        let kept: Vec<usize> = slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Kept(index) => Some(*index),
                Slot::Fresh(_) => None,
            })
            .collect();

        let (old, new) = keyed(len, &slots);
        let actions = check(&old, &new);
        assert_eq!(
            move_count(&actions),
            kept.len() - longest_increasing(&kept),
            "order {:?}: {:?}",
            kept,
            actions
        );
    }
}

#[test]
fn test_text_runs_match_by_content() {
    let old = VNode::element("p").with_children(vec![
        "a".into(),
        VNode::element("br"),
        "b".into(),
    ]);
    let new = VNode::element("p").with_children(vec![
        "b".into(),
        VNode::element("hr"),
        "a".into(),
    ]);

    let actions = check(&old, &new);
    assert!(move_count(&actions) <= 1);
}

#[test]
fn test_nested_changes_are_addressed_by_path() {
    let inner_old = VNode::element("span").with_child("old");
    let old = VNode::element("div").with_children(vec![
        VNode::element("h1").with_child("title"),
        VNode::element("section").with_child(inner_old),
    ]);
    let old_children = &old.as_element().unwrap().children;

    let new = VNode::element("div")
        .with_children(vec![
            old_children[0].clone(),
            VNode::element("section")
                .with_child(VNode::element("span").with_child("new"))
                .with_mapping(vec![Some(0)]),
        ])
        .with_mapping(vec![Some(0), Some(1)]);

    let actions = check(&old, &new);
    assert_eq!(
        actions,
        vec![Action::Replace {
            path: vec![0, 1, 0, 0],
            node: VNode::text("new"),
        }]
    );
}

#[test]
fn test_fragment_roots() {
    let old = VNode::fragment().with_children(vec![item("a"), "tail".into()]);
    let new = VNode::fragment()
        .with_children(vec![item("z"), item("a"), "tail".into()])
        .with_mapping(vec![None, None, None]);
    check(&old, &new);
}
