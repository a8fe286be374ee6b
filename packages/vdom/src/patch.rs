use crate::flatten::flatten_children;
use crate::node::{clean_props, VNode};
use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;

/// One patch instruction
///
/// `path` holds the flattened child indices from the root down to the
/// addressed slot. `Move` addresses the parent and carries the positions
/// within it.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Set {
        path: Vec<usize>,
        key: String,
        value: String,
    },
    Unset {
        path: Vec<usize>,
        key: String,
    },
    Insert {
        path: Vec<usize>,
        node: VNode,
    },
    Remove {
        path: Vec<usize>,
    },
    Replace {
        path: Vec<usize>,
        node: VNode,
    },
    Move {
        path: Vec<usize>,
        from: usize,
        to: usize,
    },
    Focus {
        path: Vec<usize>,
    },
    PushUrl(String),
    ReplaceUrl(String),
    SetCookie {
        key: String,
        value: String,
    },
    UnsetCookie(String),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Set { .. } => "set",
            Action::Unset { .. } => "unset",
            Action::Insert { .. } => "insert",
            Action::Remove { .. } => "remove",
            Action::Replace { .. } => "replace",
            Action::Move { .. } => "move",
            Action::Focus { .. } => "focus",
            Action::PushUrl(_) => "push_url",
            Action::ReplaceUrl(_) => "replace_url",
            Action::SetCookie { .. } => "set_cookie",
            Action::UnsetCookie(_) => "unset_cookie",
        }
    }

    pub fn path(&self) -> Option<&[usize]> {
        match self {
            Action::Set { path, .. }
            | Action::Unset { path, .. }
            | Action::Insert { path, .. }
            | Action::Remove { path }
            | Action::Replace { path, .. }
            | Action::Move { path, .. }
            | Action::Focus { path } => Some(path),
            _ => None,
        }
    }

    pub fn is_move(&self) -> bool {
        matches!(self, Action::Move { .. })
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(None)?;
        seq.serialize_element(self.name())?;

        if let Some(path) = self.path() {
            for index in path {
                seq.serialize_element(index)?;
            }
        }

        match self {
            Action::Set { key, value, .. } => {
                seq.serialize_element(key)?;
                seq.serialize_element(value)?;
            }
            Action::Unset { key, .. } => seq.serialize_element(key)?,
            Action::Insert { node, .. } | Action::Replace { node, .. } => {
                seq.serialize_element(&WireNode(node))?;
            }
            Action::Move { from, to, .. } => {
                seq.serialize_element(from)?;
                seq.serialize_element(to)?;
            }
            Action::Remove { .. } | Action::Focus { .. } => {}
            Action::PushUrl(url) | Action::ReplaceUrl(url) => seq.serialize_element(url)?,
            Action::SetCookie { key, value } => {
                seq.serialize_element(key)?;
                seq.serialize_element(value)?;
            }
            Action::UnsetCookie(key) => seq.serialize_element(key)?,
        }

        seq.end()
    }
}

/// Wire form of a node: a string for text, `[tag, props, ...children]` otherwise
pub struct WireNode<'a>(pub &'a VNode);

impl Serialize for WireNode<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let element = match self.0 {
            VNode::Text(text) => return serializer.serialize_str(&text.markup()),
            VNode::Element(element) => element,
        };

        let children = flatten_children(element);
        let mut seq = serializer.serialize_seq(Some(children.len() + 2))?;
        seq.serialize_element(element.tag.as_deref().unwrap_or(""))?;
        seq.serialize_element(&clean_props(&element.props))?;
        for child in &children.nodes {
            seq.serialize_element(&WireNode(child))?;
        }
        seq.end()
    }
}

/// Compact JSON array of actions
pub fn to_wire(actions: &[Action]) -> serde_json::Result<String> {
    serde_json::to_string(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{EventHandler, Opaque};
    use serde_json::json;

    #[test]
    fn test_action_tuples() {
        let actions = vec![
            Action::Set {
                path: vec![0, 2],
                key: "class".into(),
                value: "on".into(),
            },
            Action::Unset {
                path: vec![1],
                key: "hidden".into(),
            },
            Action::Remove { path: vec![0, 3] },
            Action::Move {
                path: vec![0],
                from: 2,
                to: 0,
            },
            Action::Focus { path: vec![0, 1] },
            Action::PushUrl("/next".into()),
            Action::SetCookie {
                key: "k".into(),
                value: "v".into(),
            },
            Action::UnsetCookie("k".into()),
        ];

        let wire: serde_json::Value = serde_json::from_str(&to_wire(&actions).unwrap()).unwrap();
        assert_eq!(
            wire,
            json!([
                ["set", 0, 2, "class", "on"],
                ["unset", 1, "hidden"],
                ["remove", 0, 3],
                ["move", 0, 2, 0],
                ["focus", 0, 1],
                ["push_url", "/next"],
                ["set_cookie", "k", "v"],
                ["unset_cookie", "k"],
            ])
        );
    }

    #[test]
    fn test_node_wire_form() {
        let node = VNode::element("button")
            .with_prop("onclick", EventHandler::new(Opaque::new(())))
            .with_prop("disabled", false)
            .with_child("a < ")
            .with_child(VNode::fragment().with_child("b"))
            .with_child(VNode::element("br"));

        let action = Action::Insert {
            path: vec![0, 1],
            node,
        };
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!([
                "insert", 0, 1,
                ["button", {"onclick": "call(event, false, false)"}, "a &lt; b", ["br", {}]]
            ])
        );
    }
}
