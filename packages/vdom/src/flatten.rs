//! Fragment inlining and text-run merging
//!
//! A client never sees fragments, and it sees a run of adjacent text pieces as
//! a single text node. Both the differ and the handle tracker therefore work on
//! flattened sequences: every index they use is an index into [`Flat::nodes`].
//!
//! [`flatten_pair`] additionally relates a new sequence to the previous one by
//! following the [`Correspondence`](crate::Correspondence) maps stored on the
//! new tree.

use crate::node::{VElement, VNode};
use crate::text::Text;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

/// Flattened sequence of elements and merged text runs
#[derive(Debug, Clone, Default)]
pub struct Flat {
    pub nodes: Vec<VNode>,

    /// Child-index path that led to each element leaf; `None` for text runs
    pub paths: Vec<Option<Vec<usize>>>,
}

impl Flat {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&VNode> {
        self.nodes.get(index)
    }

    fn index_by_path(&self) -> HashMap<&[usize], usize> {
        self.paths
            .iter()
            .enumerate()
            .filter_map(|(index, path)| Some((path.as_deref()?, index)))
            .collect()
    }
}

#[derive(Default)]
struct Flattener {
    flat: Flat,
    pending: Option<Text>,
}

impl Flattener {
    fn visit(&mut self, children: &[VNode], path: &mut Vec<usize>) {
        for (slot, child) in children.iter().enumerate() {
            path.push(slot);
            match child {
                VNode::Text(text) => match &mut self.pending {
                    Some(run) => run.push(text),
                    None => self.pending = Some(text.clone()),
                },
                VNode::Element(element) if element.is_fragment() => {
                    self.visit(&element.children, path);
                }
                VNode::Element(_) => {
                    self.flush_text();
                    self.flat.nodes.push(child.clone());
                    self.flat.paths.push(Some(path.clone()));
                }
            }
            path.pop();
        }
    }

    fn flush_text(&mut self) {
        if let Some(run) = self.pending.take() {
            if !run.is_empty() {
                self.flat.nodes.push(VNode::Text(run));
                self.flat.paths.push(None);
            }
        }
    }

    fn finish(mut self) -> Flat {
        self.flush_text();
        self.flat
    }
}

/// Flatten a node as it appears at the root: a fragment contributes its
/// children, anything else is a one-node sequence
pub fn flatten(node: &VNode) -> Flat {
    match node {
        VNode::Element(element) if element.is_fragment() => flatten_children(element),
        VNode::Element(_) => Flat {
            nodes: vec![node.clone()],
            paths: vec![Some(Vec::new())],
        },
        VNode::Text(text) if text.is_empty() => Flat::default(),
        VNode::Text(_) => Flat {
            nodes: vec![node.clone()],
            paths: vec![None],
        },
    }
}

/// Flatten the children of an element
pub fn flatten_children(element: &VElement) -> Flat {
    let mut flattener = Flattener::default();
    flattener.visit(&element.children, &mut Vec::new());
    flattener.finish()
}

/// Old and new flattened sequences with a new-to-old index map
#[derive(Debug, Clone)]
pub struct FlatPair {
    pub old: Flat,
    pub new: Flat,
    pub mapping: Vec<Option<usize>>,
}

impl FlatPair {
    fn build(old: Flat, new: Flat, correspond: impl Fn(&[usize]) -> Option<Vec<usize>>) -> Self {
        let old_index = old.index_by_path();
        let mut claimed = vec![false; old.len()];
        let mut mapping = vec![None; new.len()];

        for (new_index, path) in new.paths.iter().enumerate() {
            let Some(path) = path else { continue };
            let Some(old_path) = correspond(path) else { continue };
            let Some(&index) = old_index.get(old_path.as_slice()) else { continue };

            // First claim wins, so a hand-built map cannot alias one old node twice
            if !claimed[index] {
                claimed[index] = true;
                mapping[new_index] = Some(index);
            }
        }

        FlatPair { old, new, mapping }
    }

    /// Pair up unmatched text runs by content, oldest first
    pub fn match_text(&mut self) {
        let mut claimed = vec![false; self.old.len()];
        for index in self.mapping.iter().flatten() {
            claimed[*index] = true;
        }

        let mut queues: HashMap<&Text, VecDeque<usize>> = HashMap::new();
        for (index, node) in self.old.nodes.iter().enumerate() {
            if let (VNode::Text(text), false) = (node, claimed[index]) {
                queues.entry(text).or_default().push_back(index);
            }
        }

        for (new_index, node) in self.new.nodes.iter().enumerate() {
            let VNode::Text(text) = node else { continue };
            if self.mapping[new_index].is_some() {
                continue;
            }
            if let Some(index) = queues.get_mut(text).and_then(VecDeque::pop_front) {
                self.mapping[new_index] = Some(index);
            }
        }
    }

    /// New index currently representing old index `old`
    pub fn reverse(&self, old: usize) -> Option<usize> {
        self.mapping.iter().position(|index| *index == Some(old))
    }
}

/// Walk `path` down the new tree, translating each child slot into the slot of
/// the previous render it corresponds to
fn correspond(
    old_parent: Option<&Rc<VElement>>,
    new_parent: &Rc<VElement>,
    path: &[usize],
) -> Option<Vec<usize>> {
    let mut old = old_parent;
    let mut new = new_parent;
    let mut old_path = Vec::with_capacity(path.len());

    for (depth, &slot) in path.iter().enumerate() {
        let old_slot = match old {
            Some(old) if Rc::ptr_eq(old, new) => slot,
            _ => new.mapping.get(slot)?,
        };
        old_path.push(old_slot);

        if depth + 1 < path.len() {
            new = new.children.get(slot)?.as_element()?;
            old = old
                .and_then(|old| old.children.get(old_slot))
                .and_then(VNode::as_element);
        }
    }

    Some(old_path)
}

/// Flatten two roots and relate their leaves
pub fn flatten_pair(old: Option<&VNode>, new: &VNode) -> FlatPair {
    let old_flat = old.map(flatten).unwrap_or_default();
    let new_flat = flatten(new);
    let old_root = old.and_then(VNode::as_element);

    FlatPair::build(old_flat, new_flat, |path| match new.as_element() {
        _ if path.is_empty() => Some(Vec::new()),
        Some(new_root) => correspond(old_root, new_root, path),
        None => None,
    })
}

/// Flatten the children of two elements and relate them
pub fn flatten_children_pair(old: &Rc<VElement>, new: &Rc<VElement>) -> FlatPair {
    FlatPair::build(flatten_children(old), flatten_children(new), |path| {
        correspond(Some(old), new, path)
    })
}
