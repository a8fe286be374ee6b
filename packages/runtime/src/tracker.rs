//! Live node handles
//!
//! ## Purpose
//!
//! A [`NodeHandle`] names one node of the client's view. It is stored as the
//! chain of flattened indices that leads to the node: the first index selects
//! among the flattened roots, every further index among the flattened
//! children of the node before it. After each render the [`Tracker`] follows
//! every chain through the new tree using the same correspondence rules the
//! differ uses, so a handle keeps naming "the same" node while siblings are
//! inserted, removed or moved around it. Once its node is gone the handle is
//! detached for good.
//!
//! The tracker also works out which `ref` callbacks have to fire after a
//! render.

use crate::context::{Change, ChangeSink};
use crate::event::RefCallback;
use arbor_vdom::{
    flatten, flatten_children, flatten_children_pair, flatten_pair, Flat, FlatPair, PropValue,
    VElement, VNode,
};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub type HandleId = u64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error("node is no longer part of the tree")]
    Unattached,

    #[error("node is not an element")]
    NotAnElement,

    #[error("node is not a text node")]
    NotText,

    #[error("no node at flattened path {0:?}")]
    IndexOutOfRange(Vec<usize>),
}

pub type TrackerResult<T> = Result<T, TrackerError>;

struct Registry {
    root: VNode,

    /// Current chain of each live handle; `None` once detached
    entries: HashMap<HandleId, Option<Vec<usize>>>,
    next_id: HandleId,
    sink: ChangeSink,
}

impl Registry {
    fn register(&mut self, chain: Option<Vec<usize>>) -> HandleId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, chain);
        id
    }
}

/// Node at `chain`, starting from the flattened roots
fn walk(root: &VNode, chain: &[usize]) -> Option<VNode> {
    let (first, rest) = chain.split_first()?;
    let mut node = flatten(root).nodes.get(*first)?.clone();
    for index in rest {
        let element = node.as_element()?.clone();
        node = flatten_children(&element).nodes.get(*index)?.clone();
    }
    Some(node)
}

/// Node whose flattened children the next hop of `prefix` indexes into
fn walk_parent(root: &VNode, prefix: &[usize]) -> Option<VNode> {
    if prefix.is_empty() {
        Some(root.clone())
    } else {
        walk(root, prefix)
    }
}

#[derive(Clone)]
enum Pairing {
    /// Same allocation on both sides; indices below carry over unchanged
    Same,
    Changed(Rc<FlatPair>),
}

/// Translates chains from one render's tree to the next
struct Retarget<'a> {
    old_root: &'a VNode,
    new_root: &'a VNode,
    pairs: HashMap<Vec<usize>, Option<Pairing>>,
}

impl<'a> Retarget<'a> {
    fn new(old_root: &'a VNode, new_root: &'a VNode) -> Self {
        Self {
            old_root,
            new_root,
            pairs: HashMap::new(),
        }
    }

    fn pairing(&mut self, old_prefix: &[usize], new_prefix: &[usize]) -> Option<Pairing> {
        if let Some(pairing) = self.pairs.get(old_prefix) {
            return pairing.clone();
        }

        let pairing = self.compute(old_prefix, new_prefix);
        self.pairs.insert(old_prefix.to_vec(), pairing.clone());
        pairing
    }

    fn compute(&self, old_prefix: &[usize], new_prefix: &[usize]) -> Option<Pairing> {
        let old = walk_parent(self.old_root, old_prefix)?;
        let new = walk_parent(self.new_root, new_prefix)?;
        if old.same_ref(&new) {
            return Some(Pairing::Same);
        }

        let mut pair = if old_prefix.is_empty() {
            flatten_pair(Some(&old), &new)
        } else {
            flatten_children_pair(old.as_element()?, new.as_element()?)
        };
        pair.match_text();
        Some(Pairing::Changed(Rc::new(pair)))
    }

    fn chain(&mut self, chain: &[usize]) -> Option<Vec<usize>> {
        let mut translated = Vec::with_capacity(chain.len());
        for (hop, &index) in chain.iter().enumerate() {
            match self.pairing(&chain[..hop], &translated)? {
                Pairing::Same => {
                    translated.extend_from_slice(&chain[hop..]);
                    break;
                }
                Pairing::Changed(pair) => {
                    let next = pair.reverse(index)?;
                    // A retagged element is replaced on the client
                    if pair.old.nodes.get(index)?.tag() != pair.new.nodes.get(next)?.tag() {
                        return None;
                    }
                    translated.push(next);
                }
            }
        }
        Some(translated)
    }
}

/// Owner of every handle issued by one session
pub struct Tracker {
    registry: Rc<RefCell<Registry>>,
}

impl Tracker {
    pub fn new(root: VNode, sink: ChangeSink) -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                root,
                entries: HashMap::new(),
                next_id: 0,
                sink,
            })),
        }
    }

    /// Tree the handles currently resolve against
    pub fn root(&self) -> VNode {
        self.registry.borrow().root.clone()
    }

    /// Number of handles still alive, attached or not
    pub fn len(&self) -> usize {
        self.registry.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handle for the node at a flattened path of the current tree
    pub fn handle_at(&self, path: &[usize]) -> TrackerResult<NodeHandle> {
        let root = self.root();
        if walk(&root, path).is_none() {
            return Err(TrackerError::IndexOutOfRange(path.to_vec()));
        }
        Ok(self.attach(path.to_vec()))
    }

    pub(crate) fn attach(&self, chain: Vec<usize>) -> NodeHandle {
        let id = self.registry.borrow_mut().register(Some(chain));
        NodeHandle {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    /// Move every handle over to `root`, detaching those whose node is gone
    #[instrument(skip_all)]
    pub fn update(&self, root: &VNode) {
        let mut registry = self.registry.borrow_mut();
        let old_root = std::mem::replace(&mut registry.root, root.clone());
        if old_root.same_ref(root) {
            return;
        }

        let mut retarget = Retarget::new(&old_root, root);
        let mut detached = 0;
        for (id, entry) in registry.entries.iter_mut() {
            let Some(chain) = entry.as_deref() else {
                continue;
            };
            *entry = retarget.chain(chain);
            if entry.is_none() {
                warn!(handle = id, "node left the tree, detaching handle");
                detached += 1;
            }
        }
        debug!(handles = registry.entries.len(), detached, "handles updated");
    }
}

/// Live reference to one node of the rendered tree
pub struct NodeHandle {
    id: HandleId,
    registry: Weak<RefCell<Registry>>,
}

impl NodeHandle {
    pub fn id(&self) -> HandleId {
        self.id
    }

    fn lookup(&self) -> TrackerResult<(Vec<usize>, VNode)> {
        let registry = self.registry.upgrade().ok_or(TrackerError::Unattached)?;
        let registry = registry.borrow();
        let chain = registry
            .entries
            .get(&self.id)
            .cloned()
            .flatten()
            .ok_or(TrackerError::Unattached)?;
        Ok((chain, registry.root.clone()))
    }

    pub fn is_attached(&self) -> bool {
        self.lookup().is_ok()
    }

    /// Flattened path of the node in the current tree
    pub fn path(&self) -> TrackerResult<Vec<usize>> {
        self.lookup().map(|(chain, _)| chain)
    }

    pub fn resolve(&self) -> TrackerResult<VNode> {
        let (chain, root) = self.lookup()?;
        walk(&root, &chain).ok_or(TrackerError::Unattached)
    }

    fn element(&self) -> TrackerResult<Rc<VElement>> {
        match self.resolve()? {
            VNode::Element(element) => Ok(element),
            VNode::Text(_) => Err(TrackerError::NotAnElement),
        }
    }

    pub fn tag(&self) -> TrackerResult<String> {
        Ok(self.element()?.tag.clone().unwrap_or_default())
    }

    /// Property value, `None` when the element does not carry it
    pub fn get(&self, key: &str) -> TrackerResult<Option<PropValue>> {
        Ok(self.element()?.props.get(key).cloned())
    }

    /// Unescaped content of a text node
    pub fn content(&self) -> TrackerResult<String> {
        match self.resolve()? {
            VNode::Text(text) => Ok(text.as_str().to_string()),
            VNode::Element(_) => Err(TrackerError::NotText),
        }
    }

    pub fn children(&self) -> TrackerResult<Vec<NodeHandle>> {
        let (chain, root) = self.lookup()?;
        let Some(VNode::Element(element)) = walk(&root, &chain) else {
            return Err(TrackerError::NotAnElement);
        };
        let count = flatten_children(&element).len();
        (0..count)
            .map(|index| {
                let mut child = chain.clone();
                child.push(index);
                self.sibling(Some(child))
            })
            .collect::<Option<Vec<_>>>()
            .ok_or(TrackerError::Unattached)
    }

    /// Parent element; `None` for a root node
    pub fn parent(&self) -> TrackerResult<Option<NodeHandle>> {
        let (mut chain, _) = self.lookup()?;
        chain.pop();
        if chain.is_empty() {
            return Ok(None);
        }
        self.sibling(Some(chain)).map(Some).ok_or(TrackerError::Unattached)
    }

    /// Ask the client to focus this node after the next render
    pub fn focus(&self) -> TrackerResult<()> {
        let (chain, root) = self.lookup()?;
        match walk(&root, &chain) {
            Some(VNode::Element(_)) => {}
            Some(VNode::Text(_)) => return Err(TrackerError::NotAnElement),
            None => return Err(TrackerError::Unattached),
        }
        let target = self.sibling(Some(chain)).ok_or(TrackerError::Unattached)?;
        let sink = self.sink().ok_or(TrackerError::Unattached)?;
        sink.send(Change::Focus(target));
        Ok(())
    }

    fn sink(&self) -> Option<ChangeSink> {
        Some(self.registry.upgrade()?.borrow().sink.clone())
    }

    /// Another handle registered with the same tracker
    fn sibling(&self, chain: Option<Vec<usize>>) -> Option<NodeHandle> {
        let registry = self.registry.upgrade()?;
        let id = registry.borrow_mut().register(chain);
        Some(NodeHandle {
            id,
            registry: self.registry.clone(),
        })
    }
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        // Dropped while the tracker is mid-update; the entry goes stale
        if let Ok(mut registry) = registry.try_borrow_mut() {
            registry.entries.remove(&self.id);
        };
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHandle(#{})", self.id)
    }
}

/// `ref` callback to invoke after a render, with the chain of the element it
/// now points at or `None` when the element went away
pub(crate) struct RefUpdate {
    pub(crate) callback: RefCallback,
    pub(crate) target: Option<Vec<usize>>,
}

fn ref_of(element: &VElement) -> Option<RefCallback> {
    match element.props.get("ref")? {
        PropValue::Ref(callback) => callback.downcast_ref::<RefCallback>().cloned(),
        _ => None,
    }
}

fn released(node: &VNode, updates: &mut Vec<RefUpdate>) {
    let VNode::Element(element) = node else {
        return;
    };
    if let Some(callback) = ref_of(element) {
        updates.push(RefUpdate {
            callback,
            target: None,
        });
    }
    for child in &element.children {
        released(child, updates);
    }
}

fn unpaired(new: &VElement) -> FlatPair {
    let new = flatten_children(new);
    FlatPair {
        old: Flat::default(),
        mapping: vec![None; new.len()],
        new,
    }
}

fn collect_refs(pair: &FlatPair, chain: &mut Vec<usize>, updates: &mut Vec<RefUpdate>) {
    let mut kept: HashSet<usize> = HashSet::new();

    for (new_index, node) in pair.new.nodes.iter().enumerate() {
        let Some(old_index) = pair.mapping[new_index] else {
            continue;
        };
        let old = &pair.old.nodes[old_index];
        if old.tag() == node.tag() {
            kept.insert(old_index);
        }
    }

    for (old_index, node) in pair.old.nodes.iter().enumerate() {
        if !kept.contains(&old_index) {
            released(node, updates);
        }
    }

    for (new_index, node) in pair.new.nodes.iter().enumerate() {
        let VNode::Element(element) = node else {
            continue;
        };
        let old = pair.mapping[new_index]
            .filter(|old_index| kept.contains(old_index))
            .map(|old_index| &pair.old.nodes[old_index]);
        if old.map_or(false, |old| old.same_ref(node)) {
            continue;
        }

        chain.push(new_index);
        match old.and_then(VNode::as_element) {
            Some(old) => {
                let mut children = flatten_children_pair(old, element);
                children.match_text();
                collect_refs(&children, chain, updates);
            }
            None => {
                if let Some(callback) = ref_of(element) {
                    updates.push(RefUpdate {
                        callback,
                        target: Some(chain.clone()),
                    });
                }
                collect_refs(&unpaired(element), chain, updates);
            }
        }
        chain.pop();
    }
}

/// `ref` callbacks fired by going from `old` to `new`, releases first
pub(crate) fn ref_updates(old: Option<&VNode>, new: Option<&VNode>) -> Vec<RefUpdate> {
    let mut updates = Vec::new();
    match (old, new) {
        (Some(old), Some(new)) if old.same_ref(new) => {}
        (old, Some(new)) => {
            let mut pair = flatten_pair(old, new);
            pair.match_text();
            collect_refs(&pair, &mut Vec::new(), &mut updates);
        }
        (Some(old), None) => released(old, &mut updates),
        (None, None) => {}
    }
    updates.sort_by_key(|update| update.target.is_some());
    updates
}
