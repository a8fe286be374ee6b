//! Prefix tree keyed by [`Path`]
//!
//! Lookups walk one trie node per selector, so membership, insertion and
//! closest-ancestor queries cost O(depth) regardless of how many paths are
//! stored. Enumeration below a prefix only visits the subtree under it.

use crate::path::{Path, Selector};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct TrieNode<V> {
    value: Option<V>,
    children: BTreeMap<Selector, TrieNode<V>>,
}

impl<V> TrieNode<V> {
    fn new() -> Self {
        Self {
            value: None,
            children: BTreeMap::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }

    fn count(&self) -> usize {
        usize::from(self.value.is_some())
            + self.children.values().map(TrieNode::count).sum::<usize>()
    }

    fn descend(&self, path: &[Selector]) -> Option<&TrieNode<V>> {
        path.iter()
            .try_fold(self, |node, selector| node.children.get(selector))
    }

    /// Removes the value at `path`, dropping trie nodes left empty on the way back up
    fn remove(&mut self, path: &[Selector]) -> Option<V> {
        match path.split_first() {
            None => self.value.take(),
            Some((head, tail)) => {
                let child = self.children.get_mut(head)?;
                let removed = child.remove(tail);
                if child.is_empty() {
                    self.children.remove(head);
                }
                removed
            }
        }
    }
}

/// Set of paths with an optional value attached to each
///
/// With `V = ()` this is the dirty-path set: only presence matters.
#[derive(Debug, Clone)]
pub struct PathTrie<V = ()> {
    root: TrieNode<V>,
    len: usize,
}

impl<V> Default for PathTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> PathTrie<V> {
    pub fn new() -> Self {
        Self {
            root: TrieNode::new(),
            len: 0,
        }
    }

    /// Number of recorded paths
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.root = TrieNode::new();
        self.len = 0;
    }

    /// Record `path` with `value`, returning the value previously stored there
    pub fn insert(&mut self, path: &[Selector], value: V) -> Option<V> {
        let node = path.iter().fold(&mut self.root, |node, selector| {
            node.children.entry(*selector).or_insert_with(TrieNode::new)
        });
        let previous = node.value.replace(value);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    pub fn contains(&self, path: &[Selector]) -> bool {
        self.get(path).is_some()
    }

    pub fn get(&self, path: &[Selector]) -> Option<&V> {
        self.root.descend(path)?.value.as_ref()
    }

    pub fn get_mut(&mut self, path: &[Selector]) -> Option<&mut V> {
        let mut node = &mut self.root;
        for selector in path {
            node = node.children.get_mut(selector)?;
        }
        node.value.as_mut()
    }

    /// Remove a single recorded path, leaving paths below it in place
    pub fn remove(&mut self, path: &[Selector]) -> Option<V> {
        let removed = self.root.remove(path);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Remove every recorded path at or below `prefix`
    ///
    /// Returns how many paths were dropped.
    pub fn prune(&mut self, prefix: &[Selector]) -> usize {
        let Some((last, init)) = prefix.split_last() else {
            let removed = self.len;
            self.clear();
            return removed;
        };

        let mut node = &mut self.root;
        for selector in init {
            match node.children.get_mut(selector) {
                Some(child) => node = child,
                None => return 0,
            }
        }

        let removed = node.children.remove(last).map_or(0, |subtree| subtree.count());
        self.len -= removed;

        // Clear out the now possibly empty chain leading to the pruned subtree
        if removed > 0 && node.is_empty() && !init.is_empty() {
            self.root.remove(init);
        }
        removed
    }

    /// Longest recorded prefix of `path`, the path itself included
    pub fn closest_ancestor(&self, path: &[Selector]) -> Option<(Path, &V)> {
        let mut node = &self.root;
        let mut best = node.value.as_ref().map(|value| (0, value));

        for (depth, selector) in path.iter().enumerate() {
            match node.children.get(selector) {
                Some(child) => node = child,
                None => break,
            }
            if let Some(value) = &node.value {
                best = Some((depth + 1, value));
            }
        }

        best.map(|(depth, value)| (Path::from(&path[..depth]), value))
    }

    /// Every recorded path at or below `prefix`, in tree order
    ///
    /// With `stop_at_first`, the walk does not descend below a recorded path: a
    /// recorded ancestor already implies everything beneath it.
    pub fn children_under<'a>(
        &'a self,
        prefix: &[Selector],
        stop_at_first: bool,
    ) -> impl Iterator<Item = Path> + 'a {
        self.entries_under(prefix, stop_at_first).map(|(path, _)| path)
    }

    /// Like [`PathTrie::children_under`], yielding the stored values as well
    pub fn entries_under(&self, prefix: &[Selector], stop_at_first: bool) -> ChildrenUnder<'_, V> {
        let stack = match self.root.descend(prefix) {
            Some(node) => vec![(Path::from(prefix), node)],
            None => Vec::new(),
        };
        ChildrenUnder {
            stack,
            stop_at_first,
        }
    }

    /// Recorded paths strictly below `prefix` that are not shadowed by `other`
    ///
    /// A subtree is skipped as soon as `other` records a path strictly below
    /// `prefix` on the way down to it. Providers use this to reach only the
    /// consumers for which they are the closest provider.
    pub fn children_under_excluding<W>(&self, prefix: &[Selector], other: &PathTrie<W>) -> Vec<Path> {
        let mut found = Vec::new();
        let Some(start) = self.root.descend(prefix) else {
            return found;
        };

        let mut stack = vec![(Path::from(prefix), start, other.root.descend(prefix))];
        while let Some((path, node, shadow)) = stack.pop() {
            for (selector, child) in node.children.iter().rev() {
                let shadow_child = shadow.and_then(|shadow| shadow.children.get(selector));
                if shadow_child.map_or(false, |shadow| shadow.value.is_some()) {
                    continue;
                }
                stack.push((path.child(*selector), child, shadow_child));
            }
            if node.value.is_some() && path.depth() > prefix.len() {
                found.push(path);
            }
        }
        found
    }

    /// All recorded paths with their values, in tree order
    pub fn iter(&self) -> ChildrenUnder<'_, V> {
        self.entries_under(&[], false)
    }
}

impl PathTrie<()> {
    /// Record `path` in a presence-only trie
    pub fn add(&mut self, path: &[Selector]) {
        self.insert(path, ());
    }
}

impl FromIterator<Path> for PathTrie<()> {
    fn from_iter<I: IntoIterator<Item = Path>>(iter: I) -> Self {
        let mut trie = PathTrie::new();
        trie.extend(iter);
        trie
    }
}

impl Extend<Path> for PathTrie<()> {
    fn extend<I: IntoIterator<Item = Path>>(&mut self, iter: I) {
        for path in iter {
            self.add(&path);
        }
    }
}

/// Lazy depth-first walk over the recorded paths below a prefix
pub struct ChildrenUnder<'a, V> {
    stack: Vec<(Path, &'a TrieNode<V>)>,
    stop_at_first: bool,
}

impl<'a, V> Iterator for ChildrenUnder<'a, V> {
    type Item = (Path, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((path, node)) = self.stack.pop() {
            if !(self.stop_at_first && node.value.is_some()) {
                for (selector, child) in node.children.iter().rev() {
                    self.stack.push((path.child(*selector), child));
                }
            }
            if let Some(value) = &node.value {
                return Some((path, value));
            }
        }
        None
    }
}
