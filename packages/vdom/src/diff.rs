//! Tree diff with move detection
//!
//! Each level is diffed on flattened sequences. Matched nodes come from the
//! correspondence maps (elements) and from content equality (text). The nodes
//! forming a longest increasing run of old indices stay where they are; every
//! other matched node is moved exactly once.
//!
//! While walking the new sequence the live client sequence is modelled as two
//! regions: a settled prefix of length `index`, followed by the old nodes from
//! `cursor` onward that have not yet been pulled forward. Every emitted action
//! is expressed against that live sequence.

use crate::flatten::{flatten_children_pair, flatten_pair, FlatPair};
use crate::node::{clean_props, Props, VNode};
use crate::patch::Action;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use tracing::{debug, instrument, trace};

/// Patch actions turning `old` into `new`
#[instrument(skip_all)]
pub fn diff(old: &VNode, new: &VNode) -> Vec<Action> {
    let mut actions = Vec::new();
    if old.same_ref(new) {
        return actions;
    }

    let mut pair = flatten_pair(Some(old), new);
    pair.match_text();
    diff_sequence(&pair, &[], &mut actions);

    debug!(actions = actions.len(), "diff complete");
    actions
}

/// Marks the new indices whose old indices form a longest increasing run
fn stable_set(mapping: &[Option<usize>]) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut tail_old: Vec<usize> = Vec::new();
    let mut previous = vec![None; mapping.len()];

    for (new_index, old_index) in mapping.iter().enumerate() {
        let Some(old_index) = *old_index else { continue };
        let at = tail_old.partition_point(|&tail| tail < old_index);
        if at > 0 {
            previous[new_index] = Some(tails[at - 1]);
        }
        if at == tails.len() {
            tails.push(new_index);
            tail_old.push(old_index);
        } else {
            tails[at] = new_index;
            tail_old[at] = old_index;
        }
    }

    let mut stable = vec![false; mapping.len()];
    let mut next = tails.last().copied();
    while let Some(new_index) = next {
        stable[new_index] = true;
        next = previous[new_index];
    }
    stable
}

struct Sequence<'a> {
    pair: &'a FlatPair,
    path: &'a [usize],
    matched: Vec<bool>,
    pulled: Vec<bool>,

    /// Matched old nodes left behind in the settled prefix, by live position
    waiting: HashMap<usize, usize>,
    inserts: VecDeque<usize>,
    index: usize,
    cursor: usize,
}

impl<'a> Sequence<'a> {
    fn new(pair: &'a FlatPair, path: &'a [usize]) -> Self {
        let mut matched = vec![false; pair.old.len()];
        for old_index in pair.mapping.iter().flatten() {
            matched[*old_index] = true;
        }
        Self {
            pair,
            path,
            matched,
            pulled: vec![false; pair.old.len()],
            waiting: HashMap::new(),
            inserts: VecDeque::new(),
            index: 0,
            cursor: 0,
        }
    }

    fn slot(&self, index: usize) -> Vec<usize> {
        let mut path = Vec::with_capacity(self.path.len() + 1);
        path.extend_from_slice(self.path);
        path.push(index);
        path
    }

    fn skip_pulled(&mut self) {
        while self.cursor < self.pulled.len() && self.pulled[self.cursor] {
            self.cursor += 1;
        }
    }

    /// Whether the head of the unsettled region is an old node nobody claims
    fn head_is_unmatched(&mut self) -> bool {
        self.skip_pulled();
        self.cursor < self.matched.len() && !self.matched[self.cursor]
    }

    /// Drop the unmatched old node at the head, reusing its slot for a queued
    /// insert when there is one
    fn consume_head(&mut self, out: &mut Vec<Action>) {
        self.cursor += 1;
        match self.inserts.pop_front() {
            Some(new_index) => {
                out.push(Action::Replace {
                    path: self.slot(self.index),
                    node: self.pair.new.nodes[new_index].clone(),
                });
                self.index += 1;
            }
            None => out.push(Action::Remove {
                path: self.slot(self.index),
            }),
        }
    }

    fn flush_inserts(&mut self, out: &mut Vec<Action>) {
        while !self.inserts.is_empty() {
            if self.head_is_unmatched() {
                self.consume_head(out);
                continue;
            }
            if let Some(new_index) = self.inserts.pop_front() {
                out.push(Action::Insert {
                    path: self.slot(self.index),
                    node: self.pair.new.nodes[new_index].clone(),
                });
                self.index += 1;
            }
        }
    }

    /// Move the cursor up to a stable old node, parking matched nodes and
    /// consuming unmatched ones on the way
    fn advance_to(&mut self, target: usize, out: &mut Vec<Action>) {
        while self.cursor < target {
            if self.pulled[self.cursor] {
                self.cursor += 1;
            } else if self.matched[self.cursor] {
                self.waiting.insert(self.cursor, self.index);
                self.index += 1;
                self.cursor += 1;
            } else {
                self.consume_head(out);
            }
        }
    }

    fn moved(&self, from: usize, to: usize) -> Action {
        Action::Move {
            path: self.path.to_vec(),
            from,
            to,
        }
    }

    /// Settle a matched node, returning its live position
    fn place(&mut self, new_index: usize, old_index: usize, stable: bool, out: &mut Vec<Action>) -> usize {
        if let Some(from) = self.waiting.remove(&old_index) {
            self.flush_inserts(out);
            let to = self.index - 1;
            if from != to {
                out.push(self.moved(from, to));
            }
            for position in self.waiting.values_mut() {
                if *position > from {
                    *position -= 1;
                }
            }
            trace!(new_index, from, to, "claimed waiting node");
            return to;
        }

        if stable {
            self.advance_to(old_index, out);
            self.flush_inserts(out);
            self.cursor = old_index + 1;
        } else {
            self.flush_inserts(out);
            let ahead = (self.cursor..old_index)
                .filter(|&index| !self.pulled[index])
                .count();
            if ahead == 0 {
                self.cursor = old_index + 1;
            } else {
                out.push(self.moved(self.index + ahead, self.index));
                self.pulled[old_index] = true;
                trace!(new_index, from = self.index + ahead, "pulled node forward");
            }
        }

        self.index += 1;
        self.index - 1
    }

    fn finish(&mut self, out: &mut Vec<Action>) {
        while self.cursor < self.matched.len() {
            if self.pulled[self.cursor] {
                self.cursor += 1;
            } else {
                debug_assert!(!self.matched[self.cursor], "matched node left unsettled");
                self.consume_head(out);
            }
        }
        debug_assert!(self.waiting.is_empty(), "waiting node never claimed");
        self.flush_inserts(out);
    }
}

fn diff_sequence(pair: &FlatPair, path: &[usize], out: &mut Vec<Action>) {
    let stable = stable_set(&pair.mapping);
    let mut sequence = Sequence::new(pair, path);

    for (new_index, old_index) in pair.mapping.iter().enumerate() {
        let Some(old_index) = *old_index else {
            sequence.inserts.push_back(new_index);
            continue;
        };

        let position = sequence.place(new_index, old_index, stable[new_index], out);
        patch_node(
            &pair.old.nodes[old_index],
            &pair.new.nodes[new_index],
            sequence.slot(position),
            out,
        );
    }

    sequence.finish(out);
}

fn patch_node(old: &VNode, new: &VNode, path: Vec<usize>, out: &mut Vec<Action>) {
    match (old, new) {
        (VNode::Element(old_element), VNode::Element(new_element)) => {
            if Rc::ptr_eq(old_element, new_element) {
                return;
            }
            if old_element.tag != new_element.tag {
                out.push(Action::Replace {
                    path,
                    node: new.clone(),
                });
                return;
            }

            diff_props(&old_element.props, &new_element.props, &path, out);

            let mut pair = flatten_children_pair(old_element, new_element);
            pair.match_text();
            diff_sequence(&pair, &path, out);
        }
        (VNode::Text(old_text), VNode::Text(new_text)) if old_text == new_text => {}
        _ => out.push(Action::Replace {
            path,
            node: new.clone(),
        }),
    }
}

fn diff_props(old: &Props, new: &Props, path: &[usize], out: &mut Vec<Action>) {
    let old = clean_props(old);
    let new = clean_props(new);

    for key in old.keys().filter(|key| !new.contains_key(*key)) {
        out.push(Action::Unset {
            path: path.to_vec(),
            key: key.to_string(),
        });
    }

    for (key, value) in &new {
        if old.get(key) != Some(value) {
            out.push(Action::Set {
                path: path.to_vec(),
                key: key.to_string(),
                value: value.clone(),
            });
        }
    }
}
