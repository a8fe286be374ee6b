//! # Arbor Paths
//!
//! Element-tree addressing and the prefix tree used to track dirty locations.
//!
//! A [`Path`] leads from the root of an element tree to one element. Each step
//! is a [`Selector`]: either the nth child of a host element or the sub-element
//! a component rendered. The same structure addresses render state, so a
//! recorded path can be replayed later to re-evaluate exactly one component.
//!
//! [`PathTrie`] stores paths keyed by their selectors. The render driver uses a
//! presence-only trie ([`DirtyPaths`]) to collect the components whose state
//! changed between two render passes; context providers use a valued trie to
//! find the nearest provider above a consumer.

mod path;
mod trie;

pub use path::{Path, Selector};
pub use trie::{ChildrenUnder, PathTrie};

/// Presence-only trie of element locations that must be re-evaluated.
pub type DirtyPaths = PathTrie<()>;
