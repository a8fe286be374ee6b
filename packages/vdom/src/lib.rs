//! # Arbor VDOM
//!
//! The concrete output tree produced by rendering, and the machinery that turns
//! two such trees into a patch sequence for a remote display surface.
//!
//! ## Purpose
//!
//! - [`VNode`] is a text leaf or a shared element. Element nodes are reference
//!   counted so a subtree that did not change between two renders is literally
//!   the same allocation, which the differ and the handle tracker recognize.
//! - Each element carries a [`Correspondence`] recording, for every child slot,
//!   which slot of the previous render it still represents.
//! - The flattener inlines fragments and merges adjacent text, producing the
//!   sequence a client actually sees.
//! - The differ walks two flattened sequences and emits [`Action`]s, detecting
//!   moves with a longest-increasing-subsequence pass.

pub mod diff;
pub mod flatten;
pub mod node;
pub mod patch;
pub mod text;

#[cfg(test)]
mod tests_diff;

pub use diff::diff;
pub use flatten::{flatten, flatten_children, flatten_children_pair, flatten_pair, Flat, FlatPair};
pub use node::{clean_props, Correspondence, EventHandler, Opaque, PropValue, Props, VElement, VNode};
pub use patch::{to_wire, Action, WireNode};
pub use text::Text;
