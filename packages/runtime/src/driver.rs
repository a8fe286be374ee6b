//! Root-level render entry points
//!
//! These are the four operations a host needs to drive a tree without a
//! [`Session`](crate::Session): mount it, render it in full, rerender the
//! paths recorded in the context's dirty set, and tear it down.

use crate::context::RenderContext;
use crate::element::{Element, RenderState};
use crate::error::RenderResult;
use arbor_paths::Path;
use arbor_vdom::VNode;
use tracing::{debug, instrument};

/// Fresh state and placeholder result for a root that has not rendered yet
pub fn init(root: &Element) -> (RenderState, VNode) {
    root.init()
}

#[instrument(skip_all)]
pub fn render(
    ctx: &mut RenderContext,
    root: &Element,
    state: RenderState,
    result: VNode,
) -> RenderResult<(RenderState, VNode)> {
    ctx.at_path(Path::root(), |ctx| root.render(ctx, state, result))
}

/// Re-evaluate every outermost dirty path of `ctx`
///
/// With an empty dirty set the previous result is returned untouched.
#[instrument(skip_all, fields(dirty = ctx.dirty().len()))]
pub fn rerender(
    ctx: &mut RenderContext,
    root: &Element,
    mut state: RenderState,
    mut result: VNode,
) -> RenderResult<(RenderState, VNode)> {
    let paths: Vec<Path> = ctx.dirty.children_under(&[], true).collect();
    for path in paths {
        if !ctx.dirty.contains(&path) {
            continue;
        }
        debug!(path = %path, "rerendering");
        (state, result) = ctx.at_path(Path::root(), |ctx| root.rerender(ctx, &path, state, result))?;
    }
    Ok((state, result))
}

/// Release every hook slot below `root`
#[instrument(skip_all)]
pub fn unmount(root: &Element, state: RenderState, _result: VNode) {
    root.unmount(state);
}
