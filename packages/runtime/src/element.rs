//! Element model
//!
//! ## Purpose
//!
//! An [`Element`] is an immutable description of desired output, rebuilt on
//! every render. Reconciliation pairs each new element with the one rendered
//! at the same position last time and decides, through [`Element::compare`],
//! whether to tear the old subtree down, re-evaluate it with its retained
//! [`RenderState`], or reuse its result outright.
//!
//! ## Contract
//!
//! - `init` creates fresh state and a placeholder result, once per mount.
//! - `render` re-evaluates fully against the previous state and result.
//! - `rerender` follows a dirty path down through `extract`/`insert` and
//!   renders only the element at its end.
//! - `unmount` releases hook slots, children before their parents.

use crate::context::RenderContext;
use crate::error::{RenderError, RenderResult};
use crate::hooks::{HookArena, HookCursor};
use arbor_paths::{Path, Selector};
use arbor_vdom::{Correspondence, PropValue, Props, Text, VElement, VNode};
use std::fmt;
use std::rc::Rc;
use tracing::{trace, warn};

type RenderFn = dyn Fn(&mut RenderContext, &Props, &[Element]) -> RenderResult<Element>;

/// A component function, compared by identity
#[derive(Clone)]
pub struct Component {
    name: Rc<str>,
    render: Rc<RenderFn>,
}

impl Component {
    pub fn new<F>(name: &str, render: F) -> Self
    where
        F: Fn(&mut RenderContext, &Props, &[Element]) -> RenderResult<Element> + 'static,
    {
        Self {
            name: Rc::from(name),
            render: Rc::new(render),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// An element invoking this component with no props or children
    pub fn element(&self) -> Element {
        Element::Component(Rc::new(ComponentElement {
            component: self.clone(),
            props: Props::new(),
            children: Vec::new(),
        }))
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        Rc::as_ptr(&self.render) as *const () == Rc::as_ptr(&other.render) as *const ()
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.name)
    }
}

/// Host element; `tag: None` is a fragment
#[derive(Debug, Clone, PartialEq)]
pub struct HostElement {
    pub tag: Option<String>,
    pub props: Props,
    pub children: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentElement {
    pub component: Component,
    pub props: Props,
    pub children: Vec<Element>,
}

#[derive(Debug, Clone)]
pub enum Element {
    Host(Rc<HostElement>),
    Component(Rc<ComponentElement>),
    Text(Text),
}

/// Host element with the given tag
pub fn h(tag: impl Into<String>) -> Element {
    Element::Host(Rc::new(HostElement {
        tag: Some(tag.into()),
        props: Props::new(),
        children: Vec::new(),
    }))
}

pub fn fragment() -> Element {
    Element::Host(Rc::new(HostElement {
        tag: None,
        props: Props::new(),
        children: Vec::new(),
    }))
}

pub fn text(text: impl Into<String>) -> Element {
    Element::Text(Text::Raw(text.into()))
}

/// Pre-escaped markup, emitted verbatim
pub fn safe(markup: impl Into<String>) -> Element {
    Element::Text(Text::Safe(markup.into()))
}

/// Outcome of comparing a new element with the one it replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Incompatible,
    Compatible,
    Equivalent,
}

/// State retained between renders of one element
#[derive(Default)]
pub enum RenderState {
    Host(Vec<(Element, RenderState)>),
    Component(ComponentState),
    #[default]
    Leaf,
}

#[derive(Default)]
pub struct ComponentState {
    hooks: Option<HookArena>,
    rendered: Option<Element>,
    state: Box<RenderState>,
}

/// An element together with its retained state and result
pub(crate) struct Mounted {
    pub(crate) element: Element,
    pub(crate) state: RenderState,
    pub(crate) result: VNode,
}

impl Element {
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        match &mut self {
            Element::Host(host) => {
                Rc::make_mut(host).props.insert(key.into(), value.into());
            }
            Element::Component(component) => {
                Rc::make_mut(component).props.insert(key.into(), value.into());
            }
            Element::Text(_) => {}
        }
        self
    }

    pub fn with_child(self, child: impl Into<Element>) -> Self {
        self.with_children([child.into()])
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        match &mut self {
            Element::Host(host) => Rc::make_mut(host).children.extend(children),
            Element::Component(component) => Rc::make_mut(component).children.extend(children),
            Element::Text(_) => {}
        }
        self
    }

    pub fn compare(&self, previous: Option<&Element>) -> Comparison {
        match (self, previous) {
            (_, None) => Comparison::Incompatible,
            (next, Some(previous)) if next == previous => Comparison::Equivalent,
            (Element::Host(next), Some(Element::Host(previous))) if next.tag == previous.tag => {
                Comparison::Compatible
            }
            (Element::Component(next), Some(Element::Component(previous)))
                if next.component == previous.component =>
            {
                Comparison::Compatible
            }
            _ => Comparison::Incompatible,
        }
    }

    /// Fresh state and placeholder result for a newly mounted element
    pub fn init(&self) -> (RenderState, VNode) {
        match self {
            Element::Host(host) => (
                RenderState::Host(Vec::new()),
                VNode::from(VElement {
                    tag: host.tag.clone(),
                    props: host.props.clone(),
                    ..VElement::default()
                }),
            ),
            Element::Component(_) => (
                RenderState::Component(ComponentState::default()),
                VNode::fragment(),
            ),
            Element::Text(text) => (RenderState::Leaf, VNode::Text(text.clone())),
        }
    }

    pub fn render(
        &self,
        ctx: &mut RenderContext,
        state: RenderState,
        result: VNode,
    ) -> RenderResult<(RenderState, VNode)> {
        match self {
            Element::Host(host) => render_host(ctx, host, state, &result),
            Element::Component(component) => render_component(ctx, component, state, result),
            Element::Text(text) => Ok((RenderState::Leaf, VNode::Text(text.clone()))),
        }
    }

    /// Re-evaluate only the element at `path` below this one
    pub fn rerender(
        &self,
        ctx: &mut RenderContext,
        path: &[Selector],
        mut state: RenderState,
        result: VNode,
    ) -> RenderResult<(RenderState, VNode)> {
        let Some((head, tail)) = path.split_first() else {
            return self.render(ctx, state, result);
        };

        let child = match self.extract(&mut state, &result, *head) {
            Ok(child) => child,
            Err(error) => {
                warn!(path = %ctx.path, %error, "dropping stale dirty path");
                return Ok((state, result));
            }
        };

        let (child_state, child_result) = ctx.descend(*head, |ctx| {
            child.element.rerender(ctx, tail, child.state, child.result)
        })?;
        let result = self.insert(&mut state, result, *head, child_state, child_result);
        Ok((state, result))
    }

    /// Release the subtree's hook slots
    pub fn unmount(&self, state: RenderState) {
        match state {
            RenderState::Host(children) => {
                for (child, state) in children {
                    child.unmount(state);
                }
            }
            RenderState::Component(component) => {
                if let Some(rendered) = &component.rendered {
                    rendered.unmount(*component.state);
                }
                if let Some(hooks) = &component.hooks {
                    hooks.unmount();
                }
            }
            RenderState::Leaf => {}
        }
    }

    /// Take the child addressed by `selector` out of `state`
    pub(crate) fn extract(
        &self,
        state: &mut RenderState,
        result: &VNode,
        selector: Selector,
    ) -> RenderResult<Mounted> {
        let invalid = || RenderError::InvalidPath(selector.to_string());

        match (state, selector) {
            (RenderState::Host(children), Selector::Index(slot)) => {
                let child_result = result
                    .as_element()
                    .and_then(|element| element.children.get(slot))
                    .cloned()
                    .ok_or_else(invalid)?;
                let (element, child_state) = children.get_mut(slot).ok_or_else(invalid)?;
                Ok(Mounted {
                    element: element.clone(),
                    state: std::mem::take(child_state),
                    result: child_result,
                })
            }
            (RenderState::Component(component), Selector::Render) => {
                let element = component.rendered.clone().ok_or_else(invalid)?;
                Ok(Mounted {
                    element,
                    state: std::mem::take(&mut *component.state),
                    result: result.clone(),
                })
            }
            _ => Err(invalid()),
        }
    }

    /// Put a rerendered child back, returning the updated result
    pub(crate) fn insert(
        &self,
        state: &mut RenderState,
        result: VNode,
        selector: Selector,
        child_state: RenderState,
        child_result: VNode,
    ) -> VNode {
        match (state, selector) {
            (RenderState::Host(children), Selector::Index(slot)) => {
                if let Some(entry) = children.get_mut(slot) {
                    entry.1 = child_state;
                }

                let VNode::Element(parent) = &result else {
                    return result;
                };
                let unchanged = parent.children.get(slot).map_or(true, |previous| {
                    previous.same_ref(&child_result)
                        || (previous.as_text().is_some() && *previous == child_result)
                });
                if unchanged {
                    return result;
                }

                let mut children = parent.children.clone();
                children[slot] = child_result;
                let mapping = children
                    .iter()
                    .enumerate()
                    .map(|(index, child)| child.as_element().map(|_| index))
                    .collect();

                VNode::from(VElement {
                    tag: parent.tag.clone(),
                    props: parent.props.clone(),
                    mapping,
                    children,
                })
            }
            (RenderState::Component(component), Selector::Render) => {
                *component.state = child_state;
                child_result
            }
            _ => result,
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Element::Host(a), Element::Host(b)) => Rc::ptr_eq(a, b) || a == b,
            (Element::Component(a), Element::Component(b)) => Rc::ptr_eq(a, b) || a == b,
            (Element::Text(a), Element::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        text(value)
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        text(value)
    }
}

impl From<Text> for Element {
    fn from(value: Text) -> Self {
        Element::Text(value)
    }
}

impl From<&Component> for Element {
    fn from(component: &Component) -> Self {
        component.element()
    }
}

/// Pair `next` with what was previously mounted in its position and bring it
/// up to date
///
/// Returns the element to retain, its state and result, and whether the
/// previous result still describes the same node.
pub(crate) fn reconcile(
    ctx: &mut RenderContext,
    next: &Element,
    prior: Option<Mounted>,
    selector: Selector,
) -> RenderResult<(Element, RenderState, VNode, bool)> {
    let path = ctx.path.child(selector);
    let comparison = next.compare(prior.as_ref().map(|prior| &prior.element));

    match (comparison, prior) {
        (Comparison::Equivalent, Some(prior)) if !ctx.dirty.contains(&path) => {
            let Mounted {
                element,
                mut state,
                mut result,
            } = prior;

            let nested: Vec<Path> = ctx.dirty.children_under(&path, true).collect();
            for subpath in nested {
                // An earlier rerender in this loop may have pruned it
                if !ctx.dirty.contains(&subpath) {
                    continue;
                }
                let tail = subpath[path.depth()..].to_vec();
                (state, result) =
                    ctx.descend(selector, |ctx| element.rerender(ctx, &tail, state, result))?;
            }
            Ok((element, state, result, true))
        }
        (Comparison::Incompatible, prior) | (_, prior @ None) => {
            if let Some(prior) = prior {
                trace!(path = %path, "replacing incompatible element");
                prior.element.unmount(prior.state);
            }
            ctx.dirty.prune(&path);

            let (state, result) = next.init();
            let (state, result) = ctx.descend(selector, |ctx| next.render(ctx, state, result))?;
            Ok((next.clone(), state, result, false))
        }
        (_, Some(prior)) => {
            let (state, result) =
                ctx.descend(selector, |ctx| next.render(ctx, prior.state, prior.result))?;
            Ok((next.clone(), state, result, true))
        }
    }
}

fn render_host(
    ctx: &mut RenderContext,
    host: &HostElement,
    state: RenderState,
    result: &VNode,
) -> RenderResult<(RenderState, VNode)> {
    if host.tag.is_none() && !host.props.is_empty() {
        return Err(RenderError::FragmentProps);
    }

    let previous_results: &[VNode] = match result {
        VNode::Element(element) => &element.children,
        VNode::Text(_) => &[],
    };
    let mut previous = match state {
        RenderState::Host(children) => children,
        _ => Vec::new(),
    }
    .into_iter();

    let mut children_state = Vec::with_capacity(host.children.len());
    let mut children = Vec::with_capacity(host.children.len());
    let mut mapping = Correspondence::new();

    for (slot, child) in host.children.iter().enumerate() {
        let prior = previous.next().map(|(element, state)| Mounted {
            element,
            state,
            result: previous_results.get(slot).cloned().unwrap_or_else(VNode::fragment),
        });

        let (element, state, node, retained) = reconcile(ctx, child, prior, Selector::Index(slot))?;
        if retained && node.as_element().is_some() {
            mapping.set(slot, Some(slot));
        }
        children_state.push((element, state));
        children.push(node);
    }

    for (offset, (element, state)) in previous.enumerate() {
        let slot = host.children.len() + offset;
        element.unmount(state);
        ctx.dirty.prune(&ctx.path.child(Selector::Index(slot)));
    }

    let node = VNode::from(VElement {
        tag: host.tag.clone(),
        props: host.props.clone(),
        mapping,
        children,
    });
    Ok((RenderState::Host(children_state), node))
}

fn render_component(
    ctx: &mut RenderContext,
    element: &ComponentElement,
    state: RenderState,
    result: VNode,
) -> RenderResult<(RenderState, VNode)> {
    let component = &element.component;
    let ComponentState {
        hooks,
        rendered,
        state: inner,
    } = match state {
        RenderState::Component(state) => state,
        _ => ComponentState::default(),
    };

    trace!(component = component.name(), path = %ctx.path, "rendering component");

    let saved = ctx.hooks.replace(HookCursor::new(component.name(), hooks));
    let produced = (component.render)(ctx, &element.props, &element.children);
    let cursor = std::mem::replace(&mut ctx.hooks, saved);

    let produced = produced?;
    let hooks = match cursor {
        Some(cursor) => cursor.finish()?,
        None => HookArena::default(),
    };

    let prior = rendered.map(|element| Mounted {
        element,
        state: *inner,
        result,
    });
    let (rendered, state, result, _) = reconcile(ctx, &produced, prior, Selector::Render)?;

    Ok((
        RenderState::Component(ComponentState {
            hooks: Some(hooks),
            rendered: Some(rendered),
            state: Box::new(state),
        }),
        result,
    ))
}
