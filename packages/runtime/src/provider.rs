//! Context providers and receivers
//!
//! A provider publishes a value to every descendant component that reads the
//! same [`Context`]. Registrations live in per-context path tries shared by
//! the whole session: providers by the path of the providing component,
//! receivers by the path of the reading component. When a provider's value
//! changes, only the receivers for which it is the closest provider are
//! marked dirty.

use crate::context::RenderContext;
use crate::element::{fragment, Component, Element};
use crate::error::{RenderError, RenderResult};
use crate::hooks::Teardown;
use arbor_paths::{Path, PathTrie};
use arbor_vdom::{Opaque, PropValue, Props};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

static NEXT_CONTEXT: AtomicUsize = AtomicUsize::new(0);

#[derive(Default)]
struct ContextEntry {
    providers: PathTrie<Rc<dyn Any>>,

    /// Number of live receivers registered at each path
    receivers: PathTrie<usize>,
}

/// Provider and receiver registrations of one session
#[derive(Clone, Default)]
pub struct ContextRegistry(Rc<RefCell<HashMap<usize, ContextEntry>>>);

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn value<T: Clone + 'static>(&self, key: usize, path: &Path) -> Option<T> {
        let registry = self.0.borrow();
        let (_, value) = registry.get(&key)?.providers.closest_ancestor(path)?;
        value.downcast_ref::<T>().cloned()
    }

    fn provide(&self, key: usize, path: &Path, value: Rc<dyn Any>) -> Vec<Path> {
        let mut registry = self.0.borrow_mut();
        let entry = registry.entry(key).or_default();
        entry.providers.insert(path, value);
        entry.receivers.children_under_excluding(path, &entry.providers)
    }

    fn withdraw(&self, key: usize, path: &Path) {
        if let Some(entry) = self.0.borrow_mut().get_mut(&key) {
            entry.providers.remove(path);
        }
    }

    fn subscribe(&self, key: usize, path: &Path) {
        let mut registry = self.0.borrow_mut();
        let receivers = &mut registry.entry(key).or_default().receivers;
        match receivers.get_mut(path) {
            Some(count) => *count += 1,
            None => {
                receivers.insert(path, 1);
            }
        }
    }

    fn unsubscribe(&self, key: usize, path: &Path) {
        let mut registry = self.0.borrow_mut();
        let Some(entry) = registry.get_mut(&key) else {
            return;
        };
        let remaining = match entry.receivers.get_mut(path) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => return,
        };
        if remaining == 0 {
            entry.receivers.remove(path);
        }
    }

    /// Number of contexts with at least one registration
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Typed key for a provided value
#[derive(Clone)]
pub struct Context<T> {
    key: usize,
    default: T,
    provider: Component,
}

/// Create a context whose receivers see `default` when no provider is above
/// them
pub fn create_context<T: Clone + PartialEq + 'static>(default: T) -> Context<T> {
    let key = NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed);
    let provider = Component::new("ContextProvider", move |ctx, props, children| {
        render_provider::<T>(ctx, key, props, children)
    });
    Context {
        key,
        default,
        provider,
    }
}

impl<T: Clone + PartialEq + 'static> Context<T> {
    /// Provide `value` to every receiver among `children`
    pub fn provide(&self, value: T, children: impl IntoIterator<Item = Element>) -> Element {
        self.provider
            .element()
            .with_prop("value", PropValue::Any(Opaque::new(value)))
            .with_children(children)
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }
}

struct ProviderSlot {
    key: usize,
    path: Path,
    value: RefCell<Option<Opaque>>,
    registry: ContextRegistry,
}

impl Teardown for ProviderSlot {
    fn teardown(&self) {
        self.registry.withdraw(self.key, &self.path);
    }
}

fn same_value<T: PartialEq + 'static>(previous: &Opaque, next: &Opaque) -> bool {
    if previous.ptr_eq(next) {
        return true;
    }
    match (previous.downcast_ref::<T>(), next.downcast_ref::<T>()) {
        (Some(previous), Some(next)) => previous == next,
        _ => false,
    }
}

fn render_provider<T: PartialEq + 'static>(
    ctx: &mut RenderContext,
    key: usize,
    props: &Props,
    children: &[Element],
) -> RenderResult<Element> {
    let value = match props.get("value") {
        Some(PropValue::Any(value)) => value.clone(),
        _ => return Err(RenderError::component("ContextProvider", "missing value")),
    };

    let path = ctx.path.clone();
    let registry = ctx.contexts.clone();
    let slot = ctx.hook_slot_with_teardown(|| ProviderSlot {
        key,
        path,
        value: RefCell::new(None),
        registry,
    })?;

    let changed = slot
        .value
        .borrow()
        .as_ref()
        .map_or(true, |previous| !same_value::<T>(previous, &value));

    if changed {
        let receivers = ctx.contexts.provide(key, &slot.path, value.as_rc().clone());
        trace!(path = %slot.path, receivers = receivers.len(), "context value changed");
        for receiver in receivers {
            ctx.dirty.add(&receiver);
        }
        *slot.value.borrow_mut() = Some(value);
    }

    Ok(fragment().with_children(children.iter().cloned()))
}

struct ReceiverSlot {
    key: usize,
    path: RefCell<Path>,
    subscribed: Cell<bool>,
    registry: ContextRegistry,
}

impl Teardown for ReceiverSlot {
    fn teardown(&self) {
        if self.subscribed.replace(false) {
            self.registry.unsubscribe(self.key, &self.path.borrow());
        }
    }
}

/// Value of the closest provider of `context` above the calling component
pub fn use_context<T: Clone + 'static>(ctx: &mut RenderContext, context: &Context<T>) -> RenderResult<T> {
    let path = ctx.path.clone();
    let registry = ctx.contexts.clone();
    let slot = ctx.hook_slot_with_teardown(|| ReceiverSlot {
        key: context.key,
        path: RefCell::new(path.clone()),
        subscribed: Cell::new(false),
        registry,
    })?;

    if !slot.subscribed.get() || *slot.path.borrow() != path {
        if slot.subscribed.get() {
            ctx.contexts.unsubscribe(context.key, &slot.path.borrow());
        }
        ctx.contexts.subscribe(context.key, &path);
        *slot.path.borrow_mut() = path.clone();
        slot.subscribed.set(true);
    }

    Ok(ctx
        .contexts
        .value::<T>(context.key, &path)
        .unwrap_or_else(|| context.default.clone()))
}
