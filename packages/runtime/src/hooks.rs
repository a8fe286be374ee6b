//! Hook slots and the hooks built on them
//!
//! A component's hooks live in a [`HookArena`] owned by its render state. The
//! first render records one slot per hook call; every later render replays
//! the slots in the same order. Calling a different number of hooks, or a hook
//! of a different type at the same position, is a fatal [`RenderError`].

use crate::context::{ChangeSink, RenderContext};
use crate::error::{RenderError, RenderResult};
use crate::event::{handler, Event};
use arbor_paths::Path;
use arbor_vdom::EventHandler;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

/// Cleanup callback returned by an effect
pub type Cleanup = Box<dyn FnOnce()>;

/// Slot contents that need to release something when the component unmounts
pub(crate) trait Teardown {
    fn teardown(&self);
}

struct HookSlot {
    value: Rc<dyn Any>,
    teardown: Option<Rc<dyn Teardown>>,
}

/// Hook slots retained by one component instance
#[derive(Default)]
pub struct HookArena {
    slots: Vec<HookSlot>,
}

impl HookArena {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Release every slot, in slot order
    pub(crate) fn unmount(&self) {
        for teardown in self.slots.iter().filter_map(|slot| slot.teardown.as_ref()) {
            teardown.teardown();
        }
    }
}

enum CursorMode {
    Record,
    Replay { next: usize },
}

/// Position in a component's hook arena during one call of its function
pub(crate) struct HookCursor {
    component: String,
    arena: HookArena,
    mode: CursorMode,
}

impl HookCursor {
    pub(crate) fn new(component: &str, arena: Option<HookArena>) -> Self {
        let (arena, mode) = match arena {
            Some(arena) => (arena, CursorMode::Replay { next: 0 }),
            None => (HookArena::default(), CursorMode::Record),
        };
        Self {
            component: component.to_string(),
            arena,
            mode,
        }
    }

    pub(crate) fn component(&self) -> &str {
        &self.component
    }

    fn slot<T: Any>(
        &mut self,
        init: impl FnOnce() -> T,
        teardown: fn(Rc<T>) -> Option<Rc<dyn Teardown>>,
    ) -> RenderResult<Rc<T>> {
        match &mut self.mode {
            CursorMode::Record => {
                let value = Rc::new(init());
                self.arena.slots.push(HookSlot {
                    value: value.clone(),
                    teardown: teardown(value.clone()),
                });
                Ok(value)
            }
            CursorMode::Replay { next } => {
                let index = *next;
                let slot = self.arena.slots.get(index).ok_or_else(|| RenderError::HookCountMismatch {
                    component: self.component.clone(),
                    expected: self.arena.slots.len(),
                    used: index + 1,
                })?;
                *next += 1;
                slot.value
                    .clone()
                    .downcast::<T>()
                    .map_err(|_| RenderError::HookTypeMismatch {
                        component: self.component.clone(),
                        slot: index,
                    })
            }
        }
    }

    /// Close the cursor, checking that a replay consumed every slot
    pub(crate) fn finish(self) -> RenderResult<HookArena> {
        if let CursorMode::Replay { next } = self.mode {
            if next != self.arena.slots.len() {
                return Err(RenderError::HookCountMismatch {
                    component: self.component,
                    expected: self.arena.slots.len(),
                    used: next,
                });
            }
        }
        Ok(self.arena)
    }
}

fn no_teardown<T>(_: Rc<T>) -> Option<Rc<dyn Teardown>> {
    None
}

fn with_teardown<T: Teardown + 'static>(value: Rc<T>) -> Option<Rc<dyn Teardown>> {
    Some(value as Rc<dyn Teardown>)
}

impl RenderContext {
    fn cursor(&mut self) -> RenderResult<&mut HookCursor> {
        self.hooks
            .as_mut()
            .ok_or_else(|| RenderError::component("<none>", "hook called outside a component"))
    }

    pub(crate) fn hook_slot<T: Any>(&mut self, init: impl FnOnce() -> T) -> RenderResult<Rc<T>> {
        self.cursor()?.slot(init, no_teardown::<T>)
    }

    pub(crate) fn hook_slot_with_teardown<T: Teardown + Any>(
        &mut self,
        init: impl FnOnce() -> T,
    ) -> RenderResult<Rc<T>> {
        self.cursor()?.slot(init, with_teardown::<T>)
    }
}

/// Value retained across renders of the calling component
pub fn use_ref<T: 'static>(ctx: &mut RenderContext, init: impl FnOnce() -> T) -> RenderResult<Rc<T>> {
    ctx.hook_slot(init)
}

struct StateSlot<T> {
    value: RefCell<T>,
    path: RefCell<Path>,
    mounted: Cell<bool>,
    sink: ChangeSink,
}

impl<T> Teardown for StateSlot<T> {
    fn teardown(&self) {
        self.mounted.set(false);
    }
}

/// Writes a state slot and schedules the owning component for re-evaluation
///
/// Setters outliving their component are inert.
pub struct Setter<T> {
    slot: Weak<StateSlot<T>>,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T: 'static> Setter<T> {
    pub fn set(&self, value: T) {
        self.update(|_| value);
    }

    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let Some(slot) = self.slot.upgrade().filter(|slot| slot.mounted.get()) else {
            trace!("ignoring state update for unmounted component");
            return;
        };
        let next = f(&slot.value.borrow());
        *slot.value.borrow_mut() = next;
        slot.sink.mark_dirty(slot.path.borrow().clone());
    }

    pub fn is_mounted(&self) -> bool {
        self.slot.upgrade().map_or(false, |slot| slot.mounted.get())
    }
}

/// Component-local state
pub fn use_state<T: Clone + 'static>(
    ctx: &mut RenderContext,
    init: impl FnOnce() -> T,
) -> RenderResult<(T, Setter<T>)> {
    let sink = ctx.sink.clone();
    let path = ctx.path.clone();
    let slot = ctx.hook_slot_with_teardown(|| StateSlot {
        value: RefCell::new(init()),
        path: RefCell::new(path.clone()),
        mounted: Cell::new(true),
        sink,
    })?;
    *slot.path.borrow_mut() = path;

    let value = slot.value.borrow().clone();
    Ok((
        value,
        Setter {
            slot: Rc::downgrade(&slot),
        },
    ))
}

struct MemoSlot<K, T> {
    entry: RefCell<Option<(K, T)>>,
}

/// Recompute `compute` only when `key` changes
pub fn use_memo<K, T>(ctx: &mut RenderContext, key: K, compute: impl FnOnce() -> T) -> RenderResult<T>
where
    K: PartialEq + 'static,
    T: Clone + 'static,
{
    let slot = ctx.hook_slot(|| MemoSlot::<K, T> {
        entry: RefCell::new(None),
    })?;

    let mut entry = slot.entry.borrow_mut();
    if let Some((previous, value)) = &*entry {
        if *previous == key {
            return Ok(value.clone());
        }
    }
    let value = compute();
    *entry = Some((key, value.clone()));
    Ok(value)
}

/// Event handler whose identity only changes with `key`
pub fn use_handler<K: PartialEq + 'static>(
    ctx: &mut RenderContext,
    key: K,
    callback: impl Fn(&Event) + 'static,
) -> RenderResult<EventHandler> {
    use_memo(ctx, key, move || handler(callback))
}

struct EffectSlot<K> {
    key: RefCell<Option<K>>,
    cleanup: RefCell<Option<Cleanup>>,
    mounted: Cell<bool>,
}

impl<K> EffectSlot<K> {
    fn run_cleanup(&self) {
        let cleanup = self.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }
}

impl<K> Teardown for EffectSlot<K> {
    fn teardown(&self) {
        self.mounted.set(false);
        self.run_cleanup();
    }
}

/// Run `effect` after the pass is diffed, whenever `key` changed
///
/// The cleanup returned by the previous run executes first. The last cleanup
/// runs when the component unmounts.
pub fn use_effect<K, F>(ctx: &mut RenderContext, key: K, effect: F) -> RenderResult<()>
where
    K: PartialEq + 'static,
    F: FnOnce() -> Option<Cleanup> + 'static,
{
    let slot = ctx.hook_slot_with_teardown(|| EffectSlot::<K> {
        key: RefCell::new(None),
        cleanup: RefCell::new(None),
        mounted: Cell::new(true),
    })?;

    if slot.key.borrow().as_ref() == Some(&key) {
        return Ok(());
    }
    *slot.key.borrow_mut() = Some(key);

    let slot = Rc::downgrade(&slot);
    ctx.defer(move || {
        let Some(slot) = slot.upgrade().filter(|slot| slot.mounted.get()) else {
            trace!("skipping effect of unmounted component");
            return;
        };
        slot.run_cleanup();
        let cleanup = effect();
        *slot.cleanup.borrow_mut() = cleanup;
    });
    Ok(())
}

struct FutureSlot<K, T> {
    key: RefCell<Option<K>>,
    value: RefCell<Option<T>>,
    generation: Cell<u64>,
    path: RefCell<Path>,
    mounted: Cell<bool>,
    sink: ChangeSink,
}

impl<K, T> Teardown for FutureSlot<K, T> {
    fn teardown(&self) {
        self.mounted.set(false);
        self.generation.set(self.generation.get() + 1);
    }
}

/// Value of a future started whenever `key` changes; `None` while pending
///
/// A completion belonging to a superseded key or an unmounted component is
/// discarded.
pub fn use_future<K, T, F>(
    ctx: &mut RenderContext,
    key: K,
    start: impl FnOnce() -> F,
) -> RenderResult<Option<T>>
where
    K: PartialEq + 'static,
    T: Clone + 'static,
    F: Future<Output = T> + 'static,
{
    let sink = ctx.sink.clone();
    let path = ctx.path.clone();
    let slot = ctx.hook_slot_with_teardown(|| FutureSlot::<K, T> {
        key: RefCell::new(None),
        value: RefCell::new(None),
        generation: Cell::new(0),
        path: RefCell::new(path.clone()),
        mounted: Cell::new(true),
        sink,
    })?;
    *slot.path.borrow_mut() = path;

    if slot.key.borrow().as_ref() != Some(&key) {
        *slot.key.borrow_mut() = Some(key);
        *slot.value.borrow_mut() = None;

        let generation = slot.generation.get() + 1;
        slot.generation.set(generation);

        let future = start();
        let weak = Rc::downgrade(&slot);
        ctx.spawn(Box::pin(async move {
            let output = future.await;
            let Some(slot) = weak.upgrade() else { return };
            if !slot.mounted.get() || slot.generation.get() != generation {
                debug!(generation, "discarding stale future result");
                return;
            }
            *slot.value.borrow_mut() = Some(output);
            slot.sink.mark_dirty(slot.path.borrow().clone());
        }));
    }

    let value = slot.value.borrow().clone();
    Ok(value)
}

/// Emitter for `push_url` navigation messages
pub fn use_push_url(ctx: &RenderContext) -> impl Fn(&str) + Clone + 'static {
    let sink = ctx.sink.clone();
    move |url| sink.push_url(url)
}

/// Emitter for `replace_url` navigation messages
pub fn use_replace_url(ctx: &RenderContext) -> impl Fn(&str) + Clone + 'static {
    let sink = ctx.sink.clone();
    move |url| sink.replace_url(url)
}

pub fn use_set_cookie(ctx: &RenderContext) -> impl Fn(&str, &str) + Clone + 'static {
    let sink = ctx.sink.clone();
    move |key, value| sink.set_cookie(key, value)
}

pub fn use_unset_cookie(ctx: &RenderContext) -> impl Fn(&str) + Clone + 'static {
    let sink = ctx.sink.clone();
    move |key| sink.unset_cookie(key)
}
