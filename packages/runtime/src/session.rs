//! Session driver
//!
//! ## Purpose
//!
//! A [`Session`] owns one mounted tree and everything that hangs off it: the
//! retained render state, the last result, the change queue, the context
//! registry, the handle tracker, spawned tasks and deferred effects.
//!
//! ## Render cycle
//!
//! 1. Wait for the first queued [`Change`] and drain up to `max_batch` more.
//! 2. Coalesce dirty paths into one trie and split out side-channel messages.
//! 3. Rerender the dirty paths and diff the old result against the new one.
//! 4. Move node handles over to the new result and resolve focus requests.
//! 5. Fire `ref` callbacks, adopt spawned tasks, run effects.
//!
//! Emitted actions are ordered side channel first, then patches, then focus.
//! A render error poisons the session: its state is gone and every further
//! call fails with [`SessionError::Poisoned`].

use crate::config::SessionConfig;
use crate::context::{Change, ChangeSink, Effect, RenderContext};
use crate::driver;
use crate::element::{Element, RenderState};
use crate::error::{SessionError, SessionResult};
use crate::event::{Callback, Event};
use crate::provider::ContextRegistry;
use crate::tracker::{ref_updates, NodeHandle, Tracker};
use arbor_paths::DirtyPaths;
use arbor_vdom::{diff, to_wire, Action, PropValue, VNode};
use futures::future::LocalBoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use std::rc::Rc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, instrument, trace, warn};

pub struct Session {
    root: Element,
    state: Option<RenderState>,
    result: VNode,
    config: SessionConfig,
    sink: ChangeSink,
    changes: UnboundedReceiver<Change>,
    contexts: ContextRegistry,
    tracker: Tracker,
    tasks: FuturesUnordered<LocalBoxFuture<'static, ()>>,
    effects: Vec<Effect>,
    poisoned: bool,
}

/// Flattened path carried in an event's `details.target`
fn target_path(details: &serde_json::Value) -> Option<Vec<usize>> {
    details
        .get("target")?
        .as_array()?
        .iter()
        .map(|index| index.as_u64().map(|index| index as usize))
        .collect()
}

impl Session {
    /// Render `root` for the first time
    #[instrument(skip_all)]
    pub fn mount(root: Element, config: SessionConfig) -> SessionResult<Self> {
        let (sink, changes) = ChangeSink::channel();
        let contexts = ContextRegistry::new();

        let mut ctx = RenderContext::new(DirtyPaths::new(), sink.clone(), contexts.clone());
        let (state, result) = driver::init(&root);
        let (state, result) = driver::render(&mut ctx, &root, state, result)?;
        let (effects, tasks) = ctx.into_deferred();

        let tracker = Tracker::new(result.clone(), sink.clone());
        let mut session = Session {
            root,
            state: Some(state),
            result,
            config,
            sink,
            changes,
            contexts,
            tracker,
            tasks: FuturesUnordered::new(),
            effects: Vec::new(),
            poisoned: false,
        };
        session.settle(None, effects, tasks);

        info!("session mounted");
        Ok(session)
    }

    /// Current rendered tree
    pub fn result(&self) -> &VNode {
        &self.result
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Sender for changes originating outside the tree
    pub fn sink(&self) -> &ChangeSink {
        &self.sink
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Spawned futures that have not completed yet
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Handle for the node at a flattened path of the current result
    pub fn handle_at(&self, path: &[usize]) -> SessionResult<NodeHandle> {
        Ok(self.tracker.handle_at(path)?)
    }

    fn check(&self) -> SessionResult<()> {
        if self.poisoned {
            return Err(SessionError::Poisoned);
        }
        Ok(())
    }

    fn batch_limit(&self) -> usize {
        self.config.max_batch.max(1)
    }

    /// Wait for at least one change, then render everything queued
    ///
    /// Spawned tasks are driven while waiting.
    pub async fn next_render(&mut self) -> SessionResult<Vec<Action>> {
        self.check()?;

        let first = loop {
            tokio::select! {
                change = self.changes.recv() => break change.ok_or(SessionError::Closed)?,
                Some(()) = self.tasks.next(), if !self.tasks.is_empty() => continue,
            }
        };

        let mut changes = vec![first];
        while changes.len() < self.batch_limit() {
            match self.changes.try_recv() {
                Ok(change) => changes.push(change),
                Err(_) => break,
            }
        }
        self.process(changes)
    }

    /// Render whatever is queued without waiting; no actions when idle
    pub fn render_pending(&mut self) -> SessionResult<Vec<Action>> {
        self.check()?;

        let mut changes = Vec::new();
        while changes.len() < self.batch_limit() {
            match self.changes.try_recv() {
                Ok(change) => changes.push(change),
                Err(_) => break,
            }
        }
        if changes.is_empty() {
            return Ok(Vec::new());
        }
        self.process(changes)
    }

    #[instrument(skip_all, fields(changes = changes.len()))]
    fn process(&mut self, changes: Vec<Change>) -> SessionResult<Vec<Action>> {
        let mut dirty = DirtyPaths::new();
        let mut actions = Vec::new();
        let mut focus = Vec::new();

        for change in changes {
            match change {
                Change::Dirty(path) => dirty.add(&path),
                Change::PushUrl(url) => actions.push(Action::PushUrl(url)),
                Change::ReplaceUrl(url) => actions.push(Action::ReplaceUrl(url)),
                Change::SetCookie { key, value } => actions.push(Action::SetCookie { key, value }),
                Change::UnsetCookie(key) => actions.push(Action::UnsetCookie(key)),
                Change::Focus(handle) => focus.push(handle),
            }
        }

        let state = self.state.take().ok_or(SessionError::Poisoned)?;
        let mut ctx = RenderContext::new(dirty, self.sink.clone(), self.contexts.clone());
        let (state, result) = match driver::rerender(&mut ctx, &self.root, state, self.result.clone()) {
            Ok(output) => output,
            Err(render_error) => {
                self.poisoned = true;
                error!(error = %render_error, "render failed, poisoning session");
                return Err(render_error.into());
            }
        };
        self.state = Some(state);
        let previous = std::mem::replace(&mut self.result, result);

        actions.extend(diff(&previous, &self.result));
        self.tracker.update(&self.result);

        for handle in focus {
            match handle.path() {
                Ok(path) => actions.push(Action::Focus { path }),
                Err(error) => debug!(handle = handle.id(), %error, "dropping focus request"),
            }
        }

        let (effects, tasks) = ctx.into_deferred();
        self.settle(Some(previous), effects, tasks);

        if self.config.log_patches {
            match to_wire(&actions) {
                Ok(wire) => trace!(%wire, "emitting patches"),
                Err(error) => warn!(%error, "could not serialize patches"),
            }
        }
        debug!(actions = actions.len(), "render cycle complete");
        Ok(actions)
    }

    /// Post-diff work of a cycle: ref callbacks, tasks, effects
    fn settle(
        &mut self,
        previous: Option<VNode>,
        effects: Vec<Effect>,
        tasks: Vec<LocalBoxFuture<'static, ()>>,
    ) {
        for update in ref_updates(previous.as_ref(), Some(&self.result)) {
            let handle = update.target.map(|chain| self.tracker.attach(chain));
            (update.callback.0)(handle);
        }

        self.tasks.extend(tasks);
        self.effects.extend(effects);
        if self.config.run_effects {
            self.run_effects();
        }
    }

    /// Run queued effects, returning how many ran
    pub fn run_effects(&mut self) -> usize {
        let effects = std::mem::take(&mut self.effects);
        let count = effects.len();
        for effect in effects {
            effect();
        }
        if count > 0 {
            trace!(count, "ran effects");
        }
        count
    }

    /// Deliver a client event to the `on<event_type>` handler of the node at
    /// `path`
    ///
    /// `details.target`, when present, is the flattened path of the node the
    /// event originated from.
    #[instrument(skip(self, details), fields(event = event_type))]
    pub fn dispatch(
        &mut self,
        event_type: &str,
        path: &[usize],
        details: serde_json::Value,
    ) -> SessionResult<()> {
        self.check()?;

        let current = self.tracker.handle_at(path)?;
        let node = current.resolve()?;
        let key = format!("on{}", event_type);
        let callback = node
            .as_element()
            .and_then(|element| element.props.get(&key))
            .and_then(PropValue::as_handler)
            .and_then(|handler| handler.callback.downcast_ref::<Callback>())
            .cloned()
            .ok_or_else(|| SessionError::MissingHandler {
                event: event_type.to_string(),
                path: path.to_vec(),
            })?;

        let current = Rc::new(current);
        let target = match target_path(&details) {
            Some(target) if target != path => Rc::new(self.tracker.handle_at(&target)?),
            _ => current.clone(),
        };

        let event = Event {
            kind: event_type.to_string(),
            target,
            current_target: current,
            details,
        };
        (callback.0)(&event);
        Ok(())
    }

    /// Tear the tree down, releasing refs and hook slots
    pub fn unmount(mut self) {
        for update in ref_updates(Some(&self.result), None) {
            (update.callback.0)(None);
        }
        if let Some(state) = self.state.take() {
            driver::unmount(&self.root, state, self.result.clone());
        }
        info!(pending_tasks = self.tasks.len(), "session unmounted");
    }
}
