//! Per-pass render context and the change channel
//!
//! Every `render`/`rerender` call receives a [`RenderContext`] explicitly.
//! It carries the path of the element being rendered, the dirty set being
//! reconciled, the hook cursor of the component currently executing, and the
//! queues of work deferred until the pass has been diffed.
//!
//! State setters and side-channel emitters never touch the tree directly; they
//! send a [`Change`] through a [`ChangeSink`] and the session picks it up on
//! the next scheduling opportunity.

use crate::hooks::HookCursor;
use crate::provider::ContextRegistry;
use crate::tracker::NodeHandle;
use arbor_paths::{DirtyPaths, Path, Selector};
use futures::future::LocalBoxFuture;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

/// Deferred side effect, run after the pass that queued it was diffed
pub type Effect = Box<dyn FnOnce()>;

/// Message from a hook, handler or handle to the session
pub enum Change {
    /// The component at this path must be re-evaluated
    Dirty(Path),
    PushUrl(String),
    ReplaceUrl(String),
    SetCookie { key: String, value: String },
    UnsetCookie(String),
    Focus(NodeHandle),
}

impl std::fmt::Debug for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Change::Dirty(path) => write!(f, "Dirty({})", path),
            Change::PushUrl(url) => write!(f, "PushUrl({:?})", url),
            Change::ReplaceUrl(url) => write!(f, "ReplaceUrl({:?})", url),
            Change::SetCookie { key, .. } => write!(f, "SetCookie({:?})", key),
            Change::UnsetCookie(key) => write!(f, "UnsetCookie({:?})", key),
            Change::Focus(handle) => write!(f, "Focus(#{})", handle.id()),
        }
    }
}

/// Sending half of a session's change queue
#[derive(Clone)]
pub struct ChangeSink {
    sender: UnboundedSender<Change>,
}

impl ChangeSink {
    pub fn channel() -> (ChangeSink, UnboundedReceiver<Change>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (ChangeSink { sender }, receiver)
    }

    pub fn send(&self, change: Change) {
        if let Err(error) = self.sender.send(change) {
            trace!(change = ?error.0, "session gone, dropping change");
        }
    }

    pub fn mark_dirty(&self, path: Path) {
        self.send(Change::Dirty(path));
    }

    pub fn push_url(&self, url: impl Into<String>) {
        self.send(Change::PushUrl(url.into()));
    }

    pub fn replace_url(&self, url: impl Into<String>) {
        self.send(Change::ReplaceUrl(url.into()));
    }

    pub fn set_cookie(&self, key: impl Into<String>, value: impl Into<String>) {
        self.send(Change::SetCookie {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn unset_cookie(&self, key: impl Into<String>) {
        self.send(Change::UnsetCookie(key.into()));
    }
}

/// State threaded through one render pass
pub struct RenderContext {
    pub(crate) path: Path,
    pub(crate) dirty: DirtyPaths,
    pub(crate) sink: ChangeSink,
    pub(crate) contexts: ContextRegistry,
    pub(crate) hooks: Option<HookCursor>,
    effects: Vec<Effect>,
    tasks: Vec<LocalBoxFuture<'static, ()>>,
}

impl RenderContext {
    pub fn new(dirty: DirtyPaths, sink: ChangeSink, contexts: ContextRegistry) -> Self {
        Self {
            path: Path::root(),
            dirty,
            sink,
            contexts,
            hooks: None,
            effects: Vec::new(),
            tasks: Vec::new(),
        }
    }

    /// Path of the element currently being rendered
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dirty(&self) -> &DirtyPaths {
        &self.dirty
    }

    pub fn sink(&self) -> &ChangeSink {
        &self.sink
    }

    /// Name of the component whose function is executing, if any
    pub fn component(&self) -> Option<&str> {
        self.hooks.as_ref().map(HookCursor::component)
    }

    /// Queue a callback to run once this pass has been diffed
    pub fn defer(&mut self, effect: impl FnOnce() + 'static) {
        self.effects.push(Box::new(effect));
    }

    /// Hand a future to the session's task set
    pub fn spawn(&mut self, task: LocalBoxFuture<'static, ()>) {
        self.tasks.push(task);
    }

    /// Run `f` one level deeper in the tree
    pub(crate) fn descend<T>(&mut self, selector: Selector, f: impl FnOnce(&mut Self) -> T) -> T {
        self.path.push(selector);
        let output = f(self);
        self.path.pop();
        output
    }

    /// Run `f` with the current path replaced by `path`
    pub(crate) fn at_path<T>(&mut self, path: Path, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.path, path);
        let output = f(self);
        self.path = saved;
        output
    }

    /// Deferred work accumulated during the pass
    pub fn into_deferred(self) -> (Vec<Effect>, Vec<LocalBoxFuture<'static, ()>>) {
        (self.effects, self.tasks)
    }
}
