//! # Arbor Runtime
//!
//! Component evaluation, incremental re-rendering and session driving.
//!
//! ## Purpose
//!
//! - [`Element`]s describe the desired UI. Components are plain functions of a
//!   [`RenderContext`], their props and their children.
//! - Hooks ([`use_state`], [`use_effect`], [`use_future`], [`use_context`], ...)
//!   keep per-instance state in slots that survive re-renders.
//! - State changes record dirty paths; only the components on those paths are
//!   re-evaluated, and the result is diffed into patch [`Action`]s.
//! - [`NodeHandle`]s give handlers and effects a live reference to a rendered
//!   node that follows it across renders.
//!
//! ## Example
//!
//! ```ignore
//! let counter = Component::new("Counter", |ctx, _, _| {
//!     let (count, set_count) = use_state(ctx, || 0)?;
//!     let increment = use_handler(ctx, count, move |_| set_count.set(count + 1))?;
//!     Ok(h("button").with_prop("onclick", increment).with_child(count.to_string()))
//! });
//! let mut session = Session::mount(counter.element(), SessionConfig::default())?;
//! session.dispatch("click", &[0], serde_json::json!({}))?;
//! let actions = session.render_pending()?;
//! ```

pub mod config;
pub mod context;
pub mod driver;
pub mod element;
pub mod error;
pub mod event;
pub mod hooks;
pub mod provider;
pub mod session;
pub mod tracker;

#[cfg(test)]
mod tests_hooks;
#[cfg(test)]
mod tests_rerender;

pub use arbor_vdom::{to_wire, Action, PropValue, Props, VNode, WireNode};
pub use config::{ConfigError, SessionConfig};
pub use context::{Change, ChangeSink, RenderContext};
pub use element::{fragment, h, safe, text, Comparison, Component, Element, RenderState};
pub use error::{RenderError, RenderResult, SessionError, SessionResult};
pub use event::{handler, ref_callback, Event};
pub use hooks::{
    use_effect, use_future, use_handler, use_memo, use_push_url, use_ref, use_replace_url,
    use_set_cookie, use_state, use_unset_cookie, Cleanup, HookArena, Setter,
};
pub use provider::{create_context, use_context, Context, ContextRegistry};
pub use session::Session;
pub use tracker::{HandleId, NodeHandle, Tracker, TrackerError, TrackerResult};
