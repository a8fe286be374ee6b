//! Error types for rendering and session driving

use crate::tracker::TrackerError;
use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;
pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("component `{component}` used {used} hook slots, previous render used {expected}")]
    HookCountMismatch {
        component: String,
        expected: usize,
        used: usize,
    },

    #[error("component `{component}` changed the type of hook slot {slot}")]
    HookTypeMismatch { component: String, slot: usize },

    #[error("fragment cannot have props")]
    FragmentProps,

    #[error("no child at {0} to rerender")]
    InvalidPath(String),

    #[error("component `{component}` failed: {message}")]
    Component { component: String, message: String },
}

impl RenderError {
    /// Error raised by a component's own logic
    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        RenderError::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Node handle error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("No `{event}` handler at {path:?}")]
    MissingHandler { event: String, path: Vec<usize> },

    #[error("Change channel closed")]
    Closed,

    #[error("Session failed in an earlier render")]
    Poisoned,
}
