use crate::tracker::NodeHandle;
use arbor_vdom::{EventHandler, Opaque, PropValue};
use std::rc::Rc;

/// Event delivered to an `on<kind>` handler
pub struct Event {
    pub kind: String,

    /// Node the event originated from
    pub target: Rc<NodeHandle>,

    /// Node whose handler is running
    pub current_target: Rc<NodeHandle>,

    /// Remaining client-provided fields
    pub details: serde_json::Value,
}

#[derive(Clone)]
pub(crate) struct Callback(pub(crate) Rc<dyn Fn(&Event)>);

/// Wrap a closure as an event handler property
pub fn handler(callback: impl Fn(&Event) + 'static) -> EventHandler {
    EventHandler::new(Opaque::new(Callback(Rc::new(callback))))
}

#[derive(Clone)]
pub(crate) struct RefCallback(pub(crate) Rc<dyn Fn(Option<NodeHandle>)>);

/// `ref` property value
///
/// The callback receives a handle when its element first appears in the
/// output and `None` once the element is gone.
pub fn ref_callback(callback: impl Fn(Option<NodeHandle>) + 'static) -> PropValue {
    PropValue::Ref(Opaque::new(RefCallback(Rc::new(callback))))
}
