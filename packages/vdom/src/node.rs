use crate::text::Text;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

pub type Props = BTreeMap<String, PropValue>;

/// Type-erased value compared by identity
#[derive(Clone)]
pub struct Opaque(Rc<dyn Any>);

impl Opaque {
    pub fn new<T: Any>(value: T) -> Self {
        Opaque(Rc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn as_rc(&self) -> &Rc<dyn Any> {
        &self.0
    }

    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        Rc::as_ptr(&self.0) as *const () == Rc::as_ptr(&other.0) as *const ()
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Event handler property, shipped to the client as a call marker
#[derive(Debug, Clone, PartialEq)]
pub struct EventHandler {
    pub callback: Opaque,
    pub prevent_default: bool,
    pub stop_propagation: bool,
}

impl EventHandler {
    pub fn new(callback: Opaque) -> Self {
        Self {
            callback,
            prevent_default: false,
            stop_propagation: false,
        }
    }

    pub fn prevent_default(mut self) -> Self {
        self.prevent_default = true;
        self
    }

    pub fn stop_propagation(mut self) -> Self {
        self.stop_propagation = true;
        self
    }
}

/// Property value attached to an element
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Str(String),
    Bool(bool),
    Json(serde_json::Value),
    Handler(EventHandler),

    /// Callback receiving a live handle to the element
    Ref(Opaque),

    /// Server-only value, never sent to the client
    Any(Opaque),
}

impl PropValue {
    /// Client-facing string form, `None` when the property is not sent
    pub fn cleaned(&self) -> Option<String> {
        match self {
            PropValue::Str(value) => Some(value.clone()),
            PropValue::Bool(true) => Some(String::new()),
            PropValue::Bool(false) => None,
            PropValue::Json(serde_json::Value::String(value)) => Some(value.clone()),
            PropValue::Json(serde_json::Value::Bool(true)) => Some(String::new()),
            PropValue::Json(serde_json::Value::Bool(false)) => None,
            PropValue::Json(value) => Some(value.to_string()),
            PropValue::Handler(handler) => Some(format!(
                "call(event, {}, {})",
                handler.prevent_default, handler.stop_propagation
            )),
            PropValue::Ref(_) | PropValue::Any(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(value) => Some(value),
            PropValue::Json(serde_json::Value::String(value)) => Some(value),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            PropValue::Handler(handler) => Some(handler),
            _ => None,
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<serde_json::Value> for PropValue {
    fn from(value: serde_json::Value) -> Self {
        PropValue::Json(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(handler: EventHandler) -> Self {
        PropValue::Handler(handler)
    }
}

/// Cleaned client-facing properties; `ref` and unsendable values are dropped
pub fn clean_props(props: &Props) -> BTreeMap<&str, String> {
    props
        .iter()
        .filter(|(key, _)| key.as_str() != "ref")
        .filter_map(|(key, value)| Some((key.as_str(), value.cleaned()?)))
        .collect()
}

/// Map from each child slot of a node to the slot of the previous render it
/// still represents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Correspondence(Vec<Option<usize>>);

impl Correspondence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every slot maps to itself
    pub fn identity(len: usize) -> Self {
        Correspondence((0..len).map(Some).collect())
    }

    pub fn get(&self, slot: usize) -> Option<usize> {
        self.0.get(slot).copied().flatten()
    }

    pub fn set(&mut self, slot: usize, previous: Option<usize>) {
        if self.0.len() <= slot {
            self.0.resize(slot + 1, None);
        }
        self.0[slot] = previous;
    }

    /// Current slot representing `previous`, if any
    pub fn position(&self, previous: usize) -> Option<usize> {
        self.0.iter().position(|slot| *slot == Some(previous))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Option<usize>>> for Correspondence {
    fn from(slots: Vec<Option<usize>>) -> Self {
        Correspondence(slots)
    }
}

impl FromIterator<Option<usize>> for Correspondence {
    fn from_iter<I: IntoIterator<Item = Option<usize>>>(iter: I) -> Self {
        Correspondence(iter.into_iter().collect())
    }
}

/// Rendered element; `tag: None` is a fragment
#[derive(Debug, Clone, Default)]
pub struct VElement {
    pub tag: Option<String>,
    pub props: Props,
    pub mapping: Correspondence,
    pub children: Vec<VNode>,
}

impl VElement {
    pub fn is_fragment(&self) -> bool {
        self.tag.is_none()
    }
}

/// Equality ignores the correspondence map
impl PartialEq for VElement {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.props == other.props && self.children == other.children
    }
}

/// Rendered output node
#[derive(Debug, Clone)]
pub enum VNode {
    Element(Rc<VElement>),
    Text(Text),
}

impl VNode {
    pub fn element(tag: impl Into<String>) -> Self {
        VNode::Element(Rc::new(VElement {
            tag: Some(tag.into()),
            ..VElement::default()
        }))
    }

    pub fn fragment() -> Self {
        VNode::Element(Rc::new(VElement::default()))
    }

    pub fn text(text: impl Into<String>) -> Self {
        VNode::Text(Text::Raw(text.into()))
    }

    pub fn safe(markup: impl Into<String>) -> Self {
        VNode::Text(Text::Safe(markup.into()))
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        if let VNode::Element(element) = &mut self {
            Rc::make_mut(element).props.insert(key.into(), value.into());
        }
        self
    }

    pub fn with_child(mut self, child: impl Into<VNode>) -> Self {
        if let VNode::Element(element) = &mut self {
            Rc::make_mut(element).children.push(child.into());
        }
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = VNode>) -> Self {
        if let VNode::Element(element) = &mut self {
            Rc::make_mut(element).children.extend(children);
        }
        self
    }

    pub fn with_mapping(mut self, mapping: impl Into<Correspondence>) -> Self {
        if let VNode::Element(element) = &mut self {
            Rc::make_mut(element).mapping = mapping.into();
        }
        self
    }

    pub fn as_element(&self) -> Option<&Rc<VElement>> {
        match self {
            VNode::Element(element) => Some(element),
            VNode::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match self {
            VNode::Text(text) => Some(text),
            VNode::Element(_) => None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        self.as_element()?.tag.as_deref()
    }

    pub fn is_fragment(&self) -> bool {
        self.as_element().map_or(false, |element| element.is_fragment())
    }

    /// True if both are the same element allocation
    pub fn same_ref(&self, other: &VNode) -> bool {
        match (self, other) {
            (VNode::Element(a), VNode::Element(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for VNode {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (VNode::Element(a), VNode::Element(b)) => Rc::ptr_eq(a, b) || a == b,
            (VNode::Text(a), VNode::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Text> for VNode {
    fn from(text: Text) -> Self {
        VNode::Text(text)
    }
}

impl From<&str> for VNode {
    fn from(text: &str) -> Self {
        VNode::text(text)
    }
}

impl From<String> for VNode {
    fn from(text: String) -> Self {
        VNode::text(text)
    }
}

impl From<VElement> for VNode {
    fn from(element: VElement) -> Self {
        VNode::Element(Rc::new(element))
    }
}
