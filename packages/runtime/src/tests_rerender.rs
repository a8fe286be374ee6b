use crate::context::{Change, ChangeSink, RenderContext};
use crate::driver;
use crate::element::{h, text, Component, Element, RenderState};
use crate::hooks::{use_state, Setter};
use crate::provider::ContextRegistry;
use arbor_paths::DirtyPaths;
use arbor_vdom::{diff, Action, PropValue, VNode};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use tokio::sync::mpsc::UnboundedReceiver;

type Setters = Rc<RefCell<BTreeMap<String, Setter<String>>>>;

#[derive(Default, Clone)]
struct Counts {
    items: Rc<Cell<usize>>,
    lists: Rc<Cell<usize>>,
}

/// Three stateful items; `initial` overrides the starting label of an item
fn app(setters: &Setters, counts: &Counts, initial: &[(&str, &str)]) -> Element {
    let initial: BTreeMap<String, String> = initial
        .iter()
        .map(|(id, label)| (id.to_string(), label.to_string()))
        .collect();

    let item = {
        let setters = setters.clone();
        let renders = counts.items.clone();
        Component::new("Item", move |ctx, props, _| {
            renders.set(renders.get() + 1);
            let id = props.get("id").and_then(PropValue::as_str).unwrap_or_default().to_string();
            let (label, set_label) =
                use_state(ctx, || initial.get(&id).cloned().unwrap_or_else(|| id.clone()))?;
            setters.borrow_mut().insert(id, set_label);
            Ok(h("li").with_child(label))
        })
    };

    let renders = counts.lists.clone();
    let list = Component::new("List", move |_, _, _| {
        renders.set(renders.get() + 1);
        Ok(h("ul")
            .with_children(["a", "b", "c"].map(|id| item.element().with_prop("id", id)))
            .with_child(text("footer")))
    });

    h("main")
        .with_child(h("h1").with_child("title"))
        .with_child(list.element())
}

struct Harness {
    root: Element,
    state: Option<RenderState>,
    result: VNode,
    sink: ChangeSink,
    changes: UnboundedReceiver<Change>,
    contexts: ContextRegistry,
}

impl Harness {
    fn mount(root: Element) -> Self {
        let (sink, changes) = ChangeSink::channel();
        let contexts = ContextRegistry::new();
        let mut ctx = RenderContext::new(DirtyPaths::new(), sink.clone(), contexts.clone());
        let (state, result) = driver::init(&root);
        let (state, result) = driver::render(&mut ctx, &root, state, result).unwrap();
        Harness {
            root,
            state: Some(state),
            result,
            sink,
            changes,
            contexts,
        }
    }

    fn context(&mut self) -> RenderContext {
        let mut dirty = DirtyPaths::new();
        while let Ok(change) = self.changes.try_recv() {
            if let Change::Dirty(path) = change {
                dirty.add(&path);
            }
        }
        RenderContext::new(dirty, self.sink.clone(), self.contexts.clone())
    }

    fn rerender(&mut self) {
        let mut ctx = self.context();
        let state = self.state.take().unwrap();
        let (state, result) = driver::rerender(&mut ctx, &self.root, state, self.result.clone()).unwrap();
        self.state = Some(state);
        self.result = result;
    }
}

#[test]
fn test_incremental_matches_full_render() {
    let (setters, counts) = (Setters::default(), Counts::default());
    let mut incremental = Harness::mount(app(&setters, &counts, &[]));
    assert_eq!(counts.items.get(), 3);

    setters.borrow()["b"].set("B!".to_string());
    setters.borrow()["c"].set("C!".to_string());
    incremental.rerender();

    let full = Harness::mount(app(&Setters::default(), &Counts::default(), &[("b", "B!"), ("c", "C!")]));
    assert_eq!(incremental.result, full.result);
    assert_eq!(counts.items.get(), 5);
    assert_eq!(counts.lists.get(), 1);
}

#[test]
fn test_incremental_patch_is_minimal() {
    let (setters, counts) = (Setters::default(), Counts::default());
    let mut harness = Harness::mount(app(&setters, &counts, &[]));
    let before = harness.result.clone();

    setters.borrow()["b"].set("B!".to_string());
    harness.rerender();

    let heading = |node: &VNode| node.as_element().unwrap().children[0].clone();
    assert!(heading(&before).same_ref(&heading(&harness.result)));
    assert_eq!(
        diff(&before, &harness.result),
        vec![Action::Replace {
            path: vec![0, 1, 1, 0],
            node: VNode::text("B!"),
        }]
    );
}

#[test]
fn test_empty_dirty_set_reuses_result() {
    let (setters, counts) = (Setters::default(), Counts::default());
    let mut harness = Harness::mount(app(&setters, &counts, &[]));
    let before = harness.result.clone();

    harness.rerender();

    assert!(before.same_ref(&harness.result));
    assert!(diff(&before, &harness.result).is_empty());
    assert_eq!(counts.items.get(), 3);
}

#[test]
fn test_dirty_ancestor_covers_descendants() {
    let child_renders = Rc::new(Cell::new(0));
    let parent_setter: Rc<RefCell<Option<Setter<u32>>>> = Rc::default();
    let child_setter: Rc<RefCell<Option<Setter<u32>>>> = Rc::default();

    let child = {
        let renders = child_renders.clone();
        let slot = child_setter.clone();
        Component::new("Child", move |ctx, _, _| {
            renders.set(renders.get() + 1);
            let (value, set_value) = use_state(ctx, || 0u32)?;
            *slot.borrow_mut() = Some(set_value);
            Ok(h("span").with_child(value.to_string()))
        })
    };
    let parent = {
        let slot = parent_setter.clone();
        Component::new("Parent", move |ctx, _, _| {
            let (value, set_value) = use_state(ctx, || 0u32)?;
            *slot.borrow_mut() = Some(set_value);
            Ok(h("div").with_child(value.to_string()).with_child(child.element()))
        })
    };

    let mut harness = Harness::mount(parent.element());
    child_setter.borrow().as_ref().unwrap().set(7);
    parent_setter.borrow().as_ref().unwrap().set(1);
    harness.rerender();

    assert_eq!(child_renders.get(), 2);
    let expected = VNode::element("div")
        .with_child("1")
        .with_child(VNode::element("span").with_child("7"));
    assert_eq!(harness.result, expected);
}
