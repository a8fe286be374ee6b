use crate::config::SessionConfig;
use crate::element::{h, text, Component};
use crate::error::{RenderError, SessionError};
use crate::hooks::{use_effect, use_future, use_memo, use_ref, use_state, Cleanup, Setter};
use crate::provider::{create_context, use_context};
use crate::session::Session;
use arbor_vdom::VNode;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tokio::sync::oneshot;

type Captured<T> = Rc<RefCell<Option<Setter<T>>>>;

fn set<T: 'static>(captured: &Captured<T>, value: T) {
    let setter = captured.borrow().clone();
    setter.expect("component rendered").set(value);
}

fn all_text(node: &VNode) -> String {
    match node {
        VNode::Text(text) => text.as_str().to_string(),
        VNode::Element(element) => element.children.iter().map(all_text).collect(),
    }
}

#[test]
fn test_extra_hook_call_is_fatal() {
    let toggle: Captured<bool> = Rc::default();
    let app = {
        let toggle = toggle.clone();
        Component::new("Flaky", move |ctx, _, _| {
            let (extra, set_extra) = use_state(ctx, || false)?;
            *toggle.borrow_mut() = Some(set_extra);
            if extra {
                use_ref(ctx, || 0u8)?;
            }
            Ok(text("x"))
        })
    };

    let mut session = Session::mount(app.element(), SessionConfig::default()).unwrap();
    set(&toggle, true);

    let error = session.render_pending().unwrap_err();
    assert!(matches!(
        error,
        SessionError::Render(RenderError::HookCountMismatch {
            expected: 1,
            used: 2,
            ..
        })
    ));
    assert!(session.is_poisoned());
    assert!(matches!(session.render_pending(), Err(SessionError::Poisoned)));
}

#[test]
fn test_hook_type_change_is_fatal() {
    let toggle: Captured<bool> = Rc::default();
    let app = {
        let toggle = toggle.clone();
        Component::new("Shifty", move |ctx, _, _| {
            let (flag, set_flag) = use_state(ctx, || false)?;
            *toggle.borrow_mut() = Some(set_flag);
            if flag {
                use_state(ctx, || 0u32)?;
            } else {
                use_ref(ctx, || "label")?;
            }
            Ok(text("x"))
        })
    };

    let mut session = Session::mount(app.element(), SessionConfig::default()).unwrap();
    set(&toggle, true);

    let error = session.render_pending().unwrap_err();
    assert!(matches!(
        error,
        SessionError::Render(RenderError::HookTypeMismatch { slot: 1, .. })
    ));
}

#[test]
fn test_setter_is_inert_after_unmount() {
    let value: Captured<u32> = Rc::default();
    let show: Captured<bool> = Rc::default();

    let child = {
        let value = value.clone();
        Component::new("Child", move |ctx, _, _| {
            let (current, set_current) = use_state(ctx, || 0u32)?;
            *value.borrow_mut() = Some(set_current);
            Ok(text(current.to_string()))
        })
    };
    let parent = {
        let show = show.clone();
        Component::new("Parent", move |ctx, _, _| {
            let (visible, set_visible) = use_state(ctx, || true)?;
            *show.borrow_mut() = Some(set_visible);
            Ok(if visible {
                h("div").with_child(child.element())
            } else {
                h("div").with_child("gone")
            })
        })
    };

    let mut session = Session::mount(parent.element(), SessionConfig::default()).unwrap();
    set(&value, 5);
    assert!(!session.render_pending().unwrap().is_empty());
    assert_eq!(all_text(session.result()), "5");

    let setter = value.borrow().clone().unwrap();
    set(&show, false);
    session.render_pending().unwrap();
    assert_eq!(all_text(session.result()), "gone");
    assert!(!setter.is_mounted());

    setter.set(9);
    assert!(session.render_pending().unwrap().is_empty());
}

fn effect_app(log: &Rc<RefCell<Vec<String>>>, key: &Captured<u32>) -> Component {
    let log = log.clone();
    let key = key.clone();
    Component::new("Effectful", move |ctx, _, _| {
        let (current, set_current) = use_state(ctx, || 0u32)?;
        *key.borrow_mut() = Some(set_current);

        let log = log.clone();
        use_effect(ctx, current, move || {
            log.borrow_mut().push(format!("run {}", current));
            Some(Box::new(move || log.borrow_mut().push(format!("clean {}", current))) as Cleanup)
        })?;
        Ok(text(current.to_string()))
    })
}

#[test]
fn test_effects_run_after_render_and_clean_up() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let key: Captured<u32> = Rc::default();

    let mut session = Session::mount(effect_app(&log, &key).element(), SessionConfig::default()).unwrap();
    assert_eq!(*log.borrow(), vec!["run 0"]);

    set(&key, 1);
    session.render_pending().unwrap();
    set(&key, 1);
    session.render_pending().unwrap();
    assert_eq!(*log.borrow(), vec!["run 0", "clean 0", "run 1"]);

    session.unmount();
    assert_eq!(*log.borrow(), vec!["run 0", "clean 0", "run 1", "clean 1"]);
}

#[test]
fn test_effects_can_be_run_manually() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let key: Captured<u32> = Rc::default();
    let config = SessionConfig {
        run_effects: false,
        ..SessionConfig::default()
    };

    let mut session = Session::mount(effect_app(&log, &key).element(), config).unwrap();
    assert!(log.borrow().is_empty());
    assert_eq!(session.run_effects(), 1);
    assert_eq!(*log.borrow(), vec!["run 0"]);
}

#[test]
fn test_memo_recomputes_on_key_change() {
    let computed = Rc::new(Cell::new(0));
    let key: Captured<u32> = Rc::default();
    let tick: Captured<u32> = Rc::default();

    let app = {
        let (computed, key, tick) = (computed.clone(), key.clone(), tick.clone());
        Component::new("Memo", move |ctx, _, _| {
            let (current, set_current) = use_state(ctx, || 1u32)?;
            let (_, set_tick) = use_state(ctx, || 0u32)?;
            *key.borrow_mut() = Some(set_current);
            *tick.borrow_mut() = Some(set_tick);

            let computed = computed.clone();
            let squared = use_memo(ctx, current, move || {
                computed.set(computed.get() + 1);
                current * current
            })?;
            Ok(text(squared.to_string()))
        })
    };

    let mut session = Session::mount(app.element(), SessionConfig::default()).unwrap();
    set(&tick, 1);
    session.render_pending().unwrap();
    assert_eq!(computed.get(), 1);

    set(&key, 3);
    session.render_pending().unwrap();
    assert_eq!(computed.get(), 2);
    assert_eq!(all_text(session.result()), "9");
}

#[tokio::test]
async fn test_future_results_arrive_and_stale_ones_are_dropped() {
    let senders: Rc<RefCell<Vec<oneshot::Sender<String>>>> = Rc::default();
    let key: Captured<u32> = Rc::default();

    let app = {
        let (senders, key) = (senders.clone(), key.clone());
        Component::new("Loader", move |ctx, _, _| {
            let (current, set_current) = use_state(ctx, || 0u32)?;
            *key.borrow_mut() = Some(set_current);

            let senders = senders.clone();
            let value = use_future(ctx, current, move || {
                let (sender, receiver) = oneshot::channel();
                senders.borrow_mut().push(sender);
                async move { receiver.await.unwrap_or_default() }
            })?;
            Ok(text(value.unwrap_or_else(|| "pending".to_string())))
        })
    };

    let mut session = Session::mount(app.element(), SessionConfig::default()).unwrap();
    assert_eq!(all_text(session.result()), "pending");

    set(&key, 1);
    session.render_pending().unwrap();
    assert_eq!(senders.borrow().len(), 2);

    let mut pending: Vec<_> = senders.borrow_mut().drain(..).collect();
    let fresh = pending.pop().unwrap();
    let stale = pending.pop().unwrap();
    stale.send("stale".to_string()).unwrap();
    fresh.send("fresh".to_string()).unwrap();

    session.next_render().await.unwrap();
    assert_eq!(all_text(session.result()), "fresh");
}

#[test]
fn test_provider_reaches_only_its_receivers() {
    let theme = create_context("light".to_string());
    let label_renders = Rc::new(Cell::new(0));
    let mode: Captured<String> = Rc::default();

    let label = {
        let (theme, renders) = (theme.clone(), label_renders.clone());
        Component::new("Label", move |ctx, _, _| {
            renders.set(renders.get() + 1);
            let value = use_context(ctx, &theme)?;
            Ok(text(format!("[{}]", value)))
        })
    };
    let app = {
        let mode = mode.clone();
        Component::new("App", move |ctx, _, _| {
            let (current, set_current) = use_state(ctx, || "dark".to_string())?;
            *mode.borrow_mut() = Some(set_current);
            Ok(h("div").with_child(label.element()).with_child(theme.provide(
                current,
                [
                    h("p").with_child(label.element()),
                    theme.provide("nested".to_string(), [label.element()]),
                ],
            )))
        })
    };

    let mut session = Session::mount(app.element(), SessionConfig::default()).unwrap();
    assert_eq!(all_text(session.result()), "[light][dark][nested]");
    assert_eq!(label_renders.get(), 3);

    set(&mode, "dim".to_string());
    session.render_pending().unwrap();
    assert_eq!(all_text(session.result()), "[light][dim][nested]");
    assert_eq!(label_renders.get(), 4);
}
