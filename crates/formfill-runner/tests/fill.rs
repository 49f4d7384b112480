//! End-to-end behaviour of resolving, filling and picking on parsed pages.

use formfill_runner::{
    resolve, Agent, Command, Document, FailureReason, FieldRule, FieldType, HostEvent, Page,
    Params, Preset, Rect, Reply, Resolution, Response, Runner,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const SIGNUP: &str = include_str!("fixtures/signup.html");

const TWO_FIELDS: &str = r#"<html><body>
<form id="f">
  <input id="a" name="email">
  <input id="b" name="name">
</form>
</body></html>"#;

fn two_field_preset() -> Preset {
    Preset::new("Two fields")
        .field(FieldRule::new("email", "email").with_value("x@y.z"))
        .field(FieldRule::new("name", "name").with_value("Ada"))
}

fn id_of(doc: &Document, node: formfill_runner::NodeId) -> Option<String> {
    doc.attr(node, "id").map(str::to_string)
}

#[tokio::test]
async fn test_two_field_preset_fires_events_once() {
    let mut doc = Document::parse(TWO_FIELDS);
    let inputs = Arc::new(AtomicUsize::new(0));
    let changes = Arc::new(AtomicUsize::new(0));
    let root = doc.root();
    let seen = inputs.clone();
    doc.add_listener(root, "input", move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let seen = changes.clone();
    doc.add_listener(root, "change", move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let result = Runner::new().run(&mut doc, &two_field_preset()).await;

    assert!(result.success());
    assert!(!result.submitted);
    let a = doc.element_by_id("a").unwrap();
    let b = doc.element_by_id("b").unwrap();
    assert_eq!(doc.value(a), "x@y.z");
    assert_eq!(doc.value(b), "Ada");
    for node in [a, b] {
        assert_eq!(doc.event_count(node, "input"), 1);
        assert_eq!(doc.event_count(node, "change"), 1);
    }
    assert_eq!(inputs.load(Ordering::SeqCst), 2);
    assert_eq!(changes.load(Ordering::SeqCst), 2);

    let order: Vec<&str> = doc
        .events()
        .iter()
        .filter(|e| e.target == a)
        .map(|e| e.event_type.as_str())
        .collect();
    assert_eq!(order, ["input", "change"]);
}

#[tokio::test]
async fn test_unmatched_preset_reports_every_field() {
    let mut doc = Document::parse("<html><body><p>No form here</p></body></html>");
    let result = Runner::new().run(&mut doc, &two_field_preset()).await;

    assert_eq!(result.outcomes.len(), 2);
    for (outcome, id) in result.outcomes.iter().zip(["email", "name"]) {
        assert_eq!(outcome.field_id, id);
        assert!(!outcome.matched);
        assert_eq!(outcome.failure_reason, Some(FailureReason::ElementNotFound));
    }
    assert!(doc.events().is_empty());
}

#[test]
fn test_name_attribute_beats_label_text() {
    let doc = Document::parse(
        r#"<label for="other">email</label><input id="other">
           <input id="target" name="email">"#,
    );
    let Resolution::Found(node) = resolve(&doc, "email") else {
        panic!("email should resolve");
    };
    assert_eq!(id_of(&doc, node).as_deref(), Some("target"));
}

#[test]
fn test_name_attribute_beats_wrapping_label() {
    let doc = Document::parse(
        r#"<label>email <input id="other"></label>
           <input id="target" name="email">"#,
    );
    let Resolution::Found(node) = resolve(&doc, "email") else {
        panic!("email should resolve");
    };
    assert_eq!(id_of(&doc, node).as_deref(), Some("target"));
}

#[test]
fn test_exact_attribute_beats_partial_match() {
    let doc = Document::parse(
        r#"<input id="first" placeholder="Your email address">
           <input id="second" aria-label="email">"#,
    );
    let node = resolve(&doc, "email").node().unwrap();
    assert_eq!(id_of(&doc, node).as_deref(), Some("second"));
}

#[test]
fn test_resolution_is_idempotent() {
    let doc = Document::parse(SIGNUP);
    for hint in ["email", "Full name", "#birthday", "plan", "Tell us", "nope"] {
        assert_eq!(resolve(&doc, hint), resolve(&doc, hint), "hint {:?}", hint);
    }
}

#[tokio::test]
async fn test_checkbox_truthiness() {
    let cases = [
        ("true", true),
        ("1", true),
        ("on", true),
        ("yes", false),
        ("TRUE", false),
        ("", false),
    ];
    for (value, expected) in cases {
        let mut doc = Document::parse(r#"<input id="c" type="checkbox" name="c" checked>"#);
        let preset = Preset::new("Check").field(
            FieldRule::new("c", "c")
                .with_type(FieldType::Checkbox)
                .with_value(value),
        );
        let result = Runner::new().run(&mut doc, &preset).await;
        assert!(result.success());
        let c = doc.element_by_id("c").unwrap();
        assert_eq!(doc.checked(c), expected, "value {:?}", value);
    }
}

#[tokio::test]
async fn test_signup_preset_fills_fixture() {
    let preset = Preset::load_with_params(
        concat!(env!("CARGO_MANIFEST_DIR"), "/configs/signup.yaml"),
        &Params::new().set("email", "ada@example.com"),
    )
    .unwrap();
    let mut doc = Document::parse(SIGNUP);

    let result = Runner::new().run(&mut doc, &preset).await;

    let failed: Vec<_> = result.outcomes.iter().filter(|o| !o.matched).collect();
    assert!(failed.is_empty(), "failed: {:?}", failed);
    assert!(result.submitted);

    let value = |id: &str| doc.value(doc.element_by_id(id).unwrap());
    assert_eq!(value("mail"), "ada@example.com");
    assert!(!value("fullname").is_empty());
    assert!(!value("bio").is_empty());
    assert_eq!(value("birthday").len(), "2024-01-01".len());

    let plan = doc.element_by_id("plan").unwrap();
    assert_eq!(doc.selected_index(plan), Some(1));
    assert!(doc.checked(doc.element_by_id("terms").unwrap()));
    assert_eq!(doc.submissions(), [doc.element_by_id("signup").unwrap()]);
}

#[tokio::test]
async fn test_escape_never_commits_through_agent() {
    let mut agent = Agent::new(Page::from_html(SIGNUP));
    let reply = agent
        .handle(Command::Pick {
            target_label: "email".into(),
        })
        .await;
    assert!(matches!(reply, Reply::Later(_)));

    let mail = agent.page().document().element_by_id("mail").unwrap();
    agent.dispatch_host_event(HostEvent::PointerMove {
        target: mail,
        rect: Rect::new(0.0, 0.0, 120.0, 24.0),
    });
    agent.dispatch_host_event(HostEvent::KeyDown {
        key: "Escape".into(),
    });
    // Clicks after cancellation belong to the page again.
    agent.dispatch_host_event(HostEvent::Click { target: Some(mail) });

    let Response::Picked { result } = reply.into_response().await else {
        panic!("expected a pick response");
    };
    assert!(result.is_cancelled());
    assert!(agent.last_pick().take().is_none());
    assert_eq!(agent.page().document().event_count(mail, "click"), 1);
}

#[tokio::test]
async fn test_picked_hint_resolves_back() {
    let mut agent = Agent::new(Page::from_html(SIGNUP));
    let reply = agent
        .handle(Command::Pick {
            target_label: "bio".into(),
        })
        .await;
    let bio = agent.page().document().element_by_id("bio").unwrap();
    agent.dispatch_host_event(HostEvent::Click { target: Some(bio) });

    let Response::Picked { result } = reply.into_response().await else {
        panic!("expected a pick response");
    };
    assert_eq!(resolve(agent.page().document(), &result.locator_hint).node(), Some(bio));

    let preset = Preset::new("Bio").field(FieldRule::new("bio", result.locator_hint).with_value("hello"));
    let Response::Injected { outcomes } = agent
        .handle(Command::Inject { preset })
        .await
        .into_response()
        .await
    else {
        panic!("expected outcomes");
    };
    assert!(outcomes[0].matched);
    assert_eq!(agent.page().document().value(bio), "hello");
}
