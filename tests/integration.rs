//! Integration tests for the formfill-tools MCP server.
//!
//! Tools are called directly, without a transport.

use formfill_tools::mcp::{
    ClickRequest, InjectRequest, LoadPageRequest, PickRequest, PointerMoveRequest,
    PressKeyRequest,
};
use formfill_tools::FormFillServer;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use serde_json::Value;
use std::collections::HashMap;

const SIGNUP: &str = r#"<html><body>
<form id="signup">
  <label for="fullname">Full name</label><input id="fullname" name="fullname">
  <input id="mail" name="email" type="email">
  <label><input id="terms" type="checkbox" name="terms"> I agree</label>
</form>
</body></html>"#;

fn text(result: &CallToolResult) -> String {
    let value = serde_json::to_value(result).expect("result serializes");
    value["content"][0]["text"]
        .as_str()
        .expect("text content")
        .to_string()
}

fn json(result: &CallToolResult) -> Value {
    serde_json::from_str(&text(result)).expect("json content")
}

async fn loaded() -> FormFillServer {
    let server = FormFillServer::new();
    server
        .load_page(Parameters(LoadPageRequest {
            html: Some(SIGNUP.to_string()),
            path: None,
            url: Some("http://localhost:3000/signup".to_string()),
        }))
        .await
        .expect("Failed to load page");
    server
}

async fn wait_for_pick(server: &FormFillServer) {
    while !server.is_picking().await {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_tools_require_a_page() {
    let server = FormFillServer::new();
    let err = server.open_panel().await.unwrap_err();
    assert!(err.message.contains("page not ready for automation"));

    let err = server
        .press_key(Parameters(PressKeyRequest {
            key: "Escape".into(),
        }))
        .await
        .unwrap_err();
    assert!(err.message.contains("page not ready"));
}

#[tokio::test]
async fn test_load_page_counts_controls() {
    let server = FormFillServer::new();
    let result = server
        .load_page(Parameters(LoadPageRequest {
            html: Some(SIGNUP.to_string()),
            path: None,
            url: None,
        }))
        .await
        .unwrap();
    assert_eq!(text(&result), "Loaded about:blank with 3 form controls.");

    let err = server
        .load_page(Parameters(LoadPageRequest {
            html: None,
            path: None,
            url: None,
        }))
        .await
        .unwrap_err();
    assert!(err.message.contains("html or path"));
}

#[tokio::test]
async fn test_inject_reports_outcomes() {
    let server = loaded().await;
    let yaml = r#"
name: Signup
params:
  who:
    required: true
fields:
  - id: name
    locator: Full name
    value: "${who}"
  - id: email
    locator: email
    type: email
    value: ada@example.com
  - id: phone
    locator: phone
"#;
    let result = server
        .inject(Parameters(InjectRequest {
            preset_yaml: yaml.to_string(),
            params: HashMap::from([("who".to_string(), "Ada".to_string())]),
        }))
        .await
        .unwrap();

    let response = json(&result);
    assert_eq!(response["type"], "injected");
    let outcomes = response["outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0]["matched"], true);
    assert_eq!(outcomes[1]["matched"], true);
    assert_eq!(outcomes[2]["failure_reason"], "element-not-found");

    let html = text(&server.page_html().await.unwrap());
    let filled = regex::Regex::new(r#"id="mail"[^>]*value="ada@example.com""#).unwrap();
    assert!(filled.is_match(&html), "{}", html);
}

#[tokio::test]
async fn test_inject_rejects_bad_preset() {
    let server = loaded().await;
    let err = server
        .inject(Parameters(InjectRequest {
            preset_yaml: "name: x\nfields:\n  - locator: a\n    value: \"${missing}\"\nparams:\n  missing:\n    required: true\n".into(),
            params: HashMap::new(),
        }))
        .await
        .unwrap_err();
    assert!(err.message.contains("missing required parameter"));
}

#[tokio::test]
async fn test_pick_via_pointer_and_click() {
    let server = loaded().await;
    let picker = server.clone();
    let pick = tokio::spawn(async move {
        picker
            .pick(Parameters(PickRequest {
                target_label: "email".into(),
                timeout_ms: Some(5_000),
            }))
            .await
    });
    wait_for_pick(&server).await;

    server
        .pointer_move(Parameters(PointerMoveRequest {
            selector: "#mail".into(),
            x: 10.0,
            y: 40.0,
            width: 200.0,
            height: 24.0,
        }))
        .await
        .unwrap();
    let clicked = server
        .click(Parameters(ClickRequest { selector: None }))
        .await
        .unwrap();
    assert!(text(&clicked).contains("Consumed"));

    let result = json(&pick.await.unwrap().unwrap());
    assert_eq!(result["type"], "picked");
    assert_eq!(result["result"]["locator_hint"], "#mail");
    assert_eq!(result["result"]["suggested_label"], "email");

    let last = json(&server.last_pick().await.unwrap());
    assert_eq!(last["target"], "email");
    assert_eq!(last["suggested_generator"], "internet.email");
    assert_eq!(text(&server.last_pick().await.unwrap()), "No recent pick.");
}

#[tokio::test]
async fn test_escape_cancels_pick() {
    let server = loaded().await;
    let picker = server.clone();
    let pick = tokio::spawn(async move {
        picker
            .pick(Parameters(PickRequest {
                target_label: "name".into(),
                timeout_ms: None,
            }))
            .await
    });
    wait_for_pick(&server).await;

    server
        .press_key(Parameters(PressKeyRequest {
            key: "Escape".into(),
        }))
        .await
        .unwrap();

    let result = json(&pick.await.unwrap().unwrap());
    assert_eq!(result["result"]["locator_hint"], "");
    assert_eq!(text(&server.last_pick().await.unwrap()), "No recent pick.");
}

#[tokio::test]
async fn test_pick_timeout_leaves_pick_running() {
    let server = loaded().await;
    let result = server
        .pick(Parameters(PickRequest {
            target_label: "name".into(),
            timeout_ms: Some(10),
        }))
        .await
        .unwrap();
    assert!(text(&result).contains("still waiting"));
    assert!(server.is_picking().await);

    server
        .click(Parameters(ClickRequest {
            selector: Some("#fullname".into()),
        }))
        .await
        .unwrap();
    // The spawned waiter records the pick once it sees the result.
    let mut last = None;
    for _ in 0..100 {
        let result = server.last_pick().await.unwrap();
        if text(&result) != "No recent pick." {
            last = Some(json(&result));
            break;
        }
        tokio::task::yield_now().await;
    }
    let last = last.expect("pick recorded");
    assert_eq!(last["result"]["locator_hint"], "#fullname");
}

#[tokio::test]
async fn test_open_panel_is_idempotent() {
    let server = loaded().await;
    for _ in 0..2 {
        let result = server.open_panel().await.unwrap();
        assert_eq!(json(&result)["type"], "ack");
    }
    let html = text(&server.page_html().await.unwrap());
    assert_eq!(html.matches(r#"id="formfill-panel""#).count(), 1);
}

#[tokio::test]
async fn test_unknown_selector_is_invalid_params() {
    let server = loaded().await;
    let err = server
        .pointer_move(Parameters(PointerMoveRequest {
            selector: "#nope".into(),
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
        }))
        .await
        .unwrap_err();
    assert!(err.message.contains("No element matches #nope"));
}
