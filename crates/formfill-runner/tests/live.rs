//! Live-browser replay tests.
//!
//! These tests require Chrome to be installed and available.
//! Run with: cargo test --test live -- --ignored

use formfill_runner::{BrowserOptions, FieldRule, FieldType, LiveSession, Preset, Runner};

fn chrome_available() -> bool {
    eoka::stealth::patcher::find_chrome().is_ok()
}

const PAGE: &str = r##"data:text/html,
<form id="f" onsubmit="event.preventDefault(); document.body.dataset.submitted = '1'">
  <label for="n">Name</label><input id="n">
  <input id="e" name="email" oninput="this.dataset.inputs = (+(this.dataset.inputs || 0) + 1)">
  <select id="p" name="plan"><option value="free">Free</option><option value="pro">Pro</option></select>
  <input id="t" type="checkbox" name="terms">
</form>
"##;

async fn launch() -> LiveSession {
    LiveSession::launch(&BrowserOptions {
        headless: true,
        ..Default::default()
    })
    .await
    .expect("Failed to launch browser")
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_replay_into_live_page() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let session = launch().await;
    session.goto(PAGE).await.expect("Failed to navigate");

    let preset = Preset::new("Live")
        .auto_submit(true)
        .field(FieldRule::new("name", "Name").with_value("Ada"))
        .field(FieldRule::new("email", "email").with_type(FieldType::Email).with_value("ada@example.com"))
        .field(FieldRule::new("plan", "plan").with_type(FieldType::Select).with_value("pro"))
        .field(FieldRule::new("terms", "terms").with_type(FieldType::Checkbox).with_value("true"));

    let result = Runner::new()
        .run_live(&session, &preset)
        .await
        .expect("Failed to run preset");
    assert!(result.success());
    assert!(result.submitted);

    let page = session.page();
    let name: String = page.evaluate("document.getElementById('n').value").await.unwrap();
    let email: String = page.evaluate("document.getElementById('e').value").await.unwrap();
    let inputs: String = page
        .evaluate("document.getElementById('e').dataset.inputs")
        .await
        .unwrap();
    let plan: String = page.evaluate("document.getElementById('p').value").await.unwrap();
    let terms: bool = page.evaluate("document.getElementById('t').checked").await.unwrap();
    let submitted: String = page
        .evaluate("document.body.dataset.submitted || ''")
        .await
        .unwrap();

    assert_eq!(name, "Ada");
    assert_eq!(email, "ada@example.com");
    assert_eq!(inputs, "1");
    assert_eq!(plan, "pro");
    assert!(terms);
    assert_eq!(submitted, "1");

    session.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_snapshot_sees_live_dom() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let session = launch().await;
    session.goto(PAGE).await.expect("Failed to navigate");

    let doc = session.snapshot().await.expect("Failed to snapshot");
    assert!(doc.element_by_id("e").is_some());
    assert_eq!(doc.query_selector_all("option").unwrap().len(), 2);

    session.close().await.expect("Failed to close browser");
}
