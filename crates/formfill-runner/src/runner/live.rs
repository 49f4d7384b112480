use crate::dom::{ControlChange, ControlWrite, Document, NodeId};
use crate::Result;
use eoka::{Browser, Page};
use serde::Deserialize;
use tracing::{debug, warn};

/// Browser launch options for live runs.
#[derive(Debug, Clone, Default)]
pub struct BrowserOptions {
    pub headless: bool,
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
}

/// A browser with one page, used to fill forms on real sites.
pub struct LiveSession {
    browser: Browser,
    page: Page,
}

/// Set a control's state the way a user edit would, then fire `input` and
/// `change`. Uses the native value setter so framework-managed inputs notice.
const APPLY_JS: &str = r#"(() => {
    const el = document.querySelector(__PATH__);
    if (!el) return false;
    const change = __CHANGE__;
    if ('value' in change) {
        const proto = el instanceof HTMLTextAreaElement
            ? HTMLTextAreaElement.prototype
            : HTMLInputElement.prototype;
        const setter = Object.getOwnPropertyDescriptor(proto, 'value')?.set;
        if (setter) setter.call(el, change.value); else el.value = change.value;
    } else if ('checked' in change) {
        el.checked = change.checked;
    } else if ('selected' in change) {
        el.selectedIndex = change.selected === null ? -1 : change.selected;
    }
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
    return true;
})()"#;

const SUBMIT_JS: &str = r#"(() => {
    const form = document.querySelector(__PATH__);
    if (!form) return false;
    if (typeof form.requestSubmit === 'function') form.requestSubmit(); else form.submit();
    return true;
})()"#;

/// The page markup plus a path to the focused element, in `css_path` form.
const SNAPSHOT_JS: &str = r#"(() => {
    const root = document.documentElement;
    let el = document.activeElement;
    let active = null;
    if (el && el !== document.body && el !== root) {
        const parts = [];
        while (el && el.nodeType === 1) {
            const tag = el.localName;
            let index = 1;
            for (let sib = el.previousElementSibling; sib; sib = sib.previousElementSibling) {
                if (sib.localName === tag) index++;
            }
            parts.unshift(`${tag}:nth-of-type(${index})`);
            if (el === root) break;
            el = el.parentElement;
        }
        active = parts.join(' > ');
    }
    return JSON.stringify({ html: root.outerHTML, active });
})()"#;

#[derive(Debug, Deserialize)]
struct Snapshot {
    html: String,
    active: Option<String>,
}

/// Build a document from `SNAPSHOT_JS` output, restoring focus.
fn parse_snapshot(json: &str) -> Result<Document> {
    let snapshot: Snapshot = serde_json::from_str(json)?;
    let mut doc = Document::parse(&snapshot.html);
    if let Some(path) = snapshot.active.as_deref() {
        match doc.query_selector(path) {
            Ok(Some(node)) => doc.focus(node),
            _ => debug!("focused element {} not found in snapshot", path),
        }
    }
    Ok(doc)
}

impl LiveSession {
    pub async fn launch(options: &BrowserOptions) -> Result<Self> {
        let stealth = eoka::StealthConfig {
            headless: options.headless,
            proxy: options.proxy.clone(),
            user_agent: options.user_agent.clone(),
            ..Default::default()
        };
        debug!("launching browser (headless: {})", options.headless);
        let browser = Browser::launch_with_config(stealth).await?;
        let page = browser.new_page("about:blank").await?;
        Ok(Self { browser, page })
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        self.page.goto(url).await?;
        Ok(())
    }

    pub async fn url(&self) -> Result<String> {
        Ok(self.page.url().await?)
    }

    /// Parse the page's current DOM, keeping the browser's focused element.
    pub async fn snapshot(&self) -> Result<Document> {
        let json: String = self.page.evaluate(SNAPSHOT_JS).await?;
        parse_snapshot(&json)
    }

    /// Apply control writes recorded against a snapshot of this page.
    pub async fn replay(&self, doc: &Document, writes: &[ControlWrite]) -> Result<()> {
        for write in writes {
            let path = doc.css_path(write.node);
            let change = match &write.change {
                ControlChange::Value(v) => serde_json::json!({ "value": v }),
                ControlChange::Checked(c) => serde_json::json!({ "checked": c }),
                ControlChange::Selected(i) => serde_json::json!({ "selected": i }),
            };
            let js = APPLY_JS
                .replace("__PATH__", &serde_json::to_string(&path)?)
                .replace("__CHANGE__", &change.to_string());
            let applied: bool = self.page.evaluate(&js).await?;
            if !applied {
                warn!("live page has no element at {}", path);
            }
        }
        Ok(())
    }

    pub async fn submit(&self, doc: &Document, form: NodeId) -> Result<()> {
        let path = doc.css_path(form);
        let js = SUBMIT_JS.replace("__PATH__", &serde_json::to_string(&path)?);
        let submitted: bool = self.page.evaluate(&js).await?;
        if !submitted {
            warn!("live page has no form at {}", path);
        }
        Ok(())
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub async fn close(self) -> Result<()> {
        self.browser.close().await?;
        Ok(())
    }
}
