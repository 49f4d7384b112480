use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router, ServerHandler,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use formfill_runner::{
    Agent, Command, Document, Error as FillError, HostEvent, NodeId, Page, Params, Preset, Rect,
    Reply, Response,
};

/// How long `pick` waits for the user before handing back control.
const DEFAULT_PICK_TIMEOUT_MS: u64 = 60_000;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LoadPageRequest {
    #[schemars(description = "HTML source of the page")]
    pub html: Option<String>,
    #[schemars(description = "Path of an HTML file to load instead of inline html")]
    pub path: Option<String>,
    #[schemars(description = "URL the page is treated as coming from (for preset url_scope)")]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct InjectRequest {
    #[schemars(description = "Preset as YAML (name, url_scope, auto_submit, fields)")]
    pub preset_yaml: String,
    #[schemars(description = "Values for the preset's ${var} parameters")]
    #[serde(default)]
    pub params: HashMap<String, String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PickRequest {
    #[schemars(description = "Field the picked element is meant for (e.g. name, email)")]
    pub target_label: String,
    #[schemars(description = "Milliseconds to wait for the user before returning (default 60000)")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PointerMoveRequest {
    #[schemars(description = "CSS selector of the element under the pointer")]
    pub selector: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ClickRequest {
    #[schemars(description = "CSS selector of the clicked element; omit to click where the pointer is")]
    pub selector: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PressKeyRequest {
    #[schemars(description = "Key to press (e.g. Escape, Enter, Tab)")]
    pub key: String,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

fn err(e: impl std::fmt::Display) -> ErrorData {
    ErrorData::internal_error(e.to_string(), None::<Value>)
}

fn not_ready() -> ErrorData {
    err(FillError::PageNotReady)
}

fn text_ok(s: impl Into<String>) -> Result<CallToolResult, ErrorData> {
    Ok(CallToolResult::success(vec![Content::text(s.into())]))
}

fn json_ok(value: &impl Serialize) -> Result<CallToolResult, ErrorData> {
    text_ok(serde_json::to_string_pretty(value).map_err(err)?)
}

fn find(doc: &Document, selector: &str) -> Result<NodeId, ErrorData> {
    doc.query_selector(selector)
        .map_err(|e| ErrorData::invalid_params(e.to_string(), None::<Value>))?
        .ok_or_else(|| {
            ErrorData::invalid_params(format!("No element matches {}", selector), None::<Value>)
        })
}

#[derive(Clone)]
pub struct FormFillServer {
    agent: Arc<Mutex<Option<Agent>>>,
    tool_router: ToolRouter<Self>,
}

impl Default for FormFillServer {
    fn default() -> Self {
        Self::new()
    }
}

impl FormFillServer {
    /// Whether a pick is waiting for host events.
    pub async fn is_picking(&self) -> bool {
        let guard = self.agent.lock().await;
        guard.as_ref().is_some_and(|a| a.page().is_picking())
    }

    async fn host_event(&self, event: HostEvent) -> Result<String, ErrorData> {
        let mut guard = self.agent.lock().await;
        let agent = guard.as_mut().ok_or_else(not_ready)?;
        let disposition = agent.dispatch_host_event(event);
        Ok(format!("{:?}", disposition))
    }
}

#[tool_router]
impl FormFillServer {
    pub fn new() -> Self {
        Self {
            agent: Arc::new(Mutex::new(None)),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Load a page from inline HTML or a file. Replaces the current page and cancels any running pick.")]
    pub async fn load_page(
        &self,
        req: Parameters<LoadPageRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let req = req.0;
        let html = match (req.html, req.path) {
            (Some(html), _) => html,
            (None, Some(path)) => tokio::fs::read_to_string(&path).await.map_err(err)?,
            (None, None) => {
                return Err(ErrorData::invalid_params(
                    "Provide html or path",
                    None::<Value>,
                ))
            }
        };

        let mut page = Page::from_html(&html);
        if let Some(url) = req.url {
            page = page.with_url(url);
        }
        let controls = page
            .document()
            .all_elements()
            .into_iter()
            .filter(|n| page.document().is_form_control(*n))
            .count();
        let url = page.url().to_string();

        let mut guard = self.agent.lock().await;
        match guard.as_mut() {
            Some(agent) => {
                agent.replace_page(page);
            }
            None => *guard = Some(Agent::new(page)),
        }
        tracing::info!("loaded page {} ({} controls)", url, controls);
        text_ok(format!("Loaded {} with {} form controls.", url, controls))
    }

    #[tool(description = "Fill the page from a preset. Returns one outcome per field, in preset order.")]
    pub async fn inject(&self, req: Parameters<InjectRequest>) -> Result<CallToolResult, ErrorData> {
        let params = req
            .0
            .params
            .into_iter()
            .fold(Params::new(), |p, (k, v)| p.set(k, v));
        let preset = Preset::parse_with_params(&req.0.preset_yaml, &params)
            .map_err(|e| ErrorData::invalid_params(e.to_string(), None::<Value>))?;

        let mut guard = self.agent.lock().await;
        let agent = guard.as_mut().ok_or_else(not_ready)?;
        let response = agent.handle(Command::Inject { preset }).await.into_response().await;
        json_ok(&response)
    }

    #[tool(
        description = "Start an interactive pick. Waits until the user clicks an element (see pointer_move/click) or presses Escape, then returns a locator hint. On timeout the pick keeps running; read it later with last_pick."
    )]
    pub async fn pick(&self, req: Parameters<PickRequest>) -> Result<CallToolResult, ErrorData> {
        let target = req.0.target_label;
        let pending = {
            let mut guard = self.agent.lock().await;
            let agent = guard.as_mut().ok_or_else(not_ready)?;
            match agent
                .handle(Command::Pick {
                    target_label: target.clone(),
                })
                .await
            {
                Reply::Later(pending) => pending,
                Reply::Now(response) => return json_ok(&response),
            }
        };

        let task = tokio::spawn(pending.wait());
        let timeout = Duration::from_millis(req.0.timeout_ms.unwrap_or(DEFAULT_PICK_TIMEOUT_MS));
        match tokio::time::timeout(timeout, task).await {
            Ok(result) => json_ok(&Response::Picked {
                result: result.map_err(err)?,
            }),
            Err(_) => text_ok(format!(
                "Pick for '{}' is still waiting for the user. Use last_pick once it completes.",
                target
            )),
        }
    }

    #[tool(description = "Open the floating panel on the page. Opening twice is a no-op.")]
    pub async fn open_panel(&self) -> Result<CallToolResult, ErrorData> {
        let mut guard = self.agent.lock().await;
        let agent = guard.as_mut().ok_or_else(not_ready)?;
        let response = agent.handle(Command::OpenPanel).await.into_response().await;
        json_ok(&response)
    }

    #[tool(description = "Move the pointer over an element, with its client rectangle.")]
    pub async fn pointer_move(
        &self,
        req: Parameters<PointerMoveRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let target = {
            let guard = self.agent.lock().await;
            let agent = guard.as_ref().ok_or_else(not_ready)?;
            find(agent.page().document(), &req.0.selector)?
        };
        let rect = Rect::new(req.0.x, req.0.y, req.0.width, req.0.height);
        let disposition = self
            .host_event(HostEvent::PointerMove { target, rect })
            .await?;
        text_ok(format!("Pointer over {} ({})", req.0.selector, disposition))
    }

    #[tool(description = "Click an element, or the element under the pointer when no selector is given.")]
    pub async fn click(&self, req: Parameters<ClickRequest>) -> Result<CallToolResult, ErrorData> {
        let target = match &req.0.selector {
            Some(selector) => {
                let guard = self.agent.lock().await;
                let agent = guard.as_ref().ok_or_else(not_ready)?;
                Some(find(agent.page().document(), selector)?)
            }
            None => None,
        };
        let disposition = self.host_event(HostEvent::Click { target }).await?;
        text_ok(format!(
            "Clicked {} ({})",
            req.0.selector.as_deref().unwrap_or("at pointer"),
            disposition
        ))
    }

    #[tool(description = "Press a key. Escape cancels a running pick.")]
    pub async fn press_key(
        &self,
        req: Parameters<PressKeyRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let disposition = self
            .host_event(HostEvent::KeyDown {
                key: req.0.key.clone(),
            })
            .await?;
        text_ok(format!("Pressed {} ({})", req.0.key, disposition))
    }

    #[tool(description = "Take the most recent completed pick. Reading removes it; picks older than two minutes are dropped.")]
    pub async fn last_pick(&self) -> Result<CallToolResult, ErrorData> {
        let guard = self.agent.lock().await;
        let agent = guard.as_ref().ok_or_else(not_ready)?;
        match agent.last_pick().take() {
            Some(pick) => json_ok(&pick),
            None => text_ok("No recent pick."),
        }
    }

    #[tool(description = "Serialize the current page, including filled values.")]
    pub async fn page_html(&self) -> Result<CallToolResult, ErrorData> {
        let guard = self.agent.lock().await;
        let agent = guard.as_ref().ok_or_else(not_ready)?;
        text_ok(agent.page().document().to_html())
    }
}

#[tool_handler]
impl ServerHandler for FormFillServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "formfill-tools".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Form filling server. Use 'load_page' to load HTML, 'inject' with a YAML preset \
                 to fill fields from loose hints (selector, attribute value or label text), \
                 and 'pick' to let a user point at an element. While a pick runs, drive it with \
                 'pointer_move', 'click' and 'press_key'. 'page_html' shows the result."
                    .into(),
            ),
        }
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    use rmcp::ServiceExt;

    let server = FormFillServer::new();
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;
    Ok(())
}
