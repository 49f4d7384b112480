//! The page agent: one entry point for inbound commands against a page.

mod last_pick;
mod panel;

pub use last_pick::{LastPick, LastPickStore, LAST_PICK_TTL_MS};
pub use panel::{PanelController, PANEL_ID};

use crate::config::Preset;
use crate::page::Page;
use crate::picker::{Disposition, HostEvent, PickResult};
use crate::runner::{InjectionOutcome, Runner};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Inbound command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Inject { preset: Preset },
    Pick { target_label: String },
    OpenPanel,
}

/// Reply to a [`Command`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Injected { outcomes: Vec<InjectionOutcome> },
    Picked { result: PickResult },
    Ack,
}

/// What [`Agent::handle`] hands back. Picks finish only after further host
/// events, so they come back as a handle to wait on.
#[derive(Debug)]
pub enum Reply {
    Now(Response),
    Later(PendingPick),
}

impl Reply {
    /// Wait for the final response.
    pub async fn into_response(self) -> Response {
        match self {
            Reply::Now(response) => response,
            Reply::Later(pending) => Response::Picked {
                result: pending.wait().await,
            },
        }
    }
}

/// A pick in progress.
#[derive(Debug)]
pub struct PendingPick {
    target: String,
    rx: oneshot::Receiver<PickResult>,
    store: LastPickStore,
}

impl PendingPick {
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Wait for the user. A completed pick is also written to the agent's
    /// [`LastPickStore`]. If the page goes away first the pick counts as
    /// cancelled.
    pub async fn wait(self) -> PickResult {
        let result = self.rx.await.unwrap_or_default();
        if result.is_cancelled() {
            debug!("pick for '{}' cancelled", self.target);
        } else {
            info!("picked {} for '{}'", result.locator_hint, self.target);
            self.store.record(self.target, result.clone());
        }
        result
    }
}

/// Owns a page and answers commands against it.
#[derive(Debug)]
pub struct Agent {
    page: Page,
    panel: PanelController,
    last_pick: LastPickStore,
    runner: Runner,
}

impl Agent {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            panel: PanelController::new(),
            last_pick: LastPickStore::new(),
            runner: Runner::new(),
        }
    }

    pub fn with_runner(mut self, runner: Runner) -> Self {
        self.runner = runner;
        self
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut Page {
        &mut self.page
    }

    /// Swap in a new page. A pick running on the old page is cancelled.
    pub fn replace_page(&mut self, page: Page) -> Page {
        self.page.cancel_pick();
        std::mem::replace(&mut self.page, page)
    }

    pub fn last_pick(&self) -> &LastPickStore {
        &self.last_pick
    }

    pub fn panel(&self) -> PanelController {
        self.panel
    }

    /// Handle one command. Produces exactly one reply.
    pub async fn handle(&mut self, command: Command) -> Reply {
        match command {
            Command::Inject { preset } => Reply::Now(self.inject(&preset).await),
            Command::Pick { target_label } => {
                debug!("pick requested for '{}'", target_label);
                let rx = self.page.start_pick();
                Reply::Later(PendingPick {
                    target: target_label,
                    rx,
                    store: self.last_pick.clone(),
                })
            }
            Command::OpenPanel => {
                self.panel.open(self.page.document_mut());
                Reply::Now(Response::Ack)
            }
        }
    }

    async fn inject(&mut self, preset: &Preset) -> Response {
        if !preset.applies_to(self.page.url()) {
            warn!(
                "preset '{}' is scoped to {:?}; page is {}",
                preset.name,
                preset.url_scope,
                self.page.url()
            );
        }
        let result = self.runner.run(self.page.document_mut(), preset).await;
        self.panel
            .show_results(self.page.document_mut(), &result.outcomes);
        Response::Injected {
            outcomes: result.outcomes,
        }
    }

    /// Deliver a host event to the page.
    pub fn dispatch_host_event(&mut self, event: HostEvent) -> Disposition {
        self.page.dispatch_host_event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldRule;
    use crate::picker::Rect;

    const HTML: &str = r#"<html><body><form>
        <label for="mail">Email</label><input id="mail" name="email">
    </form></body></html>"#;

    #[test]
    fn test_command_wire_format() {
        let cmd: Command = serde_json::from_str(r#"{"type":"PICK","target_label":"email"}"#).unwrap();
        assert!(matches!(cmd, Command::Pick { target_label } if target_label == "email"));

        let cmd: Command = serde_json::from_str(r#"{"type":"OPEN_PANEL"}"#).unwrap();
        assert!(matches!(cmd, Command::OpenPanel));

        let cmd: Command = serde_json::from_str(
            r#"{"type":"INJECT","preset":{"name":"Signup","fields":[{"locator":"email","value":"a@b.c"}]}}"#,
        )
        .unwrap();
        let Command::Inject { preset } = cmd else {
            panic!("expected inject");
        };
        assert_eq!(preset.fields[0].id, "field-1");

        let json = serde_json::to_value(Response::Ack).unwrap();
        assert_eq!(json["type"], "ack");
    }

    #[tokio::test]
    async fn test_inject_command() {
        let mut agent = Agent::new(Page::from_html(HTML));
        let preset = Preset::new("Signup").field(FieldRule::new("email", "Email").with_value("a@b.c"));

        let response = agent.handle(Command::Inject { preset }).await.into_response().await;
        let Response::Injected { outcomes } = response else {
            panic!("expected outcomes");
        };
        assert!(outcomes[0].matched);
        let doc = agent.page().document();
        assert_eq!(doc.value(doc.element_by_id("mail").unwrap()), "a@b.c");
    }

    #[tokio::test]
    async fn test_pick_records_last_pick() {
        let mut agent = Agent::new(Page::from_html(HTML));
        let Reply::Later(pending) = agent.handle(Command::Pick { target_label: "email".into() }).await else {
            panic!("pick should be pending");
        };
        assert_eq!(pending.target(), "email");

        let mail = agent.page().document().element_by_id("mail").unwrap();
        agent.dispatch_host_event(HostEvent::PointerMove {
            target: mail,
            rect: Rect::default(),
        });
        agent.dispatch_host_event(HostEvent::Click { target: Some(mail) });

        let result = pending.wait().await;
        assert_eq!(result.locator_hint, "#mail");
        let last = agent.last_pick().take().unwrap();
        assert_eq!(last.target, "email");
        assert_eq!(last.result, result);
    }

    #[tokio::test]
    async fn test_cancelled_pick_is_not_recorded() {
        let mut agent = Agent::new(Page::from_html(HTML));
        let reply = agent.handle(Command::Pick { target_label: "name".into() }).await;
        agent.dispatch_host_event(HostEvent::KeyDown { key: "Escape".into() });

        let Response::Picked { result } = reply.into_response().await else {
            panic!("expected pick");
        };
        assert!(result.is_cancelled());
        assert!(agent.last_pick().is_empty());
    }

    #[tokio::test]
    async fn test_replacing_page_cancels_pick() {
        let mut agent = Agent::new(Page::from_html(HTML));
        let reply = agent.handle(Command::Pick { target_label: "name".into() }).await;
        agent.replace_page(Page::from_html("<p>next</p>"));
        let Response::Picked { result } = reply.into_response().await else {
            panic!("expected pick");
        };
        assert!(result.is_cancelled());
    }

    #[tokio::test]
    async fn test_open_panel_twice_mounts_once() {
        let mut agent = Agent::new(Page::from_html(HTML));
        for _ in 0..2 {
            let response = agent.handle(Command::OpenPanel).await.into_response().await;
            assert_eq!(response, Response::Ack);
        }
        let panels = agent
            .page()
            .document()
            .query_selector_all(&format!("#{}", PANEL_ID))
            .unwrap();
        assert_eq!(panels.len(), 1);
    }
}
