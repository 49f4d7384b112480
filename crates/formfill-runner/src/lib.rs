//! # formfill-runner
//!
//! Preset-driven form filling. Describe fields with loose hints in YAML, and
//! the runner finds the matching controls, fills them with typed values, and
//! fires the events the page listens for.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use formfill_runner::{Document, Preset, Runner};
//!
//! # #[tokio::main]
//! # async fn main() -> formfill_runner::Result<()> {
//! let preset = Preset::load("signup.yaml")?;
//! let mut doc = Document::parse(&std::fs::read_to_string("signup.html")?);
//! let result = Runner::new().run(&mut doc, &preset).await;
//! println!("{}/{} fields filled", result.matched(), result.outcomes.len());
//! # Ok(())
//! # }
//! ```

mod agent;
mod config;
pub mod dom;
mod generate;
mod materialize;
mod page;
mod picker;
mod resolver;
mod runner;

pub use agent::{
    Agent, Command, LastPick, LastPickStore, PanelController, PendingPick, Reply, Response,
    LAST_PICK_TTL_MS, PANEL_ID,
};
pub use config::{FieldRule, FieldType, ParamDef, Params, Preset, ValueStrategy};
pub use dom::{Document, NodeId};
pub use generate::{
    split_path, suggest_generator, FakeCatalog, GenerateError, GeneratedValue, GeneratorCatalog,
    FAKE_PATHS,
};
pub use materialize::materialize;
pub use page::Page;
pub use picker::{
    locator_hint, suggested_label, Disposition, HostEvent, PickResult, PickState, Picker, Rect,
    OVERLAY_MARKER,
};
pub use resolver::{resolve, resolve_with_strategy, Resolution, Strategy};
pub use runner::{
    is_truthy, BrowserOptions, FailureReason, InjectionOutcome, Injector, LiveSession, RunResult,
    Runner, DEFAULT_BATCH_SIZE,
};

/// Result type for formfill-runner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from preset loading, page access, and the live browser.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid url_scope: {0}")]
    Regex(#[from] regex::Error),

    #[error("invalid selector: {0}")]
    Selector(#[from] dom::SelectorError),

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error("page not ready for automation")]
    PageNotReady,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_preset() {
        let yaml = r#"
name: "Signup"
fields:
  - locator: "email"
"#;
        let preset = Preset::parse(yaml).unwrap();
        assert_eq!(preset.name, "Signup");
        assert_eq!(preset.id, "signup");
        assert_eq!(preset.url_scope, ".*");
        assert!(!preset.auto_submit);
        assert_eq!(preset.fields.len(), 1);
        assert_eq!(preset.fields[0].id, "field-1");
        assert_eq!(preset.fields[0].field_type, FieldType::Text);
        assert_eq!(preset.fields[0].value_strategy, ValueStrategy::Static);
    }

    #[test]
    fn test_parse_field_kinds() {
        let yaml = r##"
name: "Profile"
url_scope: "^https://app\\.example\\.com/"
auto_submit: true
fields:
  - id: plan
    selector: "#plan"
    type: select
    value: pro
  - id: email
    locator: email
    type: email
    strategy: generated
    generator: internet.email
  - id: terms
    locator: "I agree"
    type: checkbox
    value: "yes"
"##;
        let preset = Preset::parse(yaml).unwrap();
        assert!(preset.auto_submit);
        assert!(preset.applies_to("https://app.example.com/signup"));
        assert!(!preset.applies_to("https://example.com/"));

        assert_eq!(preset.fields[0].locator, "#plan");
        assert_eq!(preset.fields[0].field_type, FieldType::Select);
        assert_eq!(preset.fields[1].value_strategy, ValueStrategy::Generated);
        assert_eq!(preset.fields[1].generator.as_deref(), Some("internet.email"));
        assert_eq!(preset.fields[2].static_value.as_deref(), Some("yes"));
    }

    #[test]
    fn test_invalid_presets() {
        let cases = [
            "name: \"\"\nfields: []",
            "name: x\nurl_scope: \"(\"",
            "name: x\nfields:\n  - locator: \"  \"",
            "name: x\nfields:\n  - id: a\n    locator: a\n  - id: a\n    locator: b",
        ];
        for yaml in cases {
            assert!(Preset::parse(yaml).is_err(), "accepted: {}", yaml);
        }
        assert!(matches!(
            Preset::parse("name: x\nurl_scope: \"(\""),
            Err(Error::Regex(_))
        ));
        assert!(matches!(Preset::parse("name: [unclosed"), Err(Error::Yaml(_))));
    }

    #[test]
    fn test_params_substitution() {
        let yaml = r#"
name: "Login"
params:
  user:
    required: true
  domain:
    default: "example.com"
fields:
  - locator: email
    value: "${user}@${domain}"
"#;
        let params = Params::new().set("user", "ada");
        let preset = Preset::parse_with_params(yaml, &params).unwrap();
        assert_eq!(preset.fields[0].static_value.as_deref(), Some("ada@example.com"));

        let err = Preset::parse(yaml).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_example_presets() {
        let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/configs");
        let preset = Preset::load_with_params(
            format!("{}/signup.yaml", dir),
            &Params::new().set("email", "ada@example.com"),
        )
        .unwrap();
        assert!(!preset.fields.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.yaml");
        std::fs::write(
            &path,
            "name: Search\nparams:\n  q:\n    default: rust\nfields:\n  - locator: q\n    value: \"${q}\"\n",
        )
        .unwrap();

        let preset = Preset::load(&path).unwrap();
        assert_eq!(preset.fields[0].static_value.as_deref(), Some("rust"));

        let missing = Preset::load(dir.path().join("missing.yaml"));
        assert!(matches!(missing, Err(Error::Io(_))));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(Error::PageNotReady.to_string(), "page not ready for automation");
        assert_eq!(
            Error::Config("name is required".into()).to_string(),
            "config error: name is required"
        );
    }
}
