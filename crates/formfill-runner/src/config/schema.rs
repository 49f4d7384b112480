use super::params::{self, ParamDef, Params};
use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// How a field's value is interpreted when it is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Email,
    Number,
    Date,
    Select,
    Checkbox,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Select => "select",
            FieldType::Checkbox => "checkbox",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a field's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueStrategy {
    /// Use the configured value verbatim.
    #[default]
    Static,
    /// Produce a value from a named generator.
    Generated,
}

/// One field to fill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldRule {
    pub id: String,

    /// Selector, attribute value, input type or label text identifying the
    /// control.
    pub locator: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(rename = "strategy")]
    pub value_strategy: ValueStrategy,

    #[serde(rename = "value", skip_serializing_if = "Option::is_none")]
    pub static_value: Option<String>,

    /// Dotted generator path, e.g. `internet.email`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
}

impl FieldRule {
    /// A text field with no value yet.
    pub fn new(id: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            locator: locator.into(),
            field_type: FieldType::Text,
            value_strategy: ValueStrategy::Static,
            static_value: None,
            generator: None,
        }
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    /// Fill with a fixed value.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value_strategy = ValueStrategy::Static;
        self.static_value = Some(value.into());
        self
    }

    /// Fill with a value from the generator at `path`.
    pub fn with_generator(mut self, path: impl Into<String>) -> Self {
        self.value_strategy = ValueStrategy::Generated;
        self.generator = Some(path.into());
        self
    }
}

/// A named set of field rules, applied to pages whose URL matches
/// `url_scope`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPreset")]
pub struct Preset {
    pub id: String,
    pub name: String,

    /// Regular expression matched against page URLs.
    pub url_scope: String,

    /// Submit the form once every field has been processed.
    pub auto_submit: bool,

    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, ParamDef>,

    pub fields: Vec<FieldRule>,
}

/// Preset as written in YAML/JSON, before defaults and validation.
#[derive(Debug, Deserialize)]
struct RawPreset {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    url_scope: Option<String>,
    #[serde(default)]
    auto_submit: bool,
    #[serde(default)]
    params: HashMap<String, ParamDef>,
    #[serde(default)]
    fields: Vec<RawFieldRule>,
}

#[derive(Debug, Deserialize)]
struct RawFieldRule {
    #[serde(default)]
    id: Option<String>,
    #[serde(alias = "selector")]
    locator: String,
    #[serde(rename = "type", default)]
    field_type: FieldType,
    #[serde(rename = "strategy", default)]
    value_strategy: ValueStrategy,
    #[serde(rename = "value", default)]
    static_value: Option<String>,
    #[serde(default)]
    generator: Option<String>,
}

impl TryFrom<RawPreset> for Preset {
    type Error = Error;

    fn try_from(raw: RawPreset) -> Result<Self> {
        let fields = raw
            .fields
            .into_iter()
            .enumerate()
            .map(|(i, f)| FieldRule {
                id: f
                    .id
                    .filter(|id| !id.trim().is_empty())
                    .unwrap_or_else(|| format!("field-{}", i + 1)),
                locator: f.locator,
                field_type: f.field_type,
                value_strategy: f.value_strategy,
                static_value: f.static_value,
                generator: f.generator,
            })
            .collect();

        let preset = Preset {
            id: raw
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| slugify(&raw.name)),
            name: raw.name,
            url_scope: raw.url_scope.unwrap_or_else(|| ".*".to_string()),
            auto_submit: raw.auto_submit,
            params: raw.params,
            fields,
        };
        preset.validate()?;
        Ok(preset)
    }
}

impl Preset {
    /// An empty preset that applies everywhere.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: slugify(&name),
            name,
            url_scope: ".*".to_string(),
            auto_submit: false,
            params: HashMap::new(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, rule: FieldRule) -> Self {
        self.fields.push(rule);
        self
    }

    pub fn auto_submit(mut self, auto_submit: bool) -> Self {
        self.auto_submit = auto_submit;
        self
    }

    /// Load a preset from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse_with_params(&content, &Params::new())
    }

    /// Load a preset from a YAML file with parameters.
    pub fn load_with_params<P: AsRef<Path>>(path: P, params: &Params) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse_with_params(&content, params)
    }

    /// Parse a preset from YAML (no params).
    pub fn parse(yaml: &str) -> Result<Self> {
        Self::parse_with_params(yaml, &Params::new())
    }

    /// Parse a preset from YAML, substituting `${var}` parameters.
    pub fn parse_with_params(yaml: &str, params: &Params) -> Result<Self> {
        let mut value: serde_yaml::Value = serde_yaml::from_str(yaml)?;

        let defs: HashMap<String, ParamDef> = value
            .get("params")
            .and_then(|v| serde_yaml::from_value(v.clone()).ok())
            .unwrap_or_default();

        params::substitute_value(&mut value, params, &defs)?;

        let raw: RawPreset = serde_yaml::from_value(value)?;
        Preset::try_from(raw)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("name is required".into()));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.locator.trim().is_empty() {
                return Err(Error::Config(format!(
                    "field '{}': locator is required",
                    field.id
                )));
            }
            if !seen.insert(field.id.as_str()) {
                return Err(Error::Config(format!("duplicate field id '{}'", field.id)));
            }
        }
        Regex::new(&self.url_scope)?;
        Ok(())
    }

    /// Whether this preset is meant for `url`.
    pub fn applies_to(&self, url: &str) -> bool {
        Regex::new(&self.url_scope).is_ok_and(|re| re.is_match(url))
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::new();
    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "preset".to_string()
    } else {
        slug
    }
}
