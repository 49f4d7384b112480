use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Values supplied for a preset's `${var}` placeholders.
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: HashMap<String, String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse `key=value` command-line arguments.
    pub fn from_args(args: &[String]) -> Result<Self> {
        args.iter().try_fold(Self::new(), |params, arg| {
            match arg.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    Ok(params.set(key.trim(), value))
                }
                _ => Err(Error::Config(format!(
                    "invalid param '{}', expected key=value",
                    arg
                ))),
            }
        })
    }
}

/// Declared preset parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Replace `${var}` placeholders in `template`.
///
/// Supplied values win over declared defaults. A declared optional parameter
/// without a default becomes the empty string; undeclared names are left as
/// written.
pub fn substitute(
    template: &str,
    params: &Params,
    defs: &HashMap<String, ParamDef>,
) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("${") {
        let Some(close) = rest[open..].find('}').map(|i| open + i) else {
            break;
        };
        out.push_str(&rest[..open]);
        let name = &rest[open + 2..close];

        match (params.get(name), defs.get(name)) {
            (Some(value), _) => out.push_str(value),
            (None, Some(def)) => match (&def.default, def.required) {
                (Some(default), _) => out.push_str(default),
                (None, true) => {
                    return Err(Error::Config(format!(
                        "missing required parameter: {}",
                        name
                    )))
                }
                (None, false) => {}
            },
            (None, None) => out.push_str(&rest[open..=close]),
        }
        rest = &rest[close + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Substitute placeholders in every string of a YAML tree.
pub fn substitute_value(
    value: &mut serde_yaml::Value,
    params: &Params,
    defs: &HashMap<String, ParamDef>,
) -> Result<()> {
    match value {
        serde_yaml::Value::String(s) => *s = substitute(s, params, defs)?,
        serde_yaml::Value::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                substitute_value(v, params, defs)?;
            }
        }
        serde_yaml::Value::Sequence(seq) => {
            for v in seq.iter_mut() {
                substitute_value(v, params, defs)?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs(entries: &[(&str, ParamDef)]) -> HashMap<String, ParamDef> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_substitute_supplied_values() {
        let params = Params::new().set("user", "jane").set("domain", "example.com");
        let result = substitute("${user}@${domain}", &params, &HashMap::new()).unwrap();
        assert_eq!(result, "jane@example.com");
    }

    #[test]
    fn test_substitute_default_and_optional() {
        let defs = defs(&[
            (
                "plan",
                ParamDef {
                    default: Some("pro".into()),
                    ..Default::default()
                },
            ),
            ("coupon", ParamDef::default()),
        ]);
        let result = substitute("plan=${plan} coupon=${coupon}", &Params::new(), &defs).unwrap();
        assert_eq!(result, "plan=pro coupon=");
    }

    #[test]
    fn test_substitute_required_missing() {
        let defs = defs(&[(
            "password",
            ParamDef {
                required: true,
                ..Default::default()
            },
        )]);
        let err = substitute("${password}", &Params::new(), &defs).unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn test_undeclared_and_unterminated_placeholders_are_kept() {
        let params = Params::new();
        assert_eq!(
            substitute("${HOME} and ${open", &params, &HashMap::new()).unwrap(),
            "${HOME} and ${open"
        );
    }

    #[test]
    fn test_params_from_args() {
        let args = vec!["email=a@b.test".to_string(), "note=x=y".to_string()];
        let params = Params::from_args(&args).unwrap();
        assert_eq!(params.get("email"), Some("a@b.test"));
        assert_eq!(params.get("note"), Some("x=y"));
        assert!(Params::from_args(&["novalue".to_string()]).is_err());
        assert!(Params::from_args(&["=x".to_string()]).is_err());
    }
}
