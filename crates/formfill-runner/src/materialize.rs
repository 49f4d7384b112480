//! Turn a field rule into the concrete string written into the page.

use crate::config::{FieldRule, ValueStrategy};
use crate::generate::{split_path, GeneratorCatalog};
use tracing::{debug, warn};

/// Produce the value for `rule`. Never fails: anything that cannot be
/// produced becomes the empty string.
pub fn materialize(rule: &FieldRule, catalog: &dyn GeneratorCatalog) -> String {
    match rule.value_strategy {
        ValueStrategy::Static => rule.static_value.clone().unwrap_or_default(),
        ValueStrategy::Generated => {
            let Some(path) = rule.generator.as_deref() else {
                debug!("field '{}': generated value without a generator", rule.id);
                return String::new();
            };
            let generated = split_path(path).and_then(|segments| catalog.generate(&segments));
            match generated {
                Ok(value) => value.to_string(),
                Err(e) => {
                    warn!("field '{}': {}", rule.id, e);
                    String::new()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::{FakeCatalog, GenerateError, GeneratedValue};

    struct Fixed;

    impl GeneratorCatalog for Fixed {
        fn generate(&self, path: &[&str]) -> Result<GeneratedValue, GenerateError> {
            match path {
                ["n", "int"] => Ok(GeneratedValue::Integer(42)),
                ["n", "float"] => Ok(GeneratedValue::Float(2.5)),
                ["flag"] => Ok(GeneratedValue::Bool(true)),
                ["person", "name"] => Ok(GeneratedValue::Text("Ada".into())),
                _ => Err(GenerateError::Unknown(path.join("."))),
            }
        }
    }

    #[test]
    fn test_static_values() {
        let rule = FieldRule::new("a", "a").with_value("hello");
        assert_eq!(materialize(&rule, &Fixed), "hello");
        let empty = FieldRule::new("b", "b");
        assert_eq!(materialize(&empty, &Fixed), "");
    }

    #[test]
    fn test_generated_values_are_stringified() {
        let cases = [
            ("n.int", "42"),
            ("n.float", "2.5"),
            ("flag", "true"),
            (" person . name ", "Ada"),
        ];
        for (path, expected) in cases {
            let rule = FieldRule::new("x", "x").with_generator(path);
            assert_eq!(materialize(&rule, &Fixed), expected, "path {}", path);
        }
    }

    #[test]
    fn test_unresolvable_generators_yield_empty() {
        for path in ["nope.nothing", "person..name", "", "."] {
            let rule = FieldRule::new("x", "x").with_generator(path);
            assert_eq!(materialize(&rule, &Fixed), "");
        }
        let mut rule = FieldRule::new("x", "x").with_generator("n.int");
        rule.generator = None;
        assert_eq!(materialize(&rule, &Fixed), "");
    }

    #[test]
    fn test_static_ignores_generator() {
        let mut rule = FieldRule::new("x", "x").with_value("fixed");
        rule.generator = Some("n.int".into());
        assert_eq!(materialize(&rule, &Fixed), "fixed");
    }

    #[test]
    fn test_builtin_catalog() {
        let rule = FieldRule::new("mail", "email").with_generator("internet.email");
        assert!(materialize(&rule, &FakeCatalog).contains('@'));
    }
}
