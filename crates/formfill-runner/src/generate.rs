//! Random test data for generated field values.

use chrono::{Duration, Local};
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;

/// A value produced by a generator.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for GeneratedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratedValue::Text(s) => f.write_str(s),
            GeneratedValue::Integer(n) => write!(f, "{}", n),
            GeneratedValue::Float(x) => write!(f, "{}", x),
            GeneratedValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Why a generator path produced nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    #[error("invalid generator path: {0:?}")]
    InvalidPath(String),

    #[error("unknown generator: {0}")]
    Unknown(String),
}

/// A catalog of named value generators addressed by dotted paths such as
/// `person.fullName`.
pub trait GeneratorCatalog: Send + Sync {
    /// Produce a value for `path`. Paths are already split and trimmed.
    fn generate(&self, path: &[&str]) -> Result<GeneratedValue, GenerateError>;
}

/// Built-in catalog of random, plausible-looking test data.
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeCatalog;

/// Every path [`FakeCatalog`] understands.
pub const FAKE_PATHS: &[&str] = &[
    "person.firstName",
    "person.lastName",
    "person.fullName",
    "person.jobTitle",
    "internet.email",
    "internet.username",
    "internet.password",
    "internet.url",
    "internet.domainName",
    "internet.ip",
    "phone.number",
    "location.streetAddress",
    "location.city",
    "location.state",
    "location.zipCode",
    "location.country",
    "company.name",
    "company.department",
    "date.past",
    "date.recent",
    "date.future",
    "number.int",
    "string.uuid",
    "string.nanoid",
    "commerce.productName",
    "commerce.price",
    "lorem.word",
    "lorem.sentence",
    "lorem.paragraph",
    "datatype.boolean",
];

const FIRST_NAMES: &[&str] = &[
    "Alice", "Bram", "Chloe", "Daan", "Emma", "Finn", "Grace", "Hugo", "Iris", "Jonas", "Keiko",
    "Liam", "Mila", "Noah", "Olivia", "Pieter", "Quinn", "Ruby", "Sven", "Tess",
];

const LAST_NAMES: &[&str] = &[
    "Anderson", "Bakker", "Chen", "de Vries", "Evans", "Fischer", "Garcia", "Hansen", "Ito",
    "Jansen", "Kowalski", "Lopez", "Meyer", "Nakamura", "Olsen", "Peters", "Rossi", "Smith",
];

const JOB_TITLES: &[&str] = &[
    "Software Engineer", "Product Manager", "Data Analyst", "Account Executive",
    "Support Specialist", "Designer", "Operations Lead", "QA Engineer",
];

const DOMAINS: &[&str] = &["example.com", "example.org", "example.net", "test.dev"];

const STREETS: &[&str] = &[
    "Main Street", "Oak Avenue", "Canal Road", "Station Square", "Maple Lane", "Harbor Way",
];

const CITIES: &[&str] = &[
    "Amsterdam", "Berlin", "Lisbon", "Osaka", "Portland", "Toronto", "Utrecht", "Vienna",
];

const STATES: &[&str] = &[
    "California", "Oregon", "Texas", "Bavaria", "Ontario", "Utrecht", "Kanagawa",
];

const COUNTRIES: &[&str] = &[
    "Netherlands", "Germany", "Portugal", "Japan", "United States", "Canada", "Austria",
];

const COMPANY_SUFFIXES: &[&str] = &["Labs", "Group", "Systems", "Partners", "Works", "Inc"];

const DEPARTMENTS: &[&str] = &[
    "Engineering", "Sales", "Marketing", "Finance", "Legal", "Support", "Research",
];

const PRODUCT_ADJECTIVES: &[&str] = &["Ergonomic", "Rustic", "Sleek", "Handmade", "Compact"];
const PRODUCT_MATERIALS: &[&str] = &["Steel", "Wooden", "Cotton", "Granite", "Bamboo"];
const PRODUCT_NOUNS: &[&str] = &["Chair", "Lamp", "Keyboard", "Mug", "Backpack", "Desk"];

const LOREM: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua",
];

const NANOID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

fn pick<R: Rng>(rng: &mut R, items: &[&'static str]) -> &'static str {
    items.choose(rng).copied().unwrap_or_default()
}

fn slug(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

fn words<R: Rng>(rng: &mut R, count: usize) -> Vec<&'static str> {
    (0..count).map(|_| pick(&mut *rng, LOREM)).collect()
}

fn sentence<R: Rng>(rng: &mut R) -> String {
    let count = rng.gen_range(5..=10);
    let mut text = words(rng, count).join(" ");
    if let Some(first) = text.get(..1) {
        text = first.to_uppercase() + &text[1..];
    }
    text.push('.');
    text
}

fn date_offset(days: i64) -> String {
    (Local::now() + Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

impl GeneratorCatalog for FakeCatalog {
    fn generate(&self, path: &[&str]) -> Result<GeneratedValue, GenerateError> {
        let [group, name] = path else {
            return Err(GenerateError::Unknown(path.join(".")));
        };
        let mut rng = rand::thread_rng();
        let text = |s: String| -> Result<GeneratedValue, GenerateError> { Ok(GeneratedValue::Text(s)) };

        match (*group, *name) {
            ("person", "firstName") => text(pick(&mut rng, FIRST_NAMES).to_string()),
            ("person", "lastName") => text(pick(&mut rng, LAST_NAMES).to_string()),
            ("person", "fullName") => text(format!(
                "{} {}",
                pick(&mut rng, FIRST_NAMES),
                pick(&mut rng, LAST_NAMES)
            )),
            ("person", "jobTitle") => text(pick(&mut rng, JOB_TITLES).to_string()),

            ("internet", "email") => text(format!(
                "{}.{}{}@{}",
                slug(pick(&mut rng, FIRST_NAMES)),
                slug(pick(&mut rng, LAST_NAMES)),
                rng.gen_range(1..100),
                pick(&mut rng, DOMAINS)
            )),
            ("internet", "username") => text(format!(
                "{}_{}",
                slug(pick(&mut rng, FIRST_NAMES)),
                rng.gen_range(100..10_000)
            )),
            ("internet", "password") => text(
                (&mut rng)
                    .sample_iter(&Alphanumeric)
                    .take(15)
                    .map(char::from)
                    .collect(),
            ),
            ("internet", "url") => text(format!("https://www.{}", pick(&mut rng, DOMAINS))),
            ("internet", "domainName") => text(format!(
                "{}.{}",
                slug(pick(&mut rng, LAST_NAMES)),
                pick(&mut rng, &["com", "net", "org", "io"])
            )),
            ("internet", "ip") => text(format!(
                "{}.{}.{}.{}",
                rng.gen_range(1..=223),
                rng.gen_range(0..=255),
                rng.gen_range(0..=255),
                rng.gen_range(1..=254)
            )),

            ("phone", "number") => text(format!(
                "+1-{:03}-{:03}-{:04}",
                rng.gen_range(200..1000),
                rng.gen_range(200..1000),
                rng.gen_range(0..10_000)
            )),

            ("location", "streetAddress") => text(format!(
                "{} {}",
                rng.gen_range(1..2000),
                pick(&mut rng, STREETS)
            )),
            ("location", "city") => text(pick(&mut rng, CITIES).to_string()),
            ("location", "state") => text(pick(&mut rng, STATES).to_string()),
            ("location", "zipCode") => text(format!("{:05}", rng.gen_range(10_000..100_000))),
            ("location", "country") => text(pick(&mut rng, COUNTRIES).to_string()),

            ("company", "name") => text(format!(
                "{} {}",
                pick(&mut rng, LAST_NAMES),
                pick(&mut rng, COMPANY_SUFFIXES)
            )),
            ("company", "department") => text(pick(&mut rng, DEPARTMENTS).to_string()),

            ("date", "past") => text(date_offset(-rng.gen_range(1..=3650))),
            ("date", "recent") => text(date_offset(-rng.gen_range(0..=7))),
            ("date", "future") => text(date_offset(rng.gen_range(1..=365))),

            ("number", "int") => Ok(GeneratedValue::Integer(rng.gen_range(1..=1000))),
            ("string", "uuid") => text(uuid::Uuid::new_v4().to_string()),
            ("string", "nanoid") => text(
                (0..21)
                    .map(|_| NANOID_ALPHABET[rng.gen_range(0..NANOID_ALPHABET.len())] as char)
                    .collect(),
            ),

            ("commerce", "productName") => text(format!(
                "{} {} {}",
                pick(&mut rng, PRODUCT_ADJECTIVES),
                pick(&mut rng, PRODUCT_MATERIALS),
                pick(&mut rng, PRODUCT_NOUNS)
            )),
            ("commerce", "price") => text(format!("{:.2}", rng.gen_range(1.0..1000.0))),

            ("lorem", "word") => text(pick(&mut rng, LOREM).to_string()),
            ("lorem", "sentence") => text(sentence(&mut rng)),
            ("lorem", "paragraph") => {
                let count = rng.gen_range(3..=5);
                text((0..count)
                    .map(|_| sentence(&mut rng))
                    .collect::<Vec<_>>()
                    .join(" "))
            }

            ("datatype", "boolean") => Ok(GeneratedValue::Bool(rng.gen_bool(0.5))),

            _ => Err(GenerateError::Unknown(path.join("."))),
        }
    }
}

/// Split a dotted generator path into trimmed segments. An empty segment
/// makes the whole path unresolvable.
pub fn split_path(path: &str) -> Result<Vec<&str>, GenerateError> {
    let segments: Vec<&str> = path.split('.').map(str::trim).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(GenerateError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

/// Field names mapped to generator paths, consulted in order.
const FIELD_GENERATORS: &[(&str, &str)] = &[
    ("firstname", "person.firstName"),
    ("lastname", "person.lastName"),
    ("fullname", "person.fullName"),
    ("username", "internet.username"),
    ("password", "internet.password"),
    ("email", "internet.email"),
    ("phone", "phone.number"),
    ("mobile", "phone.number"),
    ("address", "location.streetAddress"),
    ("city", "location.city"),
    ("state", "location.state"),
    ("zipcode", "location.zipCode"),
    ("postalcode", "location.zipCode"),
    ("country", "location.country"),
    ("company", "company.name"),
    ("companyname", "company.name"),
    ("jobtitle", "person.jobTitle"),
    ("department", "company.department"),
    ("birthdate", "date.past"),
    ("startdate", "date.recent"),
    ("enddate", "date.future"),
    ("website", "internet.url"),
    ("url", "internet.url"),
    ("domain", "internet.domainName"),
    ("ip", "internet.ip"),
    ("uuid", "string.uuid"),
    ("id", "string.nanoid"),
    ("productname", "commerce.productName"),
    ("price", "commerce.price"),
    ("title", "lorem.sentence"),
    ("description", "lorem.paragraph"),
    ("comment", "lorem.paragraph"),
    ("notes", "lorem.paragraph"),
];

/// Guess a generator for a form field from its name, e.g. `userEmail` ->
/// `internet.email`.
pub fn suggest_generator(field_name: &str) -> Option<&'static str> {
    let normalized: String = field_name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if normalized.is_empty() {
        return None;
    }
    if let Some((_, path)) = FIELD_GENERATORS.iter().find(|(key, _)| *key == normalized) {
        return Some(path);
    }
    FIELD_GENERATORS
        .iter()
        .find(|(key, _)| normalized.contains(key) || key.contains(normalized.as_str()))
        .map(|(_, path)| *path)
}
