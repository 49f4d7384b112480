pub mod params;
pub mod schema;

pub use params::{ParamDef, Params};
pub use schema::{FieldRule, FieldType, Preset, ValueStrategy};
