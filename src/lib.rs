//! # formfill-tools
//!
//! MCP server for preset-driven form filling. Exposes the page agent from
//! `formfill-runner` as tools: load a page, inject a preset, pick elements by
//! pointing, and inspect the result.

pub mod mcp;

pub use mcp::{run_server, FormFillServer};
