//! blockbeat (workspace facade crate).
//!
//! Re-exports the workspace crates as `blockbeat::{core, control, render, term, engine, types}`
//! so the binary, the integration tests and the benches share one import path.

pub use blockbeat_control as control;
pub use blockbeat_core as core;
pub use blockbeat_engine as engine;
pub use blockbeat_render as render;
pub use blockbeat_term as term;
pub use blockbeat_types as types;
