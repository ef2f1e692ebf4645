//! Bookshelf application library
//!
//! Feature modules plus the bootstrap that wires storage, modules and the
//! HTTP server together.

pub mod app;
pub mod modules;

pub use app::{build_registry, run};
pub use modules::*;
