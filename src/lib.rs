//! ecomap - project ecosystem graphs
//!
//! Fetches a paginated project-relations listing, reconciles dangling
//! references into placeholder entities, and projects the result into
//! mode-scoped, category-filtered, degree-bounded graphs.

pub mod cli;
pub mod config;
pub mod context;
pub mod di;
pub mod error;
pub mod graph;
pub mod models;
pub mod repositories;
pub mod services;

pub use di::FromRef;
