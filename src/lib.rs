//! navdex: cross-referenced code navigation from compiler analysis records.
//!
//! Ingests the per-crate record streams a compiler analysis pass emits and
//! builds one navigation index answering go-to-definition, find-references,
//! trait hierarchy and call graph queries.

// Core infrastructure - re-exported from navdex-core
pub use navdex_core::catalog;
pub use navdex_core::config;
pub use navdex_core::error;
pub use navdex_core::external;
pub use navdex_core::extent;
pub use navdex_core::graph;
pub use navdex_core::ids;
pub use navdex_core::index;
pub use navdex_core::ingest;
pub use navdex_core::output;
pub use navdex_core::pipeline;
pub use navdex_core::record;
pub use navdex_core::resolve;
pub use navdex_core::session;
pub use navdex_core::store;
pub use navdex_core::writers;

// Front door
pub mod cli;
