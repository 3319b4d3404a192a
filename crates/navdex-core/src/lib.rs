//! Core infrastructure for navdex.
//!
//! This crate turns the per-crate record streams emitted by a compiler analysis
//! pass into one globally cross-referenced navigation index:
//! - Record parsing and typed decoding ([`record`])
//! - Run-wide id unification ([`ids`])
//! - Relational entity/edge tables ([`store`]) frozen into an [`index::Index`]
//! - Ingestion session, entity writers and the record dispatcher
//! - Deferred reference fixups ([`resolve`]) and foreign-crate stubs ([`external`])
//! - Derived relationships: trait closure and call graph ([`graph`])
//! - The end-to-end [`pipeline::Indexer`]

pub mod catalog;
pub mod config;
pub mod error;
pub mod extent;
pub mod external;
pub mod graph;
pub mod ids;
pub mod index;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod resolve;
pub mod session;
pub mod store;
pub mod writers;
