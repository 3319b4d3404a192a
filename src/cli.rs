//! CLI front door.
//!
//! Provides the command implementations behind the `navdex` binary:
//! - `index` - ingest record streams and write an index file
//! - `query` - answer a navigation query against a written index
//!
//! Both return response values; the binary serializes them to stdout. All
//! failures surface as [`IndexError`] so the binary can map them to a stable
//! exit code.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use navdex_core::catalog::FileCatalog;
use navdex_core::config::{CliOverrides, IndexConfig};
use navdex_core::error::{IndexError, IndexResult};
use navdex_core::ids::GlobalId;
use navdex_core::index::Index;
use navdex_core::ingest::{discover, UnitSource};
use navdex_core::output::{IndexResponse, QueryResponse};
use navdex_core::pipeline::Indexer;

// ============================================================================
// index
// ============================================================================

/// Inputs of `navdex index`.
#[derive(Debug, Clone)]
pub struct IndexArgs {
    /// Root the file catalog is scanned from.
    pub source_root: PathBuf,
    /// Where the index is written.
    pub output: PathBuf,
    /// Record stream files or directories of them.
    pub units: Vec<PathBuf>,
    pub overrides: CliOverrides,
}

/// Build an index and write it to `args.output`.
///
/// The file is written only after the whole run succeeded.
pub fn run_index(args: &IndexArgs) -> IndexResult<IndexResponse> {
    if !args.source_root.is_dir() {
        return Err(IndexError::invalid_config(format!(
            "source root '{}' is not a directory",
            args.source_root.display()
        )));
    }
    let config = IndexConfig::resolve(Some(&args.source_root), &args.overrides)?;
    let catalog = FileCatalog::scan(&args.source_root, &config.exclude_patterns())?;

    let unit_paths = discover(&args.units)?;
    if unit_paths.is_empty() {
        return Err(IndexError::invalid_config("no record streams given"));
    }
    let units = unit_paths
        .iter()
        .map(|path| UnitSource::from_path(path))
        .collect::<IndexResult<Vec<_>>>()?;

    let (index, report) = Indexer::new(config, catalog).run(&units)?;
    index.save(&args.output)?;
    info!(output = %args.output.display(), "index written");
    Ok(IndexResponse::new(args.output.display().to_string(), report))
}

// ============================================================================
// query
// ============================================================================

/// The entity a query is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    Id(u32),
    Qualname(String),
}

/// A navigation query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Entity at a byte offset in a file.
    Definition { file: String, offset: u64 },
    References(Subject),
    Callers(Subject),
    Callees(Subject),
    Supertraits(Subject),
    Subtraits(Subject),
    Impls(Subject),
}

impl Query {
    pub fn name(&self) -> &'static str {
        match self {
            Query::Definition { .. } => "definition",
            Query::References(_) => "references",
            Query::Callers(_) => "callers",
            Query::Callees(_) => "callees",
            Query::Supertraits(_) => "supertraits",
            Query::Subtraits(_) => "subtraits",
            Query::Impls(_) => "impls",
        }
    }
}

/// Load the index at `index_path` and answer `query`.
pub fn run_query(index_path: &Path, query: &Query) -> IndexResult<QueryResponse<serde_json::Value>> {
    let index = Index::load(index_path)?;
    let results = answer(&index, query)?;
    Ok(QueryResponse::new(query.name(), results))
}

/// Answer a query against an already loaded index.
pub fn answer(index: &Index, query: &Query) -> IndexResult<Vec<serde_json::Value>> {
    match query {
        Query::Definition { file, offset } => {
            let found = index.definition_of(file, *offset);
            to_values(found.into_iter())
        }
        Query::References(subject) => {
            let id = resolve_subject(index, subject)?;
            to_values(index.references_to(id).into_iter())
        }
        Query::Callers(subject) => {
            let id = resolve_subject(index, subject)?;
            to_values(index.callers_of(id).into_iter().filter_map(|c| index.entity(c)))
        }
        Query::Callees(subject) => {
            let id = resolve_subject(index, subject)?;
            to_values(index.callees_of(id).into_iter().filter_map(|c| index.entity(c)))
        }
        Query::Supertraits(subject) => {
            let id = resolve_subject(index, subject)?;
            to_values(index.supertraits_of(id).into_iter())
        }
        Query::Subtraits(subject) => {
            let id = resolve_subject(index, subject)?;
            to_values(index.subtraits_of(id).into_iter())
        }
        Query::Impls(subject) => {
            let id = resolve_subject(index, subject)?;
            to_values(index.impls_of(id).into_iter())
        }
    }
}

/// Map a subject to one global id. A qualified name naming several entities
/// picks the lowest id.
fn resolve_subject(index: &Index, subject: &Subject) -> IndexResult<GlobalId> {
    let found = match subject {
        Subject::Id(id) => index.entity(GlobalId::new(*id)).map(|e| e.id()),
        Subject::Qualname(qualname) => index
            .find_by_qualname(qualname)
            .iter()
            .map(|e| e.id())
            .min(),
    };
    found.ok_or_else(|| IndexError::NotFound {
        subject: match subject {
            Subject::Id(id) => id.to_string(),
            Subject::Qualname(qualname) => qualname.clone(),
        },
    })
}

fn to_values<T: Serialize>(items: impl Iterator<Item = T>) -> IndexResult<Vec<serde_json::Value>> {
    items
        .map(|item| serde_json::to_value(item).map_err(IndexError::from))
        .collect()
}
