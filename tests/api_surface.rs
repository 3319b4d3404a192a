//! Compile-only test to verify public API surface.
//!
//! This file serves as a compile-time contract for the public API.
//! If this file fails to compile, the public API has regressed.
//!
//! Run with: cargo test -- api_surface

// Allow unused imports - this test is about compile-time verification, not runtime usage
#![allow(unused_imports)]

// ============================================================================
// Records and ids
// ============================================================================

use navdex::record::{
    parse_raw, parse_record, split_fields, Attrs, CrateRecord, ExternCrateRecord,
    ExternalCrateRecord, FunctionRecord, ImplRecord, InheritanceRecord, MethodDeclRecord,
    ModuleRecord, RawRecord, Record, RecordError, RecordKind, RefRecord, Site, TypeRecord,
    UseAliasRecord, VariableRecord,
};

use navdex::extent::{Extent, FileId};
use navdex::ids::{CrateEntry, CrateLocalId, CrateNum, CrateTable, GlobalId, IdUnifier, LocalId};

// ============================================================================
// Store and index
// ============================================================================

use navdex::store::{
    Caller, CommitPoint, Crate, ExternLocation, File, Function, FunctionKind, Impl, IndexStore,
    Inheritance, InheritanceKind, Module, ModuleAlias, RefKind, Reference, ReferenceId, Type,
    TypeKind, Unknown, Variable, DEFAULT_BATCH_SIZE, INDEX_SCHEMA_VERSION,
};

use navdex::index::{Definition, Entity, Index, IndexTables};

// ============================================================================
// Run phases
// ============================================================================

use navdex::catalog::{build_exclude_set, content_hash, FileCache, FileCatalog, FileLookup};
use navdex::config::{
    CliOverrides, ConfigSource, ConfigValue, ExternLocationConfig, IndexConfig, ProjectConfig,
    PROJECT_CONFIG_FILE,
};
use navdex::external::{emit_extern_locations, reference_target, stub_foreign_roots};
use navdex::graph::{build_graphs, call_graph, inheritance_closure, GraphReport};
use navdex::ingest::{discover, dispatch, ingest_unit, scan_crate_name, UnitSource};
use navdex::pipeline::{IndexReport, Indexer};
use navdex::resolve::{rewrite_constructors, run_fixups, FixupReport};
use navdex::session::{Diagnostic, DiagnosticCode, IngestSession, Target};
use navdex::writers::short_name;

// ============================================================================
// Errors and output
// ============================================================================

use navdex::error::{IndexError, IndexResult, OutputErrorCode};
use navdex::output::{
    emit_response, emit_response_compact, ErrorInfo, ErrorResponse, IndexResponse,
    QueryResponse, SCHEMA_VERSION,
};

// ============================================================================
// Front door
// ============================================================================

use navdex::cli::{answer, run_index, run_query, IndexArgs, Query, Subject};

#[test]
fn api_surface_compiles() {
    // If this compiles, the public API surface is intact.
}
