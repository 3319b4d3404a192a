//! Ingestion session state.
//!
//! One [`IngestSession`] owns every piece of mutable state a run needs: the
//! id unifier, the store being built, the constructor id map, pending
//! inheritance edges, the file cache and collected diagnostics. Nothing here
//! is global; a session lives for exactly one run and is consumed when the
//! index is frozen.
//!
//! Per-unit state (the unit name, current line and crate table) is reset by
//! [`IngestSession::begin_unit`].

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::{FileCache, FileCatalog, FileLookup};
use crate::extent::FileId;
use crate::ids::{CrateEntry, CrateLocalId, CrateNum, CrateTable, GlobalId, IdUnifier, LocalId};
use crate::record::{RecordError, RecordKind};
use crate::store::{CommitPoint, IndexStore, Unknown};

// ============================================================================
// Diagnostics
// ============================================================================

/// Kind of recoverable condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    /// A record names a file that is not in the catalog.
    MissingFile,
    /// A reference target that names no entity was reset to the sentinel.
    DanglingTarget,
}

/// A recoverable, per-record condition. Ingestion continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

// ============================================================================
// Resolved targets
// ============================================================================

/// A unit-local id mapped through the crate table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub id: GlobalId,
    pub crate_name: String,
    /// The owning crate is not part of this run.
    pub foreign: bool,
}

#[derive(Debug)]
struct UnitState {
    name: String,
    line: usize,
    crates: Option<CrateTable>,
}

// ============================================================================
// IngestSession
// ============================================================================

/// Mutable state of one indexing run.
#[derive(Debug)]
pub struct IngestSession {
    catalog: FileCatalog,
    language: String,
    batch_size: usize,
    ids: IdUnifier,
    store: IndexStore,

    /// Crates whose record streams are part of this run.
    local_crates: HashSet<String>,
    /// Foreign crates registered by any unit.
    foreign_crates: BTreeSet<String>,
    /// `extern crate` location strings seen.
    extern_crate_locations: BTreeSet<String>,

    /// Constructor global id → struct definition global id.
    ctor_map: HashMap<GlobalId, GlobalId>,
    /// Direct trait edges as (derived, base).
    pending_inheritance: Vec<(GlobalId, GlobalId)>,

    files: FileCache,
    diagnostics: Vec<Diagnostic>,

    unit: Option<UnitState>,
    records: u64,
    since_commit: usize,
}

impl IngestSession {
    /// Create a session over a file catalog.
    pub fn new(catalog: FileCatalog, language: impl Into<String>, batch_size: usize) -> Self {
        let mut store = IndexStore::new();
        for file in catalog.files() {
            store.insert_file(file.clone());
        }
        IngestSession {
            catalog,
            language: language.into(),
            batch_size: batch_size.max(1),
            ids: IdUnifier::new(),
            store,
            local_crates: HashSet::new(),
            foreign_crates: BTreeSet::new(),
            extern_crate_locations: BTreeSet::new(),
            ctor_map: HashMap::new(),
            pending_inheritance: Vec::new(),
            files: FileCache::new(),
            diagnostics: Vec::new(),
            unit: None,
            records: 0,
            since_commit: 0,
        }
    }

    /// Mark a crate as part of this run.
    pub fn declare_local_crate(&mut self, name: impl Into<String>) {
        self.local_crates.insert(name.into());
    }

    pub fn is_local_crate(&self, name: &str) -> bool {
        self.local_crates.contains(name)
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut IndexStore {
        &mut self.store
    }

    pub fn ids(&self) -> &IdUnifier {
        &self.ids
    }

    pub fn foreign_crates(&self) -> &BTreeSet<String> {
        &self.foreign_crates
    }

    pub fn extern_crate_locations(&self) -> &BTreeSet<String> {
        &self.extern_crate_locations
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    /// Give up the store and diagnostics at the end of a run.
    pub fn into_parts(self) -> (IndexStore, Vec<Diagnostic>) {
        (self.store, self.diagnostics)
    }

    // ------------------------------------------------------------------------
    // Units and batching
    // ------------------------------------------------------------------------

    /// Start a new unit. Crate numbers from the previous unit are forgotten.
    pub fn begin_unit(&mut self, name: impl Into<String>) {
        self.unit = Some(UnitState {
            name: name.into(),
            line: 0,
            crates: None,
        });
    }

    pub fn end_unit(&mut self) {
        self.unit = None;
    }

    /// Name of the unit being ingested.
    pub fn unit_name(&self) -> Option<&str> {
        self.unit.as_ref().map(|u| u.name.as_str())
    }

    /// Record the line about to be dispatched.
    pub fn set_line(&mut self, line: usize) {
        if let Some(unit) = self.unit.as_mut() {
            unit.line = line;
        }
    }

    /// Count one ingested record, committing a batch when one fills up.
    pub fn count_record(&mut self) -> Option<CommitPoint> {
        self.records += 1;
        self.since_commit += 1;
        if self.since_commit < self.batch_size {
            return None;
        }
        self.since_commit = 0;
        Some(self.store.commit_batch(self.records))
    }

    /// Commit whatever is pending, if anything.
    pub fn flush(&mut self) -> Option<CommitPoint> {
        if self.since_commit == 0 {
            return None;
        }
        self.since_commit = 0;
        Some(self.store.commit_batch(self.records))
    }

    // ------------------------------------------------------------------------
    // Crates and ids
    // ------------------------------------------------------------------------

    /// Handle the unit's `crate` record. Returns the crate's root id.
    pub fn begin_crate(&mut self, name: &str) -> Result<GlobalId, RecordError> {
        let root = self.ids.crate_root(name);
        let unit = self.unit.get_or_insert_with(|| UnitState {
            name: String::new(),
            line: 0,
            crates: None,
        });
        if let Some(existing) = &unit.crates {
            return Err(RecordError::DuplicateCrateRecord {
                existing: existing.local().name.clone(),
            });
        }
        unit.crates = Some(CrateTable::new(CrateEntry {
            name: name.to_string(),
            root,
        }));
        self.local_crates.insert(name.to_string());
        Ok(root)
    }

    /// Handle an `external_crate` record.
    pub fn register_external_crate(&mut self, num: CrateNum, name: &str) -> Result<(), RecordError> {
        let root = self.ids.crate_root(name);
        self.crates_mut(RecordKind::ExternalCrate)?.register(
            num,
            CrateEntry {
                name: name.to_string(),
                root,
            },
        )?;
        if !self.is_local_crate(name) {
            self.foreign_crates.insert(name.to_string());
        }
        Ok(())
    }

    /// Handle `end_external_crates`.
    pub fn close_external_crates(&mut self) -> Result<(), RecordError> {
        self.crates_mut(RecordKind::EndExternalCrates)?.close();
        Ok(())
    }

    fn crates(&self, kind: RecordKind) -> Result<&CrateTable, RecordError> {
        self.unit
            .as_ref()
            .and_then(|u| u.crates.as_ref())
            .ok_or(RecordError::NoCrateRecord { kind: kind.tag() })
    }

    fn crates_mut(&mut self, kind: RecordKind) -> Result<&mut CrateTable, RecordError> {
        self.unit
            .as_mut()
            .and_then(|u| u.crates.as_mut())
            .ok_or(RecordError::NoCrateRecord { kind: kind.tag() })
    }

    /// The unit's own crate.
    pub fn local_crate(&self, kind: RecordKind) -> Result<&CrateEntry, RecordError> {
        Ok(self.crates(kind)?.local())
    }

    /// Root id of the crate behind a unit-local crate number.
    pub fn crate_entry(&self, kind: RecordKind, num: CrateNum) -> Result<CrateEntry, RecordError> {
        Ok(self.crates(kind)?.get(num)?.clone())
    }

    /// Global id of an id in the unit's own crate.
    pub fn local_global(&mut self, kind: RecordKind, id: LocalId) -> Result<GlobalId, RecordError> {
        let name = self.local_crate(kind)?.name.clone();
        Ok(self.ids.global_id(&name, id))
    }

    /// Map a crate-qualified id to its global id.
    pub fn target(&mut self, kind: RecordKind, id: CrateLocalId) -> Result<Target, RecordError> {
        let entry = self.crate_entry(kind, id.krate)?;
        let global = self.ids.global_id(&entry.name, id.id);
        Ok(Target {
            id: global,
            foreign: !self.is_local_crate(&entry.name),
            crate_name: entry.name,
        })
    }

    /// Insert a stub for a foreign entity unless one exists.
    pub fn ensure_stub(&mut self, crate_name: &str, id: GlobalId, qualname: Option<String>) -> bool {
        if id.is_none() {
            return false;
        }
        let inserted = self.store.insert_unknown(Unknown {
            id,
            crate_name: crate_name.to_string(),
            qualname,
        });
        if inserted {
            debug!(krate = crate_name, id = %id, "foreign stub created");
        }
        inserted
    }

    /// Remember an `extern crate` location string.
    pub fn note_extern_location(&mut self, location: &str) {
        self.extern_crate_locations.insert(location.to_string());
    }

    // ------------------------------------------------------------------------
    // Side tables
    // ------------------------------------------------------------------------

    /// Record that `ctor` is a struct constructor id for `definition`.
    pub fn record_ctor(&mut self, ctor: GlobalId, definition: GlobalId) {
        self.ctor_map.insert(ctor, definition);
    }

    pub fn ctor_map(&self) -> &HashMap<GlobalId, GlobalId> {
        &self.ctor_map
    }

    /// Queue a direct trait edge: `derived` extends `base`.
    pub fn push_inheritance(&mut self, derived: GlobalId, base: GlobalId) {
        self.pending_inheritance.push((derived, base));
    }

    pub fn pending_inheritance(&self) -> &[(GlobalId, GlobalId)] {
        &self.pending_inheritance
    }

    // ------------------------------------------------------------------------
    // Files and diagnostics
    // ------------------------------------------------------------------------

    /// Resolve a record's file name, noting a diagnostic for unknown paths.
    pub fn file_id(&mut self, path: Option<&str>) -> Option<FileId> {
        match self.files.resolve(&self.catalog, path) {
            FileLookup::Found(id) => Some(id),
            FileLookup::NoPath => None,
            FileLookup::Missing { first } => {
                if first {
                    let path = path.unwrap_or_default().to_string();
                    self.note(
                        DiagnosticCode::MissingFile,
                        format!("file '{}' is not in the file catalog", path),
                    );
                }
                None
            }
        }
    }

    /// Add a diagnostic tagged with the current unit and line.
    pub fn note(&mut self, code: DiagnosticCode, message: String) {
        let (unit, line) = match &self.unit {
            Some(u) => (Some(u.name.clone()), Some(u.line)),
            None => (None, None),
        };
        match code {
            DiagnosticCode::MissingFile => warn!(
                unit = unit.as_deref().unwrap_or(""),
                line = line.unwrap_or(0),
                "{}",
                message
            ),
            DiagnosticCode::DanglingTarget => debug!("{}", message),
        }
        self.diagnostics.push(Diagnostic {
            code,
            message,
            unit,
            line,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
