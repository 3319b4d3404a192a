//! Mutable index store used during a run.
//!
//! Entity and edge tables live in `BTreeMap`s keyed by id so iteration (and
//! therefore serialized output) is deterministic. `HashMap` postings lists
//! back the lookups the fixup and graph passes need.
//!
//! The store is written by ingestion, patched in place by the fixup passes,
//! receives its derived tables exactly once, and is finally frozen into an
//! immutable [`Index`].

mod tables;

pub use tables::*;

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info};

use crate::error::{IndexError, IndexResult};
use crate::extent::FileId;
use crate::ids::GlobalId;
use crate::index::{Index, IndexTables};

/// Schema version of the serialized index. Bump on any column change.
pub const INDEX_SCHEMA_VERSION: u32 = 2;

/// Record count between commit points when nothing else is configured.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// A batch boundary. Work before the last commit point survives a failure
/// only in the sense that it is known-complete; the index is still discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitPoint {
    /// 1-based batch number.
    pub batch: u32,
    /// Records ingested so far across all units.
    pub records: u64,
    pub entities: usize,
    pub references: usize,
}

// ============================================================================
// IndexStore
// ============================================================================

/// In-memory relational tables for one run.
#[derive(Debug, Default)]
pub struct IndexStore {
    // Primary storage (BTreeMap for deterministic iteration)
    files: BTreeMap<FileId, File>,
    crates: BTreeMap<GlobalId, Crate>,
    modules: BTreeMap<GlobalId, Module>,
    module_aliases: BTreeMap<GlobalId, ModuleAlias>,
    functions: BTreeMap<GlobalId, Function>,
    variables: BTreeMap<GlobalId, Variable>,
    types: BTreeMap<GlobalId, Type>,
    impls: BTreeMap<GlobalId, Impl>,
    unknowns: BTreeMap<GlobalId, Unknown>,
    extern_locations: BTreeMap<String, ExternLocation>,
    references: BTreeMap<ReferenceId, Reference>,

    // Derived tables, written once by the graph builder
    inheritance: Vec<Inheritance>,
    callers: Vec<Caller>,
    derived_written: bool,

    // Secondary indexes
    /// path → FileId.
    file_by_path: HashMap<String, FileId>,
    /// qualname → module ids.
    modules_by_qualname: HashMap<String, Vec<GlobalId>>,
    /// qualname → type ids.
    types_by_qualname: HashMap<String, Vec<GlobalId>>,
    /// (file, local name) → alias ids, in insertion order.
    aliases_by_file_name: HashMap<(FileId, String), Vec<GlobalId>>,
    /// declaration id → implementing function ids.
    functions_by_declid: HashMap<GlobalId, Vec<GlobalId>>,

    // ID generators
    next_file_id: u32,
    next_ref_id: u32,

    commit_points: Vec<CommitPoint>,
}

impl IndexStore {
    /// Create an empty store.
    pub fn new() -> Self {
        IndexStore::default()
    }

    // ------------------------------------------------------------------------
    // ID generation
    // ------------------------------------------------------------------------

    /// Generate the next FileId.
    pub fn next_file_id(&mut self) -> FileId {
        let id = FileId::new(self.next_file_id);
        self.next_file_id += 1;
        id
    }

    fn next_reference_id(&mut self) -> ReferenceId {
        self.next_ref_id += 1;
        ReferenceId::new(self.next_ref_id)
    }

    // ------------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------------

    /// Insert a catalog file.
    pub fn insert_file(&mut self, file: File) {
        self.file_by_path.insert(file.path.clone(), file.file_id);
        self.files.insert(file.file_id, file);
    }

    /// Insert a crate row, keyed by its root module id.
    pub fn insert_crate(&mut self, krate: Crate) {
        self.crates.insert(krate.id, krate);
    }

    /// Insert a module.
    pub fn insert_module(&mut self, module: Module) {
        self.modules_by_qualname
            .entry(module.qualname.clone())
            .or_default()
            .push(module.id);
        self.modules.insert(module.id, module);
    }

    /// Insert a `use` or `extern crate` binding.
    pub fn insert_module_alias(&mut self, alias: ModuleAlias) {
        if let Some(file_id) = alias.file_id {
            self.aliases_by_file_name
                .entry((file_id, alias.name.clone()))
                .or_default()
                .push(alias.id);
        }
        self.module_aliases.insert(alias.id, alias);
    }

    /// Insert a function or trait method declaration.
    pub fn insert_function(&mut self, function: Function) {
        if let Some(declid) = function.declid {
            self.functions_by_declid
                .entry(declid)
                .or_default()
                .push(function.id);
        }
        self.functions.insert(function.id, function);
    }

    /// Insert a variable.
    pub fn insert_variable(&mut self, variable: Variable) {
        self.variables.insert(variable.id, variable);
    }

    /// Insert a struct, trait or typedef.
    pub fn insert_type(&mut self, ty: Type) {
        self.types_by_qualname
            .entry(ty.qualname.clone())
            .or_default()
            .push(ty.id);
        self.types.insert(ty.id, ty);
    }

    /// Insert an impl block.
    pub fn insert_impl(&mut self, imp: Impl) {
        self.impls.insert(imp.id, imp);
    }

    /// Insert a foreign stub unless one already exists for `id`.
    ///
    /// Returns `true` if a row was inserted.
    pub fn insert_unknown(&mut self, unknown: Unknown) -> bool {
        if self.unknowns.contains_key(&unknown.id) {
            return false;
        }
        self.unknowns.insert(unknown.id, unknown);
        true
    }

    /// Insert (or replace) the URLs for a foreign location.
    pub fn insert_extern_location(&mut self, location: ExternLocation) {
        self.extern_locations
            .insert(location.location.clone(), location);
    }

    /// Insert a reference and return its assigned id.
    pub fn insert_reference(&mut self, mut reference: Reference) -> ReferenceId {
        let ref_id = self.next_reference_id();
        reference.ref_id = ref_id;
        self.references.insert(ref_id, reference);
        ref_id
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    /// FileId for a catalog path.
    pub fn file_by_path(&self, path: &str) -> Option<FileId> {
        self.file_by_path.get(path).copied()
    }

    pub fn files(&self) -> impl Iterator<Item = &File> {
        self.files.values()
    }

    pub fn crates(&self) -> impl Iterator<Item = &Crate> {
        self.crates.values()
    }

    pub fn module(&self, id: GlobalId) -> Option<&Module> {
        self.modules.get(&id)
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    /// Modules with an exact qualified name.
    pub fn modules_by_qualname(&self, qualname: &str) -> &[GlobalId] {
        self.modules_by_qualname
            .get(qualname)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn module_alias(&self, id: GlobalId) -> Option<&ModuleAlias> {
        self.module_aliases.get(&id)
    }

    pub fn module_aliases(&self) -> impl Iterator<Item = &ModuleAlias> {
        self.module_aliases.values()
    }

    /// Aliases binding `name` in `file`, in insertion order.
    pub fn aliases_named(&self, file_id: FileId, name: &str) -> Vec<&ModuleAlias> {
        self.aliases_by_file_name
            .get(&(file_id, name.to_string()))
            .into_iter()
            .flatten()
            .filter_map(|id| self.module_aliases.get(id))
            .collect()
    }

    pub fn function(&self, id: GlobalId) -> Option<&Function> {
        self.functions.get(&id)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    /// Functions implementing the trait method `declid`.
    pub fn functions_with_declid(&self, declid: GlobalId) -> &[GlobalId] {
        self.functions_by_declid
            .get(&declid)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    pub fn type_row(&self, id: GlobalId) -> Option<&Type> {
        self.types.get(&id)
    }

    pub fn types(&self) -> impl Iterator<Item = &Type> {
        self.types.values()
    }

    /// Types with an exact qualified name.
    pub fn types_by_qualname(&self, qualname: &str) -> &[GlobalId] {
        self.types_by_qualname
            .get(qualname)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn impls(&self) -> impl Iterator<Item = &Impl> {
        self.impls.values()
    }

    pub fn unknown(&self, id: GlobalId) -> Option<&Unknown> {
        self.unknowns.get(&id)
    }

    pub fn unknowns(&self) -> impl Iterator<Item = &Unknown> {
        self.unknowns.values()
    }

    pub fn extern_locations(&self) -> impl Iterator<Item = &ExternLocation> {
        self.extern_locations.values()
    }

    pub fn reference(&self, id: ReferenceId) -> Option<&Reference> {
        self.references.get(&id)
    }

    /// Mutable access for in-place fixups.
    pub fn reference_mut(&mut self, id: ReferenceId) -> Option<&mut Reference> {
        self.references.get_mut(&id)
    }

    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.references.values()
    }

    /// Mutable access to every reference, in id order.
    pub fn references_mut(&mut self) -> impl Iterator<Item = &mut Reference> {
        self.references.values_mut()
    }

    pub fn inheritance(&self) -> &[Inheritance] {
        &self.inheritance
    }

    pub fn callers(&self) -> &[Caller] {
        &self.callers
    }

    /// True if `id` names any row a reference may point at.
    pub fn is_entity(&self, id: GlobalId) -> bool {
        self.crates.contains_key(&id)
            || self.modules.contains_key(&id)
            || self.module_aliases.contains_key(&id)
            || self.functions.contains_key(&id)
            || self.variables.contains_key(&id)
            || self.types.contains_key(&id)
            || self.impls.contains_key(&id)
            || self.unknowns.contains_key(&id)
    }

    /// Number of entity rows across all tables.
    pub fn entity_count(&self) -> usize {
        self.crates.len()
            + self.modules.len()
            + self.module_aliases.len()
            + self.functions.len()
            + self.variables.len()
            + self.types.len()
            + self.impls.len()
            + self.unknowns.len()
    }

    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Record a batch boundary.
    pub fn commit_batch(&mut self, records: u64) -> CommitPoint {
        let point = CommitPoint {
            batch: self.commit_points.len() as u32 + 1,
            records,
            entities: self.entity_count(),
            references: self.reference_count(),
        };
        debug!(
            batch = point.batch,
            records = point.records,
            entities = point.entities,
            references = point.references,
            "batch committed"
        );
        self.commit_points.push(point);
        point
    }

    pub fn commit_points(&self) -> &[CommitPoint] {
        &self.commit_points
    }

    /// Write the derived inheritance and call graph tables.
    ///
    /// May only be called once per run.
    pub fn set_derived_tables(
        &mut self,
        inheritance: Vec<Inheritance>,
        callers: Vec<Caller>,
    ) -> IndexResult<()> {
        if self.derived_written {
            return Err(IndexError::internal("derived tables already written"));
        }
        self.inheritance = inheritance;
        self.callers = callers;
        self.derived_written = true;
        Ok(())
    }

    pub fn has_derived_tables(&self) -> bool {
        self.derived_written
    }

    /// Reset every non-entity reference target to the sentinel.
    ///
    /// Returns the demoted `(reference, old target)` pairs.
    pub fn demote_dangling(&mut self) -> Vec<(ReferenceId, GlobalId)> {
        let dangling: Vec<(ReferenceId, GlobalId)> = self
            .references
            .values()
            .filter(|r| !r.target.is_none() && !self.is_entity(r.target))
            .map(|r| (r.ref_id, r.target))
            .collect();
        for (ref_id, _) in &dangling {
            if let Some(reference) = self.references.get_mut(ref_id) {
                reference.target = GlobalId::NONE;
            }
        }
        dangling
    }

    /// Freeze into an immutable, serializable index.
    pub fn freeze(self, language: &str) -> Index {
        info!(
            entities = self.entity_count(),
            references = self.reference_count(),
            callers = self.callers.len(),
            inheritance = self.inheritance.len(),
            "index frozen"
        );
        Index::from_tables(IndexTables {
            language: language.to_string(),
            files: self.files.into_values().collect(),
            crates: self.crates.into_values().collect(),
            modules: self.modules.into_values().collect(),
            module_aliases: self.module_aliases.into_values().collect(),
            functions: self.functions.into_values().collect(),
            variables: self.variables.into_values().collect(),
            types: self.types.into_values().collect(),
            impls: self.impls.into_values().collect(),
            unknowns: self.unknowns.into_values().collect(),
            extern_locations: self.extern_locations.into_values().collect(),
            references: self.references.into_values().collect(),
            callers: self.callers,
            inheritance: self.inheritance,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extent::Extent;

    fn module(id: u32, qualname: &str) -> Module {
        Module {
            id: GlobalId::new(id),
            name: qualname.rsplit("::").next().unwrap_or(qualname).to_string(),
            qualname: qualname.to_string(),
            file_id: None,
            def_file_id: None,
            scope: GlobalId::NONE,
            extent: Extent::default(),
            language: "rust".to_string(),
        }
    }

    mod insertion_tests {
        use super::*;

        #[test]
        fn reference_ids_are_assigned_sequentially() {
            let mut store = IndexStore::new();
            let a = store.insert_reference(Reference::new(
                RefKind::Module,
                GlobalId::new(1),
                None,
                Extent::default(),
            ));
            let b = store.insert_reference(Reference::new(
                RefKind::Module,
                GlobalId::new(1),
                None,
                Extent::default(),
            ));
            assert_eq!(a, ReferenceId::new(1));
            assert_eq!(b, ReferenceId::new(2));
            assert_eq!(store.reference(b).unwrap().ref_id, b);
        }

        #[test]
        fn unknown_insertion_is_idempotent() {
            let mut store = IndexStore::new();
            let stub = Unknown {
                id: GlobalId::new(7),
                crate_name: "std".to_string(),
                qualname: None,
            };
            assert!(store.insert_unknown(stub.clone()));
            assert!(!store.insert_unknown(stub));
            assert_eq!(store.unknowns().count(), 1);
        }

        #[test]
        fn modules_are_indexed_by_qualname() {
            let mut store = IndexStore::new();
            store.insert_module(module(3, "foo::bar"));
            assert_eq!(store.modules_by_qualname("foo::bar"), &[GlobalId::new(3)]);
            assert!(store.modules_by_qualname("foo").is_empty());
        }
    }

    mod lifecycle_tests {
        use super::*;

        #[test]
        fn derived_tables_are_written_once() {
            let mut store = IndexStore::new();
            store.set_derived_tables(Vec::new(), Vec::new()).unwrap();
            let err = store.set_derived_tables(Vec::new(), Vec::new()).unwrap_err();
            assert!(matches!(err, IndexError::Internal { .. }));
        }

        #[test]
        fn dangling_targets_are_demoted() {
            let mut store = IndexStore::new();
            store.insert_module(module(3, "foo::bar"));
            let good = store.insert_reference(Reference::new(
                RefKind::Module,
                GlobalId::new(3),
                None,
                Extent::default(),
            ));
            let bad = store.insert_reference(Reference::new(
                RefKind::Variable,
                GlobalId::new(99),
                None,
                Extent::default(),
            ));
            let demoted = store.demote_dangling();
            assert_eq!(demoted, vec![(bad, GlobalId::new(99))]);
            assert_eq!(store.reference(good).unwrap().target, GlobalId::new(3));
            assert!(store.reference(bad).unwrap().is_unresolved());
        }

        #[test]
        fn commit_points_count_batches() {
            let mut store = IndexStore::new();
            store.insert_module(module(1, "foo"));
            let first = store.commit_batch(10_000);
            let second = store.commit_batch(20_000);
            assert_eq!(first.batch, 1);
            assert_eq!(second.batch, 2);
            assert_eq!(second.entities, 1);
            assert_eq!(store.commit_points().len(), 2);
        }
    }
}
