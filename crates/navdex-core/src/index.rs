//! The frozen, read-only navigation index.
//!
//! An [`Index`] is what a run produces. It serializes to JSON with a schema
//! version; lookup postings are skipped on serialization and rebuilt when an
//! index is loaded, so the on-disk shape is just the tables.
//!
//! The query methods here are the consumption API used by the CLI and by
//! downstream tooling. Rendering of results is not this crate's concern.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};
use crate::extent::{Extent, FileId};
use crate::ids::GlobalId;
use crate::store::{
    Caller, Crate, ExternLocation, File, Function, Impl, Inheritance, Module, ModuleAlias,
    Reference, Type, Unknown, Variable, INDEX_SCHEMA_VERSION,
};

// ============================================================================
// Entity view
// ============================================================================

/// A row from any entity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum Entity<'a> {
    Crate(&'a Crate),
    Module(&'a Module),
    ModuleAlias(&'a ModuleAlias),
    Function(&'a Function),
    Variable(&'a Variable),
    Type(&'a Type),
    Impl(&'a Impl),
    Unknown(&'a Unknown),
}

impl<'a> Entity<'a> {
    pub fn id(&self) -> GlobalId {
        match self {
            Entity::Crate(e) => e.id,
            Entity::Module(e) => e.id,
            Entity::ModuleAlias(e) => e.id,
            Entity::Function(e) => e.id,
            Entity::Variable(e) => e.id,
            Entity::Type(e) => e.id,
            Entity::Impl(e) => e.id,
            Entity::Unknown(e) => e.id,
        }
    }

    /// Qualified name, where the table has one.
    pub fn qualname(&self) -> Option<&'a str> {
        match self {
            Entity::Crate(e) => Some(&e.name),
            Entity::Module(e) => Some(&e.qualname),
            Entity::ModuleAlias(e) => Some(&e.qualname),
            Entity::Function(e) => Some(&e.qualname),
            Entity::Variable(e) => Some(&e.qualname),
            Entity::Type(e) => Some(&e.qualname),
            Entity::Impl(_) => None,
            Entity::Unknown(e) => e.qualname.as_deref(),
        }
    }

    /// Definition site. Stubs have none.
    pub fn location(&self) -> Option<(Option<FileId>, Extent)> {
        match self {
            Entity::Crate(e) => Some((e.file_id, e.extent)),
            Entity::Module(e) => Some((e.file_id, e.extent)),
            Entity::ModuleAlias(e) => Some((e.file_id, e.extent)),
            Entity::Function(e) => Some((e.file_id, e.extent)),
            Entity::Variable(e) => Some((e.file_id, e.extent)),
            Entity::Type(e) => Some((e.file_id, e.extent)),
            Entity::Impl(e) => Some((e.file_id, e.extent)),
            Entity::Unknown(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum EntitySlot {
    Crate(usize),
    Module(usize),
    ModuleAlias(usize),
    Function(usize),
    Variable(usize),
    Type(usize),
    Impl(usize),
    Unknown(usize),
}

/// Result of a position lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Definition<'a> {
    /// Reference the offset fell into, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<&'a Reference>,
    pub entity: Entity<'a>,
}

// ============================================================================
// Index
// ============================================================================

/// Table contents handed over by the store at freeze time.
#[derive(Debug, Default)]
pub struct IndexTables {
    pub language: String,
    pub files: Vec<File>,
    pub crates: Vec<Crate>,
    pub modules: Vec<Module>,
    pub module_aliases: Vec<ModuleAlias>,
    pub functions: Vec<Function>,
    pub variables: Vec<Variable>,
    pub types: Vec<Type>,
    pub impls: Vec<Impl>,
    pub unknowns: Vec<Unknown>,
    pub extern_locations: Vec<ExternLocation>,
    pub references: Vec<Reference>,
    pub callers: Vec<Caller>,
    pub inheritance: Vec<Inheritance>,
}

/// Immutable navigation index.
#[derive(Debug, Serialize, Deserialize)]
pub struct Index {
    pub schema_version: u32,
    /// RFC 3339 timestamp of the run.
    pub generated_at: String,
    pub language: String,

    files: Vec<File>,
    crates: Vec<Crate>,
    modules: Vec<Module>,
    module_aliases: Vec<ModuleAlias>,
    functions: Vec<Function>,
    variables: Vec<Variable>,
    types: Vec<Type>,
    impls: Vec<Impl>,
    unknowns: Vec<Unknown>,
    extern_locations: Vec<ExternLocation>,
    references: Vec<Reference>,
    callers: Vec<Caller>,
    inheritance: Vec<Inheritance>,

    #[serde(skip)]
    postings: Postings,
}

#[derive(Debug, Default)]
struct Postings {
    entities: HashMap<GlobalId, EntitySlot>,
    file_by_path: HashMap<String, FileId>,
    refs_by_target: HashMap<GlobalId, Vec<usize>>,
    refs_by_file: HashMap<FileId, Vec<usize>>,
    functions_by_declid: HashMap<GlobalId, Vec<usize>>,
    by_qualname: HashMap<String, Vec<GlobalId>>,
}

impl Index {
    /// Build from frozen tables.
    pub fn from_tables(tables: IndexTables) -> Self {
        let mut index = Index {
            schema_version: INDEX_SCHEMA_VERSION,
            generated_at: chrono::Utc::now().to_rfc3339(),
            language: tables.language,
            files: tables.files,
            crates: tables.crates,
            modules: tables.modules,
            module_aliases: tables.module_aliases,
            functions: tables.functions,
            variables: tables.variables,
            types: tables.types,
            impls: tables.impls,
            unknowns: tables.unknowns,
            extern_locations: tables.extern_locations,
            references: tables.references,
            callers: tables.callers,
            inheritance: tables.inheritance,
            postings: Postings::default(),
        };
        index.rebuild_postings();
        index
    }

    fn rebuild_postings(&mut self) {
        let mut p = Postings::default();
        for file in &self.files {
            p.file_by_path.insert(file.path.clone(), file.file_id);
        }

        macro_rules! slot {
            ($table:expr, $variant:ident) => {
                for (i, row) in $table.iter().enumerate() {
                    p.entities.insert(row.id, EntitySlot::$variant(i));
                }
            };
        }
        // Stubs first so a crate row sharing a root id takes precedence.
        slot!(self.unknowns, Unknown);
        slot!(self.crates, Crate);
        slot!(self.modules, Module);
        slot!(self.module_aliases, ModuleAlias);
        slot!(self.functions, Function);
        slot!(self.variables, Variable);
        slot!(self.types, Type);
        slot!(self.impls, Impl);

        for m in &self.modules {
            p.by_qualname.entry(m.qualname.clone()).or_default().push(m.id);
        }
        for f in &self.functions {
            p.by_qualname.entry(f.qualname.clone()).or_default().push(f.id);
        }
        for v in &self.variables {
            p.by_qualname.entry(v.qualname.clone()).or_default().push(v.id);
        }
        for t in &self.types {
            p.by_qualname.entry(t.qualname.clone()).or_default().push(t.id);
        }
        for u in &self.unknowns {
            if let Some(qualname) = &u.qualname {
                p.by_qualname.entry(qualname.clone()).or_default().push(u.id);
            }
        }

        for (i, f) in self.functions.iter().enumerate() {
            if let Some(declid) = f.declid {
                p.functions_by_declid.entry(declid).or_default().push(i);
            }
        }
        for (i, r) in self.references.iter().enumerate() {
            if !r.target.is_none() {
                p.refs_by_target.entry(r.target).or_default().push(i);
            }
            if let Some(file_id) = r.file_id {
                p.refs_by_file.entry(file_id).or_default().push(i);
            }
        }
        self.postings = p;
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> IndexResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON, checking the schema version.
    pub fn from_json(json: &str) -> IndexResult<Index> {
        let mut index: Index = serde_json::from_str(json)?;
        if index.schema_version != INDEX_SCHEMA_VERSION {
            return Err(IndexError::IndexLoad {
                path: String::new(),
                reason: format!(
                    "schema version {} (expected {})",
                    index.schema_version, INDEX_SCHEMA_VERSION
                ),
            });
        }
        index.rebuild_postings();
        Ok(index)
    }

    /// Write to a file.
    pub fn save(&self, path: &Path) -> IndexResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read from a file.
    pub fn load(path: &Path) -> IndexResult<Index> {
        let load_err = |reason: String| IndexError::IndexLoad {
            path: path.display().to_string(),
            reason,
        };
        let json = fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        Index::from_json(&json).map_err(|e| match e {
            IndexError::IndexLoad { reason, .. } => load_err(reason),
            other => load_err(other.to_string()),
        })
    }

    // ------------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------------

    pub fn files(&self) -> &[File] {
        &self.files
    }

    pub fn crates(&self) -> &[Crate] {
        &self.crates
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn module_aliases(&self) -> &[ModuleAlias] {
        &self.module_aliases
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn types(&self) -> &[Type] {
        &self.types
    }

    pub fn impls(&self) -> &[Impl] {
        &self.impls
    }

    pub fn unknowns(&self) -> &[Unknown] {
        &self.unknowns
    }

    pub fn extern_locations(&self) -> &[ExternLocation] {
        &self.extern_locations
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn callers(&self) -> &[Caller] {
        &self.callers
    }

    pub fn inheritance(&self) -> &[Inheritance] {
        &self.inheritance
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Look up an entity in any table.
    pub fn entity(&self, id: GlobalId) -> Option<Entity<'_>> {
        let slot = self.postings.entities.get(&id)?;
        Some(match *slot {
            EntitySlot::Crate(i) => Entity::Crate(&self.crates[i]),
            EntitySlot::Module(i) => Entity::Module(&self.modules[i]),
            EntitySlot::ModuleAlias(i) => Entity::ModuleAlias(&self.module_aliases[i]),
            EntitySlot::Function(i) => Entity::Function(&self.functions[i]),
            EntitySlot::Variable(i) => Entity::Variable(&self.variables[i]),
            EntitySlot::Type(i) => Entity::Type(&self.types[i]),
            EntitySlot::Impl(i) => Entity::Impl(&self.impls[i]),
            EntitySlot::Unknown(i) => Entity::Unknown(&self.unknowns[i]),
        })
    }

    pub fn file_id(&self, path: &str) -> Option<FileId> {
        self.postings.file_by_path.get(path).copied()
    }

    pub fn file(&self, file_id: FileId) -> Option<&File> {
        self.files.iter().find(|f| f.file_id == file_id)
    }

    /// Entities with an exact qualified name.
    pub fn find_by_qualname(&self, qualname: &str) -> Vec<Entity<'_>> {
        self.postings
            .by_qualname
            .get(qualname)
            .into_iter()
            .flatten()
            .filter_map(|id| self.entity(*id))
            .collect()
    }

    /// The entity at a byte offset in `path`.
    ///
    /// A resolved reference covering the offset wins over a definition;
    /// among several candidates the narrowest extent wins.
    pub fn definition_of(&self, path: &str, offset: u64) -> Option<Definition<'_>> {
        let file_id = self.file_id(path)?;

        let reference = self
            .postings
            .refs_by_file
            .get(&file_id)
            .into_iter()
            .flatten()
            .map(|i| &self.references[*i])
            .filter(|r| !r.target.is_none() && r.extent.contains(offset))
            .min_by_key(|r| r.extent.len());
        if let Some(reference) = reference {
            if let Some(entity) = self.entity(reference.target) {
                return Some(Definition {
                    reference: Some(reference),
                    entity,
                });
            }
        }

        self.postings
            .entities
            .keys()
            .filter_map(|id| self.entity(*id))
            .filter(|e| match e.location() {
                Some((Some(f), extent)) => f == file_id && extent.contains(offset),
                _ => false,
            })
            .min_by_key(|e| (e.location().map(|(_, x)| x.len()), e.id()))
            .map(|entity| Definition {
                reference: None,
                entity,
            })
    }

    /// Every reference row targeting `id`.
    pub fn references_to(&self, id: GlobalId) -> Vec<&Reference> {
        self.postings
            .refs_by_target
            .get(&id)
            .into_iter()
            .flatten()
            .map(|i| &self.references[*i])
            .collect()
    }

    /// Functions that call `id`.
    pub fn callers_of(&self, id: GlobalId) -> Vec<GlobalId> {
        self.callers
            .iter()
            .filter(|c| c.callee == id)
            .map(|c| c.caller)
            .collect()
    }

    /// Functions `id` calls.
    pub fn callees_of(&self, id: GlobalId) -> Vec<GlobalId> {
        self.callers
            .iter()
            .filter(|c| c.caller == id)
            .map(|c| c.callee)
            .collect()
    }

    /// Traits `id` extends, directly or transitively.
    pub fn supertraits_of(&self, id: GlobalId) -> Vec<&Inheritance> {
        self.inheritance.iter().filter(|i| i.derived == id).collect()
    }

    /// Traits extending `id`, directly or transitively.
    pub fn subtraits_of(&self, id: GlobalId) -> Vec<&Inheritance> {
        self.inheritance.iter().filter(|i| i.base == id).collect()
    }

    /// Impl blocks for a type or of a trait.
    pub fn impls_of(&self, id: GlobalId) -> Vec<&Impl> {
        self.impls
            .iter()
            .filter(|i| i.self_type == id || i.trait_id == Some(id))
            .collect()
    }

    /// Concrete functions implementing a trait method declaration.
    pub fn implementations_of(&self, declid: GlobalId) -> Vec<&Function> {
        self.postings
            .functions_by_declid
            .get(&declid)
            .into_iter()
            .flatten()
            .map(|i| &self.functions[*i])
            .collect()
    }

    /// Documentation and source URLs for a foreign crate location.
    pub fn extern_location_for(&self, location: &str) -> Option<&ExternLocation> {
        self.extern_locations
            .iter()
            .find(|l| l.location == location)
    }
}

// ============================================================================
// Tests
// ============================================================================
