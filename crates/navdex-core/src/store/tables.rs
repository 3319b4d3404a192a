//! Entity and edge rows of the navigation index.
//!
//! Column shapes here are the contract with downstream consumers of a
//! serialized index. Bump [`super::INDEX_SCHEMA_VERSION`] when changing them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::extent::{Extent, FileId};
use crate::ids::GlobalId;

// ============================================================================
// ID Types
// ============================================================================

/// Identifier of a reference row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ReferenceId(pub u32);

impl ReferenceId {
    /// Create a new reference ID.
    pub fn new(id: u32) -> Self {
        ReferenceId(id)
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref_{}", self.0)
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Kind of function row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    /// A function or method with a body.
    Function,
    /// A trait method declaration.
    MethodDecl,
}

/// Kind of type row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Struct,
    Trait,
    Typedef,
}

impl TypeKind {
    /// Lower-case name as used in JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeKind::Struct => "struct",
            TypeKind::Trait => "trait",
            TypeKind::Typedef => "typedef",
        }
    }
}

/// Which reference edge table a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Function,
    Variable,
    Type,
    Module,
    /// Reference to a stub standing in for a foreign entity.
    Unknown,
}

impl RefKind {
    /// Lower-case name as used in JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::Function => "function",
            RefKind::Variable => "variable",
            RefKind::Type => "type",
            RefKind::Module => "module",
            RefKind::Unknown => "unknown",
        }
    }

    /// Module and type references may carry unresolved multi-segment paths.
    pub fn is_path_resolvable(&self) -> bool {
        matches!(self, RefKind::Module | RefKind::Type)
    }
}

/// Provenance of an inheritance row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum InheritanceKind {
    /// Emitted by the producer.
    Direct,
    /// Implied by a chain of direct edges.
    Derived,
}

// ============================================================================
// Entity Rows
// ============================================================================

/// A file in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub file_id: FileId,
    /// Project-relative path.
    pub path: String,
    /// Hex SHA-256 of the content, when the catalog was built from disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

/// One row per indexed compilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crate {
    /// Id of the crate's synthetic root module.
    pub id: GlobalId,
    pub name: String,
    pub file_id: Option<FileId>,
    pub extent: Extent,
    pub language: String,
}

/// A module declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: GlobalId,
    pub name: String,
    pub qualname: String,
    /// File containing the `mod` declaration.
    pub file_id: Option<FileId>,
    /// File containing the module body, when it differs from the declaring file.
    pub def_file_id: Option<FileId>,
    pub scope: GlobalId,
    pub extent: Extent,
    pub language: String,
}

/// A `use` or `extern crate` binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleAlias {
    pub id: GlobalId,
    /// Local name introduced by the binding.
    pub name: String,
    /// Qualified name of the alias target.
    pub qualname: String,
    pub target: GlobalId,
    /// Foreign crate location for `extern crate` bindings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// A truncating import whose local name equals the target's short name.
    pub transparent: bool,
    pub scope: GlobalId,
    pub file_id: Option<FileId>,
    pub extent: Extent,
}

/// A function, method, or trait method declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub id: GlobalId,
    pub kind: FunctionKind,
    pub name: String,
    pub qualname: String,
    /// Trait method this function implements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declid: Option<GlobalId>,
    pub scope: GlobalId,
    pub file_id: Option<FileId>,
    pub extent: Extent,
    pub language: String,
}

/// A variable, field, constant or static.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub id: GlobalId,
    pub name: String,
    pub qualname: String,
    pub value: String,
    pub type_name: String,
    pub scope: GlobalId,
    pub file_id: Option<FileId>,
    pub extent: Extent,
    pub language: String,
}

/// A struct, trait or type alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Type {
    pub id: GlobalId,
    pub kind: TypeKind,
    pub name: String,
    pub qualname: String,
    pub value: String,
    pub scope: GlobalId,
    pub file_id: Option<FileId>,
    pub extent: Extent,
    pub language: String,
}

/// An `impl` block tying a type to the trait it implements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Impl {
    pub id: GlobalId,
    pub self_type: GlobalId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trait_id: Option<GlobalId>,
    pub scope: GlobalId,
    pub file_id: Option<FileId>,
    pub extent: Extent,
}

/// Stub for an entity defined in a crate that is not part of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unknown {
    pub id: GlobalId,
    pub crate_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualname: Option<String>,
}

/// Documentation/source/index URLs for a foreign crate location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternLocation {
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_url: Option<String>,
}

// ============================================================================
// Edge Rows
// ============================================================================

/// A reference from a source extent to an entity.
///
/// `target` is [`GlobalId::NONE`] while unresolved; fixup passes rewrite it
/// (and possibly `qualname`, `kind` and `via_alias`) in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub ref_id: ReferenceId,
    pub kind: RefKind,
    pub target: GlobalId,
    /// Path as written at the reference site, or its resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualname: Option<String>,
    /// Trait method declaration for calls through a trait.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declid: Option<GlobalId>,
    /// Enclosing scope of the reference site.
    pub scope: GlobalId,
    /// Non-transparent alias the reference was resolved through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via_alias: Option<GlobalId>,
    /// For a reference to a foreign stub, the kind it was recorded as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stub_of: Option<RefKind>,
    pub file_id: Option<FileId>,
    pub extent: Extent,
}

impl Reference {
    /// Create an unplaced reference row. The store assigns `ref_id` on insert.
    pub fn new(kind: RefKind, target: GlobalId, file_id: Option<FileId>, extent: Extent) -> Self {
        Reference {
            ref_id: ReferenceId::new(0),
            kind,
            target,
            qualname: None,
            declid: None,
            scope: GlobalId::NONE,
            via_alias: None,
            stub_of: None,
            file_id,
            extent,
        }
    }

    /// Set the path as written.
    pub fn with_qualname(mut self, qualname: Option<String>) -> Self {
        self.qualname = qualname.filter(|q| !q.is_empty());
        self
    }

    /// Set the trait method declaration id.
    pub fn with_declid(mut self, declid: Option<GlobalId>) -> Self {
        self.declid = declid.and_then(GlobalId::resolved);
        self
    }

    /// Set the enclosing scope.
    pub fn with_scope(mut self, scope: GlobalId) -> Self {
        self.scope = scope;
        self
    }

    /// Redirect to a foreign stub, remembering the recorded kind.
    pub fn point_at_stub(&mut self, stub: GlobalId) {
        if self.kind != RefKind::Unknown {
            self.stub_of = Some(self.kind);
            self.kind = RefKind::Unknown;
        }
        self.target = stub;
    }

    /// True for a function reference, including one to a foreign stub.
    pub fn is_function_ref(&self) -> bool {
        self.kind == RefKind::Function || self.stub_of == Some(RefKind::Function)
    }

    /// True while the target is the sentinel.
    pub fn is_unresolved(&self) -> bool {
        self.target.is_none()
    }
}

/// Derived call graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Caller {
    pub caller: GlobalId,
    pub callee: GlobalId,
}

/// Trait inheritance edge: `derived` extends `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Inheritance {
    pub derived: GlobalId,
    pub base: GlobalId,
    pub kind: InheritanceKind,
}

// ============================================================================
// Tests
// ============================================================================
