//! Typed record shapes.
//!
//! Each kind is decoded into its own struct so required attributes are
//! checked once, here, instead of inside the handlers that consume them.

use crate::extent::Extent;
use crate::ids::{CrateLocalId, CrateNum, LocalId};
use crate::store::{RefKind, TypeKind};

use super::{Attrs, RawRecord, RecordError, RecordKind};

/// Source location shared by entity and reference records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Site {
    /// Project-relative path, if the record named one.
    pub file_name: Option<String>,
    pub extent: Extent,
}

/// `crate`: the unit's own crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrateRecord {
    pub name: String,
    pub site: Site,
}

/// `external_crate`: registers a unit-local crate number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCrateRecord {
    pub name: String,
    pub num: CrateNum,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    pub id: LocalId,
    pub qualname: String,
    /// Trait method this function implements; sentinel when absent.
    pub declid: CrateLocalId,
    pub scope: LocalId,
    pub site: Site,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDeclRecord {
    pub id: LocalId,
    pub qualname: String,
    pub scope: LocalId,
    pub site: Site,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRecord {
    pub id: LocalId,
    pub name: String,
    /// Falls back to `name` when the producer omits it.
    pub qualname: String,
    pub value: String,
    pub type_name: String,
    pub scope: LocalId,
    pub site: Site,
}

/// `struct`, `trait` or `typedef`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRecord {
    pub kind: TypeKind,
    pub id: LocalId,
    pub qualname: String,
    /// Constructor id of a struct, when distinct from its definition id.
    pub ctor_id: Option<LocalId>,
    pub value: String,
    pub scope: LocalId,
    pub site: Site,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    pub id: LocalId,
    pub qualname: String,
    /// File holding the module body.
    pub def_file: Option<String>,
    pub scope: LocalId,
    pub site: Site,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplRecord {
    pub id: LocalId,
    pub self_type: CrateLocalId,
    pub trait_ref: CrateLocalId,
    pub scope: LocalId,
    pub site: Site,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseAliasRecord {
    pub id: LocalId,
    pub name: String,
    pub target: CrateLocalId,
    pub qualname: Option<String>,
    pub scope: LocalId,
    pub site: Site,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternCrateRecord {
    pub id: LocalId,
    pub name: String,
    /// Crate number the binding refers to.
    pub krate: Option<CrateNum>,
    pub location: Option<String>,
    pub scope: LocalId,
    pub site: Site,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InheritanceRecord {
    pub base: CrateLocalId,
    pub derived: CrateLocalId,
}

/// Any of the reference kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefRecord {
    pub kind: RefKind,
    /// Tag the record was emitted with.
    pub source: RecordKind,
    pub target: CrateLocalId,
    pub qualname: Option<String>,
    pub declid: CrateLocalId,
    pub scope: LocalId,
    pub site: Site,
}

/// A decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Crate(CrateRecord),
    ExternalCrate(ExternalCrateRecord),
    EndExternalCrates,
    Function(FunctionRecord),
    MethodDecl(MethodDeclRecord),
    Variable(VariableRecord),
    Type(TypeRecord),
    Module(ModuleRecord),
    Impl(ImplRecord),
    UseAlias(UseAliasRecord),
    ExternCrate(ExternCrateRecord),
    Inheritance(InheritanceRecord),
    Ref(RefRecord),
}

impl Record {
    /// Validate a raw record into its typed shape.
    pub fn decode(raw: RawRecord) -> Result<Record, RecordError> {
        let RawRecord { kind, attrs } = raw;
        let a = &attrs;
        let record = match kind {
            RecordKind::Crate => Record::Crate(CrateRecord {
                name: a.required_text(kind, "name")?,
                site: a.site()?,
            }),
            RecordKind::ExternalCrate => Record::ExternalCrate(ExternalCrateRecord {
                name: a.required_text(kind, "name")?,
                num: CrateNum::new(a.required_u32(kind, "crate")?),
                file_name: a.opt_text("file_name"),
            }),
            RecordKind::EndExternalCrates => Record::EndExternalCrates,
            RecordKind::Function => Record::Function(FunctionRecord {
                id: entity_id(a, kind)?,
                qualname: a.required_text(kind, "qualname")?,
                declid: a.crate_local("declid")?,
                scope: a.local_id("scopeid")?,
                site: a.site()?,
            }),
            RecordKind::MethodDecl => Record::MethodDecl(MethodDeclRecord {
                id: entity_id(a, kind)?,
                qualname: a.required_text(kind, "qualname")?,
                scope: a.local_id("scopeid")?,
                site: a.site()?,
            }),
            RecordKind::Variable => {
                let name = a.required_text(kind, "name")?;
                Record::Variable(VariableRecord {
                    id: entity_id(a, kind)?,
                    qualname: a.opt_text("qualname").unwrap_or_else(|| name.clone()),
                    name,
                    value: a.text("value"),
                    type_name: a.text("type"),
                    scope: a.local_id("scopeid")?,
                    site: a.site()?,
                })
            }
            RecordKind::Struct | RecordKind::Trait | RecordKind::Typedef => {
                let type_kind = match kind {
                    RecordKind::Struct => TypeKind::Struct,
                    RecordKind::Trait => TypeKind::Trait,
                    _ => TypeKind::Typedef,
                };
                let id = entity_id(a, kind)?;
                let ctor_id = if type_kind == TypeKind::Struct {
                    a.opt_u32("ctor_id")?
                        .map(LocalId::new)
                        .filter(|ctor| !ctor.is_sentinel() && *ctor != id)
                } else {
                    None
                };
                Record::Type(TypeRecord {
                    kind: type_kind,
                    id,
                    qualname: a.required_text(kind, "qualname")?,
                    ctor_id,
                    value: a.text("value"),
                    scope: a.local_id("scopeid")?,
                    site: a.site()?,
                })
            }
            RecordKind::Module => Record::Module(ModuleRecord {
                id: entity_id(a, kind)?,
                qualname: a.required_text(kind, "qualname")?,
                def_file: a.opt_text("def_file"),
                scope: a.local_id("scopeid")?,
                site: a.site()?,
            }),
            RecordKind::Impl => Record::Impl(ImplRecord {
                id: entity_id(a, kind)?,
                self_type: a.crate_local("refid")?,
                trait_ref: a.crate_local("traitid")?,
                scope: a.local_id("scopeid")?,
                site: a.site()?,
            }),
            RecordKind::UseAlias => Record::UseAlias(UseAliasRecord {
                id: entity_id(a, kind)?,
                name: a.required_text(kind, "name")?,
                target: a.crate_local("refid")?,
                qualname: a.opt_text("qualname"),
                scope: a.local_id("scopeid")?,
                site: a.site()?,
            }),
            RecordKind::ExternCrate => Record::ExternCrate(ExternCrateRecord {
                id: entity_id(a, kind)?,
                name: a.required_text(kind, "name")?,
                krate: a.opt_u32("crate")?.map(CrateNum::new),
                location: a.opt_text("location"),
                scope: a.local_id("scopeid")?,
                site: a.site()?,
            }),
            RecordKind::Inheritance => Record::Inheritance(InheritanceRecord {
                base: a.required_crate_local(kind, "base")?,
                derived: a.required_crate_local(kind, "derived")?,
            }),
            RecordKind::FnRef
            | RecordKind::FnCall
            | RecordKind::MethodCall
            | RecordKind::VarRef
            | RecordKind::TypeRef
            | RecordKind::ModRef => Record::Ref(RefRecord {
                kind: ref_kind(kind),
                source: kind,
                target: a.required_crate_local(kind, "refid")?,
                qualname: a.opt_text("qualname"),
                declid: a.crate_local("declid")?,
                scope: a.local_id("scopeid")?,
                site: a.site()?,
            }),
        };
        Ok(record)
    }
}

/// Required, non-sentinel `id` attribute of an entity record.
fn entity_id(attrs: &Attrs, kind: RecordKind) -> Result<LocalId, RecordError> {
    let id = LocalId::new(attrs.required_u32(kind, "id")?);
    if id.is_sentinel() {
        return Err(RecordError::InvalidValue {
            attr: "id",
            value: "0".to_string(),
        });
    }
    Ok(id)
}

fn ref_kind(kind: RecordKind) -> RefKind {
    match kind {
        RecordKind::FnRef | RecordKind::FnCall | RecordKind::MethodCall => RefKind::Function,
        RecordKind::VarRef => RefKind::Variable,
        RecordKind::TypeRef => RefKind::Type,
        RecordKind::ModRef => RefKind::Module,
        _ => RefKind::Unknown,
    }
}
