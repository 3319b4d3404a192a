//! Entity writers, one per record kind.
//!
//! Each writer normalizes a typed record into a store row: the short name is
//! the last `::` segment of the qualified name, the language tag comes from
//! the session, and the owning file is resolved through the session's file
//! cache (an unknown path yields no file plus a diagnostic).

use crate::external::reference_target;
use crate::ids::{CrateNum, GlobalId};
use crate::record::{
    CrateRecord, ExternCrateRecord, FunctionRecord, ImplRecord, InheritanceRecord,
    MethodDeclRecord, ModuleRecord, RecordError, RecordKind, RefRecord, TypeRecord,
    UseAliasRecord, VariableRecord,
};
use crate::session::IngestSession;
use crate::store::{
    Crate, Function, FunctionKind, Impl, Module, ModuleAlias, Reference, ReferenceId, Type,
    TypeKind, Variable,
};

/// Last `::` segment of a qualified name.
pub fn short_name(qualname: &str) -> &str {
    qualname.rsplit("::").next().unwrap_or(qualname)
}

pub fn write_crate(session: &mut IngestSession, record: &CrateRecord) -> Result<(), RecordError> {
    let root = session.begin_crate(&record.name)?;
    let file_id = session.file_id(record.site.file_name.as_deref());
    let language = session.language().to_string();
    session.store_mut().insert_crate(Crate {
        id: root,
        name: record.name.clone(),
        file_id,
        extent: record.site.extent,
        language,
    });
    Ok(())
}

pub fn write_function(
    session: &mut IngestSession,
    record: &FunctionRecord,
) -> Result<(), RecordError> {
    let kind = RecordKind::Function;
    let id = session.local_global(kind, record.id)?;
    let declid = session.target(kind, record.declid)?.id.resolved();
    let scope = session.local_global(kind, record.scope)?;
    let file_id = session.file_id(record.site.file_name.as_deref());
    let language = session.language().to_string();
    session.store_mut().insert_function(Function {
        id,
        kind: FunctionKind::Function,
        name: short_name(&record.qualname).to_string(),
        qualname: record.qualname.clone(),
        declid,
        scope,
        file_id,
        extent: record.site.extent,
        language,
    });
    Ok(())
}

pub fn write_method_decl(
    session: &mut IngestSession,
    record: &MethodDeclRecord,
) -> Result<(), RecordError> {
    let kind = RecordKind::MethodDecl;
    let id = session.local_global(kind, record.id)?;
    let scope = session.local_global(kind, record.scope)?;
    let file_id = session.file_id(record.site.file_name.as_deref());
    let language = session.language().to_string();
    session.store_mut().insert_function(Function {
        id,
        kind: FunctionKind::MethodDecl,
        name: short_name(&record.qualname).to_string(),
        qualname: record.qualname.clone(),
        declid: None,
        scope,
        file_id,
        extent: record.site.extent,
        language,
    });
    Ok(())
}

pub fn write_variable(
    session: &mut IngestSession,
    record: &VariableRecord,
) -> Result<(), RecordError> {
    let kind = RecordKind::Variable;
    let id = session.local_global(kind, record.id)?;
    let scope = session.local_global(kind, record.scope)?;
    let file_id = session.file_id(record.site.file_name.as_deref());
    let language = session.language().to_string();
    session.store_mut().insert_variable(Variable {
        id,
        name: record.name.clone(),
        qualname: record.qualname.clone(),
        value: record.value.clone(),
        type_name: record.type_name.clone(),
        scope,
        file_id,
        extent: record.site.extent,
        language,
    });
    Ok(())
}

pub fn write_type(session: &mut IngestSession, record: &TypeRecord) -> Result<(), RecordError> {
    let kind = match record.kind {
        TypeKind::Struct => RecordKind::Struct,
        TypeKind::Trait => RecordKind::Trait,
        TypeKind::Typedef => RecordKind::Typedef,
    };
    let id = session.local_global(kind, record.id)?;
    if let Some(ctor) = record.ctor_id {
        let ctor = session.local_global(kind, ctor)?;
        session.record_ctor(ctor, id);
    }
    let scope = session.local_global(kind, record.scope)?;
    let file_id = session.file_id(record.site.file_name.as_deref());
    let language = session.language().to_string();
    session.store_mut().insert_type(Type {
        id,
        kind: record.kind,
        name: short_name(&record.qualname).to_string(),
        qualname: record.qualname.clone(),
        value: record.value.clone(),
        scope,
        file_id,
        extent: record.site.extent,
        language,
    });
    Ok(())
}

pub fn write_module(session: &mut IngestSession, record: &ModuleRecord) -> Result<(), RecordError> {
    let kind = RecordKind::Module;
    let id = session.local_global(kind, record.id)?;
    let scope = session.local_global(kind, record.scope)?;
    let file_id = session.file_id(record.site.file_name.as_deref());
    let def_file_id = match record.def_file.as_deref() {
        Some(def_file) => session.file_id(Some(def_file)),
        None => file_id,
    };
    let language = session.language().to_string();
    session.store_mut().insert_module(Module {
        id,
        name: short_name(&record.qualname).to_string(),
        qualname: record.qualname.clone(),
        file_id,
        def_file_id,
        scope,
        extent: record.site.extent,
        language,
    });
    Ok(())
}

pub fn write_impl(session: &mut IngestSession, record: &ImplRecord) -> Result<(), RecordError> {
    let kind = RecordKind::Impl;
    let id = session.local_global(kind, record.id)?;
    let self_type = reference_target(session, kind, record.self_type, None)?.id;
    let trait_id = reference_target(session, kind, record.trait_ref, None)?
        .id
        .resolved();
    let scope = session.local_global(kind, record.scope)?;
    let file_id = session.file_id(record.site.file_name.as_deref());
    session.store_mut().insert_impl(Impl {
        id,
        self_type,
        trait_id,
        scope,
        file_id,
        extent: record.site.extent,
    });
    Ok(())
}

/// A `use` binding. It is transparent when its local name equals the short
/// name of what it imports (`use a::b::c;` binds `c`).
pub fn write_use_alias(
    session: &mut IngestSession,
    record: &UseAliasRecord,
) -> Result<(), RecordError> {
    let kind = RecordKind::UseAlias;
    let id = session.local_global(kind, record.id)?;
    let target = reference_target(session, kind, record.target, record.qualname.as_deref())?;
    let qualname = record.qualname.clone().unwrap_or_default();
    let transparent = !qualname.is_empty() && short_name(&qualname) == record.name;
    let scope = session.local_global(kind, record.scope)?;
    let file_id = session.file_id(record.site.file_name.as_deref());
    session.store_mut().insert_module_alias(ModuleAlias {
        id,
        name: record.name.clone(),
        qualname,
        target: target.id,
        location: target.foreign.then_some(target.crate_name),
        transparent,
        scope,
        file_id,
        extent: record.site.extent,
    });
    Ok(())
}

/// An `extern crate` binding, targeting the crate's root module.
pub fn write_extern_crate(
    session: &mut IngestSession,
    record: &ExternCrateRecord,
) -> Result<(), RecordError> {
    let kind = RecordKind::ExternCrate;
    let id = session.local_global(kind, record.id)?;
    let (crate_name, target, foreign) = match record.krate {
        Some(num) if num != CrateNum::LOCAL => {
            let entry = session.crate_entry(kind, num)?;
            let foreign = !session.is_local_crate(&entry.name);
            (entry.name, entry.root, foreign)
        }
        _ => (record.name.clone(), GlobalId::NONE, false),
    };
    let location = record
        .location
        .clone()
        .or_else(|| foreign.then(|| crate_name.clone()));
    if let Some(location) = location.as_deref() {
        session.note_extern_location(location);
    }
    let scope = session.local_global(kind, record.scope)?;
    let file_id = session.file_id(record.site.file_name.as_deref());
    session.store_mut().insert_module_alias(ModuleAlias {
        id,
        name: record.name.clone(),
        transparent: record.name == crate_name,
        qualname: crate_name,
        target,
        location,
        scope,
        file_id,
        extent: record.site.extent,
    });
    Ok(())
}

/// Queue a direct trait edge for the graph builder.
pub fn write_inheritance(
    session: &mut IngestSession,
    record: &InheritanceRecord,
) -> Result<(), RecordError> {
    let kind = RecordKind::Inheritance;
    let derived = reference_target(session, kind, record.derived, None)?.id;
    let base = reference_target(session, kind, record.base, None)?.id;
    if !derived.is_none() && !base.is_none() {
        session.push_inheritance(derived, base);
    }
    Ok(())
}

/// Insert a reference row. Foreign targets are recorded against their stub
/// with kind [`RefKind::Unknown`](crate::store::RefKind::Unknown).
pub fn write_reference(
    session: &mut IngestSession,
    record: &RefRecord,
) -> Result<ReferenceId, RecordError> {
    let kind = record.source;
    let target = reference_target(session, kind, record.target, record.qualname.as_deref())?;
    let declid = session.target(kind, record.declid)?.id;
    let scope = session.local_global(kind, record.scope)?;
    let file_id = session.file_id(record.site.file_name.as_deref());
    let mut reference = Reference::new(record.kind, target.id, file_id, record.site.extent)
        .with_qualname(record.qualname.clone())
        .with_declid(declid.resolved())
        .with_scope(scope);
    if target.foreign && !target.id.is_none() {
        reference.point_at_stub(target.id);
    }
    Ok(session.store_mut().insert_reference(reference))
}
