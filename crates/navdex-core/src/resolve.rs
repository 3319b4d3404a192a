//! Deferred reference fixups.
//!
//! The producer does not resolve multi-segment paths, so after ingestion some
//! module and type references still carry the sentinel target together with
//! the path as written. They are resolved by strictly ordered passes, each of
//! which only looks at rows that are still unresolved:
//!
//! 1. **Exact**: the path is the qualified name of a module or type.
//! 2. **Single alias**: a bare name matching an alias bound in the same file.
//! 3. **Prefix alias**: `alias::rest`, where the alias's qualified name is
//!    substituted for its local name and the rebuilt path is matched exactly.
//!
//! Before these, references of any kind recorded against a struct
//! constructor id are rewritten to the struct's definition id. After them,
//! references that landed on the root of a foreign crate (only reachable
//! through `extern crate` and `use` bindings) get that root's stub.

use serde::Serialize;
use tracing::{debug, info_span};

use crate::external::stub_foreign_roots;
use crate::ids::GlobalId;
use crate::session::IngestSession;
use crate::store::{IndexStore, ModuleAlias, RefKind, Reference, ReferenceId};

/// Rows rewritten by each pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FixupReport {
    pub constructors: usize,
    pub exact: usize,
    pub single_alias: usize,
    pub prefix_alias: usize,
    /// References redirected to a foreign crate root stub.
    pub root_stubs: usize,
    /// Path-carrying rows still unresolved after all passes.
    pub unresolved: usize,
}

#[derive(Debug, Clone)]
struct Resolution {
    target: GlobalId,
    qualname: Option<String>,
    via_alias: Option<GlobalId>,
}

/// Run every fixup pass in order.
pub fn run_fixups(session: &mut IngestSession) -> FixupReport {
    let span = info_span!("fixup");
    let _enter = span.enter();

    let mut report = FixupReport {
        constructors: rewrite_constructors(session),
        ..FixupReport::default()
    };
    let store = session.store_mut();
    report.exact = apply(store, resolve_exact);
    report.single_alias = apply(store, resolve_single_alias);
    report.prefix_alias = apply(store, resolve_prefix_alias);
    report.unresolved = candidates(store).count();
    report.root_stubs = stub_foreign_roots(session);
    debug!(
        constructors = report.constructors,
        exact = report.exact,
        single_alias = report.single_alias,
        prefix_alias = report.prefix_alias,
        root_stubs = report.root_stubs,
        unresolved = report.unresolved,
        "fixups applied"
    );
    report
}

/// Point references at constructor ids to the struct definition.
///
/// Unit and tuple struct constructors show up as variable and function
/// references as well as type references; all of them converge.
pub fn rewrite_constructors(session: &mut IngestSession) -> usize {
    if session.ctor_map().is_empty() {
        return 0;
    }
    let ctor_map = session.ctor_map().clone();
    let mut rewritten = 0;
    for reference in session.store_mut().references_mut() {
        if let Some(definition) = ctor_map.get(&reference.target) {
            reference.target = *definition;
            rewritten += 1;
        }
    }
    rewritten
}

/// Unresolved module/type references that carry a path.
fn candidates(store: &IndexStore) -> impl Iterator<Item = &Reference> {
    store
        .references()
        .filter(|r| r.kind.is_path_resolvable() && r.is_unresolved() && r.qualname.is_some())
}

fn apply(
    store: &mut IndexStore,
    pass: fn(&IndexStore, &Reference) -> Option<Resolution>,
) -> usize {
    let resolved: Vec<(ReferenceId, Resolution)> = candidates(store)
        .filter_map(|r| pass(store, r).map(|res| (r.ref_id, res)))
        .collect();
    let count = resolved.len();
    for (ref_id, res) in resolved {
        let is_stub = store.unknown(res.target).is_some();
        if let Some(reference) = store.reference_mut(ref_id) {
            if is_stub {
                reference.point_at_stub(res.target);
            } else {
                reference.target = res.target;
            }
            if let Some(qualname) = res.qualname {
                reference.qualname = Some(qualname);
            }
            reference.via_alias = res.via_alias;
        }
    }
    count
}

/// First entity of the reference's kind with exactly this qualified name.
fn lookup(store: &IndexStore, kind: RefKind, qualname: &str) -> Option<GlobalId> {
    let ids: &[GlobalId] = match kind {
        RefKind::Module => store.modules_by_qualname(qualname),
        RefKind::Type => store.types_by_qualname(qualname),
        _ => &[],
    };
    ids.first().copied()
}

/// First alias binding `name` in the reference's file.
fn alias_in_file<'a>(store: &'a IndexStore, reference: &Reference, name: &str) -> Option<&'a ModuleAlias> {
    let file_id = reference.file_id?;
    store.aliases_named(file_id, name).into_iter().next()
}

fn resolve_exact(store: &IndexStore, reference: &Reference) -> Option<Resolution> {
    let qualname = reference.qualname.as_deref()?;
    lookup(store, reference.kind, qualname).map(|target| Resolution {
        target,
        qualname: None,
        via_alias: None,
    })
}

fn resolve_single_alias(store: &IndexStore, reference: &Reference) -> Option<Resolution> {
    let name = reference.qualname.as_deref()?;
    if name.contains("::") {
        return None;
    }
    let alias = alias_in_file(store, reference, name)?;
    if alias.target.is_none() {
        return None;
    }
    if alias.transparent {
        return Some(Resolution {
            target: alias.target,
            qualname: None,
            via_alias: None,
        });
    }
    Some(Resolution {
        target: alias.target,
        qualname: Some(alias.qualname.clone()).filter(|q| !q.is_empty()),
        via_alias: Some(alias.id),
    })
}

fn resolve_prefix_alias(store: &IndexStore, reference: &Reference) -> Option<Resolution> {
    let path = reference.qualname.as_deref()?;
    let (head, rest) = path.split_once("::")?;
    let alias = alias_in_file(store, reference, head)?;
    if alias.qualname.is_empty() {
        return None;
    }
    let rebuilt = format!("{}::{}", alias.qualname, rest);
    let target = lookup(store, reference.kind, &rebuilt)?;
    Some(Resolution {
        target,
        qualname: Some(rebuilt),
        via_alias: (!alias.transparent).then_some(alias.id),
    })
}
