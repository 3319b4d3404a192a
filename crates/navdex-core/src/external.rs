//! Foreign-crate targets.
//!
//! A reference whose target lives in a crate that is not part of the run
//! cannot point at a real entity row. Instead a stub [`Unknown`] row is
//! created the first time the `(crate, id)` pair is seen, and every later
//! reference to the pair points at the same stub. Creation is a plain
//! check-then-insert; the run is single-threaded.
//!
//! Registering a foreign crate creates nothing. Its root module only gets a
//! stub once a reference resolves to it through an `extern crate` or `use`
//! binding.
//!
//! [`Unknown`]: crate::store::Unknown

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::ExternLocationConfig;
use crate::ids::{CrateLocalId, GlobalId};
use crate::record::{RecordError, RecordKind};
use crate::session::{IngestSession, Target};
use crate::store::{ExternLocation, ReferenceId};

/// Map a reference target, materializing a stub if it is foreign.
pub fn reference_target(
    session: &mut IngestSession,
    kind: RecordKind,
    id: CrateLocalId,
    qualname: Option<&str>,
) -> Result<Target, RecordError> {
    let target = session.target(kind, id)?;
    if target.foreign && !target.id.is_none() {
        session.ensure_stub(&target.crate_name, target.id, qualname.map(str::to_string));
    }
    Ok(target)
}

/// Give every reference that targets a foreign crate root that root's stub.
///
/// Returns the number of references redirected.
pub fn stub_foreign_roots(session: &mut IngestSession) -> usize {
    let hits: Vec<(ReferenceId, GlobalId, String)> = session
        .store()
        .references()
        .filter(|r| !r.target.is_none() && !session.store().is_entity(r.target))
        .filter_map(|r| {
            let name = session.ids().root_crate(r.target)?;
            session
                .foreign_crates()
                .contains(name)
                .then(|| (r.ref_id, r.target, name.to_string()))
        })
        .collect();
    for (ref_id, root, name) in &hits {
        session.ensure_stub(name, *root, Some(name.clone()));
        if let Some(reference) = session.store_mut().reference_mut(*ref_id) {
            reference.point_at_stub(*root);
        }
    }
    hits.len()
}

/// Emit an [`ExternLocation`] row for every configured location the run used.
///
/// A location is used when it names a foreign crate or appears as the
/// location of an `extern crate` binding.
pub fn emit_extern_locations(
    session: &mut IngestSession,
    configured: &BTreeMap<String, ExternLocationConfig>,
) -> usize {
    let used: Vec<(String, ExternLocationConfig)> = configured
        .iter()
        .filter(|(location, _)| {
            session.foreign_crates().contains(*location)
                || session.extern_crate_locations().contains(*location)
        })
        .map(|(location, urls)| (location.clone(), urls.clone()))
        .collect();
    let count = used.len();
    for (location, urls) in used {
        debug!(location = %location, "extern location emitted");
        session.store_mut().insert_extern_location(ExternLocation {
            location,
            docs_url: urls.docs_url,
            src_url: urls.src_url,
            index_url: urls.index_url,
        });
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FileCatalog;
    use crate::ids::{CrateNum, LocalId};
    use crate::ingest::dispatch;
    use crate::record::parse_record;
    use crate::resolve::run_fixups;
    use crate::store::RefKind;

    fn session_with_std() -> IngestSession {
        let mut s = IngestSession::new(FileCatalog::default(), "rust", 100);
        s.begin_unit("foo.csv");
        s.begin_crate("foo").unwrap();
        s.register_external_crate(CrateNum::new(1), "std").unwrap();
        s.close_external_crates().unwrap();
        s
    }

    #[test]
    fn foreign_target_gets_exactly_one_stub() {
        let mut s = session_with_std();
        let id = CrateLocalId::new(LocalId::new(42), CrateNum::new(1));
        let first = reference_target(&mut s, RecordKind::FnCall, id, Some("std::mem::swap")).unwrap();
        let second = reference_target(&mut s, RecordKind::FnCall, id, None).unwrap();
        assert!(first.foreign);
        assert_eq!(first.id, second.id);
        assert_eq!(s.store().unknowns().count(), 1);
        let stub = s.store().unknown(first.id).unwrap();
        assert_eq!(stub.crate_name, "std");
        assert_eq!(stub.qualname.as_deref(), Some("std::mem::swap"));
    }

    #[test]
    fn sentinel_foreign_target_gets_no_stub() {
        let mut s = session_with_std();
        let id = CrateLocalId::new(LocalId::SENTINEL, CrateNum::new(1));
        let target = reference_target(&mut s, RecordKind::ModRef, id, None).unwrap();
        assert!(target.id.is_none());
        assert_eq!(s.store().unknowns().count(), 0);
    }

    #[test]
    fn local_target_gets_no_stub() {
        let mut s = session_with_std();
        let id = CrateLocalId::local(LocalId::new(3));
        let target = reference_target(&mut s, RecordKind::VarRef, id, None).unwrap();
        assert!(!target.foreign);
        assert!(s.store().unknown(target.id).is_none());
    }

    #[test]
    fn crate_root_reached_through_extern_crate_gets_a_stub() {
        let mut s = IngestSession::new(FileCatalog::from_paths(["src/lib.rs"]), "rust", 100);
        s.begin_unit("foo.csv");
        s.begin_crate("foo").unwrap();
        s.register_external_crate(CrateNum::new(1), "std").unwrap();
        s.close_external_crates().unwrap();
        for line in [
            "extern_crate,id,7,name,std,crate,1,file_name,src/lib.rs",
            "mod_ref,refid,0,qualname,std,file_name,src/lib.rs,extent_start,20,extent_end,23",
            "mod_ref,refid,0,qualname,nowhere,file_name,src/lib.rs,extent_start,30,extent_end,37",
        ] {
            dispatch(&mut s, &parse_record(line).unwrap()).unwrap();
        }
        assert_eq!(s.store().unknowns().count(), 0);

        let report = run_fixups(&mut s);
        assert_eq!(report.root_stubs, 1);
        assert_eq!(report.unresolved, 1);

        let stubs: Vec<_> = s.store().unknowns().collect();
        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].qualname.as_deref(), Some("std"));
        let resolved: Vec<_> = s
            .store()
            .references()
            .filter(|r| !r.is_unresolved())
            .collect();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].target, stubs[0].id);
        assert_eq!(resolved[0].kind, RefKind::Unknown);
        assert_eq!(resolved[0].stub_of, Some(RefKind::Module));
    }

    #[test]
    fn only_used_locations_are_emitted() {
        let mut s = session_with_std();
        let mut configured = BTreeMap::new();
        configured.insert(
            "std".to_string(),
            ExternLocationConfig {
                docs_url: Some("https://doc.rust-lang.org/std/".to_string()),
                ..ExternLocationConfig::default()
            },
        );
        configured.insert("serde".to_string(), ExternLocationConfig::default());
        assert_eq!(emit_extern_locations(&mut s, &configured), 1);
        let rows: Vec<_> = s.store().extern_locations().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].location, "std");
    }
}
