//! End-to-end indexing run.
//!
//! Phases run strictly in order, each under its own span:
//!
//! 1. **ingest**: every unit's records are dispatched into one session.
//! 2. **fixup**: constructor and path references are resolved.
//! 3. **graph**: inheritance closure and call graph are derived.
//! 4. **commit**: dangling targets are demoted, extern locations emitted, and
//!    the store is frozen into an [`Index`].
//!
//! Any fatal error aborts the run and nothing is returned; a caller writing
//! the index to disk therefore never leaves a partial index behind.

use serde::Serialize;
use tracing::{info, info_span};

use crate::catalog::FileCatalog;
use crate::config::IndexConfig;
use crate::error::IndexResult;
use crate::external::emit_extern_locations;
use crate::graph::{build_graphs, GraphReport};
use crate::index::Index;
use crate::ingest::{ingest_unit, scan_crate_name, UnitSource};
use crate::resolve::{run_fixups, FixupReport};
use crate::session::{Diagnostic, DiagnosticCode, IngestSession};

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub units: usize,
    pub records: u64,
    pub commit_points: usize,
    pub fixups: FixupReport,
    pub graph: GraphReport,
    pub extern_locations: usize,
    pub entities: usize,
    pub references: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs the indexing phases over a set of units.
#[derive(Debug, Clone)]
pub struct Indexer {
    config: IndexConfig,
    catalog: FileCatalog,
}

impl Indexer {
    pub fn new(config: IndexConfig, catalog: FileCatalog) -> Self {
        Indexer { config, catalog }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn catalog(&self) -> &FileCatalog {
        &self.catalog
    }

    /// Index the units and freeze the result.
    pub fn run(&self, units: &[UnitSource]) -> IndexResult<(Index, IndexReport)> {
        let language = self.config.language.value.clone();
        let mut session = IngestSession::new(
            self.catalog.clone(),
            language.clone(),
            self.config.batch_size.value,
        );

        // Crates with a stream in this run are local even when another unit
        // names them as external first.
        for unit in units {
            if let Some(name) = scan_crate_name(unit)? {
                session.declare_local_crate(name);
            }
        }

        for unit in units {
            ingest_unit(&mut session, unit)?;
        }
        session.flush();

        let fixups = run_fixups(&mut session);
        let graph = build_graphs(&mut session)?;

        let span = info_span!("commit");
        let _enter = span.enter();

        for (ref_id, target) in session.store_mut().demote_dangling() {
            session.note(
                DiagnosticCode::DanglingTarget,
                format!("{} targets {} which names no entity", ref_id, target),
            );
        }
        let extern_locations = emit_extern_locations(&mut session, &self.config.extern_locations);
        let records = session.records();
        let (store, diagnostics) = session.into_parts();
        let report = IndexReport {
            units: units.len(),
            records,
            commit_points: store.commit_points().len(),
            fixups,
            graph,
            extern_locations,
            entities: store.entity_count(),
            references: store.reference_count(),
            diagnostics,
        };
        let index = store.freeze(&language);
        info!(
            units = report.units,
            records = report.records,
            diagnostics = report.diagnostics.len(),
            "run complete"
        );
        Ok((index, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::GlobalId;
    use crate::store::RefKind;

    fn indexer() -> Indexer {
        Indexer::new(
            IndexConfig::default().with_batch_size(4),
            FileCatalog::from_paths(["src/lib.rs", "src/bar.rs"]),
        )
    }

    #[test]
    fn run_produces_frozen_index() {
        let unit = UnitSource::from_text(
            "foo.csv",
            "crate,name,foo\n\
             module,id,1,qualname,foo::bar,file_name,src/lib.rs,def_file,src/bar.rs\n\
             function,id,2,qualname,foo::bar::run,scopeid,1,file_name,src/bar.rs\n\
             mod_ref,refid,0,qualname,foo::bar,file_name,src/lib.rs,file_line,3\n",
        );
        let (index, report) = indexer().run(&[unit]).unwrap();
        assert_eq!(report.units, 1);
        assert_eq!(report.records, 4);
        assert_eq!(report.commit_points, 1);
        assert_eq!(report.fixups.exact, 1);
        assert!(report.diagnostics.is_empty());
        assert_eq!(index.language, "rust");
        let module = index.find_by_qualname("foo::bar");
        assert_eq!(module.len(), 1);
        let refs = index.references_to(module[0].id());
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, RefKind::Module);
    }

    #[test]
    fn fatal_record_discards_the_run() {
        let good = UnitSource::from_text("a.csv", "crate,name,a\n");
        let bad = UnitSource::from_text("b.csv", "crate,name,b\nclosure,id,1\n");
        assert!(indexer().run(&[good, bad]).is_err());
    }

    #[test]
    fn dangling_targets_are_demoted_with_a_diagnostic() {
        let unit = UnitSource::from_text("foo.csv", "crate,name,foo\nvar_ref,refid,77\n");
        let (index, report) = indexer().run(&[unit]).unwrap();
        assert_eq!(index.references()[0].target, GlobalId::NONE);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].code, DiagnosticCode::DanglingTarget);
    }

    #[test]
    fn crate_named_external_before_its_own_unit_is_local() {
        let a = UnitSource::from_text(
            "a.csv",
            "crate,name,a\nexternal_crate,name,b,crate,1\nend_external_crates\nfn_call,refid,3,refidcrate,1\n",
        );
        let b = UnitSource::from_text("b.csv", "crate,name,b\nfunction,id,3,qualname,b::f\n");
        let (index, _) = indexer().run(&[a, b]).unwrap();
        assert!(index.unknowns().is_empty());
        let f = index.find_by_qualname("b::f");
        assert_eq!(index.references_to(f[0].id()).len(), 1);
        assert_eq!(index.references()[0].kind, RefKind::Function);
    }
}
