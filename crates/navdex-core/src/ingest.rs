//! Record stream ingestion.
//!
//! Each unit's stream is read line by line. Every line is decoded into a
//! typed [`Record`] and routed through [`dispatch`], an exhaustive match over
//! the closed record set. The first unrecognized or malformed record aborts
//! the run with an error naming the unit and line.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info_span};
use walkdir::WalkDir;

use crate::error::{IndexError, IndexResult};
use crate::record::{parse_raw, parse_record, Record, RecordError};
use crate::session::IngestSession;
use crate::writers;

/// File extension of record streams found by directory discovery.
pub const UNIT_EXTENSION: &str = "csv";

/// One unit's record stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSource {
    /// Name used in diagnostics, usually the stream's path.
    pub name: String,
    pub text: String,
}

impl UnitSource {
    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        UnitSource {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn from_path(path: &Path) -> IndexResult<Self> {
        Ok(UnitSource {
            name: path.display().to_string(),
            text: fs::read_to_string(path)?,
        })
    }
}

/// Expand unit arguments: files are taken as-is, directories contribute every
/// `*.csv` below them in path order.
pub fn discover(paths: &[PathBuf]) -> IndexResult<Vec<PathBuf>> {
    let mut units = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found = Vec::new();
            for entry in WalkDir::new(path) {
                let entry = entry.map_err(|e| IndexError::Io(e.into()))?;
                let is_unit = entry.file_type().is_file()
                    && entry.path().extension().and_then(|e| e.to_str()) == Some(UNIT_EXTENSION);
                if is_unit {
                    found.push(entry.into_path());
                }
            }
            found.sort();
            units.extend(found);
        } else {
            units.push(path.clone());
        }
    }
    Ok(units)
}

/// The crate a unit declares, read from its `crate` record.
///
/// Used before ingestion so every crate in the run is known to be local
/// regardless of unit order.
pub fn scan_crate_name(unit: &UnitSource) -> IndexResult<Option<String>> {
    for (idx, line) in unit.text.lines().enumerate() {
        if !line.starts_with("crate,") && !line.starts_with("\"crate\",") {
            continue;
        }
        return match parse_record(line) {
            Ok(Record::Crate(krate)) => Ok(Some(krate.name)),
            Ok(_) => Ok(None),
            Err(err) => Err(IndexError::from_record(&unit.name, idx + 1, line, err)),
        };
    }
    Ok(None)
}

/// Ingest one unit into the session.
pub fn ingest_unit(session: &mut IngestSession, unit: &UnitSource) -> IndexResult<usize> {
    let span = info_span!("ingest", unit = %unit.name);
    let _enter = span.enter();

    session.begin_unit(unit.name.clone());
    let mut records = 0;
    for (idx, line) in unit.text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 1;
        session.set_line(line_no);
        let record = parse_raw(line)
            .and_then(Record::decode)
            .map_err(|err| IndexError::from_record(&unit.name, line_no, line, err))?;
        dispatch(session, &record)
            .map_err(|err| IndexError::from_record(&unit.name, line_no, line, err))?;
        session.count_record();
        records += 1;
    }
    session.end_unit();
    debug!(records, "unit ingested");
    Ok(records)
}

/// Route a record to its writer.
pub fn dispatch(session: &mut IngestSession, record: &Record) -> Result<(), RecordError> {
    match record {
        Record::Crate(r) => writers::write_crate(session, r),
        Record::ExternalCrate(r) => session.register_external_crate(r.num, &r.name),
        Record::EndExternalCrates => session.close_external_crates(),
        Record::Function(r) => writers::write_function(session, r),
        Record::MethodDecl(r) => writers::write_method_decl(session, r),
        Record::Variable(r) => writers::write_variable(session, r),
        Record::Type(r) => writers::write_type(session, r),
        Record::Module(r) => writers::write_module(session, r),
        Record::Impl(r) => writers::write_impl(session, r),
        Record::UseAlias(r) => writers::write_use_alias(session, r),
        Record::ExternCrate(r) => writers::write_extern_crate(session, r),
        Record::Inheritance(r) => writers::write_inheritance(session, r),
        Record::Ref(r) => writers::write_reference(session, r).map(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FileCatalog;

    fn session() -> IngestSession {
        IngestSession::new(FileCatalog::from_paths(["src/lib.rs"]), "rust", 2)
    }

    #[test]
    fn scan_finds_crate_name() {
        let unit = UnitSource::from_text("foo.csv", "external_crate,name,std,crate,1\ncrate,name,foo\n");
        assert_eq!(scan_crate_name(&unit).unwrap().as_deref(), Some("foo"));
        let empty = UnitSource::from_text("e.csv", "");
        assert_eq!(scan_crate_name(&empty).unwrap(), None);
    }

    #[test]
    fn unknown_kind_names_unit_and_line() {
        let mut s = session();
        let unit = UnitSource::from_text("foo.csv", "crate,name,foo\n\nmacro_def,id,1\n");
        let err = ingest_unit(&mut s, &unit).unwrap_err();
        match err {
            IndexError::UnrecognizedRecordKind { unit, line, kind } => {
                assert_eq!(unit, "foo.csv");
                assert_eq!(line, 3);
                assert_eq!(kind, "macro_def");
            }
            other => panic!("expected UnrecognizedRecordKind, got {:?}", other),
        }
    }

    #[test]
    fn record_before_crate_is_malformed() {
        let mut s = session();
        let unit = UnitSource::from_text("foo.csv", "module,id,1,qualname,foo::bar\n");
        let err = ingest_unit(&mut s, &unit).unwrap_err();
        assert!(matches!(err, IndexError::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn external_crate_after_end_is_malformed() {
        let mut s = session();
        let unit = UnitSource::from_text(
            "foo.csv",
            "crate,name,foo\nend_external_crates\nexternal_crate,name,std,crate,1\n",
        );
        let err = ingest_unit(&mut s, &unit).unwrap_err();
        assert!(matches!(err, IndexError::MalformedRecord { line: 3, .. }));
    }

    #[test]
    fn records_are_counted_and_batched() {
        let mut s = session();
        let unit = UnitSource::from_text(
            "foo.csv",
            "crate,name,foo\nmodule,id,1,qualname,foo::a\nmodule,id,2,qualname,foo::b\n",
        );
        assert_eq!(ingest_unit(&mut s, &unit).unwrap(), 3);
        assert_eq!(s.records(), 3);
        assert_eq!(s.store().commit_points().len(), 1);
        assert_eq!(s.store().modules().count(), 2);
    }

    #[test]
    fn discover_expands_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("b.csv"), "").unwrap();
        fs::write(dir.path().join("a.csv"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        let units = discover(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = units
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }
}
