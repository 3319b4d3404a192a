//! Integration tests for the `index` and `query` commands.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use navdex::cli::{run_index, run_query, IndexArgs, Query, Subject};
use navdex::config::CliOverrides;
use navdex::error::{IndexError, OutputErrorCode};
use navdex::index::Index;
use navdex::output::{emit_response, ErrorResponse};

const FOO_UNIT: &str = "\
crate,name,foo,file_name,src/lib.rs
external_crate,name,std,crate,1
end_external_crates
module,id,1,qualname,foo::bar,file_name,src/lib.rs,def_file,src/bar.rs,extent_start,0,extent_end,12
function,id,2,qualname,foo::bar::run,scopeid,1,file_name,src/bar.rs,extent_start,0,extent_end,40
function,id,3,qualname,foo::main,file_name,src/lib.rs,extent_start,14,extent_end,80
fn_call,refid,2,scopeid,3,file_name,src/lib.rs,extent_start,30,extent_end,33
fn_call,refid,9,refidcrate,1,qualname,std::process::exit,scopeid,3,file_name,src/lib.rs,extent_start,50,extent_end,54
";

/// A source tree with one record stream under `analysis/`.
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("src/lib.rs"), "mod bar;\nfn main() { bar::run(); }\n").unwrap();
    fs::write(root.join("src/bar.rs"), "pub fn run() {}\n").unwrap();
    fs::create_dir_all(root.join("analysis")).unwrap();
    fs::write(root.join("analysis/foo.csv"), FOO_UNIT).unwrap();
    dir
}

fn index_args(root: &Path) -> IndexArgs {
    IndexArgs {
        source_root: root.to_path_buf(),
        output: root.join("out").join("index.json"),
        units: vec![root.join("analysis")],
        overrides: CliOverrides {
            exclude: vec!["analysis/**".to_string(), "out/**".to_string()],
            ..CliOverrides::default()
        },
    }
}

fn build(root: &Path) -> PathBuf {
    let args = index_args(root);
    fs::create_dir_all(args.output.parent().unwrap()).unwrap();
    run_index(&args).unwrap();
    args.output
}

mod index_command {
    use super::*;

    #[test]
    fn writes_index_and_reports() {
        let dir = project();
        let args = index_args(dir.path());
        fs::create_dir_all(args.output.parent().unwrap()).unwrap();
        let response = run_index(&args).unwrap();
        assert_eq!(response.status, "ok");
        assert_eq!(response.report.units, 1);
        assert_eq!(response.report.records, 8);
        assert_eq!(response.report.graph.static_calls, 2);
        assert!(response.report.diagnostics.is_empty());

        let index = Index::load(&args.output).unwrap();
        let paths: Vec<_> = index.files().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/bar.rs", "src/lib.rs"]);
        assert!(index.files().iter().all(|f| f.content_hash.is_some()));
        assert_eq!(index.unknowns().len(), 1);
    }

    #[test]
    fn project_config_is_applied() {
        let dir = project();
        fs::write(
            dir.path().join("navdex.json"),
            r#"{
                "language": "rust-2021",
                "extern_locations": {
                    "std": { "docs_url": "https://doc.rust-lang.org/std/" }
                }
            }"#,
        )
        .unwrap();
        let output = build(dir.path());
        let index = Index::load(&output).unwrap();
        assert_eq!(index.language, "rust-2021");
        assert_eq!(
            index
                .extern_location_for("std")
                .and_then(|l| l.docs_url.as_deref()),
            Some("https://doc.rust-lang.org/std/")
        );
    }

    #[test]
    fn malformed_stream_writes_nothing() {
        let dir = project();
        fs::write(
            dir.path().join("analysis/bad.csv"),
            "crate,name,bad\nvariable,id,1,name\n",
        )
        .unwrap();
        let args = index_args(dir.path());
        fs::create_dir_all(args.output.parent().unwrap()).unwrap();
        let err = run_index(&args).unwrap_err();
        assert!(matches!(err, IndexError::MalformedRecord { line: 2, .. }));
        assert_eq!(err.error_code(), OutputErrorCode::InputError);
        assert!(!args.output.exists());
    }

    #[test]
    fn missing_source_root_is_invalid_arguments() {
        let dir = project();
        let mut args = index_args(dir.path());
        args.source_root = dir.path().join("nope");
        let err = run_index(&args).unwrap_err();
        assert_eq!(err.error_code().code(), 2);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let dir = project();
        let mut args = index_args(dir.path());
        args.overrides.batch_size = Some(0);
        let err = run_index(&args).unwrap_err();
        assert!(matches!(err, IndexError::InvalidConfig { .. }));
    }
}

mod query_command {
    use super::*;

    #[test]
    fn callers_by_qualname() {
        let dir = project();
        let output = build(dir.path());
        let response = run_query(
            &output,
            &Query::Callers(Subject::Qualname("foo::bar::run".to_string())),
        )
        .unwrap();
        assert_eq!(response.query, "callers");
        assert_eq!(response.count, 1);
        assert_eq!(response.results[0]["qualname"], "foo::main");
        assert_eq!(response.results[0]["entity"], "function");
    }

    #[test]
    fn definition_at_call_site() {
        let dir = project();
        let output = build(dir.path());
        let response = run_query(
            &output,
            &Query::Definition {
                file: "src/lib.rs".to_string(),
                offset: 31,
            },
        )
        .unwrap();
        assert_eq!(response.count, 1);
        assert_eq!(response.results[0]["entity"]["qualname"], "foo::bar::run");
        assert!(response.results[0]["reference"].is_object());
    }

    #[test]
    fn references_to_foreign_stub() {
        let dir = project();
        let output = build(dir.path());
        let response = run_query(
            &output,
            &Query::References(Subject::Qualname("std::process::exit".to_string())),
        )
        .unwrap();
        assert_eq!(response.count, 1);
        assert_eq!(response.results[0]["kind"], "unknown");
    }

    #[test]
    fn unknown_subject_is_not_found() {
        let dir = project();
        let output = build(dir.path());
        let err = run_query(
            &output,
            &Query::Impls(Subject::Qualname("foo::Nope".to_string())),
        )
        .unwrap_err();
        assert!(matches!(err, IndexError::NotFound { ref subject } if subject == "foo::Nope"));

        let mut buf = Vec::new();
        emit_response(&ErrorResponse::from_error(&err), &mut buf).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["kind"], "NotFound");
    }

    #[test]
    fn unreadable_index_is_index_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        fs::write(&path, "{ not json").unwrap();
        let err = run_query(&path, &Query::Callers(Subject::Id(1))).unwrap_err();
        assert!(matches!(err, IndexError::IndexLoad { .. }));
    }
}
