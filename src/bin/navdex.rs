//! Binary entry point for the navdex CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Index every record stream under target/analysis
//! navdex index --source-root . --output navdex-index.json target/analysis
//!
//! # Who calls this function?
//! navdex query --index navdex-index.json callers --qualname foo::bar::run
//!
//! # What is at byte 120 of src/lib.rs?
//! navdex query --index navdex-index.json definition --file src/lib.rs --offset 120
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};

use navdex::cli::{run_index, run_query, IndexArgs, Query, Subject};
use navdex_core::config::CliOverrides;
use navdex_core::error::{IndexError, OutputErrorCode};
use navdex_core::output::{emit_response, ErrorResponse};

// ============================================================================
// CLI Structure
// ============================================================================

/// Cross-referenced code navigation index.
///
/// Builds an index from compiler analysis records and answers navigation
/// queries against it. All output is JSON.
#[derive(Parser, Debug)]
#[command(name = "navdex", version, about = "Cross-referenced code navigation index")]
struct Cli {
    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest record streams and write an index.
    Index {
        /// Source root the file catalog is built from.
        #[arg(long, default_value = ".")]
        source_root: PathBuf,

        /// Index file to write.
        #[arg(long)]
        output: PathBuf,

        /// Project config file (default: navdex.json in the source root).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Records per commit batch.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Language tag stored on every entity.
        #[arg(long)]
        language: Option<String>,

        /// Extra glob excluded from the file catalog (repeatable).
        #[arg(long)]
        exclude: Vec<String>,

        /// Record stream files, or directories searched for `*.csv`.
        #[arg(required = true)]
        units: Vec<PathBuf>,
    },

    /// Answer a navigation query.
    Query {
        /// Index file written by `navdex index`.
        #[arg(long)]
        index: PathBuf,

        #[command(subcommand)]
        query: QueryCommand,
    },
}

/// Entity selector shared by the id-based queries.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct SubjectArgs {
    /// Global entity id.
    #[arg(long)]
    id: Option<u32>,

    /// Fully qualified name.
    #[arg(long)]
    qualname: Option<String>,
}

impl SubjectArgs {
    fn into_subject(self) -> Subject {
        match (self.id, self.qualname) {
            (Some(id), _) => Subject::Id(id),
            (None, Some(qualname)) => Subject::Qualname(qualname),
            // clap's required group guarantees one of the two.
            (None, None) => Subject::Qualname(String::new()),
        }
    }
}

#[derive(Subcommand, Debug)]
enum QueryCommand {
    /// Entity defined or referenced at a byte offset.
    Definition {
        #[arg(long)]
        file: String,
        #[arg(long)]
        offset: u64,
    },
    /// Every reference to an entity.
    References(SubjectArgs),
    /// Functions calling a function.
    Callers(SubjectArgs),
    /// Functions a function calls.
    Callees(SubjectArgs),
    /// Traits a trait extends.
    Supertraits(SubjectArgs),
    /// Traits extending a trait.
    Subtraits(SubjectArgs),
    /// Impl blocks for a type or trait.
    Impls(SubjectArgs),
}

impl QueryCommand {
    fn into_query(self) -> Query {
        match self {
            QueryCommand::Definition { file, offset } => Query::Definition { file, offset },
            QueryCommand::References(s) => Query::References(s.into_subject()),
            QueryCommand::Callers(s) => Query::Callers(s.into_subject()),
            QueryCommand::Callees(s) => Query::Callees(s.into_subject()),
            QueryCommand::Supertraits(s) => Query::Supertraits(s.into_subject()),
            QueryCommand::Subtraits(s) => Query::Subtraits(s.into_subject()),
            QueryCommand::Impls(s) => Query::Impls(s.into_subject()),
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.log_level);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error_code = OutputErrorCode::from(&err);
            let response = ErrorResponse::from_error(&err);

            // Errors go to stdout as JSON, like every other response
            let _ = emit_response(&response, &mut io::stdout());
            let _ = io::stdout().flush();

            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber. `RUST_LOG` overrides `--log-level`.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn execute(cli: Cli) -> Result<(), IndexError> {
    match cli.command {
        Command::Index {
            source_root,
            output,
            config,
            batch_size,
            language,
            exclude,
            units,
        } => {
            let args = IndexArgs {
                source_root,
                output,
                units,
                overrides: CliOverrides {
                    config_path: config,
                    batch_size,
                    language,
                    exclude,
                },
            };
            let response = run_index(&args)?;
            emit(&response)
        }
        Command::Query { index, query } => {
            let response = run_query(&index, &query.into_query())?;
            emit(&response)
        }
    }
}

fn emit<T: serde::Serialize>(response: &T) -> Result<(), IndexError> {
    emit_response(response, &mut io::stdout())?;
    let _ = io::stdout().flush();
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod cli_parsing {
        use super::*;

        #[test]
        fn index_command_collects_overrides() {
            let cli = Cli::try_parse_from([
                "navdex",
                "index",
                "--source-root",
                "/src",
                "--output",
                "out.json",
                "--batch-size",
                "500",
                "--exclude",
                "gen/**",
                "--exclude",
                "vendor/**",
                "a.csv",
                "analysis",
            ])
            .unwrap();
            match cli.command {
                Command::Index {
                    source_root,
                    batch_size,
                    exclude,
                    units,
                    config,
                    ..
                } => {
                    assert_eq!(source_root, PathBuf::from("/src"));
                    assert_eq!(batch_size, Some(500));
                    assert_eq!(exclude, vec!["gen/**", "vendor/**"]);
                    assert_eq!(units.len(), 2);
                    assert!(config.is_none());
                }
                other => panic!("expected Index, got {:?}", other),
            }
        }

        #[test]
        fn index_requires_units() {
            let result = Cli::try_parse_from(["navdex", "index", "--output", "out.json"]);
            assert!(result.is_err());
        }

        #[test]
        fn query_by_qualname() {
            let cli = Cli::try_parse_from([
                "navdex",
                "query",
                "--index",
                "idx.json",
                "callers",
                "--qualname",
                "foo::run",
            ])
            .unwrap();
            match cli.command {
                Command::Query { query, .. } => {
                    assert_eq!(
                        query.into_query(),
                        Query::Callers(Subject::Qualname("foo::run".to_string()))
                    );
                }
                other => panic!("expected Query, got {:?}", other),
            }
        }

        #[test]
        fn query_subject_is_exclusive() {
            let result = Cli::try_parse_from([
                "navdex", "query", "--index", "idx.json", "impls", "--id", "3", "--qualname",
                "foo::T",
            ]);
            assert!(result.is_err());
        }

        #[test]
        fn log_level_defaults_to_warn() {
            let cli = Cli::try_parse_from([
                "navdex",
                "query",
                "--index",
                "idx.json",
                "definition",
                "--file",
                "src/lib.rs",
                "--offset",
                "12",
            ])
            .unwrap();
            assert!(matches!(cli.log_level, LogLevel::Warn));
        }
    }
}
