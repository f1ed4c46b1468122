//! Binary entry point for the downlift CLI.
//!
//! ```bash
//! # report downportable constructs
//! downlift check ./src --format json
//!
//! # apply one round of fixes (re-run until clean to converge)
//! downlift fix ./src
//! ```
//!
//! Sources are `*.abap` files under the given directory; files below a
//! `deps/` directory are registered as dependencies (visible to scope
//! resolution, never analyzed). A `downlift.json` in the directory root
//! supplies the registry configuration; `--target-version` overrides it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use downlift::engine::{Downport, DownportConf};
use downlift::report::CheckReport;
use downlift_core::Issue;
use downlift_syntax::{AbapVersion, Registry, RegistryConfig};

// ============================================================================
// CLI Structure
// ============================================================================

/// Downport newer-syntax ABAP to older language versions.
#[derive(Parser, Debug)]
#[command(name = "downlift", version, about = "ABAP version downporting")]
struct Cli {
    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report downportable constructs without changing any file.
    Check {
        /// Directory containing `*.abap` sources.
        dir: PathBuf,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Override the configured target version.
        #[arg(long)]
        target_version: Option<String>,
    },
    /// Apply one round of fixes to the files on disk.
    Fix {
        /// Directory containing `*.abap` sources.
        dir: PathBuf,

        /// Override the configured target version.
        #[arg(long)]
        target_version: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Check {
            dir,
            format,
            target_version,
        } => run_check(&dir, format, target_version.as_deref()),
        Command::Fix { dir, target_version } => run_fix(&dir, target_version.as_deref()),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn run_check(dir: &Path, format: OutputFormat, target_version: Option<&str>) -> ExitCode {
    let (registry, _) = match build_registry(dir, target_version) {
        Ok(r) => r,
        Err(message) => {
            eprintln!("error: {message}");
            return ExitCode::from(2);
        }
    };

    let (issues, objects_analyzed) = analyze(&registry);
    let report = CheckReport::new(
        registry.config().version.to_string(),
        objects_analyzed,
        &issues,
    );
    match format {
        OutputFormat::Text => print!("{}", report.render_text()),
        OutputFormat::Json => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(2);
            }
        },
    }

    if report.issues.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn run_fix(dir: &Path, target_version: Option<&str>) -> ExitCode {
    let (registry, file_paths) = match build_registry(dir, target_version) {
        Ok(r) => r,
        Err(message) => {
            eprintln!("error: {message}");
            return ExitCode::from(2);
        }
    };

    let (issues, _) = analyze(&registry);

    // one pass: merge the non-overlapping fixes per file and write back;
    // the caller re-runs `fix` until no fixable issues remain
    let mut contents: BTreeMap<String, String> = BTreeMap::new();
    for object in registry.objects() {
        for file in object.files() {
            contents.insert(file.filename().to_string(), file.source().to_string());
        }
    }

    let mut applied = 0usize;
    let mut skipped = 0usize;
    let mut merged: Option<downlift_core::Edit> = None;
    for issue in &issues {
        let Some(fix) = &issue.fix else { continue };
        match &merged {
            None => {
                merged = Some(fix.clone());
                applied += 1;
            }
            Some(existing) => {
                let candidate = downlift_core::Edit::merge(existing.clone(), fix.clone());
                if candidate.has_overlaps() {
                    // an overlapping fix belongs to a later pass
                    skipped += 1;
                } else {
                    merged = Some(candidate);
                    applied += 1;
                }
            }
        }
    }

    if let Some(edit) = merged {
        if let Err(e) = edit.apply(&mut contents) {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
        for filename in edit.filenames() {
            let Some(path) = file_paths.get(filename) else {
                continue;
            };
            let Some(new_content) = contents.get(filename) else {
                continue;
            };
            if let Err(e) = fs::write(path, new_content) {
                eprintln!("error: cannot write {}: {e}", path.display());
                return ExitCode::from(2);
            }
        }
    }

    println!(
        "applied {applied} fix(es), {skipped} deferred to a later pass, {} issue(s) total",
        issues.len()
    );
    ExitCode::SUCCESS
}

fn analyze(registry: &Registry) -> (Vec<Issue>, usize) {
    let engine = Downport::initialize(registry, DownportConf::default());
    let mut issues = Vec::new();
    let mut objects_analyzed = 0usize;
    for object in registry.objects() {
        if object.is_dependency() {
            continue;
        }
        objects_analyzed += 1;
        issues.extend(engine.run(object));
    }
    (issues, objects_analyzed)
}

// ============================================================================
// Registry construction
// ============================================================================

type FilePathIndex = BTreeMap<String, PathBuf>;

fn build_registry(
    dir: &Path,
    target_version: Option<&str>,
) -> Result<(Registry, FilePathIndex), String> {
    if !dir.is_dir() {
        return Err(format!("not a directory: {}", dir.display()));
    }

    let mut config = load_config(dir)?;
    if let Some(v) = target_version {
        config.version = AbapVersion::parse(v)
            .ok_or_else(|| format!("unknown target version: {v}"))?;
    }

    let mut registry = Registry::new(config);
    let mut paths = FilePathIndex::new();
    for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| e.to_string())?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("abap") {
            continue;
        }
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let source = fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        let is_dependency = path
            .components()
            .any(|c| c.as_os_str().eq_ignore_ascii_case("deps"));
        if is_dependency {
            registry.add_dependency(&filename, source);
        } else {
            registry.add_file(&filename, source);
        }
        paths.insert(filename, path.to_path_buf());
    }
    registry.parse();
    Ok((registry, paths))
}

fn load_config(dir: &Path) -> Result<RegistryConfig, String> {
    let path = dir.join("downlift.json");
    if !path.is_file() {
        return Ok(RegistryConfig {
            version: AbapVersion::V702,
            ..RegistryConfig::default()
        });
    }
    let raw = fs::read_to_string(&path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    serde_json::from_str(&raw).map_err(|e| format!("invalid {}: {e}", path.display()))
}
