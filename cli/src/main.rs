use std::{
    env,
    ffi::{OsStr, OsString},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context};
use citeaudit_core::document::DocumentNode;
use citeaudit_core::references::ReferenceRecord;
use citeaudit_core::{
    apply_replacements, build_index, validate_for_audit, AuditOutcome, Auditor, ChicagoVariant,
    Config, Normalizer, Severity,
};
use clap::{ArgAction, Parser};
use console::style;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use serde_yaml::Value as YamlValue;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use walkdir::WalkDir;

/// Citation audit CLI entry point.
#[derive(Debug, Parser)]
#[command(
    name = "citeaudit",
    about = "Audit inline citations in editor documents against a citation style."
)]
struct Args {
    /// Path to config file (YAML). Defaults to citeaudit.yml if present.
    #[arg(long, default_value = "citeaudit.yml")]
    config: PathBuf,

    /// Citation style to audit against (APA, MLA, IEEE, Chicago).
    #[arg(long, default_value = "APA")]
    style: String,

    /// Emit JSON output for automation.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Only print the final summary line.
    #[arg(long, action = ArgAction::SetTrue)]
    quiet: bool,

    /// Strict mode: exit non-zero when any error-severity flag is found.
    #[arg(long, action = ArgAction::SetTrue)]
    strict: bool,

    /// Also report readiness problems (too short, no bibliography, ...).
    #[arg(long, action = ArgAction::SetTrue)]
    check_ready: bool,

    /// Glob patterns to skip (comma-separated).
    #[arg(long, value_delimiter = ',', value_name = "GLOB[,GLOB]")]
    ignore: Vec<String>,

    /// Set config overrides (repeatable as key=value). Example: --set audit.chunk_size=250
    #[arg(long = "set", value_name = "KEY=VALUE", num_args = 0..)]
    sets: Vec<String>,

    /// Document JSON files or directories to audit.
    #[arg(value_name = "PATH", default_value = ".", num_args = 0..)]
    paths: Vec<PathBuf>,
}

#[derive(Debug, Parser)]
#[command(
    name = "citeaudit normalize",
    about = "Replace matched plain-text citations with structured citation nodes."
)]
struct NormalizeArgs {
    /// Path to config file (YAML).
    #[arg(long, default_value = "citeaudit.yml")]
    config: PathBuf,

    /// Rewrite the documents in place.
    #[arg(long, action = ArgAction::SetTrue)]
    write: bool,

    /// Document JSON files or directories.
    #[arg(value_name = "PATH", num_args = 0..)]
    paths: Vec<PathBuf>,
}

#[derive(Debug, Parser)]
#[command(
    name = "citeaudit references",
    about = "Print the parsed bibliography of each document."
)]
struct ReferenceArgs {
    /// Path to config file (YAML).
    #[arg(long, default_value = "citeaudit.yml")]
    config: PathBuf,

    /// Emit JSON output.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Document JSON files or directories.
    #[arg(value_name = "PATH", num_args = 0..)]
    paths: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct FileResult {
    path: String,
    #[serde(flatten)]
    outcome: AuditOutcome,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    readiness: Vec<String>,
}

#[derive(Debug, Serialize)]
struct OutputReport {
    files: Vec<FileResult>,
    total_citations: usize,
    total_flags: usize,
}

#[derive(Debug, Serialize)]
struct ReferenceListing {
    path: String,
    references: Vec<ReferenceRecord>,
}

fn main() -> anyhow::Result<()> {
    let argv: Vec<OsString> = env::args_os().collect();
    let subcommand = argv.get(1).map(|a| a.as_os_str());
    let forwarded = || {
        let mut forwarded = Vec::with_capacity(argv.len() - 1);
        forwarded.push(argv[0].clone());
        forwarded.extend_from_slice(&argv[2..]);
        forwarded
    };

    if subcommand == Some(OsStr::new("normalize")) {
        let args = NormalizeArgs::parse_from(forwarded());
        init_tracing(false);
        return run_normalize(args);
    }
    if subcommand == Some(OsStr::new("references")) {
        let args = ReferenceArgs::parse_from(forwarded());
        init_tracing(args.json);
        return run_references(args);
    }

    let args = Args::parse();
    init_tracing(args.quiet || args.json);
    run_audit(args)
}

fn init_tracing(quiet: bool) {
    let default = if quiet {
        "citeaudit=warn,citeaudit_core=warn"
    } else {
        "citeaudit=info,citeaudit_core=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run_audit(args: Args) -> anyhow::Result<()> {
    let (mut cfg, config_root) = load_config(&args.config)?;
    apply_overrides(&mut cfg, &args.sets)?;
    let references = cfg.references.clone();
    let auditor = Auditor::new(cfg).context("Invalid audit configuration")?;

    let ignore = build_ignore_set(&args.ignore)?;
    let mut files = collect_files(&args.paths, ignore.as_ref())?;
    files.sort();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let mut results = Vec::new();
    let mut total_citations = 0usize;
    let mut total_flags = 0usize;
    let mut has_errors = false;

    for path in files {
        let root = load_document(&path)?;
        let outcome = runtime.block_on(auditor.run_audit(&root, &args.style, None));
        let readiness = if args.check_ready {
            validate_for_audit(&root, &references).issues
        } else {
            Vec::new()
        };
        total_citations += outcome.stats.citations_found;
        total_flags += outcome.report.flags.len();
        has_errors |= outcome.has_errors();

        let display = display_path(&path, &config_root);
        if !args.quiet && !args.json {
            print_human_report(&display, &outcome, &readiness);
        }
        results.push(FileResult {
            path: display,
            outcome,
            readiness,
        });
    }

    let output = OutputReport {
        files: results,
        total_citations,
        total_flags,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!(
            "\n{} files, {} citations, {} flags",
            output.files.len(),
            total_citations,
            total_flags
        );
    }

    if args.strict && has_errors {
        std::process::exit(1);
    }
    Ok(())
}

fn run_normalize(args: NormalizeArgs) -> anyhow::Result<()> {
    let (cfg, config_root) = load_config(&args.config)?;
    let normalizer = Normalizer::new(&cfg);
    let files = collect_files(&args.paths, None)?;
    if files.is_empty() {
        println!("No documents matched.");
        return Ok(());
    }

    let mut needs_review = 0usize;
    for path in files {
        let mut root = load_document(&path)?;
        let result = normalizer.normalize(&root);
        println!(
            "{} → {} citations matched, {} need review",
            style(display_path(&path, &config_root)).bold(),
            result.normalized_count(),
            result.issues.len()
        );
        for issue in &result.issues {
            println!("  {} {}", style(&issue.text).yellow(), issue.reason);
            for candidate in &issue.candidates {
                println!("      closest: {}", candidate);
            }
        }
        needs_review += result.issues.len();

        if args.write && !result.replacements.is_empty() {
            let applied = apply_replacements(&mut root, result.replacements)
                .with_context(|| format!("Failed to rewrite {}", path.display()))?;
            let json = serde_json::to_string_pretty(&root)?;
            fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), applied, "rewrote document");
        }
    }

    if needs_review > 0 && !args.write {
        std::process::exit(2);
    }
    Ok(())
}

fn run_references(args: ReferenceArgs) -> anyhow::Result<()> {
    let (cfg, config_root) = load_config(&args.config)?;
    let mut listings = Vec::new();
    for path in collect_files(&args.paths, None)? {
        let root = load_document(&path)?;
        let index = build_index(&root, &cfg.references);
        listings.push(ReferenceListing {
            path: display_path(&path, &config_root),
            references: index.iter().cloned().collect(),
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }
    for listing in &listings {
        println!("{}", style(&listing.path).bold());
        if listing.references.is_empty() {
            println!("  {}", style("no bibliography entries").dim());
        }
        for record in &listing.references {
            println!(
                "  {} {} ({}){}",
                style(&record.id).cyan(),
                record.authors.join(", "),
                record.year,
                record
                    .title
                    .as_deref()
                    .map(|t| format!(" {t}"))
                    .unwrap_or_default()
            );
        }
    }
    Ok(())
}

fn build_ignore_set(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}

fn collect_files(paths: &[PathBuf], ignore: Option<&GlobSet>) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut walker = WalkDir::new(path).into_iter();
            while let Some(entry_res) = walker.next() {
                let entry = entry_res?;
                let entry_path = entry.path();
                if let Some(set) = ignore {
                    if set.is_match(entry_path) {
                        if entry.file_type().is_dir() {
                            walker.skip_current_dir();
                        }
                        continue;
                    }
                }
                if entry.file_type().is_file() && is_document(entry_path) {
                    files.push(entry_path.to_path_buf());
                }
            }
        } else if path.is_file() && is_document(path) {
            if ignore.is_some_and(|set| set.is_match(path)) {
                continue;
            }
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn display_path(path: &Path, root: &Path) -> String {
    let rel = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
    rel.to_string_lossy().replace('\\', "/")
}

fn load_document(path: &Path) -> anyhow::Result<DocumentNode> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse document JSON {}", path.display()))
}

fn load_config(path: &PathBuf) -> anyhow::Result<(Config, PathBuf)> {
    if path.exists() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let value: YamlValue = serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse YAML {}", path.display()))?;
        let cfg: Config = serde_yaml::from_value(value)
            .with_context(|| format!("Invalid config structure in {}", path.display()))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => env::current_dir()?,
        };
        Ok((cfg, dir))
    } else {
        Ok((Config::default(), env::current_dir()?))
    }
}

fn apply_overrides(cfg: &mut Config, sets: &[String]) -> anyhow::Result<()> {
    for kv in sets {
        let mut parts = kv.splitn(2, '=');
        let key = parts.next().unwrap_or("").trim();
        let val = parts.next().unwrap_or("").trim();
        if key.is_empty() {
            continue;
        }
        let bad = || anyhow!("Invalid value `{val}` for {key}");
        match key {
            "matching.threshold" => {
                cfg.matching.threshold = val.parse().map_err(|_| bad())?;
            }
            "references.min_entry_length" => {
                cfg.references.min_entry_length = val.parse().map_err(|_| bad())?;
            }
            "references.headings" => {
                cfg.references.headings = val
                    .split(',')
                    .map(|h| h.trim().to_string())
                    .filter(|h| !h.is_empty())
                    .collect();
            }
            "audit.chunk_size" => {
                cfg.audit.chunk_size = val.parse().map_err(|_| bad())?;
            }
            "audit.verify" => {
                cfg.audit.verify = matches!(val, "true" | "1" | "yes");
            }
            "audit.max_rule_input" => {
                cfg.audit.max_rule_input = val.parse().map_err(|_| bad())?;
            }
            "audit.chicago_variant" => {
                cfg.audit.chicago_variant = if val.eq_ignore_ascii_case("author-date") {
                    ChicagoVariant::AuthorDate
                } else {
                    ChicagoVariant::NotesBibliography
                };
            }
            _ => warn!(key, "ignoring unknown config override"),
        }
    }
    Ok(())
}

fn print_human_report(path: &str, outcome: &AuditOutcome, readiness: &[String]) {
    println!(
        "{} ({} citations, style {})",
        style(path).bold(),
        outcome.stats.citations_found,
        outcome.report.style
    );
    for issue in readiness {
        println!("  {} {}", style("note").dim(), issue);
    }
    if outcome.report.detected_styles.len() > 1 {
        println!(
            "  {} mixed citation forms: {}",
            style("warning").yellow(),
            outcome.report.detected_styles.join(", ")
        );
    }
    if outcome.report.flags.is_empty() {
        println!("  {}", style("clean").green());
        return;
    }
    for flag in &outcome.report.flags {
        let severity = match flag.severity {
            Severity::Error => style("error").red(),
            Severity::Warning => style("warning").yellow(),
        };
        println!(
            "  [{}] {} {}..{} {}",
            severity,
            flag.rule_id,
            flag.anchor.start,
            flag.anchor.end,
            flag.message
        );
        if !flag.anchor.text.is_empty() {
            println!("      → {}", flag.anchor.text);
        }
        if !flag.expected.is_empty() {
            println!("      expected: {}", flag.expected);
        }
    }
    println!("  {}", outcome.summary());
}
