//! Command-line interface for the pattern engine.
//!
//! Every command writes its result to stdout (JSON envelope or text) and
//! returns an [`ExitCode`]. Errors are reported on stderr by `main`.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use pm_common::{Category, Error, IssuePattern, OutputFormat, PatternId, SCHEMA_VERSION};
use pm_config::{
    config_json_schema, resolve_config, resolve_data_dir, validate_config, ConfigError,
    ConfigSnapshot, ResolvedConfig,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::analyze::{AnalysisResult, Analyzer};
use crate::catalog::{FileCatalog, FileHistory, PatternStore};
use crate::exit_codes::ExitCode;
use crate::maintenance::{audit, consolidate_duplicates};
use crate::sources::{Collaborators, FsSources};
use crate::surface::{related_patterns, surface_patterns};

/// Postmortem pattern detection and lifecycle engine.
#[derive(Parser, Debug)]
#[command(name = "pm-core", version, about, propagate_version = true)]
pub struct Cli {
    /// Output format for results on stdout
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Configuration file (JSON or TOML)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Data directory holding sources and the catalog
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze one work unit's postmortem material
    Analyze {
        /// Work unit identifier
        work_unit_id: String,
    },
    /// Inspect the pattern catalog
    Patterns(PatternsArgs),
    /// Rank active patterns for later workflow stages
    Surface {
        /// Maximum number of patterns (defaults to config)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Find active patterns similar to a description
    Related {
        /// Issue description to compare
        text: String,
        /// Similarity threshold (defaults to config)
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Catalog maintenance
    Maintain(MaintainArgs),
    /// Configuration inspection
    Config(ConfigArgs),
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct PatternsArgs {
    #[command(subcommand)]
    pub command: PatternsCommands,
}

#[derive(Subcommand, Debug)]
pub enum PatternsCommands {
    /// List patterns (active only unless --all)
    List {
        /// Include obsolete patterns
        #[arg(long)]
        all: bool,
        /// Filter by category (database, testing, build, ...)
        #[arg(long)]
        category: Option<Category>,
    },
    /// Show one pattern and its source links
    Show {
        /// Pattern id, e.g. PAT-014
        pattern_id: PatternId,
    },
}

#[derive(Args, Debug)]
pub struct MaintainArgs {
    #[command(subcommand)]
    pub command: MaintainCommands,
}

#[derive(Subcommand, Debug)]
pub enum MaintainCommands {
    /// Fold same-text duplicate patterns into the oldest one
    Dedup {
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Summarize catalog data quality
    Audit,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration and where it came from
    Show,
    /// Validate the effective configuration
    Validate,
    /// Print the JSON Schema of the configuration
    Schema,
}

/// Map a configuration error onto the shared error type.
pub fn config_error(err: ConfigError) -> Error {
    match err {
        ConfigError::Invalid(result) => Error::InvalidConfig(result.to_string()),
        other => Error::Config(other.to_string()),
    }
}

/// Dispatch a parsed command line.
pub fn run(cli: &Cli) -> Result<ExitCode, Error> {
    match &cli.command {
        Commands::Analyze { work_unit_id } => run_analyze(cli, work_unit_id),
        Commands::Patterns(args) => match &args.command {
            PatternsCommands::List { all, category } => run_patterns_list(cli, *all, *category),
            PatternsCommands::Show { pattern_id } => run_patterns_show(cli, *pattern_id),
        },
        Commands::Surface { limit } => run_surface(cli, *limit),
        Commands::Related { text, threshold } => run_related(cli, text, *threshold),
        Commands::Maintain(args) => match &args.command {
            MaintainCommands::Dedup { dry_run } => run_dedup(cli, *dry_run),
            MaintainCommands::Audit => run_audit(cli),
        },
        Commands::Config(args) => match &args.command {
            ConfigCommands::Show => run_config_show(cli),
            ConfigCommands::Validate => run_config_validate(cli),
            ConfigCommands::Schema => run_config_schema(cli),
        },
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "pm-core", &mut io::stdout());
            Ok(ExitCode::Clean)
        }
    }
}

fn load_config(cli: &Cli) -> Result<ResolvedConfig, Error> {
    resolve_config(cli.config.as_deref()).map_err(config_error)
}

fn data_dir(cli: &Cli) -> Result<PathBuf, Error> {
    let dir = resolve_data_dir(cli.data_dir.as_deref()).map_err(config_error)?;
    debug!(path = %dir.display(), "using data directory");
    Ok(dir)
}

/// Standard JSON envelope around a command payload.
fn envelope(command: &str, key: &str, payload: impl Serialize) -> Result<Value, Error> {
    let mut out = json!({
        "schema_version": SCHEMA_VERSION,
        "generated_at": Utc::now().to_rfc3339(),
        "command": command,
    });
    out[key] = serde_json::to_value(payload)?;
    Ok(out)
}

fn print_json(value: &Value) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_analyze(cli: &Cli, work_unit_id: &str) -> Result<ExitCode, Error> {
    let resolved = load_config(cli)?;
    let dir = data_dir(cli)?;

    let sources = FsSources::new(&dir);
    let catalog = FileCatalog::in_data_dir(&dir);
    let history = FileHistory::in_data_dir(&dir);
    let analyzer = Analyzer::new(
        resolved.config,
        Collaborators::all(&sources),
        &catalog,
        &history,
    )
    .with_config_source(resolved.source);

    let result = analyzer.analyze(work_unit_id)?;

    match cli.format {
        OutputFormat::Json => print_json(&envelope("analyze", "result", &result)?)?,
        OutputFormat::Text => print_analysis_text(&result),
    }

    Ok(if result.has_findings() {
        ExitCode::Findings
    } else {
        ExitCode::Clean
    })
}

fn print_analysis_text(result: &AnalysisResult) {
    println!("# Analysis: {}", result.work_unit_id);
    println!();
    println!("  Issues found: {}", result.issues_found.len());
    for issue in &result.issues_found {
        println!("    - [{}] {}", issue.kind, issue.description);
    }
    println!("  Patterns matched: {}", result.patterns_matched.len());
    for update in &result.patterns_updated {
        println!(
            "    - {} (now {} occurrences)",
            update.pattern_id, update.new_occurrence_count
        );
    }
    println!("  Patterns created: {}", result.patterns_created.len());
    for pattern in &result.patterns_created {
        println!("    - {}", pattern_line(pattern));
    }
    if !result.prevention_opportunities.is_empty() {
        println!("  Prevention opportunities:");
        for opp in &result.prevention_opportunities {
            println!(
                "    - {} ({} issues, {} priority): {}",
                opp.category, opp.issue_count, opp.priority, opp.suggestion
            );
        }
    }
}

fn pattern_line(p: &IssuePattern) -> String {
    format!(
        "{} [{}/{}] x{} {} {}: {}",
        p.pattern_id,
        p.category,
        p.severity,
        p.occurrence_count,
        p.status,
        p.trend,
        p.issue_summary
    )
}

fn open_catalog(cli: &Cli) -> Result<FileCatalog, Error> {
    Ok(FileCatalog::in_data_dir(&data_dir(cli)?))
}

fn run_patterns_list(
    cli: &Cli,
    all: bool,
    category: Option<Category>,
) -> Result<ExitCode, Error> {
    let catalog = open_catalog(cli)?;
    let mut patterns = if all {
        catalog.list_all()?
    } else {
        catalog.list_active()?
    };
    if let Some(category) = category {
        patterns.retain(|p| p.category == category);
    }

    match cli.format {
        OutputFormat::Json => {
            let mut out = envelope("patterns list", "patterns", &patterns)?;
            out["count"] = json!(patterns.len());
            print_json(&out)?;
        }
        OutputFormat::Text => {
            println!("# Patterns ({} total)", patterns.len());
            println!();
            for p in &patterns {
                println!("  {}", pattern_line(p));
            }
        }
    }
    Ok(ExitCode::Clean)
}

fn run_patterns_show(cli: &Cli, pattern_id: PatternId) -> Result<ExitCode, Error> {
    let catalog = open_catalog(cli)?;
    let pattern = catalog.get(pattern_id)?.ok_or_else(|| Error::PatternNotFound {
        pattern_id: pattern_id.to_string(),
    })?;
    let links = catalog.links_for(pattern_id)?;

    match cli.format {
        OutputFormat::Json => {
            let mut out = envelope("patterns show", "pattern", &pattern)?;
            out["links"] = serde_json::to_value(&links)?;
            print_json(&out)?;
        }
        OutputFormat::Text => {
            println!("# Pattern: {}", pattern.pattern_id);
            println!();
            println!("  Summary: {}", pattern.issue_summary);
            println!("  Category: {}", pattern.category);
            println!("  Severity: {}", pattern.severity);
            println!("  Occurrences: {}", pattern.occurrence_count);
            println!("  Status: {} ({})", pattern.status, pattern.trend);
            println!(
                "  Seen: {} .. {}",
                pattern.first_seen_work_unit_id, pattern.last_seen_work_unit_id
            );
            for solution in &pattern.proven_solutions {
                println!("  Solution: {}", solution);
            }
            println!("  Links: {}", links.len());
            for link in &links {
                println!(
                    "    - {} {}#{} ({:?})",
                    link.work_unit_id, link.source, link.candidate_index, link.link
                );
            }
        }
    }
    Ok(ExitCode::Clean)
}

fn run_surface(cli: &Cli, limit: Option<usize>) -> Result<ExitCode, Error> {
    let mut config = load_config(cli)?.config.surfacing;
    if let Some(limit) = limit {
        config.limit = limit;
    }
    let patterns = open_catalog(cli)?.list_active()?;
    let surfaced = surface_patterns(&patterns, Utc::now(), &config);

    match cli.format {
        OutputFormat::Json => print_json(&envelope("surface", "surfaced", &surfaced)?)?,
        OutputFormat::Text => {
            println!(
                "# Surfaced patterns ({} shown, {} filtered)",
                surfaced.patterns.len(),
                surfaced.filtered.total_filtered()
            );
            println!();
            for s in &surfaced.patterns {
                println!(
                    "  {} confidence={} {} {}",
                    s.pattern.pattern_id, s.confidence, s.recency, s.pattern.issue_summary
                );
            }
        }
    }
    Ok(ExitCode::Clean)
}

fn run_related(cli: &Cli, text: &str, threshold: Option<f64>) -> Result<ExitCode, Error> {
    let threshold =
        threshold.unwrap_or(load_config(cli)?.config.matching.similarity_threshold);
    let patterns = open_catalog(cli)?.list_active()?;
    let related = related_patterns(text, &patterns, threshold);

    match cli.format {
        OutputFormat::Json => {
            let mut out = envelope("related", "related", &related)?;
            out["threshold"] = json!(threshold);
            print_json(&out)?;
        }
        OutputFormat::Text => {
            println!("# Related patterns ({} found)", related.len());
            for r in &related {
                println!("  {:.3} {}", r.similarity, pattern_line(&r.pattern));
            }
        }
    }
    Ok(ExitCode::Clean)
}

fn run_dedup(cli: &Cli, dry_run: bool) -> Result<ExitCode, Error> {
    let catalog = open_catalog(cli)?;
    let report = consolidate_duplicates(&catalog, dry_run)?;

    match cli.format {
        OutputFormat::Json => print_json(&envelope("maintain dedup", "report", &report)?)?,
        OutputFormat::Text => {
            println!(
                "# Dedup: {} groups merged, {} patterns obsoleted{}",
                report.groups_merged,
                report.patterns_obsoleted,
                if dry_run { " (dry run)" } else { "" }
            );
            for group in &report.groups {
                let ids: Vec<String> = group.obsoleted.iter().map(|id| id.to_string()).collect();
                println!(
                    "  {} <- {} (x{}, {})",
                    group.canonical,
                    ids.join(", "),
                    group.occurrence_count,
                    group.severity
                );
            }
        }
    }
    Ok(ExitCode::Clean)
}

fn run_audit(cli: &Cli) -> Result<ExitCode, Error> {
    let patterns = open_catalog(cli)?.list_all()?;
    let report = audit(&patterns);

    match cli.format {
        OutputFormat::Json => print_json(&envelope("maintain audit", "audit", &report)?)?,
        OutputFormat::Text => {
            println!(
                "# Audit: {} patterns ({} active, {} obsolete)",
                report.total, report.active, report.obsolete
            );
            for (category, count) in &report.by_category {
                println!("  {category}: {count}");
            }
            if !report.missing_solutions.is_empty() {
                let ids: Vec<String> = report
                    .missing_solutions
                    .iter()
                    .map(|id| id.to_string())
                    .collect();
                println!("  Missing proven solutions: {}", ids.join(", "));
            }
        }
    }
    Ok(ExitCode::Clean)
}

fn run_config_show(cli: &Cli) -> Result<ExitCode, Error> {
    let resolved = load_config(cli)?;
    let snapshot = ConfigSnapshot::from_resolved(&resolved);

    match cli.format {
        OutputFormat::Json => print_json(&envelope("config show", "snapshot", &snapshot)?)?,
        OutputFormat::Text => {
            let source = snapshot
                .source
                .path()
                .map(Path::display)
                .map(|d| d.to_string())
                .unwrap_or_else(|| "built-in defaults".to_string());
            println!("# Config ({})", snapshot.short_hash());
            println!("  Source: {source}");
            println!("{}", serde_json::to_string_pretty(&snapshot.config)?);
        }
    }
    Ok(ExitCode::Clean)
}

fn run_config_validate(cli: &Cli) -> Result<ExitCode, Error> {
    let resolved = load_config(cli)?;
    let result = validate_config(&resolved.config);
    match cli.format {
        OutputFormat::Json => {
            let mut out = envelope("config validate", "valid", result.is_ok())?;
            out["source"] = serde_json::to_value(&resolved.source)?;
            print_json(&out)?;
        }
        OutputFormat::Text => println!("config OK"),
    }
    Ok(ExitCode::Clean)
}

fn run_config_schema(_cli: &Cli) -> Result<ExitCode, Error> {
    print_json(&config_json_schema())?;
    Ok(ExitCode::Clean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "pm-core",
            "patterns",
            "list",
            "--category",
            "database",
            "--format",
            "text",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Text);
        match cli.command {
            Commands::Patterns(PatternsArgs {
                command: PatternsCommands::List { all, category },
            }) => {
                assert!(!all);
                assert_eq!(category, Some(Category::Database));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_pattern_id() {
        assert!(Cli::try_parse_from(["pm-core", "patterns", "show", "PAT-x"]).is_err());
        assert!(Cli::try_parse_from(["pm-core", "patterns", "show", "PAT-007"]).is_ok());
    }

    #[test]
    fn invalid_config_maps_to_config_code() {
        let err = config_error(ConfigError::DataDirUnavailable);
        assert_eq!(err.code(), 10);
        assert_eq!(ExitCode::for_error(&err), ExitCode::ConfigError);
    }
}
