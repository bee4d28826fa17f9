use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use robust_patcher::config::{self, PatcherConfig};
use robust_patcher::patch::{PatchParser, PatchStatus};
use robust_patcher::service::{self, ApplyOptions, ApplyReport, ValidateReport};
use robust_patcher::FilePatchResult;
use similar::{ChangeTag, TextDiff};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Environment variable consulted when `--base-dir` is absent.
const BASE_DIR_ENV: &str = "ROBUST_PATCHER_BASE_DIR";

#[derive(Parser)]
#[command(name = "robust-patcher")]
#[command(about = "Apply drift-tolerant patch documents to a source tree", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a patch document to a base directory
    Apply {
        /// Patch file, `-` for stdin, or a directory of *.md / *.patch files
        patch: PathBuf,

        /// Directory that file paths in the patch are relative to
        #[arg(short, long)]
        base_dir: Option<PathBuf>,

        /// Dry run - report what would change without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Config file (defaults to robust-patcher.toml in the base directory)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Parse a patch document without touching any files
    Validate {
        /// Patch file, `-` for stdin, or a directory of *.md / *.patch files
        patch: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Config file whose defaults seed option parsing
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Apply {
            patch,
            base_dir,
            dry_run,
            diff,
            json,
            config,
        } => cmd_apply(&patch, base_dir, dry_run, diff, json, config.as_deref()),

        Commands::Validate {
            patch,
            json,
            config,
        } => cmd_validate(&patch, json, config.as_deref()),
    }
}

/// Logs go to stderr; `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve base directory.
///
/// Priority order:
/// 1. Explicit --base-dir flag
/// 2. ROBUST_PATCHER_BASE_DIR environment variable
/// 3. Current directory
fn resolve_base_dir(cli_base_dir: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_base_dir {
        return Ok(path);
    }
    if let Ok(env_path) = env::var(BASE_DIR_ENV) {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    env::current_dir().context("failed to read current directory")
}

/// One patch document and where it came from.
struct Source {
    label: String,
    text: String,
}

/// Read `-` from stdin, a file as-is, or every `*.md`/`*.patch` file of a
/// directory in sorted order.
fn read_sources(patch: &Path) -> Result<Vec<Source>> {
    if patch == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read patch from stdin")?;
        return Ok(vec![Source {
            label: "<stdin>".to_string(),
            text,
        }]);
    }

    if patch.is_dir() {
        let mut files = Vec::new();
        for entry in WalkDir::new(patch).max_depth(1) {
            let entry = entry?;
            let is_patch = matches!(
                entry.path().extension().and_then(|s| s.to_str()),
                Some("md") | Some("patch")
            );
            if entry.file_type().is_file() && is_patch {
                files.push(entry.path().to_path_buf());
            }
        }
        files.sort();
        if files.is_empty() {
            anyhow::bail!("No .md or .patch files found in {}", patch.display());
        }
        return files.iter().map(|path| read_file_source(path)).collect();
    }

    Ok(vec![read_file_source(patch)?])
}

fn read_file_source(path: &Path) -> Result<Source> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read patch {}", path.display()))?;
    Ok(Source {
        label: path.display().to_string(),
        text,
    })
}

/// Print a single value as-is and several as an array.
fn print_json<T: serde::Serialize>(values: &[T]) -> Result<()> {
    let rendered = match values {
        [single] => serde_json::to_string_pretty(single)?,
        many => serde_json::to_string_pretty(many)?,
    };
    println!("{rendered}");
    Ok(())
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &str, original: &str, modified: &str) {
    println!("\n{}", format!("--- {file} (original)").dimmed());
    println!("{}", format!("+++ {file} (patched)").dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
        if change.missing_newline() {
            println!();
        }
    }
}

/// Contents of every target the document names, read before applying.
fn snapshot_targets(text: &str, base_dir: &Path, config: &PatcherConfig) -> HashMap<String, String> {
    let Ok(document) = PatchParser::with_defaults(config.defaults.clone()).parse(text) else {
        return HashMap::new();
    };
    document
        .files
        .iter()
        .filter_map(|file| {
            let content = fs::read_to_string(base_dir.join(&file.path)).ok()?;
            Some((file.path.clone(), content))
        })
        .collect()
}

fn print_result(result: &FilePatchResult) {
    let (symbol, message) = match result.status {
        PatchStatus::Success => ("✓".green(), result.message.normal()),
        PatchStatus::Skipped => ("⊘".yellow(), result.message.yellow()),
        PatchStatus::Failed => ("✗".red(), result.message.red()),
        PatchStatus::FileNotFound => ("?".red(), result.message.red()),
    };
    println!(
        "{} {} [{}]: {}",
        symbol,
        result.file,
        result.action.cyan(),
        message
    );
    if !result.description.is_empty() {
        println!("    {}", result.description.dimmed());
    }
}

fn cmd_apply(
    patch: &Path,
    base_dir: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
    json: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let base_dir = resolve_base_dir(base_dir)?;
    let config = config::discover(config_path, &base_dir)?;
    let sources = read_sources(patch)?;
    let options = ApplyOptions {
        dry_run,
        defaults: config.defaults.clone(),
    };

    let mut reports: Vec<ApplyReport> = Vec::with_capacity(sources.len());
    for source in &sources {
        let mut before = if show_diff && !json {
            snapshot_targets(&source.text, &base_dir, &config)
        } else {
            HashMap::new()
        };

        let report = service::apply(&source.text, &base_dir, &options)
            .with_context(|| format!("failed to apply {}", source.label))?;

        if !json {
            println!("{} {}", "Patch:".bold(), report.metadata.name);
            println!("Source: {}", source.label);
            println!("Base directory: {}", base_dir.display());
            if dry_run {
                println!("{}", "[DRY RUN - no files were modified]".cyan());
            }
            println!();

            for result in &report.results {
                print_result(result);
                if !show_diff {
                    continue;
                }
                if let Some(after) = &result.new_content {
                    let original = before.get(&result.file).map(String::as_str).unwrap_or("");
                    if original != after {
                        display_diff(&result.file, original, after);
                    }
                    before.insert(result.file.clone(), after.clone());
                }
            }

            println!();
            println!("{}", "Summary:".bold());
            println!("  {} succeeded", format!("{}", report.stats.success).green());
            println!("  {} skipped", format!("{}", report.stats.skipped).yellow());
            println!("  {} failed", format!("{}", report.stats.failed).red());
            println!();
        }

        reports.push(report);
    }

    if json {
        print_json(&reports)?;
    }

    if reports.iter().any(ApplyReport::has_failures) {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_validate(patch: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = match config_path {
        Some(path) => config::load_from_path(path)?,
        None => PatcherConfig::default(),
    };
    let sources = read_sources(patch)?;

    let reports: Vec<ValidateReport> = sources
        .iter()
        .map(|source| service::validate(&source.text, &config.defaults))
        .collect();

    if json {
        print_json(&reports)?;
    } else {
        for (source, report) in sources.iter().zip(&reports) {
            match (&report.metadata, &report.error) {
                (Some(metadata), _) => println!(
                    "{} {}: {} ({} file patches, by {}, v{})",
                    "✓".green(),
                    source.label,
                    metadata.name,
                    report.file_count.unwrap_or(0),
                    metadata.author,
                    metadata.version
                ),
                (None, error) => eprintln!(
                    "{} {}: {}",
                    "✗".red(),
                    source.label,
                    error.as_deref().unwrap_or("invalid patch").red()
                ),
            }
        }
    }

    if reports.iter().any(|report| !report.valid) {
        std::process::exit(1);
    }

    Ok(())
}
