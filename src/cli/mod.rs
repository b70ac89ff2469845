//! Command-line interface for claimtrace.
//!
//! Provides commands for investigating a case document, inspecting the
//! extraction and normalization stages, investigating a batch of documents,
//! auditing date coverage, and showing the resolved configuration.

use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::audit::date_coverage;
use crate::config::{self, ResolvedConfig};
use crate::core::{InputLimits, InvestigationOptions, Investigator};
use crate::extract::DateParser;

/// claimtrace - Investigative reasoning over OCR'd medical records
#[derive(Parser, Debug)]
#[command(name = "claimtrace")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Investigate one document and print the report
    Investigate {
        #[command(flatten)]
        input: InputArgs,

        /// Insurance contract date (YYYY-MM-DD)
        #[arg(long)]
        contract_date: String,

        /// Override the case ID (derived from the input by default)
        #[arg(long)]
        case_id: Option<String>,

        #[command(flatten)]
        options: OptionArgs,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the raw events extracted from a document
    Extract {
        #[command(flatten)]
        input: InputArgs,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Match a hospital, diagnosis or code against the reference data
    #[command(group(ArgGroup::new("query").required(true).multiple(true).args(["hospital", "diagnosis", "code"])))]
    Normalize {
        /// Hospital name as read
        #[arg(long)]
        hospital: Option<String>,

        /// Diagnosis name as read
        #[arg(long)]
        diagnosis: Option<String>,

        /// Diagnostic code as read
        #[arg(long)]
        code: Option<String>,
    },

    /// Investigate every file matching a glob; one JSON report per line
    Batch {
        /// Glob pattern (e.g., "cases/*.txt")
        pattern: String,

        /// Insurance contract date (YYYY-MM-DD)
        #[arg(long)]
        contract_date: String,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// Compare the dates of a generated text against a baseline
    AuditDates {
        /// Baseline text (e.g., a reviewer's report)
        #[arg(long)]
        baseline: PathBuf,

        /// Generated text to check
        #[arg(long)]
        generated: PathBuf,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Show resolved configuration
    Config,
}

#[derive(Args, Debug)]
pub struct InputArgs {
    /// Input file (reads from stdin if not provided)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Read input from stdin
    #[arg(long)]
    pub stdin: bool,
}

/// Per-run overrides of the configured investigation options
#[derive(Args, Debug, Default)]
pub struct OptionArgs {
    /// Diagnosis under review, as a name or a code
    #[arg(long)]
    pub target: Option<String>,

    /// Distinct hospitals in one window that count as doctor shopping
    #[arg(long)]
    pub threshold: Option<usize>,

    /// Sliding window length in days
    #[arg(long)]
    pub window_days: Option<i64>,

    /// Minimum similarity for dictionary matches, in (0, 1]
    #[arg(long)]
    pub min_match: Option<f64>,

    /// Reference date for plausibility checks (YYYY-MM-DD, default: today)
    #[arg(long)]
    pub as_of: Option<String>,
}

impl OptionArgs {
    /// Apply the overrides on top of the configured defaults
    pub fn apply(&self, base: &InvestigationOptions) -> InvestigationOptions {
        let mut options = base.clone();
        if let Some(target) = &self.target {
            options.target_diagnosis = Some(target.clone());
        }
        if let Some(threshold) = self.threshold {
            options.shopping_threshold = threshold;
        }
        if let Some(days) = self.window_days {
            options.window_days = days;
        }
        if let Some(score) = self.min_match {
            options.min_match_score = score;
        }
        if let Some(as_of) = &self.as_of {
            options.as_of = Some(as_of.clone());
        }
        options
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Investigate {
                input,
                contract_date,
                case_id,
                options,
                pretty,
            } => investigate(&input, &contract_date, case_id.as_deref(), &options, pretty).await,
            Commands::Extract { input, pretty } => extract(&input, pretty).await,
            Commands::Normalize {
                hospital,
                diagnosis,
                code,
            } => normalize(hospital, diagnosis, code).await,
            Commands::Batch {
                pattern,
                contract_date,
                options,
            } => batch(&pattern, &contract_date, &options).await,
            Commands::AuditDates {
                baseline,
                generated,
                pretty,
            } => audit_dates(&baseline, &generated, pretty).await,
            Commands::Config => show_config().await,
        }
    }
}

/// Read the input document from a file or stdin, within the input limits
fn read_input(args: &InputArgs, limits: &InputLimits) -> Result<String> {
    let input = if let Some(path) = &args.input {
        read_file(path, limits)?
    } else if args.stdin || !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .take(limits.max_input_bytes.saturating_add(1))
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        limits.validate_input(&buffer, None)?;
        buffer
    } else {
        anyhow::bail!("No input provided. Use --input <file> or pipe to stdin");
    };

    Ok(input)
}

fn read_file(path: &Path, limits: &InputLimits) -> Result<String> {
    limits.validate_path(path)?;
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    limits.validate_size(metadata.len())?;

    // The file may grow between the size check and the read
    let mut content = String::new();
    std::fs::File::open(path)
        .and_then(|file| {
            file.take(limits.max_input_bytes.saturating_add(1))
                .read_to_string(&mut content)
        })
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    limits.validate_input(&content, None)?;
    Ok(content)
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

async fn investigate(
    input: &InputArgs,
    contract_date: &str,
    case_id: Option<&str>,
    overrides: &OptionArgs,
    pretty: bool,
) -> Result<()> {
    let cfg = config::config()?;
    let text = read_input(input, &cfg.limits)?;
    let investigator = cfg.investigator()?;
    let options = overrides.apply(&cfg.investigation);

    let report = investigator.investigate_text(case_id, &text, contract_date, &options)?;
    println!("{}", to_json(&report, pretty)?);
    Ok(())
}

async fn extract(input: &InputArgs, pretty: bool) -> Result<()> {
    let cfg = config::config()?;
    let text = read_input(input, &cfg.limits)?;
    let investigator = cfg.investigator()?;

    let events = investigator.extract(&text);
    println!("{}", to_json(&events, pretty)?);
    Ok(())
}

async fn normalize(
    hospital: Option<String>,
    diagnosis: Option<String>,
    code: Option<String>,
) -> Result<()> {
    let cfg = config::config()?;
    let investigator = cfg.investigator()?;
    let normalizer = investigator.normalizer();

    let mut output = serde_json::Map::new();
    if let Some(hospital) = hospital {
        output.insert(
            "hospital".to_string(),
            serde_json::to_value(normalizer.match_hospital(&hospital))?,
        );
    }
    if let Some(diagnosis) = diagnosis {
        output.insert(
            "diagnosis".to_string(),
            serde_json::to_value(normalizer.match_diagnosis(&diagnosis))?,
        );
    }
    if let Some(code) = code {
        let resolved = normalizer.resolve_code(&code).map(|r| {
            json!({
                "code": r.code,
                "remappedFrom": r.remapped_from,
                "canonical": r.canonical,
            })
        });
        output.insert("code".to_string(), resolved.unwrap_or(serde_json::Value::Null));
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Investigate each matching file on the blocking pool; reports are
/// printed in path order
async fn batch(pattern: &str, contract_date: &str, overrides: &OptionArgs) -> Result<()> {
    let cfg = config::config()?;
    let investigator = Arc::new(cfg.investigator()?);
    let options = Arc::new(overrides.apply(&cfg.investigation));

    let mut paths: Vec<PathBuf> = glob::glob(pattern)
        .with_context(|| format!("Invalid glob pattern: {}", pattern))?
        .filter_map(|entry| match entry {
            Ok(path) if path.is_file() => Some(path),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable path");
                None
            }
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        anyhow::bail!("No files match pattern: {}", pattern);
    }
    cfg.limits.validate_batch(paths.len())?;
    info!(cases = paths.len(), "Starting batch");

    let handles: Vec<_> = paths
        .into_iter()
        .map(|path| {
            let investigator = Arc::clone(&investigator);
            let options = Arc::clone(&options);
            let limits = cfg.limits.clone();
            let contract_date = contract_date.to_string();
            tokio::task::spawn_blocking(move || {
                let result = investigate_file(&investigator, &path, &contract_date, &options, &limits);
                (path, result)
            })
        })
        .collect();

    let total = handles.len();
    let mut failed = 0;
    for handle in handles {
        let (path, result) = handle.await.context("Batch worker panicked")?;
        match result {
            Ok(line) => println!("{}", line),
            Err(e) => {
                failed += 1;
                eprintln!("[{}] {:#}", path.display(), e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} cases failed", failed, total);
    }
    Ok(())
}

fn investigate_file(
    investigator: &Investigator,
    path: &Path,
    contract_date: &str,
    options: &InvestigationOptions,
    limits: &InputLimits,
) -> Result<String> {
    let text = read_file(path, limits)?;
    let report = investigator.investigate_text(None, &text, contract_date, options)?;
    to_json(&report, false)
}

async fn audit_dates(baseline: &Path, generated: &Path, pretty: bool) -> Result<()> {
    let cfg = config::config()?;
    let baseline = read_file(baseline, &cfg.limits)?;
    let generated = read_file(generated, &cfg.limits)?;

    let coverage = date_coverage(&DateParser::new(), &baseline, &generated);
    println!("{}", to_json(&coverage, pretty)?);
    Ok(())
}

/// Show resolved configuration
async fn show_config() -> Result<()> {
    let cfg: &ResolvedConfig = config::config()?;

    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!("Home:        {}", cfg.home.display());
    println!(
        "Reference:   {}",
        cfg.reference
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(built-in)".to_string())
    );
    println!();
    println!("{}", serde_yaml::to_string(cfg)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::InputViolation;

    #[test]
    fn test_option_overrides() {
        let base = InvestigationOptions::default();
        let overrides = OptionArgs {
            target: Some("위암".to_string()),
            threshold: Some(2),
            ..Default::default()
        };

        let options = overrides.apply(&base);
        assert_eq!(options.target_diagnosis.as_deref(), Some("위암"));
        assert_eq!(options.shopping_threshold, 2);
        assert_eq!(options.window_days, base.window_days);
    }

    #[test]
    fn test_cli_parses_investigate() {
        let cli = Cli::try_parse_from([
            "claimtrace",
            "investigate",
            "--input",
            "case.txt",
            "--contract-date",
            "2024-03-01",
            "--target",
            "C16",
            "--threshold",
            "2",
        ])
        .unwrap();

        match cli.command {
            Commands::Investigate {
                input,
                contract_date,
                options,
                ..
            } => {
                assert_eq!(input.input, Some(PathBuf::from("case.txt")));
                assert_eq!(contract_date, "2024-03-01");
                assert_eq!(options.target.as_deref(), Some("C16"));
                assert_eq!(options.threshold, Some(2));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_normalize_requires_a_query() {
        assert!(Cli::try_parse_from(["claimtrace", "normalize"]).is_err());
        assert!(Cli::try_parse_from(["claimtrace", "normalize", "--code", "C16.9"]).is_ok());
    }

    #[test]
    fn test_read_file_enforces_limits() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("case.txt");
        std::fs::write(&path, "2024-02-12 서울대학교병원 진단명: 위암").unwrap();

        let limits = InputLimits {
            max_input_bytes: 8,
            ..Default::default()
        };
        let err = read_file(&path, &limits).unwrap_err();
        // rejected on the file size, before any of it is read
        let file_len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(
            err.downcast_ref::<InputViolation>(),
            Some(&InputViolation::MaxInputBytes {
                actual: file_len,
                limit: 8,
            })
        );
        assert!(read_file(&path, &InputLimits::default()).is_ok());
    }
}
