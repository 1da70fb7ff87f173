use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use cv_analyzer_core::{
    load_documents, write_csv_file, write_workbook, AnalysisConfig, AnalysisPipeline,
    AnthropicScoringClient, BatchReport, CandidateAssessment, CandidateFilter, DocumentTextExtractor,
    Metric, RawDocument, ResultCollection, RubricPromptBuilder, ScoreScale, SortKey, TextExtractor,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "cv-analyzer", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON configuration file; omitted sections use defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the target region named in the rubric.
    #[arg(long, global = true)]
    target_region: Option<String>,

    /// Override the overall-score scale.
    #[arg(long, global = true, value_enum)]
    scale: Option<ScaleArg>,
}

#[derive(Subcommand)]
enum Command {
    /// Score every résumé in a folder and export ranked results.
    Analyze {
        /// Folder that contains résumés recursively.
        #[arg(long)]
        input: PathBuf,
        /// Anthropic API key.
        #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
        api_key: String,
        /// Messages API endpoint.
        #[arg(long, default_value = cv_analyzer_core::clients::anthropic::DEFAULT_ENDPOINT)]
        endpoint: String,
        /// Number of documents scored concurrently.
        #[arg(long)]
        concurrency: Option<usize>,
        /// Write all results to this CSV file.
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Write a two-sheet workbook split by target region.
        #[arg(long)]
        xlsx: Option<PathBuf>,
        /// Minimum years of relevant experience.
        #[arg(long)]
        min_years: Option<f64>,
        /// Minimum finance/economics score.
        #[arg(long)]
        min_finance: Option<f64>,
        /// Minimum overall score.
        #[arg(long)]
        min_score: Option<f64>,
        /// Keep only candidates in the target region.
        #[arg(long, default_value_t = false)]
        target_region_only: bool,
        /// Sort column.
        #[arg(long, value_enum, default_value = "overall")]
        sort_by: SortArg,
        /// Sort ascending instead of descending.
        #[arg(long, default_value_t = false)]
        ascending: bool,
    },
    /// Print the scoring request that would be sent for one file.
    Prompt {
        #[arg(long)]
        file: PathBuf,
    },
    /// Print the effective configuration as JSON.
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScaleArg {
    Ten,
    Hundred,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Overall,
    Finance,
    Experience,
    Excel,
    Analytical,
    Team,
    Name,
}

impl From<SortArg> for SortKey {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Overall => SortKey::Metric(Metric::OverallScore),
            SortArg::Finance => SortKey::Metric(Metric::FinanceEconomics),
            SortArg::Experience => SortKey::Metric(Metric::YearsRelevant),
            SortArg::Excel => SortKey::Metric(Metric::Excel),
            SortArg::Analytical => SortKey::Metric(Metric::Analytical),
            SortArg::Team => SortKey::Metric(Metric::TeamOrientation),
            SortArg::Name => SortKey::Name,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    if let Some(region) = &cli.target_region {
        config.rubric.target_region = region.clone();
    }
    if let Some(scale) = cli.scale {
        config.score.scale = match scale {
            ScaleArg::Ten => ScoreScale::Ten,
            ScaleArg::Hundred => ScoreScale::Hundred,
        };
    }

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "cv-analyzer boot"
    );

    match cli.command {
        Command::Analyze {
            input,
            api_key,
            endpoint,
            concurrency,
            csv,
            xlsx,
            min_years,
            min_finance,
            min_score,
            target_region_only,
            sort_by,
            ascending,
        } => {
            if let Some(concurrency) = concurrency {
                config.batch.concurrency = concurrency;
            }

            let loaded = load_documents(&input, &config.allowed_extensions);
            for unreadable in &loaded.unreadable {
                warn!(path = %unreadable.path.display(), reason = %unreadable.reason, "unreadable file");
            }
            if loaded.documents.is_empty() {
                anyhow::bail!("no résumés found in {}", input.display());
            }

            let service = AnthropicScoringClient::with_endpoint(endpoint, api_key);
            let target_region = config.rubric.target_region.clone();
            let scale_max = config.score.scale.max();
            let pipeline = AnalysisPipeline::new(config, service)?;
            let report = pipeline.run_batch(loaded.documents).await;

            let filter = CandidateFilter {
                min_years_relevant: min_years,
                min_finance_economics: min_finance,
                min_overall_score: min_score,
                target_region_only,
            };
            let results = filter
                .apply(&report.assessments)
                .sort_by_key(sort_by.into(), !ascending);

            if let Some(path) = &csv {
                write_csv_file(&results, path)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("csv written to {}", path.display());
            }
            if let Some(path) = &xlsx {
                write_workbook(&results, path)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("workbook written to {}", path.display());
            }

            print_summary(&results, &target_region, scale_max);
            print_skips(&report);
        }
        Command::Prompt { file } => {
            let document = read_document(&file)?;
            let extracted = DocumentTextExtractor.extract(&document)?;
            let request = RubricPromptBuilder::new(config).build(&extracted.content);
            println!("{}", serde_json::to_string_pretty(&request)?);
        }
        Command::Config => {
            config.validate()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn read_document(path: &Path) -> anyhow::Result<RawDocument> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string());
    Ok(RawDocument::inferred(name, bytes))
}

fn print_summary(results: &ResultCollection, target_region: &str, scale_max: f64) {
    let (target, other) = results.partition_by_region();

    println!("== candidates in {target_region} ({})", target.len());
    for candidate in target.iter() {
        print_candidate(candidate, scale_max, false);
    }

    println!("== candidates elsewhere ({})", other.len());
    for candidate in other.iter() {
        print_candidate(candidate, scale_max, true);
    }
}

fn print_candidate(candidate: &CandidateAssessment, scale_max: f64, show_location: bool) {
    println!(
        "{} - score {:.1}/{scale_max:.0}",
        candidate.source_name, candidate.overall_score
    );
    if show_location {
        println!("  location: {}", candidate.location.detail);
    }
    if !candidate.key_strengths.is_empty() {
        println!("  strengths: {}", candidate.key_strengths.join(", "));
    }
    let skills = &candidate.skills;
    println!(
        "  finance/economics {}/10  analytical {}/10  excel {}/10  python/sql {}/10",
        skills.finance_economics, skills.analytical, skills.excel, skills.python_sql
    );
    if !candidate.skills_gaps.is_empty() {
        println!("  skills gaps: {}", candidate.skills_gaps.join("; "));
    }
    if !candidate.red_flags.is_empty() {
        println!("  red flags: {}", candidate.red_flags.join("; "));
    }
}

fn print_skips(report: &BatchReport) {
    for failure in &report.failures {
        println!(
            "failed: {} [{}] {}",
            failure.name,
            failure.error.kind(),
            failure.error
        );
    }
    for duplicate in &report.duplicates {
        println!(
            "duplicate: {} (same content as {})",
            duplicate.name, duplicate.first_seen_as
        );
    }
    if report.circuit_opened() {
        println!(
            "scoring service kept failing; {} document(s) not attempted: {}",
            report.abandoned.len(),
            report.abandoned.join(", ")
        );
    }
    println!(
        "finished in {}s at {}",
        (report.finished_at - report.started_at).num_seconds(),
        report.finished_at.to_rfc3339()
    );
}
