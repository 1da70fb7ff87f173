pub mod clients;
pub mod collection;
pub mod config;
pub mod error;
pub mod export;
pub mod extractor;
pub mod fingerprint;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod traits;
pub mod validator;

pub use clients::AnthropicScoringClient;
pub use collection::{CandidateFilter, ResultCollection, SortKey};
pub use config::{
    AnalysisConfig, BatchConfig, LocationScores, MetricThreshold, ModelConfig, RubricConfig,
    ScoreConfig, ScorePolicy, ScoreScale, ScoringWeights,
};
pub use error::{AnalysisError, ConfigError, ExportError, ScoringError};
pub use export::{write_csv, write_csv_file, write_workbook};
pub use extractor::{DocumentTextExtractor, TextExtractor};
pub use fingerprint::{fingerprint, Claim, ContentFingerprint, FingerprintIndex};
pub use ingest::{discover_documents, load_documents, LoadReport, UnreadableFile};
pub use metrics::DerivedMetricsEngine;
pub use models::{
    CandidateAssessment, ContentSegment, CulturalFit, DocumentKind, ExperienceAssessment,
    ExtractedText, LocationAssessment, Metric, RawDocument, RawResponse, ScoringRequest,
    SkillScores,
};
pub use orchestrator::{AnalysisPipeline, BatchReport, DocumentFailure, DocumentOutcome, DuplicateSkip};
pub use prompt::RubricPromptBuilder;
pub use traits::ScoringService;
pub use validator::ResponseValidator;
