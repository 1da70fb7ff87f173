use crate::collection::ResultCollection;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, ConfigError, ScoringError};
use crate::extractor::{DocumentTextExtractor, TextExtractor};
use crate::fingerprint::{fingerprint, Claim, ContentFingerprint, FingerprintIndex};
use crate::metrics::DerivedMetricsEngine;
use crate::models::{CandidateAssessment, RawDocument, RawResponse, ScoringRequest};
use crate::prompt::RubricPromptBuilder;
use crate::traits::ScoringService;
use crate::validator::ResponseValidator;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct DocumentFailure {
    pub name: String,
    pub error: AnalysisError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateSkip {
    pub name: String,
    pub first_seen_as: String,
    pub fingerprint: ContentFingerprint,
}

#[derive(Debug)]
pub enum DocumentOutcome {
    Assessed(Box<CandidateAssessment>),
    Duplicate(DuplicateSkip),
    Failed(DocumentFailure),
    Abandoned(String),
}

#[derive(Debug)]
pub struct BatchReport {
    pub assessments: ResultCollection,
    pub failures: Vec<DocumentFailure>,
    pub duplicates: Vec<DuplicateSkip>,
    pub abandoned: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            assessments: ResultCollection::new(),
            failures: Vec::new(),
            duplicates: Vec::new(),
            abandoned: Vec::new(),
            started_at,
            finished_at: started_at,
        }
    }

    pub fn circuit_opened(&self) -> bool {
        !self.abandoned.is_empty()
    }

    fn absorb(&mut self, outcome: DocumentOutcome) {
        match outcome {
            DocumentOutcome::Assessed(assessment) => self.assessments.add(*assessment),
            DocumentOutcome::Duplicate(skip) => self.duplicates.push(skip),
            DocumentOutcome::Failed(failure) => self.failures.push(failure),
            DocumentOutcome::Abandoned(name) => self.abandoned.push(name),
        }
    }
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: usize,
    open: bool,
}

/// Opens after `limit` consecutive scoring-service failures; a limit of 0 never opens.
#[derive(Debug)]
struct CircuitBreaker {
    limit: usize,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            state: Mutex::new(BreakerState::default()),
        }
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn record_failure(&self) {
        let mut state = self.state.lock();
        state.consecutive_failures += 1;
        if self.limit > 0 && state.consecutive_failures >= self.limit && !state.open {
            state.open = true;
            warn!(
                consecutive_failures = state.consecutive_failures,
                "scoring service circuit opened; abandoning remaining documents"
            );
        }
    }

    fn record_response(&self) {
        self.state.lock().consecutive_failures = 0;
    }
}

pub struct AnalysisPipeline<S>
where
    S: ScoringService,
{
    config: AnalysisConfig,
    extractor: DocumentTextExtractor,
    prompts: RubricPromptBuilder,
    validator: ResponseValidator,
    metrics: DerivedMetricsEngine,
    service: S,
}

impl<S> AnalysisPipeline<S>
where
    S: ScoringService,
{
    pub fn new(config: AnalysisConfig, service: S) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            extractor: DocumentTextExtractor,
            prompts: RubricPromptBuilder::new(config.clone()),
            validator: ResponseValidator::new(config.score.scale),
            metrics: DerivedMetricsEngine::new(config.clone()),
            config,
            service,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn prompt_builder(&self) -> &RubricPromptBuilder {
        &self.prompts
    }

    pub async fn run_batch(&self, documents: Vec<RawDocument>) -> BatchReport {
        let index = FingerprintIndex::new();
        let breaker = CircuitBreaker::new(self.config.batch.max_consecutive_failures);
        let mut report = BatchReport::new(Utc::now());

        info!(
            documents = documents.len(),
            concurrency = self.config.batch.concurrency,
            "starting analysis batch"
        );

        let mut outcomes = std::pin::pin!(stream::iter(documents.iter())
            .map(|document| self.process(document, &index, &breaker))
            .buffered(self.config.batch.concurrency.max(1)));

        while let Some(outcome) = outcomes.next().await {
            log_outcome(&outcome);
            report.absorb(outcome);
        }

        report.finished_at = Utc::now();
        info!(
            assessed = report.assessments.len(),
            failed = report.failures.len(),
            duplicates = report.duplicates.len(),
            abandoned = report.abandoned.len(),
            "analysis batch finished"
        );
        report
    }

    pub async fn analyze_document(
        &self,
        document: &RawDocument,
        index: &FingerprintIndex,
    ) -> DocumentOutcome {
        self.process(document, index, &CircuitBreaker::new(0)).await
    }

    async fn process(
        &self,
        document: &RawDocument,
        index: &FingerprintIndex,
        breaker: &CircuitBreaker,
    ) -> DocumentOutcome {
        if breaker.is_open() {
            return DocumentOutcome::Abandoned(document.name.clone());
        }

        let digest = fingerprint(&document.bytes);
        if let Claim::Duplicate { first_seen_as } = index.claim(digest, &document.name) {
            return DocumentOutcome::Duplicate(DuplicateSkip {
                name: document.name.clone(),
                first_seen_as,
                fingerprint: digest,
            });
        }

        match self.assess(document, breaker).await {
            Ok(Some(assessment)) => DocumentOutcome::Assessed(Box::new(assessment)),
            Ok(None) => DocumentOutcome::Abandoned(document.name.clone()),
            Err(error) => DocumentOutcome::Failed(DocumentFailure {
                name: document.name.clone(),
                error,
            }),
        }
    }

    async fn assess(
        &self,
        document: &RawDocument,
        breaker: &CircuitBreaker,
    ) -> Result<Option<CandidateAssessment>, AnalysisError> {
        let extracted = self.extractor.extract(document)?;
        debug!(
            document = %document.name,
            chars = extracted.content.len(),
            "text extracted"
        );

        if breaker.is_open() {
            return Ok(None);
        }

        let request = self.prompts.build(&extracted.content);
        let raw = match self.score_with_retry(&document.name, &request).await {
            Ok(raw) => {
                breaker.record_response();
                raw
            }
            Err(error) => {
                breaker.record_failure();
                return Err(error);
            }
        };

        let assessment = self.validator.validate(&raw, &extracted.source_name)?;
        Ok(Some(self.metrics.enrich(assessment)))
    }

    async fn score_with_retry(
        &self,
        name: &str,
        request: &ScoringRequest,
    ) -> Result<RawResponse, AnalysisError> {
        let batch = &self.config.batch;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let call = tokio::time::timeout(batch.call_timeout(), self.service.score(request));

            let error: ScoringError = match call.await {
                Ok(Ok(raw)) => return Ok(raw),
                Ok(Err(error)) => error,
                Err(_elapsed) => {
                    return Err(AnalysisError::Timeout {
                        seconds: batch.call_timeout_secs,
                    })
                }
            };

            if !error.is_transient() || attempts > batch.max_retries {
                return Err(AnalysisError::ScoringServiceFailure {
                    attempts,
                    source: error,
                });
            }

            let delay = batch.backoff_for(attempts);
            warn!(
                document = name,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                %error,
                "scoring call failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn log_outcome(outcome: &DocumentOutcome) {
    match outcome {
        DocumentOutcome::Assessed(assessment) => info!(
            document = %assessment.source_name,
            overall_score = assessment.overall_score,
            red_flags = assessment.red_flags.len(),
            "document assessed"
        ),
        DocumentOutcome::Duplicate(skip) => info!(
            document = %skip.name,
            first_seen_as = %skip.first_seen_as,
            fingerprint = %skip.fingerprint,
            "duplicate document skipped"
        ),
        DocumentOutcome::Failed(failure) => warn!(
            document = %failure.name,
            kind = failure.error.kind(),
            error = %failure.error,
            "document skipped"
        ),
        DocumentOutcome::Abandoned(name) => warn!(document = %name, "document abandoned"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchConfig;
    use crate::models::ContentSegment;
    use crate::validator::tests::sample_payload;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct KeyedScoringService {
        responses: Vec<(&'static str, Value)>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ScoringService for KeyedScoringService {
        async fn score(&self, request: &ScoringRequest) -> Result<RawResponse, ScoringError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .iter()
                .find(|(marker, _)| request.prompt.contains(marker))
                .map(|(_, payload)| {
                    RawResponse::Segments(vec![ContentSegment::text(payload.to_string())])
                })
                .ok_or_else(|| ScoringError::Transport("connection reset".to_string()))
        }
    }

    struct ScriptedScoringService {
        script: Mutex<VecDeque<Result<RawResponse, ScoringError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedScoringService {
        fn new(script: Vec<Result<RawResponse, ScoringError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ScoringService for ScriptedScoringService {
        async fn score(&self, _request: &ScoringRequest) -> Result<RawResponse, ScoringError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ScoringError::Transport("script exhausted".to_string())))
        }
    }

    struct HangingScoringService;

    #[async_trait]
    impl ScoringService for HangingScoringService {
        async fn score(&self, _request: &ScoringRequest) -> Result<RawResponse, ScoringError> {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            Err(ScoringError::Transport("unreachable".to_string()))
        }
    }

    fn test_config() -> AnalysisConfig {
        AnalysisConfig {
            batch: BatchConfig {
                concurrency: 1,
                call_timeout_secs: 5,
                max_retries: 2,
                retry_backoff_ms: 0,
                max_consecutive_failures: 3,
            },
            ..AnalysisConfig::default()
        }
    }

    fn text_document(name: &str, text: &str) -> RawDocument {
        RawDocument::inferred(name, text.as_bytes().to_vec())
    }

    fn london_payload() -> Value {
        json!({
            "email": null,
            "location": { "is_target_region": true, "detail": "London" },
            "skills": {
                "finance_economics": 8,
                "analytical": 7,
                "excel": 9,
                "python_sql": 6,
                "identified_skills": ["M&A", "Excel"]
            },
            "experience": {
                "years_relevant": 3,
                "autonomy": 7,
                "industry_relevance": 8,
                "key_achievements": []
            },
            "cultural_fit": {
                "learning_orientation": 8,
                "impact_driven": 7,
                "team_orientation": 8,
                "supporting_evidence": []
            },
            "overall_score": 8.5,
            "key_strengths": ["M&A experience"],
            "potential_concerns": []
        })
    }

    #[tokio::test]
    async fn london_candidate_scores_cleanly() {
        let service = KeyedScoringService {
            responses: vec![("3 years in M&A", london_payload())],
            ..Default::default()
        };
        let pipeline = AnalysisPipeline::new(test_config(), service).expect("valid config");

        let report = pipeline
            .run_batch(vec![text_document(
                "london.txt",
                "I have 3 years in M&A, Excel expert, based in London",
            )])
            .await;

        assert!(report.failures.is_empty());
        assert_eq!(report.assessments.len(), 1);
        let assessment = &report.assessments.as_slice()[0];
        assert!(assessment.red_flags.is_empty());
        assert!(assessment.skills_gaps.is_empty());

        let expected = 0.45 * ((8.0 + 7.0 + 9.0 + 6.0) / 4.0)
            + 0.15 * ((7.0 + 8.0) / 2.0)
            + 0.25 * ((8.0 + 7.0 + 8.0) / 3.0)
            + 0.15 * 10.0;
        assert!((assessment.overall_score - expected).abs() < 1e-6);
        assert_eq!(assessment.source_name, "london.txt");
    }

    #[tokio::test]
    async fn schema_violation_does_not_stop_the_batch() {
        let mut broken = sample_payload();
        if let Some(map) = broken.as_object_mut() {
            map.remove("skills");
        }
        let service = KeyedScoringService {
            responses: vec![("candidate one", broken), ("candidate two", sample_payload())],
            ..Default::default()
        };
        let pipeline = AnalysisPipeline::new(test_config(), service).expect("valid config");

        let report = pipeline
            .run_batch(vec![
                text_document("one.txt", "candidate one"),
                text_document("two.txt", "candidate two"),
            ])
            .await;

        assert_eq!(report.assessments.len(), 1);
        assert_eq!(report.assessments.as_slice()[0].source_name, "two.txt");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "one.txt");
        match &report.failures[0].error {
            AnalysisError::SchemaViolation { field, .. } => assert_eq!(field, "skills"),
            other => panic!("expected schema violation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn identical_bytes_under_two_names_are_scored_once() {
        let service = Arc::new(KeyedScoringService {
            responses: vec![("same résumé", sample_payload())],
            ..Default::default()
        });
        let pipeline =
            AnalysisPipeline::new(test_config(), Arc::clone(&service)).expect("valid config");

        let report = pipeline
            .run_batch(vec![
                text_document("first.txt", "same résumé"),
                text_document("renamed.txt", "same résumé"),
            ])
            .await;

        assert_eq!(report.assessments.len(), 1);
        assert_eq!(
            report.duplicates,
            vec![DuplicateSkip {
                name: "renamed.txt".to_string(),
                first_seen_as: "first.txt".to_string(),
                fingerprint: fingerprint("same résumé".as_bytes()),
            }]
        );
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_batch_keeps_input_order_and_deduplicates() {
        let service = Arc::new(KeyedScoringService {
            responses: vec![("cv", sample_payload())],
            ..Default::default()
        });
        let mut config = test_config();
        config.batch.concurrency = 4;
        let pipeline = AnalysisPipeline::new(config, Arc::clone(&service)).expect("valid config");

        let documents = (0..6)
            .map(|index| text_document(&format!("{index}.txt"), &format!("cv {}", index % 3)))
            .collect::<Vec<_>>();
        let report = pipeline.run_batch(documents).await;

        let names = report
            .assessments
            .iter()
            .map(|assessment| assessment.source_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["0.txt", "1.txt", "2.txt"]);
        assert_eq!(report.duplicates.len(), 3);
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn extraction_and_format_failures_are_itemized() {
        let service = KeyedScoringService {
            responses: vec![("fine", sample_payload())],
            ..Default::default()
        };
        let pipeline = AnalysisPipeline::new(test_config(), service).expect("valid config");

        let report = pipeline
            .run_batch(vec![
                RawDocument::new("odd.bin", b"??".to_vec(), crate::DocumentKind::Unknown),
                RawDocument::inferred("broken.pdf", b"%PDF-1.4\n%broken".to_vec()),
                text_document("fine.txt", "fine"),
            ])
            .await;

        let kinds = report
            .failures
            .iter()
            .map(|failure| failure.error.kind())
            .collect::<Vec<_>>();
        assert_eq!(kinds, vec!["unsupported_format", "extraction_failure"]);
        assert_eq!(report.assessments.len(), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let service = Arc::new(ScriptedScoringService::new(vec![
            Err(ScoringError::RateLimited("429".to_string())),
            Err(ScoringError::ServerError {
                status: 529,
                message: "overloaded".to_string(),
            }),
            Ok(RawResponse::Text(sample_payload().to_string())),
        ]));
        let pipeline =
            AnalysisPipeline::new(test_config(), Arc::clone(&service)).expect("valid config");

        let report = pipeline.run_batch(vec![text_document("a.txt", "a")]).await;

        assert_eq!(report.assessments.len(), 1);
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let service = Arc::new(ScriptedScoringService::new(vec![
            Err(ScoringError::Transport("reset".to_string())),
            Err(ScoringError::Transport("reset".to_string())),
            Err(ScoringError::Transport("reset".to_string())),
            Ok(RawResponse::Text(sample_payload().to_string())),
        ]));
        let pipeline =
            AnalysisPipeline::new(test_config(), Arc::clone(&service)).expect("valid config");

        let report = pipeline.run_batch(vec![text_document("a.txt", "a")]).await;

        assert!(report.assessments.is_empty());
        match &report.failures[0].error {
            AnalysisError::ScoringServiceFailure { attempts, .. } => assert_eq!(*attempts, 3),
            other => panic!("expected scoring failure, got {other:?}"),
        }
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn malformed_responses_and_policy_refusals_are_not_retried() {
        let service = Arc::new(ScriptedScoringService::new(vec![
            Ok(RawResponse::Text("not json".to_string())),
            Err(ScoringError::ContentPolicy("refused".to_string())),
        ]));
        let pipeline =
            AnalysisPipeline::new(test_config(), Arc::clone(&service)).expect("valid config");

        let report = pipeline
            .run_batch(vec![text_document("a.txt", "a"), text_document("b.txt", "b")])
            .await;

        let kinds = report
            .failures
            .iter()
            .map(|failure| failure.error.kind())
            .collect::<Vec<_>>();
        assert_eq!(kinds, vec!["malformed_response", "scoring_service_failure"]);
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_call_times_out_and_batch_continues() {
        let mut config = test_config();
        config.batch.max_consecutive_failures = 0;
        let pipeline = AnalysisPipeline::new(config, HangingScoringService).expect("valid config");

        let report = pipeline
            .run_batch(vec![text_document("a.txt", "a"), text_document("b.txt", "b")])
            .await;

        assert!(report.assessments.is_empty());
        assert_eq!(report.failures.len(), 2);
        assert!(report
            .failures
            .iter()
            .all(|failure| matches!(failure.error, AnalysisError::Timeout { seconds: 5 })));
    }

    #[tokio::test]
    async fn circuit_breaker_abandons_the_rest_and_keeps_results() {
        let service = Arc::new(ScriptedScoringService::new(vec![
            Ok(RawResponse::Text(sample_payload().to_string())),
            Err(ScoringError::Api {
                status: 401,
                message: "bad key".to_string(),
            }),
            Err(ScoringError::Api {
                status: 401,
                message: "bad key".to_string(),
            }),
        ]));
        let mut config = test_config();
        config.batch.max_consecutive_failures = 2;
        let pipeline = AnalysisPipeline::new(config, Arc::clone(&service)).expect("valid config");

        let documents = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|name| text_document(&format!("{name}.txt"), name))
            .collect::<Vec<_>>();
        let report = pipeline.run_batch(documents).await;

        assert_eq!(report.assessments.len(), 1);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.abandoned, vec!["d.txt".to_string(), "e.txt".to_string()]);
        assert!(report.circuit_opened());
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn circuit_breaker_under_concurrency_keeps_finished_work() {
        let service = Arc::new(KeyedScoringService {
            responses: vec![("candidate-alpha", sample_payload())],
            ..Default::default()
        });
        let mut config = test_config();
        config.batch.concurrency = 3;
        config.batch.max_retries = 0;
        config.batch.max_consecutive_failures = 2;
        let pipeline = AnalysisPipeline::new(config, Arc::clone(&service)).expect("valid config");

        let mut documents = vec![text_document("alpha.txt", "candidate-alpha")];
        documents.extend(
            ["b", "c", "d", "e", "f", "g", "h"]
                .iter()
                .map(|name| text_document(&format!("{name}.txt"), name)),
        );
        let names: Vec<String> = documents.iter().map(|doc| doc.name.clone()).collect();
        let report = pipeline.run_batch(documents).await;

        let assessed: Vec<&str> = report
            .assessments
            .iter()
            .map(|assessment| assessment.source_name.as_str())
            .collect();
        assert_eq!(assessed, vec!["alpha.txt"]);
        assert!(report.failures.len() >= 2);
        assert!(report.circuit_opened());
        assert!(report.duplicates.is_empty());
        assert_eq!(
            report.assessments.len() + report.failures.len() + report.abandoned.len(),
            names.len()
        );
        assert_eq!(report.abandoned.last().map(String::as_str), Some("h.txt"));

        let first_abandoned = names
            .iter()
            .position(|name| name == &report.abandoned[0])
            .expect("abandoned document comes from the batch");
        assert_eq!(report.abandoned, names[first_abandoned..].to_vec());
        assert_eq!(
            service.calls.load(Ordering::SeqCst),
            report.assessments.len() + report.failures.len()
        );
    }

    #[tokio::test]
    async fn rerunning_a_document_gives_identical_derived_fields() {
        let mut payload = london_payload();
        payload["skills"]["excel"] = json!(4);
        payload["location"]["is_target_region"] = json!(false);
        let service = KeyedScoringService {
            responses: vec![("repeatable", payload)],
            ..Default::default()
        };
        let pipeline = AnalysisPipeline::new(test_config(), service).expect("valid config");
        let document = text_document("r.txt", "repeatable");

        let first = pipeline.run_batch(vec![document.clone()]).await;
        let second = pipeline.run_batch(vec![document]).await;

        let first = &first.assessments.as_slice()[0];
        let second = &second.assessments.as_slice()[0];
        assert!(!first.red_flags.is_empty());
        assert_eq!(first.skills_gaps, second.skills_gaps);
        assert_eq!(first.red_flags, second.red_flags);
        assert_eq!(first.overall_score.to_bits(), second.overall_score.to_bits());
    }

    #[tokio::test]
    async fn analyze_document_shares_the_callers_index() {
        let service = KeyedScoringService {
            responses: vec![("shared", sample_payload())],
            ..Default::default()
        };
        let pipeline = AnalysisPipeline::new(test_config(), service).expect("valid config");
        let index = FingerprintIndex::new();

        let first = pipeline
            .analyze_document(&text_document("a.txt", "shared"), &index)
            .await;
        let second = pipeline
            .analyze_document(&text_document("b.txt", "shared"), &index)
            .await;

        assert!(matches!(first, DocumentOutcome::Assessed(_)));
        assert!(matches!(second, DocumentOutcome::Duplicate(_)));
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = test_config();
        config.batch.concurrency = 0;
        assert!(AnalysisPipeline::new(config, HangingScoringService).is_err());
    }
}
