use crate::error::ConfigError;
use crate::models::Metric;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub rubric: RubricConfig,
    pub weights: ScoringWeights,
    pub location_scores: LocationScores,
    pub score: ScoreConfig,
    pub skills_gaps: Vec<MetricThreshold>,
    pub red_flags: Vec<MetricThreshold>,
    pub flag_outside_target_region: bool,
    pub batch: BatchConfig,
    pub model: ModelConfig,
    pub allowed_extensions: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            rubric: RubricConfig::default(),
            weights: ScoringWeights::default(),
            location_scores: LocationScores::default(),
            score: ScoreConfig::default(),
            skills_gaps: vec![
                MetricThreshold::new(Metric::FinanceEconomics, 7.0),
                MetricThreshold::new(Metric::Excel, 6.0),
                MetricThreshold::new(Metric::Analytical, 7.0),
            ],
            red_flags: vec![
                MetricThreshold::new(Metric::YearsRelevant, 2.0),
                MetricThreshold::new(Metric::Excel, 5.0),
                MetricThreshold::new(Metric::TeamOrientation, 5.0),
            ],
            flag_outside_target_region: true,
            batch: BatchConfig::default(),
            model: ModelConfig::default(),
            allowed_extensions: vec!["pdf".to_string(), "docx".to_string(), "txt".to_string()],
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = &self.weights;
        check_weight_set(
            "weights",
            &[
                ("skills", weights.skills),
                ("experience", weights.experience),
                ("cultural_fit", weights.cultural_fit),
                ("location", weights.location),
            ],
        )?;
        check_weight_set(
            "weights.skill_components",
            &[
                ("finance_economics", weights.skill_components.finance_economics),
                ("analytical", weights.skill_components.analytical),
                ("excel", weights.skill_components.excel),
                ("python_sql", weights.skill_components.python_sql),
            ],
        )?;
        check_weight_set(
            "weights.experience_components",
            &[
                ("autonomy", weights.experience_components.autonomy),
                (
                    "industry_relevance",
                    weights.experience_components.industry_relevance,
                ),
            ],
        )?;
        check_weight_set(
            "weights.cultural_components",
            &[
                (
                    "learning_orientation",
                    weights.cultural_components.learning_orientation,
                ),
                ("impact_driven", weights.cultural_components.impact_driven),
                (
                    "team_orientation",
                    weights.cultural_components.team_orientation,
                ),
            ],
        )?;

        for (field, value) in [
            ("location_scores.in_region", self.location_scores.in_region),
            (
                "location_scores.out_of_region",
                self.location_scores.out_of_region,
            ),
        ] {
            if !(0.0..=10.0).contains(&value) {
                return Err(invalid(field, format!("{value} is outside [0, 10]")));
            }
        }

        for (section, thresholds) in [
            ("skills_gaps", &self.skills_gaps),
            ("red_flags", &self.red_flags),
        ] {
            if let Some(bad) = thresholds.iter().find(|rule| !rule.minimum.is_finite()) {
                return Err(invalid(
                    section,
                    format!("minimum for {} is not finite", bad.metric.label()),
                ));
            }
        }

        if self.rubric.target_region.trim().is_empty() {
            return Err(invalid("rubric.target_region", "must not be empty"));
        }
        if self.batch.concurrency == 0 {
            return Err(invalid("batch.concurrency", "must be at least 1"));
        }
        if self.batch.call_timeout_secs == 0 {
            return Err(invalid("batch.call_timeout_secs", "must be positive"));
        }
        if self.model.max_tokens == 0 {
            return Err(invalid("model.max_tokens", "must be positive"));
        }

        Ok(())
    }
}

fn check_weight_set(section: &str, weights: &[(&str, f64)]) -> Result<(), ConfigError> {
    for (name, value) in weights {
        if !value.is_finite() || *value < 0.0 {
            return Err(invalid(
                format!("{section}.{name}"),
                format!("{value} must be a non-negative number"),
            ));
        }
    }

    let total: f64 = weights.iter().map(|(_, value)| value).sum();
    if total <= 0.0 {
        return Err(invalid(section, "weights must not all be zero"));
    }
    Ok(())
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.into(),
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RubricConfig {
    pub role_title: String,
    pub requirements: Vec<String>,
    pub target_region: String,
}

impl Default for RubricConfig {
    fn default() -> Self {
        Self {
            role_title: "finance role".to_string(),
            requirements: [
                "Strong background in finance and economics",
                "Experience in M&A or target identification",
                "Strong analytical skills",
                "Excel proficiency required",
                "Python/SQL skills are a bonus",
                "Must show autonomy and ownership",
                "Should be enthusiastic about learning",
                "Should demonstrate low ego and team orientation",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            target_region: "United Kingdom".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub skills: f64,
    pub experience: f64,
    pub cultural_fit: f64,
    pub location: f64,
    pub skill_components: SkillWeights,
    pub experience_components: ExperienceWeights,
    pub cultural_components: CulturalWeights,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            skills: 0.45,
            experience: 0.15,
            cultural_fit: 0.25,
            location: 0.15,
            skill_components: SkillWeights::default(),
            experience_components: ExperienceWeights::default(),
            cultural_components: CulturalWeights::default(),
        }
    }
}

impl ScoringWeights {
    pub fn total(&self) -> f64 {
        self.skills + self.experience + self.cultural_fit + self.location
    }

    pub fn percent(&self, weight: f64) -> f64 {
        let total = self.total();
        if total > 0.0 {
            weight / total * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillWeights {
    pub finance_economics: f64,
    pub analytical: f64,
    pub excel: f64,
    pub python_sql: f64,
}

impl Default for SkillWeights {
    fn default() -> Self {
        Self {
            finance_economics: 1.0,
            analytical: 1.0,
            excel: 1.0,
            python_sql: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceWeights {
    pub autonomy: f64,
    pub industry_relevance: f64,
}

impl Default for ExperienceWeights {
    fn default() -> Self {
        Self {
            autonomy: 1.0,
            industry_relevance: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CulturalWeights {
    pub learning_orientation: f64,
    pub impact_driven: f64,
    pub team_orientation: f64,
}

impl Default for CulturalWeights {
    fn default() -> Self {
        Self {
            learning_orientation: 1.0,
            impact_driven: 1.0,
            team_orientation: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationScores {
    pub in_region: f64,
    pub out_of_region: f64,
}

impl Default for LocationScores {
    fn default() -> Self {
        Self {
            in_region: 10.0,
            out_of_region: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreScale {
    Ten,
    Hundred,
}

impl ScoreScale {
    pub fn max(self) -> f64 {
        match self {
            ScoreScale::Ten => 10.0,
            ScoreScale::Hundred => 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorePolicy {
    Recompute,
    TrustModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    pub scale: ScoreScale,
    pub policy: ScorePolicy,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            scale: ScoreScale::Ten,
            policy: ScorePolicy::Recompute,
        }
    }
}

/// A value strictly below `minimum` raises the flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricThreshold {
    pub metric: Metric,
    pub minimum: f64,
}

impl MetricThreshold {
    pub fn new(metric: Metric, minimum: f64) -> Self {
        Self { metric, minimum }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub concurrency: usize,
    pub call_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// 0 disables the circuit breaker.
    pub max_consecutive_failures: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            call_timeout_secs: 120,
            max_retries: 2,
            retry_backoff_ms: 1_000,
            max_consecutive_failures: 3,
        }
    }
}

impl BatchConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-opus-20240229".to_string(),
            max_tokens: 2_048,
            temperature: 0.2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        AnalysisConfig::default()
            .validate()
            .expect("default config should validate");
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = AnalysisConfig::from_json_str(
            r#"{
                "rubric": { "target_region": "Germany" },
                "score": { "scale": "hundred" },
                "red_flags": [{ "metric": "years_relevant", "minimum": 4 }]
            }"#,
        )
        .expect("config should parse");

        assert_eq!(config.rubric.target_region, "Germany");
        assert!(!config.rubric.requirements.is_empty());
        assert_eq!(config.score.scale, ScoreScale::Hundred);
        assert_eq!(config.score.policy, ScorePolicy::Recompute);
        assert_eq!(
            config.red_flags,
            vec![MetricThreshold::new(Metric::YearsRelevant, 4.0)]
        );
        assert_eq!(config.skills_gaps.len(), 3);
    }

    #[test]
    fn negative_weight_is_rejected() {
        let result = AnalysisConfig::from_json_str(r#"{ "weights": { "skills": -1 } }"#);
        match result {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "weights.skills"),
            other => panic!("expected invalid weight, got {other:?}"),
        }
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let result = AnalysisConfig::from_json_str(r#"{ "batch": { "concurrency": 0 } }"#);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let batch = BatchConfig {
            retry_backoff_ms: 100,
            ..BatchConfig::default()
        };
        assert_eq!(batch.backoff_for(1), Duration::from_millis(100));
        assert_eq!(batch.backoff_for(2), Duration::from_millis(200));
        assert_eq!(batch.backoff_for(3), Duration::from_millis(400));
    }

    #[test]
    fn weight_percent_is_normalized() {
        let weights = ScoringWeights {
            skills: 45.0,
            experience: 15.0,
            cultural_fit: 25.0,
            location: 15.0,
            ..ScoringWeights::default()
        };
        assert!((weights.percent(weights.skills) - 45.0).abs() < 1e-9);
    }
}
