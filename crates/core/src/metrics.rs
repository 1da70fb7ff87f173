use crate::config::{AnalysisConfig, MetricThreshold, ScorePolicy};
use crate::models::{CandidateAssessment, Metric};

#[derive(Debug, Clone)]
pub struct DerivedMetricsEngine {
    config: AnalysisConfig,
}

impl DerivedMetricsEngine {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    // Score first: thresholds on `overall_score` must see the final value.
    pub fn enrich(&self, mut assessment: CandidateAssessment) -> CandidateAssessment {
        if self.config.score.policy == ScorePolicy::Recompute {
            assessment.overall_score = self.overall_score(&assessment);
        }
        assessment.skills_gaps = self.skills_gaps(&assessment);
        assessment.red_flags = self.red_flags(&assessment);
        assessment
    }

    pub fn skills_gaps(&self, assessment: &CandidateAssessment) -> Vec<String> {
        shortfalls(&self.config.skills_gaps, assessment)
    }

    pub fn red_flags(&self, assessment: &CandidateAssessment) -> Vec<String> {
        let mut flags = shortfalls(&self.config.red_flags, assessment);

        if self.config.flag_outside_target_region && !assessment.location.is_target_region {
            flags.push(format!(
                "outside target region {} ({})",
                self.config.rubric.target_region, assessment.location.detail
            ));
        }

        flags
    }

    pub fn overall_score(&self, assessment: &CandidateAssessment) -> f64 {
        let weights = &self.config.weights;
        let skills = &weights.skill_components;
        let experience = &weights.experience_components;
        let cultural = &weights.cultural_components;

        let skills_score = weighted_average(&[
            (assessment.skills.finance_economics, skills.finance_economics),
            (assessment.skills.analytical, skills.analytical),
            (assessment.skills.excel, skills.excel),
            (assessment.skills.python_sql, skills.python_sql),
        ]);
        let experience_score = weighted_average(&[
            (assessment.experience.autonomy, experience.autonomy),
            (
                assessment.experience.industry_relevance,
                experience.industry_relevance,
            ),
        ]);
        let cultural_score = weighted_average(&[
            (
                assessment.cultural_fit.learning_orientation,
                cultural.learning_orientation,
            ),
            (assessment.cultural_fit.impact_driven, cultural.impact_driven),
            (
                assessment.cultural_fit.team_orientation,
                cultural.team_orientation,
            ),
        ]);
        let location_score = if assessment.location.is_target_region {
            self.config.location_scores.in_region
        } else {
            self.config.location_scores.out_of_region
        };

        let on_ten = weighted_average(&[
            (skills_score, weights.skills),
            (experience_score, weights.experience),
            (cultural_score, weights.cultural_fit),
            (location_score, weights.location),
        ]);

        on_ten * self.config.score.scale.max() / 10.0
    }
}

fn shortfalls(thresholds: &[MetricThreshold], assessment: &CandidateAssessment) -> Vec<String> {
    thresholds
        .iter()
        .filter_map(|rule| {
            let value = rule.metric.value(assessment);
            (value < rule.minimum).then(|| describe_shortfall(rule.metric, value, rule.minimum))
        })
        .collect()
}

fn describe_shortfall(metric: Metric, value: f64, minimum: f64) -> String {
    let shown = shortfall_figure(value, minimum);
    match metric {
        Metric::YearsRelevant => {
            format!("years_relevant {shown} below minimum {minimum:.1} years")
        }
        _ => format!("{} {shown} below minimum {minimum:.1}", metric.label()),
    }
}

// One decimal unless rounding would hide the shortfall.
fn shortfall_figure(value: f64, minimum: f64) -> String {
    (1..=6)
        .map(|precision| format!("{value:.precision$}"))
        .find(|text| text.parse::<f64>().is_ok_and(|shown| shown < minimum))
        .unwrap_or_else(|| value.to_string())
}

fn weighted_average(parts: &[(f64, f64)]) -> f64 {
    let total_weight: f64 = parts.iter().map(|(_, weight)| weight).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    parts
        .iter()
        .map(|(value, weight)| value * weight)
        .sum::<f64>()
        / total_weight
}
