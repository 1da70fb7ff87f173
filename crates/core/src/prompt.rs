use crate::config::AnalysisConfig;
use crate::models::ScoringRequest;

#[derive(Debug, Clone)]
pub struct RubricPromptBuilder {
    config: AnalysisConfig,
}

impl RubricPromptBuilder {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, text: &str) -> ScoringRequest {
        ScoringRequest {
            model: self.config.model.model.clone(),
            max_tokens: self.config.model.max_tokens,
            temperature: self.config.model.temperature,
            prompt: self.render(text),
        }
    }

    fn render(&self, text: &str) -> String {
        let rubric = &self.config.rubric;
        let weights = &self.config.weights;

        let requirements: String = rubric
            .requirements
            .iter()
            .map(|requirement| format!("- {requirement}\n"))
            .collect();
        let weighting: String = [
            ("Skills", weights.skills),
            ("Experience", weights.experience),
            ("Cultural fit", weights.cultural_fit),
            ("Location", weights.location),
        ]
        .iter()
        .map(|(category, weight)| format!("- {category}: {:.0}%\n", weights.percent(*weight)))
        .collect();
        let schema = schema_description(&rubric.target_region, self.config.score.scale.max());

        format!(
            "Analyze this CV for a {role} with the following requirements:\n\
             {requirements}\
             - Location preference for candidates based in {region}\n\
             \n\
             Weight the overall score as follows:\n\
             {weighting}\
             \n\
             {JSON_ONLY_INSTRUCTION}\n\
             {schema}\n\
             \n\
             CV Text:\n\
             {text}\n",
            role = rubric.role_title,
            region = rubric.target_region,
        )
    }
}

const JSON_ONLY_INSTRUCTION: &str = "Respond with a single JSON object and nothing else: \
     no prose, no Markdown. It must match this schema exactly:";

fn schema_description(target_region: &str, scale_max: f64) -> String {
    format!(
        r#"{{
    "email": string or null,
    "location": {{"is_target_region": boolean (true if based in {target_region}), "detail": string}},
    "skills": {{
        "finance_economics": number (0-10),
        "analytical": number (0-10),
        "excel": number (0-10),
        "python_sql": number (0-10),
        "identified_skills": [string]
    }},
    "experience": {{
        "years_relevant": number (>= 0),
        "autonomy": number (0-10),
        "industry_relevance": number (0-10),
        "key_achievements": [string]
    }},
    "cultural_fit": {{
        "learning_orientation": number (0-10),
        "impact_driven": number (0-10),
        "team_orientation": number (0-10),
        "supporting_evidence": [string]
    }},
    "overall_score": number (0-{scale_max:.0}),
    "key_strengths": [string],
    "potential_concerns": [string]
}}"#
    )
}
