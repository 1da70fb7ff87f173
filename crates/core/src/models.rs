use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Docx,
    PlainText,
    Unknown,
}

impl DocumentKind {
    /// `.pdf` and `.docx` are recognised; everything else is read as plain text.
    pub fn from_file_name(name: &str) -> Self {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("pdf") => DocumentKind::Pdf,
            Some("docx") => DocumentKind::Docx,
            _ => DocumentKind::PlainText,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RawDocument {
    pub name: String,
    pub bytes: Vec<u8>,
    pub declared_kind: DocumentKind,
}

impl RawDocument {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>, declared_kind: DocumentKind) -> Self {
        Self {
            name: name.into(),
            bytes,
            declared_kind,
        }
    }

    pub fn inferred(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let declared_kind = DocumentKind::from_file_name(&name);
        Self {
            name,
            bytes,
            declared_kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub source_name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationAssessment {
    pub is_target_region: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillScores {
    pub finance_economics: f64,
    pub analytical: f64,
    pub excel: f64,
    pub python_sql: f64,
    pub identified_skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceAssessment {
    pub years_relevant: f64,
    pub autonomy: f64,
    pub industry_relevance: f64,
    pub key_achievements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CulturalFit {
    pub learning_orientation: f64,
    pub impact_driven: f64,
    pub team_orientation: f64,
    pub supporting_evidence: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAssessment {
    pub email: Option<String>,
    pub location: LocationAssessment,
    pub skills: SkillScores,
    pub experience: ExperienceAssessment,
    pub cultural_fit: CulturalFit,
    pub overall_score: f64,
    pub key_strengths: Vec<String>,
    pub potential_concerns: Vec<String>,
    pub skills_gaps: Vec<String>,
    pub red_flags: Vec<String>,
    pub source_name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    FinanceEconomics,
    Analytical,
    Excel,
    PythonSql,
    YearsRelevant,
    Autonomy,
    IndustryRelevance,
    LearningOrientation,
    ImpactDriven,
    TeamOrientation,
    OverallScore,
}

impl Metric {
    pub fn value(self, assessment: &CandidateAssessment) -> f64 {
        match self {
            Metric::FinanceEconomics => assessment.skills.finance_economics,
            Metric::Analytical => assessment.skills.analytical,
            Metric::Excel => assessment.skills.excel,
            Metric::PythonSql => assessment.skills.python_sql,
            Metric::YearsRelevant => assessment.experience.years_relevant,
            Metric::Autonomy => assessment.experience.autonomy,
            Metric::IndustryRelevance => assessment.experience.industry_relevance,
            Metric::LearningOrientation => assessment.cultural_fit.learning_orientation,
            Metric::ImpactDriven => assessment.cultural_fit.impact_driven,
            Metric::TeamOrientation => assessment.cultural_fit.team_orientation,
            Metric::OverallScore => assessment.overall_score,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::FinanceEconomics => "finance_economics",
            Metric::Analytical => "analytical",
            Metric::Excel => "excel",
            Metric::PythonSql => "python_sql",
            Metric::YearsRelevant => "years_relevant",
            Metric::Autonomy => "autonomy",
            Metric::IndustryRelevance => "industry_relevance",
            Metric::LearningOrientation => "learning_orientation",
            Metric::ImpactDriven => "impact_driven",
            Metric::TeamOrientation => "team_orientation",
            Metric::OverallScore => "overall_score",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSegment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl ContentSegment {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: Some(value.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    Text(String),
    Segments(Vec<ContentSegment>),
}

impl RawResponse {
    pub fn concatenated_text(&self) -> String {
        match self {
            RawResponse::Text(text) => text.clone(),
            RawResponse::Segments(segments) => segments
                .iter()
                .filter(|segment| segment.kind == "text")
                .filter_map(|segment| segment.text.as_deref())
                .collect::<String>(),
        }
    }
}
