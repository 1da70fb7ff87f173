use crate::config::ScoreScale;
use crate::error::AnalysisError;
use crate::models::{
    CandidateAssessment, CulturalFit, ExperienceAssessment, LocationAssessment, RawResponse,
    SkillScores,
};
use serde_json::{Map, Value};

const SUB_SCORE_MAX: f64 = 10.0;

/// Turns a raw scoring response into a `CandidateAssessment`, or rejects it.
#[derive(Debug, Clone, Copy)]
pub struct ResponseValidator {
    scale: ScoreScale,
}

impl ResponseValidator {
    pub fn new(scale: ScoreScale) -> Self {
        Self { scale }
    }

    pub fn validate(
        &self,
        raw: &RawResponse,
        source_name: &str,
    ) -> Result<CandidateAssessment, AnalysisError> {
        let text = raw.concatenated_text();
        let payload = strip_code_fence(&text);

        let value: Value =
            serde_json::from_str(payload).map_err(|error| AnalysisError::MalformedResponse {
                reason: error.to_string(),
                raw: text.clone(),
            })?;

        let root = match &value {
            Value::Object(map) => Fields::root(map),
            other => {
                return Err(AnalysisError::MalformedResponse {
                    reason: format!("expected a JSON object, got {}", type_name(other)),
                    raw: text,
                })
            }
        };

        let location = root.object("location")?;
        let skills = root.object("skills")?;
        let experience = root.object("experience")?;
        let cultural_fit = root.object("cultural_fit")?;

        Ok(CandidateAssessment {
            email: root.optional_string("email")?,
            location: LocationAssessment {
                is_target_region: location.boolean("is_target_region")?,
                detail: location.string("detail")?,
            },
            skills: SkillScores {
                finance_economics: skills.bounded("finance_economics", SUB_SCORE_MAX)?,
                analytical: skills.bounded("analytical", SUB_SCORE_MAX)?,
                excel: skills.bounded("excel", SUB_SCORE_MAX)?,
                python_sql: skills.bounded("python_sql", SUB_SCORE_MAX)?,
                identified_skills: skills.strings("identified_skills")?,
            },
            experience: ExperienceAssessment {
                years_relevant: experience.non_negative("years_relevant")?,
                autonomy: experience.bounded("autonomy", SUB_SCORE_MAX)?,
                industry_relevance: experience.bounded("industry_relevance", SUB_SCORE_MAX)?,
                key_achievements: experience.strings("key_achievements")?,
            },
            cultural_fit: CulturalFit {
                learning_orientation: cultural_fit.bounded("learning_orientation", SUB_SCORE_MAX)?,
                impact_driven: cultural_fit.bounded("impact_driven", SUB_SCORE_MAX)?,
                team_orientation: cultural_fit.bounded("team_orientation", SUB_SCORE_MAX)?,
                supporting_evidence: cultural_fit.strings("supporting_evidence")?,
            },
            overall_score: root.bounded("overall_score", self.scale.max())?,
            key_strengths: root.strings("key_strengths")?,
            potential_concerns: root.strings("potential_concerns")?,
            skills_gaps: Vec::new(),
            red_flags: Vec::new(),
            source_name: source_name.to_string(),
        })
    }
}

/// Removes surrounding whitespace and a ```/```json fence if the model added one.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

struct Fields<'a> {
    path: String,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn root(map: &'a Map<String, Value>) -> Self {
        Self {
            path: String::new(),
            map,
        }
    }

    fn field_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.path)
        }
    }

    fn required(&self, key: &str) -> Result<&'a Value, AnalysisError> {
        match self.map.get(key) {
            Some(Value::Null) | None => Err(AnalysisError::schema(
                self.field_path(key),
                "required field is missing",
            )),
            Some(value) => Ok(value),
        }
    }

    fn wrong_type(&self, key: &str, expected: &str, found: &Value) -> AnalysisError {
        AnalysisError::schema(
            self.field_path(key),
            format!("expected {expected}, found {}", type_name(found)),
        )
    }

    fn object(&self, key: &str) -> Result<Fields<'a>, AnalysisError> {
        match self.required(key)? {
            Value::Object(map) => Ok(Fields {
                path: self.field_path(key),
                map,
            }),
            other => Err(self.wrong_type(key, "object", other)),
        }
    }

    fn boolean(&self, key: &str) -> Result<bool, AnalysisError> {
        match self.required(key)? {
            Value::Bool(flag) => Ok(*flag),
            other => Err(self.wrong_type(key, "boolean", other)),
        }
    }

    fn string(&self, key: &str) -> Result<String, AnalysisError> {
        match self.required(key)? {
            Value::String(text) => Ok(text.clone()),
            other => Err(self.wrong_type(key, "string", other)),
        }
    }

    fn optional_string(&self, key: &str) -> Result<Option<String>, AnalysisError> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.clone())),
            Some(other) => Err(self.wrong_type(key, "string or null", other)),
        }
    }

    fn number(&self, key: &str) -> Result<f64, AnalysisError> {
        let value = self.required(key)?;
        value
            .as_f64()
            .filter(|number| number.is_finite())
            .ok_or_else(|| self.wrong_type(key, "number", value))
    }

    fn bounded(&self, key: &str, max: f64) -> Result<f64, AnalysisError> {
        let number = self.number(key)?;
        if (0.0..=max).contains(&number) {
            Ok(number)
        } else {
            Err(AnalysisError::schema(
                self.field_path(key),
                format!("{number} is outside [0, {max}]"),
            ))
        }
    }

    fn non_negative(&self, key: &str) -> Result<f64, AnalysisError> {
        let number = self.number(key)?;
        if number >= 0.0 {
            Ok(number)
        } else {
            Err(AnalysisError::schema(
                self.field_path(key),
                format!("{number} must not be negative"),
            ))
        }
    }

    fn strings(&self, key: &str) -> Result<Vec<String>, AnalysisError> {
        let items = match self.required(key)? {
            Value::Array(items) => items,
            other => return Err(self.wrong_type(key, "array of strings", other)),
        };

        items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::String(text) => Ok(text.clone()),
                other => Err(AnalysisError::schema(
                    format!("{}[{index}]", self.field_path(key)),
                    format!("expected string, found {}", type_name(other)),
                )),
            })
            .collect()
    }
}
