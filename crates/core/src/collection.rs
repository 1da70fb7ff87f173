use crate::models::{CandidateAssessment, Metric};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultCollection {
    records: Vec<CandidateAssessment>,
}

impl ResultCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: CandidateAssessment) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateAssessment> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[CandidateAssessment] {
        &self.records
    }

    pub fn filter<P>(&self, predicate: P) -> ResultCollection
    where
        P: Fn(&CandidateAssessment) -> bool,
    {
        self.records
            .iter()
            .filter(|&record| predicate(record))
            .cloned()
            .collect()
    }

    /// Stable sort on a numeric key; ties keep insertion order.
    pub fn sort_by<K>(&self, key: K, descending: bool) -> ResultCollection
    where
        K: Fn(&CandidateAssessment) -> f64,
    {
        let mut records = self.records.clone();
        records.sort_by(|left, right| {
            let ordering = key(left).total_cmp(&key(right));
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
        ResultCollection { records }
    }

    pub fn sort_by_key(&self, key: SortKey, descending: bool) -> ResultCollection {
        match key {
            SortKey::Name => {
                let mut records = self.records.clone();
                records.sort_by(|left, right| {
                    let ordering = left.source_name.cmp(&right.source_name);
                    if descending {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                });
                ResultCollection { records }
            }
            SortKey::Metric(metric) => self.sort_by(|record| metric.value(record), descending),
        }
    }

    pub fn partition_by_region(&self) -> (ResultCollection, ResultCollection) {
        let (target, other): (Vec<_>, Vec<_>) = self
            .records
            .iter()
            .cloned()
            .partition(|record| record.location.is_target_region);
        (
            ResultCollection { records: target },
            ResultCollection { records: other },
        )
    }
}

impl FromIterator<CandidateAssessment> for ResultCollection {
    fn from_iter<I: IntoIterator<Item = CandidateAssessment>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ResultCollection {
    type Item = CandidateAssessment;
    type IntoIter = std::vec::IntoIter<CandidateAssessment>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Metric(Metric),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateFilter {
    pub min_years_relevant: Option<f64>,
    pub min_finance_economics: Option<f64>,
    pub min_overall_score: Option<f64>,
    pub target_region_only: bool,
}

impl CandidateFilter {
    pub fn matches(&self, record: &CandidateAssessment) -> bool {
        let at_least = |minimum: Option<f64>, value: f64| minimum.map_or(true, |min| value >= min);

        at_least(self.min_years_relevant, record.experience.years_relevant)
            && at_least(self.min_finance_economics, record.skills.finance_economics)
            && at_least(self.min_overall_score, record.overall_score)
            && (!self.target_region_only || record.location.is_target_region)
    }

    pub fn apply(&self, collection: &ResultCollection) -> ResultCollection {
        collection.filter(|record| self.matches(record))
    }
}
