//! Turning examiner output into a [`TaskEvaluation`] for one task.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::warn;

use crate::aggregate::{is_valid_band, round_to_half_band};
use crate::errors::{PipelineError, PipelineResult};
use crate::extract;
use crate::model::{
    AreaForImprovement, Criterion, CriterionFeedback, CriterionScore, TaskEvaluation, TaskNumber,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvaluation {
    #[serde(default)]
    overall_task_feedback: String,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    areas_for_improvement: Vec<AreaForImprovement>,
    #[serde(default)]
    criteria: RawCriteria,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCriteria {
    Keyed(BTreeMap<String, CriterionScore>),
    Listed(Vec<NamedScore>),
}

impl Default for RawCriteria {
    fn default() -> Self {
        Self::Keyed(BTreeMap::new())
    }
}

#[derive(Debug, Deserialize)]
struct NamedScore {
    #[serde(alias = "criterion")]
    name: String,
    #[serde(flatten)]
    score: CriterionScore,
}

impl RawCriteria {
    fn is_empty(&self) -> bool {
        match self {
            Self::Keyed(map) => map.is_empty(),
            Self::Listed(list) => list.is_empty(),
        }
    }

    fn into_pairs(self) -> Vec<(String, CriterionScore)> {
        match self {
            Self::Keyed(map) => map.into_iter().collect(),
            Self::Listed(list) => list.into_iter().map(|n| (n.name, n.score)).collect(),
        }
    }
}

/// Parse and normalise examiner output for `task_number`.
///
/// Criteria from the other task's set are remapped or dropped, scores outside
/// `[0, 9]` become absent, and in-range scores are snapped to the half-band grid.
/// Fails with `MalformedOutput` when no criterion carries a usable score.
pub(crate) fn parse_evaluation(raw: &str, task_number: TaskNumber) -> PipelineResult<TaskEvaluation> {
    let parsed: RawEvaluation = extract::extract_where(raw, |e: &RawEvaluation| !e.criteria.is_empty())?;

    let mut criteria: BTreeMap<Criterion, CriterionScore> = BTreeMap::new();
    for (name, mut score) in parsed.criteria.into_pairs() {
        let Some(criterion) = Criterion::for_task(&name, task_number) else {
            warn!(task = task_number.as_u8(), criterion = %name, "dropping unknown criterion");
            continue;
        };
        score.score = match score.score {
            Some(s) if is_valid_band(s) => Some(round_to_half_band(s)),
            Some(s) => {
                warn!(task = task_number.as_u8(), criterion = criterion.key(), score = s, "score outside band range");
                None
            }
            None => {
                warn!(task = task_number.as_u8(), criterion = criterion.key(), "criterion has no numeric score");
                None
            }
        };
        criteria.insert(criterion, score);
    }

    for expected in task_number.criteria() {
        if !criteria.contains_key(&expected) {
            warn!(task = task_number.as_u8(), criterion = expected.key(), "examiner omitted criterion");
        }
    }

    if !criteria.values().any(|c| c.score.is_some()) {
        return Err(PipelineError::malformed_output(format!(
            "examiner returned no usable criterion scores for {}",
            task_number
        )));
    }

    Ok(TaskEvaluation {
        overall_task_feedback: parsed.overall_task_feedback.trim().to_string(),
        strengths: clean_list(parsed.strengths),
        areas_for_improvement: parsed
            .areas_for_improvement
            .into_iter()
            .filter(|a| !a.title.trim().is_empty() || !a.feedback.trim().is_empty())
            .collect(),
        criteria: criteria
            .into_iter()
            .map(|(c, mut s)| {
                s.feedback = clean_feedback(s.feedback);
                (c, s)
            })
            .collect(),
        placeholder: false,
    })
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn clean_feedback(mut feedback: CriterionFeedback) -> CriterionFeedback {
    feedback.suggestions = clean_list(feedback.suggestions);
    feedback
}
