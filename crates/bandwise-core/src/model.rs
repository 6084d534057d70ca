use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::aggregate;

/// Which of the two writing tasks a value belongs to. Serialized as `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TaskNumber {
    One,
    Two,
}

impl TaskNumber {
    pub const ALL: [TaskNumber; 2] = [TaskNumber::One, TaskNumber::Two];

    pub fn as_u8(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    /// Prefix used to keep finding ids unique across both tasks of a run.
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::One => "t1",
            Self::Two => "t2",
        }
    }

    pub fn criteria(self) -> [Criterion; 4] {
        let first = match self {
            Self::One => Criterion::TaskAchievement,
            Self::Two => Criterion::TaskResponse,
        };
        [
            first,
            Criterion::CoherenceAndCohesion,
            Criterion::LexicalResource,
            Criterion::GrammaticalRangeAndAccuracy,
        ]
    }
}

impl TryFrom<u8> for TaskNumber {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(format!("task number must be 1 or 2, got {}", other)),
        }
    }
}

impl From<TaskNumber> for u8 {
    fn from(value: TaskNumber) -> Self {
        value.as_u8()
    }
}

impl fmt::Display for TaskNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task {}", self.as_u8())
    }
}

/// Rubric dimension a score or finding is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Criterion {
    #[serde(alias = "Task Achievement")]
    TaskAchievement,
    #[serde(alias = "Task Response")]
    TaskResponse,
    #[serde(alias = "Coherence and Cohesion", alias = "Coherence & Cohesion")]
    CoherenceAndCohesion,
    #[serde(alias = "Lexical Resource")]
    LexicalResource,
    #[serde(
        alias = "Grammatical Range and Accuracy",
        alias = "Grammatical Range & Accuracy"
    )]
    GrammaticalRangeAndAccuracy,
}

impl Criterion {
    pub const ALL: [Criterion; 5] = [
        Criterion::TaskAchievement,
        Criterion::TaskResponse,
        Criterion::CoherenceAndCohesion,
        Criterion::LexicalResource,
        Criterion::GrammaticalRangeAndAccuracy,
    ];

    /// Identifier as it appears in model JSON.
    pub fn key(self) -> &'static str {
        match self {
            Self::TaskAchievement => "TaskAchievement",
            Self::TaskResponse => "TaskResponse",
            Self::CoherenceAndCohesion => "CoherenceAndCohesion",
            Self::LexicalResource => "LexicalResource",
            Self::GrammaticalRangeAndAccuracy => "GrammaticalRangeAndAccuracy",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::TaskAchievement => "Task Achievement",
            Self::TaskResponse => "Task Response",
            Self::CoherenceAndCohesion => "Coherence and Cohesion",
            Self::LexicalResource => "Lexical Resource",
            Self::GrammaticalRangeAndAccuracy => "Grammatical Range and Accuracy",
        }
    }

    pub fn applies_to(self, task: TaskNumber) -> bool {
        task.criteria().contains(&self)
    }

    /// Lenient lookup of a model-supplied name: case, spacing, punctuation and
    /// `&` for `and` are ignored.
    pub fn from_name(name: &str) -> Option<Criterion> {
        let wanted = normalize_name(name);
        if wanted.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|c| normalize_name(c.key()) == wanted)
    }

    /// [`Criterion::from_name`] resolved against one task's set. Task Achievement
    /// and Task Response are the same slot for different tasks.
    pub fn for_task(name: &str, task: TaskNumber) -> Option<Criterion> {
        match Self::from_name(name)? {
            Self::TaskAchievement | Self::TaskResponse => Some(task.criteria()[0]),
            other => Some(other),
        }
    }
}

fn normalize_name(name: &str) -> String {
    name.replace('&', "and")
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FindingSource {
    #[default]
    #[serde(rename = "AI")]
    Ai,
}

/// A localized, unscored observation about one span of a submitted essay.
///
/// Shown as an "improvement" in the UI. `id` is unique across the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub id: String,
    pub task_number: TaskNumber,
    pub original_span: String,
    pub improved_span: String,
    pub explanation: String,
    pub criterion: Criterion,
    #[serde(default)]
    pub source: FindingSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackPoint {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriterionFeedback {
    #[serde(default)]
    pub positive: FeedbackPoint,
    #[serde(default)]
    pub negative: FeedbackPoint,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Band score and justification for one criterion of one task.
///
/// `score` is `None` when the model produced something that is not a usable band;
/// such criteria are skipped by the aggregator rather than counted as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    #[serde(default, deserialize_with = "lenient_score")]
    pub score: Option<f64>,
    #[serde(default)]
    pub feedback: CriterionFeedback,
}

impl CriterionScore {
    pub fn new(score: f64) -> Self {
        Self {
            score: Some(score),
            feedback: CriterionFeedback::default(),
        }
    }
}

fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite()))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AreaForImprovement {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub feedback: String,
}

/// Examiner result for one task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvaluation {
    #[serde(default)]
    pub overall_task_feedback: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub areas_for_improvement: Vec<AreaForImprovement>,
    #[serde(default)]
    pub criteria: BTreeMap<Criterion, CriterionScore>,
    /// Set on the zero-score stand-in for a task that was not submitted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

impl TaskEvaluation {
    /// Zero-score stand-in for an unsubmitted task, so `perTask` keeps both slots.
    pub fn placeholder(task: TaskNumber) -> Self {
        Self {
            overall_task_feedback: String::new(),
            strengths: Vec::new(),
            areas_for_improvement: Vec::new(),
            criteria: task
                .criteria()
                .into_iter()
                .map(|c| (c, CriterionScore::new(0.0)))
                .collect(),
            placeholder: true,
        }
    }

    pub fn score(&self, criterion: Criterion) -> Option<f64> {
        self.criteria.get(&criterion).and_then(|c| c.score)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task1: Option<TaskEvaluation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task2: Option<TaskEvaluation>,
}

impl PerTask {
    pub fn get(&self, task: TaskNumber) -> Option<&TaskEvaluation> {
        match task {
            TaskNumber::One => self.task1.as_ref(),
            TaskNumber::Two => self.task2.as_ref(),
        }
    }

    pub fn set(&mut self, task: TaskNumber, evaluation: TaskEvaluation) {
        match task {
            TaskNumber::One => self.task1 = Some(evaluation),
            TaskNumber::Two => self.task2 = Some(evaluation),
        }
    }

    /// Evaluations of tasks that were actually graded.
    pub fn graded(&self, task: TaskNumber) -> Option<&TaskEvaluation> {
        self.get(task).filter(|e| !e.placeholder)
    }
}

/// Final artifact of an evaluation run.
///
/// `overall_score` is always computed from `per_task` on construction and on load,
/// never carried independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredFeedback")]
pub struct EssayFeedback {
    id: Uuid,
    created_at: DateTime<Utc>,
    target_band: f64,
    language: String,
    overall_score: f64,
    overall_feedback: String,
    findings: Vec<Finding>,
    strengths: Vec<String>,
    areas_for_improvement: Vec<AreaForImprovement>,
    per_task: PerTask,
}

impl EssayFeedback {
    pub fn from_parts(
        per_task: PerTask,
        findings: Vec<Finding>,
        target_band: f64,
        language: impl Into<String>,
    ) -> Self {
        Self::build(
            Uuid::new_v4(),
            Utc::now(),
            per_task,
            findings,
            target_band,
            language.into(),
        )
    }

    fn build(
        id: Uuid,
        created_at: DateTime<Utc>,
        per_task: PerTask,
        findings: Vec<Finding>,
        target_band: f64,
        language: String,
    ) -> Self {
        let overall_score = aggregate::aggregate(
            per_task.graded(TaskNumber::One),
            per_task.graded(TaskNumber::Two),
        );

        let mut strengths = Vec::new();
        let mut areas_for_improvement = Vec::new();
        let mut summaries = Vec::new();
        for task in TaskNumber::ALL {
            if let Some(eval) = per_task.graded(task) {
                strengths.extend(eval.strengths.iter().cloned());
                areas_for_improvement.extend(eval.areas_for_improvement.iter().cloned());
                if !eval.overall_task_feedback.trim().is_empty() {
                    summaries.push(format!("{}: {}", task, eval.overall_task_feedback.trim()));
                }
            }
        }

        Self {
            id,
            created_at,
            target_band,
            language,
            overall_score,
            overall_feedback: summaries.join("\n\n"),
            findings,
            strengths,
            areas_for_improvement,
            per_task,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn target_band(&self) -> f64 {
        self.target_band
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn overall_score(&self) -> f64 {
        self.overall_score
    }

    pub fn overall_feedback(&self) -> &str {
        &self.overall_feedback
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn findings_for(&self, task: TaskNumber) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.task_number == task)
    }

    pub fn strengths(&self) -> &[String] {
        &self.strengths
    }

    pub fn areas_for_improvement(&self) -> &[AreaForImprovement] {
        &self.areas_for_improvement
    }

    pub fn per_task(&self) -> &PerTask {
        &self.per_task
    }
}

/// Serialized shape of [`EssayFeedback`]. Derived fields are recomputed on load.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredFeedback {
    id: Uuid,
    created_at: DateTime<Utc>,
    #[serde(default)]
    target_band: f64,
    #[serde(default)]
    language: String,
    #[serde(default)]
    findings: Vec<Finding>,
    #[serde(default)]
    per_task: PerTask,
}

impl From<StoredFeedback> for EssayFeedback {
    fn from(stored: StoredFeedback) -> Self {
        Self::build(
            stored.id,
            stored.created_at,
            stored.per_task,
            stored.findings,
            stored.target_band,
            stored.language,
        )
    }
}

/// One task of a writing test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritingTask {
    pub prompt: String,
    /// Ground-truth data points (e.g. figures from a chart) the essay must not contradict.
    #[serde(default)]
    pub reference_facts: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritingTest {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub task1: WritingTask,
    pub task2: WritingTask,
}

impl WritingTest {
    pub fn task(&self, task: TaskNumber) -> &WritingTask {
        match task {
            TaskNumber::One => &self.task1,
            TaskNumber::Two => &self.task2,
        }
    }
}
