//! Sequencing of the two passes over every submitted task.
//!
//! A run is strictly linear:
//!
//! ```text
//! EDIT_T1 -> COOLDOWN -> GRADE_T1 -> COOLDOWN -> EDIT_T2 -> COOLDOWN -> GRADE_T2 -> AGGREGATE
//! ```
//!
//! Stages of an unsubmitted task are skipped along with the cooldown leading into
//! them. Backend calls are never issued concurrently, even across tasks.

use std::sync::Arc;

use tracing::{error, info, info_span, Instrument};

use crate::config::EvaluatorConfig;
use crate::cooldown::CooldownScheduler;
use crate::editor::EditorPass;
use crate::errors::{PipelineError, PipelineResult};
use crate::examiner::ExaminerPass;
use crate::model::{EssayFeedback, Finding, PerTask, TaskEvaluation, TaskNumber, WritingTest};
use crate::progress::ProgressReporter;
use crate::providers::llm::ModelCaller;
use crate::retry::RetryExecutor;
use crate::rubric::Rubric;

pub const COOLING_DOWN: &str = "Cooling down…";

#[derive(Clone)]
pub struct Pipeline {
    editor: EditorPass,
    examiner: ExaminerPass,
    cooldown: CooldownScheduler,
}

impl Pipeline {
    pub fn new(
        client: Arc<dyn ModelCaller>,
        retry: RetryExecutor,
        rubric: Arc<Rubric>,
        cooldown: CooldownScheduler,
    ) -> Self {
        Self {
            editor: EditorPass::new(client.clone(), retry.clone()),
            examiner: ExaminerPass::new(client, retry, rubric),
            cooldown,
        }
    }

    /// Pipeline with retry, cooldown and rubric taken from `cfg`.
    pub fn from_config(client: Arc<dyn ModelCaller>, cfg: &EvaluatorConfig) -> anyhow::Result<Self> {
        let rubric = Rubric::with_overrides(&cfg.rubric)?;
        Ok(Self::new(
            client,
            RetryExecutor::new(cfg.retry),
            Arc::new(rubric),
            cfg.cooldown(),
        ))
    }

    pub fn cooldown(&self) -> CooldownScheduler {
        self.cooldown
    }

    /// Grade the submitted essays of `test` and build the report.
    ///
    /// Blank essays count as not submitted. With nothing submitted this fails with
    /// `NoContentSubmitted` before any backend call. An unsubmitted task gets a
    /// zero-score placeholder in `perTask`. Any stage failure aborts the run and no
    /// partial report is returned.
    pub async fn evaluate(
        &self,
        test: &WritingTest,
        essay1: Option<&str>,
        essay2: Option<&str>,
        target_band: f64,
        language: &str,
        progress: &dyn ProgressReporter,
    ) -> PipelineResult<EssayFeedback> {
        let submitted: Vec<(TaskNumber, &str)> = [(TaskNumber::One, essay1), (TaskNumber::Two, essay2)]
            .into_iter()
            .filter_map(|(task, essay)| essay.filter(|e| !e.trim().is_empty()).map(|e| (task, e)))
            .collect();

        if submitted.is_empty() {
            return Err(PipelineError::no_content_submitted());
        }

        let span = info_span!("evaluate", test = %test.id, tasks = submitted.len());
        let result = self
            .run_stages(test, &submitted, target_band, language, progress)
            .instrument(span)
            .await;

        match result {
            Ok(feedback) => {
                info!(
                    test = %test.id,
                    overall_score = feedback.overall_score(),
                    findings = feedback.findings().len(),
                    "evaluation complete"
                );
                Ok(feedback)
            }
            Err(e) => {
                error!(
                    test = %test.id,
                    kind = e.kind.as_str(),
                    status = ?e.status,
                    provider = ?e.provider,
                    detail = ?e.detail,
                    error = %e,
                    "evaluation aborted"
                );
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        test: &WritingTest,
        submitted: &[(TaskNumber, &str)],
        target_band: f64,
        language: &str,
        progress: &dyn ProgressReporter,
    ) -> PipelineResult<EssayFeedback> {
        let total = submitted.len() * 2;
        let mut step = 0;
        let mut per_task = PerTask::default();
        let mut findings: Vec<Finding> = Vec::new();

        for (i, &(task_number, essay)) in submitted.iter().enumerate() {
            let task = test.task(task_number);

            if i > 0 {
                self.cool_down(progress).await;
            }

            step += 1;
            progress.report(&format!("Step {}/{}: Reviewing {}…", step, total, task_number));
            let task_findings = namespace(self.editor.run(task, essay, task_number).await?, task_number);

            self.cool_down(progress).await;

            step += 1;
            progress.report(&format!("Step {}/{}: Grading {}…", step, total, task_number));
            let evaluation = self
                .examiner
                .run(task, essay, target_band, &task_findings, task_number, language)
                .await?;

            per_task.set(task_number, evaluation);
            findings.extend(task_findings);
        }

        for task_number in TaskNumber::ALL {
            if per_task.get(task_number).is_none() {
                per_task.set(task_number, TaskEvaluation::placeholder(task_number));
            }
        }

        Ok(EssayFeedback::from_parts(per_task, findings, target_band, language))
    }

    async fn cool_down(&self, progress: &dyn ProgressReporter) {
        progress.report(COOLING_DOWN);
        self.cooldown.wait().await;
    }
}

/// Prefix editor ids with the task so they stay unique in the merged report.
fn namespace(findings: Vec<Finding>, task_number: TaskNumber) -> Vec<Finding> {
    findings
        .into_iter()
        .map(|mut f| {
            f.id = format!("{}-{}", task_number.id_prefix(), f.id);
            f
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Criterion, FindingSource};

    #[test]
    fn namespacing_prefixes_task() {
        let f = Finding {
            id: "imp-1".into(),
            task_number: TaskNumber::Two,
            original_span: "a".into(),
            improved_span: "b".into(),
            explanation: String::new(),
            criterion: Criterion::LexicalResource,
            source: FindingSource::Ai,
        };
        let out = namespace(vec![f], TaskNumber::Two);
        assert_eq!(out[0].id, "t2-imp-1");
    }
}
