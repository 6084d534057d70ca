//! Second pass: criterion-by-criterion grading against the rubric.

mod parse;
mod prompt;

use std::sync::Arc;

use tracing::{debug, info, info_span, Instrument};

use crate::errors::PipelineResult;
use crate::model::{Finding, TaskEvaluation, TaskNumber, WritingTask};
use crate::providers::llm::{ModelCaller, ModelRequest};
use crate::retry::RetryExecutor;
use crate::rubric::Rubric;

#[derive(Clone)]
pub struct ExaminerPass {
    client: Arc<dyn ModelCaller>,
    retry: RetryExecutor,
    rubric: Arc<Rubric>,
}

impl ExaminerPass {
    pub fn new(client: Arc<dyn ModelCaller>, retry: RetryExecutor, rubric: Arc<Rubric>) -> Self {
        Self {
            client,
            retry,
            rubric,
        }
    }

    pub fn rubric(&self) -> &Rubric {
        &self.rubric
    }

    /// Grade one essay. The editor findings are passed in as evidence only.
    pub async fn run(
        &self,
        task: &WritingTask,
        essay: &str,
        target_band: f64,
        findings: &[Finding],
        task_number: TaskNumber,
        language: &str,
    ) -> PipelineResult<TaskEvaluation> {
        let span = info_span!(
            "pass",
            task = task_number.as_u8(),
            pass = "examiner",
            rubric = self.rubric.version()
        );
        async move {
            let input = prompt::ExaminerInput {
                task,
                essay,
                task_number,
                target_band,
                findings,
                language,
                rubric_text: self.rubric.text(task_number),
            };
            let request = ModelRequest::new(prompt::build_prompt(&input))
                .with_system(prompt::SYSTEM_PROMPT)
                .with_schema(prompt::response_schema(task_number));

            let raw = self
                .retry
                .run("examiner", || self.client.complete(&request))
                .await?;
            debug!(chars = raw.len(), "examiner response received");

            let evaluation = parse::parse_evaluation(&raw, task_number)?;
            info!(criteria = evaluation.criteria.len(), "examiner pass complete");
            Ok(evaluation)
        }
        .instrument(span)
        .await
    }
}
